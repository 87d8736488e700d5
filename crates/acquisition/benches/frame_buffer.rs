use acquisition::{DecodedImage, Frame, FrameBuffer};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn sample_image() -> DecodedImage {
    let mut out = Cursor::new(Vec::new());
    RgbImage::from_pixel(8, 8, Rgb([200, 120, 40]))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    DecodedImage::decode(out.into_inner()).unwrap()
}

/// Frames with timestamps in scrambled order, like a prefetch racing the live worker
fn scrambled_frames(count: usize) -> Vec<Frame> {
    let image = sample_image();
    (0..count)
        .map(|i| {
            let slot = (i * 37) % count;
            Frame::new(
                image.clone(),
                format!("2024-05-01T{:02}:{:02}:00Z", slot / 60, slot % 60),
                format!("img-{}", slot),
            )
        })
        .collect()
}

/// Benchmark ordered insertion up to common buffer targets
fn benchmark_ordered_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("ordered_insert");

    for count in [60usize, 240, 500] {
        let frames = scrambled_frames(count);

        group.bench_with_input(BenchmarkId::new("insert_if_absent", count), &count, |b, _| {
            b.iter(|| {
                let mut buffer = FrameBuffer::new();
                for frame in &frames {
                    buffer.insert_if_absent(black_box(frame.clone()));
                }
                buffer
            });
        });
    }

    group.finish();
}

/// Benchmark a full playback pass over a filled buffer
fn benchmark_advance_cursor(c: &mut Criterion) {
    let mut buffer = FrameBuffer::new();
    for frame in scrambled_frames(500) {
        buffer.insert_if_absent(frame);
    }

    c.bench_function("advance_cursor_500", |b| {
        b.iter(|| {
            for _ in 0..buffer.len() {
                black_box(buffer.advance_cursor());
            }
        });
    });
}

criterion_group!(benches, benchmark_ordered_insert, benchmark_advance_cursor);
criterion_main!(benches);
