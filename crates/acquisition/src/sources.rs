//! Catalog of known Helioviewer sources.

use crate::types::SourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceInfo {
    pub name: &'static str,
    pub id: SourceId,
    pub description: &'static str,
}

/// SDO/AIA 304Å
pub const DEFAULT_SOURCE: SourceId = 13;

/// Cycling order for [`cycle`].
pub const CATALOG: &[SourceInfo] = &[
    // SDO/AIA
    source("304", 13, "304Å - Chromosphere (50,000K)"),
    source("171", 10, "171Å - Quiet corona (600,000K)"),
    source("193", 11, "193Å - Corona & flares (1.2M K)"),
    source("211", 12, "211Å - Active regions (2M K)"),
    source("335", 14, "335Å - Active regions (2.5M K)"),
    source("094", 8, "094Å - Flaring regions (6M K)"),
    source("131", 9, "131Å - Flares (10M K)"),
    source("1600", 15, "1600Å - Transition region"),
    source("1700", 16, "1700Å - Photosphere"),
    source("4500", 17, "4500Å - Visible light"),
    // SDO/HMI
    source("hmi", 18, "HMI - Magnetic intensity"),
    source("magnetogram", 19, "Magnetogram"),
    // SOHO/LASCO
    source("c2", 4, "LASCO C2 - Coronagraph"),
    source("c3", 5, "LASCO C3 - Coronagraph"),
    // PROBA-2/SWAP
    source("swap", 32, "SWAP 174Å"),
];

const fn source(name: &'static str, id: SourceId, description: &'static str) -> SourceInfo {
    SourceInfo {
        name,
        id,
        description,
    }
}

pub fn by_name(name: &str) -> Option<&'static SourceInfo> {
    CATALOG
        .iter()
        .find(|info| info.name.eq_ignore_ascii_case(name))
}

pub fn by_id(id: SourceId) -> Option<&'static SourceInfo> {
    CATALOG.iter().find(|info| info.id == id)
}

/// Accept a catalog name, falling back to a raw numeric id.
pub fn parse(value: &str) -> Option<SourceId> {
    let value = value.trim();
    by_name(value)
        .map(|info| info.id)
        .or_else(|| value.parse().ok())
}

/// Step through the catalog with wraparound. Ids outside the catalog start
/// from the first entry.
pub fn cycle(current: SourceId, step: i32) -> SourceId {
    let len = CATALOG.len() as i64;
    let index = CATALOG
        .iter()
        .position(|info| info.id == current)
        .unwrap_or(0) as i64;

    CATALOG[(index + step as i64).rem_euclid(len) as usize].id
}
