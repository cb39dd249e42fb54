//! Group tile identifiers derived from product names.
//!
//! Names are split on `_` with empty segments kept, so the offsets below count the padding
//! underscores of Sentinel-3 names too. Missions are matched by name prefix; new missions
//! only need a row in [`TILE_RULES`].

use lazy_static::lazy_static;
use regex::Regex;

type TileRule = fn(&str, &[&str]) -> Option<String>;

const TILE_RULES: &[(&str, TileRule)] = &[
    ("S1", sentinel1),
    ("S2", sentinel2),
    ("S3", sentinel3),
    ("S5", sentinel5p),
];

lazy_static! {
    // relative orbit and MGRS tile, e.g. _R008_T32UNE_
    static ref S2_ORBIT_TILE: Regex = Regex::new(r"_(R\d{3}_T[0-9A-Z]{5})_").unwrap();
}

/// `None` for unrecognized missions and for names too short for their mission's layout.
pub fn group_tile_id(name: &str) -> Option<String> {
    let parts: Vec<&str> = name.split('_').collect();
    TILE_RULES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .and_then(|(_, rule)| rule(name, &parts))
}

// absolute orbit, or the product unique id of short names
fn sentinel1(_name: &str, parts: &[&str]) -> Option<String> {
    if parts.len() > 7 {
        Some(parts[7].to_string())
    } else {
        parts.last().map(|p| p.to_string())
    }
}

fn sentinel2(name: &str, parts: &[&str]) -> Option<String> {
    if let Some(captures) = S2_ORBIT_TILE.captures(name) {
        return captures.get(1).map(|m| m.as_str().to_string());
    }
    joined(parts, 4, 6)
}

// synergy products carry no tile
fn sentinel3(name: &str, parts: &[&str]) -> Option<String> {
    if name.contains("_SY_") {
        return None;
    }
    joined(parts, 10, 12)
}

// orbit number
fn sentinel5p(_name: &str, parts: &[&str]) -> Option<String> {
    parts
        .len()
        .checked_sub(4)
        .map(|i| parts[i].to_string())
}

fn joined(parts: &[&str], from: usize, to: usize) -> Option<String> {
    parts.get(from..to).map(|slice| slice.join("_"))
}
