//! Resolution of loosely written collection and product type names to the tokens the
//! catalogue uses.
//!
//! Both the user input and every alias are *homogenized* before comparison: lower case,
//! with whitespace, `-` and `_` removed. Matching is exact after that, so `"Level-1 C"`
//! finds `S2MSI1C` while `"l1cp"` finds nothing.

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

use crate::error::{NameKind, QueryError, Result};

/// A token from the catalogue vocabulary. Only the resolvers in this module hand these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalName(&'static str);

impl CanonicalName {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn homogenize(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

// ------------- Collections -------------
const COLLECTION_ALIASES: &[(&str, &[&str])] = &[
    ("SENTINEL-1", &["sentinel1", "s1"]),
    ("SENTINEL-1-RTC", &["sentinel1rtc", "s1rtc"]),
    ("SENTINEL-2", &["sentinel2", "s2"]),
    ("SENTINEL-3", &["sentinel3", "s3"]),
    ("SENTINEL-5P", &["sentinel5p", "s5p", "sentinel5precursor"]),
    ("SENTINEL-6", &["sentinel6", "s6"]),
    ("GLOBAL-MOSAICS", &["globalmosaics", "mosaics"]),
    ("SMOS", &["smos"]),
    ("ENVISAT", &["envisat", "meris"]),
    ("LANDSAT-5", &["landsat5", "l5", "ls5"]),
    ("LANDSAT-7", &["landsat7", "l7", "ls7"]),
    ("LANDSAT-8", &["landsat8", "l8", "ls8"]),
    ("COP-DEM", &["copdem", "copernicusdem", "dem"]),
    ("TERRAAQUA", &["terraaqua", "terra", "aqua", "modis"]),
    ("S2GLC", &["s2glc", "globallandcover", "glc"]),
    ("CCM", &["ccm", "copernicuscontributingmissions"]),
];

// ------------- Product types -------------
const PRODUCT_TYPE_ALIASES: &[(&str, &[&str])] = &[
    // Sentinel-1
    ("CARD-BS", &["cardbs", "backscatter"]),
    ("CARD-COH6", &["cardcoh6", "cardcoh", "coherence"]),
    ("RAW", &["raw", "level0", "l0"]),
    ("SLC", &["slc", "singlelookcomplex"]),
    ("GRD", &["grd", "groundrangedetected"]),
    ("OCN", &["ocn", "ocean"]),
    // Sentinel-2
    ("S2MSI1C", &["s2msi1c", "msil1c", "l1c", "level1c", "toa"]),
    ("S2MSI2A", &["s2msi2a", "msil2a", "l2a", "level2a", "boa"]),
    // Sentinel-3 OLCI
    ("EFR", &["efr", "ol1efr", "olciefr", "olcil1efr"]),
    ("ERR", &["err", "ol1err", "olcierr", "olcil1err"]),
    ("WFR", &["wfr", "ol2wfr", "olciwfr", "olcil2wfr"]),
    ("WRR", &["wrr", "ol2wrr", "olciwrr", "olcil2wrr"]),
    ("LFR", &["lfr", "ol2lfr", "olcilfr", "olcil2lfr"]),
    ("LRR", &["lrr", "ol2lrr", "olcilrr", "olcil2lrr"]),
    // Sentinel-3 SLSTR
    ("RBT", &["rbt", "sl1rbt", "slstrrbt"]),
    ("LST", &["lst", "sl2lst", "slstrlst"]),
    ("WST", &["wst", "sl2wst", "slstrwst"]),
    ("WCT", &["wct", "sl2wct", "slstrwct"]),
    ("FRP", &["frp", "sl2frp", "slstrfrp"]),
    // Sentinel-3 SRAL
    ("SRA", &["sra", "sr1sra", "sralsra"]),
    ("SRA_A", &["sraa", "sr1sraa", "sralsraa"]),
    ("SRA_BS", &["srabs", "sr1srabs", "sralsrabs"]),
    ("LAN", &["lan", "sr2lan", "srallan"]),
    ("LAN_HY", &["lanhy", "sr2lanhy", "srallanhy"]),
    ("LAN_SI", &["lansi", "sr2lansi", "srallansi"]),
    ("LAN_LI", &["lanli", "sr2lanli", "srallanli"]),
    ("WAT", &["wat", "sr2wat", "sralwat"]),
    // Sentinel-3 Synergy
    ("SYN", &["syn", "synergy", "sy2syn"]),
    ("VGP", &["vgp", "vegetationp", "sy2vgp"]),
    ("VG1", &["vg1", "vegetation1", "vegetations1", "sy2vg1"]),
    ("VG10", &["vg10", "vegetation10", "vegetations10", "sy2vg10"]),
    ("AOD", &["aod", "aerosolopticaldepth", "sy2aod"]),
    // Sentinel-5P
    ("L1B_RA_BD1", &["l1brabd1", "l1bra1", "rabd1", "ra1"]),
    ("L1B_RA_BD2", &["l1brabd2", "l1bra2", "rabd2", "ra2"]),
    ("L1B_RA_BD3", &["l1brabd3", "l1bra3", "rabd3", "ra3"]),
    ("L1B_RA_BD4", &["l1brabd4", "l1bra4", "rabd4", "ra4"]),
    ("L1B_RA_BD5", &["l1brabd5", "l1bra5", "rabd5", "ra5"]),
    ("L1B_RA_BD6", &["l1brabd6", "l1bra6", "rabd6", "ra6"]),
    ("L1B_RA_BD7", &["l1brabd7", "l1bra7", "rabd7", "ra7"]),
    ("L1B_RA_BD8", &["l1brabd8", "l1bra8", "rabd8", "ra8"]),
    ("IR_SIR", &["irsir", "l1birsir", "sir"]),
    ("IR_UVN", &["iruvn", "l1biruvn", "uvn"]),
    ("L2__O3____", &["l2o3", "o3"]),
    ("L2__O3_TCL", &["l2o3tcl", "o3tcl"]),
    ("L2__O3__PR", &["l2o3pr", "o3pr"]),
    ("L2__NO2___", &["l2no2", "no2"]),
    ("L2__SO2___", &["l2so2", "so2"]),
    ("L2__CH4___", &["l2ch4", "ch4"]),
    ("L2__HCHO__", &["l2hcho", "hcho"]),
    ("L2__CLOUD_", &["l2cloud", "cloud"]),
    ("L2__AER_AI", &["l2aerai", "aerai"]),
    ("L2__AER_LH", &["l2aerlh", "aerlh"]),
    // Landsat
    ("L1G", &["l1g", "level1g"]),
    ("L1T", &["l1t", "level1t", "terraincorrected"]),
    ("L1GT", &["l1gt", "level1gt", "geocorrectedterraincorrected"]),
    ("GTC_1P", &["gtc1p", "globallandsurvey"]),
    ("L1TP", &["l1tp", "level1tp"]),
    ("L2SP", &["l2sp", "level2sp", "surfacereflectance"]),
];

/// Collections whose products carry a `cloudCover` attribute.
pub const CLOUD_COVER_COLLECTIONS: &[&str] = &["SENTINEL-2", "LANDSAT-5", "LANDSAT-7", "LANDSAT-8"];

const COLLECTION_PRODUCT_TYPES: &[(&str, &[&str])] = &[
    ("SENTINEL-1", &["CARD-BS", "CARD-COH6", "RAW", "SLC", "GRD", "OCN"]),
    ("SENTINEL-2", &["S2MSI1C", "S2MSI2A"]),
    (
        "SENTINEL-3",
        &[
            "EFR", "ERR", "WFR", "WRR", "LFR", "LRR", "RBT", "LST", "WST", "WCT", "FRP", "SRA",
            "SRA_A", "SRA_BS", "LAN", "LAN_HY", "LAN_SI", "LAN_LI", "WAT", "SYN", "VGP", "VG1",
            "VG10", "AOD",
        ],
    ),
    (
        "SENTINEL-5P",
        &[
            "L1B_RA_BD1", "L1B_RA_BD2", "L1B_RA_BD3", "L1B_RA_BD4", "L1B_RA_BD5", "L1B_RA_BD6",
            "L1B_RA_BD7", "L1B_RA_BD8", "IR_SIR", "IR_UVN", "L2__O3____", "L2__O3_TCL",
            "L2__O3__PR", "L2__NO2___", "L2__SO2___", "L2__CH4___", "L2__HCHO__", "L2__CLOUD_",
            "L2__AER_AI", "L2__AER_LH",
        ],
    ),
    ("LANDSAT-5", &["L1G", "L1T"]),
    ("LANDSAT-7", &["L1G", "L1T", "L1GT", "GTC_1P"]),
    ("LANDSAT-8", &["L1T", "L1GT", "L1TP", "L2SP"]),
];

// Homogenized alias (and homogenized canonical token) -> canonical token.
fn build_lookup(table: &'static [(&'static str, &'static [&'static str])]) -> HashMap<String, &'static str> {
    let mut lookup = HashMap::new();
    for (canonical, aliases) in table {
        lookup.insert(homogenize(canonical), *canonical);
        for alias in aliases.iter() {
            let previous = lookup.insert(homogenize(alias), *canonical);
            debug_assert!(
                previous.is_none() || previous == Some(*canonical),
                "alias '{alias}' maps to both {previous:?} and {canonical}"
            );
        }
    }
    lookup
}

lazy_static! {
    static ref COLLECTIONS: HashMap<String, &'static str> = build_lookup(COLLECTION_ALIASES);
    static ref PRODUCT_TYPES: HashMap<String, &'static str> = build_lookup(PRODUCT_TYPE_ALIASES);
}

fn resolve(lookup: &HashMap<String, &'static str>, kind: NameKind, name: &str) -> Result<CanonicalName> {
    lookup
        .get(&homogenize(name))
        .map(|canonical| CanonicalName(*canonical))
        .ok_or_else(|| QueryError::UnrecognizedName { kind, name: name.to_string() })
}

pub fn resolve_collection(name: &str) -> Result<CanonicalName> {
    resolve(&COLLECTIONS, NameKind::Collection, name)
}

pub fn resolve_product_type(name: &str) -> Result<CanonicalName> {
    resolve(&PRODUCT_TYPES, NameKind::ProductType, name)
}

pub fn supports_cloud_cover(collection: CanonicalName) -> bool {
    CLOUD_COVER_COLLECTIONS.contains(&collection.as_str())
}

/// Product types published under `collection`, or `None` when the collection is not tabulated.
pub fn product_types_of(collection: CanonicalName) -> Option<&'static [&'static str]> {
    COLLECTION_PRODUCT_TYPES
        .iter()
        .find(|(c, _)| *c == collection.as_str())
        .map(|(_, types)| *types)
}

/// All canonical collection tokens, in table order.
pub fn collections() -> impl Iterator<Item = CanonicalName> {
    COLLECTION_ALIASES.iter().map(|(c, _)| CanonicalName(*c))
}

/// All canonical product type tokens, in table order.
pub fn product_types() -> impl Iterator<Item = CanonicalName> {
    PRODUCT_TYPE_ALIASES.iter().map(|(c, _)| CanonicalName(*c))
}
