use copernicus_odata::alias::{
    self, collections, homogenize, product_types, product_types_of, resolve_collection, resolve_product_type,
    supports_cloud_cover,
};
use copernicus_odata::error::{NameKind, QueryError};

fn product_type(name: &str) -> &'static str {
    resolve_product_type(name).expect("known product type").as_str()
}

fn collection(name: &str) -> &'static str {
    resolve_collection(name).expect("known collection").as_str()
}

#[test]
fn homogenize_strips_case_whitespace_and_separators() {
    assert_eq!(homogenize(" Level-2_A "), "level2a");
    assert_eq!(homogenize("S2MSI2A"), "s2msi2a");
    assert_eq!(homogenize("L2__O3____"), "l2o3");
}

#[test]
fn sentinel2_product_type_spellings() {
    for name in ["L2A", "l2a", "Level-2A", "level 2a", "LEVEL_2A", "MSIL2A", "msi-l2a", "S2MSI2A", "boa"] {
        assert_eq!(product_type(name), "S2MSI2A", "spelling '{name}'");
    }
    for name in ["L1C", "level1c", "Level-1C", "MSI L1C", "S2MSI1C", "toa"] {
        assert_eq!(product_type(name), "S2MSI1C", "spelling '{name}'");
    }
}

#[test]
fn other_mission_product_type_spellings() {
    assert_eq!(product_type("grd"), "GRD");
    assert_eq!(product_type("Ground Range Detected"), "GRD");
    assert_eq!(product_type("slc"), "SLC");
    assert_eq!(product_type("CARD_BS"), "CARD-BS");
    assert_eq!(product_type("OL_1_EFR"), "EFR");
    assert_eq!(product_type("olci efr"), "EFR");
    assert_eq!(product_type("SR_2_LAN_HY"), "LAN_HY");
    assert_eq!(product_type("sra-bs"), "SRA_BS");
    assert_eq!(product_type("o3"), "L2__O3____");
    assert_eq!(product_type("L2__NO2___"), "L2__NO2___");
    assert_eq!(product_type("no2"), "L2__NO2___");
    assert_eq!(product_type("L1B_RA_BD3"), "L1B_RA_BD3");
    assert_eq!(product_type("level-1tp"), "L1TP");
}

#[test]
fn collection_spellings() {
    for name in ["sentinel-2", "Sentinel 2", "SENTINEL_2", "s2", "S-2"] {
        assert_eq!(collection(name), "SENTINEL-2", "spelling '{name}'");
    }
    assert_eq!(collection("Sentinel-5P"), "SENTINEL-5P");
    assert_eq!(collection("s5p"), "SENTINEL-5P");
    assert_eq!(collection("landsat_8"), "LANDSAT-8");
    assert_eq!(collection("L5"), "LANDSAT-5");
    assert_eq!(collection("cop dem"), "COP-DEM");
    assert_eq!(collection("s1 rtc"), "SENTINEL-1-RTC");
}

#[test]
fn every_canonical_token_resolves_to_itself() {
    for canonical in collections() {
        assert_eq!(resolve_collection(canonical.as_str()).expect("canonical collection"), canonical);
        assert_eq!(resolve_collection(&canonical.as_str().to_lowercase()).expect("lower case"), canonical);
    }
    for canonical in product_types() {
        assert_eq!(resolve_product_type(canonical.as_str()).expect("canonical product type"), canonical);
    }
}

#[test]
fn unrecognized_names_fail_without_guessing() {
    for name in ["sentinel-9", "", "   ", "sentinel"] {
        match resolve_collection(name) {
            Err(QueryError::UnrecognizedName { kind, name: echoed }) => {
                assert_eq!(kind, NameKind::Collection);
                assert_eq!(echoed, name, "error carries the input as given");
            }
            other => panic!("'{name}' should not resolve, got {other:?}"),
        }
    }
    // neighbours of real aliases must not match
    for name in ["l1cp", "l2ap", "grdh", "level3"] {
        assert!(
            matches!(resolve_product_type(name), Err(QueryError::UnrecognizedName { kind: NameKind::ProductType, .. })),
            "'{name}' should not resolve"
        );
    }
}

#[test]
fn cloud_cover_support_and_product_type_tables() {
    let s2 = resolve_collection("s2").unwrap();
    let s1 = resolve_collection("s1").unwrap();
    let l8 = resolve_collection("landsat 8").unwrap();
    let dem = resolve_collection("dem").unwrap();
    assert!(supports_cloud_cover(s2));
    assert!(supports_cloud_cover(l8));
    assert!(!supports_cloud_cover(s1));
    assert_eq!(product_types_of(s2), Some(&["S2MSI1C", "S2MSI2A"][..]));
    assert!(product_types_of(s1).unwrap().contains(&"GRD"));
    assert!(product_types_of(dem).is_none(), "untabulated collections are not checked");
    assert_eq!(alias::CLOUD_COVER_COLLECTIONS.len(), 4);
}
