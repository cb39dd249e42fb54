//! Queries against the public Copernicus Data Space catalogue.
//!
//! These need network access and depend on the catalogue's contents, so they are ignored by
//! default. Run them with `cargo test --test live_catalog -- --ignored`.

use geo_types::Point;

use copernicus_odata::executor::FetchOptions;
use copernicus_odata::timestamp::TimeInput;
use copernicus_odata::{CatalogQuery, EngineSettings};

fn live() -> CatalogQuery {
    CatalogQuery::new(EngineSettings::default()).expect("http client")
}

#[test]
#[ignore]
fn sentinel2_point_query() {
    let mut query = live();
    query
        .filters_mut()
        .set_collection("sentinel-2")
        .unwrap()
        .set_product_type("l2a")
        .unwrap()
        .set_aoi(Point::new(11.576124, 48.137154), None)
        .unwrap()
        .set_sensing_start_date(
            chrono::NaiveDate::from_ymd_opt(2023, 7, 5).unwrap(),
            TimeInput::from("2023-10-28T19:33:12.021Z"),
        )
        .unwrap()
        .set_cloud_cover(35)
        .unwrap();
    let result = query.send_query(&FetchOptions::default()).unwrap();
    assert_eq!(result.table.len(), 9);
    assert!(result.aoi_coverage >= 1.0);
    assert!(result.table.null_fraction() <= 0.04, "{}", result.table.null_fraction());
}

#[test]
#[ignore]
fn name_query_drops_malformed_names() {
    let names: Vec<String> = [
        "S2B_MSIL1C_20230101T102339_N0509_R065_T32UNU_20230101T105601.SAFE",
        "S1A_IW_GRDH_1SDV_20240208T053520_20240208T053545_052463_065842_F89D.SAFE",
        "S1A_IW_GRDH_1SDV_20240208T053520_20240208T053545_052463_065842_F89D-.SAFE",
        "S3A_OL_2_WFR____20190228T092807_20190228T093107_20190301T190540_0179_042_036_2160_MAR_O_NT_002.SEN3",
    ]
    .iter()
    .map(|name| name.to_string())
    .collect();

    let mut query = live();
    let result = query.query_by_name(&names).unwrap();
    assert_eq!(result.table.len(), 3);
    assert!(result.table.iter().all(|row| !row.name.ends_with("-.SAFE")));
}

#[test]
#[ignore]
fn cloud_cover_range_query() {
    let mut query = live();
    query
        .filters_mut()
        .set_collection("s2")
        .unwrap()
        .set_product_type("level1c")
        .unwrap()
        .set_aoi(Point::new(11.576124, 48.137154), None)
        .unwrap()
        .set_sensing_end_date(
            TimeInput::from("2020-05-01T03:24:33.998Z"),
            TimeInput::from("2020-08-11T22:00:11.633Z"),
        )
        .unwrap()
        .set_cloud_cover((10, 22))
        .unwrap();
    let result = query.send_query(&FetchOptions::default()).unwrap();
    assert_eq!(result.table.len(), 4);
    for row in &result.table {
        let cover = row.cloud_cover.expect("sentinel-2 products carry cloud cover");
        assert!((10.0..=22.0).contains(&cover), "{cover}");
    }
}
