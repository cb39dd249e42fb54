mod common;

use std::sync::Arc;

use geo_types::{Geometry, Point};
use serde_json::json;

use common::{planar, product, s2_name, square_wkt};
use copernicus_odata::enrich::{RawProductRecord, ResultEnricher};
use copernicus_odata::error::QueryError;
use copernicus_odata::geometry::{parse_wkt, GeoEngine};
use copernicus_odata::tile::group_tile_id;

fn enricher() -> ResultEnricher {
    ResultEnricher::new(planar())
}

fn aoi(x0: f64, y0: f64, x1: f64, y1: f64) -> Geometry<f64> {
    parse_wkt(&square_wkt(x0, y0, x1, y1)).unwrap()
}

#[test]
fn rows_carry_upstream_and_derived_fields() {
    let records = vec![product("p-1", &s2_name(1), Some(&square_wkt(0.0, 0.0, 1.0, 1.0)))];
    let enrichment = enricher().enrich(&records, None).unwrap();
    let row = &enrichment.table.rows()[0];

    assert_eq!(row.id, "p-1");
    assert_eq!(row.checksum_md5.as_deref(), Some("0123456789abcdef"));
    assert_eq!(row.checksum_blake3.as_deref(), Some("fedcba9876543210"));
    assert_eq!(row.file_size, Some(1024.0));
    assert_eq!(row.cloud_cover, Some(12.5));
    assert_eq!(row.product_type.as_deref(), Some("S2MSI2A"));
    assert_eq!(row.online, Some(true));
    assert_eq!(row.group_tile_id.as_deref(), Some("R008_T32UNE"));
    assert_eq!(
        row.download_url,
        "https://zipper.dataspace.copernicus.eu/odata/v1/Products(p-1)/$value"
    );
    let centroid = row.centroid.unwrap();
    assert!((centroid.x() - 0.5).abs() < 1e-12 && (centroid.y() - 0.5).abs() < 1e-12);
    assert!((row.footprint_size.unwrap() - 1e-6).abs() < 1e-12);
    assert_eq!(
        row.sensing_start_date.map(|d| d.to_rfc3339()),
        Some("2023-07-06T10:36:31+00:00".to_string())
    );
    assert_eq!(row.aoi_coverage, 0.0);
    assert_eq!(enrichment.aoi_coverage, 0.0, "no AOI, no coverage");
}

#[test]
fn duplicate_ids_are_dropped() {
    let name = s2_name(1);
    let records = vec![product("p-1", &name, None), product("p-2", &s2_name(2), None), product("p-1", &name, None)];
    let table = enricher().enrich(&records, None).unwrap().table;
    assert_eq!(table.len(), 2);
    let ids: Vec<&str> = table.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["p-1", "p-2"]);
}

#[test]
fn missing_fields_become_nulls() {
    let sparse = json!({"Id": "x", "Name": "LC08_L1TP_195028_20230706_20230717_02_T1"});
    let table = enricher().enrich(&[sparse], None).unwrap().table;
    let row = &table.rows()[0];
    assert!(row.geometry.is_none() && row.centroid.is_none() && row.footprint_size.is_none());
    assert!(row.cloud_cover.is_none() && row.checksum_md5.is_none() && row.file_size.is_none());
    assert!(row.group_tile_id.is_none());
    assert_eq!(table.column("cloud_cover"), Some(vec![None]));
    assert!(table.column("no_such_column").is_none());
    assert!(table.null_fraction() > 0.5);
}

#[test]
fn unreadable_footprints_only_lose_the_geometry() {
    let mut record = product("p-1", &s2_name(1), None);
    record["Footprint"] = json!("geography'SRID=4326;POLYGON ((0 0, 1'");
    let table = enricher().enrich(&[record], None).unwrap().table;
    assert!(table.rows()[0].geometry.is_none());
    assert_eq!(table.rows()[0].cloud_cover, Some(12.5));
}

#[test]
fn self_intersecting_footprints_are_repaired() {
    let bowtie = "POLYGON ((0 0, 1 1, 1 0, 0 1, 0 0))";
    let records = vec![product("p-1", &s2_name(1), Some(bowtie))];
    let enrichment = enricher().enrich(&records, Some(&aoi(0.0, 0.0, 1.0, 1.0))).unwrap();
    let row = &enrichment.table.rows()[0];

    // the two lobes cancel out in the raw ring's signed area
    assert!((row.footprint_size.unwrap() - 0.5e-6).abs() < 1e-12, "{:?}", row.footprint_size);
    assert!((row.aoi_coverage - 0.5).abs() < 1e-9);
    assert!((enrichment.aoi_coverage - 0.5).abs() < 1e-9);
    assert_ne!(row.geometry, Some(parse_wkt(bowtie).unwrap()), "the repaired outline is kept");
}

#[test]
fn valid_footprints_are_kept_as_received() {
    let records = vec![product("p-1", &s2_name(1), Some(&square_wkt(0.0, 0.0, 1.0, 1.0)))];
    let row = enricher().enrich(&records, None).unwrap().table.rows()[0].clone();
    assert_eq!(row.geometry, Some(aoi(0.0, 0.0, 1.0, 1.0)));
}

#[test]
fn records_without_an_id_are_malformed() {
    let result = enricher().enrich(&[json!({"Name": "nameless"})], None);
    assert!(matches!(result, Err(QueryError::MalformedResponse(_))));
    assert!(RawProductRecord::from_json(&json!([1, 2])).is_err());
}

#[test]
fn string_valued_attributes_are_read() {
    let mut record = product("p-1", &s2_name(1), None);
    record["Attributes"] = json!([{"Name": "cloudCover", "Value": "33.25"}]);
    record["Checksum"] = json!([{"Algorithm": "md5", "Value": "abc"}]);
    let parsed = RawProductRecord::from_json(&record).unwrap();
    assert_eq!(parsed.cloud_cover(), Some(33.25));
    assert_eq!(parsed.checksum("MD5").as_deref(), Some("abc"));
    assert!(parsed.product_type().is_none());
}

#[test]
fn coverage_of_a_fully_covered_aoi_is_one() {
    let records = vec![product("p-1", &s2_name(1), Some(&square_wkt(0.0, 0.0, 4.0, 4.0)))];
    let enrichment = enricher().enrich(&records, Some(&aoi(1.0, 1.0, 2.0, 2.0))).unwrap();
    assert_eq!(enrichment.aoi_coverage, 1.0);
    assert_eq!(enrichment.table.rows()[0].aoi_coverage, 1.0);
}

#[test]
fn partial_and_overlapping_footprints() {
    let records = vec![
        product("p-1", &s2_name(1), Some(&square_wkt(0.0, 0.0, 1.0, 1.0))),
        product("p-2", &s2_name(2), Some(&square_wkt(0.0, 0.0, 1.0, 2.0))),
        product("p-3", &s2_name(3), Some(&square_wkt(10.0, 10.0, 11.0, 11.0))),
    ];
    let enrichment = enricher().enrich(&records, Some(&aoi(0.0, 0.0, 2.0, 2.0))).unwrap();
    let per_row: Vec<f64> = enrichment.table.iter().map(|r| r.aoi_coverage).collect();
    assert!((per_row[0] - 0.25).abs() < 1e-9);
    assert!((per_row[1] - 0.5).abs() < 1e-9);
    assert_eq!(per_row[2], 0.0);
    // p-1 lies inside p-2, the union covers half of the AOI
    assert!((enrichment.aoi_coverage - 0.5).abs() < 1e-9, "{}", enrichment.aoi_coverage);
}

#[test]
fn coverage_never_exceeds_one() {
    let records: Vec<_> = (0..4)
        .map(|i| product(&format!("p-{i}"), &s2_name(i), Some(&square_wkt(-1.0, -1.0, 3.0, 3.0))))
        .collect();
    let enrichment = enricher().enrich(&records, Some(&aoi(0.0, 0.0, 2.0, 2.0))).unwrap();
    assert_eq!(enrichment.aoi_coverage, 1.0);
}

#[test]
fn point_aoi_is_hit_or_miss() {
    let records = vec![product("p-1", &s2_name(1), Some(&square_wkt(0.0, 0.0, 1.0, 1.0)))];
    let inside = Geometry::Point(Point::new(0.5, 0.5));
    let outside = Geometry::Point(Point::new(5.0, 5.0));
    assert_eq!(enricher().enrich(&records, Some(&inside)).unwrap().aoi_coverage, 1.0);
    assert_eq!(enricher().enrich(&records, Some(&outside)).unwrap().aoi_coverage, 0.0);
}

#[test]
fn empty_results_have_zero_coverage() {
    let enrichment = enricher().enrich(&[], Some(&aoi(0.0, 0.0, 1.0, 1.0))).unwrap();
    assert!(enrichment.table.is_empty());
    assert_eq!(enrichment.aoi_coverage, 0.0);
}

#[test]
fn coverage_in_a_projected_system() {
    let engine = Arc::new(GeoEngine);
    let enricher = ResultEnricher::new(engine).with_area_epsg(3857);
    let records = vec![product("p-1", &s2_name(1), Some(&square_wkt(10.0, 50.0, 11.0, 51.0)))];
    let enrichment = enricher.enrich(&records, Some(&aoi(10.0, 50.0, 10.5, 51.0))).unwrap();
    assert_eq!(enrichment.aoi_coverage, 1.0);
    let size = enrichment.table.rows()[0].footprint_size.unwrap();
    // one square degree at 50N is roughly 111 km x 173 km in web mercator
    assert!(size > 15_000.0 && size < 25_000.0, "{size}");
}

#[test]
fn download_url_template_is_configurable() {
    let enricher = enricher().with_download_url_template("https://mirror.test/{id}.zip");
    assert_eq!(enricher.download_url("abc"), "https://mirror.test/abc.zip");
}

#[test]
fn table_summaries() {
    let mut offline = product("p-2", &s2_name(2), None);
    offline["Online"] = json!(false);
    let records = vec![product("p-1", &s2_name(1), None), offline];
    let table = enricher().enrich(&records, None).unwrap().table;
    assert_eq!(table.total_size_gb(), 2.0);
    assert_eq!(table.online_fraction(), 0.5);
    assert!(table.get(&s2_name(2)).is_some());
    let json = serde_json::to_value(&table).unwrap();
    assert_eq!(json.as_array().map(Vec::len), Some(2));
}

#[test]
fn tile_ids_per_mission() {
    assert_eq!(
        group_tile_id("S1A_IW_GRDH_1SDV_20230706T052315_20230706T052340_049299_05EDA8_6E2A.SAFE").as_deref(),
        Some("05EDA8")
    );
    assert_eq!(
        group_tile_id("S2B_MSIL1C_20230706T103629_N0509_R008_T32UNE_20230706T124011.SAFE").as_deref(),
        Some("R008_T32UNE")
    );
    assert_eq!(
        group_tile_id(
            "S3A_OL_1_EFR____20230706T095424_20230706T095724_20230707T103426_0179_101_022_2160_PS1_O_NT_003.SEN3"
        )
        .as_deref(),
        Some("0179_101")
    );
    assert_eq!(
        group_tile_id("S3A_SY_2_SYN____20230706T095424_20230706T095724_20230707T103426_0179_101_022_2160_PS1_O_NT_002.SEN3"),
        None
    );
    assert_eq!(
        group_tile_id("S5P_OFFL_L2__NO2____20230706T110258_20230706T124428_29605_03_020500_20230708T031230.nc")
            .as_deref(),
        Some("29605")
    );
    assert_eq!(group_tile_id("LC08_L1TP_195028_20230706_20230717_02_T1"), None);
    assert_eq!(group_tile_id("S2A_short"), None);
}
