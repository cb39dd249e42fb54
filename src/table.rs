//! The enriched product table handed back to callers.

use chrono::{DateTime, Utc};
use geo_types::{Geometry, Point};
use serde::{Serialize, Serializer};
use wkt::ToWkt;

/// One product with its upstream fields and derived columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedProductRow {
    pub id: String,
    pub name: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub online: Option<bool>,
    pub s3_path: Option<String>,
    pub origin_date: Option<DateTime<Utc>>,
    pub publication_date: Option<DateTime<Utc>>,
    pub sensing_start_date: Option<DateTime<Utc>>,
    pub sensing_end_date: Option<DateTime<Utc>>,
    pub product_type: Option<String>,
    pub cloud_cover: Option<f64>,
    pub checksum_md5: Option<String>,
    pub checksum_blake3: Option<String>,
    /// Megabytes (2^20 bytes).
    pub file_size: Option<f64>,
    pub download_url: String,
    #[serde(serialize_with = "geometry_as_wkt")]
    pub geometry: Option<Geometry<f64>>,
    #[serde(serialize_with = "point_as_wkt")]
    pub centroid: Option<Point<f64>>,
    /// Square kilometres in the equal-area system.
    pub footprint_size: Option<f64>,
    /// Share of the AOI covered by this footprint, 0 without an AOI.
    pub aoi_coverage: f64,
    pub group_tile_id: Option<String>,
}

pub const COLUMNS: &[&str] = &[
    "id",
    "name",
    "content_type",
    "content_length",
    "online",
    "s3_path",
    "origin_date",
    "publication_date",
    "sensing_start_date",
    "sensing_end_date",
    "product_type",
    "cloud_cover",
    "checksum_md5",
    "checksum_blake3",
    "file_size",
    "download_url",
    "geometry",
    "centroid",
    "footprint_size",
    "aoi_coverage",
    "group_tile_id",
];

fn geometry_as_wkt<S: Serializer>(geometry: &Option<Geometry<f64>>, s: S) -> Result<S::Ok, S::Error> {
    match geometry {
        Some(g) => s.serialize_some(&g.wkt_string()),
        None => s.serialize_none(),
    }
}

fn point_as_wkt<S: Serializer>(point: &Option<Point<f64>>, s: S) -> Result<S::Ok, S::Error> {
    match point {
        Some(p) => s.serialize_some(&p.wkt_string()),
        None => s.serialize_none(),
    }
}

fn date_cell(date: &Option<DateTime<Utc>>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%dT%H:%M:%S").to_string())
}

impl EnrichedProductRow {
    /// Cell values in [`COLUMNS`] order; `None` is a null cell.
    pub fn cells(&self) -> Vec<Option<String>> {
        vec![
            Some(self.id.clone()),
            Some(self.name.clone()),
            self.content_type.clone(),
            self.content_length.map(|v| v.to_string()),
            self.online.map(|v| v.to_string()),
            self.s3_path.clone(),
            date_cell(&self.origin_date),
            date_cell(&self.publication_date),
            date_cell(&self.sensing_start_date),
            date_cell(&self.sensing_end_date),
            self.product_type.clone(),
            self.cloud_cover.map(|v| v.to_string()),
            self.checksum_md5.clone(),
            self.checksum_blake3.clone(),
            self.file_size.map(|v| format!("{:.3}", v)),
            Some(self.download_url.clone()),
            self.geometry.as_ref().map(|g| g.wkt_string()),
            self.centroid.as_ref().map(|p| p.wkt_string()),
            self.footprint_size.map(|v| format!("{:.3}", v)),
            Some(self.aoi_coverage.to_string()),
            self.group_tile_id.clone(),
        ]
    }
}

/// Rows in catalogue order, one per distinct product id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ProductTable {
    rows: Vec<EnrichedProductRow>,
}

impl ProductTable {
    pub fn new(rows: Vec<EnrichedProductRow>) -> Self {
        ProductTable { rows }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        COLUMNS
    }

    pub fn rows(&self) -> &[EnrichedProductRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnrichedProductRow> {
        self.rows.iter()
    }

    pub fn get(&self, name: &str) -> Option<&EnrichedProductRow> {
        self.rows.iter().find(|row| row.name == name)
    }

    /// All values of one column, or `None` for an unknown column name.
    pub fn column(&self, column: &str) -> Option<Vec<Option<String>>> {
        let index = COLUMNS.iter().position(|c| *c == column)?;
        Some(self.rows.iter().map(|row| row.cells().swap_remove(index)).collect())
    }

    /// Share of null cells over the whole table, 0 for an empty table.
    pub fn null_fraction(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let nulls: usize = self
            .rows
            .iter()
            .map(|row| row.cells().iter().filter(|c| c.is_none()).count())
            .sum();
        nulls as f64 / (self.rows.len() * COLUMNS.len()) as f64
    }

    pub fn sorted_by_name(&self) -> ProductTable {
        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        ProductTable { rows }
    }

    pub fn total_size_gb(&self) -> f64 {
        self.rows.iter().filter_map(|row| row.file_size).sum::<f64>() / 1024.0
    }

    pub fn online_fraction(&self) -> f64 {
        if self.rows.is_empty() {
            return 0.0;
        }
        let online = self.rows.iter().filter(|row| row.online == Some(true)).count();
        online as f64 / self.rows.len() as f64
    }
}

impl<'a> IntoIterator for &'a ProductTable {
    type Item = &'a EnrichedProductRow;
    type IntoIter = std::slice::Iter<'a, EnrichedProductRow>;
    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
