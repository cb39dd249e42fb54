//! Result enricher: raw catalogue records in, product table and aggregate AOI coverage out.

use std::collections::HashSet;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

// used for footprint area, centroids and AOI overlap
use geo::{Area, BooleanOps, Centroid, Intersects};
use geo_types::{Geometry, MultiPolygon};
// we will use a fast hashing algo for the product id set
use seahash::SeaHasher;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{QueryError, Result};
use crate::geometry::{self, GeometryEngine, EQUAL_AREA_EPSG, WGS84_EPSG};
use crate::table::{EnrichedProductRow, ProductTable};
use crate::tile;
use crate::timestamp::parse_response_date;

pub type IdHasher = BuildHasherDefault<SeaHasher>;

pub const DEFAULT_DOWNLOAD_URL_TEMPLATE: &str =
    "https://zipper.dataspace.copernicus.eu/odata/v1/Products({id})/$value";
const COVERAGE_DECIMALS: i32 = 5;

// ------------- Raw records -------------

/// One product as the catalogue returns it. Everything except id and name may be missing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawProductRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub origin_date: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub online: Option<bool>,
    #[serde(default, rename = "S3Path")]
    pub s3_path: Option<String>,
    #[serde(default)]
    pub footprint: Option<String>,
    #[serde(default)]
    pub content_date: Option<ContentDate>,
    #[serde(default)]
    pub checksum: Option<Vec<ChecksumEntry>>,
    #[serde(default)]
    pub attributes: Option<Vec<AttributeEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContentDate {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChecksumEntry {
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl RawProductRecord {
    pub fn from_json(value: &Value) -> Result<Self> {
        RawProductRecord::deserialize(value)
            .map_err(|e| QueryError::MalformedResponse(format!("undecodable product record: {}", e)))
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes
            .as_deref()?
            .iter()
            .find(|a| a.name.as_deref() == Some(name))
            .and_then(|a| a.value.as_ref())
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        match self.attribute("cloudCover")? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn product_type(&self) -> Option<String> {
        match self.attribute("productType")? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// First checksum of the given algorithm, compared case-insensitively.
    pub fn checksum(&self, algorithm: &str) -> Option<String> {
        self.checksum
            .as_deref()?
            .iter()
            .find(|c| c.algorithm.as_deref().is_some_and(|a| a.eq_ignore_ascii_case(algorithm)))
            .and_then(|c| c.value.clone())
    }

    pub fn file_size_mb(&self) -> Option<f64> {
        self.content_length.map(|bytes| bytes as f64 / 1024.0 / 1024.0)
    }
}

// ------------- Enrichment -------------

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enrichment {
    pub table: ProductTable,
    pub aoi_coverage: f64,
}

/// The AOI in both reference systems, ready for overlap tests.
struct ProjectedAoi {
    geographic: Geometry<f64>,
    projected: Geometry<f64>,
    area: f64,
}

impl ProjectedAoi {
    /// Points and zero-area polygons only support hit-or-miss coverage.
    fn is_areal(&self) -> bool {
        self.area > 0.0
    }

    fn covered_fraction(&self, footprint: &MultiPolygon<f64>) -> f64 {
        match geometry::to_multipolygon(&self.projected) {
            Some(aoi) if self.is_areal() => {
                (aoi.intersection(footprint).unsigned_area() / self.area).clamp(0.0, 1.0)
            }
            _ => {
                if footprint.intersects(&self.projected) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct ResultEnricher {
    engine: Arc<dyn GeometryEngine>,
    area_epsg: u16,
    download_url_template: String,
}

impl ResultEnricher {
    pub fn new(engine: Arc<dyn GeometryEngine>) -> Self {
        ResultEnricher {
            engine,
            area_epsg: EQUAL_AREA_EPSG,
            download_url_template: DEFAULT_DOWNLOAD_URL_TEMPLATE.to_string(),
        }
    }

    pub fn with_area_epsg(mut self, epsg: u16) -> Self {
        self.area_epsg = epsg;
        self
    }

    pub fn with_download_url_template(mut self, template: impl Into<String>) -> Self {
        self.download_url_template = template.into();
        self
    }

    pub fn download_url(&self, id: &str) -> String {
        self.download_url_template.replace("{id}", id)
    }

    /// Builds one row per distinct product id. `aoi` is expected in WGS84.
    ///
    /// The aggregate coverage is the area of the union of all footprints inside the AOI over
    /// the AOI area, so overlapping products are not counted twice.
    pub fn enrich(&self, records: &[Value], aoi: Option<&Geometry<f64>>) -> Result<Enrichment> {
        let aoi = match aoi {
            Some(geographic) => {
                let projected = self.engine.reproject(geographic, WGS84_EPSG, self.area_epsg)?;
                let area = projected.unsigned_area();
                Some(ProjectedAoi { geographic: geographic.clone(), projected, area })
            }
            None => None,
        };

        let mut seen: HashSet<String, IdHasher> = HashSet::with_hasher(IdHasher::default());
        let mut rows = Vec::with_capacity(records.len());
        let mut footprints = Vec::with_capacity(records.len());
        for value in records {
            let record = RawProductRecord::from_json(value)?;
            if !seen.insert(record.id.clone()) {
                debug!(id = %record.id, name = %record.name, "dropping duplicate product");
                continue;
            }
            let (row, projected) = self.enrich_record(record, aoi.as_ref())?;
            if let Some(footprint) = projected {
                footprints.push(Geometry::MultiPolygon(footprint));
            }
            rows.push(row);
        }

        let aoi_coverage = match &aoi {
            Some(aoi) if !rows.is_empty() => self.aggregate_coverage(aoi, &rows, &footprints)?,
            _ => 0.0,
        };
        Ok(Enrichment { table: ProductTable::new(rows), aoi_coverage })
    }

    fn enrich_record(
        &self,
        record: RawProductRecord,
        aoi: Option<&ProjectedAoi>,
    ) -> Result<(EnrichedProductRow, Option<MultiPolygon<f64>>)> {
        let geometry = match record.footprint.as_deref() {
            Some(footprint) => match geometry::parse_footprint(footprint) {
                Ok(g) => {
                    let (g, repaired) = geometry::repair_footprint(g);
                    if repaired {
                        warn!(name = %record.name, "invalid footprint, using its repaired outline");
                    }
                    Some(g)
                }
                Err(e) => {
                    warn!(name = %record.name, error = %e, "unreadable footprint, leaving geometry empty");
                    None
                }
            },
            None => None,
        };
        let centroid = geometry.as_ref().and_then(|g| g.centroid());
        let projected = match &geometry {
            Some(g) => Some(self.engine.reproject(g, WGS84_EPSG, self.area_epsg)?),
            None => None,
        };
        let projected_areal = projected.as_ref().and_then(geometry::to_multipolygon);
        let footprint_size = projected.as_ref().map(|p| p.unsigned_area() / 1e6);
        let aoi_coverage = match (aoi, &projected_areal) {
            (Some(aoi), Some(footprint)) => aoi.covered_fraction(footprint),
            (Some(aoi), None) => match &geometry {
                Some(g) if g.intersects(&aoi.geographic) && !aoi.is_areal() => 1.0,
                _ => 0.0,
            },
            (None, _) => 0.0,
        };

        let row = EnrichedProductRow {
            cloud_cover: record.cloud_cover(),
            product_type: record.product_type(),
            checksum_md5: record.checksum("MD5"),
            checksum_blake3: record.checksum("BLAKE3"),
            file_size: record.file_size_mb(),
            download_url: self.download_url(&record.id),
            group_tile_id: tile::group_tile_id(&record.name),
            origin_date: record.origin_date.as_deref().and_then(parse_response_date),
            publication_date: record.publication_date.as_deref().and_then(parse_response_date),
            sensing_start_date: record
                .content_date
                .as_ref()
                .and_then(|d| d.start.as_deref())
                .and_then(parse_response_date),
            sensing_end_date: record
                .content_date
                .as_ref()
                .and_then(|d| d.end.as_deref())
                .and_then(parse_response_date),
            geometry,
            centroid,
            footprint_size,
            aoi_coverage,
            id: record.id,
            name: record.name,
            content_type: record.content_type,
            content_length: record.content_length,
            online: record.online,
            s3_path: record.s3_path,
        };
        Ok((row, projected_areal))
    }

    fn aggregate_coverage(
        &self,
        aoi: &ProjectedAoi,
        rows: &[EnrichedProductRow],
        footprints: &[Geometry<f64>],
    ) -> Result<f64> {
        if !aoi.is_areal() {
            let hit = rows.iter().any(|row| row.aoi_coverage > 0.0);
            return Ok(if hit { 1.0 } else { 0.0 });
        }
        if footprints.is_empty() {
            return Ok(0.0);
        }
        let union = self.engine.union(footprints)?;
        let union = geometry::to_multipolygon(&union).unwrap_or_else(|| MultiPolygon::new(Vec::new()));
        let coverage = aoi.covered_fraction(&union);
        let scale = 10f64.powi(COVERAGE_DECIMALS);
        Ok((coverage * scale).round() / scale)
    }
}
