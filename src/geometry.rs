//! Geometry adapter.
//!
//! Turns whatever the caller hands in as an area of interest into one query-ready geometry:
//! a lone point or polygon passes through, everything else is merged into a (multi)polygon.
//! The vector primitives themselves sit behind [`GeometryEngine`] so the rest of the crate
//! never talks to `geo` or `proj4rs` directly. [`GeoEngine`] is the default implementation.

use std::str::FromStr;

// used for vector operations on footprints and areas of interest
use geo::{Area, BooleanOps, ConvexHull, MapCoords};
use geo_types::{Coord, Geometry, LineString, MultiPoint, MultiPolygon, Point, Polygon};

use crate::error::{QueryError, Result};

/// Geographic reference system of the catalogue (WGS84 lon/lat).
pub const WGS84_EPSG: u16 = 4326;
/// WGS 84 / NSIDC EASE-Grid 2.0 Global, a cylindrical equal-area system.
pub const EQUAL_AREA_EPSG: u16 = 6933;
pub const DEFAULT_DECIMALS: u32 = 6;
/// Beyond this an f64 carries no further decimal digits.
pub const MAX_DECIMALS: u32 = 15;
/// AOI clauses longer than this risk exceeding the catalogue's URL limit.
pub const LONG_WKT_WARNING: usize = 2000;
// relative area change below which a rebuilt footprint counts as unchanged
const REPAIR_TOLERANCE: f64 = 1e-9;

/// The reprojection and union capabilities the crate depends on.
pub trait GeometryEngine: Send + Sync {
    fn reproject(&self, geometry: &Geometry<f64>, source_epsg: u16, target_epsg: u16) -> Result<Geometry<f64>>;
    /// Dissolves areal geometries into one polygon or multipolygon.
    fn union(&self, geometries: &[Geometry<f64>]) -> Result<Geometry<f64>>;
}

/// `geo` boolean operations plus `proj4rs` reprojection with EPSG definitions from
/// `crs-definitions`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoEngine;

impl GeometryEngine for GeoEngine {
    fn reproject(&self, geometry: &Geometry<f64>, source_epsg: u16, target_epsg: u16) -> Result<Geometry<f64>> {
        if source_epsg == target_epsg {
            return Ok(geometry.clone());
        }
        let (source_proj, source_geographic) = load_projection(source_epsg)?;
        let (target_proj, target_geographic) = load_projection(target_epsg)?;
        let source_proj = &source_proj;
        let target_proj = &target_proj;
        geometry.try_map_coords(|c: Coord<f64>| {
            // proj4rs uses radians for geographic coordinates
            let mut point = if source_geographic {
                (c.x.to_radians(), c.y.to_radians(), 0.0)
            } else {
                (c.x, c.y, 0.0)
            };
            proj4rs::transform::transform(source_proj, target_proj, &mut point).map_err(|e| {
                QueryError::Geometry(format!(
                    "transform from EPSG:{source_epsg} to EPSG:{target_epsg} failed: {e:?}"
                ))
            })?;
            Ok(if target_geographic {
                Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
            } else {
                Coord { x: point.0, y: point.1 }
            })
        })
    }

    fn union(&self, geometries: &[Geometry<f64>]) -> Result<Geometry<f64>> {
        if geometries.is_empty() {
            return Err(QueryError::Geometry("nothing to union".to_string()));
        }
        let mut merged = MultiPolygon::<f64>::new(Vec::new());
        for geometry in geometries {
            let areal = to_multipolygon(geometry).ok_or_else(|| {
                QueryError::Geometry(format!("cannot union a {}", geometry_kind(geometry)))
            })?;
            merged = merged.union(&areal);
        }
        Ok(collapse(merged))
    }
}

fn load_projection(epsg: u16) -> Result<(proj4rs::proj::Proj, bool)> {
    let definition = crs_definitions::from_code(epsg)
        .ok_or_else(|| QueryError::Geometry(format!("EPSG:{epsg} is not in the crs-definitions database")))?;
    let proj = proj4rs::proj::Proj::from_proj_string(definition.proj4)
        .map_err(|e| QueryError::Geometry(format!("invalid projection EPSG:{epsg}: {e:?}")))?;
    Ok((proj, definition.proj4.contains("+proj=longlat")))
}

// ------------- AOI input -------------

/// One geometry or a list of them, as accepted by the AOI filter.
#[derive(Debug, Clone, PartialEq)]
pub enum AoiInput {
    Single(Geometry<f64>),
    Many(Vec<Geometry<f64>>),
}

impl From<Geometry<f64>> for AoiInput {
    fn from(geometry: Geometry<f64>) -> Self {
        AoiInput::Single(geometry)
    }
}
impl From<Point<f64>> for AoiInput {
    fn from(point: Point<f64>) -> Self {
        AoiInput::Single(Geometry::Point(point))
    }
}
impl From<Polygon<f64>> for AoiInput {
    fn from(polygon: Polygon<f64>) -> Self {
        AoiInput::Single(Geometry::Polygon(polygon))
    }
}
impl From<MultiPolygon<f64>> for AoiInput {
    fn from(multi: MultiPolygon<f64>) -> Self {
        AoiInput::Single(Geometry::MultiPolygon(multi))
    }
}
impl From<Vec<Geometry<f64>>> for AoiInput {
    fn from(list: Vec<Geometry<f64>>) -> Self {
        AoiInput::Many(list)
    }
}

/// Merges the input into a single point, polygon or multipolygon, without rounding.
///
/// Point-like and linear members cannot be unioned as areas; they contribute the convex hull
/// of all their coordinates instead. A hull without area is rejected unless it is a single point.
pub fn combine(input: AoiInput, engine: &dyn GeometryEngine) -> Result<Geometry<f64>> {
    let members = match input {
        AoiInput::Single(geometry) => vec![geometry],
        AoiInput::Many(list) => list,
    };
    if let [single @ (Geometry::Point(_) | Geometry::Polygon(_))] = members.as_slice() {
        return Ok(single.clone());
    }

    let mut areal = Vec::new();
    let mut loose = Vec::new();
    for member in members {
        flatten(member, &mut areal, &mut loose);
    }

    if !loose.is_empty() {
        let first = loose[0];
        if areal.is_empty() && loose.iter().all(|p| *p == first) {
            return Ok(Geometry::Point(first));
        }
        let hull = MultiPoint::new(loose).convex_hull();
        if hull.unsigned_area() == 0.0 {
            return Err(QueryError::Geometry(
                "points and lines of the AOI do not enclose an area".to_string(),
            ));
        }
        areal.push(Geometry::Polygon(hull));
    }
    if areal.is_empty() {
        return Err(QueryError::Geometry("the AOI is empty".to_string()));
    }
    engine.union(&areal)
}

fn flatten(geometry: Geometry<f64>, areal: &mut Vec<Geometry<f64>>, loose: &mut Vec<Point<f64>>) {
    match geometry {
        Geometry::Point(p) => loose.push(p),
        Geometry::MultiPoint(mp) => loose.extend(mp.0),
        Geometry::Line(line) => {
            loose.push(line.start_point());
            loose.push(line.end_point());
        }
        Geometry::LineString(ls) => loose.extend(ls.points()),
        Geometry::MultiLineString(mls) => {
            for ls in mls.0 {
                loose.extend(ls.points());
            }
        }
        Geometry::GeometryCollection(collection) => {
            for member in collection.0 {
                flatten(member, areal, loose);
            }
        }
        polygonal => areal.push(polygonal),
    }
}

pub fn round_coordinates(geometry: &Geometry<f64>, decimals: u32) -> Geometry<f64> {
    let scale = 10f64.powi(decimals as i32);
    geometry.map_coords(|c| Coord {
        x: (c.x * scale).round() / scale,
        y: (c.y * scale).round() / scale,
    })
}

/// Combines and rounds in one go: the geometry exactly as it goes into a filter clause.
pub fn normalize(input: AoiInput, decimals: u32, engine: &dyn GeometryEngine) -> Result<Geometry<f64>> {
    Ok(round_coordinates(&combine(input, engine)?, decimals))
}

// ------------- WKT -------------

/// Serializes a point, polygon or multipolygon with a fixed number of decimals.
pub fn to_wkt(geometry: &Geometry<f64>, decimals: u32) -> Result<String> {
    let d = decimals as usize;
    match geometry {
        Geometry::Point(p) => Ok(format!("POINT({})", coordinate(p.0, d))),
        Geometry::Polygon(polygon) => Ok(format!("POLYGON({})", polygon_body(polygon, d))),
        Geometry::MultiPolygon(multi) => Ok(format!(
            "MULTIPOLYGON({})",
            multi.iter().map(|p| polygon_body(p, d)).collect::<Vec<_>>().join(",")
        )),
        other => Err(QueryError::Geometry(format!(
            "a {} cannot be used in a filter",
            geometry_kind(other)
        ))),
    }
}

fn coordinate(c: Coord<f64>, d: usize) -> String {
    format!("{:.*} {:.*}", d, c.x, d, c.y)
}

fn ring(line: &LineString<f64>, d: usize) -> String {
    let coords: Vec<String> = line.coords().map(|c| coordinate(*c, d)).collect();
    format!("({})", coords.join(","))
}

fn polygon_body(polygon: &Polygon<f64>, d: usize) -> String {
    let rings: Vec<String> = std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|r| ring(r, d))
        .collect();
    format!("({})", rings.join(","))
}

pub fn parse_wkt(wkt: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::from_str(wkt)
        .map_err(|e| QueryError::Geometry(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| QueryError::Geometry(format!("{:?}", e)))
        })
}

/// Footprints come wrapped as `geography'SRID=4326;POLYGON ((...))'`.
pub fn parse_footprint(footprint: &str) -> Result<Geometry<f64>> {
    let body = footprint
        .rsplit(';')
        .next()
        .unwrap_or(footprint)
        .trim()
        .trim_matches(|c| c == '\'' || c == '"');
    parse_wkt(body)
}

/// Rebuilds an areal footprint from the union of its parts, which resolves self-intersecting
/// rings and overlapping members. The flag tells whether the outline had to change; valid
/// footprints come back untouched.
pub fn repair_footprint(geometry: Geometry<f64>) -> (Geometry<f64>, bool) {
    let Some(areal) = to_multipolygon(&geometry) else {
        return (geometry, false);
    };
    let rebuilt = areal.union(&MultiPolygon::new(Vec::new()));
    let after = rebuilt.unsigned_area();
    if rebuilt.0.is_empty() || (after - areal.unsigned_area()).abs() <= after * REPAIR_TOLERANCE {
        return (geometry, false);
    }
    (collapse(rebuilt), true)
}

// ------------- Helpers -------------

pub fn to_multipolygon(geometry: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

pub fn collapse(multi: MultiPolygon<f64>) -> Geometry<f64> {
    if multi.0.len() == 1 {
        let mut polygons = multi.0;
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(multi)
    }
}

pub fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "point",
        Geometry::Line(_) => "line",
        Geometry::LineString(_) => "linestring",
        Geometry::Polygon(_) => "polygon",
        Geometry::MultiPoint(_) => "multipoint",
        Geometry::MultiLineString(_) => "multilinestring",
        Geometry::MultiPolygon(_) => "multipolygon",
        Geometry::GeometryCollection(_) => "geometry collection",
        Geometry::Rect(_) => "rectangle",
        Geometry::Triangle(_) => "triangle",
    }
}
