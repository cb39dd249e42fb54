//! Filter builder.
//!
//! Every filter category holds at most one clause, except attributes which accumulate. Setters
//! validate their input and fail before anything is sent; `render` is a pure function of the
//! current [`QuerySettings`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use geo_types::Geometry;
use tracing::{info, warn};

use crate::alias::{self, CanonicalName};
use crate::error::{QueryError, Result};
use crate::geometry::{self, AoiInput, GeoEngine, GeometryEngine, LONG_WKT_WARNING, MAX_DECIMALS};
use crate::timestamp::{self, TimeInput};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const RESERVED_ATTRIBUTES: &[(&str, &str)] =
    &[("cloudCover", "set_cloud_cover"), ("productType", "set_product_type")];

/// Filter categories in rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterCategory {
    Collection,
    ProductType,
    Aoi,
    PublicationDate,
    SensingStartDate,
    SensingEndDate,
    CloudCover,
    Attribute,
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FilterCategory::Collection => "collection",
            FilterCategory::ProductType => "product type",
            FilterCategory::Aoi => "aoi",
            FilterCategory::PublicationDate => "publication date",
            FilterCategory::SensingStartDate => "sensing start date",
            FilterCategory::SensingEndDate => "sensing end date",
            FilterCategory::CloudCover => "cloud cover",
            FilterCategory::Attribute => "attribute",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub category: FilterCategory,
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq)]
enum ClauseSlot {
    Single(String),
    Many(Vec<String>),
}

// ------------- Attribute operands -------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Eq => "eq",
            Comparison::Lt => "lt",
            Comparison::Le => "le",
            Comparison::Gt => "gt",
            Comparison::Ge => "ge",
        }
    }
}

impl FromStr for Comparison {
    type Err = QueryError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" => Ok(Comparison::Eq),
            "lt" => Ok(Comparison::Lt),
            "le" => Ok(Comparison::Le),
            "gt" => Ok(Comparison::Gt),
            "ge" => Ok(Comparison::Ge),
            _ => Err(QueryError::InvalidFilter(format!(
                "unknown operator '{s}' (expected one of eq, lt, le, gt, ge)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Integer,
    Double,
    DateTimeOffset,
}

impl AttributeType {
    /// The type segment used in `OData.CSC.<Type>Attribute`.
    pub fn odata_name(&self) -> &'static str {
        match self {
            AttributeType::String => "String",
            AttributeType::Integer => "Integer",
            AttributeType::Double => "Double",
            AttributeType::DateTimeOffset => "DateTimeOffset",
        }
    }

    /// Renders `value` as an OData literal of this type.
    fn literal(&self, value: &str) -> Result<String> {
        let trimmed = value.trim();
        match self {
            AttributeType::String => Ok(format!("'{}'", quote(value))),
            AttributeType::Integer => trimmed
                .parse::<i64>()
                .map(|v| v.to_string())
                .map_err(|_| QueryError::InvalidFilter(format!("'{value}' is not an integer"))),
            AttributeType::Double => match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(trimmed.to_string()),
                _ => Err(QueryError::InvalidFilter(format!("'{value}' is not a finite number"))),
            },
            AttributeType::DateTimeOffset => {
                timestamp::validate_catalog(trimmed)?;
                Ok(trimmed.to_string())
            }
        }
    }
}

impl FromStr for AttributeType {
    type Err = QueryError;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(AttributeType::String),
            "integer" => Ok(AttributeType::Integer),
            "double" => Ok(AttributeType::Double),
            "datetimeoffset" => Ok(AttributeType::DateTimeOffset),
            _ => Err(QueryError::InvalidFilter(format!(
                "unknown attribute type '{s}' (expected string, integer, double or datetimeoffset)"
            ))),
        }
    }
}

// OData string literals escape a quote by doubling it.
fn quote(text: &str) -> String {
    text.replace('\'', "''")
}

// ------------- Cloud cover -------------

/// Inclusive cloud cover bounds in percent. A single value is an upper bound.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudCoverRange {
    pub low: f64,
    pub high: f64,
}

impl CloudCoverRange {
    fn validate(&self) -> Result<()> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.low) || !in_range(self.high) {
            return Err(QueryError::InvalidFilter(format!(
                "cloud cover bounds ({}, {}) must lie within [0, 100]",
                self.low, self.high
            )));
        }
        if self.low > self.high {
            return Err(QueryError::InvalidFilter(format!(
                "cloud cover lower bound {} exceeds upper bound {}",
                self.low, self.high
            )));
        }
        Ok(())
    }

    fn clause(&self) -> String {
        format!(
            "{} and {}",
            double_attribute("cloudCover", Comparison::Ge, &format!("{:.2}", self.low)),
            double_attribute("cloudCover", Comparison::Le, &format!("{:.2}", self.high))
        )
    }
}

impl From<f64> for CloudCoverRange {
    fn from(high: f64) -> Self {
        CloudCoverRange { low: 0.0, high }
    }
}
impl From<i32> for CloudCoverRange {
    fn from(high: i32) -> Self {
        CloudCoverRange::from(high as f64)
    }
}
impl From<(f64, f64)> for CloudCoverRange {
    fn from((low, high): (f64, f64)) -> Self {
        CloudCoverRange { low, high }
    }
}
impl From<(i32, i32)> for CloudCoverRange {
    fn from((low, high): (i32, i32)) -> Self {
        CloudCoverRange { low: low as f64, high: high as f64 }
    }
}

fn attribute_clause(kind: AttributeType, name: &str, op: Comparison, literal: &str) -> String {
    let t = kind.odata_name();
    format!(
        "Attributes/OData.CSC.{t}Attribute/any(att:att/Name eq '{}' and att/OData.CSC.{t}Attribute/Value {} {literal})",
        quote(name),
        op.as_str()
    )
}

fn double_attribute(name: &str, op: Comparison, literal: &str) -> String {
    attribute_clause(AttributeType::Double, name, op, literal)
}

fn date_range(field: &str, start: TimeInput, end: TimeInput) -> Result<String> {
    let start = start.to_catalog_string()?;
    let end = end.to_catalog_string()?;
    Ok(format!("{field} ge {start} and {field} le {end}"))
}

// ------------- Query settings -------------

/// Snapshot of everything a builder has been told: the active clauses, the typed values some
/// of them were built from, and the execution modifiers. Cloning yields an independent copy.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySettings {
    clauses: BTreeMap<FilterCategory, ClauseSlot>,
    collection: Option<CanonicalName>,
    product_type: Option<CanonicalName>,
    aoi: Option<Geometry<f64>>,
    cloud_cover: Option<CloudCoverRange>,
    max_retries: u32,
    request_timeout: Duration,
    decimals: u32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            clauses: BTreeMap::new(),
            collection: None,
            product_type: None,
            aoi: None,
            cloud_cover: None,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            decimals: geometry::DEFAULT_DECIMALS,
        }
    }
}

impl QuerySettings {
    pub fn collection(&self) -> Option<CanonicalName> {
        self.collection
    }
    pub fn product_type(&self) -> Option<CanonicalName> {
        self.product_type
    }
    /// The combined AOI before coordinate rounding.
    pub fn aoi(&self) -> Option<&Geometry<f64>> {
        self.aoi.as_ref()
    }
    pub fn cloud_cover(&self) -> Option<CloudCoverRange> {
        self.cloud_cover
    }
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Active clauses, counting each attribute clause separately.
    pub fn filter_count(&self) -> usize {
        self.clauses
            .values()
            .map(|slot| match slot {
                ClauseSlot::Single(_) => 1,
                ClauseSlot::Many(list) => list.len(),
            })
            .sum()
    }

    pub fn clauses(&self) -> Vec<FilterClause> {
        let mut out = Vec::new();
        for (category, slot) in &self.clauses {
            match slot {
                ClauseSlot::Single(expression) => out.push(FilterClause {
                    category: *category,
                    expression: expression.clone(),
                }),
                ClauseSlot::Many(list) => out.extend(list.iter().map(|expression| FilterClause {
                    category: *category,
                    expression: expression.clone(),
                })),
            }
        }
        out
    }

    /// The combined filter expression; empty when no filter is set.
    pub fn render(&self) -> String {
        self.clauses()
            .into_iter()
            .map(|c| c.expression)
            .collect::<Vec<_>>()
            .join(" and ")
    }

    fn set(&mut self, category: FilterCategory, expression: String) {
        self.clauses.insert(category, ClauseSlot::Single(expression));
    }

    fn append(&mut self, category: FilterCategory, expression: String) {
        match self.clauses.get_mut(&category) {
            Some(ClauseSlot::Many(list)) => list.push(expression),
            _ => {
                self.clauses.insert(category, ClauseSlot::Many(vec![expression]));
            }
        }
    }
}

// ------------- Builder -------------

/// Called after every successful filter mutation with the new settings and rendered filter.
pub trait PostMutationHook: Send {
    fn after_mutation(&mut self, settings: &QuerySettings, filter: &str);
}

pub struct FilterBuilder {
    settings: QuerySettings,
    engine: Arc<dyn GeometryEngine>,
    hook: Option<Box<dyn PostMutationHook>>,
}

impl Default for FilterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::with_engine(Arc::new(GeoEngine))
    }

    pub fn with_engine(engine: Arc<dyn GeometryEngine>) -> Self {
        FilterBuilder { settings: QuerySettings::default(), engine, hook: None }
    }

    /// A builder rendering exactly what `settings` renders. No hook is installed.
    pub fn from_settings(settings: &QuerySettings, engine: Arc<dyn GeometryEngine>) -> Self {
        FilterBuilder { settings: settings.clone(), engine, hook: None }
    }

    pub fn set_hook(&mut self, hook: Box<dyn PostMutationHook>) {
        self.hook = Some(hook);
    }

    pub fn clear_hook(&mut self) {
        self.hook = None;
    }

    pub fn set_max_retries(&mut self, max_retries: u32) -> &mut Self {
        self.settings.max_retries = max_retries;
        self
    }

    pub fn set_request_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.settings.request_timeout = timeout;
        self
    }

    pub fn set_decimals(&mut self, decimals: u32) -> Result<&mut Self> {
        self.settings.decimals = check_decimals(decimals)?;
        Ok(self)
    }

    pub fn set_collection(&mut self, name: &str) -> Result<&mut Self> {
        let collection = alias::resolve_collection(name)?;
        if let Some(range) = self.settings.cloud_cover {
            if !alias::supports_cloud_cover(collection) {
                return Err(QueryError::InvalidFilter(format!(
                    "collection {collection} does not support the cloud cover filter ({} to {} is set)",
                    range.low, range.high
                )));
            }
        }
        if let Some(product_type) = self.settings.product_type {
            check_pairing(collection, product_type)?;
        }
        info!(collection = %collection, "adding collection filter");
        self.settings.collection = Some(collection);
        self.settings
            .set(FilterCategory::Collection, format!("Collection/Name eq '{}'", collection));
        Ok(self.mutated())
    }

    pub fn set_product_type(&mut self, name: &str) -> Result<&mut Self> {
        let product_type = alias::resolve_product_type(name)?;
        if let Some(collection) = self.settings.collection {
            check_pairing(collection, product_type)?;
        }
        info!(product_type = %product_type, "adding product type filter");
        self.settings.product_type = Some(product_type);
        self.settings.set(
            FilterCategory::ProductType,
            attribute_clause(
                AttributeType::String,
                "productType",
                Comparison::Eq,
                &format!("'{}'", product_type),
            ),
        );
        Ok(self.mutated())
    }

    /// Sets the area of interest. `decimals` overrides the builder's coordinate precision.
    pub fn set_aoi(&mut self, aoi: impl Into<AoiInput>, decimals: Option<u32>) -> Result<&mut Self> {
        let decimals = check_decimals(decimals.unwrap_or(self.settings.decimals))?;
        let combined = geometry::combine(aoi.into(), self.engine.as_ref())?;
        let wkt = geometry::to_wkt(&geometry::round_coordinates(&combined, decimals), decimals)?;
        if wkt.len() > LONG_WKT_WARNING {
            warn!(
                length = wkt.len(),
                "AOI WKT is very long, consider fewer decimals or a simpler AOI to stay within the query length limit"
            );
        }
        info!(aoi = %wkt, "adding AOI filter");
        self.settings.aoi = Some(combined);
        self.settings.set(
            FilterCategory::Aoi,
            format!("OData.CSC.Intersects(area=geography'SRID=4326;{wkt}')"),
        );
        Ok(self.mutated())
    }

    pub fn set_publication_date(
        &mut self,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<&mut Self> {
        self.set_date(FilterCategory::PublicationDate, "PublicationDate", start.into(), end.into())
    }

    pub fn set_sensing_start_date(
        &mut self,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<&mut Self> {
        self.set_date(FilterCategory::SensingStartDate, "ContentDate/Start", start.into(), end.into())
    }

    pub fn set_sensing_end_date(
        &mut self,
        start: impl Into<TimeInput>,
        end: impl Into<TimeInput>,
    ) -> Result<&mut Self> {
        self.set_date(FilterCategory::SensingEndDate, "ContentDate/End", start.into(), end.into())
    }

    fn set_date(
        &mut self,
        category: FilterCategory,
        field: &str,
        start: TimeInput,
        end: TimeInput,
    ) -> Result<&mut Self> {
        let clause = date_range(field, start, end)?;
        info!(filter = %category, clause = %clause, "adding date filter");
        self.settings.set(category, clause);
        Ok(self.mutated())
    }

    /// A single value is the maximum cloud cover, a pair is `(min, max)`.
    pub fn set_cloud_cover(&mut self, cover: impl Into<CloudCoverRange>) -> Result<&mut Self> {
        let range = cover.into();
        range.validate()?;
        if let Some(collection) = self.settings.collection {
            if !alias::supports_cloud_cover(collection) {
                return Err(QueryError::InvalidFilter(format!(
                    "collection {collection} does not support the cloud cover filter"
                )));
            }
        }
        info!(min = range.low, max = range.high, "adding cloud cover filter");
        self.settings.cloud_cover = Some(range);
        self.settings.set(FilterCategory::CloudCover, range.clause());
        Ok(self.mutated())
    }

    /// Appends an attribute comparison. Clauses accumulate; duplicates are kept.
    pub fn add_attribute(
        &mut self,
        name: &str,
        operator: &str,
        value: impl ToString,
        attribute_type: &str,
    ) -> Result<&mut Self> {
        if let Some((reserved, setter)) = RESERVED_ATTRIBUTES.iter().find(|(n, _)| *n == name) {
            return Err(QueryError::ReservedAttributeName {
                name: reserved.to_string(),
                setter: *setter,
            });
        }
        let operator: Comparison = operator.parse()?;
        let kind: AttributeType = attribute_type.parse()?;
        let value = value.to_string();
        let literal = kind.literal(&value)?;
        info!(
            attribute = name,
            operator = operator.as_str(),
            value = %value,
            kind = kind.odata_name(),
            "adding attribute filter"
        );
        self.settings
            .append(FilterCategory::Attribute, attribute_clause(kind, name, operator, &literal));
        Ok(self.mutated())
    }

    /// An independent copy of the current settings.
    pub fn settings(&self) -> QuerySettings {
        self.settings.clone()
    }

    pub fn filter_count(&self) -> usize {
        self.settings.filter_count()
    }

    pub fn clauses(&self) -> Vec<FilterClause> {
        self.settings.clauses()
    }

    pub fn render(&self) -> String {
        self.settings.render()
    }

    pub(crate) fn engine(&self) -> Arc<dyn GeometryEngine> {
        Arc::clone(&self.engine)
    }

    fn mutated(&mut self) -> &mut Self {
        if let Some(hook) = self.hook.as_mut() {
            let filter = self.settings.render();
            hook.after_mutation(&self.settings, &filter);
        }
        self
    }
}

fn check_pairing(collection: CanonicalName, product_type: CanonicalName) -> Result<()> {
    match alias::product_types_of(collection) {
        Some(types) if !types.contains(&product_type.as_str()) => Err(QueryError::InvalidFilter(format!(
            "product type {product_type} is not available in collection {collection}"
        ))),
        _ => Ok(()),
    }
}

fn check_decimals(decimals: u32) -> Result<u32> {
    if decimals > MAX_DECIMALS {
        return Err(QueryError::InvalidFilter(format!(
            "decimals must not exceed {MAX_DECIMALS}, got {decimals}"
        )));
    }
    Ok(decimals)
}
