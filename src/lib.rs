//! copernicus-odata – filtered product queries against the Copernicus Data Space catalogue.
//!
//! A query is assembled from independent filters, sent to the OData catalogue with retries
//! and transparent pagination, and the returned products are turned into an enriched table:
//! * Loosely written collection and product type names (`"s2"`, `"Level-2A"`) are resolved
//!   to catalogue tokens by the [`alias`] tables.
//! * Areas of interest of any shape are merged into one point, polygon or multipolygon by the
//!   [`geometry`] adapter before they become an `Intersects` clause.
//! * Each filter category holds one clause, except attributes which accumulate
//!   (see [`filter::FilterBuilder`]).
//! * Each product row carries footprint area, centroid, AOI coverage, tile id, file size and
//!   checksums next to the upstream fields (see [`table::EnrichedProductRow`]).
//!
//! ## Modules
//! * [`alias`] – Name homogenization and the collection / product type vocabularies.
//! * [`timestamp`] – The catalogue timestamp format.
//! * [`geometry`] – AOI normalization, WKT, and the [`geometry::GeometryEngine`] capability.
//! * [`filter`] – The filter builder and its [`filter::QuerySettings`] snapshot.
//! * [`transport`] – The [`transport::HttpTransport`] capability and its reqwest client.
//! * [`executor`] – Count checks, paginated fetches and name lookups with retries.
//! * [`enrich`] – Raw record decoding and derived columns.
//! * [`tile`] – Group tile identifiers per mission.
//! * [`table`] – The product table handed to callers.
//! * [`query`] – [`query::CatalogQuery`], tying the pieces together.
//! * [`settings`] – Layered configuration through the `config` crate.
//!
//! ## Capabilities
//! Network access and geometry primitives sit behind traits so that both can be replaced,
//! e.g. by scripted fakes in tests. The defaults are a blocking reqwest client and
//! [`geometry::GeoEngine`] (`geo` boolean operations, `proj4rs` reprojection).
//!
//! ## Quick Start
//! ```no_run
//! use copernicus_odata::{CatalogQuery, EngineSettings, FetchOptions};
//! use geo_types::Point;
//!
//! let mut query = CatalogQuery::new(EngineSettings::default()).unwrap();
//! query
//!     .filters_mut()
//!     .set_collection("sentinel-2").unwrap()
//!     .set_product_type("l2a").unwrap()
//!     .set_aoi(Point::new(13.4, 52.5), None).unwrap()
//!     .set_sensing_start_date("2023-07-05T00:00:00.000Z", "2023-10-28T19:33:12.021Z").unwrap()
//!     .set_cloud_cover(35).unwrap();
//! let result = query.send_query(&FetchOptions::default()).unwrap();
//! println!("{} products, AOI coverage {}", result.table.len(), result.aoi_coverage);
//! ```
//!
//! ## Concurrency
//! Everything is synchronous. One [`query::CatalogQuery`] performs its round trips one after
//! the other and is not meant to be shared between threads without external locking.
//! Interactive mode adds one count request per filter change.

pub mod alias;
pub mod enrich;
pub mod error;
pub mod executor;
pub mod filter;
pub mod geometry;
pub mod query;
pub mod settings;
pub mod table;
pub mod tile;
pub mod timestamp;
pub mod transport;

pub use crate::alias::{resolve_collection, resolve_product_type, CanonicalName};
pub use crate::error::{QueryError, Result};
pub use crate::executor::FetchOptions;
pub use crate::filter::{FilterBuilder, QuerySettings};
pub use crate::query::{CatalogQuery, QueryResult};
pub use crate::settings::EngineSettings;
pub use crate::table::{EnrichedProductRow, ProductTable};
