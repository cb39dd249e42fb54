//! The catalogue query facade: one filter builder, its executor and enricher, and the latest
//! result they produced.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{info, warn};

use crate::enrich::ResultEnricher;
use crate::error::{QueryError, Result};
use crate::executor::{FetchOptions, FetchOutcome, QueryExecutor, QueryTarget};
use crate::filter::{FilterBuilder, PostMutationHook, QuerySettings};
use crate::geometry::{GeoEngine, GeometryEngine};
use crate::settings::EngineSettings;
use crate::table::ProductTable;
use crate::transport::{self, HttpTransport, ReqwestTransport};

/// The outcome of one fetch. Each fetch replaces the previous result wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub table: ProductTable,
    /// Raw page payloads in the order received.
    pub pages: Vec<Value>,
    pub aoi_coverage: f64,
}

// Counts the matching products after every filter change, once enough filters are active.
// Each check is a network round trip; failures are logged and never interrupt the caller.
struct InteractiveCheck {
    executor: Arc<QueryExecutor>,
    min_filters: usize,
}

impl PostMutationHook for InteractiveCheck {
    fn after_mutation(&mut self, settings: &QuerySettings, filter: &str) {
        if settings.filter_count() < self.min_filters {
            return;
        }
        match self.executor.check(filter, settings.request_timeout(), settings.max_retries()) {
            Ok(count) => info!(products = count, "current query matches"),
            Err(e) => warn!(error = %e, "interactive query check failed"),
        }
    }
}

pub struct CatalogQuery {
    builder: FilterBuilder,
    executor: Arc<QueryExecutor>,
    enricher: ResultEnricher,
    settings: EngineSettings,
    latest: Option<QueryResult>,
}

impl CatalogQuery {
    /// A query talking to the configured catalogue over HTTPS.
    pub fn new(settings: EngineSettings) -> Result<Self> {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new()?);
        Self::with_capabilities(settings, transport, Arc::new(GeoEngine))
    }

    pub fn with_capabilities(
        settings: EngineSettings,
        transport: Arc<dyn HttpTransport>,
        engine: Arc<dyn GeometryEngine>,
    ) -> Result<Self> {
        settings.validate()?;
        let executor = Arc::new(
            QueryExecutor::new(transport, settings.catalog_url.clone())
                .with_page_size(settings.page_size)
                .with_retry_delay(settings.retry_delay(), settings.max_retry_delay()),
        );
        let enricher = ResultEnricher::new(Arc::clone(&engine))
            .with_area_epsg(settings.area_epsg)
            .with_download_url_template(settings.download_url_template.clone());
        let mut builder = FilterBuilder::with_engine(engine);
        builder
            .set_max_retries(settings.max_retries)
            .set_request_timeout(settings.request_timeout())
            .set_decimals(settings.decimals)?;
        let mut query = CatalogQuery { builder, executor, enricher, settings, latest: None };
        query.install_hook();
        Ok(query)
    }

    fn install_hook(&mut self) {
        if self.settings.interactive {
            self.builder.set_hook(Box::new(InteractiveCheck {
                executor: Arc::clone(&self.executor),
                min_filters: self.settings.interactive_min_filters,
            }));
        }
    }

    pub fn filters(&self) -> &FilterBuilder {
        &self.builder
    }

    pub fn filters_mut(&mut self) -> &mut FilterBuilder {
        &mut self.builder
    }

    pub fn query_settings(&self) -> QuerySettings {
        self.builder.settings()
    }

    pub fn engine_settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn filter(&self) -> String {
        self.builder.render()
    }

    /// The GET URL of the current filter, for display.
    pub fn request_url(&self) -> Result<String> {
        let filter = self.builder.render();
        let params = if filter.is_empty() {
            Vec::new()
        } else {
            vec![("$filter".to_string(), filter)]
        };
        transport::full_url(self.executor.catalog_url(), &params)
    }

    /// Number of products the current filter matches.
    pub fn check_query(&self) -> Result<u64> {
        let settings = self.builder.settings();
        let count = self.executor.check(
            &self.builder.render(),
            settings.request_timeout(),
            settings.max_retries(),
        )?;
        info!(products = count, "current query matches");
        Ok(count)
    }

    pub fn send_query(&mut self, options: &FetchOptions) -> Result<&QueryResult> {
        let settings = self.builder.settings();
        let filter = self.builder.render();
        info!(filter = %filter, skip = options.skip, "sending query");
        let started = Instant::now();
        let outcome = self.executor.fetch_all(
            QueryTarget::Filter(&filter),
            options,
            settings.request_timeout(),
            settings.max_retries(),
        )?;
        self.finish(outcome, settings.aoi().cloned(), started)
    }

    /// Fetches products by exact name. Names the catalogue does not know are left out.
    pub fn query_by_name(&mut self, names: &[String]) -> Result<&QueryResult> {
        if self.builder.filter_count() > 0 {
            return Err(QueryError::InvalidQuery {
                status: None,
                message: "a name query cannot be combined with filters".to_string(),
            });
        }
        let settings = self.builder.settings();
        info!(names = names.len(), "querying products by name");
        let started = Instant::now();
        let outcome = self.executor.fetch_all(
            QueryTarget::Names(names),
            &FetchOptions::default(),
            settings.request_timeout(),
            settings.max_retries(),
        )?;
        self.finish(outcome, None, started)
    }

    fn finish(
        &mut self,
        outcome: FetchOutcome,
        aoi: Option<geo_types::Geometry<f64>>,
        started: Instant,
    ) -> Result<&QueryResult> {
        let enrichment = self.enricher.enrich(&outcome.records, aoi.as_ref())?;
        let table = enrichment.table;
        let size_gb = format!("{:.2}", table.total_size_gb());
        let online_pct = format!("{:.2}", table.online_fraction() * 100.0);
        info!(
            products = table.len(),
            size_gb = %size_gb,
            online_pct = %online_pct,
            aoi_coverage = enrichment.aoi_coverage,
            ms = started.elapsed().as_millis() as u64,
            "retrieved products"
        );
        let result = QueryResult {
            table,
            pages: outcome.pages,
            aoi_coverage: enrichment.aoi_coverage,
        };
        let stored: &QueryResult = self.latest.insert(result);
        Ok(stored)
    }

    /// The latest table sorted by product name, sending the query first if nothing was fetched.
    pub fn products(&mut self) -> Result<ProductTable> {
        if self.latest.is_none() {
            self.send_query(&FetchOptions::default())?;
        }
        Ok(self
            .latest
            .as_ref()
            .map(|result| result.table.sorted_by_name())
            .unwrap_or_default())
    }

    pub fn latest_result(&self) -> Option<&QueryResult> {
        self.latest.as_ref()
    }

    /// Aggregate AOI coverage of the latest result, 0 when nothing was fetched.
    pub fn aoi_coverage(&self) -> f64 {
        self.latest.as_ref().map_or(0.0, |result| result.aoi_coverage)
    }

    /// An independent query with the same filters and configuration, without a result.
    pub fn create_copy(&self) -> Self {
        let builder = FilterBuilder::from_settings(&self.builder.settings(), self.builder.engine());
        let mut copy = CatalogQuery {
            builder,
            executor: Arc::clone(&self.executor),
            enricher: self.enricher.clone(),
            settings: self.settings.clone(),
            latest: None,
        };
        copy.install_hook();
        copy
    }
}
