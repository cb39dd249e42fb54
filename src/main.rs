use std::env;
use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use copernicus_odata::executor::FetchOptions;
use copernicus_odata::geometry;
use copernicus_odata::settings::{profile_time, QueryProfile};
use copernicus_odata::{CatalogQuery, EngineSettings, Result};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn apply_filters(query: &mut CatalogQuery, profile: &QueryProfile) -> Result<()> {
    let filters = query.filters_mut();
    if let Some(collection) = &profile.collection {
        filters.set_collection(collection)?;
    }
    if let Some(product_type) = &profile.product_type {
        filters.set_product_type(product_type)?;
    }
    if let Some(wkt) = &profile.aoi {
        filters.set_aoi(geometry::parse_wkt(wkt)?, None)?;
    }
    if let Some((start, end)) = &profile.publication_date {
        filters.set_publication_date(profile_time(start), profile_time(end))?;
    }
    if let Some((start, end)) = &profile.sensing_start_date {
        filters.set_sensing_start_date(profile_time(start), profile_time(end))?;
    }
    if let Some((start, end)) = &profile.sensing_end_date {
        filters.set_sensing_end_date(profile_time(start), profile_time(end))?;
    }
    match (profile.cloud_cover_min, profile.cloud_cover_max) {
        (Some(low), Some(high)) => {
            filters.set_cloud_cover((low, high))?;
        }
        (None, Some(high)) => {
            filters.set_cloud_cover(high)?;
        }
        (Some(low), None) => {
            filters.set_cloud_cover((low, 100.0))?;
        }
        (None, None) => {}
    }
    for attribute in &profile.attributes {
        filters.add_attribute(
            &attribute.name,
            &attribute.operator,
            &attribute.value,
            &attribute.attribute_type,
        )?;
    }
    Ok(())
}

fn run(config_path: Option<&str>) -> Result<()> {
    let settings = EngineSettings::load(config_path)?;
    let profile = settings.query.clone();
    let mut query = CatalogQuery::new(settings)?;
    let Some(profile) = profile else {
        info!("no [query] section configured, nothing to do");
        return Ok(());
    };

    let result = if profile.product_names.is_empty() {
        apply_filters(&mut query, &profile)?;
        info!(url = %query.request_url()?, "query");
        let options = FetchOptions {
            skip: profile.skip,
            n_entries: profile.n_entries,
            orderby: profile.orderby.clone(),
        };
        query.send_query(&options)?
    } else {
        query.query_by_name(&profile.product_names)?
    };

    for row in result.table.sorted_by_name().iter() {
        println!(
            "{}\t{}\t{}\t{}",
            row.name,
            row.sensing_start_date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            row.file_size.map(|mb| format!("{:.1} MB", mb)).unwrap_or_default(),
            row.group_tile_id.as_deref().unwrap_or("-"),
        );
    }
    println!("aoi coverage: {:.5}", result.aoi_coverage);
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let config_path = env::args().nth(1);
    match run(config_path.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "query failed");
            ExitCode::FAILURE
        }
    }
}
