use actix_web::{web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use company_insights_service::config::Config;
use company_insights_service::gateway::DataGateway;
use company_insights_service::handlers::{configure_routes, CompanyHandlerState};
use company_insights_service::services::CompanyDirectory;
use resource_cache::CacheMetrics;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,company_insights_service=debug".into());

    // LOG_FORMAT=json for structured output
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Starting company-insights-service v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!(
        upstream = %config.upstream.base_url,
        cache_ttl_secs = config.cache.cache_ttl_secs,
        "Upstream configured"
    );

    if let Err(e) = CacheMetrics::register(prometheus::default_registry()) {
        tracing::warn!("Failed to register cache metrics: {}", e);
    }

    let gateway = DataGateway::new(config.upstream.clone(), config.cache.ttl())
        .context("Failed to build upstream HTTP client")?;
    let directory = CompanyDirectory::new(Arc::new(gateway), config.rules);

    let state = web::Data::new(CompanyHandlerState {
        queries: Arc::new(directory),
    });

    let bind_addr = (config.server.server_host.clone(), config.server.server_port);
    tracing::info!("HTTP server listening on {}:{}", bind_addr.0, bind_addr.1);

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(bind_addr)
    .context("Failed to bind HTTP server")?
    .run()
    .await
    .context("HTTP server error")?;

    tracing::info!("company-insights-service shut down");
    Ok(())
}
