//! sentimetric binary.
//!
//! * no arguments: serve the HTTP API on `$SENTIMETRIC_ADDR` (default 127.0.0.1:8000)
//! * `benchmark`: score the built-in labeled set and print the report(s) as JSON
//! * anything else: analyze the joined arguments and print the result as JSON

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use sentimetric::analyze::ai_adapter::{build_external_source, DynSource};
use sentimetric::api::{create_router, AppState};
use sentimetric::benchmark;
use sentimetric::compare::{Comparator, ComparatorConfig};
use sentimetric::config::LlmConfig;
use sentimetric::logging::init_tracing;
use sentimetric::metrics::Metrics;
use sentimetric::Analyzer;

const ENV_ADDR: &str = "SENTIMETRIC_ADDR";
const DEFAULT_ADDR: &str = "127.0.0.1:8000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let analyzer = Analyzer::from_default_config().context("loading analyzer config")?;

    match args.first().map(String::as_str) {
        None => serve(analyzer).await,
        Some("benchmark") => run_benchmark(analyzer).await,
        Some(_) => {
            let text = args.join(" ");
            let result = analyzer.analyze(text.as_str())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn external_source(analyzer: &Analyzer) -> anyhow::Result<Option<DynSource>> {
    let cfg = LlmConfig::load_default().context("loading LLM config")?;
    Ok(build_external_source(&cfg, analyzer.config().thresholds)?)
}

async fn serve(analyzer: Analyzer) -> anyhow::Result<()> {
    let watchers = analyzer.watch_tables();
    if watchers > 0 {
        info!(watchers, "table hot reload enabled");
    }

    let comparator = match external_source(&analyzer)? {
        Some(ext) => Some(Comparator::new(
            Arc::new(analyzer.clone()),
            ext,
            ComparatorConfig::default(),
        )?),
        None => None,
    };

    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "metrics disabled");
            None
        }
    };

    let state = AppState::new(analyzer, comparator);
    let router = create_router(state, metrics.as_ref());

    let addr = std::env::var(ENV_ADDR).unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "sentimetric listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn run_benchmark(analyzer: Analyzer) -> anyhow::Result<()> {
    let samples = benchmark::default_samples();
    let mut reports = vec![benchmark::run(&analyzer, &samples).await];
    if let Some(ext) = external_source(&analyzer)? {
        reports.push(benchmark::run(ext.as_ref(), &samples).await);
    }
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
