mod cli;
mod config;
mod datapoint;
mod error;
mod export;
mod generate;
mod pipeline;
mod progress;
mod request;
#[cfg(test)]
mod test_support;

use crate::cli::Args;
use crate::config::Config;
use crate::export::JsonLinesSink;
use crate::generate::{DatapointGenerator, GeneratorOptions};
use crate::pipeline::{build_pool, GenerationStats, PgSink};
use crate::request::resolve;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::fmt::MakeWriter;

fn init_tracing(config: &Config) -> Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime::Tokio, trace::Config as OTelTraceConfig, Resource};
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sensor_datagen=info".into());
    // stdout may carry NDJSON output.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    if let Some(endpoint) = &config.otlp_endpoint {
        let endpoint = normalize_otlp_http_endpoint(endpoint);
        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(endpoint);
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(OTelTraceConfig::default().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "sensor-datagen"),
            ])))
            .install_batch(Tokio)?;

        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(())
}

fn normalize_otlp_http_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.contains("/v1/traces") {
        return trimmed.to_string();
    }
    format!("{}/v1/traces", trimmed.trim_end_matches('/'))
}

/// Plain stderr logging used while the config that drives `init_tracing` is
/// still being read.
fn bootstrap_subscriber<W>(writer: W) -> impl tracing::Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .finish()
}

fn load_config() -> Result<Config> {
    tracing::subscriber::with_default(bootstrap_subscriber(std::io::stderr), Config::from_env)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config()?;
    init_tracing(&config)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let request = resolve(args.raw_inputs(), &mut rng, Utc::now())
        .context("invalid generation request")?;

    tracing::info!(
        expected = request.expected_count,
        ticks = request.tick_count(),
        start = %request.start_time,
        end = %request.end_time,
        org_id = %request.org_id,
        loc_id = %request.loc_id,
        machine_id = %request.machine_id,
        part_id = %request.part_id,
        "will generate datapoints"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
                cancel.cancel();
            }
        });
    }

    let stats = Arc::new(GenerationStats::new());
    let reporter = progress::spawn_reporter(stats.clone(), config.progress_interval());

    let result = match args.output.as_deref() {
        Some(path) => {
            let options = GeneratorOptions {
                batch_size: config.effective_batch_size(args.batch_size, false),
                reading_text_len: config.reading_text_len,
            };
            let mut sink = JsonLinesSink::create(path)
                .await
                .with_context(|| format!("failed to open output {}", path.display()))?;
            let mut generator = DatapointGenerator::new(rng, options, stats.clone(), cancel);
            let result = generator.generate(&request, &mut sink).await;
            tracing::info!(written = sink.written(), path = %path.display(), "ndjson output closed");
            result
        }
        None => {
            let options = GeneratorOptions {
                batch_size: config.effective_batch_size(args.batch_size, true),
                reading_text_len: config.reading_text_len,
            };
            let pool = build_pool(config.require_database_url()?, config.db_pool_size)
                .await
                .context("failed to connect to postgres")?;
            let mut sink = PgSink::new(
                pool,
                config.table.clone(),
                config.insert_attempts,
                config.retry_backoff(),
            );
            sink.ensure_table()
                .await
                .with_context(|| format!("failed to prepare table {}", config.table))?;
            let mut generator = DatapointGenerator::new(rng, options, stats.clone(), cancel);
            generator.generate(&request, &mut sink).await
        }
    };

    reporter.abort();
    progress::report(&stats);
    let summary = result.context("datapoint generation failed")?;
    tracing::info!(
        persisted = summary.persisted,
        batches = summary.batches,
        "done"
    );

    Ok(())
}
