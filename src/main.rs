#[macro_use]
extern crate diesel;

use std::{error::Error, sync::Arc, time::Duration};

use clap::Parser;
use opentelemetry::{sdk::{trace, Resource}, KeyValue};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

mod api;
mod cmd;
mod config;
mod cron;
mod error;
mod extensions;
mod models;
mod paginate;
mod schedule;
mod schema;
mod scoring;
mod season;
mod store;
mod teams;

use cmd::AppContext;
use schedule::{BundledSchedule, FeedSchedule, ScheduleProvider};
use store::{MemoryStore, PgStore, Store};

#[derive(Parser, Debug)]
#[command(version, author)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Keep everything in memory instead of connecting to postgres
    #[arg(long)]
    memory: bool,

    /// Users granted admin rights at startup, in memory mode only
    #[arg(long, requires = "memory")]
    admin: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = config::load_config(&args.config).map_err(|e| format!("Failed to load {}: {e}", args.config))?;

    // Install tracing framework, with an optional Jaeger sink
    let jaeger = config.tracing_config.as_ref().and_then(|t| t.jaeger.as_deref());
    let telemetry = match jaeger {
        Some(endpoint) => {
            let tracer = opentelemetry_jaeger::new_agent_pipeline()
                .with_endpoint(endpoint)
                .with_service_name("pickem")
                .with_trace_config(
                    trace::config()
                        .with_resource(Resource::new(vec![KeyValue::new("version", env!("CARGO_PKG_VERSION"))])),
                )
                .install_simple()?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };
    let subscriber = Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(telemetry);
    tracing::subscriber::set_global_default(subscriber)?;
    if jaeger.is_some() {
        tracing::info!("Installed jaeger tracing");
    }

    let store: Arc<dyn Store> = if args.memory {
        tracing::warn!("Running with an in-memory store, nothing will be persisted");
        let store = MemoryStore::new();
        for admin in &args.admin {
            store.grant_admin(admin, admin).await;
        }
        Arc::new(store)
    } else {
        Arc::new(PgStore::connect(&config.db_config)?)
    };

    let schedule: Arc<dyn ScheduleProvider> = match config.schedule_config.feed_url {
        Some(ref url) => Arc::new(FeedSchedule::new(url.as_str())),
        None => Arc::new(BundledSchedule::new()?),
    };

    let mut ctx = AppContext::new(store, schedule);
    ctx.enforce_kickoff = config.server_config.enforce_kickoff;
    ctx.batch_size = config.db_config.batch_size;

    if let Some(every) = config.schedule_config.sync_interval {
        tokio::spawn(cron::task_schedule_sync(ctx.clone(), Duration::from_secs(every.max(1))));
    }

    let listener = tokio::net::TcpListener::bind(config.server_config.listen).await?;
    tracing::info!("Listening on {}", config.server_config.listen);
    axum::serve(listener, api::router(ctx))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
            }
        })
        .await?;

    opentelemetry::global::shutdown_tracer_provider();
    Ok(())
}
