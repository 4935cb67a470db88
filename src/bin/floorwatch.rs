//! floorwatch CLI: operator interface to the productivity metrics store.

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use floorwatch::aggregate::MetricsEngine;
use floorwatch::analytics::Analytics;
use floorwatch::cache::{MetricsCache, SeriesQuery};
use floorwatch::config::Config;
use floorwatch::db::Db;
use floorwatch::ingest::Ingestor;
use floorwatch::model::cache::{EntityType, FACTORY_ENTITY_ID};
use floorwatch::model::event::Payload;
use floorwatch::model::registry::RegistryManifest;
use floorwatch::notify::Notifier;
use floorwatch::store::{self, EventFilter, Registry, TimeWindow};
use floorwatch::telemetry::{TelemetryConfig, init_telemetry};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Parser)]
#[command(name = "floorwatch", about = "Worker productivity metrics for the factory floor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a JSON event or array of events from a file ("-" for stdin)
    Ingest { path: PathBuf },
    /// List stored events, newest first
    Events {
        #[arg(long)]
        worker: Option<String>,
        #[arg(long)]
        station: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Aggregated metrics
    Metrics {
        #[command(subcommand)]
        scope: MetricsScope,
    },
    /// Analytics views
    Analytics {
        #[command(subcommand)]
        view: AnalyticsView,
    },
    /// Daily metrics cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Worker and workstation reference data
    Registry {
        #[command(subcommand)]
        action: RegistryAction,
    },
    /// Ingest files while printing change notifications until Ctrl-C
    Watch { paths: Vec<PathBuf> },
    /// Check database connectivity
    Health,
}

#[derive(clap::Args, Clone, Copy)]
struct WindowArgs {
    /// Inclusive lower bound (RFC 3339)
    #[arg(long)]
    from: Option<DateTime<Utc>>,
    /// Inclusive upper bound (RFC 3339)
    #[arg(long)]
    to: Option<DateTime<Utc>>,
}

impl WindowArgs {
    fn window(self) -> TimeWindow {
        TimeWindow::new(self.from, self.to)
    }
}

#[derive(Subcommand)]
enum MetricsScope {
    Workers {
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    Stations {
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    Factory {
        #[command(flatten)]
        window: WindowArgs,
    },
}

#[derive(Subcommand)]
enum AnalyticsView {
    /// Daily series for a worker, station or the factory
    Timeseries {
        /// worker | station | factory
        #[arg(long = "type")]
        entity_type: EntityType,
        /// Entity id (ignored for factory)
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Low-confidence events
    Alerts {
        #[arg(long)]
        threshold: Option<f64>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Today against the previous seven days
    Shift {
        #[arg(long)]
        worker: String,
    },
    /// Detection model version stats
    Models,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Compute and store buckets for one UTC day
    Rollup {
        #[arg(long)]
        date: NaiveDate,
    },
    /// Delete buckets past retention
    Purge,
}

#[derive(Subcommand)]
enum RegistryAction {
    /// List workers and workstations
    List,
    /// Show a single worker or workstation
    Show {
        #[arg(long, conflicts_with = "station", required_unless_present = "station")]
        worker: Option<String>,
        #[arg(long)]
        station: Option<String>,
    },
    /// Upsert entries from a TOML manifest
    Load { manifest: PathBuf },
}

struct App {
    config: Config,
    db: Arc<Db>,
    notifier: Arc<Notifier>,
}

impl App {
    fn engine(&self) -> Arc<MetricsEngine> {
        Arc::new(MetricsEngine::new(self.db.clone(), self.db.clone()))
    }

    fn cache(&self) -> MetricsCache {
        MetricsCache::with_retention_days(self.db.clone(), self.config.cache_retention_days)
    }

    fn analytics(&self) -> Analytics {
        Analytics::new(self.engine(), self.cache()).with_alert_threshold(self.config.alert_threshold)
    }

    fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.db.clone(), self.notifier.clone())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "floorwatch"))?;

    let db = Db::connect(config.database_url.expose_secret())
        .await?
        .with_chunk_size(config.ingest_chunk_size);
    db.migrate().await?;

    let app = App {
        notifier: Arc::new(Notifier::new(config.subscriber_buffer)),
        db: Arc::new(db),
        config,
    };

    match cli.command {
        Command::Ingest { path } => cmd_ingest(&app, &path).await,
        Command::Events {
            worker,
            station,
            window,
            limit,
        } => {
            let mut filter = EventFilter::default().window(window.window());
            if let Some(id) = worker {
                filter = filter.worker(id);
            }
            if let Some(id) = station {
                filter = filter.workstation(id);
            }
            print_json(&app.analytics().recent_events(filter, limit).await?)
        }
        Command::Metrics { scope } => cmd_metrics(&app, scope).await,
        Command::Analytics { view } => cmd_analytics(&app, view).await,
        Command::Cache { action } => match action {
            CacheAction::Rollup { date } => {
                let written = app.cache().rollup_day(&app.engine(), date).await?;
                print_json(&serde_json::json!({ "date": date, "buckets": written }))
            }
            CacheAction::Purge => {
                let removed = app.cache().purge_expired().await?;
                print_json(&serde_json::json!({ "removed": removed }))
            }
        },
        Command::Registry { action } => cmd_registry(&app, action).await,
        Command::Watch { paths } => cmd_watch(&app, paths).await,
        Command::Health => {
            app.db.health_check().await?;
            print_json(&serde_json::json!({ "status": "ok" }))
        }
    }
}

async fn cmd_ingest(app: &App, path: &Path) -> anyhow::Result<()> {
    let summary = app.ingestor().ingest(read_payload(path)?).await?;
    print_json(&summary)
}

async fn cmd_metrics(app: &App, scope: MetricsScope) -> anyhow::Result<()> {
    let engine = app.engine();
    match scope {
        MetricsScope::Workers { id, window } => {
            print_json(&engine.worker_metrics(id.as_deref(), window.window()).await?)
        }
        MetricsScope::Stations { id, window } => {
            print_json(&engine.workstation_metrics(id.as_deref(), window.window()).await?)
        }
        MetricsScope::Factory { window } => {
            print_json(&engine.factory_metrics(window.window()).await?)
        }
    }
}

async fn cmd_analytics(app: &App, view: AnalyticsView) -> anyhow::Result<()> {
    let analytics = app.analytics();
    match view {
        AnalyticsView::Timeseries {
            entity_type,
            id,
            window,
        } => {
            let id = match (entity_type, id) {
                (EntityType::Factory, _) => FACTORY_ENTITY_ID.to_string(),
                (_, Some(id)) => id,
                (_, None) => anyhow::bail!("--id is required for {entity_type} series"),
            };
            let query = SeriesQuery::new(entity_type, id, window.window());
            print_json(&analytics.time_series(&query).await?)
        }
        AnalyticsView::Alerts { threshold, window } => {
            print_json(&analytics.alerts(threshold, window.window()).await?)
        }
        AnalyticsView::Shift { worker } => {
            print_json(&analytics.shift_comparison(&worker, Utc::now()).await?)
        }
        AnalyticsView::Models => print_json(&analytics.model_versions().await?),
    }
}

async fn cmd_registry(app: &App, action: RegistryAction) -> anyhow::Result<()> {
    let registry: &dyn Registry = app.db.as_ref();
    match action {
        RegistryAction::List => print_json(&serde_json::json!({
            "workers": registry.workers().await?,
            "workstations": registry.workstations().await?,
        })),
        RegistryAction::Show { worker, station } => {
            if let Some(id) = worker {
                match registry.worker(&id).await? {
                    Some(w) => print_json(&w),
                    None => anyhow::bail!("worker {id} not found"),
                }
            } else if let Some(id) = station {
                match registry.workstation(&id).await? {
                    Some(s) => print_json(&s),
                    None => anyhow::bail!("workstation {id} not found"),
                }
            } else {
                anyhow::bail!("one of --worker or --station is required")
            }
        }
        RegistryAction::Load { manifest } => {
            let manifest = RegistryManifest::load(&manifest)?;
            let (workers, workstations) = store::load_manifest(registry, &manifest).await?;
            print_json(&serde_json::json!({ "workers": workers, "workstations": workstations }))
        }
    }
}

async fn cmd_watch(app: &App, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let shutdown = Arc::new(Notify::new());
    let heartbeat = app
        .notifier
        .spawn_heartbeat(app.config.heartbeat_interval, shutdown.clone());

    let mut subscription = app.notifier.subscribe().await;
    let printer = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            match serde_json::to_string(&message) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!("cannot encode notification: {e}"),
            }
        }
    });

    let ingestor = app.ingestor();
    for path in &paths {
        match read_payload(path) {
            Ok(payload) => {
                if let Err(e) = ingestor.ingest(payload).await {
                    tracing::error!(path = %path.display(), "ingest failed: {e}");
                }
            }
            Err(e) => tracing::error!(path = %path.display(), "cannot read payload: {e}"),
        }
    }

    tokio::signal::ctrl_c().await.ok();
    shutdown.notify_one();
    heartbeat.await.ok();
    printer.abort();
    Ok(())
}

fn read_payload(path: &Path) -> anyhow::Result<Payload> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&content)?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
