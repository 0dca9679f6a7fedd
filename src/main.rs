//! Lumen notification daemon.
//!
//! Runs the notification aggregator for one viewer against an in-memory
//! document store, logging every feed change and raising OS alerts through
//! the log until interrupted.

use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Parser;
use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

use lumen_core::config::AppConfig;
use lumen_core::error::AppError;
use lumen_core::traits::clock::SystemClock;
use lumen_core::traits::navigator::Navigator;
use lumen_core::types::document::Document;
use lumen_core::types::id::{ClassId, UserId};
use lumen_notify::{AggregatorDeps, NotificationAggregator, PermissionGate, Session};
use lumen_store::{FileLocalStore, MemoryDocumentStore, TracingNotifier};

/// Lumen notification aggregator daemon
#[derive(Debug, Parser)]
#[command(name = "lumen-notifyd", version, about, long_about = None)]
struct Args {
    /// Path to the base configuration file (extension optional)
    #[arg(short, long, default_value = "config/default")]
    config: String,

    /// Environment overlay loaded from `config/{env}`
    #[arg(short, long, default_value = "development")]
    env: String,

    /// Signed-in user
    #[arg(short, long, default_value = "demo-student")]
    user: String,

    /// Class membership (repeatable)
    #[arg(long = "class")]
    classes: Vec<String>,

    /// Seed the in-memory store with sample notifications
    #[arg(long)]
    seed_demo: bool,
}

/// Navigator that records navigation requests in the log.
#[derive(Debug)]
struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, destination: &str, entity: Option<Document>) {
        tracing::info!(
            destination,
            entity = entity.as_ref().map(|doc| doc.id.as_str()),
            "Navigate"
        );
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load(&args.config, &args.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, args).await {
        tracing::error!("Daemon error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig, args: Args) -> Result<(), AppError> {
    tracing::info!("Starting lumen-notifyd v{}", env!("CARGO_PKG_VERSION"));

    let user = UserId::new(args.user);
    let classes: Vec<ClassId> = args.classes.into_iter().map(ClassId::new).collect();

    let store = MemoryDocumentStore::new();
    if args.seed_demo {
        seed_demo(&store, &user, &classes, &config);
        tracing::info!(user_id = %user, classes = classes.len(), "Seeded demo data");
    }

    let local_store = FileLocalStore::open(&config.local_store.path).await?;
    tracing::info!(path = %local_store.path().display(), "Local store ready");

    let deps = AggregatorDeps {
        store: Arc::new(store),
        local_store: Arc::new(local_store),
        notifier: Some(Arc::new(TracingNotifier::granted())),
        navigator: Arc::new(LogNavigator),
        clock: Arc::new(SystemClock),
        permission_gate: Arc::new(PermissionGate::new()),
        config: config.notifications.clone(),
    };

    let aggregator = NotificationAggregator::start(deps, Session::new(user, classes))?;
    let mut feed = aggregator.feed();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            changed = feed.changed() => {
                if changed.is_err() {
                    tracing::warn!("Feed closed");
                    break;
                }
                let current = feed.borrow_and_update().clone();
                tracing::info!(
                    items = current.len(),
                    unread = current.unread_count,
                    newest = current.items.first().map(|n| n.title.as_str()),
                    "Feed changed"
                );
            }
        }
    }

    aggregator.shutdown().await;
    tracing::info!("lumen-notifyd stopped");
    Ok(())
}

/// Populate the store with a few private and class notifications.
fn seed_demo(store: &MemoryDocumentStore, user: &UserId, classes: &[ClassId], config: &AppConfig) {
    let collections = &config.notifications.collections;
    let now = Utc::now();

    let private = [
        ("welcome", "Welcome to Lumen", "Your notifications show up here.", "system", "low", 30),
        ("grade-1", "Essay corrected", "Your essay draft has feedback.", "activity_correction", "high", 90),
        ("post-1", "New comment", "Someone replied to your post.", "activity_post", "medium", 300),
    ];
    for (id, title, summary, kind, urgency, minutes_ago) in private {
        store.insert(
            &collections.private,
            id,
            json!({
                "userId": user.as_str(),
                "title": title,
                "summary": summary,
                "type": kind,
                "urgency": urgency,
                "timestamp": (now - Duration::minutes(minutes_ago)).to_rfc3339(),
                "read": false,
                "deepLink": { "page": config.notifications.deep_links.activity_detail_page, "id": "activity-1" }
            }),
        );
    }

    store.insert(
        &collections.activities,
        "activity-1",
        json!({ "title": "Argumentative essay" }),
    );

    for (i, class) in classes.iter().enumerate() {
        store.insert(
            &collections.broadcast,
            &format!("announcement-{i}"),
            json!({
                "classId": class.as_str(),
                "title": format!("New module in {class}"),
                "summary": "A new module was published.",
                "type": "module_post",
                "createdAt": (now - Duration::hours(i as i64 + 1)).to_rfc3339(),
                "expiresAt": (now + Duration::days(7)).to_rfc3339(),
                "deepLink": { "page": "modules" }
            }),
        );
    }
}
