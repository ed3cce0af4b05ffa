use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use finwire::bus::memory::MemoryEventBus;
use finwire::bus::EventBus;
use finwire::clock::SystemClock;
use finwire::config::{default_config_path, ResolvedConfig};
use finwire::consumer::dedupe::DedupeCache;
use finwire::consumer::{dispatch_to_response, Consumer};
use finwire::envelope::EventEnvelope;
use finwire::ingestion::IngestionConsumer;
use finwire::models::{Account, AccountType, Id, IdGenerator, UuidIdGenerator};
use finwire::object_store::memory::MemoryObjectStore;
use finwire::object_store::{object_key, ObjectStore};
use finwire::recurring::detector::{DetectorConfig, RecurringChargeDetector};
use finwire::store::memory::MemoryStore;
use finwire::store::{put_typed, Store};
use finwire::vote::VoteCoordinator;
use serde_json::json;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SAMPLE_CSV: &[u8] = b"Date,Description,Amount\n\
2024-01-15,NETFLIX*MONTHLY,-14.99\n\
2024-02-15,NETFLIX*MONTHLY,-14.99\n\
2024-03-15,NETFLIX*MONTHLY,-14.99\n";

#[derive(Parser, Debug)]
#[command(name = "finwire-sim")]
#[command(about = "Drives a handful of events through finwire's in-memory consumers")]
struct Cli {
    /// Path to a finwire config file.
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true).with_level(true))
        .init();

    let cli = Cli::parse();
    let config = ResolvedConfig::load_or_default(&cli.config)
        .with_context(|| format!("failed to load finwire config: {}", cli.config.display()))?;
    info!(data_dir = %config.data_dir.display(), reporting_currency = %config.reporting_currency, "finwire-sim starting");

    let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
    let objects: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::new());
    let memory_bus = Arc::new(MemoryEventBus::new());
    let bus: Arc<dyn EventBus> = memory_bus.clone();
    let ids: Arc<dyn IdGenerator> = Arc::new(UuidIdGenerator);
    let clock = Arc::new(SystemClock);
    let dedupe = DedupeCache::new(500);

    let user_id = Id::from_string("demo-user");
    let account = Account::new_with_generator(ids.as_ref(), user_id.clone(), "Everyday Checking", AccountType::Checking, "First Bank", "USD");
    put_typed(store.as_ref(), "accounts", &account.id, &account, vec![]).await?;
    info!(account_id = %account.id, "seeded demo account");

    let file_name = "january-statement.csv";
    let file_id = ids.new_id();
    let key = object_key(user_id.as_str(), file_id.as_str(), file_name);
    objects
        .write(
            &key,
            SAMPLE_CSV.to_vec(),
            Some("text/csv".to_string()),
            [("fileid".to_string(), file_id.to_string()), ("accountid".to_string(), account.id.to_string())]
                .into_iter()
                .collect(),
        )
        .await?;

    let uploaded = EventEnvelope::new(
        "file.uploaded",
        "finwire-sim",
        user_id.as_str(),
        json!({
            "fileId": file_id.as_str(),
            "userId": user_id.as_str(),
            "accountId": account.id.as_str(),
            "s3Key": key,
            "fileName": file_name,
            "fileSize": SAMPLE_CSV.len() as u64,
        }),
    );

    let ingestion = IngestionConsumer::new(store.clone(), objects.clone(), bus.clone(), ids.clone());
    let result = dispatch_to_response(&ingestion, &dedupe, &json!([uploaded])).await;
    info!(status = result.status_code, processed = result.stats.processed, failed = result.stats.failed, "ran file.uploaded through ingestion");

    for envelope in memory_bus.published().await {
        info!(event_type = %envelope.event_type, "ingestion emitted event");
    }

    let detector = RecurringChargeDetector::new(store.clone(), ids.clone(), clock.clone(), DetectorConfig::default());
    let detection_requested = EventEnvelope::new(
        "recurring_charge.detection.requested",
        "finwire-sim",
        user_id.as_str(),
        json!({ "operationId": ids.new_id().to_string(), "userId": user_id.as_str() }),
    );
    let detection_result = dispatch_to_response(&detector, &dedupe, &json!([detection_requested])).await;
    info!(status = detection_result.status_code, processed = detection_result.stats.processed, "ran recurring-charge detection");

    let coordinator = VoteCoordinator::new(store.clone(), bus.clone(), clock.clone(), true);
    let requested = EventEnvelope::new(
        "file.deletion.requested",
        "finwire-sim",
        user_id.as_str(),
        json!({ "requestId": "op-1", "fileId": file_id.as_str(), "userId": user_id.as_str() }),
    );
    coordinator.process(&requested).await?;
    for voter in ["analytics_manager", "category_manager"] {
        let vote = EventEnvelope::new(
            "file.deletion.vote",
            "finwire-sim",
            user_id.as_str(),
            json!({ "requestId": "op-1", "voter": voter, "decision": "proceed" }),
        );
        coordinator.process(&vote).await?;
    }
    info!("ran a file-deletion vote request to approval through the coordinator");

    info!("finwire-sim run complete");
    Ok(())
}
