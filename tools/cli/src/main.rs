//! FinTech Pro CLI - Offline pipeline tooling.
//!
//! This tool inspects and drains the offline queue, primes the asset cache
//! against a live origin, classifies connections, and runs the full
//! offline submission flow against in-memory doubles.

mod config;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use url::Url;

use finpro_cache::{CacheManager, FetchDisposition};
use finpro_client::{HeadlessPage, LifecycleController, RegistrationConfig, SubmitOutcome, Submitter};
use finpro_common::{FetchRequest, FetchResponse, HttpMethod, RequestDestination};
use finpro_network::{
    classify, format_speed, ConnectivityMonitor, DeviceProfile, EffectiveType, HttpTransport,
    MemoryTransport, NetworkInfo, Transport,
};
use finpro_storage::{
    create_default_registry, MemoryQueueStore, OperationKind, OperationStatus, QueueStore,
};
use finpro_sync::{DrainOutcome, SyncEngine, SyncTrigger};
use finpro_worker::{HeadlessPlatform, ServiceWorker};

use crate::config::FinproConfig;

#[derive(Parser)]
#[command(name = "finpro")]
#[command(about = "FinTech Pro - Offline queue, cache and sync tooling")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the site origin.
    #[arg(long, global = true)]
    origin: Option<String>,

    /// Override the queue backend ("memory" or "sqlite").
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or append to the offline queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },

    /// Drain pending operations against the origin.
    Sync,

    /// Work with the asset cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Classify a connection and the image quality it warrants.
    Network {
        /// Effective link type: slow-2g, 2g, 3g or 4g.
        #[arg(short, long)]
        effective_type: Option<EffectiveType>,

        /// Downlink estimate in Mbps.
        #[arg(short, long)]
        downlink: Option<f64>,

        /// Round-trip estimate in milliseconds.
        #[arg(short, long)]
        rtt: Option<u32>,

        /// Data saver enabled.
        #[arg(long)]
        save_data: bool,

        /// Viewport width in CSS pixels.
        #[arg(long, default_value_t = 1440)]
        width: u32,

        /// Viewport height in CSS pixels.
        #[arg(long, default_value_t = 900)]
        height: u32,

        /// Device pixel ratio.
        #[arg(long, default_value_t = 1.0)]
        pixel_ratio: f64,

        /// Requested image quality.
        #[arg(short, long, default_value_t = 75)]
        quality: u8,
    },

    /// Run an offline submission end to end against in-memory doubles.
    Simulate {
        /// Email submitted with the lead form.
        #[arg(short, long, default_value = "a@b.com")]
        email: String,

        /// Status the lead endpoint answers with once back online.
        #[arg(short, long, default_value_t = 500)]
        status: u16,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// Append an operation without touching the network.
    Enqueue {
        /// Operation kind: create, update or delete.
        #[arg(short, long)]
        kind: OperationKind,

        /// Destination path or URL.
        #[arg(short, long)]
        destination: String,

        /// JSON payload.
        #[arg(short, long, default_value = "null")]
        payload: String,
    },

    /// List queued operations.
    List {
        /// Only entries with this status.
        #[arg(short, long)]
        status: Option<OperationStatus>,
    },

    /// Count queued operations.
    Count {
        #[arg(short, long, default_value = "pending")]
        status: OperationStatus,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Fetch the install manifest from the origin.
    Prime,

    /// Show how a path would be intercepted.
    Route {
        /// Path or URL.
        path: String,

        /// Request destination (document, style, script, font, image).
        #[arg(short, long, default_value = "")]
        destination: String,

        /// HTTP method.
        #[arg(short, long, default_value = "GET")]
        method: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = FinproConfig::load(cli.config.as_deref()).await?;
    if let Some(origin) = cli.origin {
        config.origin = origin;
    }
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }

    match cli.command {
        Commands::Queue { action } => match action {
            QueueAction::Enqueue {
                kind,
                destination,
                payload,
            } => cmd_enqueue(&config, kind, &destination, &payload).await,
            QueueAction::List { status } => cmd_list(&config, status).await,
            QueueAction::Count { status } => cmd_count(&config, status).await,
        },

        Commands::Sync => cmd_sync(&config).await,

        Commands::Cache { action } => match action {
            CacheAction::Prime => cmd_cache_prime(&config).await,
            CacheAction::Route {
                path,
                destination,
                method,
            } => cmd_cache_route(&config, &path, &destination, &method),
        },

        Commands::Network {
            effective_type,
            downlink,
            rtt,
            save_data,
            width,
            height,
            pixel_ratio,
            quality,
        } => {
            let info = NetworkInfo {
                effective_type,
                downlink,
                rtt,
                save_data,
            };
            let device = DeviceProfile::new(width, height).with_pixel_ratio(pixel_ratio);
            cmd_network(info, device, quality);
            Ok(())
        }

        Commands::Simulate { email, status } => cmd_simulate(&config, &email, status).await,

        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "finpro", &mut std::io::stdout());
            Ok(())
        }
    }
}

/// Resolve the configured queue backend.
async fn open_store(config: &FinproConfig) -> Result<Arc<dyn QueueStore>> {
    if let Some(path) = config.store.sqlite_path() {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let registry = create_default_registry();
    registry
        .open(&config.store.backend, &config.store.config)
        .with_context(|| format!("Failed to open '{}' queue store", config.store.backend))
}

fn http_transport() -> Result<Arc<dyn Transport>> {
    Ok(Arc::new(
        HttpTransport::new().context("Failed to create HTTP transport")?,
    ))
}

/// Append an operation to the queue.
async fn cmd_enqueue(
    config: &FinproConfig,
    kind: OperationKind,
    destination: &str,
    payload: &str,
) -> Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload is not valid JSON")?;
    let store = open_store(config).await?;

    let id = store
        .enqueue(kind, destination, payload)
        .await
        .context("Failed to queue operation")?;

    println!("Queued {} {} as {}", kind, destination, id);

    Ok(())
}

/// List queued operations.
async fn cmd_list(config: &FinproConfig, status: Option<OperationStatus>) -> Result<()> {
    let store = open_store(config).await?;
    let mut entries = store.list(status).await.context("Failed to list queue")?;
    entries.sort_by_key(|e| e.enqueued_at);

    if entries.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for entry in entries {
        println!(
            "  [{}] {} {} {} (retries: {}, queued {})",
            entry.status,
            entry.id,
            entry.kind,
            entry.destination,
            entry.retry_count,
            entry.enqueued_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

/// Count queued operations by status.
async fn cmd_count(config: &FinproConfig, status: OperationStatus) -> Result<()> {
    let store = open_store(config).await?;
    let count = store.count(status).await.context("Failed to count queue")?;
    println!("{} {}", count, status);
    Ok(())
}

/// Drain the queue against the live origin.
async fn cmd_sync(config: &FinproConfig) -> Result<()> {
    let origin = config.origin_url()?;
    info!("Draining queue against {}", origin);

    let store = open_store(config).await?;
    let engine = SyncEngine::new(
        store,
        http_transport()?,
        ConnectivityMonitor::new(true),
        origin,
        config.sync.clone(),
    );

    let outcome = engine
        .drain(SyncTrigger::Manual)
        .await
        .context("Sync failed")?;
    print_drain(&outcome);

    let pending = engine.pending_count().await?;
    println!("  Pending: {}", pending);

    Ok(())
}

fn print_drain(outcome: &DrainOutcome) {
    match outcome {
        DrainOutcome::Completed(report) => {
            println!("Sync completed in {:?}", report.duration);
            println!("  Synced: {}", report.success_count);
            println!("  Failed: {}", report.failed_count);
            if report.skipped_count > 0 {
                println!("  Skipped: {}", report.skipped_count);
            }
        }
        DrainOutcome::AlreadyRunning => println!("Sync already running."),
        DrainOutcome::Offline => println!("Offline, nothing synced."),
    }
}

/// Fetch and store the install manifest.
async fn cmd_cache_prime(config: &FinproConfig) -> Result<()> {
    let origin = config.origin_url()?;
    info!("Priming {} from {}", config.cache.cache_name, origin);

    let cache = CacheManager::new(origin, config.cache.clone(), http_transport()?);
    let report = cache.install().await.context("Failed to prime cache")?;

    println!("Cache primed successfully!");
    println!("  Generation: {}", report.cache_name);
    println!("  Assets: {}", report.assets_cached);

    let mut entries = cache.storage().entries(&report.cache_name)?;
    entries.sort_by(|a, b| a.url.cmp(&b.url));
    for key in entries {
        println!("    {}", key.url);
    }

    Ok(())
}

/// Show the interception route for a request.
fn cmd_cache_route(config: &FinproConfig, path: &str, destination: &str, method: &str) -> Result<()> {
    let origin = config.origin_url()?;
    let url = origin
        .join(path)
        .with_context(|| format!("Invalid path: {}", path))?;
    let method: HttpMethod = method.parse().context("Invalid method")?;

    let request =
        FetchRequest::new(method, url.clone()).with_destination(RequestDestination::parse(destination));
    let cache = CacheManager::new(origin, config.cache.clone(), Arc::new(MemoryTransport::new()));

    println!("{} {} -> {:?}", method, url, cache.route(&request));

    Ok(())
}

/// Classify a connection.
fn cmd_network(info: NetworkInfo, device: DeviceProfile, quality: u8) {
    let network = classify(Some(&info));

    println!("Connection:");
    println!("  Quality: {}", network);
    if let Some(effective_type) = info.effective_type {
        println!("  Type: {}", effective_type);
    }
    if let Some(downlink) = info.downlink {
        println!("  Speed: {}", format_speed(downlink));
    }
    if let Some(latency) = info.latency() {
        println!("  Latency: {}", latency);
    }
    if info.save_data {
        println!("  Data saver: on");
    }

    println!("Device:");
    println!("  Class: {}", device.device_class());
    println!("  Orientation: {:?}", device.orientation());
    println!("  Image quality: {}", device.image_quality(quality, network));
    println!(
        "  Prefetch secondary: {}",
        device.should_prefetch_secondary(network)
    );
}

/// Offline lead submission, reconnect and retry against in-memory doubles.
async fn cmd_simulate(config: &FinproConfig, email: &str, status: u16) -> Result<()> {
    let origin = Url::parse("https://fintech.example")?;
    let leads = origin.join("/api/leads")?;

    let store: Arc<dyn QueueStore> = Arc::new(MemoryQueueStore::new());
    let transport = MemoryTransport::new();
    let connectivity = ConnectivityMonitor::new(true);
    let page = HeadlessPage::new(origin.clone());
    let platform = HeadlessPlatform::new();

    for asset in &config.cache.static_assets {
        let url = origin.join(asset)?;
        transport.respond(
            HttpMethod::Get,
            url.as_str(),
            FetchResponse::ok(format!("<!-- {} -->", asset)),
        );
    }

    let cache = Arc::new(CacheManager::new(
        origin.clone(),
        config.cache.clone(),
        Arc::new(transport.clone()),
    ));
    let engine = Arc::new(SyncEngine::new(
        store.clone(),
        Arc::new(transport.clone()),
        connectivity.clone(),
        origin.clone(),
        config.sync.clone(),
    ));
    let worker = ServiceWorker::new(cache.clone(), engine.clone(), Arc::new(platform.clone()))?;

    println!("1. Registering worker");
    let lifecycle = LifecycleController::new(Arc::new(page.clone()), RegistrationConfig::default());
    println!("   {:?}", lifecycle.register().await?);
    worker.install().await?;
    worker.activate().await?;
    page.set_controlled(true);
    println!(
        "   Cached {} assets in {}",
        cache.storage().entry_count(&config.cache.cache_name)?,
        config.cache.cache_name
    );

    println!("2. Going offline");
    connectivity.set_online(false);
    transport.set_online(false);
    let navigation = FetchRequest::get(origin.join("/pricing")?)
        .with_destination(RequestDestination::Document);
    match worker.fetch(navigation).await? {
        FetchDisposition::RespondWith(response) => {
            println!("   /pricing served offline: {}", response.text())
        }
        FetchDisposition::Passthrough => println!("   /pricing not intercepted"),
    }

    let submitter = Submitter::new(
        store.clone(),
        Arc::new(transport.clone()),
        connectivity.clone(),
        Arc::new(page.clone()),
        origin.clone(),
    );
    match submitter
        .submit_form("/api/leads", json!({ "email": email }))
        .await?
    {
        SubmitOutcome::Queued { id } => println!("   Lead queued as {}", id),
        SubmitOutcome::Sent { status } => println!("   Lead sent ({})", status),
    }

    println!("3. Back online, /api/leads answers {}", status);
    transport.respond(
        HttpMethod::Post,
        leads.as_str(),
        FetchResponse::new(status, "{}"),
    );
    transport.set_online(true);
    connectivity.set_online(true);

    for pass in 1..=config.sync.max_attempts {
        let Some(outcome) = worker.sync(&config.sync.background_sync_tag).await? else {
            break;
        };
        if let Some(report) = outcome.report() {
            println!(
                "   Pass {}: {} synced, {} failed",
                pass, report.success_count, report.failed_count
            );
        }
        if engine.pending_count().await? == 0 {
            break;
        }
    }

    println!("4. Final queue");
    let entries = store.list(None).await?;
    if entries.is_empty() {
        println!("   Queue is empty.");
    }
    for entry in entries {
        println!("   {}", serde_json::to_string(&entry)?);
    }

    Ok(())
}
