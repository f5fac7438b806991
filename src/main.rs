use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use gce_provisioner::cancel::cancel_pair;
use gce_provisioner::clock::SystemClock;
use gce_provisioner::config::{app_dir, Settings};
use gce_provisioner::gcp::{CatalogClient, GcpClient};
use gce_provisioner::pricing::{estimate_monthly_cost, format_monthly_estimate};
use gce_provisioner::provision::reference::region_from_zone;
use gce_provisioner::provision::{
    OperationPoller, ProvisioningConfig, ProvisioningModel, Provisioner,
};
use gce_provisioner::resource::Catalog;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Provision Compute Engine VMs from a declarative configuration
#[derive(Parser, Debug)]
#[command(name = "gce-provisioner", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// GCP zone to use
    #[arg(short, long, global = true)]
    zone: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the VM described by a JSON or YAML file
    Provision {
        #[arg(short, long)]
        file: PathBuf,

        /// Print the insert request instead of creating anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List catalog resources
    List {
        #[arg(value_enum)]
        kind: ListKind,

        /// Region for regional resources (defaults to the zone's region)
        #[arg(long)]
        region: Option<String>,

        /// Image project for `images` and `image-families`
        #[arg(long, default_value = "debian-cloud")]
        image_project: String,
    },
    /// Save --project and --zone as defaults, or show the current settings
    Configure,
    /// Estimate the monthly cost of a machine shape
    Estimate {
        #[arg(long)]
        region: String,

        #[arg(long)]
        vcpus: f64,

        #[arg(long)]
        memory_gb: f64,

        #[arg(long)]
        spot: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListKind {
    Regions,
    Zones,
    MachineTypes,
    DiskTypes,
    Images,
    CustomImages,
    ImageFamilies,
    Disks,
    Snapshots,
    ResourcePolicies,
    Networks,
    Subnetworks,
    Addresses,
    Firewalls,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = get_log_path();
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // RUST_LOG refines the level, e.g. `gce_provisioner::resource=trace`
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(tracing_level.to_string().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("gce-provisioner started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Ok(Some(guard))
}

fn get_log_path() -> PathBuf {
    if let Some(dir) = app_dir() {
        return dir.join("gce-provisioner.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".gce-provisioner").join("gce-provisioner.log");
    }
    PathBuf::from("gce-provisioner.log")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(settings: &Settings, project: &str) -> Result<Arc<GcpClient>> {
    let client = GcpClient::with_base_url(project, &settings.api_base_url).await?;
    if client.project_id().is_empty() {
        bail!("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag");
    }
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(args.log_level)?;

    let mut settings = Settings::load();
    let project = settings.effective_project(args.project.as_deref());
    let zone = settings.effective_zone(args.zone.as_deref());

    match args.command {
        Command::Configure => {
            if args.project.is_some() || args.zone.is_some() {
                settings.update_defaults(args.project.as_deref(), args.zone.as_deref())?;
                let path = settings.save()?;
                tracing::info!("Saved settings to {}", path.display());
            }
            print_json(&settings)
        },
        Command::Estimate {
            region,
            vcpus,
            memory_gb,
            spot,
        } => {
            let model = if spot {
                ProvisioningModel::Spot
            } else {
                ProvisioningModel::Standard
            };
            let cost = estimate_monthly_cost(&region, model, vcpus, memory_gb);
            print_json(&serde_json::json!({
                "region": region,
                "provisioningModel": model.as_str(),
                "monthlyCost": cost,
                "estimate": format_monthly_estimate(cost),
            }))
        },
        Command::Provision { file, dry_run } => {
            let mut config = ProvisioningConfig::from_file(&file)?;
            if config.zone.trim().is_empty() {
                config.zone = zone;
            }

            let client = connect(&settings, &project).await?;
            let catalog = Arc::new(Catalog::with_clock(
                client,
                Arc::new(SystemClock),
                settings.cache_ttl(),
            ));
            let poller = OperationPoller::new(Arc::new(SystemClock))
                .with_interval(settings.poll_interval())
                .with_timeout(settings.poll_timeout());
            let provisioner = Provisioner::new(catalog, poller);

            if dry_run {
                return print_json(&provisioner.plan(&config).await?);
            }

            let (handle, signal) = cancel_pair();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling provisioning");
                    handle.cancel();
                }
            });

            let result = provisioner.provision(&config, &signal).await?;
            print_json(&result.to_map())
        },
        Command::List {
            kind,
            region,
            image_project,
        } => {
            let client = connect(&settings, &project).await?;
            let project = client.project_id().to_string();
            let catalog = Catalog::with_clock(client, Arc::new(SystemClock), settings.cache_ttl());
            let region = region.unwrap_or_else(|| region_from_zone(&zone));
            list(&catalog, kind, &project, &zone, &region, &image_project).await
        },
    }
}

async fn list(
    catalog: &Catalog,
    kind: ListKind,
    project: &str,
    zone: &str,
    region: &str,
    image_project: &str,
) -> Result<()> {
    match kind {
        ListKind::Regions => print_json(&catalog.list_regions(project).await?),
        ListKind::Zones => print_json(&catalog.list_zones(project, Some(region)).await?),
        ListKind::MachineTypes => print_json(&catalog.list_machine_types(project, zone).await?),
        ListKind::DiskTypes => print_json(&catalog.list_disk_types(project, zone).await?),
        ListKind::Images => print_json(&catalog.list_public_images(image_project).await?),
        ListKind::CustomImages => print_json(&catalog.list_custom_images(project).await?),
        ListKind::ImageFamilies => print_json(&catalog.list_image_families(image_project).await?),
        ListKind::Disks => print_json(&catalog.list_disks(project, zone).await?),
        ListKind::Snapshots => print_json(&catalog.list_snapshots(project).await?),
        ListKind::ResourcePolicies => {
            print_json(&catalog.list_resource_policies(project, region).await?)
        },
        ListKind::Networks => print_json(&catalog.list_networks(project).await?),
        ListKind::Subnetworks => print_json(&catalog.list_subnetworks(project, region).await?),
        ListKind::Addresses => print_json(&catalog.list_addresses(project, region).await?),
        ListKind::Firewalls => print_json(&catalog.list_firewalls(project).await?),
    }
}
