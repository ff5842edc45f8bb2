//! # Device-Oxide CLI
//!
//! Lists capability profiles and attached devices, resolves `--device`
//! requests, and smoke-checks a full session lifecycle against an Appium
//! server.
//!
//! ## Environment variables
//! - `DEVICE_OXIDE_SERVER_URL`: Appium server (default: http://localhost:4723)
//! - `DEVICE_OXIDE_PROFILES`: TOML profile catalogue (default: built-in)
//! - `DEVICE_OXIDE_APP_ROOT`: base directory for the built-in catalogue's
//!   relative app paths (default: working directory)
//! - `DEVICE_OXIDE_DEVICE`: default device request (default: auto_detect)
//! - `RUST_LOG`: log level, overriding the configured one

use anyhow::Context;
use clap::{Parser, Subcommand};
use device_oxide::{
    config::Config,
    device::{host_inventory, DeviceInventory, DeviceRequest, DeviceResolver, ResolvedDevice},
    driver::{AppiumDriver, AutomationDriver},
    profile::{Platform, ProfileStore},
    session::{ResetChain, SessionManager},
    Error,
};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Device resolution and session lifecycle for mobile UI automation
#[derive(Parser)]
#[command(name = "device-oxide")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, env = "DEVICE_OXIDE_CONFIG")]
    config: Option<String>,

    /// Appium server URL
    #[arg(long, global = true)]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capability profiles grouped by platform
    Profiles {
        /// Only show one platform
        #[arg(long)]
        platform: Option<Platform>,
    },

    /// List attached devices, emulators and simulators
    Devices,

    /// Resolve a device request and print the merged capabilities
    Resolve {
        /// Profile id or `auto_detect`
        #[arg(long)]
        device: Option<String>,

        /// Restrict auto-detect to one platform
        #[arg(long)]
        platform: Option<Platform>,
    },

    /// Open a session, check it, optionally reset the app, then close it
    Check {
        /// Profile id or `auto_detect`
        #[arg(long)]
        device: Option<String>,

        /// Restrict auto-detect to one platform
        #[arg(long)]
        platform: Option<Platform>,

        /// Run the app reset chain inside the session
        #[arg(long)]
        reset: bool,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?.with_env()?,
        None => Config::from_env()?,
    };
    if let Some(url) = &cli.server_url {
        config.server_url = url.clone();
    }
    Ok(config)
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    // RUST_LOG wins over the configured level
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<Level>().ok())
        .or_else(|| config.log_level.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;
    Ok(())
}

fn load_profiles(config: &Config) -> anyhow::Result<Arc<ProfileStore>> {
    let store = match &config.profiles_path {
        Some(path) => ProfileStore::from_file(path)?,
        None => ProfileStore::builtin(),
    };
    let store = match &config.app_root {
        Some(root) => store.with_app_root(root),
        None => store,
    };
    Ok(ProfileStore::install_global(store)?)
}

fn device_request(
    config: &Config,
    device: Option<String>,
    platform: Option<Platform>,
) -> anyhow::Result<DeviceRequest> {
    let raw = device.unwrap_or_else(|| config.device.clone());
    let request: DeviceRequest = raw.parse()?;
    Ok(request.with_platform(platform))
}

async fn resolve(
    config: &Config,
    device: Option<String>,
    platform: Option<Platform>,
) -> anyhow::Result<ResolvedDevice> {
    let store = load_profiles(config)?;
    let resolver = DeviceResolver::new(store, Arc::new(host_inventory(config)))
        .verify_app(config.verify_app);
    let request = device_request(config, device, platform)?;
    info!("Resolving {}", request);
    Ok(resolver.resolve(&request).await?)
}

fn print_profiles(config: &Config, platform: Option<Platform>) -> anyhow::Result<()> {
    let store = load_profiles(config)?;
    let platforms = match platform {
        Some(p) => vec![p],
        None => vec![Platform::Android, Platform::IOS],
    };

    for platform in platforms {
        println!("{}:", platform);
        let profiles = store.profiles_for(platform);
        if profiles.is_empty() {
            println!("  (none)");
        }
        for profile in profiles {
            println!(
                "  {:<28} {:<8} {}",
                profile.id,
                profile.platform_version.as_deref().unwrap_or("any"),
                profile.device_name.as_deref().unwrap_or("-")
            );
        }
        if store.auto_detect_template(platform).is_some() {
            println!("  {:<28} {:<8} first ready device", device_oxide::profile::AUTO_DETECT, "any");
        }
    }
    Ok(())
}

async fn print_devices(config: &Config) -> anyhow::Result<()> {
    let devices = host_inventory(config).list_devices().await?;
    if devices.is_empty() {
        println!("No devices attached; start an emulator or simulator");
        return Ok(());
    }

    println!("{:<40} {:<8} {:<10} {:<10} NAME", "DEVICE", "PLATFORM", "VERSION", "STATUS");
    for device in devices {
        println!(
            "{:<40} {:<8} {:<10} {:<10} {}",
            device.device_id,
            device.platform.to_string(),
            device.version,
            device.status.to_string(),
            device.name.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn print_resolution(
    config: &Config,
    device: Option<String>,
    platform: Option<Platform>,
) -> anyhow::Result<()> {
    let resolved = resolve(config, device, platform).await?;
    println!(
        "{} -> {} ({} {})",
        resolved.profile_id, resolved.device_id, resolved.platform, resolved.version
    );
    let capabilities = serde_json::Value::Object(resolved.capabilities.to_w3c());
    println!("{}", serde_json::to_string_pretty(&capabilities)?);
    Ok(())
}

async fn check(
    config: &Config,
    device: Option<String>,
    platform: Option<Platform>,
    reset: bool,
    cancel: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let resolved = resolve(config, device, platform).await?;

    let driver = Arc::new(
        AppiumDriver::new(&config.server_url)?.with_create_timeout(config.open_timeout()),
    );
    match driver.server_ready().await {
        Ok(true) => info!("Appium server at {} is ready", config.server_url),
        Ok(false) => warn!("Appium server at {} reports not ready", config.server_url),
        Err(e) => warn!("Appium status check failed: {}", e),
    }

    let manager = SessionManager::from_config(driver, config);
    let reset_chain = reset.then(|| ResetChain::standard(config));
    let checker = manager.clone();

    let summary = manager
        .with_session_until(&resolved, cancel, move |session| {
            async move {
                let manager = checker;
                let healthy = manager.health_check(session).await;
                let strategy = match reset_chain {
                    Some(chain) => Some(chain.run(session).await?),
                    None => None,
                };
                Ok((session.id().to_string(), session.attempts().len(), healthy, strategy))
            }
            .boxed()
        })
        .await;

    let summary = match summary {
        Ok(summary) => summary,
        Err(Error::Cancelled(what)) => {
            warn!("Interrupted; {} was torn down", what);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let (session_id, attempts, healthy, strategy) = summary;
    println!(
        "Session {} on {}: {} attempt(s), {}",
        session_id,
        resolved.device_id,
        attempts,
        if healthy { "healthy" } else { "unhealthy" }
    );
    if let Some(strategy) = strategy {
        println!("App reset via {}", strategy);
    }
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM signal"),
            _ = sigint.recv() => info!("Received SIGINT signal"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C signal");
    }

    Ok(())
}

/// Completes on SIGINT/SIGTERM; never completes if signals cannot be installed
async fn interrupted() {
    if let Err(e) = shutdown_signal().await {
        warn!("Signal handling unavailable: {}", e);
        futures::future::pending::<()>().await;
    }
}

/// Run work that holds no session, abandoning it on a signal
async fn interruptible(work: impl Future<Output = anyhow::Result<()>>) -> anyhow::Result<()> {
    tokio::select! {
        result = work => result,
        signal = shutdown_signal() => {
            signal?;
            warn!("Interrupted");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_tracing(&config)?;

    info!("Device-Oxide v{}", device_oxide::VERSION);

    match cli.command {
        Commands::Profiles { platform } => print_profiles(&config, platform),
        Commands::Devices => interruptible(print_devices(&config)).await,
        Commands::Resolve { device, platform } => {
            interruptible(print_resolution(&config, device, platform)).await
        }
        // signals are raced inside the session scope; the session is closed first
        Commands::Check {
            device,
            platform,
            reset,
        } => check(&config, device, platform, reset, interrupted()).await,
    }
}
