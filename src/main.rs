use actix_web::{web, App, HttpServer};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use netsniffer::api::{routes, ApiState};
use netsniffer::capture::synthetic::DEMO_INTERFACES;
use netsniffer::console;
use netsniffer::models::config::AppConfig;
use netsniffer::models::session::CaptureSession;
use netsniffer::utils::logging;
use netsniffer::{DemoEngine, LiveEngine, TrafficMonitor};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Live network packet capture and analysis with REST API")]
struct Args {
    /// Network interface to capture from on startup
    #[clap(short, long)]
    interface: Option<String>,

    /// Capture filter expression, e.g. "tcp port 80"
    #[clap(short, long)]
    filter: Option<String>,

    /// Port for the REST API server
    #[clap(short, long)]
    port: Option<u16>,

    /// Address for the REST API server
    #[clap(long)]
    host: Option<String>,

    /// Use synthetic traffic instead of a live interface (no privileges needed)
    #[clap(long)]
    demo: bool,

    /// Show a terminal view instead of serving the API
    #[clap(long)]
    console: bool,

    /// Number of packets kept in memory
    #[clap(long)]
    buffer_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error, off)
    #[clap(long)]
    log_level: Option<String>,

    /// JSON configuration file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Directory export files are written to
    #[clap(long)]
    export_dir: Option<PathBuf>,

    /// Print available interfaces and exit
    #[clap(long)]
    list_interfaces: bool,
}

/// Defaults, then config file, then environment, then command line
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env();

    if args.interface.is_some() {
        config.interface = args.interface.clone();
    }
    if args.filter.is_some() {
        config.filter = args.filter.clone();
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if args.demo {
        config.demo = true;
    }
    if let Some(port) = args.port {
        if config.demo {
            config.demo_port = port;
        } else {
            config.port = port;
        }
    }
    if let Some(buffer_size) = args.buffer_size {
        config.engine.buffer_capacity = buffer_size;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(dir) = &args.export_dir {
        config.export_dir = dir.clone();
    }

    Ok(config)
}

#[actix_web::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logger with specified level
    logging::init_logger(logging::get_log_level(&config.log_level));

    info!("Starting netsniffer v{}", env!("CARGO_PKG_VERSION"));

    let problems = config.validate();
    if !problems.is_empty() {
        for problem in &problems {
            error!("Configuration error: {}", problem);
        }
        bail!("invalid configuration: {}", problems.join("; "));
    }

    let monitor: Arc<dyn TrafficMonitor> = if config.demo {
        info!("Demo mode: generating synthetic traffic");
        Arc::new(DemoEngine::demo(config.engine.clone(), config.demo_settings.clone()))
    } else {
        Arc::new(LiveEngine::live(config.engine.clone()))
    };

    if args.list_interfaces {
        return print_interfaces(monitor.as_ref());
    }

    let default_interface = config
        .interface
        .clone()
        .or_else(|| config.demo.then(|| DEMO_INTERFACES[0].to_string()));

    if args.console {
        return run_console(monitor, default_interface, config.filter.clone().unwrap_or_default()).await;
    }

    if let Some(interface) = &config.interface {
        let filter = config.filter.clone().unwrap_or_default();
        if let Err(e) = start_blocking(monitor.clone(), interface.clone(), filter).await {
            warn!("Initial capture on {} failed: {}. {}", interface, e, e.remediation());
        }
    }

    let state = web::Data::new(ApiState {
        monitor: monitor.clone(),
        export_dir: config.export_dir.clone(),
        default_interface,
        demo: config.demo,
    });

    let port = config.listen_port();
    info!("Starting netsniffer API server on {}:{}", config.host, port);

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), port))?
    .run()
    .await?;

    info!("Server stopped, shutting down capture");
    tokio::task::spawn_blocking(move || monitor.stop()).await?;

    Ok(())
}

async fn start_blocking(
    monitor: Arc<dyn TrafficMonitor>,
    interface: String,
    filter: String,
) -> netsniffer::CaptureResult<()> {
    match tokio::task::spawn_blocking(move || monitor.start(&interface, &filter)).await {
        Ok(result) => result.map(|session| info!("Capture session {} started", session.id)),
        Err(e) => Err(netsniffer::CaptureError::SourceFailure(format!(
            "start task failed: {}",
            e
        ))),
    }
}

fn print_interfaces(monitor: &dyn TrafficMonitor) -> Result<()> {
    let interfaces = monitor
        .list_interfaces()
        .map_err(|e| anyhow!("{}. {}", e, e.remediation()))?;

    if interfaces.is_empty() {
        println!("No network interfaces found.");
        return Ok(());
    }

    println!("Available network interfaces:");
    for (index, info) in interfaces.iter().enumerate() {
        println!(
            "{:>3}. {} [{}]",
            index + 1,
            info.formatted_display(),
            info.flags().join(", ")
        );
        if let Some(description) = &info.description {
            println!("       {}", description);
        }
        if let Some(mac) = &info.mac_address {
            println!("       MAC: {}", mac);
        }
    }
    Ok(())
}

async fn run_console(
    monitor: Arc<dyn TrafficMonitor>,
    interface: Option<String>,
    filter: String,
) -> Result<()> {
    let interface = match interface {
        Some(interface) => interface,
        None => bail!("console mode needs --interface (see --list-interfaces) or --demo"),
    };

    start_blocking(monitor.clone(), interface, filter)
        .await
        .map_err(|e| anyhow!("{}. {}", e, e.remediation()))?;

    let mut ticker = interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                console::draw(monitor.as_ref())?;
                if let CaptureSession::Failed(reason) = monitor.session_state() {
                    error!("Capture failed: {}", reason);
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping capture...");
                break;
            }
        }
    }

    let stopper = monitor.clone();
    tokio::task::spawn_blocking(move || stopper.stop()).await?;

    let stats = monitor.stats();
    println!(
        "Captured {} packets ({} bytes) in this session",
        stats.total_packets, stats.total_bytes
    );
    Ok(())
}
