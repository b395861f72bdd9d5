//! scenelink CLI - OSC sender and HTTP micro-server from the command line
//!
//! Serve a folder with command routes, send one-off OSC messages, or try the
//! rotation controller without a 3D host.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use scenelink_bridge::osc::value_to_osc_arg;
use scenelink_bridge::{
    HttpServer, HttpServerConfig, OscSender, RotationConfig, RotationControl, RoutingMode,
    ServerEvent,
};
use scenelink_core::PropertyValue;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::Config;

/// scenelink - OSC and HTTP plumbing for live scenes
#[derive(Parser)]
#[command(name = "scenelink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "SCENELINK_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve a folder over HTTP until Ctrl+C
    Serve {
        /// Bind address
        #[arg(short, long)]
        bind: Option<String>,

        /// Port number
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// Folder to serve static files from
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Routing mode (handlers-first, files-first)
        #[arg(short, long)]
        mode: Option<RoutingMode>,
    },

    /// Send one OSC message
    Send {
        /// Destination host
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Destination port
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// OSC address
        address: String,

        /// Arguments: integers, floats, true/false, anything else is a string
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,
    },

    /// Run the rotation controller and print every new rotation
    Rot {
        /// Port number
        #[arg(short = 'P', long)]
        port: Option<u16>,

        /// Folder to serve static files from
        #[arg(short, long)]
        root: Option<PathBuf>,

        /// Updates per second
        #[arg(long, default_value = "30")]
        fps: f64,
    },

    /// Show version and defaults
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli.log_level, cli.json_logs)?;

    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            port,
            root,
            mode,
        } => {
            let http = http_config(config.http, bind, port, root, mode);
            run_serve(http)?;
        }

        Commands::Send {
            host,
            port,
            address,
            args,
        } => {
            let mut osc = config.osc;
            if let Some(host) = host {
                osc.host = host;
            }
            if let Some(port) = port {
                osc.port = port;
            }
            let values: Vec<PropertyValue> =
                args.iter().map(|a| PropertyValue::parse_loose(a)).collect();
            run_send(OscSender::new(osc), &address, &values)?;
        }

        Commands::Rot { port, root, fps } => {
            let http = http_config(config.http, None, port, root, None);
            run_rot(http, config.rotation, fps)?;
        }

        Commands::Info => {
            print_info();
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

/// Apply command-line overrides on top of the file configuration
fn http_config(
    mut http: HttpServerConfig,
    bind: Option<String>,
    port: Option<u16>,
    root: Option<PathBuf>,
    mode: Option<RoutingMode>,
) -> HttpServerConfig {
    if let Some(bind) = bind {
        http.bind_host = bind;
    }
    if let Some(port) = port {
        http.port = port;
    }
    if let Some(root) = root {
        http.root = root;
    }
    if let Some(mode) = mode {
        http.routing = mode;
    }
    http
}

/// Channel that yields once Ctrl+C is pressed
fn shutdown_channel() -> Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        let _ = tx.send(());
    })
    .context("Failed to install Ctrl+C handler")?;
    Ok(rx)
}

fn run_serve(config: HttpServerConfig) -> Result<()> {
    let root = config.root.clone();
    let routing = config.routing;
    let mut server = HttpServer::new(config);

    server.not_found_event().subscribe(|ctx| {
        info!(method = %ctx.method(), path = ctx.path(), "Not found");
    });

    let shutdown_rx = shutdown_channel()?;
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    server
        .setup(Some(events_tx))
        .context("Failed to start HTTP server")?;

    match events_rx.blocking_recv() {
        Some(ServerEvent::Started { addr }) => {
            println!(
                "{} Serving {} on http://{} ({})",
                "scenelink".cyan().bold(),
                root.display().to_string().green(),
                addr,
                routing
            );
        }
        Some(ServerEvent::Error(e)) => bail!("HTTP server failed: {}", e),
        _ => bail!("HTTP server stopped unexpectedly"),
    }
    println!("Press Ctrl+C to stop");

    let _ = shutdown_rx.recv();
    server.destroy();
    Ok(())
}

fn run_send(mut sender: OscSender, address: &str, values: &[PropertyValue]) -> Result<()> {
    if !sender.setup() {
        bail!(
            "Could not open OSC socket for {}:{}",
            sender.host(),
            sender.port()
        );
    }

    let args = values.iter().map(value_to_osc_arg).collect();
    sender
        .try_send(address, args)
        .with_context(|| format!("Failed to send {}", address))?;

    let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    println!(
        "{} {} [{}] -> {}:{}",
        "sent".green().bold(),
        address,
        shown.join(", "),
        sender.host(),
        sender.port()
    );
    Ok(())
}

fn run_rot(http: HttpServerConfig, rotation: RotationConfig, fps: f64) -> Result<()> {
    if !fps.is_finite() || fps <= 0.0 {
        bail!("--fps must be a positive number, got {}", fps);
    }

    let pattern = rotation.pattern.clone();
    let mut control = RotationControl::new(HttpServer::new(http), rotation)
        .context("Invalid rotation config")?;
    if !control.setup() {
        bail!("Rotation server failed to start");
    }

    if let Some(addr) = control.server().local_addr() {
        println!(
            "{} Rotation commands on http://{} matching {}",
            "scenelink".cyan().bold(),
            addr,
            pattern.yellow()
        );
        println!("  e.g. curl http://{}/rot/0/45/90", addr);
    }

    let shutdown_rx = shutdown_channel()?;
    let frame = Duration::from_secs_f64(1.0 / fps);
    let mut last = control.rotation();

    loop {
        match shutdown_rx.recv_timeout(frame) {
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        control.update(None);
        let current = control.rotation();
        if current != last {
            let degrees = current.map(f64::to_degrees);
            println!(
                "rotation: x={:8.3} y={:8.3} z={:8.3}",
                degrees[0], degrees[1], degrees[2]
            );
            last = current;
        }
    }

    debug!("Stopping rotation controller");
    control.destroy();
    Ok(())
}

fn print_info() {
    println!("{}", "scenelink - OSC and HTTP plumbing for live scenes".cyan().bold());
    println!();
    println!("Version:    {}", env!("CARGO_PKG_VERSION"));
    println!("Platform:   {}", std::env::consts::OS);
    println!("Arch:       {}", std::env::consts::ARCH);
    println!("Config:     {}", config::default_config_file().display());
    println!();

    let defaults = Config::default();
    println!("{}", "Defaults:".green());
    println!(
        "  OSC target:      {}:{}",
        defaults.osc.host, defaults.osc.port
    );
    println!(
        "  HTTP server:     {}:{} serving {}",
        defaults.http.bind_host,
        defaults.http.port,
        defaults.http.root.display()
    );
    println!("  Routing:         {}", defaults.http.routing);
    println!("  Rotation route:  {}", defaults.rotation.pattern);
    println!();
    println!("{}", "Examples:".green());
    println!("  scenelink serve --root ./www          # Serve a folder on port 2031");
    println!("  scenelink send /cue/start             # Argument-less OSC message");
    println!("  scenelink send -P 9000 /fader 0.5 on  # Float and string arguments");
    println!("  scenelink rot --fps 60                # Rotation controller demo");
}
