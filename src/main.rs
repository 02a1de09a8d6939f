//! Kogia CLI
//!
//! Autoscales docker swarm services on RabbitMQ queue depth.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kogia::backends::{DockerSwarm, RabbitMqMetrics};
use kogia::utils::format_duration;
use kogia::{
    ConfigLoader, KogiaCallbacks, KogiaConfig, KogiaEngine, KogiaError, KogiaHandle, KogiaResult,
    ResolvedConfig, DEFAULT_CONFIG_PATH,
};

/// Kogia - queue-driven autoscaler for docker swarm services
#[derive(Parser)]
#[command(name = "kogia")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Check the configuration and exit
    #[arg(short, long)]
    test: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = if cli.test {
        test_config(&cli.config)
    } else {
        run(&cli.config).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match write_report(&mut std::io::stdout(), &e) {
                Ok(true) => {}
                Ok(false) => error!("{}", e),
                Err(io) => error!("{} ({})", e, io),
            }
            ExitCode::FAILURE
        }
    }
}

/// Validation reports go to stdout next to the `-t` summary; returns
/// whether `err` was one
fn write_report(out: &mut impl Write, err: &KogiaError) -> std::io::Result<bool> {
    match err {
        KogiaError::Validation { report } => {
            write!(out, "{}", report)?;
            out.flush()?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn load(path: &str) -> KogiaResult<KogiaConfig> {
    let config = ConfigLoader::load_file(path)?;
    info!(path, services = config.services.len(), "configuration loaded");
    Ok(config)
}

fn test_config(path: &str) -> KogiaResult<()> {
    let config = load(path)?;
    println!("the configuration file {} syntax is ok", path);

    let resolved = config.resolve()?;
    print_summary(&resolved);
    println!("configuration file {} test is successful", path);
    Ok(())
}

fn print_summary(config: &ResolvedConfig) {
    println!("services ({}):", config.services().len());
    for policy in config.services() {
        println!(
            "  - {}: metrics [{}], coverage {}, threshold {}, replicas {}..{}, sample every {}, scale every {}, delays up {} / down {}",
            policy.service,
            policy.metrics.join(", "),
            policy.coverage,
            policy.threshold,
            policy.min_replicas,
            policy.max_replicas,
            format_duration(policy.sample_rate),
            format_duration(policy.scale_rate),
            format_duration(policy.upscale_delay),
            format_duration(policy.downscale_delay),
        );
    }
}

async fn run(path: &str) -> KogiaResult<()> {
    let config = load(path)?.resolve()?;
    let connection = &config.connection;

    let metrics = RabbitMqMetrics::connect(&connection.amqp, connection.timeout).await?;
    let swarm = DockerSwarm::connect(&connection.docker, connection.timeout).await?;
    info!(vhost = metrics.vhost(), "backends connected");

    let engine = KogiaEngine::new(&config, KogiaCallbacks::new(Arc::new(metrics), Arc::new(swarm)))?;
    tokio::spawn(shutdown_on_signal(engine.handle()));

    engine.start().await
}

async fn shutdown_on_signal(handle: KogiaHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown requested");
    handle.shutdown();
}
