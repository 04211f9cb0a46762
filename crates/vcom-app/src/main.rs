mod cli;
mod lifecycle;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;
use vcom_common::{ConfigError, VcomError};
use vcom_config::TunnelConfig;

const DEFAULT_DIRECTIVE: &str = "vcom_app=info,vcom_tunnel=info,vcom_config=info";
const DEBUG_DIRECTIVE: &str = "vcom_app=debug,vcom_tunnel=debug,vcom_config=debug";

/// Filter directive when `RUST_LOG` is not set: `--log-level` wins, then the
/// debug toggle, then the default.
fn log_directive(log_level: Option<&str>, debug: bool) -> &str {
    match log_level {
        Some(directive) => directive,
        None if debug => DEBUG_DIRECTIVE,
        None => DEFAULT_DIRECTIVE,
    }
}

fn init_logging(log_level: Option<&str>, debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = log_directive(log_level, debug);
        EnvFilter::try_new(directive).unwrap_or_else(|e| {
            eprintln!("invalid log directive '{directive}': {e}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// An explicit `--config` must load; the default location falls back to
/// defaults with a warning.
fn resolve_config(
    args: &cli::Args,
    loaded: Result<TunnelConfig, ConfigError>,
) -> Result<TunnelConfig, ConfigError> {
    match (loaded, args.config.as_deref()) {
        (Ok(config), Some(path)) => {
            tracing::info!(path = %path.display(), "using config override");
            Ok(config)
        }
        (Ok(config), None) => Ok(config),
        (Err(e), Some(_)) => Err(e),
        (Err(e), None) => {
            tracing::warn!("config load failed, using defaults: {e}");
            Ok(TunnelConfig::default())
        }
    }
}

fn run(args: cli::Args, loaded: Result<TunnelConfig, ConfigError>) -> Result<(), VcomError> {
    let mut config = resolve_config(&args, loaded)?;
    args.apply(&mut config);
    vcom_config::validation::validate(&config)?;

    if args.print_config {
        println!("{}", vcom_config::config_to_json(&config));
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(lifecycle::run(config));
    // A connect abandoned during startup may still be blocked in the OS;
    // don't wait for it on the way out.
    runtime.shutdown_background();
    result
}

fn main() -> ExitCode {
    let args = cli::parse();

    // Loaded ahead of logging so `[logging] debug` can raise the filter;
    // the outcome is reported once the subscriber is up.
    let loaded = vcom_config::load_config(args.config.as_deref());
    let debug = args.verbose || loaded.as_ref().is_ok_and(|c| c.logging.debug);
    init_logging(args.log_level.as_deref(), debug);
    tracing::info!("vcom v{} starting", env!("CARGO_PKG_VERSION"));

    match run(args, loaded) {
        Ok(()) => {
            tracing::info!("shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
