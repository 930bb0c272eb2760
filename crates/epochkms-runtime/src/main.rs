//! epochkms command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Encrypt to base64 text with keys kept under ./keys
//! echo -n hello | epochkms --location ./keys encrypt
//!
//! # Decrypt it again
//! epochkms --location ./keys decrypt < sealed.txt
//!
//! # Hourly rotation, keys in a redb file
//! epochkms --store redb --location keys.redb --rotation-period-secs 3600 current-id
//! ```

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::Parser;
use epochkms_core::{Environment, Kms};
use epochkms_runtime::{
    BackendKind, Command, ConfigOverrides, RuntimeError, StoreBackend, SystemEnv, commands,
    settings,
};
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Time-windowed key management
#[derive(Parser, Debug)]
#[command(name = "epochkms")]
#[command(about = "Encrypt and sign payloads with time-windowed keys")]
#[command(version)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, env = "EPOCHKMS_CONFIG")]
    config: Option<PathBuf>,

    /// Key store backend
    #[arg(long, value_enum, default_value_t = BackendKind::Fs, env = "EPOCHKMS_STORE")]
    store: BackendKind,

    /// Store directory (fs) or database file or directory (redb)
    #[arg(short, long, default_value = ".", env = "EPOCHKMS_LOCATION")]
    location: PathBuf,

    #[command(flatten)]
    overrides: ConfigOverrides,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    match execute(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "epochkms failed");
            ExitCode::FAILURE
        },
    }
}

fn execute(args: &Args) -> Result<(), RuntimeError> {
    let (config, scheme) = settings::resolve(args.config.as_deref(), &args.overrides)?;
    let env = SystemEnv::new();
    let mut stdout = io::stdout().lock();

    if !args.command.needs_store() {
        return commands::check_config(&config, &scheme, env.now(), &mut stdout);
    }

    let store = StoreBackend::open(args.store, &args.location)?;
    debug!(store = ?args.store, location = %args.location.display(), "opened key store");

    let kms = Kms::new(store, env, &config)?;
    commands::run(args.command, &kms, &mut io::stdin().lock(), &mut stdout)?;
    stdout.flush()?;
    Ok(())
}
