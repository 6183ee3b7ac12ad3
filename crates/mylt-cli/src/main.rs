//! mylt CLI - run localtunnel with saved defaults

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mylt_cli::commands;
use mylt_cli::defaults_store::{default_store_dir, ConfigStore};
use mylt_cli::error::{MyltError, EXIT_FAILURE};
use mylt_cli::options::RunArgs;
use mylt_cli::runner::{ProcessRunner, ShutdownSignal, DEFAULT_TUNNEL_BIN};
use mylt_cli::trust::TlsTrustScope;

/// Run localtunnel (lt) with saved defaults
#[derive(Parser, Debug)]
#[command(name = "mylt")]
#[command(about = "Run localtunnel (lt) with saved defaults", long_about = None)]
#[command(version = env!("GIT_TAG"))]
#[command(long_version = concat!(env!("GIT_TAG"), "\nCommit: ", env!("GIT_HASH"), "\nBuilt: ", env!("BUILD_TIME")))]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory holding saved defaults (default: .storage next to the executable)
    #[arg(long, env = "MYLT_STORE_DIR", global = true)]
    store_dir: Option<PathBuf>,

    /// Tunnel client executable
    #[arg(long, env = "MYLT_LT_BIN", default_value = DEFAULT_TUNNEL_BIN, global = true)]
    lt_bin: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run localtunnel (lt) with defaults, or provide lt options
    Run(RunArgs),
    /// List saved default values
    List,
    /// Set a default value for localtunnel
    Set {
        /// Option name (e.g. port, subdomain, p)
        key: String,
        /// Value to save (defaults to "true")
        value: Option<String>,
    },
    /// Remove a default value
    Unset {
        /// Option name
        key: String,
    },
    /// Trust self-signed certificates by default (same as: mylt set trust)
    Trust,
    /// Set the default tunnel server host (same as: mylt set host <URL>)
    Host {
        /// Tunnel server URL
        url: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let code = match real_main().await {
        Ok(code) => code,
        Err(err) => report(&err),
    };

    std::process::exit(code);
}

async fn real_main() -> Result<i32> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            // --help and --version land here too
            let code = if err.use_stderr() { EXIT_FAILURE } else { 0 };
            err.print().ok();
            return Ok(code);
        }
    };

    init_logging(&cli.log_level)?;

    // Captured before anything else runs; only the child's copy is ever changed
    let trust = TlsTrustScope::capture();

    let Some(command) = cli.command else {
        Cli::command().print_help().ok();
        println!();
        return Ok(0);
    };

    let store_dir = match cli.store_dir {
        Some(dir) => dir,
        None => default_store_dir().context("Failed to locate the mylt executable")?,
    };
    debug!(store_dir = %store_dir.display(), "Opening defaults store");

    // SIGINT/SIGTERM are handled for every subcommand; only `run` has a child to stop
    let result = match ShutdownSignal::install() {
        Ok(shutdown) => dispatch(command, &store_dir, &cli.lt_bin, trust.clone(), shutdown).await,
        Err(err) => Err(MyltError::Signal(err)),
    };

    if !trust.is_intact() {
        warn!("Certificate validation setting changed during the run");
    }

    match result {
        Ok(code) => Ok(code),
        Err(err) => {
            if err.is_usage() {
                let mut cmd = Cli::command();
                if let Some(run) = cmd.find_subcommand_mut("run") {
                    run.print_help().ok();
                    println!();
                }
            }
            eprintln!("❌ {}", err);
            error!(error = %err, "Command failed");
            Ok(err.exit_code())
        }
    }
}

async fn dispatch(
    command: Commands,
    store_dir: &std::path::Path,
    lt_bin: &str,
    trust: TlsTrustScope,
    shutdown: ShutdownSignal,
) -> Result<i32, MyltError> {
    let mut store = ConfigStore::open(store_dir)?;

    match command {
        Commands::Run(args) => {
            let runner = ProcessRunner::new(lt_bin, trust);

            let outcome = commands::handle_run(&mut store, &runner, &args, shutdown.recv()).await?;
            Ok(outcome.exit_code())
        }
        Commands::List => {
            commands::handle_list(&store);
            Ok(0)
        }
        Commands::Set { key, value } => {
            commands::handle_set(&mut store, &key, value.as_deref())?;
            Ok(0)
        }
        Commands::Unset { key } => {
            commands::handle_unset(&mut store, &key)?;
            Ok(0)
        }
        Commands::Trust => {
            commands::handle_trust(&mut store)?;
            Ok(0)
        }
        Commands::Host { url } => {
            commands::handle_host(&mut store, &url)?;
            Ok(0)
        }
    }
}

fn report(err: &anyhow::Error) -> i32 {
    eprintln!("❌ {:#}", err);
    EXIT_FAILURE
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(log_level))
        .context("Failed to initialize logging filter")?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    Ok(())
}
