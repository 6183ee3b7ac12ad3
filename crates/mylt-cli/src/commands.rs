//! Subcommand handlers

use crate::defaults_store::ConfigStore;
use crate::error::MyltError;
use crate::options::{OptionSpec, RunArgs};
use crate::resolver::{resolve_from_store, ResolvedCommand};
use crate::runner::{ProcessRunner, RunOutcome};
use crate::steps::{run_steps, steps_for};
use std::future::Future;
use tracing::info;

/// Value stored by `mylt set <key>` when no value is given
pub const DEFAULT_SET_VALUE: &str = "true";

/// Apply preparation steps and resolve the tunnel client command.
///
/// Fails with a usage error when no port can be resolved.
pub fn prepare_run(store: &mut ConfigStore, args: &RunArgs) -> Result<ResolvedCommand, MyltError> {
    for report in run_steps(&steps_for(args), store)? {
        println!("✅ {}", report);
    }

    let command = resolve_from_store(store, &args.explicit_flags());

    if command.value_of(OptionSpec::Port).is_none() {
        return Err(MyltError::Usage(
            "No local port to expose. Pass --port <PORT> or save one with: mylt set port <PORT>"
                .to_string(),
        ));
    }

    Ok(command)
}

/// `mylt run`: resolve the command and run the tunnel client until it exits
/// or `shutdown` resolves.
pub async fn handle_run<F>(
    store: &mut ConfigStore,
    runner: &ProcessRunner,
    args: &RunArgs,
    shutdown: F,
) -> Result<RunOutcome, MyltError>
where
    F: Future<Output = ()>,
{
    let command = prepare_run(store, args)?;

    println!("Executing: {} {}", runner.program(), command);

    let outcome = runner.run(&command, shutdown).await?;
    info!(?outcome, "Tunnel client finished");
    println!("Closing tunnel connection.");

    Ok(outcome)
}

/// Lines printed by `mylt list`
pub fn list_lines(store: &ConfigStore) -> Vec<String> {
    store
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect()
}

pub fn handle_list(store: &ConfigStore) {
    if store.is_empty() {
        println!("No defaults saved");
        println!("Save one with: mylt set <key> [value]");
        return;
    }

    for line in list_lines(store) {
        println!("{}", line);
    }
}

pub fn handle_set(store: &mut ConfigStore, key: &str, value: Option<&str>) -> Result<(), MyltError> {
    let value = value.unwrap_or(DEFAULT_SET_VALUE);
    println!("Setting \"{}\" to \"{}\"", key, value);
    store.set(key, value)?;
    Ok(())
}

pub fn handle_unset(store: &mut ConfigStore, key: &str) -> Result<(), MyltError> {
    println!("Removing \"{}\"", key);
    if !store.unset(key)? {
        info!(key, "Key was not set");
    }
    Ok(())
}

pub fn handle_trust(store: &mut ConfigStore) -> Result<(), MyltError> {
    println!("Trusting self-signed certificates by default");
    store.trust()?;
    Ok(())
}

pub fn handle_host(store: &mut ConfigStore, host: &str) -> Result<(), MyltError> {
    println!("Setting default host to \"{}\"", host);
    store.set_default_host(host)?;
    Ok(())
}
