//! mylt - saved defaults for the localtunnel client
//!
//! Keeps default `lt` options in a small persisted store, merges them with
//! the options given on the command line and runs `lt` with the result.

pub mod commands;
pub mod defaults_store;
pub mod error;
pub mod options;
pub mod resolver;
pub mod runner;
pub mod steps;
pub mod trust;

pub use defaults_store::{ConfigEntry, ConfigStore, StoreError};
pub use error::MyltError;
pub use options::{ExplicitFlags, OptionSpec, RunArgs};
pub use resolver::{resolve, ResolvedCommand};
pub use runner::{ChildLine, ProcessRunner, RunOutcome, RunnerError, ShutdownSignal};
pub use trust::{CertValidation, TlsTrustScope};
