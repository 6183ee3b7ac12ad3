//! Preparation steps that `mylt run` performs before resolving the command
//!
//! Each step is independent of the others. All of them run, in order, and
//! the caller gets either every report or the first failure.

use crate::defaults_store::{ConfigStore, StoreError, HOST_KEY, TRUST_KEY};
use crate::options::RunArgs;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrepStep {
    /// Persist the default tunnel server host
    DefaultHost(String),
    /// Persist trust of self-signed certificates
    AlwaysTrust,
}

/// What a completed step changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub key: &'static str,
    pub value: String,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Saved default \"{}\" = \"{}\"", self.key, self.value)
    }
}

impl PrepStep {
    pub fn apply(&self, store: &mut ConfigStore) -> Result<StepReport, StoreError> {
        match self {
            PrepStep::DefaultHost(host) => {
                store.set_default_host(host)?;
                Ok(StepReport {
                    key: HOST_KEY,
                    value: host.clone(),
                })
            }
            PrepStep::AlwaysTrust => {
                store.trust()?;
                Ok(StepReport {
                    key: TRUST_KEY,
                    value: "true".to_string(),
                })
            }
        }
    }
}

/// Steps requested by the run arguments, in a fixed order
pub fn steps_for(args: &RunArgs) -> Vec<PrepStep> {
    let mut steps = Vec::new();
    if let Some(host) = &args.default_host {
        steps.push(PrepStep::DefaultHost(host.clone()));
    }
    if args.always_trust {
        steps.push(PrepStep::AlwaysTrust);
    }
    steps
}

/// Apply every step. If any failed, the first failure is returned after all
/// steps have been attempted.
pub fn run_steps(steps: &[PrepStep], store: &mut ConfigStore) -> Result<Vec<StepReport>, StoreError> {
    let mut reports = Vec::with_capacity(steps.len());
    let mut first_error = None;

    for step in steps {
        match step.apply(store) {
            Ok(report) => reports.push(report),
            Err(e) => {
                warn!(?step, error = %e, "Preparation step failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(reports),
    }
}
