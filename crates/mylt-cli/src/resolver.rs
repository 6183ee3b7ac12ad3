//! Merges persisted defaults with explicit command-line flags
//!
//! Persisted pairs come first, in store order. Each explicit option then
//! either overwrites the value following an existing flag for the same option
//! or is appended at the end. An option never appears twice in the output.

use crate::defaults_store::ConfigStore;
use crate::options::{key_to_flag, ExplicitFlags, OptionSpec};
use crate::trust::CertValidation;
use std::fmt;

/// Persisted `cert` key, which also switches off certificate validation for the child
const CERT_FLAG: &str = "--cert";

/// Final argument vector for one tunnel client invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    tokens: Vec<String>,
    cert_validation: CertValidation,
}

impl ResolvedCommand {
    /// Build a command from raw tokens, deriving the certificate setting
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        let cert_validation = if tokens
            .iter()
            .step_by(2)
            .any(|t| OptionSpec::Trust.matches_token(t) || t == CERT_FLAG)
        {
            CertValidation::Disabled
        } else {
            CertValidation::Enabled
        };

        Self {
            tokens,
            cert_validation,
        }
    }

    /// Override the derived certificate setting
    pub fn with_cert_validation(mut self, cert_validation: CertValidation) -> Self {
        self.cert_validation = cert_validation;
        self
    }

    pub fn args(&self) -> &[String] {
        &self.tokens
    }

    pub fn cert_validation(&self) -> CertValidation {
        self.cert_validation
    }

    /// Value following the flag for `option`, if present
    pub fn value_of(&self, option: OptionSpec) -> Option<&str> {
        self.flag_position(option)
            .and_then(|i| self.tokens.get(i + 1))
            .map(String::as_str)
    }

    fn flag_position(&self, option: OptionSpec) -> Option<usize> {
        flag_positions(&self.tokens, option).next()
    }
}

impl fmt::Display for ResolvedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// Positions of flag tokens naming `option`. Only even positions hold flags;
/// odd positions are values.
fn flag_positions(tokens: &[String], option: OptionSpec) -> impl Iterator<Item = usize> + '_ {
    tokens
        .iter()
        .enumerate()
        .step_by(2)
        .filter(move |(_, t)| option.matches_token(t))
        .map(|(i, _)| i)
}

/// Resolve the tunnel client arguments from persisted `(key, value)` pairs
/// and explicit flags.
pub fn resolve<'a, I>(defaults: I, explicit: &ExplicitFlags) -> ResolvedCommand
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut tokens: Vec<String> = Vec::new();

    // spellings of one option share a slot: first position, last value
    for (key, value) in defaults {
        let flag = key_to_flag(key);
        let slot = OptionSpec::from_token(&flag)
            .and_then(|option| flag_positions(&tokens, option).next());

        match slot {
            Some(pos) => tokens[pos + 1] = value.to_string(),
            None => {
                tokens.push(flag);
                tokens.push(value.to_string());
            }
        }
    }

    for (option, value) in explicit.iter() {
        let slot = flag_positions(&tokens, option).next();
        match slot {
            Some(pos) => tokens[pos + 1] = value.to_string(),
            None => {
                tokens.push(option.flag_token());
                tokens.push(value.to_string());
            }
        }
    }

    ResolvedCommand::from_tokens(tokens)
}

/// Resolve against the contents of a store
pub fn resolve_from_store(store: &ConfigStore, explicit: &ExplicitFlags) -> ResolvedCommand {
    resolve(store.iter(), explicit)
}
