//! Tunnel client options recognized on the `run` command line

use clap::{ArgAction, Args};

/// Options that an explicit flag may override in the persisted defaults.
///
/// Declaration order is the order in which new flags are appended to the
/// resolved command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionSpec {
    Host,
    Subdomain,
    LocalHost,
    Open,
    Port,
    Trust,
}

impl OptionSpec {
    pub const ALL: [OptionSpec; 6] = [
        OptionSpec::Host,
        OptionSpec::Subdomain,
        OptionSpec::LocalHost,
        OptionSpec::Open,
        OptionSpec::Port,
        OptionSpec::Trust,
    ];

    pub fn short(self) -> char {
        match self {
            OptionSpec::Host => 'h',
            OptionSpec::Subdomain => 's',
            OptionSpec::LocalHost => 'l',
            OptionSpec::Open => 'o',
            OptionSpec::Port => 'p',
            OptionSpec::Trust => 't',
        }
    }

    pub fn long(self) -> &'static str {
        match self {
            OptionSpec::Host => "host",
            OptionSpec::Subdomain => "subdomain",
            OptionSpec::LocalHost => "local-host",
            OptionSpec::Open => "open",
            OptionSpec::Port => "port",
            OptionSpec::Trust => "trust",
        }
    }

    /// Extra long spellings accepted for this option
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            OptionSpec::Trust => &["allow-self-signed"],
            _ => &[],
        }
    }

    /// Token used when the option is appended to a command
    pub fn flag_token(self) -> String {
        format!("-{}", self.short())
    }

    /// Whether `token` (e.g. `-p`, `--port`) names this option
    pub fn matches_token(self, token: &str) -> bool {
        if let Some(long) = token.strip_prefix("--") {
            return long == self.long() || self.aliases().contains(&long);
        }
        match token.strip_prefix('-') {
            Some(short) => {
                let mut chars = short.chars();
                chars.next() == Some(self.short()) && chars.next().is_none()
            }
            None => false,
        }
    }

    /// Look up the option a flag token refers to
    pub fn from_token(token: &str) -> Option<OptionSpec> {
        Self::ALL.into_iter().find(|o| o.matches_token(token))
    }
}

/// Render a persisted key as a flag token: `-k` for single-character keys,
/// `--key` otherwise.
pub fn key_to_flag(key: &str) -> String {
    if key.chars().count() > 1 {
        format!("--{key}")
    } else {
        format!("-{key}")
    }
}

/// Explicit option values given on the command line, in `OptionSpec` order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitFlags {
    values: Vec<(OptionSpec, String)>,
}

impl ExplicitFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `option`, replacing any earlier value for it
    pub fn set(&mut self, option: OptionSpec, value: impl Into<String>) {
        let value = value.into();
        match self.values.iter_mut().find(|(o, _)| *o == option) {
            Some(slot) => slot.1 = value,
            None => {
                self.values.push((option, value));
                self.values.sort_by_key(|(o, _)| {
                    OptionSpec::ALL
                        .iter()
                        .position(|x| x == o)
                        .unwrap_or(usize::MAX)
                });
            }
        }
    }

    pub fn with(mut self, option: OptionSpec, value: impl Into<String>) -> Self {
        self.set(option, value);
        self
    }

    pub fn get(&self, option: OptionSpec) -> Option<&str> {
        self.values
            .iter()
            .find(|(o, _)| *o == option)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionSpec, &str)> + '_ {
        self.values.iter().map(|(o, v)| (*o, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Arguments of `mylt run`
#[derive(Args, Debug, Clone, Default)]
#[command(disable_help_flag = true)]
pub struct RunArgs {
    /// Upstream tunnel server (e.g. https://localtunnel.me)
    #[arg(short = 'h', long)]
    pub host: Option<String>,

    /// Request this subdomain
    #[arg(short, long)]
    pub subdomain: Option<String>,

    /// Tunnel traffic to this host instead of localhost
    #[arg(short, long)]
    pub local_host: Option<String>,

    /// Open the tunnel URL in the browser
    #[arg(short, long, num_args = 0..=1, default_missing_value = "true", value_name = "VALUE")]
    pub open: Option<String>,

    /// Local port to expose
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Trust self-signed certificates for this run
    #[arg(short = 't', long = "trust", visible_alias = "allow-self-signed")]
    pub trust: bool,

    /// Save this host as the default before running
    #[arg(long, value_name = "URL")]
    pub default_host: Option<String>,

    /// Trust self-signed certificates from now on
    #[arg(long)]
    pub always_trust: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl RunArgs {
    /// Collect the tunnel client options given on the command line
    pub fn explicit_flags(&self) -> ExplicitFlags {
        let mut flags = ExplicitFlags::new();

        if let Some(host) = &self.host {
            flags.set(OptionSpec::Host, host);
        }
        if let Some(subdomain) = &self.subdomain {
            flags.set(OptionSpec::Subdomain, subdomain);
        }
        if let Some(local_host) = &self.local_host {
            flags.set(OptionSpec::LocalHost, local_host);
        }
        if let Some(open) = &self.open {
            flags.set(OptionSpec::Open, open);
        }
        if let Some(port) = self.port {
            flags.set(OptionSpec::Port, port.to_string());
        }
        if self.trust {
            flags.set(OptionSpec::Trust, "true");
        }

        flags
    }
}
