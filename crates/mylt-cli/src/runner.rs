//! Tunnel client process runner
//!
//! Spawns the tunnel client with a resolved argument vector, mirrors its
//! output line by line and waits for it to exit. A shutdown request while the
//! client is running forwards SIGTERM, waits a grace period, then kills it.

use crate::resolver::ResolvedCommand;
use crate::trust::TlsTrustScope;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tunnel client looked up on `PATH` when no other binary is configured
pub const DEFAULT_TUNNEL_BIN: &str = "lt";

/// Time the client gets to exit after SIGTERM before it is killed
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to wait for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// How the tunnel client ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The client exited on its own. `code` is `None` when a signal ended it.
    Exited { code: Option<i32> },
    /// The client was stopped because this process was asked to shut down
    Killed { code: Option<i32> },
}

impl RunOutcome {
    /// Exit code to report for this outcome. A missing code counts as success.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Exited { code } | RunOutcome::Killed { code } => code.unwrap_or(0),
        }
    }
}

/// One line of client output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildLine {
    Stdout(String),
    Stderr(String),
}

pub struct ProcessRunner {
    program: String,
    grace_period: Duration,
    trust: TlsTrustScope,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, trust: TlsTrustScope) -> Self {
        Self {
            program: program.into(),
            grace_period: DEFAULT_GRACE_PERIOD,
            trust,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the client, mirroring its stdout and stderr to ours.
    pub async fn run<F>(
        &self,
        command: &ResolvedCommand,
        shutdown: F,
    ) -> Result<RunOutcome, RunnerError>
    where
        F: Future<Output = ()>,
    {
        let (line_tx, mut line_rx) = mpsc::channel(64);

        let printer = tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                match line {
                    ChildLine::Stdout(line) => println!("{}", line),
                    ChildLine::Stderr(line) => eprintln!("{}", line),
                }
            }
        });

        let outcome = self.run_with_sink(command, shutdown, line_tx).await;
        printer.await.ok();
        outcome
    }

    /// Run the client, sending each output line to `sink` as it arrives.
    pub async fn run_with_sink<F>(
        &self,
        command: &ResolvedCommand,
        shutdown: F,
        sink: mpsc::Sender<ChildLine>,
    ) -> Result<RunOutcome, RunnerError>
    where
        F: Future<Output = ()>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(command.args())
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.trust.apply(&mut cmd, command.cert_validation());

        info!(
            program = %self.program,
            args = %command,
            cert_validation = ?command.cert_validation(),
            "Spawning tunnel client"
        );

        let mut child = cmd.spawn().map_err(|source| RunnerError::Launch {
            program: self.program.clone(),
            source,
        })?;

        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump_lines(stdout, sink.clone(), ChildLine::Stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump_lines(stderr, sink.clone(), ChildLine::Stderr));
        }
        drop(sink);

        tokio::pin!(shutdown);

        let outcome = tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| RunnerError::Wait {
                    program: self.program.clone(),
                    source,
                })?;
                debug!(?status, "Tunnel client exited");
                RunOutcome::Exited { code: status.code() }
            }
            () = &mut shutdown => {
                info!("Shutdown requested, stopping tunnel client");
                let code = terminate(&mut child, self.grace_period)
                    .await
                    .map_err(|source| RunnerError::Wait {
                        program: self.program.clone(),
                        source,
                    })?;
                RunOutcome::Killed { code }
            }
        };

        // a grandchild may still hold the pipes open
        for pump in pumps {
            let abort = pump.abort_handle();
            if tokio::time::timeout(self.grace_period, pump).await.is_err() {
                debug!("Output stream still open after client exit");
                abort.abort();
            }
        }

        Ok(outcome)
    }
}

/// Forward each line read from `reader` to `sink`. Invalid UTF-8 is replaced
/// rather than ending the stream.
fn pump_lines<R>(
    reader: R,
    sink: mpsc::Sender<ChildLine>,
    wrap: fn(String) -> ChildLine,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    if sink.send(wrap(line)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "Failed to read tunnel client output");
                    break;
                }
            }
        }
    })
}

/// SIGTERM the child, wait `grace_period`, then SIGKILL. Returns the child's
/// exit code if it reported one.
async fn terminate(child: &mut Child, grace_period: Duration) -> std::io::Result<Option<i32>> {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            #[allow(unsafe_code, clippy::cast_possible_wrap)]
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                let err = std::io::Error::last_os_error();
                warn!(pid, error = %err, "Failed to send SIGTERM");
            }
        }
    }
    #[cfg(not(unix))]
    {
        child.start_kill().ok();
    }

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(status) => Ok(status?.code()),
        Err(_) => {
            warn!("Grace period expired, killing tunnel client");
            child.kill().await?;
            Ok(None)
        }
    }
}

/// SIGINT/SIGTERM listener, installed before the client is spawned so an
/// early signal is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
}

impl ShutdownSignal {
    pub fn install() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            Ok(Self {
                terminate: signal(SignalKind::terminate())?,
                interrupt: signal(SignalKind::interrupt())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Resolves on the first SIGINT or SIGTERM
    pub async fn recv(mut self) {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.terminate.recv() => info!("Received SIGTERM"),
                _ = self.interrupt.recv() => info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
