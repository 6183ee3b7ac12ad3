//! Process runner tests, using /bin/sh as a stand-in tunnel client

#![cfg(unix)]

use mylt_cli::resolver::ResolvedCommand;
use mylt_cli::runner::{ChildLine, ProcessRunner, RunOutcome, RunnerError};
use mylt_cli::trust::{CertValidation, TlsTrustScope, TLS_REJECT_UNAUTHORIZED};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

fn sh(script: &str) -> ResolvedCommand {
    ResolvedCommand::from_tokens(vec!["-c".to_string(), script.to_string()])
}

fn runner() -> ProcessRunner {
    ProcessRunner::new("/bin/sh", TlsTrustScope::capture())
        .with_grace_period(Duration::from_millis(500))
}

/// Run `command` and collect everything it printed
async fn run_collect<F>(
    runner: &ProcessRunner,
    command: &ResolvedCommand,
    shutdown: F,
) -> (Result<RunOutcome, RunnerError>, Vec<ChildLine>)
where
    F: std::future::Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::channel(64);
    let result = runner.run_with_sink(command, shutdown, tx).await;

    let mut lines = Vec::new();
    while let Some(line) = rx.recv().await {
        lines.push(line);
    }
    (result, lines)
}

#[tokio::test]
async fn test_exit_code_is_propagated() {
    let (result, _) = run_collect(&runner(), &sh("exit 3"), std::future::pending()).await;
    let outcome = result.unwrap();

    assert_eq!(outcome, RunOutcome::Exited { code: Some(3) });
    assert_eq!(outcome.exit_code(), 3);
}

#[tokio::test]
async fn test_success_exit() {
    let (result, _) = run_collect(&runner(), &sh("true"), std::future::pending()).await;
    assert_eq!(result.unwrap().exit_code(), 0);
}

#[tokio::test]
async fn test_output_is_streamed_per_line() {
    let command = sh("echo first; echo oops >&2; printf 'second\\r\\n'; printf 'no newline'");
    let (result, lines) = run_collect(&runner(), &command, std::future::pending()).await;

    assert!(result.is_ok());

    let stdout: Vec<_> = lines
        .iter()
        .filter_map(|l| match l {
            ChildLine::Stdout(s) => Some(s.as_str()),
            ChildLine::Stderr(_) => None,
        })
        .collect();
    assert_eq!(stdout, vec!["first", "second", "no newline"]);
    assert!(lines.contains(&ChildLine::Stderr("oops".to_string())));
}

#[tokio::test]
async fn test_lines_arrive_before_exit() {
    let (tx, mut rx) = mpsc::channel(8);
    let runner = runner();
    let command = sh("echo ready; sleep 2");

    let run = runner.run_with_sink(&command, std::future::pending(), tx);
    tokio::pin!(run);

    let started = Instant::now();
    let first = tokio::select! {
        line = rx.recv() => line,
        _ = &mut run => panic!("client exited before its output was delivered"),
    };

    assert_eq!(first, Some(ChildLine::Stdout("ready".to_string())));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(run.await.is_ok());
}

#[tokio::test]
async fn test_trust_is_scoped_to_child() {
    let before = std::env::var_os(TLS_REJECT_UNAUTHORIZED);
    let command = sh("echo \"$NODE_TLS_REJECT_UNAUTHORIZED\"; exit 2")
        .with_cert_validation(CertValidation::Disabled);

    let (result, lines) = run_collect(&runner(), &command, std::future::pending()).await;

    assert_eq!(result.unwrap().exit_code(), 2);
    assert_eq!(lines, vec![ChildLine::Stdout("0".to_string())]);
    assert_eq!(std::env::var_os(TLS_REJECT_UNAUTHORIZED), before);
}

#[tokio::test]
async fn test_trust_from_persisted_key() {
    let command = ResolvedCommand::from_tokens(vec![
        "-c".to_string(),
        "echo \"v=$NODE_TLS_REJECT_UNAUTHORIZED\"".to_string(),
        "--trust".to_string(),
        "true".to_string(),
    ]);
    assert_eq!(command.cert_validation(), CertValidation::Disabled);

    let (result, lines) = run_collect(&runner(), &command, std::future::pending()).await;
    assert!(result.is_ok());
    assert_eq!(lines, vec![ChildLine::Stdout("v=0".to_string())]);
}

#[tokio::test]
async fn test_interrupt_without_child_code_exits_zero() {
    let before = std::env::var_os(TLS_REJECT_UNAUTHORIZED);
    let command = sh("exec sleep 30").with_cert_validation(CertValidation::Disabled);
    let started = Instant::now();

    let (result, _) = run_collect(
        &runner(),
        &command,
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await;

    let outcome = result.unwrap();
    assert_eq!(outcome, RunOutcome::Killed { code: None });
    assert_eq!(outcome.exit_code(), 0);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(std::env::var_os(TLS_REJECT_UNAUTHORIZED), before);
}

#[tokio::test]
async fn test_interrupt_reports_child_exit_code() {
    let command = sh("trap 'exit 7' TERM; while :; do sleep 0.05; done");

    let (result, _) = run_collect(
        &runner(),
        &command,
        tokio::time::sleep(Duration::from_millis(300)),
    )
    .await;

    assert_eq!(result.unwrap(), RunOutcome::Killed { code: Some(7) });
}

#[tokio::test]
async fn test_child_ignoring_sigterm_is_killed_after_grace() {
    let runner = ProcessRunner::new("/bin/sh", TlsTrustScope::capture())
        .with_grace_period(Duration::from_millis(200));
    let command = sh("trap '' TERM; exec sleep 30");
    let started = Instant::now();

    let (result, _) = run_collect(
        &runner,
        &command,
        tokio::time::sleep(Duration::from_millis(200)),
    )
    .await;

    assert_eq!(result.unwrap(), RunOutcome::Killed { code: None });
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_missing_executable() {
    let runner = ProcessRunner::new("/nonexistent/lt", TlsTrustScope::capture());
    let (result, lines) = run_collect(&runner, &sh("true"), std::future::pending()).await;

    match result {
        Err(RunnerError::Launch { program, source }) => {
            assert_eq!(program, "/nonexistent/lt");
            assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
        }
        other => panic!("expected launch error, got {:?}", other),
    }
    assert!(lines.is_empty());
}
