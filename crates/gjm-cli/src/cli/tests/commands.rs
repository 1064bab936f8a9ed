//! Tests for submit, watch, status and completions.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::{Path, PathBuf};

#[test]
fn cli_parse_submit() {
    match parse(&["gjm", "submit", "a.jdl", "b.jdl"]) {
        CliCommand::Submit {
            jdl,
            exit_when_done,
        } => {
            assert_eq!(jdl, vec![PathBuf::from("a.jdl"), PathBuf::from("b.jdl")]);
            assert!(!exit_when_done);
        }
        _ => panic!("expected Submit"),
    }
}

#[test]
fn cli_parse_submit_exit_when_done() {
    match parse(&["gjm", "submit", "--exit-when-done", "a.jdl"]) {
        CliCommand::Submit { exit_when_done, .. } => assert!(exit_when_done),
        _ => panic!("expected Submit with --exit-when-done"),
    }
}

#[test]
fn cli_submit_requires_jdl() {
    assert!(Cli::try_parse_from(["gjm", "submit"]).is_err());
}

#[test]
fn cli_parse_watch() {
    match parse(&["gjm", "watch"]) {
        CliCommand::Watch {
            resubmit,
            exit_when_done,
        } => {
            assert!(!resubmit);
            assert!(!exit_when_done);
        }
        _ => panic!("expected Watch"),
    }
}

#[test]
fn cli_parse_watch_resubmit() {
    for flag in ["--resubmit", "-r"] {
        match parse(&["gjm", "watch", flag]) {
            CliCommand::Watch { resubmit, .. } => assert!(resubmit, "{}", flag),
            _ => panic!("expected Watch with {}", flag),
        }
    }
}

#[test]
fn cli_parse_status() {
    match parse(&["gjm", "status"]) {
        CliCommand::Status => {}
        _ => panic!("expected Status"),
    }
}

#[test]
fn cli_parse_completions() {
    match parse(&["gjm", "completions", "bash"]) {
        CliCommand::Completions { shell } => assert_eq!(shell, clap_complete::Shell::Bash),
        _ => panic!("expected Completions"),
    }
}

#[test]
fn cli_parse_work_dir_is_global() {
    let cli = Cli::try_parse_from(["gjm", "watch", "--work-dir", "/data/run1"]).unwrap();
    assert_eq!(cli.work_dir.as_deref(), Some(Path::new("/data/run1")));
    let cli = Cli::try_parse_from(["gjm", "--work-dir", "/data/run2", "status"]).unwrap();
    assert_eq!(cli.work_dir.as_deref(), Some(Path::new("/data/run2")));
    let cli = Cli::try_parse_from(["gjm", "status"]).unwrap();
    assert!(cli.work_dir.is_none());
}

#[test]
fn cli_rejects_unknown_command() {
    assert!(Cli::try_parse_from(["gjm", "run"]).is_err());
}

#[test]
fn cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
