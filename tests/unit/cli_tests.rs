//! Unit tests for command-line parsing and resolution.

use clap::error::ErrorKind;
use clap::Parser as _;

use worker_harness::cli::{Cli, LogFormat};
use worker_harness::AppError;

#[test]
fn defaults_are_localhost_8080() {
    let cli = Cli::try_parse_from(["worker-harness"]).expect("no flags is valid");

    assert_eq!(cli.address, "localhost");
    assert_eq!(cli.port, 8080);
    assert!(cli.config.is_none());
    assert!(cli.filename.is_none());
    assert_eq!(cli.log_format, LogFormat::Text);
}

#[test]
fn short_flags_set_address_and_port() {
    let cli = Cli::try_parse_from(["worker-harness", "-a", "10.0.0.5", "-p", "9000"])
        .expect("short flags are valid");

    assert_eq!(cli.address, "10.0.0.5");
    assert_eq!(cli.port, 9000);
}

#[test]
fn long_flags_set_address_and_port() {
    let cli = Cli::try_parse_from([
        "worker-harness",
        "--address",
        "worker.local",
        "--port",
        "8765",
        "--log-format",
        "json",
    ])
    .expect("long flags are valid");

    assert_eq!(cli.address, "worker.local");
    assert_eq!(cli.port, 8765);
    assert_eq!(cli.log_format, LogFormat::Json);
}

#[test]
fn non_numeric_port_is_rejected() {
    let err = Cli::try_parse_from(["worker-harness", "--port", "eighty"])
        .expect_err("non-numeric port must fail");
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
    assert!(err.use_stderr());
}

#[test]
fn out_of_range_port_is_rejected() {
    let err = Cli::try_parse_from(["worker-harness", "--port", "70000"])
        .expect_err("port above u16 must fail");
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn unknown_flag_is_rejected() {
    let err = Cli::try_parse_from(["worker-harness", "--verbose-mode"])
        .expect_err("unknown flag must fail");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    assert!(err.use_stderr());
}

#[test]
fn resolve_builds_endpoint_and_default_config() {
    let cli = Cli::try_parse_from(["worker-harness", "-p", "1234"]).expect("valid");
    let (endpoint, config) = cli.resolve().expect("resolve");

    assert_eq!(endpoint.url(), "ws://localhost:1234/");
    assert_eq!(config.request.filename, "some_file");
}

#[test]
fn filename_flag_overrides_config() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("harness.toml");
    std::fs::write(&path, "[request]\nfilename = \"from_file.fits\"\n").expect("write");

    let cli = Cli::try_parse_from([
        "worker-harness",
        "--config",
        path.to_str().expect("utf8 path"),
        "--filename",
        "from_flag.fits",
    ])
    .expect("valid");
    let (_, config) = cli.resolve().expect("resolve");

    assert_eq!(config.request.filename, "from_flag.fits");
}

#[test]
fn blank_address_is_argument_error() {
    let cli = Cli::try_parse_from(["worker-harness", "--address", " "]).expect("parses");
    let err = cli.resolve().expect_err("blank address must fail");

    assert!(matches!(err, AppError::Argument(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn missing_config_file_is_config_error() {
    let cli = Cli::try_parse_from(["worker-harness", "-c", "/nonexistent/harness.toml"])
        .expect("parses");
    let err = cli.resolve().expect_err("missing file must fail");

    assert!(matches!(err, AppError::Config(_)));
}
