//! Unit tests for `AppError` display format and exit codes.

use worker_harness::AppError;

#[test]
fn display_prefixes_each_kind() {
    let cases = [
        (AppError::Argument("a".into()), "argument: a"),
        (AppError::Config("c".into()), "config: c"),
        (AppError::Spawn("s".into()), "spawn: s"),
        (AppError::Connect("x".into()), "connect: x"),
        (AppError::Connection("n".into()), "connection: n"),
        (AppError::Worker("w".into()), "worker: w"),
        (AppError::Io("i".into()), "io: i"),
    ];

    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn argument_and_config_errors_exit_with_one() {
    assert_eq!(AppError::Argument("bad".into()).exit_code(), 1);
    assert_eq!(AppError::Config("bad".into()).exit_code(), 1);
}

#[test]
fn spawn_and_connect_failures_exit_non_zero_and_distinct() {
    let spawn = AppError::Spawn("missing".into()).exit_code();
    let connect = AppError::Connect("refused".into()).exit_code();

    assert_ne!(spawn, 0);
    assert_ne!(connect, 0);
    assert_ne!(spawn, connect);
}

#[test]
fn io_error_converts() {
    let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
    assert!(matches!(err, AppError::Io(ref msg) if msg == "gone"));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Worker("x".into()));
}
