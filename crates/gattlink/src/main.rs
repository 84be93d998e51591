mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "gattlink", version, about = "GATT chunked message transport CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        env = "GATTLINK_LOG_LEVEL",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chunk_subcommand() {
        let cli = Cli::try_parse_from(["gattlink", "chunk", "--mtu", "23", "--data", "hello"])
            .expect("chunk args should parse");

        assert!(matches!(cli.command, Command::Chunk(ref args) if args.mtu == 23));
    }

    #[test]
    fn rejects_conflicting_payload_args() {
        let err = Cli::try_parse_from([
            "gattlink", "chunk", "--data", "hello", "--hex", "00ff",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn parses_loopback_defaults() {
        let cli = Cli::try_parse_from(["gattlink", "--format", "json", "loopback"])
            .expect("loopback args should parse");

        match cli.command {
            Command::Loopback(args) => {
                assert_eq!(args.mtu, 517);
                assert!(!args.mismatch_ident);
                assert!(args.endpoints.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
    }

    #[test]
    fn ident_requires_key() {
        let err = Cli::try_parse_from(["gattlink", "ident"]).expect_err("missing key should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }
}
