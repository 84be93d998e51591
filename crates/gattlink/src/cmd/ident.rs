use gattlink_peer::{IdentToken, IDENT_INFO};
use serde::Serialize;

use crate::cmd::IdentArgs;
use crate::exit::{peer_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct IdentOutput {
    key_len: usize,
    info: String,
    ident: String,
}

pub fn run(args: IdentArgs, format: OutputFormat) -> CliResult<i32> {
    let key = hex::decode(args.key.trim())
        .map_err(|err| CliError::usage(format!("invalid --key: {err}")))?;
    let token = IdentToken::derive(&key).map_err(|err| peer_error("ident", err))?;

    let out = IdentOutput {
        key_len: key.len(),
        info: String::from_utf8_lossy(IDENT_INFO).into_owned(),
        ident: token.to_string(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["KEY BYTES", "INFO", "IDENT"],
            vec![vec![out.key_len.to_string(), out.info, out.ident]],
        ),
        OutputFormat::Pretty => println!("{}", out.ident),
    }
    Ok(SUCCESS)
}
