use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod chunk;
pub mod ident;
pub mod loopback;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Derive the ident characteristic value from key material.
    Ident(IdentArgs),
    /// Show how a message splits into frames at a given MTU.
    Chunk(ChunkArgs),
    /// Run a full initiator/responder session over an in-memory link.
    Loopback(LoopbackArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ident(args) => ident::run(args, format),
        Command::Chunk(args) => chunk::run(args, format),
        Command::Loopback(args) => loopback::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct IdentArgs {
    /// Key material (hex).
    #[arg(long, value_name = "HEX")]
    pub key: String,
}

#[derive(Args, Debug)]
pub struct ChunkArgs {
    /// Negotiated MTU to split for.
    #[arg(long, default_value = "23")]
    pub mtu: u16,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["file", "hex"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
    /// Hex payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct LoopbackArgs {
    /// Largest MTU the link agrees to.
    #[arg(long, default_value = "517")]
    pub mtu: u16,
    /// Messages to send in each direction.
    #[arg(long, default_value = "3")]
    pub messages: usize,
    /// Size of each message in bytes.
    #[arg(long, default_value = "64")]
    pub size: usize,
    /// Give the initiator different key material than the responder.
    #[arg(long)]
    pub mismatch_ident: bool,
    /// Endpoint configuration file (JSON).
    #[arg(long, value_name = "JSON")]
    pub endpoints: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
