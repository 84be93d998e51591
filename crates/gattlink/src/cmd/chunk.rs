use gattlink_frame::{decode_frame, max_chunk_size, split_message};
use serde::Serialize;

use crate::cmd::ChunkArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct FrameOutput {
    index: usize,
    more: bool,
    payload_len: usize,
    hex: String,
}

#[derive(Serialize)]
struct ChunkOutput {
    mtu: u16,
    max_chunk: usize,
    message_len: usize,
    frames: Vec<FrameOutput>,
}

pub fn run(args: ChunkArgs, format: OutputFormat) -> CliResult<i32> {
    let data = load_payload(&args)?;
    let max_chunk = max_chunk_size(args.mtu).map_err(|err| frame_error("chunk", err))?;
    let frames = split_message(&data, args.mtu).map_err(|err| frame_error("chunk", err))?;

    let mut rows = Vec::with_capacity(frames.len());
    for (index, wire) in frames.iter().enumerate() {
        let frame = decode_frame(wire).map_err(|err| frame_error("chunk", err))?;
        rows.push(FrameOutput {
            index,
            more: frame.more,
            payload_len: frame.payload.len(),
            hex: hex::encode(wire),
        });
    }

    let out = ChunkOutput {
        mtu: args.mtu,
        max_chunk,
        message_len: data.len(),
        frames: rows,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            &["#", "FLAG", "PAYLOAD", "HEX"],
            out.frames
                .iter()
                .map(|f| {
                    vec![
                        f.index.to_string(),
                        flag_label(f.more).to_string(),
                        f.payload_len.to_string(),
                        f.hex.clone(),
                    ]
                })
                .collect(),
        ),
        OutputFormat::Pretty => {
            println!(
                "mtu={} max_chunk={} len={} frames={}",
                out.mtu,
                out.max_chunk,
                out.message_len,
                out.frames.len()
            );
            for f in &out.frames {
                println!(
                    "[{}] {} len={} {}",
                    f.index,
                    flag_label(f.more),
                    f.payload_len,
                    f.hex
                );
            }
        }
    }
    Ok(SUCCESS)
}

fn load_payload(args: &ChunkArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return std::fs::read(path).map_err(|err| io_error(&path.display().to_string(), err));
    }
    if let Some(encoded) = &args.hex {
        return hex::decode(encoded.trim())
            .map_err(|err| CliError::usage(format!("invalid --hex: {err}")));
    }
    Err(CliError::usage(
        "one of --data, --file or --hex is required",
    ))
}

fn flag_label(more: bool) -> &'static str {
    if more {
        "more"
    } else {
        "last"
    }
}
