use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use stash_persist::{FORMAT_VERSION_V1, FORMAT_VERSION_V2};

const DEFAULT_PREVIEW_BYTES: usize = 64;

#[derive(Parser, Debug)]
#[command(
    name = "stash-inspect",
    about = "Print the header fields of a stash stream. The graph itself is \
             not self-describing without the application's registrations, so \
             only the header and size facts are reported."
)]
struct Args {
    /// Stream file to inspect
    input: PathBuf,

    /// Hex-dump the leading payload bytes after the header
    #[arg(long, action = clap::ArgAction::SetTrue)]
    preview: bool,

    /// How many payload bytes to preview
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_PREVIEW_BYTES)]
    preview_bytes: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let bytes = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let Some((&version, payload)) = bytes.split_first() else {
        bail!("{}: empty stream, no version tag", args.input.display());
    };

    println!("stream: {} ({} bytes)", args.input.display(), bytes.len());
    match version {
        FORMAT_VERSION_V1 => println!("version: {version} (supported)"),
        FORMAT_VERSION_V2 => println!("version: {version} (supported, current)"),
        _ => println!("version: {version} (unsupported)"),
    }
    println!("payload: {} bytes", payload.len());

    if args.preview {
        let preview = &payload[..payload.len().min(args.preview_bytes)];
        for chunk in preview.chunks(16) {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
            println!("  {}", hex.join(" "));
        }
        if payload.len() > preview.len() {
            println!("  ... {} more bytes", payload.len() - preview.len());
        }
    }

    Ok(())
}
