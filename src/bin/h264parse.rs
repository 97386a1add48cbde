//! Convert a raw H.264 byte-stream file to AVC (length-prefixed) form.
//!
//! Usage: h264parse <input> <output> [OPTIONS]
//!
//! Options:
//!   --single-nalu          Treat every access unit as one NAL unit of data
//!   --codec-data <path>    Write the avcC configuration record to <path>
//!
//! Examples:
//!   h264parse capture.h264 capture.avc
//!   h264parse capture.h264 capture.avc --codec-data capture.avcC

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use h264parse::{split_access_units, AccessUnit, H264Parse, LatestFormat, VideoFormat};

struct Args {
    input: PathBuf,
    output: PathBuf,
    single_nalu: bool,
    codec_data: Option<PathBuf>,
}

fn parse_args() -> Option<Args> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        return None;
    }

    let mut input = None;
    let mut output = None;
    let mut single_nalu = false;
    let mut codec_data = None;
    let mut i = 1;

    while i < args.len() {
        let arg = &args[i];

        if arg == "--single-nalu" {
            single_nalu = true;
            i += 1;
            continue;
        }

        if arg == "--codec-data" {
            if i + 1 < args.len() {
                codec_data = Some(PathBuf::from(&args[i + 1]));
                i += 2;
                continue;
            } else {
                eprintln!("Error: --codec-data requires a path argument");
                return None;
            }
        }

        if arg == "--help" || arg == "-h" {
            return None;
        }

        if input.is_none() {
            input = Some(PathBuf::from(arg));
        } else if output.is_none() {
            output = Some(PathBuf::from(arg));
        } else {
            eprintln!("Error: unexpected argument '{}'", arg);
            return None;
        }
        i += 1;
    }

    Some(Args {
        input: input?,
        output: output?,
        single_nalu,
        codec_data,
    })
}

fn print_usage() {
    println!("Usage: h264parse <input> <output> [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --single-nalu          Treat every access unit as one NAL unit of data");
    println!("  --codec-data <path>    Write the avcC configuration record to <path>");
    println!();
    println!("Examples:");
    println!("  h264parse capture.h264 capture.avc");
    println!("  h264parse capture.h264 capture.avc --codec-data capture.avcC");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("h264parse=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let args = match parse_args() {
        Some(a) => a,
        None => {
            print_usage();
            return Ok(());
        }
    };

    let data = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    tracing::info!("Read {} bytes from {}", data.len(), args.input.display());

    let mut parser = H264Parse::builder().single_nalu(args.single_nalu).build();
    parser.set_formats(VideoFormat::byte_stream(), VideoFormat::avc());
    parser.start();

    let mut sink = LatestFormat::new();
    let mut output = Vec::with_capacity(data.len());
    let mut key_units = 0usize;
    let units = split_access_units(&data);

    for (index, range) in units.iter().enumerate() {
        let mut au = AccessUnit::from_slice(&data[range.clone()]).with_delta_unit(true);
        parser
            .process(&mut au, &mut sink)
            .with_context(|| format!("access unit {} at byte {}", index, range.start))?;
        if !au.is_delta_unit() {
            key_units += 1;
        }
        output.extend_from_slice(&au.into_bytes());
    }
    parser.stop();

    tokio::fs::write(&args.output, &output)
        .await
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    tracing::info!(
        "Wrote {} access units ({} key) to {}",
        units.len(),
        key_units,
        args.output.display()
    );

    if let Some(path) = &args.codec_data {
        let record = sink
            .format()
            .and_then(|format| format.codec_data.as_ref())
            .context("no SPS/PPS found, configuration record unavailable")?;
        tokio::fs::write(path, record.as_bytes())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!("Configuration record ({} bytes): {}", record.len(), path.display());
    }

    Ok(())
}
