// SPDX-License-Identifier: MIT
//! `jsan` command line tool: encode, inspect and decode JSAN artifacts.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use jsan::analyzer::JsonAnalyzer;
use jsan::document::read_document;
use jsan::events::emit_value;
use jsan::reader::BinaryTokenReader;
use jsan::writer::{BinaryTokenWriter, WriterOptions};

#[derive(Parser)]
#[command(
    name = "jsan",
    version,
    about = "Compact randomly addressable binary encoding for JSON token streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a JSON document into <prefix>.bin and <prefix>.meta
    Encode {
        /// Input JSON file
        input: PathBuf,
        /// Output path prefix
        output_prefix: PathBuf,
        /// Run an analysis pass first so numeric arrays pack into typed
        /// tokens
        #[arg(long)]
        analyze: bool,
        /// Fail once the string table holds this many unique entries
        #[arg(long)]
        max_unique_strings: Option<usize>,
        /// Fail once the string table holds this many payload bytes
        #[arg(long)]
        max_string_table_bytes: Option<usize>,
    },
    /// Print artifact structure and verify its checksum
    Inspect {
        /// Metadata file (binary or JSON text variant)
        meta: PathBuf,
        /// Token stream file
        bin: PathBuf,
    },
    /// Reconstruct the JSON document and print it
    Decode {
        meta: PathBuf,
        bin: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    match Cli::parse().command {
        Command::Encode {
            input,
            output_prefix,
            analyze,
            max_unique_strings,
            max_string_table_bytes,
        } => encode(
            input,
            output_prefix,
            analyze,
            WriterOptions {
                max_unique_strings,
                max_string_table_bytes,
            },
        ),
        Command::Inspect { meta, bin } => inspect(meta, bin),
        Command::Decode { meta, bin } => decode(meta, bin),
    }
}

fn encode(
    input: PathBuf,
    output_prefix: PathBuf,
    analyze: bool,
    options: WriterOptions,
) -> anyhow::Result<()> {
    let text = fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&text).context("input is not valid JSON")?;

    let report = if analyze {
        let mut analyzer = JsonAnalyzer::new();
        emit_value(&mut analyzer, &value)?;
        Some(analyzer.into_report())
    } else {
        None
    };

    let bin_path = output_prefix.with_extension("bin");
    let meta_path = output_prefix.with_extension("meta");
    let token_sink = BufWriter::new(
        File::create(&bin_path)
            .with_context(|| format!("failed to create {}", bin_path.display()))?,
    );
    let metadata_sink = BufWriter::new(
        File::create(&meta_path)
            .with_context(|| format!("failed to create {}", meta_path.display()))?,
    );

    let mut writer = BinaryTokenWriter::with_options(token_sink, metadata_sink, report, options)?;
    emit_value(&mut writer, &value)?;
    writer.finalize()?;

    println!(
        "wrote {} ({} token bytes) and {}",
        bin_path.display(),
        writer.token_length(),
        meta_path.display()
    );
    Ok(())
}

fn inspect(meta: PathBuf, bin: PathBuf) -> anyhow::Result<()> {
    let reader = BinaryTokenReader::from_files(&meta, &bin)?;
    let header = reader.header();
    let trailer = reader.trailer();

    println!("version:       {}", header.version);
    println!("token stream:  {} bytes", trailer.token_stream_length);
    println!("string table:  {} entries", reader.string_table().len());
    println!("offset index:  {} entries", reader.index().len());
    println!("checksum:      {:#010x}", trailer.checksum);
    match reader.verify_checksum() {
        Ok(()) => println!("integrity:     ok"),
        Err(error) => println!("integrity:     FAILED ({error})"),
    }
    Ok(())
}

fn decode(meta: PathBuf, bin: PathBuf) -> anyhow::Result<()> {
    let reader = BinaryTokenReader::from_files(&meta, &bin)?;
    let document = read_document(&reader)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
