use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rv32_rs::disasm::{fmt_statement, labels_of};
use rv32_rs::{Assembler, Catalog, SimConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "RV32IMF assembler")]
struct Opts {
    /// Input assembly file
    #[arg(short, long)]
    input: PathBuf,
    /// Output file for the text segment (raw little-endian words)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output file for the data segment image
    #[arg(long)]
    data_out: Option<PathBuf>,
    /// Write the assembled program (statements, data, symbols) as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    /// Print an address / word / source listing
    #[arg(long)]
    listing: bool,
    #[arg(long, default_value_t = 0u32)]
    text_base: u32,
    #[arg(long, default_value_t = 0x2000u32)]
    data_base: u32,
}

fn run(opts: &Opts) -> Result<bool> {
    let catalog = Catalog::standard().map_err(|d| anyhow!("{d}"))?;
    let source = fs::read_to_string(&opts.input)?;
    let cfg = SimConfig {
        text_base: opts.text_base,
        data_base: opts.data_base,
        ..SimConfig::default()
    };
    let program = match Assembler::with_config(catalog, &cfg).assemble(&source) {
        Ok(p) => p,
        Err(diags) => {
            for d in &diags {
                eprintln!("{}:{d}", opts.input.display());
            }
            return Ok(false);
        }
    };

    if let Some(path) = &opts.output {
        fs::write(path, program.text_bytes())?;
    }
    if let Some(path) = &opts.data_out {
        fs::write(path, &program.data)?;
    }
    if let Some(path) = &opts.json {
        fs::write(path, serde_json::to_string_pretty(&program)?)?;
    }
    if opts.listing {
        let labels = labels_of(&program);
        for s in &program.statements {
            println!(
                "{:#010x}: {:08x}  {:<28} # {}: {}",
                s.address,
                s.word,
                fmt_statement(catalog, s, &labels),
                s.pos.line,
                s.source
            );
        }
    }
    Ok(true)
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    Ok(if run(&opts)? { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
