use std::fmt::Write as _;
use std::path::Path;

use anyhow::{anyhow, ensure, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use rv32_disasm::{disassemble, load_raw_bin, Image};
use rv32_rs::disasm::{labels_of, Labels};
use rv32_rs::{Assembler, Catalog};

#[derive(Parser, Debug)]
#[command(author, version, about = "RV32IMF disassembler CLI", long_about = None)]
struct Cli {
    /// Load address for a raw binary
    #[arg(long, default_value = "0")]
    base: String,
    /// Skip N bytes at start of file before loading
    #[arg(long, default_value_t = 0usize)]
    skip: usize,
    /// Limit bytes loaded (default: to EOF after --skip)
    #[arg(long)]
    len: Option<usize>,
    /// Input: raw little-endian binary, or assembly source when it ends in `.s`/`.asm`
    #[arg(value_name = "FILE")]
    input: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List loaded segments
    Sections,
    /// Disassemble [start, end); defaults to the first segment
    Range {
        start: Option<String>,
        end: Option<String>,
        /// Show instruction words
        #[arg(long)]
        show_bytes: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn parse_u32(s: &str) -> Result<u32> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u32::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u32>()?)
    }
}

fn load(cli: &Cli, catalog: &Catalog) -> Result<(Image, Labels)> {
    let path = Path::new(&cli.input);
    if matches!(path.extension().and_then(|e| e.to_str()), Some("s" | "asm")) {
        let source = std::fs::read_to_string(path)?;
        let program = Assembler::new(catalog).assemble(&source)?;
        return Ok((Image::from_program(&program), labels_of(&program)));
    }
    let img = load_raw_bin(path, parse_u32(&cli.base)?, cli.skip, cli.len)?;
    Ok((img, Labels::new()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let catalog = Catalog::standard().map_err(|d| anyhow!("{d}"))?;
    let (img, labels) = load(&cli, catalog)?;

    match &cli.cmd {
        Command::Sections => {
            println!("{:<10} {:<10} {:<10} {:<6}", "name", "start", "end", "perms");
            for s in &img.segments {
                println!("{:<10} {:#010x} {:#010x} {:<6}", s.name, s.base, s.end(), s.perms);
            }
        }
        Command::Range { start, end, show_bytes, format, out } => {
            let first = img.segments.first().ok_or_else(|| anyhow!("empty image"))?;
            let start = start.as_deref().map(parse_u32).transpose()?.unwrap_or(first.base);
            let end = end.as_deref().map(parse_u32).transpose()?.unwrap_or(first.end());
            ensure!(end >= start, "end must be >= start");

            let lines = disassemble(catalog, &img, start, end, &labels);
            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&lines)? + "\n",
                OutputFormat::Text => {
                    let mut buf = String::new();
                    for l in &lines {
                        match (show_bytes, l.word) {
                            (true, Some(w)) => {
                                writeln!(buf, "{:#010x}: {w:08x}  {}", l.addr, l.text)?
                            }
                            _ => writeln!(buf, "{:#010x}: {}", l.addr, l.text)?,
                        }
                    }
                    buf
                }
            };
            match out {
                Some(path) => std::fs::write(path, rendered)?,
                None => print!("{rendered}"),
            }
        }
    }
    Ok(())
}
