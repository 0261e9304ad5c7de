use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use rv32_rs::{
    Assembler, Bus, Catalog, Console, Engine, LinearMemory, Program, RunLimits, RunOutcome,
    SimConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble and run an RV32IMF program on the rv32-rs simulator"
)]
struct Opts {
    /// JSON file with a `SimConfig`
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the step budget (0 for unlimited)
    #[arg(long)]
    max_steps: Option<u64>,
    /// Entry address for raw binaries
    #[arg(short, long)]
    entry: Option<u32>,
    /// Print the final machine state as JSON on stderr
    #[arg(long)]
    dump_state: bool,
    /// Assembly source (`.s`/`.asm`) or raw little-endian binary loaded at the text base
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let opts = Opts::parse();
    let mut cfg = match &opts.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(n) = opts.max_steps {
        cfg.max_steps = (n > 0).then_some(n);
    }

    let catalog = Catalog::standard().map_err(|d| anyhow!("{d}"))?;
    let mut mem = LinearMemory::new(cfg.memory_size);

    let is_source = matches!(opts.input.extension().and_then(|e| e.to_str()), Some("s" | "asm"));
    let program: Program;
    let mut engine = if is_source {
        let source = std::fs::read_to_string(&opts.input)
            .with_context(|| format!("reading {}", opts.input.display()))?;
        program = match Assembler::with_config(catalog, &cfg).assemble(&source) {
            Ok(p) => p,
            Err(diags) => {
                for d in &diags {
                    eprintln!("{}:{d}", opts.input.display());
                }
                return Ok(ExitCode::FAILURE);
            }
        };
        program.load(&mut mem)?;
        Engine::with_program(catalog, &program)
    } else {
        let bytes = std::fs::read(&opts.input)
            .with_context(|| format!("reading {}", opts.input.display()))?;
        mem.load(cfg.text_base, &bytes)?;
        let mut engine = Engine::new(catalog);
        engine.resume(opts.entry.unwrap_or(cfg.text_base));
        engine
    };
    engine.init_registers(&cfg);

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());
    let outcome = engine.run(&mut mem, &mut console, &RunLimits::from_config(&cfg));

    if opts.dump_state {
        eprintln!("{}", serde_json::to_string_pretty(engine.state())?);
    }
    Ok(match outcome {
        RunOutcome::Halted(code) => ExitCode::from(code as u8),
        RunOutcome::Trapped(fault) => {
            eprintln!("TRAP: {fault}");
            if let Ok(word) = mem.read_u32(fault.pc) {
                eprintln!("  word at pc: {word:#010x}");
            }
            ExitCode::FAILURE
        }
        RunOutcome::BudgetExhausted => {
            eprintln!("step budget exhausted at pc {:#010x}", engine.state().pc);
            ExitCode::FAILURE
        }
        RunOutcome::Stopped => ExitCode::FAILURE,
    })
}
