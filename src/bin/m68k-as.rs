use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use m68k_asm::{lexer::parse_number, AssemblerConfig, CompilationUnit, Compiler, Cpu};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CpuArg {
    #[value(name = "68000")]
    M68000,
    #[value(name = "68020")]
    M68020,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum MessageFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Assemble Motorola 68000 source into a raw big-endian binary"
)]
struct Opts {
    #[arg(value_name = "SOURCE")]
    input: PathBuf,
    /// Output file; defaults to SOURCE with a .bin extension
    #[arg(short, long, value_name = "BINFILE")]
    output: Option<PathBuf>,
    /// JSON assembler config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    cpu: Option<CpuArg>,
    #[arg(long, value_parser = parse_address)]
    origin: Option<u32>,
    /// Zero-fill from address 0 up to the first byte
    #[arg(long)]
    pad: bool,
    /// Print an address/bytes/source listing to stdout
    #[arg(long)]
    listing: bool,
    #[arg(long, value_enum, default_value_t)]
    messages: MessageFormat,
}

fn parse_address(s: &str) -> Result<u32, String> {
    parse_number(s)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| format!("`{s}` is not a 32-bit address"))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();
    let mut config = match &opts.config {
        Some(path) => AssemblerConfig::from_json_file(path)?,
        None => AssemblerConfig::default(),
    };
    if let Some(cpu) = opts.cpu {
        config.cpu = match cpu {
            CpuArg::M68000 => Cpu::M68000,
            CpuArg::M68020 => Cpu::M68020,
        };
    }
    if let Some(origin) = opts.origin {
        config.origin = origin;
    }
    config.pad_leading_gap |= opts.pad;

    let text = std::fs::read_to_string(&opts.input)
        .with_context(|| format!("reading {}", opts.input.display()))?;
    let name = opts.input.display().to_string();
    let mut compiler = Compiler::new(config);
    let messages = compiler.compile(&CompilationUnit::new(name.clone(), text.clone()));

    match opts.messages {
        MessageFormat::Text => {
            for m in &messages {
                eprintln!("{}", m.render(&name, &text));
            }
        }
        MessageFormat::Json => println!("{}", serde_json::to_string_pretty(&messages)?),
    }
    if messages.has_errors() {
        bail!("assembly failed with {} error(s)", messages.error_count());
    }

    if opts.listing {
        for line in compiler.listing(&text) {
            let hex: String = line.bytes.iter().map(|b| format!("{b:02X}")).collect();
            println!("{:08X}  {:<20} {}", line.address, hex, line.source);
        }
    }

    let output = opts
        .output
        .clone()
        .unwrap_or_else(|| opts.input.with_extension("bin"));
    std::fs::write(&output, compiler.bytes())
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}
