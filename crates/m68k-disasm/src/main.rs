use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use m68k_asm::isa::m68000::M68000Decoder;
use m68k_disasm::{disassemble_range, load_raw_bin, Line};

#[derive(Parser, Debug)]
#[command(author, version, about = "Disassemble raw big-endian 68000 binaries")]
struct Args {
    #[arg(value_name = "BINFILE")]
    input: PathBuf,
    /// Address the first loaded byte sits at
    #[arg(long, default_value_t = 0, value_parser = parse_u32)]
    base: u32,
    /// Bytes to drop from the front of the file
    #[arg(long, default_value_t = 0)]
    skip: usize,
    /// Bytes to load after --skip; the rest of the file when omitted
    #[arg(long)]
    len: Option<usize>,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the loaded segment table
    Sections,
    /// Linear sweep over the half-open range START..END
    Range {
        #[arg(value_parser = parse_u32)]
        start: u32,
        #[arg(value_parser = parse_u32)]
        end: u32,
        /// Prefix each line with its encoded bytes
        #[arg(long)]
        show_bytes: bool,
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Output file; stdout when omitted
        #[arg(short, long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// `$1f`, `0x1f` or decimal.
fn parse_u32(s: &str) -> Result<u32, String> {
    let s = s.trim();
    let hex = s
        .strip_prefix('$')
        .or_else(|| s.strip_prefix("0x"))
        .or_else(|| s.strip_prefix("0X"));
    match hex {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("`{s}`: {e}"))
}

fn render_text(lines: &[Line], show_bytes: bool) -> String {
    let mut buf = String::new();
    for line in lines {
        let _ = write!(buf, "{:08x}  ", line.address);
        if show_bytes {
            let hex: Vec<String> = line.bytes.iter().map(|b| format!("{b:02x}")).collect();
            let _ = write!(buf, "{:<32}", hex.join(" "));
        }
        let _ = writeln!(buf, "{}", line.text);
    }
    buf
}

fn main() -> Result<()> {
    let args = Args::parse();
    let img = load_raw_bin(&args.input, args.base, args.skip, args.len)
        .with_context(|| format!("loading {}", args.input.display()))?;

    match args.action {
        Action::Sections => {
            println!("{:<10} {:<10} {:<10} {:<6} kind", "name", "start", "end", "perms");
            for seg in &img.segments {
                println!(
                    "{:<10} {:#010x} {:#010x} {:<6} {}",
                    seg.name,
                    seg.base,
                    seg.end(),
                    seg.perms,
                    seg.kind
                );
            }
        }
        Action::Range {
            start,
            end,
            show_bytes,
            format,
            out,
        } => {
            ensure!(start <= end, "range start {start:#x} is past its end {end:#x}");
            let decoder = M68000Decoder::new()?;
            let lines = disassemble_range(&img, &decoder, start, end);
            let rendered = match format {
                Format::Text => render_text(&lines, show_bytes),
                Format::Json => serde_json::to_string_pretty(&lines)? + "\n",
            };
            match out {
                Some(path) => std::fs::write(&path, rendered)
                    .with_context(|| format!("writing {}", path.display()))?,
                None => print!("{rendered}"),
            }
        }
    }
    Ok(())
}
