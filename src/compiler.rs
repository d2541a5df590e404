use tracing::{debug, error};

use crate::ast::Ast;
use crate::codegen::Placement;
use crate::config::AssemblerConfig;
use crate::error::{AssembleError, InternalError};
use crate::isa::m68000::{extensions, table};
use crate::messages::{CompilationMessages, Level};
use crate::parser::parse;
use crate::phases::{pipeline, Compilation};
use crate::symbols::SymbolTable;
use crate::token::Region;
use crate::writer::{Buffer, ObjectCodeWriter};

/// A named piece of source text.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub name: String,
    pub text: String,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// One listing row: a statement's address, its bytes and its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLine {
    pub address: u32,
    pub bytes: Vec<u8>,
    pub source: String,
}

/// Runs the phase pipeline and keeps the output of the last successful run.
pub struct Compiler {
    config: AssemblerConfig,
    writer: Option<ObjectCodeWriter>,
    symbols: Option<SymbolTable>,
    placements: Vec<(Placement, Region)>,
}

impl Compiler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            config,
            writer: None,
            symbols: None,
            placements: Vec::new(),
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Parses and compiles `unit`. Output is available only if no error was reported.
    pub fn compile(&mut self, unit: &CompilationUnit) -> CompilationMessages {
        debug!(unit = %unit.name, bytes = unit.text.len(), "compiling");
        match parse(&unit.text) {
            Ok(ast) => self.compile_ast(&ast),
            Err(e) => {
                self.clear();
                let mut messages = CompilationMessages::new();
                messages.error(e.message, Region::new(e.offset, 0));
                messages
            }
        }
    }

    /// Compiles an already parsed unit.
    pub fn compile_ast(&mut self, ast: &Ast) -> CompilationMessages {
        self.clear();
        let (table, ext) = match table().and_then(|t| Ok((t, extensions()?))) {
            Ok(tables) => tables,
            Err(e) => return internal_error(CompilationMessages::new(), "tables", e.into()),
        };

        let mut c = Compilation::new(ast, &self.config, table, ext);
        for phase in pipeline() {
            debug!(phase = phase.name(), "running phase");
            if let Err(e) = phase.run(&mut c) {
                return internal_error(c.messages, phase.name(), e);
            }
            if c.messages.has_errors() {
                debug!(phase = phase.name(), errors = c.messages.error_count(), "stopping");
                return c.messages;
            }
        }

        self.placements = c
            .placements
            .iter()
            .map(|p| (*p, ast.region(p.statement)))
            .collect();
        self.writer = Some(c.writer);
        self.symbols = Some(c.symbols);
        c.messages
    }

    fn clear(&mut self) {
        self.writer = None;
        self.symbols = None;
        self.placements.clear();
    }

    /// Flattened output of the last successful compilation.
    pub fn bytes(&self) -> Vec<u8> {
        self.writer
            .as_ref()
            .map(|w| w.bytes(self.config.pad_leading_gap))
            .unwrap_or_default()
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.writer.iter().flat_map(|w| w.buffers())
    }

    pub fn symbols(&self) -> Option<&SymbolTable> {
        self.symbols.as_ref()
    }

    /// Address, bytes and source of every statement, given the source it was compiled from.
    pub fn listing(&self, source: &str) -> Vec<ListingLine> {
        let Some(writer) = &self.writer else {
            return Vec::new();
        };
        self.placements
            .iter()
            .map(|(p, region)| ListingLine {
                address: p.address,
                bytes: writer.read(p.address, p.length).map(<[u8]>::to_vec).unwrap_or_default(),
                source: source
                    .get(region.start..region.end())
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect()
    }
}

fn internal_error(
    mut messages: CompilationMessages,
    phase: &str,
    e: InternalError,
) -> CompilationMessages {
    error!(phase, error = %e, "internal assembler error");
    messages.push(Level::Error, format!("internal error: {e}"), None);
    messages
}

/// Assembles `source` with the default configuration.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let mut compiler = Compiler::new(AssemblerConfig::default());
    let messages = compiler.compile(&CompilationUnit::new("<input>", source));
    if messages.has_errors() {
        return Err(AssembleError::Failed(messages));
    }
    Ok(compiler.bytes())
}
