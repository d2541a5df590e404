//! Compilation phases over one parsed unit.
//!
//! Phases run in order against a shared [`Compilation`]; a phase reports user
//! errors into `messages` and returns `Err` only for broken invariants.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::addressing::{fits_absolute_short, fits_signed, AddressingMode};
use crate::ast::{Ast, DirectiveKind, EvalContext, NodeId, NodeKind};
use crate::codegen::{extension_offsets, CodeGenContext, CodeGenerating, Pass, Placement};
use crate::config::AssemblerConfig;
use crate::error::{InternalError, SymbolError};
use crate::instructions::InstructionTable;
use crate::isa::m68000::ExtensionFormats;
use crate::messages::CompilationMessages;
use crate::symbols::{ScopeId, SymbolKind, SymbolTable};
use crate::writer::ObjectCodeWriter;

/// State shared by the phases of one compilation.
pub struct Compilation<'a> {
    pub ast: &'a Ast,
    pub config: &'a AssemblerConfig,
    pub table: &'static InstructionTable,
    pub ext: &'static ExtensionFormats,
    pub symbols: SymbolTable,
    /// Scope every statement's names resolve in.
    pub scopes: HashMap<NodeId, ScopeId>,
    pub placements: Vec<Placement>,
    pub writer: ObjectCodeWriter,
    pub messages: CompilationMessages,
}

impl<'a> Compilation<'a> {
    pub fn new(
        ast: &'a Ast,
        config: &'a AssemblerConfig,
        table: &'static InstructionTable,
        ext: &'static ExtensionFormats,
    ) -> Self {
        Self {
            ast,
            config,
            table,
            ext,
            symbols: SymbolTable::new(),
            scopes: HashMap::new(),
            placements: Vec::new(),
            writer: ObjectCodeWriter::new(config.origin),
            messages: CompilationMessages::new(),
        }
    }

    fn scope_of(&self, statement: NodeId) -> Result<ScopeId, InternalError> {
        self.scopes
            .get(&statement)
            .copied()
            .ok_or(InternalError::MissingScope(statement.0))
    }

    fn context(&mut self, scope: ScopeId, pass: Pass) -> CodeGenContext<'_> {
        CodeGenContext {
            ast: self.ast,
            symbols: &self.symbols,
            table: self.table,
            ext: self.ext,
            cpu: self.config.cpu,
            scope,
            pass,
            pc: self.writer.offset(),
            writer: &mut self.writer,
            messages: &mut self.messages,
        }
    }
}

pub trait Phase {
    fn name(&self) -> &'static str;
    fn run(&self, c: &mut Compilation<'_>) -> Result<(), InternalError>;
}

/// Declares every label and records the scope of every statement.
pub struct GatherSymbols;

impl Phase for GatherSymbols {
    fn name(&self) -> &'static str {
        "gather-symbols"
    }

    fn run(&self, c: &mut Compilation<'_>) -> Result<(), InternalError> {
        let ast = c.ast;
        let global = c.symbols.global();
        let mut scope = global;
        for statement in ast.statements() {
            if let Some(label) = ast.statement_parts(statement).label {
                if let NodeKind::Label(name) = ast.kind(label) {
                    let target = if name.starts_with('.') {
                        scope
                    } else {
                        scope = c.symbols.open_scope(global);
                        global
                    };
                    let declared = c
                        .symbols
                        .define(target, name)
                        .and_then(|()| c.symbols.declare(target, name, SymbolKind::Label, Some(label)));
                    match declared {
                        Ok(()) => {}
                        Err(SymbolError::Duplicate { name }) => c
                            .messages
                            .error(format!("duplicate label `{name}`"), ast.region(label)),
                        Err(e) => return Err(e.into()),
                    }
                }
            }
            c.scopes.insert(statement, scope);
        }
        debug!(labels = c.symbols.labels().count(), "symbols gathered");
        Ok(())
    }
}

/// Selects a form for every instruction, reporting the ones that have none.
pub struct CheckInstructions;

impl Phase for CheckInstructions {
    fn name(&self) -> &'static str {
        "check-instructions"
    }

    fn run(&self, c: &mut Compilation<'_>) -> Result<(), InternalError> {
        let ast = c.ast;
        for statement in ast.statements() {
            let Some(id) = ast.statement_parts(statement).instruction else {
                continue;
            };
            let Some(insn) = ast.instruction(id) else {
                continue;
            };
            let operands = ast.operands(id);
            let modes: Vec<AddressingMode> = operands.iter().map(|(_, op)| op.mode()).collect();
            if let Err(e) = c.table.check_supports(&insn.mnemonic, insn.size, &modes) {
                let region = e
                    .operand()
                    .and_then(|k| operands.get(k - 1))
                    .map_or(ast.region(id), |(op, _)| ast.region(*op));
                c.messages.error(e.to_string(), region);
            }
        }
        Ok(())
    }
}

/// One walk over every statement, assigning label values as it goes.
pub struct CodeGeneration {
    pub pass: Pass,
}

impl Phase for CodeGeneration {
    fn name(&self) -> &'static str {
        match self.pass {
            Pass::Estimate => "estimate",
            Pass::Validate => "validate",
            Pass::Emit => "emit",
        }
    }

    fn run(&self, c: &mut Compilation<'_>) -> Result<(), InternalError> {
        let ast = c.ast;
        c.writer.reset(c.config.origin, self.pass.is_sizing());
        c.placements.clear();
        for statement in ast.statements() {
            let scope = c.scope_of(statement)?;
            let parts = ast.statement_parts(statement);
            let directive = parts.directive.and_then(|id| match ast.kind(id) {
                NodeKind::Directive(d) => Some((id, d)),
                _ => None,
            });
            // org and even move the offset before the label takes it
            let positions = |kind: DirectiveKind| matches!(kind, DirectiveKind::Org | DirectiveKind::Even);

            if let Some((id, d)) = directive.filter(|(_, d)| positions(d.kind)) {
                d.generate(id, &mut c.context(scope, self.pass))?;
            }
            let address = c.writer.offset();
            if let Some(label) = parts.label {
                if let NodeKind::Label(name) = ast.kind(label) {
                    c.symbols.set_value(scope, name, address as i64);
                }
            }
            if let Some(id) = parts.instruction {
                if let Some(insn) = ast.instruction(id) {
                    insn.generate(id, &mut c.context(scope, self.pass))?;
                }
            }
            if let Some((id, d)) = directive.filter(|(_, d)| !positions(d.kind)) {
                d.generate(id, &mut c.context(scope, self.pass))?;
            }
            c.placements.push(Placement {
                statement,
                address,
                length: c.writer.offset().wrapping_sub(address),
            });
        }
        Ok(())
    }
}

/// Rewrites wide operands to their narrow variant once their value fits.
pub struct FixAddressingModes;

impl FixAddressingModes {
    /// Returns how many operands changed.
    pub fn apply(&self, c: &Compilation<'_>) -> usize {
        use AddressingMode::*;
        let ast = c.ast;
        let mut changed = 0;
        for placement in &c.placements {
            let Some(id) = ast.statement_parts(placement.statement).instruction else {
                continue;
            };
            let (Some(insn), Some(&scope)) = (ast.instruction(id), c.scopes.get(&placement.statement)) else {
                continue;
            };
            let operands = ast.operands(id);
            let mut modes: Vec<AddressingMode> = operands.iter().map(|(_, op)| op.mode()).collect();
            let Ok(selection) = c.table.check_supports(&insn.mnemonic, insn.size, &modes) else {
                continue;
            };
            let offsets = extension_offsets(c.table.form(selection.form), selection.size, &modes);
            let pc = placement.address as i64;
            let cx = EvalContext {
                symbols: &c.symbols,
                scope,
                pc,
            };
            let value = |node: Option<NodeId>| node.and_then(|n| ast.get_bits(n, &cx));

            for (k, (_, op)) in operands.iter().enumerate() {
                if op.pinned {
                    continue;
                }
                let mode = op.mode();
                let Some(narrow) = mode.narrow() else {
                    continue;
                };
                let ext_addr = pc + offsets[k] as i64;
                let fits = match mode {
                    AbsoluteLong => value(op.base_value).is_some_and(fits_absolute_short),
                    Index => match op.base_displacement {
                        None => true,
                        Some(d) => value(Some(d)).is_some_and(|d| fits_signed(d, 8)),
                    },
                    PcIndex => match op.base_displacement {
                        None => true,
                        Some(d) => value(Some(d))
                            .and_then(|t| t.checked_sub(ext_addr))
                            .is_some_and(|d| fits_signed(d, 8)),
                    },
                    Relative16 => value(op.base_value)
                        .and_then(|target| target.checked_sub(pc))
                        .is_some_and(|d| fits_signed(d, 8) && d != 0 && d != -1),
                    _ => false,
                };
                if !fits {
                    continue;
                }
                modes[k] = narrow;
                if c.table.check_supports(&insn.mnemonic, insn.size, &modes).is_ok() {
                    trace!(operand = k, ?mode, ?narrow, address = placement.address, "narrowed operand");
                    op.set_mode(narrow);
                    changed += 1;
                } else {
                    modes[k] = mode;
                }
            }
        }
        changed
    }
}

/// Estimate and fix until no mode changes.
pub struct Relax;

impl Phase for Relax {
    fn name(&self) -> &'static str {
        "relax"
    }

    fn run(&self, c: &mut Compilation<'_>) -> Result<(), InternalError> {
        let estimate = CodeGeneration {
            pass: Pass::Estimate,
        };
        let limit = c.config.max_relax_iterations;
        for iteration in 0..limit {
            estimate.run(c)?;
            let changed = FixAddressingModes.apply(c);
            trace!(iteration, changed, "relaxation iteration");
            if changed == 0 {
                debug!(iterations = iteration + 1, "addressing modes settled");
                return Ok(());
            }
        }
        Err(InternalError::NoFixedPoint { iterations: limit })
    }
}

/// The phases of a full compilation, in order.
pub fn pipeline() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(GatherSymbols),
        Box::new(CheckInstructions),
        Box::new(Relax),
        Box::new(CodeGeneration {
            pass: Pass::Validate,
        }),
        Box::new(CodeGeneration { pass: Pass::Emit }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::m68000::{extensions, table};
    use crate::parser::parse;

    fn compilation<'a>(ast: &'a Ast, config: &'a AssemblerConfig) -> Compilation<'a> {
        Compilation::new(ast, config, table().unwrap(), extensions().unwrap())
    }

    #[test]
    fn local_labels_get_their_own_scope() {
        let ast = parse("a:\n.loop: nop\nb:\n.loop: nop\n").unwrap();
        let config = AssemblerConfig::default();
        let mut c = compilation(&ast, &config);
        GatherSymbols.run(&mut c).unwrap();
        assert!(!c.messages.has_errors());
        assert_eq!(c.symbols.labels().count(), 4);
    }

    #[test]
    fn duplicate_labels_are_reported() {
        let ast = parse("x: nop\nx: nop\n").unwrap();
        let config = AssemblerConfig::default();
        let mut c = compilation(&ast, &config);
        GatherSymbols.run(&mut c).unwrap();
        assert_eq!(c.messages.error_count(), 1);
    }

    #[test]
    fn estimate_assigns_label_values() {
        let ast = parse("nop\nmove.l #1,d0\nend:\n").unwrap();
        let config = AssemblerConfig::default();
        let mut c = compilation(&ast, &config);
        GatherSymbols.run(&mut c).unwrap();
        CodeGeneration { pass: Pass::Estimate }.run(&mut c).unwrap();
        let g = c.symbols.global();
        assert_eq!(c.symbols.lookup(g, "end").and_then(|s| s.value), Some(8));
        assert!(c.writer.is_sizing());
    }

    #[test]
    fn relaxation_cap_is_an_internal_error() {
        let ast = parse("bra next\nnext:\n").unwrap();
        let config = AssemblerConfig {
            max_relax_iterations: 0,
            ..AssemblerConfig::default()
        };
        let mut c = compilation(&ast, &config);
        GatherSymbols.run(&mut c).unwrap();
        assert!(matches!(
            Relax.run(&mut c),
            Err(InternalError::NoFixedPoint { iterations: 0 })
        ));
    }
}
