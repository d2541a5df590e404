//! Code generation for instructions and directives.
//!
//! The same code runs in three passes. `Estimate` only advances the writer and
//! treats unresolved values as zero, `Validate` does the same while reporting
//! every unresolved value and range violation, and `Emit` stores the bytes.
//! Layout never depends on the pass, so the offsets the relaxation loop settled
//! on are the offsets that get emitted.

use serde::Serialize;

use crate::addressing::{fits_absolute_short, fits_signed, AddressingMode, Register, Size};
use crate::ast::{Ast, Directive, DirectiveKind, EvalContext, Instruction, NodeId, NodeKind, Operand};
use crate::config::Cpu;
use crate::encoding::{Field, FieldValues};
use crate::error::InternalError;
use crate::instructions::{Form, InstructionTable, Slot};
use crate::isa::m68000::ExtensionFormats;
use crate::messages::CompilationMessages;
use crate::symbols::{ScopeId, SymbolTable};
use crate::token::Region;
use crate::writer::ObjectCodeWriter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Estimate,
    Validate,
    Emit,
}

impl Pass {
    pub fn is_sizing(self) -> bool {
        self != Pass::Emit
    }
}

/// Where a statement landed in the most recent walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub statement: NodeId,
    pub address: u32,
    pub length: u32,
}

/// Everything one statement's code generation can see.
pub struct CodeGenContext<'a> {
    pub ast: &'a Ast,
    pub symbols: &'a SymbolTable,
    pub table: &'static InstructionTable,
    pub ext: &'static ExtensionFormats,
    pub cpu: Cpu,
    pub scope: ScopeId,
    pub pass: Pass,
    /// Address of the statement, the value of `*`.
    pub pc: u32,
    pub writer: &'a mut ObjectCodeWriter,
    pub messages: &'a mut CompilationMessages,
}

impl CodeGenContext<'_> {
    pub fn validating(&self) -> bool {
        self.pass == Pass::Validate
    }

    fn eval_context(&self) -> EvalContext<'_> {
        EvalContext {
            symbols: self.symbols,
            scope: self.scope,
            pc: self.pc as i64,
        }
    }

    /// Value of an expression node. While validating, a missing value is reported.
    pub fn resolve(&mut self, node: NodeId) -> Option<i64> {
        let ast = self.ast;
        let value = ast.get_bits(node, &self.eval_context());
        if value.is_none() && self.validating() {
            let missing = ast.unresolved(node, &self.eval_context());
            if missing.is_empty() {
                self.messages
                    .error("expression cannot be evaluated", ast.region(node));
            }
            for id in missing {
                if let NodeKind::Identifier(name) = ast.kind(id) {
                    self.messages
                        .error(format!("undefined symbol `{name}`"), ast.region(id));
                }
            }
        }
        value
    }

    fn resolve_opt(&mut self, node: Option<NodeId>) -> Option<i64> {
        node.and_then(|id| self.resolve(id))
    }

    /// Reports `text` as an error when `ok` is false and this pass validates.
    pub fn check(&mut self, ok: bool, region: Region, text: impl FnOnce() -> String) {
        if !ok && self.validating() {
            self.messages.error(text(), region);
        }
    }

    pub fn warn(&mut self, region: Region, text: impl FnOnce() -> String) {
        if self.validating() {
            self.messages.warn(text(), region);
        }
    }

    /// Appends `bytes` at the current offset.
    pub fn emit(&mut self, bytes: &[u8], region: Region) {
        if let Err(e) = self.writer.write_bytes(bytes) {
            self.check(false, region, || e.to_string());
        }
    }

    /// Skips `count` zero bytes.
    pub fn reserve(&mut self, count: u32, region: Region) {
        if let Err(e) = self.writer.advance(count) {
            self.check(false, region, || e.to_string());
        }
    }
}

pub trait CodeGenerating {
    fn generate(&self, node: NodeId, cx: &mut CodeGenContext<'_>) -> Result<(), InternalError>;
}

/// Offset of each operand's extension words from the opcode address.
pub fn extension_offsets(form: &Form, size: Option<Size>, modes: &[AddressingMode]) -> Vec<u32> {
    let mut at = form.encoding.byte_len() as u32;
    form.operands
        .iter()
        .zip(modes)
        .map(|(&(_, slot), &mode)| {
            let here = at;
            at += match slot {
                Slot::Ea { .. } | Slot::Based(_) => mode.extension_bytes(size),
                Slot::Immediate => AddressingMode::Immediate.extension_bytes(size),
                _ => 0,
            };
            here
        })
        .collect()
}

fn low_bits(width: u32) -> i64 {
    if width >= 64 {
        -1
    } else {
        (1i64 << width) - 1
    }
}

impl CodeGenerating for Instruction {
    fn generate(&self, node: NodeId, cx: &mut CodeGenContext<'_>) -> Result<(), InternalError> {
        let ast = cx.ast;
        let operands = ast.operands(node);
        let modes: Vec<AddressingMode> = operands.iter().map(|(_, op)| op.mode()).collect();
        let selection = cx
            .table
            .check_supports(&self.mnemonic, self.size, &modes)
            .map_err(|_| InternalError::NoForm {
                mnemonic: self.mnemonic.clone(),
            })?;
        let form = cx.table.form(selection.form);
        let size = selection.size;
        let pc = cx.pc;

        cx.check(pc % 2 == 0, ast.region(node), || {
            format!("instruction at odd address ${pc:x}")
        });
        if !cx.cpu.has_extended_modes() {
            for (id, op) in &operands {
                let mode = op.mode();
                cx.check(!mode.requires_68020(), ast.region(*id), || {
                    format!("{} requires a 68020", mode.describe())
                });
                if let Some(index) = op.index_register {
                    cx.check(index.scale == 1, ast.region(*id), || {
                        format!("index scale *{} requires a 68020", index.scale)
                    });
                }
            }
        }

        let mut values = FieldValues::new();
        if let Some(bits) = size.and_then(|s| form.size_coding.encode(s)) {
            values.set(Field::Size, bits);
        }
        for &(field, value) in &form.implied {
            values.set(field, value);
        }

        let offsets = extension_offsets(form, size, &modes);
        let predecrement = modes.contains(&AddressingMode::PreDecrement);
        let mut extension = Vec::new();
        for (k, ((id, op), &(_, slot))) in operands.iter().zip(&form.operands).enumerate() {
            let region = ast.region(*id);
            let register = ast.base_register(op).map_or(0, Register::number);
            match slot {
                Slot::Ea { mode, register: reg_field } => {
                    let m = op.mode();
                    values.set(mode, m.mode_bits().unwrap_or(0) as i64);
                    values.set(reg_field, m.register_bits(register).unwrap_or(0) as i64);
                    let ext_addr = pc.wrapping_add(offsets[k]);
                    ea_extension(cx, op, region, ext_addr, size, &mut extension)?;
                }
                Slot::Register(field) => {
                    values.set(field, register as i64);
                }
                Slot::Based(field) => {
                    values.set(field, register as i64);
                    let ext_addr = pc.wrapping_add(offsets[k]);
                    ea_extension(cx, op, region, ext_addr, size, &mut extension)?;
                }
                Slot::Quick(field) => {
                    let q = cx.resolve_opt(op.base_value);
                    if let Some(q) = q {
                        cx.check((1..=8).contains(&q), region, || {
                            format!("quick value {q} is outside 1..8")
                        });
                    }
                    values.set(field, q.unwrap_or(1) & 7);
                }
                Slot::Data { field, signed } => {
                    let width = form.encoding.width(field);
                    let v = cx.resolve_opt(op.base_value);
                    if let Some(v) = v {
                        let min = if signed { -(1i64 << (width - 1)) } else { 0 };
                        cx.check((min..=low_bits(width)).contains(&v), region, || {
                            format!("value {v} does not fit in {width} bits")
                        });
                    }
                    values.set(field, v.unwrap_or(0) & low_bits(width));
                }
                Slot::Immediate => immediate(cx, op, region, size, &mut extension),
                Slot::Displacement(field) => {
                    let width = form.encoding.width(field);
                    let target = cx.resolve_opt(op.base_value);
                    let disp = target.and_then(|t| relative(cx, t, pc, region));
                    if let Some(d) = disp {
                        cx.check(fits_signed(d, width), region, || {
                            format!("branch displacement {d} does not fit in {width} bits")
                        });
                        if width == 8 {
                            cx.check(d != 0 && d != -1, region, || {
                                format!("branch displacement {d} is reserved in the short form")
                            });
                        }
                    }
                    values.set(field, disp.unwrap_or(0) & low_bits(width));
                }
                Slot::RegisterMask(field) => {
                    let mask = op
                        .base_value
                        .and_then(|list| ast.register_mask(list))
                        .unwrap_or(0);
                    // the predecrement form lists a7 first
                    let mask = if predecrement { mask.reverse_bits() } else { mask };
                    values.set(field, mask as i64);
                }
                Slot::Implied => {}
            }
        }

        let mut bytes = form.encoding.apply_values(&values)?;
        bytes.append(&mut extension);
        cx.emit(&bytes, ast.region(node));
        Ok(())
    }
}

/// Immediate data words; a byte still takes a full word.
fn immediate(
    cx: &mut CodeGenContext<'_>,
    op: &Operand,
    region: Region,
    size: Option<Size>,
    out: &mut Vec<u8>,
) {
    let size = size.unwrap_or(Size::Word);
    let v = cx.resolve_opt(op.base_value);
    if let Some(v) = v {
        cx.check(size.holds(v), region, || {
            format!("immediate {v} does not fit in .{}", size.suffix())
        });
    }
    let v = v.unwrap_or(0);
    match size {
        Size::Byte => out.extend_from_slice(&((v & 0xFF) as u16).to_be_bytes()),
        Size::Word => out.extend_from_slice(&(v as u16).to_be_bytes()),
        Size::Long => out.extend_from_slice(&(v as u32).to_be_bytes()),
    }
}

/// `target - base`; a difference outside `i64` is reported and yields `None`.
fn relative(cx: &mut CodeGenContext<'_>, target: i64, base: u32, region: Region) -> Option<i64> {
    let d = target.checked_sub(base as i64);
    cx.check(d.is_some(), region, || {
        format!("displacement to {target} is out of range")
    });
    d
}

/// Displacement for an operand, relative to `ext_addr` for the PC forms.
fn displacement(
    cx: &mut CodeGenContext<'_>,
    node: Option<NodeId>,
    mode: AddressingMode,
    ext_addr: u32,
    region: Region,
) -> Option<i64> {
    let Some(node) = node else {
        return Some(0);
    };
    let value = cx.resolve(node)?;
    if mode.is_pc_relative() {
        relative(cx, value, ext_addr, region)
    } else {
        Some(value)
    }
}

fn ea_extension(
    cx: &mut CodeGenContext<'_>,
    op: &Operand,
    region: Region,
    ext_addr: u32,
    size: Option<Size>,
    out: &mut Vec<u8>,
) -> Result<(), InternalError> {
    use AddressingMode::*;
    let mode = op.mode();
    match mode {
        Displacement | PcDisplacement => {
            let d = displacement(cx, op.base_displacement, mode, ext_addr, region);
            if let Some(d) = d {
                cx.check(fits_signed(d, 16), region, || {
                    format!("displacement {d} does not fit in 16 bits")
                });
            }
            out.extend_from_slice(&(d.unwrap_or(0) as u16).to_be_bytes());
        }
        Index8 | PcIndex8 => {
            let d = displacement(cx, op.base_displacement, mode, ext_addr, region);
            if let Some(d) = d {
                cx.check(fits_signed(d, 8), region, || {
                    format!("index displacement {d} does not fit in 8 bits")
                });
            }
            let index = op.index_register;
            let brief = cx.ext.brief.apply(|field| match field {
                Field::IndexRegister => Some(index.map_or(0, |x| x.field())),
                Field::IndexSize => Some(index.map_or(0, |x| (x.size == Size::Long) as i64)),
                Field::Scale => Some(index.map_or(0, |x| x.scale_field())),
                Field::Displacement => Some(d.unwrap_or(0) & 0xFF),
                _ => None,
            })?;
            out.extend_from_slice(&brief);
        }
        Index | PcIndex | MemoryIndirectPostIndexed | MemoryIndirectPreIndexed
        | PcMemoryIndirectPostIndexed | PcMemoryIndirectPreIndexed => {
            let index = op.index_register;
            let memory = !matches!(mode, Index | PcIndex);
            let select = match mode {
                Index | PcIndex => 0,
                MemoryIndirectPreIndexed | PcMemoryIndirectPreIndexed => 3,
                _ if index.is_some() => 7,
                _ => 3,
            };
            let full = cx.ext.full.apply(|field| match field {
                Field::BaseSuppress => Some(0),
                Field::IndexSuppress => Some(index.is_none() as i64),
                Field::BaseDisplacementSize => Some(3),
                Field::IndirectSelect => Some(select),
                Field::IndexRegister => Some(index.map_or(0, |x| x.field())),
                Field::IndexSize => Some(index.map_or(0, |x| (x.size == Size::Long) as i64)),
                Field::Scale => Some(index.map_or(0, |x| x.scale_field())),
                _ => None,
            })?;
            out.extend_from_slice(&full);

            let bd = displacement(cx, op.base_displacement, mode, ext_addr, region);
            if let Some(bd) = bd {
                cx.check(Size::Long.holds(bd), region, || {
                    format!("base displacement {bd} does not fit in 32 bits")
                });
            }
            out.extend_from_slice(&(bd.unwrap_or(0) as u32).to_be_bytes());
            if memory {
                let od = match op.outer_displacement {
                    Some(id) => cx.resolve(id),
                    None => Some(0),
                };
                if let Some(od) = od {
                    cx.check(Size::Long.holds(od), region, || {
                        format!("outer displacement {od} does not fit in 32 bits")
                    });
                }
                out.extend_from_slice(&(od.unwrap_or(0) as u32).to_be_bytes());
            }
        }
        AbsoluteShort => {
            let v = cx.resolve_opt(op.base_value);
            if let Some(v) = v {
                cx.check(fits_absolute_short(v), region, || {
                    format!("address ${v:x} does not fit in absolute short mode")
                });
            }
            out.extend_from_slice(&(v.unwrap_or(0) as u16).to_be_bytes());
        }
        AbsoluteLong => {
            let v = cx.resolve_opt(op.base_value);
            if let Some(v) = v {
                cx.check(Size::Long.holds(v), region, || {
                    format!("address {v} is outside the 32-bit address space")
                });
            }
            out.extend_from_slice(&(v.unwrap_or(0) as u32).to_be_bytes());
        }
        Immediate => immediate(cx, op, region, size, out),
        _ => {}
    }
    Ok(())
}

impl CodeGenerating for Directive {
    fn generate(&self, node: NodeId, cx: &mut CodeGenContext<'_>) -> Result<(), InternalError> {
        let ast = cx.ast;
        let region = ast.region(node);
        let args = ast.children(node);
        let size = self.size.unwrap_or(Size::Word);
        match self.kind {
            DirectiveKind::Org => {
                let Some(address) = args.first().and_then(|&a| cx.resolve(a)) else {
                    return Ok(());
                };
                match u32::try_from(address) {
                    Ok(address) => {
                        if let Err(e) = cx.writer.set_offset(address) {
                            cx.check(false, region, || e.to_string());
                        }
                    }
                    Err(_) => cx.check(false, region, || {
                        format!("origin {address} is outside the address space")
                    }),
                }
            }
            DirectiveKind::Dc => {
                let mut data = Vec::new();
                for &arg in args {
                    if let NodeKind::Str(text) = ast.kind(arg) {
                        data.extend_from_slice(text.as_bytes());
                        continue;
                    }
                    let v = cx.resolve(arg);
                    if let Some(v) = v {
                        cx.check(size.holds(v), ast.region(arg), || {
                            format!("value {v} does not fit in .{}", size.suffix())
                        });
                    }
                    let v = v.unwrap_or(0);
                    match size {
                        Size::Byte => data.push(v as u8),
                        Size::Word => data.extend_from_slice(&(v as u16).to_be_bytes()),
                        Size::Long => data.extend_from_slice(&(v as u32).to_be_bytes()),
                    }
                }
                cx.emit(&data, region);
            }
            DirectiveKind::Ds => {
                let count = args.first().and_then(|&a| cx.resolve(a)).unwrap_or(0);
                let bytes = u32::try_from(count)
                    .ok()
                    .and_then(|c| c.checked_mul(size.bytes()));
                match bytes {
                    Some(0) => cx.warn(region, || "`ds` with a zero count has no effect".into()),
                    Some(n) => cx.reserve(n, region),
                    None => cx.check(false, region, || {
                        format!("`ds` count {count} is out of range")
                    }),
                }
            }
            DirectiveKind::Even => {
                if cx.writer.offset() % 2 == 1 {
                    cx.reserve(1, region);
                } else {
                    cx.warn(region, || "`even` at an even address has no effect".into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::m68000::table;

    #[test]
    fn extension_words_follow_the_opcode_in_operand_order() {
        let t = table().unwrap();
        let modes = [AddressingMode::Immediate, AddressingMode::AbsoluteLong];
        let sel = t.check_supports("move", Some(Size::Long), &modes).unwrap();
        assert_eq!(extension_offsets(t.form(sel.form), sel.size, &modes), vec![2, 6]);
    }

    #[test]
    fn movem_mask_word_precedes_the_address() {
        let t = table().unwrap();
        let modes = [AddressingMode::RegisterList, AddressingMode::Displacement];
        let sel = t.check_supports("movem", Some(Size::Long), &modes).unwrap();
        assert_eq!(extension_offsets(t.form(sel.form), sel.size, &modes), vec![4, 4]);
    }

    #[test]
    fn field_masks() {
        assert_eq!(low_bits(8), 0xFF);
        assert_eq!(low_bits(32), 0xFFFF_FFFF);
    }
}
