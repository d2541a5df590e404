use crate::encoding::Field;
use crate::messages::CompilationMessages;

/// Problems with an encoding pattern or with applying one.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("encoding pattern is blank")]
    Blank,
    #[error("pattern `{pattern}` is {len} bits, not a multiple of 16")]
    NotMultipleOf16 { pattern: String, len: usize },
    #[error("pattern `{pattern}` is {len} bits; a slice holds at most 32")]
    TooLong { pattern: String, len: usize },
    #[error("unrecognized field character `{ch}` in pattern `{pattern}`")]
    UnknownField { pattern: String, ch: char },
    #[error("field {0:?} is required by the encoding but was not supplied")]
    MissingField(Field),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    #[error("cannot move the write offset back to {target:#x}; bytes already written up to {offset:#x}")]
    BackwardSeek { target: u32, offset: u32 },
    #[error("writing {count} byte(s) at {offset:#x} runs past the end of the address space")]
    AddressOverflow { offset: u32, count: u32 },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SymbolError {
    #[error("duplicate declaration of `{name}`")]
    Duplicate { name: String },
    #[error("unknown scope {0}")]
    UnknownScope(usize),
}

/// Why an instruction's operands match none of its forms.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("unknown instruction `{0}`")]
    UnknownMnemonic(String),
    #[error("`{mnemonic}` takes {expected} operand(s), found {found}")]
    OperandCount {
        mnemonic: String,
        expected: String,
        found: usize,
    },
    #[error("`{mnemonic}` does not take a size suffix")]
    Unsized { mnemonic: String },
    #[error("`{mnemonic}` cannot be .{size}")]
    Size { mnemonic: String, size: &'static str },
    #[error("{mode} is not allowed as operand {index} of `{mnemonic}`")]
    Mode {
        mnemonic: String,
        index: usize,
        mode: &'static str,
    },
    #[error("address registers cannot be used with byte size")]
    ByteAddressRegister { index: usize },
}

impl FormError {
    /// 1-based operand the error is about, if any.
    pub fn operand(&self) -> Option<usize> {
        match self {
            FormError::Mode { index, .. } | FormError::ByteAddressRegister { index } => Some(*index),
            _ => None,
        }
    }
}

/// Raised by the lexer and parser; parsing stops at the first one.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("syntax error at offset {offset}: {message}")]
pub struct SyntaxError {
    pub message: String,
    pub offset: usize,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Broken invariants inside the assembler itself, never the user's source.
#[derive(thiserror::Error, Debug)]
pub enum InternalError {
    #[error("encoding table error: {0}")]
    Encoding(#[from] EncodingError),
    #[error("addressing modes did not reach a fixed point after {iterations} iterations")]
    NoFixedPoint { iterations: usize },
    #[error("no instruction form for `{mnemonic}` at code generation")]
    NoForm { mnemonic: String },
    #[error("statement {0} has no recorded scope")]
    MissingScope(usize),
    #[error("symbol table error: {0}")]
    Symbol(#[from] SymbolError),
}

#[derive(thiserror::Error, Debug)]
pub enum AssembleError {
    #[error("assembly failed with {} error(s)", .0.error_count())]
    Failed(CompilationMessages),
}
