pub mod addressing;
pub mod ast;
pub mod codegen;
pub mod compiler;
pub mod config;
pub mod decoder;
pub mod disasm;
pub mod encoding;
pub mod error;
pub mod instructions;
pub mod lexer;
pub mod messages;
pub mod parser;
pub mod phases;
pub mod symbols;
pub mod token;
pub mod writer;

pub mod isa {
    pub mod m68000; // shared 68000/68020 table
}

pub use addressing::{AddressingMode, Register, Size};
pub use compiler::{assemble, CompilationUnit, Compiler, ListingLine};
pub use config::{AssemblerConfig, Cpu};
pub use decoder::{Decoded, Decoder};
pub use error::{AssembleError, EncodingError, InternalError, SyntaxError};
pub use messages::{CompilationMessages, Level, Message};
