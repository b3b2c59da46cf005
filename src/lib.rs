//! Swail: a small indentation-based language compiled to block bytecode and run on a
//! stack machine.
//!
//! Source is parsed into AST values ([`parser`]), compiled onto the blocks of a
//! [`Program`] ([`compiler`]) and executed by a [`Machine`](runtime::interpreter::Machine),
//! usually through an [`Executor`] that owns the garbage collected arena.

pub mod ast;
pub mod compiler;
pub mod lexer;
pub mod num;
pub mod parser;
pub mod runtime;
pub mod world;

#[cfg(test)]
mod test_util;

pub use compiler::{
    bytecode::{BlockId, Instruction, Opcode, Program},
    CompileError,
};
pub use lexer::{LexerError, Span};
pub use num::Integer;
pub use parser::{parse, ParseError, ParseErrorKind};
pub use runtime::{
    executor::Executor,
    interpreter::{LoadError, Status},
    Limits, RuntimeError,
};
pub use world::{fuel::Fuel, value};
