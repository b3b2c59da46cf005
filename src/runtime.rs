//! The runtime executes a [`Program`] on a stack machine.
//!
//! Calls do not use a separate return stack. A bytecode call replaces the callee on the
//! data stack with a [`Label`] naming where the caller continues, and the callee
//! returns by jumping through that label (`JUMP_LABEL`).

use core::fmt;
use std::{io, rc::Rc};

use gc_arena::{Collect, Gc, Mutation};

use crate::{
    compiler::{
        bytecode::{Argument, BlockId, Opcode, PoolError, Program},
        CompileError,
    },
    world::{
        structs::StructError,
        value::{Value, ValuePtr},
    },
};

use environment::Environment;

pub mod builtins;
pub mod environment;
pub mod executor;
pub mod interpreter;

/// Identity of an activation frame. Never reused within a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Collect)]
#[collect(require_static)]
pub struct FrameId(pub u64);

/// A return address: the block to continue in and the frame that continues there.
///
/// `block` is `None` when the calling block had no successor to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub struct Label {
    pub block: Option<BlockId>,
    pub frame: FrameId,
}

/// Execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub struct Limits {
    /// Instructions executed between two garbage collection opportunities
    pub fuel_per_slice: i32,
    /// Deepest allowed nesting of frames
    pub max_frames: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            fuel_per_slice: 1024,
            max_frames: 10_000,
        }
    }
}

/// Procedure arity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Collect)]
#[collect(require_static)]
pub enum Arity {
    Exact(usize),
    Min(usize),
}

impl Arity {
    pub fn is_satisfied(&self, len: usize) -> bool {
        match self {
            Self::Exact(e) => *e == len,
            Self::Min(m) => *m <= len,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::Min(n) => write!(f, "at least {n}"),
        }
    }
}

/// Errors a native function reports back to the machine
#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    #[error("argument {index} should be {expected}, found {found}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
        found: Box<str>,
    },
    #[error("malformed {what}: {found}")]
    Malformed { what: &'static str, found: Box<str> },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Struct(#[from] StructError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Everything that stops the machine
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
    #[error("halt and catch fire")]
    HaltAndCatchFire,
    #[error("{opcode} reaches {depth} deep into a stack of {stack}")]
    BadDepth {
        opcode: Opcode,
        depth: Argument,
        stack: usize,
    },
    #[error("{opcode} popped an empty stack")]
    StackUnderflow { opcode: Opcode },
    #[error("{opcode} does not take {argument}")]
    BadArgument { opcode: Opcode, argument: Argument },
    #[error("{0} is not callable")]
    NotCallable(Box<str>),
    #[error("{0} is not a label")]
    NotALabel(Box<str>),
    #[error("label has nowhere to return to")]
    InvalidReturn,
    #[error("label belongs to a frame that has already returned")]
    StaleLabel,
    #[error("{function} takes {expected} argument(s), {found} given")]
    Arity {
        function: Box<str>,
        expected: Arity,
        found: usize,
    },
    #[error("unbound name `{0}`")]
    UnboundName(Box<str>),
    #[error("{value} has no attribute `{attribute}`")]
    MissingAttribute {
        value: Box<str>,
        attribute: Box<str>,
    },
    #[error("more than {0} nested frames")]
    StackOverflow(usize),
    #[error("in {function}: {source}")]
    Native {
        function: Box<str>,
        source: NativeError,
    },
    #[error(transparent)]
    Struct(#[from] StructError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// What a native function may touch while it runs
pub struct NativeContext<'a, 'gc> {
    pub mc: &'a Mutation<'gc>,
    /// the running program, which natives may extend with new blocks
    pub program: &'a mut Program<'gc>,
    /// locals of the frame performing the call
    pub caller: &'a Environment<'gc>,
    pub out: &'a mut dyn io::Write,
}

pub trait Callback {
    fn name(&self) -> &str;

    fn arity(&self) -> Arity;

    fn call<'gc>(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        args: &[ValuePtr<'gc>],
    ) -> Result<ValuePtr<'gc>, NativeError>;
}

#[derive(Collect, Clone)]
#[collect(require_static)]
pub struct NativeFunction(Rc<dyn Callback>);

impl<T: Callback + 'static> From<T> for NativeFunction {
    fn from(value: T) -> Self {
        Self(Rc::new(value))
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<native {} {:p}>", self.0.name(), self.0)
    }
}

impl NativeFunction {
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn arity(&self) -> Arity {
        self.0.arity()
    }
}

/// A function compiled to bytecode
#[derive(Collect)]
#[collect(no_drop)]
pub struct CodeFunction<'gc> {
    pub name: Box<str>,
    pub entry: BlockId,
    /// values seeded into the locals of every activation
    pub captures: Vec<(Box<str>, ValuePtr<'gc>)>,
}

// It is up to runtimes to implement functions
#[derive(Collect, Clone)]
#[collect(no_drop)]
pub enum Function<'gc> {
    Native(NativeFunction),
    Code(Gc<'gc, CodeFunction<'gc>>),
}

/// Where execution goes after a call has been set up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call already produced its result: continue the caller in this block, or
    /// after the call instruction when there is none
    Resume(Option<BlockId>),
    /// A new frame has to be opened at this block
    Enter(BlockId),
}

impl<'gc> Function<'gc> {
    pub fn name(&self) -> &str {
        match self {
            Self::Native(native) => native.name(),
            Self::Code(code) => &code.name,
        }
    }

    /// Calls the function whose value sits at `stack[arg_start]`, its arguments above it.
    ///
    /// A native runs right away and its result replaces everything from `arg_start` up.
    /// A bytecode function gets the return label written over its own slot and leaves
    /// its arguments for the entry block to store.
    pub fn call(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        ret: Label,
        stack: &mut Vec<ValuePtr<'gc>>,
        arg_start: usize,
    ) -> Result<CallOutcome, RuntimeError> {
        match self {
            Self::Native(native) => {
                let args = stack.get(arg_start + 1..).unwrap_or_default();
                let arity = native.arity();
                if !arity.is_satisfied(args.len()) {
                    return Err(RuntimeError::Arity {
                        function: native.name().into(),
                        expected: arity,
                        found: args.len(),
                    });
                }
                tracing::debug!(function = native.name(), arguments = args.len(), "native call");
                let result =
                    native
                        .0
                        .call(ctx, args)
                        .map_err(|source| RuntimeError::Native {
                            function: native.name().into(),
                            source,
                        })?;
                stack.truncate(arg_start);
                stack.push(result);
                Ok(CallOutcome::Resume(ret.block))
            }
            Self::Code(code) => {
                let len = stack.len();
                let slot = stack.get_mut(arg_start).ok_or(RuntimeError::BadDepth {
                    opcode: Opcode::Call,
                    depth: Argument::try_from(len - arg_start).unwrap_or(Argument::MAX),
                    stack: len,
                })?;
                *slot = Value::label(ctx.mc, ret);
                Ok(CallOutcome::Enter(code.entry))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::{
        builtins::Print, environment::Environment, Arity, CallOutcome, Function, Label,
        NativeContext, RuntimeError,
    };
    use crate::{
        compiler::bytecode::{BlockId, Program},
        runtime::{CodeFunction, FrameId},
        test_util::with_mutation,
        world::{value::Value, GlobalTable},
    };

    #[test]
    fn arity() {
        check!(Arity::Exact(2).is_satisfied(2));
        check!(!Arity::Exact(2).is_satisfied(3));
        check!(Arity::Min(1).is_satisfied(5));
        check!(!Arity::Min(1).is_satisfied(0));
    }

    #[test]
    fn native_calls_replace_their_slot() {
        with_mutation(|mc| {
            let mut program = Program::new();
            let globals = GlobalTable::default().into_gc(mc);
            let caller = Environment::new(globals);
            let mut out = Vec::new();
            let mut ctx = NativeContext {
                mc,
                program: &mut program,
                caller: &caller,
                out: &mut out,
            };

            let print = Function::Native(Print.into());
            let below = Value::integer(mc, 0);
            let mut stack = vec![
                below,
                Value::function(mc, print.clone()),
                Value::integer(mc, 1),
                Value::text(mc, "two"),
            ];
            let ret = Label {
                block: Some(BlockId(4)),
                frame: FrameId(0),
            };
            let_assert!(Ok(outcome) = print.call(&mut ctx, ret, &mut stack, 1));
            check!(outcome == CallOutcome::Resume(Some(BlockId(4))));
            check!(stack.len() == 2);
            check!(stack[1].borrow().is_unit());
            check!(out == b"1 two\n");
        });
    }

    #[test]
    fn code_calls_leave_a_label() {
        with_mutation(|mc| {
            let mut program = Program::new();
            let globals = GlobalTable::default().into_gc(mc);
            let caller = Environment::new(globals);
            let mut out = Vec::new();
            let mut ctx = NativeContext {
                mc,
                program: &mut program,
                caller: &caller,
                out: &mut out,
            };

            let function = Function::Code(gc_arena::Gc::new(
                mc,
                CodeFunction {
                    name: "f".into(),
                    entry: BlockId(3),
                    captures: vec![],
                },
            ));
            let mut stack: Vec<_> = (0..4).map(|n| Value::integer(mc, n)).collect();
            let ret = Label {
                block: Some(BlockId(1)),
                frame: FrameId(7),
            };
            let_assert!(Ok(outcome) = function.call(&mut ctx, ret, &mut stack, 1));
            check!(outcome == CallOutcome::Enter(BlockId(3)));
            check!(stack.len() == 4);
            check!(stack[1].borrow().as_label() == Some(ret));
            check!(*stack[2].borrow() == 2);
        });
    }

    #[test]
    fn arity_is_checked_before_running() {
        with_mutation(|mc| {
            let mut program = Program::new();
            let globals = GlobalTable::default().into_gc(mc);
            let caller = Environment::new(globals);
            let mut out = Vec::new();
            let mut ctx = NativeContext {
                mc,
                program: &mut program,
                caller: &caller,
                out: &mut out,
            };
            let hello = Function::Native(super::builtins::Hello.into());
            let mut stack = vec![Value::function(mc, hello.clone()), Value::unit(mc)];
            let ret = Label {
                block: None,
                frame: FrameId(0),
            };
            let result = hello.call(&mut ctx, ret, &mut stack, 0);
            let_assert!(Err(RuntimeError::Arity { found: 1, .. }) = result);
            check!(out.is_empty());
        });
    }
}
