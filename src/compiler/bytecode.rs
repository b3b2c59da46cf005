//! Block-structured bytecode
//!
//! A [`Program`] is a growable collection of [`Block`]s. Each block carries its own
//! instruction stream and the pools its instructions index into: jump labels, constants
//! and names. Control falls through from a block to its registered successor.
//!
//! ```text
//! block 0 -> 1
//!     load_local 0    ; print
//!     push_const 0    ; 37
//!     call 1
//! block 1
//! ```

use core::{fmt, str::FromStr};

use gc_arena::Collect;
use lasso::{Rodeo, Spur};

use crate::world::{cons_list::List, value::ValuePtr};

/// Instruction argument
pub type Argument = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Collect)]
#[collect(require_static)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Hello = 1,
    PushInt = 2,
    Write = 3,
    Jump = 4,
    JumpIf = 5,
    PushConst = 6,
    LoadLocal = 7,
    StoreLocal = 8,
    Pop = 9,
    Dup = 10,
    Call = 11,
    LoadAttr = 12,
    JumpLabel = 13,
    Swap = 14,
    Hcf = 255,
}

const OPCODES: [(Opcode, &str); 16] = [
    (Opcode::Nop, "nop"),
    (Opcode::Hello, "hello"),
    (Opcode::PushInt, "push_int"),
    (Opcode::Write, "write"),
    (Opcode::Jump, "jump"),
    (Opcode::JumpIf, "jump_if"),
    (Opcode::PushConst, "push_const"),
    (Opcode::LoadLocal, "load_local"),
    (Opcode::StoreLocal, "store_local"),
    (Opcode::Pop, "pop"),
    (Opcode::Dup, "dup"),
    (Opcode::Call, "call"),
    (Opcode::LoadAttr, "load_attr"),
    (Opcode::JumpLabel, "jump_label"),
    (Opcode::Swap, "swap"),
    (Opcode::Hcf, "hcf"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown opcode {0}")]
pub struct UnknownOpcode(pub u8);

impl Opcode {
    pub fn name(self) -> &'static str {
        OPCODES
            .iter()
            .find(|(opcode, _)| *opcode == self)
            .map_or("", |(_, name)| name)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        OPCODES
            .iter()
            .find(|(_, candidate)| *candidate == name)
            .map(|(opcode, _)| *opcode)
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = UnknownOpcode;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        OPCODES
            .iter()
            .find(|(opcode, _)| opcode.code() == code)
            .map(|(opcode, _)| *opcode)
            .ok_or(UnknownOpcode(code))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single instruction in its text form, `"<name> <argument>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub argument: Argument,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstructionParseError {
    #[error("expected `<opcode> <argument>`, got {0:?}")]
    Shape(Box<str>),
    #[error("unknown opcode name {0:?}")]
    UnknownName(Box<str>),
    #[error("bad argument {0:?}")]
    BadArgument(Box<str>),
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.opcode, self.argument)
    }
}

impl FromStr for Instruction {
    type Err = InstructionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(name), Some(argument), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(InstructionParseError::Shape(s.into()));
        };
        let opcode =
            Opcode::from_name(name).ok_or_else(|| InstructionParseError::UnknownName(name.into()))?;
        let argument = argument
            .parse()
            .map_err(|_| InstructionParseError::BadArgument(argument.into()))?;
        Ok(Self { opcode, argument })
    }
}

/// An interned identifier held in a block's name pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Collect)]
#[collect(require_static)]
pub struct Name(Spur);

#[derive(Default, Collect)]
#[collect(require_static)]
struct Interner(Rodeo);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("no block {0}")]
    Block(BlockId),
    #[error("no label {index} in block {block}")]
    Label { block: BlockId, index: Argument },
    #[error("no constant {index} in block {block}")]
    Constant { block: BlockId, index: Argument },
    #[error("no name {index} in block {block}")]
    Name { block: BlockId, index: Argument },
}

#[derive(Collect, Default)]
#[collect(no_drop)]
pub struct Block<'gc> {
    opcodes: Vec<u8>,
    arguments: Vec<Argument>,
    labels: Vec<BlockId>,
    constants: Vec<ValuePtr<'gc>>,
    names: Vec<Name>,
    next_block: Option<BlockId>,
}

fn pool_get<T: Copy>(pool: &[T], index: Argument) -> Option<T> {
    usize::try_from(index)
        .ok()
        .and_then(|index| pool.get(index))
        .copied()
}

fn pool_index(len: usize) -> Argument {
    Argument::try_from(len).unwrap_or(Argument::MAX)
}

impl<'gc> Block<'gc> {
    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    /// Raw opcode byte and argument at `pc`
    pub fn instruction(&self, pc: usize) -> Option<(u8, Argument)> {
        Some((*self.opcodes.get(pc)?, *self.arguments.get(pc)?))
    }

    /// All instructions, raw
    pub fn instructions(&self) -> impl Iterator<Item = (u8, Argument)> + '_ {
        self.opcodes
            .iter()
            .copied()
            .zip(self.arguments.iter().copied())
    }

    pub fn next_block(&self) -> Option<BlockId> {
        self.next_block
    }

    pub fn labels(&self) -> &[BlockId] {
        &self.labels
    }

    pub fn constants(&self) -> &[ValuePtr<'gc>] {
        &self.constants
    }

    fn label(&self, index: Argument) -> Option<BlockId> {
        pool_get(&self.labels, index)
    }

    fn constant(&self, index: Argument) -> Option<ValuePtr<'gc>> {
        pool_get(&self.constants, index)
    }

    fn name(&self, index: Argument) -> Option<Name> {
        pool_get(&self.names, index)
    }
}

/// A function body already compiled into the program, keyed by the identity of the
/// parameter and body lists it was compiled from
#[derive(Collect)]
#[collect(no_drop)]
pub struct CompiledFunction<'gc> {
    pub name: Box<str>,
    pub params: List<'gc>,
    pub body: List<'gc>,
    pub entry: BlockId,
    /// free variables of the body, sorted
    pub free: Vec<Box<str>>,
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Program<'gc> {
    blocks: Vec<Block<'gc>>,
    start_block: BlockId,
    interner: Interner,
    functions: Vec<CompiledFunction<'gc>>,
}

impl<'gc> Default for Program<'gc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'gc> Program<'gc> {
    /// A program holding only its (empty) start block
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::default()],
            start_block: BlockId(0),
            interner: Interner::default(),
            functions: vec![],
        }
    }

    pub fn start_block(&self) -> BlockId {
        self.start_block
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, block: BlockId) -> Result<&Block<'gc>, PoolError> {
        self.blocks.get(block.0).ok_or(PoolError::Block(block))
    }

    fn block_mut(&mut self, block: BlockId) -> Result<&mut Block<'gc>, PoolError> {
        self.blocks.get_mut(block.0).ok_or(PoolError::Block(block))
    }

    pub fn new_block(&mut self) -> BlockId {
        self.blocks.push(Block::default());
        BlockId(self.blocks.len() - 1)
    }

    pub fn add_instruction(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        argument: Argument,
    ) -> Result<(), PoolError> {
        self.push_raw(block, opcode.code(), argument)
    }

    /// Appends an instruction without checking that `code` is a known opcode.
    pub fn push_raw(&mut self, block: BlockId, code: u8, argument: Argument) -> Result<(), PoolError> {
        let block = self.block_mut(block)?;
        block.opcodes.push(code);
        block.arguments.push(argument);
        Ok(())
    }

    pub fn add_label(&mut self, block: BlockId, target: BlockId) -> Result<Argument, PoolError> {
        let block = self.block_mut(block)?;
        block.labels.push(target);
        Ok(pool_index(block.labels.len() - 1))
    }

    pub fn add_constant(
        &mut self,
        block: BlockId,
        value: ValuePtr<'gc>,
    ) -> Result<Argument, PoolError> {
        let block = self.block_mut(block)?;
        block.constants.push(value);
        Ok(pool_index(block.constants.len() - 1))
    }

    /// Adds `name` to the name pool of `block`, reusing the entry if it is already there.
    pub fn add_name(&mut self, block: BlockId, name: &str) -> Result<Argument, PoolError> {
        let name = Name(self.interner.0.get_or_intern(name));
        let block = self.block_mut(block)?;
        let index = match block.names.iter().position(|existing| *existing == name) {
            Some(index) => index,
            None => {
                block.names.push(name);
                block.names.len() - 1
            }
        };
        Ok(pool_index(index))
    }

    pub fn set_next_block(&mut self, block: BlockId, next: BlockId) -> Result<(), PoolError> {
        self.block_mut(block)?.next_block = Some(next);
        Ok(())
    }

    /// Creates a fresh block and registers it as the successor of `block`.
    pub fn make_next_block(&mut self, block: BlockId) -> Result<BlockId, PoolError> {
        // check first so a bad id does not leave an orphan behind
        self.block(block)?;
        let next = self.new_block();
        self.set_next_block(block, next)?;
        Ok(next)
    }

    /// The function compiled earlier from these very lists, if there is one
    pub fn compiled_function(
        &self,
        name: &str,
        params: List<'gc>,
        body: List<'gc>,
    ) -> Option<&CompiledFunction<'gc>> {
        self.functions.iter().find(|function| {
            &*function.name == name && function.params.same(params) && function.body.same(body)
        })
    }

    pub fn add_compiled_function(&mut self, function: CompiledFunction<'gc>) {
        self.functions.push(function);
    }

    pub fn label(&self, block: BlockId, index: Argument) -> Result<BlockId, PoolError> {
        self.block(block)?
            .label(index)
            .ok_or(PoolError::Label { block, index })
    }

    pub fn constant(&self, block: BlockId, index: Argument) -> Result<ValuePtr<'gc>, PoolError> {
        self.block(block)?
            .constant(index)
            .ok_or(PoolError::Constant { block, index })
    }

    pub fn name(&self, block: BlockId, index: Argument) -> Result<&str, PoolError> {
        let name = self
            .block(block)?
            .name(index)
            .ok_or(PoolError::Name { block, index })?;
        Ok(self.interner.0.resolve(&name.0))
    }

    fn annotation(&self, block: BlockId, opcode: Opcode, argument: Argument) -> Option<String> {
        match opcode {
            Opcode::PushConst => self
                .constant(block, argument)
                .ok()
                .map(|value| value.borrow().name().into_owned()),
            Opcode::LoadLocal | Opcode::StoreLocal | Opcode::LoadAttr => {
                self.name(block, argument).ok().map(str::to_owned)
            }
            Opcode::Jump | Opcode::JumpIf => self
                .label(block, argument)
                .ok()
                .map(|target| format!("block {target}")),
            _ => None,
        }
    }
}

/// Disassembly listing
impl<'gc> fmt::Display for Program<'gc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.blocks.iter().enumerate() {
            let id = BlockId(index);
            match block.next_block {
                Some(next) => writeln!(f, "block {id} -> {next}")?,
                None => writeln!(f, "block {id}")?,
            }
            for (code, argument) in block.instructions() {
                let Ok(opcode) = Opcode::try_from(code) else {
                    writeln!(f, "    <{code}> {argument}")?;
                    continue;
                };
                let text = Instruction { opcode, argument }.to_string();
                match self.annotation(id, opcode, argument) {
                    Some(note) => writeln!(f, "    {text:<16}; {note}")?,
                    None => writeln!(f, "    {text}")?,
                }
            }
        }
        Ok(())
    }
}
