//! The stack machine
//!
//! A [`Machine`] owns the program being run, one shared value stack and a stack of
//! [`Frame`]s. Each frame is a cursor (block and instruction) plus its locals. The
//! machine is also the root of the garbage collection arena, so everything reachable
//! from a running program is reachable from here.

use std::io::Write;

use gc_arena::{Collect, Mutation};
use tracing::{debug, trace};

use crate::{
    compiler::{
        bytecode::{Argument, BlockId, Opcode, Program, UnknownOpcode},
        closure::Closure,
        compile_module, CompileError,
    },
    parser::{self, ParseError},
    world::{
        cons_list::List,
        fuel::Fuel,
        structs::{StructInstance, StructMember},
        value::{Value, ValueKind, ValuePtr},
        Globals,
    },
};

use super::{
    environment::Environment, CallOutcome, FrameId, Function, Label, Limits, NativeContext,
    RuntimeError,
};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Compile(#[from] CompileError),
}

/// Whether a [`Machine::step`] call left anything to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// out of fuel, more to run
    Running,
    /// the outermost frame reached the end of its code
    Finished,
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Frame<'gc> {
    id: FrameId,
    block: BlockId,
    pc: usize,
    ended: bool,
    locals: Environment<'gc>,
}

impl<'gc> Frame<'gc> {
    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn block(&self) -> BlockId {
        self.block
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn locals(&self) -> &Environment<'gc> {
        &self.locals
    }
}

enum Callee<'gc> {
    Function(Function<'gc>),
    Member(StructMember<'gc>),
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Machine<'gc> {
    program: Program<'gc>,
    globals: Globals<'gc>,
    stack: Vec<ValuePtr<'gc>>,
    frames: Vec<Frame<'gc>>,
    /// names bound and used by top-level code so far
    closure: Closure,
    /// last block of the top-level code, which code loaded next is linked after
    tail: BlockId,
    next_frame: u64,
    limits: Limits,
}

impl<'gc> Machine<'gc> {
    /// A machine about to run `program` from its start block
    pub fn new(program: Program<'gc>, globals: Globals<'gc>, limits: Limits) -> Self {
        let start = program.start_block();
        let mut machine = Self {
            program,
            globals,
            stack: vec![],
            frames: vec![],
            closure: Closure::new(),
            tail: start,
            next_frame: 0,
            limits,
        };
        let outermost = machine.open_frame(start);
        machine.frames.push(outermost);
        machine
    }

    pub fn program(&self) -> &Program<'gc> {
        &self.program
    }

    pub fn stack(&self) -> &[ValuePtr<'gc>] {
        &self.stack
    }

    pub fn frames(&self) -> &[Frame<'gc>] {
        &self.frames
    }

    pub fn closure(&self) -> &Closure {
        &self.closure
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Parses `source` and compiles it after all top-level code loaded so far.
    pub fn load_source(&mut self, mc: &Mutation<'gc>, source: &str) -> Result<(), LoadError> {
        let statements = parser::parse(mc, source)?;
        self.load(mc, statements)?;
        Ok(())
    }

    /// Compiles statement values after all top-level code loaded so far.
    ///
    /// The statements are compiled into a block of their own, which becomes the
    /// successor of the current tail only once all of them compiled. Code that fails to
    /// compile is left unreachable, and the top-level closure is left as it was.
    pub fn load(&mut self, mc: &Mutation<'gc>, statements: List<'gc>) -> Result<(), CompileError> {
        let entry = self.program.new_block();
        let mut closure = self.closure.clone();
        let end = compile_module(mc, &mut self.program, entry, statements, &mut closure)?;
        self.program.set_next_block(self.tail, entry)?;
        self.tail = end;
        self.closure = closure;
        self.resume();
        Ok(())
    }

    /// Lets a finished outermost frame continue if code has been added where it stopped.
    pub fn resume(&mut self) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        if !frame.ended {
            return false;
        }
        let more = self
            .program
            .block(frame.block)
            .is_ok_and(|block| frame.pc < block.len() || block.next_block().is_some());
        if more {
            debug!(block = frame.block.0, pc = frame.pc, "resuming outermost frame");
            frame.ended = false;
        }
        more
    }

    /// Gives up on whatever an error interrupted. The outermost frame is left finished
    /// at the end of all loaded code, so that code loaded next runs from there.
    pub fn abandon(&mut self) {
        self.frames.truncate(1);
        let end = self.program.block(self.tail).map_or(0, |block| block.len());
        if let Some(frame) = self.frames.first_mut() {
            debug!(block = self.tail.0, "abandoning interrupted code");
            frame.block = self.tail;
            frame.pc = end;
            frame.ended = true;
        }
    }

    /// Runs until the outermost frame ends, without slicing.
    pub fn run_to_end(
        &mut self,
        mc: &Mutation<'gc>,
        out: &mut dyn Write,
    ) -> Result<(), RuntimeError> {
        let mut fuel = Fuel::with(i32::MAX);
        while self.step(mc, out, &mut fuel)? == Status::Running {
            fuel.refill(i32::MAX, i32::MAX);
        }
        Ok(())
    }

    /// Executes instructions until `fuel` runs out or the outermost frame ends.
    pub fn step(
        &mut self,
        mc: &Mutation<'gc>,
        out: &mut dyn Write,
        fuel: &mut Fuel,
    ) -> Result<Status, RuntimeError> {
        loop {
            let depth = self.frames.len();
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Status::Finished);
            };
            if frame.ended {
                return Ok(Status::Finished);
            }
            if !fuel.should_continue() {
                return Ok(Status::Running);
            }

            let block = self.program.block(frame.block)?;
            let Some((code, argument)) = block.instruction(frame.pc) else {
                if let Some(next) = block.next_block() {
                    frame.block = next;
                    frame.pc = 0;
                    continue;
                }
                frame.ended = true;
                if depth == 1 {
                    debug!(frame = frame.id.0, "outermost frame finished");
                    return Ok(Status::Finished);
                }
                debug!(frame = frame.id.0, depth, "frame ran off its last block");
                self.frames.pop();
                continue;
            };

            fuel.consume(1);
            self.execute(mc, out, depth - 1, code, argument)?;
        }
    }

    fn open_frame(&mut self, block: BlockId) -> Frame<'gc> {
        let id = FrameId(self.next_frame);
        self.next_frame += 1;
        Frame {
            id,
            block,
            pc: 0,
            ended: false,
            locals: Environment::new(self.globals),
        }
    }

    fn pop(&mut self, opcode: Opcode) -> Result<ValuePtr<'gc>, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow { opcode })
    }

    /// Index of the value `depth` places from the top of the stack (1 is the top)
    fn depth_index(&self, opcode: Opcode, depth: Argument) -> Result<usize, RuntimeError> {
        let len = self.stack.len();
        usize::try_from(depth)
            .ok()
            .filter(|depth| (1..=len).contains(depth))
            .map(|depth| len - depth)
            .ok_or(RuntimeError::BadDepth {
                opcode,
                depth,
                stack: len,
            })
    }

    fn jump(&mut self, frame: usize, block: BlockId) {
        let frame = &mut self.frames[frame];
        frame.block = block;
        frame.pc = 0;
    }

    fn execute(
        &mut self,
        mc: &Mutation<'gc>,
        out: &mut dyn Write,
        frame: usize,
        code: u8,
        argument: Argument,
    ) -> Result<(), RuntimeError> {
        let opcode =
            Opcode::try_from(code).map_err(|UnknownOpcode(code)| RuntimeError::UnknownOpcode(code))?;
        let block = self.frames[frame].block;
        trace!(
            block = block.0,
            pc = self.frames[frame].pc,
            %opcode,
            argument,
            stack = self.stack.len(),
            "execute"
        );

        match opcode {
            Opcode::Nop => {}
            Opcode::Hello => writeln!(out, "Hello, World!")?,
            Opcode::PushInt => self.stack.push(Value::integer(mc, argument)),
            Opcode::Write => {
                let value = self.pop(opcode)?;
                writeln!(out, "{}", *value.borrow())?;
            }
            Opcode::Jump => {
                let target = self.program.label(block, argument)?;
                self.jump(frame, target);
                return Ok(());
            }
            Opcode::JumpIf => {
                let condition = self.pop(opcode)?;
                if condition.borrow().to_bool() {
                    let target = self.program.label(block, argument)?;
                    self.jump(frame, target);
                    return Ok(());
                }
            }
            Opcode::PushConst => {
                let value = self.program.constant(block, argument)?;
                self.stack.push(value);
            }
            Opcode::LoadLocal => {
                let name = self.program.name(block, argument)?;
                let value = self.frames[frame]
                    .locals
                    .get(name)
                    .ok_or_else(|| RuntimeError::UnboundName(name.into()))?;
                self.stack.push(value);
            }
            Opcode::StoreLocal => {
                let name: Box<str> = self.program.name(block, argument)?.into();
                let value = self.pop(opcode)?;
                self.frames[frame].locals.define(name, value);
            }
            Opcode::LoadAttr => {
                let value = self.pop(opcode)?;
                let name = self.program.name(block, argument)?;
                let attribute = value.borrow().get(mc, name).ok_or_else(|| {
                    RuntimeError::MissingAttribute {
                        value: value.borrow().name().into(),
                        attribute: name.into(),
                    }
                })?;
                self.stack.push(attribute);
            }
            Opcode::Pop => {
                let count = usize::try_from(argument)
                    .map_err(|_| RuntimeError::BadArgument { opcode, argument })?;
                let keep = self.stack.len().saturating_sub(count);
                self.stack.truncate(keep);
            }
            Opcode::Dup => {
                let index = self.depth_index(opcode, argument)?;
                self.stack.push(self.stack[index]);
            }
            Opcode::Swap => {
                let index = self.depth_index(opcode, argument)?;
                let value = self.stack.remove(index);
                self.stack.push(value);
            }
            Opcode::JumpLabel => {
                let index = self.depth_index(opcode, argument)?;
                let value = self.stack.remove(index);
                let label = value
                    .borrow()
                    .as_label()
                    .ok_or_else(|| RuntimeError::NotALabel(value.borrow().name().into()))?;
                return self.return_to(label);
            }
            Opcode::Call => return self.call(mc, out, frame, argument),
            Opcode::Hcf => return Err(RuntimeError::HaltAndCatchFire),
        }

        self.frames[frame].pc += 1;
        Ok(())
    }

    fn call(
        &mut self,
        mc: &Mutation<'gc>,
        out: &mut dyn Write,
        frame: usize,
        argument: Argument,
    ) -> Result<(), RuntimeError> {
        let opcode = Opcode::Call;
        let count =
            usize::try_from(argument).map_err(|_| RuntimeError::BadArgument { opcode, argument })?;
        let len = self.stack.len();
        let arg_start = len
            .checked_sub(count)
            .and_then(|start| start.checked_sub(1))
            .ok_or(RuntimeError::BadDepth {
                opcode,
                depth: argument.saturating_add(1),
                stack: len,
            })?;
        let callee = self.stack[arg_start];

        let caller = &mut self.frames[frame];
        let return_block = self.program.block(caller.block)?.next_block();
        caller.pc += 1;
        let ret = Label {
            block: return_block,
            frame: caller.id,
        };

        let target = match callee.borrow().kind() {
            ValueKind::Function(function) => Callee::Function(function.clone()),
            ValueKind::Member(member) => Callee::Member(*member),
            _ => return Err(RuntimeError::NotCallable(callee.borrow().name().into())),
        };

        match target {
            Callee::Member(member) => {
                let fields = self.stack.split_off(arg_start + 1);
                self.stack.truncate(arg_start);
                let instance = StructInstance::new(member, fields)?;
                self.stack.push(Value::instance(mc, instance));
                self.resume_caller(frame, return_block);
            }
            Callee::Function(function) => {
                let Machine {
                    program,
                    frames,
                    stack,
                    ..
                } = self;
                let mut ctx = NativeContext {
                    mc,
                    program,
                    caller: &frames[frame].locals,
                    out,
                };
                match function.call(&mut ctx, ret, stack, arg_start)? {
                    CallOutcome::Resume(block) => self.resume_caller(frame, block),
                    CallOutcome::Enter(entry) => self.enter(callee, &function, entry)?,
                }
            }
        }
        Ok(())
    }

    /// Continues the calling frame after a call that has already produced its result.
    fn resume_caller(&mut self, frame: usize, block: Option<BlockId>) {
        // without a successor, the caller simply carries on after the call
        if let Some(block) = block {
            self.jump(frame, block);
        }
    }

    fn enter(
        &mut self,
        callee: ValuePtr<'gc>,
        function: &Function<'gc>,
        entry: BlockId,
    ) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.limits.max_frames {
            return Err(RuntimeError::StackOverflow(self.limits.max_frames));
        }
        let mut frame = self.open_frame(entry);
        if let Function::Code(code) = function {
            for (name, value) in &code.captures {
                frame.locals.define(name, *value);
            }
            frame.locals.define(&code.name, callee);
        }
        debug!(
            function = function.name(),
            frame = frame.id.0,
            depth = self.frames.len() + 1,
            "entering frame"
        );
        self.frames.push(frame);
        Ok(())
    }

    fn return_to(&mut self, label: Label) -> Result<(), RuntimeError> {
        let block = label.block.ok_or(RuntimeError::InvalidReturn)?;
        let position = self
            .frames
            .iter()
            .rposition(|frame| frame.id == label.frame)
            .ok_or(RuntimeError::StaleLabel)?;
        if position + 1 < self.frames.len() {
            debug!(
                frame = label.frame.0,
                discarded = self.frames.len() - position - 1,
                "returning"
            );
            self.frames.truncate(position + 1);
        }
        let frame = &mut self.frames[position];
        frame.block = block;
        frame.pc = 0;
        frame.ended = false;
        Ok(())
    }
}
