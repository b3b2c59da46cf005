//! The executor owns the garbage collected arena a [`Machine`] lives in.
//!
//! Everything outside the arena talks to the machine through the executor, and only
//! ever sees plain Rust data (strings, errors) coming back out of it. Execution runs in
//! slices of [`Limits::fuel_per_slice`] instructions, with a collection between slices.

use std::io::Write;

use gc_arena::{Arena, Rootable};
use tracing::debug;

use crate::{
    compiler::bytecode::Program,
    world::{fuel::Fuel, GlobalTable},
};

use super::{
    interpreter::{LoadError, Machine, Status},
    Limits, RuntimeError,
};

pub struct Executor {
    arena: Arena<Rootable![Machine<'_>]>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl Executor {
    /// An executor with an empty program and the standard globals
    pub fn new(limits: Limits) -> Self {
        let arena = Arena::<Rootable![Machine<'_>]>::new(|mc| {
            let globals = GlobalTable::standard(mc).into_gc(mc);
            Machine::new(Program::new(), globals, limits)
        });
        Self { arena }
    }

    /// Parses and compiles `source` after everything loaded before it.
    ///
    /// Nothing runs until [`Executor::run`].
    pub fn load_source(&mut self, source: &str) -> Result<(), LoadError> {
        self.arena
            .mutate_root(|mc, machine| machine.load_source(mc, source))
    }

    /// Runs everything loaded so far to the end, writing program output to `out`.
    pub fn run(&mut self, out: &mut dyn Write) -> Result<(), RuntimeError> {
        let slice = self
            .arena
            .mutate(|_, machine| machine.limits().fuel_per_slice)
            .max(1);
        let mut fuel = Fuel::with(slice);
        let mut slices = 0usize;
        loop {
            let status = self
                .arena
                .mutate_root(|mc, machine| machine.step(mc, &mut *out, &mut fuel))?;
            slices += 1;
            if status == Status::Finished {
                debug!(slices, "run finished");
                return Ok(());
            }
            self.arena.collect_debt();
            fuel.refill(slice, slice);
        }
    }

    /// Drops whatever a runtime error interrupted; see [`Machine::abandon`].
    pub fn abandon(&mut self) {
        self.arena.mutate_root(|_, machine| machine.abandon());
    }

    /// The disassembly of the whole program
    pub fn disassemble(&self) -> String {
        self.arena.mutate(|_, machine| machine.program().to_string())
    }

    /// Display names of the values on the stack, bottom first
    pub fn stack(&self) -> Vec<String> {
        self.arena.mutate(|_, machine| {
            machine
                .stack()
                .iter()
                .map(|value| value.borrow().name().into_owned())
                .collect()
        })
    }

    /// Names read by top-level code that it never bound, sorted
    pub fn free_variables(&self) -> Vec<String> {
        self.arena.mutate(|_, machine| {
            let mut free: Vec<_> = machine
                .closure()
                .free_variables()
                .into_iter()
                .map(String::from)
                .collect();
            free.sort_unstable();
            free
        })
    }
}
