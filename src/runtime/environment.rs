//! Environments map names to values for one frame of execution.
//!
//! Locals belong to the frame. Names that are not local fall through to the shared
//! globals, which no frame can modify.

use std::collections::HashMap;

use gc_arena::Collect;

use crate::world::{value::ValuePtr, Globals};

#[derive(Collect)]
#[collect(no_drop)]
pub struct Environment<'gc> {
    globals: Globals<'gc>,
    locals: HashMap<Box<str>, ValuePtr<'gc>>,
}

impl<'gc> Environment<'gc> {
    pub fn new(globals: Globals<'gc>) -> Self {
        Self {
            globals,
            locals: HashMap::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<ValuePtr<'gc>> {
        self.get_local(name).or_else(|| self.globals.get(name))
    }

    pub fn get_local(&self, name: &str) -> Option<ValuePtr<'gc>> {
        self.locals.get(name).copied()
    }

    /// Creates a local binding, replacing (and returning) any local of the same name.
    pub fn define(&mut self, name: impl AsRef<str>, value: ValuePtr<'gc>) -> Option<ValuePtr<'gc>> {
        self.locals.insert(Box::from(name.as_ref()), value)
    }
}
