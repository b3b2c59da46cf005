//! Compile-time tracking of which names a piece of code binds and which it reads.
//!
//! Whatever is read but never bound is free, and has to come from the surroundings of
//! the code: captured from the defining frame or found among the globals.

use std::collections::HashSet;

use gc_arena::Collect;

#[derive(Debug, Clone, Default, Collect)]
#[collect(require_static)]
pub struct Closure {
    bound: HashSet<Box<str>>,
    used: HashSet<Box<str>>,
}

impl Closure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_bound(&mut self, name: &str) {
        if !self.bound.contains(name) {
            self.bound.insert(name.into());
        }
    }

    pub fn make_used(&mut self, name: &str) {
        if !self.used.contains(name) {
            self.used.insert(name.into());
        }
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bound.contains(name)
    }

    pub fn bound_variables(&self) -> HashSet<&str> {
        self.bound.iter().map(|name| &**name).collect()
    }

    pub fn used_variables(&self) -> HashSet<&str> {
        self.used.iter().map(|name| &**name).collect()
    }

    /// Names that are used without being bound
    pub fn free_variables(&self) -> HashSet<&str> {
        self.used
            .iter()
            .filter(|name| !self.bound.contains(&***name))
            .map(|name| &**name)
            .collect()
    }
}
