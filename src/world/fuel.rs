//! Fuel for the machine
//!
//! Every executed instruction burns one unit. A [`Fuel`] is handed to
//! [`Machine::step`](crate::runtime::interpreter::Machine::step), which gives control back to its
//! caller once the tank is empty so that the caller may collect garbage in between.

#[derive(Debug, Clone)]
pub struct Fuel {
    fuel: i32,
}

impl Fuel {
    pub fn empty() -> Self {
        Self::with(0)
    }

    pub fn with(fuel: i32) -> Self {
        Self { fuel }
    }

    /// Credits `fuel`, capped at `max_fuel`.
    ///
    /// Meant to be called between slices by whatever loop keeps reusing the same tank.
    pub fn refill(&mut self, fuel: i32, max_fuel: i32) {
        self.fuel = self.fuel.saturating_add(fuel).min(max_fuel);
    }

    pub fn consume(&mut self, fuel: i32) {
        self.fuel = self.fuel.saturating_sub(fuel);
    }

    pub fn remaining(&self) -> i32 {
        self.fuel
    }

    pub fn should_continue(&self) -> bool {
        self.fuel > 0
    }
}
