//! The world every Swail program runs in: the values it is made of, and the table of
//! builtins that every frame can see.

use std::collections::HashMap;

use gc_arena::{Collect, Gc, Mutation};

use crate::runtime::{builtins, Function};

use value::{Value, ValuePtr};

pub mod cons_list;
pub mod fuel;
pub mod structs;
pub mod value;

/// Shared, read-only table of global names
pub type Globals<'gc> = Gc<'gc, GlobalTable<'gc>>;

#[derive(Collect, Default)]
#[collect(no_drop)]
pub struct GlobalTable<'gc> {
    values: HashMap<Box<str>, ValuePtr<'gc>>,
}

impl<'gc> GlobalTable<'gc> {
    /// The builtins bound in every program: `hello`, `print`, `pass`, `def`, `struct`, `eq`.
    pub fn standard(mc: &Mutation<'gc>) -> Self {
        let mut table = Self::default();
        for function in builtins::natives() {
            let name = function.name().to_owned();
            table = table.with(name, Value::function(mc, Function::Native(function)));
        }
        table.with("pass", Value::unit(mc))
    }

    pub fn with(mut self, name: impl AsRef<str>, value: ValuePtr<'gc>) -> Self {
        self.values.insert(Box::from(name.as_ref()), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<ValuePtr<'gc>> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|name| &**name)
    }

    pub fn into_gc(self, mc: &Mutation<'gc>) -> Globals<'gc> {
        Gc::new(mc, self)
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::GlobalTable;
    use crate::{test_util::with_mutation, world::value::Value};

    #[test]
    fn standard_names() {
        with_mutation(|mc| {
            let globals = GlobalTable::standard(mc);
            let mut names: Vec<_> = globals.names().collect();
            names.sort_unstable();
            check!(names == ["def", "eq", "hello", "pass", "print", "struct"]);
            check!(globals.get("pass").is_some_and(|pass| pass.borrow().is_unit()));
            check!(globals.get("missing").is_none());
        });
    }

    #[test]
    fn extending() {
        with_mutation(|mc| {
            let globals = GlobalTable::standard(mc).with("answer", Value::integer(mc, 42));
            check!(globals.get("answer").is_some_and(|v| *v.borrow() == 42));
        });
    }
}
