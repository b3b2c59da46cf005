use gc_arena::{Arena, Mutation, Rootable};

/// Runs `f` inside a fresh arena with nothing rooted.
pub fn with_mutation<T>(f: impl for<'gc> FnOnce(&'gc Mutation<'gc>) -> T) -> T {
    Arena::<Rootable![()]>::new(|_| ()).mutate(|mc, _| f(mc))
}
