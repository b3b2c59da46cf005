//! Persistent singly linked lists
//!
//! A [`List`] is either empty or a cons cell holding a value and the rest of the list.
//! Lists are never mutated in place: every "modifying" operation builds a new spine and
//! shares whatever it can with its input.

use gc_arena::{Collect, Gc, Mutation};

use super::value::{values_equal, ValuePtr};

#[derive(Collect, Clone, Copy, Default)]
#[collect(no_drop)]
pub enum List<'gc> {
    #[default]
    Empty,
    Cons(Gc<'gc, Cons<'gc>>),
}

#[derive(Collect)]
#[collect(no_drop)]
pub struct Cons<'gc> {
    pub head: ValuePtr<'gc>,
    pub tail: List<'gc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ListIndexError {
    #[error("negative list index {0}")]
    Negative(i64),
    #[error("index {index} is out of range for a list of length {length}")]
    OutOfRange { index: i64, length: usize },
}

impl<'gc> List<'gc> {
    pub fn empty() -> Self {
        Self::Empty
    }

    pub fn cons(mc: &Mutation<'gc>, head: ValuePtr<'gc>, tail: List<'gc>) -> Self {
        Self::Cons(Gc::new(mc, Cons { head, tail }))
    }

    pub fn singleton(mc: &Mutation<'gc>, value: ValuePtr<'gc>) -> Self {
        Self::cons(mc, value, Self::Empty)
    }

    /// Builds a list holding `values` in order.
    pub fn from_values(mc: &Mutation<'gc>, values: &[ValuePtr<'gc>]) -> Self {
        values
            .iter()
            .rev()
            .fold(Self::Empty, |tail, head| Self::cons(mc, *head, tail))
    }

    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn head(self) -> Option<ValuePtr<'gc>> {
        match self {
            Self::Empty => None,
            Self::Cons(cell) => Some(cell.head),
        }
    }

    pub fn tail(self) -> Option<List<'gc>> {
        match self {
            Self::Empty => None,
            Self::Cons(cell) => Some(cell.tail),
        }
    }

    /// A new list with `value` added at the end.
    pub fn append(self, mc: &Mutation<'gc>, value: ValuePtr<'gc>) -> Self {
        match self {
            Self::Empty => Self::singleton(mc, value),
            Self::Cons(cell) => Self::cons(mc, cell.head, cell.tail.append(mc, value)),
        }
    }

    /// A new list with every element of `other` added at the end. `other` is shared.
    pub fn extend(self, mc: &Mutation<'gc>, other: List<'gc>) -> Self {
        match self {
            Self::Empty => other,
            Self::Cons(cell) => Self::cons(mc, cell.head, cell.tail.extend(mc, other)),
        }
    }

    pub fn length(self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Cons(cell) => 1 + cell.tail.length(),
        }
    }

    pub fn index(self, index: i64) -> Result<ValuePtr<'gc>, ListIndexError> {
        fn walk<'gc>(
            list: List<'gc>,
            remaining: i64,
            index: i64,
        ) -> Result<ValuePtr<'gc>, ListIndexError> {
            match list {
                List::Empty => Err(ListIndexError::OutOfRange {
                    index,
                    // every element before this point has been walked past
                    length: usize::try_from(index - remaining).unwrap_or(usize::MAX),
                }),
                List::Cons(cell) if remaining == 0 => Ok(cell.head),
                List::Cons(cell) => walk(cell.tail, remaining - 1, index),
            }
        }

        if index < 0 {
            return Err(ListIndexError::Negative(index));
        }
        walk(self, index, index)
    }

    pub fn iter(self) -> Iter<'gc> {
        Iter(self)
    }

    pub fn to_vec(self) -> Vec<ValuePtr<'gc>> {
        self.iter().collect()
    }

    /// Whether both are the same list object, rather than merely equal lists
    pub fn same(self, other: List<'gc>) -> bool {
        match (self, other) {
            (Self::Empty, Self::Empty) => true,
            (Self::Cons(a), Self::Cons(b)) => Gc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Element-wise equivalence of two lists of the same length.
    pub fn equals(self, other: List<'gc>) -> bool {
        let (mut left, mut right) = (self, other);
        loop {
            match (left, right) {
                (Self::Empty, Self::Empty) => return true,
                (Self::Cons(a), Self::Cons(b)) => {
                    if Gc::ptr_eq(a, b) {
                        return true;
                    }
                    if !values_equal(a.head, b.head) {
                        return false;
                    }
                    left = a.tail;
                    right = b.tail;
                }
                _ => return false,
            }
        }
    }
}

pub struct Iter<'gc>(List<'gc>);

impl<'gc> Iterator for Iter<'gc> {
    type Item = ValuePtr<'gc>;

    fn next(&mut self) -> Option<Self::Item> {
        let List::Cons(cell) = self.0 else {
            return None;
        };
        self.0 = cell.tail;
        Some(cell.head)
    }
}

impl<'gc> IntoIterator for List<'gc> {
    type Item = ValuePtr<'gc>;
    type IntoIter = Iter<'gc>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use arbtest::arbtest;
    use assert2::check;
    use gc_arena::Gc;

    use super::{List, ListIndexError};
    use crate::{
        test_util::with_mutation,
        world::value::{values_equal, Value},
    };

    #[test]
    fn basic_operations() {
        with_mutation(|mc| {
            let one = Value::integer(mc, 1);
            let two = Value::integer(mc, 2);
            let list = List::singleton(mc, one).append(mc, two);
            check!(list.length() == 2);
            check!(Gc::ptr_eq(list.index(0).unwrap(), one));
            check!(Gc::ptr_eq(list.index(1).unwrap(), two));

            check!(List::empty().is_empty());
            check!(List::empty().length() == 0);
            check!(List::empty().head().is_none());
        });
    }

    #[test]
    fn index_errors() {
        with_mutation(|mc| {
            let list = List::from_values(mc, &[Value::unit(mc), Value::unit(mc)]);
            check!(list.index(-1).err() == Some(ListIndexError::Negative(-1)));
            check!(
                list.index(2).err()
                    == Some(ListIndexError::OutOfRange {
                        index: 2,
                        length: 2
                    })
            );
            check!(
                List::empty().index(0).err()
                    == Some(ListIndexError::OutOfRange {
                        index: 0,
                        length: 0
                    })
            );
        });
    }

    #[test]
    fn extend_shares_the_suffix() {
        with_mutation(|mc| {
            let front = List::from_values(mc, &[Value::integer(mc, 1)]);
            let back = List::from_values(mc, &[Value::integer(mc, 2), Value::integer(mc, 3)]);
            let joined = front.extend(mc, back);
            check!(joined.length() == 3);
            let rest = joined.tail().unwrap();
            let shared = match (rest, back) {
                (List::Cons(a), List::Cons(b)) => Gc::ptr_eq(a, b),
                _ => false,
            };
            check!(shared);
            check!(front.length() == 1);
        });
    }

    #[test]
    fn conversion_roundtrip() {
        arbtest(|u| {
            let numbers: Vec<i64> = u.arbitrary()?;
            with_mutation(|mc| {
                let values: Vec<_> = numbers.iter().map(|n| Value::integer(mc, *n)).collect();
                let list = List::from_values(mc, &values);
                check!(list.length() == values.len());
                let back = list.to_vec();
                check!(back.len() == values.len());
                check!(back.iter().zip(&values).all(|(a, b)| Gc::ptr_eq(*a, *b)));
            });
            Ok(())
        });
    }

    #[test]
    fn rebuilt_lists_are_equal() {
        arbtest(|u| {
            let steps: Vec<(u8, Vec<i64>)> = u.arbitrary()?;
            with_mutation(|mc| {
                let mut list = List::empty();
                let mut expected = vec![];
                for (step, numbers) in steps {
                    let values: Vec<_> = numbers.iter().map(|n| Value::integer(mc, *n)).collect();
                    match (step % 3, values.first()) {
                        (0, Some(first)) => {
                            list = List::cons(mc, *first, list);
                            expected.insert(0, numbers[0]);
                        }
                        (1, Some(first)) => {
                            list = list.append(mc, *first);
                            expected.push(numbers[0]);
                        }
                        _ => {
                            list = list.extend(mc, List::from_values(mc, &values));
                            expected.extend(&numbers);
                        }
                    }
                }

                let rebuilt = List::from_values(mc, &list.to_vec());
                check!(rebuilt.equals(list));
                check!(list.equals(rebuilt));
                check!(rebuilt.length() == expected.len());
                check!(rebuilt.iter().zip(&expected).all(|(value, n)| *value.borrow() == *n));
            });
            Ok(())
        });
    }

    #[test]
    fn identity() {
        with_mutation(|mc| {
            let list = List::singleton(mc, Value::unit(mc));
            check!(list.same(list));
            check!(List::empty().same(List::empty()));
            check!(!list.same(List::singleton(mc, Value::unit(mc))));
            check!(!list.same(List::empty()));
        });
    }

    #[test]
    fn equivalence() {
        arbtest(|u| {
            let numbers: Vec<i64> = u.arbitrary()?;
            let change: Option<usize> = u.arbitrary()?;
            with_mutation(|mc| {
                let left: Vec<_> = numbers.iter().map(|n| Value::integer(mc, *n)).collect();
                let mut right: Vec<_> = numbers.iter().map(|n| Value::integer(mc, *n)).collect();
                let a = List::from_values(mc, &left);
                check!(a.equals(List::from_values(mc, &right)));

                if let Some(at) = change.filter(|_| !right.is_empty()) {
                    let at = at % right.len();
                    right[at] = Value::text(mc, "different");
                    check!(!a.equals(List::from_values(mc, &right)));
                }
                let longer = List::from_values(mc, &left).append(mc, Value::unit(mc));
                check!(!a.equals(longer));
                check!(values_equal(Value::list(mc, a), Value::list(mc, a)));
            });
            Ok(())
        });
    }
}
