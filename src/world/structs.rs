//! User-declared structs
//!
//! A [`Struct`] is a named schema of members, each member listing the names of its
//! fields. Members are referred to through a [`StructMember`] handle, and calling one
//! produces a [`StructInstance`].

use gc_arena::{Collect, Gc, Mutation};

use super::value::{values_equal, ValuePtr};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructError {
    #[error("struct {structure} has no member {member}")]
    UnknownMember { structure: Box<str>, member: Box<str> },
    #[error("struct {structure} declares member {member} twice")]
    DuplicateMember { structure: Box<str>, member: Box<str> },
    #[error("{member} takes {expected} field(s), {found} given")]
    FieldCountMismatch {
        member: Box<str>,
        expected: usize,
        found: usize,
    },
}

#[derive(Debug, Collect)]
#[collect(require_static)]
pub struct Struct {
    name: Box<str>,
    members: Box<[MemberSchema]>,
}

#[derive(Debug)]
struct MemberSchema {
    name: Box<str>,
    fields: Box<[Box<str>]>,
}

impl Struct {
    /// Declares a struct. Members keep their declaration order.
    pub fn new<'gc, N, F>(
        mc: &Mutation<'gc>,
        name: impl AsRef<str>,
        members: impl IntoIterator<Item = (N, F)>,
    ) -> Result<Gc<'gc, Struct>, StructError>
    where
        N: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let name: Box<str> = name.as_ref().into();
        let mut schemas: Vec<MemberSchema> = vec![];
        for (member, fields) in members {
            let member = member.as_ref();
            if schemas.iter().any(|schema| &*schema.name == member) {
                return Err(StructError::DuplicateMember {
                    structure: name,
                    member: member.into(),
                });
            }
            schemas.push(MemberSchema {
                name: member.into(),
                fields: fields.into_iter().map(|f| f.as_ref().into()).collect(),
            });
        }
        Ok(Gc::new(
            mc,
            Struct {
                name,
                members: schemas.into_boxed_slice(),
            },
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|member| &*member.name)
    }

    fn position(&self, member: &str) -> Option<usize> {
        self.members.iter().position(|schema| &*schema.name == member)
    }
}

/// A handle to one member of a struct.
///
/// Two handles are the same member when they point into the same struct at the same member.
#[derive(Collect, Clone, Copy)]
#[collect(no_drop)]
pub struct StructMember<'gc> {
    parent: Gc<'gc, Struct>,
    index: usize,
}

impl<'gc> StructMember<'gc> {
    pub fn lookup(parent: Gc<'gc, Struct>, member: &str) -> Option<Self> {
        parent
            .position(member)
            .map(|index| Self { parent, index })
    }

    pub fn parent(&self) -> Gc<'gc, Struct> {
        self.parent
    }

    pub fn name(&self) -> &str {
        &self.parent.members[self.index].name
    }

    pub fn fields(&self) -> &[Box<str>] {
        &self.parent.members[self.index].fields
    }

    pub fn same_handle(&self, other: &Self) -> bool {
        Gc::ptr_eq(self.parent, other.parent) && self.index == other.index
    }
}

#[derive(Collect, Clone)]
#[collect(no_drop)]
pub struct StructInstance<'gc> {
    member: StructMember<'gc>,
    fields: Vec<ValuePtr<'gc>>,
}

impl<'gc> StructInstance<'gc> {
    pub fn new(member: StructMember<'gc>, fields: Vec<ValuePtr<'gc>>) -> Result<Self, StructError> {
        let expected = member.fields().len();
        if fields.len() != expected {
            return Err(StructError::FieldCountMismatch {
                member: member.name().into(),
                expected,
                found: fields.len(),
            });
        }
        Ok(Self { member, fields })
    }

    /// Looks `member` up in `parent` and builds an instance of it.
    pub fn construct(
        parent: Gc<'gc, Struct>,
        member: &str,
        fields: Vec<ValuePtr<'gc>>,
    ) -> Result<Self, StructError> {
        let handle =
            StructMember::lookup(parent, member).ok_or_else(|| StructError::UnknownMember {
                structure: parent.name().into(),
                member: member.into(),
            })?;
        Self::new(handle, fields)
    }

    pub fn member(&self) -> StructMember<'gc> {
        self.member
    }

    pub fn fields(&self) -> &[ValuePtr<'gc>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<ValuePtr<'gc>> {
        self.member
            .fields()
            .iter()
            .position(|field| &**field == name)
            .map(|index| self.fields[index])
    }

    pub fn equals(&self, other: &Self) -> bool {
        self.member.same_handle(&other.member)
            && self
                .fields
                .iter()
                .zip(&other.fields)
                .all(|(a, b)| values_equal(*a, *b))
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::{Struct, StructError, StructInstance, StructMember};
    use crate::{test_util::with_mutation, world::value::Value};

    #[test]
    fn construction() {
        with_mutation(|mc| {
            let pair = Struct::new(mc, "pair", [("pair", ["left", "right"])]).unwrap();
            let left = Value::integer(mc, 1);
            let instance =
                StructInstance::construct(pair, "pair", vec![left, Value::integer(mc, 2)]).unwrap();
            check!(instance.member().name() == "pair");
            check!(instance.field("left").is_some_and(|v| *v.borrow() == 1));
            check!(instance.field("right").is_some_and(|v| *v.borrow() == 2));
            check!(instance.field("middle").is_none());
        });
    }

    #[test]
    fn construction_errors() {
        with_mutation(|mc| {
            let maybe = Struct::new(mc, "maybe", [("nothing", vec![]), ("just", vec!["value"])])
                .unwrap();
            check!(
                StructInstance::construct(maybe, "some", vec![]).err()
                    == Some(StructError::UnknownMember {
                        structure: "maybe".into(),
                        member: "some".into()
                    })
            );
            check!(
                StructInstance::construct(maybe, "just", vec![]).err()
                    == Some(StructError::FieldCountMismatch {
                        member: "just".into(),
                        expected: 1,
                        found: 0
                    })
            );
            let duplicate = Struct::new(mc, "twice", [("a", Vec::<&str>::new()), ("a", vec![])]);
            check!(duplicate.is_err());
        });
    }

    #[test]
    fn instance_equivalence() {
        with_mutation(|mc| {
            let maybe = Struct::new(mc, "maybe", [("nothing", vec![]), ("just", vec!["value"])])
                .unwrap();
            let just = |n: i64| {
                StructInstance::construct(maybe, "just", vec![Value::integer(mc, n)]).unwrap()
            };
            check!(just(5).equals(&just(5)));
            check!(!just(5).equals(&just(6)));

            let nothing = StructInstance::construct(maybe, "nothing", vec![]).unwrap();
            check!(!nothing.equals(&just(5)));

            // same shape, different struct
            let other = Struct::new(mc, "maybe", [("nothing", Vec::<&str>::new())]).unwrap();
            let foreign = StructInstance::construct(other, "nothing", vec![]).unwrap();
            check!(!nothing.equals(&foreign));
        });
    }

    #[test]
    fn member_handles() {
        with_mutation(|mc| {
            let maybe = Struct::new(mc, "maybe", [("nothing", vec![]), ("just", vec!["value"])])
                .unwrap();
            let a = StructMember::lookup(maybe, "just").unwrap();
            let b = StructMember::lookup(maybe, "just").unwrap();
            check!(a.same_handle(&b));
            check!(a.fields().len() == 1);
            check!(maybe.member_names().collect::<Vec<_>>() == ["nothing", "just"]);
        });
    }
}
