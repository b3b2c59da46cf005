//! Representation of Swail values
//!
//! Every value is shared behind a [`ValuePtr`], compared by identity unless its kind
//! defines a structural equivalence, and carries a mutable map of named attributes.
use core::fmt;
use std::{borrow::Cow, collections::HashMap};

use gc_arena::{Collect, Gc, Mutation, RefLock};
use num_bigint::BigInt;

use crate::{
    ast::{Expression, Statement},
    num::Integer,
    runtime::{Function, Label},
    world::{
        cons_list::List,
        structs::{Struct, StructInstance, StructMember},
    },
};

pub use text::TextError;

mod text;

pub type ValuePtr<'gc> = Gc<'gc, RefLock<Value<'gc>>>;

#[derive(Collect)]
#[collect(no_drop)]
pub struct Value<'gc> {
    kind: ValueKind<'gc>,
    attributes: HashMap<Box<str>, ValuePtr<'gc>>,
}

// Type that stores all possible values!
#[derive(Collect, Clone)]
#[collect(no_drop)]
pub enum ValueKind<'gc> {
    /// A plain object that is only ever equal to itself
    Object(Box<str>),
    Unit,
    Boolean(bool),
    Integer(Integer),
    Text(Box<str>),
    Label(Label),
    Function(Function<'gc>),
    Struct(Gc<'gc, Struct>),
    Member(StructMember<'gc>),
    Instance(StructInstance<'gc>),
    List(List<'gc>),
    Statement(Statement<'gc>),
    Expression(Expression<'gc>),
}

impl<'gc> Value<'gc> {
    pub fn new(mc: &Mutation<'gc>, kind: ValueKind<'gc>) -> ValuePtr<'gc> {
        Gc::new(
            mc,
            RefLock::new(Self {
                kind,
                attributes: HashMap::default(),
            }),
        )
    }

    pub fn object(mc: &Mutation<'gc>, name: impl AsRef<str>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Object(Box::from(name.as_ref())))
    }

    pub fn unit(mc: &Mutation<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Unit)
    }

    pub fn boolean(mc: &Mutation<'gc>, value: bool) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Boolean(value))
    }

    pub fn integer(mc: &Mutation<'gc>, value: impl Into<Integer>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Integer(value.into()))
    }

    pub fn text(mc: &Mutation<'gc>, value: impl AsRef<str>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Text(Box::from(value.as_ref())))
    }

    /// Decodes `bytes` with the encoding named by `label` (any WHATWG label, e.g.
    /// `"latin-1"` or `"shift_jis"`), or as UTF-8 when there is no label.
    pub fn text_from_bytes(
        mc: &Mutation<'gc>,
        bytes: &[u8],
        label: Option<&str>,
    ) -> Result<ValuePtr<'gc>, TextError> {
        Ok(Self::new(mc, ValueKind::Text(text::decode(bytes, label)?)))
    }

    pub fn label(mc: &Mutation<'gc>, label: Label) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Label(label))
    }

    pub fn function(mc: &Mutation<'gc>, function: Function<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Function(function))
    }

    pub fn structure(mc: &Mutation<'gc>, structure: Gc<'gc, Struct>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Struct(structure))
    }

    pub fn member(mc: &Mutation<'gc>, member: StructMember<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Member(member))
    }

    pub fn instance(mc: &Mutation<'gc>, instance: StructInstance<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Instance(instance))
    }

    pub fn list(mc: &Mutation<'gc>, list: List<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::List(list))
    }

    pub fn statement(mc: &Mutation<'gc>, statement: Statement<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Statement(statement))
    }

    pub fn expression(mc: &Mutation<'gc>, expression: Expression<'gc>) -> ValuePtr<'gc> {
        Self::new(mc, ValueKind::Expression(expression))
    }

    pub fn kind(&self) -> &ValueKind<'gc> {
        &self.kind
    }

    pub fn as_integer(&self) -> Option<&Integer> {
        match &self.kind {
            ValueKind::Integer(int) => Some(int),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<Label> {
        match &self.kind {
            ValueKind::Label(label) => Some(*label),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function<'gc>> {
        match &self.kind {
            ValueKind::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<List<'gc>> {
        match &self.kind {
            ValueKind::List(list) => Some(*list),
            _ => None,
        }
    }

    pub fn as_statement(&self) -> Option<Statement<'gc>> {
        match &self.kind {
            ValueKind::Statement(statement) => Some(*statement),
            _ => None,
        }
    }

    pub fn as_expression(&self) -> Option<Expression<'gc>> {
        match &self.kind {
            ValueKind::Expression(expression) => Some(*expression),
            _ => None,
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.kind, ValueKind::Unit)
    }

    /// Integers are kept as they are, Text is read as a decimal integer.
    pub fn to_integer(&self) -> Option<Integer> {
        match &self.kind {
            ValueKind::Integer(int) => Some(int.clone()),
            ValueKind::Text(text) => Integer::from_decimal(text).ok(),
            _ => None,
        }
    }

    /// Truthiness of the value, as used by conditional jumps.
    pub fn to_bool(&self) -> bool {
        match &self.kind {
            ValueKind::Unit => false,
            ValueKind::Boolean(value) => *value,
            ValueKind::Integer(int) => !int.is_zero(),
            ValueKind::Text(text) => !text.is_empty(),
            _ => true,
        }
    }

    /// The display name of this value
    pub fn name(&self) -> Cow<'_, str> {
        match &self.kind {
            ValueKind::Object(name) => Cow::Borrowed(name),
            ValueKind::Unit => Cow::Borrowed("unit"),
            ValueKind::Boolean(true) => Cow::Borrowed("True"),
            ValueKind::Boolean(false) => Cow::Borrowed("False"),
            ValueKind::Integer(int) => Cow::Owned(int.to_string()),
            ValueKind::Text(text) => Cow::Owned(format!("{text:?}")),
            ValueKind::Label(label) => match label.block {
                Some(block) => Cow::Owned(format!("label {block}")),
                None => Cow::Borrowed("label"),
            },
            ValueKind::Function(function) => Cow::Owned(function.name().to_owned()),
            ValueKind::Struct(structure) => Cow::Owned(structure.name().to_owned()),
            ValueKind::Member(member) => Cow::Owned(member.name().to_owned()),
            ValueKind::Instance(instance) => Cow::Owned(instance.member().name().to_owned()),
            ValueKind::List(List::Empty) => Cow::Borrowed("empty"),
            ValueKind::List(List::Cons(_)) => Cow::Borrowed("cons"),
            ValueKind::Statement(statement) => Cow::Borrowed(statement.variant_name()),
            ValueKind::Expression(expression) => Cow::Borrowed(expression.variant_name()),
        }
    }

    /// Reads an attribute, falling back to the built-in attributes of the value's kind and
    /// finally to `name`, the display name.
    pub fn get(&self, mc: &Mutation<'gc>, key: &str) -> Option<ValuePtr<'gc>> {
        if let Some(value) = self.attributes.get(key) {
            return Some(*value);
        }
        let builtin = match &self.kind {
            ValueKind::Struct(structure) => {
                StructMember::lookup(*structure, key).map(|member| Value::member(mc, member))
            }
            ValueKind::Member(member) => match key {
                "parent" => Some(Value::structure(mc, member.parent())),
                "fields" => {
                    let fields: Vec<_> = member
                        .fields()
                        .iter()
                        .map(|field| Value::text(mc, field))
                        .collect();
                    Some(Value::list(mc, List::from_values(mc, &fields)))
                }
                _ => None,
            },
            ValueKind::Instance(instance) => match key {
                "member" => Some(Value::member(mc, instance.member())),
                "values" => Some(Value::list(mc, List::from_values(mc, instance.fields()))),
                field => instance.field(field),
            },
            ValueKind::Statement(statement) => statement.attribute(mc, key),
            ValueKind::Expression(expression) => expression.attribute(mc, key),
            _ => None,
        };
        builtin.or_else(|| (key == "name").then(|| Value::text(mc, self.name())))
    }

    /// Inserts into the attribute map of `this`, returning the value it replaced.
    pub fn set(
        this: ValuePtr<'gc>,
        mc: &Mutation<'gc>,
        key: impl AsRef<str>,
        value: ValuePtr<'gc>,
    ) -> Option<ValuePtr<'gc>> {
        this.borrow_mut(mc)
            .attributes
            .insert(Box::from(key.as_ref()), value)
    }

    /// Equivalence of two values. Kinds without a structural equivalence compare by identity.
    pub fn equals(&self, other: &Value<'gc>) -> bool {
        match (&self.kind, &other.kind) {
            (ValueKind::Unit, ValueKind::Unit) => true,
            (ValueKind::Boolean(a), ValueKind::Boolean(b)) => a == b,
            (ValueKind::Integer(a), ValueKind::Integer(b)) => a == b,
            (ValueKind::Text(a), ValueKind::Text(b)) => a == b,
            (ValueKind::Struct(a), ValueKind::Struct(b)) => Gc::ptr_eq(*a, *b),
            (ValueKind::Member(a), ValueKind::Member(b)) => a.same_handle(b),
            (ValueKind::Instance(a), ValueKind::Instance(b)) => a.equals(b),
            (ValueKind::List(a), ValueKind::List(b)) => a.equals(*b),
            (ValueKind::Statement(a), ValueKind::Statement(b)) => a.equals(b),
            (ValueKind::Expression(a), ValueKind::Expression(b)) => a.equals(b),
            _ => core::ptr::eq(self, other),
        }
    }
}

/// Equivalence of two shared values, see [`Value::equals`].
pub fn values_equal<'gc>(a: ValuePtr<'gc>, b: ValuePtr<'gc>) -> bool {
    Gc::ptr_eq(a, b) || a.borrow().equals(&b.borrow())
}

impl<'gc> PartialEq for Value<'gc> {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl<'gc> PartialEq<bool> for Value<'gc> {
    fn eq(&self, other: &bool) -> bool {
        matches!(self.kind, ValueKind::Boolean(value) if value == *other)
    }
}

impl<'gc> PartialEq<i64> for Value<'gc> {
    fn eq(&self, other: &i64) -> bool {
        self.as_integer().is_some_and(|int| int == other)
    }
}

impl<'gc> PartialEq<BigInt> for Value<'gc> {
    fn eq(&self, other: &BigInt) -> bool {
        self.as_integer().is_some_and(|int| int == other)
    }
}

impl<'gc> PartialEq<str> for Value<'gc> {
    fn eq(&self, other: &str) -> bool {
        self.as_text() == Some(other)
    }
}

impl<'gc> PartialEq<&str> for Value<'gc> {
    fn eq(&self, other: &&str) -> bool {
        self.as_text() == Some(*other)
    }
}

/// The form written by `WRITE` and `print`: Text is written raw, everything else by name.
impl<'gc> fmt::Display for Value<'gc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ValueKind::Text(text) => f.write_str(text),
            _ => f.write_str(&self.name()),
        }
    }
}

// Attributes are left out, they can refer back to this value
impl<'gc> fmt::Debug for Value<'gc> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("name", &self.name())
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}
