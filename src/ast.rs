//! Syntax trees of Swail programs
//!
//! AST nodes are ordinary values, so a header such as `def` receives the syntax of the
//! declaration it heads as plain lists and can inspect it at run time.

use gc_arena::{Collect, Mutation};

use crate::{
    num::Integer,
    world::{
        cons_list::List,
        value::{values_equal, Value, ValuePtr},
    },
};

#[derive(Collect, Clone, Copy)]
#[collect(no_drop)]
pub enum Statement<'gc> {
    /// `header name(args):` followed by an indented body
    Declaration {
        /// dotted name of the function that receives the declaration
        header: List<'gc>,
        /// Text
        name: ValuePtr<'gc>,
        /// list of expression values
        args: List<'gc>,
        /// list of statement values
        body: List<'gc>,
    },
    Expression(ValuePtr<'gc>),
}

#[derive(Collect, Clone, Copy)]
#[collect(no_drop)]
pub enum Expression<'gc> {
    /// A dotted name: a local lookup followed by attribute lookups
    NameAccess(List<'gc>),
    Apply {
        function: ValuePtr<'gc>,
        args: List<'gc>,
    },
    BaseValue(ValuePtr<'gc>),
}

/// Builds a dotted name (`["a", "b"]` for `a.b`) as a list of Text values.
pub fn dotted_name<'gc>(mc: &Mutation<'gc>, parts: &[&str]) -> List<'gc> {
    let parts: Vec<_> = parts.iter().map(|part| Value::text(mc, part)).collect();
    List::from_values(mc, &parts)
}

impl<'gc> Statement<'gc> {
    pub fn declaration(
        mc: &Mutation<'gc>,
        header: List<'gc>,
        name: ValuePtr<'gc>,
        args: List<'gc>,
        body: List<'gc>,
    ) -> ValuePtr<'gc> {
        Value::statement(
            mc,
            Self::Declaration {
                header,
                name,
                args,
                body,
            },
        )
    }

    pub fn expression(mc: &Mutation<'gc>, expression: ValuePtr<'gc>) -> ValuePtr<'gc> {
        Value::statement(mc, Self::Expression(expression))
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::Declaration { .. } => "declaration",
            Self::Expression(_) => "expression",
        }
    }

    pub(crate) fn attribute(&self, mc: &Mutation<'gc>, key: &str) -> Option<ValuePtr<'gc>> {
        match (self, key) {
            (Self::Declaration { header, .. }, "header") => Some(Value::list(mc, *header)),
            (Self::Declaration { name, .. }, "name") => Some(*name),
            (Self::Declaration { args, .. }, "args") => Some(Value::list(mc, *args)),
            (Self::Declaration { body, .. }, "body") => Some(Value::list(mc, *body)),
            (Self::Expression(expression), "expr") => Some(*expression),
            _ => None,
        }
    }

    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Declaration {
                    header,
                    name,
                    args,
                    body,
                },
                Self::Declaration {
                    header: other_header,
                    name: other_name,
                    args: other_args,
                    body: other_body,
                },
            ) => {
                header.equals(*other_header)
                    && values_equal(*name, *other_name)
                    && args.equals(*other_args)
                    && body.equals(*other_body)
            }
            (Self::Expression(a), Self::Expression(b)) => values_equal(*a, *b),
            _ => false,
        }
    }
}

impl<'gc> Expression<'gc> {
    pub fn name_access(mc: &Mutation<'gc>, name: List<'gc>) -> ValuePtr<'gc> {
        Value::expression(mc, Self::NameAccess(name))
    }

    /// `name_access` of a dotted name given as parts
    pub fn dotted(mc: &Mutation<'gc>, parts: &[&str]) -> ValuePtr<'gc> {
        Self::name_access(mc, dotted_name(mc, parts))
    }

    pub fn apply(mc: &Mutation<'gc>, function: ValuePtr<'gc>, args: List<'gc>) -> ValuePtr<'gc> {
        Value::expression(mc, Self::Apply { function, args })
    }

    pub fn base_value(mc: &Mutation<'gc>, value: ValuePtr<'gc>) -> ValuePtr<'gc> {
        Value::expression(mc, Self::BaseValue(value))
    }

    pub fn from_int(mc: &Mutation<'gc>, value: impl Into<Integer>) -> ValuePtr<'gc> {
        Self::base_value(mc, Value::integer(mc, value))
    }

    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::NameAccess(_) => "name_access",
            Self::Apply { .. } => "apply",
            Self::BaseValue(_) => "base_value",
        }
    }

    pub(crate) fn attribute(&self, mc: &Mutation<'gc>, key: &str) -> Option<ValuePtr<'gc>> {
        match (self, key) {
            (Self::NameAccess(name), "name") => Some(Value::list(mc, *name)),
            (Self::Apply { function, .. }, "func") => Some(*function),
            (Self::Apply { args, .. }, "args") => Some(Value::list(mc, *args)),
            (Self::BaseValue(value), "value") => Some(*value),
            _ => None,
        }
    }

    pub fn equals(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NameAccess(a), Self::NameAccess(b)) => a.equals(*b),
            (
                Self::Apply { function, args },
                Self::Apply {
                    function: other_function,
                    args: other_args,
                },
            ) => values_equal(*function, *other_function) && args.equals(*other_args),
            (Self::BaseValue(a), Self::BaseValue(b)) => values_equal(*a, *b),
            _ => false,
        }
    }
}
