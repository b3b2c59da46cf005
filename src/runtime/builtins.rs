//! Functions every Swail program starts with.
//!
//! `def` and `struct` are declaration headers: `def name(params):` hands them the
//! declared name, the parameter expressions and the body statements as plain values.

use std::io::Write;

use gc_arena::Gc;
use tracing::debug;

use crate::{
    ast::{Expression, Statement},
    compiler::{
        bytecode::CompiledFunction, closure::Closure, compile_function, expression_of,
        simple_name, statement_of,
    },
    world::{
        cons_list::List,
        structs::Struct,
        value::{values_equal, Value, ValuePtr},
    },
};

use super::{Arity, Callback, CodeFunction, Function, NativeContext, NativeError, NativeFunction};

/// All native functions bound as globals
pub fn natives() -> Vec<NativeFunction> {
    vec![Hello.into(), Print.into(), Eq.into(), Def.into(), DefineStruct.into()]
}

fn text_arg(args: &[ValuePtr<'_>], index: usize) -> Result<Box<str>, NativeError> {
    let value = args[index].borrow();
    value.as_text().map(Box::from).ok_or_else(|| NativeError::ArgumentType {
        index,
        expected: "text",
        found: value.name().into(),
    })
}

fn list_arg<'gc>(args: &[ValuePtr<'gc>], index: usize) -> Result<List<'gc>, NativeError> {
    let value = args[index].borrow();
    value.as_list().ok_or_else(|| NativeError::ArgumentType {
        index,
        expected: "a list",
        found: value.name().into(),
    })
}

pub struct Hello;

impl Callback for Hello {
    fn name(&self) -> &str {
        "hello"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(0)
    }

    fn call<'gc>(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        _args: &[ValuePtr<'gc>],
    ) -> Result<ValuePtr<'gc>, NativeError> {
        writeln!(ctx.out, "Hello, World!")?;
        Ok(Value::unit(ctx.mc))
    }
}

pub struct Print;

impl Callback for Print {
    fn name(&self) -> &str {
        "print"
    }

    fn arity(&self) -> Arity {
        Arity::Min(0)
    }

    fn call<'gc>(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        args: &[ValuePtr<'gc>],
    ) -> Result<ValuePtr<'gc>, NativeError> {
        let line = args
            .iter()
            .map(|value| value.borrow().to_string())
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(ctx.out, "{line}")?;
        Ok(Value::unit(ctx.mc))
    }
}

pub struct Eq;

impl Callback for Eq {
    fn name(&self) -> &str {
        "eq"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(2)
    }

    fn call<'gc>(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        args: &[ValuePtr<'gc>],
    ) -> Result<ValuePtr<'gc>, NativeError> {
        Ok(Value::boolean(ctx.mc, values_equal(args[0], args[1])))
    }
}

/// `def name(params):` compiles its body into the running program.
pub struct Def;

impl Callback for Def {
    fn name(&self) -> &str {
        "def"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(3)
    }

    fn call<'gc>(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        args: &[ValuePtr<'gc>],
    ) -> Result<ValuePtr<'gc>, NativeError> {
        let name = text_arg(args, 0)?;
        let params = list_arg(args, 1)?;
        let body = list_arg(args, 2)?;

        // a declaration that runs again reuses the blocks compiled the first time
        let (entry, free) = match ctx.program.compiled_function(&name, params, body) {
            Some(compiled) => (compiled.entry, compiled.free.clone()),
            None => {
                let names = params
                    .iter()
                    .map(simple_name)
                    .collect::<Result<Vec<_>, _>>()?;
                let mut closure = Closure::new();
                closure.make_bound(&name);
                let entry = compile_function(ctx.mc, ctx.program, &names, body, &mut closure)?;

                let mut free: Vec<Box<str>> =
                    closure.free_variables().into_iter().map(Box::from).collect();
                free.sort_unstable();
                ctx.program.add_compiled_function(CompiledFunction {
                    name: name.clone(),
                    params,
                    body,
                    entry,
                    free: free.clone(),
                });
                debug!(function = %name, %entry, parameters = names.len(), "compiled function");
                (entry, free)
            }
        };

        let captures: Vec<_> = free
            .into_iter()
            .filter_map(|variable| {
                let value = ctx.caller.get_local(&variable)?;
                Some((variable, value))
            })
            .collect();
        debug!(
            function = %name,
            %entry,
            captures = captures.len(),
            "defined function"
        );

        let code = CodeFunction {
            name,
            entry,
            captures,
        };
        Ok(Value::function(ctx.mc, Function::Code(Gc::new(ctx.mc, code))))
    }
}

/// `struct name():` declares a struct whose members are the body statements, each
/// either `member` or `member(field, ...)`.
pub struct DefineStruct;

impl DefineStruct {
    fn member(statement: ValuePtr<'_>) -> Result<(Box<str>, Vec<Box<str>>), NativeError> {
        let malformed = || NativeError::Malformed {
            what: "struct member",
            found: statement.borrow().name().into(),
        };
        let Statement::Expression(expression) = statement_of(statement)? else {
            return Err(malformed());
        };
        match expression_of(expression)? {
            Expression::NameAccess(_) => Ok((simple_name(expression)?, vec![])),
            Expression::Apply { function, args } => {
                let fields = args.iter().map(simple_name).collect::<Result<_, _>>()?;
                Ok((simple_name(function)?, fields))
            }
            Expression::BaseValue(_) => Err(malformed()),
        }
    }
}

impl Callback for DefineStruct {
    fn name(&self) -> &str {
        "struct"
    }

    fn arity(&self) -> Arity {
        Arity::Exact(3)
    }

    fn call<'gc>(
        &self,
        ctx: &mut NativeContext<'_, 'gc>,
        args: &[ValuePtr<'gc>],
    ) -> Result<ValuePtr<'gc>, NativeError> {
        let name = text_arg(args, 0)?;
        let members = list_arg(args, 2)?
            .iter()
            .map(Self::member)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(%name, members = members.len(), "declared struct");
        let structure = Struct::new(ctx.mc, &name, members)?;
        Ok(Value::structure(ctx.mc, structure))
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use gc_arena::Mutation;

    use super::{Def, DefineStruct, Eq, Print};
    use crate::{
        ast::{dotted_name, Expression, Statement},
        compiler::bytecode::{BlockId, Program},
        runtime::{environment::Environment, Callback, Function, NativeContext, NativeError},
        test_util::with_mutation,
        world::{
            cons_list::List,
            value::{Value, ValuePtr},
            GlobalTable,
        },
    };

    fn call_with<'gc>(
        mc: &Mutation<'gc>,
        callback: &dyn Fn(&mut NativeContext<'_, 'gc>) -> Result<(), NativeError>,
        locals: &[(&str, i64)],
    ) -> (Program<'gc>, String, Result<(), NativeError>) {
        let mut program = Program::new();
        let mut caller = Environment::new(GlobalTable::standard(mc).into_gc(mc));
        for (name, value) in locals {
            caller.define(name, Value::integer(mc, *value));
        }
        let mut out = Vec::new();
        let result = callback(&mut NativeContext {
            mc,
            program: &mut program,
            caller: &caller,
            out: &mut out,
        });
        (program, String::from_utf8(out).unwrap(), result)
    }

    /// Entry block and capture count of a bytecode function
    fn code_entry(function: ValuePtr<'_>) -> Option<(BlockId, usize)> {
        let function = function.borrow();
        match function.as_function() {
            Some(Function::Code(code)) => Some((code.entry, code.captures.len())),
            _ => None,
        }
    }

    #[test]
    fn print_joins_display_forms() {
        with_mutation(|mc| {
            let args = [
                Value::text(mc, "a b"),
                Value::boolean(mc, false),
                Value::unit(mc),
                Value::list(mc, List::empty()),
            ];
            let (_, out, result) = call_with(
                mc,
                &|ctx| Print.call(ctx, &args).map(|_| ()),
                &[],
            );
            check!(result.is_ok());
            check!(out == "a b False unit empty\n");

            let (_, out, _) = call_with(mc, &|ctx| Print.call(ctx, &[]).map(|_| ()), &[]);
            check!(out == "\n");
        });
    }

    #[test]
    fn eq_is_structural() {
        with_mutation(|mc| {
            let (_, _, result) = call_with(
                mc,
                &|ctx| {
                    let same = Eq.call(ctx, &[Value::text(mc, "x"), Value::text(mc, "x")])?;
                    let different = Eq.call(ctx, &[Value::integer(mc, 1), Value::text(mc, "1")])?;
                    assert2::assert!(*same.borrow() == true);
                    assert2::assert!(*different.borrow() == false);
                    Ok(())
                },
                &[],
            );
            check!(result.is_ok());
        });
    }

    #[test]
    fn def_compiles_and_captures() {
        with_mutation(|mc| {
            let params = List::singleton(mc, Expression::dotted(mc, &["a"]));
            let body = List::singleton(
                mc,
                Statement::expression(
                    mc,
                    Expression::apply(
                        mc,
                        Expression::dotted(mc, &["print"]),
                        List::from_values(
                            mc,
                            &[
                                Expression::dotted(mc, &["a"]),
                                Expression::dotted(mc, &["outer"]),
                                Expression::dotted(mc, &["adder"]),
                            ],
                        ),
                    ),
                ),
            );
            let args = [Value::text(mc, "adder"), Value::list(mc, params), Value::list(mc, body)];
            let (program, _, result) = call_with(
                mc,
                &|ctx| {
                    let function = Def.call(ctx, &args)?;
                    let function = function.borrow();
                    let Some(Function::Code(code)) = function.as_function() else {
                        panic!("def should return a bytecode function");
                    };
                    check!(&*code.name == "adder");
                    check!(code.entry.0 == 1);
                    let captured: Vec<_> = code.captures.iter().map(|(name, _)| &**name).collect();
                    check!(captured == ["outer"]);
                    Ok(())
                },
                &[("outer", 3), ("unrelated", 4)],
            );
            check!(result.is_ok());
            check!(program.len() == 3);
        });
    }

    #[test]
    fn def_reuses_compiled_bodies() {
        with_mutation(|mc| {
            let params = List::singleton(mc, Expression::dotted(mc, &["a"]));
            let body = List::singleton(
                mc,
                Statement::expression(mc, Expression::dotted(mc, &["outer"])),
            );
            let copy = List::singleton(
                mc,
                Statement::expression(mc, Expression::dotted(mc, &["outer"])),
            );
            let name = Value::text(mc, "inner");
            let args = [name, Value::list(mc, params), Value::list(mc, body)];
            let other = [name, Value::list(mc, params), Value::list(mc, copy)];

            let (program, _, result) = call_with(
                mc,
                &|ctx| {
                    let first = code_entry(Def.call(ctx, &args)?);
                    let blocks = ctx.program.len();
                    let again = code_entry(Def.call(ctx, &args)?);
                    check!(ctx.program.len() == blocks);
                    check!(first == Some((BlockId(1), 1)));
                    check!(again == first);

                    let fresh = code_entry(Def.call(ctx, &other)?);
                    check!(ctx.program.len() > blocks);
                    check!(fresh == Some((BlockId(2), 1)));
                    Ok(())
                },
                &[("outer", 3)],
            );
            check!(result.is_ok());
            check!(program.len() == 3);
        });
    }

    #[test]
    fn def_rejects_bad_parameters() {
        with_mutation(|mc| {
            let params = List::singleton(mc, Expression::from_int(mc, 1));
            let args = [
                Value::text(mc, "f"),
                Value::list(mc, params),
                Value::list(mc, List::empty()),
            ];
            let (_, _, result) = call_with(mc, &|ctx| Def.call(ctx, &args).map(|_| ()), &[]);
            let_assert!(Err(NativeError::Compile(_)) = result);

            let args = [Value::integer(mc, 1), Value::unit(mc), Value::unit(mc)];
            let (_, _, result) = call_with(mc, &|ctx| Def.call(ctx, &args).map(|_| ()), &[]);
            let_assert!(Err(NativeError::ArgumentType { index: 0, .. }) = result);
        });
    }

    #[test]
    fn struct_members_from_body() {
        with_mutation(|mc| {
            let body = List::from_values(
                mc,
                &[
                    Statement::expression(mc, Expression::dotted(mc, &["nothing"])),
                    Statement::expression(
                        mc,
                        Expression::apply(
                            mc,
                            Expression::dotted(mc, &["just"]),
                            List::singleton(mc, Expression::dotted(mc, &["value"])),
                        ),
                    ),
                ],
            );
            let args = [
                Value::text(mc, "maybe"),
                Value::list(mc, List::empty()),
                Value::list(mc, body),
            ];
            let (_, _, result) = call_with(
                mc,
                &|ctx| {
                    let structure = DefineStruct.call(ctx, &args)?;
                    check!(structure.borrow().name() == "maybe");
                    let just = structure.borrow().get(mc, "just").unwrap();
                    let fields = just.borrow().get(mc, "fields").unwrap();
                    check!(fields.borrow().as_list().map(|list| list.length()) == Some(1));
                    check!(structure.borrow().get(mc, "nothing").is_some());
                    Ok(())
                },
                &[],
            );
            check!(result.is_ok());
        });
    }

    #[test]
    fn struct_rejects_other_statements() {
        with_mutation(|mc| {
            let declaration = Statement::declaration(
                mc,
                dotted_name(mc, &["def"]),
                Value::text(mc, "f"),
                List::empty(),
                List::empty(),
            );
            let literal = Statement::expression(mc, Expression::from_int(mc, 2));
            for statement in [declaration, literal] {
                let args = [
                    Value::text(mc, "bad"),
                    Value::list(mc, List::empty()),
                    Value::list(mc, List::singleton(mc, statement)),
                ];
                let (_, _, result) =
                    call_with(mc, &|ctx| DefineStruct.call(ctx, &args).map(|_| ()), &[]);
                let_assert!(Err(NativeError::Malformed { .. }) = result);
            }

            let twice = Statement::expression(mc, Expression::dotted(mc, &["a"]));
            let args = [
                Value::text(mc, "bad"),
                Value::list(mc, List::empty()),
                Value::list(mc, List::from_values(mc, &[twice, twice])),
            ];
            let (_, _, result) = call_with(mc, &|ctx| DefineStruct.call(ctx, &args).map(|_| ()), &[]);
            let_assert!(Err(NativeError::Struct(_)) = result);
        });
    }
}
