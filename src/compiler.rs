//! Compile Swail syntax trees into block bytecode.
//!
//! Compilation appends to a block of a [`Program`] and returns the block that code
//! following it must be appended to. Only a call moves that point: after every `CALL`
//! a fresh successor block is opened, and the callee returns into it. For example
//!
//! ```text
//! print(37)
//! ```
//!
//! compiles to
//!
//! ```text
//! block 0 -> 1
//!     load_local 0    ; print
//!     push_const 0    ; 37
//!     call 1
//! block 1
//! ```
//!
//! and compilation continues in block 1.

use gc_arena::Mutation;
use tracing::debug;

use crate::{
    ast::{Expression, Statement},
    world::{
        cons_list::List,
        value::{Value, ValuePtr},
    },
};

use bytecode::{BlockId, Opcode, PoolError, Program};
use closure::Closure;

pub mod bytecode;
pub mod closure;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("a name needs at least one part")]
    EmptyName,
    #[error("expected text, found {0}")]
    NotText(Box<str>),
    #[error("expected an expression, found {0}")]
    NotAnExpression(Box<str>),
    #[error("expected a statement, found {0}")]
    NotAStatement(Box<str>),
    #[error("expected a plain name, found {0}")]
    BadParameter(Box<str>),
    #[error(transparent)]
    Pool(#[from] PoolError),
}

pub fn text_of(value: ValuePtr<'_>) -> Result<Box<str>, CompileError> {
    let value = value.borrow();
    value
        .as_text()
        .map(Box::from)
        .ok_or_else(|| CompileError::NotText(value.name().into()))
}

pub fn statement_of(value: ValuePtr<'_>) -> Result<Statement<'_>, CompileError> {
    let borrowed = value.borrow();
    borrowed
        .as_statement()
        .ok_or_else(|| CompileError::NotAStatement(borrowed.name().into()))
}

pub fn expression_of(value: ValuePtr<'_>) -> Result<Expression<'_>, CompileError> {
    let borrowed = value.borrow();
    borrowed
        .as_expression()
        .ok_or_else(|| CompileError::NotAnExpression(borrowed.name().into()))
}

/// Reads an expression that is a name access of exactly one name, such as a parameter.
pub fn simple_name(value: ValuePtr<'_>) -> Result<Box<str>, CompileError> {
    if let Ok(Expression::NameAccess(List::Cons(cell))) = expression_of(value) {
        if cell.tail.is_empty() {
            return text_of(cell.head);
        }
    }
    Err(CompileError::BadParameter(value.borrow().name().into()))
}

pub fn compile_expression<'gc>(
    mc: &Mutation<'gc>,
    program: &mut Program<'gc>,
    block: BlockId,
    expression: Expression<'gc>,
    closure: &mut Closure,
) -> Result<BlockId, CompileError> {
    match expression {
        Expression::NameAccess(name) => {
            let mut parts = name.iter();
            let root = text_of(parts.next().ok_or(CompileError::EmptyName)?)?;
            closure.make_used(&root);
            let index = program.add_name(block, &root)?;
            program.add_instruction(block, Opcode::LoadLocal, index)?;
            for attribute in parts {
                let index = program.add_name(block, &text_of(attribute)?)?;
                program.add_instruction(block, Opcode::LoadAttr, index)?;
            }
            Ok(block)
        }
        Expression::BaseValue(value) => {
            let index = program.add_constant(block, value)?;
            program.add_instruction(block, Opcode::PushConst, index)?;
            Ok(block)
        }
        Expression::Apply { function, args } => {
            let mut block =
                compile_expression(mc, program, block, expression_of(function)?, closure)?;
            let mut count = 0;
            for arg in args {
                block = compile_expression(mc, program, block, expression_of(arg)?, closure)?;
                count += 1;
            }
            program.add_instruction(block, Opcode::Call, count)?;
            Ok(program.make_next_block(block)?)
        }
    }
}

/// Compiles one statement. A declaration leaves the value its header returned on the
/// stack and binds it to the declared name.
pub fn compile_statement<'gc>(
    mc: &Mutation<'gc>,
    program: &mut Program<'gc>,
    block: BlockId,
    statement: Statement<'gc>,
    closure: &mut Closure,
) -> Result<BlockId, CompileError> {
    match statement {
        Statement::Declaration {
            header,
            name,
            args,
            body,
        } => {
            let binding = text_of(name)?;
            debug!(%binding, arguments = args.length(), statements = body.length(), "compiling declaration");
            let arguments = [
                Expression::base_value(mc, name),
                Expression::base_value(mc, Value::list(mc, args)),
                Expression::base_value(mc, Value::list(mc, body)),
            ];
            let call = Expression::Apply {
                function: Expression::name_access(mc, header),
                args: List::from_values(mc, &arguments),
            };
            let block = compile_expression(mc, program, block, call, closure)?;
            program.add_instruction(block, Opcode::Dup, 1)?;
            let index = program.add_name(block, &binding)?;
            program.add_instruction(block, Opcode::StoreLocal, index)?;
            closure.make_bound(&binding);
            Ok(block)
        }
        Statement::Expression(expression) => {
            compile_expression(mc, program, block, expression_of(expression)?, closure)
        }
    }
}

/// Compiles a list of statement values one after the other. Their results are left
/// on the stack.
pub fn compile_module<'gc>(
    mc: &Mutation<'gc>,
    program: &mut Program<'gc>,
    mut block: BlockId,
    statements: List<'gc>,
    closure: &mut Closure,
) -> Result<BlockId, CompileError> {
    for statement in statements {
        block = compile_statement(mc, program, block, statement_of(statement)?, closure)?;
    }
    Ok(block)
}

/// Compiles a function body into a new entry block.
///
/// The entry block expects the arguments on top of the stack with the return label
/// right below them. It stores the arguments into `params` (last argument first), runs
/// the body keeping only the result of its last statement (Unit for an empty body)
/// and returns that result through the label.
pub fn compile_function<'gc>(
    mc: &Mutation<'gc>,
    program: &mut Program<'gc>,
    params: &[Box<str>],
    body: List<'gc>,
    closure: &mut Closure,
) -> Result<BlockId, CompileError> {
    let entry = program.new_block();
    for param in params.iter().rev() {
        closure.make_bound(param);
        let index = program.add_name(entry, param)?;
        program.add_instruction(entry, Opcode::StoreLocal, index)?;
    }

    let mut block = entry;
    let mut statements = body.iter().peekable();
    if statements.peek().is_none() {
        let index = program.add_constant(block, Value::unit(mc))?;
        program.add_instruction(block, Opcode::PushConst, index)?;
    }
    while let Some(statement) = statements.next() {
        block = compile_statement(mc, program, block, statement_of(statement)?, closure)?;
        if statements.peek().is_some() {
            program.add_instruction(block, Opcode::Pop, 1)?;
        }
    }
    program.add_instruction(block, Opcode::JumpLabel, 2)?;
    Ok(entry)
}
