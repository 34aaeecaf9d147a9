use std::io::Write;
use std::rc::Rc;

use crate::environment::Environment;
use crate::evaluator::{EvalError, EvalResult};
use crate::source::Span;
use crate::value::{Value, Variable};

/// What `address` hands out. There is no addressing model behind it.
pub const ADDRESS_PLACEHOLDER: i64 = 1234;

/// Registers the built-in library.
pub fn register(env: &mut Environment) {
    env.add_primitive("add", prim_add);
    env.add_primitive("print", prim_print);
    env.add_primitive("gt", prim_greater_than);
    env.add_primitive("lt", prim_less_than);
    env.add_primitive("address", prim_address);
}

// Checks the number of arguments
macro_rules! check_arity {
    ($args:expr, $expected:expr, $span:expr, $name:expr) => {
        if $args.len() != $expected {
            return Err(EvalError::Arity {
                form: $name.to_string(),
                expected: format!("exactly {} arguments", $expected),
                found: $args.len(),
                span: $span,
            });
        }
    };
    // Variant for minimum number of args
    ($args:expr, min $expected:expr, $span:expr, $name:expr) => {
        if $args.len() < $expected {
            return Err(EvalError::Arity {
                form: $name.to_string(),
                expected: format!("at least {} arguments", $expected),
                found: $args.len(),
                span: $span,
            });
        }
    };
}

/// Integer payload of a word/dword/byte/address argument.
fn expect_integer(
    variable: &Variable,
    span: Span,
    name: &str,
    position: usize,
) -> EvalResult<i64> {
    if !variable.kind().is_numeric() {
        return Err(EvalError::TypeMismatch {
            function: name.to_string(),
            position,
            expected: "a word, dword, byte or address".to_string(),
            found: variable.kind(),
            span,
        });
    }
    match variable.value() {
        Value::Integer(n) => Ok(*n),
        _ => Err(EvalError::Uninitialized {
            function: name.to_string(),
            position,
            span,
        }),
    }
}

pub fn prim_add(
    args: &[Rc<Variable>],
    _out: &mut dyn Write,
    span: Span,
) -> EvalResult<Option<Variable>> {
    // (add 1w 2w 3w) -> 6 as a word, whatever the argument kinds
    check_arity!(args, min 1, span, "add");
    let mut total: i64 = 0;
    for (i, arg) in args.iter().enumerate() {
        let n = expect_integer(arg, span, "add", i + 1)?;
        total = total.checked_add(n).ok_or_else(|| EvalError::Overflow {
            function: "add".to_string(),
            span,
        })?;
    }
    Ok(Some(Variable::word(total)))
}

pub fn prim_print(
    args: &[Rc<Variable>],
    out: &mut dyn Write,
    span: Span,
) -> EvalResult<Option<Variable>> {
    check_arity!(args, 1, span, "print");
    writeln!(out, "{}", args[0]).map_err(|err| EvalError::Output {
        message: err.to_string(),
        span,
    })?;
    Ok(None)
}

fn compare_integers<F: Fn(i64, i64) -> bool>(
    args: &[Rc<Variable>],
    span: Span,
    compare: F,
    name: &str,
) -> EvalResult<Option<Variable>> {
    check_arity!(args, 2, span, name);
    let left = expect_integer(&args[0], span, name, 1)?;
    let right = expect_integer(&args[1], span, name, 2)?;
    Ok(Some(Variable::boolean(compare(left, right))))
}

pub fn prim_greater_than(
    args: &[Rc<Variable>],
    _out: &mut dyn Write,
    span: Span,
) -> EvalResult<Option<Variable>> {
    compare_integers(args, span, |left, right| left > right, "gt")
}

pub fn prim_less_than(
    args: &[Rc<Variable>],
    _out: &mut dyn Write,
    span: Span,
) -> EvalResult<Option<Variable>> {
    compare_integers(args, span, |left, right| left < right, "lt")
}

pub fn prim_address(
    _args: &[Rc<Variable>],
    _out: &mut dyn Write,
    _span: Span,
) -> EvalResult<Option<Variable>> {
    Ok(Some(Variable::address(ADDRESS_PLACEHOLDER)))
}
