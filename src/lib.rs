// Declare modules publicly so they are part of the library interface
pub mod environment;
pub mod evaluator;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;
pub mod value;

pub use environment::{Callable, Environment, NativeFunc, UserFunction};
pub use evaluator::{EvalError, EvalResult, Interpreter};
pub use lexer::{LexerError, LexerErrorKind, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse, parse_str};
pub use source::Span;
pub use types::{Node, Sexpr};
pub use value::{Kind, Value, Variable};

use std::io::Write;
use std::rc::Rc;
use thiserror::Error;

/// Any failure between source text and result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KoreError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Tokenizes, parses and evaluates `source` as a program.
pub fn run<W: Write>(
    source: &str,
    interpreter: &mut Interpreter<W>,
) -> Result<Option<Rc<Variable>>, KoreError> {
    let program = parse_str(source)?;
    Ok(interpreter.evaluate_program(&program)?)
}
