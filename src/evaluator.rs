use crate::environment::{Callable, Environment, UserFunction};
use crate::source::Span;
use crate::types::{Node, Sexpr};
use crate::value::{Kind, Variable};
use std::collections::HashSet;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, trace};

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("Syntax error: {message}")]
    Syntax { message: String, span: Span },
    #[error("Arity error: '{form}' expects {expected}, got {found}")]
    Arity {
        form: String,
        expected: String,
        found: usize,
        span: Span,
    },
    #[error("Undefined name: setting '{name}' which was never declared")]
    NotDeclared { name: String, span: Span },
    #[error("Undefined name: calling undefined function '{name}'")]
    UndefinedFunction { name: String, span: Span },
    #[error("Undefined name: '{name}' is not a variable or a literal")]
    UnboundSymbol { name: String, span: Span },
    #[error("Unknown suffix '{suffix}' for immediate '{literal}' (expected w, d or b)")]
    UnknownSuffix {
        suffix: char,
        literal: String,
        span: Span,
    },
    #[error("Immediate '{literal}' is missing a kind suffix (w, d or b)")]
    MissingSuffix { literal: String, span: Span },
    #[error("Malformed immediate '{literal}'")]
    MalformedLiteral { literal: String, span: Span },
    #[error("Unknown variable kind '{kind}'")]
    UnknownKind { kind: String, span: Span },
    #[error("Type error: '{function}' expects {expected} for argument {position}, got {found}")]
    TypeMismatch {
        function: String,
        position: usize,
        expected: String,
        found: Kind,
        span: Span,
    },
    #[error("Type error: argument {position} of '{function}' is uninitialized")]
    Uninitialized {
        function: String,
        position: usize,
        span: Span,
    },
    #[error("Arithmetic overflow in '{function}'")]
    Overflow { function: String, span: Span },
    #[error("{context} produced no value")]
    NoValue { context: String, span: Span },
    #[error("Output error: {message}")]
    Output { message: String, span: Span },
    #[error("Recursion limit: '{name}' nested more than {limit} calls deep")]
    RecursionLimit {
        name: String,
        limit: usize,
        span: Span,
    },
}

impl EvalError {
    /// Source span of the failing form.
    pub fn span(&self) -> Span {
        match self {
            EvalError::Syntax { span, .. }
            | EvalError::Arity { span, .. }
            | EvalError::NotDeclared { span, .. }
            | EvalError::UndefinedFunction { span, .. }
            | EvalError::UnboundSymbol { span, .. }
            | EvalError::UnknownSuffix { span, .. }
            | EvalError::MissingSuffix { span, .. }
            | EvalError::MalformedLiteral { span, .. }
            | EvalError::UnknownKind { span, .. }
            | EvalError::TypeMismatch { span, .. }
            | EvalError::Uninitialized { span, .. }
            | EvalError::Overflow { span, .. }
            | EvalError::NoValue { span, .. }
            | EvalError::Output { span, .. }
            | EvalError::RecursionLimit { span, .. } => *span,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Option<Rc<Variable>>> = Result<T, EvalError>;

/// Default bound on nested user-function calls.
pub const MAX_CALL_DEPTH: usize = 10_000;

// Grow the native stack when less than RED_ZONE is left
const RED_ZONE: usize = 100 * 1024;
const STACK_PER_RECURSION: usize = 1024 * 1024;

const SPECIAL_FORMS: [&str; 5] = ["function", "declare", "set", "while", "if"];

pub fn special_form_identifiers() -> HashSet<String> {
    SPECIAL_FORMS.iter().map(|s| s.to_string()).collect()
}

/// Names in special forms must be plain atoms.
fn expect_name<'a>(form: &str, node: &'a Node) -> EvalResult<&'a str> {
    node.as_atom().ok_or_else(|| EvalError::Syntax {
        message: format!(
            "'{}' expects a name, found {} '{}'",
            form,
            node.kind.type_name(),
            node
        ),
        span: node.span,
    })
}

fn arity_error(form: &str, expected: &str, found: usize, span: Span) -> EvalError {
    EvalError::Arity {
        form: form.to_string(),
        expected: expected.to_string(),
        found,
        span,
    }
}

/// Tree-walking evaluator. Owns its environment and the stream `print`
/// writes to.
pub struct Interpreter<W: Write = io::Stdout> {
    env: Environment,
    out: W,
    // User-function calls currently in progress
    calls: usize,
    call_limit: usize,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Interpreter::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Self {
        Interpreter {
            env: Environment::new_global_populated(),
            out,
            calls: 0,
            call_limit: MAX_CALL_DEPTH,
        }
    }

    /// Replaces the bound on nested user-function calls.
    pub fn with_call_limit(mut self, limit: usize) -> Self {
        self.call_limit = limit;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    pub fn variable(&self, name: &str) -> Option<Rc<Variable>> {
        self.env.get(name)
    }

    pub fn depth(&self) -> usize {
        self.env.depth()
    }

    /// Evaluates top-level expressions in order and returns the last result.
    ///
    /// Top-level temporaries, including the result of a previous program,
    /// only live until the next expression starts.
    pub fn evaluate_program(&mut self, program: &[Node]) -> EvalResult {
        let mut result = None;
        for node in program {
            self.env.release_since(0, None);
            result = self.evaluate(node)?;
        }
        Ok(result)
    }

    /// Evaluates one node: lists run as expressions, atoms are resolved.
    pub fn evaluate(&mut self, node: &Node) -> EvalResult {
        match &node.kind {
            Sexpr::List(elements) => self.evaluate_frame(elements, node.span),
            Sexpr::Integer(n) => Err(EvalError::MissingSuffix {
                literal: n.to_string(),
                span: node.span,
            }),
            Sexpr::Atom(text) => self.resolve_atom(text, node.span).map(Some),
        }
    }

    fn resolve_atom(&mut self, text: &str, span: Span) -> EvalResult<Rc<Variable>> {
        if let Some(variable) = self.env.get(text) {
            return Ok(variable);
        }
        if let Some(body) = text.strip_prefix('"') {
            let payload = body.strip_suffix('"').unwrap_or(body);
            return Ok(self.env.temporary(Variable::string(payload)));
        }
        if text.starts_with(|c: char| c.is_ascii_digit()) {
            return self.resolve_immediate(text, span);
        }
        Err(EvalError::UnboundSymbol {
            name: text.to_string(),
            span,
        })
    }

    /// Resolves literals such as `5w`, `300d` or `7b`.
    fn resolve_immediate(&mut self, text: &str, span: Span) -> EvalResult<Rc<Variable>> {
        let Some(suffix) = text.chars().last() else {
            return Err(EvalError::MalformedLiteral {
                literal: text.to_string(),
                span,
            });
        };
        let kind = Kind::from_suffix(suffix).ok_or_else(|| EvalError::UnknownSuffix {
            suffix,
            literal: text.to_string(),
            span,
        })?;
        let digits = &text[..text.len() - suffix.len_utf8()];
        let n = digits
            .parse::<i64>()
            .map_err(|_| EvalError::MalformedLiteral {
                literal: text.to_string(),
                span,
            })?;
        Ok(self.env.temporary(Variable::integer(kind, n)))
    }

    /// Runs a list expression inside its own frame. The frame is left on
    /// every path, and only the returned value outlives it.
    fn evaluate_frame(&mut self, elements: &[Node], span: Span) -> EvalResult {
        stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || {
            self.evaluate_frame_inner(elements, span)
        })
    }

    fn evaluate_frame_inner(&mut self, elements: &[Node], span: Span) -> EvalResult {
        self.env.push_frame();
        trace!(depth = self.env.depth(), "entering frame");
        let result = self.dispatch(elements, span);
        trace!(depth = self.env.depth(), ok = result.is_ok(), "exiting frame");
        self.env.pop_frame(result.as_ref().ok().and_then(Option::as_ref));
        result
    }

    fn dispatch(&mut self, elements: &[Node], span: Span) -> EvalResult {
        let Some((head, rest)) = elements.split_first() else {
            return Err(EvalError::Syntax {
                message: "empty expression".to_string(),
                span,
            });
        };
        let Some(name) = head.as_atom() else {
            return Err(EvalError::Syntax {
                message: format!(
                    "expression head must be a name, found {} '{}'",
                    head.kind.type_name(),
                    head
                ),
                span: head.span,
            });
        };

        match name {
            "function" => self.evaluate_function(rest, span),
            "declare" => self.evaluate_declare(rest, span),
            "set" => self.evaluate_set(rest, span),
            "while" => self.evaluate_while(rest, span),
            "if" => self.evaluate_if(rest, span),
            _ => self.evaluate_call(name, rest, span),
        }
    }

    /// `(function name p1 .. pn (body1) .. (bodym))`: atoms are parameters,
    /// lists are body expressions, in whatever order they appear. An integer
    /// parameter such as `5` is accepted but can never be referenced.
    fn evaluate_function(&mut self, operands: &[Node], span: Span) -> EvalResult {
        let Some((name_node, rest)) = operands.split_first() else {
            return Err(arity_error("function", "at least 2 elements", 1, span));
        };
        let name = expect_name("function", name_node)?;

        let mut parameters = Vec::new();
        let mut body = Vec::new();
        for node in rest {
            match &node.kind {
                Sexpr::List(_) => body.push(node.clone()),
                Sexpr::Atom(text) => parameters.push(text.clone()),
                Sexpr::Integer(n) => parameters.push(n.to_string()),
            }
        }
        debug!(name, ?parameters, body = body.len(), "defining function");
        self.env
            .define_function(name, UserFunction { parameters, body });
        Ok(None)
    }

    /// `(declare name kind)`
    fn evaluate_declare(&mut self, operands: &[Node], span: Span) -> EvalResult {
        let [name_node, kind_node] = operands else {
            return Err(arity_error("declare", "exactly 3 elements", operands.len() + 1, span));
        };
        let name = expect_name("declare", name_node)?;
        let kind = kind_node
            .to_string()
            .parse::<Kind>()
            .map_err(|err| EvalError::UnknownKind {
                kind: err.0,
                span: kind_node.span,
            })?;
        debug!(name, %kind, "declaring variable");
        self.env.declare(name, Variable::declared(kind));
        Ok(None)
    }

    /// `(set name expr)`
    fn evaluate_set(&mut self, operands: &[Node], span: Span) -> EvalResult {
        let [name_node, expr] = operands else {
            return Err(arity_error("set", "exactly 3 elements", operands.len() + 1, span));
        };
        let name = expect_name("set", name_node)?;
        if !self.env.contains(name) {
            return Err(EvalError::NotDeclared {
                name: name.to_string(),
                span: name_node.span,
            });
        }
        let value = self.evaluate(expr)?.ok_or_else(|| EvalError::NoValue {
            context: format!("the value assigned to '{}'", name),
            span: expr.span,
        })?;
        debug!(name, value = %value, "setting variable");
        self.env.rebind(name, value);
        Ok(None)
    }

    /// `(while cond body1 ..)`: the result is the last body value of the
    /// last iteration that ran.
    fn evaluate_while(&mut self, operands: &[Node], span: Span) -> EvalResult {
        let [condition, body @ ..] = operands else {
            return Err(arity_error("while", "at least 3 elements", operands.len() + 1, span));
        };
        if body.is_empty() {
            return Err(arity_error("while", "at least 3 elements", operands.len() + 1, span));
        }

        let mark = self.env.arena_mark();
        let mut result = None;
        let mut iterations = 0usize;
        loop {
            // Anything from the previous iteration but its result is garbage now
            self.env.release_since(mark, result.as_ref());
            if !self.is_true(condition)? {
                break;
            }
            iterations += 1;
            for expr in body {
                result = self.evaluate(expr)?;
            }
        }
        debug!(iterations, "while loop finished");
        Ok(result)
    }

    /// `(if cond then [else])`
    fn evaluate_if(&mut self, operands: &[Node], span: Span) -> EvalResult {
        let (condition, consequent, alternate) = match operands {
            [condition, consequent] => (condition, consequent, None),
            [condition, consequent, alternate] => (condition, consequent, Some(alternate)),
            _ => {
                return Err(arity_error("if", "3 or 4 elements", operands.len() + 1, span));
            }
        };

        if self.is_true(condition)? {
            self.evaluate(consequent)
        } else if let Some(alternate) = alternate {
            self.evaluate(alternate)
        } else {
            Ok(None)
        }
    }

    fn is_true(&mut self, condition: &Node) -> EvalResult<bool> {
        Ok(self
            .evaluate(condition)?
            .is_some_and(|variable| variable.is_true()))
    }

    fn evaluate_call(&mut self, name: &str, operands: &[Node], span: Span) -> EvalResult {
        let callable = self
            .env
            .callable(name)
            .ok_or_else(|| EvalError::UndefinedFunction {
                name: name.to_string(),
                span,
            })?;

        let mut args = Vec::with_capacity(operands.len());
        for (i, operand) in operands.iter().enumerate() {
            let value = self.evaluate(operand)?.ok_or_else(|| EvalError::NoValue {
                context: format!("argument {} of '{}'", i + 1, name),
                span: operand.span,
            })?;
            args.push(value);
        }

        debug!(name, args = args.len(), depth = self.env.depth(), "calling");
        match callable {
            Callable::Native(func, _) => {
                let result = func(&args, &mut self.out, span)?;
                Ok(result.map(|variable| self.env.temporary(variable)))
            }
            Callable::User(function) => self.call_user_function(name, &function, args, span),
        }
    }

    /// Binds each parameter to a copy of its argument for the duration of
    /// the call, then evaluates the body in order.
    fn call_user_function(
        &mut self,
        name: &str,
        function: &UserFunction,
        args: Vec<Rc<Variable>>,
        span: Span,
    ) -> EvalResult {
        if args.len() != function.parameters.len() {
            return Err(arity_error(
                name,
                &format!("{} arguments", function.parameters.len()),
                args.len(),
                span,
            ));
        }
        if self.calls >= self.call_limit {
            return Err(EvalError::RecursionLimit {
                name: name.to_string(),
                limit: self.call_limit,
                span,
            });
        }

        let depth = self.env.depth();
        let shadowed: Vec<(&String, Option<Rc<Variable>>)> = function
            .parameters
            .iter()
            .zip(args)
            .map(|(parameter, arg)| {
                let local = Rc::new(arg.in_frame(depth));
                (parameter, self.env.bind_local(parameter, local))
            })
            .collect();

        self.calls += 1;
        let result = self.evaluate_body(&function.body);
        self.calls -= 1;

        for (parameter, previous) in shadowed.into_iter().rev() {
            self.env.restore(parameter, previous);
        }
        result
    }

    fn evaluate_body(&mut self, body: &[Node]) -> EvalResult {
        let mut result = None;
        for expr in body {
            result = self.evaluate(expr)?;
        }
        Ok(result)
    }
}
