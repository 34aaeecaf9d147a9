use crate::{EvalError, KoreError, ParseError};
use ariadne::{Label, Report, ReportKind, Source};
use std::ops::Range;

type SourceSpan<'a> = (&'a str, Range<usize>);

impl EvalError {
    pub fn report<'a>(&self, source_id: &'a str) -> Report<'a, SourceSpan<'a>> {
        let range = self.span().to_range();
        let label = Label::new((source_id, range.clone()));
        let report = Report::build(ReportKind::Error, (source_id, range));
        let report = match self {
            EvalError::Syntax { message, .. } => report
                .with_message("Syntax error")
                .with_label(label.with_message(message)),
            EvalError::Arity { form, .. } => report
                .with_message(format!("Wrong number of elements for `{}`", form))
                .with_label(label.with_message(self.to_string())),
            EvalError::NotDeclared { name, .. } => report
                .with_message(format!("Setting undeclared variable `{}`", name))
                .with_label(label.with_message(format!("declare it first: (declare {} word)", name))),
            EvalError::UndefinedFunction { name, .. } => report
                .with_message(format!("Calling undefined function `{}`", name))
                .with_label(label.with_message("No built-in or user function has this name")),
            EvalError::UnboundSymbol { name, .. } => report
                .with_message(format!("Unbound symbol `{}`", name))
                .with_label(label.with_message("This is neither a variable nor a literal")),
            EvalError::UnknownSuffix { suffix, .. } => report
                .with_message(format!("Unknown suffix `{}`", suffix))
                .with_label(label.with_message("Immediates end in w (word), d (dword) or b (byte)")),
            EvalError::MissingSuffix { .. } | EvalError::MalformedLiteral { .. } => report
                .with_message("Malformed immediate")
                .with_label(label.with_message(self.to_string())),
            EvalError::UnknownKind { kind, .. } => report
                .with_message(format!("Unknown variable kind `{}`", kind))
                .with_label(
                    label.with_message("Expected word, dword, byte, address, string or bool"),
                ),
            EvalError::TypeMismatch {
                expected, found, ..
            } => report
                .with_message("Type mismatch")
                .with_label(label.with_message(format!("Expected {}, found {}", expected, found))),
            EvalError::Uninitialized { .. } | EvalError::Overflow { .. } => report
                .with_message("Invalid argument")
                .with_label(label.with_message(self.to_string())),
            EvalError::NoValue { context, .. } => report
                .with_message("Missing value")
                .with_label(label.with_message(format!("{} produced no value", context))),
            EvalError::Output { message, .. } => report
                .with_message("Could not write output")
                .with_label(label.with_message(message)),
            EvalError::RecursionLimit { name, limit, .. } => report
                .with_message(format!("Too many nested calls to `{}`", name))
                .with_label(label.with_message(format!(
                    "This call would nest deeper than {} user-function calls",
                    limit
                ))),
        };
        report.finish()
    }

    pub fn pretty_print(&self, source_id: &str, input: &str) {
        if let Err(err) = self.report(source_id).eprint((source_id, Source::from(input))) {
            tracing::warn!(%err, "failed to render diagnostic");
        }
    }
}

impl ParseError {
    pub fn report<'a>(&self, source_id: &'a str, input: &str) -> Report<'a, SourceSpan<'a>> {
        let report = match self {
            ParseError::UnbalancedClose(span) => {
                Report::build(ReportKind::Error, (source_id, span.to_range()))
                    .with_message("Unbalanced close parenthesis")
                    .with_label(
                        Label::new((source_id, span.to_range()))
                            .with_message("This ')' has no matching '('"),
                    )
            }
            ParseError::UnbalancedParenthesis(span) => {
                Report::build(ReportKind::Error, (source_id, span.to_range()))
                    .with_message("Unbalanced parenthesis")
                    .with_label(
                        Label::new((source_id, span.to_range())).with_message(format!(
                            "This '(' is never closed before the input ends at byte {}",
                            input.len()
                        )),
                    )
            }
            ParseError::LexerError(lex_err) => {
                Report::build(ReportKind::Error, (source_id, lex_err.span.to_range()))
                    .with_message("Lexer Error")
                    .with_label(
                        Label::new((source_id, lex_err.span.to_range()))
                            .with_message(lex_err.error.to_string()),
                    )
            }
        };
        report.finish()
    }

    pub fn pretty_print(&self, source_id: &str, input: &str) {
        if let Err(err) = self
            .report(source_id, input)
            .eprint((source_id, Source::from(input)))
        {
            tracing::warn!(%err, "failed to render diagnostic");
        }
    }
}

impl KoreError {
    pub fn pretty_print(&self, source_id: &str, input: &str) {
        match self {
            KoreError::Parse(err) => err.pretty_print(source_id, input),
            KoreError::Eval(err) => err.pretty_print(source_id, input),
        }
    }
}
