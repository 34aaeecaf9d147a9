use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use kore::TokenKind;
use kore::{Interpreter, KoreError, evaluator::special_form_identifiers, lexer::tokenize, logging};
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

const HISTORY_ENV: &str = "KORE_HISTORY";
const DEFAULT_HISTORY: &str = "kore_history.txt";

struct KoreCompleter {
    interpreter: Rc<RefCell<Interpreter>>,
}

impl KoreCompleter {
    fn new(interpreter: Rc<RefCell<Interpreter>>) -> Self {
        KoreCompleter { interpreter }
    }
}

impl rustyline::completion::Completer for KoreCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last().map(|t| t.kind.clone()) {
                Some(TokenKind::Word(prefix)) if line[..pos].ends_with(&prefix) => prefix,
                _ => return Ok((pos, vec![])),
            },
            Err(_) => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .interpreter
            .borrow()
            .environment()
            .get_identifiers()
            .union(&special_form_identifiers())
            .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
            .filter(|rest| !rest.is_empty())
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct KoreHelper {
    #[rustyline(Validator)]
    validator: KoreValidator,
    #[rustyline(Highlighter)]
    highlighter: KoreHighlighter,
    #[rustyline(Completer)]
    completer: KoreCompleter,
}

/// Where a character sits, as far as the REPL cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Code,
    Str,
    Comment,
}

/// Walks a line tracking string literals and `;` comments, so parens
/// inside either are not counted.
#[derive(Default)]
struct Scanner {
    in_string: bool,
    in_comment: bool,
    escaped: bool,
}

impl Scanner {
    fn region(&mut self, c: char) -> Region {
        if self.in_comment {
            self.in_comment = c != '\n';
            return Region::Comment;
        }
        if self.in_string {
            match (self.escaped, c) {
                (true, _) => self.escaped = false,
                (false, '\\') => self.escaped = true,
                (false, '"') => self.in_string = false,
                _ => {}
            }
            return Region::Str;
        }
        match c {
            ';' => {
                self.in_comment = true;
                Region::Comment
            }
            '"' => {
                self.in_string = true;
                Region::Str
            }
            _ => Region::Code,
        }
    }
}

struct KoreValidator;

impl Validator for KoreValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let mut scanner = Scanner::default();
        let mut open = 0usize;

        for (offset, c) in ctx.input().char_indices() {
            if scanner.region(c) != Region::Code {
                continue;
            }
            if c == '(' {
                open += 1;
            } else if c == ')' {
                let Some(rest) = open.checked_sub(1) else {
                    return Ok(ValidationResult::Invalid(Some(format!(
                        "  - ')' at byte {} closes nothing",
                        offset
                    ))));
                };
                open = rest;
            }
        }

        // Unterminated strings and open lists wait for more input
        if scanner.in_string || open > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

const GREEN: &str = "\x1b[32m";
const GREY: &str = "\x1b[90m";
const BLUE: &str = "\x1b[34m";
const BOLD_BLUE: &str = "\x1b[1;34m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn paint(out: &mut String, colour: &str, c: char) {
    out.push_str(colour);
    out.push(c);
    out.push_str(RESET);
}

struct KoreHighlighter;

impl Highlighter for KoreHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let mut scanner = Scanner::default();
        let mut opens: Vec<usize> = Vec::new();
        let mut out = String::with_capacity(line.len());

        for (offset, c) in line.char_indices() {
            match (scanner.region(c), c) {
                (Region::Str, _) => paint(&mut out, GREEN, c),
                (Region::Comment, _) => paint(&mut out, GREY, c),
                (Region::Code, '(') => {
                    opens.push(out.len());
                    out.push(c);
                }
                (Region::Code, ')') => match opens.pop() {
                    // The pair just closed by the cursor
                    Some(open) if pos > 0 && offset == pos - 1 => {
                        paint(&mut out, BLUE, c);
                        out.replace_range(open..=open, &format!("{}({}", BOLD_BLUE, RESET));
                    }
                    Some(_) => out.push(c),
                    None => paint(&mut out, RED, c),
                },
                (Region::Code, _) => out.push(c),
            }
        }

        Cow::Owned(out)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    logging::init_tracing();
    println!("Kore REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let interpreter = Rc::new(RefCell::new(Interpreter::new()));
    let helper = KoreHelper {
        validator: KoreValidator,
        highlighter: KoreHighlighter,
        completer: KoreCompleter::new(Rc::clone(&interpreter)),
    };
    let config = rustyline::config::Config::builder()
        .edit_mode(rustyline::EditMode::Emacs)
        .build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    let history = std::env::var(HISTORY_ENV).unwrap_or_else(|_| DEFAULT_HISTORY.to_string());
    if rl.load_history(&history).is_err() {
        println!("No previous history.");
    }

    loop {
        match rl.readline("kore> ") {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input.is_empty() {
                    continue;
                }
                if trimmed_input.eq_ignore_ascii_case("exit") {
                    break;
                }

                let outcome: Result<_, KoreError> =
                    kore::run(trimmed_input, &mut *interpreter.borrow_mut());
                match outcome {
                    Ok(Some(result)) => println!("{} : {}", result, result.kind()),
                    Ok(None) => {}
                    Err(e) => e.pretty_print("REPL", trimmed_input),
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&history)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(line: &str) -> Vec<Region> {
        let mut scanner = Scanner::default();
        line.chars().map(|c| scanner.region(c)).collect()
    }

    #[test]
    fn test_parens_in_strings_and_comments_are_not_code() {
        use Region::*;
        assert_eq!(regions(r#"("(")"#), vec![Code, Str, Str, Str, Code]);
        assert_eq!(regions("a;(\nb"), vec![Code, Comment, Comment, Comment, Code]);
        assert_eq!(regions(r#""\"(""#), vec![Str; 5]);
    }
}
