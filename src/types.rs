use crate::source::Span;
use std::fmt; // For custom display formatting

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Sexpr, // The actual S-expression data
    pub span: Span,  // The source span it covers
}

impl Node {
    pub fn new(kind: Sexpr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Sexpr::Integer(n), span)
    }

    pub fn new_atom(text: impl Into<String>, span: Span) -> Self {
        Node::new(Sexpr::Atom(text.into()), span)
    }

    pub fn new_list(elements: Vec<Node>, span: Span) -> Self {
        Node::new(Sexpr::List(elements), span)
    }

    /// The atom text, if this node is a non-integer atom.
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            Sexpr::Atom(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, Sexpr::List(_))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to Sexpr's Display implementation
        write!(f, "{}", self.kind)
    }
}

/// A parsed expression. Atoms keep their source text so that immediates
/// like `5w` and string literals are only interpreted at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum Sexpr {
    Integer(i64),    // An atom that reads as a plain base-10 integer
    Atom(String),    // e.g. add, x, 5w, "hello" (quotes included)
    List(Vec<Node>), // e.g. (add 1w 2w)
}

impl Sexpr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Sexpr::Integer(_) => "integer",
            Sexpr::Atom(_) => "atom",
            Sexpr::List(_) => "list",
        }
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Integer(n) => write!(f, "{}", n),
            Sexpr::Atom(s) => write!(f, "{}", s),
            Sexpr::List(list) => {
                write!(f, "(")?;
                let mut first = true;
                for expr in list {
                    if !first {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", expr)?;
                    first = false;
                }
                write!(f, ")")
            }
        }
    }
}
