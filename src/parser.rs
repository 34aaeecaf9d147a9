use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::Node;
use std::vec::IntoIter; // To iterate over Vec<Token>
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Parse Error [at {0}]: unbalanced close, ')' has no matching '('")]
    UnbalancedClose(Span),
    #[error("Parse Error [at {0}]: unbalanced parenthesis, '(' is never closed")]
    UnbalancedParenthesis(Span), // Span of the unclosed '('
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

// Result type alias for convenience
type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    // We iterate over owned Tokens, consuming them.
    tokens: IntoIter<Token>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens: tokens.into_iter(),
        }
    }

    // Consumes the next token if available.
    fn next_token(&mut self) -> Option<Token> {
        self.tokens.next()
    }

    /// Parses one expression starting at an already consumed token.
    fn parse_expr_with_token(&mut self, token: Token) -> ParseResult<Node> {
        match token.kind {
            TokenKind::LParen => self.parse_list(token.span),
            TokenKind::RParen => Err(ParseError::UnbalancedClose(token.span)),
            _ => Ok(Self::parse_atom(token)),
        }
    }

    /// Atoms that read as base-10 integers become integer nodes; everything
    /// else keeps its raw text.
    fn parse_atom(token: Token) -> Node {
        let text = token.text();
        match text.parse::<i64>() {
            Ok(n) => Node::new_integer(n, token.span),
            Err(_) => Node::new_atom(text, token.span),
        }
    }

    /// Parses the elements of a list up to the matching `)`.
    fn parse_list(&mut self, open: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.next_token() {
                Some(Token {
                    kind: TokenKind::RParen,
                    span: rparen_span,
                }) => return Ok(Node::new_list(elements, open.merge(rparen_span))),
                Some(token) => elements.push(self.parse_expr_with_token(token)?),
                // Reached EOF before finding ')'
                None => return Err(ParseError::UnbalancedParenthesis(open)),
            }
        }
    }

    /// Parses the entire token sequence into the program's top-level expressions.
    pub fn parse(mut self) -> ParseResult<Vec<Node>> {
        let mut program = Vec::new();
        while let Some(token) = self.next_token() {
            program.push(self.parse_expr_with_token(token)?);
        }
        Ok(program)
    }
}

pub fn parse(tokens: Vec<Token>) -> ParseResult<Vec<Node>> {
    Parser::new(tokens).parse()
}

// Helper function to lex and parse a string directly (useful for tests and REPL)
pub fn parse_str(input: &str) -> ParseResult<Vec<Node>> {
    let tokens = crate::lexer::tokenize(input)?;
    parse(tokens)
}
