use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")] // Skip whitespace
#[logos(skip r";[^\n]*\n?")] // Comments run through the end of the line
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[\p{L}\p{N}_-]+", |lex| lex.slice().to_string())]
    Word(String),
    // Kept verbatim: delimiters and escape sequences survive until atom resolution.
    #[regex(r#""([^"\\]|\\(.|\n))*("|\\)?"#, string_literal)]
    Str(String),
    #[token("\\", stray_escape)]
    #[regex(r#"[^\s"\\;()\p{L}\p{N}_-]"#, |lex| lex.slice().chars().next())]
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn text(&self) -> String {
        self.kind.to_string()
    }
}

/// Checks that a string literal ends with an unescaped quote.
///
/// The regex accepts unterminated input on purpose so the error can be
/// reported at the literal instead of at some later character.
fn string_literal(lex: &mut logos::Lexer<TokenKind>) -> LexerResult<String> {
    let slice = lex.slice();
    let mut escaped = false;
    for (offset, c) in slice.char_indices().skip(1) {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            debug_assert_eq!(offset + 1, slice.len());
            return Ok(slice.to_string());
        }
    }
    Err(LexerErrorKind::UnterminatedString)
}

// A backslash is only meaningful inside a string literal
fn stray_escape(_: &mut logos::Lexer<TokenKind>) -> LexerResult<char> {
    Err(LexerErrorKind::StrayEscape)
}

// Display yields the exact source text of the token
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Word(s) => write!(f, "{}", s),
            TokenKind::Str(s) => write!(f, "{}", s),
            TokenKind::Punct(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Unterminated string literal")]
    UnterminatedString,
    #[error("Escape character '\\' outside of a string literal")]
    StrayEscape,
    #[default]
    #[error("Invalid Token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

type LexerResult<T> = Result<T, LexerErrorKind>;

type LexerRangedResult<T> = Result<T, LexerError>;

/// Splits source text into tokens, dropping whitespace and comments.
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token {
                kind,
                span: range.into(),
            }),
            Err(error) => Err(LexerError {
                error,
                span: range.into(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(s: &str) -> TokenKind {
        TokenKind::Word(s.to_string())
    }

    fn string(s: &str) -> TokenKind {
        TokenKind::Str(s.to_string())
    }

    // Helper to simplify testing token sequences
    fn assert_tokens(input: &str, expected: Vec<TokenKind>) {
        match tokenize(input) {
            Ok(tokens) => {
                let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
                assert_eq!(kinds, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    fn assert_texts(input: &str, expected: &[&str]) {
        match tokenize(input) {
            Ok(tokens) => {
                let texts: Vec<String> = tokens.iter().map(Token::text).collect();
                assert_eq!(texts, expected, "Input: '{}'", input);
            }
            Err(e) => panic!("Lexing failed for input '{}': {}", input, e.error),
        }
    }

    fn assert_lexer_error(input: &str, expected: LexerErrorKind) {
        match tokenize(input) {
            Ok(tokens) => panic!(
                "Expected lexing to fail for input '{}', but got tokens: {:?}",
                input, tokens
            ),
            Err(e) => assert_eq!(e.error, expected, "Input: '{}'", input),
        }
    }

    #[test]
    fn test_empty_input() {
        assert_tokens("", vec![]);
        assert_tokens("  \n\t ", vec![]);
    }

    #[test]
    fn test_call_expression() {
        assert_texts("(add 1w 2w)", &["(", "add", "1w", "2w", ")"]);
    }

    #[test]
    fn test_parentheses() {
        assert_tokens("()", vec![TokenKind::LParen, TokenKind::RParen]);
        assert_tokens(
            "(())",
            vec![
                TokenKind::LParen,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::RParen,
            ],
        );
    }

    #[test]
    fn test_words() {
        assert_tokens("foo", vec![word("foo")]);
        assert_tokens("a-symbol_with-dashes", vec![word("a-symbol_with-dashes")]);
        assert_tokens("sym123", vec![word("sym123")]);
        assert_tokens("-5", vec![word("-5")]);
        assert_tokens("12w", vec![word("12w")]);
    }

    #[test]
    fn test_punctuation_is_split_per_character() {
        assert_tokens(
            "a+b",
            vec![word("a"), TokenKind::Punct('+'), word("b")],
        );
        assert_tokens("**", vec![TokenKind::Punct('*'), TokenKind::Punct('*')]);
    }

    #[test]
    fn test_comments() {
        assert_texts(
            "(print 1w) ; trailing comment\n(print 2w)",
            &["(", "print", "1w", ")", "(", "print", "2w", ")"],
        );
        assert_tokens("; only comment", vec![]);
        assert_tokens("token ; then comment", vec![word("token")]);
        assert_tokens("a;comment\nb", vec![word("a"), word("b")]);
    }

    #[test]
    fn test_strings() {
        assert_tokens(r#""hello""#, vec![string(r#""hello""#)]);
        assert_tokens(r#""with space""#, vec![string(r#""with space""#)]);
        assert_tokens(r#""; not a comment""#, vec![string(r#""; not a comment""#)]);
        assert_tokens(r#""""#, vec![string(r#""""#)]);
    }

    #[test]
    fn test_escaped_quote_stays_inside_string() {
        let input = r#"(print "a\"b")"#;
        let tokens = tokenize(input).expect("Should tokenize successfully");
        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[2].kind, string(r#""a\"b""#));
        assert_eq!(tokens[2].text().len(), 6);
        assert_eq!(tokens[3].kind, TokenKind::RParen);
    }

    #[test]
    fn test_escaped_backslash_closes_normally() {
        assert_tokens(r#""a\\" b"#, vec![string(r#""a\\""#), word("b")]);
    }

    #[test]
    fn test_trailing_token_is_kept() {
        assert_tokens("print 1w", vec![word("print"), word("1w")]);
    }

    #[test]
    fn test_unterminated_string() {
        assert_lexer_error(r#""hello"#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#""hello\""#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#""hello\"#, LexerErrorKind::UnterminatedString);
        assert_lexer_error(r#"""#, LexerErrorKind::UnterminatedString);
    }

    #[test]
    fn test_stray_escape() {
        assert_lexer_error(r"(print \n)", LexerErrorKind::StrayEscape);
    }

    #[test]
    fn test_tokenize_spans() {
        let input = "(add 1w)";
        let tokens = tokenize(input).expect("Should tokenize successfully");

        assert_eq!(tokens.len(), 4);
        assert_eq!(tokens[0].span, Span::new(0, 1));
        assert_eq!(tokens[1].span, Span::new(1, 4));
        assert_eq!(tokens[2].span, Span::new(5, 7));
        assert_eq!(tokens[3].span, Span::new(7, 8));
    }

    #[test]
    fn test_error_span_points_at_literal() {
        let err = tokenize("(print \"oops").unwrap_err();
        assert_eq!(err.span, Span::new(7, 12));
    }
}
