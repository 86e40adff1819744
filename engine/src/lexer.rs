// Lexer for tag and guard expressions.
//
// Tokenizes the expression text embedded in graph declarations (tag
// components such as `i + 1`, `0 .. #N`, guards such as `@j > 0`).
// Uses the `logos` crate for DFA-based lexing.
//
// Preconditions: input is valid UTF-8.
// Postconditions: returns all tokens with byte-offset spans, plus any lex errors.
// Failure modes: unrecognized characters and out-of-range integers produce
//                `LexError`; lexing continues.
// Side effects: none.

use logos::Logos;
use std::fmt;

/// Byte-offset span in expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// A lexer error with location.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

/// Result of lexing: tokens plus any errors (non-fatal).
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<(Token, Span)>,
    pub errors: Vec<LexError>,
}

/// Expression token types.
///
/// Variable tokens carry no value — use the span to retrieve the name from
/// the source. `#name` and `@name` include their lead character in the span.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // ── Range operators ──
    //
    // `..=` must win over `..` followed by `=`; logos picks the longest match.
    #[token("..=")]
    DotDotEq,
    #[token("..")]
    DotDot,

    // ── Arithmetic ──
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // ── Comparison and logic ──
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,

    // ── Grouping ──
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    // ── Literals ──
    /// Non-negative integer literal. Negation is a unary operator.
    #[regex(r"[0-9]+", parse_int)]
    Int(i64),

    // ── Variables ──
    /// Context variable: `#name`.
    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_]*")]
    CtxVar,
    /// Argument variable: `@name`.
    #[regex(r"@[a-zA-Z_][a-zA-Z0-9_]*")]
    ArgVar,
    /// Local (tag or key) variable: `[a-zA-Z_][a-zA-Z0-9_]*`
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::DotDotEq => write!(f, "..="),
            Token::DotDot => write!(f, ".."),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Le => write!(f, "<="),
            Token::Ge => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Gt => write!(f, ">"),
            Token::AndAnd => write!(f, "&&"),
            Token::OrOr => write!(f, "||"),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Int(v) => write!(f, "{v}"),
            Token::CtxVar => write!(f, "<context variable>"),
            Token::ArgVar => write!(f, "<argument variable>"),
            Token::Ident => write!(f, "<ident>"),
        }
    }
}

// ── Callbacks ──

fn parse_int(lex: &mut logos::Lexer<'_, Token>) -> Option<i64> {
    lex.slice().parse().ok()
}

// ── Public API ──

/// Lex an expression string into tokens.
///
/// Returns all successfully parsed tokens together with any errors for
/// unrecognised characters. Lexing is non-fatal: errors are collected and
/// the lexer continues past bad characters.
pub fn lex(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, range) in lexer.spanned() {
        let span = Span {
            start: range.start,
            end: range.end,
        };
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => errors.push(LexError {
                span,
                message: format!("unexpected input: {:?}", &source[span.start..span.end]),
            }),
        }
    }

    LexResult { tokens, errors }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(source: &str) -> Vec<Token> {
        let result = lex(source);
        assert!(
            result.errors.is_empty(),
            "unexpected lex errors: {:?}",
            result.errors
        );
        result.tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn arithmetic() {
        let tokens = lex_ok("i + 1 * (j - 2) / 3 % 4");
        assert_eq!(
            tokens,
            vec![
                Token::Ident,
                Token::Plus,
                Token::Int(1),
                Token::Star,
                Token::LParen,
                Token::Ident,
                Token::Minus,
                Token::Int(2),
                Token::RParen,
                Token::Slash,
                Token::Int(3),
                Token::Percent,
                Token::Int(4),
            ]
        );
    }

    #[test]
    fn scoped_variables() {
        let result = lex("#N @x y");
        assert!(result.errors.is_empty());
        let kinds: Vec<_> = result.tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(kinds, vec![Token::CtxVar, Token::ArgVar, Token::Ident]);
        // The span of a scoped variable includes its lead character.
        assert_eq!(result.tokens[0].1, Span { start: 0, end: 2 });
    }

    #[test]
    fn range_operators() {
        assert_eq!(
            lex_ok("0..#N"),
            vec![Token::Int(0), Token::DotDot, Token::CtxVar]
        );
        assert_eq!(
            lex_ok("0 ..= 3"),
            vec![Token::Int(0), Token::DotDotEq, Token::Int(3)]
        );
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(
            lex_ok("a <= b && !(c != d) || e >= f"),
            vec![
                Token::Ident,
                Token::Le,
                Token::Ident,
                Token::AndAnd,
                Token::Bang,
                Token::LParen,
                Token::Ident,
                Token::NotEq,
                Token::Ident,
                Token::RParen,
                Token::OrOr,
                Token::Ident,
                Token::Ge,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn unexpected_character_is_reported() {
        let result = lex("i $ 1");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].span, Span { start: 2, end: 3 });
        assert_eq!(result.tokens.len(), 2);
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let result = lex("99999999999999999999");
        assert_eq!(result.errors.len(), 1);
        assert!(result.tokens.is_empty());
    }
}
