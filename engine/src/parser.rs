// Parser for tag and guard expressions.
//
// Parses a token stream (from the lexer) into expression ASTs. Uses chumsky
// combinators. Grammar, loosest binding first:
//
//   component := expr ( ( '..' | '..=' ) expr )?
//   expr      := and ( '||' and )*
//   and       := eq ( '&&' eq )*
//   eq        := cmp ( ( '==' | '!=' ) cmp )*
//   cmp       := sum ( ( '<' | '<=' | '>' | '>=' ) sum )*
//   sum       := product ( ( '+' | '-' ) product )*
//   product   := unary ( ( '*' | '/' | '%' ) unary )*
//   unary     := ( '-' | '!' )* atom
//   atom      := INT | IDENT | '#' IDENT | '@' IDENT | '(' expr ')'
//
// Preconditions: none (arbitrary text is accepted and diagnosed).
// Postconditions: on success the whole input has been consumed.
// Failure modes: lex and syntax errors are collected as `SyntaxError`s.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;
use std::fmt;

use crate::ast::*;
use crate::lexer::Token;

/// A lex or syntax error with its byte range in the expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub start: usize,
    pub end: usize,
    pub message: String,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.start, self.end)
    }
}

/// Parse a plain expression (guards, range bounds).
pub fn parse_expr(text: &str) -> Result<Expr, Vec<SyntaxError>> {
    match parse_tag_component(text)? {
        TagExpr::Plain(expr) => Ok(expr),
        _ => Err(vec![SyntaxError {
            start: 0,
            end: text.len(),
            message: "a range is not allowed here".to_string(),
        }]),
    }
}

/// Parse one tag component: a plain expression or a range. Lexes then parses.
pub fn parse_tag_component(source: &str) -> Result<TagExpr, Vec<SyntaxError>> {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = component_parser(source).then_ignore(end());
    let (component, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut errors: Vec<SyntaxError> = lex_result
        .errors
        .into_iter()
        .map(|e| SyntaxError {
            start: e.span.start,
            end: e.span.end,
            message: e.message,
        })
        .collect();
    errors.extend(parse_errors.into_iter().map(|e| {
        let span = *e.span();
        SyntaxError {
            start: span.start(),
            end: span.end(),
            message: e.to_string(),
        }
    }));

    match component {
        Some(component) if errors.is_empty() => Ok(component),
        _ => Err(errors),
    }
}

// ── Parser builders ──
//
// `source` is captured once so variable names can be sliced out of spans.

fn slice(source: &str, span: SimpleSpan, skip: usize) -> String {
    source[span.start() + skip..span.end()].to_string()
}

fn expr_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Expr, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + Clone + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    recursive(move |expr| {
        // ── Atoms ──

        let atom = select! {
            Token::Int(n) => Expr::Int(n),
            Token::CtxVar = e => Expr::Var(Var::context(slice(source, e.span(), 1))),
            Token::ArgVar = e => Expr::Var(Var::local(slice(source, e.span(), 1))),
            Token::Ident = e => Expr::Var(Var::local(slice(source, e.span(), 0))),
        }
        .or(expr.delimited_by(just(Token::LParen), just(Token::RParen)))
        .boxed();

        // ── Prefix operators ──

        let unary = choice((
            just(Token::Minus).to(UnOp::Neg),
            just(Token::Bang).to(UnOp::Not),
        ))
        .repeated()
        .foldr(atom, |op, operand| Expr::unary(op, operand))
        .boxed();

        // ── Binary levels ──

        let product = unary
            .clone()
            .foldl(
                choice((
                    just(Token::Star).to(BinOp::Mul),
                    just(Token::Slash).to(BinOp::Div),
                    just(Token::Percent).to(BinOp::Rem),
                ))
                .then(unary)
                .repeated(),
                |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
            )
            .boxed();

        let sum = product
            .clone()
            .foldl(
                choice((
                    just(Token::Plus).to(BinOp::Add),
                    just(Token::Minus).to(BinOp::Sub),
                ))
                .then(product)
                .repeated(),
                |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
            )
            .boxed();

        let cmp = sum
            .clone()
            .foldl(
                choice((
                    just(Token::Le).to(BinOp::Le),
                    just(Token::Ge).to(BinOp::Ge),
                    just(Token::Lt).to(BinOp::Lt),
                    just(Token::Gt).to(BinOp::Gt),
                ))
                .then(sum)
                .repeated(),
                |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
            )
            .boxed();

        let eq = cmp
            .clone()
            .foldl(
                choice((
                    just(Token::EqEq).to(BinOp::Eq),
                    just(Token::NotEq).to(BinOp::Ne),
                ))
                .then(cmp)
                .repeated(),
                |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
            )
            .boxed();

        let and = eq
            .clone()
            .foldl(
                just(Token::AndAnd).to(BinOp::And).then(eq).repeated(),
                |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
            )
            .boxed();

        and.clone().foldl(
            just(Token::OrOr).to(BinOp::Or).then(and).repeated(),
            |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
        )
    })
}

fn component_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, TagExpr, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + Clone + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    let expr = expr_parser(source);
    let range_op = choice((
        just(Token::DotDotEq).to(true),
        just(Token::DotDot).to(false),
    ));

    expr.clone()
        .then(range_op.then(expr).or_not())
        .map(|(start, rest)| match rest {
            Some((inclusive, end)) => TagExpr::Ranged(RangeExpr {
                start,
                end,
                inclusive,
            }),
            None => TagExpr::Plain(start),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(name: &str) -> Expr {
        Expr::Var(Var::local(name))
    }

    fn ctx(name: &str) -> Expr {
        Expr::Var(Var::context(name))
    }

    #[test]
    fn precedence_and_associativity() {
        let e = parse_expr("i + 2 * j - 1").unwrap();
        assert_eq!(
            e,
            Expr::binary(
                BinOp::Sub,
                Expr::binary(
                    BinOp::Add,
                    local("i"),
                    Expr::binary(BinOp::Mul, Expr::Int(2), local("j")),
                ),
                Expr::Int(1),
            )
        );
    }

    #[test]
    fn scopes_resolved_at_parse_time() {
        let e = parse_expr("#N - @k").unwrap();
        assert_eq!(e, Expr::binary(BinOp::Sub, ctx("N"), local("k")));
    }

    #[test]
    fn unary_and_grouping() {
        let e = parse_expr("-(i + 1)").unwrap();
        assert_eq!(
            e,
            Expr::unary(UnOp::Neg, Expr::binary(BinOp::Add, local("i"), Expr::Int(1)))
        );
        let e = parse_expr("!!x").unwrap();
        assert_eq!(e, Expr::unary(UnOp::Not, Expr::unary(UnOp::Not, local("x"))));
    }

    #[test]
    fn boolean_guard() {
        let e = parse_expr("i > 0 && i % 2 == 0 || j <= #N").unwrap();
        assert_eq!(
            e.to_string(),
            "i > 0 && i % 2 == 0 || j <= #N"
        );
        assert!(matches!(e, Expr::Binary(BinOp::Or, _, _)));
    }

    #[test]
    fn range_components() {
        let t = parse_tag_component("0 .. #N").unwrap();
        assert_eq!(
            t,
            TagExpr::Ranged(RangeExpr {
                start: Expr::Int(0),
                end: ctx("N"),
                inclusive: false,
            })
        );
        let t = parse_tag_component("i..=i+2").unwrap();
        assert!(matches!(t, TagExpr::Ranged(RangeExpr { inclusive: true, .. })));
        let t = parse_tag_component("i + 1").unwrap();
        assert!(matches!(t, TagExpr::Plain(_)));
    }

    #[test]
    fn range_is_not_an_expression() {
        assert!(parse_expr("0 .. 3").is_err());
    }

    #[test]
    fn syntax_errors_are_collected() {
        let errs = parse_expr("i +").unwrap_err();
        assert!(!errs.is_empty());
        let errs = parse_expr("i $ 1").unwrap_err();
        assert!(errs.iter().any(|e| e.message.contains("unexpected input")));
        assert!(parse_expr("").is_err());
        assert!(parse_expr("(i").is_err());
    }
}
