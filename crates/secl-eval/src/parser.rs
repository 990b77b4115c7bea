use lalrpop_util::{lalrpop_mod, ParseError};

use crate::{ast::Expr, error::SyntaxError};

lalrpop_mod!(#[allow(clippy::all)] grammar); // syntesized by LALRPOP

/// Parse an expression string into an [Expr] tree.
pub fn parse_expression(input: &str) -> Result<Expr, SyntaxError> {
    grammar::ExpressionParser::new()
        .parse(input)
        .map_err(|err| match err {
            ParseError::InvalidToken { location } => {
                // A lone `=` is read as the start of `==` or `=~`, the
                // offending char is the one following it.
                let location = match input.get(location..) {
                    Some(rest) if rest.starts_with('=') => location + 1,
                    _ => location,
                };
                match input.get(location..).and_then(|rest| rest.chars().next()) {
                    Some(token) => {
                        syntax_error(input, location, format!("unexpected token `{token}`"))
                    }
                    None => {
                        syntax_error(input, location, "unexpected end of expression".to_string())
                    }
                }
            }
            ParseError::UnrecognizedEof { location, .. } => {
                syntax_error(input, location, "unexpected end of expression".to_string())
            }
            ParseError::UnrecognizedToken {
                token: (start, token, _),
                ..
            }
            | ParseError::ExtraToken {
                token: (start, token, _),
            } => syntax_error(input, start, format!("unexpected token `{token}`")),
            ParseError::User { error } => syntax_error(input, 0, error.to_string()),
        })
}

fn syntax_error(input: &str, offset: usize, reason: String) -> SyntaxError {
    let prefix = input.get(..offset).unwrap_or(input);
    let line = prefix.matches('\n').count() + 1;
    let column = prefix
        .rsplit('\n')
        .next()
        .map_or(0, |last_line| last_line.chars().count())
        + 1;

    SyntaxError {
        line,
        column,
        reason,
    }
}

/// Strip quotes from a string token and resolve its escape sequences.
pub(crate) fn string_literal(token: &str) -> String {
    let inner = &token[1..token.len() - 1];

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(escaped) => result.push(escaped),
            None => result.push('\\'),
        }
    }
    result
}

/// Strip `r"` and `"` from a regular expression token. Only `\"` is unescaped,
/// everything else belongs to the regular expression syntax.
pub(crate) fn regex_literal(token: &str) -> String {
    token[2..token.len() - 1].replace("\\\"", "\"")
}

/// Extract `name` from `${name}`.
pub(crate) fn variable_name(token: &str) -> String {
    token[2..token.len() - 1].to_string()
}
