// ABOUTME: Lock expression trees - recursive-descent parsing via nom and evaluation

use crate::db::{Dbref, NOTHING};
use crate::eval::{exec, EvalContext, EV_FCHECK, EV_FMAND};
use crate::wild::wild_match;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::recognize,
    sequence::preceded,
    IResult, Parser,
};
use std::fmt;

/// A lock expression, evaluated against a prospective actor.
#[derive(Debug, Clone, PartialEq)]
pub enum Boolexp {
    /// Bare dbref: true when the actor is, or carries, the named object.
    Const(Dbref),
    /// Attribute test: wildcard match against the actor's attribute text.
    Attr(String, String),
    /// Evaluation test: run the lock owner's attribute, compare the result.
    Eval(String, String),
    /// Defer to the lock on another object.
    Indirect(Box<Boolexp>),
    /// True only when the actor IS the target.
    Is(Box<Boolexp>),
    /// True only when the actor carries the target.
    Carry(Box<Boolexp>),
    /// True when the actor shares an owner with the target.
    Owner(Box<Boolexp>),
    Not(Box<Boolexp>),
    And(Box<Boolexp>, Box<Boolexp>),
    Or(Box<Boolexp>, Box<Boolexp>),
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_dbref_digits(input: &str) -> IResult<&str, &str> {
    recognize(preceded(
        nom::combinator::opt(char('-')),
        digit1,
    ))
    .parse(input)
}

/// A quoted attribute name: "..." with no escapes (names cannot hold quotes).
fn parse_quoted_name(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, name) = take_while(|c| c != '"')(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, name.to_string()))
}

/// A bare attribute-name word.
fn parse_word(input: &str) -> IResult<&str, String> {
    let (input, word) = take_while1(|c: char| {
        c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
    })(input)?;
    Ok((input, word.to_string()))
}

/// Lock comparison text runs to the next structural character.
fn parse_lock_text(input: &str) -> IResult<&str, String> {
    let (input, text) = take_while(|c| !"&|()\n".contains(c))(input)?;
    Ok((input, text.trim().to_string()))
}

/// Leaf: dbref constant, attribute lock, or evaluation lock.
fn parse_leaf(input: &str) -> IResult<&str, Boolexp> {
    // Quoted names are always attribute or eval locks.
    if let Ok((rest, name)) = parse_quoted_name(input) {
        if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>(':')(rest) {
            let (rest, text) = parse_lock_text(rest)?;
            return Ok((rest, Boolexp::Attr(name, text)));
        }
        if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('/')(rest) {
            let (rest, text) = parse_lock_text(rest)?;
            return Ok((rest, Boolexp::Eval(name, text)));
        }
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }

    if let Ok((rest, digits)) = parse_dbref_digits(input) {
        if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>(':')(rest) {
            let (rest, text) = parse_lock_text(rest)?;
            return Ok((rest, Boolexp::Attr(digits.to_string(), text)));
        }
        if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('/')(rest) {
            let (rest, text) = parse_lock_text(rest)?;
            return Ok((rest, Boolexp::Eval(digits.to_string(), text)));
        }
        let dbref: Dbref = digits.parse().unwrap_or(NOTHING);
        return Ok((rest, Boolexp::Const(dbref)));
    }

    let (rest, word) = parse_word(input)?;
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>(':')(rest) {
        let (rest, text) = parse_lock_text(rest)?;
        return Ok((rest, Boolexp::Attr(word, text)));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('/')(rest) {
        let (rest, text) = parse_lock_text(rest)?;
        return Ok((rest, Boolexp::Eval(word, text)));
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Tag,
    )))
}

/// Factor: operator markers, a parenthesized group, or a leaf.
fn parse_factor(input: &str) -> IResult<&str, Boolexp> {
    let (input, _) = multispace0(input)?;
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('!')(input) {
        let (rest, sub) = parse_factor(rest)?;
        return Ok((rest, Boolexp::Not(Box::new(sub))));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('@')(input) {
        let (rest, sub) = parse_factor(rest)?;
        return Ok((rest, Boolexp::Indirect(Box::new(sub))));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('=')(input) {
        let (rest, sub) = parse_factor(rest)?;
        return Ok((rest, Boolexp::Is(Box::new(sub))));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('+')(input) {
        let (rest, sub) = parse_factor(rest)?;
        return Ok((rest, Boolexp::Carry(Box::new(sub))));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('$')(input) {
        let (rest, sub) = parse_factor(rest)?;
        return Ok((rest, Boolexp::Owner(Box::new(sub))));
    }
    if let Ok((rest, _)) = char::<_, nom::error::Error<&str>>('(')(input) {
        let (rest, expr) = parse_expr(rest)?;
        let (rest, _) = multispace0(rest)?;
        let (rest, _) = char(')')(rest)?;
        return Ok((rest, expr));
    }
    parse_leaf(input)
}

/// Expression: factor ( ('&' | '|') factor )*
fn parse_expr(input: &str) -> IResult<&str, Boolexp> {
    let (mut input, mut left) = parse_factor(input)?;
    loop {
        let (rest, _) = multispace0(input)?;
        match alt((char::<_, nom::error::Error<&str>>('&'), char('|'))).parse(rest) {
            Ok((rest, op)) => {
                let (rest, right) = parse_factor(rest)?;
                left = if op == '&' {
                    Boolexp::And(Box::new(left), Box::new(right))
                } else {
                    Boolexp::Or(Box::new(left), Box::new(right))
                };
                input = rest;
            }
            Err(_) => return Ok((input, left)),
        }
    }
}

/// Parse a complete lock expression. Trailing garbage, unmatched parentheses,
/// and unknown operators are errors; an empty string is an unlocked lock.
pub fn parse_boolexp(input: &str) -> Result<Option<Boolexp>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    match parse_expr(trimmed) {
        Ok((rest, expr)) => {
            if rest.trim().is_empty() {
                Ok(Some(expr))
            } else {
                Err(format!("unexpected trailing lock text: '{}'", rest.trim()))
            }
        }
        Err(e) => Err(format!("bad lock expression: {:?}", e)),
    }
}

// ============================================================================
// Unparsing
// ============================================================================

fn fmt_name(name: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if name.chars().all(|c| c.is_alphanumeric() || "_-.".contains(c)) {
        write!(f, "{}", name)
    } else {
        write!(f, "\"{}\"", name)
    }
}

impl fmt::Display for Boolexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boolexp::Const(d) => write!(f, "{}", d),
            Boolexp::Attr(name, text) => {
                fmt_name(name, f)?;
                write!(f, ":{}", text)
            }
            Boolexp::Eval(name, text) => {
                fmt_name(name, f)?;
                write!(f, "/{}", text)
            }
            Boolexp::Indirect(sub) => write!(f, "@{}", sub),
            Boolexp::Is(sub) => write!(f, "={}", sub),
            Boolexp::Carry(sub) => write!(f, "+{}", sub),
            Boolexp::Owner(sub) => write!(f, "${}", sub),
            Boolexp::Not(sub) => write!(f, "!{}", sub),
            Boolexp::And(a, b) => write!(f, "({} & {})", a, b),
            Boolexp::Or(a, b) => write!(f, "({} | {})", a, b),
        }
    }
}

// ============================================================================
// Evaluation
// ============================================================================

impl Boolexp {
    /// Evaluate against `player`. `from` is the object bearing the lock;
    /// eval locks run its attributes and indirect locks chase its links.
    pub fn check(&self, ctx: &mut EvalContext, player: Dbref, from: Dbref) -> bool {
        match self {
            Boolexp::Const(d) => {
                player == *d || {
                    let head = ctx.db.get(player).map(|o| o.contents).unwrap_or(NOTHING);
                    ctx.db.chain(head).contains(d)
                }
            }
            Boolexp::Is(sub) => match sub.as_ref() {
                Boolexp::Const(d) => player == *d,
                other => other.check(ctx, player, from),
            },
            Boolexp::Carry(sub) => match sub.as_ref() {
                Boolexp::Const(d) => {
                    let head = ctx.db.get(player).map(|o| o.contents).unwrap_or(NOTHING);
                    ctx.db.chain(head).contains(d)
                }
                other => other.check(ctx, player, from),
            },
            Boolexp::Owner(sub) => match sub.as_ref() {
                Boolexp::Const(d) => ctx.db.owner_of(player) == ctx.db.owner_of(*d),
                other => other.check(ctx, player, from),
            },
            Boolexp::Indirect(sub) => match sub.as_ref() {
                Boolexp::Const(d) => {
                    let lock = ctx.db.get(*d).and_then(|o| o.lock.clone());
                    match lock {
                        Some(inner) => inner.check(ctx, player, *d),
                        None => true,
                    }
                }
                other => other.check(ctx, player, from),
            },
            Boolexp::Not(sub) => !sub.check(ctx, player, from),
            Boolexp::And(a, b) => a.check(ctx, player, from) && b.check(ctx, player, from),
            Boolexp::Or(a, b) => a.check(ctx, player, from) || b.check(ctx, player, from),
            Boolexp::Attr(name, pattern) => {
                let num = match ctx.db.attr_number(name) {
                    Some(n) => n,
                    None => return false,
                };
                let text = crate::attr::attr_text_unchecked(ctx.db, player, num);
                !text.is_empty() && wild_match(pattern, &text)
            }
            Boolexp::Eval(name, expected) => {
                let num = match ctx.db.attr_number(name) {
                    Some(n) => n,
                    None => return false,
                };
                let text = crate::attr::attr_text_unchecked(ctx.db, from, num);
                if text.is_empty() {
                    return false;
                }
                let saved_enactor = ctx.enactor;
                ctx.enactor = player;
                let mut result = String::new();
                exec(ctx, &mut result, &text, EV_FCHECK | EV_FMAND, None);
                ctx.enactor = saved_enactor;
                wild_match(expected, &result)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_const() {
        let bexp = parse_boolexp("42").unwrap().unwrap();
        assert_eq!(bexp, Boolexp::Const(42));
    }

    #[test]
    fn test_parse_attr_lock() {
        let bexp = parse_boolexp("sex:m*").unwrap().unwrap();
        assert_eq!(bexp, Boolexp::Attr("sex".to_string(), "m*".to_string()));
    }

    #[test]
    fn test_parse_numeric_attr_lock() {
        let bexp = parse_boolexp("7:male").unwrap().unwrap();
        assert_eq!(bexp, Boolexp::Attr("7".to_string(), "male".to_string()));
    }

    #[test]
    fn test_parse_quoted_attr_lock() {
        let bexp = parse_boolexp("\"my attr\":yes").unwrap().unwrap();
        assert_eq!(
            bexp,
            Boolexp::Attr("my attr".to_string(), "yes".to_string())
        );
    }

    #[test]
    fn test_parse_eval_lock() {
        let bexp = parse_boolexp("check/1").unwrap().unwrap();
        assert_eq!(bexp, Boolexp::Eval("check".to_string(), "1".to_string()));
    }

    #[test]
    fn test_parse_markers() {
        assert_eq!(
            parse_boolexp("!3").unwrap().unwrap(),
            Boolexp::Not(Box::new(Boolexp::Const(3)))
        );
        assert_eq!(
            parse_boolexp("(=3)").unwrap().unwrap(),
            Boolexp::Is(Box::new(Boolexp::Const(3)))
        );
        assert_eq!(
            parse_boolexp("(+3)").unwrap().unwrap(),
            Boolexp::Carry(Box::new(Boolexp::Const(3)))
        );
        assert_eq!(
            parse_boolexp("($3)").unwrap().unwrap(),
            Boolexp::Owner(Box::new(Boolexp::Const(3)))
        );
        assert_eq!(
            parse_boolexp("(@3)").unwrap().unwrap(),
            Boolexp::Indirect(Box::new(Boolexp::Const(3)))
        );
    }

    #[test]
    fn test_parse_infix() {
        let bexp = parse_boolexp("(1 & 2)").unwrap().unwrap();
        assert_eq!(
            bexp,
            Boolexp::And(Box::new(Boolexp::Const(1)), Box::new(Boolexp::Const(2)))
        );
        let bexp = parse_boolexp("(1 | !2)").unwrap().unwrap();
        assert_eq!(
            bexp,
            Boolexp::Or(
                Box::new(Boolexp::Const(1)),
                Box::new(Boolexp::Not(Box::new(Boolexp::Const(2))))
            )
        );
    }

    #[test]
    fn test_parse_nested_groups() {
        let bexp = parse_boolexp("((1 & 2) | sex:f*)").unwrap().unwrap();
        match bexp {
            Boolexp::Or(left, right) => {
                assert!(matches!(*left, Boolexp::And(_, _)));
                assert!(matches!(*right, Boolexp::Attr(_, _)));
            }
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_boolexp("(1 & 2").is_err());
        assert!(parse_boolexp("1 2").is_err());
        assert!(parse_boolexp("^3").is_err());
    }

    #[test]
    fn test_empty_is_unlocked() {
        assert!(parse_boolexp("").unwrap().is_none());
        assert!(parse_boolexp("   ").unwrap().is_none());
    }

    #[test]
    fn test_display_roundtrip() {
        for text in ["42", "sex:m*", "check/1", "(1 & 2)", "!(3 | =4)"] {
            let bexp = parse_boolexp(text).unwrap().unwrap();
            let printed = bexp.to_string();
            let reparsed = parse_boolexp(&printed).unwrap().unwrap();
            assert_eq!(bexp, reparsed, "round-trip of {}", text);
        }
    }
}
