//! Table filter query language.
//!
//! Supports the query syntax the dashboard table sends with each view request:
//! `{col} op value` terms joined left to right by `&&`/`and` or `||`/`or`.

use polars::datatypes::TimeUnit;
use polars::prelude::*;

use crate::error::{DxError, DxResult};
use crate::source::parse_naive_datetime_str;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// `{name}`, may contain spaces
    Column(String),
    /// Unquoted run of characters
    Word(String),
    Quoted(String),
    Op(&'static str),
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    DateStartsWith,
    IsBlank,
    IsNotBlank,
}

impl FilterOp {
    fn from_symbol(s: &str) -> Option<Self> {
        match s {
            "=" | "eq" => Some(FilterOp::Eq),
            "!=" | "ne" => Some(FilterOp::Ne),
            "<" | "lt" => Some(FilterOp::Lt),
            "<=" | "le" => Some(FilterOp::Le),
            ">" | "gt" => Some(FilterOp::Gt),
            ">=" | "ge" => Some(FilterOp::Ge),
            "contains" => Some(FilterOp::Contains),
            "datestartswith" => Some(FilterOp::DateStartsWith),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

/// One `column op value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: FilterOp,
    pub value: Option<String>,
}

/// Parsed filter query: the first condition, then each following one with its connective.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterQuery {
    pub first: Condition,
    pub rest: Vec<(Connective, Condition)>,
}

fn invalid(msg: impl Into<String>) -> DxError {
    DxError::InvalidFilterQuery(msg.into())
}

fn tokenize(input: &str) -> DxResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => return Err(invalid("missing '}' after column name")),
                    }
                }
                tokens.push(Token::Column(name));
            }
            '"' | '\'' | '`' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => {
                            if let Some(escaped) = chars.next() {
                                value.push(escaped);
                            }
                        }
                        Some(ch) if ch == quote => break,
                        Some(ch) => value.push(ch),
                        None => return Err(invalid("unterminated quoted value")),
                    }
                }
                tokens.push(Token::Quoted(value));
            }
            '&' | '|' => {
                chars.next();
                if chars.peek() != Some(&c) {
                    return Err(invalid(format!("expected '{}{}'", c, c)));
                }
                chars.next();
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '}' => return Err(invalid("unexpected '}'")),
            '=' => {
                chars.next();
                tokens.push(Token::Op("="));
            }
            '!' | '<' | '>' => {
                chars.next();
                let with_eq = chars.peek() == Some(&'=');
                if with_eq {
                    chars.next();
                }
                let op = match (c, with_eq) {
                    ('!', true) => "!=",
                    ('<', false) => "<",
                    ('<', true) => "<=",
                    ('>', false) => ">",
                    ('>', true) => ">=",
                    _ => return Err(invalid("'!' must be followed by '='")),
                };
                tokens.push(Token::Op(op));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || "{}\"'`=!<>&|".contains(ch) {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

impl FilterQuery {
    pub fn parse(input: &str) -> DxResult<Self> {
        let tokens = tokenize(input)?;
        let mut pos = 0;

        let first = parse_condition(&tokens, &mut pos)?;
        let mut rest = Vec::new();
        while pos < tokens.len() {
            let connective = match &tokens[pos] {
                Token::And => Connective::And,
                Token::Or => Connective::Or,
                Token::Word(w) if w.eq_ignore_ascii_case("and") => Connective::And,
                Token::Word(w) if w.eq_ignore_ascii_case("or") => Connective::Or,
                other => {
                    return Err(invalid(format!(
                        "expected '&&' or '||', found {}",
                        describe(other)
                    )))
                }
            };
            pos += 1;
            rest.push((connective, parse_condition(&tokens, &mut pos)?));
        }
        Ok(Self { first, rest })
    }

    /// Compile against `schema`. Literals are typed from the column dtype.
    pub fn to_expr(&self, schema: &Schema) -> DxResult<Expr> {
        let mut expr = condition_expr(&self.first, schema)?;
        for (connective, condition) in &self.rest {
            let next = condition_expr(condition, schema)?;
            expr = match connective {
                Connective::And => expr.and(next),
                Connective::Or => expr.or(next),
            };
        }
        Ok(expr)
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Column(c) => format!("column {{{}}}", c),
        Token::Word(w) => format!("'{}'", w),
        Token::Quoted(q) => format!("\"{}\"", q),
        Token::Op(op) => format!("'{}'", op),
        Token::And => "'&&'".to_string(),
        Token::Or => "'||'".to_string(),
    }
}

fn parse_condition(tokens: &[Token], pos: &mut usize) -> DxResult<Condition> {
    let column = match tokens.get(*pos) {
        Some(Token::Column(c)) | Some(Token::Word(c)) => c.clone(),
        Some(other) => {
            return Err(invalid(format!(
                "expected a column, found {}",
                describe(other)
            )))
        }
        None => return Err(invalid("expected a column")),
    };
    *pos += 1;

    let op = match tokens.get(*pos) {
        Some(Token::Op(sym)) => FilterOp::from_symbol(sym),
        Some(Token::Word(w)) if w.eq_ignore_ascii_case("is") => {
            *pos += 1;
            let op = match tokens.get(*pos) {
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("blank") => FilterOp::IsBlank,
                Some(Token::Word(w)) if w.eq_ignore_ascii_case("not") => {
                    *pos += 1;
                    match tokens.get(*pos) {
                        Some(Token::Word(w)) if w.eq_ignore_ascii_case("blank") => {
                            FilterOp::IsNotBlank
                        }
                        _ => return Err(invalid("expected 'blank' after 'is not'")),
                    }
                }
                _ => return Err(invalid("expected 'blank' or 'not blank' after 'is'")),
            };
            *pos += 1;
            return Ok(Condition {
                column,
                op,
                value: None,
            });
        }
        Some(Token::Word(w)) => FilterOp::from_symbol(&w.to_lowercase()),
        _ => None,
    };
    let Some(op) = op else {
        return Err(invalid(format!("missing or unknown operator after {}", column)));
    };
    *pos += 1;

    let value = match tokens.get(*pos) {
        Some(Token::Quoted(v)) | Some(Token::Word(v)) => v.clone(),
        _ => return Err(invalid(format!("missing value in condition on {}", column))),
    };
    *pos += 1;

    Ok(Condition {
        column,
        op,
        value: Some(value),
    })
}

fn condition_expr(condition: &Condition, schema: &Schema) -> DxResult<Expr> {
    let dtype = schema
        .get(condition.column.as_str())
        .ok_or_else(|| invalid(format!("unknown column '{}'", condition.column)))?;
    let column = col(condition.column.as_str());
    let value = || {
        condition
            .value
            .as_deref()
            .ok_or_else(|| invalid(format!("missing value for {}", condition.column)))
    };
    let operands = || typed_operands(column.clone(), dtype, value()?, &condition.column);

    let expr = match condition.op {
        FilterOp::IsBlank => blank_expr(column.clone(), dtype),
        FilterOp::IsNotBlank => blank_expr(column.clone(), dtype).not(),
        FilterOp::Contains => column
            .clone()
            .cast(DataType::String)
            .str()
            .contains_literal(lit(value()?)),
        FilterOp::DateStartsWith => column
            .clone()
            .cast(DataType::String)
            .str()
            .starts_with(lit(value()?)),
        FilterOp::Eq => {
            let (lhs, rhs) = operands()?;
            lhs.eq(rhs)
        }
        FilterOp::Ne => {
            let (lhs, rhs) = operands()?;
            lhs.neq(rhs)
        }
        FilterOp::Lt => {
            let (lhs, rhs) = operands()?;
            lhs.lt(rhs)
        }
        FilterOp::Le => {
            let (lhs, rhs) = operands()?;
            lhs.lt_eq(rhs)
        }
        FilterOp::Gt => {
            let (lhs, rhs) = operands()?;
            lhs.gt(rhs)
        }
        FilterOp::Ge => {
            let (lhs, rhs) = operands()?;
            lhs.gt_eq(rhs)
        }
    };
    Ok(expr)
}

fn blank_expr(column: Expr, dtype: &DataType) -> Expr {
    if dtype == &DataType::String {
        column.clone().is_null().or(column.eq(lit("")))
    } else {
        column.is_null()
    }
}

/// Column and literal for a comparison, cast so that both sides share a type.
fn typed_operands(
    column: Expr,
    dtype: &DataType,
    value: &str,
    name: &str,
) -> DxResult<(Expr, Expr)> {
    match dtype {
        d if d.is_integer() => match value.parse::<i64>() {
            Ok(i) => Ok((column, lit(i))),
            Err(_) => value
                .parse::<f64>()
                .map(|f| (column.cast(DataType::Float64), lit(f)))
                .map_err(|_| invalid(format!("'{}' is not a number (column {})", value, name))),
        },
        d if d.is_float() => value
            .parse::<f64>()
            .map(|f| (column, lit(f)))
            .map_err(|_| invalid(format!("'{}' is not a number (column {})", value, name))),
        DataType::Boolean => value
            .to_lowercase()
            .parse::<bool>()
            .map(|b| (column, lit(b)))
            .map_err(|_| invalid(format!("'{}' is not true or false (column {})", value, name))),
        DataType::Date | DataType::Datetime(_, _) => {
            let datetime = DataType::Datetime(TimeUnit::Microseconds, None);
            match parse_naive_datetime_str(value) {
                Some(dt) => Ok((
                    column.cast(datetime.clone()),
                    lit(dt.and_utc().timestamp_micros()).cast(datetime),
                )),
                None => Ok((column.cast(DataType::String), lit(value))),
            }
        }
        _ => Ok((column.cast(DataType::String), lit(value))),
    }
}
