//! `nom` parser for the metadata text format.

use nom::IResult;
use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while1};
use nom::character::complete::{char, i64 as int, multispace1, not_line_ending};
use nom::combinator::{all_consuming, cut, map, opt, value};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated};

use super::{ConfigNode, ConfigValue};
use crate::error::{Error, Result};

fn comment(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), not_line_ending)(input)
}

fn ws(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((multispace1, comment))))(input)
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '+' | '-'))(input)
}

fn quoted(input: &str) -> IResult<&str, String> {
    let body = escaped_transform(
        is_not("\\\""),
        '\\',
        alt((value("\\", tag("\\")), value("\"", tag("\"")))),
    );
    delimited(char('"'), map(opt(body), Option::unwrap_or_default), char('"'))(input)
}

fn config_value(input: &str) -> IResult<&str, ConfigValue> {
    alt((
        map(int, ConfigValue::Int),
        map(quoted, ConfigValue::Str),
        map(
            delimited(
                terminated(char('['), ws),
                separated_list0(delimited(ws, char(','), ws), config_value),
                preceded(ws, char(']')),
            ),
            ConfigValue::List,
        ),
    ))(input)
}

fn node(input: &str) -> IResult<&str, ConfigNode> {
    let (input, key) = terminated(ident, ws)(input)?;
    alt((
        map(preceded(pair(char('='), ws), cut(config_value)), |v| {
            ConfigNode::value(key, v)
        }),
        map(
            preceded(
                pair(char('{'), ws),
                cut(terminated(many0(terminated(node, ws)), char('}'))),
            ),
            |children| ConfigNode::section(key, children),
        ),
    ))(input)
}

/// Parses metadata text into an anonymous root section.
///
/// # Errors
/// Returns [`Error::Syntax`] with the line of the first node that could not be parsed.
pub fn parse(text: &str) -> Result<ConfigNode> {
    match all_consuming(preceded(ws, many0(terminated(node, ws))))(text) {
        Ok((_, children)) => Ok(ConfigNode::section("", children)),
        Err(nom::Err::Error(e) | nom::Err::Failure(e)) => {
            Err(syntax_error(text, e.input).logged())
        }
        Err(nom::Err::Incomplete(_)) => Err(Error::Syntax {
            line: text.lines().count(),
            message: "unexpected end of input".into(),
        }
        .logged()),
    }
}

fn syntax_error(text: &str, rest: &str) -> Error {
    let offset = text.len() - rest.len();
    let line = text[..offset].matches('\n').count() + 1;
    let near: String = rest.lines().next().unwrap_or("").chars().take(32).collect();
    let message = if near.is_empty() {
        "unexpected end of input".to_string()
    } else {
        format!("unexpected input near '{near}'")
    };
    Error::Syntax { line, message }
}
