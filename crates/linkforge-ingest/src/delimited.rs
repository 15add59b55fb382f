//! Delimited record grammar (CSV/TSV), built with nom.
//!
//! A record is a list of fields separated by the delimiter. A field is either
//! quoted (`"..."`, with `""` escaping an embedded quote, delimiters allowed
//! inside) or bare (everything up to the next delimiter). Trailing garbage
//! after a closing quote is malformed quoting and rejected.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::char as pchar,
    combinator::{all_consuming, map},
    multi::{fold_many0, separated_list0},
    sequence::delimited,
    IResult,
};

fn quoted_field(input: &str) -> IResult<&str, String> {
    delimited(
        pchar('"'),
        fold_many0(
            alt((
                map(is_not("\""), |s: &str| s.to_string()),
                map(tag("\"\""), |_| "\"".to_string()),
            )),
            String::new,
            |mut acc, piece: String| {
                acc.push_str(&piece);
                acc
            },
        ),
        pchar('"'),
    )(input)
}

fn bare_field(delim: char) -> impl Fn(&str) -> IResult<&str, String> {
    move |input| map(take_while(|c| c != delim), |s: &str| s.to_string())(input)
}

fn field(delim: char) -> impl Fn(&str) -> IResult<&str, String> {
    move |input| {
        if input.starts_with('"') {
            quoted_field(input)
        } else {
            bare_field(delim)(input)
        }
    }
}

/// Parse one line into fields. Returns a message describing the malformation
/// on failure (unterminated or stray quotes).
pub fn parse_record(line: &str, delim: char) -> Result<Vec<String>, String> {
    match all_consuming(separated_list0(pchar(delim), field(delim)))(line) {
        Ok((_, fields)) => Ok(fields),
        Err(_) => Err("malformed quoting".to_string()),
    }
}
