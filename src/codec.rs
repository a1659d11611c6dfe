//! Text forms of roster members.
//!
//! A member travels as the token `"Name (StudentId)"`. A group's roster is
//! stored as a JSON array of such tokens and read back with a strict JSON
//! parser followed by [`decode`] on every element, so nothing stored in the
//! database is ever evaluated.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use crate::models::Member;

const OPEN: char = '(';
const CLOSE: char = ')';

/// A member token or stored member list could not be produced or read.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("{field} must not contain '(' or ')': {value:?}")]
    Delimiter { field: &'static str, value: String },

    #[error("{0} must not be blank")]
    Blank(&'static str),

    #[error("expected `name (student_id)`, got {0:?}")]
    Malformed(String),

    #[error("stored member list is not a JSON array of strings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("legacy member list at offset {offset}: {reason}")]
    Legacy { offset: usize, reason: &'static str },
}

/// Roster input text did not have the `name, student_id` per-line shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no members given")]
    Empty,

    #[error("line {line}: {reason} in {content:?}")]
    Line {
        line: usize,
        reason: &'static str,
        content: String,
    },
}

fn check_field(field: &'static str, value: &str) -> Result<(), FormatError> {
    if value.trim().is_empty() {
        return Err(FormatError::Blank(field));
    }
    if value.contains([OPEN, CLOSE]) {
        return Err(FormatError::Delimiter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

pub fn encode(member: &Member) -> Result<String, FormatError> {
    check_field("name", &member.name)?;
    check_field("student_id", &member.student_id)?;
    Ok(format!("{} ({})", member.name, member.student_id))
}

pub fn decode(token: &str) -> Result<Member, FormatError> {
    let malformed = || FormatError::Malformed(token.to_string());

    if token.matches(OPEN).count() != 1 || token.matches(CLOSE).count() != 1 {
        return Err(malformed());
    }
    let inner = token.strip_suffix(CLOSE).ok_or_else(malformed)?;
    let (name, student_id) = inner.split_once(" (").ok_or_else(malformed)?;
    if name.trim().is_empty() || student_id.trim().is_empty() {
        return Err(malformed());
    }

    Ok(Member::new(name, student_id))
}

pub fn encode_list(members: &[Member]) -> Result<String, FormatError> {
    let tokens = members.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
    Ok(serde_json::to_string(&tokens)?)
}

pub fn decode_list(stored: &str) -> Result<Vec<Member>, FormatError> {
    let tokens: Vec<String> = serde_json::from_str(stored)?;
    tokens.iter().map(|t| decode(t)).collect()
}

/// Read a member list written by the legacy tool, which stored the textual
/// form of a list of strings (`['Ada (S1)', 'Bob (S2)']`).
///
/// Only string literals, commas and brackets are accepted.
pub fn decode_legacy_list(stored: &str) -> Result<Vec<Member>, FormatError> {
    let mut reader = LegacyReader {
        chars: stored.chars().peekable(),
        offset: 0,
    };
    reader
        .read_list()?
        .iter()
        .map(|t| decode(t))
        .collect()
}

struct LegacyReader<'a> {
    chars: Peekable<Chars<'a>>,
    offset: usize,
}

impl LegacyReader<'_> {
    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        self.offset += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.bump();
        }
    }

    fn fail<T>(&self, reason: &'static str) -> Result<T, FormatError> {
        Err(FormatError::Legacy {
            offset: self.offset,
            reason,
        })
    }

    fn read_list(&mut self) -> Result<Vec<String>, FormatError> {
        self.skip_ws();
        if self.bump() != Some('[') {
            return self.fail("expected '['");
        }

        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some(']') => {
                    self.bump();
                    break;
                }
                Some('\'' | '"') => items.push(self.read_string()?),
                _ => return self.fail("expected a quoted string or ']'"),
            }

            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => break,
                _ => return self.fail("expected ',' or ']'"),
            }
        }

        self.skip_ws();
        if self.chars.peek().is_some() {
            return self.fail("trailing characters after list");
        }
        Ok(items)
    }

    fn read_string(&mut self) -> Result<String, FormatError> {
        let Some(quote) = self.bump() else {
            return self.fail("unexpected end of input");
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return self.fail("unterminated string"),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('\\' | '\'' | '"')) => out.push(c),
                    _ => return self.fail("unsupported escape"),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

/// Parse pasted roster text: one `name, student_id` pair per line.
///
/// Surrounding blank lines are dropped. Every remaining line, blank ones
/// included, must split on a single comma into two non-empty fields free of
/// parentheses.
pub fn parse_roster_input(text: &str) -> Result<Vec<Member>, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut members = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        let reject = |reason| ParseError::Line {
            line: idx + 1,
            reason,
            content: line.to_string(),
        };

        let parts: Vec<&str> = line.split(',').map(str::trim).collect();
        let [name, student_id] = parts.as_slice() else {
            return Err(reject("expected exactly one comma"));
        };
        if name.is_empty() || student_id.is_empty() {
            return Err(reject("empty field"));
        }
        if line.contains([OPEN, CLOSE]) {
            return Err(reject("parentheses are not allowed"));
        }
        members.push(Member::new(*name, *student_id));
    }

    Ok(members)
}
