//! `.env` codec and key ownership helpers shared by key/value stores
//!
//! A file owns a remote key when its catalog `data` holds an `ENV_<KEY>`
//! entry. Only owned keys are emitted on pull or removed on push/purge, so
//! several files can share one remote namespace without clobbering each other.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Prefix of per-key ownership entries in catalog `data`
pub const ENV_PREFIX: &str = "ENV_";

/// Synthetic key carrying the time of the last push
///
/// Unlike a `last-modified` style name this is a valid environment variable
/// name, so it can be stored next to real keys on every backend and parsed
/// back from a pulled `.env` body.
pub const MODIFIED_KEY: &str = "CFGSYNC_LAST_MODIFIED";

const MODIFIED_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.9f %z UTC";
const MODIFIED_PARSE_LAYOUT: &str = "%Y-%m-%d %H:%M:%S%.f %z";

/// Per-key visibility tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// Plain environment variable with no visibility semantics
    Env,
    Basic,
    Discover,
    Hidden,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Env => "env",
            Classification::Basic => "basic",
            Classification::Discover => "discover",
            Classification::Hidden => "hidden",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "env" => Some(Classification::Env),
            "basic" => Some(Classification::Basic),
            "discover" => Some(Classification::Discover),
            "hidden" => Some(Classification::Hidden),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse dotenv content into sorted key/value pairs (last definition wins)
///
/// Values are taken literally: `$NAME` and `${NAME}` are never expanded from
/// earlier lines or from the process environment.
pub fn parse(contents: &[u8]) -> Result<BTreeMap<String, String>> {
    let text = std::str::from_utf8(contents).context(".env content is not valid UTF-8")?;
    let literal = escape_substitutions(text);

    let mut pairs = BTreeMap::new();
    for item in dotenvy::from_read_iter(literal.as_bytes()) {
        let (key, value) = item.context("Failed to parse .env content")?;
        pairs.insert(key, value);
    }
    Ok(pairs)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lexeme {
    /// Start of a line or after whitespace, where `#` opens a comment
    Blank,
    Plain,
    Weak,
    Strong,
    Comment,
}

/// Escape every `$` dotenvy would expand, i.e. those outside single quotes and comments
fn escape_substitutions(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = Lexeme::Blank;
    let mut escaped = false;
    let mut prev = '\n';

    for c in text.chars() {
        if escaped {
            escaped = false;
        } else {
            state = match (state, c) {
                (Lexeme::Comment, '\n') => Lexeme::Blank,
                (Lexeme::Comment, _) => Lexeme::Comment,
                (Lexeme::Strong, '\'') => Lexeme::Plain,
                (Lexeme::Strong, _) => Lexeme::Strong,
                (Lexeme::Weak, '"') => Lexeme::Plain,
                (Lexeme::Weak, _) => {
                    match c {
                        '\\' => escaped = true,
                        '$' => out.push('\\'),
                        _ => {}
                    }
                    Lexeme::Weak
                }
                (Lexeme::Blank, '#') => Lexeme::Comment,
                (Lexeme::Plain, '#') if prev == '=' => Lexeme::Comment,
                (_, c) if c.is_whitespace() => Lexeme::Blank,
                (_, '"') => Lexeme::Weak,
                (_, '\'') => Lexeme::Strong,
                (_, '\\') => {
                    escaped = true;
                    Lexeme::Plain
                }
                (_, '$') => {
                    out.push('\\');
                    Lexeme::Plain
                }
                _ => Lexeme::Plain,
            };
        }
        out.push(c);
        prev = c;
    }
    out
}

/// Render `KEY=value` lines, double-quoting values that would not survive [`parse`]
pub fn render<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<u8> {
    let mut out = String::new();
    for (key, value) in pairs {
        out.push_str(key);
        out.push('=');
        if needs_quotes(value) {
            out.push('"');
            for c in value.chars() {
                match c {
                    '\\' | '"' | '$' => {
                        out.push('\\');
                        out.push(c);
                    }
                    '\n' => out.push_str("\\n"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        } else {
            out.push_str(value);
        }
        out.push('\n');
    }
    out.into_bytes()
}

fn needs_quotes(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '#' | '"' | '\'' | '\\' | '$'))
}

pub fn prefixed(key: &str) -> String {
    format!("{}{}", ENV_PREFIX, key)
}

/// Whether `data` records ownership of the remote key `key`
pub fn is_owned(data: &BTreeMap<String, String>, key: &str) -> bool {
    data.contains_key(&prefixed(key))
}

/// Remote key names owned by the file, for entries holding a known classification
pub fn owned_keys(data: &BTreeMap<String, String>) -> impl Iterator<Item = &str> {
    data.iter().filter_map(|(key, value)| {
        let name = key.strip_prefix(ENV_PREFIX)?;
        Classification::parse(value).map(|_| name)
    })
}

/// Classification to push `key` with
///
/// A previously recorded classification is kept unless it is the plain
/// `env` marker; everything else starts out hidden.
pub fn classify(data: &BTreeMap<String, String>, key: &str) -> Classification {
    match data.get(&prefixed(key)).and_then(|v| Classification::parse(v)) {
        Some(Classification::Env) | None => Classification::Hidden,
        Some(class) => class,
    }
}

pub fn format_modified(ts: DateTime<Utc>) -> String {
    ts.format(MODIFIED_LAYOUT).to_string()
}

/// Parse a sentinel timestamp; `None` when the value is not in the expected layout
pub fn parse_modified(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let head = match value.rsplit_once(' ') {
        Some((head, zone)) if !zone.is_empty() && zone.chars().all(|c| c.is_ascii_alphabetic()) => {
            head
        }
        _ => value,
    };

    DateTime::parse_from_str(head, MODIFIED_PARSE_LAYOUT)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
