use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub mod codegen;
pub mod lexer;
pub mod parser;
pub mod symbols;
pub mod vmwriter;

#[derive(Debug, Error)]
pub enum JackcError {
    #[error("invalid syntax")]
    InvalidSyntax,
    #[error("expected `{0}`")]
    ExpectedChar(char),
    #[error("expected {0}")]
    Expected(&'static str),
    #[error("integer constant out of range: {0}")]
    IntegerOutOfRange(u32),
    #[error("string constant is not terminated on its line")]
    UnterminatedString,
    #[error("not a variable: {0}")]
    UnknownVariable(String),
    #[error("method call on a non-object value: {0}")]
    PrimitiveReceiver(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

pub(crate) fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['<', '>', '&']) {
        return s.into();
    }

    let mut escaped = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            c => escaped.push(c),
        }
    }

    escaped.into()
}

/// The `.jack` files named by a path: the file itself, or every `.jack`
/// file inside a directory, in filesystem-iteration order.
pub fn jack_sources(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    Ok(std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|e| e == "jack").unwrap_or(false))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_xml_touches_only_markup_characters() {
        assert_eq!(escape_xml("plain"), "plain");
        assert_eq!(escape_xml("a < b & b > c"), "a &lt; b &amp; b &gt; c");
    }
}
