use winnow::combinator::{alt, separated};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::take_while;

use crate::types::path::{FieldPath, Segment};

/// Error produced when a field path fails to parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid field path '{input}' at offset {offset}")]
pub struct PathError {
    input: String,
    offset: usize,
}

impl PathError {
    /// Byte offset of the first unparseable character.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Parse a dotted field path into its segments.
///
/// # Errors
///
/// Returns [`PathError`] if the input is empty, has empty segments, or
/// contains characters outside `[A-Za-z0-9_.]`.
pub(crate) fn parse_path(input: &str) -> Result<FieldPath, PathError> {
    path.parse(input).map_err(|e| PathError {
        input: input.to_owned(),
        offset: e.offset(),
    })
}

fn path(input: &mut &str) -> ModalResult<FieldPath> {
    separated(1.., segment, '.')
        .map(FieldPath::from_segments)
        .parse_next(input)
}

fn segment(input: &mut &str) -> ModalResult<Segment> {
    alt((index, key)).parse_next(input)
}

/// All-digit segments are list indices.
fn index(input: &mut &str) -> ModalResult<Segment> {
    take_while(1.., |c: char| c.is_ascii_digit())
        .try_map(str::parse::<usize>)
        .map(Segment::Index)
        .parse_next(input)
}

fn key(input: &mut &str) -> ModalResult<Segment> {
    (
        take_while(1.., |c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '_'),
    )
        .take()
        .map(|s: &str| Segment::Key(s.to_owned()))
        .parse_next(input)
}
