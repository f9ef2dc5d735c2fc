use std::fmt;
use std::str::FromStr;

use crate::parse::{self, PathError};

/// One step of a [`FieldPath`]: a map key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

/// A dot-addressable path into form state.
///
/// Supports nested keys and list indices, e.g.
/// `responsibles.applicators.0.userId`. Parsed once at catalog compile time;
/// evaluation works on the parsed form only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a dotted path string.
    ///
    /// Keys are identifiers (`[A-Za-z_][A-Za-z0-9_]*`); all-digit segments
    /// are list indices.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if the input is not a valid path.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        parse::parse_path(input)
    }

    pub(crate) fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{k}"),
            Segment::Index(i) => write!(f, "{i}"),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
