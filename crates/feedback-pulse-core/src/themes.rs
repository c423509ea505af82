//! Theme label codec.
//!
//! The store persists themes as one flat comma-joined string. Everywhere
//! else the labels travel as a [`Themes`] list, so the encode/decode rules
//! live here and nowhere else:
//!
//! - **decode**: split on `,`, trim each label, drop empty labels;
//! - **encode**: join with `,` (no padding), preserving label order.
//!
//! An empty label list is never represented: constructors return `None`.

use serde::{Serialize, Serializer};

/// Separator used by the persisted representation.
pub const SEPARATOR: char = ',';

/// An ordered, non-empty list of trimmed, non-empty theme labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Themes(Vec<String>);

impl Themes {
    /// Decode the persisted comma-joined form.
    pub fn parse(raw: &str) -> Option<Themes> {
        Self::from_labels(raw.split(SEPARATOR))
    }

    /// Build from individual labels, trimming and dropping empties.
    pub fn from_labels<I, S>(labels: I) -> Option<Themes>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            None
        } else {
            Some(Themes(labels))
        }
    }

    /// Encode to the persisted comma-joined form.
    pub fn join(&self) -> String {
        self.0.join(&SEPARATOR.to_string())
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Iterate the labels of a persisted value without allocating a [`Themes`].
pub fn split_labels(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(SEPARATOR).map(str::trim).filter(|l| !l.is_empty())
}

/// Records carry themes in their persisted (joined) form.
impl Serialize for Themes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.join())
    }
}

/// Analysis payloads carry themes as a JSON array.
pub fn serialize_as_list<S: Serializer>(
    themes: &Option<Themes>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match themes {
        Some(t) => t.0.serialize(serializer),
        None => serializer.serialize_none(),
    }
}
