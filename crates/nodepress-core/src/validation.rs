//! Field-level validation shared by every document model.
//!
//! Validators check every field and collect one message per failing field;
//! nothing short-circuits. Lengths are counted in characters after trimming.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// A map of field name to the first validation message recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    /// Create an empty error map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. Later messages for the same field are
    /// ignored.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_insert_with(|| message.into());
    }

    /// Whether no field failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The message recorded for `field`, if any.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Names of the failing fields, sorted.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if at least one field failed.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Require a non-empty trimmed string of at most `max` characters.
    pub(crate) fn require_text(&mut self, field: &str, value: &str, max: usize) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.add(field, format!("{field} is required"));
        } else {
            self.check_max(field, trimmed, max);
        }
    }

    /// Check an optional string against a maximum trimmed length.
    pub(crate) fn optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(value) = value {
            self.check_max(field, value.trim(), max);
        }
    }

    /// Check that every entry of a string list is 1..=`max` characters after trimming.
    pub(crate) fn text_list(&mut self, field: &str, values: &[String], max: usize) {
        let ok = values.iter().all(|v| {
            let len = v.trim().chars().count();
            len > 0 && len <= max
        });
        if !ok {
            self.add(field, format!("{field} should be between 1 and {max} characters long"));
        }
    }

    fn check_max(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("{field} must be at most {max} characters"));
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Trim a string, mapping an empty result to `None`.
pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_every_failing_field() {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", "   ", 50);
        errors.optional_text("url", Some(&"u".repeat(251)), 250);
        errors.text_list("tags", &["ok".to_owned(), " ".to_owned()], 50);

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["tags", "title", "url"]);
    }

    #[test]
    fn first_message_wins() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "first");
        errors.add("title", "second");
        assert_eq!(errors.get("title"), Some("first"));
    }

    #[test]
    fn length_counts_characters_after_trim() {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &format!("  {}  ", "é".repeat(50)), 50);
        assert!(errors.is_empty());
    }

    #[test]
    fn display_joins_fields() {
        let mut errors = ValidationErrors::new();
        errors.add("b", "bad b");
        errors.add("a", "bad a");
        assert_eq!(errors.to_string(), "a: bad a; b: bad b");
    }
}
