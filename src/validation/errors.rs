use std::sync::Arc;

use crate::core::error::{LinkSureError, Result};
use crate::resolver::ResourceResolver;

use super::result::ValidationResult;

/// The invalid results of a validation run, with reporting reducers.
///
/// Each error renders as one line:
/// `<resolvedUri>  [<statusCode>]  <message>  (from <sourceFile>:<sourceLine>)`
/// where the source location is resolved through the stream's
/// `ResourceResolver` and omitted when unknown.
pub struct ValidationErrorStream {
    results: Vec<ValidationResult>,
    resolver: Arc<dyn ResourceResolver>,
}

impl ValidationErrorStream {
    pub(crate) fn new(
        results: impl IntoIterator<Item = ValidationResult>,
        resolver: Arc<dyn ResourceResolver>,
    ) -> Self {
        Self {
            results: results
                .into_iter()
                .filter(ValidationResult::is_invalid)
                .collect(),
            resolver,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter()
    }

    pub fn to_list(&self) -> Vec<ValidationResult> {
        self.results.clone()
    }

    pub fn count(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// One formatted report line per error.
    pub fn lines(&self) -> Vec<String> {
        self.results.iter().map(|r| self.render(r)).collect()
    }

    /// Fail with an aggregate error if any link was invalid.
    pub fn assert_valid(&self) -> Result<()> {
        if self.results.is_empty() {
            return Ok(());
        }
        let mut report = format!("{} invalid link(s):", self.results.len());
        for line in self.lines() {
            report.push_str("\n  ");
            report.push_str(&line);
        }
        Err(LinkSureError::Validation(report))
    }

    fn render(&self, result: &ValidationResult) -> String {
        let mut line = format!(
            "{}  [{}]  {}",
            result.link().resolved_uri(),
            result.status(),
            result.message().unwrap_or_default()
        );
        if let Some(location) = self.resolver.source_location(result.link()) {
            line.push_str(&format!("  (from {location})"));
        }
        line
    }
}

impl IntoIterator for ValidationErrorStream {
    type Item = ValidationResult;
    type IntoIter = std::vec::IntoIter<ValidationResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}
