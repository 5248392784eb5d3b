//! Validation findings and the report produced by a validation pass

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a validation finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Response text was not parseable as the expected structure
    Format,
    /// A value has the wrong JSON shape (object where array expected, etc.)
    Shape,
    /// A required field is absent
    MissingField,
    /// A value is outside its allowed range
    OutOfRange,
    /// An unrecognized top-level field is present
    ExtraneousField,
    /// Two fields of the same entry contradict each other
    Inconsistent,
}

/// How serious a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Noted on the result but does not block validation
    Warning,
    /// Blocks the result from reaching validated status
    Error,
}

/// A single validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Category of the finding
    pub kind: IssueKind,
    /// Whether it blocks validation
    pub severity: Severity,
    /// Dotted path to the offending field (`specifications[2].confidence`)
    pub field: String,
    /// Human-readable description
    pub description: String,
}

impl Issue {
    /// A blocking finding
    pub fn error(kind: IssueKind, field: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            field: field.into(),
            description: description.into(),
        }
    }

    /// A non-blocking finding
    pub fn warning(
        kind: IssueKind,
        field: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            field: field.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.description)
    }
}

/// Outcome of one validation pass.
///
/// Produced fresh on every pass; only a summary survives into the
/// result metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// All findings, blocking and non-blocking
    pub issues: Vec<Issue>,
    /// Concrete edits the correction prompt should suggest
    pub suggested_fixes: Vec<String>,
}

impl ValidationReport {
    /// A report with no findings
    pub fn clean() -> Self {
        Self::default()
    }

    /// True when no blocking finding is present
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Blocking findings only
    pub fn errors(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    /// Non-blocking findings only
    pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    /// Record a finding, deriving a suggested fix where one is obvious
    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    /// Record a suggested fix for the correction prompt
    pub fn suggest(&mut self, fix: impl Into<String>) {
        self.suggested_fixes.push(fix.into());
    }

    /// One line per blocking finding, for error lists and logs
    pub fn error_lines(&self) -> Vec<String> {
        self.errors().map(|i| i.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_validity_ignores_warnings() {
        let mut report = ValidationReport::clean();
        assert!(report.is_valid());

        report.push(Issue::warning(
            IssueKind::ExtraneousField,
            "vendor_notes",
            "unrecognized top-level field",
        ));
        assert!(report.is_valid());

        report.push(Issue::error(
            IssueKind::MissingField,
            "relations[0].related_product",
            "required field is missing",
        ));
        assert!(!report.is_valid());
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_error_lines_format() {
        let mut report = ValidationReport::clean();
        report.push(Issue::error(
            IssueKind::OutOfRange,
            "faq[1].confidence",
            "confidence 1.4 is outside [0, 1]",
        ));
        assert_eq!(
            report.error_lines(),
            vec!["faq[1].confidence: confidence 1.4 is outside [0, 1]"]
        );
    }
}
