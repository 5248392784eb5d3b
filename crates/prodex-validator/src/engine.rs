//! Structural validation of extraction payloads and the bounded
//! correction loop against the LLM service.

use crate::report::{Issue, IssueKind, ValidationReport};
use prodex_domain::{InvokeOptions, LlmError, LlmService, ProductResult};
use serde_json::Value;
use tracing::{debug, warn};

/// Section keys an extraction payload may carry at the top level
const SECTIONS: [&str; 4] = ["relations", "specifications", "data_tables", "faq"];

/// Required fields per entry of each section
const REQUIRED_FIELDS: [(&str, &[&str]); 4] = [
    ("relations", &["relation_type", "related_product"]),
    ("specifications", &["category", "name", "raw_value"]),
    ("data_tables", &["title", "headers", "rows"]),
    ("faq", &["question", "answer"]),
];

/// Tolerance when comparing a specification's `value` against the
/// number parsed from its `raw_value`
const VALUE_EPSILON: f64 = 1e-6;

/// Configuration for the validation engine
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Upper bound on correction round-trips per result
    pub max_correction_attempts: u32,
    /// Sampling temperature for correction calls; low on purpose
    pub correction_temperature: f32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_correction_attempts: 3,
            correction_temperature: 0.1,
        }
    }
}

/// Result of the correction loop
#[derive(Debug)]
pub struct CorrectionOutcome {
    /// The validated payload, or `None` if the attempt budget ran out
    pub payload: Option<Value>,
    /// Correction round-trips actually issued
    pub attempts: u32,
    /// The last validation pass's findings
    pub report: ValidationReport,
    /// Set if a correction call itself failed at the LLM layer
    pub llm_error: Option<LlmError>,
}

impl CorrectionOutcome {
    /// True when a validated payload was produced
    pub fn is_valid(&self) -> bool {
        self.payload.is_some()
    }
}

/// Validates extraction payloads and drives correction round-trips
#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    config: ValidatorConfig,
}

impl ValidationEngine {
    /// Create an engine with the given configuration
    pub fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validate a parsed extraction payload.
    ///
    /// Checks run in order: overall shape, required fields, confidence
    /// ranges, extraneous top-level fields, raw/parsed value
    /// consistency. All findings are collected in one pass so the
    /// correction prompt can address everything at once.
    pub fn validate(&self, payload: &Value) -> ValidationReport {
        let mut report = ValidationReport::clean();

        let root = match payload.as_object() {
            Some(root) => root,
            None => {
                report.push(Issue::error(
                    IssueKind::Shape,
                    "$",
                    "payload must be a JSON object",
                ));
                report.suggest("return a single JSON object with the expected sections");
                return report;
            }
        };

        for section in SECTIONS {
            match root.get(section) {
                None => {
                    report.push(Issue::error(
                        IssueKind::MissingField,
                        section,
                        "required section is missing",
                    ));
                    report.suggest(format!("add \"{}\" as an array (empty if nothing found)", section));
                }
                Some(Value::Array(entries)) => {
                    self.check_entries(section, entries, &mut report);
                }
                Some(other) => {
                    report.push(Issue::error(
                        IssueKind::Shape,
                        section,
                        format!("expected an array, found {}", json_type_name(other)),
                    ));
                }
            }
        }

        for key in root.keys() {
            if !SECTIONS.contains(&key.as_str()) {
                report.push(Issue::error(
                    IssueKind::ExtraneousField,
                    key.clone(),
                    "unrecognized top-level field",
                ));
                report.suggest(format!("remove the \"{}\" field", key));
            }
        }

        report
    }

    /// Validate a merged product result before it can become validated.
    ///
    /// The typed counterpart of payload validation: confidence ranges,
    /// identity fields, and raw/parsed value consistency.
    pub fn validate_product(&self, result: &ProductResult) -> ValidationReport {
        let mut report = ValidationReport::clean();

        for (i, rel) in result.relations.iter().enumerate() {
            let path = format!("relations[{}]", i);
            if rel.relation_type.trim().is_empty() {
                report.push(Issue::error(
                    IssueKind::MissingField,
                    format!("{}.relation_type", path),
                    "relation type is empty",
                ));
            }
            if rel.related_product.trim().is_empty() {
                report.push(Issue::error(
                    IssueKind::MissingField,
                    format!("{}.related_product", path),
                    "related product is empty",
                ));
            }
            check_confidence(rel.confidence, &path, &mut report);
        }

        for (i, spec) in result.specifications.iter().enumerate() {
            let path = format!("specifications[{}]", i);
            if spec.name.trim().is_empty() {
                report.push(Issue::error(
                    IssueKind::MissingField,
                    format!("{}.name", path),
                    "specification name is empty",
                ));
            }
            check_confidence(spec.confidence, &path, &mut report);
            if let Some(value) = spec.value {
                match parse_leading_number(&spec.raw_value) {
                    Some(parsed) if (parsed - value).abs() <= VALUE_EPSILON => {}
                    Some(parsed) => {
                        report.push(Issue::error(
                            IssueKind::Inconsistent,
                            format!("{}.value", path),
                            format!(
                                "parsed value {} does not match raw value's number {}",
                                value, parsed
                            ),
                        ));
                    }
                    None => {
                        report.push(Issue::error(
                            IssueKind::Inconsistent,
                            format!("{}.value", path),
                            format!("raw value {:?} contains no parseable number", spec.raw_value),
                        ));
                    }
                }
            }
        }

        for (i, table) in result.data_tables.iter().enumerate() {
            let path = format!("data_tables[{}]", i);
            check_confidence(table.confidence, &path, &mut report);
            let width = table.headers.len();
            for (r, row) in table.rows.iter().enumerate() {
                if row.len() != width {
                    report.push(Issue::error(
                        IssueKind::Inconsistent,
                        format!("{}.rows[{}]", path, r),
                        format!("row has {} cells, headers define {}", row.len(), width),
                    ));
                }
            }
        }

        for (i, entry) in result.faq.iter().enumerate() {
            let path = format!("faq[{}]", i);
            if entry.question.trim().is_empty() {
                report.push(Issue::error(
                    IssueKind::MissingField,
                    format!("{}.question", path),
                    "question is empty",
                ));
            }
            check_confidence(entry.confidence, &path, &mut report);
        }

        report
    }

    /// Build the follow-up prompt asking the model to fix its response
    pub fn correction_prompt(&self, original_response: &str, report: &ValidationReport) -> String {
        let mut prompt = String::from(
            "Your previous response failed validation. Fix the problems listed \
             below and return ONLY the corrected JSON object, with no \
             commentary and no markdown fences.\n\nProblems:\n",
        );
        for issue in report.errors() {
            prompt.push_str(&format!("- {}\n", issue));
        }
        if !report.suggested_fixes.is_empty() {
            prompt.push_str("\nSuggested fixes:\n");
            for fix in &report.suggested_fixes {
                prompt.push_str(&format!("- {}\n", fix));
            }
        }
        prompt.push_str("\nPrevious response:\n");
        prompt.push_str(original_response);
        prompt
    }

    /// Parse and validate a raw response, issuing bounded correction
    /// round-trips on failure.
    ///
    /// `parse` turns raw text into an extraction payload; its error
    /// message becomes a format finding. Never issues more than
    /// `max_correction_attempts` correction calls.
    pub async fn ensure_valid<P>(
        &self,
        llm: &dyn LlmService,
        raw: &str,
        parse: P,
    ) -> CorrectionOutcome
    where
        P: Fn(&str) -> Result<Value, String>,
    {
        let options = InvokeOptions {
            temperature: Some(self.config.correction_temperature),
            ..Default::default()
        };
        let mut current = raw.to_string();
        let mut attempts = 0u32;

        loop {
            let (payload, report) = match parse(&current) {
                Ok(value) => {
                    let report = self.validate(&value);
                    (Some(value), report)
                }
                Err(msg) => {
                    let mut report = ValidationReport::clean();
                    report.push(Issue::error(IssueKind::Format, "$", msg));
                    report.suggest("return a single well-formed JSON object");
                    (None, report)
                }
            };

            if report.is_valid() {
                if let Some(value) = payload {
                    if attempts > 0 {
                        debug!(attempts, "response corrected successfully");
                    }
                    return CorrectionOutcome {
                        payload: Some(value),
                        attempts,
                        report,
                        llm_error: None,
                    };
                }
            }

            if attempts >= self.config.max_correction_attempts {
                warn!(
                    attempts,
                    errors = report.errors().count(),
                    "correction attempts exhausted"
                );
                return CorrectionOutcome {
                    payload: None,
                    attempts,
                    report,
                    llm_error: None,
                };
            }

            attempts += 1;
            debug!(attempt = attempts, "requesting correction");
            let prompt = self.correction_prompt(&current, &report);
            match llm.invoke(&prompt, &options).await {
                Ok(text) => current = text,
                Err(e) => {
                    warn!(error = %e, "correction call failed");
                    return CorrectionOutcome {
                        payload: None,
                        attempts,
                        report,
                        llm_error: Some(e),
                    };
                }
            }
        }
    }

    fn check_entries(&self, section: &str, entries: &[Value], report: &mut ValidationReport) {
        let required: &[&str] = REQUIRED_FIELDS
            .iter()
            .find(|(name, _)| *name == section)
            .map(|(_, fields)| *fields)
            .unwrap_or(&[]);

        for (i, entry) in entries.iter().enumerate() {
            let path = format!("{}[{}]", section, i);
            let obj = match entry.as_object() {
                Some(obj) => obj,
                None => {
                    report.push(Issue::error(
                        IssueKind::Shape,
                        path,
                        format!("expected an object, found {}", json_type_name(entry)),
                    ));
                    continue;
                }
            };

            for field in required {
                if !obj.contains_key(*field) {
                    report.push(Issue::error(
                        IssueKind::MissingField,
                        format!("{}.{}", path, field),
                        "required field is missing",
                    ));
                }
            }

            match obj.get("confidence") {
                Some(Value::Number(n)) => {
                    if let Some(c) = n.as_f64() {
                        if !(0.0..=1.0).contains(&c) {
                            report.push(Issue::error(
                                IssueKind::OutOfRange,
                                format!("{}.confidence", path),
                                format!("confidence {} is outside [0, 1]", c),
                            ));
                        }
                    }
                }
                Some(other) => {
                    report.push(Issue::error(
                        IssueKind::Shape,
                        format!("{}.confidence", path),
                        format!("expected a number, found {}", json_type_name(other)),
                    ));
                }
                None => {
                    report.push(Issue::error(
                        IssueKind::MissingField,
                        format!("{}.confidence", path),
                        "required field is missing",
                    ));
                }
            }

            // Specification values must agree with their raw text
            if section == "specifications" {
                if let (Some(value), Some(raw)) = (
                    obj.get("value").and_then(Value::as_f64),
                    obj.get("raw_value").and_then(Value::as_str),
                ) {
                    match parse_leading_number(raw) {
                        Some(parsed) if (parsed - value).abs() <= VALUE_EPSILON => {}
                        Some(parsed) => {
                            report.push(Issue::error(
                                IssueKind::Inconsistent,
                                format!("{}.value", path),
                                format!(
                                    "parsed value {} does not match raw value's number {}",
                                    value, parsed
                                ),
                            ));
                        }
                        None => {
                            report.push(Issue::error(
                                IssueKind::Inconsistent,
                                format!("{}.value", path),
                                format!("raw value {:?} contains no parseable number", raw),
                            ));
                        }
                    }
                }
            }
        }
    }
}

fn check_confidence(confidence: f64, path: &str, report: &mut ValidationReport) {
    if !(0.0..=1.0).contains(&confidence) {
        report.push(Issue::error(
            IssueKind::OutOfRange,
            format!("{}.confidence", path),
            format!("confidence {} is outside [0, 1]", confidence),
        ));
    }
}

/// First number appearing in a raw value string ("2.4 GHz" -> 2.4)
fn parse_leading_number(raw: &str) -> Option<f64> {
    let start = raw.find(|c: char| c.is_ascii_digit() || c == '-' || c == '+')?;
    let tail = &raw[start..];
    let end = tail
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))
        })
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    tail[..end].parse().ok()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
