//! Prompt templates for the wellbeing assistant.
//!
//! The section headers below are a machine-parsable contract: the response
//! extractor anchors on the same constants, so the grammar requested from the
//! model and the grammar parsed back out of it cannot drift apart.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Header introducing the JSON score block in the full-report grammar
pub const SCORES_MARKER: &str = "Scores (JSON only):";
/// Header introducing the prose assessment
pub const ASSESSMENT_MARKER: &str = "Assessment:";
/// Header introducing the numbered suggestion list
pub const SUGGESTIONS_MARKER: &str = "Suggestions:";

/// Score dimensions requested in the full-report grammar, in prompt order
pub const SCORE_FIELDS: [&str; 4] = ["stress", "anxiety", "sleepQuality", "emotionalWellBeing"];

/// Number of suggestions the model is asked for. The extractor accepts any count.
pub const REQUESTED_SUGGESTIONS: usize = 5;

const PERSONA: &str = "You are a caring mental health assistant.";

/// User-reported attributes, passed through to the prompt verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputRecord(Value);

impl InputRecord {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// `null`, `false`, `0` and `""` count as not supplied.
    pub fn is_missing(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) => false,
        }
    }

    /// Pretty-printed JSON with two-space indentation
    pub fn render(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| self.0.to_string())
    }
}

impl From<Value> for InputRecord {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Numbered suggestions only, framed by an upstream risk prediction
    Suggestions,
    /// Scores, assessment and suggestions in the sectioned grammar
    FullReport,
}

#[derive(Debug, Error, PartialEq)]
pub enum PromptError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Render the prompt for `kind`.
///
/// `risk_level` and `probability` are required for [`PromptKind::Suggestions`]
/// and ignored for [`PromptKind::FullReport`].
pub fn build(
    kind: PromptKind,
    input: Option<&InputRecord>,
    risk_level: Option<&str>,
    probability: Option<f64>,
) -> Result<String, PromptError> {
    let input = input
        .filter(|record| !record.is_missing())
        .ok_or(PromptError::MissingField("userInputs"))?;

    match kind {
        PromptKind::Suggestions => {
            let risk_level = risk_level
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or(PromptError::MissingField("riskLevel"))?;
            let probability = probability.ok_or(PromptError::MissingField("probability"))?;
            suggestions_prompt(input, risk_level, probability)
        }
        PromptKind::FullReport => Ok(report_prompt(input)),
    }
}

/// Prompt asking for exactly five numbered suggestions.
pub fn suggestions_prompt(
    input: &InputRecord,
    risk_level: &str,
    probability: f64,
) -> Result<String, PromptError> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(PromptError::InvalidField {
            field: "probability",
            reason: format!("expected a value in [0, 1], got {}", probability),
        });
    }

    Ok(format!(
        "\n{PERSONA}\n\n\
         User input summary:\n{input}\n\n\
         The ML model predicted a {risk_level} risk of depression\n\
         with a probability of {percent}%.\n\n\
         Provide EXACTLY {REQUESTED_SUGGESTIONS} practical, empathetic, actionable suggestions.\n\
         Use numbered points.\n",
        input = input.render(),
        percent = format_percent(probability),
    ))
}

/// Prompt asking for the full sectioned report.
pub fn report_prompt(input: &InputRecord) -> String {
    let score_lines = SCORE_FIELDS
        .iter()
        .map(|field| format!("  \"{field}\": 1-5"))
        .collect::<Vec<_>>()
        .join(",\n");
    let numbered = (1..=REQUESTED_SUGGESTIONS)
        .map(|n| format!("{n}. ..."))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\n{PERSONA}\n\n\
         User input summary:\n{input}\n\n\
         Respond in EXACT format.\n\n\
         {SCORES_MARKER}\n{{\n{score_lines}\n}}\n\n\
         {ASSESSMENT_MARKER}\nShort empathetic assessment.\n\n\
         {SUGGESTIONS_MARKER}\n{numbered}\n",
        input = input.render(),
    )
}

/// Probability in [0,1] as a percentage with one decimal place
fn format_percent(probability: f64) -> String {
    format!("{:.1}", probability * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> InputRecord {
        InputRecord::new(json!({"sleepHours": 5, "mood": "low"}))
    }

    #[test]
    fn suggestions_prompt_embeds_rounded_percentage() {
        let prompt = build(PromptKind::Suggestions, Some(&record()), Some("high"), Some(0.734))
            .unwrap();
        assert!(prompt.contains("predicted a high risk of depression"));
        assert!(prompt.contains("probability of 73.4%"));
        assert!(prompt.contains("EXACTLY 5"));
        assert!(!prompt.contains(SUGGESTIONS_MARKER));
    }

    #[test]
    fn suggestions_prompt_requires_every_field() {
        let r = record();
        assert_eq!(
            build(PromptKind::Suggestions, None, Some("low"), Some(0.1)),
            Err(PromptError::MissingField("userInputs"))
        );
        assert_eq!(
            build(PromptKind::Suggestions, Some(&r), None, Some(0.1)),
            Err(PromptError::MissingField("riskLevel"))
        );
        assert_eq!(
            build(PromptKind::Suggestions, Some(&r), Some("  "), Some(0.1)),
            Err(PromptError::MissingField("riskLevel"))
        );
        assert_eq!(
            build(PromptKind::Suggestions, Some(&r), Some("low"), None),
            Err(PromptError::MissingField("probability"))
        );
    }

    #[test]
    fn zero_probability_is_present_not_missing() {
        let prompt = build(PromptKind::Suggestions, Some(&record()), Some("low"), Some(0.0))
            .unwrap();
        assert!(prompt.contains("probability of 0.0%"));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let err = suggestions_prompt(&record(), "low", 1.5).unwrap_err();
        assert!(matches!(err, PromptError::InvalidField { field: "probability", .. }));
        assert!(suggestions_prompt(&record(), "low", f64::NAN).is_err());
    }

    #[test]
    fn report_prompt_carries_the_grammar() {
        let prompt = build(PromptKind::FullReport, Some(&record()), None, None).unwrap();
        let scores = prompt.find(SCORES_MARKER).unwrap();
        let assessment = prompt.find(ASSESSMENT_MARKER).unwrap();
        let suggestions = prompt.find(SUGGESTIONS_MARKER).unwrap();
        assert!(scores < assessment && assessment < suggestions);
        for field in SCORE_FIELDS {
            assert!(prompt.contains(&format!("\"{field}\": 1-5")));
        }
        assert!(prompt.contains("1. ...\n2. ...\n3. ...\n4. ...\n5. ..."));
    }

    #[test]
    fn input_record_is_pretty_printed() {
        let prompt = report_prompt(&record());
        assert!(prompt.contains("{\n  \"mood\": \"low\",\n  \"sleepHours\": 5\n}"));
    }

    #[test]
    fn falsy_input_record_is_missing() {
        for value in [Value::Null, json!(false), json!(0), json!(0.0), json!("")] {
            let record = InputRecord::new(value);
            assert_eq!(
                build(PromptKind::FullReport, Some(&record), None, None),
                Err(PromptError::MissingField("userInputs"))
            );
        }
    }

    #[test]
    fn empty_containers_and_scalars_are_supplied() {
        for value in [json!({}), json!([]), json!("low mood"), json!(3), json!(true)] {
            assert!(!InputRecord::new(value).is_missing());
        }
    }
}
