//! Response extraction: recovers scores, assessment and suggestions from
//! free-text model output.
//!
//! Every function here is total. Malformed or partial model text degrades to
//! empty fields, never to an error, and the three fields are recovered
//! independently of one another.
//!
//! The pipeline is explicit so each stage can be tested on its own:
//! locate marker → slice → split → trim/filter, plus score-block location and
//! decoding.

use std::collections::BTreeMap;
use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompts::{ASSESSMENT_MARKER, SUGGESTIONS_MARKER};

/// Segments with this many characters or fewer are not suggestions.
pub const MIN_SUGGESTION_EXCLUSIVE: usize = 3;

/// Inclusive bounds for a single score value.
pub const SCORE_RANGE: std::ops::RangeInclusive<i64> = 1..=5;

/// Shortest `{ ... }` span. Nesting is deliberately not tracked.
static SCORE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

/// Numbered-list item boundary: `1. `, `12.\n`, ...
static ITEM_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+\.\s+").unwrap());

static ASSESSMENT_RE: Lazy<Regex> = Lazy::new(|| marker_regex(ASSESSMENT_MARKER));
static SUGGESTIONS_RE: Lazy<Regex> = Lazy::new(|| marker_regex(SUGGESTIONS_MARKER));

/// ASCII-only case folding, so `ſ` does not match `s`.
fn marker_regex(marker: &str) -> Regex {
    Regex::new(&format!("(?i-u){}", regex::escape(marker))).unwrap()
}

/// Section anchors recognised in model output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Assessment,
    Suggestions,
}

impl Marker {
    fn regex(self) -> &'static Regex {
        match self {
            Marker::Assessment => &*ASSESSMENT_RE,
            Marker::Suggestions => &*SUGGESTIONS_RE,
        }
    }
}

/// Known score dimensions. Other keys found in the score block are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreName {
    Stress,
    Anxiety,
    SleepQuality,
    EmotionalWellBeing,
}

impl ScoreName {
    pub fn as_str(self) -> &'static str {
        match self {
            ScoreName::Stress => "stress",
            ScoreName::Anxiety => "anxiety",
            ScoreName::SleepQuality => "sleepQuality",
            ScoreName::EmotionalWellBeing => "emotionalWellBeing",
        }
    }
}

/// Score name to value in [1,5]. Absent keys are never filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreMap(BTreeMap<String, u8>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<u8> {
        self.0.get(name).copied()
    }

    pub fn score(&self, name: ScoreName) -> Option<u8> {
        self.get(name.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, u8)> for ScoreMap {
    fn from_iter<I: IntoIterator<Item = (String, u8)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Unparsed model output. Produced once per request and consumed by extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelText(String);

impl RawModelText {
    /// Arbitrary bytes are accepted; invalid UTF-8 is replaced, not rejected.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn extract(self) -> ExtractionResult {
        extract_all(&self.0)
    }
}

impl From<String> for RawModelText {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for RawModelText {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

/// Everything recoverable from one model response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub scores: ScoreMap,
    pub assessment: String,
    pub suggestions: Vec<String>,
}

/// Run all three extractions independently over `text`.
pub fn extract_all(text: &str) -> ExtractionResult {
    let result = ExtractionResult {
        scores: extract_scores(text),
        assessment: extract_assessment(text),
        suggestions: extract_suggestions(text),
    };
    tracing::debug!(
        scores = result.scores.len(),
        assessment_chars = result.assessment.chars().count(),
        suggestions = result.suggestions.len(),
        "extracted model response"
    );
    result
}

/// Decode the first brace-delimited block as a score map.
///
/// Only the first `{ ... }` span is considered, even if a later block would
/// decode. A block that is not a JSON object of integer scores in [1,5]
/// yields an empty map rather than a partial one.
pub fn extract_scores(text: &str) -> ScoreMap {
    let Some(block) = locate_score_block(text) else {
        tracing::debug!("no score block found");
        return ScoreMap::new();
    };
    decode_scores(block).unwrap_or_else(|| {
        tracing::debug!("score block did not decode: {}", truncate_for_log(block));
        ScoreMap::new()
    })
}

/// Prose between `Assessment:` and the next `Suggestions:` (or end of text).
pub fn extract_assessment(text: &str) -> String {
    match slice_between(text, Marker::Assessment, Marker::Suggestions) {
        Some(section) => section.trim().to_string(),
        None => {
            tracing::debug!("assessment marker absent");
            String::new()
        }
    }
}

/// Numbered items after `Suggestions:`, or across the whole text when the
/// marker is absent. Any count is accepted.
pub fn extract_suggestions(text: &str) -> Vec<String> {
    let section = slice_after(text, Marker::Suggestions).unwrap_or_else(|| {
        tracing::debug!("suggestions marker absent, splitting whole text");
        text
    });
    filter_short(split_numbered(section))
}

/// Byte range of the first case-insensitive occurrence of `marker` at or after `from`.
pub fn locate_marker(text: &str, marker: Marker, from: usize) -> Option<Range<usize>> {
    if from > text.len() || !text.is_char_boundary(from) {
        return None;
    }
    marker.regex().find_at(text, from).map(|m| m.range())
}

/// Everything after the first occurrence of `marker`.
pub fn slice_after(text: &str, marker: Marker) -> Option<&str> {
    locate_marker(text, marker, 0).map(|found| &text[found.end..])
}

/// Text after `open`, up to the first `close` that follows it or the end of text.
pub fn slice_between(text: &str, open: Marker, close: Marker) -> Option<&str> {
    let start = locate_marker(text, open, 0)?.end;
    let end = locate_marker(text, close, start).map_or(text.len(), |found| found.start);
    Some(&text[start..end])
}

/// Split on numbered-list boundaries and trim every segment.
pub fn split_numbered(section: &str) -> Vec<&str> {
    ITEM_BOUNDARY_RE.split(section).map(str::trim).collect()
}

/// Drop segments of [`MIN_SUGGESTION_EXCLUSIVE`] characters or fewer, keeping order.
pub fn filter_short<'a>(segments: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    segments
        .into_iter()
        .map(str::trim)
        .filter(|s| s.chars().count() > MIN_SUGGESTION_EXCLUSIVE)
        .map(str::to_string)
        .collect()
}

/// The shortest `{ ... }` span starting at the first `{`.
pub fn locate_score_block(text: &str) -> Option<&str> {
    SCORE_BLOCK_RE.find(text).map(|m| m.as_str())
}

/// Decode a score block, all-or-nothing.
pub fn decode_scores(block: &str) -> Option<ScoreMap> {
    let object: BTreeMap<String, Value> = serde_json::from_str(block).ok()?;
    object
        .into_iter()
        .map(|(name, value)| score_value(&value).map(|score| (name, score)))
        .collect()
}

fn score_value(value: &Value) -> Option<u8> {
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))?,
        _ => return None,
    };
    if SCORE_RANGE.contains(&n) {
        u8::try_from(n).ok()
    } else {
        None
    }
}

fn truncate_for_log(input: &str) -> String {
    const MAX: usize = 120;
    let mut out: String = input.chars().take(MAX).collect();
    if input.chars().count() > MAX {
        out.push_str("...");
    }
    out
}
