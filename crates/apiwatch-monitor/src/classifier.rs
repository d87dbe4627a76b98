//! Outcome classification of probe results.

use regex::Regex;
use serde::Serialize;

use crate::error::{MonitorError, MonitorResult};
use crate::registry::{ProbeError, ProbeResult};

/// Classified outcome of one probe execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The probe returned no error.
    Success,
    /// The probe failed with a known, expected error signature.
    Warning,
    /// The probe failed with an unrecognised error.
    Failure,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Warning => write!(f, "warning"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// Decides whether a probe result counts against reliability.
pub trait Classifier: Send + Sync {
    fn classify(&self, result: &ProbeResult) -> Outcome;
}

/// Render an error the way classifiers and reports see it, including
/// every layer of context.
pub fn render_error(error: &ProbeError) -> String {
    format!("{error:#}")
}

/// Matches rendered error text against an ordered list of regular
/// expressions. The first match makes the result a warning.
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    patterns: Vec<Regex>,
}

impl PatternClassifier {
    pub fn new<I, S>(patterns: I) -> MonitorResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let pattern = p.as_ref();
                Regex::new(pattern).map_err(|source| MonitorError::Pattern {
                    pattern: pattern.to_string(),
                    source,
                })
            })
            .collect::<MonitorResult<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// The first pattern matching `text`, if any.
    pub fn matching_pattern(&self, text: &str) -> Option<&Regex> {
        self.patterns.iter().find(|p| p.is_match(text))
    }
}

impl Classifier for PatternClassifier {
    fn classify(&self, result: &ProbeResult) -> Outcome {
        match result {
            Ok(()) => Outcome::Success,
            Err(error) => {
                if self.matching_pattern(&render_error(error)).is_some() {
                    Outcome::Warning
                } else {
                    Outcome::Failure
                }
            }
        }
    }
}
