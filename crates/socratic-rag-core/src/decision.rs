//! Tolerant parsing of the meta-cognition step's answer.
//!
//! The model is asked for a single token, but real output often carries
//! punctuation, explanations, different casing, or hyphens and spaces in
//! place of the underscore. Detection is a substring match on the
//! normalized text; anything unrecognised counts as "cannot answer yet", which
//! biases the loop toward another retrieval cycle rather than an early stop.

use crate::models::Decision;
use crate::prompt::{CANNOT_ANSWER_TOKEN, CAN_ANSWER_TOKEN};

/// Markers meaning "more context needed". Checked first.
const NEGATIVE_MARKERS: &[&str] = &[CANNOT_ANSWER_TOKEN, "回答不可"];
/// Markers meaning "answer now".
const POSITIVE_MARKERS: &[&str] = &[CAN_ANSWER_TOKEN, "回答可能"];

/// Classify raw model output into a [`Decision`].
///
/// # Example
///
/// ```rust
/// use socratic_rag_core::decision::classify_decision;
/// use socratic_rag_core::models::Decision;
///
/// assert_eq!(classify_decision("CAN_ANSWER."), Decision::CanAnswer);
/// assert_eq!(classify_decision("cannot_answer"), Decision::CannotAnswer);
/// assert_eq!(classify_decision("can-answer"), Decision::CanAnswer);
/// assert_eq!(classify_decision("maybe?"), Decision::CannotAnswer);
/// ```
pub fn classify_decision(output: &str) -> Decision {
    let upper = normalize(output);

    if NEGATIVE_MARKERS.iter().any(|m| upper.contains(m)) {
        return Decision::CannotAnswer;
    }
    if POSITIVE_MARKERS.iter().any(|m| upper.contains(m)) {
        return Decision::CanAnswer;
    }
    Decision::CannotAnswer
}

/// Uppercase, with `-` and ASCII whitespace folded to `_`.
fn normalize(output: &str) -> String {
    output
        .chars()
        .map(|c| match c {
            '-' => '_',
            c if c.is_ascii_whitespace() => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}
