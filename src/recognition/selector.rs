use crate::engine::Recognition;
use crate::error::OcrError;
use crate::profile::OcrProfile;

use super::OcrAttemptResult;

/// The attempt chosen for a page
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub profile_index: usize,
    pub profile: OcrProfile,
    pub text: String,
    pub confidence: f32,
}

/// Score an engine result on a 0-100 scale.
///
/// With token scores this is the mean over tokens scoring above
/// `min_token_confidence`, so one confident word cannot hide many doubtful
/// ones. Otherwise the engine's page-level score is used.
pub fn score(recognition: &Recognition, min_token_confidence: f32) -> f32 {
    let kept: Vec<f32> = recognition
        .tokens
        .iter()
        .map(|t| t.confidence)
        .filter(|c| c.is_finite() && *c > min_token_confidence)
        .collect();

    let raw = if !kept.is_empty() {
        kept.iter().sum::<f32>() / kept.len() as f32
    } else if recognition.tokens.is_empty() {
        recognition.mean_confidence.unwrap_or(0.0)
    } else {
        0.0
    };

    if raw.is_finite() {
        raw.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Pick the successful attempt with the highest confidence.
///
/// Equal confidences go to the lowest profile index, independent of the
/// order the attempts are listed in. Fails with `AllAttemptsFailed` when no
/// attempt succeeded.
pub fn select(attempts: &[OcrAttemptResult]) -> Result<Selection, OcrError> {
    best_of(attempts.iter().filter(|a| a.succeeded()))
        .map(to_selection)
        .ok_or(OcrError::AllAttemptsFailed {
            attempts: attempts.len(),
        })
}

/// Highest-confidence failed attempt that still produced text
pub fn best_partial(attempts: &[OcrAttemptResult]) -> Option<Selection> {
    best_of(
        attempts
            .iter()
            .filter(|a| !a.succeeded() && !a.text.trim().is_empty()),
    )
    .map(to_selection)
}

fn best_of<'a>(
    attempts: impl Iterator<Item = &'a OcrAttemptResult>,
) -> Option<&'a OcrAttemptResult> {
    attempts.min_by(|a, b| {
        sortable(b.confidence)
            .total_cmp(&sortable(a.confidence))
            .then(a.profile_index.cmp(&b.profile_index))
    })
}

fn sortable(confidence: f32) -> f32 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence
    }
}

fn to_selection(attempt: &OcrAttemptResult) -> Selection {
    Selection {
        profile_index: attempt.profile_index,
        profile: attempt.profile.clone(),
        text: attempt.text.clone(),
        confidence: sortable(attempt.confidence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Token;
    use crate::profile::{default_profiles, OcrProfile};
    use crate::recognition::AttemptOutcome;

    fn attempt(index: usize, confidence: f32, ok: bool) -> OcrAttemptResult {
        OcrAttemptResult {
            profile_index: index,
            profile: default_profiles("eng")[index % 5].clone(),
            text: format!("text {}", index),
            confidence,
            outcome: if ok {
                AttemptOutcome::Success
            } else {
                AttemptOutcome::Failed("OCR_ATTEMPT_FAILED: boom".to_string())
            },
        }
    }

    fn token(text: &str, confidence: f32) -> Token {
        Token {
            text: text.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_select_picks_highest_confidence() {
        let attempts = vec![attempt(0, 40.0, true), attempt(1, 91.5, true), attempt(2, 60.0, true)];
        let chosen = select(&attempts).unwrap();
        assert_eq!(chosen.profile_index, 1);
        assert_eq!(chosen.confidence, 91.5);
    }

    #[test]
    fn test_select_breaks_ties_by_profile_order() {
        let attempts = vec![attempt(3, 80.0, true), attempt(1, 80.0, true), attempt(2, 80.0, true)];
        assert_eq!(select(&attempts).unwrap().profile_index, 1);
    }

    #[test]
    fn test_select_ignores_failed_attempts() {
        let attempts = vec![attempt(0, 99.0, false), attempt(1, 10.0, true)];
        assert_eq!(select(&attempts).unwrap().profile_index, 1);
    }

    #[test]
    fn test_select_fails_when_every_attempt_failed() {
        let attempts = vec![attempt(0, 50.0, false), attempt(1, 70.0, false)];
        let err = select(&attempts).unwrap_err();
        assert_eq!(err.code(), "ALL_ATTEMPTS_FAILED");
    }

    #[test]
    fn test_nan_confidence_ranks_as_zero() {
        let attempts = vec![attempt(0, f32::NAN, true), attempt(1, 0.5, true)];
        assert_eq!(select(&attempts).unwrap().profile_index, 1);
    }

    #[test]
    fn test_best_partial_prefers_confident_text() {
        let mut empty = attempt(0, 90.0, false);
        empty.text = "  ".to_string();
        let attempts = vec![empty, attempt(1, 20.0, false), attempt(2, 35.0, false)];
        assert_eq!(best_partial(&attempts).unwrap().profile_index, 2);
    }

    #[test]
    fn test_score_averages_tokens_above_floor() {
        let recognition = Recognition::from_tokens(
            "a b c",
            vec![token("a", 90.0), token("b", 60.0), token("c", -1.0)],
        );
        assert_eq!(score(&recognition, 0.0), 75.0);
        assert_eq!(score(&recognition, 70.0), 90.0);
    }

    #[test]
    fn test_score_single_confident_token_does_not_dominate() {
        let recognition = Recognition::from_tokens(
            "x y z w",
            vec![token("x", 99.0), token("y", 20.0), token("z", 25.0), token("w", 15.0)],
        );
        assert!(score(&recognition, 0.0) < 50.0);
    }

    #[test]
    fn test_score_falls_back_to_page_confidence() {
        let recognition = Recognition::with_confidence("text", 72.0);
        assert_eq!(score(&recognition, 0.0), 72.0);
        assert_eq!(score(&Recognition::default(), 0.0), 0.0);
    }

    #[test]
    fn test_score_is_clamped() {
        let recognition = Recognition::with_confidence("text", 140.0);
        assert_eq!(score(&recognition, 0.0), 100.0);
    }

    #[test]
    fn test_selection_keeps_profile() {
        let profile: OcrProfile = "11:jpn".parse().unwrap();
        let attempts = vec![OcrAttemptResult {
            profile_index: 0,
            profile: profile.clone(),
            text: "図".to_string(),
            confidence: 12.0,
            outcome: AttemptOutcome::Success,
        }];
        assert_eq!(select(&attempts).unwrap().profile, profile);
    }
}
