//! Coaching tip prompt and post-processing, shared by every advice client.

use crate::ElevationSample;

/// Shown whenever the text collaborator fails or has no credential.
pub const FALLBACK_TIP: &str = "Maintain steady effort.";
/// Shown when the collaborator answers with nothing.
pub const EMPTY_ANSWER_TIP: &str = "Keep a steady cadence.";
pub const MAX_TIP_WORDS: usize = 10;
const SAMPLE_STRIDE: usize = 15;

/// Every 15th elevation, rounded to whole metres.
pub fn condensed_profile(elevation: &[ElevationSample]) -> Vec<i64> {
    elevation
        .iter()
        .step_by(SAMPLE_STRIDE)
        .map(|sample| sample.elevation.round() as i64)
        .collect()
}

pub fn build_prompt(profile: &[i64]) -> String {
    let samples = profile
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "Context: Cycling route elevation profile is [{samples}].\n\
         Task: Give a pro cycling tip in EXACTLY one sentence, maximum {MAX_TIP_WORDS} words.\n\
         Focus on gear choice or physical effort."
    )
}

/// Trim a model answer down to the displayed tip.
pub fn finalize_tip(answer: Option<&str>) -> String {
    let words: Vec<&str> = answer
        .unwrap_or_default()
        .split_whitespace()
        .take(MAX_TIP_WORDS)
        .collect();
    if words.is_empty() {
        EMPTY_ANSWER_TIP.to_string()
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinate;

    fn samples(values: &[f64]) -> Vec<ElevationSample> {
        values
            .iter()
            .map(|&elevation| ElevationSample {
                elevation,
                location: Coordinate { lat: 0.0, lon: 0.0 },
                resolution: 4.8,
            })
            .collect()
    }

    #[test]
    fn test_condensed_profile_takes_every_fifteenth() {
        let values: Vec<f64> = (0..31).map(|i| i as f64 + 0.4).collect();
        assert_eq!(condensed_profile(&samples(&values)), vec![0, 15, 30]);
    }

    #[test]
    fn test_prompt_lists_samples() {
        let prompt = build_prompt(&[12, 40, 7]);
        assert!(prompt.contains("[12,40,7]"));
        assert!(prompt.contains("maximum 10 words"));
    }

    #[test]
    fn test_finalize_truncates_to_ten_words() {
        let tip =
            finalize_tip(Some("one two three four five six seven eight nine ten eleven twelve"));
        assert_eq!(tip, "one two three four five six seven eight nine ten");
    }

    #[test]
    fn test_finalize_empty_answer() {
        assert_eq!(finalize_tip(Some("  \n")), EMPTY_ANSWER_TIP);
        assert_eq!(finalize_tip(None), EMPTY_ANSWER_TIP);
    }
}
