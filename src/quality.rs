// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Turns a raw answer into a 0–5 quality grade.

use std::fmt::Display;
use std::fmt::Formatter;

use serde::Serialize;

use crate::error::ValidationError;
use crate::types::range::Range;
use crate::types::range::UNIT;

pub const MAX_QUALITY: u8 = 5;

const SCORE: Range = Range::new(0.0, 100.0);
const SECONDS: Range = Range::new(0.0, f64::INFINITY);

/// Confidence above which a wrong answer still counts as "almost".
const RECOGNIZE_CONFIDENCE: f64 = 0.7;
const PARTIAL_CONFIDENCE: f64 = 0.4;

const PERFECT_SCORE: f64 = 90.0;
const GOOD_SCORE: f64 = 80.0;
const FAIR_SCORE: f64 = 60.0;

const FAST_SECONDS: f64 = 3.0;
const SLOW_SECONDS: f64 = 15.0;
const VERY_SLOW_SECONDS: f64 = 30.0;

/// A review grade on the SM-2 0–5 scale.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
#[serde(transparent)]
pub struct Quality(u8);

impl Quality {
    pub const BLACKOUT: Quality = Quality(0);
    pub const PERFECT: Quality = Quality(MAX_QUALITY);

    /// A grade supplied by the caller. Anything outside 0–5 is rejected.
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (0..=MAX_QUALITY as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::new(
                "quality",
                format!("{value} is outside [0, {MAX_QUALITY}]"),
            ))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64
    }
}

impl Display for Quality {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A raw answer as reported by the answer-evaluation pipeline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Answer {
    pub is_correct: bool,
    /// Recognizer confidence in [0, 1].
    pub confidence: f64,
    /// Similarity score in [0, 100].
    pub score: f64,
    /// Response time in seconds, when known.
    pub response_time: Option<f64>,
}

impl Answer {
    /// The same answer with every field forced into its documented range.
    fn clamped(&self) -> Self {
        Self {
            is_correct: self.is_correct,
            confidence: UNIT.clamp(self.confidence),
            score: SCORE.clamp(self.score),
            response_time: self
                .response_time
                .filter(|t| t.is_finite())
                .map(|t| SECONDS.clamp(t)),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityCategory {
    Perfect,
    Good,
    Acceptable,
    Poor,
    Failed,
}

impl QualityCategory {
    pub fn of(quality: Quality) -> Self {
        match quality.value() {
            5 => QualityCategory::Perfect,
            4 => QualityCategory::Good,
            3 => QualityCategory::Acceptable,
            1 | 2 => QualityCategory::Poor,
            _ => QualityCategory::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QualityResult {
    pub quality: Quality,
    pub reasoning: String,
    pub category: QualityCategory,
}

impl QualityResult {
    fn new(quality: u8, reasoning: impl Into<String>) -> Self {
        let quality = Quality(quality.min(MAX_QUALITY));
        Self {
            quality,
            reasoning: reasoning.into(),
            category: QualityCategory::of(quality),
        }
    }
}

/// Grade an answer. Pure and total: out-of-range inputs are clamped.
pub fn calculate_quality(answer: &Answer) -> QualityResult {
    let answer = answer.clamped();
    if !answer.is_correct {
        return if answer.confidence > RECOGNIZE_CONFIDENCE {
            QualityResult::new(
                2,
                "Incorrect, but the right answer would be recognized easily.",
            )
        } else if answer.confidence > PARTIAL_CONFIDENCE {
            QualityResult::new(1, "Incorrect, with a vague memory of the right answer.")
        } else {
            QualityResult::new(0, "Complete blackout.")
        };
    }

    let (base, base_reason) = if answer.score >= PERFECT_SCORE {
        (5, "Correct with an excellent score")
    } else if answer.score >= GOOD_SCORE {
        (4, "Correct with a good score")
    } else {
        (3, "Correct, but the answer was not close to the reference")
    };

    match answer.response_time {
        Some(t) => {
            if t <= FAST_SECONDS && base < MAX_QUALITY {
                QualityResult::new(base + 1, format!("{base_reason}, answered quickly ({t:.1}s)."))
            } else if t >= VERY_SLOW_SECONDS {
                QualityResult::new(
                    (base - 1).max(3),
                    format!("{base_reason}, but answered very slowly ({t:.1}s)."),
                )
            } else if t >= SLOW_SECONDS && base > 3 {
                QualityResult::new(
                    base - 1,
                    format!("{base_reason}, but answered slowly ({t:.1}s)."),
                )
            } else {
                QualityResult::new(base, format!("{base_reason} ({t:.1}s)."))
            }
        }
        None => {
            if answer.confidence < PARTIAL_CONFIDENCE && base > 3 {
                QualityResult::new(3, format!("{base_reason}, but with low confidence."))
            } else {
                QualityResult::new(base, format!("{base_reason}."))
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    fn of(confidence: f64) -> Self {
        if confidence >= RECOGNIZE_CONFIDENCE {
            ConfidenceLevel::High
        } else if confidence >= PARTIAL_CONFIDENCE {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreLevel {
    fn of(score: f64) -> Self {
        if score >= PERFECT_SCORE {
            ScoreLevel::Excellent
        } else if score >= GOOD_SCORE {
            ScoreLevel::Good
        } else if score >= FAIR_SCORE {
            ScoreLevel::Fair
        } else {
            ScoreLevel::Poor
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSpeed {
    Fast,
    Normal,
    Slow,
    VerySlow,
}

impl ResponseSpeed {
    fn of(seconds: f64) -> Self {
        if seconds <= FAST_SECONDS {
            ResponseSpeed::Fast
        } else if seconds >= VERY_SLOW_SECONDS {
            ResponseSpeed::VerySlow
        } else if seconds >= SLOW_SECONDS {
            ResponseSpeed::Slow
        } else {
            ResponseSpeed::Normal
        }
    }
}

/// The grade plus a breakdown of the signals behind it. Advisory only; the
/// scheduler never looks at anything but the grade.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedAnalysis {
    pub result: QualityResult,
    pub is_correct: bool,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub score: f64,
    pub score_level: ScoreLevel,
    pub response_time: Option<f64>,
    pub response_speed: Option<ResponseSpeed>,
}

pub fn detailed_analysis(answer: &Answer) -> DetailedAnalysis {
    let result = calculate_quality(answer);
    let answer = answer.clamped();
    DetailedAnalysis {
        result,
        is_correct: answer.is_correct,
        confidence: answer.confidence,
        confidence_level: ConfidenceLevel::of(answer.confidence),
        score: answer.score,
        score_level: ScoreLevel::of(answer.score),
        response_time: answer.response_time,
        response_speed: answer.response_time.map(ResponseSpeed::of),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correct(score: f64, confidence: f64, response_time: Option<f64>) -> Answer {
        Answer {
            is_correct: true,
            confidence,
            score,
            response_time,
        }
    }

    fn incorrect(confidence: f64) -> Answer {
        Answer {
            is_correct: false,
            confidence,
            score: 95.0,
            response_time: Some(1.0),
        }
    }

    fn grade(answer: Answer) -> u8 {
        calculate_quality(&answer).quality.value()
    }

    #[test]
    fn test_incorrect_grades() {
        assert_eq!(grade(incorrect(0.9)), 2);
        assert_eq!(grade(incorrect(0.7)), 1);
        assert_eq!(grade(incorrect(0.5)), 1);
        assert_eq!(grade(incorrect(0.4)), 0);
        assert_eq!(grade(incorrect(0.1)), 0);
    }

    #[test]
    fn test_correct_base_grades() {
        assert_eq!(grade(correct(95.0, 0.9, None)), 5);
        assert_eq!(grade(correct(90.0, 0.9, None)), 5);
        assert_eq!(grade(correct(85.0, 0.9, None)), 4);
        assert_eq!(grade(correct(50.0, 0.9, None)), 3);
    }

    #[test]
    fn test_fast_answer_bonus() {
        assert_eq!(grade(correct(95.0, 0.9, Some(2.0))), 5);
        assert_eq!(grade(correct(85.0, 0.9, Some(3.0))), 5);
        assert_eq!(grade(correct(50.0, 0.9, Some(1.0))), 4);
    }

    #[test]
    fn test_slow_answer_penalties() {
        assert_eq!(grade(correct(95.0, 0.9, Some(15.0))), 4);
        assert_eq!(grade(correct(85.0, 0.9, Some(20.0))), 3);
        assert_eq!(grade(correct(50.0, 0.9, Some(20.0))), 3);
        assert_eq!(grade(correct(95.0, 0.9, Some(30.0))), 4);
        assert_eq!(grade(correct(85.0, 0.9, Some(45.0))), 3);
        assert_eq!(grade(correct(50.0, 0.9, Some(45.0))), 3);
        assert_eq!(grade(correct(85.0, 0.9, Some(8.0))), 4);
    }

    #[test]
    fn test_low_confidence_without_time() {
        assert_eq!(grade(correct(95.0, 0.2, None)), 3);
        assert_eq!(grade(correct(50.0, 0.2, None)), 3);
        // With a response time, confidence is ignored.
        assert_eq!(grade(correct(95.0, 0.2, Some(5.0))), 5);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        assert_eq!(grade(correct(250.0, 7.0, Some(-3.0))), 5);
        assert_eq!(grade(correct(-10.0, f64::NAN, None)), 3);
        assert_eq!(grade(incorrect(f64::NAN)), 0);
        assert_eq!(grade(incorrect(3.0)), 2);
        let analysis = detailed_analysis(&correct(250.0, 7.0, Some(f64::NAN)));
        assert_eq!(analysis.score, 100.0);
        assert_eq!(analysis.confidence, 1.0);
        assert_eq!(analysis.response_time, None);
    }

    #[test]
    fn test_non_finite_time_is_treated_as_missing() {
        for time in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                grade(correct(95.0, 0.2, Some(time))),
                grade(correct(95.0, 0.2, None))
            );
        }
        assert_eq!(
            detailed_analysis(&correct(80.0, 0.9, Some(f64::NAN))).response_time,
            None
        );
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            calculate_quality(&correct(95.0, 0.9, None)).category,
            QualityCategory::Perfect
        );
        assert_eq!(
            calculate_quality(&correct(85.0, 0.9, None)).category,
            QualityCategory::Good
        );
        assert_eq!(
            calculate_quality(&correct(10.0, 0.9, None)).category,
            QualityCategory::Acceptable
        );
        assert_eq!(
            calculate_quality(&incorrect(0.9)).category,
            QualityCategory::Poor
        );
        assert_eq!(
            calculate_quality(&incorrect(0.5)).category,
            QualityCategory::Poor
        );
        assert_eq!(
            calculate_quality(&incorrect(0.0)).category,
            QualityCategory::Failed
        );
    }

    #[test]
    fn test_reasoning_is_never_empty() {
        let answers = [
            incorrect(0.9),
            incorrect(0.5),
            incorrect(0.1),
            correct(95.0, 0.9, Some(1.0)),
            correct(85.0, 0.9, Some(1.0)),
            correct(85.0, 0.9, Some(20.0)),
            correct(85.0, 0.9, Some(40.0)),
            correct(85.0, 0.9, Some(8.0)),
            correct(85.0, 0.1, None),
            correct(85.0, 0.9, None),
        ];
        for answer in answers {
            assert!(!calculate_quality(&answer).reasoning.is_empty());
        }
    }

    #[test]
    fn test_quality_new() {
        assert_eq!(Quality::new(3).map(Quality::value), Ok(3));
        let err = Quality::new(6).unwrap_err();
        assert_eq!(err.field, "quality");
        assert!(Quality::new(-1).is_err());
    }

    #[test]
    fn test_detailed_analysis_levels() {
        let analysis = detailed_analysis(&correct(65.0, 0.5, Some(20.0)));
        assert_eq!(analysis.confidence_level, ConfidenceLevel::Medium);
        assert_eq!(analysis.score_level, ScoreLevel::Fair);
        assert_eq!(analysis.response_speed, Some(ResponseSpeed::Slow));
        assert_eq!(analysis.result.quality.value(), 3);

        let analysis = detailed_analysis(&correct(40.0, 0.1, None));
        assert_eq!(analysis.confidence_level, ConfidenceLevel::Low);
        assert_eq!(analysis.score_level, ScoreLevel::Poor);
        assert_eq!(analysis.response_speed, None);
    }
}
