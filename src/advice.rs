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

//! Learner-facing coaching copy. Nothing in here feeds back into scheduling.

use crate::quality::ConfidenceLevel;
use crate::quality::DetailedAnalysis;
use crate::quality::ResponseSpeed;
use crate::quality::ScoreLevel;

/// Improvement suggestions for an analysed answer, most important first.
pub fn recommendations(analysis: &DetailedAnalysis) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();

    if !analysis.is_correct {
        out.push(match analysis.confidence_level {
            ConfidenceLevel::High => {
                "You nearly had it. Compare your answer with the reference and note the difference."
            }
            ConfidenceLevel::Medium => {
                "Review this sentence again before the end of the session."
            }
            ConfidenceLevel::Low => {
                "Study the reference answer, then try to reproduce it from memory."
            }
        });
    }

    match analysis.score_level {
        ScoreLevel::Excellent | ScoreLevel::Good => {}
        ScoreLevel::Fair => out.push("Pay attention to word order and small function words."),
        ScoreLevel::Poor => out.push("Break the sentence into chunks and practise each one."),
    }

    if analysis.is_correct && analysis.confidence_level == ConfidenceLevel::Low {
        out.push("The answer was right but uncertain. Say it aloud a few more times.");
    }

    match analysis.response_speed {
        Some(ResponseSpeed::VerySlow) => {
            out.push("Try to answer within 30 seconds. Speed comes with repetition.")
        }
        Some(ResponseSpeed::Slow) => out.push("Aim for a quicker response next time."),
        Some(ResponseSpeed::Fast) | Some(ResponseSpeed::Normal) | None => {}
    }

    if out.is_empty() {
        out.push("Great work. Keep it up.");
    }
    out.into_iter().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::Answer;
    use crate::quality::detailed_analysis;

    fn advise(is_correct: bool, confidence: f64, score: f64, time: Option<f64>) -> Vec<String> {
        recommendations(&detailed_analysis(&Answer {
            is_correct,
            confidence,
            score,
            response_time: time,
        }))
    }

    #[test]
    fn test_perfect_answer_gets_praise_only() {
        assert_eq!(
            advise(true, 0.95, 98.0, Some(2.0)),
            vec!["Great work. Keep it up.".to_string()]
        );
    }

    #[test]
    fn test_slow_and_unsure() {
        let advice = advise(true, 0.2, 85.0, Some(40.0));
        assert_eq!(advice.len(), 2);
        assert!(advice[0].contains("uncertain"));
        assert!(advice[1].contains("30 seconds"));
    }

    #[test]
    fn test_wrong_answer_comes_first() {
        let advice = advise(false, 0.1, 20.0, Some(20.0));
        assert_eq!(advice.len(), 3);
        assert!(advice[0].contains("reference answer"));
        assert!(advice[1].contains("chunks"));
        assert!(advice[2].contains("quicker"));
    }
}
