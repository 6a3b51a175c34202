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

use serde::Serialize;

use crate::advice::recommendations;
use crate::error::Fallible;
use crate::quality::Answer;
use crate::quality::DetailedAnalysis;
use crate::quality::detailed_analysis;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub analysis: DetailedAnalysis,
    pub recommendations: Vec<String>,
}

pub fn analyze_answer(answer: Answer) -> Fallible<()> {
    let report = analysis_report(&answer);
    let json: String = serde_json::to_string_pretty(&report)?;
    println!("{json}");
    Ok(())
}

pub fn analysis_report(answer: &Answer) -> AnalysisReport {
    let analysis = detailed_analysis(answer);
    let recommendations = recommendations(&analysis);
    AnalysisReport {
        analysis,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes() -> Fallible<()> {
        let report = analysis_report(&Answer {
            is_correct: true,
            confidence: 0.8,
            score: 92.0,
            response_time: Some(20.0),
        });
        let json = serde_json::to_value(&report)?;
        assert_eq!(json["analysis"]["result"]["quality"], 4);
        assert_eq!(json["analysis"]["responseSpeed"], "slow");
        assert_eq!(json["analysis"]["scoreLevel"], "excellent");
        assert_eq!(json["recommendations"][0], "Aim for a quicker response next time.");
        Ok(())
    }
}
