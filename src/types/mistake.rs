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

use std::collections::VecDeque;
use std::fmt::Display;
use std::fmt::Formatter;

use clap::ValueEnum;
use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::ValidationError;
use crate::error::fail;
use crate::types::item_type::ItemType;
use crate::types::timestamp::Timestamp;

/// How many individual mistakes a record remembers.
pub const RECENT_MISTAKES_CAPACITY: usize = 10;

/// Weight contributed by each mistake inside the recency window.
const RECENT_MISTAKE_WEIGHT: f64 = 0.5;
const GRAMMAR_BONUS: f64 = 0.3;
const VOCABULARY_BONUS: f64 = 0.2;
/// Each day since the last mistake takes this much off the recency multiplier.
const RECENCY_DECAY_PER_DAY: f64 = 0.2;
const MIN_RECENCY_MULTIPLIER: f64 = 0.1;
pub const MAX_WEIGHT: f64 = 10.0;

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MistakeType {
    Grammar,
    Vocabulary,
    Spelling,
    Structure,
}

impl MistakeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MistakeType::Grammar => "grammar",
            MistakeType::Vocabulary => "vocabulary",
            MistakeType::Spelling => "spelling",
            MistakeType::Structure => "structure",
        }
    }

    /// The mistake type assumed when the caller does not classify the error.
    pub fn default_for(item_type: ItemType) -> Self {
        match item_type {
            ItemType::Sentence => MistakeType::Structure,
            ItemType::Pattern => MistakeType::Grammar,
            ItemType::Vocabulary => MistakeType::Vocabulary,
        }
    }
}

impl Display for MistakeType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for MistakeType {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "grammar" => Ok(MistakeType::Grammar),
            "vocabulary" => Ok(MistakeType::Vocabulary),
            "spelling" => Ok(MistakeType::Spelling),
            "structure" => Ok(MistakeType::Structure),
            _ => fail(format!("Invalid mistake type: {}", value)),
        }
    }
}

impl ToSql for MistakeType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MistakeType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        MistakeType::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

/// A single observed wrong answer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mistake {
    pub timestamp: Timestamp,
    pub mistake_type: MistakeType,
    pub user_answer: String,
    pub correct_answer: String,
}

/// A learner's wrong-answer log for one sentence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeRecord {
    pub sentence_id: String,
    pub user_id: String,
    pub incorrect_count: u32,
    pub last_incorrect_date: Timestamp,
    /// Oldest first. Never longer than [`RECENT_MISTAKES_CAPACITY`].
    pub recent_mistakes: VecDeque<Mistake>,
    /// Derived from the fields above; recomputed on every append.
    pub weight: f64,
}

impl MistakeRecord {
    /// An empty log for a sentence the learner has not yet got wrong.
    pub fn new(
        user_id: impl Into<String>,
        sentence_id: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            sentence_id: sentence_id.into(),
            user_id: user_id.into(),
            incorrect_count: 0,
            last_incorrect_date: now,
            recent_mistakes: VecDeque::with_capacity(RECENT_MISTAKES_CAPACITY),
            weight: 0.0,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("userId", "must not be empty"));
        }
        if self.sentence_id.trim().is_empty() {
            return Err(ValidationError::new("sentenceId", "must not be empty"));
        }
        Ok(())
    }

    /// Append a mistake, evicting the oldest one if the ring is full, and
    /// recompute the weight as of `now`.
    pub fn record(&mut self, mistake: Mistake, now: Timestamp, window_days: f64) {
        self.incorrect_count = self.incorrect_count.saturating_add(1);
        if mistake.timestamp > self.last_incorrect_date || self.incorrect_count == 1 {
            self.last_incorrect_date = mistake.timestamp;
        }
        while self.recent_mistakes.len() >= RECENT_MISTAKES_CAPACITY {
            self.recent_mistakes.pop_front();
        }
        self.recent_mistakes.push_back(mistake);
        self.refresh_weight(now, window_days);
    }

    pub fn refresh_weight(&mut self, now: Timestamp, window_days: f64) {
        self.weight = self.compute_weight(now, window_days);
    }

    /// The review priority of this record. The shape of this formula is relied
    /// upon by session composition; keep it exactly as is.
    pub fn compute_weight(&self, now: Timestamp, window_days: f64) -> f64 {
        let days_since = now.days_since(self.last_incorrect_date).max(0.0);
        let recency = (1.0 - days_since * RECENCY_DECAY_PER_DAY).max(MIN_RECENCY_MULTIPLIER);
        let in_window = self
            .recent_mistakes
            .iter()
            .filter(|m| within_window(m.timestamp, now, window_days))
            .count();
        let mut weight = self.incorrect_count as f64 * recency;
        weight += in_window as f64 * RECENT_MISTAKE_WEIGHT;
        if self.has_mistake_of(MistakeType::Grammar) {
            weight += GRAMMAR_BONUS;
        }
        if self.has_mistake_of(MistakeType::Vocabulary) {
            weight += VOCABULARY_BONUS;
        }
        weight.min(MAX_WEIGHT)
    }

    /// Whether the last mistake happened within the window ending at `now`.
    pub fn is_recent(&self, now: Timestamp, window_days: f64) -> bool {
        within_window(self.last_incorrect_date, now, window_days)
    }

    fn has_mistake_of(&self, mistake_type: MistakeType) -> bool {
        self.recent_mistakes
            .iter()
            .any(|m| m.mistake_type == mistake_type)
    }
}

fn within_window(ts: Timestamp, now: Timestamp, window_days: f64) -> bool {
    now.days_since(ts) <= window_days
}
