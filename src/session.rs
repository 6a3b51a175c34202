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

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::Display;
use std::fmt::Formatter;

use clap::ValueEnum;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ValidationError;
use crate::memory::MemoryModel;
use crate::types::card::Card;
use crate::types::learning_state::LearningState;
use crate::types::mistake::MistakeRecord;
use crate::types::range::UNIT;
use crate::types::timestamp::Timestamp;

pub const MAX_SESSION_SIZE: i64 = 100;

/// Mistake records at or below this weight are not worth prioritizing.
const MIN_PRIORITY_WEIGHT: f64 = 0.5;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// How far back a mistake still counts, in days.
    pub recency_window_days: u32,
    /// Share of a session reserved for recently missed items.
    pub incorrect_ratio: f64,
    pub default_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recency_window_days: 3,
            incorrect_ratio: 0.7,
            default_limit: 20,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Default, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Weakest memory first.
    #[default]
    Priority,
    /// Earliest due first.
    DueDate,
    /// Hardest first.
    Difficulty,
}

impl Display for SortBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SortBy::Priority => write!(f, "priority"),
            SortBy::DueDate => write!(f, "due_date"),
            SortBy::Difficulty => write!(f, "difficulty"),
        }
    }
}

/// What the caller asks for.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionRequest {
    pub user_id: String,
    /// Total session size. Defaults to the configured limit.
    pub limit: Option<i64>,
    pub include_new: bool,
    pub sort_by: SortBy,
    /// Overrides the configured share of recently missed items.
    pub incorrect_ratio: Option<f64>,
}

impl SessionRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            limit: None,
            include_new: true,
            sort_by: SortBy::default(),
            incorrect_ratio: None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Regular,
    Mixed,
    IncorrectFocus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionWarning {
    /// Fewer items qualified than were asked for. The session is not padded.
    #[serde(rename_all = "camelCase")]
    InsufficientCandidates { requested: u32, available: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityEntry {
    pub item_id: String,
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSession {
    pub user_id: String,
    /// Recently missed items, highest weight first.
    pub incorrect_priority: Vec<PriorityEntry>,
    /// Due items, in the requested order.
    pub regular: Vec<String>,
    pub session_type: SessionType,
    pub target_size: u32,
    pub warnings: Vec<SessionWarning>,
}

impl ReviewSession {
    fn empty(user_id: &str, target_size: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            incorrect_priority: Vec::new(),
            regular: Vec::new(),
            session_type: SessionType::Regular,
            target_size,
            warnings: Vec::new(),
        }
    }

    /// Every item in presentation order: missed items first.
    pub fn item_ids(&self) -> Vec<&str> {
        self.incorrect_priority
            .iter()
            .map(|e| e.item_id.as_str())
            .chain(self.regular.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.incorrect_priority.len() + self.regular.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionComposer {
    config: SessionConfig,
    memory: MemoryModel,
}

impl SessionComposer {
    pub fn new(config: SessionConfig, memory: MemoryModel) -> Self {
        Self { config, memory }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Compose a review session out of a learner's cards and mistake log.
    /// Records belonging to other learners are ignored. Ties are broken with
    /// `rng`, so a seeded generator gives a reproducible order.
    pub fn build_session<R: Rng + ?Sized>(
        &self,
        request: &SessionRequest,
        cards: &[Card],
        mistakes: &[MistakeRecord],
        now: Timestamp,
        rng: &mut R,
    ) -> Result<ReviewSession, ValidationError> {
        if request.user_id.trim().is_empty() {
            return Err(ValidationError::new("userId", "must not be empty"));
        }
        let limit = request.limit.unwrap_or(self.config.default_limit as i64);
        if !(1..=MAX_SESSION_SIZE).contains(&limit) {
            return Err(ValidationError::new(
                "limit",
                format!("{limit} is outside [1, {MAX_SESSION_SIZE}]"),
            ));
        }
        let total = limit as u32;
        let ratio = UNIT.clamp(request.incorrect_ratio.unwrap_or(self.config.incorrect_ratio));
        let user_id = request.user_id.as_str();

        let cards: HashMap<&str, &Card> = cards
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| (c.item_id.as_str(), c))
            .collect();
        if cards.is_empty() {
            log::debug!("{user_id}: no cards, empty session");
            return Ok(ReviewSession::empty(user_id, total));
        }

        let incorrect_quota = (total as f64 * ratio).floor() as usize;
        let incorrect_priority = self.incorrect_slice(user_id, &cards, mistakes, now, rng);
        let incorrect_priority: Vec<PriorityEntry> =
            incorrect_priority.into_iter().take(incorrect_quota).collect();

        let selected: HashSet<&str> = incorrect_priority
            .iter()
            .map(|e| e.item_id.as_str())
            .collect();
        let mut candidates: Vec<&Card> = cards
            .values()
            .copied()
            .filter(|c| !selected.contains(c.item_id.as_str()))
            .filter(|c| c.is_due(now) && !c.suspended)
            .filter(|c| request.include_new || c.learning_state != LearningState::New)
            .filter(|c| !self.memory.is_mastered(c, now))
            .collect();
        // HashMap iteration order is arbitrary; pin it before shuffling.
        candidates.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        candidates.shuffle(rng);
        candidates.sort_by(|a, b| self.compare(request.sort_by, a, b, now));
        let remaining = total as usize - incorrect_priority.len();
        let regular: Vec<String> = candidates
            .into_iter()
            .take(remaining)
            .map(|c| c.item_id.clone())
            .collect();

        let session_type = if incorrect_priority.is_empty() {
            SessionType::Regular
        } else if 2 * incorrect_priority.len() >= total as usize {
            SessionType::IncorrectFocus
        } else {
            SessionType::Mixed
        };

        let mut warnings = Vec::new();
        let available = (incorrect_priority.len() + regular.len()) as u32;
        if available < total {
            warnings.push(SessionWarning::InsufficientCandidates {
                requested: total,
                available,
            });
        }

        log::debug!(
            "{user_id}: session of {available}/{total} ({} missed, {} regular, {:?})",
            incorrect_priority.len(),
            regular.len(),
            session_type
        );

        Ok(ReviewSession {
            user_id: user_id.to_string(),
            incorrect_priority,
            regular,
            session_type,
            target_size: total,
            warnings,
        })
    }

    /// Recently missed items that still warrant attention, highest weight
    /// first.
    fn incorrect_slice<R: Rng + ?Sized>(
        &self,
        user_id: &str,
        cards: &HashMap<&str, &Card>,
        mistakes: &[MistakeRecord],
        now: Timestamp,
        rng: &mut R,
    ) -> Vec<PriorityEntry> {
        let window = self.config.recency_window_days as f64;
        let mut best: HashMap<&str, f64> = HashMap::new();
        for record in mistakes.iter().filter(|m| m.user_id == user_id) {
            if !record.is_recent(now, window) {
                continue;
            }
            let Some(card) = cards.get(record.sentence_id.as_str()) else {
                continue;
            };
            if card.suspended || self.memory.is_mastered(card, now) {
                continue;
            }
            let weight = record.compute_weight(now, window);
            if weight <= MIN_PRIORITY_WEIGHT {
                continue;
            }
            let entry = best.entry(record.sentence_id.as_str()).or_insert(weight);
            if weight > *entry {
                *entry = weight;
            }
        }
        let mut entries: Vec<PriorityEntry> = best
            .into_iter()
            .map(|(item_id, weight)| PriorityEntry {
                item_id: item_id.to_string(),
                weight,
            })
            .collect();
        entries.sort_by(|a, b| a.item_id.cmp(&b.item_id));
        entries.shuffle(rng);
        entries.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        entries
    }

    fn compare(&self, sort_by: SortBy, a: &Card, b: &Card, now: Timestamp) -> Ordering {
        match sort_by {
            SortBy::Priority => self
                .memory
                .current_strength(a, now)
                .total_cmp(&self.memory.current_strength(b, now)),
            SortBy::DueDate => a.next_review.cmp(&b.next_review),
            SortBy::Difficulty => b.difficulty_factor.total_cmp(&a.difficulty_factor),
        }
    }
}
