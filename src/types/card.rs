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

use serde::Deserialize;
use serde::Serialize;

use crate::error::ValidationError;
use crate::types::item_type::ItemType;
use crate::types::learning_state::LearningState;
use crate::types::range::Range;
use crate::types::range::UNIT;
use crate::types::timestamp::Timestamp;

pub const STABILITY_FACTOR: Range = Range::new(0.1, 365.0);
pub const DIFFICULTY_FACTOR: Range = Range::new(0.1, 5.0);

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const DEFAULT_MEMORY_STRENGTH: f64 = 0.5;
pub const DEFAULT_STABILITY_FACTOR: f64 = 1.0;
pub const DEFAULT_DIFFICULTY_FACTOR: f64 = 1.0;

/// One learner's relationship to one learnable item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,

    /// SM-2 style multiplier applied to the interval on a successful review.
    pub ease_factor: f64,
    /// Days until the next review under the discrete scheduler.
    pub interval: u32,
    /// Consecutive successful graduations/reviews since the last lapse.
    pub repetition_count: u32,
    pub learning_state: LearningState,
    /// Index into the learning or relearning step sequence.
    pub learning_step: u32,
    pub graduated: bool,
    /// Set by the caller only. Suspended cards never appear in sessions.
    pub suspended: bool,

    /// Current retrievability estimate.
    pub memory_strength: f64,
    /// Decay-model stability.
    pub stability_factor: f64,
    pub difficulty_factor: f64,
    /// Exponential moving average of pass/fail outcomes.
    pub success_rate: f64,

    pub last_reviewed: Option<Timestamp>,
    pub next_review: Timestamp,
    pub total_reviews: u32,
    pub correct_streak: u32,
    pub lapses: u32,
    /// Mean response time, in milliseconds, over timed reviews only.
    pub average_response_time: f64,
    /// Reviews that came with a response time.
    pub timed_reviews: u32,
}

impl Card {
    /// A card the learner has just encountered for the first time.
    pub fn new(
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        item_type: ItemType,
        now: Timestamp,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            item_type,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval: 1,
            repetition_count: 0,
            learning_state: LearningState::New,
            learning_step: 0,
            graduated: false,
            suspended: false,
            memory_strength: DEFAULT_MEMORY_STRENGTH,
            stability_factor: DEFAULT_STABILITY_FACTOR,
            difficulty_factor: DEFAULT_DIFFICULTY_FACTOR,
            success_rate: 0.0,
            last_reviewed: None,
            next_review: now,
            total_reviews: 0,
            correct_streak: 0,
            lapses: 0,
            average_response_time: 0.0,
            timed_reviews: 0,
        }
    }

    /// Check the identity fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("userId", "must not be empty"));
        }
        if self.item_id.trim().is_empty() {
            return Err(ValidationError::new("itemId", "must not be empty"));
        }
        Ok(())
    }

    /// Force every numeric field into its documented bounds, with the ease
    /// factor held to `ease`. Returns the names of the fields that had to be
    /// changed.
    pub fn clamp_fields(&mut self, ease: Range) -> Vec<&'static str> {
        let mut clamped = Vec::new();
        clamp_into(&mut self.ease_factor, ease, "easeFactor", &mut clamped);
        clamp_into(&mut self.memory_strength, UNIT, "memoryStrength", &mut clamped);
        clamp_into(
            &mut self.stability_factor,
            STABILITY_FACTOR,
            "stabilityFactor",
            &mut clamped,
        );
        clamp_into(
            &mut self.difficulty_factor,
            DIFFICULTY_FACTOR,
            "difficultyFactor",
            &mut clamped,
        );
        clamp_into(&mut self.success_rate, UNIT, "successRate", &mut clamped);
        if !(self.average_response_time.is_finite() && self.average_response_time >= 0.0) {
            self.average_response_time = 0.0;
            clamped.push("averageResponseTime");
        }
        if self.timed_reviews > self.total_reviews {
            self.timed_reviews = self.total_reviews;
            clamped.push("timedReviews");
        }
        if let Some(last) = self.last_reviewed {
            if self.next_review < last {
                self.next_review = last;
                clamped.push("nextReview");
            }
        }
        clamped
    }

    /// Whether the card is due at the given instant.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_review <= now
    }
}

fn clamp_into(value: &mut f64, range: Range, name: &'static str, clamped: &mut Vec<&'static str>) {
    let fixed = range.clamp(*value);
    if fixed != *value {
        *value = fixed;
        clamped.push(name);
    }
}

/// The shape of a card as it arrives from outside the engine (an import file,
/// another service). Every field is optional so that missing identity fields
/// can be reported, and numbers are wide so that out-of-range values can be
/// clamped rather than rejected by the deserializer.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    pub user_id: Option<String>,
    pub item_id: Option<String>,
    pub item_type: Option<ItemType>,
    pub ease_factor: Option<f64>,
    pub interval: Option<i64>,
    pub repetition_count: Option<i64>,
    pub learning_state: Option<LearningState>,
    pub learning_step: Option<i64>,
    pub graduated: Option<bool>,
    pub suspended: Option<bool>,
    pub memory_strength: Option<f64>,
    pub stability_factor: Option<f64>,
    pub difficulty_factor: Option<f64>,
    pub success_rate: Option<f64>,
    pub last_reviewed: Option<Timestamp>,
    pub next_review: Option<Timestamp>,
    pub total_reviews: Option<i64>,
    pub correct_streak: Option<i64>,
    pub lapses: Option<i64>,
    pub average_response_time: Option<f64>,
    pub timed_reviews: Option<i64>,
}

impl CardRecord {
    /// Validate the record and turn it into a card. Missing identity fields
    /// are rejected, out-of-range numbers are clamped (the ease factor into
    /// `ease`), and absent fields take their defaults.
    pub fn into_card(self, now: Timestamp, ease: Range) -> Result<Card, ValidationError> {
        let user_id = match self.user_id {
            Some(id) if !id.trim().is_empty() => id,
            Some(_) => return Err(ValidationError::new("userId", "must not be empty")),
            None => return Err(ValidationError::new("userId", "is required")),
        };
        let item_id = match self.item_id {
            Some(id) if !id.trim().is_empty() => id,
            Some(_) => return Err(ValidationError::new("itemId", "must not be empty")),
            None => return Err(ValidationError::new("itemId", "is required")),
        };
        let defaults = Card::new(
            user_id,
            item_id,
            self.item_type.unwrap_or_default(),
            self.next_review.unwrap_or(now),
        );
        let mut card = Card {
            ease_factor: self.ease_factor.unwrap_or(defaults.ease_factor),
            interval: count(self.interval, defaults.interval),
            repetition_count: count(self.repetition_count, 0),
            learning_state: self.learning_state.unwrap_or_default(),
            learning_step: count(self.learning_step, 0),
            graduated: self.graduated.unwrap_or(false),
            suspended: self.suspended.unwrap_or(false),
            memory_strength: self.memory_strength.unwrap_or(defaults.memory_strength),
            stability_factor: self.stability_factor.unwrap_or(defaults.stability_factor),
            difficulty_factor: self.difficulty_factor.unwrap_or(defaults.difficulty_factor),
            success_rate: self.success_rate.unwrap_or(0.0),
            last_reviewed: self.last_reviewed,
            total_reviews: count(self.total_reviews, 0),
            correct_streak: count(self.correct_streak, 0),
            lapses: count(self.lapses, 0),
            average_response_time: self.average_response_time.unwrap_or(0.0),
            timed_reviews: count(self.timed_reviews, 0),
            ..defaults
        };
        let clamped = card.clamp_fields(ease);
        if !clamped.is_empty() {
            log::debug!(
                "Clamped {} for card {}/{}",
                clamped.join(", "),
                card.user_id,
                card.item_id
            );
        }
        Ok(card)
    }
}

/// Clamp a possibly-negative count into `u32`.
fn count(value: Option<i64>, default: u32) -> u32 {
    match value {
        Some(v) => v.clamp(0, u32::MAX as i64) as u32,
        None => default,
    }
}
