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
use crate::memory::MemoryModel;
use crate::quality::Quality;
use crate::types::card::Card;
use crate::types::item_type::ItemType;
use crate::types::learning_state::LearningState;
use crate::types::range::Range;
use crate::types::timestamp::Timestamp;

/// Minutes added when a computed due date is not in the future.
const MIN_DELAY_MINUTES: i64 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    pub initial_ease_factor: f64,
    pub min_ease_factor: f64,
    pub max_ease_factor: f64,
    /// Added to the ease factor on an easy review.
    pub ease_bonus: f64,
    /// Subtracted from the ease factor on a lapse.
    pub ease_penalty: f64,
    /// Subtracted from the ease factor on a passing but not easy review.
    pub hard_penalty: f64,
    /// Learning steps, in minutes.
    pub learning_steps: Vec<u32>,
    /// Relearning steps, in minutes.
    pub relearning_steps: Vec<u32>,
    /// Interval in days on graduating from learning.
    pub graduating_interval: u32,
    /// Interval in days on graduating with an easy grade.
    pub easy_interval: u32,
    pub min_interval: u32,
    pub max_interval: u32,
    pub interval_modifier: f64,
    pub passing_grade: u8,
    pub easy_grade: u8,
    /// Lapses at which a card is flagged as a chronic difficulty.
    pub lapse_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_ease_factor: 2.5,
            min_ease_factor: 1.3,
            max_ease_factor: 3.5,
            ease_bonus: 0.1,
            ease_penalty: 0.2,
            hard_penalty: 0.05,
            learning_steps: vec![1, 10],
            relearning_steps: vec![10],
            graduating_interval: 1,
            easy_interval: 4,
            min_interval: 1,
            max_interval: 36500,
            interval_modifier: 1.0,
            passing_grade: 3,
            easy_grade: 4,
            lapse_threshold: 8,
        }
    }
}

impl SchedulerConfig {
    pub fn ease_range(&self) -> Range {
        Range::new(self.min_ease_factor, self.max_ease_factor)
    }
}

/// Running totals over a batch of reviews. Owned by the caller and threaded
/// through every call to [`CardScheduler::update`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewContext {
    pub reviews: u32,
    pub passes: u32,
    pub lapses: u32,
    pub graduations: u32,
    /// Sum of every ease factor change applied.
    pub ease_delta: f64,
    /// Cards that crossed the lapse threshold, as `(user_id, item_id)`.
    pub chronic: Vec<(String, String)>,
}

/// The result of scheduling one review.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleOutcome {
    pub card: Card,
    pub quality: Quality,
    pub previous_state: LearningState,
    /// Due date from the discrete interval or learning step alone.
    pub interval_due: Timestamp,
    /// Due date suggested by the forgetting curve.
    pub memory_due: Timestamp,
    /// Advisory: the card has lapsed too often.
    pub chronic_difficulty: bool,
}

/// What the state machine decided, before the memory model weighs in.
struct Transition {
    card: Card,
    due: Timestamp,
    lapsed: bool,
    graduated: bool,
}

#[derive(Clone, Debug, Default)]
pub struct CardScheduler {
    config: SchedulerConfig,
    memory: MemoryModel,
}

impl CardScheduler {
    pub fn new(config: SchedulerConfig, memory: MemoryModel) -> Self {
        Self { config, memory }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn memory(&self) -> &MemoryModel {
        &self.memory
    }

    /// A brand new card carrying the configured initial ease and stability.
    pub fn new_card(
        &self,
        user_id: impl Into<String>,
        item_id: impl Into<String>,
        item_type: ItemType,
        now: Timestamp,
    ) -> Card {
        let mut card = Card::new(user_id, item_id, item_type, now);
        card.ease_factor = self.config.initial_ease_factor;
        card.stability_factor = self.memory.params().initial_stability;
        card
    }

    /// Apply one review to a card. Numbers outside their bounds are clamped
    /// before anything is computed from them.
    pub fn update(
        &self,
        card: &Card,
        quality: Quality,
        response_time_ms: Option<u64>,
        now: Timestamp,
        ctx: &mut ReviewContext,
    ) -> Result<ScheduleOutcome, ValidationError> {
        card.validate()?;
        let passed = quality.value() >= self.config.passing_grade;
        let previous_state = card.learning_state;

        let mut card = card.clone();
        let clamped = card.clamp_fields(self.config.ease_range());
        if !clamped.is_empty() {
            log::debug!(
                "Clamped {} for card {}/{}",
                clamped.join(", "),
                card.user_id,
                card.item_id
            );
        }
        record_history(&mut card, passed, response_time_ms);

        let ease_before = card.ease_factor;
        let transition = match previous_state {
            LearningState::New => {
                card.learning_state = LearningState::Learning;
                card.learning_step = 0;
                if passed && self.config.learning_steps.len() <= 1 {
                    self.graduate(card, quality, LearningState::Learning, now)
                } else {
                    let due = now.plus_minutes(step_minutes(&self.config.learning_steps, 0));
                    Transition {
                        card,
                        due,
                        lapsed: false,
                        graduated: false,
                    }
                }
            }
            LearningState::Learning if passed => {
                self.advance(card, quality, LearningState::Learning, now)
            }
            LearningState::Relearning if passed => {
                self.advance(card, quality, LearningState::Relearning, now)
            }
            LearningState::Review if passed => self.review(card, quality, now),
            LearningState::Learning | LearningState::Relearning | LearningState::Review => {
                self.lapse(card, now)
            }
        };

        let Transition {
            card,
            due: interval_due,
            lapsed,
            graduated,
        } = transition;
        let mut card = self
            .memory
            .update_after_review(&card, quality, response_time_ms, now);
        let memory_due =
            self.memory
                .optimal_review_time(&card, self.memory.params().retention_threshold, now);
        let mut next_review = interval_due.min(memory_due);
        if next_review <= now {
            next_review = now.plus_minutes(MIN_DELAY_MINUTES);
        }
        card.next_review = next_review;

        let chronic_difficulty = card.lapses >= self.config.lapse_threshold;

        ctx.reviews += 1;
        if passed {
            ctx.passes += 1;
        }
        if lapsed {
            ctx.lapses += 1;
        }
        if graduated {
            ctx.graduations += 1;
        }
        ctx.ease_delta += card.ease_factor - ease_before;
        if chronic_difficulty && lapsed && card.lapses == self.config.lapse_threshold {
            ctx.chronic.push((card.user_id.clone(), card.item_id.clone()));
        }

        log::debug!(
            "{}/{} q={} {} -> {} I={}d EF={:.2} S={:.2} due={}",
            card.user_id,
            card.item_id,
            quality,
            previous_state,
            card.learning_state,
            card.interval,
            card.ease_factor,
            card.stability_factor,
            card.next_review
        );

        Ok(ScheduleOutcome {
            card,
            quality,
            previous_state,
            interval_due,
            memory_due,
            chronic_difficulty,
        })
    }

    /// A passing grade in a learning or relearning state.
    fn advance(
        &self,
        mut card: Card,
        quality: Quality,
        state: LearningState,
        now: Timestamp,
    ) -> Transition {
        let steps = self.steps(state);
        let next_step = card.learning_step.saturating_add(1);
        if next_step as usize >= steps.len() {
            self.graduate(card, quality, state, now)
        } else {
            card.learning_step = next_step;
            let due = now.plus_minutes(step_minutes(steps, next_step));
            Transition {
                card,
                due,
                lapsed: false,
                graduated: false,
            }
        }
    }

    fn graduate(
        &self,
        mut card: Card,
        quality: Quality,
        from: LearningState,
        now: Timestamp,
    ) -> Transition {
        let interval = match from {
            LearningState::Relearning => card.interval,
            _ if quality.value() >= self.config.easy_grade => self.config.easy_interval,
            _ => self.config.graduating_interval,
        };
        card.interval = self.clamp_interval(interval as f64);
        card.learning_state = LearningState::Review;
        card.learning_step = 0;
        card.graduated = true;
        card.repetition_count = card.repetition_count.saturating_add(1);
        card.ease_factor = self.config.ease_range().clamp(card.ease_factor);
        let due = now.plus_days(card.interval as i64);
        Transition {
            card,
            due,
            lapsed: false,
            graduated: true,
        }
    }

    /// A passing grade in review.
    fn review(&self, mut card: Card, quality: Quality, now: Timestamp) -> Transition {
        let interval =
            (card.interval as f64 * card.ease_factor * self.config.interval_modifier).round();
        card.interval = self.clamp_interval(interval);
        let ease = if quality.value() >= self.config.easy_grade {
            card.ease_factor + self.config.ease_bonus
        } else {
            card.ease_factor - self.config.hard_penalty
        };
        card.ease_factor = self.config.ease_range().clamp(ease);
        card.repetition_count = card.repetition_count.saturating_add(1);
        let due = now.plus_days(card.interval as i64);
        Transition {
            card,
            due,
            lapsed: false,
            graduated: false,
        }
    }

    /// A failing grade in any state but new.
    fn lapse(&self, mut card: Card, now: Timestamp) -> Transition {
        card.learning_state = LearningState::Relearning;
        card.learning_step = 0;
        card.graduated = false;
        card.lapses = card.lapses.saturating_add(1);
        card.ease_factor = self
            .config
            .ease_range()
            .clamp(card.ease_factor - self.config.ease_penalty);
        card.interval = self.config.min_interval;
        card.repetition_count = 0;
        let due = now.plus_minutes(step_minutes(&self.config.relearning_steps, 0));
        Transition {
            card,
            due,
            lapsed: true,
            graduated: false,
        }
    }

    fn steps(&self, state: LearningState) -> &[u32] {
        match state {
            LearningState::Relearning => &self.config.relearning_steps,
            _ => &self.config.learning_steps,
        }
    }

    fn clamp_interval(&self, days: f64) -> u32 {
        Range::new(
            self.config.min_interval as f64,
            self.config.max_interval as f64,
        )
        .clamp(days) as u32
    }
}

fn step_minutes(steps: &[u32], index: u32) -> i64 {
    steps
        .get(index as usize)
        .or(steps.last())
        .copied()
        .unwrap_or(MIN_DELAY_MINUTES as u32) as i64
}

/// Streak and response-time bookkeeping.
fn record_history(card: &mut Card, passed: bool, response_time_ms: Option<u64>) {
    card.correct_streak = if passed {
        card.correct_streak.saturating_add(1)
    } else {
        0
    };
    if let Some(ms) = response_time_ms {
        let n = card.timed_reviews as f64;
        card.average_response_time = (card.average_response_time * n + ms as f64) / (n + 1.0);
        card.timed_reviews = card.timed_reviews.saturating_add(1);
    }
}
