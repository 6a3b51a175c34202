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

//! An exponential forgetting curve over a card's memory state.
//!
//! Retention after `t` hours is `exp(-t / S) * strength`, where `S` is the
//! card's stability adjusted for difficulty, strength, review count and
//! consistency.

use serde::Deserialize;
use serde::Serialize;

use crate::quality::Quality;
use crate::types::card::Card;
use crate::types::card::DIFFICULTY_FACTOR;
use crate::types::range::Range;
use crate::types::range::UNIT;
use crate::types::timestamp::Timestamp;

/// Stability bounds after a review.
pub const REVIEWED_STABILITY: Range = Range::new(1.0, 365.0);

/// Strength bounds after a review.
pub const REVIEWED_STRENGTH: Range = Range::new(0.1, 1.0);

/// The adjusted stability never drops below one hour.
const MIN_ADJUSTED_STABILITY: f64 = 1.0;

/// Grades at or above this count as a successful recall for the memory model.
const RECALL_GRADE: u8 = 3;

const REVIEW_BONUS_STEP: f64 = 0.05;
const REVIEW_BONUS_CAP: f64 = 0.5;
const SUCCESS_RATE_ALPHA: f64 = 0.1;
const LAPSE_STABILITY_DECAY: f64 = 0.8;
const DIFFICULTY_MEMORY: f64 = 0.8;

/// Tunable constants of the forgetting curve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MemoryParams {
    /// Stability given to newly created cards.
    pub initial_stability: f64,
    pub stability_factor: f64,
    pub difficulty_weight: f64,
    pub strength_weight: f64,
    pub consistency_bonus: f64,
    /// Per-quality-point stability growth on a successful review.
    pub stability_gain: f64,
    /// Retention at which a review is considered due.
    pub retention_threshold: f64,
    /// Retention below which an item is considered forgotten.
    pub forget_threshold: f64,
}

impl Default for MemoryParams {
    fn default() -> Self {
        Self {
            initial_stability: 1.0,
            stability_factor: 2.0,
            difficulty_weight: 0.3,
            strength_weight: 0.4,
            consistency_bonus: 0.1,
            stability_gain: 0.1,
            retention_threshold: 0.7,
            forget_threshold: 0.1,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryModel {
    params: MemoryParams,
}

impl MemoryModel {
    pub fn new(params: MemoryParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &MemoryParams {
        &self.params
    }

    /// The card's stability adjusted for its difficulty, strength, review
    /// history and consistency, in hours.
    pub fn adjusted_stability(&self, card: &Card) -> f64 {
        let p = &self.params;
        let review_bonus = (card.total_reviews as f64 * REVIEW_BONUS_STEP).min(REVIEW_BONUS_CAP);
        let s = card.stability_factor
            * p.stability_factor
            * (1.0 - card.difficulty_factor * p.difficulty_weight)
            * (1.0 + card.memory_strength * p.strength_weight)
            * (1.0 + review_bonus)
            * (1.0 + card.success_rate * p.consistency_bonus);
        if s.is_finite() {
            s.max(MIN_ADJUSTED_STABILITY)
        } else {
            MIN_ADJUSTED_STABILITY
        }
    }

    /// Retention after `hours` have elapsed since the last review.
    pub fn retention(&self, card: &Card, hours: f64) -> f64 {
        let hours = if hours.is_finite() { hours.max(0.0) } else { 0.0 };
        let s = self.adjusted_stability(card);
        UNIT.clamp((-hours / s).exp() * card.memory_strength)
    }

    pub fn current_strength(&self, card: &Card, now: Timestamp) -> f64 {
        self.predict_strength(card, now)
    }

    /// Retention at an arbitrary instant, assuming no review happens before.
    pub fn predict_strength(&self, card: &Card, at: Timestamp) -> f64 {
        self.retention(card, elapsed_hours(card, at))
    }

    /// Hours after the last review at which retention reaches `threshold`,
    /// or `None` if it is already at or below it.
    fn hours_until(&self, card: &Card, threshold: f64) -> Option<f64> {
        let strength = card.memory_strength;
        if !(strength > 0.0) || !(threshold > 0.0) {
            return None;
        }
        let ratio = threshold / strength;
        if ratio >= 1.0 {
            return None;
        }
        Some(-self.adjusted_stability(card) * ratio.ln())
    }

    /// When retention is predicted to fall to `threshold`. If it already has,
    /// or the card was never reviewed, that is `now`. The result can lie in
    /// the past for an overdue card.
    pub fn optimal_review_time(&self, card: &Card, threshold: f64, now: Timestamp) -> Timestamp {
        match (card.last_reviewed, self.hours_until(card, threshold)) {
            (Some(last), Some(hours)) => last.plus_hours(hours),
            _ => now,
        }
    }

    /// Hours left until retention falls below `threshold`, floored at zero.
    pub fn time_to_forget(&self, card: &Card, threshold: f64, now: Timestamp) -> f64 {
        match self.hours_until(card, threshold) {
            Some(hours) => (hours - elapsed_hours(card, now)).max(0.0),
            None => 0.0,
        }
    }

    /// Refresh the memory state after a review.
    pub fn update_after_review(
        &self,
        card: &Card,
        quality: Quality,
        response_time_ms: Option<u64>,
        now: Timestamp,
    ) -> Card {
        let q = quality.as_f64();
        let recalled = quality.value() >= RECALL_GRADE;

        let strength = REVIEWED_STRENGTH.clamp(card.memory_strength + (q - 2.5) * 0.1 + 0.1);
        let stability = if recalled {
            card.stability_factor * (1.0 + q * self.params.stability_gain)
        } else {
            card.stability_factor * LAPSE_STABILITY_DECAY
        };
        let stability = REVIEWED_STABILITY.clamp(stability);
        let difficulty = DIFFICULTY_FACTOR.clamp(
            DIFFICULTY_MEMORY * card.difficulty_factor
                + (1.0 - DIFFICULTY_MEMORY) * (1.0 - time_weight(response_time_ms)),
        );
        let outcome = if recalled { 1.0 } else { 0.0 };
        let success_rate = if card.total_reviews == 0 {
            outcome
        } else {
            UNIT.clamp(
                (1.0 - SUCCESS_RATE_ALPHA) * card.success_rate + SUCCESS_RATE_ALPHA * outcome,
            )
        };

        Card {
            memory_strength: strength,
            stability_factor: stability,
            difficulty_factor: difficulty,
            success_rate,
            total_reviews: card.total_reviews.saturating_add(1),
            last_reviewed: Some(now),
            ..card.clone()
        }
    }

    pub fn is_mastered(&self, card: &Card, now: Timestamp) -> bool {
        self.current_strength(card, now) >= 0.9
            && card.total_reviews >= 5
            && card.success_rate >= 0.9
    }
}

fn elapsed_hours(card: &Card, at: Timestamp) -> f64 {
    match card.last_reviewed {
        Some(last) => at.hours_since(last).max(0.0),
        None => 0.0,
    }
}

/// How much a response time says about ease of recall. A missing time is
/// treated as neutral.
fn time_weight(response_time_ms: Option<u64>) -> f64 {
    match response_time_ms {
        Some(ms) if ms <= 2_000 => 1.0,
        Some(ms) if ms <= 5_000 => 0.8,
        Some(ms) if ms <= 10_000 => 0.5,
        Some(_) => 0.2,
        None => 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fallible;
    use crate::types::item_type::ItemType;

    fn now() -> Fallible<Timestamp> {
        Timestamp::from_rfc3339("2025-06-01T12:00:00Z")
    }

    fn quality(q: i64) -> Quality {
        Quality::new(q).unwrap()
    }

    fn reviewed_card(now: Timestamp) -> Card {
        let mut card = Card::new("u1", "s1", ItemType::Sentence, now);
        card.last_reviewed = Some(now);
        card.memory_strength = 0.8;
        card.stability_factor = 10.0;
        card.difficulty_factor = 0.5;
        card.total_reviews = 3;
        card.success_rate = 1.0;
        card
    }

    #[test]
    fn test_adjusted_stability() -> Fallible<()> {
        let model = MemoryModel::default();
        let card = reviewed_card(now()?);
        // 10 * 2 * 0.85 * 1.32 * 1.15 * 1.1
        let expected = 10.0 * 2.0 * 0.85 * 1.32 * 1.15 * 1.1;
        assert!((model.adjusted_stability(&card) - expected).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_adjusted_stability_floor() -> Fallible<()> {
        let model = MemoryModel::default();
        let mut card = reviewed_card(now()?);
        card.difficulty_factor = 5.0;
        assert_eq!(model.adjusted_stability(&card), 1.0);
        Ok(())
    }

    #[test]
    fn test_retention_decays() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let card = reviewed_card(now);
        assert!((model.current_strength(&card, now) - 0.8).abs() < 1e-12);
        let day = model.predict_strength(&card, now.plus_days(1));
        let week = model.predict_strength(&card, now.plus_days(7));
        assert!(day < 0.8);
        assert!(week < day);
        assert!(week >= 0.0);
        Ok(())
    }

    #[test]
    fn test_never_reviewed_card_does_not_decay() -> Fallible<()> {
        let model = MemoryModel::default();
        let card = Card::new("u1", "s1", ItemType::Sentence, now()?);
        assert_eq!(model.predict_strength(&card, now()?.plus_days(30)), 0.5);
        assert_eq!(model.optimal_review_time(&card, 0.7, now()?), now()?);
        Ok(())
    }

    #[test]
    fn test_optimal_review_time_hits_threshold() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let card = reviewed_card(now);
        let at = model.optimal_review_time(&card, 0.7, now);
        assert!(at > now);
        let retention = model.predict_strength(&card, at);
        assert!((retention - 0.7).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_optimal_review_time_when_already_weak() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let mut card = reviewed_card(now.plus_days(-1));
        card.memory_strength = 0.6;
        assert_eq!(model.optimal_review_time(&card, 0.7, now), now);
        Ok(())
    }

    #[test]
    fn test_time_to_forget() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let card = reviewed_card(now);
        let s = model.adjusted_stability(&card);
        let expected = -s * (0.1f64 / 0.8).ln();
        assert!((model.time_to_forget(&card, 0.1, now) - expected).abs() < 1e-9);
        let later = now.plus_hours(10.0);
        assert!((model.time_to_forget(&card, 0.1, later) - (expected - 10.0)).abs() < 1e-6);
        assert_eq!(model.time_to_forget(&card, 0.1, now.plus_days(3650)), 0.0);
        Ok(())
    }

    #[test]
    fn test_update_after_perfect_review() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let card = Card::new("u1", "s1", ItemType::Sentence, now);
        let updated = model.update_after_review(&card, quality(5), Some(1_500), now);
        assert!((updated.memory_strength - 0.85).abs() < 1e-9);
        assert!((updated.stability_factor - 1.5).abs() < 1e-9);
        assert!((updated.difficulty_factor - 0.8).abs() < 1e-9);
        assert_eq!(updated.success_rate, 1.0);
        assert_eq!(updated.total_reviews, 1);
        assert_eq!(updated.last_reviewed, Some(now));
        Ok(())
    }

    #[test]
    fn test_update_after_failed_review() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let card = reviewed_card(now.plus_days(-2));
        let updated = model.update_after_review(&card, quality(0), Some(20_000), now);
        assert!((updated.memory_strength - 0.65).abs() < 1e-9);
        assert!((updated.stability_factor - 8.0).abs() < 1e-9);
        assert!((updated.difficulty_factor - (0.4 + 0.2 * 0.8)).abs() < 1e-9);
        assert!((updated.success_rate - 0.9).abs() < 1e-9);
        assert_eq!(updated.total_reviews, 4);
        Ok(())
    }

    #[test]
    fn test_update_clamps() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let mut card = reviewed_card(now);
        card.memory_strength = 1.0;
        card.stability_factor = 360.0;
        let updated = model.update_after_review(&card, quality(5), None, now);
        assert_eq!(updated.memory_strength, 1.0);
        assert_eq!(updated.stability_factor, 365.0);

        card.memory_strength = 0.1;
        card.stability_factor = 0.1;
        let updated = model.update_after_review(&card, quality(0), None, now);
        assert_eq!(updated.memory_strength, 0.1);
        assert_eq!(updated.stability_factor, 1.0);
        Ok(())
    }

    #[test]
    fn test_is_mastered() -> Fallible<()> {
        let model = MemoryModel::default();
        let now = now()?;
        let mut card = reviewed_card(now);
        card.total_reviews = 6;
        card.success_rate = 0.95;
        card.memory_strength = 0.93;
        assert!(model.is_mastered(&card, now));

        card.total_reviews = 4;
        assert!(!model.is_mastered(&card, now));
        card.total_reviews = 6;
        card.success_rate = 0.85;
        assert!(!model.is_mastered(&card, now));
        card.success_rate = 0.95;
        assert!(!model.is_mastered(&card, now.plus_days(30)));
        Ok(())
    }

    #[test]
    fn test_time_weight_buckets() {
        assert_eq!(time_weight(Some(2_000)), 1.0);
        assert_eq!(time_weight(Some(5_000)), 0.8);
        assert_eq!(time_weight(Some(10_000)), 0.5);
        assert_eq!(time_weight(Some(10_001)), 0.2);
        assert_eq!(time_weight(None), 0.5);
    }
}
