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

use rand::Rng;
use serde::Serialize;

use crate::advice::recommendations;
use crate::config::Config;
use crate::error::ValidationError;
use crate::memory::MemoryModel;
use crate::quality::Answer;
use crate::quality::DetailedAnalysis;
use crate::quality::detailed_analysis;
use crate::scheduler::CardScheduler;
use crate::scheduler::ReviewContext;
use crate::scheduler::ScheduleOutcome;
use crate::session::ReviewSession;
use crate::session::SessionComposer;
use crate::session::SessionRequest;
use crate::types::card::Card;
use crate::types::item_type::ItemType;
use crate::types::mistake::Mistake;
use crate::types::mistake::MistakeRecord;
use crate::types::mistake::MistakeType;
use crate::types::timestamp::Timestamp;

/// One answer, as reported by the answer-evaluation pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewEvent {
    pub user_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub user_answer: String,
    pub reference_answer: String,
    pub is_correct: bool,
    /// In [0, 1].
    pub recognizer_confidence: f64,
    /// In [0, 100].
    pub similarity_score: f64,
    pub response_time_ms: Option<u64>,
    /// When absent, inferred from the item type.
    pub mistake_type: Option<MistakeType>,
}

impl ReviewEvent {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.user_id.trim().is_empty() {
            return Err(ValidationError::new("userId", "must not be empty"));
        }
        if self.item_id.trim().is_empty() {
            return Err(ValidationError::new("itemId", "must not be empty"));
        }
        Ok(())
    }

    fn answer(&self) -> Answer {
        Answer {
            is_correct: self.is_correct,
            confidence: self.recognizer_confidence,
            score: self.similarity_score,
            response_time: self.response_time_ms.map(|ms| ms as f64 / 1000.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub analysis: DetailedAnalysis,
    pub recommendations: Vec<String>,
    pub outcome: ScheduleOutcome,
    /// Present when the answer was wrong. The caller appends it to the
    /// learner's mistake log.
    pub mistake: Option<Mistake>,
}

/// The scorer, scheduler and session composer under one configuration.
#[derive(Clone, Debug, Default)]
pub struct Engine {
    config: Config,
    scheduler: CardScheduler,
    composer: SessionComposer,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self, ValidationError> {
        config.validate()?;
        let memory = MemoryModel::new(config.memory.clone());
        let scheduler = CardScheduler::new(config.scheduler.clone(), memory.clone());
        let composer = SessionComposer::new(config.session.clone(), memory);
        Ok(Self {
            config,
            scheduler,
            composer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &MemoryModel {
        self.scheduler.memory()
    }

    pub fn scheduler(&self) -> &CardScheduler {
        &self.scheduler
    }

    /// Score an answer and schedule the card it was given for. A learner's
    /// first answer for an item creates the card.
    pub fn review(
        &self,
        card: Option<&Card>,
        event: &ReviewEvent,
        now: Timestamp,
        ctx: &mut ReviewContext,
    ) -> Result<ReviewResult, ValidationError> {
        event.validate()?;
        let card = match card {
            Some(card) => {
                if card.user_id != event.user_id || card.item_id != event.item_id {
                    return Err(ValidationError::new(
                        "itemId",
                        format!(
                            "event for {}/{} does not match card {}/{}",
                            event.user_id, event.item_id, card.user_id, card.item_id
                        ),
                    ));
                }
                card.clone()
            }
            None => self.scheduler.new_card(
                event.user_id.clone(),
                event.item_id.clone(),
                event.item_type,
                now,
            ),
        };

        let analysis = detailed_analysis(&event.answer());
        let outcome = self.scheduler.update(
            &card,
            analysis.result.quality,
            event.response_time_ms,
            now,
            ctx,
        )?;
        let mistake = if event.is_correct {
            None
        } else {
            Some(Mistake {
                timestamp: now,
                mistake_type: event
                    .mistake_type
                    .unwrap_or_else(|| MistakeType::default_for(card.item_type)),
                user_answer: event.user_answer.clone(),
                correct_answer: event.reference_answer.clone(),
            })
        };
        let recommendations = recommendations(&analysis);
        Ok(ReviewResult {
            analysis,
            recommendations,
            outcome,
            mistake,
        })
    }

    /// Append a mistake to a learner's log for an item, starting a new log if
    /// there is none.
    pub fn log_mistake(
        &self,
        record: Option<MistakeRecord>,
        user_id: &str,
        item_id: &str,
        mistake: Mistake,
        now: Timestamp,
    ) -> MistakeRecord {
        let mut record = record.unwrap_or_else(|| MistakeRecord::new(user_id, item_id, now));
        record.record(mistake, now, self.config.session.recency_window_days as f64);
        record
    }

    pub fn build_session<R: Rng + ?Sized>(
        &self,
        request: &SessionRequest,
        cards: &[Card],
        mistakes: &[MistakeRecord],
        now: Timestamp,
        rng: &mut R,
    ) -> Result<ReviewSession, ValidationError> {
        self.composer
            .build_session(request, cards, mistakes, now, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fallible;
    use crate::types::learning_state::LearningState;

    fn now() -> Fallible<Timestamp> {
        Timestamp::from_rfc3339("2025-06-01T09:30:00Z")
    }

    fn event(is_correct: bool) -> ReviewEvent {
        ReviewEvent {
            user_id: "u1".to_string(),
            item_id: "went".to_string(),
            item_type: ItemType::Pattern,
            user_answer: "I goed home".to_string(),
            reference_answer: "I went home".to_string(),
            is_correct,
            recognizer_confidence: 0.9,
            similarity_score: 95.0,
            response_time_ms: Some(2_000),
            mistake_type: None,
        }
    }

    #[test]
    fn test_first_answer_creates_card() -> Fallible<()> {
        let engine = Engine::default();
        let now = now()?;
        let mut ctx = ReviewContext::default();
        let result = engine.review(None, &event(true), now, &mut ctx)?;
        assert_eq!(result.analysis.result.quality.value(), 5);
        assert_eq!(result.outcome.card.item_id, "went");
        assert_eq!(result.outcome.card.learning_state, LearningState::Learning);
        assert!(result.mistake.is_none());
        assert_eq!(ctx.reviews, 1);
        Ok(())
    }

    #[test]
    fn test_wrong_answer_yields_mistake() -> Fallible<()> {
        let engine = Engine::default();
        let now = now()?;
        let result = engine.review(None, &event(false), now, &mut ReviewContext::default())?;
        assert_eq!(result.analysis.result.quality.value(), 2);
        let mistake = result.mistake.unwrap();
        assert_eq!(mistake.mistake_type, MistakeType::Grammar);
        assert_eq!(mistake.user_answer, "I goed home");
        assert_eq!(mistake.correct_answer, "I went home");

        let record = engine.log_mistake(None, "u1", "went", mistake.clone(), now);
        let record = engine.log_mistake(Some(record), "u1", "went", mistake, now);
        assert_eq!(record.incorrect_count, 2);
        // 2 * 1.0 + 2 * 0.5 + 0.3
        assert!((record.weight - 3.3).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_explicit_mistake_type_wins() -> Fallible<()> {
        let engine = Engine::default();
        let mut e = event(false);
        e.mistake_type = Some(MistakeType::Spelling);
        let result = engine.review(None, &e, now()?, &mut ReviewContext::default())?;
        assert_eq!(result.mistake.unwrap().mistake_type, MistakeType::Spelling);
        Ok(())
    }

    #[test]
    fn test_mismatched_card_is_rejected() -> Fallible<()> {
        let engine = Engine::default();
        let now = now()?;
        let card = Card::new("u2", "went", ItemType::Pattern, now);
        let err = engine
            .review(Some(&card), &event(true), now, &mut ReviewContext::default())
            .unwrap_err();
        assert_eq!(err.field, "itemId");
        Ok(())
    }

    #[test]
    fn test_missing_ids_are_rejected() -> Fallible<()> {
        let engine = Engine::default();
        let mut e = event(true);
        e.user_id = String::new();
        let err = engine
            .review(None, &e, now()?, &mut ReviewContext::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid userId: must not be empty");
        Ok(())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.session.default_limit = 0;
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn test_configured_initial_ease() -> Fallible<()> {
        let mut config = Config::default();
        config.scheduler.initial_ease_factor = 2.0;
        let engine = Engine::new(config)?;
        let result = engine.review(None, &event(true), now()?, &mut ReviewContext::default())?;
        assert_eq!(result.outcome.card.ease_factor, 2.0);
        Ok(())
    }
}
