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

use phrasecards::engine::Engine;
use phrasecards::engine::ReviewEvent;
use phrasecards::error::Fallible;
use phrasecards::memory::MemoryModel;
use phrasecards::quality::Answer;
use phrasecards::quality::Quality;
use phrasecards::quality::calculate_quality;
use phrasecards::scheduler::CardScheduler;
use phrasecards::scheduler::ReviewContext;
use phrasecards::session::SessionRequest;
use phrasecards::session::SessionType;
use phrasecards::types::card::Card;
use phrasecards::types::item_type::ItemType;
use phrasecards::types::learning_state::LearningState;
use phrasecards::types::mistake::Mistake;
use phrasecards::types::mistake::MistakeRecord;
use phrasecards::types::mistake::MistakeType;
use phrasecards::types::timestamp::Timestamp;
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn epoch() -> Timestamp {
    Timestamp::from_rfc3339("2025-03-01T00:00:00Z").unwrap()
}

fn arb_card() -> impl Strategy<Value = Card> {
    (0.0..=1.0f64, 0.1..=365.0f64, 0.1..=5.0f64, 0u32..50, 0.0..=1.0f64).prop_map(
        |(strength, stability, difficulty, reviews, success)| {
            let now = epoch();
            let mut card = Card::new("u", "i", ItemType::Sentence, now);
            card.memory_strength = strength;
            card.stability_factor = stability;
            card.difficulty_factor = difficulty;
            card.total_reviews = reviews;
            card.success_rate = success;
            card.last_reviewed = Some(now);
            card
        },
    )
}

fn arb_answer() -> impl Strategy<Value = Answer> {
    (
        any::<bool>(),
        -0.5..=1.5f64,
        -20.0..=120.0f64,
        proptest::option::of(0.0..=120.0f64),
    )
        .prop_map(|(is_correct, confidence, score, response_time)| Answer {
            is_correct,
            confidence,
            score,
            response_time,
        })
}

proptest! {
    #[test]
    fn retention_never_increases_with_time(
        card in arb_card(),
        h1 in 0.0..=10_000.0f64,
        dh in 0.0..=10_000.0f64,
    ) {
        let model = MemoryModel::default();
        let early = model.retention(&card, h1);
        let late = model.retention(&card, h1 + dh);
        prop_assert!(late <= early);
        prop_assert!((0.0..=1.0).contains(&late));
    }

    #[test]
    fn state_stays_in_bounds(
        steps in proptest::collection::vec((0u8..=5, proptest::option::of(0u64..60_000), 0i64..20_000), 1..40),
    ) {
        let scheduler = CardScheduler::default();
        let mut now = epoch();
        let mut card = scheduler.new_card("u", "i", ItemType::Pattern, now);
        let mut ctx = ReviewContext::default();
        for (q, ms, wait) in steps {
            now = now.plus_minutes(wait);
            let quality = Quality::new(q as i64).unwrap();
            let outcome = scheduler.update(&card, quality, ms, now, &mut ctx).unwrap();
            card = outcome.card;
            prop_assert!((0.1..=1.0).contains(&card.memory_strength));
            prop_assert!((1.0..=365.0).contains(&card.stability_factor));
            prop_assert!((1.3..=3.5).contains(&card.ease_factor));
            prop_assert!((1..=36_500).contains(&card.interval));
            prop_assert!(card.next_review > now);
            prop_assert!((0.0..=1.0).contains(&card.success_rate));
            prop_assert!(!card.suspended);
        }
        prop_assert_eq!(ctx.reviews as usize, card.total_reviews as usize);
    }

    #[test]
    fn confident_misses_grade_higher(
        high in 0.71..=1.0f64,
        low in 0.0..=0.4f64,
        score in 0.0..=100.0f64,
        time in proptest::option::of(0.0..=60.0f64),
    ) {
        let miss = |confidence| Answer { is_correct: false, confidence, score, response_time: time };
        prop_assert!(calculate_quality(&miss(high)).quality > calculate_quality(&miss(low)).quality);
    }

    #[test]
    fn scoring_is_pure(answer in arb_answer()) {
        let first = calculate_quality(&answer);
        let second = calculate_quality(&answer);
        prop_assert!(first.quality.value() <= 5);
        prop_assert_eq!(first, second);
    }
}

fn event(
    item: &str,
    is_correct: bool,
    confidence: f64,
    score: f64,
    ms: Option<u64>,
) -> ReviewEvent {
    ReviewEvent {
        user_id: "learner".to_string(),
        item_id: item.to_string(),
        item_type: ItemType::Sentence,
        user_answer: "answer".to_string(),
        reference_answer: "reference".to_string(),
        is_correct,
        recognizer_confidence: confidence,
        similarity_score: score,
        response_time_ms: ms,
        mistake_type: None,
    }
}

fn review_card(item: &str, now: Timestamp) -> Card {
    let mut card = Card::new("learner", item, ItemType::Sentence, now.plus_days(-6));
    card.learning_state = LearningState::Review;
    card.graduated = true;
    card.interval = 6;
    card.ease_factor = 2.5;
    card.total_reviews = 3;
    card.success_rate = 0.8;
    card.memory_strength = 0.8;
    card.last_reviewed = Some(now.plus_days(-6));
    card.next_review = now;
    card
}

#[test]
fn first_perfect_review() -> Fallible<()> {
    let engine = Engine::default();
    let now = epoch();
    let result = engine.review(
        None,
        &event("s1", true, 0.9, 95.0, Some(2_000)),
        now,
        &mut ReviewContext::default(),
    )?;
    assert_eq!(result.analysis.result.quality.value(), 5);
    let card = result.outcome.card;
    assert_eq!(card.learning_state, LearningState::Learning);
    assert_eq!(card.learning_step, 0);
    assert!(card.next_review > now);
    assert!(card.next_review <= now.plus_minutes(1));
    Ok(())
}

#[test]
fn review_pass_multiplies_interval() -> Fallible<()> {
    let engine = Engine::default();
    let now = epoch();
    let card = review_card("s1", now);
    let result = engine.review(
        Some(&card),
        &event("s1", true, 0.9, 85.0, Some(8_000)),
        now,
        &mut ReviewContext::default(),
    )?;
    assert_eq!(result.analysis.result.quality.value(), 4);
    assert_eq!(result.outcome.card.interval, 15);
    assert!((result.outcome.card.ease_factor - 2.6).abs() < 1e-9);
    Ok(())
}

#[test]
fn review_failure_relearns() -> Fallible<()> {
    let engine = Engine::default();
    let now = epoch();
    let card = review_card("s1", now);
    let result = engine.review(
        Some(&card),
        &event("s1", false, 0.2, 10.0, None),
        now,
        &mut ReviewContext::default(),
    )?;
    assert_eq!(result.analysis.result.quality.value(), 0);
    let after = result.outcome.card;
    assert_eq!(after.learning_state, LearningState::Relearning);
    assert_eq!(after.lapses, card.lapses + 1);
    assert_eq!(after.interval, 1);
    assert!(result.mistake.is_some());
    Ok(())
}

#[test]
fn mixed_session_of_thirty() -> Fallible<()> {
    let engine = Engine::default();
    let now = epoch();
    let mut cards: Vec<Card> = (0..50)
        .map(|i| review_card(&format!("due-{i}"), now))
        .collect();
    let mut mistakes = Vec::new();
    for item in ["miss-1", "miss-2"] {
        cards.push(review_card(item, now));
        let mut record = MistakeRecord::new("learner", item, now);
        record.record(
            Mistake {
                timestamp: now.plus_days(-1),
                mistake_type: MistakeType::Structure,
                user_answer: "x".to_string(),
                correct_answer: "y".to_string(),
            },
            now,
            3.0,
        );
        mistakes.push(record);
    }
    let request = SessionRequest {
        limit: Some(30),
        ..SessionRequest::new("learner")
    };
    let mut rng = ChaCha8Rng::seed_from_u64(2025);
    let session = engine.build_session(&request, &cards, &mistakes, now, &mut rng)?;
    assert_eq!(session.incorrect_priority.len(), 2);
    assert_eq!(session.regular.len(), 28);
    assert_eq!(session.session_type, SessionType::Mixed);
    assert!(session.warnings.is_empty());
    Ok(())
}

#[test]
fn well_known_card_is_mastered() -> Fallible<()> {
    let model = MemoryModel::default();
    let now = epoch();
    let mut card = review_card("s1", now);
    card.total_reviews = 6;
    card.success_rate = 0.95;
    card.memory_strength = 0.93;
    card.last_reviewed = Some(now);
    assert!(model.is_mastered(&card, now));
    card.total_reviews = 4;
    assert!(!model.is_mastered(&card, now));
    Ok(())
}
