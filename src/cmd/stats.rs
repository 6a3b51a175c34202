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

use crate::collection::Collection;
use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::learning_state::LearningState;
use crate::types::timestamp::Timestamp;

pub fn print_stats(directory: Option<String>, user_id: String) -> Fallible<()> {
    let coll: Collection = Collection::new(directory)?;
    let stats = learner_stats(&coll, &user_id, Timestamp::now())?;
    let stats_json = serde_json::to_string_pretty(&stats)?;
    println!("{}", stats_json);
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    user_id: String,
    card_count: usize,
    new_count: usize,
    learning_count: usize,
    review_count: usize,
    relearning_count: usize,
    suspended_count: usize,
    due_count: usize,
    mastered_count: usize,
    /// Items that have lapsed at least as often as the configured threshold.
    chronic_difficulty: Vec<String>,
    mistakes_in_window: usize,
    review_log_count: usize,
    retention: RetentionPreview,
}

/// Mean predicted retention over the learner's reviewed, unsuspended cards.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPreview {
    now: Option<f64>,
    in_24_hours: Option<f64>,
    in_7_days: Option<f64>,
    /// Items predicted to fall below the retention threshold within 24 hours.
    at_risk: Vec<String>,
}

pub fn learner_stats(coll: &Collection, user_id: &str, now: Timestamp) -> Fallible<Stats> {
    let cards = coll.db.user_cards(user_id)?;
    let mistakes = coll.db.user_mistakes(user_id)?;
    let reviews = coll.db.reviews(Some(user_id))?;
    let config = coll.engine.config();
    let memory = coll.engine.memory();

    let in_state = |state: LearningState| {
        cards
            .iter()
            .filter(|c| c.learning_state == state)
            .count()
    };
    let window = config.session.recency_window_days as f64;

    let tracked: Vec<&Card> = cards
        .iter()
        .filter(|c| c.last_reviewed.is_some() && !c.suspended)
        .collect();
    let mean_at = |at: Timestamp| -> Option<f64> {
        if tracked.is_empty() {
            None
        } else {
            let sum: f64 = tracked.iter().map(|c| memory.predict_strength(c, at)).sum();
            Some(sum / tracked.len() as f64)
        }
    };
    let tomorrow = now.plus_hours(24.0);
    let at_risk: Vec<String> = tracked
        .iter()
        .filter(|c| memory.predict_strength(c, tomorrow) < config.memory.retention_threshold)
        .map(|c| c.item_id.clone())
        .collect();

    Ok(Stats {
        user_id: user_id.to_string(),
        card_count: cards.len(),
        new_count: in_state(LearningState::New),
        learning_count: in_state(LearningState::Learning),
        review_count: in_state(LearningState::Review),
        relearning_count: in_state(LearningState::Relearning),
        suspended_count: cards.iter().filter(|c| c.suspended).count(),
        due_count: cards
            .iter()
            .filter(|c| !c.suspended && c.is_due(now))
            .count(),
        mastered_count: cards.iter().filter(|c| memory.is_mastered(c, now)).count(),
        chronic_difficulty: cards
            .iter()
            .filter(|c| c.lapses >= config.scheduler.lapse_threshold)
            .map(|c| c.item_id.clone())
            .collect(),
        mistakes_in_window: mistakes.iter().filter(|m| m.is_recent(now, window)).count(),
        review_log_count: reviews.len(),
        retention: RetentionPreview {
            now: mean_at(now),
            in_24_hours: mean_at(tomorrow),
            in_7_days: mean_at(now.plus_days(7)),
            at_risk,
        },
    })
}
