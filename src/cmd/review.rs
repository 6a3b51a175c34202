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
use crate::db::ReviewLog;
use crate::engine::ReviewEvent;
use crate::engine::ReviewResult;
use crate::error::Fallible;
use crate::scheduler::ReviewContext;
use crate::types::mistake::MistakeRecord;
use crate::types::timestamp::Timestamp;

pub fn review_item(directory: Option<String>, event: ReviewEvent) -> Fallible<()> {
    let coll: Collection = Collection::new(directory)?;
    let report: ReviewReport = submit_review(&coll, &event, Timestamp::now())?;
    let json: String = serde_json::to_string_pretty(&report)?;
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReport {
    pub review: ReviewResult,
    /// The learner's updated log for this item, when the answer was wrong.
    pub mistake_record: Option<MistakeRecord>,
    pub context: ReviewContext,
}

/// Score, schedule and persist one answer.
pub fn submit_review(
    coll: &Collection,
    event: &ReviewEvent,
    now: Timestamp,
) -> Fallible<ReviewReport> {
    let card = coll.db.get_card(&event.user_id, &event.item_id)?;
    let mut ctx = ReviewContext::default();
    let review = coll.engine.review(card.as_ref(), event, now, &mut ctx)?;

    let mistake_record = match &review.mistake {
        Some(mistake) => {
            let existing = coll
                .db
                .get_mistake_record(&event.user_id, &event.item_id)?;
            Some(coll.engine.log_mistake(
                existing,
                &event.user_id,
                &event.item_id,
                mistake.clone(),
                now,
            ))
        }
        None => None,
    };

    let outcome = &review.outcome;
    let log = ReviewLog {
        user_id: outcome.card.user_id.clone(),
        item_id: outcome.card.item_id.clone(),
        reviewed_at: now,
        quality: outcome.quality.value(),
        previous_state: outcome.previous_state,
        learning_state: outcome.card.learning_state,
        interval: outcome.card.interval,
        ease_factor: outcome.card.ease_factor,
        next_review: outcome.card.next_review,
        response_time_ms: event.response_time_ms.map(|ms| ms.min(i64::MAX as u64) as i64),
    };
    coll.db
        .save_review(&outcome.card, mistake_record.as_ref(), &log)?;

    if outcome.chronic_difficulty {
        log::warn!(
            "{}/{} has lapsed {} times.",
            outcome.card.user_id,
            outcome.card.item_id,
            outcome.card.lapses
        );
    }

    Ok(ReviewReport {
        review,
        mistake_record,
        context: ctx,
    })
}
