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

use std::fs::read_to_string;
use std::path::Path;

use serde::Serialize;

use crate::collection::Collection;
use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::card::CardRecord;
use crate::types::timestamp::Timestamp;

pub fn import_cards(directory: Option<String>, file: &Path) -> Fallible<()> {
    let coll: Collection = Collection::new(directory)?;
    let content = read_to_string(file)?;
    let summary = import_json(&coll, &content, Timestamp::now())?;
    let json: String = serde_json::to_string_pretty(&summary)?;
    println!("{json}");
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub rejected: Vec<Rejection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    /// Position in the input array.
    pub index: usize,
    pub reason: String,
}

/// Validate a JSON array of card records and save the good ones. A record
/// without an identity is skipped; out-of-range numbers are clamped.
pub fn import_json(coll: &Collection, content: &str, now: Timestamp) -> Fallible<ImportSummary> {
    let records: Vec<CardRecord> = serde_json::from_str(content)?;
    let mut cards: Vec<Card> = Vec::with_capacity(records.len());
    let mut rejected: Vec<Rejection> = Vec::new();
    let ease = coll.engine.scheduler().config().ease_range();
    for (index, record) in records.into_iter().enumerate() {
        match record.into_card(now, ease) {
            Ok(card) => cards.push(card),
            Err(e) => {
                log::warn!("Skipping record {index}: {e}");
                rejected.push(Rejection {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    coll.db.upsert_cards(&cards)?;
    Ok(ImportSummary {
        imported: cards.len(),
        rejected,
    })
}
