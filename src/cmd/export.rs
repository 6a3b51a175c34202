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
use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::mistake::MistakeRecord;

pub fn export_collection(directory: Option<String>, user_id: Option<String>) -> Fallible<()> {
    let coll: Collection = Collection::new(directory)?;
    let export: Export = get_export(&coll, user_id.as_deref())?;
    let json: String = serde_json::to_string_pretty(&export)?;
    println!("{json}");
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Export {
    cards: Vec<Card>,
    mistakes: Vec<MistakeRecord>,
    reviews: Vec<ReviewLog>,
}

fn get_export(coll: &Collection, user_id: Option<&str>) -> Fallible<Export> {
    let (cards, mistakes) = match user_id {
        Some(user_id) => (coll.db.user_cards(user_id)?, coll.db.user_mistakes(user_id)?),
        None => (coll.db.all_cards()?, coll.db.all_mistakes()?),
    };
    let reviews = coll.db.reviews(user_id)?;
    Ok(Export {
        cards,
        mistakes,
        reviews,
    })
}
