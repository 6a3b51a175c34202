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
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::collection::Collection;
use crate::error::Fallible;
use crate::session::ReviewSession;
use crate::session::SessionRequest;
use crate::types::timestamp::Timestamp;

pub fn print_session(
    directory: Option<String>,
    request: SessionRequest,
    seed: Option<u64>,
) -> Fallible<()> {
    let coll: Collection = Collection::new(directory)?;
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let session = compose_session(&coll, &request, Timestamp::now(), &mut rng)?;
    let json: String = serde_json::to_string_pretty(&session)?;
    println!("{json}");
    Ok(())
}

pub fn compose_session<R: Rng + ?Sized>(
    coll: &Collection,
    request: &SessionRequest,
    now: Timestamp,
    rng: &mut R,
) -> Fallible<ReviewSession> {
    let cards = coll.db.user_cards(&request.user_id)?;
    let mistakes = coll.db.user_mistakes(&request.user_id)?;
    log::debug!(
        "Composing a session for {} from {} cards and {} mistake records.",
        request.user_id,
        cards.len(),
        mistakes.len()
    );
    let session = coll
        .engine
        .build_session(request, &cards, &mistakes, now, rng)?;
    Ok(session)
}
