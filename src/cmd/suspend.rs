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

use crate::collection::Collection;
use crate::error::Fallible;
use crate::error::fail;

pub fn set_suspension(
    directory: Option<String>,
    user_id: &str,
    item_id: &str,
    suspended: bool,
) -> Fallible<()> {
    let coll: Collection = Collection::new(directory)?;
    suspend_card(&coll, user_id, item_id, suspended)?;
    println!("ok");
    Ok(())
}

pub fn suspend_card(
    coll: &Collection,
    user_id: &str,
    item_id: &str,
    suspended: bool,
) -> Fallible<()> {
    if coll.db.set_suspended(user_id, item_id, suspended)? {
        log::debug!("{user_id}/{item_id}: suspended={suspended}");
        Ok(())
    } else {
        fail(format!("no card {item_id} for learner {user_id}."))
    }
}
