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

use std::env::current_dir;
use std::path::PathBuf;

use crate::config::Config;
use crate::db::Database;
use crate::engine::Engine;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

pub const DATABASE_FILE: &str = "phrasecards.db";
pub const CONFIG_FILE: &str = "phrasecards.toml";

/// A directory holding a learner database and, optionally, a configuration
/// file.
pub struct Collection {
    pub directory: PathBuf,
    pub db: Database,
    pub engine: Engine,
}

impl Collection {
    pub fn new(directory: Option<String>) -> Fallible<Self> {
        let directory: PathBuf = match directory {
            Some(dir) => PathBuf::from(dir),
            None => current_dir()?,
        };
        let directory = if directory.exists() {
            directory.canonicalize()?
        } else {
            return fail("directory does not exist.");
        };

        let config = Config::load(&directory.join(CONFIG_FILE))?;
        let engine = Engine::new(config)?;

        let db_path: PathBuf = directory.join(DATABASE_FILE);
        let db_path: &str = db_path
            .to_str()
            .ok_or_else(|| ErrorReport::new("invalid path"))?;
        log::debug!("Opening {db_path}.");
        let db: Database = Database::new(db_path)?;

        Ok(Self {
            directory,
            db,
            engine,
        })
    }
}
