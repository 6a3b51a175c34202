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

use std::fmt::Display;
use std::fmt::Formatter;

use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ErrorReport;
use crate::error::fail;

/// Where a card is in the scheduling state machine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LearningState {
    /// Never reviewed.
    #[default]
    New,
    /// Working through the initial learning steps.
    Learning,
    /// Graduated, scheduled in days.
    Review,
    /// Lapsed, working through the relearning steps.
    Relearning,
}

impl LearningState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LearningState::New => "NEW",
            LearningState::Learning => "LEARNING",
            LearningState::Review => "REVIEW",
            LearningState::Relearning => "RELEARNING",
        }
    }
}

impl Display for LearningState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<String> for LearningState {
    type Error = ErrorReport;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "NEW" => Ok(LearningState::New),
            "LEARNING" => Ok(LearningState::Learning),
            "REVIEW" => Ok(LearningState::Review),
            "RELEARNING" => Ok(LearningState::Relearning),
            _ => fail(format!("Invalid learning state: {}", value)),
        }
    }
}

impl ToSql for LearningState {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LearningState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        LearningState::try_from(string).map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
