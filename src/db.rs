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

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::config::DbConfig;
use rusqlite::params;
use serde::Serialize;

use crate::error::Fallible;
use crate::types::card::Card;
use crate::types::learning_state::LearningState;
use crate::types::mistake::Mistake;
use crate::types::mistake::MistakeRecord;
use crate::types::timestamp::Timestamp;

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// One row of the review log.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewLog {
    pub user_id: String,
    pub item_id: String,
    pub reviewed_at: Timestamp,
    pub quality: u8,
    pub previous_state: LearningState,
    pub learning_state: LearningState,
    pub interval: u32,
    pub ease_factor: f64,
    pub next_review: Timestamp,
    pub response_time_ms: Option<i64>,
}

const CARD_COLUMNS: &str = "user_id, item_id, item_type, ease_factor, interval, repetition_count, learning_state, learning_step, graduated, suspended, memory_strength, stability_factor, difficulty_factor, success_rate, last_reviewed, next_review, total_reviews, correct_streak, lapses, average_response_time, timed_reviews";

const REVIEW_COLUMNS: &str = "user_id, item_id, reviewed_at, quality, previous_state, learning_state, interval, ease_factor, next_review, response_time_ms";

impl Database {
    pub fn new(database_path: &str) -> Fallible<Self> {
        let mut conn = Connection::open(database_path)?;
        conn.set_db_config(DbConfig::SQLITE_DBCONFIG_ENABLE_FKEY, true)?;
        {
            let tx = conn.transaction()?;
            if !probe_schema_exists(&tx)? {
                log::debug!("Creating schema in {database_path}.");
                tx.execute_batch(include_str!("schema.sql"))?;
                tx.commit()?;
            }
        }
        let conn = Arc::new(Mutex::new(conn));
        Ok(Self { conn })
    }

    /// Fetch a learner's card for an item, if there is one.
    pub fn get_card(&self, user_id: &str, item_id: &str) -> Fallible<Option<Card>> {
        let conn = self.acquire();
        let sql = format!("select {CARD_COLUMNS} from cards where user_id = ? and item_id = ?;");
        let card = conn
            .query_row(&sql, [user_id, item_id], card_from_row)
            .optional()?;
        Ok(card)
    }

    /// Insert a card, or overwrite the existing one with the same identity.
    pub fn upsert_card(&self, card: &Card) -> Fallible<()> {
        log::debug!("Saving card {}/{}.", card.user_id, card.item_id);
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        upsert_card(&tx, card)?;
        tx.commit()?;
        Ok(())
    }

    /// Save many cards in one transaction.
    pub fn upsert_cards(&self, cards: &[Card]) -> Fallible<()> {
        log::debug!("Saving {} cards.", cards.len());
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        for card in cards {
            upsert_card(&tx, card)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn user_cards(&self, user_id: &str) -> Fallible<Vec<Card>> {
        let conn = self.acquire();
        let sql =
            format!("select {CARD_COLUMNS} from cards where user_id = ? order by item_id;");
        let mut stmt = conn.prepare(&sql)?;
        let cards = stmt
            .query_map([user_id], card_from_row)?
            .collect::<Result<Vec<Card>, _>>()?;
        Ok(cards)
    }

    pub fn all_cards(&self) -> Fallible<Vec<Card>> {
        let conn = self.acquire();
        let sql = format!("select {CARD_COLUMNS} from cards order by user_id, item_id;");
        let mut stmt = conn.prepare(&sql)?;
        let cards = stmt
            .query_map([], card_from_row)?
            .collect::<Result<Vec<Card>, _>>()?;
        Ok(cards)
    }

    /// Set or clear the suspension flag. Returns whether the card exists.
    pub fn set_suspended(&self, user_id: &str, item_id: &str, suspended: bool) -> Fallible<bool> {
        let conn = self.acquire();
        let sql = "update cards set suspended = ? where user_id = ? and item_id = ?;";
        let changed = conn.execute(sql, params![suspended, user_id, item_id])?;
        Ok(changed > 0)
    }

    pub fn get_mistake_record(
        &self,
        user_id: &str,
        sentence_id: &str,
    ) -> Fallible<Option<MistakeRecord>> {
        let conn = self.acquire();
        let sql = "select user_id, sentence_id, incorrect_count, last_incorrect_date, weight from mistakes where user_id = ? and sentence_id = ?;";
        let record = conn
            .query_row(sql, [user_id, sentence_id], record_from_row)
            .optional()?;
        match record {
            Some(mut record) => {
                record.recent_mistakes = load_entries(&conn, user_id, sentence_id)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Save a mistake record. Its ring of recent mistakes is replaced as a
    /// whole, in the same transaction.
    pub fn save_mistake_record(&self, record: &MistakeRecord) -> Fallible<()> {
        log::debug!(
            "Saving mistake record {}/{} (count={}, weight={:.2}).",
            record.user_id,
            record.sentence_id,
            record.incorrect_count,
            record.weight
        );
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        save_mistake_record(&tx, record)?;
        tx.commit()?;
        Ok(())
    }

    pub fn user_mistakes(&self, user_id: &str) -> Fallible<Vec<MistakeRecord>> {
        self.mistakes_where(Some(user_id))
    }

    pub fn all_mistakes(&self) -> Fallible<Vec<MistakeRecord>> {
        self.mistakes_where(None)
    }

    fn mistakes_where(&self, user_id: Option<&str>) -> Fallible<Vec<MistakeRecord>> {
        let conn = self.acquire();
        let sql = "select user_id, sentence_id, incorrect_count, last_incorrect_date, weight from mistakes where ?1 is null or user_id = ?1 order by user_id, sentence_id;";
        let mut stmt = conn.prepare(sql)?;
        let mut records = stmt
            .query_map([user_id], record_from_row)?
            .collect::<Result<Vec<MistakeRecord>, _>>()?;
        for record in records.iter_mut() {
            record.recent_mistakes = load_entries(&conn, &record.user_id, &record.sentence_id)?;
        }
        Ok(records)
    }

    pub fn insert_review(&self, review: &ReviewLog) -> Fallible<ReviewId> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        let review_id = insert_review(&tx, review)?;
        tx.commit()?;
        Ok(review_id)
    }

    /// Persist everything one answered review produces, atomically.
    pub fn save_review(
        &self,
        card: &Card,
        mistakes: Option<&MistakeRecord>,
        review: &ReviewLog,
    ) -> Fallible<ReviewId> {
        let mut conn = self.acquire();
        let tx = conn.transaction()?;
        upsert_card(&tx, card)?;
        if let Some(record) = mistakes {
            save_mistake_record(&tx, record)?;
        }
        let review_id = insert_review(&tx, review)?;
        tx.commit()?;
        log::debug!(
            "Saved review {review_id} of {}/{}.",
            card.user_id,
            card.item_id
        );
        Ok(review_id)
    }

    /// The review log, oldest first, optionally for a single learner.
    pub fn reviews(&self, user_id: Option<&str>) -> Fallible<Vec<ReviewLog>> {
        let conn = self.acquire();
        let sql = format!(
            "select {REVIEW_COLUMNS} from reviews where ?1 is null or user_id = ?1 order by reviewed_at, review_id;"
        );
        let mut stmt = conn.prepare(&sql)?;
        let reviews = stmt
            .query_map([user_id], review_from_row)?
            .collect::<Result<Vec<ReviewLog>, _>>()?;
        Ok(reviews)
    }

    pub fn card_count(&self) -> Fallible<usize> {
        self.count("select count(*) from cards;")
    }

    pub fn mistake_count(&self) -> Fallible<usize> {
        self.count("select count(*) from mistakes;")
    }

    pub fn review_count(&self) -> Fallible<usize> {
        self.count("select count(*) from reviews;")
    }

    fn count(&self, sql: &str) -> Fallible<usize> {
        let conn = self.acquire();
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn acquire(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

pub type ReviewId = i64;

fn card_from_row(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        user_id: row.get(0)?,
        item_id: row.get(1)?,
        item_type: row.get(2)?,
        ease_factor: row.get(3)?,
        interval: row.get(4)?,
        repetition_count: row.get(5)?,
        learning_state: row.get(6)?,
        learning_step: row.get(7)?,
        graduated: row.get(8)?,
        suspended: row.get(9)?,
        memory_strength: row.get(10)?,
        stability_factor: row.get(11)?,
        difficulty_factor: row.get(12)?,
        success_rate: row.get(13)?,
        last_reviewed: row.get(14)?,
        next_review: row.get(15)?,
        total_reviews: row.get(16)?,
        correct_streak: row.get(17)?,
        lapses: row.get(18)?,
        average_response_time: row.get(19)?,
        timed_reviews: row.get(20)?,
    })
}

fn upsert_card(tx: &Transaction, card: &Card) -> Fallible<()> {
    let sql = format!(
        "insert or replace into cards ({CARD_COLUMNS}) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);"
    );
    tx.execute(
        &sql,
        params![
            card.user_id,
            card.item_id,
            card.item_type,
            card.ease_factor,
            card.interval,
            card.repetition_count,
            card.learning_state,
            card.learning_step,
            card.graduated,
            card.suspended,
            card.memory_strength,
            card.stability_factor,
            card.difficulty_factor,
            card.success_rate,
            card.last_reviewed,
            card.next_review,
            card.total_reviews,
            card.correct_streak,
            card.lapses,
            card.average_response_time,
            card.timed_reviews,
        ],
    )?;
    Ok(())
}

fn record_from_row(row: &Row) -> rusqlite::Result<MistakeRecord> {
    Ok(MistakeRecord {
        user_id: row.get(0)?,
        sentence_id: row.get(1)?,
        incorrect_count: row.get(2)?,
        last_incorrect_date: row.get(3)?,
        recent_mistakes: VecDeque::new(),
        weight: row.get(4)?,
    })
}

fn load_entries(
    conn: &Connection,
    user_id: &str,
    sentence_id: &str,
) -> Fallible<VecDeque<Mistake>> {
    let sql = "select timestamp, mistake_type, user_answer, correct_answer from mistake_entries where user_id = ? and sentence_id = ? order by position;";
    let mut stmt = conn.prepare(sql)?;
    let entries = stmt
        .query_map([user_id, sentence_id], |row| {
            Ok(Mistake {
                timestamp: row.get(0)?,
                mistake_type: row.get(1)?,
                user_answer: row.get(2)?,
                correct_answer: row.get(3)?,
            })
        })?
        .collect::<Result<VecDeque<Mistake>, _>>()?;
    Ok(entries)
}

fn save_mistake_record(tx: &Transaction, record: &MistakeRecord) -> Fallible<()> {
    let sql = "insert into mistakes (user_id, sentence_id, incorrect_count, last_incorrect_date, weight) values (?, ?, ?, ?, ?) on conflict (user_id, sentence_id) do update set incorrect_count = excluded.incorrect_count, last_incorrect_date = excluded.last_incorrect_date, weight = excluded.weight;";
    tx.execute(
        sql,
        params![
            record.user_id,
            record.sentence_id,
            record.incorrect_count,
            record.last_incorrect_date,
            record.weight,
        ],
    )?;
    tx.execute(
        "delete from mistake_entries where user_id = ? and sentence_id = ?;",
        [&record.user_id, &record.sentence_id],
    )?;
    let sql = "insert into mistake_entries (user_id, sentence_id, position, timestamp, mistake_type, user_answer, correct_answer) values (?, ?, ?, ?, ?, ?, ?);";
    for (position, mistake) in record.recent_mistakes.iter().enumerate() {
        tx.execute(
            sql,
            params![
                record.user_id,
                record.sentence_id,
                position as i64,
                mistake.timestamp,
                mistake.mistake_type,
                mistake.user_answer,
                mistake.correct_answer,
            ],
        )?;
    }
    Ok(())
}

fn review_from_row(row: &Row) -> rusqlite::Result<ReviewLog> {
    Ok(ReviewLog {
        user_id: row.get(0)?,
        item_id: row.get(1)?,
        reviewed_at: row.get(2)?,
        quality: row.get(3)?,
        previous_state: row.get(4)?,
        learning_state: row.get(5)?,
        interval: row.get(6)?,
        ease_factor: row.get(7)?,
        next_review: row.get(8)?,
        response_time_ms: row.get(9)?,
    })
}

fn insert_review(tx: &Transaction, review: &ReviewLog) -> Fallible<ReviewId> {
    let sql = format!(
        "insert into reviews ({REVIEW_COLUMNS}) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) returning review_id;"
    );
    let review_id: ReviewId = tx.query_row(
        &sql,
        params![
            review.user_id,
            review.item_id,
            review.reviewed_at,
            review.quality,
            review.previous_state,
            review.learning_state,
            review.interval,
            review.ease_factor,
            review.next_review,
            review.response_time_ms,
        ],
        |row| row.get(0),
    )?;
    Ok(review_id)
}

fn probe_schema_exists(tx: &Transaction) -> Fallible<bool> {
    let sql = "select count(*) from sqlite_master where type='table' AND name=?;";
    let count: i64 = tx.query_row(sql, ["cards"], |row| row.get(0))?;
    Ok(count > 0)
}
