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

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::analyze::analyze_answer;
use crate::cmd::check::check_collection;
use crate::cmd::export::export_collection;
use crate::cmd::import::import_cards;
use crate::cmd::review::review_item;
use crate::cmd::session::print_session;
use crate::cmd::stats::print_stats;
use crate::cmd::suspend::set_suspension;
use crate::engine::ReviewEvent;
use crate::error::Fallible;
use crate::quality::Answer;
use crate::session::SessionRequest;
use crate::session::SortBy;
use crate::types::item_type::ItemType;
use crate::types::mistake::MistakeType;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Submit an answer and reschedule its card.
    Review {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        /// The learner.
        #[arg(long)]
        user: String,
        /// The item that was answered.
        #[arg(long)]
        item: String,
        /// The kind of item. Only used when the card is created.
        #[arg(long = "type", value_enum, default_value_t = ItemType::Sentence)]
        item_type: ItemType,
        /// Whether the answer was judged correct.
        #[arg(long)]
        correct: bool,
        /// Recognizer confidence, from 0 to 1.
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        /// Similarity to the reference answer, from 0 to 100.
        #[arg(long, default_value_t = 0.0)]
        score: f64,
        /// Response time in milliseconds.
        #[arg(long)]
        response_ms: Option<u64>,
        /// What the learner answered.
        #[arg(long, default_value = "")]
        answer: String,
        /// The reference answer.
        #[arg(long, default_value = "")]
        expected: String,
        /// Classify a wrong answer. Inferred from the item type if omitted.
        #[arg(long, value_enum)]
        mistake_type: Option<MistakeType>,
    },
    /// Compose a review session.
    Session {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        #[arg(long)]
        user: String,
        /// Number of items, from 1 to 100. Defaults to the configured limit.
        #[arg(long)]
        limit: Option<i64>,
        /// Leave out cards that have never been reviewed.
        #[arg(long)]
        no_new: bool,
        /// How to order due cards.
        #[arg(long, value_enum, default_value_t = SortBy::Priority)]
        sort_by: SortBy,
        /// Share of the session reserved for recently missed items.
        #[arg(long)]
        incorrect_ratio: Option<f64>,
        /// Seed for tie-breaking, for a reproducible order.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Grade an answer and explain the grade, without touching the store.
    Analyze {
        #[arg(long)]
        correct: bool,
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        #[arg(long, default_value_t = 0.0)]
        score: f64,
        /// Response time in milliseconds.
        #[arg(long)]
        response_ms: Option<u64>,
    },
    /// Print a learner's statistics as JSON.
    Stats {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        #[arg(long)]
        user: String,
    },
    /// Exclude a card from sessions.
    Suspend {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        #[arg(long)]
        user: String,
        #[arg(long)]
        item: String,
    },
    /// Return a suspended card to sessions.
    Unsuspend {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        #[arg(long)]
        user: String,
        #[arg(long)]
        item: String,
    },
    /// Import card records from a JSON file.
    Import {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        /// A JSON array of card records.
        #[arg(long)]
        file: PathBuf,
    },
    /// Export cards, mistakes and the review log as JSON.
    Export {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
        /// Only export this learner.
        #[arg(long)]
        user: Option<String>,
    },
    /// Check the configuration and database of a collection.
    Check {
        /// Path to the collection directory. By default, the current working directory is used.
        directory: Option<String>,
    },
}

pub fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Review {
            directory,
            user,
            item,
            item_type,
            correct,
            confidence,
            score,
            response_ms,
            answer,
            expected,
            mistake_type,
        } => {
            let event = ReviewEvent {
                user_id: user,
                item_id: item,
                item_type,
                user_answer: answer,
                reference_answer: expected,
                is_correct: correct,
                recognizer_confidence: confidence,
                similarity_score: score,
                response_time_ms: response_ms,
                mistake_type,
            };
            review_item(directory, event)
        }
        Command::Session {
            directory,
            user,
            limit,
            no_new,
            sort_by,
            incorrect_ratio,
            seed,
        } => {
            let request = SessionRequest {
                user_id: user,
                limit,
                include_new: !no_new,
                sort_by,
                incorrect_ratio,
            };
            print_session(directory, request, seed)
        }
        Command::Analyze {
            correct,
            confidence,
            score,
            response_ms,
        } => analyze_answer(Answer {
            is_correct: correct,
            confidence,
            score,
            response_time: response_ms.map(|ms| ms as f64 / 1000.0),
        }),
        Command::Stats { directory, user } => print_stats(directory, user),
        Command::Suspend {
            directory,
            user,
            item,
        } => set_suspension(directory, &user, &item, true),
        Command::Unsuspend {
            directory,
            user,
            item,
        } => set_suspension(directory, &user, &item, false),
        Command::Import { directory, file } => import_cards(directory, &file),
        Command::Export { directory, user } => export_collection(directory, user),
        Command::Check { directory } => check_collection(directory),
    }
}
