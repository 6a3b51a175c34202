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

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::error::ValidationError;
use crate::memory::MemoryParams;
use crate::scheduler::SchedulerConfig;
use crate::session::SessionConfig;

/// Every tunable of the engine. Missing keys take their defaults; unknown
/// keys are rejected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    pub memory: MemoryParams,
    pub session: SessionConfig,
}

impl Config {
    /// Read and validate a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Fallible<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults.", path.display());
            return Ok(Self::default());
        }
        let content = read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded config from {}.", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its documented bounds. Returns the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let s = &self.scheduler;
        within("scheduler.min_ease_factor", s.min_ease_factor, 1.0, 2.0)?;
        within("scheduler.max_ease_factor", s.max_ease_factor, 2.0, 5.0)?;
        within(
            "scheduler.initial_ease_factor",
            s.initial_ease_factor,
            s.min_ease_factor,
            s.max_ease_factor,
        )?;
        within("scheduler.ease_bonus", s.ease_bonus, 0.0, 1.0)?;
        within("scheduler.ease_penalty", s.ease_penalty, 0.0, 1.0)?;
        within("scheduler.hard_penalty", s.hard_penalty, 0.0, 1.0)?;
        steps("scheduler.learning_steps", &s.learning_steps)?;
        steps("scheduler.relearning_steps", &s.relearning_steps)?;
        within_int("scheduler.graduating_interval", s.graduating_interval, 1, 30)?;
        within_int(
            "scheduler.easy_interval",
            s.easy_interval,
            s.graduating_interval,
            60,
        )?;
        within_int("scheduler.min_interval", s.min_interval, 1, 30)?;
        within_int("scheduler.max_interval", s.max_interval, 100, 36500)?;
        within("scheduler.interval_modifier", s.interval_modifier, 0.5, 2.0)?;
        within_int("scheduler.passing_grade", s.passing_grade as u32, 1, 5)?;
        within_int(
            "scheduler.easy_grade",
            s.easy_grade as u32,
            s.passing_grade as u32,
            5,
        )?;
        within_int("scheduler.lapse_threshold", s.lapse_threshold, 1, 100)?;

        let m = &self.memory;
        within("memory.initial_stability", m.initial_stability, 0.1, 5.0)?;
        within("memory.stability_factor", m.stability_factor, 0.5, 10.0)?;
        within("memory.difficulty_weight", m.difficulty_weight, 0.0, 1.0)?;
        within("memory.strength_weight", m.strength_weight, 0.0, 1.0)?;
        within("memory.consistency_bonus", m.consistency_bonus, 0.0, 1.0)?;
        within("memory.stability_gain", m.stability_gain, 0.0, 1.0)?;
        exclusive("memory.forget_threshold", m.forget_threshold, 0.0, 1.0)?;
        exclusive(
            "memory.retention_threshold",
            m.retention_threshold,
            m.forget_threshold,
            1.0,
        )?;

        let q = &self.session;
        within_int("session.recency_window_days", q.recency_window_days, 1, 30)?;
        within("session.incorrect_ratio", q.incorrect_ratio, 0.0, 1.0)?;
        within_int("session.default_limit", q.default_limit, 1, 100)?;
        Ok(())
    }
}

fn within(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("{value} is outside [{min}, {max}]"),
        ))
    }
}

fn exclusive(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value > min && value < max {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("{value} is outside ({min}, {max})"),
        ))
    }
}

fn within_int(field: &str, value: u32, min: u32, max: u32) -> Result<(), ValidationError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            field,
            format!("{value} is outside [{min}, {max}]"),
        ))
    }
}

fn steps(field: &str, steps: &[u32]) -> Result<(), ValidationError> {
    if steps.is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    for step in steps {
        within_int(field, *step, 1, 1440)?;
    }
    Ok(())
}
