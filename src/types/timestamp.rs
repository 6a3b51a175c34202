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

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use rusqlite::ToSql;
use rusqlite::types::FromSql;
use rusqlite::types::FromSqlError;
use rusqlite::types::FromSqlResult;
use rusqlite::types::ToSqlOutput;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// The longest offset we are willing to add to a timestamp, in hours. This is
/// one hundred years, which is beyond the maximum interval.
const MAX_OFFSET_HOURS: f64 = 876_600.0;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn new(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }

    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_rfc3339(s: &str) -> Fallible<Self> {
        let ts = DateTime::parse_from_rfc3339(s)?;
        Ok(Self(ts.with_timezone(&Utc)))
    }

    pub fn into_inner(self) -> DateTime<Utc> {
        self.0
    }

    pub fn to_rfc3339(self) -> String {
        self.0.to_rfc3339()
    }

    /// Fractional hours elapsed from `earlier` to `self`. Negative if
    /// `earlier` is actually later.
    pub fn hours_since(self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0).num_milliseconds() as f64 / MILLIS_PER_HOUR
    }

    /// Fractional days elapsed from `earlier` to `self`.
    pub fn days_since(self, earlier: Timestamp) -> f64 {
        self.hours_since(earlier) / 24.0
    }

    pub fn plus_minutes(self, minutes: i64) -> Self {
        Self(self.0 + Duration::minutes(minutes))
    }

    pub fn plus_days(self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    /// Add a fractional number of hours. Non-finite or negative offsets are
    /// treated as zero.
    pub fn plus_hours(self, hours: f64) -> Self {
        let hours = if hours.is_finite() {
            hours.clamp(0.0, MAX_OFFSET_HOURS)
        } else {
            0.0
        };
        let millis = (hours * MILLIS_PER_HOUR).round() as i64;
        Self(self.0 + Duration::milliseconds(millis))
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl ToSql for Timestamp {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let str = self.0.to_rfc3339();
        Ok(ToSqlOutput::from(str))
    }
}

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let string: String = FromSql::column_result(value)?;
        let ts =
            DateTime::parse_from_rfc3339(&string).map_err(|e| FromSqlError::Other(Box::new(e)))?;
        let ts = ts.with_timezone(&Utc);
        Ok(Timestamp(ts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_since() -> Fallible<()> {
        let a = Timestamp::from_rfc3339("2025-01-01T00:00:00Z")?;
        let b = Timestamp::from_rfc3339("2025-01-01T06:30:00Z")?;
        assert_eq!(b.hours_since(a), 6.5);
        assert_eq!(a.hours_since(b), -6.5);
        assert_eq!(b.days_since(a), 6.5 / 24.0);
        Ok(())
    }

    #[test]
    fn test_offsets() -> Fallible<()> {
        let a = Timestamp::from_rfc3339("2025-01-01T00:00:00Z")?;
        assert_eq!(a.plus_minutes(90).to_rfc3339(), "2025-01-01T01:30:00+00:00");
        assert_eq!(a.plus_days(2).to_rfc3339(), "2025-01-03T00:00:00+00:00");
        assert_eq!(a.plus_hours(1.5), a.plus_minutes(90));
        assert_eq!(a.plus_hours(f64::NAN), a);
        assert_eq!(a.plus_hours(-4.0), a);
        Ok(())
    }

    #[test]
    fn test_serde() -> Fallible<()> {
        let a = Timestamp::from_rfc3339("2025-03-04T05:06:07Z")?;
        let json = serde_json::to_string(&a)?;
        assert_eq!(json, "\"2025-03-04T05:06:07Z\"");
        let b: Timestamp = serde_json::from_str(&json)?;
        assert_eq!(a, b);
        Ok(())
    }
}
