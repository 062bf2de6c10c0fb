//! cron 式の解析と次回実行時刻の計算。
//!
//! 5フィールド（分 時 日 月 曜日）または先頭に秒を加えた6フィールドを受け付ける。
//! 日と曜日は両方が一致したときに発火する。

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, Offset, TimeZone, Timelike,
    Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

const SEARCH_HORIZON_YEARS: i32 = 5;
/// 夏時間の切り替えでローカル時刻がずれうる幅の上限。
const DST_SLACK_HOURS: i64 = 3;

const MONTH_NAMES: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const WEEKDAY_NAMES: &[&str] = &["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    #[error("expected 5 or 6 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} field `{value}`: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: String,
    },
}

struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
}

const SECOND: FieldSpec = FieldSpec {
    name: "second",
    min: 0,
    max: 59,
    names: &[],
};
const MINUTE: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
};
const HOUR: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
};
const DAY_OF_MONTH: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
};
const MONTH: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: MONTH_NAMES,
};
// 7 は日曜の別名。解析後に 0 へ畳み込む。
const DAY_OF_WEEK: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: WEEKDAY_NAMES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(self, value: u32) -> bool {
        self.0 & (1 << value) != 0
    }

    /// `value` 以降で最初に含まれる値。
    fn next_from(self, value: u32) -> Option<u32> {
        let remaining = self.0.checked_shr(value)?;
        (remaining != 0).then(|| value + remaining.trailing_zeros())
    }
}

impl FieldSpec {
    fn parse(&self, raw: &str) -> Result<FieldSet, CronError> {
        let mut bits = 0_u64;
        for part in raw.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(self.parse_step(raw, step)?)),
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (self.min, self.max)
            } else if let Some((start, end)) = range.split_once('-') {
                (self.parse_value(raw, start)?, self.parse_value(raw, end)?)
            } else {
                let value = self.parse_value(raw, range)?;
                // `5/15` は 5 から末尾まで 15 刻み。
                if step.is_some() {
                    (value, self.max)
                } else {
                    (value, value)
                }
            };

            if start > end {
                return Err(self.invalid(raw, format!("range start {start} exceeds end {end}")));
            }

            let step = step.unwrap_or(1);
            let mut value = start;
            while value <= end {
                bits |= 1 << value;
                value += step;
            }
        }

        if self.max == 7 && bits & (1 << 7) != 0 {
            bits = (bits & !(1 << 7)) | 1;
        }
        Ok(FieldSet(bits))
    }

    fn parse_step(&self, raw: &str, step: &str) -> Result<u32, CronError> {
        match step.parse::<u32>() {
            Ok(0) => Err(self.invalid(raw, "step must be greater than zero")),
            Ok(step) if step > self.max => Err(self.invalid(
                raw,
                format!("step {step} exceeds field maximum {}", self.max),
            )),
            Ok(step) => Ok(step),
            Err(_) => Err(self.invalid(raw, format!("invalid step `{step}`"))),
        }
    }

    fn parse_value(&self, raw: &str, token: &str) -> Result<u32, CronError> {
        let lowered = token.to_ascii_lowercase();
        if let Some(index) = self.names.iter().position(|name| *name == lowered) {
            let index = u32::try_from(index).map_err(|_| self.invalid(raw, "name out of range"))?;
            return Ok(index + self.min);
        }

        let value = token
            .parse::<u32>()
            .map_err(|_| self.invalid(raw, format!("invalid value `{token}`")))?;
        if value < self.min || value > self.max {
            return Err(self.invalid(
                raw,
                format!("{value} is outside {}-{}", self.min, self.max),
            ));
        }
        Ok(value)
    }

    fn invalid(&self, raw: &str, reason: impl Into<String>) -> CronError {
        CronError::InvalidField {
            field: self.name,
            value: raw.to_string(),
            reason: reason.into(),
        }
    }
}

/// 解析済みの cron 式。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expression: String,
    seconds: FieldSet,
    minutes: FieldSet,
    hours: FieldSet,
    days_of_month: FieldSet,
    months: FieldSet,
    days_of_week: FieldSet,
}

impl CronSchedule {
    /// cron 式を解析する。
    ///
    /// # Errors
    /// フィールド数や値の範囲が不正な場合は [`CronError`] を返す。
    pub fn parse(expression: &str) -> Result<Self, CronError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        let (seconds, rest) = match fields.as_slice() {
            [seconds, rest @ ..] if fields.len() == 6 => (SECOND.parse(seconds)?, rest),
            rest if fields.len() == 5 => (FieldSet(1), rest),
            _ => return Err(CronError::FieldCount(fields.len())),
        };

        Ok(Self {
            expression: fields.join(" "),
            seconds,
            minutes: MINUTE.parse(rest[0])?,
            hours: HOUR.parse(rest[1])?,
            days_of_month: DAY_OF_MONTH.parse(rest[2])?,
            months: MONTH.parse(rest[3])?,
            days_of_week: DAY_OF_WEEK.parse(rest[4])?,
        })
    }

    #[must_use]
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// `after` より厳密に後で、`tz` のローカル時刻として一致する最初の時刻を返す。
    ///
    /// 夏時間で存在しないローカル時刻は飛ばし、重複する時刻はそれぞれ発火対象とする。
    /// 5年以内に一致しない式は `None` になる。
    #[must_use]
    pub fn next_after(&self, after: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&tz).naive_local().with_nanosecond(0)?;
        let slack = Duration::hours(DST_SLACK_HOURS);
        // 直前後でオフセットが変わる場合のみ、重複する時間帯を拾うため少し前から走査する
        let mut candidate = if offset_changes(tz, after - slack, after + slack) {
            local - slack
        } else {
            local
        };
        let horizon = local.year() + SEARCH_HORIZON_YEARS;
        let mut best: Option<(DateTime<Utc>, NaiveDateTime)> = None;

        loop {
            if let Some((found, found_local)) = best {
                if candidate > found_local + slack || !offset_changes(tz, found - slack, found) {
                    return Some(found);
                }
            }
            if candidate.year() > horizon {
                return best.map(|(found, _)| found);
            }
            if !self.months.contains(candidate.month()) {
                candidate = first_day_of_next_month(candidate.date())?;
                continue;
            }
            if !self.day_matches(candidate.date()) {
                candidate = candidate.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = candidate.with_minute(0)?.with_second(0)? + Duration::hours(1);
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate = candidate.with_second(0)? + Duration::minutes(1);
                continue;
            }
            if !self.seconds.contains(candidate.second()) {
                candidate = match self.seconds.next_from(candidate.second()) {
                    Some(second) => candidate.with_second(second)?,
                    None => candidate.with_second(0)? + Duration::minutes(1),
                };
                continue;
            }

            if let Some(at) = resolve_after(tz, &candidate, after) {
                if best.is_none_or(|(found, _)| at < found) {
                    best = Some((at, at.with_timezone(&tz).naive_local()));
                }
            }
            candidate += Duration::seconds(1);
        }
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        self.days_of_month.contains(date.day())
            && self
                .days_of_week
                .contains(date.weekday().num_days_from_sunday())
    }
}

impl FromStr for CronSchedule {
    type Err = CronError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        Self::parse(expression)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn first_day_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)
}

fn offset_changes(tz: Tz, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    from.with_timezone(&tz).offset().fix() != to.with_timezone(&tz).offset().fix()
}

fn resolve_after(tz: Tz, local: &NaiveDateTime, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(local) {
        LocalResult::Single(at) => Some(at.with_timezone(&Utc)).filter(|at| *at > after),
        LocalResult::Ambiguous(earliest, latest) => [earliest, latest]
            .into_iter()
            .map(|at| at.with_timezone(&Utc))
            .find(|at| *at > after),
        LocalResult::None => None,
    }
}
