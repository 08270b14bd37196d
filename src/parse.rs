//! RRULE/EXRULE content-line convenience parsing and serialization.
//!
//! This is not an iCalendar codec: it reads and writes only the
//! `FREQ=...;INTERVAL=...;...` value grammar of a single RRULE/EXRULE
//! property, not VEVENT/VCALENDAR structure, line folding, or any other
//! property.

use std::fmt;

use chrono::TimeZone;
use chrono_tz::Tz;

use crate::error::{InvalidRuleReason, Result, RuleError};
use crate::model::{PeriodType, Weekday, WeekdayPosition};
use crate::rule::RecurrenceRule;
use crate::time::{Date, Instant};

/// Parses an RRULE/EXRULE value (optionally prefixed with `RRULE:` or
/// `EXRULE:`) into a [`RecurrenceRule`] anchored at `start_instant`.
///
/// ## Errors
///
/// Returns [`RuleError::ParseError`] if the text is malformed (an
/// unrecognized rule part, an unparsable BYDAY/UNTIL value), or
/// [`RuleError::InvalidRule`] if the resulting rule fails construction
/// validation (out-of-range filter value, `BYSETPOS=0`, etc).
pub fn parse_rrule_line(text: &str, start_instant: Instant) -> Result<RecurrenceRule> {
    let body = text
        .strip_prefix("RRULE:")
        .or_else(|| text.strip_prefix("EXRULE:"))
        .unwrap_or(text);

    let mut freq = None;
    let mut interval = 1u32;
    let mut count = None;
    let mut until = None;
    let mut wkst = None;
    let mut by_second = Vec::new();
    let mut by_minute = Vec::new();
    let mut by_hour = Vec::new();
    let mut by_day = Vec::new();
    let mut by_month_day = Vec::new();
    let mut by_year_day = Vec::new();
    let mut by_week_number = Vec::new();
    let mut by_month = Vec::new();
    let mut by_set_pos = Vec::new();

    for part in body.split(';').filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| RuleError::ParseError(format!("malformed rule part: {part}")))?;
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => {
                freq = Some(PeriodType::parse(value).ok_or_else(|| {
                    RuleError::ParseError(format!("unknown FREQ: {value}"))
                })?);
            }
            "INTERVAL" => {
                interval = value
                    .parse()
                    .map_err(|_| RuleError::ParseError(format!("bad INTERVAL: {value}")))?;
            }
            "COUNT" => {
                count = Some(
                    value
                        .parse()
                        .map_err(|_| RuleError::ParseError(format!("bad COUNT: {value}")))?,
                );
            }
            "UNTIL" => {
                until = Some(parse_until(value)?);
            }
            "WKST" => {
                wkst = Some(
                    Weekday::parse(value)
                        .ok_or_else(|| RuleError::ParseError(format!("bad WKST: {value}")))?,
                );
            }
            "BYSECOND" => by_second = parse_list(value)?,
            "BYMINUTE" => by_minute = parse_list(value)?,
            "BYHOUR" => by_hour = parse_list(value)?,
            "BYDAY" => {
                by_day = value
                    .split(',')
                    .map(parse_weekday_position)
                    .collect::<Result<Vec<_>>>()?;
            }
            "BYMONTHDAY" => by_month_day = parse_list(value)?,
            "BYYEARDAY" => by_year_day = parse_list(value)?,
            "BYWEEKNO" => by_week_number = parse_list(value)?,
            "BYMONTH" => by_month = parse_list(value)?,
            "BYSETPOS" => by_set_pos = parse_list(value)?,
            other => {
                return Err(RuleError::ParseError(format!(
                    "unrecognized rule part: {other}"
                )));
            }
        }
    }

    let period = freq.ok_or_else(|| RuleError::ParseError("missing FREQ".to_string()))?;

    let mut builder = RecurrenceRule::builder(period, interval, start_instant);
    if let Some(n) = count {
        builder = builder.count(n);
    }
    if let Some(u) = until {
        builder = builder.until(u);
    }
    if let Some(w) = wkst {
        builder = builder.week_start(w);
    }
    builder
        .by_second(by_second)
        .by_minute(by_minute)
        .by_hour(by_hour)
        .by_day(by_day)
        .by_month_day(by_month_day)
        .by_year_day(by_year_day)
        .by_week_number(by_week_number)
        .by_month(by_month)
        .by_set_pos(by_set_pos)
        .build()
}

fn parse_list<T>(value: &str) -> Result<Vec<T>>
where
    T: std::str::FromStr,
{
    value
        .split(',')
        .map(|v| {
            v.parse()
                .map_err(|_| RuleError::ParseError(format!("bad numeric value: {v}")))
        })
        .collect()
}

fn parse_weekday_position(value: &str) -> Result<WeekdayPosition> {
    if value.len() < 2 {
        return Err(RuleError::ParseError(format!("bad BYDAY value: {value}")));
    }
    let (ordinal_part, weekday_part) = value.split_at(value.len() - 2);
    let weekday = Weekday::parse(weekday_part)
        .ok_or_else(|| RuleError::ParseError(format!("bad BYDAY weekday: {value}")))?;
    if ordinal_part.is_empty() {
        return Ok(WeekdayPosition::every(weekday));
    }
    let offset: i8 = ordinal_part
        .parse()
        .map_err(|_| RuleError::ParseError(format!("bad BYDAY ordinal: {value}")))?;
    if offset == 0 {
        return Err(RuleError::ParseError(format!(
            "BYDAY ordinal may not be 0: {value}"
        )));
    }
    Ok(WeekdayPosition::nth(offset, weekday))
}

fn parse_until(value: &str) -> Result<Instant> {
    let bad = || RuleError::ParseError(format!("bad UNTIL: {value}"));
    if value.len() == 8 {
        let year: i32 = value[0..4].parse().map_err(|_| bad())?;
        let month: u32 = value[4..6].parse().map_err(|_| bad())?;
        let day: u32 = value[6..8].parse().map_err(|_| bad())?;
        return Date::from_ymd(year, month, day)
            .map(Instant::AllDay)
            .ok_or_else(bad);
    }
    let utc = value.ends_with('Z');
    let body = value.trim_end_matches('Z');
    if body.len() != 15 {
        return Err(bad());
    }
    let year: i32 = body[0..4].parse().map_err(|_| bad())?;
    let month: u32 = body[4..6].parse().map_err(|_| bad())?;
    let day: u32 = body[6..8].parse().map_err(|_| bad())?;
    let hour: u32 = body[9..11].parse().map_err(|_| bad())?;
    let minute: u32 = body[11..13].parse().map_err(|_| bad())?;
    let second: u32 = body[13..15].parse().map_err(|_| bad())?;
    let date = chrono::NaiveDate::from_ymd_opt(year, month, day).ok_or_else(bad)?;
    let time = chrono::NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(bad)?;
    let naive = chrono::NaiveDateTime::new(date, time);
    if utc {
        Ok(Instant::Zoned(Tz::UTC.from_utc_datetime(&naive)))
    } else {
        Ok(Instant::Floating(naive))
    }
}

fn until_to_string(instant: Instant) -> String {
    match instant {
        Instant::Zoned(dt) => {
            let utc = dt.with_timezone(&Tz::UTC);
            format!("{}Z", utc.format("%Y%m%dT%H%M%S"))
        }
        Instant::Floating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
        Instant::AllDay(date) => date.0.format("%Y%m%d").to_string(),
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = vec![format!("FREQ={}", self.period())];

        if self.frequency() != 1 {
            parts.push(format!("INTERVAL={}", self.frequency()));
        }

        match self.termination() {
            crate::model::Termination::Never => {}
            crate::model::Termination::Count(n) => parts.push(format!("COUNT={n}")),
            crate::model::Termination::Until(instant) => {
                parts.push(format!("UNTIL={}", until_to_string(instant)));
            }
        }

        if self.week_start() != Weekday::Monday {
            parts.push(format!("WKST={}", self.week_start()));
        }

        push_list(&mut parts, "BYSECOND", self.by_second());
        push_list(&mut parts, "BYMINUTE", self.by_minute());
        push_list(&mut parts, "BYHOUR", self.by_hour());
        if !self.by_day().is_empty() {
            let joined: Vec<String> = self.by_day().iter().map(ToString::to_string).collect();
            parts.push(format!("BYDAY={}", joined.join(",")));
        }
        push_list(&mut parts, "BYMONTHDAY", self.by_month_day());
        push_list(&mut parts, "BYYEARDAY", self.by_year_day());
        push_list(&mut parts, "BYWEEKNO", self.by_week_number());
        push_list(&mut parts, "BYMONTH", self.by_month());
        push_list(&mut parts, "BYSETPOS", self.by_set_pos());

        write!(f, "{}", parts.join(";"))
    }
}

fn push_list<T: fmt::Display>(parts: &mut Vec<String>, key: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
    parts.push(format!("{key}={}", joined.join(",")));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ChronoTime;

    #[test]
    fn parses_simple_daily_count() {
        let start = Instant::Floating(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        );
        let rule = parse_rrule_line("RRULE:FREQ=DAILY;COUNT=5", start).unwrap();
        assert_eq!(rule.period(), PeriodType::Daily);
        assert_eq!(rule.termination(), crate::model::Termination::Count(5));
    }

    #[test]
    fn parses_byday_with_negative_ordinal() {
        let start = Instant::AllDay(Date::from_ymd(2024, 1, 1).unwrap());
        let rule = parse_rrule_line("FREQ=MONTHLY;BYDAY=-1FR", start).unwrap();
        assert_eq!(
            rule.by_day(),
            &[WeekdayPosition::nth(-1, Weekday::Friday)]
        );
    }

    #[test]
    fn parses_until_zoned_utc() {
        let start = Instant::Zoned(Tz::UTC.with_ymd_and_hms(2021, 1, 29, 12, 0, 0).unwrap());
        let rule =
            parse_rrule_line("FREQ=MONTHLY;BYDAY=-1FR;UNTIL=20210630T235900Z", start).unwrap();
        let until = rule.termination().until().unwrap();
        assert_eq!(until.date().to_string(), "2021-06-30");
    }

    #[test]
    fn display_round_trips_through_parse() {
        let mut time = ChronoTime::new();
        let anchor = time.construct(2023, 1, 31, 17, 0, 0, Tz::UTC).unwrap();
        let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, anchor)
            .by_day(vec![
                WeekdayPosition::every(Weekday::Monday),
                WeekdayPosition::every(Weekday::Tuesday),
            ])
            .by_set_pos(vec![-1])
            .count(3)
            .build()
            .unwrap();
        let text = rule.to_string();
        let reparsed = parse_rrule_line(&text, anchor).unwrap();
        assert_eq!(rule, reparsed);
    }

    #[test]
    fn rejects_unknown_rule_part() {
        let start = Instant::AllDay(Date::from_ymd(2024, 1, 1).unwrap());
        assert!(parse_rrule_line("FREQ=DAILY;BOGUS=1", start).is_err());
    }

    #[test]
    fn rejects_missing_freq() {
        let start = Instant::AllDay(Date::from_ymd(2024, 1, 1).unwrap());
        assert!(parse_rrule_line("COUNT=5", start).is_err());
    }

    #[test]
    fn rejects_count_and_until_together() {
        let start = Instant::Zoned(Tz::UTC.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap());
        let err = parse_rrule_line(
            "RRULE:FREQ=DAILY;COUNT=5;UNTIL=20220101T000000Z",
            start,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RuleError::InvalidRule(InvalidRuleReason::ConflictingTermination)
        ));
    }
}
