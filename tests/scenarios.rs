//! Literal end-to-end scenarios exercising `RecurrenceRule`/`Recurrence`
//! together, transcribed from the worked examples that motivated the
//! engine.

use shuriken_recur::model::{PeriodType, Weekday, WeekdayPosition};
use shuriken_recur::{EngineLimits, Recurrence, RecurrenceRule, TimeProvider};
use shuriken_recur::time::ChronoTime;
use chrono_tz::Tz;

fn dates(occurrences: &[shuriken_recur::time::Instant]) -> Vec<String> {
    occurrences.iter().map(|i| i.date().to_string()).collect()
}

#[test]
fn s1_weekly_on_monday_five_occurrences() {
    let mut time = ChronoTime::new();
    let anchor = time.construct(2020, 1, 6, 9, 0, 0, Tz::UTC).unwrap();
    let rule = RecurrenceRule::builder(PeriodType::Weekly, 1, anchor)
        .by_day(vec![WeekdayPosition::every(Weekday::Monday)])
        .count(5)
        .build()
        .unwrap();
    let limits = EngineLimits::default();

    let end = rule.end_instant(&mut time, &limits).unwrap();
    assert_eq!(end.date().to_string(), "2020-02-03");

    let start = time.construct(2020, 1, 1, 0, 0, 0, Tz::UTC).unwrap();
    let stop = time.construct(2020, 3, 1, 0, 0, 0, Tz::UTC).unwrap();
    let occurrences = rule.times_in_interval(&mut time, start, stop, &limits);
    assert_eq!(
        dates(&occurrences),
        vec!["2020-01-06", "2020-01-13", "2020-01-20", "2020-01-27", "2020-02-03"]
    );
    assert!(occurrences.iter().all(|i| i.time_of_day().to_string() == "09:00:00"));
}

#[test]
fn s2_monthly_last_friday_until() {
    let mut time = ChronoTime::new();
    let anchor = time.construct(2021, 1, 29, 12, 0, 0, Tz::UTC).unwrap();
    let until = time.construct(2021, 6, 30, 23, 59, 0, Tz::UTC).unwrap();
    let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, anchor)
        .by_day(vec![WeekdayPosition::nth(-1, Weekday::Friday)])
        .until(until)
        .build()
        .unwrap();
    let limits = EngineLimits::default();

    let start = time.construct(2021, 1, 1, 0, 0, 0, Tz::UTC).unwrap();
    let stop = time.construct(2021, 12, 31, 0, 0, 0, Tz::UTC).unwrap();
    let occurrences = rule.times_in_interval(&mut time, start, stop, &limits);
    assert_eq!(
        dates(&occurrences),
        vec![
            "2021-01-29",
            "2021-02-26",
            "2021-03-26",
            "2021-04-30",
            "2021-05-28",
            "2021-06-25",
        ]
    );
}

#[test]
fn s3_daily_with_exdate() {
    let mut time = ChronoTime::new();
    let anchor = time.construct(2022, 3, 1, 8, 0, 0, Tz::UTC).unwrap();
    let rule = RecurrenceRule::builder(PeriodType::Daily, 1, anchor)
        .count(5)
        .build()
        .unwrap();
    let mut recurrence = Recurrence::new(anchor, false);
    recurrence.add_r_rule(rule);
    recurrence.add_ex_date(shuriken_recur::time::Date::from_ymd(2022, 3, 3).unwrap());

    let limits = EngineLimits::default();
    assert!(!recurrence.recurs_on(
        &mut time,
        shuriken_recur::time::Date::from_ymd(2022, 3, 3).unwrap(),
        Tz::UTC,
        &limits
    ));

    let after = time.construct(2022, 3, 2, 8, 0, 0, Tz::UTC).unwrap();
    let next = recurrence.get_next_date_time(&mut time, after, &limits).unwrap();
    assert_eq!(next.date().to_string(), "2022-03-04");
    assert_eq!(next.time_of_day().to_string(), "08:00:00");
}

#[test]
fn s4_all_day_yearly_on_feb_29() {
    let mut time = ChronoTime::new();
    let anchor = shuriken_recur::time::Instant::AllDay(
        shuriken_recur::time::Date::from_ymd(2020, 2, 29).unwrap(),
    );
    let rule = RecurrenceRule::builder(PeriodType::Yearly, 1, anchor)
        .all_day(true)
        .by_month(vec![2])
        .by_month_day(vec![29])
        .build()
        .unwrap();
    let mut recurrence = Recurrence::new(anchor, true);
    recurrence.add_r_rule(rule);

    let limits = EngineLimits::default();
    assert!(!recurrence.recurs_on(
        &mut time,
        shuriken_recur::time::Date::from_ymd(2021, 2, 28).unwrap(),
        Tz::UTC,
        &limits
    ));
    assert!(recurrence.recurs_on(
        &mut time,
        shuriken_recur::time::Date::from_ymd(2024, 2, 29).unwrap(),
        Tz::UTC,
        &limits
    ));
}

#[test]
fn s5_bysetpos_last_weekday_of_month() {
    let mut time = ChronoTime::new();
    let anchor = time.construct(2023, 1, 31, 17, 0, 0, Tz::UTC).unwrap();
    let rule = RecurrenceRule::builder(PeriodType::Monthly, 1, anchor)
        .by_day(vec![
            WeekdayPosition::every(Weekday::Monday),
            WeekdayPosition::every(Weekday::Tuesday),
            WeekdayPosition::every(Weekday::Wednesday),
            WeekdayPosition::every(Weekday::Thursday),
            WeekdayPosition::every(Weekday::Friday),
        ])
        .by_set_pos(vec![-1])
        .count(3)
        .build()
        .unwrap();
    let limits = EngineLimits::default();

    let start = time.construct(2023, 1, 1, 0, 0, 0, Tz::UTC).unwrap();
    let stop = time.construct(2023, 12, 31, 0, 0, 0, Tz::UTC).unwrap();
    let occurrences = rule.times_in_interval(&mut time, start, stop, &limits);
    assert_eq!(dates(&occurrences), vec!["2023-01-31", "2023-02-28", "2023-03-31"]);
    assert!(occurrences.iter().all(|i| i.time_of_day().to_string() == "17:00:00"));
}

#[test]
fn s6_next_after_with_exrule() {
    let mut time = ChronoTime::new();
    let anchor = time.construct(2020, 6, 1, 10, 0, 0, Tz::UTC).unwrap();
    let r_rule = RecurrenceRule::builder(PeriodType::Weekly, 1, anchor)
        .count(20)
        .build()
        .unwrap();
    let until = time.construct(2020, 9, 1, 0, 0, 0, Tz::UTC).unwrap();
    let ex_rule = RecurrenceRule::builder(PeriodType::Weekly, 2, anchor)
        .by_day(vec![WeekdayPosition::every(Weekday::Monday)])
        .until(until)
        .build()
        .unwrap();

    let mut recurrence = Recurrence::new(anchor, false);
    recurrence.add_r_rule(r_rule);
    recurrence.add_ex_rule(ex_rule);

    let limits = EngineLimits::default();

    // The exRule's own interval-2 grouping counts weeks from the week
    // containing its start instant (2020-06-01, a Monday), so it lands
    // on 2020-06-01, 2020-06-15, 2020-06-29, ... — not 2020-06-08.
    // 2020-06-08 is therefore not excluded, and is the first rRule
    // occurrence strictly after 2020-06-07.
    let after = time.construct(2020, 6, 7, 0, 0, 0, Tz::UTC).unwrap();
    let next = recurrence.get_next_date_time(&mut time, after, &limits).unwrap();
    assert_eq!(next.date().to_string(), "2020-06-08");

    let after_excluded_week = time.construct(2020, 6, 8, 0, 0, 0, Tz::UTC).unwrap();
    let following = recurrence
        .get_next_date_time(&mut time, after_excluded_week, &limits)
        .unwrap();
    assert_eq!(following.date().to_string(), "2020-06-22");
}
