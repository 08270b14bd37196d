//! `Recurrence`: an anchored bundle of inclusion/exclusion rules and
//! explicit dates, with memoized classification and change
//! notification.

pub mod classification;
pub mod observer;

pub use classification::RecurrenceKind;
pub use observer::{ChangeListener, ObserverRegistry};

use std::cell::Cell;
use std::sync::Arc;

use chrono::{Datelike, Timelike};
use chrono_tz::Tz;
use tracing::trace;

use crate::limits::EngineLimits;
use crate::rule::RecurrenceRule;
use crate::sorted;
use crate::time::{Date, Instant, TimeProvider};

/// A bundle of inclusion/exclusion rules and explicit inclusion/
/// exclusion dates anchored at a start instant.
///
/// All public mutators are no-ops on a read-only recurrence. Every
/// mutation that actually changes state invalidates the cached
/// classification and fires exactly one notification.
#[derive(Debug, Clone)]
pub struct Recurrence {
    anchor: Instant,
    all_day: bool,
    read_only: bool,
    r_rules: Vec<RecurrenceRule>,
    ex_rules: Vec<RecurrenceRule>,
    r_dates: Vec<Date>,
    ex_dates: Vec<Date>,
    r_date_times: Vec<Instant>,
    ex_date_times: Vec<Instant>,
    cached_classification: Cell<Option<RecurrenceKind>>,
    observers: ObserverRegistry,
}

impl PartialEq for Recurrence {
    /// Anchor, `allDay`, `readOnly`, the four date/instant lists, and
    /// both rule lists (positionally) must match. Cached classification
    /// and registered observers are not part of equality.
    fn eq(&self, other: &Self) -> bool {
        self.anchor == other.anchor
            && self.all_day == other.all_day
            && self.read_only == other.read_only
            && self.r_rules == other.r_rules
            && self.ex_rules == other.ex_rules
            && self.r_dates == other.r_dates
            && self.ex_dates == other.ex_dates
            && self.r_date_times == other.r_date_times
            && self.ex_date_times == other.ex_date_times
    }
}

impl Recurrence {
    #[must_use]
    pub fn new(anchor: Instant, all_day: bool) -> Self {
        Self {
            anchor,
            all_day,
            read_only: false,
            r_rules: Vec::new(),
            ex_rules: Vec::new(),
            r_dates: Vec::new(),
            ex_dates: Vec::new(),
            r_date_times: Vec::new(),
            ex_date_times: Vec::new(),
            cached_classification: Cell::new(None),
            observers: ObserverRegistry::new(),
        }
    }

    #[must_use]
    pub const fn anchor(&self) -> Instant {
        self.anchor
    }

    #[must_use]
    pub const fn all_day(&self) -> bool {
        self.all_day
    }

    #[must_use]
    pub const fn read_only(&self) -> bool {
        self.read_only
    }

    #[must_use]
    pub fn r_rules(&self) -> &[RecurrenceRule] {
        &self.r_rules
    }

    #[must_use]
    pub fn ex_rules(&self) -> &[RecurrenceRule] {
        &self.ex_rules
    }

    #[must_use]
    pub fn r_dates(&self) -> &[Date] {
        &self.r_dates
    }

    #[must_use]
    pub fn ex_dates(&self) -> &[Date] {
        &self.ex_dates
    }

    #[must_use]
    pub fn r_date_times(&self) -> &[Instant] {
        &self.r_date_times
    }

    #[must_use]
    pub fn ex_date_times(&self) -> &[Instant] {
        &self.ex_date_times
    }

    /// This recurrence's memoized coarse shape, derived from the first
    /// inclusion rule (`None` if there isn't one). Cached until the
    /// next mutation.
    #[must_use]
    pub fn classification(&self) -> RecurrenceKind {
        if let Some(cached) = self.cached_classification.get() {
            return cached;
        }
        let kind = self
            .r_rules
            .first()
            .map_or(RecurrenceKind::None, RecurrenceKind::classify);
        self.cached_classification.set(Some(kind));
        kind
    }

    pub fn register_listener(&mut self, listener: &Arc<dyn ChangeListener>) {
        self.observers.register(listener);
    }

    pub fn unregister_listener(&mut self, listener: &Arc<dyn ChangeListener>) {
        self.observers.unregister(listener);
    }

    fn invalidate_and_notify(&mut self) {
        self.cached_classification.set(None);
        self.observers.notify();
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn add_r_rule(&mut self, rule: RecurrenceRule) {
        if self.read_only {
            return;
        }
        self.r_rules.push(rule);
        self.invalidate_and_notify();
    }

    pub fn add_ex_rule(&mut self, rule: RecurrenceRule) {
        if self.read_only {
            return;
        }
        self.ex_rules.push(rule);
        self.invalidate_and_notify();
    }

    pub fn remove_r_rule(&mut self, index: usize) -> Option<RecurrenceRule> {
        if self.read_only || index >= self.r_rules.len() {
            return None;
        }
        let removed = self.r_rules.remove(index);
        self.invalidate_and_notify();
        Some(removed)
    }

    pub fn remove_ex_rule(&mut self, index: usize) -> Option<RecurrenceRule> {
        if self.read_only || index >= self.ex_rules.len() {
            return None;
        }
        let removed = self.ex_rules.remove(index);
        self.invalidate_and_notify();
        Some(removed)
    }

    pub fn add_r_date(&mut self, date: Date) {
        if self.read_only {
            return;
        }
        sorted::insert_unique(&mut self.r_dates, date);
        self.invalidate_and_notify();
    }

    pub fn add_ex_date(&mut self, date: Date) {
        if self.read_only {
            return;
        }
        sorted::insert_unique(&mut self.ex_dates, date);
        self.invalidate_and_notify();
    }

    pub fn add_r_date_time(&mut self, instant: Instant) {
        if self.read_only {
            return;
        }
        sorted::insert_unique(&mut self.r_date_times, instant);
        self.invalidate_and_notify();
    }

    pub fn add_ex_date_time(&mut self, instant: Instant) {
        if self.read_only {
            return;
        }
        sorted::insert_unique(&mut self.ex_date_times, instant);
        self.invalidate_and_notify();
    }

    pub fn remove_r_date(&mut self, date: Date) -> bool {
        self.remove_from(|this| &mut this.r_dates, date)
    }

    pub fn remove_ex_date(&mut self, date: Date) -> bool {
        self.remove_from(|this| &mut this.ex_dates, date)
    }

    fn remove_from(&mut self, field: impl FnOnce(&mut Self) -> &mut Vec<Date>, date: Date) -> bool {
        if self.read_only {
            return false;
        }
        let removed = sorted::remove(field(self), &date);
        if removed {
            self.invalidate_and_notify();
        }
        removed
    }

    pub fn remove_r_date_time(&mut self, instant: Instant) -> bool {
        if self.read_only {
            return false;
        }
        let removed = sorted::remove(&mut self.r_date_times, &instant);
        if removed {
            self.invalidate_and_notify();
        }
        removed
    }

    pub fn remove_ex_date_time(&mut self, instant: Instant) -> bool {
        if self.read_only {
            return false;
        }
        let removed = sorted::remove(&mut self.ex_date_times, &instant);
        if removed {
            self.invalidate_and_notify();
        }
        removed
    }

    /// Cascades a new anchor onto every contained rule and updates
    /// `allDay` from it. No-op (not even a notification) if `instant`
    /// equals the current anchor, matching the idempotence contract
    /// `setAllDay` is tested against.
    pub fn set_anchor(&mut self, instant: Instant) {
        if self.read_only || instant == self.anchor {
            return;
        }
        self.anchor = instant;
        self.all_day = instant.is_all_day();
        for rule in self.r_rules.iter_mut().chain(self.ex_rules.iter_mut()) {
            rule.set_start_instant(instant);
            rule.set_all_day(self.all_day);
        }
        trace!(anchor = %instant, "recurrence anchor set");
        self.invalidate_and_notify();
    }

    /// Cascades the all-day flag onto every contained rule. A repeated
    /// call with the same value is a no-op.
    pub fn set_all_day(&mut self, all_day: bool) {
        if self.read_only || self.all_day == all_day {
            return;
        }
        self.all_day = all_day;
        for rule in self.r_rules.iter_mut().chain(self.ex_rules.iter_mut()) {
            rule.set_all_day(all_day);
        }
        self.invalidate_and_notify();
    }

    /// Empties every rule and date/instant list. Leaves `anchor`,
    /// `allDay`, and `readOnly` untouched.
    pub fn clear(&mut self) {
        if self.read_only {
            return;
        }
        self.r_rules.clear();
        self.ex_rules.clear();
        self.r_dates.clear();
        self.ex_dates.clear();
        self.r_date_times.clear();
        self.ex_date_times.clear();
        self.invalidate_and_notify();
    }

    /// Reinterprets every stored instant and each rule's anchor as if
    /// its wall-clock reading always belonged to `new_zone`: first
    /// projects from its current zone into `old_zone`, then re-stamps
    /// the result with `new_zone`. A rule's own termination instant is
    /// immutable once built and is not reinterpreted. No-op if the
    /// zones are equal.
    pub fn shift_times<T: TimeProvider>(&mut self, time: &mut T, old_zone: Tz, new_zone: Tz) {
        if self.read_only || old_zone == new_zone {
            return;
        }
        self.anchor = reinterpret(time, self.anchor, old_zone, new_zone);
        for rule in self.r_rules.iter_mut().chain(self.ex_rules.iter_mut()) {
            let shifted = reinterpret(time, rule.start_instant(), old_zone, new_zone);
            rule.set_start_instant(shifted);
        }
        self.r_date_times = sorted::build_sorted(
            self.r_date_times
                .drain(..)
                .map(|i| reinterpret(time, i, old_zone, new_zone)),
        );
        self.ex_date_times = sorted::build_sorted(
            self.ex_date_times
                .drain(..)
                .map(|i| reinterpret(time, i, old_zone, new_zone)),
        );
        trace!(%old_zone, %new_zone, "recurrence times shifted");
        self.invalidate_and_notify();
    }

    fn is_excluded<T: TimeProvider>(
        &self,
        time: &mut T,
        instant: Instant,
        limits: &EngineLimits,
    ) -> bool {
        sorted::contains(&self.ex_dates, &instant.date())
            || sorted::contains(&self.ex_date_times, &instant)
            || self.ex_rules.iter().any(|r| r.recurs_at(time, instant, limits))
    }

    fn promote_date<T: TimeProvider>(&self, time: &mut T, date: Date) -> Instant {
        let t = self.anchor.time_of_day();
        match self.anchor {
            Instant::AllDay(_) => Instant::AllDay(date),
            Instant::Zoned(dt) => time
                .construct(
                    date.0.year(),
                    date.0.month(),
                    date.0.day(),
                    t.hour(),
                    t.minute(),
                    t.second(),
                    dt.timezone(),
                )
                .unwrap_or(self.anchor),
            Instant::Floating(_) => time
                .construct_floating(
                    date.0.year(),
                    date.0.month(),
                    date.0.day(),
                    t.hour(),
                    t.minute(),
                    t.second(),
                )
                .unwrap_or(self.anchor),
        }
    }

    #[must_use]
    pub fn recurs_at<T: TimeProvider>(
        &self,
        time: &mut T,
        instant: Instant,
        limits: &EngineLimits,
    ) -> bool {
        if self.is_excluded(time, instant, limits) {
            return false;
        }
        instant == self.anchor
            || sorted::contains(&self.r_date_times, &instant)
            || self.r_rules.iter().any(|r| r.recurs_at(time, instant, limits))
    }

    #[must_use]
    pub fn recurs_on<T: TimeProvider>(
        &self,
        time: &mut T,
        date: Date,
        zone: Tz,
        limits: &EngineLimits,
    ) -> bool {
        if date < time.to_zone(self.anchor, zone).date() {
            return false;
        }
        if sorted::contains(&self.ex_dates, &date) {
            return false;
        }
        if self.all_day && self.ex_rules.iter().any(|r| r.recurs_on(time, date, limits)) {
            return false;
        }
        if sorted::contains(&self.r_dates, &date) {
            return true;
        }
        let candidate = self.anchor.date() == date
            || self.r_date_times.iter().any(|i| i.date() == date)
            || self.r_rules.iter().any(|r| r.recurs_on(time, date, limits));
        if !candidate {
            return false;
        }
        !self.recur_times_on(time, date, zone, limits).is_empty()
    }

    #[must_use]
    pub fn recur_times_on<T: TimeProvider>(
        &self,
        time: &mut T,
        date: Date,
        zone: Tz,
        limits: &EngineLimits,
    ) -> Vec<Instant> {
        let mut included = Vec::new();

        let anchor_in_zone = time.to_zone(self.anchor, zone);
        if anchor_in_zone.date() == date {
            included.push(anchor_in_zone);
        }
        for &instant in &self.r_date_times {
            let projected = time.to_zone(instant, zone);
            if projected.date() == date {
                included.push(projected);
            }
        }
        for rule in &self.r_rules {
            included.extend(rule.recur_times_on(time, date, limits));
        }

        let mut excluded = Vec::new();
        for &instant in &self.ex_date_times {
            let projected = time.to_zone(instant, zone);
            if projected.date() == date {
                excluded.push(projected);
            }
        }
        if !self.all_day {
            for rule in &self.ex_rules {
                excluded.extend(rule.recur_times_on(time, date, limits));
            }
        }

        included.retain(|i| !excluded.contains(i));
        sorted::build_sorted(included)
    }

    /// Every un-excluded occurrence in `[start, end]`, closed at both
    /// ends.
    ///
    /// Multi-day incidences and sub-daily recurrences are not expanded
    /// against the interval boundary specially here — free/busy
    /// aggregation over partially-overlapping multi-day incidences is
    /// left to the external collaborator that owns incidence duration.
    #[must_use]
    pub fn times_in_interval<T: TimeProvider>(
        &self,
        time: &mut T,
        start: Instant,
        end: Instant,
        limits: &EngineLimits,
    ) -> Vec<Instant> {
        let mut included = Vec::new();

        for rule in &self.r_rules {
            included.extend(rule.times_in_interval(time, start, end, limits));
        }
        for &instant in &self.r_date_times {
            if instant >= start && instant <= end {
                included.push(instant);
            }
        }
        for &date in &self.r_dates {
            let promoted = self.promote_date(time, date);
            if promoted >= start && promoted <= end {
                included.push(promoted);
            }
        }

        included.retain(|i| !sorted::contains(&self.ex_dates, &i.date()));
        included.retain(|i| !sorted::contains(&self.ex_date_times, i));
        for rule in &self.ex_rules {
            let excluded = rule.times_in_interval(time, start, end, limits);
            included.retain(|i| !excluded.contains(i));
        }

        sorted::build_sorted(included)
    }

    fn next_candidate<T: TimeProvider>(
        &self,
        time: &mut T,
        after: Instant,
        limits: &EngineLimits,
    ) -> Option<Instant> {
        let mut candidates = Vec::new();
        if self.anchor > after {
            candidates.push(self.anchor);
        }
        if let Some(&next) = self.r_date_times.iter().find(|i| **i > after) {
            candidates.push(next);
        }
        for &date in &self.r_dates {
            let promoted = self.promote_date(time, date);
            if promoted > after {
                candidates.push(promoted);
                break;
            }
        }
        for rule in &self.r_rules {
            if let Some(next) = rule.next_occurrence(time, after, limits) {
                candidates.push(next);
            }
        }
        candidates.into_iter().min()
    }

    fn previous_candidate<T: TimeProvider>(
        &self,
        time: &mut T,
        before: Instant,
        limits: &EngineLimits,
    ) -> Option<Instant> {
        let mut candidates = Vec::new();
        if self.anchor < before {
            candidates.push(self.anchor);
        }
        if let Some(&prev) = self.r_date_times.iter().rev().find(|i| **i < before) {
            candidates.push(prev);
        }
        for &date in self.r_dates.iter().rev() {
            let promoted = self.promote_date(time, date);
            if promoted < before {
                candidates.push(promoted);
                break;
            }
        }
        for rule in &self.r_rules {
            if let Some(prev) = rule.previous_occurrence(time, before, limits) {
                candidates.push(prev);
            }
        }
        candidates.into_iter().max()
    }

    /// Smallest un-excluded occurrence strictly after `after`. Each
    /// round picks the smallest raw candidate and, if excluded, retries
    /// from it; bounded by `limits.exclusion_retry_budget` rounds to
    /// guard against pathological exclusion chains.
    #[must_use]
    pub fn get_next_date_time<T: TimeProvider>(
        &self,
        time: &mut T,
        after: Instant,
        limits: &EngineLimits,
    ) -> Option<Instant> {
        let mut after = after;
        for _ in 0..limits.exclusion_retry_budget {
            let candidate = self.next_candidate(time, after, limits)?;
            if self.is_excluded(time, candidate, limits) {
                after = candidate;
                continue;
            }
            return Some(candidate);
        }
        trace!(budget = limits.exclusion_retry_budget, "next-occurrence exclusion retry budget exhausted");
        None
    }

    /// Mirror of [`Self::get_next_date_time`]: largest un-excluded
    /// occurrence strictly before `before`.
    #[must_use]
    pub fn get_previous_date_time<T: TimeProvider>(
        &self,
        time: &mut T,
        before: Instant,
        limits: &EngineLimits,
    ) -> Option<Instant> {
        let mut before = before;
        for _ in 0..limits.exclusion_retry_budget {
            let candidate = self.previous_candidate(time, before, limits)?;
            if self.is_excluded(time, candidate, limits) {
                before = candidate;
                continue;
            }
            return Some(candidate);
        }
        trace!(budget = limits.exclusion_retry_budget, "previous-occurrence exclusion retry budget exhausted");
        None
    }

    /// The last occurrence, or `None` if any inclusion rule never
    /// terminates.
    #[must_use]
    pub fn end_date_time<T: TimeProvider>(&self, time: &mut T, limits: &EngineLimits) -> Option<Instant> {
        if self.r_rules.iter().any(|r| r.termination().is_never()) {
            return None;
        }
        let mut max = self.anchor;
        if let Some(&last) = self.r_date_times.last() {
            max = max.max(last);
        }
        if let Some(&last_date) = self.r_dates.last() {
            max = max.max(self.promote_date(time, last_date));
        }
        for rule in &self.r_rules {
            if let Some(end) = rule.end_instant(time, limits) {
                max = max.max(end);
            }
        }
        Some(max)
    }
}

fn reinterpret<T: TimeProvider>(time: &mut T, instant: Instant, old_zone: Tz, new_zone: Tz) -> Instant {
    let projected = time.to_zone(instant, old_zone);
    time.shift_zone(projected, new_zone)
}
