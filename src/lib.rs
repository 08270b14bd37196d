//! Recurrence engine for a calendaring library.
//!
//! Given a compact RFC 5545 / RFC 2445 description of a repeating
//! event — frequency, interval, BY-filters, explicit inclusion/
//! exclusion dates — this crate answers when it occurs: pointwise
//! membership, range expansion, next/previous occurrence, and
//! cumulative duration. It is pure and synchronous: no I/O, no global
//! state, no async runtime. Time-zone arithmetic is injected through
//! the [`TimeProvider`] trait rather than hard-wired to one library.

pub mod error;
pub mod limits;
pub mod model;
pub mod parse;
pub mod recurrence;
pub mod rule;
pub mod sorted;
pub mod time;

pub use error::{InvalidRuleReason, Result, RuleError};
pub use limits::EngineLimits;
pub use model::{PeriodType, Termination, Weekday, WeekdayPosition};
pub use parse::parse_rrule_line;
pub use recurrence::{ChangeListener, ObserverRegistry, Recurrence, RecurrenceKind};
pub use rule::{RecurrenceRule, RecurrenceRuleBuilder};
pub use time::{ChronoTime, Components, Date, Instant, TimeProvider};
