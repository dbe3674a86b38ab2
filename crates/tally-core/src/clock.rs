//! # Clock
//!
//! "Today" is an input, not a global. The reconciler and payment toggles take
//! a date; callers obtain it from a [`Clock`].
//!
//! ## Timezone Convention
//! [`SystemClock`] reports the calendar date at a fixed UTC offset chosen by
//! the deployment (UTC unless configured). An installment due on date D
//! becomes overdue once that clock reads D + 1.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};

/// Source of the current calendar date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Clock reporting the UTC date.
    pub fn utc() -> Self {
        SystemClock { offset: Utc.fix() }
    }

    /// Clock reporting the date at `minutes` east of UTC.
    ///
    /// Returns `None` when the offset is outside ±24h.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        let offset = FixedOffset::east_opt(minutes.checked_mul(60)?)?;
        Some(SystemClock { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::utc()
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

/// Clock pinned to one date. Used by tests and for back-dated reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
