use chrono::{DateTime, Duration as ChronoDuration, Utc};

const NANOS_PER_SECOND: f64 = 1e9;

/// Sampling instants in `[start, end]`. The offset from `start` is a running
/// f64 sum of the period, so drift matches repeated addition.
#[derive(Debug)]
pub(in crate::generate) struct Ticks {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    period: f64,
    offset: f64,
    next: Option<DateTime<Utc>>,
    stalled: bool,
}

impl Ticks {
    /// Returns `None` when the period is shorter than the timestamp resolution.
    pub(in crate::generate) fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        frequency: u32,
    ) -> Option<Self> {
        let period = 1.0 / f64::from(frequency.max(1));
        if period * NANOS_PER_SECOND < 1.0 {
            return None;
        }
        Some(Self {
            start,
            end,
            period,
            offset: 0.0,
            next: (start <= end).then_some(start),
            stalled: false,
        })
    }

    /// True when iteration stopped because the offset no longer advanced.
    pub(in crate::generate) fn stalled(&self) -> bool {
        self.stalled
    }

    pub(in crate::generate) fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }
}

impl Iterator for Ticks {
    type Item = DateTime<Utc>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next.take()?;

        let offset = self.offset + self.period;
        if offset <= self.offset {
            self.stalled = true;
            return Some(current);
        }
        self.offset = offset;

        let nanos = offset * NANOS_PER_SECOND;
        if nanos.is_finite() && nanos < i64::MAX as f64 {
            self.next = self
                .start
                .checked_add_signed(ChronoDuration::nanoseconds(nanos as i64))
                .filter(|candidate| *candidate <= self.end);
        }
        Some(current)
    }
}
