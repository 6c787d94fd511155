//! Strictly advancing reading timestamps.

use chrono::{Local, NaiveDate, NaiveDateTime, TimeDelta};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TimeConfig;

/// Wire format of reading timestamps.
pub const TIMESTAMP_FORMAT: &str = "%m/%d/%Y %H:%M:%S";

struct SequencerState {
    rng: StdRng,
    last: Option<NaiveDateTime>,
}

/// Emits one timestamp per reading. The first lands in the morning window of
/// the current day, every later one follows the previous by a random gap.
pub struct TimeSequencer {
    config: TimeConfig,
    state: Mutex<SequencerState>,
}

impl TimeSequencer {
    pub fn new(seed: u64, config: TimeConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SequencerState {
                rng: StdRng::seed_from_u64(seed),
                last: None,
            }),
        }
    }

    /// Next timestamp, formatted `MM/DD/YYYY HH:MM:SS`.
    pub fn next(&self) -> String {
        self.next_datetime().format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn next_datetime(&self) -> NaiveDateTime {
        self.next_on(Local::now().date_naive())
    }

    /// Like [`next_datetime`](Self::next_datetime) with `today` fixed. Only the
    /// first call uses the date.
    pub fn next_on(&self, today: NaiveDate) -> NaiveDateTime {
        let mut state = self.state.lock();
        let state = &mut *state;

        let next = match state.last {
            None => {
                let hour = state
                    .rng
                    .random_range(self.config.start_hour_min..=self.config.start_hour_max);
                let minute = state.rng.random_range(0..60);
                let second = state.rng.random_range(0..60);
                // hour <= 23 is enforced by config validation.
                today
                    .and_hms_opt(hour.min(23), minute, second)
                    .unwrap_or_else(|| today.and_time(chrono::NaiveTime::default()))
            }
            Some(last) => {
                let gap = state
                    .rng
                    .random_range(self.config.gap_min_secs..self.config.gap_max_secs);
                last + TimeDelta::seconds(i64::from(gap))
            }
        };

        state.last = Some(next);
        next
    }

    /// Most recently emitted timestamp.
    pub fn last(&self) -> Option<NaiveDateTime> {
        self.state.lock().last
    }
}
