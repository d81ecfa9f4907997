//! Energy regeneration
//!
//! Energy refills one point per `rate_seconds` up to `max`. The stored pair
//! `(energy, energy_updated_at)` is the last checkpoint; [`refill`] derives the
//! present value from it without touching storage.

use chrono::{DateTime, TimeDelta, Utc};
use kernel::clock::elapsed_between;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnergyRefill {
    pub current: i32,
    /// 0 when full
    pub seconds_to_next: i64,
    /// Checkpoint to persist alongside `current`. Whole intervals already
    /// converted into energy are moved past; the partial interval is kept.
    pub anchor: Option<DateTime<Utc>>,
}

/// Energy as shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyState {
    pub current: i32,
    pub max: i32,
    pub next_refill_in_seconds: i64,
}

pub fn refill(
    current: i32,
    max: i32,
    updated_at: Option<DateTime<Utc>>,
    rate_seconds: i64,
    now: DateTime<Utc>,
) -> EnergyRefill {
    let Some(updated_at) = updated_at else {
        return EnergyRefill {
            current,
            seconds_to_next: 0,
            anchor: None,
        };
    };

    let rate = rate_seconds.max(1);
    let elapsed = elapsed_between(updated_at, now).num_seconds();
    let gained = elapsed / rate;
    let next = (i64::from(current) + gained).min(i64::from(max)) as i32;

    if next >= max {
        // Time spent at the cap does not bank
        return EnergyRefill {
            current: next,
            seconds_to_next: 0,
            anchor: Some(now),
        };
    }

    EnergyRefill {
        current: next,
        seconds_to_next: rate - elapsed % rate,
        anchor: Some(updated_at + TimeDelta::seconds(gained * rate)),
    }
}

impl EnergyRefill {
    pub fn state(&self, max: i32) -> EnergyState {
        EnergyState {
            current: self.current,
            max,
            next_refill_in_seconds: self.seconds_to_next,
        }
    }
}
