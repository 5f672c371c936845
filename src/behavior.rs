//! Pluggable value simulation.
//!
//! `Behavior` is the hook a profile attaches to an OID to describe how its
//! value should evolve over time. The hook surface itself -- a record plus
//! a little per-device mutable state in, a `TypedValue` out -- is the
//! spec'd contract; the behaviors below (`static_value`, `counter_drift`,
//! `gauge_jitter`) are illustrations, not an exhaustive behavior library.

use std::time::{Duration, Instant};

use rand::Rng;

use crate::profile::OidRecord;
use crate::value::TypedValue;

/// How an OID's value changes over time.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// The value never changes; always returns the profile's static value.
    StaticValue,
    /// Increments a counter-typed value at a fixed rate per second,
    /// wrapping at the type's width, as a real interface counter would.
    CounterDrift { rate_per_sec: u64 },
    /// Reports the base gauge plus a fresh uniform random offset in
    /// `[-amplitude, amplitude]` on every read, clamped to stay
    /// non-negative.
    GaugeJitter { amplitude: u32 },
}

/// Per-(device, OID) mutable state a behavior needs across invocations.
/// Devices hold one of these per OID that uses a non-static behavior.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub started_at: Instant,
}

impl DeviceState {
    pub fn new(started_at: Instant) -> Self {
        Self { started_at }
    }

    fn elapsed_secs(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.started_at).as_secs()
    }
}

/// Produce the value to report right now for `record`, given its behavior
/// and the owning device's state.
pub fn simulate(record: &OidRecord, state: &DeviceState, now: Instant) -> TypedValue {
    match &record.behavior {
        Behavior::StaticValue => record.value.clone(),
        Behavior::CounterDrift { rate_per_sec } => {
            let elapsed = state.elapsed_secs(now);
            let delta = rate_per_sec.saturating_mul(elapsed);
            match &record.value {
                TypedValue::Counter32(base) => {
                    let wrapped = (*base as u64).wrapping_add(delta) % (1u64 << 32);
                    TypedValue::Counter32(wrapped as u32)
                }
                TypedValue::Counter64(base) => {
                    TypedValue::Counter64(base.wrapping_add(delta))
                }
                TypedValue::Gauge32(base) => {
                    let wrapped = (*base as u64).wrapping_add(delta) % (1u64 << 32);
                    TypedValue::Gauge32(wrapped as u32)
                }
                // Drift only applies to the counter-like family; anything
                // else just reports its static value unchanged.
                other => other.clone(),
            }
        }
        Behavior::GaugeJitter { amplitude } => match &record.value {
            TypedValue::Gauge32(base) => {
                let offset = rand::thread_rng().gen_range(-(*amplitude as i64)..=*amplitude as i64);
                let jittered = (*base as i64 + offset).max(0);
                TypedValue::Gauge32(jittered as u32)
            }
            other => other.clone(),
        },
    }
}

/// Convenience for tests/sweeper code that want a wall-clock-based tick
/// without threading an `Instant` through every call site.
pub fn elapsed_since(started_at: Instant) -> Duration {
    started_at.elapsed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    fn record(behavior: Behavior, value: TypedValue) -> OidRecord {
        OidRecord::new("1.3.6.1.2.1.2.2.1.10.1".parse().unwrap(), value, behavior)
    }

    #[test]
    fn static_value_never_changes() {
        let rec = record(Behavior::StaticValue, TypedValue::Integer(42));
        let state = DeviceState::new(Instant::now());
        let now = Instant::now() + Duration::from_secs(100);
        assert_eq!(simulate(&rec, &state, now), TypedValue::Integer(42));
    }

    #[test]
    fn counter_drift_advances_with_elapsed_time() {
        let rec = record(
            Behavior::CounterDrift { rate_per_sec: 10 },
            TypedValue::Counter32(0),
        );
        let start = Instant::now();
        let state = DeviceState::new(start);
        let later = start + Duration::from_secs(5);
        match simulate(&rec, &state, later) {
            TypedValue::Counter32(v) => assert_eq!(v, 50),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn counter32_drift_wraps_at_32_bits() {
        let rec = record(
            Behavior::CounterDrift {
                rate_per_sec: u32::MAX as u64,
            },
            TypedValue::Counter32(10),
        );
        let start = Instant::now();
        let state = DeviceState::new(start);
        let later = start + Duration::from_secs(1);
        match simulate(&rec, &state, later) {
            TypedValue::Counter32(v) => assert_eq!(v, 9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn gauge_jitter_stays_within_amplitude_and_non_negative() {
        let rec = record(
            Behavior::GaugeJitter { amplitude: 5 },
            TypedValue::Gauge32(10),
        );
        let state = DeviceState::new(Instant::now());
        for _ in 0..100 {
            match simulate(&rec, &state, Instant::now()) {
                TypedValue::Gauge32(v) => assert!((5..=15).contains(&v)),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
