use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Fuente de "ahora" inyectable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reloj de pared.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reloj controlado a mano para tests: sólo avanza cuando se le pide.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|p| p.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|p| p.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Convierte el `day` declarado de un paso en una espera relativa al paso
/// anterior, con granularidad de días completos.
pub struct StepClock;

impl StepClock {
    /// `(next_day - previous_day)` días si `next_day > previous_day`, si no
    /// cero. El primer paso usa `previous_day = 0`.
    pub fn offset_from(previous_day: u32, next_day: u32) -> Duration {
        if next_day > previous_day {
            Duration::days(i64::from(next_day - previous_day))
        } else {
            Duration::zero()
        }
    }

    pub fn resume_at(from: DateTime<Utc>, previous_day: u32, next_day: u32) -> DateTime<Utc> {
        from + Self::offset_from(previous_day, next_day)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn offsets_are_whole_day_differences() {
        assert_eq!(StepClock::offset_from(0, 1), Duration::days(1));
        assert_eq!(StepClock::offset_from(1, 3), Duration::days(2));
        assert_eq!(StepClock::offset_from(3, 2), Duration::zero());
        assert_eq!(StepClock::offset_from(4, 4), Duration::zero());
    }

    #[test]
    fn resume_at_adds_offset() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(StepClock::resume_at(t0, 2, 5), t0 + Duration::days(3));
        assert_eq!(StepClock::resume_at(t0, 5, 5), t0);
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let t0 = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(t0);
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::hours(25));
        assert_eq!(clock.now(), t0 + Duration::hours(25));
        clock.set(t0);
        assert_eq!(clock.now(), t0);
    }
}
