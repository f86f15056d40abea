//! Wall-clock alignment of rotation boundaries.
//!
//! # Design
//! - Boundaries sit on an `interval`-minute grid anchored at midnight of the
//!   configured zone, so independently started processes rotate together.
//! - The last slot of a day is cut short at the next midnight.
//! - A slot end is always resolved to an instant strictly after the time it
//!   was computed for; daylight-saving gaps move it to the first valid instant.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use tidelog_config::{IntervalMinutes, Zone};

/// One interval of the rotation grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    label: NaiveDateTime,
    end: DateTime<Utc>,
}

impl Slot {
    /// The slot that `at` falls into.
    #[must_use]
    pub fn containing(at: DateTime<Utc>, interval: IntervalMinutes, zone: Zone) -> Self {
        let local = local_naive(zone, at);
        let midnight = local.date().and_time(NaiveTime::MIN);
        let step = i64::from(interval.get());
        let minute_of_day = local.signed_duration_since(midnight).num_minutes();
        let label = midnight + TimeDelta::minutes(minute_of_day / step * step);
        let next_mark = (label + TimeDelta::minutes(step)).min(midnight + TimeDelta::days(1));
        let end = resolve_after(zone, next_mark, at).unwrap_or(at + TimeDelta::minutes(step));
        Self { label, end }
    }

    /// Start of the slot as wall-clock time in the sink's zone; stamped into archive names.
    #[must_use]
    pub const fn label(&self) -> NaiveDateTime {
        self.label
    }

    /// First instant that belongs to the next slot.
    #[must_use]
    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Wall-clock reading of `at` in `zone`.
#[must_use]
pub fn local_naive(zone: Zone, at: DateTime<Utc>) -> NaiveDateTime {
    match zone {
        Zone::Utc => at.naive_utc(),
        Zone::Local => at.with_timezone(&Local).naive_local(),
    }
}

fn resolve_after(zone: Zone, mark: NaiveDateTime, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match zone {
        Zone::Utc => Some(Utc.from_utc_datetime(&mark)).filter(|end| *end > after),
        Zone::Local => {
            let mapped = Local.from_local_datetime(&mark);
            if mapped.earliest().is_none() {
                return Local
                    .from_local_datetime(&(mark + TimeDelta::hours(1)))
                    .earliest()
                    .map(|end| end.with_timezone(&Utc))
                    .filter(|end| *end > after);
            }
            [mapped.earliest(), mapped.latest()]
                .into_iter()
                .flatten()
                .map(|end| end.with_timezone(&Utc))
                .find(|end| *end > after)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    fn utc(hour: u32, minute: u32, second: u32) -> Result<DateTime<Utc>, Box<dyn Error>> {
        Ok(Utc
            .with_ymd_and_hms(2024, 5, 1, hour, minute, second)
            .single()
            .ok_or("invalid instant")?)
    }

    fn minutes(value: u32) -> Result<IntervalMinutes, Box<dyn Error>> {
        Ok(IntervalMinutes::new(value)?)
    }

    #[test]
    fn slot_ends_on_the_next_grid_mark() -> Result<(), Box<dyn Error>> {
        let slot = Slot::containing(utc(12, 2, 30)?, minutes(5)?, Zone::Utc);
        assert_eq!(slot.end(), utc(12, 5, 0)?);
        assert_eq!(slot.label().format("%H:%M").to_string(), "12:00");

        let slot = Slot::containing(utc(12, 0, 30)?, minutes(1)?, Zone::Utc);
        assert_eq!(slot.end(), utc(12, 1, 0)?);
        Ok(())
    }

    #[test]
    fn instant_on_a_mark_owns_the_whole_slot() -> Result<(), Box<dyn Error>> {
        let slot = Slot::containing(utc(12, 5, 0)?, minutes(5)?, Zone::Utc);
        assert_eq!(slot.end(), utc(12, 10, 0)?);
        assert_eq!(slot.label().format("%H:%M").to_string(), "12:05");
        Ok(())
    }

    #[test]
    fn last_slot_of_the_day_stops_at_midnight() -> Result<(), Box<dyn Error>> {
        let slot = Slot::containing(utc(23, 50, 0)?, minutes(7)?, Zone::Utc);
        assert_eq!(slot.label().format("%H:%M").to_string(), "23:48");
        let midnight = Utc
            .with_ymd_and_hms(2024, 5, 2, 0, 0, 0)
            .single()
            .ok_or("invalid instant")?;
        assert_eq!(slot.end(), midnight);

        let day = Slot::containing(utc(9, 0, 0)?, minutes(1440)?, Zone::Utc);
        assert_eq!(day.end(), midnight);
        Ok(())
    }

    #[test]
    fn local_slots_end_after_the_instant() -> Result<(), Box<dyn Error>> {
        let at = utc(12, 2, 30)?;
        let slot = Slot::containing(at, minutes(15)?, Zone::Local);
        assert!(slot.end() > at);
        assert!(slot.end() - at <= TimeDelta::minutes(75));
        Ok(())
    }
}
