use chrono::offset::LocalResult;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::profile::{DeliveryHour, UserId};

/// Bound on the candidate-advancing loop. A `last_sent` this far ahead of the
/// clock means corrupted data, not a schedule.
const MAX_CATCHUP_DAYS: u32 = 400;

/// Minimum spacing between two deliveries. Keeps an hour edited after
/// today's send from producing a second story the same day.
pub const MIN_DELIVERY_SPACING: TimeDelta = TimeDelta::hours(24);

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("delivery hour {0} is out of range 0..=23")]
    InvalidHour(u8),

    #[error("timezone {0:?} is not a known IANA zone")]
    InvalidTimezone(String),

    #[error("user {0} has no delivery hour or timezone configured")]
    NotSchedulable(UserId),

    #[error("no future delivery instant representable in {timezone} at hour {hour}")]
    Unrepresentable { timezone: String, hour: u8 },
}

/// Next instant at which a delivery should fire.
///
/// Takes today's occurrence of `delivery_hour` in the user's zone, pushes it
/// to tomorrow if it already passed, and keeps pushing day by day until it
/// clears `last_sent + 24h`. The result is strictly after `now`.
pub fn compute_next_fire(
    delivery_hour: DeliveryHour,
    timezone: &str,
    last_sent: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let tz: Tz = timezone
        .parse()
        .map_err(|_| ScheduleError::InvalidTimezone(timezone.to_owned()))?;

    let unrepresentable = || ScheduleError::Unrepresentable {
        timezone: timezone.to_owned(),
        hour: delivery_hour.get(),
    };

    let earliest_allowed = last_sent.map(|sent| sent + MIN_DELIVERY_SPACING);
    let mut date = now.with_timezone(&tz).date_naive();

    for _ in 0..MAX_CATCHUP_DAYS {
        // A date can project to nothing at all (zones that skipped a whole
        // calendar day); such dates are stepped over like past ones.
        if let Some(candidate) = project_local(tz, date, delivery_hour) {
            let candidate = candidate.with_timezone(&Utc);
            let too_early = candidate <= now
                || earliest_allowed.is_some_and(|earliest| candidate < earliest);
            if !too_early {
                return Ok(candidate);
            }
        }

        date = date.succ_opt().ok_or_else(unrepresentable)?;
    }

    Err(unrepresentable())
}

/// Projects a local wall-clock hour on a calendar date into an instant.
/// Ambiguous times (clocks falling back) take the earlier offset; times
/// inside a spring-forward gap slide one hour later.
fn project_local(tz: Tz, date: NaiveDate, hour: DeliveryHour) -> Option<DateTime<Tz>> {
    let wall_clock = date.and_time(NaiveTime::from_hms_opt(hour.get().into(), 0, 0)?);

    match tz.from_local_datetime(&wall_clock) {
        LocalResult::Single(instant) => Some(instant),
        LocalResult::Ambiguous(earlier, _) => Some(earlier),
        LocalResult::None => tz
            .from_local_datetime(&(wall_clock + TimeDelta::hours(1)))
            .earliest(),
    }
}
