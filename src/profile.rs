use chrono::{DateTime, Utc};

use crate::scheduling::ScheduleError;

pub type UserId = i64;

/// Local hour of day at which a user's story is delivered.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeliveryHour(u8);

impl DeliveryHour {
    pub fn new(hour: u8) -> Result<Self, ScheduleError> {
        if hour > 23 {
            return Err(ScheduleError::InvalidHour(hour));
        }
        Ok(Self(hour))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct UserDeliveryProfile {
    pub user_id: UserId,
    pub language: Option<String>,
    pub level: Option<String>,
    pub delivery_hour: Option<DeliveryHour>,
    pub timezone: Option<String>,
    pub last_sent: Option<DateTime<Utc>>,
    pub configured: bool,
    pub paused: bool,
}

impl UserDeliveryProfile {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            language: None,
            level: None,
            delivery_hour: None,
            timezone: None,
            last_sent: None,
            configured: false,
            paused: false,
        }
    }

    pub fn active(&self) -> bool {
        self.configured && !self.paused
    }

    /// Hour and timezone are both set, so a timer can be computed at all.
    pub fn is_schedulable(&self) -> bool {
        self.delivery_hour.is_some() && self.timezone.is_some()
    }

    pub fn schedule_params(&self) -> Result<(DeliveryHour, &str), ScheduleError> {
        match (self.delivery_hour, self.timezone.as_deref()) {
            (Some(hour), Some(tz)) => Ok((hour, tz)),
            _ => Err(ScheduleError::NotSchedulable(self.user_id)),
        }
    }
}
