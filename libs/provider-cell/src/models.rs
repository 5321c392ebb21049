// libs/provider-cell/src/models.rs
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::slots::generate_slots;

pub const DEFAULT_SLOT_MINUTES: u32 = 30;
pub const MIN_SLOT_MINUTES: u32 = 15;
pub const MAX_SLOT_MINUTES: u32 = 120;

pub fn default_window_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

pub fn default_window_end() -> NaiveTime {
    NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default()
}

// ==============================================================================
// PROVIDER SCHEDULE
// ==============================================================================

/// A provider's daily working window. Unset bounds fall back to 08:00–17:00.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSchedule {
    pub provider_id: Uuid,
    #[serde(default, with = "time_format::option")]
    pub window_start: Option<NaiveTime>,
    #[serde(default, with = "time_format::option")]
    pub window_end: Option<NaiveTime>,
    #[serde(default = "default_slot_minutes")]
    pub slot_minutes: u32,
}

fn default_slot_minutes() -> u32 {
    DEFAULT_SLOT_MINUTES
}

impl ProviderSchedule {
    /// The schedule a provider has before configuring one.
    pub fn default_for(provider_id: Uuid) -> Self {
        Self {
            provider_id,
            window_start: None,
            window_end: None,
            slot_minutes: DEFAULT_SLOT_MINUTES,
        }
    }

    pub fn effective_window(&self) -> (NaiveTime, NaiveTime) {
        (
            self.window_start.unwrap_or_else(default_window_start),
            self.window_end.unwrap_or_else(default_window_end),
        )
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        let (start, end) = self.effective_window();
        validate_window(start, end, self.slot_minutes)
    }

    /// Every bookable start time in the window, recomputed on each call.
    pub fn slots(&self) -> Result<Vec<NaiveTime>, ScheduleError> {
        generate_slots(self.window_start, self.window_end, self.slot_minutes)
    }

    pub fn offers_slot(&self, time: NaiveTime) -> Result<bool, ScheduleError> {
        Ok(self.slots()?.contains(&time))
    }

    /// Applies a partial update on top of the current schedule and validates the result.
    pub fn apply(&self, request: &UpdateScheduleRequest) -> Result<Self, ScheduleError> {
        let window_start = match request.window_start.as_deref() {
            Some(raw) => Some(parse_bound(raw)?),
            None => self.window_start,
        };
        let window_end = match request.window_end.as_deref() {
            Some(raw) => Some(parse_bound(raw)?),
            None => self.window_end,
        };

        let updated = Self {
            provider_id: self.provider_id,
            window_start,
            window_end,
            slot_minutes: request.slot_minutes.unwrap_or(self.slot_minutes),
        };

        updated.validate()?;
        Ok(updated)
    }
}

pub(crate) fn validate_window(
    start: NaiveTime,
    end: NaiveTime,
    slot_minutes: u32,
) -> Result<(), ScheduleError> {
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&slot_minutes) {
        return Err(ScheduleError::InvalidDuration(slot_minutes));
    }

    if start >= end {
        return Err(ScheduleError::InvalidWindow { start, end });
    }

    Ok(())
}

fn parse_bound(raw: &str) -> Result<NaiveTime, ScheduleError> {
    time_format::parse_time(raw).ok_or_else(|| ScheduleError::InvalidTime(raw.to_string()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateScheduleRequest {
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub slot_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Slot duration must be between 15 and 120 minutes, got {0}")]
    InvalidDuration(u32),

    #[error("Working window start {start} must be before end {end}")]
    InvalidWindow { start: NaiveTime, end: NaiveTime },

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),
}

// ==============================================================================
// TIME-OF-DAY WIRE FORMAT
// ==============================================================================

/// Times travel as `HH:MM`. Postgres returns `HH:MM:SS`, which is accepted on input.
pub mod time_format {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    /// Parses `HH:MM` or `HH:MM:SS[.f]`, truncating to whole minutes.
    pub fn parse_time(raw: &str) -> Option<NaiveTime> {
        let raw = raw.trim();
        let parsed = NaiveTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S%.f"))
            .ok()?;
        parsed.with_second(0)?.with_nanosecond(0)
    }

    pub fn format_time(time: &NaiveTime) -> String {
        time.format(FORMAT).to_string()
    }

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_time(time))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_time(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day '{}'", raw)))
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match time {
                Some(time) => super::serialize(time, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse_time(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day '{}'", raw))),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn unset_window_uses_business_hours() {
        let schedule = ProviderSchedule::default_for(Uuid::new_v4());
        assert_eq!(schedule.effective_window(), (t(8, 0), t(17, 0)));
        assert_eq!(schedule.slots().unwrap().len(), 18);
    }

    #[test]
    fn apply_rejects_out_of_range_duration() {
        let schedule = ProviderSchedule::default_for(Uuid::new_v4());
        let request = UpdateScheduleRequest {
            slot_minutes: Some(10),
            ..Default::default()
        };
        assert_matches!(schedule.apply(&request), Err(ScheduleError::InvalidDuration(10)));
    }

    #[test]
    fn apply_rejects_inverted_window() {
        let schedule = ProviderSchedule::default_for(Uuid::new_v4());
        let request = UpdateScheduleRequest {
            window_start: Some("18:00".to_string()),
            ..Default::default()
        };
        assert_matches!(schedule.apply(&request), Err(ScheduleError::InvalidWindow { .. }));
    }

    #[test]
    fn apply_merges_partial_update() {
        let schedule = ProviderSchedule::default_for(Uuid::new_v4());
        let request = UpdateScheduleRequest {
            window_end: Some("12:00:00".to_string()),
            slot_minutes: Some(60),
            ..Default::default()
        };
        let updated = schedule.apply(&request).unwrap();
        assert_eq!(updated.window_start, None);
        assert_eq!(updated.window_end, Some(t(12, 0)));
        assert_eq!(updated.slots().unwrap(), vec![t(8, 0), t(9, 0), t(10, 0), t(11, 0)]);
    }

    #[test]
    fn schedule_deserializes_postgres_times() {
        let schedule: ProviderSchedule = serde_json::from_value(json!({
            "provider_id": Uuid::nil(),
            "window_start": "09:00:00",
            "window_end": null,
            "slot_minutes": 45
        }))
        .unwrap();
        assert_eq!(schedule.window_start, Some(t(9, 0)));
        assert_eq!(schedule.window_end, None);

        let value = serde_json::to_value(&schedule).unwrap();
        assert_eq!(value["window_start"], "09:00");
    }

    #[test]
    fn parse_time_truncates_seconds() {
        assert_eq!(time_format::parse_time("10:15:42"), Some(t(10, 15)));
        assert_eq!(time_format::parse_time("25:00"), None);
        assert_eq!(time_format::parse_time("noon"), None);
    }
}
