// libs/provider-cell/src/services/slots.rs
use chrono::{Duration, NaiveTime};
use tracing::debug;

use crate::models::{default_window_end, default_window_start, validate_window, ScheduleError};

/// Bookable start times for one day of a provider's working window.
///
/// Slots are spaced exactly `duration_minutes` apart starting at the window
/// start. A slot is only offered when it ends inside the window, so a partial
/// trailing slot is dropped, and a window no longer than one slot yields no
/// slots at all. Missing bounds default to 08:00–17:00.
pub fn generate_slots(
    window_start: Option<NaiveTime>,
    window_end: Option<NaiveTime>,
    duration_minutes: u32,
) -> Result<Vec<NaiveTime>, ScheduleError> {
    let start = window_start.unwrap_or_else(default_window_start);
    let end = window_end.unwrap_or_else(default_window_end);
    validate_window(start, end, duration_minutes)?;

    let step = Duration::minutes(i64::from(duration_minutes));
    if step >= end - start {
        debug!("Window {}-{} cannot hold a {} minute slot", start, end, duration_minutes);
        return Ok(Vec::new());
    }

    let mut slots = Vec::new();
    let mut current = start;

    loop {
        let (slot_end, wrapped_days) = current.overflowing_add_signed(step);
        if wrapped_days != 0 || slot_end > end {
            break;
        }
        slots.push(current);
        current = slot_end;
    }

    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn one_hour_window_holds_two_half_hour_slots() {
        let slots = generate_slots(Some(t(8, 0)), Some(t(9, 0)), 30).unwrap();
        assert_eq!(slots, vec![t(8, 0), t(8, 30)]);
    }

    #[test]
    fn window_shorter_than_slot_is_empty() {
        let slots = generate_slots(Some(t(8, 0)), Some(t(8, 20)), 30).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn window_equal_to_slot_is_empty() {
        let slots = generate_slots(Some(t(8, 0)), Some(t(9, 0)), 60).unwrap();
        assert!(slots.is_empty());
    }

    #[test]
    fn partial_trailing_slot_is_dropped() {
        let slots = generate_slots(Some(t(9, 0)), Some(t(10, 10)), 20).unwrap();
        assert_eq!(slots, vec![t(9, 0), t(9, 20), t(9, 40)]);
    }

    #[test]
    fn defaults_to_business_hours() {
        let slots = generate_slots(None, None, 30).unwrap();
        assert_eq!(slots.first(), Some(&t(8, 0)));
        assert_eq!(slots.last(), Some(&t(16, 30)));
        assert_eq!(slots.len(), 18);
    }

    #[test]
    fn rejects_invalid_inputs() {
        assert_matches!(
            generate_slots(Some(t(8, 0)), Some(t(12, 0)), 10),
            Err(ScheduleError::InvalidDuration(10))
        );
        assert_matches!(
            generate_slots(Some(t(8, 0)), Some(t(12, 0)), 121),
            Err(ScheduleError::InvalidDuration(121))
        );
        assert_matches!(
            generate_slots(Some(t(12, 0)), Some(t(8, 0)), 30),
            Err(ScheduleError::InvalidWindow { .. })
        );
    }

    #[test]
    fn late_window_does_not_wrap_past_midnight() {
        let slots = generate_slots(Some(t(22, 0)), Some(t(23, 59)), 45).unwrap();
        assert_eq!(slots, vec![t(22, 0), t(22, 45)]);
    }
}
