use chrono::NaiveTime;
use shared_models::GatewayError;

const DISPLAY_FORMAT: &str = "%I:%M %p";
const WIRE_FORMAT: &str = "%H:%M";

/// Parse a clock time in any of the shapes the service and the UI use:
/// `"02:30 PM"`, `"14:30"` or `"14:30:00"`.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, DISPLAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, WIRE_FORMAT))
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

/// Convert a 12-hour display time to the 24-hour `HH:MM` submission format.
pub fn to_24_hour(display: &str) -> Result<String, GatewayError> {
    parse_clock_time(display)
        .map(|time| time.format(WIRE_FORMAT).to_string())
        .ok_or_else(|| {
            GatewayError::validation("appointmentTime", format!("unrecognized time '{}'", display))
        })
}

/// Render a time the way the slot template labels it (`"09:00 AM"`).
pub fn to_display(time: NaiveTime) -> String {
    time.format(DISPLAY_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_afternoon_conversion() {
        assert_eq!(to_24_hour("02:30 PM").unwrap(), "14:30");
        assert_eq!(to_24_hour("05:30 PM").unwrap(), "17:30");
    }

    #[test]
    fn test_noon_and_midnight() {
        assert_eq!(to_24_hour("12:00 PM").unwrap(), "12:00");
        assert_eq!(to_24_hour("12:30 AM").unwrap(), "00:30");
    }

    #[test]
    fn test_morning_and_already_24_hour() {
        assert_eq!(to_24_hour("09:00 AM").unwrap(), "09:00");
        assert_eq!(to_24_hour("14:45").unwrap(), "14:45");
    }

    #[test]
    fn test_rejects_garbage() {
        assert_matches!(
            to_24_hour("half past two"),
            Err(GatewayError::ValidationFailed { ref field, .. }) if field == "appointmentTime"
        );
    }

    #[test]
    fn test_display_round() {
        let time = parse_clock_time("14:30:00").unwrap();
        assert_eq!(to_display(time), "02:30 PM");
    }
}
