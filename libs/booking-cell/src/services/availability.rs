use std::collections::HashSet;

use tracing::debug;

use shared_gateway::Provenance;
use shared_utils::time_format::parse_clock_time;

use crate::models::{Slot, SlotBoard};

/// Bookable times offered on any date.
pub const SLOT_TEMPLATE: [&str; 11] = [
    "09:00 AM", "09:30 AM", "10:00 AM", "10:30 AM", "11:00 AM", "11:30 AM",
    "02:00 PM", "02:30 PM", "03:00 PM", "04:00 PM", "04:30 PM",
];

/// Marked unavailable when the real availability cannot be fetched.
pub const FALLBACK_UNAVAILABLE: [&str; 4] = ["09:00 AM", "11:30 AM", "02:00 PM", "04:30 PM"];

/// Mark each template slot against `unavailable`. Times are compared as clock
/// times, so `"14:00"` blocks `"02:00 PM"`.
pub fn build_board<'a>(
    unavailable: impl IntoIterator<Item = &'a str>,
    provenance: Provenance,
    degraded: bool,
) -> SlotBoard {
    let blocked: HashSet<_> = unavailable
        .into_iter()
        .filter_map(|raw| {
            let parsed = parse_clock_time(raw);
            if parsed.is_none() {
                debug!("Ignoring unparsable unavailable slot '{}'", raw);
            }
            parsed
        })
        .collect();

    let slots = SLOT_TEMPLATE
        .iter()
        .map(|time| Slot {
            time: time.to_string(),
            available: parse_clock_time(time).map_or(true, |t| !blocked.contains(&t)),
        })
        .collect();

    SlotBoard {
        slots,
        provenance,
        degraded,
    }
}

pub fn fallback_board() -> SlotBoard {
    build_board(FALLBACK_UNAVAILABLE, Provenance::Fixture, true)
}
