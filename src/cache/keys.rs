//! Cache key construction: `calndr:<domain>:<scope>:<args>`.

use chrono::NaiveDate;
use uuid::Uuid;

pub fn custody_month_key(family_id: Uuid, year: i32, month: u32) -> String {
    format!("calndr:custody:family:{family_id}:{year:04}-{month:02}")
}

pub fn handoff_month_key(family_id: Uuid, year: i32, month: u32) -> String {
    format!("calndr:handoff:family:{family_id}:{year:04}-{month:02}")
}

pub fn events_range_key(family_id: Uuid, start: NaiveDate, end: NaiveDate) -> String {
    format!("calndr:events:family:{family_id}:{start}:{end}")
}

pub fn family_custody_pattern(family_id: Uuid) -> String {
    format!("calndr:custody:family:{family_id}:*")
}

pub fn family_handoff_pattern(family_id: Uuid) -> String {
    format!("calndr:handoff:family:{family_id}:*")
}

pub fn family_events_pattern(family_id: Uuid) -> String {
    format!("calndr:events:family:{family_id}:*")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custody_month_key_has_zero_padded_month() {
        let family_id = Uuid::nil();
        let key = custody_month_key(family_id, 2026, 3);
        assert!(key.ends_with(":2026-03"));
        assert!(key.starts_with("calndr:custody:family:"));
    }

    #[test]
    fn family_custody_and_handoff_patterns_cover_both_domains() {
        let family_id = Uuid::nil();
        assert!(family_custody_pattern(family_id).starts_with("calndr:custody:family:"));
        assert!(family_handoff_pattern(family_id).starts_with("calndr:handoff:family:"));
    }
}
