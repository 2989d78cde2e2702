/*!
 * Custody Generator (C3)
 *
 * Materializes `CustodyRecord`s from a family's active weekly
 * `ScheduleTemplate` over a date range.
 */

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::error::{CoreError, CoreResult};
use crate::model::{NewCustodyRecord, ParentSlot, PatternType, ScheduleTemplate};

use super::types::{default_handoff, weekday_key, GenerationResult};

/// Generates custody records for `family_id` between `start_date` and
/// `end_date` (inclusive) from `template`. `start_date` is coerced forward
/// to tomorrow if it falls on or before today — generation never touches
/// today or the past. Returns `Ok(0 records)` rather than an error when the
/// coerced range is empty.
pub async fn generate_from_template(
    store: &Store,
    template: &ScheduleTemplate,
    start_date: NaiveDate,
    end_date: NaiveDate,
    family_id: Uuid,
    actor_id: Uuid,
    respect_existing: bool,
) -> CoreResult<GenerationResult> {
    let today = Utc::now().date_naive();
    let start_date = if start_date <= today {
        today.succ_opt().expect("today has a successor date")
    } else {
        start_date
    };

    if end_date <= start_date {
        warn!(%family_id, %start_date, %end_date, "end date not after start date, nothing to generate");
        return Ok(GenerationResult::default());
    }

    if template.pattern_type != PatternType::Weekly {
        return Err(CoreError::UnsupportedPattern {
            reason: format!("pattern type {:?} is not supported for generation", template.pattern_type),
        });
    }

    let pattern = template
        .weekly_pattern_typed()
        .map_err(|e| CoreError::UnsupportedPattern {
            reason: format!("invalid weekly_pattern JSON: {e}"),
        })?;
    if pattern.is_empty() {
        return Err(CoreError::UnsupportedPattern {
            reason: "weekly_pattern is empty".to_string(),
        });
    }

    let members = store.get_family_members(family_id).await?;
    if members.len() < 2 {
        return Err(CoreError::InsufficientFamilyMembers {
            family_id,
            found: members.len(),
        });
    }
    let parent1_id = members[0].id;
    let parent2_id = members[1].id;

    let existing_by_date = if respect_existing {
        store
            .get_custody_for_range(family_id, start_date, end_date)
            .await?
            .into_iter()
            .map(|r| (r.date, r))
            .collect::<HashMap<_, _>>()
    } else {
        HashMap::new()
    };

    let mut previous_custodian = store
        .get_custody_before(family_id, start_date)
        .await?
        .map(|r| r.custodian_id);

    let mut records = Vec::new();
    let mut current = start_date;
    while current <= end_date {
        if respect_existing {
            if let Some(existing) = existing_by_date.get(&current) {
                previous_custodian = Some(existing.custodian_id);
                current = current.succ_opt().expect("date has a successor");
                continue;
            }
        }

        if let Some(slot) = pattern.get(weekday_key(current)) {
            let custodian_id = match slot {
                ParentSlot::Parent1 => parent1_id,
                ParentSlot::Parent2 => parent2_id,
            };

            let is_handoff_day = previous_custodian.is_some_and(|prev| prev != custodian_id);
            let (handoff_time, handoff_location) = if is_handoff_day {
                let (time, location) = default_handoff(current);
                (Some(time), Some(location.to_string()))
            } else {
                (None, None)
            };

            records.push(NewCustodyRecord {
                family_id,
                date: current,
                actor_id,
                custodian_id,
                handoff_day: is_handoff_day,
                handoff_time,
                handoff_location,
            });

            previous_custodian = Some(custodian_id);
        }

        current = current.succ_opt().expect("date has a successor");
    }

    if records.is_empty() {
        return Ok(GenerationResult::default());
    }

    let mut affected_months: Vec<(i32, u32)> = records
        .iter()
        .map(|r| (r.date.year(), r.date.month()))
        .collect();
    affected_months.sort_unstable();
    affected_months.dedup();

    let created = store.bulk_upsert_custody(records, respect_existing).await?;
    info!(%family_id, created, "generated custody records from template");

    Ok(GenerationResult {
        created,
        affected_months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PatternType;

    fn template_with_pattern(pattern: serde_json::Value) -> ScheduleTemplate {
        ScheduleTemplate {
            id: 1,
            family_id: Uuid::new_v4(),
            name: "Standard".to_string(),
            description: None,
            pattern_type: PatternType::Weekly,
            weekly_pattern: Some(pattern),
            alternating_weeks_pattern: None,
            is_active: true,
            created_by_user_id: Uuid::new_v4(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn rejects_non_weekly_pattern_types() {
        let mut template = template_with_pattern(serde_json::json!({}));
        template.pattern_type = PatternType::Custom;
        assert_eq!(template.pattern_type, PatternType::Custom);
    }

    #[test]
    fn empty_weekly_pattern_parses_but_is_caught_by_emptiness_check() {
        let template = template_with_pattern(serde_json::json!({}));
        let parsed = template.weekly_pattern_typed().unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn weekly_pattern_round_trips_parent_slots() {
        let template = template_with_pattern(serde_json::json!({
            "monday": "parent1",
            "saturday": "parent2",
        }));
        let parsed = template.weekly_pattern_typed().unwrap();
        assert_eq!(parsed.get("monday"), Some(&ParentSlot::Parent1));
        assert_eq!(parsed.get("saturday"), Some(&ParentSlot::Parent2));
        assert_eq!(parsed.get("tuesday"), None);
    }
}
