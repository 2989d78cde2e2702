/*!
 * Integrity Auditor (C8)
 *
 * Scans a family's full custody history for records whose `custodian_id`
 * no longer belongs to an active family member, and can suggest or apply
 * a fix by alternating from the previous day's custodian.
 */

use uuid::Uuid;

use crate::db::Store;
use crate::error::CoreResult;
use crate::model::CustodyRecord;

#[derive(Debug, Clone)]
pub struct Mismatch {
    pub record: CustodyRecord,
    pub suggested_custodian_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub total_records: usize,
    pub valid_records: usize,
    pub mismatches: Vec<Mismatch>,
}

/// Scans every custody record for the family and flags any whose
/// custodian is not among the family's currently active members. A
/// suggestion is only offered when the family has exactly two active
/// members, by alternating from the previous day's custodian.
pub async fn check(store: &Store, family_id: Uuid) -> CoreResult<IntegrityReport> {
    let active_members = store.get_active_family_members(family_id).await?;
    let valid_ids: Vec<Uuid> = active_members.iter().map(|u| u.id).collect();

    let records = store.get_all_custody_for_family(family_id).await?;
    let total_records = records.len();

    let mut mismatches = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        if valid_ids.contains(&record.custodian_id) {
            continue;
        }

        let suggested = suggest_custodian(&records, idx, &valid_ids);
        mismatches.push(Mismatch {
            record: record.clone(),
            suggested_custodian_id: suggested,
        });
    }

    let valid_records = total_records - mismatches.len();
    Ok(IntegrityReport {
        total_records,
        valid_records,
        mismatches,
    })
}

/// Suggests a replacement custodian for the mismatched record at `idx` by
/// alternating from the previous day's record if it has a valid
/// custodian, otherwise defaulting to the first active member. Only
/// offered when the family has exactly two active members — with more or
/// fewer there is no well-defined alternation.
fn suggest_custodian(records: &[CustodyRecord], idx: usize, valid_ids: &[Uuid]) -> Option<Uuid> {
    if valid_ids.len() != 2 {
        return None;
    }

    let current_date = records[idx].date;
    let previous_date = current_date.pred_opt()?;
    let previous = records
        .iter()
        .find(|r| r.date == previous_date && valid_ids.contains(&r.custodian_id));

    match previous {
        Some(previous) => {
            let other = valid_ids.iter().find(|&&id| id != previous.custodian_id).copied();
            other.or(Some(valid_ids[0]))
        }
        None => Some(valid_ids[0]),
    }
}

/// Applies the suggested fix to every mismatched record that has one,
/// returning the number of rows actually updated. Callers are expected to
/// run `check` first in dry-run mode and only invoke this once a human (or
/// caller policy) has approved the preview.
pub async fn apply_fixes(store: &Store, report: &IntegrityReport) -> CoreResult<usize> {
    let fixes: Vec<(i32, Uuid)> = report
        .mismatches
        .iter()
        .filter_map(|m| m.suggested_custodian_id.map(|c| (m.record.id, c)))
        .collect();
    store.apply_custodian_fixes(&fixes).await
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(id: i32, date: NaiveDate, custodian_id: Uuid) -> CustodyRecord {
        CustodyRecord {
            id,
            family_id: Uuid::new_v4(),
            date,
            actor_id: Uuid::new_v4(),
            custodian_id,
            handoff_day: None,
            handoff_time: None,
            handoff_location: None,
            created_at: None,
        }
    }

    #[test]
    fn suggests_none_without_exactly_two_active_members() {
        let parent_a = Uuid::new_v4();
        let stray = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let records = vec![record(1, date, stray)];
        assert_eq!(suggest_custodian(&records, 0, &[parent_a]), None);
    }

    #[test]
    fn suggests_alternation_from_valid_previous_day() {
        let parent_a = Uuid::new_v4();
        let parent_b = Uuid::new_v4();
        let stray = Uuid::new_v4();
        let day1 = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let day2 = day1.succ_opt().unwrap();
        let records = vec![record(1, day1, parent_a), record(2, day2, stray)];
        let suggestion = suggest_custodian(&records, 1, &[parent_a, parent_b]);
        assert_eq!(suggestion, Some(parent_b));
    }

    #[test]
    fn defaults_to_first_active_member_without_valid_previous_day() {
        let parent_a = Uuid::new_v4();
        let parent_b = Uuid::new_v4();
        let stray = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let records = vec![record(1, date, stray)];
        let suggestion = suggest_custodian(&records, 0, &[parent_a, parent_b]);
        assert_eq!(suggestion, Some(parent_a));
    }
}
