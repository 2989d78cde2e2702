/*!
 * Custody Mutation Engine (C4)
 *
 * Single-day create/update plus bulk create, with the adjacency repair
 * that keeps the day after an edit consistent with its new custodian
 * (invariant A4).
 */

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use crate::db::Store;
use crate::error::CoreResult;
use crate::model::CustodyRecord;

use super::types::default_handoff;

/// Month keys (year, month) whose cached views the caller must invalidate,
/// plus the family member who should be notified of the change.
#[derive(Debug, Clone, Default)]
pub struct MutationOutcome {
    pub record: Option<CustodyRecord>,
    pub records_written: usize,
    pub invalidate_months: Vec<(i32, u32)>,
    pub notify_actor_id: Option<Uuid>,
    pub notify_custodian_id: Option<Uuid>,
}

fn month_of(date: NaiveDate) -> (i32, u32) {
    use chrono::Datelike;
    (date.year(), date.month())
}

/// Creates a single custody record. Fails with `CustodyConflict` if one
/// already exists for the date (409 at the HTTP boundary a caller layers
/// on top). When the caller leaves `handoff_day` unset, it is inferred
/// from whether the previous day's custodian differs.
pub async fn create(
    store: &Store,
    family_id: Uuid,
    actor_id: Uuid,
    date: NaiveDate,
    custodian_id: Uuid,
    handoff_day: Option<bool>,
    handoff_time: Option<chrono::NaiveTime>,
    handoff_location: Option<String>,
) -> CoreResult<MutationOutcome> {
    let handoff_day_value = match handoff_day {
        Some(v) => v,
        None if handoff_time.is_some() => true,
        None => {
            let previous = store
                .get_custody_before(family_id, date)
                .await?
                .filter(|r| r.date == date.pred_opt().expect("date has a predecessor"));
            previous
                .map(|r| r.custodian_id != custodian_id)
                .unwrap_or(false)
        }
    };

    let record = store
        .insert_custody(crate::model::NewCustodyRecord {
            family_id,
            date,
            actor_id,
            custodian_id,
            handoff_day: handoff_day_value,
            handoff_time,
            handoff_location,
        })
        .await?;

    info!(%family_id, %date, "created custody record");

    Ok(MutationOutcome {
        record: Some(record),
        records_written: 1,
        invalidate_months: vec![month_of(date)],
        notify_actor_id: Some(actor_id),
        notify_custodian_id: Some(custodian_id),
    })
}

/// Creates many custody records in one transaction, inferring handoffs
/// sequentially in date order (each record's handoff flag is derived from
/// the custodian of the record immediately before it in the sorted input,
/// not from the database).
pub async fn bulk_create(
    store: &Store,
    family_id: Uuid,
    actor_id: Uuid,
    mut inputs: Vec<(NaiveDate, Uuid, Option<bool>, Option<chrono::NaiveTime>, Option<String>)>,
) -> CoreResult<MutationOutcome> {
    inputs.sort_by_key(|(date, ..)| *date);

    let mut previous_custodian: Option<Uuid> = None;
    let mut records = Vec::with_capacity(inputs.len());
    for (date, custodian_id, handoff_day, handoff_time, handoff_location) in inputs {
        let handoff_day_value = match handoff_day {
            Some(v) => v,
            None if handoff_time.is_some() => true,
            None => previous_custodian
                .map(|prev| prev != custodian_id)
                .unwrap_or(false),
        };
        previous_custodian = Some(custodian_id);

        records.push(crate::model::NewCustodyRecord {
            family_id,
            date,
            actor_id,
            custodian_id,
            handoff_day: handoff_day_value,
            handoff_time,
            handoff_location,
        });
    }

    if records.is_empty() {
        return Ok(MutationOutcome::default());
    }

    let mut affected_months: Vec<(i32, u32)> = records.iter().map(|r| month_of(r.date)).collect();
    affected_months.sort_unstable();
    affected_months.dedup();

    let created = store.bulk_upsert_custody(records, false).await?;
    info!(%family_id, created, "bulk created custody records");

    Ok(MutationOutcome {
        record: None,
        records_written: created,
        invalidate_months: affected_months,
        notify_actor_id: Some(actor_id),
        notify_custodian_id: None,
    })
}

/// Updates the custody record for `date`, then repairs adjacency:
/// - today's handoff flag is recomputed from yesterday's custodian, but
///   only when the caller left `handoff_day` unset;
/// - tomorrow's handoff flag is recomputed from today's new custodian
///   unconditionally, since today's change always affects whether tomorrow
///   is a handoff.
///
/// Returns `NotFound` if no record exists for `date` (edits require a
/// prior record; use `create` for a brand new day).
pub async fn update_by_date(
    store: &Store,
    family_id: Uuid,
    actor_id: Uuid,
    date: NaiveDate,
    custodian_id: Uuid,
    handoff_day: Option<bool>,
    handoff_time: Option<chrono::NaiveTime>,
    handoff_location: Option<String>,
) -> CoreResult<MutationOutcome> {
    let (record, invalidate_months) = store
        .update_custody_with_adjacency_repair(
            family_id,
            date,
            custodian_id,
            actor_id,
            handoff_day,
            handoff_time,
            handoff_location,
            default_handoff,
        )
        .await?;

    info!(%family_id, %date, "updated custody record with adjacency repair");

    Ok(MutationOutcome {
        record: Some(record),
        records_written: 1,
        invalidate_months,
        notify_actor_id: Some(actor_id),
        notify_custodian_id: Some(custodian_id),
    })
}
