/*!
 * Monthly Query Engine (C5)
 *
 * Cache-through reads of a family's custody records for a calendar month,
 * plus a specialized handoff-only view. Both read through the same two
 * caches the relational store backs: a full-month cache and a
 * handoff-times-only cache, each keyed per family/year/month.
 */

use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::keys::{custody_month_key, handoff_month_key};
use crate::cache::CacheCoordinator;
use crate::db::Store;
use crate::error::{CoreError, CoreResult};
use crate::model::CustodyRecord;

use super::generator::generate_from_template;

const CURRENT_MONTH_TTL: Duration = Duration::from_secs(1800);
const PAST_MONTH_TTL: Duration = Duration::from_secs(14400);
const HANDOFF_TTL: Duration = Duration::from_secs(3600);

fn month_bounds(year: i32, month: u32) -> CoreResult<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| CoreError::ValidationError {
        field: "month".to_string(),
        message: format!("invalid year/month {year}/{month}"),
    })?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("valid next month")
        .pred_opt()
        .expect("month has at least one day");
    Ok((start, end))
}

/// Shorter TTL for the current-or-future month since it is still being
/// written to, longer TTL for a settled past month.
fn ttl_for_month(start: NaiveDate) -> Duration {
    let current_month_start = Utc::now().date_naive().with_day(1).expect("day 1 is valid");
    if start >= current_month_start {
        CURRENT_MONTH_TTL
    } else {
        PAST_MONTH_TTL
    }
}

/// Returns every custody record for `year`/`month`, generating from the
/// family's active template first if the month is empty and entirely in
/// the future (auto-fill-ahead). Past and present months are never
/// auto-generated into; an empty result there just means no records exist.
pub async fn get_month(
    store: &Store,
    cache: &CacheCoordinator,
    family_id: Uuid,
    year: i32,
    month: u32,
) -> CoreResult<Vec<CustodyRecord>> {
    let (start, end) = month_bounds(year, month)?;
    let key = custody_month_key(family_id, year, month);

    if let Some(cached) = cache.get::<Vec<CustodyRecord>>(&key).await {
        if !cached.is_empty() {
            debug!(%family_id, year, month, "custody month cache hit");
            return Ok(cached);
        }
        debug!(%family_id, year, month, "custody month cache hit was empty, treating as stale");
    }

    let mut records = store.get_custody_for_range(family_id, start, end).await?;

    let today = Utc::now().date_naive();
    if records.is_empty() && start > today {
        if let Some(template) = store.get_active_template(family_id).await? {
            info!(%family_id, year, month, "empty future month, generating from active template");
            generate_from_template(store, &template, start, end, family_id, template.created_by_user_id, true)
                .await?;
            records = store.get_custody_for_range(family_id, start, end).await?;
        }
    }

    cache.set(&key, &records, Some(ttl_for_month(start))).await;
    Ok(records)
}

/// Returns only the records in `year`/`month` that are handoff days with a
/// handoff time set, cached separately from the full month view since
/// handoff schedules change far less often than day-to-day custody edits.
pub async fn get_month_handoffs(
    store: &Store,
    cache: &CacheCoordinator,
    family_id: Uuid,
    year: i32,
    month: u32,
) -> CoreResult<Vec<CustodyRecord>> {
    let (start, end) = month_bounds(year, month)?;
    let key = handoff_month_key(family_id, year, month);

    if let Some(cached) = cache.get::<Vec<CustodyRecord>>(&key).await {
        debug!(%family_id, year, month, "handoff month cache hit");
        return Ok(cached);
    }

    let records: Vec<CustodyRecord> = store
        .get_custody_for_range(family_id, start, end)
        .await?
        .into_iter()
        .filter(|r| r.handoff_day.unwrap_or(false) && r.handoff_time.is_some())
        .collect();

    cache.set(&key, &records, Some(HANDOFF_TTL)).await;
    Ok(records)
}
