use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::error::CoreResult;
use crate::model::{ParsedProviderEvent, Provider, ProviderCalendarSync, ProviderEvent, ProviderKind};

use super::Store;

fn table(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::School => "school",
        ProviderKind::Daycare => "daycare",
    }
}

/// Outcome of upserting a provider's sync row: the row's id, and whether
/// this call created the row or flipped `sync_enabled` from false to true
/// — either case means the family's sync assignment pointer needs to be
/// (re)targeted at it, per §4.6 step 4.
pub struct UpsertedSync {
    pub sync_id: i32,
    pub needs_assignment: bool,
}

impl Store {
    pub async fn get_provider(&self, kind: ProviderKind, provider_id: i32) -> CoreResult<Provider> {
        let t = table(kind);
        sqlx::query_as::<_, Provider>(&format!(
            "SELECT id, family_id, name, website FROM {t}_providers WHERE id = $1"
        ))
        .bind(provider_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| crate::error::CoreError::not_found("provider", provider_id.to_string()))
    }

    /// Upserts the `ProviderCalendarSync` row keyed by `(provider, calendar_url)`:
    /// inserts a new row if none exists for this URL, re-enables an existing
    /// disabled row, or leaves an already-enabled row's `sync_enabled` as-is.
    pub async fn upsert_calendar_sync(
        &self,
        kind: ProviderKind,
        provider_id: i32,
        calendar_url: &str,
    ) -> CoreResult<UpsertedSync> {
        let t = table(kind);
        let existing = sqlx::query_as::<_, (i32, bool)>(&format!(
            "SELECT id, sync_enabled FROM {t}_calendar_syncs WHERE {t}_provider_id = $1 AND calendar_url = $2"
        ))
        .bind(provider_id)
        .bind(calendar_url)
        .fetch_optional(self.pool())
        .await?;

        match existing {
            Some((sync_id, true)) => Ok(UpsertedSync {
                sync_id,
                needs_assignment: false,
            }),
            Some((sync_id, false)) => {
                sqlx::query(&format!(
                    "UPDATE {t}_calendar_syncs SET sync_enabled = true, updated_at = now() WHERE id = $1"
                ))
                .bind(sync_id)
                .execute(self.pool())
                .await?;
                Ok(UpsertedSync {
                    sync_id,
                    needs_assignment: true,
                })
            }
            None => {
                let (sync_id,): (i32,) = sqlx::query_as(&format!(
                    r#"INSERT INTO {t}_calendar_syncs ({t}_provider_id, calendar_url, sync_enabled)
                       VALUES ($1, $2, true) RETURNING id"#
                ))
                .bind(provider_id)
                .bind(calendar_url)
                .fetch_one(self.pool())
                .await?;
                Ok(UpsertedSync {
                    sync_id,
                    needs_assignment: true,
                })
            }
        }
    }

    pub async fn get_providers_with_sync_enabled(
        &self,
        kind: ProviderKind,
    ) -> CoreResult<Vec<(Provider, ProviderCalendarSync)>> {
        let t = table(kind);
        let rows = sqlx::query_as::<_, ProviderSyncRow>(&format!(
            r#"SELECT p.id AS provider_id, p.family_id, p.name, p.website,
                      s.id AS sync_id, s.{t}_provider_id AS sync_provider_id, s.calendar_url,
                      s.last_sync_at, s.last_sync_success, s.last_sync_error,
                      s.events_count, s.sync_enabled
               FROM {t}_providers p
               JOIN {t}_calendar_syncs s ON s.{t}_provider_id = p.id
               WHERE s.sync_enabled = true"#
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    Provider {
                        id: r.provider_id,
                        family_id: r.family_id,
                        name: r.name,
                        website: r.website,
                    },
                    ProviderCalendarSync {
                        id: r.sync_id,
                        provider_id: r.sync_provider_id,
                        calendar_url: r.calendar_url,
                        last_sync_at: r.last_sync_at,
                        last_sync_success: r.last_sync_success,
                        last_sync_error: r.last_sync_error,
                        events_count: r.events_count,
                        sync_enabled: r.sync_enabled,
                    },
                )
            })
            .collect())
    }
}

#[derive(sqlx::FromRow)]
struct ProviderSyncRow {
    provider_id: i32,
    family_id: Uuid,
    name: String,
    website: Option<String>,
    sync_id: i32,
    sync_provider_id: i32,
    calendar_url: String,
    last_sync_at: Option<chrono::DateTime<Utc>>,
    last_sync_success: Option<bool>,
    last_sync_error: Option<String>,
    events_count: i32,
    sync_enabled: bool,
}

impl Store {

    /// Deletes all stored events for a provider, then inserts the freshly
    /// parsed set, inside one transaction (C6's atomic per-provider
    /// replace-on-sync semantics).
    pub async fn replace_provider_events(
        &self,
        kind: ProviderKind,
        provider_id: i32,
        events: Vec<ParsedProviderEvent>,
    ) -> CoreResult<usize> {
        let t = table(kind);
        let mut tx = self.pool().begin().await?;

        sqlx::query(&format!("DELETE FROM {t}_events WHERE {t}_provider_id = $1"))
            .bind(provider_id)
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0usize;
        for event in &events {
            sqlx::query(&format!(
                r#"INSERT INTO {t}_events ({t}_provider_id, event_date, title, description, event_type, start_time, end_time, all_day)
                   VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                   ON CONFLICT ({t}_provider_id, event_date, title) DO NOTHING"#
            ))
            .bind(provider_id)
            .bind(event.event_date)
            .bind(&event.title)
            .bind(&event.description)
            .bind(&event.event_type)
            .bind(event.start_time)
            .bind(event.end_time)
            .bind(event.all_day)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Records a sync attempt's outcome on the row keyed by `(provider,
    /// calendar_url)`, not just `provider` — a provider may have more than
    /// one sync row (stale URLs from earlier `parse-events` calls), and
    /// only the row for the URL actually synced should be touched.
    pub async fn record_sync_result(
        &self,
        kind: ProviderKind,
        provider_id: i32,
        calendar_url: &str,
        success: bool,
        error: Option<String>,
        events_count: i32,
    ) -> CoreResult<()> {
        let t = table(kind);
        sqlx::query(&format!(
            r#"UPDATE {t}_calendar_syncs
               SET last_sync_at = now(), last_sync_success = $3, last_sync_error = $4,
                   events_count = $5, updated_at = now()
               WHERE {t}_provider_id = $1 AND calendar_url = $2"#
        ))
        .bind(provider_id)
        .bind(calendar_url)
        .bind(success)
        .bind(error)
        .bind(events_count)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// School-sourced events for a family's aggregated calendar: closure
    /// events only (asymmetric with daycare, see `get_family_daycare_events`).
    pub async fn get_family_school_closure_events(
        &self,
        family_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<ProviderEvent>> {
        let rows = sqlx::query_as::<_, ProviderEvent>(
            r#"SELECT se.id, se.school_provider_id AS provider_id, sp.name AS provider_name,
                      se.event_date, se.title,
                      se.description, se.event_type, se.start_time, se.end_time, se.all_day
               FROM school_events se
               JOIN school_providers sp ON sp.id = se.school_provider_id
               JOIN school_calendar_syncs scs ON scs.school_provider_id = sp.id
               JOIN families f ON f.school_sync_id = scs.id
               WHERE f.id = $1 AND se.event_type = 'closure' AND scs.sync_enabled = true
                 AND se.event_date >= $2 AND se.event_date <= $3
               ORDER BY se.event_date, se.start_time"#,
        )
        .bind(family_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Daycare-sourced events for a family's aggregated calendar: all event
    /// types, unlike the school path above.
    pub async fn get_family_daycare_events(
        &self,
        family_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<ProviderEvent>> {
        let rows = sqlx::query_as::<_, ProviderEvent>(
            r#"SELECT de.id, de.daycare_provider_id AS provider_id, dp.name AS provider_name,
                      de.event_date, de.title,
                      de.description, de.event_type, de.start_time, de.end_time, de.all_day
               FROM daycare_events de
               JOIN daycare_providers dp ON dp.id = de.daycare_provider_id
               JOIN daycare_calendar_syncs dcs ON dcs.daycare_provider_id = dp.id
               JOIN families f ON f.daycare_sync_id = dcs.id
               WHERE f.id = $1 AND dcs.sync_enabled = true
                 AND de.event_date >= $2 AND de.event_date <= $3
               ORDER BY de.event_date, de.start_time"#,
        )
        .bind(family_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
