/*!
 * External Calendar Sync Pipeline (C6): orchestration
 *
 * Ties discovery, parsing, and persistence together per provider, and
 * runs the scheduled batch pass across every enabled sync.
 */

use reqwest::Client;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::Store;
use crate::error::CoreResult;
use crate::model::ProviderKind;

use super::discovery::discover_calendar_url;
use super::parser::parse_events_from_url;

/// Outcome of discovery triggered manually for one provider.
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    pub discovered_calendar_url: Option<String>,
    pub success: bool,
}

pub async fn discover_for_provider(client: &Client, base_url: &str) -> DiscoveryOutcome {
    let discovered = discover_calendar_url(client, base_url).await;
    DiscoveryOutcome {
        success: discovered.is_some(),
        discovered_calendar_url: discovered,
    }
}

/// Outcome of a single provider's parse-and-persist pass.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub provider_id: i32,
    pub events_count: usize,
    pub success: bool,
    pub error: Option<String>,
}

/// Fetches, parses, and persists events for one provider/calendar_url
/// pair. On parse or network failure, the sync row is still updated with
/// the failure recorded and existing events are left untouched — only a
/// successful parse replaces the provider's event set.
pub async fn sync_provider(
    store: &Store,
    client: &Client,
    kind: ProviderKind,
    provider_id: i32,
    calendar_url: &str,
) -> CoreResult<SyncOutcome> {
    match parse_events_from_url(client, calendar_url).await {
        Ok(events) => {
            let count = events.len();
            store.replace_provider_events(kind, provider_id, events).await?;
            store
                .record_sync_result(kind, provider_id, calendar_url, true, None, count as i32)
                .await?;
            info!(provider_id, ?kind, count, "synced provider calendar");
            Ok(SyncOutcome {
                provider_id,
                events_count: count,
                success: true,
                error: None,
            })
        }
        Err(message) => {
            warn!(provider_id, ?kind, %message, "provider sync failed, existing events preserved");
            store
                .record_sync_result(kind, provider_id, calendar_url, false, Some(message.clone()), 0)
                .await?;
            Ok(SyncOutcome {
                provider_id,
                events_count: 0,
                success: false,
                error: Some(message),
            })
        }
    }
}

/// Manual entry point behind `POST /{providers-kind}/{id}/parse-events`:
/// upserts the sync row for `calendar_url` first (creating or re-enabling
/// it as needed), runs the parse-and-persist pass, and — only when the
/// sync row was newly created or re-enabled — retargets the owning
/// family's sync assignment pointer at it.
pub async fn parse_and_persist(
    store: &Store,
    client: &Client,
    kind: ProviderKind,
    provider_id: i32,
    calendar_url: &str,
) -> CoreResult<SyncOutcome> {
    let provider = store.get_provider(kind, provider_id).await?;
    let upserted = store
        .upsert_calendar_sync(kind, provider_id, calendar_url)
        .await?;

    let outcome = sync_provider(store, client, kind, provider_id, calendar_url).await?;

    if upserted.needs_assignment {
        assign_family_sync(store, provider.family_id, kind, upserted.sync_id).await?;
    }

    Ok(outcome)
}

/// Aggregate result of a batch sync pass across every enabled sync of one
/// provider kind.
#[derive(Debug, Clone, Default)]
pub struct BatchSyncResult {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub events_synced: usize,
}

/// Syncs every enabled `ProviderCalendarSync` of `kind`, sequentially, so
/// a burst of syncs never stampedes a shared set of remote origins.
/// Individual provider failures are recorded and do not abort the batch.
pub async fn batch_sync(store: &Store, client: &Client, kind: ProviderKind) -> CoreResult<BatchSyncResult> {
    let providers = store.get_providers_with_sync_enabled(kind).await?;
    let mut result = BatchSyncResult {
        total: providers.len(),
        ..Default::default()
    };

    for (provider, sync) in providers {
        match sync_provider(store, client, kind, provider.id, &sync.calendar_url).await {
            Ok(outcome) if outcome.success => {
                result.successful += 1;
                result.events_synced += outcome.events_count;
            }
            Ok(_) => result.failed += 1,
            Err(e) => {
                error!(provider_id = provider.id, ?kind, error = %e, "sync_provider returned an error, not just a recorded failure");
                result.failed += 1;
            }
        }
    }

    Ok(result)
}

/// Registers a family's sync assignment pointer to reference `sync_id` for
/// the given kind. Called the first time a provider's sync row is created
/// or re-enabled, per §4.6 step 4.
pub async fn assign_family_sync(
    store: &Store,
    family_id: Uuid,
    kind: ProviderKind,
    sync_id: i32,
) -> CoreResult<()> {
    match kind {
        ProviderKind::School => store.assign_school_sync(family_id, sync_id).await,
        ProviderKind::Daycare => store.assign_daycare_sync(family_id, sync_id).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_defaults_to_zero() {
        let result = BatchSyncResult::default();
        assert_eq!(result.total, 0);
        assert_eq!(result.successful, 0);
        assert_eq!(result.failed, 0);
    }
}
