/*!
 * Event Aggregation View (C7)
 *
 * Merges three sources into one family calendar view: family-authored
 * events, school closure events, and daycare events (all event types).
 * The school/daycare asymmetry is deliberate — a family only cares about
 * closures on the school calendar, but wants every daycare event.
 */

use std::time::Duration;

use chrono::NaiveDate;
use tracing::debug;
use uuid::Uuid;

use crate::cache::keys::events_range_key;
use crate::cache::CacheCoordinator;
use crate::config::CacheTimeoutConfig;
use crate::db::Store;
use crate::error::CoreResult;
use crate::model::{AggregatedEvent, EventSource};

/// Returns the union of family, school-closure, and daycare events for
/// `start..=end`, sorted by date then start time, cached as one unit under
/// a single range key.
pub async fn get_range(
    store: &Store,
    cache: &CacheCoordinator,
    timeouts: &CacheTimeoutConfig,
    family_id: Uuid,
    start: NaiveDate,
    end: NaiveDate,
) -> CoreResult<Vec<AggregatedEvent>> {
    let key = events_range_key(family_id, start, end);
    if let Some(cached) = cache.get::<Vec<AggregatedEvent>>(&key).await {
        debug!(%family_id, %start, %end, "aggregated events cache hit");
        return Ok(cached);
    }

    let family_events = store.get_family_events(family_id, start, end).await?;
    let school_events = store
        .get_family_school_closure_events(family_id, start, end)
        .await?;
    let daycare_events = store
        .get_family_daycare_events(family_id, start, end)
        .await?;

    let mut aggregated: Vec<AggregatedEvent> = Vec::with_capacity(
        family_events.len() + school_events.len() + daycare_events.len(),
    );

    aggregated.extend(family_events.into_iter().map(|e| AggregatedEvent {
        id: e.id,
        family_id: e.family_id,
        source_type: EventSource::Family,
        event_date: e.date,
        start_time: None,
        end_time: None,
        all_day: None,
        content: e.content.unwrap_or_default(),
        description: None,
        event_type: e.event_type,
        provider_id: None,
        provider_name: None,
    }));

    aggregated.extend(school_events.into_iter().map(|e| AggregatedEvent {
        id: e.id,
        family_id,
        source_type: EventSource::School,
        event_date: e.event_date,
        start_time: e.start_time,
        end_time: e.end_time,
        all_day: Some(e.all_day),
        content: e.title,
        description: e.description,
        event_type: e.event_type.unwrap_or_else(|| "school".to_string()),
        provider_id: Some(e.provider_id),
        provider_name: Some(e.provider_name),
    }));

    aggregated.extend(daycare_events.into_iter().map(|e| AggregatedEvent {
        id: e.id,
        family_id,
        source_type: EventSource::Daycare,
        event_date: e.event_date,
        start_time: e.start_time,
        end_time: e.end_time,
        all_day: Some(e.all_day),
        content: e.title,
        description: e.description,
        event_type: e.event_type.unwrap_or_else(|| "daycare".to_string()),
        provider_id: Some(e.provider_id),
        provider_name: Some(e.provider_name),
    }));

    aggregated.sort_by(|a, b| (a.event_date, a.start_time).cmp(&(b.event_date, b.start_time)));

    cache
        .set(
            &key,
            &aggregated,
            Some(Duration::from_secs(timeouts.events_ttl_seconds)),
        )
        .await;

    Ok(aggregated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregated_events_sort_by_date_then_start_time() {
        let family_id = Uuid::new_v4();
        let early = AggregatedEvent {
            id: 1,
            family_id,
            source_type: EventSource::Family,
            event_date: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
            start_time: None,
            end_time: None,
            all_day: None,
            content: "a".into(),
            description: None,
            event_type: "regular".into(),
            provider_id: None,
            provider_name: None,
        };
        let late = AggregatedEvent {
            id: 2,
            family_id,
            source_type: EventSource::School,
            event_date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
            start_time: None,
            end_time: None,
            all_day: None,
            content: "b".into(),
            description: None,
            event_type: "closure".into(),
            provider_id: None,
            provider_name: None,
        };
        let mut events = vec![late.clone(), early.clone()];
        events.sort_by(|a, b| (a.event_date, a.start_time).cmp(&(b.event_date, b.start_time)));
        assert_eq!(events[0].content, early.content);
        assert_eq!(events[1].content, late.content);
    }
}
