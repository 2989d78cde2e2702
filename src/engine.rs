/*!
 * Family Calendar Engine
 *
 * The facade composing the cache coordinator (C1), relational store
 * gateway (C2), custody engines (C3/C4/C5/C8), event aggregation (C7),
 * the sync pipeline (C6), and notification fan-out (C9) into the single
 * entry point an HTTP adapter layer calls into: one struct holding
 * `Arc`-shared sub-components, cheap to clone, with no business logic of
 * its own beyond wiring and cache invalidation bookkeeping.
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use uuid::Uuid;

use crate::cache::keys::{custody_month_key, family_custody_pattern, handoff_month_key};
use crate::cache::CacheCoordinator;
use crate::config::AppConfig;
use crate::custody::integrity::{self, IntegrityReport};
use crate::custody::mutation::{self, MutationOutcome};
use crate::custody::query;
use crate::db::template_repo::TemplateFields;
use crate::db::Store;
use crate::error::{CoreError, CoreResult};
use crate::events::aggregation;
use crate::model::{AggregatedEvent, CustodyRecord, ProviderKind, ScheduleTemplate};
use crate::notifications::{self, NoopPushTransport, PushTransport};
use crate::sync::pipeline::{self, BatchSyncResult, DiscoveryOutcome, SyncOutcome};

/// Result of applying a schedule template over a date range, the shape
/// the HTTP adapter's `/schedule-templates/apply` response maps from.
#[derive(Debug, Clone, Default)]
pub struct ApplyTemplateResult {
    pub days_applied: usize,
    pub conflicts_overwritten: usize,
}

#[derive(Clone)]
pub struct FamilyCalendarEngine {
    store: Store,
    cache: CacheCoordinator,
    cache_timeouts: crate::config::CacheTimeoutConfig,
    http_client: Client,
    push_transport: Arc<dyn PushTransport>,
}

impl FamilyCalendarEngine {
    pub async fn new(config: &AppConfig) -> CoreResult<Self> {
        let store = Store::new(
            &config.database_url,
            config.pool.min_connections,
            config.pool.max_connections,
            Duration::from_secs(config.pool.recycle_seconds),
        )
        .await?;
        let cache = CacheCoordinator::new(&config.cache_url, config.cache_timeouts.clone()).await;
        let http_client = Client::builder()
            .user_agent(config.sync.http_user_agent.clone())
            .timeout(Duration::from_secs(config.sync.provider_timeout_seconds))
            .build()
            .map_err(CoreError::from)?;

        Ok(Self {
            store,
            cache,
            cache_timeouts: config.cache_timeouts.clone(),
            http_client,
            push_transport: Arc::new(NoopPushTransport),
        })
    }

    /// Swaps in a real push transport (the default is a no-op, for
    /// environments with no push provider wired up yet).
    pub fn with_push_transport(mut self, transport: Arc<dyn PushTransport>) -> Self {
        self.push_transport = transport;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn cache(&self) -> &CacheCoordinator {
        &self.cache
    }

    // ---- C4: custody mutation ------------------------------------------------

    pub async fn create_custody(
        &self,
        family_id: Uuid,
        actor_id: Uuid,
        date: NaiveDate,
        custodian_id: Uuid,
        handoff_day: Option<bool>,
        handoff_time: Option<chrono::NaiveTime>,
        handoff_location: Option<String>,
    ) -> CoreResult<CustodyRecord> {
        let outcome = mutation::create(
            &self.store,
            family_id,
            actor_id,
            date,
            custodian_id,
            handoff_day,
            handoff_time,
            handoff_location,
        )
        .await?;
        let record = self.finish_mutation(family_id, outcome).await?;

        // §4.4 "Create single day" additionally requires clearing the whole
        // custody*:family:{F}:* pattern, not just the two affected month
        // keys — update/bulk-create are not specified to do this.
        self.cache.delete_pattern(&family_custody_pattern(family_id)).await;

        Ok(record)
    }

    pub async fn update_custody_by_date(
        &self,
        family_id: Uuid,
        actor_id: Uuid,
        date: NaiveDate,
        custodian_id: Uuid,
        handoff_day: Option<bool>,
        handoff_time: Option<chrono::NaiveTime>,
        handoff_location: Option<String>,
    ) -> CoreResult<CustodyRecord> {
        let outcome = mutation::update_by_date(
            &self.store,
            family_id,
            actor_id,
            date,
            custodian_id,
            handoff_day,
            handoff_time,
            handoff_location,
        )
        .await?;
        self.finish_mutation(family_id, outcome).await
    }

    pub async fn bulk_create_custody(
        &self,
        family_id: Uuid,
        actor_id: Uuid,
        inputs: Vec<(NaiveDate, Uuid, Option<bool>, Option<chrono::NaiveTime>, Option<String>)>,
    ) -> CoreResult<usize> {
        let outcome = mutation::bulk_create(&self.store, family_id, actor_id, inputs).await?;
        self.invalidate_months(family_id, &outcome.invalidate_months).await;
        Ok(outcome.records_written)
    }

    /// Shared tail of every single-day mutation: invalidate the affected
    /// months' caches and fan out a notification, then hand back the
    /// written record.
    async fn finish_mutation(&self, family_id: Uuid, outcome: MutationOutcome) -> CoreResult<CustodyRecord> {
        self.invalidate_months(family_id, &outcome.invalidate_months).await;

        if let (Some(actor_id), Some(custodian_id), Some(record)) =
            (outcome.notify_actor_id, outcome.notify_custodian_id, outcome.record.clone())
        {
            let _ = notifications::notify_custody_change(
                &self.store,
                self.push_transport.as_ref(),
                family_id,
                actor_id,
                custodian_id,
                record.date,
            )
            .await;
        }

        outcome
            .record
            .ok_or_else(|| CoreError::InternalError {
                message: "mutation produced no record".to_string(),
                operation: Some("finish_mutation".to_string()),
            })
    }

    async fn invalidate_months(&self, family_id: Uuid, months: &[(i32, u32)]) {
        for &(year, month) in months {
            self.cache.delete(&custody_month_key(family_id, year, month)).await;
            self.cache.delete(&handoff_month_key(family_id, year, month)).await;
        }
    }

    // ---- C5: monthly queries ---------------------------------------------------

    pub async fn get_month(&self, family_id: Uuid, year: i32, month: u32) -> CoreResult<Vec<CustodyRecord>> {
        query::get_month(&self.store, &self.cache, family_id, year, month).await
    }

    pub async fn get_month_handoffs(&self, family_id: Uuid, year: i32, month: u32) -> CoreResult<Vec<CustodyRecord>> {
        query::get_month_handoffs(&self.store, &self.cache, family_id, year, month).await
    }

    // ---- C3: schedule templates -------------------------------------------------

    pub async fn create_template(
        &self,
        family_id: Uuid,
        created_by_user_id: Uuid,
        fields: TemplateFields,
    ) -> CoreResult<ScheduleTemplate> {
        self.store.create_template(family_id, created_by_user_id, fields).await
    }

    pub async fn update_template(
        &self,
        template_id: i32,
        family_id: Uuid,
        fields: TemplateFields,
    ) -> CoreResult<ScheduleTemplate> {
        self.store.update_template(template_id, family_id, fields).await
    }

    /// Activates `template_id` (deactivating any other active template for
    /// the family per A1) and materializes custody records over
    /// `[start, end]`, invalidating every affected month's caches.
    pub async fn apply_template(
        &self,
        family_id: Uuid,
        actor_id: Uuid,
        template_id: i32,
        start: NaiveDate,
        end: NaiveDate,
        respect_existing: bool,
    ) -> CoreResult<ApplyTemplateResult> {
        let template = self.store.get_template(template_id).await?;
        if template.family_id != family_id {
            return Err(CoreError::not_found("schedule_template", template_id.to_string()));
        }

        self.store.apply_template(family_id, template_id).await?;

        let result = crate::custody::generator::generate_from_template(
            &self.store,
            &template,
            start,
            end,
            family_id,
            actor_id,
            respect_existing,
        )
        .await?;

        self.invalidate_months(family_id, &result.affected_months).await;

        Ok(ApplyTemplateResult {
            days_applied: result.created,
            conflicts_overwritten: 0,
        })
    }

    // ---- C7: event aggregation --------------------------------------------------

    pub async fn get_events(&self, family_id: Uuid, start: NaiveDate, end: NaiveDate) -> CoreResult<Vec<AggregatedEvent>> {
        aggregation::get_range(&self.store, &self.cache, &self.cache_timeouts, family_id, start, end).await
    }

    // ---- C8: integrity auditor ---------------------------------------------------

    pub async fn integrity_check(&self, family_id: Uuid) -> CoreResult<IntegrityReport> {
        integrity::check(&self.store, family_id).await
    }

    pub async fn fix_mismatches(&self, family_id: Uuid, dry_run: bool) -> CoreResult<IntegrityReport> {
        let report = integrity::check(&self.store, family_id).await?;
        if dry_run {
            return Ok(report);
        }
        integrity::apply_fixes(&self.store, &report).await?;
        self.cache.clear_family_cache(family_id).await;
        integrity::check(&self.store, family_id).await
    }

    // ---- C6: external calendar sync -----------------------------------------------

    pub async fn discover_calendar(&self, base_url: &str) -> DiscoveryOutcome {
        pipeline::discover_for_provider(&self.http_client, base_url).await
    }

    pub async fn parse_provider_events(
        &self,
        kind: ProviderKind,
        provider_id: i32,
        calendar_url: &str,
    ) -> CoreResult<SyncOutcome> {
        pipeline::parse_and_persist(&self.store, &self.http_client, kind, provider_id, calendar_url).await
    }

    pub async fn run_batch_sync(&self) -> (BatchSyncResult, BatchSyncResult) {
        crate::sync::scheduler::run_batch_pass(&self.store, &self.http_client).await
    }
}
