/*!
 * Batch Sync Orchestration (C6, §4.6 "Batch sync orchestration")
 *
 * Runs the school and daycare sync passes on a cron schedule, each kind
 * sequentially per §5's "provider iteration is sequential per kind to
 * avoid stampeding remote origins".
 */

use std::sync::Arc;

use reqwest::Client;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{error, info};

use crate::db::Store;
use crate::model::ProviderKind;

use super::pipeline::{batch_sync, BatchSyncResult};

/// Runs a full batch pass across both provider kinds, sequentially, and
/// returns each kind's aggregate result. Individual provider failures
/// within a kind never abort the other kind's pass.
pub async fn run_batch_pass(store: &Store, client: &Client) -> (BatchSyncResult, BatchSyncResult) {
    let school_result = match batch_sync(store, client, ProviderKind::School).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "school batch sync failed outright");
            BatchSyncResult::default()
        }
    };
    info!(
        total = school_result.total,
        successful = school_result.successful,
        failed = school_result.failed,
        "school batch sync pass complete"
    );

    let daycare_result = match batch_sync(store, client, ProviderKind::Daycare).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "daycare batch sync failed outright");
            BatchSyncResult::default()
        }
    };
    info!(
        total = daycare_result.total,
        successful = daycare_result.successful,
        failed = daycare_result.failed,
        "daycare batch sync pass complete"
    );

    (school_result, daycare_result)
}

/// Registers `run_batch_pass` on `cron_schedule` inside `scheduler`. The
/// caller owns the `JobScheduler`'s lifecycle (start/shutdown); this only
/// adds the job.
pub async fn register_batch_sync_job(
    scheduler: &JobScheduler,
    cron_schedule: &str,
    store: Arc<Store>,
    client: Client,
) -> Result<uuid::Uuid, JobSchedulerError> {
    let job = Job::new_async(cron_schedule, move |_job_id, _scheduler| {
        let store = Arc::clone(&store);
        let client = client.clone();
        Box::pin(async move {
            info!("scheduled batch sync pass starting");
            run_batch_pass(&store, &client).await;
        })
    })?;

    scheduler.add(job).await
}
