/*!
 * Notification Fan-out (C9)
 *
 * On a successful custody create/update, notifies the other family
 * member — whoever isn't the actor — via their registered push device
 * endpoint. Transport failures are logged and never affect the
 * mutation's own success: notification delivery recovers locally and
 * is never allowed to fail the request that triggered it.
 */

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::db::Store;
use crate::error::CoreResult;

/// Structured payload handed to the push transport, per §4.9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyChangeNotification {
    pub title: String,
    pub subtitle: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: NaiveDate,
    pub custodian: Uuid,
    pub sender: Uuid,
    pub deep_link: String,
}

impl CustodyChangeNotification {
    pub fn new(actor_first_name: &str, custodian_first_name: &str, actor_id: Uuid, custodian_id: Uuid, date: NaiveDate) -> Self {
        Self {
            title: "Schedule Updated".to_string(),
            subtitle: format!("{custodian_first_name} now has custody"),
            body: format!("{actor_first_name} changed the schedule for {date}."),
            kind: "custody_change".to_string(),
            date,
            custodian: custodian_id,
            sender: actor_id,
            deep_link: format!("calndr://custody/{date}"),
        }
    }
}

/// The out-of-scope push delivery collaborator (§6 "Push transport").
/// Implementations deliver a payload to a specific device endpoint and
/// report success/failure; failures here are logged only, never
/// propagated to the caller of the fan-out.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, target_device_arn: &str, payload: &CustodyChangeNotification) -> Result<(), String>;
}

/// A transport that does nothing, for environments with no push provider
/// configured (tests, local development).
pub struct NoopPushTransport;

#[async_trait]
impl PushTransport for NoopPushTransport {
    async fn send(&self, _target_device_arn: &str, _payload: &CustodyChangeNotification) -> Result<(), String> {
        Ok(())
    }
}

/// Locates the single family member other than `actor_id` with a
/// registered device endpoint, builds the notification payload, and
/// enqueues it. No-ops quietly if there is no such member or no endpoint
/// registered — this is an expected state, not a failure.
pub async fn notify_custody_change(
    store: &Store,
    transport: &dyn PushTransport,
    family_id: Uuid,
    actor_id: Uuid,
    custodian_id: Uuid,
    date: NaiveDate,
) -> CoreResult<()> {
    let members = store.get_family_members(family_id).await?;

    let Some(recipient) = members
        .iter()
        .find(|u| u.id != actor_id && u.sns_endpoint_arn.is_some())
    else {
        return Ok(());
    };

    let actor = members.iter().find(|u| u.id == actor_id);
    let custodian = members.iter().find(|u| u.id == custodian_id);

    let actor_first_name = actor.map(|u| u.first_name.as_str()).unwrap_or("Someone");
    let custodian_first_name = custodian.map(|u| u.first_name.as_str()).unwrap_or("Your co-parent");

    let payload = CustodyChangeNotification::new(actor_first_name, custodian_first_name, actor_id, custodian_id, date);

    // sns_endpoint_arn checked non-None by the `find` above.
    let endpoint = recipient.sns_endpoint_arn.as_deref().unwrap_or_default();
    if let Err(e) = transport.send(endpoint, &payload).await {
        warn!(%family_id, %actor_id, %custodian_id, error = %e, "push transport failed, notification dropped");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_renders_expected_title_and_body() {
        let actor_id = Uuid::new_v4();
        let custodian_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        let payload = CustodyChangeNotification::new("Alex", "Jamie", actor_id, custodian_id, date);

        assert_eq!(payload.title, "Schedule Updated");
        assert_eq!(payload.subtitle, "Jamie now has custody");
        assert_eq!(payload.body, "Alex changed the schedule for 2026-07-27.");
        assert_eq!(payload.kind, "custody_change");
    }

    #[tokio::test]
    async fn noop_transport_always_succeeds() {
        let payload = CustodyChangeNotification::new(
            "A",
            "B",
            Uuid::new_v4(),
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        );
        assert!(NoopPushTransport.send("arn:example", &payload).await.is_ok());
    }
}
