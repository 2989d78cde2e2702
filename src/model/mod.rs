/*!
 * Typed row models for the relational store.
 *
 * Field names and nullability follow the SQLAlchemy table definitions this
 * store is modeled on; complex template patterns are kept as JSON columns
 * and typed on the Rust side rather than normalized into extra tables.
 */

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Family {
    pub id: Uuid,
    pub name: String,
    pub daycare_sync_id: Option<i32>,
    pub school_sync_id: Option<i32>,
}

/// A user's membership state in a family, per §3's `status` vocabulary.
/// Only `Active` members count toward custody generation/integrity checks;
/// `Pending`/`Invited` users have not yet accepted into the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Invited,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub family_id: Option<Uuid>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Push notification device endpoint (C9 fan-out target); absent until
    /// the user's device registers.
    pub sns_endpoint_arn: Option<String>,
    pub status: Option<UserStatus>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_active(&self) -> bool {
        matches!(self.status, Some(UserStatus::Active) | None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum PatternType {
    Weekly,
    AlternatingWeeks,
    AlternatingDays,
    Custom,
}

/// A weekly pattern assigns each weekday to one of the family's two primary
/// custodians by logical slot, not by a concrete user id — `parent1`/
/// `parent2` resolve to the two earliest-created family members at
/// generation time (see `custody::generator`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParentSlot {
    Parent1,
    Parent2,
}

/// `weekly_pattern` JSON column: lowercase weekday name -> assignment.
/// A weekday absent from the map, or mapped to `null`, means no custody
/// record is generated for that day.
pub type WeeklyPattern = std::collections::HashMap<String, ParentSlot>;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ScheduleTemplate {
    pub id: i32,
    pub family_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub pattern_type: PatternType,
    pub weekly_pattern: Option<serde_json::Value>,
    pub alternating_weeks_pattern: Option<serde_json::Value>,
    pub is_active: bool,
    pub created_by_user_id: Uuid,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScheduleTemplate {
    pub fn weekly_pattern_typed(&self) -> Result<WeeklyPattern, serde_json::Error> {
        match &self.weekly_pattern {
            Some(v) => serde_json::from_value(v.clone()),
            None => Ok(WeeklyPattern::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CustodyRecord {
    pub id: i32,
    pub family_id: Uuid,
    pub date: NaiveDate,
    pub actor_id: Uuid,
    pub custodian_id: Uuid,
    pub handoff_day: Option<bool>,
    pub handoff_time: Option<NaiveTime>,
    pub handoff_location: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustodyRecord {
    pub family_id: Uuid,
    pub date: NaiveDate,
    pub actor_id: Uuid,
    pub custodian_id: Uuid,
    pub handoff_day: bool,
    pub handoff_time: Option<NaiveTime>,
    pub handoff_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FamilyEvent {
    pub id: i32,
    pub family_id: Uuid,
    pub date: NaiveDate,
    pub content: Option<String>,
    pub position: Option<i32>,
    pub event_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderKind {
    School,
    Daycare,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Provider {
    pub id: i32,
    pub family_id: Uuid,
    pub name: String,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderCalendarSync {
    pub id: i32,
    pub provider_id: i32,
    pub calendar_url: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_success: Option<bool>,
    pub last_sync_error: Option<String>,
    pub events_count: i32,
    pub sync_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProviderEvent {
    pub id: i32,
    pub provider_id: i32,
    pub provider_name: String,
    pub event_date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub all_day: bool,
}

/// A freshly parsed event awaiting persistence, not yet assigned a row id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedProviderEvent {
    pub event_date: NaiveDate,
    pub title: String,
    pub description: Option<String>,
    pub event_type: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub all_day: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct EnrollmentCode {
    pub id: Uuid,
    pub family_id: Uuid,
    pub code: String,
    pub consumed_at: Option<DateTime<Utc>>,
}

/// An aggregated event as returned by the event aggregation view (C7),
/// tagged with which pipeline produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Family,
    School,
    Daycare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedEvent {
    pub id: i32,
    pub family_id: Uuid,
    pub event_date: NaiveDate,
    pub content: String,
    pub source_type: EventSource,
    pub event_type: String,
    pub description: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub all_day: Option<bool>,
    pub provider_id: Option<i32>,
    pub provider_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_without_status_defaults_active() {
        let user = User {
            id: Uuid::new_v4(),
            family_id: None,
            first_name: "A".into(),
            last_name: "B".into(),
            email: "a@example.com".into(),
            sns_endpoint_arn: None,
            status: None,
            created_at: None,
        };
        assert!(user.is_active());
    }

    #[test]
    fn user_pending_status_is_not_active() {
        let user = User {
            status: Some(UserStatus::Pending),
            ..User {
                id: Uuid::new_v4(),
                family_id: None,
                first_name: "A".into(),
                last_name: "B".into(),
                email: "a@example.com".into(),
                sns_endpoint_arn: None,
                status: None,
                created_at: None,
            }
        };
        assert!(!user.is_active());
    }

    #[test]
    fn user_invited_status_is_not_active() {
        let user = User {
            status: Some(UserStatus::Invited),
            ..User {
                id: Uuid::new_v4(),
                family_id: None,
                first_name: "A".into(),
                last_name: "B".into(),
                email: "a@example.com".into(),
                sns_endpoint_arn: None,
                status: None,
                created_at: None,
            }
        };
        assert!(!user.is_active());
    }

    #[test]
    fn weekly_pattern_defaults_to_empty_map_when_absent() {
        let template = ScheduleTemplate {
            id: 1,
            family_id: Uuid::new_v4(),
            name: "t".into(),
            description: None,
            pattern_type: PatternType::Weekly,
            weekly_pattern: None,
            alternating_weeks_pattern: None,
            is_active: true,
            created_by_user_id: Uuid::new_v4(),
            created_at: None,
            updated_at: None,
        };
        assert!(template.weekly_pattern_typed().unwrap().is_empty());
    }
}
