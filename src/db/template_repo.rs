use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{PatternType, ScheduleTemplate};

use super::Store;

/// Fields accepted when creating or replacing a schedule template's
/// content (name, pattern). Does not include `is_active` — activation
/// goes through `apply_template` so invariant A1 is enforced in one
/// place.
pub struct TemplateFields {
    pub name: String,
    pub description: Option<String>,
    pub pattern_type: PatternType,
    pub weekly_pattern: Option<serde_json::Value>,
    pub alternating_weeks_pattern: Option<serde_json::Value>,
}

impl Store {
    pub async fn create_template(
        &self,
        family_id: Uuid,
        created_by_user_id: Uuid,
        fields: TemplateFields,
    ) -> CoreResult<ScheduleTemplate> {
        let row = sqlx::query_as::<_, ScheduleTemplate>(
            r#"INSERT INTO schedule_templates
                   (family_id, name, description, pattern_type, weekly_pattern, alternating_weeks_pattern, is_active, created_by_user_id)
               VALUES ($1, $2, $3, $4, $5, $6, false, $7)
               RETURNING id, family_id, name, description, pattern_type, weekly_pattern,
                         alternating_weeks_pattern, is_active, created_by_user_id, created_at, updated_at"#,
        )
        .bind(family_id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.pattern_type)
        .bind(fields.weekly_pattern)
        .bind(fields.alternating_weeks_pattern)
        .bind(created_by_user_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }

    /// Replaces a template's content in place, preserving its current
    /// `is_active` value (activation is a separate operation).
    pub async fn update_template(
        &self,
        template_id: i32,
        family_id: Uuid,
        fields: TemplateFields,
    ) -> CoreResult<ScheduleTemplate> {
        let row = sqlx::query_as::<_, ScheduleTemplate>(
            r#"UPDATE schedule_templates SET
                   name = $3, description = $4, pattern_type = $5,
                   weekly_pattern = $6, alternating_weeks_pattern = $7, updated_at = now()
               WHERE id = $1 AND family_id = $2
               RETURNING id, family_id, name, description, pattern_type, weekly_pattern,
                         alternating_weeks_pattern, is_active, created_by_user_id, created_at, updated_at"#,
        )
        .bind(template_id)
        .bind(family_id)
        .bind(fields.name)
        .bind(fields.description)
        .bind(fields.pattern_type)
        .bind(fields.weekly_pattern)
        .bind(fields.alternating_weeks_pattern)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::not_found("schedule_template", template_id.to_string()))?;
        Ok(row)
    }

    /// The single template a family can have active at once (invariant A1).
    pub async fn get_active_template(&self, family_id: Uuid) -> CoreResult<Option<ScheduleTemplate>> {
        let row = sqlx::query_as::<_, ScheduleTemplate>(
            r#"SELECT id, family_id, name, description, pattern_type, weekly_pattern,
                      alternating_weeks_pattern, is_active, created_by_user_id, created_at, updated_at
               FROM schedule_templates WHERE family_id = $1 AND is_active = true"#,
        )
        .bind(family_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_template(&self, template_id: i32) -> CoreResult<ScheduleTemplate> {
        sqlx::query_as::<_, ScheduleTemplate>(
            r#"SELECT id, family_id, name, description, pattern_type, weekly_pattern,
                      alternating_weeks_pattern, is_active, created_by_user_id, created_at, updated_at
               FROM schedule_templates WHERE id = $1"#,
        )
        .bind(template_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::not_found("schedule_template", template_id.to_string()))
    }

    /// Deactivates every template for the family, then activates `template_id`,
    /// inside one transaction so invariant A1 (at most one active template
    /// per family) never observes two active rows.
    pub async fn apply_template(&self, family_id: Uuid, template_id: i32) -> CoreResult<()> {
        let mut tx = self.pool().begin().await?;
        sqlx::query("UPDATE schedule_templates SET is_active = false WHERE family_id = $1")
            .bind(family_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE schedule_templates SET is_active = true WHERE id = $1 AND family_id = $2")
            .bind(template_id)
            .bind(family_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
