use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{Family, User};

use super::Store;

impl Store {
    pub async fn get_family(&self, family_id: Uuid) -> CoreResult<Family> {
        sqlx::query_as::<_, Family>(
            "SELECT id, name, daycare_sync_id, school_sync_id FROM families WHERE id = $1",
        )
        .bind(family_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::not_found("family", family_id.to_string()))
    }

    /// All members of a family, ordered oldest-first. Used wherever "parent1"
    /// / "parent2" means the two earliest-created users (C3, C8).
    pub async fn get_family_members(&self, family_id: Uuid) -> CoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, User>(
            r#"SELECT id, family_id, first_name, last_name, email, sns_endpoint_arn, status, created_at
               FROM users WHERE family_id = $1 ORDER BY created_at ASC NULLS LAST"#,
        )
        .bind(family_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn get_active_family_members(&self, family_id: Uuid) -> CoreResult<Vec<User>> {
        Ok(self
            .get_family_members(family_id)
            .await?
            .into_iter()
            .filter(User::is_active)
            .collect())
    }

    pub async fn get_user(&self, user_id: Uuid) -> CoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"SELECT id, family_id, first_name, last_name, email, sns_endpoint_arn, status, created_at
               FROM users WHERE id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| CoreError::not_found("user", user_id.to_string()))
    }

    pub async fn assign_daycare_sync(&self, family_id: Uuid, sync_id: i32) -> CoreResult<()> {
        sqlx::query("UPDATE families SET daycare_sync_id = $2 WHERE id = $1")
            .bind(family_id)
            .bind(sync_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn assign_school_sync(&self, family_id: Uuid, sync_id: i32) -> CoreResult<()> {
        sqlx::query("UPDATE families SET school_sync_id = $2 WHERE id = $1")
            .bind(family_id)
            .bind(sync_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}
