use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::model::FamilyEvent;

use super::Store;

impl Store {
    /// Family-authored events in a date range, excluding the synthetic
    /// `custody` event type (custody itself is rendered from the custody
    /// table, not the events table).
    pub async fn get_family_events(
        &self,
        family_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<FamilyEvent>> {
        let rows = sqlx::query_as::<_, FamilyEvent>(
            r#"SELECT id, family_id, date, content, position, event_type
               FROM events
               WHERE family_id = $1 AND date >= $2 AND date <= $3 AND event_type <> 'custody'
               ORDER BY date ASC"#,
        )
        .bind(family_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
