use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::model::{CustodyRecord, NewCustodyRecord};

use super::Store;

impl Store {
    pub async fn get_custody_for_date(
        &self,
        family_id: Uuid,
        date: NaiveDate,
    ) -> CoreResult<Option<CustodyRecord>> {
        let row = sqlx::query_as::<_, CustodyRecord>(
            r#"SELECT id, family_id, date, actor_id, custodian_id, handoff_day,
                      handoff_time, handoff_location, created_at
               FROM custody WHERE family_id = $1 AND date = $2"#,
        )
        .bind(family_id)
        .bind(date)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    pub async fn get_custody_for_range(
        &self,
        family_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CoreResult<Vec<CustodyRecord>> {
        let rows = sqlx::query_as::<_, CustodyRecord>(
            r#"SELECT id, family_id, date, actor_id, custodian_id, handoff_day,
                      handoff_time, handoff_location, created_at
               FROM custody
               WHERE family_id = $1 AND date >= $2 AND date <= $3
               ORDER BY date ASC"#,
        )
        .bind(family_id)
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// The most recent custody record strictly before `before_date`, used
    /// to seed the "previous custodian" carry for handoff inference.
    pub async fn get_custody_before(
        &self,
        family_id: Uuid,
        before_date: NaiveDate,
    ) -> CoreResult<Option<CustodyRecord>> {
        let row = sqlx::query_as::<_, CustodyRecord>(
            r#"SELECT id, family_id, date, actor_id, custodian_id, handoff_day,
                      handoff_time, handoff_location, created_at
               FROM custody WHERE family_id = $1 AND date < $2
               ORDER BY date DESC LIMIT 1"#,
        )
        .bind(family_id)
        .bind(before_date)
        .fetch_optional(self.pool())
        .await?;
        Ok(row)
    }

    /// Every custody record for a family, oldest first. Used by the
    /// integrity auditor, which scans the whole history rather than a
    /// single month.
    pub async fn get_all_custody_for_family(&self, family_id: Uuid) -> CoreResult<Vec<CustodyRecord>> {
        let rows = sqlx::query_as::<_, CustodyRecord>(
            r#"SELECT id, family_id, date, actor_id, custodian_id, handoff_day,
                      handoff_time, handoff_location, created_at
               FROM custody WHERE family_id = $1 ORDER BY date ASC"#,
        )
        .bind(family_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Applies every `(custody_id, new_custodian_id)` fix inside a single
    /// transaction, per §4.8's "update the custodian_id in a single
    /// transaction" requirement.
    pub async fn apply_custodian_fixes(&self, fixes: &[(i32, Uuid)]) -> CoreResult<usize> {
        if fixes.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool().begin().await?;
        for &(custody_id, custodian_id) in fixes {
            sqlx::query("UPDATE custody SET custodian_id = $2 WHERE id = $1")
                .bind(custody_id)
                .bind(custodian_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(fixes.len())
    }

    pub async fn get_custody_for_month(
        &self,
        family_id: Uuid,
        year: i32,
        month: u32,
    ) -> CoreResult<Vec<CustodyRecord>> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CoreError::ValidationError {
                field: "month".to_string(),
                message: format!("invalid year/month {year}/{month}"),
            })?;
        let end = month_end(start);
        self.get_custody_for_range(family_id, start, end).await
    }

    /// Inserts a single custody record. Returns `CustodyConflict` if one
    /// already exists for this family/date (invariant A2).
    pub async fn insert_custody(&self, record: NewCustodyRecord) -> CoreResult<CustodyRecord> {
        let existing = self
            .get_custody_for_date(record.family_id, record.date)
            .await?;
        if let Some(existing) = existing {
            return Err(CoreError::CustodyConflict {
                family_id: record.family_id,
                date: record.date,
                existing_custodian_id: existing.custodian_id,
            });
        }

        let row = sqlx::query_as::<_, CustodyRecord>(
            r#"INSERT INTO custody (family_id, date, actor_id, custodian_id, handoff_day, handoff_time, handoff_location)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, family_id, date, actor_id, custodian_id, handoff_day, handoff_time, handoff_location, created_at"#,
        )
        .bind(record.family_id)
        .bind(record.date)
        .bind(record.actor_id)
        .bind(record.custodian_id)
        .bind(record.handoff_day)
        .bind(record.handoff_time)
        .bind(record.handoff_location)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                CoreError::CustodyConflict {
                    family_id: record.family_id,
                    date: record.date,
                    existing_custodian_id: record.custodian_id,
                }
            }
            other => other.into(),
        })?;
        Ok(row)
    }

    /// Inserts many generated custody records inside one transaction. Skips
    /// dates that already have a record when `respect_existing` is set,
    /// overwrites them otherwise.
    pub async fn bulk_upsert_custody(
        &self,
        records: Vec<NewCustodyRecord>,
        respect_existing: bool,
    ) -> CoreResult<usize> {
        let mut tx = self.pool().begin().await?;
        let mut written = 0usize;
        for record in records {
            let query = if respect_existing {
                r#"INSERT INTO custody (family_id, date, actor_id, custodian_id, handoff_day, handoff_time, handoff_location)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (family_id, date) DO NOTHING"#
            } else {
                r#"INSERT INTO custody (family_id, date, actor_id, custodian_id, handoff_day, handoff_time, handoff_location)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (family_id, date) DO UPDATE SET
                       actor_id = EXCLUDED.actor_id,
                       custodian_id = EXCLUDED.custodian_id,
                       handoff_day = EXCLUDED.handoff_day,
                       handoff_time = EXCLUDED.handoff_time,
                       handoff_location = EXCLUDED.handoff_location"#
            };
            let result = sqlx::query(query)
                .bind(record.family_id)
                .bind(record.date)
                .bind(record.actor_id)
                .bind(record.custodian_id)
                .bind(record.handoff_day)
                .bind(record.handoff_time)
                .bind(record.handoff_location)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() > 0 {
                written += 1;
            }
        }
        tx.commit().await?;
        Ok(written)
    }

    /// Updates the custody row for `date` and repairs adjacency (invariant
    /// A4) for the day before and the day after, all inside one
    /// transaction: the spec requires the write and its repair to commit
    /// together. `default_handoff` supplies the weekend/weekday defaults
    /// (passed in rather than imported, to keep this module free of a
    /// dependency on `custody::types`).
    ///
    /// Returns `NotFound` if no row exists for `date` (the edit path
    /// requires a prior record, unlike create).
    #[allow(clippy::too_many_arguments)]
    pub async fn update_custody_with_adjacency_repair(
        &self,
        family_id: Uuid,
        date: NaiveDate,
        custodian_id: Uuid,
        actor_id: Uuid,
        handoff_day_explicit: Option<bool>,
        handoff_time: Option<chrono::NaiveTime>,
        handoff_location: Option<String>,
        default_handoff: fn(NaiveDate) -> (chrono::NaiveTime, &'static str),
    ) -> CoreResult<(CustodyRecord, Vec<(i32, u32)>)> {
        let mut tx = self.pool().begin().await?;

        let existing = sqlx::query_as::<_, CustodyRecord>(
            "SELECT id, family_id, date, actor_id, custodian_id, handoff_day, \
             handoff_time, handoff_location, created_at FROM custody \
             WHERE family_id = $1 AND date = $2",
        )
        .bind(family_id)
        .bind(date)
        .fetch_optional(&mut *tx)
        .await?;
        if existing.is_none() {
            return Err(CoreError::not_found("custody", date.to_string()));
        }

        let handoff_day_value = match handoff_day_explicit {
            Some(v) => v,
            None if handoff_time.is_some() => true,
            None => false,
        };

        sqlx::query(
            r#"UPDATE custody SET
                   custodian_id = $3, actor_id = $4, handoff_day = $5,
                   handoff_time = $6, handoff_location = $7
               WHERE family_id = $1 AND date = $2"#,
        )
        .bind(family_id)
        .bind(date)
        .bind(custodian_id)
        .bind(actor_id)
        .bind(handoff_day_value)
        .bind(handoff_time)
        .bind(handoff_location)
        .execute(&mut *tx)
        .await?;

        let mut invalidate_months = vec![month_of(date)];

        // Step 1: recompute today's handoff from yesterday, only when the
        // caller left handoff_day unset.
        if handoff_day_explicit.is_none() {
            let previous_date = date.pred_opt().expect("date has a predecessor");
            let previous = sqlx::query_as::<_, CustodyRecord>(
                "SELECT id, family_id, date, actor_id, custodian_id, handoff_day, \
                 handoff_time, handoff_location, created_at FROM custody \
                 WHERE family_id = $1 AND date = $2",
            )
            .bind(family_id)
            .bind(previous_date)
            .fetch_optional(&mut *tx)
            .await?;
            let derived = previous.map(|r| r.custodian_id != custodian_id).unwrap_or(false);

            if derived != handoff_day_value {
                let (time, location) = if derived {
                    let (t, l) = default_handoff(date);
                    (Some(t), Some(l.to_string()))
                } else {
                    (None, None)
                };
                sqlx::query(
                    "UPDATE custody SET handoff_day = $3, handoff_time = $4, handoff_location = $5 \
                     WHERE family_id = $1 AND date = $2",
                )
                .bind(family_id)
                .bind(date)
                .bind(derived)
                .bind(time)
                .bind(location)
                .execute(&mut *tx)
                .await?;
            }
        }

        let record = sqlx::query_as::<_, CustodyRecord>(
            "SELECT id, family_id, date, actor_id, custodian_id, handoff_day, \
             handoff_time, handoff_location, created_at FROM custody \
             WHERE family_id = $1 AND date = $2",
        )
        .bind(family_id)
        .bind(date)
        .fetch_one(&mut *tx)
        .await?;

        // Step 2: recompute tomorrow's handoff from today's new custodian,
        // unconditionally.
        let next_date = date.succ_opt().expect("date has a successor");
        let next = sqlx::query_as::<_, CustodyRecord>(
            "SELECT id, family_id, date, actor_id, custodian_id, handoff_day, \
             handoff_time, handoff_location, created_at FROM custody \
             WHERE family_id = $1 AND date = $2",
        )
        .bind(family_id)
        .bind(next_date)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(next) = next {
            let should_be_handoff = next.custodian_id != custodian_id;
            if should_be_handoff {
                if !next.handoff_day.unwrap_or(false) {
                    let (time, location) = if next.handoff_time.is_some() {
                        (next.handoff_time, next.handoff_location.clone())
                    } else {
                        let (t, l) = default_handoff(next_date);
                        (Some(t), Some(l.to_string()))
                    };
                    sqlx::query(
                        "UPDATE custody SET handoff_day = true, handoff_time = $3, handoff_location = $4 \
                         WHERE family_id = $1 AND date = $2",
                    )
                    .bind(family_id)
                    .bind(next_date)
                    .bind(time)
                    .bind(location)
                    .execute(&mut *tx)
                    .await?;
                }
            } else if next.handoff_day.unwrap_or(false) || next.handoff_time.is_some() || next.handoff_location.is_some()
            {
                sqlx::query(
                    "UPDATE custody SET handoff_day = false, handoff_time = NULL, handoff_location = NULL \
                     WHERE family_id = $1 AND date = $2",
                )
                .bind(family_id)
                .bind(next_date)
                .execute(&mut *tx)
                .await?;
            }

            if month_of(next_date) != month_of(date) {
                invalidate_months.push(month_of(next_date));
            }
        }

        tx.commit().await?;
        Ok((record, invalidate_months))
    }
}

fn month_of(date: NaiveDate) -> (i32, u32) {
    (date.year(), date.month())
}

fn month_end(first_of_month: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if first_of_month.month() == 12 {
        (first_of_month.year() + 1, 1)
    } else {
        (first_of_month.year(), first_of_month.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .expect("valid next month")
        .pred_opt()
        .expect("month has at least one day")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_end_handles_december_rollover() {
        let dec1 = NaiveDate::from_ymd_opt(2026, 12, 1).unwrap();
        assert_eq!(month_end(dec1), NaiveDate::from_ymd_opt(2026, 12, 31).unwrap());
    }

    #[test]
    fn month_end_handles_february_leap_year() {
        let feb1 = NaiveDate::from_ymd_opt(2028, 2, 1).unwrap();
        assert_eq!(month_end(feb1), NaiveDate::from_ymd_opt(2028, 2, 29).unwrap());
    }
}
