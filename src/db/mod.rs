/*!
 * Relational Store Gateway (C2)
 *
 * Owns the Postgres connection pool and the transactional schema, and
 * exposes typed, per-entity query methods. Bulk writes are wrapped in a
 * single transaction so partial failures never leave the store half
 * updated.
 */

mod custody_repo;
mod event_repo;
mod family_repo;
mod provider_repo;
mod template_repo;

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::error::CoreResult;

/// Pool-backed handle to the relational store. Cheap to clone: the pool
/// itself is reference counted.
#[derive(Clone)]
pub struct Store {
    pool: Arc<PgPool>,
}

impl Store {
    pub async fn new(
        database_url: &str,
        min_connections: u32,
        max_connections: u32,
        recycle: Duration,
    ) -> CoreResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .max_lifetime(recycle)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("SET statement_timeout = 10000").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> CoreResult<()> {
        info!("initializing relational store schema");
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS families (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                name TEXT NOT NULL,
                daycare_sync_id INTEGER,
                school_sync_id INTEGER
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                family_id UUID REFERENCES families (id),
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                sns_endpoint_arn TEXT,
                status TEXT DEFAULT 'active',
                created_at TIMESTAMPTZ DEFAULT now()
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schedule_templates (
                id SERIAL PRIMARY KEY,
                family_id UUID NOT NULL REFERENCES families (id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                description TEXT,
                pattern_type TEXT NOT NULL CHECK (pattern_type IN ('weekly', 'alternating_weeks', 'alternating_days', 'custom')),
                weekly_pattern JSONB,
                alternating_weeks_pattern JSONB,
                is_active BOOLEAN NOT NULL DEFAULT true,
                created_by_user_id UUID NOT NULL REFERENCES users (id),
                created_at TIMESTAMPTZ DEFAULT now(),
                updated_at TIMESTAMPTZ DEFAULT now()
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS custody (
                id SERIAL PRIMARY KEY,
                family_id UUID NOT NULL REFERENCES families (id),
                date DATE NOT NULL,
                actor_id UUID NOT NULL REFERENCES users (id),
                custodian_id UUID NOT NULL REFERENCES users (id),
                handoff_day BOOLEAN DEFAULT false,
                handoff_time TIME,
                handoff_location TEXT,
                created_at TIMESTAMPTZ DEFAULT now(),
                UNIQUE (family_id, date)
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id SERIAL PRIMARY KEY,
                family_id UUID NOT NULL REFERENCES families (id),
                date DATE NOT NULL,
                content TEXT,
                position INTEGER,
                event_type TEXT NOT NULL DEFAULT 'regular'
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        for kind in ["school", "daycare"] {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {kind}_providers (
                    id SERIAL PRIMARY KEY,
                    family_id UUID NOT NULL REFERENCES families (id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    website TEXT,
                    created_by_user_id UUID NOT NULL REFERENCES users (id),
                    created_at TIMESTAMPTZ DEFAULT now()
                )
                "#
            ))
            .execute(&mut *tx)
            .await?;

            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {kind}_calendar_syncs (
                    id SERIAL PRIMARY KEY,
                    {kind}_provider_id INTEGER NOT NULL REFERENCES {kind}_providers (id) ON DELETE CASCADE,
                    calendar_url TEXT NOT NULL,
                    last_sync_at TIMESTAMPTZ,
                    last_sync_success BOOLEAN,
                    last_sync_error TEXT,
                    events_count INTEGER DEFAULT 0,
                    sync_enabled BOOLEAN DEFAULT true,
                    created_at TIMESTAMPTZ DEFAULT now(),
                    updated_at TIMESTAMPTZ DEFAULT now()
                )
                "#
            ))
            .execute(&mut *tx)
            .await?;

            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {kind}_events (
                    id SERIAL PRIMARY KEY,
                    {kind}_provider_id INTEGER NOT NULL REFERENCES {kind}_providers (id) ON DELETE CASCADE,
                    event_date DATE NOT NULL,
                    title TEXT NOT NULL,
                    description TEXT,
                    event_type TEXT,
                    start_time TIME,
                    end_time TIME,
                    all_day BOOLEAN NOT NULL DEFAULT false,
                    created_at TIMESTAMPTZ DEFAULT now(),
                    updated_at TIMESTAMPTZ DEFAULT now(),
                    UNIQUE ({kind}_provider_id, event_date, title)
                )
                "#
            ))
            .execute(&mut *tx)
            .await?;
        }

        // families.daycare_sync_id/school_sync_id reference rows created after
        // families itself, so the FK is enforced at the application layer
        // (family_repo::assign_daycare_sync/assign_school_sync) rather than a
        // table constraint, avoiding a circular creation order.

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS enrollment_codes (
                id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
                family_id UUID NOT NULL REFERENCES families (id) ON DELETE CASCADE,
                code TEXT UNIQUE NOT NULL,
                consumed_at TIMESTAMPTZ
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_users_family_id ON users (family_id)",
            "CREATE INDEX IF NOT EXISTS idx_custody_family_date ON custody (family_id, date)",
            "CREATE INDEX IF NOT EXISTS idx_custody_family_custodian ON custody (family_id, custodian_id)",
            "CREATE INDEX IF NOT EXISTS idx_custody_family_date_handoff ON custody (family_id, date, handoff_day)",
            "CREATE INDEX IF NOT EXISTS idx_events_family_date ON events (family_id, date)",
            "CREATE INDEX IF NOT EXISTS idx_school_events_provider_date ON school_events (school_provider_id, event_date)",
            "CREATE INDEX IF NOT EXISTS idx_daycare_events_provider_date ON daycare_events (daycare_provider_id, event_date)",
            "CREATE INDEX IF NOT EXISTS idx_schedule_templates_family_active ON schedule_templates (family_id, is_active)",
        ];
        for stmt in indexes {
            sqlx::query(stmt).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        info!("relational store schema ready");
        Ok(())
    }
}
