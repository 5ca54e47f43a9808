use crate::storage::{BucketCountRow, BucketQuery, EventStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl EventStore for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id BIGSERIAL PRIMARY KEY,
                level TEXT NOT NULL,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_created_at ON events(created_at)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn count_by_bucket(&self, query: &BucketQuery) -> Result<Vec<BucketCountRow>> {
        let levels: Vec<&str> = query.level_names().collect();

        let rows = sqlx::query_as::<_, BucketCountRow>(
            r#"
            SELECT (created_at - $1) / $2 AS bucket_index,
                   level,
                   COUNT(*) AS count
            FROM events
            WHERE created_at >= $1
              AND created_at < $3
              AND level = ANY($4)
            GROUP BY bucket_index, level
            ORDER BY bucket_index, level
            "#,
        )
        .bind(query.start_ms)
        .bind(query.bucket_ms)
        .bind(query.end_ms)
        .bind(levels)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows)
    }
}
