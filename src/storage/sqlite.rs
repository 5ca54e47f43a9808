use crate::analytics::Level;
use crate::storage::{BucketCountRow, BucketQuery, EventStore};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Insert raw events as `(level, created_at_ms)` pairs.
    ///
    /// Used to seed fixtures and tests; production writes go through the
    /// ingestion service.
    pub async fn insert_events(&self, events: &[(Level, i64)]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut inserted = 0;
        for chunk in events.chunks(500) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("INSERT INTO events (level, created_at) ");
            builder.push_values(chunk, |mut b, (level, created_at)| {
                b.push_bind(level.as_str()).push_bind(*created_at);
            });
            inserted += builder
                .build()
                .execute(self.pool.as_ref())
                .await?
                .rows_affected();
        }

        Ok(inserted)
    }
}

#[async_trait]
impl EventStore for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                level TEXT NOT NULL,
                created_at INTEGER NOT NULL
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
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT (created_at - ");
        builder
            .push_bind(query.start_ms)
            .push(") / ")
            .push_bind(query.bucket_ms)
            .push(" AS bucket_index, level, COUNT(*) AS count FROM events WHERE created_at >= ")
            .push_bind(query.start_ms)
            .push(" AND created_at < ")
            .push_bind(query.end_ms)
            .push(" AND level IN (");

        let mut levels = builder.separated(", ");
        for level in query.level_names() {
            levels.push_bind(level);
        }
        levels.push_unseparated(")");

        builder.push(" GROUP BY bucket_index, level ORDER BY bucket_index, level");

        let rows = builder
            .build_query_as::<BucketCountRow>()
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(rows)
    }
}
