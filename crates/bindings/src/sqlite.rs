use {anyhow::Result, async_trait::async_trait, sqlx::SqlitePool};

use crate::{binding::Binding, records::BindingRecords};

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct BindingRow {
    chat_id: String,
    room_id: String,
    is_active: bool,
    is_valid: bool,
    message_count: i64,
    last_used_at: i64,
    last_validated_at: Option<i64>,
    created_at: i64,
}

impl From<BindingRow> for Binding {
    fn from(r: BindingRow) -> Self {
        Self {
            chat_id: r.chat_id,
            room_id: r.room_id,
            is_active: r.is_active,
            is_valid: r.is_valid,
            message_count: r.message_count,
            last_used_at: r.last_used_at,
            last_validated_at: r.last_validated_at,
            created_at: r.created_at,
        }
    }
}

/// SQLite-backed binding records.
pub struct SqliteBindingRecords {
    pool: SqlitePool,
}

impl SqliteBindingRecords {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the bindings table schema.
    pub async fn init(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS bindings (
                chat_id           TEXT    PRIMARY KEY,
                room_id           TEXT    NOT NULL,
                is_active         INTEGER NOT NULL DEFAULT 1,
                is_valid          INTEGER NOT NULL DEFAULT 1,
                message_count     INTEGER NOT NULL DEFAULT 0,
                last_used_at      INTEGER NOT NULL,
                last_validated_at INTEGER,
                created_at        INTEGER NOT NULL
            )"#,
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bindings_room ON bindings (room_id) WHERE is_active = 1",
        )
        .execute(pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BindingRecords for SqliteBindingRecords {
    async fn find_active_by_chat(&self, chat_id: &str) -> Result<Option<Binding>> {
        let row = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM bindings WHERE chat_id = ? AND is_active = 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_active_by_room(&self, room_id: &str) -> Result<Option<Binding>> {
        let row = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM bindings WHERE room_id = ? AND is_active = 1",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get(&self, chat_id: &str) -> Result<Option<Binding>> {
        let row = sqlx::query_as::<_, BindingRow>("SELECT * FROM bindings WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn upsert_active(&self, binding: &Binding) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO bindings
                 (chat_id, room_id, is_active, is_valid, message_count,
                  last_used_at, last_validated_at, created_at)
               VALUES (?, ?, 1, ?, ?, ?, ?, ?)
               ON CONFLICT(chat_id) DO UPDATE SET
                 room_id = excluded.room_id,
                 is_active = 1,
                 is_valid = excluded.is_valid,
                 last_used_at = excluded.last_used_at"#,
        )
        .bind(&binding.chat_id)
        .bind(&binding.room_id)
        .bind(binding.is_valid)
        .bind(binding.message_count)
        .bind(binding.last_used_at)
        .bind(binding.last_validated_at)
        .bind(binding.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn deactivate(&self, chat_id: &str) -> Result<bool> {
        // SQLite counts matched rows, not changed ones; only active rows
        // may count as a state change here.
        let result =
            sqlx::query("UPDATE bindings SET is_active = 0 WHERE chat_id = ? AND is_active = 1")
                .bind(chat_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<Binding>> {
        let rows = sqlx::query_as::<_, BindingRow>("SELECT * FROM bindings WHERE is_active = 1")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_all(&self) -> Result<Vec<Binding>> {
        let rows = sqlx::query_as::<_, BindingRow>("SELECT * FROM bindings")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_use(&self, chat_id: &str, now: i64) -> Result<()> {
        sqlx::query(
            "UPDATE bindings SET message_count = message_count + 1, last_used_at = ? WHERE chat_id = ?",
        )
        .bind(now)
        .bind(chat_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn touch_used(&self, chat_id: &str, now: i64) -> Result<()> {
        sqlx::query("UPDATE bindings SET last_used_at = ? WHERE chat_id = ?")
            .bind(now)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_validity(&self, chat_id: &str, valid: bool, now: i64) -> Result<()> {
        sqlx::query("UPDATE bindings SET is_valid = ?, last_validated_at = ? WHERE chat_id = ?")
            .bind(valid)
            .bind(now)
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
