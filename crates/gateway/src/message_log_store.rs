use {
    async_trait::async_trait,
    sqlx::SqlitePool,
};

use fedlink_relay::{LoggedMessage, MessageLog};

/// SQLite-backed relay message log.
pub struct SqliteMessageLog {
    pool: SqlitePool,
}

impl SqliteMessageLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize the relay_log table schema.
    pub async fn init(pool: &SqlitePool) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS relay_log (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                room_id      TEXT    NOT NULL,
                message_id   TEXT    NOT NULL,
                platform     TEXT    NOT NULL,
                user_id      TEXT    NOT NULL,
                display_name TEXT    NOT NULL,
                body         TEXT    NOT NULL,
                sent_at      INTEGER NOT NULL
            )",
        )
        .execute(pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_relay_log_room_sent
             ON relay_log (room_id, sent_at)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MessageLog for SqliteMessageLog {
    async fn append(&self, entry: LoggedMessage) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO relay_log
             (room_id, message_id, platform, user_id, display_name, body, sent_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.room_id)
        .bind(&entry.message_id)
        .bind(&entry.platform)
        .bind(&entry.user_id)
        .bind(&entry.display_name)
        .bind(&entry.text)
        .bind(entry.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_since(
        &self,
        room_id: &str,
        since: Option<i64>,
        limit: u32,
    ) -> anyhow::Result<Vec<LoggedMessage>> {
        let rows = sqlx::query_as::<_, (i64, String, String, String, String, String, String, i64)>(
            "SELECT id, room_id, message_id, platform, user_id, display_name, body, sent_at
             FROM relay_log
             WHERE room_id = ? AND sent_at > ?
             ORDER BY sent_at ASC, id ASC
             LIMIT ?",
        )
        .bind(room_id)
        .bind(since.unwrap_or(0))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| LoggedMessage {
                id: r.0,
                room_id: r.1,
                message_id: r.2,
                platform: r.3,
                user_id: r.4,
                display_name: r.5,
                text: r.6,
                sent_at: r.7,
            })
            .collect())
    }
}
