use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

pub const RECENT_LIMIT: i64 = 50;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AiLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prompt: String,
    pub response: String,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert a log entry within a transaction, returning its id.
pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    prompt: &str,
    response: &str,
    image_url: Option<&str>,
) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO ai_logs (user_id, prompt, response, image_url)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(prompt)
    .bind(response)
    .bind(image_url)
    .fetch_one(&mut **tx)
    .await
    .context("insert ai log")?;
    Ok(id)
}

pub async fn list_recent(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<AiLog>> {
    let rows = sqlx::query_as::<_, AiLog>(
        r#"
        SELECT id, user_id, prompt, response, image_url, created_at
          FROM ai_logs
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(RECENT_LIMIT)
    .fetch_all(db)
    .await
    .context("list ai logs")?;
    Ok(rows)
}
