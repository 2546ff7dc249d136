use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::calculator::EnergyGoal;

/// One row per user; recomputing a goal overwrites it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyGoals {
    pub user_id: Uuid,
    pub calories: i32,
    pub protein: i32,
    pub carbs: i32,
    pub fats: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn get_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<DailyGoals>> {
    let row = sqlx::query_as::<_, DailyGoals>(
        r#"
        SELECT user_id, calories, protein, carbs, fats, created_at, updated_at
          FROM daily_goals
         WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn upsert(db: &PgPool, user_id: Uuid, goal: &EnergyGoal) -> anyhow::Result<DailyGoals> {
    let row = sqlx::query_as::<_, DailyGoals>(
        r#"
        INSERT INTO daily_goals (user_id, calories, protein, carbs, fats)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id) DO UPDATE
           SET calories = EXCLUDED.calories,
               protein = EXCLUDED.protein,
               carbs = EXCLUDED.carbs,
               fats = EXCLUDED.fats,
               updated_at = now()
        RETURNING user_id, calories, protein, carbs, fats, created_at, updated_at
        "#,
    )
    .bind(user_id)
    .bind(goal.calories)
    .bind(goal.protein)
    .bind(goal.carbs)
    .bind(goal.fats)
    .fetch_one(db)
    .await?;
    Ok(row)
}
