use anyhow::Context;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Meal, MealRow};
use crate::ai_logs::repo as ai_logs;
use crate::analysis::{MealCandidate, MealType};

/// Prompt recorded in `ai_logs` for saved photo analyses.
pub const ANALYSIS_LOG_PROMPT: &str = "meal photo analysis";

const MEAL_COLUMNS: &str = "id, user_id, name, calories, protein, carbs, fat, meal_type, \
                            description, image_url, ai_log_id, created_at";

fn into_meal(row: MealRow) -> anyhow::Result<Meal> {
    let id = row.id;
    Meal::try_from(row).with_context(|| format!("meal {id} has an unknown meal_type"))
}

/// Insert a meal. Meals that carry an analysed image also get an `ai_logs`
/// entry, written in the same transaction and linked via `ai_log_id`.
pub async fn insert(
    db: &PgPool,
    user_id: Uuid,
    meal: &MealCandidate,
    image_url: Option<&str>,
) -> anyhow::Result<Meal> {
    let mut tx = db.begin().await.context("begin tx")?;

    let ai_log_id = match image_url {
        Some(url) => {
            let logged = serde_json::to_string(meal).context("serialize meal for ai log")?;
            Some(ai_logs::insert_tx(&mut tx, user_id, ANALYSIS_LOG_PROMPT, &logged, Some(url)).await?)
        }
        None => None,
    };

    let row = sqlx::query_as::<_, MealRow>(&format!(
        r#"
        INSERT INTO meals (user_id, name, calories, protein, carbs, fat, meal_type,
                           description, image_url, ai_log_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&meal.name)
    .bind(meal.calories)
    .bind(meal.protein)
    .bind(meal.carbs)
    .bind(meal.fat)
    .bind(meal.meal_type.as_str())
    .bind(&meal.description)
    .bind(image_url)
    .bind(ai_log_id)
    .fetch_one(&mut *tx)
    .await
    .context("insert meal")?;

    tx.commit().await.context("commit tx")?;
    into_meal(row)
}

/// Meals with `from <= created_at < to`, newest first.
pub async fn list_between(
    db: &PgPool,
    user_id: Uuid,
    from: OffsetDateTime,
    to: OffsetDateTime,
    meal_type: Option<MealType>,
) -> anyhow::Result<Vec<Meal>> {
    let rows = sqlx::query_as::<_, MealRow>(&format!(
        r#"
        SELECT {MEAL_COLUMNS}
          FROM meals
         WHERE user_id = $1
           AND created_at >= $2
           AND created_at < $3
           AND ($4::text IS NULL OR meal_type = $4)
         ORDER BY created_at DESC
        "#
    ))
    .bind(user_id)
    .bind(from)
    .bind(to)
    .bind(meal_type.map(|t| t.as_str()))
    .fetch_all(db)
    .await
    .context("list meals")?;

    rows.into_iter().map(into_meal).collect()
}

pub async fn get(db: &PgPool, user_id: Uuid, meal_id: Uuid) -> anyhow::Result<Option<Meal>> {
    let row = sqlx::query_as::<_, MealRow>(&format!(
        "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1 AND user_id = $2"
    ))
    .bind(meal_id)
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("get meal")?;

    row.map(into_meal).transpose()
}

/// Overwrites the nutrition fields of a meal owned by `user_id`.
pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    meal_id: Uuid,
    meal: &MealCandidate,
) -> anyhow::Result<Option<Meal>> {
    let row = sqlx::query_as::<_, MealRow>(&format!(
        r#"
        UPDATE meals
           SET name = $3, calories = $4, protein = $5, carbs = $6, fat = $7,
               meal_type = $8, description = $9
         WHERE id = $1 AND user_id = $2
        RETURNING {MEAL_COLUMNS}
        "#
    ))
    .bind(meal_id)
    .bind(user_id)
    .bind(&meal.name)
    .bind(meal.calories)
    .bind(meal.protein)
    .bind(meal.carbs)
    .bind(meal.fat)
    .bind(meal.meal_type.as_str())
    .bind(&meal.description)
    .fetch_optional(db)
    .await
    .context("update meal")?;

    row.map(into_meal).transpose()
}

/// Returns whether a row was deleted.
pub async fn delete(db: &PgPool, user_id: Uuid, meal_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
        .bind(meal_id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete meal")?;
    Ok(res.rows_affected() > 0)
}
