use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::analysis::{MealCandidate, MealType, ValidationError};

#[derive(Debug, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub meal_type: String,
    pub description: String,
    pub image_url: Option<String>,
    pub ai_log_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub meal_type: MealType,
    pub description: String,
    pub image_url: Option<String>,
    pub ai_log_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Meal {
    /// The editable nutrition part of the record.
    pub fn candidate(&self) -> MealCandidate {
        MealCandidate {
            name: self.name.clone(),
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
            meal_type: self.meal_type,
            description: self.description.clone(),
        }
    }
}

impl TryFrom<MealRow> for Meal {
    type Error = ValidationError;

    fn try_from(r: MealRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            calories: r.calories,
            protein: r.protein,
            carbs: r.carbs,
            fat: r.fat,
            meal_type: r.meal_type.parse()?,
            description: r.description,
            image_url: r.image_url,
            ai_log_id: r.ai_log_id,
            created_at: r.created_at,
        })
    }
}
