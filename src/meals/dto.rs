use serde::{Deserialize, Serialize};

use super::repo_types::Meal;
use super::summary::{DailyTotals, DaySummary};
use crate::analysis::{MealCandidate, MealType, ValidationError};

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    #[serde(flatten)]
    pub meal: MealCandidate,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Partial edit; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMealRequest {
    pub name: Option<String>,
    pub calories: Option<f64>,
    pub protein: Option<f64>,
    pub carbs: Option<f64>,
    pub fat: Option<f64>,
    pub meal_type: Option<MealType>,
    pub description: Option<String>,
}

impl UpdateMealRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.calories.is_none()
            && self.protein.is_none()
            && self.carbs.is_none()
            && self.fat.is_none()
            && self.meal_type.is_none()
            && self.description.is_none()
    }

    /// Applies the edit on top of `current` and re-validates the result.
    pub fn apply(self, mut current: MealCandidate) -> Result<MealCandidate, ValidationError> {
        if let Some(v) = self.name {
            current.name = v.trim().to_string();
        }
        if let Some(v) = self.calories {
            current.calories = v;
        }
        if let Some(v) = self.protein {
            current.protein = v;
        }
        if let Some(v) = self.carbs {
            current.carbs = v;
        }
        if let Some(v) = self.fat {
            current.fat = v;
        }
        if let Some(v) = self.meal_type {
            current.meal_type = v;
        }
        if let Some(v) = self.description {
            current.description = v;
        }
        current.check()?;
        Ok(current)
    }
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    /// `YYYY-MM-DD`; today at the given offset when absent.
    pub date: Option<String>,
    pub tz_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: String,
    pub to: String,
    pub meal_type: Option<MealType>,
    pub tz_offset_minutes: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_days")]
    pub days: u16,
    pub tz_offset_minutes: Option<i32>,
}
fn default_days() -> u16 { 7 }

#[derive(Debug, Serialize)]
pub struct DayMealsResponse {
    pub date: String,
    pub meals: Vec<Meal>,
    pub totals: DailyTotals,
}

#[derive(Debug, Serialize)]
pub struct RangeResponse {
    pub from: String,
    pub to: String,
    pub meals: Vec<Meal>,
    pub totals: DailyTotals,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub from: String,
    pub to: String,
    pub days: u16,
    pub summaries: Vec<DaySummary>,
    pub totals: DailyTotals,
    pub meal_count: usize,
    pub days_logged: usize,
    /// Mean over days that have at least one meal.
    pub daily_average: DailyTotals,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored() -> MealCandidate {
        MealCandidate {
            name: "Oatmeal".into(),
            calories: 300.0,
            protein: 10.0,
            carbs: 50.0,
            fat: 6.0,
            meal_type: MealType::Breakfast,
            description: "with berries".into(),
        }
    }

    #[test]
    fn create_request_flattens_candidate() {
        let req: CreateMealRequest = serde_json::from_value(json!({
            "name": "Salad", "calories": 120, "protein": 3, "carbs": 10, "fat": 8,
            "meal_type": "lunch", "image_url": "https://cdn.example/x.jpg"
        }))
        .unwrap();
        assert_eq!(req.meal.name, "Salad");
        assert_eq!(req.meal.meal_type, MealType::Lunch);
        assert_eq!(req.meal.description, "");
        assert_eq!(req.image_url.as_deref(), Some("https://cdn.example/x.jpg"));
    }

    #[test]
    fn partial_update_keeps_untouched_fields() {
        let patch: UpdateMealRequest =
            serde_json::from_value(json!({ "calories": 350, "meal_type": "snack" })).unwrap();
        assert!(!patch.is_empty());
        let out = patch.apply(stored()).unwrap();
        assert_eq!(out.calories, 350.0);
        assert_eq!(out.meal_type, MealType::Snack);
        assert_eq!(out.name, "Oatmeal");
        assert_eq!(out.description, "with berries");
    }

    #[test]
    fn partial_update_is_revalidated() {
        let patch = UpdateMealRequest {
            fat: Some(-1.0),
            ..Default::default()
        };
        assert_eq!(
            patch.apply(stored()).unwrap_err(),
            ValidationError::NotNonNegativeNumber("fat")
        );

        let blank = UpdateMealRequest {
            name: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(blank.apply(stored()).unwrap_err(), ValidationError::BlankName);
    }

    #[test]
    fn empty_patch_is_detected() {
        let patch: UpdateMealRequest = serde_json::from_value(json!({})).unwrap();
        assert!(patch.is_empty());
    }
}
