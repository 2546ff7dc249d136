use serde::Serialize;

use super::calculator::{
    body_mass_index, daily_expenditure, resting_metabolic_rate, Biometrics, EnergyGoal,
};
use super::repo::DailyGoals;

/// Intermediate values shown next to the target; they do not affect it.
#[derive(Debug, Serialize)]
pub struct GoalBreakdown {
    pub rmr: f64,
    pub tdee: f64,
    pub bmi: f64,
    pub activity_multiplier: f64,
}

impl GoalBreakdown {
    pub fn of(b: &Biometrics) -> Self {
        Self {
            rmr: resting_metabolic_rate(b),
            tdee: daily_expenditure(b),
            bmi: body_mass_index(b),
            activity_multiplier: b.activity_level.multiplier(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GoalPreviewResponse {
    pub goal: EnergyGoal,
    pub breakdown: GoalBreakdown,
}

#[derive(Debug, Serialize)]
pub struct SavedGoalResponse {
    pub goal: DailyGoals,
    pub breakdown: GoalBreakdown,
}
