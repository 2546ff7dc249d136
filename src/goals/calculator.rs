//! Daily energy and macro targets from biometrics (Mifflin–St Jeor).
//!
//! Pure and stateless: the same input always yields the same integers.

use serde::{Deserialize, Serialize};

/// Share of calories per macro: protein, carbs, fat.
const PROTEIN_SHARE: f64 = 0.25;
const CARBS_SHARE: f64 = 0.50;
const FAT_SHARE: f64 = 0.25;

/// kcal per gram.
const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARBS: f64 = 4.0;
const KCAL_PER_G_FAT: f64 = 9.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BiologicalSex {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Heavy,
    Athlete,
}

impl ActivityLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Heavy => 1.7,
            ActivityLevel::Athlete => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biometrics {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: f64,
    #[serde(alias = "sex")]
    pub biological_sex: BiologicalSex,
    pub activity_level: ActivityLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyGoal {
    pub calories: i32,
    pub protein: i32,
    pub carbs: i32,
    pub fats: i32,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GoalError {
    #[error("invalid input: {}", .0.join(", "))]
    InvalidInput(Vec<&'static str>),
}

impl Biometrics {
    fn check(&self) -> Result<(), GoalError> {
        let bad: Vec<&'static str> = [
            ("weight_kg", self.weight_kg),
            ("height_cm", self.height_cm),
            ("age_years", self.age_years),
        ]
        .into_iter()
        .filter(|(_, v)| !(v.is_finite() && *v > 0.0))
        .map(|(name, _)| name)
        .collect();
        if bad.is_empty() {
            Ok(())
        } else {
            Err(GoalError::InvalidInput(bad))
        }
    }
}

/// Resting metabolic rate in kcal/day. Callers must have validated the input.
pub fn resting_metabolic_rate(b: &Biometrics) -> f64 {
    let base = 10.0 * b.weight_kg + 6.25 * b.height_cm - 5.0 * b.age_years;
    match b.biological_sex {
        BiologicalSex::Male => base + 5.0,
        BiologicalSex::Female => base - 161.0,
    }
}

/// Body-mass index, one decimal.
pub fn body_mass_index(b: &Biometrics) -> f64 {
    let m = b.height_cm / 100.0;
    (b.weight_kg / (m * m) * 10.0).round() / 10.0
}

/// Total daily energy expenditure, unrounded.
pub fn daily_expenditure(b: &Biometrics) -> f64 {
    resting_metabolic_rate(b) * b.activity_level.multiplier()
}

/// Splits a calorie target 25/50/25 into protein, carb and fat grams.
pub fn split_macros(calories: i32) -> EnergyGoal {
    let kcal = f64::from(calories);
    EnergyGoal {
        calories,
        protein: (kcal * PROTEIN_SHARE / KCAL_PER_G_PROTEIN).round() as i32,
        carbs: (kcal * CARBS_SHARE / KCAL_PER_G_CARBS).round() as i32,
        fats: (kcal * FAT_SHARE / KCAL_PER_G_FAT).round() as i32,
    }
}

pub fn calculate(b: &Biometrics) -> Result<EnergyGoal, GoalError> {
    b.check()?;
    Ok(split_macros(daily_expenditure(b).round() as i32))
}
