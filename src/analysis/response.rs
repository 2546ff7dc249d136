//! Turning the vision model's free-text reply into a trusted [`MealCandidate`].
//!
//! The reply is untrusted: it is first reduced to a single JSON object and only
//! then checked field by field. Nothing is defaulted except `description`.

use std::{fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MealType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MealType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(ValidationError::UnknownMealType)
    }
}

/// Validated, not yet persisted nutrition estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealCandidate {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub meal_type: MealType,
    #[serde(default)]
    pub description: String,
}

impl MealCandidate {
    /// Re-checks an already typed candidate, e.g. after the user edited it.
    pub fn check(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::BlankName);
        }
        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ValidationError::NotNonNegativeNumber(field));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("required field is missing: {0}")]
    Missing(&'static str),
    #[error("field \"{0}\" must be a non-negative number")]
    NotNonNegativeNumber(&'static str),
    #[error("meal_type must be one of: breakfast, lunch, dinner, snack")]
    UnknownMealType,
    #[error("name must be non-empty text")]
    BlankName,
    #[error("description must be text")]
    DescriptionNotText,
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(f) | ValidationError::NotNonNegativeNumber(f) => f,
            ValidationError::UnknownMealType => "meal_type",
            ValidationError::BlankName => "name",
            ValidationError::DescriptionNotText => "description",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResponseError {
    #[error("model reply is not a JSON object: {0}")]
    Malformed(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

const REQUIRED_FIELDS: [&str; 6] = ["name", "calories", "protein", "carbs", "fat", "meal_type"];
const NUMERIC_FIELDS: [&str; 4] = ["calories", "protein", "carbs", "fat"];

lazy_static! {
    static ref FENCED_RE: Regex = Regex::new(r"```(?i:json)?\s*([\s\S]*?)\s*```").unwrap();
}

/// Parse then validate a raw model reply.
pub fn interpret_reply(raw: &str) -> Result<MealCandidate, ResponseError> {
    let object = extract_json_object(raw)?;
    Ok(validate_meal(&object)?)
}

/// Strips code fences and keeps the text between the first `{` and last `}`.
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, ResponseError> {
    let mut text = raw.trim();
    if let Some(inner) = FENCED_RE.captures(text).and_then(|c| c.get(1)) {
        text = inner.as_str();
    }

    let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) else {
        return Err(ResponseError::Malformed("no JSON object found".into()));
    };
    if end < start {
        return Err(ResponseError::Malformed("no JSON object found".into()));
    }

    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ResponseError::Malformed("top-level value is not an object".into())),
        Err(e) => Err(ResponseError::Malformed(e.to_string())),
    }
}

pub fn validate_meal(data: &Map<String, Value>) -> Result<MealCandidate, ValidationError> {
    for field in REQUIRED_FIELDS {
        match data.get(field) {
            None | Some(Value::Null) => return Err(ValidationError::Missing(field)),
            Some(Value::String(s)) if s.is_empty() => return Err(ValidationError::Missing(field)),
            Some(_) => {}
        }
    }

    let mut numbers = [0.0_f64; 4];
    for (slot, field) in numbers.iter_mut().zip(NUMERIC_FIELDS) {
        *slot = match data.get(field).and_then(Value::as_f64) {
            Some(n) if n.is_finite() && n >= 0.0 => n,
            _ => return Err(ValidationError::NotNonNegativeNumber(field)),
        };
    }
    let [calories, protein, carbs, fat] = numbers;

    let meal_type = data
        .get("meal_type")
        .and_then(Value::as_str)
        .ok_or(ValidationError::UnknownMealType)?
        .parse::<MealType>()?;

    let name = match data.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => return Err(ValidationError::BlankName),
    };

    let description = match data.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => return Err(ValidationError::DescriptionNotText),
    };

    Ok(MealCandidate {
        name,
        calories,
        protein,
        carbs,
        fat,
        meal_type,
        description,
    })
}
