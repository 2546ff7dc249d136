mod error;
pub mod handlers;
mod pipeline;
pub mod probe;
mod response;
pub mod vision;

use crate::state::AppState;
use axum::Router;

pub use pipeline::MealAnalyzer;
pub use response::{MealCandidate, MealType, ValidationError};

pub fn router() -> Router<AppState> {
    handlers::analyze_routes()
}
