use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use time::{OffsetDateTime, UtcOffset};
use tracing::{error, info, instrument};
use uuid::Uuid;

use super::dto::{
    CreateMealRequest, DayMealsResponse, DayQuery, RangeQuery, RangeResponse, StatsQuery,
    StatsResponse, UpdateMealRequest,
};
use super::repo;
use super::repo_types::Meal;
use super::summary::{self, DailyTotals};
use crate::{analysis::ValidationError, auth::AuthUser, errors::ErrorBody, state::AppState};

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_day).post(create_meal))
        .route("/meals/range", get(list_range))
        .route(
            "/meals/:id",
            get(get_meal).patch(update_meal).delete(delete_meal),
        )
        .route("/stats", get(stats))
}

fn bad_request(msg: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody::new(msg, None))).into_response()
}

fn invalid_meal(e: ValidationError) -> Response {
    let body = ErrorBody {
        field: Some(e.field()),
        ..ErrorBody::new("meal data has an invalid format", Some(e.to_string()))
    };
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Meal not found").into_response()
}

fn internal(e: anyhow::Error) -> Response {
    error!(error = %e, "meal store failure");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
}

/// Only absolute http(s) URLs are stored alongside meals.
fn check_image_url(url: &str) -> Result<(), Response> {
    let ok = ["https://", "http://"].iter().any(|scheme| {
        url.strip_prefix(scheme)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains(char::is_whitespace))
    });
    if ok {
        Ok(())
    } else {
        Err(bad_request("image_url must be an http(s) URL"))
    }
}

fn offset_or_400(minutes: Option<i32>) -> Result<UtcOffset, Response> {
    summary::parse_offset(minutes).map_err(bad_request)
}

/// POST /meals
#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateMealRequest>,
) -> Result<(StatusCode, HeaderMap, Json<Meal>), Response> {
    let mut meal = body.meal;
    meal.name = meal.name.trim().to_string();
    meal.check().map_err(invalid_meal)?;

    let image_url = body
        .image_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());
    if let Some(url) = &image_url {
        check_image_url(url)?;
    }

    let saved = repo::insert(&state.db, user_id, &meal, image_url.as_deref())
        .await
        .map_err(internal)?;
    info!(%user_id, meal_id = %saved.id, calories = saved.calories, "meal saved");

    let mut headers = HeaderMap::new();
    if let Ok(v) = HeaderValue::from_str(&format!("/api/v1/meals/{}", saved.id)) {
        headers.insert(header::LOCATION, v);
    }
    Ok((StatusCode::CREATED, headers, Json(saved)))
}

/// GET /meals?date=YYYY-MM-DD&tz_offset_minutes=
#[instrument(skip(state))]
pub async fn list_day(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<DayMealsResponse>, Response> {
    let offset = offset_or_400(q.tz_offset_minutes)?;
    let date = match q.date.as_deref() {
        Some(s) => summary::parse_date(s).map_err(bad_request)?,
        None => OffsetDateTime::now_utc().to_offset(offset).date(),
    };
    let (from, to) = summary::day_window(date, offset).map_err(bad_request)?;

    let meals = repo::list_between(&state.db, user_id, from, to, None)
        .await
        .map_err(internal)?;
    Ok(Json(DayMealsResponse {
        date: summary::format_date(date),
        totals: DailyTotals::of(&meals),
        meals,
    }))
}

/// GET /meals/range?from=&to=&meal_type=&tz_offset_minutes=
#[instrument(skip(state))]
pub async fn list_range(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RangeQuery>,
) -> Result<Json<RangeResponse>, Response> {
    let offset = offset_or_400(q.tz_offset_minutes)?;
    let from = summary::parse_date(&q.from).map_err(bad_request)?;
    let to = summary::parse_date(&q.to).map_err(bad_request)?;
    let (start, end) = summary::range_window(from, to, offset).map_err(bad_request)?;

    let meals = repo::list_between(&state.db, user_id, start, end, q.meal_type)
        .await
        .map_err(internal)?;
    Ok(Json(RangeResponse {
        from: summary::format_date(from),
        to: summary::format_date(to),
        totals: DailyTotals::of(&meals),
        meals,
    }))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Meal>, Response> {
    match repo::get(&state.db, user_id, id).await.map_err(internal)? {
        Some(meal) => Ok(Json(meal)),
        None => Err(not_found()),
    }
}

/// PATCH /meals/:id
#[instrument(skip(state, patch))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(patch): Json<UpdateMealRequest>,
) -> Result<Json<Meal>, Response> {
    if patch.is_empty() {
        return Err(bad_request("nothing to update"));
    }
    let current = repo::get(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    let edited = patch.apply(current.candidate()).map_err(invalid_meal)?;

    let saved = repo::update(&state.db, user_id, id, &edited)
        .await
        .map_err(internal)?
        .ok_or_else(not_found)?;
    info!(%user_id, meal_id = %id, "meal updated");
    Ok(Json(saved))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Response> {
    if repo::delete(&state.db, user_id, id).await.map_err(internal)? {
        info!(%user_id, meal_id = %id, "meal deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found())
    }
}

/// GET /stats?days=7&tz_offset_minutes=
#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, Response> {
    let offset = offset_or_400(q.tz_offset_minutes)?;
    let (first, last) =
        summary::stats_window(OffsetDateTime::now_utc(), q.days, offset).map_err(bad_request)?;
    let (start, end) = summary::range_window(first, last, offset).map_err(bad_request)?;

    let meals = repo::list_between(&state.db, user_id, start, end, None)
        .await
        .map_err(internal)?;
    let summaries = summary::summarize_by_day(&meals, offset);
    let totals = DailyTotals::of(&meals);

    Ok(Json(StatsResponse {
        from: summary::format_date(first),
        to: summary::format_date(last),
        days: q.days,
        daily_average: totals.average_over(summaries.len()),
        days_logged: summaries.len(),
        meal_count: meals.len(),
        summaries,
        totals,
    }))
}
