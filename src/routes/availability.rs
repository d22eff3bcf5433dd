//! Availability endpoint

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use talk_to_core::LocalWindow;

use crate::routes::AppError;
use crate::state::AppState;

/// Days shown when no end date is given
const DEFAULT_RANGE_DAYS: u64 = 14;

pub fn router() -> Router<AppState> {
    Router::new().route("/availability", get(availability))
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub data: Vec<(NaiveDate, Vec<LocalWindow>)>,
    #[serde(rename = "start-date")]
    pub start_date: NaiveDate,
    #[serde(rename = "end-date")]
    pub end_date: NaiveDate,
    #[serde(rename = "next-date")]
    pub next_date: NaiveDate,
    #[serde(rename = "last-update")]
    pub last_update: String,
    pub timezone: String,
    pub timezone_as_offset: String,
}

fn parse_date(value: &str, which: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(format!("{} date is invalid", which)))
}

/// `date` moved forward by `days`, or a 400 when that runs past the last representable date
fn days_after(date: NaiveDate, days: u64) -> Result<NaiveDate, AppError> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| AppError::bad_request("end date is invalid"))
}

/// GET /availability?start_date=YYYY-MM-DD&end_date=YYYY-MM-DD
async fn availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let start_date = match query.start_date.as_deref() {
        Some(s) if !s.is_empty() => parse_date(s, "start")?,
        _ => Utc::now().date_naive(),
    };
    let end_date = match query.end_date.as_deref() {
        Some(s) if !s.is_empty() => parse_date(s, "end")?,
        _ => days_after(start_date, DEFAULT_RANGE_DAYS)?,
    };
    let next_date = days_after(end_date, 1)?;

    let availability = state
        .talk_to()
        .compute_availability(start_date, end_date)
        .await?;

    Ok(Json(AvailabilityResponse {
        data: availability.per_date,
        start_date,
        end_date,
        next_date,
        last_update: availability.last_update.to_rfc3339(),
        timezone: availability.timezone.name().to_string(),
        timezone_as_offset: availability.timezone_offset,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use serde_json::json;
    use talk_to_core::Event;

    use crate::routes::test_support::{app, call_json, ready_app};

    #[tokio::test]
    async fn returns_two_weeks_of_free_windows_by_default() {
        // 11:00-12:00 in Paris
        let busy = Event::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 15, 11, 0, 0).unwrap(),
        );
        let (status, body) =
            call_json(ready_app(vec![busy]).await, "GET", "/availability?start_date=2024-01-15")
                .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start-date"], "2024-01-15");
        assert_eq!(body["end-date"], "2024-01-29");
        assert_eq!(body["next-date"], "2024-01-30");
        assert_eq!(body["timezone"], "Europe/Paris");
        assert!(
            matches!(body["timezone_as_offset"].as_str(), Some("+0100" | "+0200")),
            "got: {}",
            body["timezone_as_offset"]
        );
        assert!(DateTime::parse_from_rfc3339(body["last-update"].as_str().unwrap()).is_ok());

        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 15);
        assert_eq!(
            data[0],
            json!(["2024-01-15", [["09:00", "11:00"], ["12:00", "17:00"]]])
        );
        assert_eq!(data[1], json!(["2024-01-16", [["09:00", "17:00"]]]));
        assert_eq!(data[5], json!(["2024-01-20", []]));
    }

    #[tokio::test]
    async fn rejects_ranges_ending_past_the_last_date() {
        let last = NaiveDate::MAX.format("%Y-%m-%d").to_string().replace('+', "%2B");

        let (status, body) =
            call_json(ready_app(vec![]).await, "GET", &format!("/availability?start_date={}", last))
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "end date is invalid");

        let uri = format!("/availability?start_date={}&end_date={}", last, last);
        let (status, body) = call_json(ready_app(vec![]).await, "GET", &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "end date is invalid");
    }

    #[tokio::test]
    async fn rejects_unparseable_dates() {
        let (status, body) = call_json(app(), "GET", "/availability?start_date=tomorrow").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "start date is invalid");

        let (status, body) =
            call_json(app(), "GET", "/availability?start_date=2024-01-15&end_date=2024-13-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "end date is invalid");
    }

    #[tokio::test]
    async fn rejects_ranges_over_sixty_days() {
        let (status, body) =
            call_json(app(), "GET", "/availability?start_date=2024-01-01&end_date=2024-03-15").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("60 days"));
    }

    #[tokio::test]
    async fn unavailable_until_calendars_are_loaded() {
        let (status, body) =
            call_json(app(), "GET", "/availability?start_date=2024-01-15").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Calendars have not been loaded yet");
    }
}
