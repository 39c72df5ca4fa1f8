//! Rolling usage window
//!
//! A window starts at `window_start` and lasts `window_seconds`. Once
//! `now >= window_start + window_seconds` the window reports zero used
//! seconds, whether or not housekeeping has reset the row yet. The next
//! recorded session rolls `window_start` forward to the time of recording.

use std::convert::Infallible;

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::{DateTime, Duration, Utc};
use common::settings::QuotaSettings;
use futures::stream::Stream;
use tokio_stream::{StreamExt, wrappers::BroadcastStream};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    feed::UsageUpdate,
    middleware::AuthUser,
    models::{
        Page, Pagination,
        usage::{RecordSessionRequest, UsageEvent, UsageWindow, WindowView},
    },
    state::AppState,
};

/// Longest session a client may report at once
pub const MAX_SESSION_SECONDS: i64 = 86_400;

/// Seconds consumed against a limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Consumption {
    pub used: i64,
    pub limit: i64,
}

impl Consumption {
    pub fn exhausted(&self) -> bool {
        self.used >= self.limit
    }

    pub fn remaining(&self) -> i64 {
        (self.limit - self.used).max(0)
    }
}

pub fn resets_at(window: &UsageWindow) -> DateTime<Utc> {
    window.window_start + Duration::seconds(window.window_seconds)
}

pub fn is_expired(window: &UsageWindow, now: DateTime<Utc>) -> bool {
    now >= resets_at(window)
}

/// Used seconds as of `now`; zero once the window has elapsed
pub fn effective_used(window: &UsageWindow, now: DateTime<Utc>) -> i64 {
    if is_expired(window, now) {
        0
    } else {
        window.used_seconds.max(0)
    }
}

/// Start of the window a session recorded at `now` belongs to
pub fn next_window_start(window: Option<&UsageWindow>, now: DateTime<Utc>) -> DateTime<Utc> {
    match window {
        Some(window) if !is_expired(window, now) => window.window_start,
        _ => now,
    }
}

/// Windowed consumption: the tighter of the profile quota and the window cap
pub fn windowed_consumption(
    window: Option<&UsageWindow>,
    profile_limit: i64,
    quota: &QuotaSettings,
    now: DateTime<Utc>,
) -> Consumption {
    match window {
        Some(window) => Consumption {
            used: effective_used(window, now),
            limit: profile_limit.min(window.max_usage_seconds),
        },
        None => Consumption {
            used: 0,
            limit: profile_limit.min(quota.max_usage_seconds),
        },
    }
}

/// Lifetime consumption: every recorded second against the profile quota
pub fn lifetime_consumption(total_seconds: i64, profile_limit: i64) -> Consumption {
    Consumption {
        used: total_seconds.max(0),
        limit: profile_limit,
    }
}

/// Build the view of a window as shown to its owner
pub fn window_view(
    window: Option<&UsageWindow>,
    profile_limit: i64,
    quota: &QuotaSettings,
    now: DateTime<Utc>,
) -> WindowView {
    let consumption = windowed_consumption(window, profile_limit, quota, now);
    let live = window.filter(|window| !is_expired(window, now));

    WindowView {
        used_seconds: consumption.used,
        max_usage_seconds: consumption.limit,
        window_seconds: window.map_or(quota.window_seconds, |window| window.window_seconds),
        window_start: live.map(|window| window.window_start),
        resets_at: live.map(resets_at),
        remaining_seconds: consumption.remaining(),
        exhausted: consumption.exhausted(),
    }
}

pub fn validate_session_seconds(seconds: i64) -> Result<(), String> {
    if !(1..=MAX_SESSION_SECONDS).contains(&seconds) {
        return Err(format!(
            "seconds must be between 1 and {MAX_SESSION_SECONDS}"
        ));
    }
    Ok(())
}

async fn current_view(state: &AppState, user_id: Uuid) -> ApiResult<WindowView> {
    let quota = state.settings.quota;
    let profile = state
        .profile_repository
        .find_or_create(user_id, quota.default_limit_seconds)
        .await
        .map_err(ApiError::internal("Failed to load profile"))?;

    let window = state
        .usage_repository
        .find_window(user_id)
        .await
        .map_err(ApiError::internal("Failed to load usage window"))?;

    Ok(window_view(
        window.as_ref(),
        profile.quota_limit_seconds,
        &quota,
        Utc::now(),
    ))
}

/// Current window of the caller
pub async fn get_usage(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<WindowView>> {
    Ok(Json(current_view(&state, user.id).await?))
}

/// Record a finished session and recompute the window
pub async fn record_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<RecordSessionRequest>,
) -> ApiResult<Json<WindowView>> {
    validate_session_seconds(payload.seconds).map_err(ApiError::BadRequest)?;

    let quota = state.settings.quota;
    let profile = state
        .profile_repository
        .find_or_create(user.id, quota.default_limit_seconds)
        .await
        .map_err(ApiError::internal("Failed to load profile"))?;

    let now = Utc::now();
    let window = state
        .usage_repository
        .record_session(user.id, payload.seconds, &quota, now)
        .await
        .map_err(ApiError::internal("Failed to record session"))?;

    let view = window_view(Some(&window), profile.quota_limit_seconds, &quota, now);
    info!(
        "Recorded {}s session for {} ({}s used in window)",
        payload.seconds, user.id, view.used_seconds
    );

    state.feed.publish(UsageUpdate {
        user_id: user.id,
        window: view.clone(),
    });

    Ok(Json(view))
}

/// Usage history of the caller, newest first
pub async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<UsageEvent>>> {
    let (events, total) = state
        .usage_repository
        .list_events(user.id, &pagination)
        .await
        .map_err(ApiError::internal("Failed to list usage events"))?;

    Ok(Json(Page::new(events, &pagination, total)))
}

/// Server-sent events carrying the caller's window, starting with its current state
pub async fn usage_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let receiver = state.feed.subscribe();
    let initial = current_view(&state, user.id).await?;
    let first = Event::default()
        .event("usage")
        .json_data(&initial)
        .map_err(|e| ApiError::internal("Failed to encode usage")(e.into()))?;

    let user_id = user.id;
    let updates = BroadcastStream::new(receiver).filter_map(move |update| match update {
        Ok(update) if update.user_id == user_id => Event::default()
            .event("usage")
            .json_data(&update.window)
            .ok()
            .map(Ok),
        _ => None,
    });

    let stream = tokio_stream::once(Ok(first)).chain(updates);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota() -> QuotaSettings {
        QuotaSettings {
            default_limit_seconds: 36_000,
            window_seconds: 86_400,
            max_usage_seconds: 7_200,
        }
    }

    fn window(start: DateTime<Utc>, used_seconds: i64) -> UsageWindow {
        UsageWindow {
            user_id: Uuid::new_v4(),
            used_seconds,
            window_start: start,
            window_seconds: 3600,
            max_usage_seconds: 1800,
            updated_at: start,
        }
    }

    #[test]
    fn test_live_window_reports_stored_usage() {
        let now = Utc::now();
        let w = window(now - Duration::minutes(30), 600);

        assert_eq!(effective_used(&w, now), 600);
        assert!(!is_expired(&w, now));
    }

    #[test]
    fn test_elapsed_window_reports_zero_before_pruning() {
        let now = Utc::now();
        let w = window(now - Duration::hours(1), 1800);

        assert!(is_expired(&w, now));
        assert_eq!(effective_used(&w, now), 0);
        assert_eq!(effective_used(&w, now + Duration::days(3)), 0);
        assert_eq!(effective_used(&w, now - Duration::seconds(1)), 1800);
    }

    #[test]
    fn test_next_window_start_rolls_only_when_expired() {
        let now = Utc::now();
        let live = window(now - Duration::minutes(10), 60);
        let stale = window(now - Duration::hours(2), 60);

        assert_eq!(next_window_start(Some(&live), now), live.window_start);
        assert_eq!(next_window_start(Some(&stale), now), now);
        assert_eq!(next_window_start(None, now), now);
    }

    #[test]
    fn test_windowed_limit_is_the_tighter_cap() {
        let now = Utc::now();
        let w = window(now, 0);

        assert_eq!(windowed_consumption(Some(&w), 10_000, &quota(), now).limit, 1800);
        assert_eq!(windowed_consumption(Some(&w), 900, &quota(), now).limit, 900);
        assert_eq!(windowed_consumption(None, 10_000, &quota(), now).limit, 7200);
    }

    #[test]
    fn test_quota_gate_boundary() {
        assert!(!Consumption { used: 1799, limit: 1800 }.exhausted());
        assert!(Consumption { used: 1800, limit: 1800 }.exhausted());
        assert!(Consumption { used: 5000, limit: 1800 }.exhausted());
        assert!(lifetime_consumption(0, 0).exhausted());
        assert!(!lifetime_consumption(10, 3600).exhausted());
    }

    #[test]
    fn test_window_view_of_live_window() {
        let now = Utc::now();
        let start = now - Duration::minutes(15);
        let view = window_view(Some(&window(start, 600)), 36_000, &quota(), now);

        assert_eq!(view.used_seconds, 600);
        assert_eq!(view.max_usage_seconds, 1800);
        assert_eq!(view.remaining_seconds, 1200);
        assert_eq!(view.window_start, Some(start));
        assert_eq!(view.resets_at, Some(start + Duration::hours(1)));
        assert!(!view.exhausted);
    }

    #[test]
    fn test_window_view_of_expired_window() {
        let now = Utc::now();
        let view = window_view(
            Some(&window(now - Duration::hours(5), 1800)),
            36_000,
            &quota(),
            now,
        );

        assert_eq!(view.used_seconds, 0);
        assert_eq!(view.remaining_seconds, 1800);
        assert_eq!(view.window_start, None);
        assert_eq!(view.resets_at, None);
    }

    #[test]
    fn test_window_view_clamps_remaining_at_zero() {
        let now = Utc::now();
        let view = window_view(Some(&window(now, 2500)), 36_000, &quota(), now);

        assert_eq!(view.remaining_seconds, 0);
        assert!(view.exhausted);
    }

    #[test]
    fn test_session_seconds_bounds() {
        assert!(validate_session_seconds(0).is_err());
        assert!(validate_session_seconds(-5).is_err());
        assert!(validate_session_seconds(1).is_ok());
        assert!(validate_session_seconds(MAX_SESSION_SECONDS).is_ok());
        assert!(validate_session_seconds(MAX_SESSION_SECONDS + 1).is_err());
    }
}
