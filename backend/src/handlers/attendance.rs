use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    error::AppError,
    models::{attendance::AttendanceRecord, user::User},
    state::AppState,
    types::SessionId,
};

pub async fn list_session_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let records = state
        .sessions
        .list_session_attendance(&user, session_id)
        .await?;
    Ok(Json(records))
}

pub async fn get_my_attendance(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let records = state.sessions.my_attendance(&user).await?;
    Ok(Json(records))
}
