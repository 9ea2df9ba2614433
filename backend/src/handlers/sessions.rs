use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::{
    error::AppError,
    models::{
        session::{AttendanceSession, CreateSessionRequest},
        user::User,
    },
    state::AppState,
    types::{ClassId, SessionId},
};

pub async fn create_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(class_id): Path<ClassId>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<AttendanceSession>), AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let session = state
        .sessions
        .create_session(&user, class_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn end_session(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<AttendanceSession>, AppError> {
    let session = state.sessions.end_session(&user, session_id).await?;
    Ok(Json(session))
}
