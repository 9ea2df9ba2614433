use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Extension, Json,
};

use crate::{
    error::CheckInFailure,
    models::{
        check_in::{CheckInRequest, CheckInResponse},
        user::User,
    },
    state::AppState,
    types::SessionId,
};

pub async fn check_in(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<SessionId>,
    payload: Result<Json<CheckInRequest>, JsonRejection>,
) -> Result<Json<CheckInResponse>, CheckInFailure> {
    let Json(payload) =
        payload.map_err(|rejection| CheckInFailure::MissingEvidence(rejection.body_text()))?;
    let method = payload.method;
    let (outcome, report) = state.check_in.check_in(&user, session_id, payload).await?;
    Ok(Json(CheckInResponse::from_outcome(&outcome, method, report)))
}
