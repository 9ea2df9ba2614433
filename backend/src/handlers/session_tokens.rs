use axum::{
    extract::{Path, State},
    Extension, Json,
};

use crate::{
    error::CheckInFailure,
    models::{session_token::SessionToken, user::User},
    state::AppState,
    types::SessionId,
};

/// Issues the next QR frame. The professor's display polls this every TTL;
/// each call invalidates the previous frame.
pub async fn issue_session_token(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionToken>, CheckInFailure> {
    let token = state.tokens.issue(session_id, &user).await?;
    Ok(Json(token))
}
