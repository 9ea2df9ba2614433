use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    error::CheckInFailure,
    models::user::User,
    state::AppState,
    types::UserId,
    utils::jwt::{verify_access_token, Claims},
};

/// Any signed-in user. Rejects with 401 before anything else runs, in the same
/// `{success, reason}` shape the check-in handlers use.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CheckInFailure> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

// Auth + require a teaching role for session management routes
pub async fn auth_professor(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CheckInFailure> {
    let (claims, user) = authenticate_request(request.headers(), &state).await?;
    if !user.can_teach() {
        return Err(CheckInFailure::Forbidden(
            "Only teaching staff can manage attendance sessions".into(),
        ));
    }

    request.extensions_mut().insert(claims);
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest);
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim_start());
        }
    }
    None
}

async fn authenticate_request(
    headers: &axum::http::HeaderMap,
    state: &AppState,
) -> Result<(Claims, User), CheckInFailure> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .filter(|token| !token.is_empty())
        .ok_or(CheckInFailure::Unauthenticated)?;

    let claims = verify_access_token(token, &state.config.jwt_secret)
        .map_err(|_| CheckInFailure::Unauthenticated)?;
    let user_id: UserId = claims
        .sub
        .parse()
        .map_err(|_| CheckInFailure::Unauthenticated)?;

    let user = state
        .repositories
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load user for token: {:?}", e);
            CheckInFailure::from(e)
        })?
        .ok_or(CheckInFailure::Unauthenticated)?;

    Ok((claims, user))
}
