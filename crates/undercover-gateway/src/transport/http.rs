//! Plain HTTP endpoints and the JSON error body they share.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use undercover_core::error::UndercoverError;
use undercover_core::protocol::messages::{CreateRoomRequest, CreateRoomResponse};

use crate::app_state::AppState;

/// HTTP face of [`UndercoverError`]: `{ "error": CODE, "message": text }`.
#[derive(Debug)]
pub struct ApiError(pub UndercoverError);

impl From<UndercoverError> for ApiError {
    fn from(e: UndercoverError) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            UndercoverError::BadRequest(_)
            | UndercoverError::InvalidData(_)
            | UndercoverError::UnsupportedVersion => StatusCode::BAD_REQUEST,
            UndercoverError::NotAllowed(_) => StatusCode::FORBIDDEN,
            UndercoverError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            UndercoverError::WrongStage { .. }
            | UndercoverError::NotYourTurn
            | UndercoverError::JoinRejected(_) => StatusCode::CONFLICT,
            UndercoverError::RoomBusy => StatusCode::SERVICE_UNAVAILABLE,
            UndercoverError::JoinTimeout => StatusCode::GATEWAY_TIMEOUT,
            UndercoverError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

/// `POST /api/v1/rooms/create`
pub async fn create_room(
    State(app): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    if app.is_draining() {
        return Err(ApiError(UndercoverError::Internal("server is draining".into())));
    }
    let created = app.registry().create_room(req).await?;
    Ok(Json(created))
}
