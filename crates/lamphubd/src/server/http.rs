//! Operator HTTP API.
//!
//! | Route                       | Effect                                   |
//! |-----------------------------|------------------------------------------|
//! | `GET  /devices`             | list device records                      |
//! | `POST /command`             | forward a command to a device            |
//! | `GET  /ws`                  | operator observer stream                 |
//! | `POST /set_device_online`   | mark a device online (device selected)   |
//! | `POST /add_device_detector` | record that discovery was started        |
//! | `POST /enter_device`        | record that a device screen was opened   |
//!
//! Every error body is `{"status": "error", "message": ...}`.

use std::any::Any;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use lamphub_core::{DeviceName, DeviceStatus, DeviceUpdate};
use lamphub_protocol::{
    ApiResponse, CommandRequest, DeviceListResponse, DeviceNameRequest,
};
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use super::observer::operator_ws;
use crate::events::HubEvent;
use crate::hub::Hub;

/// Error returned by an HTTP handler.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ApiResponse::error(self.to_string()))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

type ApiResult = Result<Json<ApiResponse>, ApiError>;

/// Router served on the operator port.
pub fn operator_router(hub: Hub) -> Router {
    let routes = Router::new()
        .route("/devices", get(list_devices))
        .route("/command", post(send_command))
        .route("/ws", get(operator_ws))
        .route("/set_device_online", post(set_device_online))
        .route("/add_device_detector", post(add_device_detector))
        .route("/enter_device", post(enter_device))
        .with_state(hub);
    with_api_layers(routes)
}

/// Applies permissive CORS and turns handler panics into JSON 500s.
pub fn with_api_layers(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(CorsLayer::permissive())
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!(panic = %detail, "HTTP handler panicked");
    ApiError::Internal(format!("Internal server error: {detail}")).into_response()
}

async fn list_devices(State(hub): State<Hub>) -> Json<DeviceListResponse> {
    Json(DeviceListResponse {
        devices: hub.registry.devices().await,
    })
}

async fn send_command(
    State(hub): State<Hub>,
    body: Result<Json<CommandRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body?;
    let Some((device, command)) = request.fields() else {
        return Err(ApiError::BadRequest(
            "Missing 'device' or 'command'.".to_string(),
        ));
    };

    let device = DeviceName::new(device);
    match hub.dispatcher.send_command(&device, command).await {
        Ok(message) => Ok(Json(ApiResponse::success(message))),
        Err(e) => Err(ApiError::BadRequest(e.to_string())),
    }
}

async fn set_device_online(
    State(hub): State<Hub>,
    body: Result<Json<DeviceNameRequest>, JsonRejection>,
) -> ApiResult {
    let device = required_device_name(body)?;

    if !hub
        .registry
        .update(&device, &DeviceUpdate::status(DeviceStatus::Online))
        .await
    {
        warn!(device = %device, "Cannot set unknown device online");
        return Err(ApiError::NotFound(format!("Device '{device}' not found.")));
    }
    info!(device = %device, "Device is now online");

    hub.bus
        .publish(HubEvent::DeviceSelected {
            device: device.clone(),
        })
        .await;
    hub.bus.publish(HubEvent::DevicesChanged).await;

    Ok(Json(ApiResponse::success(format!(
        "Device '{device}' is now online."
    ))))
}

async fn add_device_detector(State(hub): State<Hub>) -> ApiResult {
    hub.bus.publish(HubEvent::AddDeviceRequested).await;
    Ok(Json(ApiResponse::success("Task 2 (Add Device) completed.")))
}

async fn enter_device(
    State(hub): State<Hub>,
    body: Result<Json<DeviceNameRequest>, JsonRejection>,
) -> ApiResult {
    let device = required_device_name(body)?;

    hub.bus
        .publish(HubEvent::DeviceEntered {
            device: device.clone(),
        })
        .await;

    Ok(Json(ApiResponse::success(format!(
        "User entered device '{device}'."
    ))))
}

fn required_device_name(
    body: Result<Json<DeviceNameRequest>, JsonRejection>,
) -> Result<DeviceName, ApiError> {
    let Json(request) = body?;
    request
        .device_name()
        .map(DeviceName::new)
        .ok_or_else(|| ApiError::BadRequest("Missing 'device_name'.".to_string()))
}
