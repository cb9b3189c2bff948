//! REST layer: axum handlers and the DTO <-> domain mapping.
//!
//! All domain errors are recovered here and turned into structured JSON
//! responses; nothing propagates past the request boundary.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use shared::{
    AttendanceDayResponse, AttendanceEventDto, AttendanceScanRequest, AttendanceScanResponse,
    ChildDto, ChildListResponse, ErrorResponse, RegisterChildRequest, ScanAction,
    UpdateChildRequest,
};

use crate::auth::{bearer_token, AuthVerifier};
use crate::domain::commands::attendance::ProcessScanCommand;
use crate::domain::commands::child::{
    DeactivateChildCommand, GetChildCommand, RegisterChildCommand, UpdateChildCommand,
};
use crate::domain::models::attendance::{AttendanceError, AttendanceEvent, ScanOutcome};
use crate::domain::models::child::Child;
use crate::domain::{AttendanceService, ChildService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub child_service: ChildService,
    pub attendance_service: AttendanceService,
    pub auth: Arc<dyn AuthVerifier>,
}

impl AppState {
    pub fn new(
        child_service: ChildService,
        attendance_service: AttendanceService,
        auth: Arc<dyn AuthVerifier>,
    ) -> Self {
        Self {
            child_service,
            attendance_service,
            auth,
        }
    }
}

/// Build the junior-church API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/junior-church/attendance",
            get(get_attendance).post(post_attendance),
        )
        .route(
            "/junior-church/children",
            get(list_children).post(register_child),
        )
        .route(
            "/junior-church/children/:id",
            put(update_child).get(get_child).delete(deactivate_child),
        )
        .route(
            "/junior-church/children/barcode/:token",
            get(resolve_barcode),
        )
        .with_state(state)
}

fn error_body(message: impl Into<String>) -> Json<ErrorResponse> {
    Json(ErrorResponse {
        success: false,
        message: message.into(),
    })
}

fn child_to_dto(child: &Child) -> ChildDto {
    ChildDto {
        id: child.id.clone(),
        first_name: child.first_name.clone(),
        last_name: child.last_name.clone(),
        date_of_birth: child.birthdate.format("%Y-%m-%d").to_string(),
        authorized_releasers: child.authorized_releasers.clone(),
        allergies: child.allergies.clone(),
        medical_notes: child.medical_notes.clone(),
        barcode_id: child.barcode_id.clone(),
        is_active: child.is_active,
    }
}

fn event_to_dto(event: &AttendanceEvent, child_name: String) -> AttendanceEventDto {
    AttendanceEventDto {
        id: event.id.clone(),
        child_id: event.child_id.clone(),
        child_name,
        date: event.date.format("%Y-%m-%d").to_string(),
        status: event.status.as_str().to_string(),
        dropoff_time: event.dropoff_time.to_rfc3339(),
        dropoff_by: event.dropoff_by.clone(),
        pickup_time: event.pickup_time.map(|t| t.to_rfc3339()),
        picked_up_by: event.picked_up_by.clone(),
        override_used: event.override_used,
        verified_by: event.verified_by.clone(),
    }
}

/// Query parameters for the attendance day view
#[derive(Deserialize, Debug)]
pub struct AttendanceQuery {
    /// Calendar day (YYYY-MM-DD); defaults to today
    pub date: Option<String>,
}

/// GET /junior-church/attendance?date=YYYY-MM-DD
pub async fn get_attendance(
    State(state): State<AppState>,
    Query(query): Query<AttendanceQuery>,
) -> Response {
    info!("GET /junior-church/attendance - query: {:?}", query);

    let date = match &query.date {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    error_body("Invalid date; use YYYY-MM-DD"),
                )
                    .into_response();
            }
        },
        None => chrono::Local::now().date_naive(),
    };

    let day = match state.attendance_service.events_for_date(date) {
        Ok(day) => day,
        Err(e) => {
            error!("Error listing attendance: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Error listing attendance"),
            )
                .into_response();
        }
    };

    let children = match state.child_service.list_children() {
        Ok(result) => result.children,
        Err(e) => {
            error!("Error listing children: {:?}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Error listing attendance"),
            )
                .into_response();
        }
    };

    let events = day
        .events
        .iter()
        .map(|event| {
            let name = children
                .iter()
                .find(|c| c.id == event.child_id)
                .map(|c| c.full_name())
                .unwrap_or_default();
            event_to_dto(event, name)
        })
        .collect();

    let response = AttendanceDayResponse {
        date: date.format("%Y-%m-%d").to_string(),
        events,
    };

    (StatusCode::OK, Json(response)).into_response()
}

/// POST /junior-church/attendance
pub async fn post_attendance(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AttendanceScanRequest>,
) -> Response {
    info!(
        "POST /junior-church/attendance - barcode: {}, action: {:?}",
        request.barcode_id, request.action
    );

    let staff = bearer_token(&headers).and_then(|token| state.auth.verify(token));

    let override_requested = matches!(
        request.action,
        ScanAction::Pickup {
            override_requested: true
        }
    );

    let command = ProcessScanCommand {
        barcode_id: request.barcode_id.clone(),
        date: chrono::Local::now().date_naive(),
        actor_name: request.person_name.clone(),
        override_requested,
        verified_by: staff.map(|user| user.id),
    };

    // Retry the read-decide-write cycle once on a concurrency conflict
    // before surfacing it to staff.
    let result = match state.attendance_service.process_scan(command.clone()) {
        Err(AttendanceError::ConcurrencyConflict) => {
            state.attendance_service.process_scan(command)
        }
        other => other,
    };

    match result {
        Ok(ScanOutcome::DroppedOff { event }) => {
            let response = AttendanceScanResponse {
                success: true,
                message: format!("Drop-off recorded by {}", event.dropoff_by),
                requires_override: None,
                authorized_persons: None,
                was_override: None,
            };
            (StatusCode::CREATED, Json(response)).into_response()
        }
        Ok(ScanOutcome::PickedUp { event, was_override }) => {
            let picked_up_by = event.picked_up_by.unwrap_or_default();
            let message = if was_override {
                format!("Override pickup recorded for {}", picked_up_by)
            } else {
                format!("Pickup recorded by {}", picked_up_by)
            };
            let response = AttendanceScanResponse {
                success: true,
                message,
                requires_override: None,
                authorized_persons: None,
                was_override: was_override.then_some(true),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(ScanOutcome::RequiresOverride { authorized_releasers }) => {
            let response = AttendanceScanResponse {
                success: false,
                message: "Pickup person is not on the authorized list".to_string(),
                requires_override: Some(true),
                authorized_persons: Some(authorized_releasers),
                was_override: None,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => scan_error_response(e),
    }
}

fn scan_error_response(error: AttendanceError) -> Response {
    match error {
        AttendanceError::UnknownBarcode(_) => (
            StatusCode::NOT_FOUND,
            error_body("Barcode not recognized; please check and retry"),
        )
            .into_response(),
        AttendanceError::AlreadyPickedUp => {
            (StatusCode::CONFLICT, error_body(error.to_string())).into_response()
        }
        AttendanceError::ConcurrencyConflict => {
            (StatusCode::CONFLICT, error_body(error.to_string())).into_response()
        }
        AttendanceError::MissingVerifier => (
            StatusCode::UNPROCESSABLE_ENTITY,
            error_body(error.to_string()),
        )
            .into_response(),
        AttendanceError::Storage(e) => {
            error!("Storage error processing scan: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Error processing scan"),
            )
                .into_response()
        }
    }
}

/// GET /junior-church/children
pub async fn list_children(State(state): State<AppState>) -> Response {
    match state.child_service.list_children() {
        Ok(result) => {
            let response = ChildListResponse {
                children: result.children.iter().map(child_to_dto).collect(),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            error!("Error listing children: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Error listing children"),
            )
                .into_response()
        }
    }
}

/// POST /junior-church/children
pub async fn register_child(
    State(state): State<AppState>,
    Json(request): Json<RegisterChildRequest>,
) -> Response {
    info!(
        "POST /junior-church/children - {} {}",
        request.first_name, request.last_name
    );

    let command = RegisterChildCommand {
        first_name: request.first_name,
        last_name: request.last_name,
        birthdate: request.date_of_birth,
        authorized_releasers: request.authorized_releasers,
        allergies: request.allergies,
        medical_notes: request.medical_notes,
        barcode_id: request.barcode_id,
    };

    match state.child_service.register_child(command) {
        Ok(result) => {
            (StatusCode::CREATED, Json(child_to_dto(&result.child))).into_response()
        }
        Err(e) => (StatusCode::BAD_REQUEST, error_body(e.to_string())).into_response(),
    }
}

/// GET /junior-church/children/:id
pub async fn get_child(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.child_service.get_child(GetChildCommand { child_id: id }) {
        Ok(result) => match result.child {
            Some(child) => (StatusCode::OK, Json(child_to_dto(&child))).into_response(),
            None => (StatusCode::NOT_FOUND, error_body("Child not found")).into_response(),
        },
        Err(e) => {
            error!("Error getting child: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Error getting child"),
            )
                .into_response()
        }
    }
}

/// PUT /junior-church/children/:id
pub async fn update_child(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateChildRequest>,
) -> Response {
    let command = UpdateChildCommand {
        child_id: id,
        first_name: request.first_name,
        last_name: request.last_name,
        birthdate: request.date_of_birth,
        authorized_releasers: request.authorized_releasers,
        allergies: request.allergies,
        medical_notes: request.medical_notes,
    };

    match state.child_service.update_child(command) {
        Ok(result) => (StatusCode::OK, Json(child_to_dto(&result.child))).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, error_body(e.to_string())).into_response(),
    }
}

/// DELETE /junior-church/children/:id — deactivation, not a hard delete
pub async fn deactivate_child(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state
        .child_service
        .deactivate_child(DeactivateChildCommand { child_id: id })
    {
        Ok(result) => (StatusCode::OK, Json(child_to_dto(&result.child))).into_response(),
        Err(e) => (StatusCode::NOT_FOUND, error_body(e.to_string())).into_response(),
    }
}

/// GET /junior-church/children/barcode/:token
pub async fn resolve_barcode(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    match state.child_service.resolve_barcode(&token) {
        Ok(Some(child)) => (StatusCode::OK, Json(child_to_dto(&child))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_body("Barcode not recognized; please check and retry"),
        )
            .into_response(),
        Err(e) => {
            error!("Error resolving barcode: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("Error resolving barcode"),
            )
                .into_response()
        }
    }
}
