use crate::auth::auth::AuthUser;
use crate::reconcile;
use crate::store::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Deserialize, ToSchema)]
pub struct RecordPresence {
    #[schema(example = 42)]
    pub student_id: u64,
}

/// Record a presence (manual marking or confirmation of a match)
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/presences",
    params(
        ("session_id" = u64, Path, description = "Session to record the presence in")
    ),
    request_body = RecordPresence,
    responses(
        (status = 201, description = "Presence recorded", body = PresenceRecorded),
        (status = 200, description = "Presence was already recorded", body = PresenceRecorded),
        (status = 400, description = "Student not enrolled in the course"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session closed or student already marked absent", body = Object, example = json!({
            "message": "Session 7 is closed"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn record_presence(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<RecordPresence>,
) -> actix_web::Result<impl Responder> {
    auth.require_instructor_or_admin()?;

    let session_id = path.into_inner();
    let recorded = reconcile::record_presence(store.get_ref(), session_id, payload.student_id).await?;

    if recorded.created {
        Ok(HttpResponse::Created().json(recorded))
    } else {
        Ok(HttpResponse::Ok().json(recorded))
    }
}

/// Close a session and mark every unrecorded roster student absent
#[utoipa::path(
    put,
    path = "/api/sessions/{session_id}/close",
    params(
        ("session_id" = u64, Path, description = "Session to close out")
    ),
    responses(
        (status = 200, description = "Session closed; safe to repeat", body = CloseoutSummary),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found", body = Object, example = json!({
            "message": "Session 7 not found"
        }))
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn close_session(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_instructor_or_admin()?;

    let session_id = path.into_inner();
    tracing::info!(session_id, user_id = auth.user_id, user = %auth.username, "Closeout requested");

    let summary = reconcile::close_session(store.get_ref(), session_id).await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// Present / absent / undetermined roster students of a session
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}/attendance",
    params(
        ("session_id" = u64, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Attendance sheet", body = AttendanceSheet),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn attendance_sheet(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let sheet = reconcile::attendance_sheet(store.get_ref(), path.into_inner()).await?;

    Ok(HttpResponse::Ok().json(sheet))
}
