use crate::auth::auth::AuthUser;
use crate::error::CoreError;
use crate::justification::{self, DecisionRequest};
use crate::media::HttpObjectStore;
use crate::model::absence::Justification;
use crate::reconcile::load_session;
use crate::store::{AttendanceStore, MySqlStore};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, IntoParams)]
pub struct AbsenceQuery {
    /// pending | justified | rejected (default pending)
    pub state: Option<Justification>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitEvidence {
    #[schema(example = "https://files.example.org/justifications/medical-note.pdf")]
    pub file_ref: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewComment {
    #[schema(example = "Medical certificate checked", nullable = true)]
    pub comment: Option<String>,
}

/// Get a single absence
#[utoipa::path(
    get,
    path = "/api/absences/{id}",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    responses(
        (status = 200, description = "Absence with student and session", body = AbsenceView),
        (status = 401, description = "Unauthorized"),
                (status = 404, description = "Absence not found (or not the caller's own)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn get_absence(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let absence =
        justification::load_visible_absence(store.get_ref(), path.into_inner(), auth.student_scope())
            .await?;

    let view = justification::absence_view(store.get_ref(), absence).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Absences recorded for a session
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}/absences",
    params(
        ("session_id" = u64, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Absences of the session", body = [AbsenceView]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn session_absences(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let session_id = path.into_inner();
    load_session(store.get_ref(), session_id).await?;

    let absences = store
        .absences_for_session(session_id)
        .await
        .map_err(CoreError::from)?;
    let views = justification::absence_views(store.get_ref(), absences).await?;

    Ok(HttpResponse::Ok().json(views))
}

/// List absences by review state
#[utoipa::path(
    get,
    path = "/api/absences",
    params(AbsenceQuery),
    responses(
        (status = 200, description = "Absences in the requested state", body = [AbsenceView]),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn list_absences(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    query: web::Query<AbsenceQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_staff()?;

    let state = query.state.unwrap_or_default();
    let absences = store
        .absences_by_state(state)
        .await
        .map_err(CoreError::from)?;
    let views = justification::absence_views(store.get_ref(), absences).await?;

    Ok(HttpResponse::Ok().json(views))
}

/// Submission and decision history of an absence
#[utoipa::path(
    get,
    path = "/api/absences/{id}/reviews",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    responses(
        (status = 200, description = "Review trail, oldest first", body = [AbsenceReview]),
        (status = 401, description = "Unauthorized"),
                (status = 404, description = "Absence not found (or not the caller's own)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn review_trail(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let absence =
        justification::load_visible_absence(store.get_ref(), path.into_inner(), auth.student_scope())
            .await?;

    let trail = justification::review_trail(store.get_ref(), absence.id).await?;
    Ok(HttpResponse::Ok().json(trail))
}

/// Attach an already-stored evidence file to an absence
#[utoipa::path(
    post,
    path = "/api/absences/{id}/evidence",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    request_body = SubmitEvidence,
    responses(
        (status = 200, description = "Evidence attached; absence back to pending", body = Absence),
        (status = 400, description = "Missing file reference"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the absent student may submit evidence"),
        (status = 404, description = "Absence not found (or not the caller's own)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn submit_evidence(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<SubmitEvidence>,
) -> actix_web::Result<impl Responder> {
    let absence =
        justification::load_visible_absence(store.get_ref(), path.into_inner(), auth.student_scope())
            .await?;
    auth.require_owner_or_admin(absence.student_id)?;

    let updated =
        justification::submit_evidence(store.get_ref(), absence.id, &payload.file_ref, auth.user_id)
            .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Upload an evidence file and attach it to an absence
#[utoipa::path(
    post,
    path = "/api/absences/{id}/evidence/upload",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    request_body(content = String, content_type = "application/octet-stream", description = "Evidence file (pdf or image)"),
    responses(
        (status = 200, description = "Evidence uploaded; absence back to pending", body = Absence),
        (status = 400, description = "No file provided"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Only the absent student may submit evidence"),
        (status = 404, description = "Absence not found (or not the caller's own)"),
        (status = 503, description = "Object store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn upload_evidence(
    auth: AuthUser,
    req: HttpRequest,
    store: web::Data<MySqlStore>,
    objects: web::Data<HttpObjectStore>,
    path: web::Path<u64>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    let absence =
        justification::load_visible_absence(store.get_ref(), path.into_inner(), auth.student_scope())
            .await?;
    auth.require_owner_or_admin(absence.student_id)?;

    let content_type = req
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");

    let updated = justification::upload_evidence(
        store.get_ref(),
        objects.get_ref(),
        absence.id,
        content_type,
        body.to_vec(),
        auth.user_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Approve or reject a justification
#[utoipa::path(
    put,
    path = "/api/absences/{id}/decision",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    request_body = DecisionRequest,
    responses(
        (status = 200, description = "Decision recorded", body = Absence),
        (status = 400, description = "Missing rejection comment, or nothing to approve", body = Object, example = json!({
            "message": "Absence 3 has no evidence; a comment is required to approve it"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Program lead/Admin only"),
        (status = 404, description = "Absence not found (or not the caller's own)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn decide(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<DecisionRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_reviewer()?;
    payload.validate()?;

    let updated = justification::decide(
        store.get_ref(),
        path.into_inner(),
        payload.approve,
        payload.comment.as_deref(),
        auth.user_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Approve a justification
#[utoipa::path(
    put,
    path = "/api/absences/{id}/approve",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    request_body = ReviewComment,
    responses(
        (status = 200, description = "Justification approved", body = Absence),
        (status = 400, description = "Nothing to approve"),
        (status = 403, description = "Program lead/Admin only"),
        (status = 404, description = "Absence not found (or not the caller's own)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn approve(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<ReviewComment>,
) -> actix_web::Result<impl Responder> {
    auth.require_reviewer()?;

    let updated = justification::approve(
        store.get_ref(),
        path.into_inner(),
        payload.comment.as_deref(),
        auth.user_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(updated))
}

/// Reject a justification
#[utoipa::path(
    put,
    path = "/api/absences/{id}/reject",
    params(
        ("id" = u64, Path, description = "Absence id")
    ),
    request_body = ReviewComment,
    responses(
        (status = 200, description = "Justification rejected", body = Absence),
        (status = 400, description = "Comment is required"),
        (status = 403, description = "Program lead/Admin only"),
        (status = 404, description = "Absence not found (or not the caller's own)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Absences"
)]
pub async fn reject(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    path: web::Path<u64>,
    payload: web::Json<ReviewComment>,
) -> actix_web::Result<impl Responder> {
    auth.require_reviewer()?;

    let request = DecisionRequest {
        approve: false,
        comment: payload.into_inner().comment,
    };
    request.validate()?;

    let comment = request.comment.as_deref().unwrap_or_default();
    let updated = justification::reject(store.get_ref(), path.into_inner(), comment, auth.user_id).await?;

    Ok(HttpResponse::Ok().json(updated))
}
