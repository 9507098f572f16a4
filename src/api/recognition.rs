use crate::auth::auth::AuthUser;
use crate::recognition::{self, ImageSource, Matcher};
use crate::store::MySqlStore;
use actix_web::{HttpResponse, Responder, web};
use serde::Deserialize;
use tracing::instrument;
use utoipa::IntoParams;

#[derive(Deserialize, IntoParams)]
pub struct IdentifyQuery {
    /// Course whose roster is searched
    #[param(example = 3)]
    pub course_id: u64,
}

/// Identify the student in a photo taken during a session
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/identify",
    params(
        ("session_id" = u64, Path, description = "Session the photo was taken in"),
        IdentifyQuery
    ),
    request_body(
        content = String,
        description = "Probe photo (JPEG/PNG bytes)",
        content_type = "application/octet-stream"
    ),
    responses(
        (status = 200, description = "Identification outcome (matched or not)", body = IdentifyResponse),
        (status = 400, description = "Empty photo or session not in course", body = Object, example = json!({
            "message": "Session 7 does not belong to course 4"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Session or course not found"),
        (status = 422, description = "No face detected, take another photo", body = Object, example = json!({
            "message": "No face detected in the submitted photo, please take another one"
        })),
        (status = 503, description = "Feature extractor unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Recognition"
)]
#[instrument(name = "identify", skip_all, fields(course_id = query.course_id))]
pub async fn identify(
    auth: AuthUser,
    store: web::Data<MySqlStore>,
    matcher: web::Data<Matcher>,
    path: web::Path<u64>,
    query: web::Query<IdentifyQuery>,
    body: web::Bytes,
) -> actix_web::Result<impl Responder> {
    auth.require_instructor_or_admin()?;

    if body.is_empty() {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "No photo provided"
        })));
    }

    let session_id = path.into_inner();
    let probe = ImageSource::Bytes(body.to_vec());

    let result = recognition::identify(
        store.get_ref(),
        matcher.get_ref(),
        &probe,
        query.course_id,
        session_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(result))
}
