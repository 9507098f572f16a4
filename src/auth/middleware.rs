use crate::auth::auth::AuthUser;
use crate::config::Config;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    web::Data,
};
use serde_json::json;
use tracing::debug;

/// Resolves the caller once per request and stores it as an [`AuthUser`]
/// extension; unauthenticated requests stop here with 401.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App config missing"))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .map(|h| h.to_str())
        .transpose()
        .map_err(|_| {
            actix_web::error::ErrorUnauthorized(json!({
                "message": "Invalid Authorization header encoding"
            }))
        })?;

    match AuthUser::from_header(header, &config.jwt_secret) {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.call(req).await
        }
        Err(rejection) => {
            debug!(path = %req.path(), reason = ?rejection, "Request rejected");
            let resp = HttpResponse::Unauthorized().json(json!({ "message": rejection.message() }));
            Ok(req.into_response(resp.map_into_boxed_body()))
        }
    }
}
