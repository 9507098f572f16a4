use crate::{
    api::{absences, attendance, recognition},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Per-IP limiters, built once and shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    protected: Limiter,
    identify: Limiter,
}

fn build_limiter(requests_per_min: u32) -> Result<Limiter> {
    let per_ms = if requests_per_min == 0 {
        1
    } else {
        60_000 / requests_per_min as u64
    };
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit: {requests_per_min} requests/min"))?;
    Ok(Arc::new(Governor::new(&cfg)))
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            protected: build_limiter(config.rate_protected_per_min)?,
            identify: build_limiter(config.rate_identify_per_min)?,
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/sessions/{session_id}")
                    // /sessions/{id}/identify
                    .service(
                        web::resource("/identify")
                            .wrap(limiters.identify.clone())
                            .route(web::post().to(recognition::identify)),
                    )
                    // /sessions/{id}/presences
                    .service(
                        web::resource("/presences")
                            .route(web::post().to(attendance::record_presence)),
                    )
                    // /sessions/{id}/close
                    .service(
                        web::resource("/close").route(web::put().to(attendance::close_session)),
                    )
                    // /sessions/{id}/attendance
                    .service(
                        web::resource("/attendance")
                            .route(web::get().to(attendance::attendance_sheet)),
                    )
                    // /sessions/{id}/absences
                    .service(
                        web::resource("/absences")
                            .route(web::get().to(absences::session_absences)),
                    ),
            )
            .service(
                web::scope("/absences")
                    // /absences?state=
                    .service(web::resource("").route(web::get().to(absences::list_absences)))
                    // /absences/{id}
                    .service(web::resource("/{id}").route(web::get().to(absences::get_absence)))
                    // /absences/{id}/reviews
                    .service(
                        web::resource("/{id}/reviews").route(web::get().to(absences::review_trail)),
                    )
                    // /absences/{id}/evidence
                    .service(
                        web::resource("/{id}/evidence")
                            .route(web::post().to(absences::submit_evidence)),
                    )
                    // /absences/{id}/evidence/upload
                    .service(
                        web::resource("/{id}/evidence/upload")
                            .route(web::post().to(absences::upload_evidence)),
                    )
                    // /absences/{id}/decision
                    .service(
                        web::resource("/{id}/decision").route(web::put().to(absences::decide)),
                    )
                    // /absences/{id}/approve
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(absences::approve)),
                    )
                    // /absences/{id}/reject
                    .service(
                        web::resource("/{id}/reject").route(web::put().to(absences::reject)),
                    ),
            ),
    );
}

// CLASSROOM FLOW
//  ├─ POST /sessions/{id}/identify   photo -> matched student (or no match)
//  ├─ POST /sessions/{id}/presences  confirm / manual presence
//  └─ PUT  /sessions/{id}/close      everyone else -> pending absence

// JUSTIFICATION
//  └─ POST /absences/{id}/evidence -> PUT /absences/{id}/decision
