use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest,
    dev::Payload,
    error::{ErrorInternalServerError, ErrorUnauthorized},
    http::header::AUTHORIZATION,
    web::Data,
};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

/// Why a bearer header could not be turned into an [`AuthUser`].
#[derive(Debug, Clone, PartialEq)]
pub enum AuthRejection {
    MissingHeader,
    NotBearer,
    InvalidToken(String),
    UnknownRole(u8),
}

impl AuthRejection {
    pub fn message(&self) -> String {
        match self {
            AuthRejection::MissingHeader => "Missing Authorization header".into(),
            AuthRejection::NotBearer => "Authorization header must start with Bearer".into(),
            AuthRejection::InvalidToken(details) => format!("Invalid or expired token: {details}"),
            AuthRejection::UnknownRole(id) => format!("Unknown role {id}"),
        }
    }
}

impl AuthUser {
    /// Resolves the caller from the raw `Authorization` header value.
    pub fn from_header(header: Option<&str>, secret: &str) -> Result<Self, AuthRejection> {
        let token = header
            .ok_or(AuthRejection::MissingHeader)?
            .strip_prefix("Bearer ")
            .ok_or(AuthRejection::NotBearer)?;

        let claims = verify_token(token, secret).map_err(AuthRejection::InvalidToken)?;
        let role = Role::from_id(claims.role).ok_or(AuthRejection::UnknownRole(claims.role))?;

        Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
        })
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // already resolved by auth_middleware
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(ErrorInternalServerError("App config missing")));
        };

        let header = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        ready(
            AuthUser::from_header(header, &config.jwt_secret)
                .map_err(|rejection| ErrorUnauthorized(rejection.message())),
        )
    }
}

impl AuthUser {
    /// Identification, presence recording and closeout.
    pub fn require_instructor_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Instructor) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Instructor/Admin only"))
        }
    }

    /// Justification decisions.
    pub fn require_reviewer(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::ProgramLead) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Program lead/Admin only"))
        }
    }

    /// For students, the only student id whose records they may see.
    pub fn student_scope(&self) -> Option<u64> {
        self.is_student().then_some(self.user_id)
    }

    /// Evidence is submitted by the absent student, or by an admin on their behalf.
    pub fn require_owner_or_admin(&self, student_id: u64) -> actix_web::Result<()> {
        if self.role == Role::Admin || (self.is_student() && self.user_id == student_id) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Only the absent student may submit evidence"))
        }
    }

    pub fn require_staff(&self) -> actix_web::Result<()> {
        if self.is_student() {
            Err(actix_web::error::ErrorForbidden("Staff only"))
        } else {
            Ok(())
        }
    }

    /// Returns true if the user is a student
    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}
