use crate::model::role::Role;
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, HttpResponse, dev::Payload, error::InternalError,
};
use futures::future::{Ready, ready};
use serde_json::json;

/// Caller identity, put into the request extensions by `auth_middleware`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match req.extensions().get::<AuthUser>() {
            Some(user) => ready(Ok(user.clone())),
            None => ready(Err(unauthorized("Missing or invalid token"))),
        }
    }
}

impl AuthUser {
    pub fn require_hr(&self) -> actix_web::Result<()> {
        if self.role.is_hr() {
            Ok(())
        } else {
            tracing::warn!(user = %self.username, role = %self.role, "HR-only route refused");
            Err(forbidden("HR only"))
        }
    }

    pub fn is_hr(&self) -> bool {
        self.role.is_hr()
    }
}

pub fn unauthorized(message: &'static str) -> actix_web::Error {
    InternalError::from_response(
        message,
        HttpResponse::Unauthorized().json(json!({
            "error": "unauthorized",
            "message": message
        })),
    )
    .into()
}

pub fn forbidden(message: &'static str) -> actix_web::Error {
    InternalError::from_response(
        message,
        HttpResponse::Forbidden().json(json!({
            "error": "forbidden",
            "message": message
        })),
    )
    .into()
}
