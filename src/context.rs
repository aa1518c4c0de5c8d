use actix_web::{dev::Payload, error::ErrorUnauthorized, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};

/// Header carrying the id of the already-authenticated caller.
pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Copy)]
pub struct UserInfo {
    pub id: i32,
}

impl FromRequest for UserInfo {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let id = req.headers().get(USER_ID_HEADER).and_then(|v| v.to_str().ok()).and_then(|v| v.trim().parse::<i32>().ok());
        match id {
            Some(id) => ready(Ok(UserInfo { id })),
            None => ready(Err(ErrorUnauthorized("missing or invalid user id header"))),
        }
    }
}
