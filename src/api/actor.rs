use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::models::{Actor, ClassScope, Role};

pub const ACTOR_ID: &str = "x-actor-id";
pub const ACTOR_ROLE: &str = "x-actor-role";
pub const ACTOR_PROGRAM: &str = "x-actor-program";
pub const ACTOR_GROUP: &str = "x-actor-group";

/// The caller as identified by the authentication layer in front of us.
///
/// Representatives and students carry their class in `x-actor-program`
/// and `x-actor-group`; without both they own no class.
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let id = header(headers, ACTOR_ID)?
            .ok_or_else(|| AppError::Forbidden(format!("missing {ACTOR_ID} header")))?;
        let role = header(headers, ACTOR_ROLE)?
            .ok_or_else(|| AppError::Forbidden(format!("missing {ACTOR_ROLE} header")))?
            .parse::<Role>()?;

        let class = match (header(headers, ACTOR_PROGRAM)?, header(headers, ACTOR_GROUP)?) {
            (Some(program_id), Some(group)) => Some(ClassScope {
                program_id,
                group: group
                    .parse::<u32>()
                    .map_err(|_| AppError::BadRequest(format!("{ACTOR_GROUP} must be a number")))?,
            }),
            _ => None,
        };

        Ok(Actor { id, role, class })
    }
}

fn header(headers: &HeaderMap, name: &str) -> Result<Option<String>, AppError> {
    match headers.get(name) {
        None => Ok(None),
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| AppError::BadRequest(format!("{name} is not valid text")))?
                .trim();
            Ok((!value.is_empty()).then(|| value.to_string()))
        }
    }
}
