use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use crates::domain::value_objects::request_context::{CORRELATION_ID_HEADER, RequestContext};
use std::convert::Infallible;

use crate::auth::AuthSettings;

/// Builds the [`RequestContext`] for a handler: correlation id from the
/// `x-correlation-id` header and the optional bearer subject.
pub struct RequestScope(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for RequestScope
where
    AuthSettings: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthSettings::from_ref(state);
        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        let subject = auth.subject_from_headers(&parts.headers);

        Ok(RequestScope(RequestContext::from_header(correlation_id, subject)))
    }
}
