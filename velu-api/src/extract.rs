//! A `Json` extractor wrapper that reports malformed bodies the way the rest of this
//! service reports errors: `{"detail": "..."}`, not axum's default plain-text rejection.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ApiError::InvalidArgument(describe(rejection))),
        }
    }
}

fn describe(rejection: JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(error) => format!("invalid request body: {error}"),
        JsonRejection::JsonSyntaxError(error) => format!("malformed json: {error}"),
        JsonRejection::MissingJsonContentType(_) => "expected content-type: application/json".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request as HttpRequest};
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[allow(dead_code)]
        a: i64,
    }

    #[tokio::test]
    async fn malformed_json_is_an_invalid_argument() {
        let req = HttpRequest::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let result = AppJson::<Sample>::from_request(req, &()).await;
        assert!(matches!(result, Err(ApiError::InvalidArgument(_))));
    }
}
