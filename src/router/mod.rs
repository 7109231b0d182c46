//! HTTP routes, their access level and the DTO extractors.
pub mod apple;
pub mod posts;
pub mod status;
pub mod users;

use std::collections::HashMap;

use axum::Json;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodRouter, delete, get, patch, post};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::AppState;
use crate::dto::{self, Dto, Source};
use crate::error::ServerError;

/// Whether a route may be called without a bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
}

/// Method and path binding of a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub method: Method,
    pub path: &'static str,
    pub access: Access,
}

impl Route {
    pub fn public(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            access: Access::Public,
        }
    }

    pub fn authenticated(method: Method, path: &'static str) -> Self {
        Self {
            method,
            path,
            access: Access::Authenticated,
        }
    }
}

/// Access table consulted by the auth gate.
#[derive(Debug, Clone, Default)]
pub struct Routes(Vec<Route>);

impl Routes {
    pub fn new(routes: Vec<Route>) -> Self {
        Self(routes)
    }

    /// Access of a matched route. Anything not declared requires a token.
    pub fn access(&self, method: &Method, path: &str) -> Access {
        self.0
            .iter()
            .find(|route| route.method == *method && route.path == path)
            .map_or(Access::Authenticated, |route| route.access)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.0.iter()
    }
}

/// Every route of the API.
pub fn table() -> Vec<(Route, MethodRouter<AppState>)> {
    vec![
        // `GET /status.json` goes to `status`.
        (Route::public(Method::GET, "/status.json"), get(status::status)),
        // `POST /apple/auth` signs in with an Apple identity token.
        (Route::public(Method::POST, "/apple/auth"), post(apple::auth)),
        // `DELETE /apple/revoke`. Not implemented yet.
        (Route::authenticated(Method::DELETE, "/apple/revoke"), delete(apple::revoke)),
        (Route::authenticated(Method::GET, "/posts/search"), get(posts::search)),
        (Route::authenticated(Method::POST, "/posts"), post(posts::write)),
        (Route::authenticated(Method::PATCH, "/posts/{post_id}/like"), patch(posts::like)),
        (Route::authenticated(Method::GET, "/users/profile"), get(users::profile)),
        (Route::authenticated(Method::POST, "/users/follow"), post(users::follow)),
        (Route::authenticated(Method::PATCH, "/users/follow"), patch(users::toggle_follow)),
    ]
}

/// JSON body checked against its rule table.
#[derive(Debug)]
pub struct Valid<T>(pub T);

impl<S, T> FromRequest<S> for Valid<T>
where
    T: Dto + DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await?;
        Ok(Self(dto::parse(value, Source::Json)?))
    }
}

/// Query string checked against its rule table.
#[derive(Debug)]
pub struct ValidQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ValidQuery<T>
where
    T: Dto + DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<HashMap<String, String>>::from_request_parts(parts, state).await?;
        let value = Value::Object(
            raw.into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect(),
        );
        Ok(Self(dto::parse(value, Source::Query)?))
    }
}

/// JSON response checked against its rule table before serialization.
///
/// A value breaking its own rules turns into a 500.
#[derive(Debug)]
pub struct ValidJson<T> {
    value: T,
    status: StatusCode,
}

impl<T: Dto> ValidJson<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value,
            status: StatusCode::OK,
        }
    }

    pub fn created(value: T) -> Self {
        Self {
            value,
            status: StatusCode::CREATED,
        }
    }
}

impl<T: Dto> IntoResponse for ValidJson<T> {
    fn into_response(self) -> Response {
        match self.value.inspect() {
            Ok(()) => (self.status, Json(self.value)).into_response(),
            Err(errors) => ServerError::ResponseValidation(errors).into_response(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum::routing::get;
    use http_body_util::BodyExt;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::apple::{AppleIdentity, IdentityVerifier, VerifyError};
    use crate::dto::{Field, Rule};
    use crate::*;

    pub const APPLE_TOKEN: &str = "apple-identity-token";

    /// Accepts a single identity token.
    pub struct StaticVerifier;

    #[async_trait]
    impl IdentityVerifier for StaticVerifier {
        async fn verify(&self, identity_token: &str) -> Result<AppleIdentity, VerifyError> {
            if identity_token == APPLE_TOKEN {
                Ok(AppleIdentity {
                    subject: "001.jinha".into(),
                    email: "jinha@macro.test".into(),
                })
            } else {
                Err(VerifyError::UnknownKey(None))
            }
        }
    }

    /// State over the seeded store and fixture keys.
    pub fn state() -> AppState {
        AppState {
            config: Arc::new(config::Configuration::default()),
            db: database::tests::fixture(),
            token: token::tests::manager(),
            apple: Arc::new(StaticVerifier),
        }
    }

    #[test]
    fn test_access_table() {
        let routes = Routes::new(table().into_iter().map(|(route, _)| route).collect());

        assert_eq!(routes.access(&Method::POST, "/apple/auth"), Access::Public);
        assert_eq!(routes.access(&Method::GET, "/status.json"), Access::Public);
        assert_eq!(routes.access(&Method::DELETE, "/apple/revoke"), Access::Authenticated);
        assert_eq!(routes.access(&Method::GET, "/apple/auth"), Access::Authenticated);
        assert_eq!(routes.access(&Method::GET, "/unknown"), Access::Authenticated);

        let public: Vec<_> = routes
            .iter()
            .filter(|route| route.access == Access::Public)
            .map(|route| route.path)
            .collect();
        assert_eq!(public, vec!["/status.json", "/apple/auth"]);
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Broken {
        count: i64,
    }

    impl Dto for Broken {
        const FIELDS: &'static [Field] = &[Field::required("count", &[Rule::IsInt, Rule::Min(0)])];
    }

    #[tokio::test]
    async fn test_invalid_response_never_leaves() {
        let app: axum::Router = axum::Router::new()
            .route("/broken", get(|| async { ValidJson::created(Broken { count: -1 }) }));

        let response = make_request(None, app, Method::GET, "/broken", String::default()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(body.get("count").is_none());
        assert_eq!(body["status"], 500);
    }
}
