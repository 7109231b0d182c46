use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::dto::{Dto, Field, Rule};
use crate::error::{Result, ServerError};
use crate::model::{
    FollowPatchRequest, FollowPatchResponse, FollowRequest, FollowResponse, UserProfile,
};
use crate::router::{Valid, ValidJson, ValidQuery};
use crate::token::Claims;
use crate::user::UserService;

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileQuery {
    pub email: String,
}

impl Dto for ProfileQuery {
    const FIELDS: &'static [Field] = &[Field::required("email", &[Rule::IsEmail])];
}

/// Handle `GET /users/profile`.
pub async fn profile(
    State(db): State<Database>,
    ValidQuery(query): ValidQuery<ProfileQuery>,
) -> Result<ValidJson<UserProfile>> {
    Ok(ValidJson::ok(UserService::new(db).profile(&query.email).await?))
}

/// Handle `POST /users/follow`.
///
/// The follower must be the bearer of the token.
pub async fn follow(
    State(db): State<Database>,
    Extension(claims): Extension<Claims>,
    Valid(body): Valid<FollowRequest>,
) -> Result<ValidJson<FollowResponse>> {
    if !body.user_id.eq_ignore_ascii_case(&claims.sub) {
        tracing::warn!(
            user = %claims.sub,
            target = %body.user_id,
            "follow on behalf of someone else"
        );
        return Err(ServerError::Forbidden);
    }

    let followed = UserService::new(db)
        .follow(&claims.sub, &body.follow_user_id)
        .await?;
    Ok(ValidJson::created(followed))
}

/// Handle `PATCH /users/follow`.
pub async fn toggle_follow(
    State(db): State<Database>,
    Extension(claims): Extension<Claims>,
    Valid(body): Valid<FollowPatchRequest>,
) -> Result<ValidJson<FollowPatchResponse>> {
    Ok(ValidJson::ok(
        UserService::new(db)
            .toggle_follow(&claims.sub, &body.email)
            .await?,
    ))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};

    use crate::router::tests::state;
    use crate::*;

    async fn json(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_profile() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::GET,
            "/users/profile?email=minji@macro.test",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["name"], "minji");
        assert_eq!(body["followeesNum"], 1);

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::GET,
            "/users/profile?email=nobody",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/users/profile?email=ghost@macro.test",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_of_apple_user_with_long_email() {
        let state = state();
        let app = app(state.clone());
        let email = format!("{}@macro.test", "a".repeat(60));
        let identity = apple::AppleIdentity {
            subject: "003.apple".into(),
            email: email.clone(),
        };
        user::UserService::new(state.db.clone())
            .sign_in_with_apple(&identity)
            .await;

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            &format!("/users/profile?email={email}"),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["name"], "a".repeat(50));
    }

    #[tokio::test]
    async fn test_follow() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::POST,
            "/users/follow",
            json!({ "userId": "jinha@macro.test", "followUserId": "minji@macro.test" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json(response).await;
        assert_eq!(body["followed"], true);
        assert_eq!(body["followUserId"], "minji@macro.test");
    }

    #[tokio::test]
    async fn test_follow_for_someone_else() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::POST,
            "/users/follow",
            json!({ "userId": "minji@macro.test", "followUserId": "jinha@macro.test" })
                .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_toggle_follow() {
        let state = state();
        let app = app(state.clone());
        let body = json!({ "email": "minji@macro.test" }).to_string();

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::PATCH,
            "/users/follow",
            body.clone(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["followed"], true);

        let response =
            make_request(Some(&state), app, Method::PATCH, "/users/follow", body).await;
        let body = json(response).await;
        assert_eq!(body["followed"], false);
        assert_eq!(body["followersNum"], 0);
    }
}
