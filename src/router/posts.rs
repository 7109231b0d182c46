use axum::Extension;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};

use crate::database::Database;
use crate::error::Result;
use crate::model::{LikePostResponse, PostDraft, PostFindResponse, WriteResponse};
use crate::post::{PostSearchQuery, PostService};
use crate::router::{Valid, ValidJson, ValidQuery};
use crate::token::Claims;

/// Handle `GET /posts/search`.
pub async fn search(
    State(db): State<Database>,
    Extension(claims): Extension<Claims>,
    ValidQuery(query): ValidQuery<PostSearchQuery>,
) -> ValidJson<Vec<PostFindResponse>> {
    ValidJson::ok(PostService::new(db).search(&query, &claims.sub).await)
}

/// Handle `POST /posts`.
pub async fn write(
    State(db): State<Database>,
    Extension(claims): Extension<Claims>,
    Valid(draft): Valid<PostDraft>,
) -> Result<ValidJson<WriteResponse>> {
    let written = PostService::new(db).write(&claims.sub, draft).await?;
    Ok(ValidJson::created(written))
}

/// Handle `PATCH /posts/{post_id}/like`.
pub async fn like(
    State(db): State<Database>,
    Extension(claims): Extension<Claims>,
    post_id: std::result::Result<Path<i64>, PathRejection>,
) -> Result<ValidJson<LikePostResponse>> {
    let Path(post_id) = post_id?;
    Ok(ValidJson::ok(
        PostService::new(db).toggle_like(post_id, &claims.sub).await?,
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
    async fn test_search_defaults() {
        let state = state();
        let app = app(state.clone());

        let response =
            make_request(Some(&state), app, Method::GET, "/posts/search", String::default())
                .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let ids: Vec<i64> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|post| post["postId"].as_i64().unwrap())
            .collect();
        // Bearer is jinha, who sees its own hidden post.
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(body[0]["writer"]["name"], "minji");
    }

    #[tokio::test]
    async fn test_search_coerces_query() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/posts/search?take=1&skip=1&placeId=1001",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await[0]["postId"], 1);
    }

    #[tokio::test]
    async fn test_search_rejects_negative_skip() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/posts/search?skip=-1",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["errors"][0]["field"], "skip");
    }

    #[tokio::test]
    async fn test_search_rejects_large_page() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::GET,
            "/posts/search?take=31",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = make_request(
            Some(&state),
            app,
            Method::GET,
            "/posts/search?take=30",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_search_requires_token() {
        let app = app(state());

        let response =
            make_request(None, app, Method::GET, "/posts/search", String::default()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_write_then_like() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::POST,
            "/posts",
            json!({
                "title": "Namsan tower at dusk",
                "placeId": "1003",
                "isVisible": true,
                "unexpected": "dropped",
            })
            .to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json(response).await["postId"], 4);

        let response = make_request(
            Some(&state),
            app.clone(),
            Method::PATCH,
            "/posts/4/like",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["liked"], true);
        assert_eq!(body["likeNum"], 1);

        let response = make_request(
            Some(&state),
            app,
            Method::PATCH,
            "/posts/404/like",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_like_rejects_non_numeric_id() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::PATCH,
            "/posts/abc/like",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json(response).await;
        assert_eq!(body["status"], 400);
        assert!(body["title"].is_string());
    }

    #[tokio::test]
    async fn test_write_reports_every_violation() {
        let state = state();
        let app = app(state.clone());

        let response = make_request(
            Some(&state),
            app,
            Method::POST,
            "/posts",
            json!({ "title": "", "placeId": "seoul" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json(response).await;
        let fields: Vec<&str> = body["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|error| error["field"].as_str().unwrap())
            .collect();
        assert_eq!(fields, vec!["isVisible", "placeId", "title"]);
    }
}
