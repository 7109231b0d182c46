//! Collaborators talking to the API over HTTP.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use url::Url;

use crate::client::usecase::{
    ClientError, FollowUseCase, PatchUseCase, Result, SearchUseCase, WriteUseCase,
};
use crate::dto::Dto;
use crate::model::{
    FollowPatchRequest, FollowPatchResponse, FollowRequest, FollowResponse, LikePostResponse,
    PostDraft, PostFindResponse, UserProfile, WriteResponse,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Tokens {
    access_token: String,
    refresh_token: String,
}

/// API client, checks every response against its rules before returning it.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self> {
        let mut base = Url::parse(base)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: Client::new(),
            base,
            access_token: None,
        })
    }

    /// Exchange an Apple identity token for an access token, kept for later
    /// calls. Returns the refresh token.
    pub async fn sign_in_with_apple(&mut self, identity_token: &str) -> Result<String> {
        let request = self
            .request(Method::POST, "apple/auth")?
            .json(&json!({ "identityToken": identity_token }));
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ClientError::Status(response.status().as_u16()));
        }

        let tokens: Tokens = serde_json::from_slice(&response.bytes().await?)?;
        self.access_token = Some(tokens.access_token);
        Ok(tokens.refresh_token)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let request = self.http.request(method, self.base.join(path)?);
        Ok(match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send<T: Dto + DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(%status, url = %response.url(), "request refused");
            return Err(ClientError::Status(status.as_u16()));
        }

        let body: T = serde_json::from_slice(&response.bytes().await?)?;
        body.inspect().map_err(ClientError::Rejected)?;
        Ok(body)
    }
}

#[async_trait]
impl SearchUseCase for ApiClient {
    async fn search_user_profile(&self, email: &str) -> Result<UserProfile> {
        let request = self
            .request(Method::GET, "users/profile")?
            .query(&[("email", email)]);
        self.send(request).await
    }

    async fn search_post(&self, email: &str) -> Result<Vec<PostFindResponse>> {
        let request = self
            .request(Method::GET, "posts/search")?
            .query(&[("email", email)]);
        self.send(request).await
    }
}

#[async_trait]
impl FollowUseCase for ApiClient {
    async fn follow_user(&self, user_id: &str, follow_user_id: &str) -> Result<FollowResponse> {
        let body = FollowRequest {
            user_id: user_id.to_owned(),
            follow_user_id: follow_user_id.to_owned(),
        };
        body.inspect().map_err(ClientError::Invalid)?;

        let request = self.request(Method::POST, "users/follow")?.json(&body);
        self.send(request).await
    }
}

#[async_trait]
impl PatchUseCase for ApiClient {
    async fn patch_follow(&self, email: &str) -> Result<FollowPatchResponse> {
        let body = FollowPatchRequest {
            email: email.to_owned(),
        };
        body.inspect().map_err(ClientError::Invalid)?;

        let request = self.request(Method::PATCH, "users/follow")?.json(&body);
        self.send(request).await
    }

    async fn patch_post_like(&self, post_id: i64) -> Result<LikePostResponse> {
        let request = self.request(Method::PATCH, &format!("posts/{post_id}/like"))?;
        self.send(request).await
    }
}

#[async_trait]
impl WriteUseCase for ApiClient {
    async fn write(&self, draft: PostDraft) -> Result<WriteResponse> {
        draft.inspect().map_err(ClientError::Invalid)?;

        let request = self.request(Method::POST, "posts")?.json(&draft);
        self.send(request).await
    }
}
