//! Collaborators called by the screens.

use async_trait::async_trait;
use validator::ValidationErrors;

use crate::client::view_model::FailureKind;
use crate::model::{
    FollowPatchResponse, FollowResponse, LikePostResponse, PostDraft, PostFindResponse,
    UserProfile, WriteResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("response did not pass validation")]
    Rejected(ValidationErrors),
    #[error("request did not pass validation")]
    Invalid(ValidationErrors),
}

impl ClientError {
    /// Kind reported to the screen.
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::Http(err) if err.is_timeout() => FailureKind::Timeout,
            ClientError::Http(err) if err.is_decode() => FailureKind::Decode,
            ClientError::Http(_) | ClientError::Url(_) => FailureKind::Network,
            ClientError::Json(_) | ClientError::Rejected(_) => FailureKind::Decode,
            ClientError::Invalid(_) => FailureKind::Validation,
            ClientError::Status(401 | 403) => FailureKind::Unauthorized,
            ClientError::Status(400 | 404 | 422) => FailureKind::Validation,
            ClientError::Status(501) => FailureKind::NotImplemented,
            ClientError::Status(_) => FailureKind::Server,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[async_trait]
pub trait SearchUseCase: Send + Sync {
    async fn search_user_profile(&self, email: &str) -> Result<UserProfile>;

    /// Posts written by the user owning `email`.
    async fn search_post(&self, email: &str) -> Result<Vec<PostFindResponse>>;
}

#[async_trait]
pub trait FollowUseCase: Send + Sync {
    async fn follow_user(&self, user_id: &str, follow_user_id: &str) -> Result<FollowResponse>;
}

#[async_trait]
pub trait PatchUseCase: Send + Sync {
    /// Follow or unfollow.
    async fn patch_follow(&self, email: &str) -> Result<FollowPatchResponse>;

    /// Like or unlike.
    async fn patch_post_like(&self, post_id: i64) -> Result<LikePostResponse>;
}

#[async_trait]
pub trait WriteUseCase: Send + Sync {
    async fn write(&self, draft: PostDraft) -> Result<WriteResponse>;
}
