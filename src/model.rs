//! Shapes shared by the HTTP API and the screen collaborators.

use serde::{Deserialize, Serialize};

use crate::dto::{Dto, Field, Rule};

/// Longest display name a profile may carry.
pub const NAME_MAX_LENGTH: usize = 50;

/// Public profile of a user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
    pub introduce: Option<String>,
    pub followers_num: i64,
    pub followees_num: i64,
}

impl Dto for UserProfile {
    const FIELDS: &'static [Field] = &[
        Field::required("email", &[Rule::IsEmail]),
        Field::required(
            "name",
            &[Rule::IsString, Rule::Length { min: 1, max: NAME_MAX_LENGTH }],
        ),
        Field::optional("imageUrl", &[Rule::IsString]),
        Field::optional("introduce", &[Rule::IsString, Rule::Length { min: 0, max: 255 }]),
        Field::required("followersNum", &[Rule::IsInt, Rule::Min(0)]),
        Field::required("followeesNum", &[Rule::IsInt, Rule::Min(0)]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Writer {
    pub email: String,
    pub name: String,
}

impl Dto for Writer {
    const FIELDS: &'static [Field] = &[
        Field::required("email", &[Rule::IsEmail]),
        Field::required("name", &[Rule::IsString]),
    ];
}

/// Post as listed by a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFindResponse {
    pub post_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub place_id: Option<String>,
    pub like_num: i64,
    pub view_num: i64,
    pub writer: Writer,
}

impl Dto for PostFindResponse {
    const FIELDS: &'static [Field] = &[
        Field::required("postId", &[Rule::IsInt, Rule::Positive]),
        Field::required("title", &[Rule::IsString, Rule::Length { min: 1, max: 100 }]),
        Field::optional("description", &[Rule::IsString]),
        Field::optional("placeId", &[Rule::IsNumberString]),
        Field::required("likeNum", &[Rule::IsInt, Rule::Min(0)]),
        Field::required("viewNum", &[Rule::IsInt, Rule::Min(0)]),
        Field::required("writer", &[Rule::Nested(Writer::FIELDS)]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikePostResponse {
    pub post_id: i64,
    pub like_num: i64,
    pub liked: bool,
}

impl Dto for LikePostResponse {
    const FIELDS: &'static [Field] = &[
        Field::required("postId", &[Rule::IsInt, Rule::Positive]),
        Field::required("likeNum", &[Rule::IsInt, Rule::Min(0)]),
        Field::required("liked", &[Rule::IsBool]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub user_id: String,
    pub follow_user_id: String,
    pub followed: bool,
}

impl Dto for FollowResponse {
    const FIELDS: &'static [Field] = &[
        Field::required("userId", &[Rule::IsEmail]),
        Field::required("followUserId", &[Rule::IsEmail]),
        Field::required("followed", &[Rule::IsBool]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowPatchResponse {
    pub email: String,
    pub followed: bool,
    pub followers_num: i64,
}

impl Dto for FollowPatchResponse {
    const FIELDS: &'static [Field] = &[
        Field::required("email", &[Rule::IsEmail]),
        Field::required("followed", &[Rule::IsBool]),
        Field::required("followersNum", &[Rule::IsInt, Rule::Min(0)]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResponse {
    pub post_id: i64,
}

impl Dto for WriteResponse {
    const FIELDS: &'static [Field] =
        &[Field::required("postId", &[Rule::IsInt, Rule::Positive])];
}

/// New post, images are base64 encoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    pub title: String,
    pub description: Option<String>,
    pub place_id: Option<String>,
    pub is_visible: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

impl Dto for PostDraft {
    const FIELDS: &'static [Field] = &[
        Field::required("title", &[Rule::IsString, Rule::Length { min: 1, max: 100 }]),
        Field::optional("description", &[Rule::IsString, Rule::Length { min: 0, max: 1000 }]),
        Field::optional("placeId", &[Rule::IsNumberString]),
        Field::required("isVisible", &[Rule::IsBool]),
        Field::optional("images", &[Rule::IsArray, Rule::Length { min: 0, max: 10 }]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub user_id: String,
    pub follow_user_id: String,
}

impl Dto for FollowRequest {
    const FIELDS: &'static [Field] = &[
        Field::required("userId", &[Rule::IsEmail]),
        Field::required("followUserId", &[Rule::IsEmail]),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowPatchRequest {
    pub email: String,
}

impl Dto for FollowPatchRequest {
    const FIELDS: &'static [Field] = &[Field::required("email", &[Rule::IsEmail])];
}
