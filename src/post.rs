//! Posts: search, writing and likes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::database::{Database, PostRecord, Store};
use crate::dto::{Dto, Field, Rule, single};
use crate::error::{Result, ServerError};
use crate::model::{LikePostResponse, PostDraft, PostFindResponse, WriteResponse, Writer};

/// Largest page a search may return.
pub const MAX_TAKE: i64 = 30;
pub const DEFAULT_TAKE: i64 = 10;

fn default_take() -> i64 {
    DEFAULT_TAKE
}

/// Post search filters with pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSearchQuery {
    #[serde(default = "default_take")]
    pub take: i64,
    #[serde(default)]
    pub skip: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub place_id: Option<String>,
}

impl Default for PostSearchQuery {
    fn default() -> Self {
        Self {
            take: DEFAULT_TAKE,
            skip: 0,
            title: None,
            username: None,
            email: None,
            place_id: None,
        }
    }
}

impl Dto for PostSearchQuery {
    const FIELDS: &'static [Field] = &[
        Field::optional("take", &[Rule::IsInt, Rule::Positive, Rule::Max(MAX_TAKE)]),
        Field::optional("skip", &[Rule::IsInt, Rule::Min(0)]),
        Field::optional("title", &[Rule::IsString]),
        Field::optional("username", &[Rule::IsString]),
        Field::optional("email", &[Rule::IsEmail]),
        Field::optional("placeId", &[Rule::IsNumberString]),
    ];
}

fn contains(haystack: &str, needle: &Option<String>) -> bool {
    needle
        .as_ref()
        .is_none_or(|needle| haystack.to_lowercase().contains(&needle.to_lowercase()))
}

/// Post manager.
#[derive(Clone)]
pub struct PostService {
    db: Database,
}

impl PostService {
    /// Create a new [`PostService`].
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Search posts, newest first.
    ///
    /// Hidden posts are only listed to their author.
    pub async fn search(&self, query: &PostSearchQuery, viewer: &str) -> Vec<PostFindResponse> {
        let store = self.db.read().await;

        let mut posts: Vec<&PostRecord> = store
            .posts
            .iter()
            .filter(|post| post.is_visible || post.author == viewer)
            .filter(|post| contains(&post.title, &query.title))
            .filter(|post| contains(&writer(&store, post).name, &query.username))
            .filter(|post| {
                query
                    .email
                    .as_ref()
                    .is_none_or(|email| post.author.eq_ignore_ascii_case(email))
            })
            .filter(|post| query.place_id.is_none() || post.place_id == query.place_id)
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        posts
            .into_iter()
            .skip(query.skip.max(0) as usize)
            .take(query.take.clamp(1, MAX_TAKE) as usize)
            .map(|post| find_response(&store, post))
            .collect()
    }

    /// Save a new post written by `author`.
    pub async fn write(&self, author: &str, draft: PostDraft) -> Result<WriteResponse> {
        if draft.images.iter().any(|image| STANDARD.decode(image).is_err()) {
            return Err(single("images", "base64", "Images must be base64 encoded.".into()).into());
        }

        let mut store = self.db.write().await;
        let id = store.next_post_id();
        store.posts.push(PostRecord {
            id,
            author: author.to_owned(),
            title: draft.title,
            description: draft.description,
            place_id: draft.place_id,
            is_visible: draft.is_visible,
            images: draft.images,
            view_num: 0,
            created_at: chrono::Utc::now(),
        });

        tracing::debug!(post_id = id, %author, "post written");
        Ok(WriteResponse { post_id: id })
    }

    /// Like a post, or remove the like when already given.
    pub async fn toggle_like(&self, post_id: i64, email: &str) -> Result<LikePostResponse> {
        let mut store = self.db.write().await;
        if !store
            .posts
            .iter()
            .any(|post| post.id == post_id && (post.is_visible || post.author == email))
        {
            return Err(ServerError::NotFound("post"));
        }

        let like = (post_id, email.to_owned());
        let liked = if store.likes.remove(&like) {
            false
        } else {
            store.likes.insert(like)
        };

        Ok(LikePostResponse {
            post_id,
            like_num: store.likes_of(post_id),
            liked,
        })
    }
}

fn writer(store: &Store, post: &PostRecord) -> Writer {
    Writer {
        email: post.author.clone(),
        name: store
            .users
            .get(&post.author)
            .map(|user| user.name.clone())
            .unwrap_or_else(|| post.author.clone()),
    }
}

fn find_response(store: &Store, post: &PostRecord) -> PostFindResponse {
    PostFindResponse {
        post_id: post.id,
        title: post.title.clone(),
        description: post.description.clone(),
        place_id: post.place_id.clone(),
        like_num: store.likes_of(post.id),
        view_num: post.view_num,
        writer: writer(store, post),
    }
}
