//! In-memory store shared between routes.
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use axum::extract::FromRef;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::AppState;

#[derive(thiserror::Error, Debug)]
pub enum SeedError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("seed file is not valid: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// User as saved on the store.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub apple_subject: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub introduce: Option<String>,
}

/// Post as saved on the store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PostRecord {
    pub id: i64,
    pub author: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default = "visible")]
    pub is_visible: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub view_num: i64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn visible() -> bool {
    true
}

/// Every table of the store.
#[derive(Debug, Default)]
pub struct Store {
    pub users: HashMap<String, UserRecord>,
    pub posts: Vec<PostRecord>,
    /// `(follower, followee)` pairs.
    pub follows: HashSet<(String, String)>,
    /// `(post id, user email)` pairs.
    pub likes: HashSet<(i64, String)>,
    /// Refresh token to user email.
    pub refresh_tokens: HashMap<String, String>,
    next_post_id: i64,
}

impl Store {
    /// Reserve the next post identifier. Identifiers start at 1.
    pub fn next_post_id(&mut self) -> i64 {
        self.next_post_id += 1;
        self.next_post_id
    }

    pub fn followers_of(&self, email: &str) -> i64 {
        self.follows.iter().filter(|(_, followee)| followee == email).count() as i64
    }

    pub fn followees_of(&self, email: &str) -> i64 {
        self.follows.iter().filter(|(follower, _)| follower == email).count() as i64
    }

    pub fn likes_of(&self, post_id: i64) -> i64 {
        self.likes.iter().filter(|(id, _)| *id == post_id).count() as i64
    }
}

#[derive(Debug, Default, Deserialize)]
struct Seed {
    #[serde(default)]
    users: Vec<UserRecord>,
    #[serde(default)]
    posts: Vec<PostRecord>,
    #[serde(default)]
    follows: Vec<(String, String)>,
}

/// Custom db structure to pass to Axum.
#[derive(Clone, Default)]
pub struct Database {
    store: Arc<RwLock<Store>>,
}

impl Database {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load users and posts from a YAML fixture.
    pub fn seed(self, path: &Path) -> Result<Self, SeedError> {
        let seed: Seed = serde_yaml::from_reader(File::open(path)?)?;
        self.load(seed.users, seed.posts, seed.follows)?;

        tracing::info!(path = %path.display(), "store seeded");
        Ok(self)
    }

    fn load(
        &self,
        users: Vec<UserRecord>,
        posts: Vec<PostRecord>,
        follows: Vec<(String, String)>,
    ) -> Result<(), SeedError> {
        // Seeding happens once on start, before any request is served.
        let mut store = self.store.try_write().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::WouldBlock, "store is in use")
        })?;

        // Emails are keys everywhere, compared lowercased.
        for mut user in users {
            user.email = user.email.to_lowercase();
            store.users.insert(user.email.clone(), user);
        }
        store.next_post_id = posts.iter().map(|p| p.id).max().unwrap_or_default();
        store.posts.extend(posts.into_iter().map(|mut post| {
            post.author = post.author.to_lowercase();
            post
        }));
        store.follows.extend(
            follows
                .into_iter()
                .map(|(follower, followee)| (follower.to_lowercase(), followee.to_lowercase())),
        );
        Ok(())
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().await
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(app_state: &AppState) -> Database {
        app_state.db.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Store with two users, three posts and one follow.
    pub fn fixture() -> Database {
        Database::new()
            .seed(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/seed.yaml")))
            .expect("fixture seed is valid")
    }

    #[tokio::test]
    async fn test_seed() {
        let db = fixture();
        let mut store = db.write().await;
        assert_eq!(store.users.len(), 2);
        assert_eq!(store.posts.len(), 3);
        assert_eq!(store.followers_of("jinha@macro.test"), 1);
        assert_eq!(store.followees_of("jinha@macro.test"), 0);
        assert_eq!(store.next_post_id(), 4);
    }

    #[tokio::test]
    async fn test_seed_lowercases_emails() {
        let db = Database::new();
        let user = UserRecord {
            email: "Minji@Macro.test".into(),
            name: "minji".into(),
            ..Default::default()
        };
        let post = PostRecord {
            id: 1,
            author: "MINJI@macro.test".into(),
            title: "Hangang night walk".into(),
            description: None,
            place_id: None,
            is_visible: true,
            images: Vec::new(),
            view_num: 0,
            created_at: Utc::now(),
        };
        let follows = vec![("Jinha@macro.test".into(), "minji@MACRO.test".into())];
        db.load(vec![user], vec![post], follows).unwrap();

        let store = db.read().await;
        assert_eq!(store.users["minji@macro.test"].email, "minji@macro.test");
        assert_eq!(store.posts[0].author, "minji@macro.test");
        assert_eq!(store.followers_of("minji@macro.test"), 1);
        assert_eq!(store.followees_of("jinha@macro.test"), 1);
    }

    #[test]
    fn test_missing_seed() {
        assert!(matches!(
            Database::new().seed(Path::new("/nonexistent/seed.yaml")),
            Err(SeedError::Io(_))
        ));
    }
}
