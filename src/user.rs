//! User accounts and follows.

use crate::apple::AppleIdentity;
use crate::database::{Database, UserRecord};
use crate::dto::single;
use crate::error::{Result, ServerError};
use crate::model::{FollowPatchResponse, FollowResponse, NAME_MAX_LENGTH, UserProfile};

/// User manager.
#[derive(Clone)]
pub struct UserService {
    db: Database,
}

impl UserService {
    /// Create a new [`UserService`].
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Find the user bound to an Apple identity, or register it.
    ///
    /// A user first registered by email gets the Apple subject attached.
    pub async fn sign_in_with_apple(&self, identity: &AppleIdentity) -> UserRecord {
        let mut store = self.db.write().await;

        let known = store
            .users
            .values()
            .find(|user| user.apple_subject.as_deref() == Some(identity.subject.as_str()))
            .map(|user| user.email.clone());
        let email = known.unwrap_or_else(|| identity.email.to_lowercase());

        let user = store.users.entry(email.clone()).or_insert_with(|| {
            tracing::info!(%email, "user registered with apple");
            UserRecord {
                name: default_name(&email),
                email: email.clone(),
                ..Default::default()
            }
        });
        user.apple_subject = Some(identity.subject.clone());
        user.clone()
    }

    /// Keep a refresh token bound to a user.
    pub async fn store_refresh_token(&self, token: &str, email: &str) {
        self.db
            .write()
            .await
            .refresh_tokens
            .insert(token.to_owned(), email.to_owned());
    }

    /// Public profile of the user owning `email`.
    pub async fn profile(&self, email: &str) -> Result<UserProfile> {
        let store = self.db.read().await;
        let user = store
            .users
            .get(&email.to_lowercase())
            .ok_or(ServerError::NotFound("user"))?;

        Ok(UserProfile {
            email: user.email.clone(),
            name: user.name.clone(),
            image_url: user.image_url.clone(),
            introduce: user.introduce.clone(),
            followers_num: store.followers_of(&user.email),
            followees_num: store.followees_of(&user.email),
        })
    }

    /// Make `follower` follow `followee`. Following twice is a no-op.
    pub async fn follow(&self, follower: &str, followee: &str) -> Result<FollowResponse> {
        let followee = self.followable(follower, followee, "followUserId").await?;
        self.db
            .write()
            .await
            .follows
            .insert((follower.to_owned(), followee.clone()));

        Ok(FollowResponse {
            user_id: follower.to_owned(),
            follow_user_id: followee,
            followed: true,
        })
    }

    /// Follow `followee`, or unfollow it when already followed.
    pub async fn toggle_follow(
        &self,
        follower: &str,
        followee: &str,
    ) -> Result<FollowPatchResponse> {
        let followee = self.followable(follower, followee, "email").await?;
        let mut store = self.db.write().await;

        let pair = (follower.to_owned(), followee.clone());
        let followed = if store.follows.remove(&pair) {
            false
        } else {
            store.follows.insert(pair)
        };

        Ok(FollowPatchResponse {
            followers_num: store.followers_of(&followee),
            email: followee,
            followed,
        })
    }

    async fn followable(
        &self,
        follower: &str,
        followee: &str,
        field: &'static str,
    ) -> Result<String> {
        let followee = followee.to_lowercase();
        if follower == followee {
            return Err(single(field, "self", "You cannot follow yourself.".into()).into());
        }
        if !self.db.read().await.users.contains_key(&followee) {
            return Err(ServerError::NotFound("user"));
        }
        Ok(followee)
    }
}

/// Local part of the email, cut to fit a profile name.
fn default_name(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    local.chars().take(NAME_MAX_LENGTH).collect()
}
