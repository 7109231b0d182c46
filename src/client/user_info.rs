//! Profile screen of a user, with their posts.

use std::sync::Arc;

use crate::client::usecase::{FollowUseCase, PatchUseCase, SearchUseCase};
use crate::client::view_model::{Context, Failure, ViewModel};
use crate::model::{
    FollowPatchResponse, FollowResponse, LikePostResponse, PostFindResponse, UserProfile,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    SearchUserProfile { email: String },
    TapFollowButton { user_id: String },
    TouchFollow { email: String },
    TouchLike { post_id: i64 },
    NavigateToProfile { email: String },
    NavigateToRead { post_id: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    NavigateToProfileView(String),
    NavigateToReadView(i64),
    UpdateFollowResult(FollowResponse),
    UpdateUserProfile(UserProfile),
    UpdateUserPost(Vec<PostFindResponse>),
    UpdatePostLike(LikePostResponse),
    UpdateUserFollow(FollowPatchResponse),
    Failed(Failure),
}

#[derive(Debug)]
pub enum Completion {
    Profile(UserProfile),
    Posts(Vec<PostFindResponse>),
    Followed(FollowResponse),
    FollowToggled(FollowPatchResponse),
    Liked(LikePostResponse),
}

pub struct UserInfoViewModel {
    /// Signed-in user, sent as follower.
    user_id: String,
    searcher: Arc<dyn SearchUseCase>,
    follower: Arc<dyn FollowUseCase>,
    patcher: Arc<dyn PatchUseCase>,
    profile: Option<UserProfile>,
    posts: Vec<PostFindResponse>,
}

impl UserInfoViewModel {
    pub fn new(
        user_id: impl Into<String>,
        searcher: Arc<dyn SearchUseCase>,
        follower: Arc<dyn FollowUseCase>,
        patcher: Arc<dyn PatchUseCase>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            searcher,
            follower,
            patcher,
            profile: None,
            posts: Vec::new(),
        }
    }

    #[cfg(test)]
    fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[cfg(test)]
    fn posts(&self) -> &[PostFindResponse] {
        &self.posts
    }

    fn search_user_profile(&self, email: String, ctx: &mut Context<Self>) {
        let searcher = Arc::clone(&self.searcher);
        let query = email.clone();
        ctx.spawn("search_user_profile", async move {
            searcher.search_user_profile(&query).await.map(Completion::Profile)
        });

        let searcher = Arc::clone(&self.searcher);
        ctx.spawn("search_post", async move {
            searcher.search_post(&email).await.map(Completion::Posts)
        });
    }

    fn tap_follow_button(&self, follow_user_id: String, ctx: &mut Context<Self>) {
        let follower = Arc::clone(&self.follower);
        let user_id = self.user_id.clone();
        ctx.spawn("follow_user", async move {
            follower
                .follow_user(&user_id, &follow_user_id)
                .await
                .map(Completion::Followed)
        });
    }

    fn touch_follow(&self, email: String, ctx: &mut Context<Self>) {
        let patcher = Arc::clone(&self.patcher);
        ctx.spawn("patch_follow", async move {
            patcher.patch_follow(&email).await.map(Completion::FollowToggled)
        });
    }

    fn touch_like(&self, post_id: i64, ctx: &mut Context<Self>) {
        let patcher = Arc::clone(&self.patcher);
        ctx.spawn("patch_post_like", async move {
            patcher.patch_post_like(post_id).await.map(Completion::Liked)
        });
    }
}

impl ViewModel for UserInfoViewModel {
    type Input = Input;
    type Output = Output;
    type Completion = Completion;

    fn handle(&mut self, input: Input, ctx: &mut Context<Self>) {
        match input {
            Input::SearchUserProfile { email } => self.search_user_profile(email, ctx),
            Input::TapFollowButton { user_id } => self.tap_follow_button(user_id, ctx),
            Input::TouchFollow { email } => self.touch_follow(email, ctx),
            Input::TouchLike { post_id } => self.touch_like(post_id, ctx),
            Input::NavigateToProfile { email } => ctx.emit(Output::NavigateToProfileView(email)),
            Input::NavigateToRead { post_id } => ctx.emit(Output::NavigateToReadView(post_id)),
        }
    }

    fn apply(&mut self, completion: Completion) -> Output {
        match completion {
            Completion::Profile(profile) => {
                self.profile = Some(profile.clone());
                Output::UpdateUserProfile(profile)
            },
            Completion::Posts(posts) => {
                self.posts = posts.clone();
                Output::UpdateUserPost(posts)
            },
            Completion::Followed(followed) => Output::UpdateFollowResult(followed),
            Completion::FollowToggled(toggled) => {
                if let Some(profile) = self.profile.as_mut().filter(|p| p.email == toggled.email) {
                    profile.followers_num = toggled.followers_num;
                }
                Output::UpdateUserFollow(toggled)
            },
            Completion::Liked(liked) => {
                if let Some(post) = self.posts.iter_mut().find(|p| p.post_id == liked.post_id) {
                    post.like_num = liked.like_num;
                }
                Output::UpdatePostLike(liked)
            },
        }
    }

    fn failed(failure: Failure) -> Output {
        Output::Failed(failure)
    }
}
