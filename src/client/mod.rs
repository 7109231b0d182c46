//! Screen view-models and the collaborators they call.
//!
//! A screen is a [`ViewModel`] started with [`transform`]: inputs go in
//! through a channel, outputs come back through [`Screen::next`].

pub mod http;
pub mod usecase;
pub mod user_info;
pub mod view_model;
pub mod write;

pub use usecase::ClientError;
pub use view_model::{Context, Failure, FailureKind, Screen, ScreenConfig, ViewModel, transform};
