//! Reddit integration: OAuth connect/refresh and authenticated posting.

mod client;
pub mod oauth;
pub mod posting;

pub use client::{RedditClient, RedditError, Submission, SubmittedPost, TokenGrant};
pub use oauth::{AuthorizationStart, CallbackError, OAuthSessionManager, SessionState};
pub use posting::{ManualOption, PostError, PostOutcome, PostRequest, PostingService};
