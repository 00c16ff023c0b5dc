mod comment;
pub use comment::Comment;

mod feed;
pub use feed::{CardFeed, FeedScope};

mod http;
pub use http::HttpBackend;

mod notice;
pub use notice::{classify, MutationKind, Notice};

mod post;
pub use post::Post;

mod session;
pub use session::{FixedSession, Session};

mod thread;
pub use thread::{CardThread, COMMENTS_PAGE_LIMIT};

mod transient;
pub use transient::{SingleFlight, TransientErrors, ERROR_CLEAR_DELAY};

mod util;

mod vote;
pub use vote::{toggle, Direction, VoteChange, VoteState};

pub mod api {
    pub use agora_api::*;
}
