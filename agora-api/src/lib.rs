pub type Time = chrono::DateTime<chrono::Utc>;

mod auth;
pub use auth::{AuthToken, UserUid};

mod backend;
pub use backend::{Backend, CARDS_PER_PAGE};

mod card;
pub use card::{Card, CardId, CardVote, NewCard};

mod comment;
pub use comment::{Comment, CommentId, CommentPage, CommentQuery, EditComment, NewComment, Reaction};

mod error;
pub use error::Error;

mod tag;
pub use tag::{Tag, TagId};
