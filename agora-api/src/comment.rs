use crate::{CardId, Time, UserUid};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub i64);

/// A commentary row exactly as `GET /commentary/{cardId}` sends it: flat,
/// with nesting expressed through `parent_id`. The backend is loose about
/// some fields (ids sometimes arrive as strings, the vote count sometimes
/// comes split into like/dislike counters); everything loose is absorbed
/// here so the client-side tree never has to branch on field shapes.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    #[serde(deserialize_with = "de_loose_id")]
    pub id: CommentId,
    pub card_id: CardId,
    #[serde(default)]
    pub user_uid: Option<UserUid>,
    pub author: String,
    pub content: String,
    #[serde(default)]
    pub up_down: Option<i64>,
    #[serde(default, rename = "likesCount")]
    pub likes_count: Option<i64>,
    #[serde(default, rename = "dislikesCount")]
    pub dislikes_count: Option<i64>,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<CommentId>,
    #[serde(default)]
    pub deactivate: bool,
    #[serde(default, alias = "isOfficial")]
    pub is_official: bool,
    pub created_at: Time,
    #[serde(default)]
    pub updated_at: Option<Time>,
    #[serde(default)]
    pub user_vote: Option<i64>,
}

impl Comment {
    /// Aggregate score under whichever field shape the backend used.
    pub fn score(&self) -> i64 {
        match (self.up_down, self.likes_count, self.dislikes_count) {
            (Some(n), _, _) => n,
            (None, None, None) => 0,
            (None, likes, dislikes) => likes.unwrap_or(0) - dislikes.unwrap_or(0),
        }
    }
}

fn de_loose_id<'de, D>(deserializer: D) -> Result<CommentId, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize as _;

    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(i64),
        Str(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(CommentId(n)),
        Raw::Str(s) => s
            .parse()
            .map(CommentId)
            .map_err(|_| serde::de::Error::custom(format!("comment id is not numeric: {s:?}"))),
    }
}

/// Query string of `GET /commentary/{cardId}`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommentQuery {
    pub parent: Option<CommentId>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CommentPage {
    pub data: Vec<Comment>,
    pub total: u64,
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    #[serde(rename = "itemsPerPage")]
    pub items_per_page: u32,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Body of `POST /commentary/{cardId}`; `parent_id == None` makes a
/// top-level comment.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub content: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<CommentId>,
}

/// Body of `PATCH /commentary/{cardId}/{commentId}`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EditComment {
    pub content: String,
}

/// Body of `PATCH /commentary`. Stringly ids again, same as `CardVote`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Reaction {
    #[serde(rename = "isUpvote")]
    pub is_upvote: bool,
    #[serde(rename = "cardId")]
    pub card_id: String,
    #[serde(rename = "commentaryId")]
    pub commentary_id: String,
}

impl Reaction {
    pub fn new(card: CardId, comment: CommentId, is_upvote: bool) -> Reaction {
        Reaction {
            is_upvote,
            card_id: card.0.to_string(),
            commentary_id: comment.0.to_string(),
        }
    }
}
