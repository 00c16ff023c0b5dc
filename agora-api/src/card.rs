use crate::{TagId, Time, UserUid};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CardId(pub i64);

/// A card as the backend sends it: one top-level question.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Card {
    pub id: CardId,
    pub title: String,
    pub description: String,
    pub author: String,
    #[serde(default)]
    pub user_id: Option<UserUid>,
    #[serde(default)]
    pub up_down: i64,
    pub created_at: Time,
    #[serde(default)]
    pub updated_at: Option<Time>,
    #[serde(default)]
    pub deactivated: bool,
    /// Current user's recorded vote, -1/0/+1; only present when the
    /// request carried a session.
    #[serde(default)]
    pub user_vote: i64,
}

/// Body of `POST /card`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewCard {
    pub title: String,
    pub description: String,
    #[serde(rename = "isAnonymous")]
    pub is_anonymous: bool,
    pub tags: Vec<TagId>,
}

/// Body of `PATCH /card`. The backend wants the card id as a string here.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct CardVote {
    #[serde(rename = "isUpvote")]
    pub is_upvote: bool,
    #[serde(rename = "cardId")]
    pub card_id: String,
}

impl CardVote {
    pub fn new(card: CardId, is_upvote: bool) -> CardVote {
        CardVote {
            is_upvote,
            card_id: card.0.to_string(),
        }
    }
}
