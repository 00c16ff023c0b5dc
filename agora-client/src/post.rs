use crate::{
    api::{self, CardId, Time, UserUid},
    vote::VoteState,
};

/// A card as the views consume it, normalized once at the API boundary.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Post {
    pub id: CardId,
    pub title: String,
    pub content: String,
    pub author: String,
    pub author_uid: Option<UserUid>,
    pub created_at: Time,
    pub score: i64,
    pub user_vote: VoteState,
    /// Kept current locally on every successful comment creation,
    /// refreshed from the server total on comment reloads.
    pub comment_count: u64,
    pub category: String,
    pub tags: Vec<String>,
    pub official_response: bool,
    pub deactivated: bool,
}

impl From<api::Card> for Post {
    fn from(card: api::Card) -> Post {
        Post {
            id: card.id,
            title: card.title,
            content: card.description,
            author: card.author,
            author_uid: card.user_id,
            created_at: card.created_at,
            score: card.up_down,
            user_vote: VoteState::from_raw(card.user_vote),
            comment_count: 0,
            category: String::new(),
            tags: Vec::new(),
            official_response: false,
            deactivated: card.deactivated,
        }
    }
}
