use async_trait::async_trait;

use crate::{
    Card, CardId, Comment, CommentId, CommentPage, CommentQuery, EditComment, Error, NewCard,
    NewComment, Tag, TagId,
};

/// Cards come back in fixed pages of this size; a shorter page means the
/// feed is exhausted.
pub const CARDS_PER_PAGE: usize = 20;

/// Client-side view of the remote REST surface, one method per route.
///
/// Implementations: the reqwest client in `agora-client` and the
/// in-memory server in `agora-mock-server`. `?Send` because everything
/// runs on one UI event loop.
#[async_trait(?Send)]
pub trait Backend {
    /// `GET /card/{page}`
    async fn list_cards(&self, page: u32) -> Result<Vec<Card>, Error>;

    /// `GET /card/tag/{tagId}/{page}`
    async fn list_cards_in_tag(&self, tag: TagId, page: u32) -> Result<Vec<Card>, Error>;

    /// `GET /card/detail/{id}`
    async fn fetch_card(&self, card: CardId) -> Result<Card, Error>;

    /// `POST /card`
    async fn create_card(&self, card: NewCard) -> Result<Card, Error>;

    /// `PATCH /card`
    async fn vote_card(&self, card: CardId, is_upvote: bool) -> Result<(), Error>;

    /// `DELETE /card/{id}`
    async fn delete_card(&self, card: CardId) -> Result<(), Error>;

    /// `GET /commentary/{cardId}?parentId&page&limit`
    async fn list_comments(&self, card: CardId, query: CommentQuery)
        -> Result<CommentPage, Error>;

    /// `POST /commentary/{cardId}`
    async fn create_comment(&self, card: CardId, comment: NewComment) -> Result<Comment, Error>;

    /// `PATCH /commentary/{cardId}/{commentId}`
    async fn edit_comment(
        &self,
        card: CardId,
        comment: CommentId,
        edit: EditComment,
    ) -> Result<Comment, Error>;

    /// `DELETE /commentary/{cardId}/{commentId}`
    async fn delete_comment(&self, card: CardId, comment: CommentId) -> Result<(), Error>;

    /// `PATCH /commentary`
    async fn react_to_comment(
        &self,
        card: CardId,
        comment: CommentId,
        is_upvote: bool,
    ) -> Result<(), Error>;

    /// `GET /tags`
    async fn list_tags(&self) -> Result<Vec<Tag>, Error>;
}
