//! In-memory stand-in for the forum backend, with the same route
//! semantics and error phrases the real one sends. Tests drive it through
//! [`MockBackend`], which implements the client's `Backend` trait.

use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use agora_api::{
    self as api, AuthToken, Backend, Card, CardId, CommentId, CommentPage, CommentQuery,
    EditComment, Error, NewCard, NewComment, Tag, TagId, Time, UserUid, CARDS_PER_PAGE,
};
use agora_client::{toggle, Direction, VoteState};
use async_trait::async_trait;

const DEFAULT_COMMENT_LIMIT: u32 = 50;

pub struct MockServer {
    users: BTreeMap<UserUid, String>,
    sessions: HashMap<AuthToken, UserUid>,
    cards: BTreeMap<CardId, DbCard>,
    comments: BTreeMap<CommentId, DbComment>,
    tags: BTreeMap<TagId, Tag>,
    next_card: i64,
    next_comment: i64,
    next_tag: i64,
    next_token: u64,
    /// When set, the next route call fails with this error instead of
    /// running; used to script refusals.
    fail_next: Option<Error>,
    calls: Calls,
}

/// Per-route call counters, for asserting how often the network was hit.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Calls {
    pub list_cards: u32,
    pub fetch_card: u32,
    pub create_card: u32,
    pub vote_card: u32,
    pub delete_card: u32,
    pub list_comments: u32,
    pub create_comment: u32,
    pub edit_comment: u32,
    pub delete_comment: u32,
    pub react_to_comment: u32,
    pub list_tags: u32,
}

struct DbCard {
    title: String,
    description: String,
    author: String,
    owner: Option<UserUid>,
    tags: Vec<TagId>,
    created_at: Time,
    votes: HashMap<UserUid, i8>,
}

struct DbComment {
    card: CardId,
    author: String,
    owner: Option<UserUid>,
    content: String,
    parent: Option<CommentId>,
    is_official: bool,
    deactivate: bool,
    created_at: Time,
    votes: HashMap<UserUid, i8>,
}

impl MockServer {
    pub fn new() -> MockServer {
        MockServer {
            users: BTreeMap::new(),
            sessions: HashMap::new(),
            cards: BTreeMap::new(),
            comments: BTreeMap::new(),
            tags: BTreeMap::new(),
            next_card: 1,
            next_comment: 1,
            next_tag: 1,
            next_token: 1,
            fail_next: None,
            calls: Calls::default(),
        }
    }

    pub fn create_user(&mut self, name: &str) -> UserUid {
        let uid = UserUid(format!("uid-{name}"));
        self.users.insert(uid.clone(), name.to_string());
        uid
    }

    pub fn auth(&mut self, uid: &UserUid) -> AuthToken {
        let token = AuthToken(format!("token-{}", self.next_token));
        self.next_token += 1;
        self.sessions.insert(token.clone(), uid.clone());
        token
    }

    pub fn add_card(
        &mut self,
        owner: Option<&UserUid>,
        title: &str,
        description: &str,
        created_at: Time,
    ) -> CardId {
        let id = CardId(self.next_card);
        self.next_card += 1;
        self.cards.insert(
            id,
            DbCard {
                title: title.to_string(),
                description: description.to_string(),
                author: self.author_name(owner),
                owner: owner.cloned(),
                tags: Vec::new(),
                created_at,
                votes: HashMap::new(),
            },
        );
        id
    }

    pub fn add_comment(
        &mut self,
        card: CardId,
        owner: Option<&UserUid>,
        parent: Option<CommentId>,
        content: &str,
        created_at: Time,
    ) -> CommentId {
        let id = CommentId(self.next_comment);
        self.next_comment += 1;
        self.comments.insert(
            id,
            DbComment {
                card,
                author: self.author_name(owner),
                owner: owner.cloned(),
                content: content.to_string(),
                parent,
                is_official: false,
                deactivate: false,
                created_at,
                votes: HashMap::new(),
            },
        );
        id
    }

    pub fn set_official(&mut self, comment: CommentId) {
        if let Some(c) = self.comments.get_mut(&comment) {
            c.is_official = true;
        }
    }

    pub fn deactivate_comment(&mut self, comment: CommentId) {
        if let Some(c) = self.comments.get_mut(&comment) {
            c.deactivate = true;
        }
    }

    pub fn add_tag(&mut self, name: &str, created_at: Time) -> TagId {
        let id = TagId(self.next_tag);
        self.next_tag += 1;
        self.tags.insert(
            id,
            Tag {
                id,
                name: name.to_string(),
                description: None,
                image_url: None,
                created_at,
                updated_at: None,
                count: 0,
            },
        );
        id
    }

    pub fn tag_card(&mut self, card: CardId, tag: TagId) {
        if let Some(c) = self.cards.get_mut(&card) {
            c.tags.push(tag);
        }
    }

    pub fn set_card_score(&mut self, card: CardId, score: i64) {
        // expressed as that many synthetic single upvotes
        if let Some(c) = self.cards.get_mut(&card) {
            c.votes.clear();
            for n in 0..score.unsigned_abs() {
                c.votes
                    .insert(UserUid(format!("synthetic-{n}")), if score < 0 { -1 } else { 1 });
            }
        }
    }

    /// Makes the next route call fail with `error`.
    pub fn fail_next_with(&mut self, error: Error) {
        self.fail_next = Some(error);
    }

    pub fn calls(&self) -> Calls {
        self.calls
    }

    pub fn comment_is_deactivated(&self, comment: CommentId) -> bool {
        self.comments
            .get(&comment)
            .is_some_and(|c| c.deactivate)
    }

    pub fn card_exists(&self, card: CardId) -> bool {
        self.cards.contains_key(&card)
    }

    fn author_name(&self, owner: Option<&UserUid>) -> String {
        owner
            .and_then(|uid| self.users.get(uid))
            .cloned()
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    fn take_scripted_failure(&mut self) -> Result<(), Error> {
        match self.fail_next.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn viewer(&self, token: Option<&AuthToken>) -> Option<UserUid> {
        token.and_then(|t| self.sessions.get(t)).cloned()
    }

    fn card_wire(&self, id: CardId, card: &DbCard, viewer: Option<&UserUid>) -> Card {
        Card {
            id,
            title: card.title.clone(),
            description: card.description.clone(),
            author: card.author.clone(),
            user_id: card.owner.clone(),
            up_down: card.votes.values().map(|v| *v as i64).sum(),
            created_at: card.created_at,
            updated_at: None,
            deactivated: false,
            user_vote: viewer
                .and_then(|uid| card.votes.get(uid))
                .map(|v| *v as i64)
                .unwrap_or(0),
        }
    }

    fn comment_wire(&self, id: CommentId, c: &DbComment, viewer: Option<&UserUid>) -> api::Comment {
        api::Comment {
            id,
            card_id: c.card,
            user_uid: c.owner.clone(),
            author: c.author.clone(),
            content: c.content.clone(),
            up_down: Some(c.votes.values().map(|v| *v as i64).sum()),
            likes_count: None,
            dislikes_count: None,
            parent_id: c.parent,
            deactivate: c.deactivate,
            is_official: c.is_official,
            created_at: c.created_at,
            updated_at: None,
            user_vote: viewer.map(|uid| c.votes.get(uid).map(|v| *v as i64).unwrap_or(0)),
        }
    }

    fn page_of_cards(&self, ids: Vec<CardId>, page: u32, viewer: Option<&UserUid>) -> Vec<Card> {
        let page = page.max(1) as usize;
        ids.into_iter()
            .skip((page - 1) * CARDS_PER_PAGE)
            .take(CARDS_PER_PAGE)
            .map(|id| self.card_wire(id, &self.cards[&id], viewer))
            .collect()
    }

    /// All card ids, newest first.
    fn card_ids(&self) -> Vec<CardId> {
        let mut ids: Vec<_> = self.cards.keys().copied().collect();
        ids.sort_by_key(|id| std::cmp::Reverse((self.cards[id].created_at, *id)));
        ids
    }

    fn list_cards(&mut self, token: Option<&AuthToken>, page: u32) -> Result<Vec<Card>, Error> {
        self.calls.list_cards += 1;
        self.take_scripted_failure()?;
        let viewer = self.viewer(token);
        Ok(self.page_of_cards(self.card_ids(), page, viewer.as_ref()))
    }

    fn list_cards_in_tag(
        &mut self,
        token: Option<&AuthToken>,
        tag: TagId,
        page: u32,
    ) -> Result<Vec<Card>, Error> {
        self.calls.list_cards += 1;
        self.take_scripted_failure()?;
        let viewer = self.viewer(token);
        let ids = self
            .card_ids()
            .into_iter()
            .filter(|id| self.cards[id].tags.contains(&tag))
            .collect();
        Ok(self.page_of_cards(ids, page, viewer.as_ref()))
    }

    fn fetch_card(&mut self, token: Option<&AuthToken>, card: CardId) -> Result<Card, Error> {
        self.calls.fetch_card += 1;
        self.take_scripted_failure()?;
        let viewer = self.viewer(token);
        let c = self
            .cards
            .get(&card)
            .ok_or_else(|| Error::api(404, "Card not found"))?;
        Ok(self.card_wire(card, c, viewer.as_ref()))
    }

    fn create_card(&mut self, token: Option<&AuthToken>, card: NewCard) -> Result<Card, Error> {
        self.calls.create_card += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(401, "Unauthorized"))?;
        let id = CardId(self.next_card);
        self.next_card += 1;
        let author = if card.is_anonymous {
            "Anonymous".to_string()
        } else {
            self.author_name(Some(&viewer))
        };
        self.cards.insert(
            id,
            DbCard {
                title: card.title,
                description: card.description,
                author,
                owner: Some(viewer.clone()),
                tags: card.tags,
                created_at: chrono::Utc::now(),
                votes: HashMap::new(),
            },
        );
        Ok(self.card_wire(id, &self.cards[&id], Some(&viewer)))
    }

    fn vote_card(
        &mut self,
        token: Option<&AuthToken>,
        card: CardId,
        is_upvote: bool,
    ) -> Result<(), Error> {
        self.calls.vote_card += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(401, "Unauthorized"))?;
        let c = self
            .cards
            .get_mut(&card)
            .ok_or_else(|| Error::api(404, "Card not found"))?;
        apply_toggle(&mut c.votes, &viewer, is_upvote);
        Ok(())
    }

    fn delete_card(&mut self, token: Option<&AuthToken>, card: CardId) -> Result<(), Error> {
        self.calls.delete_card += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(401, "Unauthorized"))?;
        let c = self
            .cards
            .get(&card)
            .ok_or_else(|| Error::api(404, "Card not found"))?;
        if c.owner.as_ref() != Some(&viewer) {
            return Err(Error::api(403, "Forbidden"));
        }
        self.cards.remove(&card);
        self.comments.retain(|_, c| c.card != card);
        Ok(())
    }

    fn list_comments(
        &mut self,
        token: Option<&AuthToken>,
        card: CardId,
        query: CommentQuery,
    ) -> Result<CommentPage, Error> {
        self.calls.list_comments += 1;
        self.take_scripted_failure()?;
        let viewer = self.viewer(token);
        if !self.cards.contains_key(&card) {
            return Err(Error::api(404, "Card not found"));
        }
        let mut ids: Vec<_> = self
            .comments
            .iter()
            .filter(|(_, c)| c.card == card)
            .filter(|(_, c)| query.parent.is_none() || c.parent == query.parent)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by_key(|id| (self.comments[id].created_at, *id));

        let total = ids.len() as u64;
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_COMMENT_LIMIT).max(1);
        let start = ((page - 1) * limit) as usize;
        let data: Vec<_> = ids
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .map(|id| self.comment_wire(id, &self.comments[&id], viewer.as_ref()))
            .collect();
        let has_more = start + data.len() < total as usize;
        Ok(CommentPage {
            data,
            total,
            page_number: page,
            items_per_page: limit,
            has_more,
        })
    }

    fn create_comment(
        &mut self,
        token: Option<&AuthToken>,
        card: CardId,
        comment: NewComment,
    ) -> Result<api::Comment, Error> {
        self.calls.create_comment += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(403, "Forbidden resource"))?;
        if !self.cards.contains_key(&card) {
            return Err(Error::api(404, "Card not found"));
        }
        let id = CommentId(self.next_comment);
        self.next_comment += 1;
        self.comments.insert(
            id,
            DbComment {
                card,
                author: self.author_name(Some(&viewer)),
                owner: Some(viewer.clone()),
                content: comment.content,
                parent: comment.parent_id,
                is_official: false,
                deactivate: false,
                created_at: chrono::Utc::now(),
                votes: HashMap::new(),
            },
        );
        Ok(self.comment_wire(id, &self.comments[&id], Some(&viewer)))
    }

    fn edit_comment(
        &mut self,
        token: Option<&AuthToken>,
        card: CardId,
        comment: CommentId,
        edit: EditComment,
    ) -> Result<api::Comment, Error> {
        self.calls.edit_comment += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(403, "Forbidden resource"))?;
        if !self.cards.contains_key(&card) {
            return Err(Error::api(404, "Card not found"));
        }
        let c = self
            .comments
            .get_mut(&comment)
            .ok_or_else(|| Error::api(404, "Comment not found"))?;
        if c.owner.as_ref() != Some(&viewer) {
            return Err(Error::api(403, "Forbidden"));
        }
        c.content = edit.content;
        Ok(self.comment_wire(comment, &self.comments[&comment], Some(&viewer)))
    }

    fn delete_comment(
        &mut self,
        token: Option<&AuthToken>,
        card: CardId,
        comment: CommentId,
    ) -> Result<(), Error> {
        self.calls.delete_comment += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(401, "Unauthorized"))?;
        if !self.cards.contains_key(&card) {
            return Err(Error::api(404, "Card not found"));
        }
        let c = self
            .comments
            .get_mut(&comment)
            .ok_or_else(|| Error::api(404, "Comment not found"))?;
        if c.owner.as_ref() != Some(&viewer) {
            return Err(Error::api(403, "Forbidden"));
        }
        // soft delete, replies stay attached
        c.deactivate = true;
        Ok(())
    }

    fn react_to_comment(
        &mut self,
        token: Option<&AuthToken>,
        card: CardId,
        comment: CommentId,
        is_upvote: bool,
    ) -> Result<(), Error> {
        self.calls.react_to_comment += 1;
        self.take_scripted_failure()?;
        let viewer = self
            .viewer(token)
            .ok_or_else(|| Error::api(403, "Forbidden resource"))?;
        if !self.cards.contains_key(&card) {
            return Err(Error::api(404, "Card not found"));
        }
        let c = self
            .comments
            .get_mut(&comment)
            .ok_or_else(|| Error::api(404, "Comment not found"))?;
        apply_toggle(&mut c.votes, &viewer, is_upvote);
        Ok(())
    }

    fn list_tags(&mut self) -> Result<Vec<Tag>, Error> {
        self.calls.list_tags += 1;
        self.take_scripted_failure()?;
        Ok(self
            .tags
            .values()
            .map(|t| {
                let mut t = t.clone();
                t.count = self
                    .cards
                    .values()
                    .filter(|c| c.tags.contains(&t.id))
                    .count() as u64;
                t
            })
            .collect())
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

/// Server-side vote record moves under the same toggle rule the client
/// applies optimistically.
fn apply_toggle(votes: &mut HashMap<UserUid, i8>, voter: &UserUid, is_upvote: bool) {
    let current = VoteState::from_raw(votes.get(voter).map(|v| *v as i64).unwrap_or(0));
    let requested = if is_upvote {
        Direction::Up
    } else {
        Direction::Down
    };
    let next = toggle(current, requested).next;
    if next == VoteState::None {
        votes.remove(voter);
    } else {
        votes.insert(voter.clone(), next.score() as i8);
    }
}

/// Suspends exactly once. Every route awaits this first, so a call never
/// settles within the poll that started it and in-flight guards stay
/// observable, the way they are over a real network.
fn round_trip() -> impl Future<Output = ()> {
    struct RoundTrip(bool);
    impl Future for RoundTrip {
        type Output = ();
        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.0 {
                Poll::Ready(())
            } else {
                self.0 = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        }
    }
    RoundTrip(false)
}

/// The client-facing handle: a shared `MockServer` plus the token this
/// particular client presents, same shape as a reqwest client carrying a
/// bearer token.
pub struct MockBackend {
    server: Rc<RefCell<MockServer>>,
    token: Option<AuthToken>,
}

impl MockBackend {
    pub fn new(server: Rc<RefCell<MockServer>>, token: Option<AuthToken>) -> MockBackend {
        MockBackend { server, token }
    }
}

#[async_trait(?Send)]
impl Backend for MockBackend {
    async fn list_cards(&self, page: u32) -> Result<Vec<Card>, Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .list_cards(self.token.as_ref(), page)
    }

    async fn list_cards_in_tag(&self, tag: TagId, page: u32) -> Result<Vec<Card>, Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .list_cards_in_tag(self.token.as_ref(), tag, page)
    }

    async fn fetch_card(&self, card: CardId) -> Result<Card, Error> {
        round_trip().await;
        self.server.borrow_mut().fetch_card(self.token.as_ref(), card)
    }

    async fn create_card(&self, card: NewCard) -> Result<Card, Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .create_card(self.token.as_ref(), card)
    }

    async fn vote_card(&self, card: CardId, is_upvote: bool) -> Result<(), Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .vote_card(self.token.as_ref(), card, is_upvote)
    }

    async fn delete_card(&self, card: CardId) -> Result<(), Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .delete_card(self.token.as_ref(), card)
    }

    async fn list_comments(
        &self,
        card: CardId,
        query: CommentQuery,
    ) -> Result<CommentPage, Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .list_comments(self.token.as_ref(), card, query)
    }

    async fn create_comment(&self, card: CardId, comment: NewComment) -> Result<api::Comment, Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .create_comment(self.token.as_ref(), card, comment)
    }

    async fn edit_comment(
        &self,
        card: CardId,
        comment: CommentId,
        edit: EditComment,
    ) -> Result<api::Comment, Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .edit_comment(self.token.as_ref(), card, comment, edit)
    }

    async fn delete_comment(&self, card: CardId, comment: CommentId) -> Result<(), Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .delete_comment(self.token.as_ref(), card, comment)
    }

    async fn react_to_comment(
        &self,
        card: CardId,
        comment: CommentId,
        is_upvote: bool,
    ) -> Result<(), Error> {
        round_trip().await;
        self.server
            .borrow_mut()
            .react_to_comment(self.token.as_ref(), card, comment, is_upvote)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, Error> {
        round_trip().await;
        self.server.borrow_mut().list_tags()
    }
}
