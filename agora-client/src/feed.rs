use std::cell::RefCell;
use std::rc::Rc;

use crate::{
    api::{Backend, CardId, Error, NewCard, TagId, CARDS_PER_PAGE},
    notice::{classify, MutationKind, Notice},
    post::Post,
    session::Session,
    transient::{SingleFlight, TransientErrors, ERROR_CLEAR_DELAY},
    util,
    vote::{toggle, Direction},
};

/// Which card listing this feed shows.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FeedScope {
    All,
    Tag(TagId),
}

/// Page-level state behind the card list views: the loaded posts, the
/// pagination cursor, and the optimistic-mutation bookkeeping for votes
/// and the two-step delete flow. Cheap to clone; clones share state, so
/// distinct entities can have mutations in flight concurrently while the
/// single-flight set serializes mutations per entity.
pub struct CardFeed<B> {
    backend: Rc<B>,
    session: Rc<dyn Session>,
    scope: FeedScope,
    state: Rc<RefCell<FeedState>>,
}

struct FeedState {
    posts: Vec<Post>,
    next_page: u32,
    has_more: bool,
    loading: bool,
    load_error: Option<String>,
    voting: SingleFlight<CardId>,
    vote_errors: TransientErrors<CardId>,
    delete: Option<DeleteFlow>,
    torn_down: bool,
}

/// The delete confirmation dialog. Selection is deliberately outside the
/// pending-action set: picking a target is not yet a mutation.
struct DeleteFlow {
    target: CardId,
    error: Option<String>,
    in_progress: bool,
}

impl<B> Clone for CardFeed<B> {
    fn clone(&self) -> Self {
        CardFeed {
            backend: self.backend.clone(),
            session: self.session.clone(),
            scope: self.scope,
            state: self.state.clone(),
        }
    }
}

impl<B: Backend> CardFeed<B> {
    pub fn new(backend: Rc<B>, session: Rc<dyn Session>, scope: FeedScope) -> CardFeed<B> {
        CardFeed {
            backend,
            session,
            scope,
            state: Rc::new(RefCell::new(FeedState {
                posts: Vec::new(),
                next_page: 1,
                has_more: true,
                loading: false,
                load_error: None,
                voting: SingleFlight::new(),
                vote_errors: TransientErrors::new(),
                delete: None,
                torn_down: false,
            })),
        }
    }

    /// Fetches the next page and merges it in, de-duplicating by id. The
    /// feed is exhausted once a short page comes back.
    pub async fn load_more(&self) {
        let page = {
            let mut st = self.state.borrow_mut();
            if st.loading || !st.has_more || st.torn_down {
                return;
            }
            st.loading = true;
            st.load_error = None;
            st.next_page
        };

        let res = match self.scope {
            FeedScope::All => self.backend.list_cards(page).await,
            FeedScope::Tag(tag) => self.backend.list_cards_in_tag(tag, page).await,
        };

        let mut st = self.state.borrow_mut();
        if st.torn_down {
            return;
        }
        st.loading = false;
        match res {
            Ok(cards) => {
                st.has_more = cards.len() >= CARDS_PER_PAGE;
                st.next_page = page + 1;
                for card in cards {
                    let post = Post::from(card);
                    if !st.posts.iter().any(|p| p.id == post.id) {
                        st.posts.push(post);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(page, err = %e, "could not load card page");
                st.load_error = Some(e.to_string());
            }
        }
    }

    /// Optimistic vote toggle on one card: the score moves before the
    /// request goes out and moves back, exactly, if the backend refuses.
    pub async fn vote(&self, card: CardId, requested: Direction) {
        let snapshot = {
            let mut st = self.state.borrow_mut();
            if !st.voting.begin(card) {
                tracing::debug!(card = card.0, "vote already in flight, ignoring");
                return;
            }
            let Some(post) = st.posts.iter_mut().find(|p| p.id == card) else {
                st.voting.finish(&card);
                return;
            };
            let snapshot = post.clone();
            let change = toggle(post.user_vote, requested);
            post.score += change.delta;
            post.user_vote = change.next;
            snapshot
        };

        let res = self.backend.vote_card(card, requested.is_upvote()).await;

        let clear = {
            let mut st = self.state.borrow_mut();
            st.voting.finish(&card);
            match res {
                Ok(()) => {
                    // vote responses carry no body we trust; the optimistic
                    // delta is the state
                    st.vote_errors.dismiss(&card);
                    None
                }
                Err(e) => {
                    tracing::warn!(card = card.0, err = %e, "vote refused, rolling back");
                    if let Some(post) = st.posts.iter_mut().find(|p| p.id == card) {
                        *post = snapshot;
                    }
                    let notice = classify(&e.to_string(), MutationKind::Vote);
                    Some(st.vote_errors.set(card, notice.user_message()))
                }
            }
        };
        if let Some(token) = clear {
            self.schedule_vote_error_clear(card, token);
        }
    }

    /// Sends the new card and prepends the server's canonical version,
    /// skipping ids already present.
    pub async fn create_card(&self, card: NewCard) -> Result<CardId, Error> {
        let created = self.backend.create_card(card).await?;
        let post = Post::from(created);
        let id = post.id;
        let mut st = self.state.borrow_mut();
        if !st.torn_down && !st.posts.iter().any(|p| p.id == id) {
            st.posts.insert(0, post);
        }
        Ok(id)
    }

    pub fn request_delete(&self, card: CardId) {
        self.state.borrow_mut().delete = Some(DeleteFlow {
            target: card,
            error: None,
            in_progress: false,
        });
    }

    pub fn cancel_delete(&self) {
        let mut st = self.state.borrow_mut();
        if matches!(&st.delete, Some(flow) if flow.in_progress) {
            return;
        }
        st.delete = None;
    }

    /// Optimistically removes the selected card and issues the delete.
    /// Failure reinserts the snapshot and parks the message on the dialog,
    /// since the row is no longer there to host an inline banner — except
    /// when the backend says the card is already gone, in which case the
    /// removal stands.
    pub async fn confirm_delete(&self) {
        let (target, snapshot) = {
            let mut st = self.state.borrow_mut();
            let Some(flow) = st.delete.as_mut() else { return };
            if flow.in_progress {
                return;
            }
            flow.in_progress = true;
            flow.error = None;
            let target = flow.target;
            let snapshot = st.posts.clone();
            st.posts.retain(|p| p.id != target);
            (target, snapshot)
        };

        let res = self.backend.delete_card(target).await;

        let mut st = self.state.borrow_mut();
        match res {
            Ok(()) => st.delete = None,
            Err(e) => {
                let notice = classify(&e.to_string(), MutationKind::Delete);
                if notice == Notice::AlreadyDeleted {
                    tracing::warn!(card = target.0, "deleted a card that was already gone");
                } else {
                    tracing::warn!(card = target.0, err = %e, "delete refused, rolling back");
                    st.posts = snapshot;
                }
                if let Some(flow) = st.delete.as_mut() {
                    flow.in_progress = false;
                    flow.error = Some(notice.user_message().to_string());
                }
            }
        }
    }

    /// Marks this view as gone; results of still-running loads are
    /// discarded when they arrive.
    pub fn teardown(&self) {
        self.state.borrow_mut().torn_down = true;
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state.borrow().posts.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn has_more(&self) -> bool {
        self.state.borrow().has_more
    }

    pub fn load_error(&self) -> Option<String> {
        self.state.borrow().load_error.clone()
    }

    pub fn is_voting(&self, card: CardId) -> bool {
        self.state.borrow().voting.contains(&card)
    }

    pub fn vote_error(&self, card: CardId) -> Option<String> {
        self.state
            .borrow()
            .vote_errors
            .message(&card)
            .map(String::from)
    }

    pub fn dismiss_vote_error(&self, card: CardId) {
        self.state.borrow_mut().vote_errors.dismiss(&card);
    }

    pub fn delete_target(&self) -> Option<CardId> {
        self.state.borrow().delete.as_ref().map(|f| f.target)
    }

    pub fn delete_error(&self) -> Option<String> {
        self.state
            .borrow()
            .delete
            .as_ref()
            .and_then(|f| f.error.clone())
    }

    pub fn is_deleting(&self) -> bool {
        self.state
            .borrow()
            .delete
            .as_ref()
            .is_some_and(|f| f.in_progress)
    }

    /// Deleting is only offered on cards owned by the current session.
    pub fn can_delete(&self, card: CardId) -> bool {
        let Some(uid) = self.session.current_uid() else {
            return false;
        };
        self.state
            .borrow()
            .posts
            .iter()
            .any(|p| p.id == card && p.author_uid.as_ref() == Some(&uid))
    }

    fn schedule_vote_error_clear(&self, card: CardId, token: u64) {
        let state = self.state.clone();
        util::spawn_local(async move {
            util::sleep(ERROR_CLEAR_DELAY).await;
            state.borrow_mut().vote_errors.clear_if(&card, token);
        });
    }
}
