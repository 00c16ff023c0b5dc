use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::{
    api::{Backend, CardId, CommentId, CommentQuery, NewComment},
    comment::Comment,
    notice::{classify, MutationKind},
    post::Post,
    session::Session,
    transient::{SingleFlight, TransientErrors, ERROR_CLEAR_DELAY},
    util,
    vote::{toggle, Direction},
};

/// How many comments one reload asks for.
pub const COMMENTS_PAGE_LIMIT: u32 = 50;

/// Page-level state behind the post-detail view: the post itself, the
/// comment forest, and the optimistic-mutation bookkeeping for the post
/// vote, per-comment votes, comment creation and the comment delete flow.
pub struct CardThread<B> {
    backend: Rc<B>,
    session: Rc<dyn Session>,
    card: CardId,
    state: Rc<RefCell<ThreadState>>,
}

struct ThreadState {
    post: Option<Post>,
    loading: bool,
    load_error: Option<String>,
    comments: Vec<Arc<Comment>>,
    loading_comments: bool,
    post_voting: SingleFlight<CardId>,
    post_vote_errors: TransientErrors<CardId>,
    comment_voting: SingleFlight<CommentId>,
    replying: SingleFlight<CommentId>,
    comment_errors: TransientErrors<CommentId>,
    compose_errors: TransientErrors<CardId>,
    submitting: bool,
    delete: Option<DeleteFlow>,
    torn_down: bool,
}

struct DeleteFlow {
    target: CommentId,
    error: Option<String>,
    in_progress: bool,
}

impl<B> Clone for CardThread<B> {
    fn clone(&self) -> Self {
        CardThread {
            backend: self.backend.clone(),
            session: self.session.clone(),
            card: self.card,
            state: self.state.clone(),
        }
    }
}

impl<B: Backend> CardThread<B> {
    pub fn new(backend: Rc<B>, session: Rc<dyn Session>, card: CardId) -> CardThread<B> {
        CardThread {
            backend,
            session,
            card,
            state: Rc::new(RefCell::new(ThreadState {
                post: None,
                loading: false,
                load_error: None,
                comments: Vec::new(),
                loading_comments: false,
                post_voting: SingleFlight::new(),
                post_vote_errors: TransientErrors::new(),
                comment_voting: SingleFlight::new(),
                replying: SingleFlight::new(),
                comment_errors: TransientErrors::new(),
                compose_errors: TransientErrors::new(),
                submitting: false,
                delete: None,
                torn_down: false,
            })),
        }
    }

    pub fn card_id(&self) -> CardId {
        self.card
    }

    /// Fetches the post itself; the comment forest is loaded separately.
    pub async fn load(&self) {
        {
            let mut st = self.state.borrow_mut();
            if st.loading || st.torn_down {
                return;
            }
            st.loading = true;
            st.load_error = None;
        }

        let res = self.backend.fetch_card(self.card).await;

        let mut st = self.state.borrow_mut();
        if st.torn_down {
            return;
        }
        st.loading = false;
        match res {
            Ok(card) => {
                // keep the locally maintained count across refetches
                let count = st.post.as_ref().map(|p| p.comment_count).unwrap_or(0);
                let mut post = Post::from(card);
                post.comment_count = count;
                st.post = Some(post);
            }
            Err(e) => {
                tracing::warn!(card = self.card.0, err = %e, "could not load card");
                st.load_error = Some(e.to_string());
            }
        }
    }

    /// Replaces the forest wholesale from page 1 and refreshes the
    /// comment count from the server total.
    pub async fn reload_comments(&self) {
        {
            let mut st = self.state.borrow_mut();
            if st.loading_comments || st.torn_down {
                return;
            }
            st.loading_comments = true;
        }

        let res = self
            .backend
            .list_comments(
                self.card,
                CommentQuery {
                    parent: None,
                    page: Some(1),
                    limit: Some(COMMENTS_PAGE_LIMIT),
                },
            )
            .await;

        let mut st = self.state.borrow_mut();
        if st.torn_down {
            return;
        }
        st.loading_comments = false;
        match res {
            Ok(page) => {
                let total = page.total;
                st.comments = Comment::build_forest(page.data);
                if let Some(post) = st.post.as_mut() {
                    post.comment_count = total;
                }
            }
            Err(e) => {
                tracing::warn!(card = self.card.0, err = %e, "could not load comments");
                st.comments = Vec::new();
            }
        }
    }

    /// Optimistic vote toggle on the post.
    pub async fn vote_post(&self, requested: Direction) {
        let card = self.card;
        let snapshot = {
            let mut st = self.state.borrow_mut();
            if !st.post_voting.begin(card) {
                tracing::debug!(card = card.0, "post vote already in flight, ignoring");
                return;
            }
            let Some(post) = st.post.as_mut() else {
                st.post_voting.finish(&card);
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
            st.post_voting.finish(&card);
            match res {
                Ok(()) => {
                    st.post_vote_errors.dismiss(&card);
                    None
                }
                Err(e) => {
                    tracing::warn!(card = card.0, err = %e, "post vote refused, rolling back");
                    st.post = Some(snapshot);
                    let notice = classify(&e.to_string(), MutationKind::Vote);
                    Some(st.post_vote_errors.set(card, notice.user_message()))
                }
            }
        };
        if let Some(token) = clear {
            let state = self.state.clone();
            util::spawn_local(async move {
                util::sleep(ERROR_CLEAR_DELAY).await;
                state.borrow_mut().post_vote_errors.clear_if(&card, token);
            });
        }
    }

    /// Optimistic vote toggle on one comment, wherever it sits in the
    /// forest. The snapshot is the whole forest; restoring it is cheap
    /// since unchanged subtrees are shared.
    pub async fn vote_comment(&self, comment: CommentId, requested: Direction) {
        let snapshot = {
            let mut st = self.state.borrow_mut();
            if !st.comment_voting.begin(comment) {
                tracing::debug!(comment = comment.0, "comment vote already in flight, ignoring");
                return;
            }
            let target = match Comment::find_in(&st.comments, comment) {
                Some(node) => (node.user_vote, node.deactivated),
                None => {
                    st.comment_voting.finish(&comment);
                    return;
                }
            };
            let (user_vote, deactivated) = target;
            if deactivated {
                // soft-deleted comments take no votes
                st.comment_voting.finish(&comment);
                return;
            }
            let change = toggle(user_vote, requested);
            let snapshot = st.comments.clone();
            st.comments = Comment::apply_vote(&st.comments, comment, change);
            snapshot
        };

        let res = self
            .backend
            .react_to_comment(self.card, comment, requested.is_upvote())
            .await;

        let clear = {
            let mut st = self.state.borrow_mut();
            st.comment_voting.finish(&comment);
            match res {
                Ok(()) => {
                    st.comment_errors.dismiss(&comment);
                    None
                }
                Err(e) => {
                    tracing::warn!(comment = comment.0, err = %e, "comment vote refused, rolling back");
                    st.comments = snapshot;
                    let notice = classify(&e.to_string(), MutationKind::CommentVote);
                    Some(st.comment_errors.set(comment, notice.user_message()))
                }
            }
        };
        if let Some(token) = clear {
            self.schedule_comment_error_clear(comment, token);
        }
    }

    /// Creates a top-level comment. Creation is request-then-merge: the
    /// server's canonical row is appended on success (newest, so timestamp
    /// order holds) and the comment count moves with it.
    pub async fn submit_comment(&self, content: String) {
        if content.trim().is_empty() {
            return;
        }
        {
            let mut st = self.state.borrow_mut();
            if st.submitting || st.torn_down {
                return;
            }
            st.submitting = true;
        }

        let res = self
            .backend
            .create_comment(
                self.card,
                NewComment {
                    content,
                    parent_id: None,
                },
            )
            .await;

        let clear = {
            let mut st = self.state.borrow_mut();
            st.submitting = false;
            match res {
                Ok(row) => {
                    st.comments.push(Arc::new(Comment::from(row)));
                    if let Some(post) = st.post.as_mut() {
                        post.comment_count += 1;
                    }
                    st.compose_errors.dismiss(&self.card);
                    None
                }
                Err(e) => {
                    tracing::warn!(card = self.card.0, err = %e, "comment refused");
                    let notice = classify(&e.to_string(), MutationKind::CommentCreate);
                    Some(st.compose_errors.set(self.card, notice.user_message()))
                }
            }
        };
        if let Some(token) = clear {
            let card = self.card;
            let state = self.state.clone();
            util::spawn_local(async move {
                util::sleep(ERROR_CLEAR_DELAY).await;
                state.borrow_mut().compose_errors.clear_if(&card, token);
            });
        }
    }

    /// Creates a reply under `parent` and splices the server's canonical
    /// row into the forest.
    pub async fn reply(&self, parent: CommentId, content: String) {
        if content.trim().is_empty() {
            return;
        }
        {
            let mut st = self.state.borrow_mut();
            if !st.replying.begin(parent) {
                tracing::debug!(parent = parent.0, "reply already in flight, ignoring");
                return;
            }
            let gone = match Comment::find_in(&st.comments, parent) {
                Some(node) => node.deactivated,
                None => true,
            };
            if gone {
                // soft-deleted or vanished parents take no replies
                st.replying.finish(&parent);
                return;
            }
        }

        let res = self
            .backend
            .create_comment(
                self.card,
                NewComment {
                    content,
                    parent_id: Some(parent),
                },
            )
            .await;

        let clear = {
            let mut st = self.state.borrow_mut();
            st.replying.finish(&parent);
            match res {
                Ok(row) => {
                    st.comments = Comment::insert_reply(&st.comments, parent, Comment::from(row));
                    if let Some(post) = st.post.as_mut() {
                        post.comment_count += 1;
                    }
                    st.comment_errors.dismiss(&parent);
                    None
                }
                Err(e) => {
                    tracing::warn!(parent = parent.0, err = %e, "reply refused");
                    let notice = classify(&e.to_string(), MutationKind::CommentCreate);
                    Some(st.comment_errors.set(parent, notice.user_message()))
                }
            }
        };
        if let Some(token) = clear {
            self.schedule_comment_error_clear(parent, token);
        }
    }

    /// Deleting is only offered on comments owned by the current session.
    pub fn can_delete_comment(&self, comment: CommentId) -> bool {
        let Some(uid) = self.session.current_uid() else {
            return false;
        };
        let st = self.state.borrow();
        Comment::find_in(&st.comments, comment)
            .is_some_and(|c| c.author_uid.as_ref() == Some(&uid))
    }

    pub fn request_delete_comment(&self, comment: CommentId) {
        if !self.can_delete_comment(comment) {
            return;
        }
        self.state.borrow_mut().delete = Some(DeleteFlow {
            target: comment,
            error: None,
            in_progress: false,
        });
    }

    pub fn cancel_delete_comment(&self) {
        let mut st = self.state.borrow_mut();
        if matches!(&st.delete, Some(flow) if flow.in_progress) {
            return;
        }
        st.delete = None;
    }

    /// Optimistically soft-deletes the selected comment (children stay),
    /// then issues the delete. Failure restores the snapshot and parks
    /// the message on the dialog; success swaps in the server's view of
    /// the thread via a wholesale reload.
    pub async fn confirm_delete_comment(&self) {
        let (target, snapshot) = {
            let mut st = self.state.borrow_mut();
            let Some(flow) = st.delete.as_mut() else { return };
            if flow.in_progress {
                return;
            }
            flow.in_progress = true;
            flow.error = None;
            let target = flow.target;
            let snapshot = st.comments.clone();
            st.comments = Comment::mark_deactivated(&st.comments, target);
            (target, snapshot)
        };

        let res = self.backend.delete_comment(self.card, target).await;

        let reload = {
            let mut st = self.state.borrow_mut();
            match res {
                Ok(()) => {
                    st.delete = None;
                    true
                }
                Err(e) => {
                    tracing::warn!(comment = target.0, err = %e, "comment delete refused, rolling back");
                    st.comments = snapshot;
                    let notice = classify(&e.to_string(), MutationKind::Delete);
                    if let Some(flow) = st.delete.as_mut() {
                        flow.in_progress = false;
                        flow.error = Some(notice.user_message().to_string());
                    }
                    false
                }
            }
        };
        if reload {
            self.reload_comments().await;
        }
    }

    pub fn teardown(&self) {
        self.state.borrow_mut().torn_down = true;
    }

    pub fn post(&self) -> Option<Post> {
        self.state.borrow().post.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn load_error(&self) -> Option<String> {
        self.state.borrow().load_error.clone()
    }

    pub fn comments(&self) -> Vec<Arc<Comment>> {
        self.state.borrow().comments.clone()
    }

    /// Root comments flagged as institutional answers, shown first.
    pub fn official_comments(&self) -> Vec<Arc<Comment>> {
        self.state
            .borrow()
            .comments
            .iter()
            .filter(|c| c.official)
            .cloned()
            .collect()
    }

    pub fn regular_comments(&self) -> Vec<Arc<Comment>> {
        self.state
            .borrow()
            .comments
            .iter()
            .filter(|c| !c.official)
            .cloned()
            .collect()
    }

    pub fn is_loading_comments(&self) -> bool {
        self.state.borrow().loading_comments
    }

    pub fn is_submitting(&self) -> bool {
        self.state.borrow().submitting
    }

    pub fn can_comment(&self) -> bool {
        self.session.current_uid().is_some()
    }

    pub fn post_vote_error(&self) -> Option<String> {
        self.state
            .borrow()
            .post_vote_errors
            .message(&self.card)
            .map(String::from)
    }

    pub fn dismiss_post_vote_error(&self) {
        self.state.borrow_mut().post_vote_errors.dismiss(&self.card);
    }

    pub fn comment_error(&self, comment: CommentId) -> Option<String> {
        self.state
            .borrow()
            .comment_errors
            .message(&comment)
            .map(String::from)
    }

    pub fn dismiss_comment_error(&self, comment: CommentId) {
        self.state.borrow_mut().comment_errors.dismiss(&comment);
    }

    pub fn compose_error(&self) -> Option<String> {
        self.state
            .borrow()
            .compose_errors
            .message(&self.card)
            .map(String::from)
    }

    pub fn dismiss_compose_error(&self) {
        self.state.borrow_mut().compose_errors.dismiss(&self.card);
    }

    pub fn delete_target(&self) -> Option<CommentId> {
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

    fn schedule_comment_error_clear(&self, comment: CommentId, token: u64) {
        let state = self.state.clone();
        util::spawn_local(async move {
            util::sleep(ERROR_CLEAR_DELAY).await;
            state.borrow_mut().comment_errors.clear_if(&comment, token);
        });
    }
}
