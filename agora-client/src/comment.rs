use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    api::{self, CommentId, Time, UserUid},
    vote::{VoteChange, VoteState},
};

/// One node of the client-side comment tree. Built from the flat wire rows
/// once per reload, then only ever touched through the copy-on-write
/// operations below: a node exclusively owns its `replies`, and untouched
/// subtrees keep their `Arc` identity across mutations so views can skip
/// re-rendering them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    /// Owner key; deletion is only offered when it matches the session's.
    pub author_uid: Option<UserUid>,
    pub content: String,
    pub created_at: Time,
    pub score: i64,
    pub user_vote: VoteState,
    /// Flagged as an institutional answer.
    pub official: bool,
    /// Soft-deleted: body hidden, voting and replying refused, children kept.
    pub deactivated: bool,
    pub parent: Option<CommentId>,
    pub replies: Vec<Arc<Comment>>,
}

impl From<api::Comment> for Comment {
    fn from(row: api::Comment) -> Comment {
        let score = row.score();
        Comment {
            id: row.id,
            author: row.author,
            author_uid: row.user_uid,
            content: row.content,
            created_at: row.created_at,
            score,
            user_vote: VoteState::from_raw(row.user_vote.unwrap_or(0)),
            official: row.is_official,
            deactivated: row.deactivate,
            parent: row.parent_id,
            replies: Vec::new(),
        }
    }
}

impl Comment {
    /// Reconstructs the forest from one flat page of rows.
    ///
    /// Two passes: index every row by id, then link each row under its
    /// parent. A row whose parent is absent from the page (pagination cut
    /// it off), is the row itself, or loops back through a parent cycle is
    /// promoted to root rather than dropped. Every sibling list, the roots
    /// included, ends up sorted ascending by creation time, ties broken by
    /// input order.
    pub fn build_forest(rows: Vec<api::Comment>) -> Vec<Arc<Comment>> {
        let mut nodes: HashMap<CommentId, Comment> = HashMap::with_capacity(rows.len());
        let mut order: HashMap<CommentId, usize> = HashMap::with_capacity(rows.len());
        let mut links: Vec<(CommentId, Option<CommentId>)> = Vec::with_capacity(rows.len());
        for (seq, row) in rows.into_iter().enumerate() {
            if nodes.contains_key(&row.id) {
                tracing::warn!(comment = row.id.0, "duplicate comment row in page, ignoring");
                continue;
            }
            order.insert(row.id, seq);
            links.push((row.id, row.parent_id));
            nodes.insert(row.id, Comment::from(row));
        }

        let mut children: HashMap<CommentId, Vec<CommentId>> = HashMap::new();
        let mut roots: Vec<CommentId> = Vec::new();
        for (id, parent) in links {
            match parent {
                Some(p) if p == id => {
                    tracing::warn!(comment = id.0, "comment cites itself as parent, keeping it top-level");
                    roots.push(id);
                }
                Some(p) if nodes.contains_key(&p) => children.entry(p).or_default().push(id),
                Some(p) => {
                    tracing::warn!(
                        comment = id.0,
                        parent = p.0,
                        "comment parent missing from this page, keeping it top-level"
                    );
                    roots.push(id);
                }
                None => roots.push(id),
            }
        }

        fn assemble(
            id: CommentId,
            nodes: &mut HashMap<CommentId, Comment>,
            children: &mut HashMap<CommentId, Vec<CommentId>>,
            order: &HashMap<CommentId, usize>,
        ) -> Option<Arc<Comment>> {
            let mut node = nodes.remove(&id)?;
            if let Some(mut kids) = children.remove(&id) {
                kids.sort_by_key(|k| (nodes[k].created_at, order[k]));
                node.replies = kids
                    .into_iter()
                    .filter_map(|k| assemble(k, nodes, children, order))
                    .collect();
            }
            Some(Arc::new(node))
        }

        roots.sort_by_key(|r| (nodes[r].created_at, order[r]));
        let mut forest: Vec<Arc<Comment>> = roots
            .into_iter()
            .filter_map(|r| assemble(r, &mut nodes, &mut children, &order))
            .collect();

        // nodes still unclaimed here sit on a parent cycle; promote the
        // earliest member, which pulls the rest back in as descendants
        while let Some(id) = nodes
            .keys()
            .min_by_key(|k| (nodes[*k].created_at, order[*k]))
            .copied()
        {
            tracing::warn!(comment = id.0, "comment parent chain loops, keeping it top-level");
            if let Some(node) = assemble(id, &mut nodes, &mut children, &order) {
                forest.push(node);
            }
        }

        forest.sort_by_key(|c| (c.created_at, order[&c.id]));
        forest
    }

    /// Depth-first lookup by id.
    pub fn find_in(forest: &[Arc<Comment>], id: CommentId) -> Option<&Arc<Comment>> {
        for c in forest {
            if c.id == id {
                return Some(c);
            }
            if let Some(found) = Comment::find_in(&c.replies, id) {
                return Some(found);
            }
        }
        None
    }

    /// Applies a settled toggle to the node with this id, wherever it sits.
    pub fn apply_vote(
        forest: &[Arc<Comment>],
        target: CommentId,
        change: VoteChange,
    ) -> Vec<Arc<Comment>> {
        rewrite(forest, target, |c| {
            c.score += change.delta;
            c.user_vote = change.next;
        })
    }

    /// Appends `reply` at the end of the target's reply list; appending
    /// keeps timestamp order since a just-created reply is the newest.
    pub fn insert_reply(
        forest: &[Arc<Comment>],
        parent: CommentId,
        reply: Comment,
    ) -> Vec<Arc<Comment>> {
        rewrite(forest, parent, move |c| {
            c.replies.push(Arc::new(reply.clone()));
        })
    }

    /// Soft-deletes the target; its children stay where they are.
    pub fn mark_deactivated(forest: &[Arc<Comment>], target: CommentId) -> Vec<Arc<Comment>> {
        rewrite(forest, target, |c| c.deactivated = true)
    }
}

/// Copy-on-write edit of the node with id `target`. Subtrees without the
/// target come back `Arc::ptr_eq`-identical to the input; a missing target
/// makes the whole call a no-op, which is what a late mutation racing a
/// full reload should be.
fn rewrite(
    forest: &[Arc<Comment>],
    target: CommentId,
    edit: impl Fn(&mut Comment),
) -> Vec<Arc<Comment>> {
    fn rewrite_node<F: Fn(&mut Comment)>(
        node: &Arc<Comment>,
        target: CommentId,
        edit: &F,
    ) -> Arc<Comment> {
        if node.id == target {
            let mut edited = (**node).clone();
            edit(&mut edited);
            return Arc::new(edited);
        }
        let replies: Vec<Arc<Comment>> = node
            .replies
            .iter()
            .map(|c| rewrite_node(c, target, edit))
            .collect();
        if replies
            .iter()
            .zip(node.replies.iter())
            .all(|(a, b)| Arc::ptr_eq(a, b))
        {
            return node.clone();
        }
        let mut edited = (**node).clone();
        edited.replies = replies;
        Arc::new(edited)
    }
    forest
        .iter()
        .map(|c| rewrite_node(c, target, &edit))
        .collect()
}
