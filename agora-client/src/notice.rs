/// What the user was doing when the backend refused; the same backend
/// phrase reads differently depending on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationKind {
    Vote,
    CommentVote,
    Delete,
    CommentCreate,
}

/// Closed set of user-facing failure kinds. Transport error text belongs
/// to the backend and never reaches the UI directly; everything funnels
/// through here first.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Notice {
    DuplicateVote,
    NotAuthenticated,
    NotOwner,
    AlreadyDeleted,
    Retry,
}

/// Substring match against the backend's known phrases, case-sensitive,
/// first match wins.
pub fn classify(raw: &str, kind: MutationKind) -> Notice {
    match kind {
        MutationKind::Delete => {
            if raw.contains("Forbidden") {
                Notice::NotOwner
            } else if raw.contains("Unauthorized") {
                Notice::NotAuthenticated
            } else if raw.contains("Card not found") {
                Notice::AlreadyDeleted
            } else {
                Notice::Retry
            }
        }
        MutationKind::Vote | MutationKind::CommentVote | MutationKind::CommentCreate => {
            if raw.contains("Vote already recorded") {
                Notice::DuplicateVote
            } else if raw.contains("Forbidden resource") || raw.contains("Unauthorized") {
                Notice::NotAuthenticated
            } else if raw.contains("Card not found") {
                Notice::AlreadyDeleted
            } else {
                Notice::Retry
            }
        }
    }
}

impl Notice {
    pub fn user_message(self) -> &'static str {
        match self {
            Notice::DuplicateVote => "Your vote was already recorded for this one.",
            Notice::NotAuthenticated => "You need to be signed in to do that.",
            Notice::NotOwner => "You can only delete content you created.",
            Notice::AlreadyDeleted => "This content has already been removed.",
            Notice::Retry => "Something went wrong. Please try again.",
        }
    }
}
