use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;

/// How long an inline error banner lives before clearing itself.
pub const ERROR_CLEAR_DELAY: Duration = Duration::from_millis(3000);

/// The pending-action set: entity ids with a mutation currently in
/// flight. An id goes in synchronously before the network call and comes
/// out unconditionally when the call settles, so at most one mutation per
/// entity is ever in flight.
#[derive(Clone, Debug, Default)]
pub struct SingleFlight<I> {
    inflight: HashSet<I>,
}

impl<I: Copy + Eq + Hash> SingleFlight<I> {
    pub fn new() -> SingleFlight<I> {
        SingleFlight {
            inflight: HashSet::new(),
        }
    }

    /// Claims the id; `false` means a mutation for it is already in
    /// flight and the caller must back off.
    pub fn begin(&mut self, id: I) -> bool {
        self.inflight.insert(id)
    }

    pub fn finish(&mut self, id: &I) {
        self.inflight.remove(id);
    }

    pub fn contains(&self, id: &I) -> bool {
        self.inflight.contains(id)
    }
}

/// Per-entity inline error messages, alive until dismissed or until the
/// delayed clear scheduled at write time fires. Each write hands back a
/// token; a clear only goes through if its token is still the live one,
/// which is how a newer error re-arms the timer and an explicit dismissal
/// defuses it.
#[derive(Clone, Debug, Default)]
pub struct TransientErrors<I> {
    live: HashMap<I, (String, u64)>,
    next_token: u64,
}

impl<I: Copy + Eq + Hash> TransientErrors<I> {
    pub fn new() -> TransientErrors<I> {
        TransientErrors {
            live: HashMap::new(),
            next_token: 0,
        }
    }

    pub fn set(&mut self, id: I, message: impl Into<String>) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.live.insert(id, (message.into(), token));
        token
    }

    pub fn message(&self, id: &I) -> Option<&str> {
        self.live.get(id).map(|(m, _)| m.as_str())
    }

    pub fn dismiss(&mut self, id: &I) {
        self.live.remove(id);
    }

    /// Timer path: drops the entry only when `token` still matches.
    pub fn clear_if(&mut self, id: &I, token: u64) {
        if matches!(self.live.get(id), Some((_, t)) if *t == token) {
            self.live.remove(id);
        }
    }
}
