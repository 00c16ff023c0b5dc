/// Current user's vote on a votable entity.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(i8)]
pub enum VoteState {
    Down = -1,
    None = 0,
    Up = 1,
}

impl VoteState {
    pub fn score(self) -> i64 {
        self as i8 as i64
    }

    /// Boundary normalization for the backend's numeric `user_vote` field;
    /// anything outside -1..=1 counts as no vote.
    pub fn from_raw(raw: i64) -> VoteState {
        match raw {
            1 => VoteState::Up,
            -1 => VoteState::Down,
            _ => VoteState::None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn is_upvote(self) -> bool {
        matches!(self, Direction::Up)
    }
}

/// Result of one toggle request: the state to show and the exact amount
/// to add to the aggregate score. The score is never recomputed from
/// scratch, only ever adjusted by `delta`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VoteChange {
    pub next: VoteState,
    pub delta: i64,
}

/// Toggle semantics: a vote request on an entity that already carries any
/// vote cancels it; only from the no-vote state does a request land on
/// the requested direction. Requests never stack.
pub fn toggle(current: VoteState, requested: Direction) -> VoteChange {
    let next = match (current, requested) {
        (VoteState::None, Direction::Up) => VoteState::Up,
        (VoteState::None, Direction::Down) => VoteState::Down,
        _ => VoteState::None,
    };
    VoteChange {
        next,
        delta: next.score() - current.score(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_table() {
        use VoteState::*;
        let cases = [
            (None, Direction::Up, Up, 1),
            (None, Direction::Down, Down, -1),
            (Up, Direction::Up, None, -1),
            (Down, Direction::Down, None, 1),
            (Up, Direction::Down, None, -1),
            (Down, Direction::Up, None, 1),
        ];
        for (current, requested, next, delta) in cases {
            let change = toggle(current, requested);
            assert_eq!(change.next, next, "{current:?} + {requested:?}");
            assert_eq!(change.delta, delta, "{current:?} + {requested:?}");
        }
    }

    #[test]
    fn delta_is_always_next_minus_current() {
        for current in [VoteState::Down, VoteState::None, VoteState::Up] {
            for requested in [Direction::Up, Direction::Down] {
                let change = toggle(current, requested);
                assert_eq!(change.delta, change.next.score() - current.score());
                assert!(change.delta.abs() <= 2);
            }
        }
    }

    #[test]
    fn same_direction_twice_returns_to_start() {
        for requested in [Direction::Up, Direction::Down] {
            let first = toggle(VoteState::None, requested);
            let second = toggle(first.next, requested);
            assert_eq!(second.next, VoteState::None);
            assert_eq!(first.delta + second.delta, 0);
        }
    }

    #[test]
    fn up_then_down_from_neutral_nets_zero() {
        let up = toggle(VoteState::None, Direction::Up);
        assert_eq!(up.next, VoteState::Up);
        let down = toggle(up.next, Direction::Down);
        assert_eq!(down.next, VoteState::None);
        assert_eq!(down.delta, -1);
        assert_eq!(up.delta + down.delta, 0);
    }

    #[test]
    fn from_raw_clamps_garbage() {
        assert_eq!(VoteState::from_raw(1), VoteState::Up);
        assert_eq!(VoteState::from_raw(-1), VoteState::Down);
        assert_eq!(VoteState::from_raw(0), VoteState::None);
        assert_eq!(VoteState::from_raw(7), VoteState::None);
    }
}
