/// Direction of a single user's vote on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn value(self) -> i32 {
        match self {
            Self::Upvote => 1,
            Self::Downvote => -1,
        }
    }

    pub fn from_db(value: i16) -> Option<Self> {
        match value {
            1 => Some(Self::Upvote),
            -1 => Some(Self::Downvote),
            _ => None,
        }
    }

    pub fn as_db(self) -> i16 {
        match self {
            Self::Upvote => 1,
            Self::Downvote => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub post_id: i32,
    pub user_id: i32,
    pub value: VoteType,
}

/// What has to happen to the vote row for a requested vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Insert,
    Unchanged,
    Flip { from: VoteType },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotePlan {
    pub change: VoteChange,
    pub value: VoteType,
    /// Amount to add to the post's points.
    pub delta: i32,
}

impl VotePlan {
    pub fn is_noop(&self) -> bool {
        self.change == VoteChange::Unchanged
    }
}

/// Decides how a requested vote transitions the existing one.
///
/// The points delta is always `new - old`, so it stays correct if the set of
/// vote magnitudes ever grows beyond +1/-1.
pub fn plan_vote(existing: Option<VoteType>, requested: VoteType) -> VotePlan {
    let old = existing.map(VoteType::value).unwrap_or(0);
    let change = match existing {
        None => VoteChange::Insert,
        Some(current) if current == requested => VoteChange::Unchanged,
        Some(current) => VoteChange::Flip { from: current },
    };

    VotePlan {
        change,
        value: requested,
        delta: requested.value() - old,
    }
}
