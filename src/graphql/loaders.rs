use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::Loader;

use crate::app::users::UserService;
use crate::app::votes::votes_by_keys;
use crate::domain::user::User;
use crate::domain::vote::VoteType;
use crate::infra::db::Db;

/// Batches `Post.user` lookups within one request.
pub struct UserLoader {
    users: UserService,
}

impl UserLoader {
    pub fn new(db: Db) -> Self {
        Self {
            users: UserService::new(db),
        }
    }
}

impl Loader<i32> for UserLoader {
    type Value = User;
    type Error = Arc<sqlx::Error>;

    async fn load(&self, keys: &[i32]) -> Result<HashMap<i32, Self::Value>, Self::Error> {
        let users = self.users.users_by_ids(keys).await.map_err(Arc::new)?;
        Ok(users.into_iter().map(|user| (user.id, user)).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteKey {
    pub post_id: i32,
    pub user_id: i32,
}

/// Batches `Post.currentUserVoteType` lookups within one request.
pub struct VoteLoader {
    db: Db,
}

impl VoteLoader {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

impl Loader<VoteKey> for VoteLoader {
    type Value = VoteType;
    type Error = Arc<sqlx::Error>;

    async fn load(&self, keys: &[VoteKey]) -> Result<HashMap<VoteKey, Self::Value>, Self::Error> {
        let pairs: Vec<(i32, i32)> = keys.iter().map(|key| (key.post_id, key.user_id)).collect();
        let votes = votes_by_keys(&self.db, &pairs).await.map_err(Arc::new)?;

        Ok(votes
            .into_iter()
            .map(|vote| {
                let key = VoteKey {
                    post_id: vote.post_id,
                    user_id: vote.user_id,
                };
                (key, vote.value)
            })
            .collect())
    }
}
