pub mod auth;
pub mod password_reset;
pub mod posts;
pub mod users;
pub mod votes;
