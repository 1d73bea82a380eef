pub mod cache;
pub mod db;
pub mod mailer;
pub mod reset_tokens;
pub mod sessions;
