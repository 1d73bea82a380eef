use time::OffsetDateTime;

const SNIPPET_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub user_id: i32,
    /// Cached sum of every vote value on this post.
    pub points: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Post {
    pub fn text_snippet(&self) -> String {
        self.text.chars().take(SNIPPET_CHARS).collect()
    }
}

/// One page of the newest-first post listing.
#[derive(Debug, Clone)]
pub struct PostPage {
    pub total_posts: i64,
    pub posts: Vec<Post>,
    pub has_more: bool,
}

impl PostPage {
    pub fn next_cursor(&self) -> Option<(OffsetDateTime, i32)> {
        self.posts.last().map(|post| (post.created_at, post.id))
    }
}
