use async_graphql::{Context, Object, Result};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::app::posts::PostService;
use crate::app::users::UserService;
use crate::graphql::types::{PaginatedPosts, PostObject, UserObject};
use crate::graphql::{app_state, bad_input, internal_error, request_context};

#[derive(Debug, Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// The signed-in user, or null for anonymous callers.
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<UserObject>> {
        let Some(user_id) = request_context(ctx)?.current_user_id else {
            return Ok(None);
        };

        let state = app_state(ctx)?;
        let user = UserService::new(state.db.clone())
            .get_user(user_id)
            .await
            .map_err(|err| internal_error(err, "failed to load current user"))?;

        Ok(user.map(Into::into))
    }

    async fn get_all_users(&self, ctx: &Context<'_>) -> Result<Vec<UserObject>> {
        let state = app_state(ctx)?;
        let users = UserService::new(state.db.clone())
            .list_users()
            .await
            .map_err(|err| internal_error(err, "failed to list users"))?;

        Ok(users.into_iter().map(Into::into).collect())
    }

    async fn get_all_posts(&self, ctx: &Context<'_>) -> Result<Vec<PostObject>> {
        let state = app_state(ctx)?;
        let posts = PostService::new(state.db.clone())
            .list_all()
            .await
            .map_err(|err| internal_error(err, "failed to list posts"))?;

        Ok(posts.into_iter().map(Into::into).collect())
    }

    #[graphql(name = "getPostByID")]
    async fn get_post_by_id(&self, ctx: &Context<'_>, id: i32) -> Result<Option<PostObject>> {
        let state = app_state(ctx)?;
        let post = PostService::new(state.db.clone())
            .get_post(id)
            .await
            .map_err(|err| internal_error(err, "failed to load post"))?;

        Ok(post.map(Into::into))
    }

    /// Newest-first page of posts. Pass the previous page's `cursor` to
    /// continue.
    async fn posts(
        &self,
        ctx: &Context<'_>,
        limit: i32,
        cursor: Option<String>,
    ) -> Result<PaginatedPosts> {
        let state = app_state(ctx)?;
        let limit = i64::from(limit).clamp(1, state.posts_page_max);
        let cursor = parse_cursor(cursor.as_deref())?;

        let page = PostService::new(state.db.clone())
            .paginate(limit, cursor)
            .await
            .map_err(|err| internal_error(err, "failed to paginate posts"))?;

        let cursor = encode_cursor(page.next_cursor());
        Ok(PaginatedPosts {
            total_posts: page.total_posts,
            cursor,
            has_more: page.has_more,
            paginated_posts: page.posts.into_iter().map(Into::into).collect(),
        })
    }
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<(OffsetDateTime, i32)>> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .split_once('/')
        .ok_or_else(|| bad_input("invalid cursor"))?;

    let timestamp =
        OffsetDateTime::parse(timestamp, &Rfc3339).map_err(|_| bad_input("invalid cursor"))?;
    let id = id.parse::<i32>().map_err(|_| bad_input("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, i32)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}
