use async_graphql::dataloader::DataLoader;
use async_graphql::{ComplexObject, Context, Enum, InputObject, Result, SimpleObject};
use time::OffsetDateTime;

use crate::domain::post::Post;
use crate::domain::user::{FieldIssue, User};
use crate::domain::vote::VoteType;
use crate::graphql::loaders::{UserLoader, VoteKey, VoteLoader};
use crate::graphql::{internal_error, request_context};

const SERVER_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "User")]
pub struct UserObject {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<User> for UserObject {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "Post", complex)]
pub struct PostObject {
    pub id: i32,
    pub title: String,
    pub text: String,
    pub user_id: i32,
    pub points: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    #[graphql(skip)]
    snippet: String,
}

impl From<Post> for PostObject {
    fn from(post: Post) -> Self {
        Self {
            snippet: post.text_snippet(),
            id: post.id,
            title: post.title,
            text: post.text,
            user_id: post.user_id,
            points: post.points,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

#[ComplexObject]
impl PostObject {
    /// First 50 characters of the body.
    async fn text_snippet(&self) -> String {
        self.snippet.clone()
    }

    async fn user(&self, ctx: &Context<'_>) -> Result<UserObject> {
        let loader = ctx.data::<DataLoader<UserLoader>>()?;
        let user = loader
            .load_one(self.user_id)
            .await
            .map_err(|err| internal_error(err, "failed to load post author"))?;

        match user {
            Some(user) => Ok(user.into()),
            None => Err(internal_error(self.user_id, "post author is missing")),
        }
    }

    /// `1` or `-1` for the caller's vote, `0` when anonymous or not voted.
    async fn current_user_vote_type(&self, ctx: &Context<'_>) -> Result<i32> {
        let Some(user_id) = request_context(ctx)?.current_user_id else {
            return Ok(0);
        };

        let loader = ctx.data::<DataLoader<VoteLoader>>()?;
        let vote = loader
            .load_one(VoteKey {
                post_id: self.id,
                user_id,
            })
            .await
            .map_err(|err| internal_error(err, "failed to load current user vote"))?;

        Ok(vote.map(VoteType::value).unwrap_or(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(name = "VoteType")]
pub enum VoteTypeValue {
    Upvote,
    Downvote,
}

impl From<VoteTypeValue> for VoteType {
    fn from(value: VoteTypeValue) -> Self {
        match value {
            VoteTypeValue::Upvote => VoteType::Upvote,
            VoteTypeValue::Downvote => VoteType::Downvote,
        }
    }
}

#[derive(Debug, InputObject)]
pub struct PostInput {
    pub title: String,
    pub text: String,
}

#[derive(Debug, InputObject)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, InputObject)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, InputObject)]
pub struct ForgotPasswordInput {
    pub email: String,
}

#[derive(Debug, InputObject)]
pub struct ChangePasswordData {
    pub token: String,
    pub user_id: String,
    pub new_password: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "FieldError")]
pub struct FieldErrorObject {
    pub field: String,
    pub message: String,
}

impl From<FieldIssue> for FieldErrorObject {
    fn from(issue: FieldIssue) -> Self {
        Self {
            field: issue.field,
            message: issue.message,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PostMutationResponse {
    pub code: i32,
    pub success: bool,
    pub message: Option<String>,
    pub post: Option<PostObject>,
    pub errors: Option<Vec<FieldErrorObject>>,
}

impl PostMutationResponse {
    pub fn ok(code: i32, message: &str, post: Option<Post>) -> Self {
        Self {
            code,
            success: true,
            message: Some(message.into()),
            post: post.map(Into::into),
            errors: None,
        }
    }

    pub fn failure(code: i32, message: &str) -> Self {
        Self {
            code,
            success: false,
            message: Some(message.into()),
            post: None,
            errors: None,
        }
    }

    pub fn invalid(message: &str, issue: FieldIssue) -> Self {
        Self {
            errors: Some(vec![issue.into()]),
            ..Self::failure(400, message)
        }
    }

    pub fn server_error() -> Self {
        Self {
            errors: Some(vec![FieldIssue::new("server", SERVER_ERROR_MESSAGE).into()]),
            ..Self::failure(500, SERVER_ERROR_MESSAGE)
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct UserMutationResponse {
    pub code: i32,
    pub success: bool,
    pub message: Option<String>,
    pub user: Option<UserObject>,
    pub errors: Option<Vec<FieldErrorObject>>,
}

impl UserMutationResponse {
    pub fn ok(code: i32, message: &str, user: User) -> Self {
        Self {
            code,
            success: true,
            message: Some(message.into()),
            user: Some(user.into()),
            errors: None,
        }
    }

    pub fn failure(code: i32, message: &str) -> Self {
        Self {
            code,
            success: false,
            message: Some(message.into()),
            user: None,
            errors: None,
        }
    }

    pub fn invalid(message: &str, issue: FieldIssue) -> Self {
        Self {
            errors: Some(vec![issue.into()]),
            ..Self::failure(400, message)
        }
    }

    pub fn server_error() -> Self {
        Self {
            errors: Some(vec![FieldIssue::new("server", SERVER_ERROR_MESSAGE).into()]),
            ..Self::failure(500, SERVER_ERROR_MESSAGE)
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PaginatedPosts {
    pub total_posts: i64,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub paginated_posts: Vec<PostObject>,
}
