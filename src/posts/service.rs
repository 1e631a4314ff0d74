//! Posts operations exposed to the HTTP layer.

use crate::context::CallContext;
use crate::posts::types::{Post, User, UserAndPosts};
use crate::upstream::{CallSpec, ExternalApiError, FanOutAggregator, UpstreamRequest};

/// Status reported when a fan-out succeeds without a user payload.
const MISSING_USER_STATUS: u16 = 502;

enum Fetched {
    User(User),
    Posts(Vec<Post>),
}

/// Reads posts and users from the upstream API.
#[derive(Debug, Clone)]
pub struct PostsService {
    aggregator: FanOutAggregator,
}

impl PostsService {
    pub fn new(aggregator: FanOutAggregator) -> Self {
        Self { aggregator }
    }

    /// `GET {base}/posts`.
    pub async fn all_posts(&self, ctx: &CallContext) -> Result<Vec<Post>, ExternalApiError> {
        let request = UpstreamRequest::get("posts", self.aggregator.caller().endpoint("posts"));
        let calls: Vec<CallSpec<Vec<Post>>> =
            vec![CallSpec::json::<Vec<Post>>(request, std::convert::identity)];
        let mut results = self.aggregator.aggregate(ctx, calls).await?;
        Ok(results.pop().unwrap_or_default())
    }

    /// `GET {base}/users/{id}` and `GET {base}/posts?userId={id}`, concurrently.
    ///
    /// Either call failing cancels the other.
    pub async fn user_with_posts(
        &self,
        ctx: &CallContext,
        user_id: u64,
    ) -> Result<UserAndPosts, ExternalApiError> {
        let caller = self.aggregator.caller();
        let user_url = caller.endpoint(&format!("users/{user_id}"));
        let user_request = UpstreamRequest::get("user", user_url);
        let mut posts_url = caller.endpoint("posts");
        posts_url
            .query_pairs_mut()
            .append_pair("userId", &user_id.to_string());
        let posts_request = UpstreamRequest::get("user_posts", posts_url);
        let user_endpoint = user_request.to_string();

        let calls: Vec<CallSpec<Fetched>> = vec![
            CallSpec::json::<User>(user_request, Fetched::User),
            CallSpec::json::<Vec<Post>>(posts_request, Fetched::Posts),
        ];
        let fetched = self.aggregator.aggregate(ctx, calls).await?;

        let mut user = None;
        let mut posts = Vec::new();
        for item in fetched {
            match item {
                Fetched::User(found) => user = Some(found),
                Fetched::Posts(found) => posts = found,
            }
        }
        let user = user.ok_or_else(|| ExternalApiError::Rejected {
            endpoint: user_endpoint,
            status: MISSING_USER_STATUS,
            body: "user payload missing".to_string(),
        })?;
        Ok(UserAndPosts { user, posts })
    }
}
