//! Route handlers.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::context::{CallContext, CorrelationContext};
use crate::http::response::{ApiError, Data};
use crate::http::server::AppState;
use crate::observability::MessageCode;
use crate::posts::{Post, UserAndPosts};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /external`
pub async fn all_posts(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationContext>,
) -> Result<Json<Data<Vec<Post>>>, ApiError> {
    let ctx = CallContext::for_request(correlation);
    let posts = state.posts.all_posts(&ctx).await?;
    Ok(Json(Data::new(posts)))
}

/// `GET /external/users/{user_id}`
pub async fn user_with_posts(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationContext>,
    Path(raw_id): Path<String>,
) -> Result<Json<Data<UserAndPosts>>, ApiError> {
    let user_id = match raw_id.parse::<u64>() {
        Ok(id) => id,
        Err(err) => {
            state.sink.emit(
                MessageCode::BadRequest,
                Some(&correlation),
                &format!("can't get userId from path '{raw_id}': {err}"),
            );
            return Err(ApiError::BadRequest(raw_id));
        }
    };

    let ctx = CallContext::for_request(correlation);
    let found = state.posts.user_with_posts(&ctx, user_id).await?;
    Ok(Json(Data::new(found)))
}
