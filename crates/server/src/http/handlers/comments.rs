use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use domain::{
    protocol::{ApiResponse, DeleteRequest, DeletedId, PutRequest},
    Comment, CommentDraft, CommentWithReplies, PageName, Partition, Reply, ReplyNode,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::http::error::ApiError;
use crate::state::AppState;

fn partition(state: &AppState, raw_page: &str) -> Result<Partition, ApiError> {
    let page = PageName::new(raw_page).map_err(|e| ApiError::bad_request(e))?;
    Ok(Partition::new(state.site_id.clone(), page))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(v)| v).map_err(|rejection| {
        warn!("Rejected request body: {}", rejection.body_text());
        ApiError::bad_request("Invalid JSON body")
    })
}

pub async fn list_comments(
    State(state): State<AppState>,
    Path(page): Path<String>,
) -> Result<Json<Vec<CommentWithReplies>>, ApiError> {
    let partition = partition(&state, &page)?;

    let (comments, replies) = tokio::try_join!(
        state.store.get_comments(&partition),
        state.store.get_reply_tree(&partition, None),
    )
    .map_err(|e| {
        error!("Error in GET comments for {}: {}", partition, e);
        ApiError::internal("Failed to fetch comments")
    })?;

    let mut by_comment: HashMap<String, Vec<ReplyNode>> = HashMap::new();
    for node in replies {
        by_comment
            .entry(node.reply.comment_id.clone())
            .or_default()
            .push(node);
    }

    let denormalized = comments
        .into_iter()
        .map(|comment| {
            let replies = by_comment.remove(&comment.id).unwrap_or_default();
            CommentWithReplies { comment, replies }
        })
        .collect();

    Ok(Json(denormalized))
}

pub async fn post_comment(
    State(state): State<AppState>,
    Path(page): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<Comment>>, ApiError> {
    let partition = partition(&state, &page)?;
    let body = json_body(payload)?;

    let draft = CommentDraft::from_json(&body).map_err(|e| ApiError::bad_request(e.to_string()))?;

    info!(
        "Creating comment on {}: user={} x={} y={}",
        partition, draft.user, draft.x, draft.y
    );

    let comment = state
        .store
        .add_comment(&partition, &draft)
        .await
        .map_err(|e| ApiError::from_repo(e, StatusCode::BAD_REQUEST, "Failed to add comment"))?;

    Ok(Json(ApiResponse::ok(comment)))
}

/// Replies and comments come back under the same `data` key.
#[derive(serde::Serialize)]
#[serde(untagged)]
pub enum PutData {
    Reply(Reply),
    Comment(Comment),
}

pub async fn put_comment(
    State(state): State<AppState>,
    Path(page): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ApiResponse<PutData>>, ApiError> {
    let partition = partition(&state, &page)?;
    let body = json_body(payload)?;

    let request = PutRequest::from_json(&body).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let data = match request {
        PutRequest::EditReply {
            comment_id,
            reply_id,
            text,
        } => {
            let reply = state
                .store
                .update_reply(&partition, &reply_id, comment_id.as_deref(), Some(&text))
                .await
                .map_err(|e| ApiError::from_repo(e, StatusCode::NOT_FOUND, "Failed to edit reply"))?;
            PutData::Reply(reply)
        }
        PutRequest::AddReply { comment_id, draft } => {
            let reply = state
                .store
                .add_reply(&partition, &comment_id, None, &draft)
                .await
                .map_err(|e| ApiError::from_repo(e, StatusCode::BAD_REQUEST, "Failed to add reply"))?;
            PutData::Reply(reply)
        }
        PutRequest::SetStatus { comment_id, status } => {
            let comment = state
                .store
                .update_comment(&partition, &comment_id, None, Some(status))
                .await
                .map_err(|e| {
                    ApiError::from_repo(e, StatusCode::BAD_REQUEST, "Failed to update status")
                })?;
            PutData::Comment(comment)
        }
        PutRequest::EditComment { comment_id, text } => {
            let comment = state
                .store
                .update_comment(&partition, &comment_id, Some(&text), None)
                .await
                .map_err(|e| {
                    ApiError::from_repo(e, StatusCode::BAD_REQUEST, "Failed to update comment")
                })?;
            if comment.id != comment_id {
                error!(
                    "Comment update on {} returned id {} for requested {}",
                    partition, comment.id, comment_id
                );
                return Err(ApiError::internal("Invalid comment data structure"));
            }
            PutData::Comment(comment)
        }
    };

    Ok(Json(ApiResponse::ok(data)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(page): Path<String>,
    payload: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<DeletedId>>, ApiError> {
    let partition = partition(&state, &page)?;
    let body = json_body(payload)?;
    let comment_id = body
        .comment_id()
        .ok_or_else(|| ApiError::bad_request("Comment ID is required"))?;

    let id = state
        .store
        .delete_comment(&partition, comment_id)
        .await
        .map_err(|e| ApiError::from_repo(e, StatusCode::BAD_REQUEST, "Failed to delete comment"))?;

    // 级联删除回复失败不影响评论删除的结果
    if let Err(e) = state.store.delete_replies_for_comment(&partition, &id).await {
        error!("Failed to delete replies of {} on {}: {}", id, partition, e);
    }

    Ok(Json(ApiResponse::ok(DeletedId { id })))
}

pub async fn missing_page() -> ApiError {
    ApiError::bad_request("Page name is required")
}
