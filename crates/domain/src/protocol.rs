use crate::draft::{CommentDraft, ReplyDraft, ValidationError};
use crate::models::CommentStatus;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// `{ success: true, data }` or `{ success: false, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedId {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    #[serde(default)]
    pub comment_id: Option<String>,
}

impl DeleteRequest {
    pub fn comment_id(&self) -> Option<&str> {
        self.comment_id.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl CommentDraft {
    /// Field-by-field check of an untrusted POST body; type mismatches are
    /// reported against the field they occur in.
    pub fn from_json(body: &Value) -> Result<CommentDraft, ValidationError> {
        let text = non_empty_str(body, "text").ok_or(ValidationError::CommentText)?;
        let user = non_empty_str(body, "user").ok_or(ValidationError::User)?;
        let x = body.get("x").and_then(Value::as_f64);
        let y = body.get("y").and_then(Value::as_f64);
        match (x, y) {
            (Some(x), Some(y)) => CommentDraft::new(text, user, x, y).validate(),
            _ => Err(ValidationError::Coordinates),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PutRequestError {
    #[error("Invalid request type")]
    InvalidType,
    #[error("Missing required fields")]
    MissingReplyFields,
    #[error("Text is required for comment update")]
    MissingCommentText,
    #[error("Text is required for reply update")]
    MissingReplyText,
    #[error("Invalid status")]
    InvalidStatus,
}

/// The four operations multiplexed onto `PUT /api/comments/{page}`.
#[derive(Debug, Clone, PartialEq)]
pub enum PutRequest {
    EditReply {
        comment_id: Option<String>,
        reply_id: String,
        text: String,
    },
    AddReply {
        comment_id: String,
        draft: ReplyDraft,
    },
    SetStatus {
        comment_id: String,
        status: CommentStatus,
    },
    EditComment { comment_id: String, text: String },
}

impl PutRequest {
    /// Exactly one shape must match; zero or several matches are rejected
    /// with [`PutRequestError::InvalidType`].
    pub fn from_json(body: &Value) -> Result<Self, PutRequestError> {
        let edit = flag(body, "edit");
        let reply = flag(body, "reply");
        let reply_id = non_empty_str(body, "replyId");
        let comment_id = non_empty_str(body, "commentId");
        let has_status = body.get("status").is_some_and(truthy);

        let is_edit_reply = edit && reply_id.is_some();
        let is_add_reply = reply;
        let is_set_status = has_status && comment_id.is_some();
        let is_edit_comment = edit && reply_id.is_none() && comment_id.is_some();

        let matched = [is_edit_reply, is_add_reply, is_set_status, is_edit_comment]
            .iter()
            .filter(|m| **m)
            .count();
        if matched != 1 {
            return Err(PutRequestError::InvalidType);
        }

        if is_edit_reply {
            let text = non_empty_str(body, "text").ok_or(PutRequestError::MissingReplyText)?;
            return Ok(Self::EditReply {
                comment_id: comment_id.map(str::to_string),
                reply_id: reply_id.unwrap_or_default().to_string(),
                text: text.to_string(),
            });
        }

        if is_add_reply {
            let (Some(comment_id), Some(text), Some(user)) = (
                comment_id,
                non_empty_str(body, "text"),
                non_empty_str(body, "user"),
            ) else {
                return Err(PutRequestError::MissingReplyFields);
            };
            return Ok(Self::AddReply {
                comment_id: comment_id.to_string(),
                draft: ReplyDraft::new(text, user),
            });
        }

        if is_set_status {
            let status = body
                .get("status")
                .and_then(Value::as_str)
                .and_then(CommentStatus::parse)
                .ok_or(PutRequestError::InvalidStatus)?;
            return Ok(Self::SetStatus {
                comment_id: comment_id.unwrap_or_default().to_string(),
                status,
            });
        }

        let text = non_empty_str(body, "text").ok_or(PutRequestError::MissingCommentText)?;
        Ok(Self::EditComment {
            comment_id: comment_id.unwrap_or_default().to_string(),
            text: text.to_string(),
        })
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::EditReply {
                comment_id,
                reply_id,
                text,
            } => {
                let mut body = json!({ "edit": true, "replyId": reply_id, "text": text });
                if let Some(cid) = comment_id {
                    body["commentId"] = json!(cid);
                }
                body
            }
            Self::AddReply { comment_id, draft } => json!({
                "reply": true,
                "commentId": comment_id,
                "text": draft.text,
                "user": draft.user,
            }),
            Self::SetStatus { comment_id, status } => json!({
                "status": status.as_str(),
                "commentId": comment_id,
            }),
            Self::EditComment { comment_id, text } => json!({
                "edit": true,
                "commentId": comment_id,
                "text": text,
            }),
        }
    }
}

fn flag(body: &Value, key: &str) -> bool {
    body.get(key).and_then(Value::as_bool).unwrap_or(false)
}

// "", false, 0 和 null 都算没传
fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn non_empty_str<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_invalid_type() {
        assert_eq!(
            PutRequest::from_json(&json!({})),
            Err(PutRequestError::InvalidType)
        );
    }

    #[test]
    fn each_shape_is_recognized() {
        let edit_reply =
            json!({ "edit": true, "replyId": "r1", "commentId": "c1", "text": "fixed" });
        assert!(matches!(
            PutRequest::from_json(&edit_reply),
            Ok(PutRequest::EditReply { .. })
        ));

        let add_reply = json!({ "reply": true, "commentId": "c1", "text": "hey", "user": "Bob" });
        assert!(matches!(
            PutRequest::from_json(&add_reply),
            Ok(PutRequest::AddReply { .. })
        ));

        let status = json!({ "status": "resolved", "commentId": "c1" });
        assert_eq!(
            PutRequest::from_json(&status),
            Ok(PutRequest::SetStatus {
                comment_id: "c1".into(),
                status: CommentStatus::Resolved
            })
        );

        let edit_comment = json!({ "edit": true, "commentId": "c1", "text": "new" });
        assert!(matches!(
            PutRequest::from_json(&edit_comment),
            Ok(PutRequest::EditComment { .. })
        ));
    }

    #[test]
    fn ambiguous_payloads_are_rejected() {
        let both = json!({ "edit": true, "commentId": "c1", "text": "x", "status": "open" });
        assert_eq!(PutRequest::from_json(&both), Err(PutRequestError::InvalidType));

        let reply_and_edit = json!({ "edit": true, "reply": true, "replyId": "r1", "text": "x" });
        assert_eq!(
            PutRequest::from_json(&reply_and_edit),
            Err(PutRequestError::InvalidType)
        );
    }

    #[test]
    fn shape_specific_field_errors() {
        assert_eq!(
            PutRequest::from_json(&json!({ "reply": true, "commentId": "c1", "text": "x" })),
            Err(PutRequestError::MissingReplyFields)
        );
        assert_eq!(
            PutRequest::from_json(&json!({ "edit": true, "commentId": "c1" })),
            Err(PutRequestError::MissingCommentText)
        );
        assert_eq!(
            PutRequest::from_json(&json!({ "status": "archived", "commentId": "c1" })),
            Err(PutRequestError::InvalidStatus)
        );
        assert_eq!(
            PutRequest::from_json(&json!({ "status": 3, "commentId": "c1" })),
            Err(PutRequestError::InvalidStatus)
        );
    }

    #[test]
    fn falsy_status_matches_no_shape() {
        for status in [json!(""), json!(false), json!(0), json!(null)] {
            assert_eq!(
                PutRequest::from_json(&json!({ "status": status, "commentId": "c1" })),
                Err(PutRequestError::InvalidType)
            );
        }
    }

    #[test]
    fn to_json_parses_back_to_same_shape() {
        let req = PutRequest::AddReply {
            comment_id: "c1".into(),
            draft: ReplyDraft::new("Hello back", "Bob"),
        };
        assert_eq!(PutRequest::from_json(&req.to_json()), Ok(req));
    }

    #[test]
    fn post_body_validation_names_the_field() {
        assert_eq!(
            CommentDraft::from_json(&json!({ "text": 5, "user": "A", "x": 1, "y": 2 })),
            Err(ValidationError::CommentText)
        );
        assert_eq!(
            CommentDraft::from_json(&json!({ "text": "Hi", "user": "A", "x": 1 })),
            Err(ValidationError::Coordinates)
        );
        assert_eq!(
            CommentDraft::from_json(&json!({ "text": "Hi", "user": "A", "x": "1", "y": 2 })),
            Err(ValidationError::Coordinates)
        );
        let ok = CommentDraft::from_json(&json!({ "text": "Hi", "user": "Alice", "x": 10.5, "y": 20.25 }))
            .unwrap();
        assert_eq!(ok.x, 10.5);
    }

    #[test]
    fn api_response_shapes() {
        let ok = serde_json::to_value(ApiResponse::ok(DeletedId { id: "c1".into() })).unwrap();
        assert_eq!(ok, json!({ "success": true, "data": { "id": "c1" } }));
        let err = serde_json::to_value(ApiResponse::<()>::err("Invalid request type")).unwrap();
        assert_eq!(err, json!({ "success": false, "error": "Invalid request type" }));
    }
}
