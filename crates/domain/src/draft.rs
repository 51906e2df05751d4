use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Page name is required")]
    PageName,
    #[error("Comment text is required")]
    CommentText,
    #[error("Reply text required")]
    ReplyText,
    #[error("User is required")]
    User,
    #[error("Valid x and y coordinates are required")]
    Coordinates,
    #[error("Comment id required")]
    CommentId,
    #[error("Invalid status")]
    Status,
}

impl ValidationError {
    /// Name of the offending field as it appears on the wire.
    pub fn field(&self) -> &'static str {
        match self {
            Self::PageName => "pageName",
            Self::CommentText | Self::ReplyText => "text",
            Self::User => "user",
            Self::Coordinates => "x/y",
            Self::CommentId => "commentId",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentDraft {
    pub text: String,
    pub user: String,
    pub x: f64,
    pub y: f64,
}

impl CommentDraft {
    pub fn new(text: impl Into<String>, user: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            text: text.into(),
            user: user.into(),
            x,
            y,
        }
    }

    /// Returns the trimmed draft, or the first field that fails.
    pub fn validate(&self) -> Result<CommentDraft, ValidationError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ValidationError::CommentText);
        }
        let user = self.user.trim();
        if user.is_empty() {
            return Err(ValidationError::User);
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(ValidationError::Coordinates);
        }
        Ok(CommentDraft {
            text: text.to_string(),
            user: user.to_string(),
            x: self.x,
            y: self.y,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDraft {
    pub text: String,
    pub user: String,
}

impl ReplyDraft {
    pub fn new(text: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            user: user.into(),
        }
    }

    pub fn validate(&self) -> Result<ReplyDraft, ValidationError> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(ValidationError::ReplyText);
        }
        let user = self.user.trim();
        if user.is_empty() {
            return Err(ValidationError::User);
        }
        Ok(ReplyDraft {
            text: text.to_string(),
            user: user.to_string(),
        })
    }
}

/// Trims an edited text; an edit may never blank a record out.
pub fn normalize_edit_text(text: &str, err: ValidationError) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(err)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Timestamp based id (`c1714557600000`). The millisecond part is bumped
/// until `taken` reports the candidate as free, so ids stay unique inside
/// one partition even when two writes land in the same millisecond.
pub fn next_id(prefix: char, now: DateTime<Utc>, taken: impl Fn(&str) -> bool) -> String {
    let mut millis = now.timestamp_millis();
    loop {
        let candidate = format!("{}{}", prefix, millis);
        if !taken(&candidate) {
            return candidate;
        }
        millis += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_draft_is_trimmed() {
        let d = CommentDraft::new("  Hi ", " Alice ", 10.5, 20.25).validate().unwrap();
        assert_eq!(d.text, "Hi");
        assert_eq!(d.user, "Alice");
        assert_eq!((d.x, d.y), (10.5, 20.25));
    }

    #[test]
    fn comment_draft_reports_failing_field() {
        assert_eq!(
            CommentDraft::new(" ", "Alice", 1.0, 1.0).validate(),
            Err(ValidationError::CommentText)
        );
        assert_eq!(
            CommentDraft::new("Hi", "", 1.0, 1.0).validate(),
            Err(ValidationError::User)
        );
        let err = CommentDraft::new("Hi", "Alice", f64::NAN, 1.0)
            .validate()
            .unwrap_err();
        assert_eq!(err, ValidationError::Coordinates);
        assert_eq!(err.field(), "x/y");
        assert_eq!(
            CommentDraft::new("Hi", "Alice", 1.0, f64::INFINITY).validate(),
            Err(ValidationError::Coordinates)
        );
    }

    #[test]
    fn reply_draft_requires_text_and_user() {
        assert_eq!(
            ReplyDraft::new("", "Bob").validate(),
            Err(ValidationError::ReplyText)
        );
        assert_eq!(
            ReplyDraft::new("Hello back", "  ").validate(),
            Err(ValidationError::User)
        );
    }

    #[test]
    fn next_id_skips_taken_candidates() {
        let now = DateTime::from_timestamp_millis(1_000).unwrap();
        let id = next_id('c', now, |c| c == "c1000" || c == "c1001");
        assert_eq!(id, "c1002");
        assert_eq!(next_id('r', now, |_| false), "r1000");
    }
}
