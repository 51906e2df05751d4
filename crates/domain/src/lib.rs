mod draft;
mod models;
pub mod protocol;

pub use draft::{next_id, normalize_edit_text, CommentDraft, ReplyDraft, ValidationError};
pub use models::{
    build_reply_tree, Comment, CommentStatus, CommentWithReplies, PageName, Partition, Reply,
    ReplyNode, SiteId,
};
