use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(s: impl Into<String>) -> Result<Self, String> {
        let s = s.into();
        if s.is_empty() {
            return Err("Site ID cannot be empty.".to_string());
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err("Site ID contains invalid characters.".to_string());
        }
        if s.len() > 64 {
            return Err("Site ID is too long (max 64 chars).".to_string());
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 页面分区键：去空白、`/` 换成 `-`、统一小写
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageName(String);

impl PageName {
    pub fn new(raw: &str) -> Result<Self, String> {
        let normalized = raw.trim().replace('/', "-").to_lowercase();
        if normalized.is_empty() {
            return Err("Page name is required".to_string());
        }
        if normalized.contains("..") {
            return Err("Page name cannot contain '..'".to_string());
        }
        if !normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'))
        {
            return Err("Page name contains invalid characters".to_string());
        }
        if normalized.len() > 128 {
            return Err("Page name is too long (max 128 chars)".to_string());
        }
        Ok(Self(normalized))
    }

    /// Derives the page from a URL path: first segment, `home` for the root.
    pub fn from_path(path: &str) -> Result<Self, String> {
        let first = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or("");
        if first.is_empty() {
            Self::new("home")
        } else {
            Self::new(first)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One comments document and one replies document live in each partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Partition {
    pub site_id: SiteId,
    pub page: PageName,
}

impl Partition {
    pub fn new(site_id: SiteId, page: PageName) -> Self {
        Self { site_id, page }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.site_id, self.page)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CommentStatus {
    #[default]
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "resolved")]
    Resolved,
    // 软删除：记录仍在存储中，默认视图过滤掉
    #[serde(rename = "DELETED")]
    Deleted,
}

impl CommentStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "resolved" => Some(Self::Resolved),
            "DELETED" => Some(Self::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Resolved => "resolved",
            Self::Deleted => "DELETED",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for CommentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub text: String,
    pub user: String,
    pub x: f64,
    pub y: f64,
    pub page_name: PageName,
    pub site_id: SiteId,
    #[serde(default)]
    pub status: CommentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    // 旧文档没有版本号，按 0 处理
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub comment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub text: String,
    pub user: String,
    pub page_name: PageName,
    pub site_id: SiteId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

/// A reply with its nested children, assembled from `parent_id` links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyNode {
    #[serde(flatten)]
    pub reply: Reply,
    #[serde(default)]
    pub replies: Vec<ReplyNode>,
}

impl ReplyNode {
    /// Depth-first walk over this node and every descendant.
    pub fn flatten_into(&self, out: &mut Vec<Reply>) {
        out.push(self.reply.clone());
        for child in &self.replies {
            child.flatten_into(out);
        }
    }
}

/// Denormalized read view served by `GET /api/comments/{page}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentWithReplies {
    #[serde(flatten)]
    pub comment: Comment,
    #[serde(default)]
    pub replies: Vec<ReplyNode>,
}

impl CommentWithReplies {
    pub fn new(comment: Comment) -> Self {
        Self {
            comment,
            replies: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.comment.id
    }

    pub fn find_reply_mut(&mut self, reply_id: &str) -> Option<&mut Reply> {
        fn walk<'a>(nodes: &'a mut [ReplyNode], id: &str) -> Option<&'a mut Reply> {
            for node in nodes {
                if node.reply.id == id {
                    return Some(&mut node.reply);
                }
                if let Some(found) = walk(&mut node.replies, id) {
                    return Some(found);
                }
            }
            None
        }
        walk(&mut self.replies, reply_id)
    }
}

/// Builds the reply forest. Records whose `parent_id` does not resolve inside
/// `replies` become roots; input order is kept among siblings.
pub fn build_reply_tree(replies: Vec<Reply>) -> Vec<ReplyNode> {
    use std::collections::{HashMap, HashSet};

    let ids: HashSet<String> = replies.iter().map(|r| r.id.clone()).collect();
    let mut children: HashMap<String, Vec<Reply>> = HashMap::new();
    let mut roots = Vec::new();

    for reply in replies {
        match reply.parent_id.as_deref() {
            Some(parent) if parent != reply.id && ids.contains(parent) => {
                children.entry(parent.to_string()).or_default().push(reply);
            }
            _ => roots.push(reply),
        }
    }

    fn attach(reply: Reply, children: &mut HashMap<String, Vec<Reply>>) -> ReplyNode {
        let kids = children.remove(&reply.id).unwrap_or_default();
        ReplyNode {
            replies: kids.into_iter().map(|k| attach(k, children)).collect(),
            reply,
        }
    }

    let mut tree: Vec<ReplyNode> = roots
        .into_iter()
        .map(|r| attach(r, &mut children))
        .collect();

    // parent_id 成环时没有根可达，按根节点补回
    let mut leftovers: Vec<Reply> = children.drain().flat_map(|(_, v)| v).collect();
    leftovers.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    tree.extend(leftovers.into_iter().map(|r| ReplyNode {
        reply: r,
        replies: Vec::new(),
    }));
    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(id: &str, parent: Option<&str>) -> Reply {
        let now = Utc::now();
        Reply {
            id: id.to_string(),
            comment_id: "c1".to_string(),
            parent_id: parent.map(str::to_string),
            text: format!("text {}", id),
            user: "Bob".to_string(),
            page_name: PageName::new("home").unwrap(),
            site_id: SiteId::new("S").unwrap(),
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn page_name_is_normalized() {
        assert_eq!(PageName::new("  About/Team ").unwrap().as_str(), "about-team");
        assert!(PageName::new("   ").is_err());
        assert!(PageName::new("../etc").is_err());
    }

    #[test]
    fn page_name_from_path_uses_first_segment() {
        assert_eq!(PageName::from_path("/").unwrap().as_str(), "home");
        assert_eq!(PageName::from_path("").unwrap().as_str(), "home");
        assert_eq!(PageName::from_path("/Gallery/photos").unwrap().as_str(), "gallery");
    }

    #[test]
    fn status_uses_wire_spelling() {
        let json = serde_json::to_string(&CommentStatus::Deleted).unwrap();
        assert_eq!(json, "\"DELETED\"");
        let parsed: CommentStatus = serde_json::from_str("\"resolved\"").unwrap();
        assert_eq!(parsed, CommentStatus::Resolved);
        assert_eq!(CommentStatus::parse("Resolved"), None);
    }

    #[test]
    fn reply_tree_nests_by_parent_and_orphans_become_roots() {
        let replies = vec![
            reply("r1", Some("c1")),
            reply("r2", Some("r1")),
            reply("r3", Some("missing")),
            reply("r4", Some("r2")),
        ];

        let tree = build_reply_tree(replies);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].reply.id, "r1");
        assert_eq!(tree[0].replies[0].reply.id, "r2");
        assert_eq!(tree[0].replies[0].replies[0].reply.id, "r4");
        assert_eq!(tree[1].reply.id, "r3");

        let mut flat = Vec::new();
        for node in &tree {
            node.flatten_into(&mut flat);
        }
        assert_eq!(flat.len(), 4);
    }

    #[test]
    fn legacy_records_without_version_deserialize() {
        let json = r#"{
            "id": "c1", "text": "Hi", "user": "Alice", "x": 10.5, "y": 20.25,
            "pageName": "home", "siteId": "S",
            "createdAt": "2024-05-01T10:00:00.000Z", "updatedAt": "2024-05-01T10:00:00.000Z"
        }"#;
        let c: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(c.version, 0);
        assert_eq!(c.status, CommentStatus::Open);
        assert_eq!(c.x, 10.5);
    }
}
