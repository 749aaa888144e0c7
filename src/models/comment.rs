//! Comment model and threaded comment tree

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comment entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    /// Parent comment for replies
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment row joined with its author, as loaded for a post
#[derive(Debug, Clone)]
pub struct CommentRow {
    pub comment: Comment,
    pub author: String,
    pub author_email: String,
}

/// Comment with author info and nested replies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Generate Gravatar URL from email
    pub fn gravatar_url(email: &str) -> String {
        let email = email.trim();
        if email.is_empty() {
            return "https://www.gravatar.com/avatar/?d=mp&s=80".to_string();
        }
        let hash = format!("{:x}", md5::compute(email.to_lowercase()));
        format!("https://www.gravatar.com/avatar/{}?d=mp&s=80", hash)
    }

    /// Number of comments in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::count).sum::<usize>()
    }
}

/// Build the reply tree from rows already in display order.
///
/// Sibling order follows the input order. Replies whose parent is missing
/// are promoted to the top level.
pub fn build_comment_tree(rows: Vec<CommentRow>) -> Vec<CommentNode> {
    let ids: std::collections::HashSet<i64> = rows.iter().map(|r| r.comment.id).collect();

    let mut roots: Vec<CommentNode> = Vec::new();
    let mut replies_map: HashMap<i64, Vec<CommentNode>> = HashMap::new();

    for row in rows {
        let node = CommentNode {
            avatar_url: CommentNode::gravatar_url(&row.author_email),
            author: row.author,
            comment: row.comment,
            replies: Vec::new(),
        };
        match node.comment.parent_id {
            Some(pid) if ids.contains(&pid) => replies_map.entry(pid).or_default().push(node),
            _ => roots.push(node),
        }
    }

    fn attach(node: &mut CommentNode, replies_map: &mut HashMap<i64, Vec<CommentNode>>) {
        if let Some(mut children) = replies_map.remove(&node.comment.id) {
            for child in &mut children {
                attach(child, replies_map);
            }
            node.replies = children;
        }
    }

    for root in &mut roots {
        attach(root, &mut replies_map);
    }

    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(id: i64, parent_id: Option<i64>, minutes: i64) -> CommentRow {
        let at = Utc::now() + Duration::minutes(minutes);
        CommentRow {
            comment: Comment {
                id,
                post_id: 1,
                author_id: 1,
                parent_id,
                content: format!("comment {}", id),
                created_at: at,
                updated_at: at,
            },
            author: "reader".to_string(),
            author_email: "reader@example.com".to_string(),
        }
    }

    #[test]
    fn test_build_tree_nests_replies_recursively() {
        let rows = vec![
            row(1, None, 0),
            row(2, Some(1), 1),
            row(3, None, 2),
            row(4, Some(2), 3),
            row(5, Some(1), 4),
        ];

        let tree = build_comment_tree(rows);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].comment.id, 1);
        assert_eq!(tree[1].comment.id, 3);

        let replies: Vec<i64> = tree[0].replies.iter().map(|n| n.comment.id).collect();
        assert_eq!(replies, vec![2, 5]);
        assert_eq!(tree[0].replies[0].replies[0].comment.id, 4);
        assert_eq!(tree[0].count(), 4);
    }

    #[test]
    fn test_orphan_reply_promoted_to_root() {
        let tree = build_comment_tree(vec![row(9, Some(42), 0)]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.id, 9);
    }

    #[test]
    fn test_gravatar_url() {
        let url = CommentNode::gravatar_url(" Reader@Example.com ");
        let expected = format!("{:x}", md5::compute("reader@example.com"));
        assert!(url.contains(&expected));
        assert_eq!(
            CommentNode::gravatar_url(""),
            "https://www.gravatar.com/avatar/?d=mp&s=80"
        );
    }
}
