//! Blog service
//!
//! Posts, threaded comments and tags. Only the author of a post or comment
//! may change or delete it; a missing object is reported before the
//! ownership check.

use crate::db::repositories::{CommentRepository, PostRepository, TagRepository};
use crate::forms::{CommentForm, PostForm};
use crate::models::{
    build_comment_tree, Comment, ListParams, PagedResult, PostDetail, PostWithMeta, Tag,
    TagWithCount, User,
};
use anyhow::Context;
use std::sync::Arc;
use validator::{Validate, ValidationErrors};

/// Default posts per page
const DEFAULT_POSTS_PER_PAGE: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum BlogError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(String),

    #[error("Invalid form: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct BlogService {
    post_repo: Arc<dyn PostRepository>,
    comment_repo: Arc<dyn CommentRepository>,
    tag_repo: Arc<dyn TagRepository>,
    posts_per_page: u32,
}

impl BlogService {
    pub fn new(
        post_repo: Arc<dyn PostRepository>,
        comment_repo: Arc<dyn CommentRepository>,
        tag_repo: Arc<dyn TagRepository>,
    ) -> Self {
        Self {
            post_repo,
            comment_repo,
            tag_repo,
            posts_per_page: DEFAULT_POSTS_PER_PAGE,
        }
    }

    pub fn with_posts_per_page(mut self, per_page: u32) -> Self {
        self.posts_per_page = per_page;
        self
    }

    /// One page of posts, newest first
    pub async fn list_posts(&self, page: u32) -> Result<PagedResult<PostWithMeta>, BlogError> {
        let params = ListParams::new(page, self.posts_per_page);
        let result = self
            .post_repo
            .list_paged(&params)
            .await
            .context("Failed to list posts")?;

        let mut items = Vec::with_capacity(result.items.len());
        for post in result.items {
            items.push(self.with_tags(post).await?);
        }
        Ok(PagedResult::new(items, result.total, &params))
    }

    pub async fn get_post(&self, id: i64) -> Result<PostWithMeta, BlogError> {
        let post = self
            .post_repo
            .get_with_author(id)
            .await
            .context("Failed to get post")?
            .ok_or(BlogError::NotFound("Post"))?;
        self.with_tags(post).await
    }

    /// Post with its tags and comment tree
    pub async fn get_post_detail(&self, id: i64) -> Result<PostDetail, BlogError> {
        let post = self.get_post(id).await?;
        let rows = self
            .comment_repo
            .list_for_post(id)
            .await
            .context("Failed to list comments")?;

        let comment_count = rows.len();
        Ok(PostDetail {
            post,
            comments: build_comment_tree(rows),
            comment_count,
        })
    }

    pub async fn create_post(&self, author: &User, form: PostForm) -> Result<PostWithMeta, BlogError> {
        let form = form.cleaned();
        form.validate()?;

        let post = self
            .post_repo
            .create(&form.title, &form.content, author.id)
            .await
            .context("Failed to create post")?;
        if let Some(names) = &form.tags {
            self.apply_tags(post.id, names).await?;
        }

        tracing::info!("Post {} created by {}", post.id, author.username);
        self.get_post(post.id).await
    }

    /// The post, if `user` is allowed to change it
    pub async fn post_for_author(&self, user: &User, id: i64) -> Result<PostWithMeta, BlogError> {
        let post = self.get_post(id).await?;
        if !user.owns(post.post.author_id) {
            return Err(BlogError::Forbidden(
                "You do not have permission to modify this post.".to_string(),
            ));
        }
        Ok(post)
    }

    /// Replace title and content. Tags are replaced only when the form carries them.
    pub async fn update_post(
        &self,
        user: &User,
        id: i64,
        form: PostForm,
    ) -> Result<PostWithMeta, BlogError> {
        self.post_for_author(user, id).await?;
        let form = form.cleaned();
        form.validate()?;

        self.post_repo
            .update(id, &form.title, &form.content)
            .await
            .context("Failed to update post")?;
        if let Some(names) = &form.tags {
            self.apply_tags(id, names).await?;
        }
        self.get_post(id).await
    }

    /// Delete the post together with its comments
    pub async fn delete_post(&self, user: &User, id: i64) -> Result<(), BlogError> {
        self.post_for_author(user, id).await?;
        self.post_repo
            .delete(id)
            .await
            .context("Failed to delete post")?;

        tracing::info!("Post {} deleted by {}", id, user.username);
        Ok(())
    }

    pub async fn add_comment(
        &self,
        user: &User,
        post_id: i64,
        form: CommentForm,
    ) -> Result<Comment, BlogError> {
        self.post_repo
            .get_by_id(post_id)
            .await
            .context("Failed to get post")?
            .ok_or(BlogError::NotFound("Post"))?;

        let form = form.cleaned();
        form.validate()?;

        let comment = self
            .comment_repo
            .create(post_id, user.id, None, &form.content)
            .await
            .context("Failed to create comment")?;
        Ok(comment)
    }

    /// Reply to a comment; the reply lands on the parent's post
    pub async fn reply(
        &self,
        user: &User,
        parent_id: i64,
        form: CommentForm,
    ) -> Result<Comment, BlogError> {
        let parent = self.get_comment(parent_id).await?;
        let form = form.cleaned();
        form.validate()?;

        let comment = self
            .comment_repo
            .create(parent.post_id, user.id, Some(parent.id), &form.content)
            .await
            .context("Failed to create reply")?;
        Ok(comment)
    }

    pub async fn update_comment(
        &self,
        user: &User,
        id: i64,
        form: CommentForm,
    ) -> Result<Comment, BlogError> {
        self.comment_for_author(user, id).await?;
        let form = form.cleaned();
        form.validate()?;

        self.comment_repo
            .update(id, &form.content)
            .await
            .context("Failed to update comment")?;
        self.get_comment(id).await
    }

    /// Returns the id of the post the comment was on
    pub async fn delete_comment(&self, user: &User, id: i64) -> Result<i64, BlogError> {
        let comment = self.comment_for_author(user, id).await?;
        self.comment_repo
            .delete(id)
            .await
            .context("Failed to delete comment")?;
        Ok(comment.post_id)
    }

    /// Posts carrying the tag, newest first. Unknown tags give an empty list.
    pub async fn posts_by_tag(&self, tag_name: &str) -> Result<Vec<PostWithMeta>, BlogError> {
        let posts = self
            .post_repo
            .list_by_tag_name(tag_name)
            .await
            .context("Failed to list posts by tag")?;
        self.attach_tags(posts).await
    }

    /// Case-insensitive search over title, content and tag names
    pub async fn search(&self, query: &str) -> Result<Vec<PostWithMeta>, BlogError> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let posts = self
            .post_repo
            .search(&query)
            .await
            .context("Failed to search posts")?;
        self.attach_tags(posts).await
    }

    pub async fn list_tags(&self) -> Result<Vec<TagWithCount>, BlogError> {
        let tags = self
            .tag_repo
            .list_with_counts()
            .await
            .context("Failed to list tags")?;
        Ok(tags)
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn get_comment(&self, id: i64) -> Result<Comment, BlogError> {
        self.comment_repo
            .get_by_id(id)
            .await
            .context("Failed to get comment")?
            .ok_or(BlogError::NotFound("Comment"))
    }

    /// The comment, if `user` may modify it
    pub async fn comment_for_author(&self, user: &User, id: i64) -> Result<Comment, BlogError> {
        let comment = self.get_comment(id).await?;
        if !user.owns(comment.author_id) {
            return Err(BlogError::Forbidden(
                "You do not have permission to modify this comment.".to_string(),
            ));
        }
        Ok(comment)
    }

    async fn apply_tags(&self, post_id: i64, names: &[String]) -> Result<Vec<Tag>, BlogError> {
        let mut tags: Vec<Tag> = Vec::new();
        for name in names {
            let tag = self
                .tag_repo
                .get_or_create(name)
                .await
                .context("Failed to get or create tag")?;
            if !tags.iter().any(|t| t.id == tag.id) {
                tags.push(tag);
            }
        }

        let ids: Vec<i64> = tags.iter().map(|t| t.id).collect();
        self.tag_repo
            .set_post_tags(post_id, &ids)
            .await
            .context("Failed to set post tags")?;
        Ok(tags)
    }

    async fn with_tags(&self, mut post: PostWithMeta) -> Result<PostWithMeta, BlogError> {
        post.tags = self
            .tag_repo
            .tags_for_post(post.post.id)
            .await
            .context("Failed to load post tags")?;
        Ok(post)
    }

    async fn attach_tags(&self, posts: Vec<PostWithMeta>) -> Result<Vec<PostWithMeta>, BlogError> {
        let mut tagged = Vec::with_capacity(posts.len());
        for post in posts {
            tagged.push(self.with_tags(post).await?);
        }
        Ok(tagged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxCommentRepository, SqlxPostRepository, SqlxTagRepository, SqlxUserRepository,
        UserRepository,
    };
    use crate::db::{create_test_pool, migrations};

    struct Fixture {
        service: BlogService,
        alice: User,
        bob: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();

        let users = SqlxUserRepository::new(pool.clone());
        let alice = users
            .create(&User::new("alice".into(), "alice@example.com".into(), "h".into()))
            .await
            .unwrap();
        let bob = users
            .create(&User::new("bob".into(), "bob@example.com".into(), "h".into()))
            .await
            .unwrap();

        let service = BlogService::new(
            SqlxPostRepository::boxed(pool.clone()),
            SqlxCommentRepository::boxed(pool.clone()),
            SqlxTagRepository::boxed(pool),
        );
        Fixture { service, alice, bob }
    }

    fn post_form(title: &str, tags: Option<&[&str]>) -> PostForm {
        PostForm {
            title: title.to_string(),
            content: format!("Body of {}", title),
            tags: tags.map(|t| t.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn comment(content: &str) -> CommentForm {
        CommentForm {
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_post_with_tags() {
        let f = setup().await;
        let post = f
            .service
            .create_post(&f.alice, post_form("Hello", Some(&["rust", "web", "rust"])))
            .await
            .unwrap();

        assert_eq!(post.author, "alice");
        let names: Vec<&str> = post.tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["rust", "web"]);
    }

    #[tokio::test]
    async fn test_only_author_may_update_or_delete_post() {
        let f = setup().await;
        let post = f.service.create_post(&f.alice, post_form("Mine", None)).await.unwrap();
        let id = post.post.id;

        assert!(matches!(
            f.service.update_post(&f.bob, id, post_form("Stolen", None)).await,
            Err(BlogError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.delete_post(&f.bob, id).await,
            Err(BlogError::Forbidden(_))
        ));
        assert!(matches!(
            f.service.delete_post(&f.bob, 999).await,
            Err(BlogError::NotFound("Post"))
        ));

        let updated = f
            .service
            .update_post(&f.alice, id, post_form("Still mine", None))
            .await
            .unwrap();
        assert_eq!(updated.post.title, "Still mine");
        f.service.delete_post(&f.alice, id).await.unwrap();
        assert!(matches!(f.service.get_post(id).await, Err(BlogError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_without_tags_keeps_tags() {
        let f = setup().await;
        let post = f
            .service
            .create_post(&f.alice, post_form("Tagged", Some(&["rust"])))
            .await
            .unwrap();

        let kept = f
            .service
            .update_post(&f.alice, post.post.id, post_form("Tagged v2", None))
            .await
            .unwrap();
        assert_eq!(kept.tags.len(), 1);

        let cleared = f
            .service
            .update_post(&f.alice, post.post.id, post_form("Tagged v3", Some(&[])))
            .await
            .unwrap();
        assert!(cleared.tags.is_empty());
    }

    #[tokio::test]
    async fn test_comment_threads_and_ownership() {
        let f = setup().await;
        let post = f.service.create_post(&f.alice, post_form("Thread", None)).await.unwrap();
        let id = post.post.id;

        let top = f.service.add_comment(&f.bob, id, comment("first")).await.unwrap();
        let reply = f.service.reply(&f.alice, top.id, comment("re: first")).await.unwrap();
        assert_eq!(reply.post_id, id);
        assert_eq!(reply.parent_id, Some(top.id));

        let detail = f.service.get_post_detail(id).await.unwrap();
        assert_eq!(detail.comment_count, 2);
        assert_eq!(detail.comments.len(), 1);
        assert_eq!(detail.comments[0].replies[0].comment.id, reply.id);

        assert!(matches!(
            f.service.update_comment(&f.alice, top.id, comment("edited")).await,
            Err(BlogError::Forbidden(_))
        ));
        let edited = f.service.update_comment(&f.bob, top.id, comment(" edited ")).await.unwrap();
        assert_eq!(edited.content, "edited");

        assert!(matches!(
            f.service.add_comment(&f.bob, id, comment("   ")).await,
            Err(BlogError::Validation(_))
        ));
        assert!(matches!(
            f.service.add_comment(&f.bob, 999, comment("lost")).await,
            Err(BlogError::NotFound("Post"))
        ));

        assert!(matches!(
            f.service.delete_comment(&f.alice, top.id).await,
            Err(BlogError::Forbidden(_))
        ));
        // Missing comments are reported before ownership
        assert!(matches!(
            f.service.delete_comment(&f.alice, 999).await,
            Err(BlogError::NotFound("Comment"))
        ));
        assert!(matches!(
            f.service.update_comment(&f.alice, 999, comment("gone")).await,
            Err(BlogError::NotFound("Comment"))
        ));
        assert_eq!(f.service.comment_for_author(&f.bob, top.id).await.unwrap().id, top.id);

        assert_eq!(f.service.delete_comment(&f.bob, top.id).await.unwrap(), id);
        let detail = f.service.get_post_detail(id).await.unwrap();
        assert_eq!(detail.comment_count, 0);
    }

    #[tokio::test]
    async fn test_list_posts_paginates_newest_first() {
        let f = setup().await;
        for i in 0..7 {
            f.service
                .create_post(&f.alice, post_form(&format!("Post {}", i), None))
                .await
                .unwrap();
        }

        let first = f.service.list_posts(1).await.unwrap();
        assert_eq!(first.total, 7);
        assert_eq!(first.items.len(), 5);
        assert_eq!(first.items[0].post.title, "Post 6");
        assert!(first.has_next());

        let second = f.service.list_posts(2).await.unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.items[1].post.title, "Post 0");
    }

    #[tokio::test]
    async fn test_search_and_tag_listing() {
        let f = setup().await;
        f.service
            .create_post(&f.alice, post_form("Async Rust", Some(&["tokio"])))
            .await
            .unwrap();
        f.service
            .create_post(&f.bob, post_form("Gardening", Some(&["outdoors"])))
            .await
            .unwrap();

        assert_eq!(f.service.search("  RUST ").await.unwrap().len(), 1);
        assert_eq!(f.service.search("tokio").await.unwrap().len(), 1);
        assert!(f.service.search("   ").await.unwrap().is_empty());

        let tagged = f.service.posts_by_tag("outdoors").await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].tags[0].name, "outdoors");
        assert!(f.service.posts_by_tag("missing").await.unwrap().is_empty());

        assert_eq!(f.service.list_tags().await.unwrap().len(), 2);
    }
}
