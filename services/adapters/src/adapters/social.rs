//! # Social Adapter
//!
//! Social feed: posts, comments and the organization feed. Gated by
//! `social_adapter_enabled`.
//!
//! `get_feed` carries a fallback hook that serves an empty page at the
//! requested position, so a feed outage degrades to "nothing to show" when
//! fallback is configured. Invalid feed requests are still rejected.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use engage_config::Environment;
use engage_types::{
    AdapterContext, AdapterResult, CommentId, OrganizationId, Page, PaginatedResult,
    PaginationParams, PostId, UserId,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::page_of;
use crate::common::{empty_page, BaseAdapter, DomainAdapter};
use crate::config::AdapterConfig;
use crate::error::AdapterError;
use crate::factory::AdapterType;
use crate::flags::FeatureFlagEvaluator;
use crate::validation::{
    validate_sort_field, AdapterValidator, IdSchema, PaginationInput, PaginationSchema, Schema,
    SchemaViolations, TextBounds, ViolationCollector,
};

/// Longest accepted image URL
const MAX_IMAGE_URL_LEN: usize = 2_048;

const SORT_FIELDS: &[&str] = &["createdAt"];

/// Kind of post in the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    #[default]
    Text,
    Recognition,
    Announcement,
}

impl FromStr for PostType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(PostType::Text),
            "recognition" => Ok(PostType::Recognition),
            "announcement" => Ok(PostType::Announcement),
            other => Err(format!(
                "must be one of text, recognition, announcement (got '{}')",
                other
            )),
        }
    }
}

/// Feed post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub organization_id: OrganizationId,
    pub author_id: UserId,
    pub content: String,
    pub image_url: Option<String>,
    pub post_type: PostType,
    pub comment_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Comment on a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Raw post request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostInput {
    pub organization_id: i64,
    pub author_id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub post_type: Option<String>,
}

/// Validated post request
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub organization_id: OrganizationId,
    pub author_id: UserId,
    pub content: String,
    pub image_url: Option<String>,
    pub post_type: PostType,
}

/// Raw comment request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentInput {
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
}

/// Validated comment request
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub post_id: PostId,
    pub author_id: UserId,
    pub content: String,
}

/// Social data collaborator
#[async_trait]
pub trait SocialStore: Send + Sync {
    async fn insert_post(&self, post: NewPost) -> anyhow::Result<Post>;

    async fn find_post(&self, id: PostId) -> anyhow::Result<Option<Post>>;

    /// Posts of one organization
    async fn feed(
        &self,
        organization_id: OrganizationId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Post>>;

    /// `None` when the post does not exist
    async fn insert_comment(&self, comment: NewComment) -> anyhow::Result<Option<Comment>>;

    /// Delete a post and its comments; `false` when it did not exist
    async fn delete_post(&self, id: PostId) -> anyhow::Result<bool>;
}

struct CreatePostSchema;

impl Schema<CreatePostInput> for CreatePostSchema {
    type Output = NewPost;

    fn parse(&self, input: CreatePostInput) -> std::result::Result<NewPost, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let image_url = input
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        if let Some(url) = &image_url {
            v.ensure(
                url.starts_with("https://") || url.starts_with("http://"),
                "imageUrl",
                "must be an http(s) URL",
            );
            v.ensure(
                url.len() <= MAX_IMAGE_URL_LEN,
                "imageUrl",
                format!("must be at most {} characters", MAX_IMAGE_URL_LEN),
            );
        }
        let post_type = match input.post_type.as_deref() {
            None => PostType::default(),
            Some(raw) => raw.parse().unwrap_or_else(|message: String| {
                v.push("postType", message);
                PostType::default()
            }),
        };

        let post = NewPost {
            organization_id: v.id("organizationId", input.organization_id),
            author_id: v.id("authorId", input.author_id),
            content: v.text("content", &input.content, TextBounds::BODY),
            image_url,
            post_type,
        };
        v.finish(post)
    }
}

struct AddCommentSchema;

impl Schema<AddCommentInput> for AddCommentSchema {
    type Output = NewComment;

    fn parse(&self, input: AddCommentInput) -> std::result::Result<NewComment, SchemaViolations> {
        let mut v = ViolationCollector::new();
        let comment = NewComment {
            post_id: v.id("postId", input.post_id),
            author_id: v.id("authorId", input.author_id),
            content: v.text("content", &input.content, TextBounds::BODY),
        };
        v.finish(comment)
    }
}

fn body_within_bounds(body: &str) -> bool {
    let len = body.trim().chars().count();
    len >= TextBounds::BODY.min && len <= TextBounds::BODY.max
}

/// Stored posts must still satisfy the write-side constraints
struct PostRecordSchema;

impl Schema<Post> for PostRecordSchema {
    type Output = Post;

    fn parse(&self, post: Post) -> std::result::Result<Post, SchemaViolations> {
        let mut v = ViolationCollector::new();
        v.ensure(!post.id.is_null(), "id", "must be a positive integer");
        v.ensure(!post.organization_id.is_null(), "organizationId", "must be a positive integer");
        v.ensure(!post.author_id.is_null(), "authorId", "must be a positive integer");
        v.ensure(
            body_within_bounds(&post.content),
            "content",
            format!("must be 1 to {} characters", TextBounds::BODY.max),
        );
        v.finish(post)
    }
}

struct CommentRecordSchema;

impl Schema<Comment> for CommentRecordSchema {
    type Output = Comment;

    fn parse(&self, comment: Comment) -> std::result::Result<Comment, SchemaViolations> {
        let mut v = ViolationCollector::new();
        v.ensure(!comment.id.is_null(), "id", "must be a positive integer");
        v.ensure(!comment.post_id.is_null(), "postId", "must be a positive integer");
        v.ensure(!comment.author_id.is_null(), "authorId", "must be a positive integer");
        v.ensure(
            body_within_bounds(&comment.content),
            "content",
            format!("must be 1 to {} characters", TextBounds::BODY.max),
        );
        v.finish(comment)
    }
}

/// Social feed adapter
pub struct SocialAdapter {
    base: BaseAdapter,
    store: Arc<dyn SocialStore>,
}

impl SocialAdapter {
    pub const NAME: &'static str = "SocialAdapter";

    /// Adapter with default config, gated by `social_adapter_enabled`
    pub fn new(
        store: Arc<dyn SocialStore>,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        let config =
            AdapterConfig::new(Self::NAME).with_feature_flag(AdapterType::Social.flag_key());
        Self::with_config(config, store, evaluator, environment)
    }

    pub fn with_config(
        config: AdapterConfig,
        store: Arc<dyn SocialStore>,
        evaluator: Arc<dyn FeatureFlagEvaluator>,
        environment: Environment,
    ) -> Self {
        Self {
            base: BaseAdapter::new(config, evaluator, environment),
            store,
        }
    }

    pub async fn create_post(
        &self,
        input: CreatePostInput,
        ctx: &AdapterContext,
    ) -> AdapterResult<Post> {
        self.base
            .execute_operation("create_post", ctx, || async move {
                let new_post = AdapterValidator::validate(&CreatePostSchema, input)?;
                let post = self.store.insert_post(new_post).await.context("insert post")?;
                AdapterValidator::validate(&PostRecordSchema, post)
            })
            .await
    }

    pub async fn get_post(&self, id: i64, ctx: &AdapterContext) -> AdapterResult<Post> {
        self.base
            .execute_operation("get_post", ctx, || async move {
                let id: PostId = AdapterValidator::validate(&IdSchema::new("id"), id)?;
                let post = self
                    .store
                    .find_post(id)
                    .await
                    .with_context(|| format!("load post {}", id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Post",
                        id: id.inner(),
                    })?;
                AdapterValidator::validate(&PostRecordSchema, post)
            })
            .await
    }

    /// Newest posts first unless `sortOrder=asc`
    pub async fn get_feed(
        &self,
        organization_id: i64,
        pagination: PaginationInput,
        ctx: &AdapterContext,
    ) -> PaginatedResult<Post> {
        let fallback_pagination = pagination.clone();
        self.base
            .execute_paginated_with_fallback(
                "get_feed",
                ctx,
                || async move {
                    let org: OrganizationId = AdapterValidator::validate(
                        &IdSchema::new("organizationId"),
                        organization_id,
                    )?;
                    let params = feed_params(pagination)?;
                    let page = self
                        .store
                        .feed(org, &params)
                        .await
                        .with_context(|| format!("load feed of organization {}", org.inner()))?;
                    Ok((params, page))
                },
                empty_page(move || feed_params(fallback_pagination)),
            )
            .await
    }

    pub async fn add_comment(
        &self,
        input: AddCommentInput,
        ctx: &AdapterContext,
    ) -> AdapterResult<Comment> {
        self.base
            .execute_operation("add_comment", ctx, || async move {
                let new_comment = AdapterValidator::validate(&AddCommentSchema, input)?;
                let post_id = new_comment.post_id;
                let comment = self
                    .store
                    .insert_comment(new_comment)
                    .await
                    .with_context(|| format!("insert comment on post {}", post_id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Post",
                        id: post_id.inner(),
                    })?;
                AdapterValidator::validate(&CommentRecordSchema, comment)
            })
            .await
    }

    /// Only the author may delete a post
    pub async fn delete_post(
        &self,
        id: i64,
        requester_id: i64,
        ctx: &AdapterContext,
    ) -> AdapterResult<PostId> {
        self.base
            .execute_operation("delete_post", ctx, || async move {
                let id: PostId = AdapterValidator::validate(&IdSchema::new("id"), id)?;
                let requester: UserId =
                    AdapterValidator::validate(&IdSchema::new("requesterId"), requester_id)?;
                let post = self
                    .store
                    .find_post(id)
                    .await
                    .with_context(|| format!("load post {}", id.inner()))?
                    .ok_or(AdapterError::NotFound {
                        entity: "Post",
                        id: id.inner(),
                    })?;
                let post = AdapterValidator::validate(&PostRecordSchema, post)?;
                if post.author_id != requester {
                    return Err(AdapterError::Forbidden {
                        action: format!("delete post {}", id.inner()),
                    });
                }
                let deleted = self
                    .store
                    .delete_post(id)
                    .await
                    .with_context(|| format!("delete post {}", id.inner()))?;
                if !deleted {
                    return Err(AdapterError::NotFound {
                        entity: "Post",
                        id: id.inner(),
                    });
                }
                Ok(id)
            })
            .await
    }
}

fn feed_params(pagination: PaginationInput) -> crate::error::Result<PaginationParams> {
    let params = AdapterValidator::validate(&PaginationSchema, pagination)?;
    validate_sort_field(&params, SORT_FIELDS)?;
    Ok(params)
}

impl DomainAdapter for SocialAdapter {
    fn base(&self) -> &BaseAdapter {
        &self.base
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Social
    }
}

/// `DashMap`-backed post and comment store
#[derive(Debug, Default)]
pub struct InMemorySocialStore {
    posts: DashMap<PostId, Post>,
    comments: DashMap<CommentId, Comment>,
    next_post_id: AtomicU64,
    next_comment_id: AtomicU64,
}

impl InMemorySocialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

#[async_trait]
impl SocialStore for InMemorySocialStore {
    async fn insert_post(&self, post: NewPost) -> anyhow::Result<Post> {
        let id = PostId::new(self.next_post_id.fetch_add(1, Ordering::Relaxed) + 1);
        let row = Post {
            id,
            organization_id: post.organization_id,
            author_id: post.author_id,
            content: post.content,
            image_url: post.image_url,
            post_type: post.post_type,
            comment_count: 0,
            created_at: Utc::now(),
        };
        self.posts.insert(id, row.clone());
        Ok(row)
    }

    async fn find_post(&self, id: PostId) -> anyhow::Result<Option<Post>> {
        Ok(self.posts.get(&id).map(|row| row.value().clone()))
    }

    async fn feed(
        &self,
        organization_id: OrganizationId,
        params: &PaginationParams,
    ) -> anyhow::Result<Page<Post>> {
        let rows: Vec<Post> = self
            .posts
            .iter()
            .filter(|row| row.organization_id == organization_id)
            .map(|row| row.value().clone())
            .collect();
        Ok(page_of(rows, params, |a, b| {
            a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id))
        }))
    }

    async fn insert_comment(&self, comment: NewComment) -> anyhow::Result<Option<Comment>> {
        let Some(mut post) = self.posts.get_mut(&comment.post_id) else {
            return Ok(None);
        };
        let id = CommentId::new(self.next_comment_id.fetch_add(1, Ordering::Relaxed) + 1);
        let row = Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: Utc::now(),
        };
        post.comment_count = post.comment_count.saturating_add(1);
        drop(post);
        self.comments.insert(id, row.clone());
        Ok(Some(row))
    }

    async fn delete_post(&self, id: PostId) -> anyhow::Result<bool> {
        if self.posts.remove(&id).is_none() {
            return Ok(false);
        }
        self.comments.retain(|_, comment| comment.post_id != id);
        Ok(true)
    }
}
