//! The content-store seam: typed records for posts, categories, tags, and
//! site settings, and the [`ContentStore`] trait the three interchangeable
//! backends implement ([`crate::api_store`], [`crate::db_store`],
//! [`crate::file_store`]). Rendering code only ever sees the trait; which
//! backend is live is a configuration decision made once in [`open`].
//!
//! Failure policy: trait methods are honest and return [`Result`]; the page
//! assembly layer goes through [`Degraded`], which swallows every query
//! failure into an empty/absent result and logs a warning. A transient
//! backend outage therefore renders an empty-state page rather than an error
//! page, at the documented cost of hiding real errors from the end user.
//! Not-found stays distinct from failure: `Ok(None)` means the record
//! genuinely doesn't exist and surfaces as the not-found page.

use crate::config::BackendConfig;
use crate::doc::Document;
use crate::image::ImageRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::warn;
use std::fmt;

/// A post as it appears in listings. Everything needed to render a card.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub main_image: Option<ImageRef>,
    pub published_at: Option<DateTime<Utc>>,
    pub category: Option<CategoryRef>,
    pub tags: Vec<TagRef>,
}

/// A full post. Superset of [`PostSummary`]: adds the body document, SEO
/// overrides, author, and the update timestamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Post {
    pub summary: PostSummary,
    pub body: Document,
    pub updated_at: Option<DateTime<Utc>>,
    pub author: Option<Author>,
    pub seo: Option<Seo>,
}

/// Category as embedded in a post record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CategoryRef {
    pub id: Option<String>,
    pub title: String,
    pub slug: String,
    pub color: Option<String>,
}

/// Tag as embedded in a post record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TagRef {
    pub id: Option<String>,
    pub title: String,
    pub slug: String,
}

/// A category record with its published-post count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Category {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub post_count: usize,
}

/// A tag record with its published-post count.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tag {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub post_count: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Author {
    pub name: String,
    pub bio: Option<String>,
    pub image: Option<ImageRef>,
}

/// Per-post SEO overrides; fall back to title/excerpt when absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Seo {
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub og_image: Option<ImageRef>,
}

/// Site-wide settings edited outside this pipeline. Canonical field naming is
/// snake_case.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SiteSettings {
    pub title: String,
    pub description: Option<String>,
    pub hero_tagline: Option<String>,
    pub hero_subtitle: Option<String>,
    pub about_title: Option<String>,
    pub about_content: Option<Document>,
    pub contact_email: Option<String>,
    pub footer_text: Option<String>,
    pub social_links: Vec<SocialLink>,
}

#[derive(Clone, Debug, Default, PartialEq, serde::Deserialize)]
pub struct SocialLink {
    pub label: String,
    pub url: String,
}

/// Parameters for one listing query. `search` matches title/excerpt (and
/// body text where the backend can do it cheaply); `category`/`tag` filter
/// by slug.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub page: usize,
    pub per_page: usize,
    pub search: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

impl ListQuery {
    pub fn page(page: usize, per_page: usize) -> ListQuery {
        ListQuery {
            page: page.max(1),
            per_page,
            ..ListQuery::default()
        }
    }

    /// The zero-based offset of the first post on this page.
    pub fn start(&self) -> usize {
        (self.page.max(1) - 1) * self.per_page
    }
}

/// One page of posts plus the total match count (for pagination).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Listing {
    pub posts: Vec<PostSummary>,
    pub total: usize,
}

/// Read-only queries against a content backend. All operations are
/// suspension points; callers await completion before rendering. No write
/// interface exists in this pipeline.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Full post lookup by slug. `Ok(None)` when no such post exists.
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>>;

    /// One page of published posts, newest first, plus the total count.
    async fn list_posts(&self, query: &ListQuery) -> Result<Listing>;

    /// Up to four published posts sharing `category_id` or any of `tag_ids`
    /// with the post at `slug`, excluding that post itself.
    async fn related_posts(
        &self,
        slug: &str,
        category_id: Option<&str>,
        tag_ids: &[String],
    ) -> Result<Vec<PostSummary>>;

    async fn categories(&self) -> Result<Vec<Category>>;
    async fn tags(&self) -> Result<Vec<Tag>>;
    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>>;
    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>>;

    /// Slug enumeration for static generation and the sitemap.
    async fn post_slugs(&self) -> Result<Vec<String>>;
    async fn category_slugs(&self) -> Result<Vec<String>>;
    async fn tag_slugs(&self) -> Result<Vec<String>>;

    /// The singleton settings record, if the backend has one.
    async fn settings(&self) -> Result<Option<SiteSettings>>;
}

/// Opens the backend selected by configuration. This is the only place that
/// knows which implementations exist.
pub async fn open(backend: &BackendConfig) -> Result<Box<dyn ContentStore>> {
    match backend {
        BackendConfig::Api {
            base_url,
            dataset,
            token,
        } => Ok(Box::new(crate::api_store::ApiStore::new(
            base_url.clone(),
            dataset.clone(),
            token.clone(),
        )?)),
        BackendConfig::Database { path } => {
            Ok(Box::new(crate::db_store::DbStore::connect(path).await?))
        }
        BackendConfig::Files { directory } => Ok(Box::new(crate::file_store::FileStore::new(
            directory.clone(),
        ))),
    }
}

/// Availability-over-correctness view of a [`ContentStore`]: every failing
/// query becomes an empty/absent result with a logged warning, so pages
/// degrade to their empty state instead of erroring. `Ok(None)` from the
/// underlying store passes through unchanged and keeps its "not found"
/// meaning.
pub struct Degraded<'a>(pub &'a dyn ContentStore);

impl<'a> Degraded<'a> {
    pub async fn post_by_slug(&self, slug: &str) -> Option<Post> {
        self.swallow("post_by_slug", self.0.post_by_slug(slug).await)
            .flatten()
    }

    pub async fn list_posts(&self, query: &ListQuery) -> Listing {
        self.swallow("list_posts", self.0.list_posts(query).await)
            .unwrap_or_default()
    }

    pub async fn related_posts(
        &self,
        slug: &str,
        category_id: Option<&str>,
        tag_ids: &[String],
    ) -> Vec<PostSummary> {
        self.swallow(
            "related_posts",
            self.0.related_posts(slug, category_id, tag_ids).await,
        )
        .unwrap_or_default()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.swallow("categories", self.0.categories().await)
            .unwrap_or_default()
    }

    pub async fn tags(&self) -> Vec<Tag> {
        self.swallow("tags", self.0.tags().await).unwrap_or_default()
    }

    pub async fn category_by_slug(&self, slug: &str) -> Option<Category> {
        self.swallow("category_by_slug", self.0.category_by_slug(slug).await)
            .flatten()
    }

    pub async fn tag_by_slug(&self, slug: &str) -> Option<Tag> {
        self.swallow("tag_by_slug", self.0.tag_by_slug(slug).await)
            .flatten()
    }

    pub async fn post_slugs(&self) -> Vec<String> {
        self.swallow("post_slugs", self.0.post_slugs().await)
            .unwrap_or_default()
    }

    pub async fn category_slugs(&self) -> Vec<String> {
        self.swallow("category_slugs", self.0.category_slugs().await)
            .unwrap_or_default()
    }

    pub async fn tag_slugs(&self) -> Vec<String> {
        self.swallow("tag_slugs", self.0.tag_slugs().await)
            .unwrap_or_default()
    }

    pub async fn settings(&self) -> Option<SiteSettings> {
        self.swallow("settings", self.0.settings().await).flatten()
    }

    fn swallow<T>(&self, operation: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                warn!("content query `{}` failed, degrading to empty: {}", operation, err);
                None
            }
        }
    }
}

/// The result of a fallible content query.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a content query.
#[derive(Debug)]
pub enum Error {
    /// An error talking to the content API.
    Http(reqwest::Error),

    /// An error from the relational backend.
    Db(sqlx::Error),

    /// An error reading flat files.
    Io(std::io::Error),

    /// A malformed document or record payload.
    Json(serde_json::Error),

    /// Malformed frontmatter or settings YAML.
    Yaml(serde_yaml::Error),

    /// An unparseable date in a stored record.
    Date(chrono::ParseError),

    /// An error building a backend URL.
    Url(url::ParseError),

    /// A backend-specific invariant violation.
    Backend(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Http(err) => err.fmt(f),
            Error::Db(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::Json(err) => err.fmt(f),
            Error::Yaml(err) => err.fmt(f),
            Error::Date(err) => err.fmt(f),
            Error::Url(err) => err.fmt(f),
            Error::Backend(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(err) => Some(err),
            Error::Db(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Yaml(err) => Some(err),
            Error::Date(err) => Some(err),
            Error::Url(err) => Some(err),
            Error::Backend(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    /// Converts [`reqwest::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator in API-backend queries.
    fn from(err: reqwest::Error) -> Error {
        Error::Http(err)
    }
}

impl From<sqlx::Error> for Error {
    /// Converts [`sqlx::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator in database-backend queries.
    fn from(err: sqlx::Error) -> Error {
        Error::Db(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator in flat-file queries.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    /// Converts [`serde_json::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator when decoding documents and API payloads.
    fn from(err: serde_json::Error) -> Error {
        Error::Json(err)
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts [`serde_yaml::Error`] into an [`Error`]. This allows us to
    /// use the `?` operator when decoding frontmatter and settings files.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts [`url::ParseError`] into an [`Error`]. This allows us to use
    /// the `?` operator when building backend endpoint URLs.
    fn from(err: url::ParseError) -> Error {
        Error::Url(err)
    }
}

impl From<chrono::ParseError> for Error {
    /// Converts [`chrono::ParseError`] into an [`Error`]. This allows us to
    /// use the `?` operator when parsing stored dates.
    fn from(err: chrono::ParseError) -> Error {
        Error::Date(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// A backend that fails every query, simulating an unreachable content
    /// store.
    pub struct UnreachableStore;

    fn unreachable_error() -> Error {
        Error::Backend("simulated backend timeout".to_owned())
    }

    #[async_trait]
    impl ContentStore for UnreachableStore {
        async fn post_by_slug(&self, _slug: &str) -> Result<Option<Post>> {
            Err(unreachable_error())
        }

        async fn list_posts(&self, _query: &ListQuery) -> Result<Listing> {
            Err(unreachable_error())
        }

        async fn related_posts(
            &self,
            _slug: &str,
            _category_id: Option<&str>,
            _tag_ids: &[String],
        ) -> Result<Vec<PostSummary>> {
            Err(unreachable_error())
        }

        async fn categories(&self) -> Result<Vec<Category>> {
            Err(unreachable_error())
        }

        async fn tags(&self) -> Result<Vec<Tag>> {
            Err(unreachable_error())
        }

        async fn category_by_slug(&self, _slug: &str) -> Result<Option<Category>> {
            Err(unreachable_error())
        }

        async fn tag_by_slug(&self, _slug: &str) -> Result<Option<Tag>> {
            Err(unreachable_error())
        }

        async fn post_slugs(&self) -> Result<Vec<String>> {
            Err(unreachable_error())
        }

        async fn category_slugs(&self) -> Result<Vec<String>> {
            Err(unreachable_error())
        }

        async fn tag_slugs(&self) -> Result<Vec<String>> {
            Err(unreachable_error())
        }

        async fn settings(&self) -> Result<Option<SiteSettings>> {
            Err(unreachable_error())
        }
    }

    #[tokio::test]
    async fn test_degraded_swallows_failures_to_empty() {
        let store = UnreachableStore;
        let degraded = Degraded(&store);

        let listing = degraded.list_posts(&ListQuery::page(1, 9)).await;
        assert_eq!(listing, Listing::default());
        assert!(degraded.post_by_slug("missing").await.is_none());
        assert!(degraded.categories().await.is_empty());
        assert!(degraded.post_slugs().await.is_empty());
        assert!(degraded.settings().await.is_none());
    }

    #[test]
    fn test_list_query_start() {
        assert_eq!(ListQuery::page(1, 9).start(), 0);
        assert_eq!(ListQuery::page(3, 9).start(), 18);
        // page 0 normalizes to page 1
        assert_eq!(ListQuery::page(0, 9).start(), 0);
    }
}
