//! The relational content backend: a local SQLite database holding the same
//! records the hosted API serves. Post bodies are stored as document JSON in
//! a TEXT column and decode through [`crate::doc::Document`]'s wire format;
//! timestamps are RFC 3339 TEXT.
//!
//! Queries are built at runtime with positional binds; a post is published
//! when `published_at` is non-NULL.

use crate::doc::Document;
use crate::image::ImageRef;
use crate::store::{
    Author, Category, CategoryRef, ContentStore, ListQuery, Listing, Post, PostSummary, Result,
    Seo, SiteSettings, Tag, TagRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

const SUMMARY_COLUMNS: &str = concat!(
    "p.id, p.title, p.slug, p.excerpt, p.image, p.image_alt, p.published_at, ",
    "c.id AS category_id, c.title AS category_title, ",
    "c.slug AS category_slug, c.color AS category_color",
);

pub struct DbStore {
    pool: SqlitePool,
}

impl DbStore {
    pub async fn connect(path: &Path) -> Result<DbStore> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        migrate(&pool).await?;
        Ok(DbStore { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> DbStore {
        DbStore { pool }
    }

    async fn tags_for_post(&self, post_id: &str) -> Result<Vec<TagRef>> {
        let rows = sqlx::query(
            "SELECT t.id, t.title, t.slug FROM tags t \
             JOIN post_tags pt ON pt.tag_id = t.id \
             WHERE pt.post_id = ? ORDER BY t.title",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(TagRef {
                    id: Some(row.try_get("id")?),
                    title: row.try_get("title")?,
                    slug: row.try_get("slug")?,
                })
            })
            .collect()
    }

    async fn summarize(&self, rows: Vec<SqliteRow>) -> Result<Vec<PostSummary>> {
        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let mut summary = summary_from_row(&row)?;
            summary.tags = self.tags_for_post(&summary.id).await?;
            summaries.push(summary);
        }
        Ok(summaries)
    }
}

/// Creates the schema. Every statement is idempotent, so opening an existing
/// database is a no-op.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT,
            color TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS authors (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            bio TEXT,
            image TEXT,
            image_alt TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            excerpt TEXT,
            body TEXT NOT NULL DEFAULT '[]',
            image TEXT,
            image_alt TEXT,
            published_at TEXT,
            updated_at TEXT,
            author_id TEXT REFERENCES authors(id),
            category_id TEXT REFERENCES categories(id),
            meta_title TEXT,
            meta_description TEXT,
            og_image TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS post_tags (
            post_id TEXT NOT NULL REFERENCES posts(id),
            tag_id TEXT NOT NULL REFERENCES tags(id),
            PRIMARY KEY (post_id, tag_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            title TEXT NOT NULL,
            description TEXT,
            hero_tagline TEXT,
            hero_subtitle TEXT,
            about_title TEXT,
            about_content TEXT,
            contact_email TEXT,
            footer_text TEXT,
            social_links TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_published_at ON posts(published_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// The WHERE clause (sans the leading `WHERE`) and bind values for one
/// listing query.
fn list_conditions(query: &ListQuery) -> (String, Vec<String>) {
    let mut conditions = String::from("p.published_at IS NOT NULL");
    let mut binds = Vec::new();
    if let Some(category) = &query.category {
        conditions.push_str(" AND c.slug = ?");
        binds.push(category.clone());
    }
    if let Some(tag) = &query.tag {
        conditions.push_str(
            " AND EXISTS (SELECT 1 FROM post_tags pt \
             JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = p.id AND t.slug = ?)",
        );
        binds.push(tag.clone());
    }
    if let Some(search) = &query.search {
        conditions.push_str(" AND (p.title LIKE ? OR p.excerpt LIKE ?)");
        let pattern = format!("%{}%", search);
        binds.push(pattern.clone());
        binds.push(pattern);
    }
    (conditions, binds)
}

fn summary_from_row(row: &SqliteRow) -> Result<PostSummary> {
    let category = match row.try_get::<Option<String>, _>("category_id")? {
        Some(id) => Some(CategoryRef {
            id: Some(id),
            title: row
                .try_get::<Option<String>, _>("category_title")?
                .unwrap_or_default(),
            slug: row
                .try_get::<Option<String>, _>("category_slug")?
                .unwrap_or_default(),
            color: row.try_get("category_color")?,
        }),
        None => None,
    };
    Ok(PostSummary {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        slug: row.try_get("slug")?,
        excerpt: row.try_get("excerpt")?,
        main_image: image_ref(row.try_get("image")?, row.try_get("image_alt")?),
        published_at: parse_timestamp(row.try_get("published_at")?)?,
        category,
        tags: Vec::new(),
    })
}

fn image_ref(asset: Option<String>, alt: Option<String>) -> Option<ImageRef> {
    asset.map(|asset| ImageRef { asset, alt })
}

fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match value {
        None => Ok(None),
        Some(value) => Ok(Some(
            DateTime::parse_from_rfc3339(&value)?.with_timezone(&Utc),
        )),
    }
}

#[async_trait]
impl ContentStore for DbStore {
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let sql = format!(
            "SELECT {}, p.body, p.updated_at, \
             p.meta_title, p.meta_description, p.og_image, \
             a.name AS author_name, a.bio AS author_bio, \
             a.image AS author_image, a.image_alt AS author_image_alt \
             FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id \
             LEFT JOIN authors a ON a.id = p.author_id \
             WHERE p.published_at IS NOT NULL AND p.slug = ?",
            SUMMARY_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let mut summary = summary_from_row(&row)?;
        summary.tags = self.tags_for_post(&summary.id).await?;

        let body: Document = serde_json::from_str(&row.try_get::<String, _>("body")?)?;
        let author = match row.try_get::<Option<String>, _>("author_name")? {
            Some(name) => Some(Author {
                name,
                bio: row.try_get("author_bio")?,
                image: image_ref(
                    row.try_get("author_image")?,
                    row.try_get("author_image_alt")?,
                ),
            }),
            None => None,
        };
        let meta_title: Option<String> = row.try_get("meta_title")?;
        let meta_description: Option<String> = row.try_get("meta_description")?;
        let og_image: Option<String> = row.try_get("og_image")?;
        let seo = match (&meta_title, &meta_description, &og_image) {
            (None, None, None) => None,
            _ => Some(Seo {
                meta_title,
                meta_description,
                og_image: og_image.map(ImageRef::new),
            }),
        };
        Ok(Some(Post {
            summary,
            body,
            updated_at: parse_timestamp(row.try_get("updated_at")?)?,
            author,
            seo,
        }))
    }

    async fn list_posts(&self, query: &ListQuery) -> Result<Listing> {
        let (conditions, binds) = list_conditions(query);

        let count_sql = format!(
            "SELECT COUNT(*) FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id WHERE {}",
            conditions
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_query = count_query.bind(bind);
        }
        let total = count_query.fetch_one(&self.pool).await? as usize;

        let rows_sql = format!(
            "SELECT {} FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id \
             WHERE {} ORDER BY p.published_at DESC LIMIT ? OFFSET ?",
            SUMMARY_COLUMNS, conditions
        );
        let mut rows_query = sqlx::query(&rows_sql);
        for bind in &binds {
            rows_query = rows_query.bind(bind);
        }
        let rows = rows_query
            .bind(query.per_page as i64)
            .bind(query.start() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Listing {
            posts: self.summarize(rows).await?,
            total,
        })
    }

    async fn related_posts(
        &self,
        slug: &str,
        category_id: Option<&str>,
        tag_ids: &[String],
    ) -> Result<Vec<PostSummary>> {
        // `IN ()` isn't valid SQL; `IN (NULL)` matches nothing.
        let placeholders = match tag_ids.is_empty() {
            true => "NULL".to_owned(),
            false => vec!["?"; tag_ids.len()].join(", "),
        };
        let sql = format!(
            "SELECT DISTINCT {} FROM posts p \
             LEFT JOIN categories c ON c.id = p.category_id \
             LEFT JOIN post_tags pt ON pt.post_id = p.id \
             WHERE p.published_at IS NOT NULL AND p.slug != ? \
             AND (p.category_id = ? OR pt.tag_id IN ({})) \
             ORDER BY p.published_at DESC LIMIT 4",
            SUMMARY_COLUMNS, placeholders
        );
        let mut related_query = sqlx::query(&sql).bind(slug).bind(category_id);
        for tag_id in tag_ids {
            related_query = related_query.bind(tag_id);
        }
        let rows = related_query.fetch_all(&self.pool).await?;
        self.summarize(rows).await
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT c.id, c.title, c.slug, c.description, c.color, \
             COUNT(p.id) AS post_count FROM categories c \
             LEFT JOIN posts p \
             ON p.category_id = c.id AND p.published_at IS NOT NULL \
             GROUP BY c.id ORDER BY c.title",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(Category {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    slug: row.try_get("slug")?,
                    description: row.try_get("description")?,
                    color: row.try_get("color")?,
                    post_count: row.try_get::<i64, _>("post_count")? as usize,
                })
            })
            .collect()
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        let rows = sqlx::query(
            "SELECT t.id, t.title, t.slug, COUNT(p.id) AS post_count FROM tags t \
             LEFT JOIN post_tags pt ON pt.tag_id = t.id \
             LEFT JOIN posts p \
             ON p.id = pt.post_id AND p.published_at IS NOT NULL \
             GROUP BY t.id ORDER BY t.title",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(Tag {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    slug: row.try_get("slug")?,
                    post_count: row.try_get::<i64, _>("post_count")? as usize,
                })
            })
            .collect()
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(self
            .categories()
            .await?
            .into_iter()
            .find(|category| category.slug == slug))
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        Ok(self.tags().await?.into_iter().find(|tag| tag.slug == slug))
    }

    async fn post_slugs(&self) -> Result<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM posts WHERE published_at IS NOT NULL \
             ORDER BY published_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(slugs)
    }

    async fn category_slugs(&self) -> Result<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>("SELECT slug FROM categories ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(slugs)
    }

    async fn tag_slugs(&self) -> Result<Vec<String>> {
        let slugs = sqlx::query_scalar::<_, String>("SELECT slug FROM tags ORDER BY title")
            .fetch_all(&self.pool)
            .await?;
        Ok(slugs)
    }

    async fn settings(&self) -> Result<Option<SiteSettings>> {
        let row = sqlx::query(
            "SELECT title, description, hero_tagline, hero_subtitle, \
             about_title, about_content, contact_email, footer_text, \
             social_links FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };
        let about_content = match row.try_get::<Option<String>, _>("about_content")? {
            Some(json) => {
                let doc: Document = serde_json::from_str(&json)?;
                match doc.is_empty() {
                    true => None,
                    false => Some(doc),
                }
            }
            None => None,
        };
        let social_links = match row.try_get::<Option<String>, _>("social_links")? {
            Some(json) => serde_json::from_str(&json)?,
            None => Vec::new(),
        };
        Ok(Some(SiteSettings {
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            hero_tagline: row.try_get("hero_tagline")?,
            hero_subtitle: row.try_get("hero_subtitle")?,
            about_title: row.try_get("about_title")?,
            about_content,
            contact_email: row.try_get("contact_email")?,
            footer_text: row.try_get("footer_text")?,
            social_links,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    async fn fixture() -> DbStore {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO categories (id, title, slug, color) \
             VALUES ('c1', 'Updates', 'updates', '#ff0000')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO tags (id, title, slug) VALUES ('t1', 'Greeting', 'greeting')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO authors (id, name) VALUES ('a1', 'A. Writer')")
            .execute(&pool)
            .await
            .unwrap();

        let body = r#"[{"_type": "block", "style": "normal",
                        "children": [{"text": "hi", "marks": []}],
                        "markDefs": []}]"#;
        sqlx::query(
            "INSERT INTO posts \
             (id, title, slug, excerpt, body, published_at, author_id, category_id) \
             VALUES ('p1', 'Hello, world!', 'hello-world', 'short', ?, \
                     '2021-04-16T00:00:00Z', 'a1', 'c1')",
        )
        .bind(body)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO posts (id, title, slug, body, published_at, category_id) \
             VALUES ('p2', 'Second post', 'second', '[]', \
                     '2021-05-01T00:00:00Z', 'c1')",
        )
        .execute(&pool)
        .await
        .unwrap();
        // a draft: no published_at
        sqlx::query("INSERT INTO posts (id, title, slug, body) VALUES ('p3', 'Draft', 'draft', '[]')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ('p1', 't1')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO settings (id, title, social_links) \
             VALUES (1, 'Demo Blog', '[{\"label\": \"GitHub\", \"url\": \"https://github.com/example\"}]')",
        )
        .execute(&pool)
        .await
        .unwrap();

        DbStore::from_pool(pool)
    }

    #[tokio::test]
    async fn test_list_skips_drafts_and_sorts_newest_first() {
        let store = fixture().await;
        let listing = store.list_posts(&ListQuery::page(1, 9)).await.unwrap();
        assert_eq!(listing.total, 2);
        assert_eq!(
            listing
                .posts
                .iter()
                .map(|post| post.slug.as_str())
                .collect::<Vec<_>>(),
            vec!["second", "hello-world"],
        );
    }

    #[tokio::test]
    async fn test_post_by_slug_decodes_body() {
        let store = fixture().await;
        let post = store.post_by_slug("hello-world").await.unwrap().unwrap();
        assert_eq!(post.summary.title, "Hello, world!");
        assert_eq!(post.body.plain_text(), "hi");
        assert_eq!(post.author.map(|a| a.name), Some("A. Writer".to_owned()));
        assert_eq!(
            post.summary
                .tags
                .iter()
                .map(|tag| tag.slug.as_str())
                .collect::<Vec<_>>(),
            vec!["greeting"],
        );
        assert!(store.post_by_slug("missing").await.unwrap().is_none());
        // drafts don't resolve
        assert!(store.post_by_slug("draft").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filters_and_search() {
        let store = fixture().await;

        let mut query = ListQuery::page(1, 9);
        query.tag = Some("greeting".to_owned());
        let listing = store.list_posts(&query).await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.posts[0].slug, "hello-world");

        let mut query = ListQuery::page(1, 9);
        query.search = Some("second".to_owned());
        let listing = store.list_posts(&query).await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.posts[0].slug, "second");

        let mut query = ListQuery::page(1, 9);
        query.category = Some("updates".to_owned());
        assert_eq!(store.list_posts(&query).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_related_by_category() {
        let store = fixture().await;
        let related = store
            .related_posts("hello-world", Some("c1"), &["t1".to_owned()])
            .await
            .unwrap();
        assert_eq!(
            related.iter().map(|post| post.slug.as_str()).collect::<Vec<_>>(),
            vec!["second"],
        );
    }

    #[tokio::test]
    async fn test_counts_and_settings() {
        let store = fixture().await;

        let categories = store.categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].post_count, 2);

        let tags = store.tags().await.unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].post_count, 1);

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.title, "Demo Blog");
        assert_eq!(settings.social_links[0].label, "GitHub");
    }
}
