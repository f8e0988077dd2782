//! The flat-file content backend: markdown posts with YAML frontmatter under
//! `{directory}/posts/`, plus an optional `{directory}/settings.yaml`.
//!
//! Each post file must be structured as follows:
//!
//! 1. Initial frontmatter fence (`---`)
//! 2. YAML frontmatter with fields `title`, `date`, and optionally
//!    `category`, `tags`, `excerpt`, `image`, `author`, `published`
//! 3. Terminal frontmatter fence (`---`)
//! 4. Markdown post body
//!
//! For example:
//!
//! ```md
//! ---
//! title: Hello, world!
//! date: 2021-04-16
//! tags: [greeting]
//! ---
//! ## Hello
//!
//! World
//! ```
//!
//! The post's slug is its file name less the `.md` extension. Category and
//! tag records don't exist as files; they are derived from the posts that
//! mention them. Posts are re-read on every query; post trees are small and
//! the store is only queried at build time.

use crate::doc::{Block, Document};
use crate::image::ImageRef;
use crate::markdown;
use crate::store::{
    Author, Category, CategoryRef, ContentStore, Error, ListQuery, Listing, Post, PostSummary,
    Result, Seo, SiteSettings, SocialLink, Tag, TagRef,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{read_dir, File};
use std::io::Read;
use std::path::{Path, PathBuf};

const MARKDOWN_EXTENSION: &str = ".md";
const EXCERPT_CHARS: usize = 200;

pub struct FileStore {
    directory: PathBuf,
}

impl FileStore {
    pub fn new(directory: PathBuf) -> FileStore {
        FileStore { directory }
    }

    /// Reads every published post, newest first.
    fn load_posts(&self) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        for result in read_dir(self.directory.join("posts"))? {
            let entry = result?;
            let os_file_name = entry.file_name();
            let file_name = os_file_name.to_string_lossy();
            if !file_name.ends_with(MARKDOWN_EXTENSION) {
                continue;
            }
            let slug = file_name.trim_end_matches(MARKDOWN_EXTENSION);
            if let Some(post) = parse_post(slug, &entry.path())? {
                posts.push(post);
            }
        }
        posts.sort_by(|a, b| b.summary.published_at.cmp(&a.summary.published_at));
        Ok(posts)
    }

    fn load_categories(&self) -> Result<Vec<Category>> {
        let posts = self.load_posts()?;
        let mut categories: BTreeMap<String, Category> = BTreeMap::new();
        for post in &posts {
            if let Some(category) = &post.summary.category {
                let entry = categories
                    .entry(category.slug.clone())
                    .or_insert_with(|| Category {
                        id: category.slug.clone(),
                        title: category.title.clone(),
                        slug: category.slug.clone(),
                        description: None,
                        color: None,
                        post_count: 0,
                    });
                entry.post_count += 1;
            }
        }
        Ok(categories.into_values().collect())
    }

    fn load_tags(&self) -> Result<Vec<Tag>> {
        let posts = self.load_posts()?;
        let mut tags: BTreeMap<String, Tag> = BTreeMap::new();
        for post in &posts {
            for tag in &post.summary.tags {
                let entry = tags.entry(tag.slug.clone()).or_insert_with(|| Tag {
                    id: tag.slug.clone(),
                    title: tag.title.clone(),
                    slug: tag.slug.clone(),
                    post_count: 0,
                });
                entry.post_count += 1;
            }
        }
        Ok(tags.into_values().collect())
    }
}

fn parse_post(slug: &str, path: &Path) -> Result<Option<Post>> {
    let mut contents = String::new();
    File::open(path)?.read_to_string(&mut contents)?;

    let (yaml_start, yaml_stop, body_start) = frontmatter_indices(path, &contents)?;
    let frontmatter: Frontmatter = serde_yaml::from_str(&contents[yaml_start..yaml_stop])?;
    if !frontmatter.published {
        return Ok(None);
    }

    let body = markdown::to_document(&contents[body_start..]);
    let excerpt = match frontmatter.excerpt {
        Some(excerpt) => Some(excerpt),
        None => derive_excerpt(&body),
    };
    Ok(Some(Post {
        summary: PostSummary {
            id: slug.to_owned(),
            title: frontmatter.title,
            slug: slug.to_owned(),
            excerpt,
            main_image: frontmatter.image.map(|asset| ImageRef {
                asset,
                alt: frontmatter.image_alt,
            }),
            published_at: Some(parse_date(&frontmatter.date)?),
            category: frontmatter.category.map(|title| CategoryRef {
                id: None,
                slug: slug::slugify(&title),
                title,
                color: None,
            }),
            tags: frontmatter
                .tags
                .iter()
                .map(|title| TagRef {
                    id: None,
                    slug: slug::slugify(title),
                    title: title.clone(),
                })
                .collect(),
        },
        body,
        updated_at: None,
        author: frontmatter.author.map(|name| Author {
            name,
            bio: None,
            image: None,
        }),
        seo: frontmatter.seo.map(|seo| Seo {
            meta_title: seo.meta_title,
            meta_description: seo.meta_description,
            og_image: seo.og_image.map(ImageRef::new),
        }),
    }))
}

fn frontmatter_indices(path: &Path, input: &str) -> Result<(usize, usize, usize)> {
    const FENCE: &str = "---";
    if !input.starts_with(FENCE) {
        return Err(Error::Backend(format!(
            "post `{}` must begin with `---`",
            path.display()
        )));
    }
    match input[FENCE.len()..].find(FENCE) {
        None => Err(Error::Backend(format!(
            "post `{}` is missing its closing `---`",
            path.display()
        ))),
        Some(offset) => Ok((
            FENCE.len(),                        // yaml_start
            FENCE.len() + offset,               // yaml_stop
            FENCE.len() + offset + FENCE.len(), // body_start
        )),
    }
}

/// Accepts either a bare `YYYY-MM-DD` (midnight UTC) or a full RFC 3339
/// timestamp.
fn parse_date(date: &str) -> Result<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(date) {
        Ok(parsed) => Ok(parsed.with_timezone(&Utc)),
        Err(_) => {
            let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")?;
            Ok(DateTime::from_utc(day.and_hms(0, 0, 0), Utc))
        }
    }
}

/// First `EXCERPT_CHARS` characters of the body's non-heading text.
fn derive_excerpt(body: &Document) -> Option<String> {
    let mut text = String::new();
    for block in body.blocks() {
        if let Block::Heading { .. } = block {
            continue;
        }
        let spans = match block.spans() {
            Some(spans) => spans,
            None => continue,
        };
        if !text.is_empty() {
            text.push(' ');
        }
        for span in spans {
            text.push_str(&span.text);
        }
        if text.chars().count() >= EXCERPT_CHARS {
            break;
        }
    }
    match text.is_empty() {
        true => None,
        false => Some(text.chars().take(EXCERPT_CHARS).collect()),
    }
}

fn matches(post: &Post, query: &ListQuery) -> bool {
    if let Some(category) = &query.category {
        match &post.summary.category {
            Some(post_category) if &post_category.slug == category => {}
            _ => return false,
        }
    }
    if let Some(tag) = &query.tag {
        if !post.summary.tags.iter().any(|t| &t.slug == tag) {
            return false;
        }
    }
    if let Some(search) = &query.search {
        let needle = search.to_lowercase();
        let in_title = post.summary.title.to_lowercase().contains(&needle);
        let in_excerpt = post
            .summary
            .excerpt
            .as_deref()
            .map(|excerpt| excerpt.to_lowercase().contains(&needle))
            .unwrap_or(false);
        let in_body = post.body.plain_text().to_lowercase().contains(&needle);
        if !(in_title || in_excerpt || in_body) {
            return false;
        }
    }
    true
}

fn related(post: &Post, candidate: &Post) -> bool {
    if candidate.summary.slug == post.summary.slug {
        return false;
    }
    let same_category = match (&post.summary.category, &candidate.summary.category) {
        (Some(a), Some(b)) => a.slug == b.slug,
        _ => false,
    };
    let shared_tag = post
        .summary
        .tags
        .iter()
        .any(|tag| candidate.summary.tags.iter().any(|t| t.slug == tag.slug));
    same_category || shared_tag
}

#[derive(Deserialize)]
struct Frontmatter {
    pub title: String,
    pub date: String,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub excerpt: Option<String>,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default)]
    pub image_alt: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub seo: Option<FrontmatterSeo>,

    #[serde(default = "published_default")]
    pub published: bool,
}

fn published_default() -> bool {
    true
}

#[derive(Deserialize)]
struct FrontmatterSeo {
    #[serde(default)]
    pub meta_title: Option<String>,

    #[serde(default)]
    pub meta_description: Option<String>,

    #[serde(default)]
    pub og_image: Option<String>,
}

/// `settings.yaml` mirrors [`SiteSettings`] except that `about_content` is
/// markdown rather than a structured document.
#[derive(Deserialize)]
struct RawSettings {
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub hero_tagline: Option<String>,

    #[serde(default)]
    pub hero_subtitle: Option<String>,

    #[serde(default)]
    pub about_title: Option<String>,

    #[serde(default)]
    pub about_content: Option<String>,

    #[serde(default)]
    pub contact_email: Option<String>,

    #[serde(default)]
    pub footer_text: Option<String>,

    #[serde(default)]
    pub social_links: Vec<SocialLink>,
}

#[async_trait]
impl ContentStore for FileStore {
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let path = self
            .directory
            .join("posts")
            .join(format!("{}{}", slug, MARKDOWN_EXTENSION));
        match path.is_file() {
            true => parse_post(slug, &path),
            false => Ok(None),
        }
    }

    async fn list_posts(&self, query: &ListQuery) -> Result<Listing> {
        let matched: Vec<PostSummary> = self
            .load_posts()?
            .into_iter()
            .filter(|post| matches(post, query))
            .map(|post| post.summary)
            .collect();
        let total = matched.len();
        Ok(Listing {
            posts: matched
                .into_iter()
                .skip(query.start())
                .take(query.per_page)
                .collect(),
            total,
        })
    }

    async fn related_posts(
        &self,
        slug: &str,
        _category_id: Option<&str>,
        _tag_ids: &[String],
    ) -> Result<Vec<PostSummary>> {
        let post = match self.post_by_slug(slug).await? {
            Some(post) => post,
            None => return Ok(Vec::new()),
        };
        Ok(self
            .load_posts()?
            .into_iter()
            .filter(|candidate| related(&post, candidate))
            .take(4)
            .map(|candidate| candidate.summary)
            .collect())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        self.load_categories()
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        self.load_tags()
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        Ok(self
            .load_categories()?
            .into_iter()
            .find(|category| category.slug == slug))
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        Ok(self.load_tags()?.into_iter().find(|tag| tag.slug == slug))
    }

    async fn post_slugs(&self) -> Result<Vec<String>> {
        Ok(self
            .load_posts()?
            .into_iter()
            .map(|post| post.summary.slug)
            .collect())
    }

    async fn category_slugs(&self) -> Result<Vec<String>> {
        Ok(self
            .load_categories()?
            .into_iter()
            .map(|category| category.slug)
            .collect())
    }

    async fn tag_slugs(&self) -> Result<Vec<String>> {
        Ok(self.load_tags()?.into_iter().map(|tag| tag.slug).collect())
    }

    async fn settings(&self) -> Result<Option<SiteSettings>> {
        let path = self.directory.join("settings.yaml");
        if !path.is_file() {
            return Ok(None);
        }
        let raw: RawSettings = serde_yaml::from_reader(File::open(&path)?)?;
        Ok(Some(SiteSettings {
            title: raw.title,
            description: raw.description,
            hero_tagline: raw.hero_tagline,
            hero_subtitle: raw.hero_subtitle,
            about_title: raw.about_title,
            about_content: raw
                .about_content
                .as_deref()
                .map(markdown::to_document)
                .filter(|doc| !doc.is_empty()),
            contact_email: raw.contact_email,
            footer_text: raw.footer_text,
            social_links: raw.social_links,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    fn fixture() -> (tempfile::TempDir, FileStore) {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(
            posts.join("hello-world.md"),
            concat!(
                "---\n",
                "title: Hello, world!\n",
                "date: 2021-04-16\n",
                "category: Updates\n",
                "tags: [greeting, meta]\n",
                "---\n",
                "## Hello\n\nWorld, this is the first post.\n",
            ),
        )
        .unwrap();
        fs::write(
            posts.join("second.md"),
            concat!(
                "---\n",
                "title: Second post\n",
                "date: 2021-05-01\n",
                "category: Updates\n",
                "excerpt: A hand-written excerpt.\n",
                "---\n",
                "Body of the second post.\n",
            ),
        )
        .unwrap();
        fs::write(
            posts.join("draft.md"),
            concat!(
                "---\n",
                "title: Draft\n",
                "date: 2021-06-01\n",
                "published: false\n",
                "---\n",
                "Not yet.\n",
            ),
        )
        .unwrap();
        fs::write(
            dir.path().join("settings.yaml"),
            concat!(
                "title: Demo Blog\n",
                "hero_tagline: Notes from the demo\n",
                "social_links:\n",
                "  - label: GitHub\n",
                "    url: https://github.com/example\n",
            ),
        )
        .unwrap();
        let store = FileStore::new(dir.path().to_owned());
        (dir, store)
    }

    #[tokio::test]
    async fn test_list_skips_drafts_and_sorts_newest_first() {
        let (_dir, store) = fixture();
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
    async fn test_post_by_slug() {
        let (_dir, store) = fixture();
        let post = store.post_by_slug("hello-world").await.unwrap().unwrap();
        assert_eq!(post.summary.title, "Hello, world!");
        assert_eq!(
            post.summary.category.as_ref().map(|c| c.slug.as_str()),
            Some("updates"),
        );
        // derived from the body, headings skipped
        assert_eq!(
            post.summary.excerpt.as_deref(),
            Some("World, this is the first post."),
        );
        assert!(store.post_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_and_filters() {
        let (_dir, store) = fixture();

        let mut query = ListQuery::page(1, 9);
        query.search = Some("SECOND".to_owned());
        let listing = store.list_posts(&query).await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.posts[0].slug, "second");

        let mut query = ListQuery::page(1, 9);
        query.tag = Some("greeting".to_owned());
        let listing = store.list_posts(&query).await.unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.posts[0].slug, "hello-world");

        let mut query = ListQuery::page(1, 9);
        query.category = Some("updates".to_owned());
        assert_eq!(store.list_posts(&query).await.unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_related_by_shared_category() {
        let (_dir, store) = fixture();
        let related = store.related_posts("hello-world", None, &[]).await.unwrap();
        assert_eq!(
            related.iter().map(|post| post.slug.as_str()).collect::<Vec<_>>(),
            vec!["second"],
        );
    }

    #[tokio::test]
    async fn test_derived_records_and_settings() {
        let (_dir, store) = fixture();

        let categories = store.categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].slug, "updates");
        assert_eq!(categories[0].post_count, 2);

        let tags = store.tags().await.unwrap();
        assert_eq!(
            tags.iter().map(|tag| tag.slug.as_str()).collect::<Vec<_>>(),
            vec!["greeting", "meta"],
        );

        let settings = store.settings().await.unwrap().unwrap();
        assert_eq!(settings.title, "Demo Blog");
        assert_eq!(settings.social_links.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_frontmatter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let posts = dir.path().join("posts");
        fs::create_dir_all(&posts).unwrap();
        fs::write(posts.join("broken.md"), "no frontmatter here\n").unwrap();
        let store = FileStore::new(dir.path().to_owned());
        assert!(store.post_by_slug("broken").await.is_err());
    }
}
