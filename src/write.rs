//! Responsible for templating and writing the site's HTML pages to disk:
//! post pages, the paginated article listing, per-category and per-tag
//! listings, the home page, and the not-found page.
//!
//! Every page's template context carries a `site` object built from the
//! store's settings record. Slug enumeration and post fetches are honest
//! (a broken backend fails the build); per-page listing queries degrade to
//! empty pages instead.

use crate::image::UrlBuilder;
use crate::page::{urls, ListPage, PostPage};
use crate::render::Renderer;
use crate::store::{self, ContentStore, Degraded, ListQuery};
use gtmpl::{Context, Template, Value};
use log::{info, warn};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::Path;

/// The parsed template set for one theme.
pub struct Templates {
    pub post: Template,
    pub list: Template,
    pub home: Template,
    pub not_found: Template,
}

/// Templates pages from a content store and writes them under an output
/// directory.
pub struct Writer<'a> {
    pub templates: &'a Templates,
    pub store: &'a dyn ContentStore,
    pub images: &'a UrlBuilder,
    pub page_size: usize,
    pub output_directory: &'a Path,
}

impl Writer<'_> {
    /// Writes every page of the site.
    pub async fn write_site(&self) -> Result<()> {
        let site = self.site_value().await;

        self.write_page(
            &self.templates.not_found,
            &self.output_directory.join("404.html"),
            Value::Object(Default::default()),
            &site,
        )?;
        self.write_home(&site).await?;
        self.write_posts(&site).await?;

        self.write_listing(
            &site,
            "blog",
            &urls::blog(),
            &ListQuery::default(),
            &[],
        )
        .await?;

        for slug in Degraded(self.store).category_slugs().await {
            let mut query = ListQuery::default();
            query.category = Some(slug.clone());
            let extra = match Degraded(self.store).category_by_slug(&slug).await {
                Some(category) => vec![("section", Value::from(&category))],
                None => Vec::new(),
            };
            self.write_listing(
                &site,
                &format!("category/{}", slug),
                &urls::category(&slug),
                &query,
                &extra,
            )
            .await?;
        }

        for slug in Degraded(self.store).tag_slugs().await {
            let mut query = ListQuery::default();
            query.tag = Some(slug.clone());
            let extra = match Degraded(self.store).tag_by_slug(&slug).await {
                Some(tag) => vec![("section", Value::from(&tag))],
                None => Vec::new(),
            };
            self.write_listing(
                &site,
                &format!("tag/{}", slug),
                &urls::tag(&slug),
                &query,
                &extra,
            )
            .await?;
        }

        Ok(())
    }

    /// The `site` context object: settings fields plus the rendered about
    /// content. A missing or failing settings record produces an empty-ish
    /// object and the build proceeds.
    async fn site_value(&self) -> Value {
        let settings = Degraded(self.store).settings().await.unwrap_or_default();
        let mut value = Value::from(&settings);
        if let Value::Object(obj) = &mut value {
            obj.insert(
                "about_html".to_owned(),
                match &settings.about_content {
                    Some(doc) => Value::String(Renderer::new(self.images).to_html(doc)),
                    None => Value::Nil,
                },
            );
        }
        value
    }

    async fn write_posts(&self, site: &Value) -> Result<()> {
        let slugs = self.store.post_slugs().await?;
        info!("writing {} post pages", slugs.len());
        for slug in slugs {
            let page = match PostPage::fetch(self.store, self.images, &slug).await? {
                Some(page) => page,
                // enumerated a moment ago but gone now; skip it
                None => {
                    warn!("post `{}` disappeared during the build", slug);
                    continue;
                }
            };
            self.write_page(
                &self.templates.post,
                &self.output_directory.join("posts").join(format!("{}.html", slug)),
                crate::value::post_page_value(&page, self.images),
                site,
            )?;
        }
        Ok(())
    }

    async fn write_home(&self, site: &Value) -> Result<()> {
        let latest = Degraded(self.store)
            .list_posts(&ListQuery::page(1, 5))
            .await;
        let mut m: std::collections::HashMap<String, Value> = Default::default();
        m.insert(
            "latest".to_owned(),
            Value::Array(
                latest
                    .posts
                    .iter()
                    .map(|post| crate::value::summary_value(post, self.images))
                    .collect(),
            ),
        );
        self.write_page(
            &self.templates.home,
            &self.output_directory.join("index.html"),
            Value::Object(m),
            site,
        )
    }

    /// Writes one paginated listing: `index.html` for page 1, `{n}.html` for
    /// later pages. An empty listing still gets its `index.html` so the URL
    /// resolves to the empty state.
    async fn write_listing(
        &self,
        site: &Value,
        directory: &str,
        base_path: &str,
        base: &ListQuery,
        extra: &[(&str, Value)],
    ) -> Result<()> {
        let mut page_number = 1;
        loop {
            let mut query = base.clone();
            query.page = page_number;
            query.per_page = self.page_size;
            let page = ListPage::fetch(self.store, &query, base_path).await;
            let total_pages = page.window.total_pages;

            let mut value = crate::value::list_page_value(&page, self.images);
            if let Value::Object(obj) = &mut value {
                for (key, extra_value) in extra {
                    obj.insert((*key).to_owned(), extra_value.clone());
                }
            }
            let file_name = match page_number > 1 {
                false => String::from("index.html"),
                true => format!("{}.html", page_number),
            };
            self.write_page(
                &self.templates.list,
                &self.output_directory.join(directory).join(file_name),
                value,
                site,
            )?;

            if page_number >= total_pages {
                return Ok(());
            }
            page_number += 1;
        }
    }

    /// Templates `value` and writes it to `path`, creating parent directories
    /// as needed. Inserts the shared `site` object into the context first.
    fn write_page(
        &self,
        template: &Template,
        path: &Path,
        mut value: Value,
        site: &Value,
    ) -> Result<()> {
        if let Value::Object(obj) = &mut value {
            obj.insert("site".to_owned(), site.clone());
        }
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        template.execute(&mut File::create(path)?, &Context::from(value)?)?;
        Ok(())
    }
}

/// The result of a fallible page-writing operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(String),

    /// An error writing the output files.
    Io(io::Error),

    /// An error fetching content.
    Store(store::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<store::Error> for Error {
    /// Converts a [`store::Error`] into an [`Error`]. This allows us to use
    /// the `?` operator for content queries.
    fn from(err: store::Error) -> Error {
        Error::Store(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::Store(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::Io(err) => Some(err),
            Error::Store(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::doc::{Block, Document, Span};
    use crate::store::{
        Category, CategoryRef, Listing, Post, PostSummary, SiteSettings, Tag, TagRef,
    };
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use url::Url;

    struct InMemoryStore {
        posts: Vec<Post>,
        settings: SiteSettings,
    }

    #[async_trait]
    impl ContentStore for InMemoryStore {
        async fn post_by_slug(&self, slug: &str) -> store::Result<Option<Post>> {
            Ok(self
                .posts
                .iter()
                .find(|post| post.summary.slug == slug)
                .cloned())
        }

        async fn list_posts(&self, query: &ListQuery) -> store::Result<Listing> {
            let matched: Vec<PostSummary> = self
                .posts
                .iter()
                .filter(|post| match &query.category {
                    Some(category) => post
                        .summary
                        .category
                        .as_ref()
                        .map(|c| &c.slug == category)
                        .unwrap_or(false),
                    None => true,
                })
                .filter(|post| match &query.tag {
                    Some(tag) => post.summary.tags.iter().any(|t| &t.slug == tag),
                    None => true,
                })
                .map(|post| post.summary.clone())
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
            _slug: &str,
            _category_id: Option<&str>,
            _tag_ids: &[String],
        ) -> store::Result<Vec<PostSummary>> {
            Ok(Vec::new())
        }

        async fn categories(&self) -> store::Result<Vec<Category>> {
            Ok(Vec::new())
        }

        async fn tags(&self) -> store::Result<Vec<Tag>> {
            Ok(Vec::new())
        }

        async fn category_by_slug(&self, _slug: &str) -> store::Result<Option<Category>> {
            Ok(None)
        }

        async fn tag_by_slug(&self, _slug: &str) -> store::Result<Option<Tag>> {
            Ok(None)
        }

        async fn post_slugs(&self) -> store::Result<Vec<String>> {
            Ok(self
                .posts
                .iter()
                .map(|post| post.summary.slug.clone())
                .collect())
        }

        async fn category_slugs(&self) -> store::Result<Vec<String>> {
            Ok(vec!["updates".to_owned()])
        }

        async fn tag_slugs(&self) -> store::Result<Vec<String>> {
            Ok(vec!["greeting".to_owned()])
        }

        async fn settings(&self) -> store::Result<Option<SiteSettings>> {
            Ok(Some(self.settings.clone()))
        }
    }

    fn template(text: &str) -> Template {
        let mut template = Template::default();
        template.parse(text).unwrap();
        template
    }

    fn fixture() -> InMemoryStore {
        let mut post = Post::default();
        post.summary.title = "Hello, world!".to_owned();
        post.summary.slug = "hello-world".to_owned();
        post.summary.published_at = Some(Utc.ymd(2021, 4, 16).and_hms(0, 0, 0));
        post.summary.category = Some(CategoryRef {
            id: None,
            title: "Updates".to_owned(),
            slug: "updates".to_owned(),
            color: None,
        });
        post.summary.tags = vec![TagRef {
            id: None,
            title: "Greeting".to_owned(),
            slug: "greeting".to_owned(),
        }];
        post.body = Document::new(vec![Block::Paragraph(vec![Span::plain("body")])]);

        let mut settings = SiteSettings::default();
        settings.title = "Demo Blog".to_owned();
        InMemoryStore {
            posts: vec![post],
            settings,
        }
    }

    #[tokio::test]
    async fn test_write_site() {
        let store = fixture();
        let images =
            UrlBuilder::new(Url::parse("https://cdn.example.org/images/demo/production/").unwrap());
        let templates = Templates {
            post: template("{{.meta_title}} on {{.site.title}}"),
            list: template("{{len .posts}} posts, page {{.pagination.current_page}}"),
            home: template("{{.site.title}}: {{len .latest}} latest"),
            not_found: template("not found on {{.site.title}}"),
        };
        let out = tempfile::tempdir().unwrap();
        let writer = Writer {
            templates: &templates,
            store: &store,
            images: &images,
            page_size: 9,
            output_directory: out.path(),
        };
        writer.write_site().await.unwrap();

        let read = |relpath: &str| std::fs::read_to_string(out.path().join(relpath)).unwrap();
        assert_eq!(
            read("posts/hello-world.html"),
            "Hello, world! on Demo Blog",
        );
        assert_eq!(read("blog/index.html"), "1 posts, page 1");
        assert_eq!(read("category/updates/index.html"), "1 posts, page 1");
        assert_eq!(read("tag/greeting/index.html"), "1 posts, page 1");
        assert_eq!(read("index.html"), "Demo Blog: 1 latest");
        assert_eq!(read("404.html"), "not found on Demo Blog");
    }
}
