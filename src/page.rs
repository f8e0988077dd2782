//! Assembles view models for the site's pages: a [`PostPage`] (rendered body,
//! heading index, related posts, SEO metadata) and a [`ListPage`] (one page
//! of summaries plus its pagination window).
//!
//! Listing fetches go through [`Degraded`], so a backend failure produces an
//! empty listing rather than an error. A post lookup stays honest: `Ok(None)`
//! means the slug doesn't exist and the caller renders the not-found page.

use crate::image::UrlBuilder;
use crate::paginate::{total_pages, PageWindow};
use crate::render::Renderer;
use crate::store::{ContentStore, Degraded, ListQuery, Post, PostSummary, Result};
use crate::toc::{headings, HeadingEntry};

// Social-card crop for og:image.
const OG_IMAGE_WIDTH: u32 = 1200;
const OG_IMAGE_HEIGHT: u32 = 630;

/// Root-relative paths for the site's pages. The sitemap joins these against
/// the configured site URL.
pub mod urls {
    pub fn post(slug: &str) -> String {
        format!("/posts/{}.html", slug)
    }

    pub fn blog() -> String {
        "/blog/".to_owned()
    }

    pub fn category(slug: &str) -> String {
        format!("/category/{}/", slug)
    }

    pub fn tag(slug: &str) -> String {
        format!("/tag/{}/", slug)
    }
}

/// One page of the article listing, ready to template.
pub struct ListPage {
    pub posts: Vec<PostSummary>,
    pub window: PageWindow,
}

impl ListPage {
    /// Fetches one listing page. Backend failures degrade to an empty page
    /// with a zero-page window.
    pub async fn fetch(store: &dyn ContentStore, query: &ListQuery, base_path: &str) -> ListPage {
        let listing = Degraded(store).list_posts(query).await;
        ListPage {
            window: PageWindow::new(
                query.page.max(1),
                total_pages(listing.total, query.per_page),
                base_path,
            ),
            posts: listing.posts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

/// A fully assembled article page.
pub struct PostPage {
    pub post: Post,
    pub body_html: String,
    pub toc: Vec<HeadingEntry>,
    pub related: Vec<PostSummary>,
    pub meta_title: String,
    pub meta_description: Option<String>,
    pub og_image: Option<String>,
}

impl PostPage {
    /// Fetches and renders the post at `slug`. `Ok(None)` means no such
    /// post. The related-posts query degrades to empty on failure; the post
    /// lookup itself does not.
    pub async fn fetch(
        store: &dyn ContentStore,
        images: &UrlBuilder,
        slug: &str,
    ) -> Result<Option<PostPage>> {
        let post = match store.post_by_slug(slug).await? {
            Some(post) => post,
            None => return Ok(None),
        };

        let tag_ids: Vec<String> = post
            .summary
            .tags
            .iter()
            .filter_map(|tag| tag.id.clone())
            .collect();
        let related = Degraded(store)
            .related_posts(
                slug,
                post.summary.category.as_ref().and_then(|c| c.id.as_deref()),
                &tag_ids,
            )
            .await;

        let body_html = Renderer::new(images).to_html(&post.body);
        let toc = headings(&post.body).collect();

        let seo = post.seo.as_ref();
        let meta_title = seo
            .and_then(|seo| seo.meta_title.clone())
            .unwrap_or_else(|| post.summary.title.clone());
        let meta_description = seo
            .and_then(|seo| seo.meta_description.clone())
            .or_else(|| post.summary.excerpt.clone());
        let og_image = seo
            .and_then(|seo| seo.og_image.as_ref())
            .or(post.summary.main_image.as_ref())
            .and_then(|image| images.url(&image.asset, OG_IMAGE_WIDTH, OG_IMAGE_HEIGHT));

        Ok(Some(PostPage {
            post,
            body_html,
            toc,
            related,
            meta_title,
            meta_description,
            og_image,
        }))
    }
}
