//! Generates `sitemap.xml` and `robots.txt` for the built site. The sitemap
//! lists the home page, the article listing, every published post (with its
//! publication date as `lastmod`), and every category and tag listing.

use crate::page::urls;
use crate::store::{ContentStore, ListQuery};
use crate::write::Result;
use chrono::{DateTime, Utc};
use pulldown_cmark::escape::escape_html;
use url::Url;

struct Entry {
    loc: String,
    lastmod: Option<DateTime<Utc>>,
}

/// Collects sitemap entries from the store. Every query here is honest; a
/// broken backend should fail the build rather than publish a partial
/// sitemap.
async fn entries(store: &dyn ContentStore, site_url: &Url) -> Result<Vec<Entry>> {
    let join = |path: &str| -> String {
        match site_url.join(path.trim_start_matches('/')) {
            Ok(url) => url.into(),
            // site_url is absolute, so joining a root-relative path only
            // fails for a cannot-be-a-base URL; fall back to concatenation
            Err(_) => format!("{}{}", site_url, path),
        }
    };

    let mut all = vec![
        Entry {
            loc: site_url.as_str().to_owned(),
            lastmod: None,
        },
        Entry {
            loc: join(&urls::blog()),
            lastmod: None,
        },
    ];

    let total = store.list_posts(&ListQuery::page(1, 1)).await?.total;
    if total > 0 {
        let listing = store.list_posts(&ListQuery::page(1, total)).await?;
        for post in listing.posts {
            all.push(Entry {
                loc: join(&urls::post(&post.slug)),
                lastmod: post.published_at,
            });
        }
    }
    for slug in store.category_slugs().await? {
        all.push(Entry {
            loc: join(&urls::category(&slug)),
            lastmod: None,
        });
    }
    for slug in store.tag_slugs().await? {
        all.push(Entry {
            loc: join(&urls::tag(&slug)),
            lastmod: None,
        });
    }
    Ok(all)
}

/// Renders the sitemap into a string.
pub async fn sitemap(store: &dyn ContentStore, site_url: &Url) -> Result<String> {
    let mut out = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        "\n",
        r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#,
        "\n",
    ));
    for entry in entries(store, site_url).await? {
        out.push_str("  <url><loc>");
        // escaping can't fail when writing into a String
        let _ = escape_html(&mut out, &entry.loc);
        out.push_str("</loc>");
        if let Some(lastmod) = entry.lastmod {
            out.push_str("<lastmod>");
            out.push_str(&lastmod.format("%Y-%m-%d").to_string());
            out.push_str("</lastmod>");
        }
        out.push_str("</url>\n");
    }
    out.push_str("</urlset>\n");
    Ok(out)
}

/// Renders `robots.txt`: everything is crawlable except the admin prefix,
/// and crawlers are pointed at the sitemap.
pub fn robots(site_url: &Url) -> String {
    format!(
        "User-agent: *\nAllow: /\nDisallow: /admin/\n\nSitemap: {}sitemap.xml\n",
        site_url
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::store::{
        Category, Listing, Post, PostSummary, Result as StoreResult, SiteSettings, Tag,
    };
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct SlugStore;

    #[async_trait]
    impl ContentStore for SlugStore {
        async fn post_by_slug(&self, _slug: &str) -> StoreResult<Option<Post>> {
            Ok(None)
        }

        async fn list_posts(&self, query: &ListQuery) -> StoreResult<Listing> {
            let mut post = PostSummary::default();
            post.slug = "hello-world".to_owned();
            post.published_at = Some(Utc.ymd(2021, 4, 16).and_hms(0, 0, 0));
            let posts = match query.per_page {
                0 => Vec::new(),
                _ => vec![post],
            };
            Ok(Listing { posts, total: 1 })
        }

        async fn related_posts(
            &self,
            _slug: &str,
            _category_id: Option<&str>,
            _tag_ids: &[String],
        ) -> StoreResult<Vec<PostSummary>> {
            Ok(Vec::new())
        }

        async fn categories(&self) -> StoreResult<Vec<Category>> {
            Ok(Vec::new())
        }

        async fn tags(&self) -> StoreResult<Vec<Tag>> {
            Ok(Vec::new())
        }

        async fn category_by_slug(&self, _slug: &str) -> StoreResult<Option<Category>> {
            Ok(None)
        }

        async fn tag_by_slug(&self, _slug: &str) -> StoreResult<Option<Tag>> {
            Ok(None)
        }

        async fn post_slugs(&self) -> StoreResult<Vec<String>> {
            Ok(vec!["hello-world".to_owned()])
        }

        async fn category_slugs(&self) -> StoreResult<Vec<String>> {
            Ok(vec!["updates".to_owned()])
        }

        async fn tag_slugs(&self) -> StoreResult<Vec<String>> {
            Ok(vec!["greeting".to_owned()])
        }

        async fn settings(&self) -> StoreResult<Option<SiteSettings>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_sitemap() {
        let site_url = Url::parse("https://blog.example.org/").unwrap();
        let xml = sitemap(&SlugStore, &site_url).await.unwrap();
        assert!(xml.contains("<loc>https://blog.example.org/</loc>"));
        assert!(xml.contains("<loc>https://blog.example.org/blog/</loc>"));
        assert!(xml.contains(
            "<loc>https://blog.example.org/posts/hello-world.html</loc><lastmod>2021-04-16</lastmod>"
        ));
        assert!(xml.contains("<loc>https://blog.example.org/category/updates/</loc>"));
        assert!(xml.contains("<loc>https://blog.example.org/tag/greeting/</loc>"));
    }

    #[test]
    fn test_robots() {
        let site_url = Url::parse("https://blog.example.org/").unwrap();
        let text = robots(&site_url);
        assert!(text.contains("Disallow: /admin/"));
        assert!(text.contains("Sitemap: https://blog.example.org/sitemap.xml"));
    }
}
