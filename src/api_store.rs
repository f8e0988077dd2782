//! The hosted-API content backend. Queries a content API over HTTPS; every
//! query is a GROQ expression sent to the dataset's query endpoint, and every
//! response arrives as `{"result": ...}` JSON that maps onto the store's
//! record types.
//!
//! Records come back camelCase and get converted at the edge; the rest of the
//! crate only sees [`crate::store`] types. An optional bearer token
//! authorizes access to private datasets.

use crate::doc::Document;
use crate::image::ImageRef;
use crate::store::{
    Author, Category, CategoryRef, ContentStore, Error, ListQuery, Listing, Post, PostSummary,
    Result, Seo, SiteSettings, SocialLink, Tag, TagRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

const PUBLISHED: &str = r#"_type == "post" && defined(slug.current) && defined(publishedAt)"#;

const SUMMARY_PROJECTION: &str = r#"{
    "id": _id, title, "slug": slug.current, excerpt,
    "mainImage": mainImage{"asset": asset._ref, alt},
    publishedAt,
    "category": category->{"id": _id, title, "slug": slug.current, color},
    "tags": tags[]->{"id": _id, title, "slug": slug.current}
}"#;

const POST_PROJECTION: &str = r#"{
    "id": _id, title, "slug": slug.current, excerpt,
    "mainImage": mainImage{"asset": asset._ref, alt},
    publishedAt, updatedAt, body,
    "category": category->{"id": _id, title, "slug": slug.current, color},
    "tags": tags[]->{"id": _id, title, "slug": slug.current},
    "author": author->{name, bio, "image": image{"asset": asset._ref, alt}},
    "seo": seo{metaTitle, metaDescription,
               "ogImage": ogImage{"asset": asset._ref, alt}}
}"#;

const CATEGORY_PROJECTION: &str = r#"{
    "id": _id, title, "slug": slug.current, description, color,
    "postCount": count(*[_type == "post" && references(^._id)])
}"#;

const TAG_PROJECTION: &str = r#"{
    "id": _id, title, "slug": slug.current,
    "postCount": count(*[_type == "post" && references(^._id)])
}"#;

pub struct ApiStore {
    client: Client,
    endpoint: Url,
}

impl ApiStore {
    pub fn new(base_url: Url, dataset: String, token: Option<String>) -> Result<ApiStore> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = &token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::Backend(format!("invalid API token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(ApiStore {
            client: Client::builder().default_headers(headers).build()?,
            endpoint: base_url.join(&format!("data/query/{}", dataset))?,
        })
    }

    async fn query<T: DeserializeOwned>(
        &self,
        groq: String,
        params: &[(&str, serde_json::Value)],
    ) -> Result<T> {
        let mut request = self
            .client
            .get(self.endpoint.clone())
            .query(&[("query", groq.as_str())]);
        for (name, value) in params {
            // The query API takes parameters as `$name` pairs with
            // JSON-encoded values.
            request = request.query(&[(format!("${}", name), serde_json::to_string(value)?)]);
        }
        let response: QueryResponse<T> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.result)
    }
}

/// The filter expression and parameters for one listing query.
fn list_filter(query: &ListQuery) -> (String, Vec<(&'static str, serde_json::Value)>) {
    let mut filter = PUBLISHED.to_owned();
    let mut params = Vec::new();
    if let Some(search) = &query.search {
        filter.push_str(" && (title match $q || excerpt match $q)");
        params.push(("q", json!(search)));
    }
    if let Some(category) = &query.category {
        filter.push_str(" && category->slug.current == $category");
        params.push(("category", json!(category)));
    }
    if let Some(tag) = &query.tag {
        filter.push_str(" && $tag in tags[]->slug.current");
        params.push(("tag", json!(tag)));
    }
    (filter, params)
}

#[async_trait]
impl ContentStore for ApiStore {
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        let raw: Option<RawPost> = self
            .query(
                format!(
                    r#"*[{} && slug.current == $slug][0] {}"#,
                    PUBLISHED, POST_PROJECTION
                ),
                &[("slug", json!(slug))],
            )
            .await?;
        Ok(raw.map(Post::from))
    }

    async fn list_posts(&self, query: &ListQuery) -> Result<Listing> {
        let (filter, params) = list_filter(query);
        let start = query.start();
        let end = start + query.per_page;
        let posts: Vec<RawSummary> = self
            .query(
                format!(
                    "*[{}] | order(publishedAt desc) [{}...{}] {}",
                    filter, start, end, SUMMARY_PROJECTION
                ),
                &params,
            )
            .await?;
        let total: usize = self.query(format!("count(*[{}])", filter), &params).await?;
        Ok(Listing {
            posts: posts.into_iter().map(PostSummary::from).collect(),
            total,
        })
    }

    async fn related_posts(
        &self,
        slug: &str,
        category_id: Option<&str>,
        tag_ids: &[String],
    ) -> Result<Vec<PostSummary>> {
        let posts: Vec<RawSummary> = self
            .query(
                format!(
                    concat!(
                        r#"*[{} && slug.current != $slug &&"#,
                        r#" (category._ref == $category"#,
                        r#"  || count((tags[]._ref)[@ in $tags]) > 0)]"#,
                        " | order(publishedAt desc) [0...4] {}",
                    ),
                    PUBLISHED, SUMMARY_PROJECTION
                ),
                &[
                    ("slug", json!(slug)),
                    ("category", json!(category_id)),
                    ("tags", json!(tag_ids)),
                ],
            )
            .await?;
        Ok(posts.into_iter().map(PostSummary::from).collect())
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let raw: Vec<RawCategory> = self
            .query(
                format!(
                    r#"*[_type == "category"] | order(title asc) {}"#,
                    CATEGORY_PROJECTION
                ),
                &[],
            )
            .await?;
        Ok(raw.into_iter().map(Category::from).collect())
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        let raw: Vec<RawTag> = self
            .query(
                format!(r#"*[_type == "tag"] | order(title asc) {}"#, TAG_PROJECTION),
                &[],
            )
            .await?;
        Ok(raw.into_iter().map(Tag::from).collect())
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let raw: Option<RawCategory> = self
            .query(
                format!(
                    r#"*[_type == "category" && slug.current == $slug][0] {}"#,
                    CATEGORY_PROJECTION
                ),
                &[("slug", json!(slug))],
            )
            .await?;
        Ok(raw.map(Category::from))
    }

    async fn tag_by_slug(&self, slug: &str) -> Result<Option<Tag>> {
        let raw: Option<RawTag> = self
            .query(
                format!(
                    r#"*[_type == "tag" && slug.current == $slug][0] {}"#,
                    TAG_PROJECTION
                ),
                &[("slug", json!(slug))],
            )
            .await?;
        Ok(raw.map(Tag::from))
    }

    async fn post_slugs(&self) -> Result<Vec<String>> {
        self.query(format!("*[{}].slug.current", PUBLISHED), &[])
            .await
    }

    async fn category_slugs(&self) -> Result<Vec<String>> {
        self.query(
            r#"*[_type == "category" && defined(slug.current)].slug.current"#.to_owned(),
            &[],
        )
        .await
    }

    async fn tag_slugs(&self) -> Result<Vec<String>> {
        self.query(
            r#"*[_type == "tag" && defined(slug.current)].slug.current"#.to_owned(),
            &[],
        )
        .await
    }

    async fn settings(&self) -> Result<Option<SiteSettings>> {
        let raw: Option<RawSettings> = self
            .query(
                concat!(
                    r#"*[_type == "siteSettings"][0]"#,
                    r#"{title, description, heroTagline, heroSubtitle,"#,
                    r#" aboutTitle, aboutContent, contactEmail, footerText,"#,
                    r#" "socialLinks": socialLinks[]{label, url}}"#,
                )
                .to_owned(),
                &[],
            )
            .await?;
        Ok(raw.map(SiteSettings::from))
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct QueryResponse<T> {
    result: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSummary {
    id: String,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    slug: Option<String>,

    #[serde(default)]
    excerpt: Option<String>,

    #[serde(default)]
    main_image: Option<RawImage>,

    #[serde(default)]
    published_at: Option<DateTime<Utc>>,

    #[serde(default)]
    category: Option<RawCategoryRef>,

    #[serde(default)]
    tags: Option<Vec<RawTagRef>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPost {
    #[serde(flatten)]
    summary: RawSummary,

    #[serde(default)]
    body: Option<Document>,

    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    author: Option<RawAuthor>,

    #[serde(default)]
    seo: Option<RawSeo>,
}

#[derive(Deserialize)]
struct RawImage {
    #[serde(default)]
    asset: Option<String>,

    #[serde(default)]
    alt: Option<String>,
}

#[derive(Deserialize)]
struct RawCategoryRef {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    slug: Option<String>,

    #[serde(default)]
    color: Option<String>,
}

#[derive(Deserialize)]
struct RawTagRef {
    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    slug: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCategory {
    id: String,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    slug: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    color: Option<String>,

    #[serde(default)]
    post_count: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTag {
    id: String,

    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    slug: Option<String>,

    #[serde(default)]
    post_count: usize,
}

#[derive(Deserialize)]
struct RawAuthor {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    bio: Option<String>,

    #[serde(default)]
    image: Option<RawImage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSeo {
    #[serde(default)]
    meta_title: Option<String>,

    #[serde(default)]
    meta_description: Option<String>,

    #[serde(default)]
    og_image: Option<RawImage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSettings {
    #[serde(default)]
    title: Option<String>,

    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    hero_tagline: Option<String>,

    #[serde(default)]
    hero_subtitle: Option<String>,

    #[serde(default)]
    about_title: Option<String>,

    #[serde(default)]
    about_content: Option<Document>,

    #[serde(default)]
    contact_email: Option<String>,

    #[serde(default)]
    footer_text: Option<String>,

    #[serde(default)]
    social_links: Option<Vec<SocialLink>>,
}

fn image_ref(raw: Option<RawImage>) -> Option<ImageRef> {
    let raw = raw?;
    Some(ImageRef {
        asset: raw.asset?,
        alt: raw.alt,
    })
}

impl From<RawSummary> for PostSummary {
    fn from(raw: RawSummary) -> PostSummary {
        PostSummary {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            slug: raw.slug.unwrap_or_default(),
            excerpt: raw.excerpt,
            main_image: image_ref(raw.main_image),
            published_at: raw.published_at,
            category: raw.category.map(|category| CategoryRef {
                id: category.id,
                title: category.title.unwrap_or_default(),
                slug: category.slug.unwrap_or_default(),
                color: category.color,
            }),
            tags: raw
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|tag| TagRef {
                    id: tag.id,
                    title: tag.title.unwrap_or_default(),
                    slug: tag.slug.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

impl From<RawPost> for Post {
    fn from(raw: RawPost) -> Post {
        Post {
            summary: PostSummary::from(raw.summary),
            body: raw.body.unwrap_or_default(),
            updated_at: raw.updated_at,
            author: raw.author.map(|author| Author {
                name: author.name.unwrap_or_default(),
                bio: author.bio,
                image: image_ref(author.image),
            }),
            seo: raw.seo.map(|seo| Seo {
                meta_title: seo.meta_title,
                meta_description: seo.meta_description,
                og_image: image_ref(seo.og_image),
            }),
        }
    }
}

impl From<RawCategory> for Category {
    fn from(raw: RawCategory) -> Category {
        Category {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            slug: raw.slug.unwrap_or_default(),
            description: raw.description,
            color: raw.color,
            post_count: raw.post_count,
        }
    }
}

impl From<RawTag> for Tag {
    fn from(raw: RawTag) -> Tag {
        Tag {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            slug: raw.slug.unwrap_or_default(),
            post_count: raw.post_count,
        }
    }
}

impl From<RawSettings> for SiteSettings {
    fn from(raw: RawSettings) -> SiteSettings {
        SiteSettings {
            title: raw.title.unwrap_or_default(),
            description: raw.description,
            hero_tagline: raw.hero_tagline,
            hero_subtitle: raw.hero_subtitle,
            about_title: raw.about_title,
            about_content: raw.about_content.filter(|doc| !doc.is_empty()),
            contact_email: raw.contact_email,
            footer_text: raw.footer_text,
            social_links: raw.social_links.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_list_filter() {
        let (filter, params) = list_filter(&ListQuery::page(1, 9));
        assert_eq!(filter, PUBLISHED);
        assert!(params.is_empty());

        let mut query = ListQuery::page(2, 9);
        query.search = Some("rust".to_owned());
        query.category = Some("updates".to_owned());
        let (filter, params) = list_filter(&query);
        assert!(filter.contains("title match $q || excerpt match $q"));
        assert!(filter.contains("category->slug.current == $category"));
        assert_eq!(
            params,
            vec![("q", json!("rust")), ("category", json!("updates"))],
        );
    }

    #[test]
    fn test_summary_mapping() {
        let response: QueryResponse<Vec<RawSummary>> = serde_json::from_str(
            r##"{"result": [{
                "id": "p1",
                "title": "Hello",
                "slug": "hello",
                "excerpt": "short",
                "mainImage": {"asset": "image-abc-1200x675-jpg", "alt": "cover"},
                "publishedAt": "2021-04-16T00:00:00Z",
                "category": {"id": "c1", "title": "Updates", "slug": "updates",
                             "color": "#ff0000"},
                "tags": [{"id": "t1", "title": "Greeting", "slug": "greeting"}]
            }]}"##,
        )
        .unwrap();
        let summaries: Vec<PostSummary> =
            response.result.into_iter().map(PostSummary::from).collect();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].slug, "hello");
        assert_eq!(
            summaries[0].main_image,
            Some(ImageRef {
                asset: "image-abc-1200x675-jpg".to_owned(),
                alt: Some("cover".to_owned()),
            }),
        );
        assert_eq!(
            summaries[0].category.as_ref().map(|c| c.slug.as_str()),
            Some("updates"),
        );
        assert_eq!(summaries[0].tags.len(), 1);
    }

    #[test]
    fn test_post_mapping_tolerates_nulls() {
        let response: QueryResponse<Option<RawPost>> = serde_json::from_str(
            r#"{"result": {
                "id": "p1",
                "title": "Hello",
                "slug": "hello",
                "body": [{"_type": "block", "style": "normal",
                          "children": [{"text": "hi", "marks": []}],
                          "markDefs": []}],
                "author": {"name": "A. Writer"},
                "seo": {"metaTitle": "Hello | Demo"}
            }}"#,
        )
        .unwrap();
        let post = Post::from(response.result.unwrap());
        assert_eq!(post.summary.title, "Hello");
        assert!(!post.body.is_empty());
        assert!(post.summary.published_at.is_none());
        assert_eq!(post.author.map(|a| a.name), Some("A. Writer".to_owned()));
        assert_eq!(
            post.seo.and_then(|seo| seo.meta_title),
            Some("Hello | Demo".to_owned()),
        );
    }

    #[test]
    fn test_missing_post_is_none() {
        let response: QueryResponse<Option<RawPost>> =
            serde_json::from_str(r#"{"result": null}"#).unwrap();
        assert!(response.result.is_none());
    }
}
