//! Conversions from view models into [`gtmpl_value::Value`] objects for
//! templating. Card images resolve through the site's
//! [`crate::image::UrlBuilder`], so conversions that need an image URL take
//! the builder as a tuple member.

use crate::image::UrlBuilder;
use crate::page::{urls, ListPage, PostPage};
use crate::paginate::{PageWindow, Selector};
use crate::store::{
    Category, CategoryRef, PostSummary, SiteSettings, SocialLink, Tag, TagRef,
};
use crate::toc::HeadingEntry;
use chrono::{DateTime, Utc};
use gtmpl_value::Value;
use std::collections::HashMap;

// Listing-card crop.
const CARD_IMAGE_WIDTH: u32 = 800;
const CARD_IMAGE_HEIGHT: u32 = 450;

fn option_string(opt: &Option<String>) -> Value {
    match opt {
        Some(s) => Value::String(s.clone()),
        None => Value::Nil,
    }
}

fn date_value(date: &Option<DateTime<Utc>>) -> Value {
    match date {
        Some(date) => Value::String(date.format("%B %e, %Y").to_string()),
        None => Value::Nil,
    }
}

impl From<&TagRef> for Value {
    fn from(tag: &TagRef) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(tag.title.clone()));
        m.insert("slug".to_owned(), Value::String(tag.slug.clone()));
        m.insert("url".to_owned(), Value::String(urls::tag(&tag.slug)));
        Value::Object(m)
    }
}

impl From<&CategoryRef> for Value {
    fn from(category: &CategoryRef) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(category.title.clone()));
        m.insert("slug".to_owned(), Value::String(category.slug.clone()));
        m.insert(
            "url".to_owned(),
            Value::String(urls::category(&category.slug)),
        );
        m.insert("color".to_owned(), option_string(&category.color));
        Value::Object(m)
    }
}

impl From<&Category> for Value {
    fn from(category: &Category) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(category.title.clone()));
        m.insert("slug".to_owned(), Value::String(category.slug.clone()));
        m.insert(
            "url".to_owned(),
            Value::String(urls::category(&category.slug)),
        );
        m.insert("description".to_owned(), option_string(&category.description));
        m.insert("color".to_owned(), option_string(&category.color));
        m.insert(
            "post_count".to_owned(),
            Value::from(category.post_count as i64),
        );
        Value::Object(m)
    }
}

impl From<&Tag> for Value {
    fn from(tag: &Tag) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(tag.title.clone()));
        m.insert("slug".to_owned(), Value::String(tag.slug.clone()));
        m.insert("url".to_owned(), Value::String(urls::tag(&tag.slug)));
        m.insert("post_count".to_owned(), Value::from(tag.post_count as i64));
        Value::Object(m)
    }
}

impl From<&SocialLink> for Value {
    fn from(link: &SocialLink) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("label".to_owned(), Value::String(link.label.clone()));
        m.insert("url".to_owned(), Value::String(link.url.clone()));
        Value::Object(m)
    }
}

pub fn summary_value(post: &PostSummary, images: &UrlBuilder) -> Value {
    {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(post.title.clone()));
        m.insert("slug".to_owned(), Value::String(post.slug.clone()));
        m.insert("url".to_owned(), Value::String(urls::post(&post.slug)));
        m.insert("excerpt".to_owned(), option_string(&post.excerpt));
        m.insert("date".to_owned(), date_value(&post.published_at));
        m.insert(
            "image_url".to_owned(),
            match post.main_image.as_ref().and_then(|image| {
                images.url(&image.asset, CARD_IMAGE_WIDTH, CARD_IMAGE_HEIGHT)
            }) {
                Some(url) => Value::String(url),
                None => Value::Nil,
            },
        );
        m.insert(
            "image_alt".to_owned(),
            option_string(&post.main_image.as_ref().and_then(|image| image.alt.clone())),
        );
        m.insert(
            "category".to_owned(),
            match &post.category {
                Some(category) => category.into(),
                None => Value::Nil,
            },
        );
        m.insert(
            "tags".to_owned(),
            Value::Array(post.tags.iter().map(Value::from).collect()),
        );
        Value::Object(m)
    }
}

impl From<&HeadingEntry> for Value {
    fn from(entry: &HeadingEntry) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("id".to_owned(), Value::String(entry.id.clone()));
        m.insert("text".to_owned(), Value::String(entry.text.clone()));
        m.insert("level".to_owned(), Value::from(entry.level as i64));
        Value::Object(m)
    }
}

impl From<&PageWindow> for Value {
    fn from(window: &PageWindow) -> Value {
        let selectors: Vec<Value> = window
            .selectors()
            .iter()
            .map(|selector| {
                let mut m: HashMap<String, Value> = HashMap::new();
                match selector {
                    Selector::Ellipsis => {
                        m.insert("ellipsis".to_owned(), Value::from(true));
                        m.insert("page".to_owned(), Value::Nil);
                        m.insert("url".to_owned(), Value::Nil);
                        m.insert("current".to_owned(), Value::from(false));
                    }
                    Selector::Page(page) => {
                        m.insert("ellipsis".to_owned(), Value::from(false));
                        m.insert("page".to_owned(), Value::from(*page as i64));
                        m.insert("url".to_owned(), Value::String(window.page_url(*page)));
                        m.insert(
                            "current".to_owned(),
                            Value::from(*page == window.current_page),
                        );
                    }
                }
                Value::Object(m)
            })
            .collect();

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "current_page".to_owned(),
            Value::from(window.current_page as i64),
        );
        m.insert(
            "total_pages".to_owned(),
            Value::from(window.total_pages as i64),
        );
        m.insert(
            "prev".to_owned(),
            match window.prev() {
                Some(url) => Value::String(url),
                None => Value::Nil,
            },
        );
        m.insert(
            "next".to_owned(),
            match window.next() {
                Some(url) => Value::String(url),
                None => Value::Nil,
            },
        );
        m.insert("selectors".to_owned(), Value::Array(selectors));
        Value::Object(m)
    }
}

pub fn list_page_value(page: &ListPage, images: &UrlBuilder) -> Value {
    {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "posts".to_owned(),
            Value::Array(
                page.posts
                    .iter()
                    .map(|post| summary_value(post, images))
                    .collect(),
            ),
        );
        m.insert("empty".to_owned(), Value::from(page.is_empty()));
        m.insert("pagination".to_owned(), Value::from(&page.window));
        Value::Object(m)
    }
}

pub fn post_page_value(page: &PostPage, images: &UrlBuilder) -> Value {
    {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "post".to_owned(),
            summary_value(&page.post.summary, images),
        );
        m.insert(
            "body_html".to_owned(),
            Value::String(page.body_html.clone()),
        );
        m.insert(
            "toc".to_owned(),
            Value::Array(page.toc.iter().map(Value::from).collect()),
        );
        m.insert(
            "related".to_owned(),
            Value::Array(
                page.related
                    .iter()
                    .map(|post| summary_value(post, images))
                    .collect(),
            ),
        );
        m.insert(
            "author".to_owned(),
            match &page.post.author {
                Some(author) => {
                    let mut a: HashMap<String, Value> = HashMap::new();
                    a.insert("name".to_owned(), Value::String(author.name.clone()));
                    a.insert("bio".to_owned(), option_string(&author.bio));
                    Value::Object(a)
                }
                None => Value::Nil,
            },
        );
        m.insert("updated".to_owned(), date_value(&page.post.updated_at));
        m.insert(
            "meta_title".to_owned(),
            Value::String(page.meta_title.clone()),
        );
        m.insert(
            "meta_description".to_owned(),
            option_string(&page.meta_description),
        );
        m.insert("og_image".to_owned(), option_string(&page.og_image));
        Value::Object(m)
    }
}

impl From<&SiteSettings> for Value {
    fn from(settings: &SiteSettings) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(settings.title.clone()));
        m.insert("description".to_owned(), option_string(&settings.description));
        m.insert(
            "hero_tagline".to_owned(),
            option_string(&settings.hero_tagline),
        );
        m.insert(
            "hero_subtitle".to_owned(),
            option_string(&settings.hero_subtitle),
        );
        m.insert("about_title".to_owned(), option_string(&settings.about_title));
        m.insert(
            "contact_email".to_owned(),
            option_string(&settings.contact_email),
        );
        m.insert("footer_text".to_owned(), option_string(&settings.footer_text));
        m.insert(
            "social_links".to_owned(),
            Value::Array(settings.social_links.iter().map(Value::from).collect()),
        );
        Value::Object(m)
    }
}
