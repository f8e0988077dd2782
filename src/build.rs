//! Exports the [`build_site`] function which stitches together the
//! high-level steps of building the output site: opening the configured
//! content backend ([`crate::store`]), parsing the theme templates, writing
//! post and listing pages ([`crate::write`]), copying the theme's static
//! directory, and generating the sitemap and robots file
//! ([`crate::sitemap`]).

use crate::config::Config;
use crate::image::UrlBuilder;
use crate::sitemap;
use crate::store;
use crate::write::{Templates, Writer};
use anyhow::{Context as _, Result};
use gtmpl::Template;
use log::info;
use std::fs::File;
use std::path::Path;
use walkdir::WalkDir;

/// Builds the site from a [`Config`] object into `output_directory`.
pub async fn build_site(config: Config, output_directory: &Path) -> Result<()> {
    let store = store::open(&config.backend).await?;

    let templates = Templates {
        post: parse_template(config.post_template.iter())?,
        list: parse_template(config.list_template.iter())?,
        home: parse_template(config.home_template.iter())?,
        not_found: parse_template(config.not_found_template.iter())?,
    };

    // Blow away the old output subdirectories so stale pages don't linger.
    // The root output directory itself is left alone in case the user points
    // the build at the wrong place.
    for subdirectory in &["posts", "blog", "category", "tag", "static"] {
        rmdir(&output_directory.join(subdirectory))?;
    }

    let images = UrlBuilder::new(config.image_cdn.clone());
    let writer = Writer {
        templates: &templates,
        store: store.as_ref(),
        images: &images,
        page_size: config.page_size,
        output_directory,
    };
    writer.write_site().await?;

    copy_static(&config.static_directory, &output_directory.join("static"))?;

    let xml = sitemap::sitemap(store.as_ref(), &config.site_url).await?;
    std::fs::write(output_directory.join("sitemap.xml"), xml)?;
    std::fs::write(
        output_directory.join("robots.txt"),
        sitemap::robots(&config.site_url),
    )?;

    info!("site built into {}", output_directory.display());
    Ok(())
}

/// Copies the theme's static directory into the output tree. A theme without
/// one is fine.
fn copy_static(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_dir() {
        return Ok(());
    }
    for entry in WalkDir::new(src) {
        let entry = entry?;
        let target = dst.join(entry.path().strip_prefix(src)?);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(template_file)
            .with_context(|| {
                format!("Opening template file '{}'", template_file.display())
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template
        .parse(&contents)
        .map_err(|err| anyhow::anyhow!("Parsing template: {}", err))?;
    Ok(template)
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(e).with_context(|| format!("Cleaning directory '{}'", dir.display())),
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    /// End-to-end build over the flat-file backend.
    #[tokio::test]
    async fn test_build_site() {
        let project = tempfile::tempdir().unwrap();
        let root = project.path();
        fs::create_dir_all(root.join("content").join("posts")).unwrap();
        fs::create_dir_all(root.join("theme").join("static")).unwrap();

        fs::write(
            root.join("tansu.yaml"),
            concat!(
                "site_url: https://blog.example.org/\n",
                "image_cdn: https://cdn.example.org/images/demo/production/\n",
                "backend:\n  type: files\n  directory: content\n",
            ),
        )
        .unwrap();
        fs::write(
            root.join("theme").join("theme.yaml"),
            concat!(
                "post_template: [post.html]\n",
                "list_template: [list.html]\n",
                "home_template: [home.html]\n",
                "not_found_template: [not_found.html]\n",
            ),
        )
        .unwrap();
        fs::write(root.join("theme").join("post.html"), "{{.meta_title}}").unwrap();
        fs::write(
            root.join("theme").join("list.html"),
            "{{len .posts}} posts",
        )
        .unwrap();
        fs::write(root.join("theme").join("home.html"), "{{.site.title}}").unwrap();
        fs::write(root.join("theme").join("not_found.html"), "404").unwrap();
        fs::write(root.join("theme").join("static").join("style.css"), "body {}").unwrap();

        fs::write(
            root.join("content").join("posts").join("hello.md"),
            "---\ntitle: Hello\ndate: 2021-04-16\n---\nWorld\n",
        )
        .unwrap();
        fs::write(root.join("content").join("settings.yaml"), "title: Demo Blog\n").unwrap();

        let config = Config::from_directory(root).unwrap();
        let out = tempfile::tempdir().unwrap();
        build_site(config, out.path()).await.unwrap();

        assert_eq!(
            fs::read_to_string(out.path().join("posts").join("hello.html")).unwrap(),
            "Hello ",
        );
        assert!(out.path().join("blog").join("index.html").is_file());
        assert_eq!(
            fs::read_to_string(out.path().join("index.html")).unwrap(),
            "Demo Blog ",
        );
        assert!(out.path().join("static").join("style.css").is_file());
        assert!(fs::read_to_string(out.path().join("sitemap.xml"))
            .unwrap()
            .contains("posts/hello.html"));
        assert!(out.path().join("robots.txt").is_file());
    }
}
