//! Project configuration. A site is described by a `tansu.yaml` project file
//! (discovered by walking up from the invocation directory) plus a
//! `theme/theme.yaml` naming the template fragments for each page kind.

use crate::util::open;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Deserialize)]
struct PageSize(usize);
impl Default for PageSize {
    fn default() -> Self {
        PageSize(9)
    }
}

#[derive(Deserialize)]
struct Project {
    pub site_url: Url,
    pub image_cdn: Url,
    pub backend: BackendConfig,

    #[serde(default)]
    pub page_size: PageSize,
}

/// Selects which content backend a site reads from. Exactly one is live per
/// site; every page renders identically regardless of the choice.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// A hosted content API queried over HTTP.
    Api {
        base_url: Url,
        dataset: String,

        #[serde(default)]
        token: Option<String>,
    },

    /// A local SQLite database.
    Database { path: PathBuf },

    /// Markdown files with YAML frontmatter under a directory.
    Files { directory: PathBuf },
}

#[derive(Deserialize)]
struct Theme {
    post_template: Vec<PathBuf>,
    list_template: Vec<PathBuf>,
    home_template: Vec<PathBuf>,
    not_found_template: Vec<PathBuf>,
}

pub struct Config {
    pub site_url: Url,
    pub image_cdn: Url,
    pub backend: BackendConfig,
    pub page_size: usize,
    pub post_template: Vec<PathBuf>,
    pub list_template: Vec<PathBuf>,
    pub home_template: Vec<PathBuf>,
    pub not_found_template: Vec<PathBuf>,
    pub static_directory: PathBuf,
}

impl Config {
    pub fn from_directory(dir: &Path) -> Result<Config> {
        let path = dir.join("tansu.yaml");
        if path.exists() {
            match Config::from_project_file(&path) {
                Ok(config) => Ok(config),
                Err(e) => Err(anyhow!("Loading configuration: {:?}", e)),
            }
        } else {
            match path.parent().and_then(Path::parent) {
                Some(dir) => Config::from_directory(dir),
                None => Err(anyhow!(
                    "Could not find `tansu.yaml` in any parent directory"
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => {
                let theme_dir = project_root.join("theme");
                let theme_file = open(&theme_dir.join("theme.yaml"), "theme")?;
                let theme: Theme = serde_yaml::from_reader(theme_file)?;
                let resolve = |relpaths: Vec<PathBuf>| -> Vec<PathBuf> {
                    relpaths
                        .iter()
                        .map(|relpath| theme_dir.join(relpath))
                        .collect()
                };
                Ok(Config {
                    site_url: project.site_url,
                    image_cdn: project.image_cdn,
                    backend: match project.backend {
                        // Relative backend paths resolve against the project
                        // root, not the invocation directory.
                        BackendConfig::Database { path } => BackendConfig::Database {
                            path: project_root.join(path),
                        },
                        BackendConfig::Files { directory } => BackendConfig::Files {
                            directory: project_root.join(directory),
                        },
                        api => api,
                    },
                    page_size: project.page_size.0,
                    post_template: resolve(theme.post_template),
                    list_template: resolve(theme.list_template),
                    home_template: resolve(theme.home_template),
                    not_found_template: resolve(theme.not_found_template),
                    static_directory: theme_dir.join("static"),
                })
            }
        }
    }
}
