use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tansu::build::build_site;
use tansu::config::Config;

/// Builds a blog's HTML pages from one of three interchangeable content
/// backends: a hosted content API, a local SQLite database, or markdown
/// files with YAML frontmatter.
#[derive(Parser)]
#[command(name = "tansu", about = "A content-pipeline static blog generator", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site.
    ///
    /// Finds the project file (`tansu.yaml`) by walking up from the current
    /// directory unless `--config` points at it directly.
    Build {
        /// Path to the project file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output directory.
        #[arg(short, long, default_value = "_output")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Build { config, out } => {
            let config = match config {
                Some(path) => Config::from_project_file(&path)?,
                None => Config::from_directory(&std::env::current_dir()?)?,
            };
            std::fs::create_dir_all(&out)?;
            build_site(config, &out).await
        }
    }
}
