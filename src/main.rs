use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use postsync::config::Config;
use postsync::enrich::{self, EnrichError, ResponsesClient};
use postsync::git::CommandGit;
use postsync::linkedin::{self, FetchError, LinkedInClient, TokenStatus};
use postsync::publish::{self, ArtifactPublish, ImagesPublish, PublishOutcome};

#[derive(Parser, Debug)]
#[command(
    name = "postsync",
    about = "Mirror the latest LinkedIn post into a git repository"
)]
struct Args {
    /// Configuration file (optional; defaults apply when missing)
    #[arg(long, value_name = "FILE", default_value = "postsync.toml", global = true)]
    config: PathBuf,

    /// Repository working tree to operate on
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    repo: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the latest post and overwrite the artifact file
    Fetch,
    /// Commit the artifact if it changed and push it, retrying on contention
    Publish,
    /// Fetch, then publish (the scheduled job)
    Run {
        /// Also write the enriched copy after publishing
        #[arg(long)]
        enrich: bool,
    },
    /// Write SEO fields and image alt text to the enriched copy of the artifact
    Enrich,
    /// Commit and push new files in the image directory
    Images,
    /// Check whether the LinkedIn access token is accepted
    CheckToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config_path = if args.config.is_absolute() {
        args.config.clone()
    } else {
        args.repo.join(&args.config)
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.enrich.apply_env();

    match args.command {
        Command::Fetch => {
            fetch(&config, &args.repo).await?;
        }
        Command::Publish => {
            report(publish_artifact(&config, &args.repo).await?);
        }
        Command::Run { enrich } => {
            fetch(&config, &args.repo).await?;
            report(publish_artifact(&config, &args.repo).await?);
            if enrich {
                enrich_artifact(&config, &args.repo).await?;
            }
        }
        Command::Enrich => enrich_artifact(&config, &args.repo).await?,
        Command::Images => {
            let git = git_for(&config, &args.repo);
            let outcome = publish::publish_images(&git, &ImagesPublish::from_config(&config))
                .await
                .context("Failed to publish images")?;
            report(outcome);
        }
        Command::CheckToken => check_token(&config).await?,
    }

    Ok(())
}

fn git_for(config: &Config, repo: &Path) -> CommandGit {
    let git = CommandGit::new(repo);
    match (&config.git.author_name, &config.git.author_email) {
        (Some(name), Some(email)) => git.with_identity(name, email),
        (None, None) => git,
        _ => {
            tracing::warn!("Both git.author_name and git.author_email are needed; using repository identity");
            git
        }
    }
}

fn client_for(config: &Config) -> Result<LinkedInClient> {
    let token = config.linkedin.token().ok_or(FetchError::MissingToken)?;
    let client = LinkedInClient::new(reqwest::Client::new(), &config.linkedin, token)?;
    Ok(client)
}

async fn fetch(config: &Config, repo: &Path) -> Result<()> {
    let client = client_for(config)?;
    match linkedin::fetch_latest_post(&client, config, repo)
        .await
        .context("Failed to fetch latest LinkedIn post")?
    {
        Some(post) => println!("Saved post {} to {}", post.url, config.artifact.path.display()),
        None => println!("No posts found"),
    }
    Ok(())
}

async fn publish_artifact(config: &Config, repo: &Path) -> Result<PublishOutcome> {
    let git = git_for(config, repo);
    publish::publish_artifact(&git, &ArtifactPublish::from_config(config))
        .await
        .context("Failed to publish artifact")
}

async fn enrich_artifact(config: &Config, repo: &Path) -> Result<()> {
    let api_key = config.enrich.api_key().ok_or(EnrichError::MissingApiKey)?;
    let client = ResponsesClient::new(reqwest::Client::new(), &config.enrich, api_key)?;
    let prompts = enrich::load_prompt_set(
        &repo.join(&config.enrich.prompts_path),
        config.enrich.profile.as_deref(),
    )?;

    let output = repo.join(&config.enrich.output_path);
    let enriched = enrich::enrich_post(
        &client,
        &prompts,
        &repo.join(&config.artifact.path),
        &output,
    )
    .await
    .context("Failed to enrich latest post")?;
    println!(
        "Wrote {} (headline: {:?})",
        config.enrich.output_path.display(),
        enriched.seo.headline
    );
    Ok(())
}

fn report(outcome: PublishOutcome) {
    match outcome {
        PublishOutcome::NoChanges => println!("No changes"),
        PublishOutcome::Pushed { attempts } => println!("Pushed after {attempts} attempt(s)"),
    }
}

async fn check_token(config: &Config) -> Result<()> {
    let client = client_for(config)?;
    match client
        .check_token()
        .await
        .context("Failed to reach the LinkedIn API")?
    {
        TokenStatus::Valid => println!("Token is valid"),
        TokenStatus::Invalid => {
            anyhow::bail!("Token is invalid or expired; generate a new one in the LinkedIn developer portal")
        }
        TokenStatus::Unexpected(status) => {
            anyhow::bail!("Unexpected response while checking token: HTTP {status}")
        }
    }
    Ok(())
}
