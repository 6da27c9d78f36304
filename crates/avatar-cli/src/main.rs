//! Avatar CLI: generate, delete and resolve avatars against the local uploads directory.
//!
//! Reads the same environment as the API server (AVATAR_UPLOADS_DIR, AVATAR_UPLOADS_URL, ...).

use std::path::PathBuf;

use anyhow::Context;
use avatar_cli::{init_tracing, upload_files_for};
use avatar_core::{AvatarConfig, AvatarSize, UploadOutcome, UserId};
use avatar_services::AvatarService;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "avatar", about = "Local avatar pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an image and generate a user's avatar from it
    Generate {
        /// User whose avatar is replaced
        #[arg(long)]
        user: u64,
        /// Path to the source image
        file: PathBuf,
    },
    /// Delete a user's avatar
    Delete {
        #[arg(long)]
        user: u64,
    },
    /// Print the URL of a user's avatar
    Resolve {
        #[arg(long)]
        user: u64,
        /// full, thumb or a pixel size
        #[arg(long, default_value = "full")]
        size: String,
        /// Printed when the user has no avatar
        #[arg(long)]
        default: Option<String>,
    },
}

#[derive(Serialize)]
struct Resolved {
    user: UserId,
    url: String,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AvatarConfig::from_env().context("Failed to load avatar configuration")?;
    let service = AvatarService::from_config(&config)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { user, file } => {
            let user = UserId(user);
            let temp_dir = tempfile::tempdir().context("Failed to create temp dir")?;
            let files = upload_files_for(&file, temp_dir.path())?;

            let mut session = service.session();
            if let UploadOutcome::Rejected { message, .. } = session.upload(&files, user).await {
                anyhow::bail!("Upload Failed! Error was: {}", message);
            }

            let avatar = session.generate(user, None).await?;
            print_json(&avatar)?;
        }
        Commands::Delete { user } => {
            let outcome = service.delete(UserId(user)).await;
            print_json(&outcome)?;
        }
        Commands::Resolve {
            user,
            size,
            default,
        } => {
            let user = UserId(user);
            let size = size
                .parse::<AvatarSize>()
                .map_err(|e| anyhow::anyhow!(e))?;

            let url = match default {
                Some(default_url) => {
                    service
                        .resolve_or_default(user, size, &default_url, false)
                        .await
                }
                None => service.avatar(user, size).await,
            };
            print_json(&Resolved { user, url })?;
        }
    }

    Ok(())
}
