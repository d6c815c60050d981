//! `bunny-offload` command line.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};

use bunny_models::{CollectionId, PostId, UserId, VideoId};
use bunny_offload::{init_tracing, OffloadService, UploadRequest};

#[derive(Parser)]
#[command(name = "bunny-offload", version, about = "Offload media to Bunny.net Stream")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a video file
    Upload {
        file: PathBuf,
        /// Owner; their collection is created if needed
        #[arg(long)]
        user: Option<u64>,
        /// Post to record playback URLs against
        #[arg(long)]
        post: Option<u64>,
        /// Collection to use when no user is given
        #[arg(long)]
        collection: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Resolve or create a user's collection
    EnsureCollection {
        #[arg(long)]
        user: u64,
    },
    /// Delete a user's collection and mapping
    DeleteUser {
        #[arg(long)]
        user: u64,
    },
    /// Set a video thumbnail
    Thumbnail {
        video: String,
        /// Frame time in seconds
        #[arg(long)]
        time: Option<u64>,
        #[arg(long)]
        post: Option<u64>,
    },
    /// Delete a post's offloaded video
    DeleteVideo {
        #[arg(long)]
        post: u64,
    },
    /// Show a video's encoding status
    Status { video: String },
    /// List the account's video libraries
    Libraries,
    /// Show the account owner
    User,
    /// Show a storage zone
    StorageZone { id: u64 },
    /// Create an edge storage zone
    CreateStorageZone {
        name: String,
        /// Main region code (e.g. DE)
        #[arg(long)]
        region: String,
        /// Replication region codes
        #[arg(long = "replicate")]
        replicate: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("{:#}", e);
            let code = e
                .downcast_ref::<bunny_offload::OffloadError>()
                .map(|e| e.code())
                .unwrap_or("error");
            println!("{}", json!({"success": false, "code": code, "message": format!("{:#}", e)}));
            std::process::exit(1);
        }
    }
}

async fn run(command: Command) -> anyhow::Result<serde_json::Value> {
    let service = OffloadService::from_env().context("Failed to load configuration")?;
    info!(library_id = ?service.client().library_id(), "Starting bunny-offload");

    let output = match command {
        Command::Upload {
            file,
            user,
            post,
            collection,
            title,
        } => {
            let request = UploadRequest {
                path: file,
                user_id: user.map(UserId),
                collection_id: collection.map(CollectionId::from_string),
                post_id: post.map(PostId),
                title,
            };
            json!({"success": true, "data": service.upload_video(&request).await?})
        }
        Command::EnsureCollection { user } => {
            let collection = service.collections().ensure_user_collection(UserId(user)).await?;
            json!({"success": true, "data": {"user_id": user, "collection_id": collection}})
        }
        Command::DeleteUser { user } => {
            let outcome = service.delete_user(UserId(user)).await?;
            json!({"success": true, "data": {"user_id": user, "outcome": outcome}})
        }
        Command::Thumbnail { video, time, post } => {
            let outcome = service
                .set_thumbnail(&VideoId::from_string(video), time, post.map(PostId))
                .await?;
            json!({"success": true, "data": outcome})
        }
        Command::DeleteVideo { post } => {
            let outcome = service.delete_post_video(PostId(post)).await?;
            json!({"success": true, "data": {"post_id": post, "outcome": outcome}})
        }
        Command::Status { video } => {
            let video = service
                .client()
                .get_video(&VideoId::from_string(video))
                .await
                .map_err(bunny_offload::OffloadError::from)?;
            json!({
                "success": true,
                "data": {
                    "video_id": video.guid,
                    "title": video.title,
                    "status": video.status.as_str(),
                    "ready": video.status.is_ready(),
                    "encode_progress": video.encode_progress,
                }
            })
        }
        Command::Libraries => {
            let libraries = service
                .client()
                .list_video_libraries()
                .await
                .map_err(bunny_offload::OffloadError::from)?;
            let data: Vec<_> = libraries
                .iter()
                .map(|l| json!({"id": l.id, "name": l.name, "hostname": l.resolved_hostname()}))
                .collect();
            json!({"success": true, "data": data})
        }
        Command::User => {
            let user = service
                .client()
                .get_user()
                .await
                .map_err(bunny_offload::OffloadError::from)?;
            json!({"success": true, "data": {"email": user.email, "name": user.display_name()}})
        }
        Command::StorageZone { id } => {
            let zone = service
                .client()
                .get_storage_zone(id)
                .await
                .map_err(bunny_offload::OffloadError::from)?;
            json!({"success": true, "data": storage_zone_json(&zone)})
        }
        Command::CreateStorageZone {
            name,
            region,
            replicate,
        } => {
            let zone = service
                .client()
                .create_storage_zone(&name, &region, &replicate)
                .await
                .map_err(bunny_offload::OffloadError::from)?;
            json!({"success": true, "data": storage_zone_json(&zone)})
        }
    };

    Ok(output)
}

/// Storage zone summary without its passwords.
fn storage_zone_json(zone: &bunny_client::StorageZone) -> serde_json::Value {
    json!({
        "id": zone.id,
        "name": zone.name,
        "region": zone.region,
        "replication_regions": zone.replication_regions,
        "storage_hostname": zone.storage_hostname,
    })
}
