use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blobkit_cli::{init_tracing, needs_large_upload, parse_range, truncate_string};
use blobkit_core::ClientConfig;
use blobkit_storage::{create_service, ServiceHandle};
use bytes::Bytes;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "blobkit")]
#[command(about = "Upload, download and manage objects in B2-style or local storage")]
struct Args {
    /// Bucket ID (defaults to B2_BUCKET_ID)
    #[arg(long, global = true, value_name = "ID")]
    bucket: Option<String>,

    /// Output format: json or table (default: table)
    #[arg(long, global = true, default_value = "table")]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file; files larger than the part size go up in parts
    Upload {
        path: PathBuf,

        /// Object name (default: the file name)
        #[arg(long)]
        name: Option<String>,

        /// Part size in bytes (default: UPLOAD_PART_SIZE_BYTES)
        #[arg(long, value_name = "BYTES")]
        part_size: Option<usize>,
    },
    /// Download a file by ID
    Download {
        file_id: String,

        /// Destination path
        #[arg(long, short)]
        output: PathBuf,

        /// Inclusive byte range, e.g. 0-1023
        #[arg(long, value_name = "BEGIN-END")]
        range: Option<String>,
    },
    /// List files in the bucket
    List {
        /// Maximum number of files (default: 100)
        #[arg(long, default_value = "100")]
        limit: u32,

        /// Start listing at this file name
        #[arg(long)]
        start_name: Option<String>,

        /// Start listing at this file ID
        #[arg(long)]
        start_id: Option<String>,
    },
    /// Delete a file version
    Delete { file_id: String, file_name: String },
    /// Cancel an unfinished large upload
    Cancel { file_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let config = ClientConfig::from_env()?;
    config.validate()?;

    let handle = create_service(&config)
        .await
        .context("Failed to initialize storage")?;
    let bucket_id = args
        .bucket
        .clone()
        .or_else(|| config.bucket_id.clone())
        .unwrap_or_default();
    if bucket_id.is_empty() && !handle.is_local() {
        return Err(anyhow::anyhow!(
            "A bucket is required: pass --bucket or set B2_BUCKET_ID"
        ));
    }

    match args.command {
        Command::Upload {
            path,
            name,
            part_size,
        } => {
            let part_size = part_size.unwrap_or(config.part_size_bytes);
            upload(&handle, &bucket_id, &path, name, part_size, &args.format).await
        }
        Command::Download {
            file_id,
            output,
            range,
        } => {
            let data = match range {
                Some(range) => {
                    let (begin, end) = parse_range(&range)?;
                    handle.download_file_range(&file_id, begin, end).await?
                }
                None => handle.download_file(&file_id).await?,
            };
            tokio::fs::write(&output, &data)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} bytes to {}", data.len(), output.display());
            Ok(())
        }
        Command::List {
            limit,
            start_name,
            start_id,
        } => {
            let list = handle
                .list_files(&bucket_id, limit, start_name.as_deref(), start_id.as_deref())
                .await?;

            if args.format == "json" {
                println!("{}", serde_json::to_string_pretty(&list)?);
                return Ok(());
            }

            if list.files.is_empty() {
                println!("No files found.");
                return Ok(());
            }

            println!("{:<40} {:<40} {:>12} {:<20}", "File ID", "Name", "Bytes", "Uploaded");
            println!("{}", "-".repeat(115));
            for file in &list.files {
                let uploaded = file
                    .uploaded_at()
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<40} {:<40} {:>12} {:<20}",
                    truncate_string(&file.file_id, 40),
                    truncate_string(&file.file_name, 40),
                    file.content_length,
                    uploaded
                );
            }
            if let Some(next) = &list.next_file_name {
                println!("\nMore files available, continue with --start-name {}", next);
            }
            Ok(())
        }
        Command::Delete { file_id, file_name } => {
            handle.delete_file(&file_id, &file_name).await?;
            println!("Deleted {}", file_name);
            Ok(())
        }
        Command::Cancel { file_id } => {
            if handle.cancel_large(&file_id).await {
                println!("Cancelled {}", file_id);
                Ok(())
            } else {
                Err(anyhow::anyhow!("Nothing to cancel for {}", file_id))
            }
        }
    }
}

async fn upload(
    handle: &ServiceHandle,
    bucket_id: &str,
    path: &Path,
    name: Option<String>,
    part_size: usize,
    format: &str,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => path
            .file_name()
            .and_then(|n| n.to_str())
            .map(String::from)
            .context("Cannot derive an object name from the path; pass --name")?,
    };

    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let len = file.metadata().await?.len();

    if needs_large_upload(len, part_size) {
        let finished = handle
            .upload_large(&name, bucket_id, &mut file, part_size)
            .await?;
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&finished)?);
        } else {
            println!(
                "Uploaded {} ({} bytes) as {}",
                finished.file_name, finished.content_length_bytes, finished.file_id
            );
        }
    } else {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let target = handle.get_upload_url(bucket_id).await?;
        let uploaded = handle
            .upload_file(&target, &name, Bytes::from(data))
            .await?;
        if format == "json" {
            println!("{}", serde_json::to_string_pretty(&uploaded)?);
        } else {
            println!(
                "Uploaded {} ({} bytes) as {}",
                uploaded.file_name, uploaded.content_length, uploaded.file_id
            );
        }
    }

    Ok(())
}
