//! The `matty` command line.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use matty_core::{DesignId, DesignPayload, DesignRepository, DesignUpdate};
use matty_renderer::ExportFormat;

use crate::client::HttpDesignClient;
use crate::controller::{Editor, ExportedImage};

/// Default API server address.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:9474";

/// Command-line arguments for `matty`.
#[derive(Debug, Clone, Parser)]
#[command(name = "matty")]
#[command(about = "Render, store and fetch Matty designs")]
#[command(version)]
pub struct CliArgs {
    /// Design API server URL
    #[arg(long, global = true, env = "MATTY_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    pub server: String,

    /// Owner id sent with every API request
    #[arg(long, global = true, env = "MATTY_OWNER", default_value = "local")]
    pub owner: String,

    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// `matty` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Render a design payload file to an image, offline.
    Export {
        /// JSON file with `{"title", "elements"}`
        payload: PathBuf,
        /// Output path (default: `<title>.<ext>`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// png or jpeg
        #[arg(long, default_value = "png")]
        format: ExportFormat,
    },
    /// List the owner's designs, most recently updated first.
    List,
    /// Upload a design payload file.
    Save {
        /// JSON file with `{"title", "elements"}`
        payload: PathBuf,
        /// Replace this existing design instead of creating one
        #[arg(long)]
        id: Option<DesignId>,
    },
    /// Download a stored design and render it to an image.
    Fetch {
        /// Design id
        id: DesignId,
        /// Output path (default: `<title>.<ext>`)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// png or jpeg
        #[arg(long, default_value = "png")]
        format: ExportFormat,
    },
}

/// Run a parsed command line.
///
/// # Errors
///
/// Returns an error if a file cannot be read or written, a payload is not
/// valid JSON, or the server request fails.
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    match args.command {
        Command::Export {
            payload,
            output,
            format,
        } => {
            let payload = read_payload(&payload).await?;
            let mut editor = Editor::with_defaults()?;
            editor.load_payload(&payload);
            let exported = editor.export(format).await?;
            let path = write_export(exported, output).await?;
            println!("{}", path.display());
        }
        Command::List => {
            let client = HttpDesignClient::new(&args.server)?;
            let designs = client.list(&args.owner).await?;
            for design in designs {
                println!(
                    "{}\t{}\t{} elements\tupdated {}",
                    design.id,
                    design.title,
                    design.elements.len(),
                    design.updated_at
                );
            }
        }
        Command::Save { payload, id } => {
            let payload = read_payload(&payload).await?;
            let client = HttpDesignClient::new(&args.server)?;
            let record = if let Some(id) = id {
                client
                    .update(&args.owner, id, DesignUpdate::from(payload))
                    .await?
            } else {
                let mut editor = Editor::with_defaults()?;
                editor.load_payload(&payload);
                editor.save_design(&client, &args.owner).await?
            };
            println!("{}", record.id);
        }
        Command::Fetch { id, output, format } => {
            let client = HttpDesignClient::new(&args.server)?;
            let record = client.get(&args.owner, id).await?;
            let mut editor = Editor::with_defaults()?;
            editor.load_design(&record);
            let exported = editor.export(format).await?;
            let path = write_export(exported, output).await?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn read_payload(path: &Path) -> anyhow::Result<DesignPayload> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let payload = DesignPayload::from_json(&json)
        .with_context(|| format!("parsing {}", path.display()))?;
    tracing::debug!("Read {} elements from {}", payload.elements.len(), path.display());
    Ok(payload)
}

async fn write_export(exported: ExportedImage, output: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let path = output.unwrap_or_else(|| PathBuf::from(&exported.filename));
    tokio::fs::write(&path, &exported.bytes)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    tracing::info!("Wrote {} bytes to {}", exported.bytes.len(), path.display());
    Ok(path)
}
