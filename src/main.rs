use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use photo_relay_lib::auth::{StaticAccess, StaticIdentity};
use photo_relay_lib::commands;
use photo_relay_lib::modules::{config, logger};
use photo_relay_lib::picker::{ConsoleWindowHost, PickOutcome};
use photo_relay_lib::{AppContext, Capabilities};

const ID_TOKEN_ENV: &str = "PHOTO_RELAY_ID_TOKEN";
const ACCESS_TOKEN_ENV: &str = "PHOTO_RELAY_ACCESS_TOKEN";

#[derive(Parser, Debug)]
#[command(name = "photo-relay")]
#[command(about = "Pick photos from Google Photos and relay them to object storage")]
#[command(version)]
struct Cli {
    /// Config file (defaults to the data directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and print the account email
    SignIn,
    /// Open a picker session and wait for the selection
    Pick {
        /// Upload the picked photos afterwards
        #[arg(long)]
        upload: bool,
    },
    /// Continue a picker session interrupted by a redirect
    Resume {
        #[arg(long)]
        upload: bool,
    },
    /// Upload local image files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show uploaded objects, newest first
    List {
        /// Extra "load more" steps after the first page
        #[arg(long, default_value_t = 0)]
        more: usize,
    },
    /// Delete uploaded objects by key
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Print the effective configuration
    Config,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn upload_and_report(ctx: &AppContext) -> Result<()> {
    let report = commands::upload_all(ctx).await.map_err(|e| anyhow!(e))?;
    print_json(&report)
}

async fn report_pick(ctx: &AppContext, outcome: Option<PickOutcome>, upload: bool) -> Result<()> {
    match outcome {
        Some(PickOutcome::Picked { added, total }) => {
            println!("Picked {} photo(s), {} item(s) in the working set", added, total);
            if upload {
                upload_and_report(ctx).await?;
            }
        }
        Some(PickOutcome::NavigatedAway { session_id }) => {
            println!("Picker session {} saved; run `photo-relay resume` when done", session_id);
        }
        None => println!("No pending picker session"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logger();
    let cli = Cli::parse();

    let app_config = match &cli.config {
        Some(path) => config::load_app_config_from(path),
        None => config::load_app_config(),
    }
    .context("loading configuration")?;

    let capabilities = Capabilities {
        identity: Arc::new(StaticIdentity::from_env(ID_TOKEN_ENV)),
        access: Arc::new(StaticAccess::from_env(ACCESS_TOKEN_ENV)),
        window_host: Arc::new(ConsoleWindowHost),
    };
    let ctx = AppContext::from_config(app_config, capabilities)?;
    tracing::info!("photo-relay {} starting", env!("CARGO_PKG_VERSION"));

    let result = match cli.command {
        Command::SignIn => {
            let email = commands::sign_in(&ctx).await.map_err(|e| anyhow!(e))?;
            println!("Signed in as {}", email.as_deref().unwrap_or("<unknown>"));
            Ok(())
        }
        Command::Pick { upload } => {
            ctx.broker.restore_identity();
            let outcome = commands::pick_photos(&ctx).await.map_err(|e| anyhow!(e))?;
            report_pick(&ctx, Some(outcome), upload).await
        }
        Command::Resume { upload } => {
            let report = commands::start(&ctx).await.map_err(|e| anyhow!(e))?;
            let total = commands::list_items(&ctx).await.len();
            let outcome = report
                .resumed
                .map(|added| PickOutcome::Picked { added, total });
            report_pick(&ctx, outcome, upload).await
        }
        Command::Upload { files } => {
            ctx.broker.restore_identity();
            let added = commands::add_local_files(&ctx, files)
                .await
                .map_err(|e| anyhow!(e))?;
            if added == 0 {
                Err(anyhow!("no image files to upload"))
            } else {
                upload_and_report(&ctx).await
            }
        }
        Command::List { more } => {
            ctx.broker.restore_identity();
            let mut view = commands::refresh_uploads(&ctx).await.map_err(|e| anyhow!(e))?;
            for _ in 0..more {
                if !view.can_load_more {
                    break;
                }
                view = commands::load_more_uploads(&ctx).await.map_err(|e| anyhow!(e))?;
            }
            print_json(&view)
        }
        Command::Delete { keys } => {
            ctx.broker.restore_identity();
            let mut deleted = 0;
            for key in keys {
                match commands::delete_upload(&ctx, key.clone()).await {
                    Ok(_) => deleted += 1,
                    Err(e) => eprintln!("Failed to delete {}: {}", key, e),
                }
            }
            println!("Deleted {} object(s)", deleted);
            Ok(())
        }
        Command::Config => print_json(&ctx.config),
    };

    commands::unload(&ctx).await;
    result
}
