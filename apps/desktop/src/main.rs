use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{load_settings, DirectoryHandle, UserDirectory};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod controller;
mod view;

use commands::{parse_command, UiCommand, HELP};
use controller::Controller;

#[derive(Parser, Debug)]
#[command(about = "Console front end for the user collection")]
struct Args {
    /// Collection endpoint, e.g. https://jsonplaceholder.typicode.com/users
    #[arg(long, env = "COLLECTION_URL")]
    collection_url: Option<String>,
    /// How long a banner stays up before clearing itself.
    #[arg(long)]
    notification_ttl_ms: Option<u64>,
    /// Trust only the record origin flag when deciding which updates stay local.
    #[arg(long)]
    no_seed_ceiling: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings().context("failed to load settings")?;
    if let Some(url) = &args.collection_url {
        settings = settings.with_collection_url(url)?;
    }
    if let Some(ttl) = args.notification_ttl_ms {
        settings.notification_ttl = std::time::Duration::from_millis(ttl);
    }
    if args.no_seed_ceiling {
        settings.seed_id_ceiling = None;
    }
    info!(collection_url = %settings.collection_url, "starting user console");

    let directory: Arc<dyn DirectoryHandle> =
        UserDirectory::new(&settings).context("failed to build collection client")?;
    let controller = Controller::new(Arc::clone(&directory));

    let render_task = tokio::spawn(render_loop(Arc::clone(&controller)));
    {
        let directory = Arc::clone(&directory);
        tokio::spawn(async move {
            if let Err(err) = directory.load().await {
                warn!(error = %err, "initial user list failed");
            }
        });
    }

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_command(&line) {
            Ok(UiCommand::Quit) => break,
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        let redraw = command == UiCommand::List;
        let controller = Arc::clone(&controller);
        // Intents run concurrently; the prompt stays responsive while one is in flight.
        tokio::spawn(async move {
            if redraw {
                print_view(&controller);
            }
            if let Some(feedback) = controller.handle(command).await {
                println!("{feedback}");
            }
        });
    }

    render_task.abort();
    Ok(())
}

async fn render_loop(controller: Arc<Controller>) {
    let directory = controller.directory();
    let snapshots = WatchStream::new(directory.subscribe_snapshots()).map(|_| ());
    let notifications = WatchStream::new(directory.subscribe_notifications()).map(|_| ());
    let selection = WatchStream::new(controller.subscribe_selection()).map(|_| ());
    let mut updates = snapshots.merge(notifications).merge(selection);

    while updates.next().await.is_some() {
        print_view(&controller);
    }
}

fn print_view(controller: &Controller) {
    let directory = controller.directory();
    let rendered = view::render(
        &directory.snapshot(),
        directory.notification().as_ref(),
        &controller.selection(),
    );
    println!("\n{rendered}");
}
