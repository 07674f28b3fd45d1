//! drivepicker CLI - Browse Google Drive and pick files from the terminal.
//!
//! This tool signs in with Google, lists "My Drive", shared files and
//! folder contents, and downloads a picked file to a local directory.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use drivepicker_common::{PathEntry, View};
use drivepicker_picker::{
    format_modified, format_size, FileSource, LocalFile, Picker, PickerEntry, RowIcon, Selection,
};
use drivepicker_storage::{AuthSession, DriveClient, LocalDownloader, OAuthProvider};

use config::CliConfig;

#[derive(Parser)]
#[command(name = "drivepicker")]
#[command(about = "drivepicker - Pick files from Google Drive")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Config file (default: <config dir>/drivepicker/config.json).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with Google.
    Login,

    /// Sign out and revoke the stored session.
    Logout,

    /// Show whether a usable session exists.
    Status,

    /// List a view or folder.
    Ls {
        /// List files shared with you instead of "My Drive".
        #[arg(short, long, conflicts_with = "folder")]
        shared: bool,

        /// List the children of this folder id.
        #[arg(short, long)]
        folder: Option<String>,
    },

    /// Download a file by id.
    Get {
        /// File id.
        id: String,

        /// Look the file up in the shared view.
        #[arg(short, long, conflicts_with = "folder")]
        shared: bool,

        /// Look the file up in this folder.
        #[arg(short, long)]
        folder: Option<String>,

        /// Destination directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Browse interactively and pick one file.
    Browse {
        /// Start in the shared view.
        #[arg(short, long)]
        shared: bool,

        /// Destination directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => CliConfig::default_path().context("No config directory on this system")?,
    };
    let config = CliConfig::load(&config_path)?;

    match cli.command {
        Commands::Login => cmd_login(&config).await,

        Commands::Logout => cmd_logout(&config).await,

        Commands::Status => cmd_status(&config).await,

        Commands::Ls { shared, folder } => cmd_ls(&config, target(shared, folder)).await,

        Commands::Get {
            id,
            shared,
            folder,
            out,
        } => cmd_get(&config, target(shared, folder), &id, out).await,

        Commands::Browse { shared, out } => {
            let view = if shared { View::Shared } else { View::MyDrive };
            cmd_browse(&config, view, out).await
        }
    }
}

fn target(shared: bool, folder: Option<String>) -> PathEntry {
    match folder {
        Some(id) => PathEntry::Folder(id),
        None if shared => PathEntry::View(View::Shared),
        None => PathEntry::View(View::MyDrive),
    }
}

/// Build the session from the config file.
fn open_session(config: &CliConfig) -> Result<Arc<AuthSession>> {
    let provider = OAuthProvider::new(config.oauth_config()).context("Failed to create OAuth provider")?;
    let session = AuthSession::configure(config.auth_options()?, Arc::new(provider))
        .context("Failed to configure sign-in")?;
    Ok(Arc::new(session))
}

/// Build a client that downloads into `out` (or the configured directory).
fn open_client(config: &CliConfig, out: Option<PathBuf>) -> Result<DriveClient> {
    let dir = config.download_dir(out);
    let downloader = LocalDownloader::new(&dir)
        .with_context(|| format!("Failed to use download directory {}", dir.display()))?;
    DriveClient::new(open_session(config)?, Arc::new(downloader))
        .context("Failed to create Drive client")
}

/// Client for listing only; the download directory is left untouched.
fn open_listing_client(config: &CliConfig) -> Result<DriveClient> {
    let downloader = LocalDownloader::deferred(config.download_dir(None))
        .context("Failed to resolve download directory")?;
    DriveClient::new(open_session(config)?, Arc::new(downloader))
        .context("Failed to create Drive client")
}

/// Sign in.
async fn cmd_login(config: &CliConfig) -> Result<()> {
    let session = open_session(config)?;
    session.sign_in().await.context("Sign-in failed")?;

    println!("Signed in.");
    Ok(())
}

/// Sign out.
async fn cmd_logout(config: &CliConfig) -> Result<()> {
    let session = open_session(config)?;
    session.sign_out().await.context("Sign-out failed")?;

    println!("Signed out.");
    Ok(())
}

/// Show session status.
async fn cmd_status(config: &CliConfig) -> Result<()> {
    let session = open_session(config)?;

    println!("Platform: {:?}", session.platform());
    if session.is_signed_in().await {
        println!("Signed in: yes");
    } else {
        println!("Signed in: no (run `drivepicker login`)");
    }
    Ok(())
}

/// List a view or folder.
async fn cmd_ls(config: &CliConfig, target: PathEntry) -> Result<()> {
    let client = open_listing_client(config)?;
    let listing = client
        .list_view(&target)
        .await
        .with_context(|| format!("Failed to list {}", target))?;

    if listing.len() == 0 {
        println!("{} is empty.", target);
        return Ok(());
    }

    println!("Contents of {}:", target);
    for file in listing {
        let kind = if file.is_folder() { "[DIR] " } else { "[FILE]" };
        println!(
            "  {} {}  {}  {} {}",
            kind,
            file.id,
            file.name,
            format_modified(file.modified_time),
            format_size(file.size)
        );
    }
    Ok(())
}

/// Download one file.
async fn cmd_get(config: &CliConfig, target: PathEntry, id: &str, out: Option<PathBuf>) -> Result<()> {
    let client = open_client(config, out)?;
    let file = client
        .list_view(&target)
        .await
        .with_context(|| format!("Failed to list {}", target))?
        .find(|f| f.id == id)
        .with_context(|| format!("No file {} in {}", id, target))?;

    info!("Downloading {}", file.name);
    let location = client
        .download_file(&file)
        .await
        .with_context(|| format!("Failed to download {}", file.name))?;

    println!("Downloaded {} to {}", file.name, location);
    Ok(())
}

/// Interactive picker loop.
async fn cmd_browse(config: &CliConfig, view: View, out: Option<PathBuf>) -> Result<()> {
    let client = open_client(config, out)?;
    let mut picker = Picker::with_view(client, view);
    picker.load().await.context("Failed to load listing")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_listing(&picker);
        println!("[number] open/pick  [..] up  [m] My Drive  [s] Shared  [q] quit");

        let Some(line) = lines.next_line().await? else {
            return Ok(());
        };
        let Some(command) = parse_command(&line) else {
            println!("Unrecognised input: {}", line.trim());
            continue;
        };

        match run_command(&mut picker, command).await? {
            Step::Continue => {}
            Step::Quit => return Ok(()),
            Step::Picked(file) => {
                println!("Picked {} ({})", file.display_name, file.location);
                println!("{}", serde_json::to_string_pretty(&file)?);
                return Ok(());
            }
        }
    }
}

/// One line of `browse` input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    View(View),
    Up,
    /// Zero-based entry index.
    Press(usize),
}

fn parse_command(input: &str) -> Option<Command> {
    match input.trim() {
        "q" => Some(Command::Quit),
        "m" => Some(Command::View(View::MyDrive)),
        "s" => Some(Command::View(View::Shared)),
        ".." => Some(Command::Up),
        input => match input.parse::<usize>() {
            Ok(n) if n >= 1 => Some(Command::Press(n - 1)),
            _ => None,
        },
    }
}

enum Step {
    Continue,
    Quit,
    Picked(LocalFile),
}

/// Apply one command.
///
/// Navigation failures are printed and browsing continues. Picking a file
/// ends the session: with the file, or with the download error.
async fn run_command<S: FileSource>(picker: &mut Picker<S>, command: Command) -> Result<Step> {
    let outcome = match command {
        Command::Quit => return Ok(Step::Quit),
        Command::View(view) => picker.switch_view(view).await.map(|_| Selection::Navigated),
        Command::Up if picker.path().is_top_level() => {
            println!("Already at the top.");
            return Ok(Step::Continue);
        }
        Command::Up => picker.activate(&PickerEntry::GoUp).await,
        Command::Press(index) => {
            let picking = picker
                .entries()
                .get(index)
                .is_some_and(|e| !e.is_go_up() && !e.is_folder());
            let outcome = picker.press(index).await;
            if picking {
                return match outcome.context("Failed to download the picked file")? {
                    Selection::Picked(file) => Ok(Step::Picked(file)),
                    Selection::Navigated => Ok(Step::Continue),
                };
            }
            outcome
        }
    };

    match outcome {
        Ok(Selection::Picked(file)) => Ok(Step::Picked(file)),
        Ok(Selection::Navigated) => Ok(Step::Continue),
        Err(e) => {
            println!("Error: {}", e);
            Ok(Step::Continue)
        }
    }
}

fn print_listing<S: FileSource>(picker: &Picker<S>) {
    println!();
    println!("{}", picker.breadcrumbs().join(" / "));
    let rows = picker.rows();
    if rows.is_empty() {
        println!("  (empty)");
    }
    for (i, row) in rows.iter().enumerate() {
        let marker = match row.icon {
            RowIcon::Folder => "/",
            RowIcon::File => "",
        };
        println!("{:>3}. {}{}  {}", i + 1, row.title, marker, row.subtitle);
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use drivepicker_common::{DownloadError, ListError};
    use drivepicker_storage::{FileRecord, Listing};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn record(id: &str, mime_type: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: id.to_string(),
            mime_type: mime_type.to_string(),
            size: None,
            modified_time: None,
            web_content_link: None,
            trashed: false,
        }
    }

    /// Root holds one folder and one PDF; every folder is empty.
    #[derive(Default)]
    struct StubSource {
        fail_listing: AtomicBool,
        fail_download: AtomicBool,
    }

    impl StubSource {
        fn listing(&self, files: Vec<FileRecord>) -> drivepicker_common::Result<Listing> {
            if self.fail_listing.load(Ordering::SeqCst) {
                return Err(ListError::Transport("offline".to_string()).into());
            }
            Ok(Listing::new(files))
        }
    }

    #[async_trait]
    impl FileSource for StubSource {
        async fn list_root_owned(&self) -> drivepicker_common::Result<Listing> {
            self.listing(vec![
                record("F1", "application/vnd.google-apps.folder"),
                record("doc.pdf", "application/pdf"),
            ])
        }

        async fn list_shared_with_me(&self) -> drivepicker_common::Result<Listing> {
            self.listing(Vec::new())
        }

        async fn list_children(&self, _folder_id: &str) -> drivepicker_common::Result<Listing> {
            self.listing(Vec::new())
        }

        async fn download_file(&self, file: &FileRecord) -> drivepicker_common::Result<String> {
            if self.fail_download.load(Ordering::SeqCst) {
                return Err(DownloadError::transfer_failed("").into());
            }
            Ok(format!("file:///tmp/{}", file.name))
        }
    }

    async fn loaded_picker() -> Picker<StubSource> {
        let mut picker = Picker::new(StubSource::default());
        picker.load().await.unwrap();
        picker
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(" q "), Some(Command::Quit));
        assert_eq!(parse_command("s"), Some(Command::View(View::Shared)));
        assert_eq!(parse_command(".."), Some(Command::Up));
        assert_eq!(parse_command("2"), Some(Command::Press(1)));
        assert_eq!(parse_command("0"), None);
        assert_eq!(parse_command("open"), None);
    }

    #[tokio::test]
    async fn test_pick_ends_session() {
        let mut picker = loaded_picker().await;

        let step = run_command(&mut picker, Command::Press(1)).await.unwrap();
        assert!(matches!(step, Step::Picked(file) if file.location == "file:///tmp/doc.pdf"));
    }

    #[tokio::test]
    async fn test_failed_pick_ends_session_with_error() {
        let mut picker = loaded_picker().await;
        picker.source().fail_download.store(true, Ordering::SeqCst);

        let err = run_command(&mut picker, Command::Press(1))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("Failed to download the picked file"));
    }

    #[tokio::test]
    async fn test_listing_failure_keeps_browsing() {
        let mut picker = loaded_picker().await;
        picker.source().fail_listing.store(true, Ordering::SeqCst);

        let step = run_command(&mut picker, Command::Press(0)).await.unwrap();
        assert!(matches!(step, Step::Continue));
        let step = run_command(&mut picker, Command::View(View::Shared)).await.unwrap();
        assert!(matches!(step, Step::Continue));
        assert_eq!(picker.breadcrumbs(), ["My Drive"]);
    }

    #[tokio::test]
    async fn test_up_at_top_is_ignored() {
        let mut picker = loaded_picker().await;

        let step = run_command(&mut picker, Command::Up).await.unwrap();
        assert!(matches!(step, Step::Continue));
        assert_eq!(picker.entries().len(), 2);
    }
}
