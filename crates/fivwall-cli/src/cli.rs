use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fivwall")]
#[command(about = "Pin notes to your wall from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to the local state file (`config init` stores it in the profile)
    #[arg(long, global = true, value_name = "PATH")]
    pub state_path: Option<PathBuf>,

    /// CLI profile name for auth/sync configuration
    #[arg(long, global = true, value_name = "NAME")]
    pub profile: Option<String>,

    /// Quick capture: fivwall "my note title"
    #[arg(trailing_var_arg = true)]
    pub note: Vec<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pin a new note
    #[command(alias = "new")]
    Add {
        /// Note title
        title: Vec<String>,
        /// Note body (read from stdin when piped and omitted)
        #[arg(short, long)]
        content: Option<String>,
        /// Background color, e.g. #fef3c7
        #[arg(long)]
        color: Option<String>,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Horizontal position on the wall
        #[arg(long, default_value_t = 0.0)]
        x: f64,
        /// Vertical position on the wall
        #[arg(long, default_value_t = 0.0)]
        y: f64,
    },
    /// List notes, topmost first
    List {
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only notes carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only notes whose title, content or tags contain this text
        #[arg(short, long)]
        query: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a note or raise it to the front
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New body
        #[arg(short, long)]
        content: Option<String>,
        /// New background color
        #[arg(long)]
        color: Option<String>,
        /// Replace the tags (repeatable)
        #[arg(short, long = "tag", conflicts_with = "clear_tags")]
        tags: Vec<String>,
        /// Remove every tag
        #[arg(long)]
        clear_tags: bool,
        /// New horizontal position
        #[arg(long)]
        x: Option<f64>,
        /// New vertical position
        #[arg(long)]
        y: Option<f64>,
        /// Place the note above all others
        #[arg(long)]
        front: bool,
    },
    /// Delete a note
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Show or edit recent searches
    SearchHistory {
        #[command(subcommand)]
        command: Option<SearchHistoryCommands>,
    },
    /// Delete every note and recent search (the Google Drive copy too when signed in)
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Export the wall as JSON
    Export {
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import a wall exported as JSON
    Import {
        /// File to import
        path: PathBuf,
        /// How to combine with existing notes (required when the wall is not empty)
        #[arg(long, value_enum)]
        mode: Option<ImportModeArg>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Sync the wall with Google Drive
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },
    /// Configure CLI profiles
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Sign in to Google Drive sync
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum ImportModeArg {
    Replace,
    Append,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum PreferSide {
    /// Keep local notes and overwrite the remote copy
    Push,
    /// Keep the remote copy and replace local notes
    Pull,
}

#[derive(Subcommand)]
pub enum SearchHistoryCommands {
    /// Record a search query
    Add {
        /// Query text
        query: Vec<String>,
    },
    /// Forget all recent searches
    Clear,
}

#[derive(Subcommand)]
pub enum SyncCommands {
    /// Show sync status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upload the local notes to Google Drive, replacing the remote copy
    ///
    /// A new process does not know what was pushed before, so this always uploads.
    Push,
    /// Fetch the remote copy and adopt it when newer
    Pull,
    /// Push now, even when nothing changed
    Retry,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize or update profile config
    Init {
        /// Authorization backend base URL
        #[arg(long, value_name = "URL")]
        auth_url: Option<String>,
        /// OAuth redirect URI registered for this client
        #[arg(long, value_name = "URL")]
        redirect_uri: Option<String>,
        /// Google OAuth client id, used to print the sign-in URL
        #[arg(long, value_name = "ID")]
        client_id: Option<String>,
        /// Keep current active profile instead of activating this one
        #[arg(long)]
        no_activate: bool,
    },
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Exchange an authorization code and reconcile with the remote copy
    Login {
        /// Authorization code (prompted for when omitted)
        #[arg(long, value_name = "CODE")]
        code: Option<String>,
        /// Which side wins when both local and remote hold notes
        #[arg(long, value_enum)]
        prefer: Option<PreferSide>,
    },
    /// Show auth status for profile
    Status,
    /// Sign out and forget the stored credential
    Logout,
}
