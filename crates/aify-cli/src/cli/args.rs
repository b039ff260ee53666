use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "aify")]
#[command(about = "Chat with assistants over the streaming runs API")]
pub struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short, global = true)]
    pub pretty: bool,

    /// Path to JSON config file (baseUrl, secretKey, organization, ...)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL, overrides config and AIFY_BASE_URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Commands {
    /// Log in and store the issued secret key in the keyring
    Login {
        username: String,
        /// Password (falls back to AIFY_PASSWORD)
        #[arg(long, env = "AIFY_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Remove the stored secret key for this server
    Logout,

    /// List assistants
    Assistants,

    /// Create an assistant
    NewAssistant {
        name: String,
        #[arg(long, short)]
        description: Option<String>,
        /// System instructions for every run
        #[arg(long, short)]
        instructions: Option<String>,
        /// Icon shown next to the assistant, stored as `metadata.icon`
        #[arg(long)]
        icon: Option<String>,
        /// Tool definitions as a JSON array
        #[arg(long)]
        tools: Option<String>,
        /// Extra metadata as a JSON object
        #[arg(long)]
        metadata: Option<String>,
    },

    /// Delete an assistant
    DeleteAssistant { assistant_id: String },

    /// List threads with their assistant
    Threads,

    /// Create a thread bound to an assistant
    NewThread { assistant_id: String },

    /// Delete a thread
    DeleteThread { thread_id: String },

    /// Print a thread's recent messages, oldest first
    History { thread_id: String },

    /// Interactive chat on a thread
    Chat {
        thread_id: String,
        /// Assistant to run (defaults to the one in the thread's metadata)
        #[arg(long, short)]
        assistant: Option<String>,
    },
}
