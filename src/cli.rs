use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "eggdrive", about = "Drive engine suite scripts as keywords", version)]
pub struct Cli {
    /// Path to the eggdrive.config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Engine host, e.g. http://127.0.0.1.
    #[arg(long)]
    pub host: Option<String>,

    /// Engine drive port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Path to the engine .suite directory.
    #[arg(long)]
    pub suite: Option<PathBuf>,

    /// Scripts directory inside the suite.
    #[arg(long = "scripts-dir")]
    pub scripts_dir: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every addressable keyword.
    List,
    /// Show a keyword's documentation.
    Doc { keyword: String },
    /// Show a keyword's signature.
    Args { keyword: String },
    /// Show where a keyword is defined.
    Source { keyword: String },
    /// Run a keyword and print its decoded result as JSON.
    Run {
        keyword: String,
        /// Positional arguments; numbers and booleans are inferred,
        /// everything else is passed as a string.
        args: Vec<String>,
    },
    /// Send a raw engine command and print the result.
    Exec { command: String },
    /// Open a session with the configured suite.
    Open {
        /// Fail instead of closing a conflicting session automatically.
        #[arg(long = "no-auto-close")]
        no_auto_close: bool,
    },
    /// Close the session with the configured suite.
    Close,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
