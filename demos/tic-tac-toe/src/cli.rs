//! Command-line interface for the tic-tac-toe demo.

use clap::{Parser, Subcommand};

/// Two-player tic-tac-toe over a shared document store
#[derive(Parser, Debug)]
#[command(name = "tic-tac-toe")]
#[command(about = "Play tic-tac-toe against a friend over the network", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the document store server both players connect to
    Serve {
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1:9001")]
        bind: String,
    },

    /// Start a new game and print its invite code
    Host {
        /// Store server URL
        #[arg(long, default_value = "ws://127.0.0.1:9001")]
        url: String,

        /// Who you are
        #[arg(short, long)]
        user: String,
    },

    /// Join a game with an invite code
    Join {
        /// Invite code printed by the host
        code: String,

        /// Store server URL
        #[arg(long, default_value = "ws://127.0.0.1:9001")]
        url: String,

        /// Who you are
        #[arg(short, long)]
        user: String,
    },
}

/// One line typed at the game prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Move(usize),
    Reset,
    Away,
    Back,
    SignIn(String),
    SignOut,
    Quit,
    Unknown(String),
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("r" | "reset"), None) => Self::Reset,
            (Some("away"), None) => Self::Away,
            (Some("back"), None) => Self::Back,
            (Some("logout"), None) => Self::SignOut,
            (Some("login"), Some(user)) => Self::SignIn(user.to_string()),
            (Some("q" | "quit"), None) => Self::Quit,
            (Some(word), None) => match word.parse() {
                Ok(index) => Self::Move(index),
                Err(_) => Self::Unknown(line.to_string()),
            },
            _ => Self::Unknown(line.to_string()),
        }
    }
}

pub const HELP: &str = "\
  0-8         play a cell (0 is top-left, 8 is bottom-right)
  r           start a new round once the game is over
  away, back  pretend to leave the app and come back
  login NAME  sign in as someone else
  logout      sign out (leaves the game)
  q           quit";
