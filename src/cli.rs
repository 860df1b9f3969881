//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::StorageMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// emolens - client for the video emotion-analysis service
///
/// Upload videos, follow their analysis live and read the emotion
/// insights from the terminal.
///
/// Examples:
///   emolens login --email me@example.com
///   emolens upload ./interview.mp4 --title "Interview"
///   emolens list --format json
///   emolens show 42
///   emolens watch
///   emolens --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Base URL of the REST API
    ///
    /// Can also be set via EMOLENS_API_URL or `[api] base_url` in .emolens.toml.
    #[arg(long, global = true, value_name = "URL", env = "EMOLENS_API_URL")]
    pub api_url: Option<String>,

    /// URL of the push event stream
    #[arg(long, global = true, value_name = "URL", env = "EMOLENS_EVENTS_URL")]
    pub events_url: Option<String>,

    /// Request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Upload storage mode expected by the backend (local, s3)
    #[arg(long, global = true, value_name = "MODE")]
    pub storage: Option<StorageMode>,

    /// File holding the stored session token
    #[arg(long, global = true, value_name = "FILE")]
    pub session_file: Option<PathBuf>,

    /// Use this bearer token instead of the stored session
    ///
    /// The token is not persisted.
    #[arg(
        long,
        global = true,
        value_name = "TOKEN",
        env = "EMOLENS_TOKEN",
        hide_env_values = true
    )]
    pub token: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .emolens.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, global = true, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .emolens.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        email: String,
        /// Read from EMOLENS_PASSWORD or prompted for when omitted
        #[arg(long, env = "EMOLENS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "EMOLENS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show the logged-in account
    Whoami,

    /// List analyses, most recent first
    List,

    /// Show one analysis with its emotion insights
    Show {
        id: String,
        /// Wait for the analysis to finish before rendering
        #[arg(long)]
        follow: bool,
    },

    /// Rename an analysis
    Rename { id: String, title: String },

    /// Upload a video and start its analysis
    Upload {
        file: PathBuf,
        /// Title for the analysis (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Wait for the analysis to finish and render it
        #[arg(long)]
        follow: bool,
    },

    /// Follow status changes live until interrupted
    Watch {
        /// Do not connect to the push event stream
        #[arg(long)]
        no_events: bool,
        /// Do not poll the API periodically
        #[arg(long)]
        no_reconcile: bool,
    },
}

/// Output format for rendered results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required (see --help)".to_string());
        }

        for url in [&self.api_url, &self.events_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Some(Command::Upload { file, title, .. }) => {
                if !file.is_file() {
                    return Err(format!("Video file does not exist: {}", file.display()));
                }
                if matches!(title, Some(t) if t.trim().is_empty()) {
                    return Err("Title cannot be empty".to_string());
                }
            }
            Some(Command::Rename { title, .. }) if title.trim().is_empty() => {
                return Err("Title cannot be empty".to_string());
            }
            Some(Command::Watch {
                no_events: true,
                no_reconcile: true,
            }) => {
                return Err("Cannot use both --no-events and --no-reconcile".to_string());
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args(command: Command) -> Args {
        Args {
            command: Some(command),
            api_url: None,
            events_url: None,
            timeout: None,
            storage: None,
            session_file: None,
            token: None,
            config: None,
            format: OutputFormat::Markdown,
            verbose: false,
            quiet: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_subcommands() {
        let args = Args::try_parse_from(["emolens", "show", "42", "--format", "json"]).unwrap();
        assert_eq!(
            args.command,
            Some(Command::Show {
                id: "42".to_string(),
                follow: false
            })
        );
        assert_eq!(args.format, OutputFormat::Json);

        let args =
            Args::try_parse_from(["emolens", "--storage", "local", "rename", "7", "New"]).unwrap();
        assert_eq!(args.storage, Some(StorageMode::Local));
        assert!(matches!(args.command, Some(Command::Rename { .. })));

        let args = Args::try_parse_from(["emolens", "upload", "clip.mp4", "--follow"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Upload {
                follow: true,
                title: None,
                ..
            })
        ));
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args(Command::List);
        args.api_url = Some("localhost:5000".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args(Command::List);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());

        let args = make_args(Command::Watch {
            no_events: true,
            no_reconcile: true,
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_upload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"data").unwrap();

        let args = make_args(Command::Upload {
            file: file.clone(),
            title: None,
            follow: false,
        });
        assert!(args.validate().is_ok());

        let args = make_args(Command::Upload {
            file: dir.path().join("missing.mp4"),
            title: None,
            follow: true,
        });
        assert!(args.validate().is_err());

        let args = make_args(Command::Upload {
            file,
            title: Some("  ".to_string()),
            follow: false,
        });
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_init_config_skips_validation() {
        let mut args = make_args(Command::List);
        args.command = None;
        assert!(args.validate().is_err());
        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args(Command::List);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
