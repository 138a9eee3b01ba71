//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgGroup, Parser};

/// Send one message to every address in a recipient list.
#[derive(Debug, Parser)]
#[command(name = "bulkmail", version, about, long_about = None)]
#[command(group(ArgGroup::new("content").required(true).args(["body", "body_file"])))]
pub struct Args {
    /// CSV file with an `Email` column
    #[arg(short, long, value_name = "FILE")]
    pub recipients: PathBuf,

    /// Subject line
    #[arg(short, long)]
    pub subject: String,

    /// Message body
    #[arg(short, long)]
    pub body: Option<String>,

    /// Read the message body from a file
    #[arg(long, value_name = "FILE")]
    pub body_file: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Sender address; server presets follow its domain when no settings file exists
    #[arg(long, value_name = "EMAIL")]
    pub from: Option<String>,

    /// SMTP password or app password
    #[arg(long, env = "BULKMAIL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Minimum seconds between two sends
    #[arg(long, value_name = "SECS")]
    pub min_interval: Option<u64>,

    /// Attempts per recipient before giving up
    #[arg(long, value_name = "N")]
    pub max_attempts: Option<u32>,

    /// Validate everything and exit without sending
    #[arg(long)]
    pub dry_run: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Message body from `--body` or `--body-file`.
    ///
    /// # Errors
    ///
    /// Returns an error if the body file cannot be read.
    pub fn read_body(&self) -> std::io::Result<String> {
        match (&self.body, &self.body_file) {
            (Some(body), _) => Ok(body.clone()),
            (None, Some(path)) => std::fs::read_to_string(path),
            (None, None) => Ok(String::new()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn minimal_invocation() {
        let args =
            Args::try_parse_from(["bulkmail", "-r", "list.csv", "-s", "Hi", "-b", "Hello"]).unwrap();
        assert_eq!(args.recipients, PathBuf::from("list.csv"));
        assert_eq!(args.subject, "Hi");
        assert_eq!(args.read_body().unwrap(), "Hello");
        assert!(args.workers.is_none());
        assert!(!args.dry_run);
    }

    #[test]
    fn body_is_required() {
        assert!(Args::try_parse_from(["bulkmail", "-r", "list.csv", "-s", "Hi"]).is_err());
    }

    #[test]
    fn body_sources_conflict() {
        let result = Args::try_parse_from([
            "bulkmail", "-r", "list.csv", "-s", "Hi", "-b", "x", "--body-file", "b.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn tuning_flags() {
        let args = Args::try_parse_from([
            "bulkmail",
            "--recipients",
            "list.csv",
            "--subject",
            "Hi",
            "--body-file",
            "body.txt",
            "--workers",
            "4",
            "--min-interval",
            "3",
            "--max-attempts",
            "5",
            "--json",
        ])
        .unwrap();
        assert_eq!(args.workers, Some(4));
        assert_eq!(args.min_interval, Some(3));
        assert_eq!(args.max_attempts, Some(5));
        assert_eq!(args.body_file, Some(PathBuf::from("body.txt")));
        assert!(args.json);
    }
}
