use clap::{ArgAction, Parser, Subcommand};

/// Tool for reading Kirikiri XP3 archives
#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Tool for listing, extracting and verifying Kirikiri XP3 archives"
)]
pub struct Arg {
    #[arg(global = true, action = ArgAction::SetTrue, short, long)]
    /// Print backtrace on error
    pub backtrace: bool,
    #[command(subcommand)]
    /// Command
    pub command: Command,
}

#[derive(Subcommand, Debug)]
/// Commands
pub enum Command {
    /// List files and segments in an archive
    Ls {
        /// Input archive file
        archive: String,
    },
    /// Extract all files from an archive
    Extract {
        /// Input archive file
        archive: String,
        /// Output directory (defaults to the archive name without extension)
        output: Option<String>,
    },
    /// Read every file and report throughput
    Speedtest {
        /// Input archive file
        archive: String,
    },
    /// Recompute Adler-32 checksums and compare with the stored ones
    Verify {
        /// Input archive file
        archive: String,
    },
}

pub fn parse_args() -> Arg {
    Arg::try_parse().unwrap_or_else(|e| {
        let _ = e.print();
        std::process::exit(if e.use_stderr() { 1 } else { 0 });
    })
}
