//! Command-line interface definition for the zipvfs tool.
//!
//! The binary is a small `unzip`-flavoured front end over the library:
//! it mounts an archive (local path or HTTP URL) and lists, pipes, or
//! extracts members through the virtual filesystem.

use clap::Parser;

/// Command-line arguments for the zipvfs tool.
#[derive(Parser, Debug)]
#[command(name = "zipvfs")]
#[command(version)]
#[command(about = "Browse and extract ZIP archives, local or remote", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipvfs -l data.zip                          list archive contents\n  \
  zipvfs -p data.zip notes.txt | less         pipe one member to stdout\n  \
  zipvfs -d out https://example.com/a.zip     extract a remote archive")]
pub struct Cli {
    /// ZIP file path or HTTP(S) URL.
    ///
    /// Remote archives are mounted over HTTP Range requests; only the
    /// byte ranges actually read are transferred.
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Members to pipe or extract (default: all).
    ///
    /// Matched against the full archive path or the final path
    /// component.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// List member names, one per line.
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely: sizes, compression ratio, timestamps.
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Write member contents to stdout instead of extracting.
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract into DIR instead of the current directory.
    #[arg(short = 'd', value_name = "DIR")]
    pub dest: Option<String>,

    /// Overwrite existing files without prompting.
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Never overwrite existing files.
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Quiet mode; repeat for quieter.
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    /// True when the input names an HTTP(S) URL rather than a local path.
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    /// True when informational messages should be suppressed.
    ///
    /// Pipe mode is always quiet so member data on stdout stays clean.
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }
}
