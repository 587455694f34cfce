/*!
 * Configuration handling for fs2dad
 *
 * Three layers, lowest precedence first: built-in defaults, the JSON
 * configuration file, command-line flags. The result is a validated,
 * immutable [`Config`].
 */

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::Parser;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::utils::default_author;
use crate::{bail, ensure};

/// Configuration file used when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "fs2dad.json";

/// Placeholders allowed in the output path template
pub const SUPPORTED_PLACEHOLDERS: &[&str] = &["{target}", "{timestamp}"];

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[^}]*\}").expect("placeholder regex is valid"));

/// Command-line arguments for fs2dad
#[derive(Parser, Debug, Clone)]
#[clap(
    name = "fs2dad",
    version = env!("CARGO_PKG_VERSION"),
    about = "Serialize a directory tree into a single XML design document",
    long_about = "Walks a directory, filters folders and files with glob patterns and writes one XML document embedding the content of every selected file."
)]
pub struct Args {
    /// JSON configuration file
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Directory to serialize
    #[clap(long)]
    pub target: Option<String>,

    /// Output XML file; supports {target} and {timestamp}
    #[clap(long)]
    pub output: Option<String>,

    /// Comma-separated folder patterns to include
    #[clap(long, value_delimiter = ',')]
    pub include: Option<Vec<String>>,

    /// Comma-separated folder patterns to exclude
    #[clap(long, value_delimiter = ',')]
    pub exclude_folders: Option<Vec<String>>,

    /// Comma-separated file patterns to include
    #[clap(long, value_delimiter = ',')]
    pub include_files: Option<Vec<String>>,

    /// Comma-separated file patterns to exclude
    #[clap(long, value_delimiter = ',')]
    pub exclude_files: Option<Vec<String>>,

    /// Indent elements and file content
    #[clap(long, conflicts_with = "no_indent_content")]
    pub indent_content: bool,

    /// Write a compact document even if the configuration file indents
    #[clap(long)]
    pub no_indent_content: bool,

    /// Escape markup and control characters in file content
    #[clap(long, conflicts_with = "no_sanitize")]
    pub sanitize: bool,

    /// Embed file content verbatim even if the configuration file sanitizes
    #[clap(long)]
    pub no_sanitize: bool,

    /// Strip `///` documentation comment lines from file content
    #[clap(long, conflicts_with = "no_remove_comments")]
    pub remove_comments: bool,

    /// Keep comment lines even if the configuration file strips them
    #[clap(long)]
    pub no_remove_comments: bool,

    /// Also cut the output into chunks of at most this many bytes
    #[clap(long)]
    pub split_size: Option<u64>,

    /// Author recorded in the document
    #[clap(long)]
    pub author: Option<String>,

    /// Number of threads to use for scanning
    #[clap(long, default_value = "4")]
    pub threads: usize,

    /// Write a default configuration file and exit
    #[clap(long)]
    pub init: bool,

    /// Save the effective configuration back to the configuration file
    #[clap(long)]
    pub save_config: bool,

    /// Enable debug logging
    #[clap(short, long)]
    pub verbose: bool,
}

impl Args {
    /// The configuration file to read, and whether it was asked for explicitly
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }
}

/// On-disk JSON configuration; missing keys take their defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub target_path_folder: String,
    pub output_path_file: String,
    pub include_folders: Vec<String>,
    pub exclude_folders: Vec<String>,
    pub include_files: Vec<String>,
    pub exclude_files: Vec<String>,
    pub indent_content: bool,
    pub sanitize: bool,
    pub remove_comments: bool,
    pub split_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            target_path_folder: ".".to_string(),
            output_path_file: "{target}.xml".to_string(),
            include_folders: owned(&["*"]),
            exclude_folders: owned(&[
                "bin",
                "obj",
                "debug",
                "release",
                ".vscode",
                ".vs",
                "*.git*",
                "__pycache__",
                "_artifacts",
                "_backup",
                "_temp",
            ]),
            include_files: Vec::new(),
            exclude_files: owned(&[".gitignore", ".gitattributes", "*.tmp", "*.log", "*.xml"]),
            indent_content: false,
            sanitize: false,
            remove_comments: false,
            split_size: 0,
            author: None,
        }
    }
}

impl ConfigFile {
    /// Read a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let file = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(file)
    }

    /// Read `path` if it exists; a missing file is an error only when required
    pub fn load_or_default(path: &Path, required: bool) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        ensure!(
            !required,
            PathNotFound,
            "Configuration file not found: {}",
            path.display()
        );
        debug!(path = %path.display(), "no configuration file, using defaults");
        Ok(Self::default())
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Let command-line flags override file values
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(target) = &args.target {
            self.target_path_folder = target.clone();
        }
        if let Some(output) = &args.output {
            self.output_path_file = output.clone();
        }
        if let Some(items) = &args.include {
            self.include_folders = owned(items);
        }
        if let Some(items) = &args.exclude_folders {
            self.exclude_folders = owned(items);
        }
        if let Some(items) = &args.include_files {
            self.include_files = owned(items);
        }
        if let Some(items) = &args.exclude_files {
            self.exclude_files = owned(items);
        }
        if let Some(on) = switch(args.indent_content, args.no_indent_content) {
            self.indent_content = on;
        }
        if let Some(on) = switch(args.sanitize, args.no_sanitize) {
            self.sanitize = on;
        }
        if let Some(on) = switch(args.remove_comments, args.no_remove_comments) {
            self.remove_comments = on;
        }
        if let Some(size) = args.split_size {
            self.split_size = size;
        }
        if let Some(author) = &args.author {
            self.author = Some(author.clone());
        }
    }
}

/// A `--flag`/`--no-flag` pair; None when neither was given
fn switch(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn owned<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().trim().to_string()).collect()
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory to serialize
    pub target_dir: PathBuf,

    /// Output XML file path, placeholders already resolved
    pub output_file: PathBuf,

    /// Folder patterns to include
    pub include_folders: Vec<String>,

    /// Folder patterns to exclude
    pub exclude_folders: Vec<String>,

    /// File patterns to include (if empty, no file name filter)
    pub include_files: Vec<String>,

    /// File patterns to exclude
    pub exclude_files: Vec<String>,

    /// Indent elements and file content
    pub indent_content: bool,

    /// Escape markup and control characters in file content
    pub sanitize: bool,

    /// Strip `///` comment lines from file content
    pub remove_comments: bool,

    /// Split threshold in bytes, 0 disables splitting
    pub split_size: u64,

    /// Author recorded in the document
    pub author: String,

    /// Number of threads to use for scanning
    pub num_threads: usize,
}

impl Config {
    /// A configuration that includes everything below `target_dir`
    pub fn for_target(target_dir: impl Into<PathBuf>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            output_file: output_file.into(),
            include_folders: vec!["*".to_string()],
            exclude_folders: Vec::new(),
            include_files: Vec::new(),
            exclude_files: Vec::new(),
            indent_content: false,
            sanitize: false,
            remove_comments: false,
            split_size: 0,
            author: default_author(),
            num_threads: 1,
        }
    }

    /// Resolve and validate a file configuration
    pub fn from_file(file: ConfigFile, num_threads: usize) -> Result<Self> {
        Self::from_file_at(file, num_threads, Local::now())
    }

    fn from_file_at(file: ConfigFile, num_threads: usize, now: DateTime<Local>) -> Result<Self> {
        let target_dir = PathBuf::from(&file.target_path_folder);
        validate_target(&target_dir)?;
        let output_file = resolve_output_path(&file.output_path_file, &target_dir, now)?;

        let config = Self {
            target_dir,
            output_file,
            include_folders: file.include_folders,
            exclude_folders: file.exclude_folders,
            include_files: file.include_files,
            exclude_files: file.exclude_files,
            indent_content: file.indent_content,
            sanitize: file.sanitize,
            remove_comments: file.remove_comments,
            split_size: file.split_size,
            author: file.author.unwrap_or_else(default_author),
            num_threads,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validate_target(&self.target_dir)?;

        ensure!(
            self.num_threads > 0,
            Config,
            "Thread count must be at least 1"
        );
        ensure!(
            !self.output_file.is_dir(),
            Config,
            "Output path is a directory: {}",
            self.output_file.display()
        );

        // Check if output file directory exists
        if let Some(parent) = self.output_file.parent() {
            ensure!(
                parent.as_os_str().is_empty() || parent.is_dir(),
                PathNotFound,
                "Output directory not found: {}",
                parent.display()
            );
        }

        Ok(())
    }
}

fn validate_target(target_dir: &Path) -> Result<()> {
    ensure!(
        target_dir.exists(),
        PathNotFound,
        "Target directory not found: {}",
        target_dir.display()
    );
    ensure!(
        target_dir.is_dir(),
        Config,
        "Target is not a directory: {}",
        target_dir.display()
    );
    Ok(())
}

/// Name of the target folder as used by `{target}` and the root `Folder`
pub fn target_name(target_dir: &Path) -> String {
    let resolved = fs::canonicalize(target_dir).unwrap_or_else(|_| target_dir.to_path_buf());
    resolved
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| resolved.display().to_string())
}

/// Substitute `{target}` and `{timestamp}` in an output path template
pub fn resolve_output_path(
    template: &str,
    target_dir: &Path,
    now: DateTime<Local>,
) -> Result<PathBuf> {
    ensure!(!template.trim().is_empty(), Config, "Output path is empty");

    for found in PLACEHOLDER.find_iter(template) {
        if !SUPPORTED_PLACEHOLDERS.contains(&found.as_str()) {
            bail!(
                Config,
                "Unsupported placeholder {} in output path '{}' (supported: {})",
                found.as_str(),
                template,
                SUPPORTED_PLACEHOLDERS.join(", ")
            );
        }
    }

    let resolved = template
        .replace("{target}", &target_name(target_dir))
        .replace("{timestamp}", &now.format("%Y%m%d_%H%M%S").to_string());
    Ok(PathBuf::from(resolved))
}
