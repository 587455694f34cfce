/*!
 * Run orchestration
 *
 * Takes a validated [`Config`], walks the target directory on a dedicated
 * thread pool, wraps the result in the document envelope and writes it.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use indicatif::ProgressBar;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::report::RunReport;
use crate::scanner::{ScanStatistics, Scanner, TraversalContext};
use crate::types::{tags, DocumentNode};
use crate::writer::XmlWriter;

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct Outcome {
    /// The full XML document
    pub output: PathBuf,
    /// Size of the full document in bytes
    pub bytes_written: u64,
    /// Split parts, empty unless splitting applied
    pub parts: Vec<PathBuf>,
    /// Traversal statistics
    pub statistics: ScanStatistics,
    /// Wall time of scan and write
    pub duration: Duration,
}

impl Outcome {
    /// Status line shown after a successful run
    pub fn message(&self) -> String {
        format!("XML generated: {}", self.output.display())
    }

    /// Convert into the console report
    pub fn to_report(&self) -> RunReport {
        let stats = &self.statistics;
        RunReport {
            output_file: self.output.display().to_string(),
            parts: self.parts.len(),
            bytes_written: self.bytes_written,
            duration: self.duration,
            folders: stats.folders,
            text_files: stats.text_files,
            binary_files: stats.binary_files,
            unreadable_files: stats.unreadable_files,
            skipped_dirs: stats.skipped_dirs,
            total_chars: stats.total_chars,
            file_details: stats.file_details.clone(),
        }
    }
}

/// Drives one generation run
pub struct Generator {
    config: Config,
    progress: Arc<ProgressBar>,
}

impl Generator {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            progress: Arc::new(ProgressBar::hidden()),
        }
    }

    /// Report per-file progress on the given bar
    pub fn with_progress(mut self, progress: Arc<ProgressBar>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan, build and write the document
    pub fn run(&self) -> Result<Outcome> {
        self.run_at(Local::now())
    }

    /// Same as [`Generator::run`] with a fixed creation time
    pub fn run_at(&self, created: DateTime<Local>) -> Result<Outcome> {
        let start_time = Instant::now();
        self.config.validate()?;

        let context = TraversalContext::from_config(&self.config)?;
        let writer = XmlWriter::new(context.render.clone(), context.split_size);
        info!(
            target_dir = %context.root.display(),
            output = %self.config.output_file.display(),
            threads = self.config.num_threads,
            "generating"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
            .map_err(|e| crate::error!(Scanner, "Failed to build thread pool: {}", e))?;

        let scanner = Scanner::new(context, self.progress.clone());
        let tree = pool.install(|| scanner.scan())?;
        if tree.is_none() {
            debug!("no folder or file selected, writing an empty FileSystem");
        }

        let document = build_document(tree, &self.config.author, created);
        let summary = writer.write(&document, &self.config.output_file)?;

        let outcome = Outcome {
            output: summary.path,
            bytes_written: summary.bytes_written,
            parts: summary.parts,
            statistics: scanner.get_statistics(),
            duration: start_time.elapsed(),
        };
        info!("{}", outcome.message());
        Ok(outcome)
    }
}

/// Wrap a scanned tree in the `DataArchitectureDesign` envelope
pub fn build_document(
    file_system: Option<DocumentNode>,
    author: &str,
    created: DateTime<Local>,
) -> DocumentNode {
    let create = DocumentNode::new(tags::CREATE)
        .with_attribute("Date", created.format("%d-%m-%Y").to_string())
        .with_attribute("Hour", created.format("%H:%M:%S").to_string());

    let mut fs_node = DocumentNode::new(tags::FILE_SYSTEM);
    if let Some(root) = file_system {
        fs_node.push_child(root);
    }

    DocumentNode::new(tags::ROOT)
        .with_attribute("Author", author)
        .with_child(create)
        .with_child(fs_node)
}
