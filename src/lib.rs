/*!
 * fs2dad - Serialize a directory tree into a single XML design document
 *
 * Folders and files are selected with glob patterns, text files are
 * embedded with their detected encoding and binary files are replaced by
 * a descriptive marker.
 */

pub mod classifier;
pub mod config;
pub mod error;
pub mod generator;
pub mod pattern;
pub mod report;
pub mod scanner;
pub mod types;
pub mod utils;
pub mod writer;


// Re-export main components for easier access
pub use config::{Args, Config, ConfigFile};
pub use error::{Fs2DadError, Result};
pub use generator::{build_document, Generator, Outcome};
pub use report::{FileReportInfo, ReportFormat, Reporter, RunReport};
pub use scanner::{ScanStatistics, Scanner, TraversalContext};
pub use types::{DocumentNode, FileKind};
pub use utils::format_file_size;
pub use writer::{RenderOptions, XmlWriter};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generate the document described by `config`
pub fn generate(config: Config) -> Result<Outcome> {
    Generator::new(config).run()
}
