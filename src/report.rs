/*!
 * Reporting for fs2dad runs
 *
 * Renders a summary of the generated document and the files embedded in
 * it with the tabled library.
 */

use std::time::Duration;

use tabled::{
    settings::{object::Columns, Alignment, Modify, Padding, Style},
    Table, Tabled,
};

use crate::types::FileKind;
use crate::utils::format_file_size;

/// Information about a file in the report
#[derive(Debug, Clone)]
pub struct FileReportInfo {
    /// Path relative to the scanned directory
    pub path: String,
    /// Size on disk in bytes
    pub size: u64,
    /// How the file was embedded
    pub kind: FileKind,
    /// Detected encoding
    pub encoding: Option<String>,
    /// Characters of embedded text (0 for markers)
    pub chars: usize,
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Output file path
    pub output_file: String,
    /// Split parts written next to the output
    pub parts: usize,
    /// Bytes of the written document
    pub bytes_written: u64,
    /// Time taken
    pub duration: Duration,
    /// Folders in the document
    pub folders: usize,
    /// Files embedded as text
    pub text_files: usize,
    /// Files replaced by a binary marker
    pub binary_files: usize,
    /// Files replaced by an error marker
    pub unreadable_files: usize,
    /// Directories that could not be listed
    pub skipped_dirs: usize,
    /// Total characters of embedded text
    pub total_chars: usize,
    /// Details for each file
    pub file_details: Vec<FileReportInfo>,
}

impl RunReport {
    pub fn files_processed(&self) -> usize {
        self.text_files + self.binary_files + self.unreadable_files
    }
}

/// Format of the report output
pub enum ReportFormat {
    /// Console table output
    ConsoleTable,
}

/// Report generator for run results
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    /// Create a new reporter
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Format a number with human-readable units
    fn format_number(&self, num: usize) -> String {
        if num >= 1_000_000 {
            format!("{:.1}M", num as f64 / 1_000_000.0)
        } else if num >= 1_000 {
            format!("{:.1}K", num as f64 / 1_000.0)
        } else {
            num.to_string()
        }
    }

    /// Generate a report string
    pub fn generate_report(&self, report: &RunReport) -> String {
        match self.format {
            ReportFormat::ConsoleTable => self.generate_console_report(report),
        }
    }

    /// Print the report to stdout
    pub fn print_report(&self, report: &RunReport) {
        println!("\n{}", self.generate_report(report));
    }

    /// Keep the trailing segments of a long path
    fn format_path(&self, path: &str, max_len: usize) -> String {
        if path.chars().count() <= max_len {
            return path.to_string();
        }

        let mut segments = Vec::new();
        let mut current_len = 3; // "..."
        for part in path.split('/').rev() {
            let part_len = part.chars().count() + 1;
            if current_len + part_len > max_len {
                break;
            }
            segments.push(part);
            current_len += part_len;
        }

        if segments.is_empty() {
            let tail: Vec<char> = path.chars().rev().take(max_len - 3).collect();
            return format!("...{}", tail.into_iter().rev().collect::<String>());
        }

        let mut result = String::from("...");
        for part in segments.iter().rev() {
            result.push('/');
            result.push_str(part);
        }
        result
    }

    fn create_summary_table(&self, report: &RunReport) -> String {
        #[derive(Tabled)]
        struct SummaryRow {
            #[tabled(rename = "Metric")]
            key: String,

            #[tabled(rename = "Value")]
            value: String,
        }

        let mut rows = vec![
            SummaryRow {
                key: "📂 Output File".to_string(),
                value: report.output_file.clone(),
            },
            SummaryRow {
                key: "💾 Document Size".to_string(),
                value: format_file_size(report.bytes_written),
            },
            SummaryRow {
                key: "⏱️ Process Time".to_string(),
                value: format!("{:.4?}", report.duration),
            },
            SummaryRow {
                key: "📁 Folders".to_string(),
                value: self.format_number(report.folders),
            },
            SummaryRow {
                key: "📄 Files Processed".to_string(),
                value: format!(
                    "{} ({} text, {} binary, {} unreadable)",
                    self.format_number(report.files_processed()),
                    report.text_files,
                    report.binary_files,
                    report.unreadable_files
                ),
            },
            SummaryRow {
                key: "📝 Total Characters".to_string(),
                value: self.format_number(report.total_chars),
            },
        ];

        if report.parts > 0 {
            rows.push(SummaryRow {
                key: "✂️ Split Parts".to_string(),
                value: report.parts.to_string(),
            });
        }

        if report.skipped_dirs > 0 {
            rows.push(SummaryRow {
                key: "⚠️ Skipped Folders".to_string(),
                value: report.skipped_dirs.to_string(),
            });
        }

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    fn create_files_table(&self, report: &RunReport) -> String {
        #[derive(Tabled)]
        struct FileRow {
            #[tabled(rename = "File Path")]
            path: String,

            #[tabled(rename = "Kind")]
            kind: String,

            #[tabled(rename = "Encoding")]
            encoding: String,

            #[tabled(rename = "Size")]
            size: String,
        }

        // Largest first
        let mut files: Vec<&FileReportInfo> = report.file_details.iter().collect();
        files.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));

        let files_to_show = if files.len() > 15 {
            &files[0..10]
        } else {
            &files[..]
        };

        let rows: Vec<FileRow> = files_to_show
            .iter()
            .map(|info| FileRow {
                path: self.format_path(&info.path, 60),
                kind: info.kind.to_string(),
                encoding: info.encoding.clone().unwrap_or_else(|| "-".to_string()),
                size: format_file_size(info.size),
            })
            .collect();

        let mut table = Table::new(rows);
        table
            .with(Style::rounded())
            .with(Padding::new(1, 1, 0, 0))
            .with(Modify::new(Columns::new(..)).with(Alignment::left()));

        table.to_string()
    }

    fn generate_console_report(&self, report: &RunReport) -> String {
        let summary_table = self.create_summary_table(report);
        let summary_title = "✅  XML GENERATED";

        if report.file_details.is_empty() {
            return format!("{}\n{}", summary_title, summary_table);
        }

        let files_table = self.create_files_table(report);
        let files_title = if report.file_details.len() > 15 {
            "📋  TOP 10 LARGEST FILES"
        } else {
            "📋  PROCESSED FILES"
        };

        format!(
            "{}\n{}\n\n{}\n{}",
            files_title, files_table, summary_title, summary_table
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(path: &str, size: u64, kind: FileKind) -> FileReportInfo {
        FileReportInfo {
            path: path.to_string(),
            size,
            kind,
            encoding: Some("ascii".to_string()),
            chars: size as usize,
        }
    }

    fn report(files: Vec<FileReportInfo>) -> RunReport {
        RunReport {
            output_file: "out.xml".to_string(),
            parts: 0,
            bytes_written: 2048,
            duration: Duration::from_millis(12),
            folders: 1,
            text_files: files.len(),
            binary_files: 0,
            unreadable_files: 0,
            skipped_dirs: 0,
            total_chars: files.iter().map(|f| f.chars).sum(),
            file_details: files,
        }
    }

    #[test]
    fn test_console_report_lists_files() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let output = reporter.generate_report(&report(vec![
            info("a.txt", 5, FileKind::Text),
            info("sub/b.bin", 4, FileKind::Binary),
        ]));

        assert!(output.contains("PROCESSED FILES"));
        assert!(output.contains("a.txt"));
        assert!(output.contains("sub/b.bin"));
        assert!(output.contains("binary"));
        assert!(output.contains("out.xml"));
        assert!(output.contains("2.00 KB"));
        assert!(!output.contains("Split Parts"));
    }

    #[test]
    fn test_large_runs_show_top_ten() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let files = (0..20)
            .map(|i| info(&format!("file{:02}.txt", i), i as u64, FileKind::Text))
            .collect();
        let output = reporter.generate_report(&report(files));

        assert!(output.contains("TOP 10 LARGEST FILES"));
        assert!(output.contains("file19.txt"));
        assert!(!output.contains("file00.txt"));
    }

    #[test]
    fn test_empty_run_has_summary_only() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        let output = reporter.generate_report(&report(Vec::new()));
        assert!(output.starts_with("✅  XML GENERATED"));
        assert!(!output.contains("PROCESSED FILES"));
    }

    #[test]
    fn test_format_path_keeps_tail() {
        let reporter = Reporter::new(ReportFormat::ConsoleTable);
        assert_eq!(reporter.format_path("src/main.rs", 60), "src/main.rs");
        let long = "very/long/directory/structure/with/many/levels/deep/file.txt";
        let short = reporter.format_path(long, 20);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("/deep/file.txt"));
        assert!(short.chars().count() <= 20);
    }
}
