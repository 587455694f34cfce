/*!
 * Directory traversal producing the `Folder`/`File` element tree
 */

use std::cmp::Ordering;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use indicatif::ProgressBar;
use rayon::prelude::*;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::classifier::{classify, error_marker, FileContent};
use crate::config::Config;
use crate::error::Result;
use crate::pattern::FilterRules;
use crate::report::FileReportInfo;
use crate::types::{tags, DocumentNode, FileKind};
use crate::utils::part_number;
use crate::writer::RenderOptions;

/// Relative path of the traversal root
pub const ROOT_RELATIVE: &str = ".";

/// Everything a traversal needs, built once per run
#[derive(Debug, Clone)]
pub struct TraversalContext {
    /// Canonical path of the directory being serialized
    pub root: PathBuf,
    /// Compiled folder and file rules
    pub rules: FilterRules,
    /// Formatting options for the writer
    pub render: RenderOptions,
    /// Split threshold in bytes, 0 disables splitting
    pub split_size: u64,
    /// Where the output document will land, so it is never embedded in itself
    pub output: Option<PathBuf>,
}

impl TraversalContext {
    /// Compile the rules of a configuration; malformed patterns fail here
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            root: fs::canonicalize(&config.target_dir)?,
            rules: FilterRules::from_config(config)?,
            render: RenderOptions::from_config(config),
            split_size: config.split_size,
            output: output_location(&config.output_file),
        })
    }

    /// The output document or one of its split parts
    fn is_output(&self, path: &Path) -> bool {
        let Some(output) = &self.output else {
            return false;
        };
        if path == output.as_path() {
            return true;
        }
        match (path.parent(), path.file_name(), output.file_name()) {
            (Some(dir), Some(name), Some(out_name)) if Some(dir) == output.parent() => {
                part_number(&name.to_string_lossy(), &out_name.to_string_lossy()).is_some()
            }
            _ => false,
        }
    }
}

fn output_location(output: &Path) -> Option<PathBuf> {
    let name = output.file_name()?;
    let dir = match output.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::canonicalize(dir).ok().map(|dir| dir.join(name))
}

/// Scanner statistics
#[derive(Debug, Clone, Default)]
pub struct ScanStatistics {
    /// Folders present in the document
    pub folders: usize,
    /// Files embedded as text
    pub text_files: usize,
    /// Files replaced by a binary marker
    pub binary_files: usize,
    /// Files replaced by an error marker
    pub unreadable_files: usize,
    /// Subdirectories that could not be listed
    pub skipped_dirs: usize,
    /// Characters of embedded text
    pub total_chars: usize,
    /// Details for each file
    pub file_details: Vec<FileReportInfo>,
}

impl ScanStatistics {
    pub fn files(&self) -> usize {
        self.text_files + self.binary_files + self.unreadable_files
    }
}

/// A directory entry waiting to be visited
#[derive(Debug)]
struct Entry {
    path: PathBuf,
    name: String,
}

impl Entry {
    fn from_dir_entry(entry: &DirEntry) -> Self {
        Self {
            path: entry.path().to_path_buf(),
            name: entry.file_name().to_string_lossy().to_string(),
        }
    }
}

/// Files before folders, then case-insensitive by name
fn entry_order(a: &DirEntry, b: &DirEntry) -> Ordering {
    let a_name = a.file_name().to_string_lossy();
    let b_name = b.file_name().to_string_lossy();
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a_name.to_lowercase().cmp(&b_name.to_lowercase()))
        .then_with(|| a_name.cmp(&b_name))
}

fn join_relative(parent: &str, name: &str) -> String {
    if parent == ROOT_RELATIVE {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Scanner for directory contents
pub struct Scanner {
    /// Rules, root and formatting for this run
    context: TraversalContext,
    /// Progress bar
    pub progress: Arc<ProgressBar>,
    /// Scanner statistics
    statistics: Arc<Mutex<ScanStatistics>>,
}

impl Scanner {
    /// Create a new scanner
    pub fn new(context: TraversalContext, progress: Arc<ProgressBar>) -> Self {
        Self {
            context,
            progress,
            statistics: Arc::new(Mutex::new(ScanStatistics::default())),
        }
    }

    pub fn context(&self) -> &TraversalContext {
        &self.context
    }

    /// Get scanner statistics
    pub fn get_statistics(&self) -> ScanStatistics {
        self.stats().clone()
    }

    fn stats(&self) -> std::sync::MutexGuard<'_, ScanStatistics> {
        self.statistics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Walk the root directory
    ///
    /// Returns `None` when nothing below the root survives filtering.
    /// Only a root that cannot be listed is an error.
    pub fn scan(&self) -> Result<Option<DocumentNode>> {
        let root = &self.context.root;
        self.scan_directory(root, ROOT_RELATIVE, false)
            .map_err(|e| crate::error!(Scanner, "Failed to scan {}: {}", root.display(), e))
    }

    fn scan_directory(
        &self,
        abs_path: &Path,
        rel_path: &str,
        inherited: bool,
    ) -> io::Result<Option<DocumentNode>> {
        let decision = self.context.rules.folder_decision(rel_path, inherited);
        debug!(
            path = rel_path,
            included = decision.included,
            excluded = decision.excluded,
            "folder"
        );
        if decision.excluded {
            return Ok(None);
        }

        let (files, dirs) = self.list_entries(abs_path)?;

        let file_nodes: Vec<DocumentNode> = files
            .par_iter()
            .filter_map(|entry| self.visit_file(entry, rel_path, decision.included))
            .collect();

        let folder_nodes: Vec<DocumentNode> = dirs
            .par_iter()
            .filter_map(|entry| {
                let child_rel = join_relative(rel_path, &entry.name);
                match self.scan_directory(&entry.path, &child_rel, decision.included) {
                    Ok(node) => node,
                    Err(e) => {
                        warn!(path = %child_rel, error = %e, "skipping unreadable directory");
                        self.stats().skipped_dirs += 1;
                        None
                    }
                }
            })
            .collect();

        if file_nodes.is_empty() && folder_nodes.is_empty() {
            debug!(path = rel_path, "no content, pruned");
            return Ok(None);
        }

        let name = abs_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| abs_path.display().to_string());
        let mut folder = DocumentNode::new(tags::FOLDER).with_attribute("Name", name);
        folder.children.extend(file_nodes);
        folder.children.extend(folder_nodes);

        self.stats().folders += 1;
        Ok(Some(folder))
    }

    /// List a directory's files and subdirectories in document order
    fn list_entries(&self, abs_path: &Path) -> io::Result<(Vec<Entry>, Vec<Entry>)> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();

        for entry in WalkDir::new(abs_path)
            .min_depth(1)
            .max_depth(1)
            .sort_by(entry_order)
        {
            let entry = entry?;
            let file_type = entry.file_type();
            if file_type.is_dir() {
                dirs.push(Entry::from_dir_entry(&entry));
            } else if file_type.is_symlink() && entry.path().is_dir() {
                debug!(path = %entry.path().display(), "not following directory symlink");
            } else {
                files.push(Entry::from_dir_entry(&entry));
            }
        }

        Ok((files, dirs))
    }

    /// Apply the file rules and build the `File` element
    fn visit_file(&self, entry: &Entry, rel_dir: &str, folder_included: bool) -> Option<DocumentNode> {
        let decision = self.context.rules.file_decision(&entry.name, folder_included);
        debug!(
            file = %entry.name,
            included = decision.included_by_name,
            excluded = decision.excluded,
            folder_included,
            "file"
        );
        if !decision.is_eligible() {
            return None;
        }
        if self.context.is_output(&entry.path) {
            debug!(file = %entry.name, "skipping the output document");
            return None;
        }
        if !entry.path.exists() {
            warn!(file = %entry.path.display(), "file vanished before reading");
            return None;
        }

        let relative = join_relative(rel_dir, &entry.name);
        self.report_progress(&entry.name);

        let (content, size, encoding) = match classify(&entry.path, &relative) {
            Ok(descriptor) => (descriptor.read(), descriptor.size, descriptor.encoding),
            Err(e) => (
                FileContent::Unreadable(error_marker(&e.to_string(), &relative)),
                0,
                None,
            ),
        };
        if let FileContent::Binary(marker) | FileContent::Unreadable(marker) = &content {
            warn!("{}", marker);
        }
        self.record(relative, size, encoding, &content);

        let mut node = DocumentNode::new(tags::FILE).with_attribute("Name", entry.name.as_str());
        node.set_payload(content.into_payload());
        Some(node)
    }

    fn report_progress(&self, file_name: &str) {
        self.progress.inc(1);
        // Truncate if too long to avoid display issues
        let char_count = file_name.chars().count();
        let display_name = if char_count > 40 {
            let skip = file_name
                .char_indices()
                .nth(char_count - 37)
                .map_or(0, |(i, _)| i);
            format!("...{}", &file_name[skip..])
        } else {
            file_name.to_string()
        };
        self.progress
            .set_message(format!("Current file: {}", display_name));
    }

    fn record(&self, path: String, size: u64, encoding: Option<String>, content: &FileContent) {
        let kind = content.kind();
        let chars = match content {
            FileContent::Text(text) => text.chars().count(),
            _ => 0,
        };

        let mut stats = self.stats();
        match kind {
            FileKind::Text => stats.text_files += 1,
            FileKind::Binary => stats.binary_files += 1,
            FileKind::Unreadable => stats.unreadable_files += 1,
        }
        stats.total_chars += chars;
        stats.file_details.push(FileReportInfo {
            path,
            size,
            kind,
            encoding,
            chars,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::{tempdir, TempDir};

    fn touch(dir: &Path, rel: &str, content: &[u8]) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        File::create(path).unwrap().write_all(content).unwrap();
    }

    fn scanner_for(config: &Config) -> Scanner {
        let context = TraversalContext::from_config(config).unwrap();
        Scanner::new(context, Arc::new(ProgressBar::hidden()))
    }

    fn child_names(node: &DocumentNode) -> Vec<(String, String)> {
        node.children
            .iter()
            .map(|c| (c.tag.clone(), c.name().unwrap_or_default().to_string()))
            .collect()
    }

    fn fixture() -> TempDir {
        let dir = tempdir().unwrap();
        touch(dir.path(), "b.txt", b"b");
        touch(dir.path(), "A.txt", b"a");
        touch(dir.path(), "c.md", b"c");
        touch(dir.path(), "alpha/x.txt", b"x");
        touch(dir.path(), "Zeta/y.txt", b"y");
        dir
    }

    #[test]
    fn test_files_before_folders_case_insensitive() {
        let dir = fixture();
        let config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        let root = scanner_for(&config).scan().unwrap().unwrap();

        let expected: Vec<(String, String)> = [
            ("File", "A.txt"),
            ("File", "b.txt"),
            ("File", "c.md"),
            ("Folder", "alpha"),
            ("Folder", "Zeta"),
        ]
        .iter()
        .map(|(t, n)| (t.to_string(), n.to_string()))
        .collect();
        assert_eq!(child_names(&root), expected);
    }

    #[test]
    fn test_empty_branches_are_pruned() {
        let dir = fixture();
        touch(dir.path(), "logs/run.log", b"noise");
        fs::create_dir_all(dir.path().join("empty/deeper")).unwrap();

        let mut config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        config.exclude_files = vec!["*.log".to_string()];
        let scanner = scanner_for(&config);
        let root = scanner.scan().unwrap().unwrap();

        assert!(root.find_child(tags::FOLDER, "logs").is_none());
        assert!(root.find_child(tags::FOLDER, "empty").is_none());
        assert_eq!(scanner.get_statistics().folders, 3);
    }

    #[test]
    fn test_excluded_folder_subtree_is_skipped() {
        let dir = fixture();
        touch(dir.path(), "alpha/inner/z.txt", b"z");

        let mut config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        config.exclude_folders = vec!["alpha".to_string()];
        let scanner = scanner_for(&config);
        let root = scanner.scan().unwrap().unwrap();

        assert!(root.find_child(tags::FOLDER, "alpha").is_none());
        assert!(root.find_child(tags::FOLDER, "Zeta").is_some());
        let visited: Vec<_> = scanner
            .get_statistics()
            .file_details
            .into_iter()
            .map(|f| f.path)
            .collect();
        assert!(!visited.iter().any(|p| p.starts_with("alpha/")));
    }

    #[test]
    fn test_nested_exclusion_uses_relative_path() {
        let dir = fixture();
        touch(dir.path(), "alpha/build/out.txt", b"o");

        let mut config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        config.exclude_folders = vec!["**/build".to_string()];
        let root = scanner_for(&config).scan().unwrap().unwrap();

        let alpha = root.find_child(tags::FOLDER, "alpha").unwrap();
        assert!(alpha.find_child(tags::FOLDER, "build").is_none());
        assert!(alpha.find_child(tags::FILE, "x.txt").is_some());
    }

    #[test]
    fn test_folder_inclusion_propagates_to_files() {
        let dir = fixture();
        touch(dir.path(), "alpha/deep/data.bin", &[0, 1, 2]);

        let mut config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        config.include_folders = vec!["alpha".to_string()];
        config.include_files = vec!["*.md".to_string()];
        let root = scanner_for(&config).scan().unwrap().unwrap();

        // root not included: only name matches surface
        assert_eq!(
            child_names(&root)
                .into_iter()
                .filter(|(t, _)| t == "File")
                .map(|(_, n)| n)
                .collect::<Vec<_>>(),
            vec!["c.md".to_string()]
        );
        // alpha included: everything below it qualifies
        let alpha = root.find_child(tags::FOLDER, "alpha").unwrap();
        assert!(alpha.find_child(tags::FILE, "x.txt").is_some());
        let deep = alpha.find_child(tags::FOLDER, "deep").unwrap();
        assert!(deep.find_child(tags::FILE, "data.bin").is_some());
        // Zeta neither included nor holding .md files
        assert!(root.find_child(tags::FOLDER, "Zeta").is_none());
    }

    #[test]
    fn test_output_document_is_not_embedded() {
        let dir = fixture();
        let output = dir.path().join("out.xml");
        touch(dir.path(), "out.xml", b"<old/>");
        touch(dir.path(), "out.xml_part1", b"<old");

        let config = Config::for_target(dir.path(), &output);
        let root = scanner_for(&config).scan().unwrap().unwrap();
        assert!(root.find_child(tags::FILE, "out.xml").is_none());
        assert!(root.find_child(tags::FILE, "out.xml_part1").is_none());
        assert!(root.find_child(tags::FILE, "A.txt").is_some());
    }

    #[test]
    fn test_files_named_like_parts_are_kept() {
        let dir = fixture();
        let output = dir.path().join("out.xml");
        touch(dir.path(), "out.xml_partners.txt", b"partners");
        touch(dir.path(), "out.xml_part2.bak", b"backup");

        let config = Config::for_target(dir.path(), &output);
        let root = scanner_for(&config).scan().unwrap().unwrap();
        let partners = root.find_child(tags::FILE, "out.xml_partners.txt").unwrap();
        assert_eq!(partners.text(), Some("partners"));
        assert!(root.find_child(tags::FILE, "out.xml_part2.bak").is_some());
    }

    #[cfg(unix)]
    fn lock(path: &Path, mode: u32) {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_unlistable_directory_is_skipped() {
        let dir = fixture();
        touch(dir.path(), "locked/inner.txt", b"hidden");
        let locked = dir.path().join("locked");
        lock(&locked, 0o000);
        if fs::read_dir(&locked).is_ok() {
            // permissions are not enforced (running as root)
            lock(&locked, 0o755);
            return;
        }

        let config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        let scanner = scanner_for(&config);
        let result = scanner.scan();
        lock(&locked, 0o755);

        let root = result.unwrap().unwrap();
        assert!(root.find_child(tags::FOLDER, "locked").is_none());
        assert!(root.find_child(tags::FOLDER, "alpha").is_some());
        assert_eq!(scanner.get_statistics().skipped_dirs, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_file_becomes_error_marker() {
        let dir = fixture();
        touch(dir.path(), "alpha/locked.txt", b"secret");
        let locked = dir.path().join("alpha/locked.txt");
        lock(&locked, 0o000);
        if File::open(&locked).is_ok() {
            // permissions are not enforced (running as root)
            lock(&locked, 0o644);
            return;
        }

        let config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        let scanner = scanner_for(&config);
        let result = scanner.scan();
        lock(&locked, 0o644);

        let root = result.unwrap().unwrap();
        let alpha = root.find_child(tags::FOLDER, "alpha").unwrap();
        let marker = alpha.find_child(tags::FILE, "locked.txt").unwrap().text().unwrap();
        assert!(marker.starts_with("Errore ["));
        assert!(marker.ends_with("- lettura file: alpha/locked.txt"));
        assert!(!marker.contains("secret"));
        // the rest of the folder is still there
        assert!(alpha.find_child(tags::FILE, "x.txt").is_some());

        let stats = scanner.get_statistics();
        assert_eq!(stats.unreadable_files, 1);
        assert_eq!(stats.text_files, 5);
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_symlinks_are_not_followed() {
        let dir = fixture();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("A.txt"), dir.path().join("link.txt")).unwrap();

        let config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        let root = scanner_for(&config).scan().unwrap().unwrap();
        assert!(root.find_child(tags::FOLDER, "loop").is_none());
        assert!(root.find_child(tags::FILE, "loop").is_none());
        let link = root.find_child(tags::FILE, "link.txt").unwrap();
        assert_eq!(link.text(), Some("a"));
    }

    #[test]
    fn test_nothing_selected_yields_none() {
        let dir = fixture();
        let mut config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        config.exclude_files = vec!["*".to_string()];
        assert!(scanner_for(&config).scan().unwrap().is_none());
    }

    #[test]
    fn test_statistics_by_kind() {
        let dir = fixture();
        touch(dir.path(), "blob.bin", &[0, 159, 146, 150]);

        let config = Config::for_target(dir.path(), dir.path().join("out.xml"));
        let scanner = scanner_for(&config);
        scanner.scan().unwrap();

        let stats = scanner.get_statistics();
        assert_eq!(stats.text_files, 5);
        assert_eq!(stats.binary_files, 1);
        assert_eq!(stats.unreadable_files, 0);
        assert_eq!(stats.files(), 6);
        assert_eq!(stats.total_chars, 5);
    }
}
