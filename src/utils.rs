/*!
 * Utility functions for fs2dad
 */

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Format a human-readable file size
pub fn format_file_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

/// Path of the `n`-th chunk of a split file (`<path>_part<n>`)
pub fn part_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!("_part{}", n));
    PathBuf::from(name)
}

/// The `n` of a `<base_name>_part<n>` file name
pub fn part_number(file_name: &str, base_name: &str) -> Option<usize> {
    let digits = file_name.strip_prefix(base_name)?.strip_prefix("_part")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Delete the `<path>_part<n>` files next to `path`
pub fn remove_split_parts(path: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(base_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return Ok(Vec::new());
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut removed = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_part = part_number(&entry.file_name().to_string_lossy(), &base_name).is_some();
        if is_part && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed.push(entry.path());
        }
    }
    Ok(removed)
}

/// Cut a file into consecutive chunks of at most `chunk_size` bytes
///
/// Chunks are plain byte ranges; they are not meant to be valid documents
/// on their own. The source file is left untouched.
pub fn split_file_by_bytes(path: &Path, chunk_size: u64) -> io::Result<Vec<PathBuf>> {
    if chunk_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "chunk size must be greater than zero",
        ));
    }

    let mut source = File::open(path)?;
    let mut buffer = Vec::with_capacity(chunk_size.min(8 * 1024 * 1024) as usize);
    let mut parts = Vec::new();

    loop {
        buffer.clear();
        (&mut source).take(chunk_size).read_to_end(&mut buffer)?;
        if buffer.is_empty() {
            break;
        }

        let part = part_path(path, parts.len() + 1);
        let mut out = BufWriter::new(File::create(&part)?);
        out.write_all(&buffer)?;
        out.flush()?;
        parts.push(part);
    }

    Ok(parts)
}

/// Author recorded in the document when none is configured
pub fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
