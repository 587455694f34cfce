/*!
 * File classification: size, encoding, MIME type and text/binary verdict
 */

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

use crate::types::FileKind;

/// Bytes inspected when guessing the encoding
pub const DETECTION_SAMPLE: u64 = 1024 * 1024;

/// Encodings whose files count as text regardless of MIME type
const TEXT_ENCODINGS: &[&str] = &["ascii", "utf-8"];

/// Everything known about a file before its content is embedded
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    /// Absolute path
    pub path: PathBuf,
    /// File name
    pub name: String,
    /// Forward-slash path relative to the scan root, used in markers
    pub relative: String,
    /// Size in bytes
    pub size: u64,
    /// Detected encoding (lowercase label), None for binary content
    pub encoding: Option<String>,
    /// A byte-order mark was found
    pub bom: bool,
    /// MIME type guessed from the extension
    pub mime: Option<String>,
    /// Text/binary verdict
    pub is_text: bool,
}

/// What ends up as the payload of a `File` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    /// Decoded text
    Text(String),
    /// Marker standing in for binary content
    Binary(String),
    /// Marker describing a read or decode failure
    Unreadable(String),
}

impl FileContent {
    pub fn kind(&self) -> FileKind {
        match self {
            FileContent::Text(_) => FileKind::Text,
            FileContent::Binary(_) => FileKind::Binary,
            FileContent::Unreadable(_) => FileKind::Unreadable,
        }
    }

    pub fn into_payload(self) -> String {
        match self {
            FileContent::Text(s) | FileContent::Binary(s) | FileContent::Unreadable(s) => s,
        }
    }
}

/// Result of sniffing the leading bytes of a file
#[derive(Debug, Clone, PartialEq, Eq)]
struct Detection {
    encoding: Option<String>,
    bom: bool,
}

/// Stat and sniff a file
///
/// Fails only when the file cannot be inspected at all (vanished, no
/// permission); the caller turns that into a marker.
pub fn classify(path: &Path, relative: &str) -> io::Result<FileDescriptor> {
    let metadata = fs::metadata(path)?;
    let size = metadata.len();

    let sample = read_sample(path, DETECTION_SAMPLE)?;
    let detection = detect_encoding(&sample, size);

    let mime = mime_guess::from_path(path)
        .first()
        .map(|m| m.essence_str().to_string());
    let is_text = is_text(mime.as_deref(), detection.encoding.as_deref());

    Ok(FileDescriptor {
        path: path.to_path_buf(),
        name: path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string(),
        relative: relative.to_string(),
        size,
        encoding: detection.encoding,
        bom: detection.bom,
        mime,
        is_text,
    })
}

/// Text if the MIME major type is `text` or the encoding is whitelisted
pub fn is_text(mime: Option<&str>, encoding: Option<&str>) -> bool {
    let text_mime = mime
        .and_then(|m| m.split('/').next())
        .is_some_and(|major| major.eq_ignore_ascii_case("text"));
    text_mime || encoding.is_some_and(|e| TEXT_ENCODINGS.contains(&e))
}

fn read_sample(path: &Path, limit: u64) -> io::Result<Vec<u8>> {
    let mut sample = Vec::new();
    File::open(path)?.take(limit).read_to_end(&mut sample)?;
    Ok(sample)
}

fn detect_encoding(sample: &[u8], total_size: u64) -> Detection {
    let found = |label: &str| Detection {
        encoding: Some(label.to_string()),
        bom: false,
    };

    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return Detection {
            encoding: Some(encoding.name().to_ascii_lowercase()),
            bom: true,
        };
    }
    if sample.is_empty() {
        return found("utf-8");
    }
    if sample.contains(&0) {
        return Detection {
            encoding: None,
            bom: false,
        };
    }
    if sample.is_ascii() {
        return found("ascii");
    }

    let truncated = (sample.len() as u64) < total_size;
    match std::str::from_utf8(sample) {
        Ok(_) => return found("utf-8"),
        // a multi-byte sequence cut by the sample boundary
        Err(e) if truncated && e.error_len().is_none() => return found("utf-8"),
        Err(_) => {}
    }

    let mut detector = EncodingDetector::new();
    detector.feed(sample, !truncated);
    found(&detector.guess(None, true).name().to_ascii_lowercase())
}

impl FileDescriptor {
    /// Produce the payload for this file
    ///
    /// Binary files are never read; text files are read whole and decoded
    /// strictly with the detected encoding.
    pub fn read(&self) -> FileContent {
        if !self.is_text {
            return FileContent::Binary(self.binary_marker());
        }

        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) => return FileContent::Unreadable(self.error_marker(&e.to_string())),
        };

        match self.decode(&bytes) {
            Ok(text) => FileContent::Text(text),
            Err(reason) => FileContent::Unreadable(self.error_marker(&reason)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        let (encoding, body) = match Encoding::for_bom(bytes) {
            Some((encoding, bom_len)) if self.bom => (encoding, &bytes[bom_len..]),
            _ => match self.decoder() {
                Some(encoding) => (encoding, bytes),
                None => return Err("NUL bytes without a known text encoding".to_string()),
            },
        };

        encoding
            .decode_without_bom_handling_and_without_replacement(body)
            .map(Cow::into_owned)
            .ok_or_else(|| format!("invalid {} byte sequence", encoding.name()))
    }

    /// None when sniffing found NUL bytes and no encoding
    fn decoder(&self) -> Option<&'static Encoding> {
        match self.encoding.as_deref() {
            None => None,
            Some("ascii") | Some("utf-8") => Some(UTF_8),
            Some(label) => Some(Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8)),
        }
    }

    /// Marker embedded in place of binary content
    pub fn binary_marker(&self) -> String {
        format!(
            "File binario: [MIME: {}, Encoding: {}] {}",
            self.mime.as_deref().unwrap_or("unknown"),
            self.encoding.as_deref().unwrap_or("unknown"),
            self.relative
        )
    }

    /// Marker embedded when the file could not be read
    pub fn error_marker(&self, reason: &str) -> String {
        error_marker(reason, &self.relative)
    }
}

/// Marker for a file that failed before or during reading
pub fn error_marker(reason: &str, relative: &str) -> String {
    format!("Errore [{}] - lettura file: {}", reason, relative)
}
