/*!
 * XML writer implementation for fs2dad
 *
 * Rendering is a plain recursive descent over [`DocumentNode`]:
 * opening tag, payload, children, closing tag. Payloads are embedded
 * verbatim unless sanitizing is enabled.
 */

use std::borrow::Cow;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use tempfile::Builder;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, WriteResultExt};
use crate::types::DocumentNode;
use crate::utils::{remove_split_parts, split_file_by_bytes};

/// Indent used when `indent_content` is enabled
pub const DEFAULT_INDENT: &str = "  ";

/// Whole-line documentation comments (`/// ...`)
static DOC_COMMENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*///[^\n]*\n?").expect("doc comment regex is valid"));

/// Formatting options for rendering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Indent unit; empty renders a compact document without newlines
    pub indent: String,
    /// Escape markup and neutralize control characters in payloads
    pub sanitize: bool,
    /// Drop `///` comment lines from payloads
    pub remove_comments: bool,
}

impl RenderOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            indent: if config.indent_content {
                DEFAULT_INDENT.to_string()
            } else {
                String::new()
            },
            sanitize: config.sanitize,
            remove_comments: config.remove_comments,
        }
    }

    fn is_indented(&self) -> bool {
        !self.indent.is_empty()
    }
}

/// What a successful write produced
#[derive(Debug, Clone)]
pub struct WriteSummary {
    /// The complete document
    pub path: PathBuf,
    /// Size of the complete document
    pub bytes_written: u64,
    /// Byte chunks written next to the document, if splitting applied
    pub parts: Vec<PathBuf>,
}

/// XML writer for the document tree
pub struct XmlWriter {
    options: RenderOptions,
    /// Split threshold in bytes, 0 disables splitting
    split_size: u64,
}

impl XmlWriter {
    /// Create a new XML writer
    pub fn new(options: RenderOptions, split_size: u64) -> Self {
        Self {
            options,
            split_size,
        }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render one element and its subtree
    pub fn render(&self, node: &DocumentNode) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_node(node, &mut writer, 0)?;
        Ok(into_string(writer.into_inner())?)
    }

    /// Render a full document: declaration followed by the root element
    pub fn render_document(&self, root: &DocumentNode) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.write_document(root, &mut writer)?;
        Ok(into_string(writer.into_inner())?)
    }

    /// Write the document to `output`, then split it if configured
    ///
    /// The document is written to a temporary file in the destination
    /// directory and moved into place only once complete.
    pub fn write(&self, root: &DocumentNode, output: &Path) -> Result<WriteSummary> {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        // An existing document keeps its mode; a new one gets the umask default
        let existing = fs::metadata(output).ok().map(|m| m.permissions());
        let mut builder = Builder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o666));
        }

        let mut temp = builder.tempfile_in(dir).for_output(output)?;
        {
            let mut writer = Writer::new(BufWriter::new(temp.as_file_mut()));
            self.write_document(root, &mut writer).for_output(output)?;
            writer.into_inner().flush().for_output(output)?;
        }

        let file = temp
            .persist(output)
            .map_err(|e| e.error)
            .for_output(output)?;
        if let Some(permissions) = existing {
            file.set_permissions(permissions).for_output(output)?;
        }
        let bytes_written = file.metadata().for_output(output)?.len();
        info!(path = %output.display(), bytes = bytes_written, "document written");

        let stale = remove_split_parts(output).for_output(output)?;
        if !stale.is_empty() {
            debug!(removed = stale.len(), "old split parts removed");
        }

        let parts = if self.split_size > 0 && bytes_written > self.split_size {
            let parts = split_file_by_bytes(output, self.split_size).for_output(output)?;
            debug!(parts = parts.len(), chunk = self.split_size, "document split");
            parts
        } else {
            Vec::new()
        };

        Ok(WriteSummary {
            path: output.to_path_buf(),
            bytes_written,
            parts,
        })
    }

    fn write_document<W: Write>(
        &self,
        root: &DocumentNode,
        writer: &mut Writer<W>,
    ) -> io::Result<()> {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        if self.options.is_indented() {
            write_raw(writer, "\n")?;
        }
        self.write_node(root, writer, 0)
    }

    fn write_node<W: Write>(
        &self,
        node: &DocumentNode,
        writer: &mut Writer<W>,
        level: usize,
    ) -> io::Result<()> {
        let indented = self.options.is_indented();
        let indent = self.options.indent.repeat(level);

        let mut start = BytesStart::new(node.tag.as_str());
        for attribute in node.attributes() {
            start.push_attribute(attribute);
        }

        let payload = node
            .text()
            .map(|text| self.prepare_payload(text))
            .filter(|text| !text.is_empty());

        write_raw(writer, &indent)?;
        if payload.is_none() && node.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }
        writer.write_event(Event::Start(start))?;

        if let Some(text) = payload {
            if indented {
                let inner = self.options.indent.repeat(level + 1);
                let lines: Vec<String> = text
                    .lines()
                    .map(|line| format!("{inner}{line}"))
                    .collect();
                write_raw(writer, "\n")?;
                write_raw(writer, &lines.join("\n"))?;
            } else {
                write_raw(writer, &text)?;
            }
        }

        for child in &node.children {
            if indented {
                write_raw(writer, "\n")?;
            }
            self.write_node(child, writer, level + 1)?;
        }

        if indented {
            write_raw(writer, "\n")?;
            write_raw(writer, &indent)?;
        }
        writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))
    }

    fn prepare_payload<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let text = if self.options.remove_comments {
            remove_doc_comments(text)
        } else {
            Cow::Borrowed(text)
        };
        if !self.options.sanitize {
            return text;
        }
        match text {
            Cow::Borrowed(text) => sanitize(text),
            Cow::Owned(text) => Cow::Owned(sanitize(&text).into_owned()),
        }
    }
}

/// Text is already in its final form; the writer must not touch it
fn write_raw<W: Write>(writer: &mut Writer<W>, text: &str) -> io::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    writer.write_event(Event::Text(BytesText::from_escaped(text)))
}

fn into_string(bytes: Vec<u8>) -> io::Result<String> {
    String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Make arbitrary text safe as XML character data
///
/// Control characters XML 1.0 cannot carry become `[0xNN]`; tab, newline
/// and carriage return pass through. `&`, `<` and `>` are escaped, which
/// also turns any `]]>` into `]]&gt;`.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    match replace_control_chars(text) {
        Cow::Borrowed(text) => partial_escape(text),
        Cow::Owned(text) => Cow::Owned(partial_escape(text.as_str()).into_owned()),
    }
}

fn is_forbidden_char(c: char) -> bool {
    matches!(
        c,
        '\u{0}'..='\u{8}' | '\u{B}' | '\u{C}' | '\u{E}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}'
    )
}

fn replace_control_chars(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_forbidden_char) {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if is_forbidden_char(c) {
            out.push_str(&format!("[0x{:02X}]", c as u32));
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Drop every line whose first non-blank characters are `///`
pub fn remove_doc_comments(text: &str) -> Cow<'_, str> {
    DOC_COMMENT_LINE.replace_all(text, "")
}
