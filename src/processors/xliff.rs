//! XLIFF 1.2 documents
//!
//! A [`Document`] keeps the verbatim bytes it was loaded from. Rendering
//! re-streams those bytes and only rewrites the `<target>` of units that were
//! changed, so headers, notes, comments, attributes and whitespace survive
//! untouched.

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::{Path, PathBuf};

use crate::core::errors::{Result, TranslationError};
use crate::core::models::{TranslationUnit, STATE_TRANSLATED};

/// Declaration the rewritten file must start with
pub const XML_DECLARATION_PREFIX: &[u8] = b"<?xml";

/// How far into the file the declaration is searched for
const DECLARATION_WINDOW: usize = 100;

const UNIT_TAG: &[u8] = b"trans-unit";
const SOURCE_TAG: &[u8] = b"source";
const TARGET_TAG: &[u8] = b"target";

/// An XLIFF file loaded into memory
#[derive(Debug, Clone)]
pub struct Document {
    path: PathBuf,
    backup: Vec<u8>,
    units: Vec<TranslationUnit>,
}

impl Document {
    /// Read and parse a document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| TranslationError::FileError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Parse a document; `bytes` become the rollback backup
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Result<Self> {
        let units = parse_units(&bytes)?;
        Ok(Self {
            path: path.into(),
            backup: bytes,
            units,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used in reports and error records
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Bytes captured before any mutation
    pub fn backup(&self) -> &[u8] {
        &self.backup
    }

    pub fn units(&self) -> &[TranslationUnit] {
        &self.units
    }

    /// Units in document order; edits show up in the next [`Document::render`]
    pub fn units_mut(&mut self) -> &mut [TranslationUnit] {
        &mut self.units
    }

    pub fn is_modified(&self) -> bool {
        self.units.iter().any(|u| u.is_modified())
    }

    /// Serialize the document with all unit changes applied
    pub fn render(&self) -> Result<Vec<u8>> {
        render_units(&self.backup, &self.units)
    }

    /// Make `bytes` the new baseline after a verified write
    pub(crate) fn commit(&mut self, bytes: Vec<u8>) {
        self.backup = bytes;
        for unit in &mut self.units {
            unit.modified = false;
            unit.target_element = unit.target_text.is_some();
        }
    }
}

/// Check that written bytes are a well-formed document with the expected units
pub fn verify_document(bytes: &[u8], expected_units: usize) -> Result<()> {
    let window = &bytes[..bytes.len().min(DECLARATION_WINDOW)];
    if !window
        .windows(XML_DECLARATION_PREFIX.len())
        .any(|w| w == XML_DECLARATION_PREFIX)
    {
        return Err(TranslationError::InvalidFormat {
            message: "missing XML declaration".to_string(),
        });
    }

    let units = parse_units(bytes)?;
    if units.len() != expected_units {
        return Err(TranslationError::InvalidFormat {
            message: format!(
                "expected {} translation units, found {}",
                expected_units,
                units.len()
            ),
        });
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    None,
    Source,
    Target,
}

#[derive(Debug, Default)]
struct PendingUnit {
    id: String,
    source: Option<String>,
    target: Option<String>,
    state: Option<String>,
}

impl PendingUnit {
    fn expect_single_target(&self) -> Result<()> {
        match self.target {
            Some(_) => Err(invalid(format!("trans-unit {} has more than one target", self.id))),
            None => Ok(()),
        }
    }

    fn finish(self) -> TranslationUnit {
        let unit = TranslationUnit::new(self.id, self.source.unwrap_or_default());
        match self.target {
            Some(target) => unit.with_target(target, self.state.as_deref()),
            None => unit,
        }
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn invalid(message: impl Into<String>) -> TranslationError {
    TranslationError::InvalidFormat {
        message: message.into(),
    }
}

/// Parse every `<trans-unit>` in document order.
///
/// Only `<source>`/`<target>` that are direct children of the unit count;
/// inline markup inside them contributes its text.
pub fn parse_units(bytes: &[u8]) -> Result<Vec<TranslationUnit>> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut units = Vec::new();

    let mut pending: Option<PendingUnit> = None;
    let mut depth = 0usize;
    let mut capture = Capture::None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Eof => break,
            Event::Start(e) => {
                let local = e.local_name();
                match pending.as_mut() {
                    None if local.as_ref() == UNIT_TAG => {
                        pending = Some(PendingUnit {
                            id: attribute(&e, b"id")?.unwrap_or_default(),
                            ..Default::default()
                        });
                        depth = 0;
                    }
                    Some(unit) => {
                        if depth == 0 && local.as_ref() == SOURCE_TAG {
                            capture = Capture::Source;
                            text.clear();
                        } else if depth == 0 && local.as_ref() == TARGET_TAG {
                            unit.expect_single_target()?;
                            capture = Capture::Target;
                            unit.state = attribute(&e, b"state")?;
                            text.clear();
                        }
                        depth += 1;
                    }
                    None => {}
                }
            }
            Event::Empty(e) => {
                let local = e.local_name();
                match pending.as_mut() {
                    None if local.as_ref() == UNIT_TAG => {
                        let id = attribute(&e, b"id")?.unwrap_or_default();
                        units.push(PendingUnit { id, ..Default::default() }.finish());
                    }
                    Some(unit) if depth == 0 => {
                        if local.as_ref() == SOURCE_TAG {
                            unit.source = Some(String::new());
                        } else if local.as_ref() == TARGET_TAG {
                            unit.expect_single_target()?;
                            unit.state = attribute(&e, b"state")?;
                            unit.target = Some(String::new());
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) if capture != Capture::None => {
                text.push_str(&t.unescape()?);
            }
            Event::CData(c) if capture != Capture::None => {
                let content = std::str::from_utf8(&c).map_err(|e| invalid(e.to_string()))?;
                text.push_str(content);
            }
            Event::End(e) if pending.is_some() => {
                if depth == 0 {
                    if let Some(done) = pending.take() {
                        units.push(done.finish());
                    }
                } else {
                    depth -= 1;
                    if let (0, Some(unit)) = (depth, pending.as_mut()) {
                        match (capture, e.local_name().as_ref()) {
                            (Capture::Source, SOURCE_TAG) => {
                                unit.source = Some(std::mem::take(&mut text));
                                capture = Capture::None;
                            }
                            (Capture::Target, TARGET_TAG) => {
                                unit.target = Some(std::mem::take(&mut text));
                                capture = Capture::None;
                            }
                            _ => {}
                        }
                    }
                }
            }
            _ => {}
        }
        buf.clear();
    }

    if pending.is_some() {
        return Err(invalid("unterminated trans-unit"));
    }

    Ok(units)
}

fn state_attr(unit: &TranslationUnit) -> &'static str {
    unit.state.as_attr().unwrap_or(STATE_TRANSLATED)
}

/// `<target ... state="...">` carrying over every other attribute
fn target_start<'a>(name: &str, original: Option<&BytesStart>, state: &str) -> BytesStart<'a> {
    let mut start = BytesStart::new(name.to_string());
    if let Some(original) = original {
        for attr in original.attributes().flatten() {
            if attr.key.local_name().as_ref() != b"state" {
                start.push_attribute(attr);
            }
        }
    }
    start.push_attribute(("state", state));
    start
}

/// Target content with only `<`, `>` and `&` escaped; quotes stay literal
fn target_text(unit: &TranslationUnit) -> BytesText<'_> {
    BytesText::from_escaped(partial_escape(unit.target_text.as_deref().unwrap_or_default()))
}

fn write_target<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    original: Option<&BytesStart>,
    unit: &TranslationUnit,
) -> Result<()> {
    writer.write_event(Event::Start(target_start(name, original, state_attr(unit))))?;
    writer.write_event(Event::Text(target_text(unit)))?;
    writer.write_event(Event::End(BytesEnd::new(name.to_string())))?;
    Ok(())
}

/// Re-stream `original`, rewriting the targets of modified units
pub fn render_units(original: &[u8], units: &[TranslationUnit]) -> Result<Vec<u8>> {
    let mut reader = Reader::from_reader(original);
    let mut writer = Writer::new(Vec::with_capacity(original.len() + 256));
    let mut buf = Vec::new();

    let mut next_unit = 0usize;
    let mut in_unit = false;
    let mut current: Option<&TranslationUnit> = None;
    let mut depth = 0usize;
    let mut last_ws = String::new();
    let mut source_indent = String::new();
    let mut skipping_target = false;
    let mut skip_depth = 0usize;
    let mut first_event = true;

    loop {
        let event = reader.read_event_into(&mut buf)?;

        if first_event {
            first_event = false;
            if !matches!(event, Event::Decl(_) | Event::Eof) {
                writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
                writer.write_event(Event::Text(BytesText::new("\n")))?;
            }
        }

        if skipping_target {
            match event {
                Event::Start(_) => skip_depth += 1,
                Event::End(e) if skip_depth == 0 => {
                    writer.write_event(Event::End(e.into_owned()))?;
                    skipping_target = false;
                    depth -= 1;
                }
                Event::End(_) => skip_depth -= 1,
                Event::Eof => return Err(invalid("unterminated target")),
                _ => {}
            }
            buf.clear();
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Start(e) if !in_unit && e.local_name().as_ref() == UNIT_TAG => {
                current = units.get(next_unit).filter(|u| u.is_modified());
                next_unit += 1;
                in_unit = true;
                depth = 0;
                last_ws.clear();
                writer.write_event(Event::Start(e))?;
            }
            Event::Empty(e) if !in_unit && e.local_name().as_ref() == UNIT_TAG => {
                next_unit += 1;
                writer.write_event(Event::Empty(e))?;
            }
            Event::Start(e) if in_unit && depth == 0 && e.local_name().as_ref() == TARGET_TAG && current.is_some() => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(unit) = current {
                    let state = state_attr(unit);
                    writer.write_event(Event::Start(target_start(&name, Some(&e), state)))?;
                    writer.write_event(Event::Text(target_text(unit)))?;
                }
                skipping_target = true;
                skip_depth = 0;
                depth += 1;
            }
            Event::Empty(e) if in_unit && depth == 0 && e.local_name().as_ref() == TARGET_TAG && current.is_some() => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if let Some(unit) = current {
                    write_target(&mut writer, &name, Some(&e), unit)?;
                }
            }
            Event::Start(e) => {
                if in_unit {
                    if depth == 0 && e.local_name().as_ref() == SOURCE_TAG {
                        source_indent = std::mem::take(&mut last_ws);
                    }
                    depth += 1;
                }
                writer.write_event(Event::Start(e))?;
            }
            Event::End(e) => {
                let mut insert_target = None;
                if in_unit {
                    if depth == 0 {
                        in_unit = false;
                        current = None;
                    } else {
                        depth -= 1;
                        if depth == 0 && e.local_name().as_ref() == SOURCE_TAG {
                            insert_target = current.filter(|u| !u.target_element);
                        }
                    }
                }

                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                writer.write_event(Event::End(e))?;

                if let Some(unit) = insert_target {
                    // "source" -> "target", keeping any namespace prefix
                    let target_name = format!("{}target", &name[..name.len() - SOURCE_TAG.len()]);
                    if !source_indent.is_empty() {
                        writer.write_event(Event::Text(BytesText::from_escaped(source_indent.clone())))?;
                    }
                    write_target(&mut writer, &target_name, None, unit)?;
                }
            }
            Event::Text(t) => {
                if in_unit && depth == 0 {
                    let raw = String::from_utf8_lossy(&t).into_owned();
                    if raw.trim().is_empty() {
                        last_ws = raw;
                    }
                }
                writer.write_event(Event::Text(t))?;
            }
            other => writer.write_event(other)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}
