//! Versioned on-disk timeline documents.
//!
//! A document is a JSON object `{ "version", "writer", "timeline" }`. Older
//! layouts are upgraded one step at a time by the `UPGRADES` table before the
//! item tree is parsed.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use montage_core::{MontageError, Result};
use serde::Serialize;
use serde_json::{json, Value};

use crate::item::Item;

/// Layout version written by this build.
pub const FILE_VERSION: u32 = 1;

/// One upgrade step per historical version; entry `n` lifts `n` to `n + 1`.
const UPGRADES: &[fn(Value) -> Value] = &[wrap_bare_tree];

/// An item tree together with the version header it is stored under.
#[derive(Debug, Serialize)]
pub struct TimelineFile {
    pub version: u32,
    /// Name and version of the program that produced the document.
    pub writer: String,
    pub timeline: Item,
}

impl TimelineFile {
    pub fn new(timeline: Item) -> Self {
        Self {
            version: FILE_VERSION,
            writer: concat!("montage ", env!("CARGO_PKG_VERSION")).to_string(),
            timeline,
        }
    }

    /// Encode as pretty-printed JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| MontageError::Serialization(format!("encoding timeline: {}", e)))
    }

    /// Decode a document of any supported version.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let doc: Value = serde_json::from_slice(data)
            .map_err(|e| MontageError::Serialization(format!("not a JSON document: {}", e)))?;
        Self::from_value(doc)
    }

    fn from_value(doc: Value) -> Result<Self> {
        let found = stored_version(&doc);
        if found > FILE_VERSION {
            return Err(MontageError::Serialization(format!(
                "document version {} is newer than {}",
                found, FILE_VERSION
            )));
        }

        let mut doc = UPGRADES[found as usize..]
            .iter()
            .fold(doc, |doc, upgrade| upgrade(doc));

        let tree = doc
            .get("timeline")
            .ok_or_else(|| MontageError::MalformedItem("document has no timeline".into()))?;
        let timeline = Item::from_json(tree)?;
        let writer = match doc.get_mut("writer").map(Value::take) {
            Some(Value::String(writer)) => writer,
            _ => String::new(),
        };

        Ok(Self {
            version: FILE_VERSION,
            writer,
            timeline,
        })
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self)
            .map_err(|e| MontageError::Serialization(format!("encoding timeline: {}", e)))?;
        out.flush()?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let doc: Value = serde_json::from_reader(reader)
            .map_err(|e| MontageError::Serialization(format!("not a JSON document: {}", e)))?;
        Self::from_value(doc)
    }
}

/// Documents without a header are version 0.
fn stored_version(doc: &Value) -> u32 {
    doc.get("version")
        .and_then(Value::as_u64)
        .map_or(0, |v| u32::try_from(v).unwrap_or(u32::MAX))
}

/// Version 0 stored the bare item tree as the whole document.
fn wrap_bare_tree(tree: Value) -> Value {
    json!({ "version": 1, "writer": "", "timeline": tree })
}
