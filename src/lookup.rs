use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::{debug, info, warn};

use crate::error::{FlowTagError, Result};
use crate::models::LookupKey;

pub const PORT_COLUMN: &str = "dstport";
pub const PROTOCOL_COLUMN: &str = "protocol";
pub const TAG_COLUMN: &str = "tag";

/// Read-only mapping from (destination port, protocol) to tag.
///
/// Stored protocol-first so lookups by borrowed `&str` need no allocation.
#[derive(Debug, Clone, Default)]
pub struct LookupTable {
    entries: HashMap<String, HashMap<String, String>>,
    len: usize,
    skipped_rows: usize,
}

struct Columns {
    port: usize,
    protocol: usize,
    tag: usize,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        let find = |name: &'static str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or(FlowTagError::MissingColumn(name))
        };
        Ok(Columns {
            port: find(PORT_COLUMN)?,
            protocol: find(PROTOCOL_COLUMN)?,
            tag: find(TAG_COLUMN)?,
        })
    }
}

impl LookupTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FlowTagError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let table = Self::from_reader(file)?;
        info!(
            "Loaded {} lookup entries from {} ({} rows skipped)",
            table.len(),
            path.display(),
            table.skipped_rows
        );
        Ok(table)
    }

    /// Rows are applied in source order, so a repeated key keeps the last tag.
    /// Rows missing a required cell, or with a blank tag, are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let columns = Columns::locate(rdr.headers()?)?;
        let mut table = LookupTable::default();

        for result in rdr.records() {
            let record = result?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let (port, protocol, tag) = match (
                record.get(columns.port),
                record.get(columns.protocol),
                record.get(columns.tag),
            ) {
                (Some(port), Some(protocol), Some(tag)) => (port, protocol, tag),
                _ => {
                    warn!("Skipping lookup row at line {}: missing required field", line);
                    table.skipped_rows += 1;
                    continue;
                }
            };

            if tag.trim().is_empty() {
                warn!("Skipping lookup row at line {}: blank tag", line);
                table.skipped_rows += 1;
                continue;
            }

            table.insert(LookupKey::new(port, protocol), tag.to_string());
        }

        Ok(table)
    }

    fn insert(&mut self, key: LookupKey, tag: String) {
        let LookupKey { port, protocol } = key;
        let ports = self.entries.entry(protocol.clone()).or_default();
        match ports.insert(port.clone(), tag) {
            Some(previous) => {
                debug!("Lookup entry {},{} overwritten (was {})", port, protocol, previous);
            }
            None => self.len += 1,
        }
    }

    /// `protocol` must already be lowercase, as produced by the classifier.
    pub fn get(&self, port: &str, protocol: &str) -> Option<&str> {
        self.entries
            .get(protocol)
            .and_then(|ports| ports.get(port))
            .map(String::as_str)
    }

    pub fn get_key(&self, key: &LookupKey) -> Option<&str> {
        self.get(&key.port, &key.protocol)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

impl FromIterator<(LookupKey, String)> for LookupTable {
    fn from_iter<I: IntoIterator<Item = (LookupKey, String)>>(iter: I) -> Self {
        let mut table = LookupTable::default();
        for (key, tag) in iter {
            table.insert(key, tag);
        }
        table
    }
}
