//! Parser for the verbose key/value listing output of the external tools.
//!
//! `7z l -slt` prints one block per archive member, blocks separated by
//! blank lines, each block a series of `Key = Value` lines. The parser
//! folds that flat dump into a directory hierarchy with deterministic
//! sibling ordering plus aggregate statistics. Field presence varies by
//! platform and archive format, so every field except `Path` is optional
//! and survives as free-form text on the node it belongs to.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

/// One parsed key/value record from the listing output, keyed by field
/// name. One record corresponds to one archive member.
pub type RawEntry = BTreeMap<String, String>;

/// A directory in the reconstructed hierarchy. `children` is always
/// present, possibly empty, and ordered directories-first then by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DirectoryNode {
    pub name: String,
    #[serde(flatten)]
    pub fields: RawEntry,
    pub children: Vec<ArchiveEntryNode>,
}

/// A file in the reconstructed hierarchy. Files never carry children.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileNode {
    pub name: String,
    #[serde(flatten)]
    pub fields: RawEntry,
}

/// A node in the reconstructed archive tree. The variant is the
/// directory/file distinction; serialized form is told apart by the
/// presence of the `children` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ArchiveEntryNode {
    Directory(DirectoryNode),
    File(FileNode),
}

impl ArchiveEntryNode {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory(dir) => &dir.name,
            Self::File(file) => &file.name,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Child nodes for directories, `None` for files.
    pub fn children(&self) -> Option<&[ArchiveEntryNode]> {
        match self {
            Self::Directory(dir) => Some(&dir.children),
            Self::File(_) => None,
        }
    }

    /// All listing fields reported for this node, minus `Path`.
    pub fn fields(&self) -> &RawEntry {
        match self {
            Self::Directory(dir) => &dir.fields,
            Self::File(file) => &file.fields,
        }
    }

    /// Declared size in bytes, when present and numeric.
    pub fn size(&self) -> Option<u64> {
        self.fields().get("Size").and_then(|value| value.parse().ok())
    }
}

/// Aggregate outcome of a listing call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingResult {
    /// Top-level nodes of the reconstructed hierarchy.
    pub entries: Vec<ArchiveEntryNode>,
    /// Count of every record the tool reported, directories included.
    pub total_files: u64,
    /// Sum of declared entry sizes in bytes; unparsable sizes count as 0
    /// and the sum saturates instead of wrapping.
    pub total_size: u64,
    /// True when any entry reports `Encrypted = +`.
    pub is_protected: bool,
}

/// Parse raw listing output into a [`ListingResult`].
///
/// The parser is total: malformed blocks are dropped rather than reported,
/// and an input with no usable blocks yields an empty result.
pub fn parse_listing(raw_output: &str) -> ListingResult {
    let records = collect_raw_entries(raw_output);

    let total_files = records.len() as u64;
    let total_size = records
        .iter()
        .map(|entry| entry.get("Size").and_then(|size| size.parse::<u64>().ok()).unwrap_or(0))
        .fold(0, u64::saturating_add);
    let is_protected = records
        .iter()
        .any(|entry| entry.get("Encrypted").map(String::as_str) == Some("+"));

    let root = build_hierarchy(&records);
    ListingResult {
        entries: flatten_children(root.children),
        total_files,
        total_size,
        is_protected,
    }
}

/// Split the output into blank-line-delimited blocks and each block into
/// `Key = Value` fields. Values may themselves contain `=`, so only the
/// first occurrence separates. Blocks without a `Path` field are banner or
/// summary text, not members, and are dropped.
fn collect_raw_entries(raw_output: &str) -> Vec<RawEntry> {
    let mut records = Vec::new();
    let mut block = RawEntry::new();
    for line in raw_output.lines() {
        if line.trim().is_empty() {
            finish_block(&mut block, &mut records);
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            block.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    finish_block(&mut block, &mut records);
    records
}

fn finish_block(block: &mut RawEntry, records: &mut Vec<RawEntry>) {
    if block.is_empty() {
        return;
    }
    let record = std::mem::take(block);
    if record.contains_key("Path") {
        records.push(record);
    }
}

/// Mutable node used while the hierarchy is accumulated. Directories and
/// files share this shape until flattening fixes the distinction.
#[derive(Default)]
struct NodeBuilder {
    is_directory: bool,
    fields: RawEntry,
    children: BTreeMap<String, NodeBuilder>,
}

/// Walk each record's `/`-separated path from a synthetic root, creating
/// missing nodes along the way.
///
/// A node is classified as a directory when it is an intermediate path
/// component, or when its record says `Folder = +` or `Attributes = D...`.
/// A record's fields attach to the final path segment, and only when that
/// walk is what created the node: revisiting an existing node descends
/// without touching it, so the first record for a given path wins.
fn build_hierarchy(records: &[RawEntry]) -> NodeBuilder {
    let mut root = NodeBuilder { is_directory: true, ..NodeBuilder::default() };
    for record in records {
        let Some(path) = record.get("Path") else { continue };
        let segments: Vec<&str> = path.split('/').filter(|segment| !segment.is_empty()).collect();
        if segments.is_empty() {
            continue;
        }
        let last = segments.len() - 1;
        let mut node = &mut root;
        for (index, segment) in segments.iter().enumerate() {
            let is_last = index == last;
            node = node.children.entry((*segment).to_string()).or_insert_with(|| {
                let mut child = NodeBuilder {
                    is_directory: !is_last || is_directory_record(record),
                    ..NodeBuilder::default()
                };
                if is_last {
                    child.fields = record.clone();
                    child.fields.remove("Path");
                }
                child
            });
        }
    }
    root
}

fn is_directory_record(record: &RawEntry) -> bool {
    if record.get("Folder").map(String::as_str) == Some("+") {
        return true;
    }
    record.get("Attributes").is_some_and(|attrs| attrs.starts_with('D'))
}

/// Convert accumulated children into ordered output nodes: directories
/// before files, then by name. Children a file node accumulated through
/// inconsistent tool output are dropped rather than emitted.
fn flatten_children(children: BTreeMap<String, NodeBuilder>) -> Vec<ArchiveEntryNode> {
    let mut nodes: Vec<ArchiveEntryNode> = children
        .into_iter()
        .map(|(name, builder)| {
            if builder.is_directory {
                ArchiveEntryNode::Directory(DirectoryNode {
                    name,
                    fields: builder.fields,
                    children: flatten_children(builder.children),
                })
            } else {
                ArchiveEntryNode::File(FileNode { name, fields: builder.fields })
            }
        })
        .collect();
    nodes.sort_by(|a, b| {
        b.is_directory()
            .cmp(&a.is_directory())
            .then_with(|| compare_entry_names(a.name(), b.name()))
    });
    nodes
}

/// Case-insensitive name ordering with a case-sensitive tiebreak, so trees
/// render identically across platforms and locales.
pub(crate) fn compare_entry_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}
