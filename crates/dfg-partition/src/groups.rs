use std::collections::BTreeMap;
use std::num::ParseIntError;

use common::dfg::Dfg;
use petgraph::graph::NodeIndex;
use thiserror::Error;
use tracing::debug;

/// Separates the access kind from the group id in a vertex label, e.g. `load;3`.
pub const GROUP_DELIMITER: char = ';';

const LOAD_MARKERS: [&str; 2] = ["load", "LOD"];
const STORE_MARKERS: [&str; 2] = ["store", "STR"];

/// Memory access role of a vertex.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum AccessKind {
    /// Reads from memory, counted against the read side of the transaction limit.
    Load,
    /// Writes to memory, counted against the write side of the transaction limit.
    Store,
}

impl AccessKind {
    /// Classify a label. Load markers take precedence over store markers.
    pub fn classify(label: &str) -> Option<Self> {
        if LOAD_MARKERS.iter().any(|m| label.contains(m)) {
            Some(AccessKind::Load)
        } else if STORE_MARKERS.iter().any(|m| label.contains(m)) {
            Some(AccessKind::Store)
        } else {
            None
        }
    }
}

/// A memory-access label could not be split into kind and group id.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LabelParseError {
    /// The label has a load or store marker but no group delimiter.
    #[error("vertex {vertex}: label {label:?} marks a memory access but has no ';' group delimiter")]
    MissingDelimiter {
        /// Vertex id.
        vertex: usize,
        /// Offending label.
        label: String,
    },
    /// The text after the delimiter does not start with an integer. Anything after the leading
    /// integer is ignored, so `load;3;x` is group `3`.
    #[error("vertex {vertex}: group id in label {label:?} is not an integer")]
    InvalidGroupId {
        /// Vertex id.
        vertex: usize,
        /// Offending label.
        label: String,
        /// Integer parse failure.
        #[source]
        source: ParseIntError,
    },
}

/// Vertices whose accesses are coalesced into one transaction per partition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    /// Whether the members load or store.
    pub kind: AccessKind,
    /// Group id parsed from the labels.
    pub id: i64,
    /// Member vertices in ascending order.
    pub members: Vec<NodeIndex>,
}

/// All load and store groups of a graph. Loads come first, each kind ordered by group id.
///
/// Groups are keyed by kind and id, so a load group and a store group never merge even if
/// their ids coincide.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryGroups {
    groups: Vec<Group>,
}

impl MemoryGroups {
    /// Scan all vertex labels and collect the groups.
    ///
    /// # Errors
    ///
    /// Returns a [LabelParseError] for the first memory-access label without a valid group id.
    pub fn scan(dfg: &Dfg) -> Result<Self, LabelParseError> {
        let mut by_key: BTreeMap<(AccessKind, i64), Vec<NodeIndex>> = BTreeMap::new();
        for (u, label) in dfg.nodes() {
            let Some(kind) = AccessKind::classify(label) else {
                continue;
            };
            let id = parse_group_id(u.index(), label)?;
            by_key.entry((kind, id)).or_default().push(u);
        }
        let groups: Vec<_> = by_key.into_iter().map(|((kind, id), members)| Group { kind, id, members }).collect();
        debug!(
            load_groups = groups.iter().filter(|g| g.kind == AccessKind::Load).count(),
            store_groups = groups.iter().filter(|g| g.kind == AccessKind::Store).count()
        );
        Ok(Self { groups })
    }

    /// Number of groups of both kinds.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if the graph has no memory accesses.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All groups, loads first.
    pub fn iter(&self) -> impl Iterator<Item = &Group> + '_ {
        self.groups.iter()
    }

    /// Position and group for all groups of one kind. Positions index the whole list.
    pub fn of_kind(&self, kind: AccessKind) -> impl Iterator<Item = (usize, &Group)> + '_ {
        self.groups.iter().enumerate().filter(move |(_, g)| g.kind == kind)
    }

    /// Number of vertices of one kind.
    pub fn access_count(&self, kind: AccessKind) -> usize {
        self.of_kind(kind).map(|(_, g)| g.members.len()).sum()
    }
}

fn parse_group_id(vertex: usize, label: &str) -> Result<i64, LabelParseError> {
    let (_, id) = label
        .split_once(GROUP_DELIMITER)
        .ok_or_else(|| LabelParseError::MissingDelimiter { vertex, label: label.to_string() })?;
    leading_integer(id)
        .parse()
        .map_err(|source| LabelParseError::InvalidGroupId { vertex, label: label.to_string(), source })
}

/// The optionally signed run of digits at the start of `text`, after leading whitespace.
fn leading_integer(text: &str) -> &str {
    let text = text.trim_start();
    let sign = usize::from(text.starts_with(['+', '-']));
    let digits = text[sign..].bytes().take_while(u8::is_ascii_digit).count();
    &text[..sign + digits]
}
