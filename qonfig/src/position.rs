use std::fmt;

use roxmltree::Node;

/// A location in a declaration or document source.
///
/// Line and column are 1-based; a zero line means the position is unknown
/// (e.g. for programmatically declared components).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilePosition {
    pub location: Option<String>,
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

impl FilePosition {
    pub fn unknown() -> Self {
        Self {
            location: None,
            line: 0,
            column: 0,
            length: 0,
        }
    }

    /// Position of an XML node, taken from the node's byte range in the
    /// original input.
    pub fn of_node(node: Node, location: Option<&str>) -> Self {
        let range = node.range();
        let pos = node.document().text_pos_at(range.start);
        Self {
            location: location.map(str::to_owned),
            line: pos.row,
            column: pos.col,
            length: range.len().try_into().unwrap_or(u32::MAX),
        }
    }

    pub fn is_known(&self) -> bool {
        self.line != 0
    }
}

impl fmt::Display for FilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.location.as_deref(), self.is_known()) {
            (Some(location), true) => write!(f, "{location}:{}:{}", self.line, self.column),
            (Some(location), false) => write!(f, "{location}"),
            (None, true) => write!(f, "{}:{}", self.line, self.column),
            (None, false) => write!(f, "<unknown>"),
        }
    }
}
