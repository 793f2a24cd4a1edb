//! Builds the deduplicated, label-sorted `TreeNode` forest from flat rows.
//!
//! Nodes live in a builder-local arena while rows are merged in; the child
//! lookup index `(parent, level, segment)` is dropped when the forest is
//! produced, so it never reaches the serialized payload.

use std::collections::HashMap;

use log::debug;
use shared::{Level, TreeNode};

use crate::error::SiteError;
use crate::rows::{FlatRow, LevelCells};
use crate::segment::{pick_label, pick_segment};

const ROOT: usize = 0;

struct ArenaNode {
    label: String,
    path: String,
    children: Vec<usize>,
}

pub struct TreeBuilder {
    nodes: Vec<ArenaNode>,
    index: HashMap<(usize, Level, String), usize>,
}

/// Normalizes a configured prefix to a slash-separated path without outer slashes.
pub fn normalize_prefix(prefix: &str) -> String {
    prefix
        .replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn join_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}/{segment}")
    }
}

/// Directory name a level contributes: the explicit segment, the alternate title, then the key.
pub fn level_segment(cells: &LevelCells) -> String {
    pick_segment(&[
        cells.segment.as_deref(),
        cells.alt_title.as_deref(),
        cells.key.as_deref(),
    ])
}

/// Node path of the given levels under `prefix`, as the tree assembly builds it.
pub fn levels_path<'a>(prefix: &str, levels: impl IntoIterator<Item = &'a LevelCells>) -> String {
    levels
        .into_iter()
        .fold(normalize_prefix(prefix), |path, cells| join_path(&path, &level_segment(cells)))
}

impl TreeBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            nodes: vec![ArenaNode {
                label: String::new(),
                path: normalize_prefix(prefix),
                children: Vec::new(),
            }],
            index: HashMap::new(),
        }
    }

    fn ensure_child(&mut self, parent: usize, level: Level, segment: String, label: String) -> usize {
        let key = (parent, level, segment);
        if let Some(&existing) = self.index.get(&key) {
            return existing;
        }

        let path = join_path(&self.nodes[parent].path, &key.2);
        debug!("node {}:{} -> {path}", level.tag(), key.2);
        let id = self.nodes.len();
        self.nodes.push(ArenaNode {
            label,
            path,
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        self.index.insert(key, id);
        id
    }

    pub fn add_row(&mut self, row: &FlatRow) {
        let mut parent = ROOT;
        for (level, cells) in row.levels() {
            let segment = level_segment(cells);
            let label = pick_label(&[
                cells.title.as_deref(),
                cells.alt_title.as_deref(),
                Some(segment.as_str()),
            ]);
            parent = self.ensure_child(parent, level, segment, label);
        }
    }

    fn materialize(&self, id: usize) -> TreeNode {
        let node = &self.nodes[id];
        let mut children: Vec<TreeNode> = node
            .children
            .iter()
            .map(|&child| self.materialize(child))
            .collect();
        children.sort_by(|a, b| a.label.cmp(&b.label));
        TreeNode {
            label: node.label.clone(),
            path: node.path.clone(),
            children,
            has_body: false,
        }
    }

    /// Consumes the builder and returns the root's children, sorted by label at every level.
    pub fn finish(self) -> Vec<TreeNode> {
        self.materialize(ROOT).children
    }
}

pub fn assemble_tree(rows: &[FlatRow], prefix: &str) -> Vec<TreeNode> {
    let mut builder = TreeBuilder::new(prefix);
    for row in rows {
        builder.add_row(row);
    }
    builder.finish()
}

pub fn tree_json(forest: &[TreeNode]) -> Result<String, SiteError> {
    Ok(serde_json::to_string_pretty(forest)?)
}
