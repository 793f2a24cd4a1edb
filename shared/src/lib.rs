use serde::{Deserialize, Serialize};

// ===== TREE TYPES =====

/// Hierarchy level a node was created at.
///
/// Only the tree assembly uses it (as half of the child lookup key); the
/// serialized payload stays `{label, path, children, has_body}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Type,
    Major,
    Sub,
    Rule,
    Chapter,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Type => "type",
            Level::Major => "major",
            Level::Sub => "sub",
            Level::Rule => "rule",
            Level::Chapter => "cap",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub label: String,
    pub path: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
    #[serde(default)]
    pub has_body: bool,
}

impl TreeNode {
    pub fn new(label: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: path.into(),
            children: Vec::new(),
            has_body: false,
        }
    }

    /// Client-side identifier: the path, or a label-derived id for path-less nodes.
    pub fn node_id(&self) -> String {
        if self.path.is_empty() {
            format!("_node_{}", self.label)
        } else {
            self.path.clone()
        }
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

pub const BODY_HTML_FILENAME: &str = "body.html";

// ===== CLIENT PROTOCOL =====

pub const TREE_STATE_STORAGE_KEY: &str = "rulenavi_tree_state_v1";
pub const SPLITTER_STORAGE_KEY: &str = "rulenavi_leftw_px";
pub const HEIGHT_MESSAGE_TYPE: &str = "rulenavi_iframe_height";
pub const FRAME_HEIGHT_PADDING: f64 = 24.0;
pub const DEFAULT_FRAME_HEIGHT: f64 = 600.0;
pub const FILTER_DEBOUNCE_MS: u32 = 80;
pub const HEIGHT_REPORT_RETRY_MS: [u32; 2] = [50, 250];
pub const TREE_PAGE_ID: &str = "rules";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SplitterBounds {
    pub min_px: f64,
    pub max_px: f64,
    pub default_px: f64,
}

impl Default for SplitterBounds {
    fn default() -> Self {
        Self {
            min_px: 240.0,
            max_px: 720.0,
            default_px: 360.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageKeys {
    pub tree_state: String,
    pub splitter_width: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            tree_state: TREE_STATE_STORAGE_KEY.to_string(),
            splitter_width: SPLITTER_STORAGE_KEY.to_string(),
        }
    }
}

/// Configuration object handed to `RuleNavi.boot` on every page.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    pub build_base_url: String,
    pub page_id: String,
    pub tree_page_id: String,
    pub body_document: String,
    pub storage: StorageKeys,
    pub height_message_type: String,
    pub frame_padding_px: f64,
    pub default_frame_height_px: f64,
    pub splitter: SplitterBounds,
    pub filter_debounce_ms: u32,
    /// Rendered height reporter, appended to placeholder documents built in the browser.
    pub reporter_script: String,
}

impl PageConfig {
    pub fn new(page_id: impl Into<String>, build_base_url: impl Into<String>) -> Self {
        Self {
            build_base_url: build_base_url.into(),
            page_id: page_id.into(),
            tree_page_id: TREE_PAGE_ID.to_string(),
            body_document: BODY_HTML_FILENAME.to_string(),
            storage: StorageKeys::default(),
            height_message_type: HEIGHT_MESSAGE_TYPE.to_string(),
            frame_padding_px: FRAME_HEIGHT_PADDING,
            default_frame_height_px: DEFAULT_FRAME_HEIGHT,
            splitter: SplitterBounds::default(),
            filter_debounce_ms: FILTER_DEBOUNCE_MS,
            reporter_script: height_reporter_script(),
        }
    }
}

/// Script every embeddable document carries to post its height to the parent page.
///
/// Converted body documents embed it at build time; the browser controller
/// receives the same text through `PageConfig::reporter_script`.
pub fn height_reporter_script() -> String {
    let retries: String = HEIGHT_REPORT_RETRY_MS
        .iter()
        .map(|ms| format!(" setTimeout(post, {ms});"))
        .collect();
    format!(
        r#"<script>
(() => {{
  let last = -1;
  function calc() {{
    const de = document.documentElement;
    const b = document.body;
    return Math.max(de.scrollHeight, b.scrollHeight, de.offsetHeight, b.offsetHeight);
  }}
  function post() {{
    const h = calc();
    if (h === last) return;
    last = h;
    try {{ parent.postMessage({{ type: "{HEIGHT_MESSAGE_TYPE}", height: h }}, "*"); }} catch (e) {{}}
  }}
  function tick() {{ post();{retries} }}
  window.addEventListener("load", tick);
  window.addEventListener("resize", post);
  try {{ new ResizeObserver(() => post()).observe(document.body); }} catch (e) {{}}
  try {{
    new MutationObserver(() => post()).observe(document.body, {{
      subtree: true, childList: true, attributes: true, characterData: true
    }});
  }} catch (e) {{}}
  tick();
}})();
</script>"#
    )
}

// ===== UTILITY FUNCTIONS =====

/// Depth-first, pre-order walk in payload order.
pub fn iter_nodes(nodes: &[TreeNode]) -> impl Iterator<Item = &TreeNode> {
    let mut stack: Vec<&TreeNode> = nodes.iter().rev().collect();
    std::iter::from_fn(move || {
        let node = stack.pop()?;
        stack.extend(node.children.iter().rev());
        Some(node)
    })
}

pub fn iter_nodes_mut(nodes: &mut [TreeNode], visit: &mut impl FnMut(&mut TreeNode)) {
    for node in nodes {
        visit(node);
        iter_nodes_mut(&mut node.children, visit);
    }
}

pub fn count_nodes(nodes: &[TreeNode]) -> usize {
    iter_nodes(nodes).count()
}
