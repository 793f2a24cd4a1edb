//! Body document discovery and Markdown conversion into embeddable `body.html` files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;
use shared::{BODY_HTML_FILENAME, TreeNode, height_reporter_script, iter_nodes_mut};

use crate::error::SiteError;
use crate::markdown::{escape_html, md_to_html};
use crate::textio::{read_text_auto, write_text_utf8};

const BODY_CSS: &str = include_str!("../assets/body.css");
const PROGRESS_EVERY: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct BodyTarget {
    pub node_path: String,
    pub label: String,
    pub source: PathBuf,
}

impl BodyTarget {
    pub fn output(&self) -> PathBuf {
        self.source
            .parent()
            .map(|dir| dir.join(BODY_HTML_FILENAME))
            .unwrap_or_else(|| PathBuf::from(BODY_HTML_FILENAME))
    }

    /// Label, or the containing directory name for unlabeled nodes.
    pub fn title(&self) -> String {
        if !self.label.is_empty() {
            return self.label.clone();
        }
        self.source
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Sets `has_body` on every node and returns the documents to convert, in pre-order.
pub fn mark_bodies(forest: &mut [TreeNode], build_dir: &Path, body_filename: &str) -> Vec<BodyTarget> {
    let mut targets = Vec::new();
    iter_nodes_mut(forest, &mut |node: &mut TreeNode| {
        let relative = node.path.trim();
        if relative.is_empty() {
            node.has_body = false;
            return;
        }

        let source = build_dir.join(relative).join(body_filename);
        debug!("scan: path='{relative}' -> md='{}'", source.display());
        node.has_body = source.is_file();
        if node.has_body {
            targets.push(BodyTarget {
                node_path: node.path.clone(),
                label: node.label.clone(),
                source,
            });
        }
    });
    targets
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOutcome {
    Converted,
    Undecodable,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConversionSummary {
    pub converted: usize,
    pub decode_failures: Vec<PathBuf>,
}

/// Converts one document. Unreadable sources get an explicit notice page instead of failing the run.
pub fn convert_one(target: &BodyTarget, lang: &str) -> Result<BodyOutcome, SiteError> {
    let title = target.title();
    let (html, outcome) = match read_text_auto(&target.source) {
        Ok(markdown) => (
            wrap_body_html(&md_to_html(&markdown), &title, lang),
            BodyOutcome::Converted,
        ),
        Err(err) => {
            warn!("{err}; writing notice page for {}", target.node_path);
            (decode_failure_html(&title, lang), BodyOutcome::Undecodable)
        }
    };
    write_text_utf8(&target.output(), &html)?;
    Ok(outcome)
}

pub fn convert_bodies(targets: &[BodyTarget], lang: &str) -> Result<ConversionSummary, SiteError> {
    let total = targets.len();
    let done = AtomicUsize::new(0);

    let outcomes: Vec<Result<BodyOutcome, SiteError>> = targets
        .par_iter()
        .map(|target| {
            let outcome = convert_one(target, lang);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("convert[{finished}/{total}]: {} ({})", target.label, target.node_path);
            if finished % PROGRESS_EVERY == 0 {
                info!("converted: {finished}/{total}");
            }
            outcome
        })
        .collect();

    let mut summary = ConversionSummary::default();
    for (target, outcome) in targets.iter().zip(outcomes) {
        match outcome? {
            BodyOutcome::Converted => summary.converted += 1,
            BodyOutcome::Undecodable => summary.decode_failures.push(target.source.clone()),
        }
    }
    Ok(summary)
}

pub fn wrap_body_html(inner_html: &str, title: &str, lang: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="{lang}">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>{title}</title>
<style>
{BODY_CSS}</style>
</head>
<body>
  <div class="doc">
    <div class="card">
{inner_html}
    </div>
  </div>
{script}
</body>
</html>
"#,
        lang = escape_html(lang),
        title = escape_html(title),
        script = height_reporter_script(),
    )
}

pub fn decode_failure_html(title: &str, lang: &str) -> String {
    let inner = format!(
        "<h1>{}</h1>\n<p class='notice'>This document could not be decoded. Save it as UTF-8 and rebuild.</p>",
        escape_html(title)
    );
    wrap_body_html(&inner, title, lang)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::HEIGHT_MESSAGE_TYPE;
    use std::env;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        env::temp_dir().join(format!("sitegen_body_{name}_{nanos}"))
    }

    fn forest() -> Vec<TreeNode> {
        let mut rule = TreeNode::new("Rule", "rules/T/R");
        rule.children.push(TreeNode::new("Chapter", "rules/T/R/1"));
        let mut kind = TreeNode::new("Type", "rules/T");
        kind.children.push(rule);
        vec![kind, TreeNode::new("Pathless", "")]
    }

    #[test]
    fn marks_only_nodes_with_existing_documents() {
        let root = scratch("mark");
        fs::create_dir_all(root.join("rules/T/R/1")).unwrap();
        fs::write(root.join("rules/T/R/body.md"), "# Rule").unwrap();
        fs::create_dir_all(root.join("rules/T/body.md")).unwrap();

        let mut nodes = forest();
        nodes[1].has_body = true;
        let targets = mark_bodies(&mut nodes, &root, "body.md");

        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].node_path, "rules/T/R");
        assert!(!nodes[0].has_body, "a directory named like the document is not a document");
        assert!(nodes[0].children[0].has_body);
        assert!(!nodes[0].children[0].children[0].has_body);
        assert!(!nodes[1].has_body);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn converts_and_is_idempotent() {
        let root = scratch("convert");
        let dir = root.join("rules/T/R");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("body.md"), "# 見出し\r\n\r\n- a\r\n").unwrap();

        let mut nodes = forest();
        let targets = mark_bodies(&mut nodes, &root, "body.md");
        let summary = convert_bodies(&targets, "ja").unwrap();
        assert_eq!(summary.converted, 1);
        assert!(summary.decode_failures.is_empty());

        let first = fs::read_to_string(dir.join("body.html")).unwrap();
        assert!(first.contains("<h1>見出し</h1>"));
        assert!(first.contains("<title>Rule</title>"));
        assert!(first.contains(HEIGHT_MESSAGE_TYPE));
        assert!(!first.contains('\r'));

        convert_bodies(&targets, "ja").unwrap();
        assert_eq!(fs::read_to_string(dir.join("body.html")).unwrap(), first);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn undecodable_document_gets_notice_page() {
        let root = scratch("decode");
        let dir = root.join("rules/T");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("body.md"), [0xFF, 0xFF, 0xFD]).unwrap();

        let targets = vec![BodyTarget {
            node_path: "rules/T".to_string(),
            label: String::new(),
            source: dir.join("body.md"),
        }];
        let summary = convert_bodies(&targets, "ja").unwrap();
        assert_eq!(summary.converted, 0);
        assert_eq!(summary.decode_failures, vec![dir.join("body.md")]);

        let html = fs::read_to_string(dir.join("body.html")).unwrap();
        assert!(html.contains("could not be decoded"));
        assert!(html.contains("<title>T</title>"), "falls back to directory name");

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn title_is_escaped() {
        let html = wrap_body_html("<p>x</p>", "A <B> & C", "ja");
        assert!(html.contains("<title>A &lt;B&gt; &amp; C</title>"));
        assert!(html.contains("<p>x</p>"));
    }
}
