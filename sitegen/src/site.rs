//! End-to-end build: rows → tree → directories → bodies → assets → pages.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use shared::{TreeNode, count_nodes, iter_nodes};

use crate::assets::{copy_icon, write_assets};
use crate::body::{convert_bodies, mark_bodies};
use crate::error::SiteError;
use crate::pages::{SiteChrome, write_all_pages};
use crate::settings::Settings;
use crate::tree_assembly::assemble_tree;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BuildReport {
    pub rows: usize,
    pub nodes: usize,
    pub directories_created: usize,
    pub documents_converted: usize,
    pub decode_failures: Vec<PathBuf>,
    pub pages_written: usize,
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rows: {}, nodes: {}, directories created: {}, documents converted: {}, decode failures: {}, pages: {}",
            self.rows,
            self.nodes,
            self.directories_created,
            self.documents_converted,
            self.decode_failures.len(),
            self.pages_written
        )
    }
}

/// Loads rows from the configured source and assembles the forest.
pub fn load_forest(settings: &Settings) -> Result<(usize, Vec<TreeNode>), SiteError> {
    let source = settings.source.row_source();
    info!("read: {}", source.describe());
    let rows = source.load_rows()?;
    let forest = assemble_tree(&rows, &settings.tree_prefix);
    info!("tree: {} rows -> {} nodes", rows.len(), count_nodes(&forest));
    Ok((rows.len(), forest))
}

/// Creates one directory per node under `build_dir`; returns how many were new.
pub fn materialize_directories(build_dir: &Path, forest: &[TreeNode]) -> Result<usize, SiteError> {
    let mut created = 0;
    for node in iter_nodes(forest) {
        if node.path.is_empty() {
            continue;
        }
        let dir = build_dir.join(&node.path);
        if dir.is_dir() {
            continue;
        }
        fs::create_dir_all(&dir).map_err(|e| SiteError::io(&dir, e))?;
        debug!("mkdir: {}", dir.display());
        created += 1;
    }
    Ok(created)
}

pub fn build_site(settings: &Settings) -> Result<BuildReport, SiteError> {
    let (rows, mut forest) = load_forest(settings)?;
    let mut report = BuildReport {
        rows,
        nodes: count_nodes(&forest),
        ..BuildReport::default()
    };

    report.directories_created = materialize_directories(&settings.build_dir, &forest)?;
    info!("directories: {} created under {}", report.directories_created, settings.build_dir.display());

    let targets = mark_bodies(&mut forest, &settings.build_dir, &settings.body_filename);
    info!("documents: {} of {} nodes have {}", targets.len(), report.nodes, settings.body_filename);
    let conversion = convert_bodies(&targets, &settings.lang)?;
    report.documents_converted = conversion.converted;
    report.decode_failures = conversion.decode_failures;

    write_assets(&settings.site_dir)?;
    let icon = copy_icon(&settings.resource_dir, &settings.icon, &settings.site_dir)?;

    let chrome = SiteChrome {
        title: settings.title.clone(),
        lang: settings.lang.clone(),
        build_base_url: settings.build_base_url(),
        icon,
    };
    report.pages_written = write_all_pages(&settings.site_dir, &chrome, &forest)?.len();

    info!("done: {report}");
    Ok(report)
}
