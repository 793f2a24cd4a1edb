use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::SiteError;
use crate::textio::write_text_utf8;

pub const ASSETS_DIR: &str = "assets";

const SITE_CSS: &str = include_str!("../assets/site.css");
const APP_JS: &str = include_str!("../assets/app.js");

/// Writes the shared stylesheet and browser controller under `<site_dir>/assets`.
pub fn write_assets(site_dir: &Path) -> Result<Vec<PathBuf>, SiteError> {
    let assets_dir = site_dir.join(ASSETS_DIR);
    let mut written = Vec::new();
    for (name, content) in [("site.css", SITE_CSS), ("app.js", APP_JS)] {
        let path = assets_dir.join(name);
        write_text_utf8(&path, content)?;
        info!("write: {}", path.display());
        written.push(path);
    }
    Ok(written)
}

/// Copies the icon into `<site_dir>/assets`. Returns its file name, or `None` when absent.
pub fn copy_icon(resource_dir: &Path, icon: &str, site_dir: &Path) -> Result<Option<String>, SiteError> {
    let source = resource_dir.join(icon);
    if !source.is_file() {
        warn!("icon not found: {} (using text badge)", source.display());
        return Ok(None);
    }

    let Some(file_name) = source.file_name().map(|name| name.to_string_lossy().into_owned()) else {
        return Ok(None);
    };
    let target = site_dir.join(ASSETS_DIR).join(&file_name);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| SiteError::io(parent, e))?;
    }
    fs::copy(&source, &target).map_err(|e| SiteError::io(&source, e))?;
    info!("copy icon: {} -> {}", source.display(), target.display());
    Ok(Some(file_name))
}
