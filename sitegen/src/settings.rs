//! `rulenavi.toml` loading and resolution into the values the pipeline runs with.

use std::path::{Component, Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::error::SiteError;
use crate::rows::{JsonRows, RowSource};
use crate::sqlite_source::{SchemaMap, SqliteRows};

pub const SETTINGS_FILENAME: &str = "rulenavi.toml";
const MAX_ROOT_SEARCH_DEPTH: usize = 20;

const DEFAULT_BUILD_DIR: &str = "build";
const DEFAULT_SITE_SUBDIR: &str = "rules/html";
const DEFAULT_RESOURCE_DIR: &str = "resource";
const DEFAULT_TREE_PREFIX: &str = "rules/files";
const DEFAULT_DATABASE: &str = "rules/rules.db";
const DEFAULT_TITLE: &str = "RuleNavi";
const DEFAULT_ICON: &str = "icon.png";
const DEFAULT_BODY_FILENAME: &str = "body.md";
const DEFAULT_LANG: &str = "ja";

#[derive(Debug, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub site: SiteSection,
    #[serde(default)]
    pub source: SourceSection,
}

#[derive(Debug, Default, Deserialize)]
pub struct PathsSection {
    #[serde(default)]
    pub build_dir: String,
    #[serde(default)]
    pub site_dir: String,
    #[serde(default)]
    pub resource_dir: String,
    #[serde(default)]
    pub tree_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SiteSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub body_filename: String,
    #[serde(default)]
    pub lang: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SourceSection {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub rows_file: String,
    #[serde(default)]
    pub schema: SchemaMap,
}

/// Command-line values that take precedence over the settings file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub out_dir: Option<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub rows: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Sqlite { database: PathBuf, schema: SchemaMap },
    Json { rows: PathBuf },
}

impl DataSource {
    pub fn path(&self) -> &Path {
        match self {
            DataSource::Sqlite { database, .. } => database,
            DataSource::Json { rows } => rows,
        }
    }

    pub fn row_source(&self) -> Box<dyn RowSource> {
        match self {
            DataSource::Sqlite { database, schema } => {
                Box::new(SqliteRows::new(database.clone(), schema.clone()))
            }
            DataSource::Json { rows } => Box::new(JsonRows::new(rows.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub root: PathBuf,
    /// Document root: node directories, body documents and converted bodies live here.
    pub build_dir: PathBuf,
    /// Where the HTML pages and `assets/` are written.
    pub site_dir: PathBuf,
    pub resource_dir: PathBuf,
    pub tree_prefix: String,
    pub title: String,
    pub icon: String,
    pub body_filename: String,
    pub lang: String,
    pub source: DataSource,
}

fn or_default(value: &str, default: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

fn resolve_path(root: &Path, value: &str) -> PathBuf {
    normalize_lexically(&root.join(value))
}

/// Removes `.` and folds `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Relative URL prefix from pages in `site_dir` to the document root `build_dir`.
///
/// Ends with `/`, or is empty when both directories coincide.
pub fn relative_base_url(site_dir: &Path, build_dir: &Path) -> String {
    let site = normalize_lexically(site_dir);
    let build = normalize_lexically(build_dir);
    let site_parts: Vec<Component<'_>> = site.components().collect();
    let build_parts: Vec<Component<'_>> = build.components().collect();

    let common = site_parts
        .iter()
        .zip(&build_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut segments: Vec<String> = vec!["..".to_string(); site_parts.len() - common];
    segments.extend(
        build_parts[common..]
            .iter()
            .map(|part| part.as_os_str().to_string_lossy().into_owned()),
    );

    if segments.is_empty() {
        String::new()
    } else {
        format!("{}/", segments.join("/"))
    }
}

/// Walks up from `start` looking for a directory containing `rulenavi.toml`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .take(MAX_ROOT_SEARCH_DEPTH + 1)
        .find(|dir| dir.join(SETTINGS_FILENAME).is_file())
        .map(Path::to_path_buf)
}

pub fn load_settings_file(path: &Path) -> Result<SettingsFile, SiteError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SiteError::ConfigMissing(format!("cannot read settings file {}: {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|source| SiteError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })
}

impl Settings {
    /// Loads `config` (or the discovered `rulenavi.toml`) and resolves it.
    pub fn discover(cwd: &Path, config: Option<&Path>, overrides: &Overrides) -> Result<Settings, SiteError> {
        let (root, file) = match config {
            Some(path) => {
                let path = resolve_path(cwd, &path.to_string_lossy());
                let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
                (root, load_settings_file(&path)?)
            }
            None => match find_project_root(cwd) {
                Some(root) => {
                    let file = load_settings_file(&root.join(SETTINGS_FILENAME))?;
                    (root, file)
                }
                None => {
                    debug!("no {SETTINGS_FILENAME} found above {}; using defaults", cwd.display());
                    (cwd.to_path_buf(), SettingsFile::default())
                }
            },
        };
        Settings::resolve(file, &root, cwd, overrides)
    }

    /// Applies defaults, overrides and validation. Nothing is written here.
    pub fn resolve(file: SettingsFile, root: &Path, cwd: &Path, overrides: &Overrides) -> Result<Settings, SiteError> {
        let from_cli = |value: &Option<PathBuf>| {
            value
                .as_ref()
                .map(|path| resolve_path(cwd, &path.to_string_lossy()))
        };

        let build_dir = from_cli(&overrides.build_dir)
            .unwrap_or_else(|| resolve_path(root, &or_default(&file.paths.build_dir, DEFAULT_BUILD_DIR)));
        let site_dir = from_cli(&overrides.out_dir).unwrap_or_else(|| {
            if file.paths.site_dir.trim().is_empty() {
                build_dir.join(DEFAULT_SITE_SUBDIR)
            } else {
                resolve_path(root, file.paths.site_dir.trim())
            }
        });
        let resource_dir = resolve_path(root, &or_default(&file.paths.resource_dir, DEFAULT_RESOURCE_DIR));
        let tree_prefix = file
            .paths
            .tree_prefix
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_TREE_PREFIX)
            .to_string();

        let body_filename = or_default(&file.site.body_filename, DEFAULT_BODY_FILENAME);
        if body_filename.contains(['/', '\\']) || body_filename == "." || body_filename == ".." {
            return Err(SiteError::ConfigMissing(format!(
                "site.body_filename must be a plain file name, got {body_filename:?}"
            )));
        }

        let source = match (from_cli(&overrides.rows), from_cli(&overrides.database)) {
            (Some(rows), _) => DataSource::Json { rows },
            (None, Some(database)) => DataSource::Sqlite {
                database,
                schema: file.source.schema.clone(),
            },
            (None, None) if !file.source.rows_file.trim().is_empty() => DataSource::Json {
                rows: resolve_path(root, file.source.rows_file.trim()),
            },
            (None, None) => DataSource::Sqlite {
                database: if file.source.database.trim().is_empty() {
                    build_dir.join(DEFAULT_DATABASE)
                } else {
                    resolve_path(root, file.source.database.trim())
                },
                schema: file.source.schema.clone(),
            },
        };
        if !source.path().is_file() {
            return Err(SiteError::ConfigMissing(format!(
                "row source not found: {}",
                source.path().display()
            )));
        }

        Ok(Settings {
            root: root.to_path_buf(),
            build_dir,
            site_dir,
            resource_dir,
            tree_prefix,
            title: or_default(&file.site.title, DEFAULT_TITLE),
            icon: or_default(&file.site.icon, DEFAULT_ICON),
            body_filename,
            lang: or_default(&file.site.lang, DEFAULT_LANG),
            source,
        })
    }

    pub fn build_base_url(&self) -> String {
        relative_base_url(&self.site_dir, &self.build_dir)
    }
}
