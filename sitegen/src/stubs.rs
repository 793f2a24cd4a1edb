//! Markdown body document stubs for every rule and chapter in the database.
//!
//! Each stub lands in the directory the tree assembly gives its node, so a
//! later build finds it and converts it like any hand-written document.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rusqlite::{Connection, OpenFlags};
use shared::TreeNode;

use crate::error::SiteError;
use crate::rows::LevelCells;
use crate::settings::{DataSource, Settings};
use crate::sqlite_source::{SchemaMap, category, cell};
use crate::tree_assembly::{level_segment, levels_path};
use crate::tree_text::tree_lines;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubMode {
    /// Write missing documents, keep existing ones.
    Create,
    Overwrite,
    /// Only report whether each document exists.
    CheckOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubStatus {
    Created,
    Updated,
    Exists,
    Missing,
    Failed(String),
}

impl StubStatus {
    pub fn is_ok(&self) -> bool {
        !matches!(self, StubStatus::Missing | StubStatus::Failed(_))
    }
}

impl fmt::Display for StubStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubStatus::Created => f.write_str("created"),
            StubStatus::Updated => f.write_str("updated"),
            StubStatus::Exists => f.write_str("exists"),
            StubStatus::Missing => f.write_str("missing"),
            StubStatus::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// Unifies line endings and trims; `None` becomes empty.
pub fn normalize_text(value: Option<&str>) -> String {
    value
        .unwrap_or_default()
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

/// One request row of a chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    pub chapter_title: String,
    pub title: String,
    pub top_body: String,
    pub low_body: String,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterStub {
    pub id_cap: String,
    /// Directory name under the rule directory.
    pub segment: String,
    pub sections: Vec<Section>,
}

impl ChapterStub {
    /// First non-empty chapter title among the sections.
    pub fn title(&self) -> &str {
        self.sections
            .iter()
            .map(|section| section.chapter_title.as_str())
            .find(|title| !title.is_empty())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleStub {
    pub key_rule: String,
    pub id_rule: String,
    pub name: String,
    pub link: String,
    pub created: String,
    pub updated: String,
    /// Node path of the rule, relative to the document root.
    pub dir: String,
    pub chapters: Vec<ChapterStub>,
}

struct ListedRule {
    levels: [LevelCells; 3],
    key_rule: String,
    id_rule: String,
    name: String,
    link: String,
    created: String,
    updated: String,
}

fn load_chapters(conn: &Connection, schema: &SchemaMap, key_rule: &str) -> Result<Vec<ChapterStub>, SiteError> {
    let mut stmt = conn.prepare(&schema.chapter_rows_sql())?;
    let rows = stmt
        .query_map([key_rule], |row| {
            Ok((
                normalize_text(cell(row, 0)?.as_deref()),
                Section {
                    chapter_title: normalize_text(cell(row, 1)?.as_deref()),
                    title: normalize_text(cell(row, 2)?.as_deref()),
                    top_body: normalize_text(cell(row, 3)?.as_deref()),
                    low_body: normalize_text(cell(row, 4)?.as_deref()),
                    reference: normalize_text(cell(row, 5)?.as_deref()),
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut chapters: Vec<ChapterStub> = Vec::new();
    for (id_cap, section) in rows {
        if id_cap.is_empty() {
            continue;
        }
        match chapters.last_mut() {
            Some(chapter) if chapter.id_cap == id_cap => chapter.sections.push(section),
            _ => chapters.push(ChapterStub {
                segment: level_segment(&LevelCells {
                    key: Some(id_cap.clone()),
                    ..LevelCells::default()
                }),
                id_cap,
                sections: vec![section],
            }),
        }
    }
    Ok(chapters)
}

/// Reads every rule with its chapters, in category and rule id order.
pub fn load_rule_stubs(database: &Path, schema: &SchemaMap, prefix: &str) -> Result<Vec<RuleStub>, SiteError> {
    if !database.is_file() {
        return Err(SiteError::ConfigMissing(format!(
            "database not found: {}",
            database.display()
        )));
    }
    let conn = Connection::open_with_flags(database, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let sql = schema.rule_listing_sql();
    debug!("SQL: {sql}");

    let mut stmt = conn.prepare(&sql)?;
    let listed = stmt
        .query_map([], |row| {
            Ok(ListedRule {
                levels: [category(row, 0)?, category(row, 4)?, category(row, 8)?],
                key_rule: normalize_text(cell(row, 12)?.as_deref()),
                id_rule: normalize_text(cell(row, 13)?.as_deref()),
                name: normalize_text(cell(row, 14)?.as_deref()),
                link: normalize_text(cell(row, 15)?.as_deref()),
                created: normalize_text(cell(row, 16)?.as_deref()),
                updated: normalize_text(cell(row, 17)?.as_deref()),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut seen = HashSet::new();
    let mut stubs = Vec::new();
    for rule in listed {
        if rule.id_rule.is_empty() {
            continue;
        }
        let rule_cells = LevelCells {
            key: Some(rule.id_rule.clone()),
            ..LevelCells::default()
        };
        let dir = levels_path(prefix, rule.levels.iter().chain([&rule_cells]));
        if !seen.insert(dir.clone()) {
            warn!("rule {} shares directory {dir} with an earlier rule; skipped", rule.id_rule);
            continue;
        }
        let chapters = load_chapters(&conn, schema, &rule.key_rule)?;
        stubs.push(RuleStub {
            key_rule: rule.key_rule,
            id_rule: rule.id_rule,
            name: rule.name,
            link: rule.link,
            created: rule.created,
            updated: rule.updated,
            dir,
            chapters,
        });
    }
    Ok(stubs)
}

fn finish_markdown(lines: Vec<String>) -> String {
    format!("{}\n", lines.join("\n").trim_end())
}

pub fn rule_markdown(rule: &RuleStub, body_filename: &str) -> String {
    let mut lines = vec![
        format!("# {} {}", rule.id_rule, rule.name).trim().to_string(),
        String::new(),
        format!("- key_rule: {}", rule.key_rule),
    ];
    for (name, value) in [("link", &rule.link), ("created", &rule.created), ("updated", &rule.updated)] {
        if !value.is_empty() {
            lines.push(format!("- {name}: {value}"));
        }
    }
    lines.push(String::new());

    if rule.chapters.is_empty() {
        lines.push("> (no chapters)".to_string());
    } else {
        lines.push("## Chapters".to_string());
        lines.push(String::new());
        for chapter in &rule.chapters {
            let entry = format!("- [{}] {}", chapter.id_cap, chapter.title());
            lines.push(format!(
                "{}  (./{}/{body_filename})",
                entry.trim(),
                chapter.segment
            ));
        }
    }
    finish_markdown(lines)
}

pub fn chapter_markdown(rule: &RuleStub, chapter: &ChapterStub) -> String {
    let mut lines = vec![
        format!("# {} {}", chapter.id_cap, chapter.title()).trim().to_string(),
        String::new(),
        format!("- id_rule: {}", rule.id_rule),
        format!("- key_rule: {}", rule.key_rule),
        String::new(),
    ];
    for section in &chapter.sections {
        if !section.title.is_empty() {
            lines.push(format!("## {}", section.title));
            lines.push(String::new());
        }
        let body = [section.top_body.as_str(), section.low_body.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if !body.is_empty() {
            lines.push(body);
            lines.push(String::new());
        }
        if !section.reference.is_empty() {
            lines.push(format!("- reference: {}", section.reference));
            lines.push(String::new());
        }
    }
    finish_markdown(lines)
}

pub fn write_or_check(path: &Path, content: &str, mode: StubMode) -> StubStatus {
    let existed = path.exists();
    match mode {
        StubMode::CheckOnly if existed => return StubStatus::Exists,
        StubMode::CheckOnly => return StubStatus::Missing,
        StubMode::Create if existed => return StubStatus::Exists,
        _ => {}
    }
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            return StubStatus::Failed(format!("{:?}", e.kind()));
        }
    }
    match fs::write(path, content) {
        Ok(()) if existed => StubStatus::Updated,
        Ok(()) => StubStatus::Created,
        Err(e) => StubStatus::Failed(format!("{:?}", e.kind())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubEntry {
    pub path: PathBuf,
    pub status: StubStatus,
    pub chapters: Vec<StubEntry>,
}

impl StubEntry {
    fn label(&self) -> String {
        let verdict = if self.status.is_ok() { "OK" } else { "NG" };
        format!("{} ({}): {verdict}", self.path.display(), self.status)
    }

    fn all(&self) -> impl Iterator<Item = &StubEntry> {
        std::iter::once(self).chain(self.chapters.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubReport {
    pub entries: Vec<StubEntry>,
}

impl StubReport {
    pub fn ok(&self) -> usize {
        self.entries
            .iter()
            .flat_map(StubEntry::all)
            .filter(|entry| entry.status.is_ok())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.entries
            .iter()
            .flat_map(StubEntry::all)
            .filter(|entry| !entry.status.is_ok())
            .count()
    }

    /// Outline of every document with its status.
    pub fn tree_lines(&self) -> Vec<String> {
        let forest: Vec<TreeNode> = self
            .entries
            .iter()
            .map(|rule| {
                let mut node = TreeNode::new(rule.label(), "");
                node.children = rule
                    .chapters
                    .iter()
                    .map(|chapter| TreeNode::new(chapter.label(), ""))
                    .collect();
                node
            })
            .collect();
        tree_lines(&forest)
    }
}

/// Writes (or checks) `body_filename` for every rule and chapter under the document root.
pub fn export_stubs(settings: &Settings, mode: StubMode) -> Result<StubReport, SiteError> {
    let DataSource::Sqlite { database, schema } = &settings.source else {
        return Err(SiteError::ConfigMissing(
            "body stubs need a SQLite database source".to_string(),
        ));
    };
    let rules = load_rule_stubs(database, schema, &settings.tree_prefix)?;
    info!("stubs: {} rules from {}", rules.len(), database.display());

    let mut report = StubReport::default();
    for rule in &rules {
        let dir = settings.build_dir.join(&rule.dir);
        let path = dir.join(&settings.body_filename);
        let status = write_or_check(&path, &rule_markdown(rule, &settings.body_filename), mode);
        debug!("{}: {status}", path.display());

        let chapters = rule
            .chapters
            .iter()
            .map(|chapter| {
                let path = dir.join(&chapter.segment).join(&settings.body_filename);
                let status = write_or_check(&path, &chapter_markdown(rule, chapter), mode);
                debug!("{}: {status}", path.display());
                StubEntry {
                    path,
                    status,
                    chapters: Vec::new(),
                }
            })
            .collect();
        report.entries.push(StubEntry {
            path,
            status,
            chapters,
        });
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::load_forest;
    use shared::iter_nodes;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    const FIXTURE: &str = r#"
        CREATE TABLE cat_type (key_cat_type INTEGER, title_jp TEXT, title_en TEXT, path TEXT);
        CREATE TABLE cat_major (key_cat_major INTEGER, title_jp TEXT, title_en TEXT, key_cat_type INTEGER, path TEXT);
        CREATE TABLE cat_sub (key_cat_sub INTEGER, title_jp TEXT, title_en TEXT, key_cat_major INTEGER, path TEXT);
        CREATE TABLE rules (key_rule INTEGER, id_rule TEXT, name_rule TEXT, key_cat_sub INTEGER,
                            link TEXT, created_date TEXT, update_date TEXT);
        CREATE TABLE request (key_req INTEGER, key_rule TEXT, id_cap TEXT, title_capter TEXT,
                              title_section TEXT, top_body TEXT, low_body TEXT, reference TEXT);

        INSERT INTO cat_type VALUES (1, '電気', 'Electrical', 'elec');
        INSERT INTO cat_major VALUES (10, '配線', 'Wiring', 1, NULL);
        INSERT INTO cat_sub VALUES (100, '屋内', 'Indoor', 10, 'indoor');
        INSERT INTO rules VALUES (1000, 'R-2', '第二規程', 100, 'https://example.com/r2', '2024-01-05', NULL);
        INSERT INTO rules VALUES (1001, 'R-1', '第一規程', 100, NULL, NULL, NULL);
        INSERT INTO request VALUES (3, '1000', '2', NULL, '範囲', '対象は屋内配線。', NULL, NULL);
        INSERT INTO request VALUES (2, '1000', '1', '目的', '概要', '本規程は' || char(13, 10) || '安全を定める。', '詳細は別紙。', 'JIS C 0001');
        INSERT INTO request VALUES (1, '1000.0', '1', NULL, NULL, '  ', NULL, NULL);
    "#;

    fn scratch_settings() -> Settings {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = env::temp_dir().join(format!("sitegen_stubs_{nanos}"));
        fs::create_dir_all(&root).unwrap();
        let database = root.join("rules.db");
        Connection::open(&database)
            .unwrap()
            .execute_batch(FIXTURE)
            .unwrap();
        Settings {
            build_dir: root.join("build"),
            site_dir: root.join("build/rules/html"),
            resource_dir: root.join("resource"),
            tree_prefix: "rules/files".to_string(),
            title: "RuleNavi".to_string(),
            icon: "icon.png".to_string(),
            body_filename: "body.md".to_string(),
            lang: "ja".to_string(),
            source: DataSource::Sqlite {
                database,
                schema: SchemaMap::default(),
            },
            root,
        }
    }

    fn stubs(settings: &Settings) -> Vec<RuleStub> {
        let DataSource::Sqlite { database, schema } = &settings.source else {
            panic!("fixture uses sqlite");
        };
        load_rule_stubs(database, schema, &settings.tree_prefix).unwrap()
    }

    #[test]
    fn text_is_normalized() {
        assert_eq!(normalize_text(None), "");
        assert_eq!(normalize_text(Some(" a\r\nb\rc \n")), "a\nb\nc");
    }

    #[test]
    fn rules_and_chapters_render_as_markdown() {
        let settings = scratch_settings();
        let rules = stubs(&settings);

        let ids: Vec<&str> = rules.iter().map(|rule| rule.id_rule.as_str()).collect();
        assert_eq!(ids, vec!["R-1", "R-2"]);

        assert_eq!(
            rule_markdown(&rules[0], "body.md"),
            "# R-1 第一規程\n\n- key_rule: 1001\n\n> (no chapters)\n"
        );

        let second = &rules[1];
        assert_eq!(second.dir, "rules/files/elec/Wiring/indoor/R-2");
        assert_eq!(
            rule_markdown(second, "body.md"),
            "# R-2 第二規程\n\
             \n\
             - key_rule: 1000\n\
             - link: https://example.com/r2\n\
             - created: 2024-01-05\n\
             \n\
             ## Chapters\n\
             \n\
             - [1] 目的  (./1/body.md)\n\
             - [2]  (./2/body.md)\n"
        );

        assert_eq!(second.chapters[0].sections.len(), 2, "'1000.0' matches key 1000");
        assert_eq!(
            chapter_markdown(second, &second.chapters[0]),
            "# 1 目的\n\
             \n\
             - id_rule: R-2\n\
             - key_rule: 1000\n\
             \n\
             ## 概要\n\
             \n\
             本規程は\n安全を定める。\n\
             \n\
             詳細は別紙。\n\
             \n\
             - reference: JIS C 0001\n"
        );
        assert_eq!(
            chapter_markdown(second, &second.chapters[1]),
            "# 2\n\n- id_rule: R-2\n- key_rule: 1000\n\n## 範囲\n\n対象は屋内配線。\n"
        );

        let _ = fs::remove_dir_all(&settings.root);
    }

    #[test]
    fn stub_directories_are_tree_nodes() {
        let settings = scratch_settings();
        let (_, forest) = load_forest(&settings).unwrap();
        let paths: HashSet<&str> = iter_nodes(&forest).map(|node| node.path.as_str()).collect();

        for rule in stubs(&settings) {
            assert!(paths.contains(rule.dir.as_str()), "{}", rule.dir);
            for chapter in &rule.chapters {
                let dir = format!("{}/{}", rule.dir, chapter.segment);
                assert!(paths.contains(dir.as_str()), "{dir}");
            }
        }

        let _ = fs::remove_dir_all(&settings.root);
    }

    #[test]
    fn modes_create_keep_overwrite_and_check() {
        let settings = scratch_settings();
        let rule_doc = settings
            .build_dir
            .join("rules/files/elec/Wiring/indoor/R-2/body.md");

        let checked = export_stubs(&settings, StubMode::CheckOnly).unwrap();
        assert_eq!((checked.ok(), checked.failed()), (0, 4));
        assert!(!rule_doc.exists());

        let created = export_stubs(&settings, StubMode::Create).unwrap();
        assert_eq!((created.ok(), created.failed()), (4, 0));
        assert!(created.entries.iter().all(|e| e.status == StubStatus::Created));
        assert!(
            settings
                .build_dir
                .join("rules/files/elec/Wiring/indoor/R-2/2/body.md")
                .is_file()
        );

        fs::write(&rule_doc, "edited\n").unwrap();
        let kept = export_stubs(&settings, StubMode::Create).unwrap();
        assert_eq!(kept.entries[1].status, StubStatus::Exists);
        assert_eq!(fs::read_to_string(&rule_doc).unwrap(), "edited\n");

        let overwritten = export_stubs(&settings, StubMode::Overwrite).unwrap();
        assert_eq!(overwritten.entries[1].status, StubStatus::Updated);
        assert!(fs::read_to_string(&rule_doc).unwrap().starts_with("# R-2 第二規程\n"));

        let lines = export_stubs(&settings, StubMode::CheckOnly).unwrap().tree_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("├ "));
        assert!(lines[0].ends_with("R-1/body.md (exists): OK"));
        assert!(lines[3].starts_with("  └ "));

        let _ = fs::remove_dir_all(&settings.root);
    }

    #[test]
    fn json_source_cannot_export_stubs() {
        let mut settings = scratch_settings();
        settings.source = DataSource::Json {
            rows: settings.root.join("rows.json"),
        };
        assert!(matches!(
            export_stubs(&settings, StubMode::Create),
            Err(SiteError::ConfigMissing(_))
        ));
        let _ = fs::remove_dir_all(&settings.root);
    }

    #[test]
    fn failed_status_counts_as_ng() {
        assert!(StubStatus::Created.is_ok());
        assert!(!StubStatus::Missing.is_ok());
        assert_eq!(StubStatus::Failed("PermissionDenied".to_string()).to_string(), "failed(PermissionDenied)");
    }
}
