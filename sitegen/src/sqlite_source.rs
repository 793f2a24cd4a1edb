use std::path::PathBuf;

use log::debug;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Row};
use serde::{Deserialize, Serialize};

use crate::error::SiteError;
use crate::rows::{FlatRow, LevelCells, RowSource};

/// Table and column names of the category/rule/chapter schema.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SchemaMap {
    pub type_table: String,
    pub type_key: String,
    pub type_title: String,
    pub type_alt_title: String,
    pub type_path: String,

    pub major_table: String,
    pub major_key: String,
    pub major_title: String,
    pub major_alt_title: String,
    pub major_parent: String,
    pub major_path: String,

    pub sub_table: String,
    pub sub_key: String,
    pub sub_title: String,
    pub sub_alt_title: String,
    pub sub_parent: String,
    pub sub_path: String,

    pub rule_table: String,
    pub rule_key: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_parent: String,
    pub rule_link: String,
    pub rule_created: String,
    pub rule_updated: String,

    pub chapter_table: String,
    pub chapter_key: String,
    pub chapter_rule_key: String,
    pub chapter_id: String,
    pub chapter_title: String,
    pub chapter_section_title: String,
    pub chapter_top_body: String,
    pub chapter_low_body: String,
    pub chapter_reference: String,
}

impl Default for SchemaMap {
    fn default() -> Self {
        let s = |name: &str| name.to_string();
        Self {
            type_table: s("cat_type"),
            type_key: s("key_cat_type"),
            type_title: s("title_jp"),
            type_alt_title: s("title_en"),
            type_path: s("path"),

            major_table: s("cat_major"),
            major_key: s("key_cat_major"),
            major_title: s("title_jp"),
            major_alt_title: s("title_en"),
            major_parent: s("key_cat_type"),
            major_path: s("path"),

            sub_table: s("cat_sub"),
            sub_key: s("key_cat_sub"),
            sub_title: s("title_jp"),
            sub_alt_title: s("title_en"),
            sub_parent: s("key_cat_major"),
            sub_path: s("path"),

            rule_table: s("rules"),
            rule_key: s("key_rule"),
            rule_id: s("id_rule"),
            rule_name: s("name_rule"),
            rule_parent: s("key_cat_sub"),
            rule_link: s("link"),
            rule_created: s("created_date"),
            rule_updated: s("update_date"),

            chapter_table: s("request"),
            chapter_key: s("key_req"),
            chapter_rule_key: s("key_rule"),
            chapter_id: s("id_cap"),
            chapter_title: s("title_capter"),
            chapter_section_title: s("title_section"),
            chapter_top_body: s("top_body"),
            chapter_low_body: s("low_body"),
            chapter_reference: s("reference"),
        }
    }
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

impl SchemaMap {
    /// Type, Major and Sub columns (key, title, alternate title, path each).
    fn category_columns(&self) -> String {
        let q = |name: &str| quote_ident(name);
        format!(
            "ct.{}, ct.{}, ct.{}, ct.{},
  cm.{}, cm.{}, cm.{}, cm.{},
  cs.{}, cs.{}, cs.{}, cs.{}",
            q(&self.type_key),
            q(&self.type_title),
            q(&self.type_alt_title),
            q(&self.type_path),
            q(&self.major_key),
            q(&self.major_title),
            q(&self.major_alt_title),
            q(&self.major_path),
            q(&self.sub_key),
            q(&self.sub_title),
            q(&self.sub_alt_title),
            q(&self.sub_path),
        )
    }

    /// Rules joined up through their category chain.
    fn rules_with_categories(&self) -> String {
        let q = |name: &str| quote_ident(name);
        format!(
            "FROM {rule_table} r
JOIN {sub_table} cs ON cs.{sub_key} = r.{rule_parent}
JOIN {major_table} cm ON cm.{major_key} = cs.{sub_parent}
JOIN {type_table} ct ON ct.{type_key} = cm.{major_parent}",
            rule_table = q(&self.rule_table),
            sub_table = q(&self.sub_table),
            sub_key = q(&self.sub_key),
            rule_parent = q(&self.rule_parent),
            major_table = q(&self.major_table),
            major_key = q(&self.major_key),
            sub_parent = q(&self.sub_parent),
            type_table = q(&self.type_table),
            type_key = q(&self.type_key),
            major_parent = q(&self.major_parent),
        )
    }

    fn category_order(&self) -> String {
        format!(
            "ct.{}, cm.{}, cs.{}, r.{}",
            quote_ident(&self.type_key),
            quote_ident(&self.major_key),
            quote_ident(&self.sub_key),
            quote_ident(&self.rule_id),
        )
    }

    /// Joined hierarchy query: every rule with its category chain and, when
    /// present, each distinct chapter.
    pub fn hierarchy_sql(&self) -> String {
        let q = |name: &str| quote_ident(name);
        format!(
            "WITH caps AS (
  SELECT DISTINCT
    CAST({req_rule} AS INTEGER) AS key_rule_int,
    {req_id} AS id_cap,
    {req_title} AS title_capter
  FROM {req_table}
)
SELECT
  {categories},
  r.{rule_id}, r.{rule_name},
  caps.id_cap, caps.title_capter
{from}
LEFT JOIN caps ON caps.key_rule_int = r.{rule_key}
ORDER BY {order}, caps.id_cap",
            req_rule = q(&self.chapter_rule_key),
            req_id = q(&self.chapter_id),
            req_title = q(&self.chapter_title),
            req_table = q(&self.chapter_table),
            categories = self.category_columns(),
            rule_id = q(&self.rule_id),
            rule_name = q(&self.rule_name),
            from = self.rules_with_categories(),
            rule_key = q(&self.rule_key),
            order = self.category_order(),
        )
    }

    /// One row per rule: category chain, then key, id, name, link, created and updated.
    pub fn rule_listing_sql(&self) -> String {
        let q = |name: &str| quote_ident(name);
        format!(
            "SELECT
  {categories},
  r.{rule_key}, r.{rule_id}, r.{rule_name}, r.{link}, r.{created}, r.{updated}
{from}
ORDER BY {order}",
            categories = self.category_columns(),
            rule_key = q(&self.rule_key),
            rule_id = q(&self.rule_id),
            rule_name = q(&self.rule_name),
            link = q(&self.rule_link),
            created = q(&self.rule_created),
            updated = q(&self.rule_updated),
            from = self.rules_with_categories(),
            order = self.category_order(),
        )
    }

    /// Request rows of one rule (bound as `?1`), grouped by chapter id.
    pub fn chapter_rows_sql(&self) -> String {
        let q = |name: &str| quote_ident(name);
        format!(
            "SELECT {id}, {title}, {section}, {top}, {low}, {reference}
FROM {table}
WHERE CAST({rule_key} AS INTEGER) = CAST(?1 AS INTEGER)
ORDER BY {id}, {key}",
            id = q(&self.chapter_id),
            title = q(&self.chapter_title),
            section = q(&self.chapter_section_title),
            top = q(&self.chapter_top_body),
            low = q(&self.chapter_low_body),
            reference = q(&self.chapter_reference),
            table = q(&self.chapter_table),
            rule_key = q(&self.chapter_rule_key),
            key = q(&self.chapter_key),
        )
    }
}

/// Renders any scalar cell as text; NULL and blobs become `None`.
pub(crate) fn cell(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(index)? {
        ValueRef::Null | ValueRef::Blob(_) => None,
        ValueRef::Integer(value) => Some(value.to_string()),
        ValueRef::Real(value) => Some(value.to_string()),
        ValueRef::Text(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
    })
}

pub(crate) fn category(row: &Row<'_>, first: usize) -> rusqlite::Result<LevelCells> {
    Ok(LevelCells {
        key: cell(row, first)?,
        title: cell(row, first + 1)?,
        alt_title: cell(row, first + 2)?,
        segment: cell(row, first + 3)?,
    })
}

fn flat_row(row: &Row<'_>) -> rusqlite::Result<FlatRow> {
    let chapter = match cell(row, 14)? {
        Some(id) => Some(LevelCells {
            key: Some(id),
            title: cell(row, 15)?,
            ..LevelCells::default()
        }),
        None => None,
    };
    Ok(FlatRow {
        kind: category(row, 0)?,
        major: category(row, 4)?,
        sub: category(row, 8)?,
        rule: LevelCells {
            key: cell(row, 12)?,
            title: cell(row, 13)?,
            ..LevelCells::default()
        },
        chapter,
    })
}

pub struct SqliteRows {
    pub database: PathBuf,
    pub schema: SchemaMap,
}

impl SqliteRows {
    pub fn new(database: impl Into<PathBuf>, schema: SchemaMap) -> Self {
        Self {
            database: database.into(),
            schema,
        }
    }
}

impl RowSource for SqliteRows {
    fn describe(&self) -> String {
        format!("sqlite database {}", self.database.display())
    }

    fn load_rows(&self) -> Result<Vec<FlatRow>, SiteError> {
        if !self.database.is_file() {
            return Err(SiteError::ConfigMissing(format!(
                "database not found: {}",
                self.database.display()
            )));
        }

        let conn = Connection::open_with_flags(&self.database, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let sql = self.schema.hierarchy_sql();
        debug!("SQL: {sql}");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], flat_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().map(FlatRow::normalized).collect())
    }
}
