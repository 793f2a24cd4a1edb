use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use shared::Level;

use crate::error::SiteError;
use crate::textio::read_text_auto;

/// Raw cells for one hierarchy level of a flat row.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LevelCells {
    pub key: Option<String>,
    pub title: Option<String>,
    pub alt_title: Option<String>,
    /// Explicit path segment; overrides titles and key when building paths.
    pub segment: Option<String>,
}

impl LevelCells {
    fn has_key(&self) -> bool {
        self.key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
impl LevelCells {
    pub fn keyed(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_alt_title(mut self, alt_title: impl Into<String>) -> Self {
        self.alt_title = Some(alt_title.into());
        self
    }

    pub fn with_segment(mut self, segment: impl Into<String>) -> Self {
        self.segment = Some(segment.into());
        self
    }
}

/// One joined input row: Type, Major, Sub, Rule and an optional Chapter.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct FlatRow {
    #[serde(rename = "type")]
    pub kind: LevelCells,
    pub major: LevelCells,
    pub sub: LevelCells,
    pub rule: LevelCells,
    pub chapter: Option<LevelCells>,
}

impl FlatRow {
    /// Drops a chapter whose key is blank so the row ends at the rule level.
    pub fn normalized(mut self) -> Self {
        if !self.chapter.as_ref().is_some_and(LevelCells::has_key) {
            self.chapter = None;
        }
        self
    }

    /// Levels this row contributes, outermost first.
    pub fn levels(&self) -> Vec<(Level, &LevelCells)> {
        let mut levels = vec![
            (Level::Type, &self.kind),
            (Level::Major, &self.major),
            (Level::Sub, &self.sub),
            (Level::Rule, &self.rule),
        ];
        if let Some(chapter) = self.chapter.as_ref().filter(|cells| cells.has_key()) {
            levels.push((Level::Chapter, chapter));
        }
        levels
    }
}

pub trait RowSource {
    fn describe(&self) -> String;
    fn load_rows(&self) -> Result<Vec<FlatRow>, SiteError>;
}

/// Rows stored as a JSON array of `FlatRow` objects.
pub struct JsonRows {
    pub path: PathBuf,
}

impl JsonRows {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RowSource for JsonRows {
    fn describe(&self) -> String {
        format!("json rows {}", self.path.display())
    }

    fn load_rows(&self) -> Result<Vec<FlatRow>, SiteError> {
        if !self.path.is_file() {
            return Err(SiteError::ConfigMissing(format!(
                "rows file not found: {}",
                self.path.display()
            )));
        }
        let text = read_text_auto(&self.path)?;
        let rows: Vec<FlatRow> = serde_json::from_str(&text)?;
        Ok(rows.into_iter().map(FlatRow::normalized).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn blank_chapter_key_ends_row_at_rule() {
        let row = FlatRow {
            rule: LevelCells::keyed("R-1"),
            chapter: Some(LevelCells::keyed("  ").with_title("ignored")),
            ..FlatRow::default()
        };
        assert_eq!(row.levels().len(), 4);
        assert_eq!(row.clone().normalized().chapter, None);

        let with_chapter = FlatRow {
            chapter: Some(LevelCells::keyed("1")),
            ..row
        };
        let levels = with_chapter.levels();
        assert_eq!(levels.len(), 5);
        assert_eq!(levels[4].0, Level::Chapter);
    }

    #[test]
    fn json_rows_accept_partial_objects() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = env::temp_dir().join(format!("sitegen_rows_{nanos}"));
        fs::create_dir_all(&root).unwrap();
        let path = root.join("rows.json");
        fs::write(
            &path,
            r#"[
                {"type": {"key": "1", "title": "電気"}, "rule": {"key": "R-1"}},
                {"type": {"key": "1"}, "rule": {"key": "R-2"}, "chapter": {"key": ""}}
            ]"#,
        )
        .unwrap();

        let rows = JsonRows::new(&path).load_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].kind.title.as_deref(), Some("電気"));
        assert_eq!(rows[0].major, LevelCells::default());
        assert_eq!(rows[1].chapter, None);

        let missing = JsonRows::new(root.join("nope.json")).load_rows();
        assert!(matches!(missing, Err(SiteError::ConfigMissing(_))));

        let _ = fs::remove_dir_all(&root);
    }
}
