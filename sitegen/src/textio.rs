use std::fs;
use std::path::Path;

use encoding_rs::SHIFT_JIS;

use crate::error::SiteError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decodes raw bytes as UTF-8 (BOM stripped), falling back to Shift_JIS/CP932.
pub fn decode_text(bytes: &[u8]) -> Option<String> {
    let without_bom = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(without_bom) {
        return Some(text.to_string());
    }

    let (cow, had_errors) = SHIFT_JIS.decode_without_bom_handling(bytes);
    if had_errors {
        return None;
    }
    Some(cow.into_owned())
}

pub fn read_text_auto(path: &Path) -> Result<String, SiteError> {
    let bytes = fs::read(path).map_err(|e| SiteError::io(path, e))?;
    decode_text(&bytes).ok_or_else(|| SiteError::Decode {
        path: path.to_path_buf(),
    })
}

/// Writes UTF-8 without BOM, LF newlines, creating parent directories.
pub fn write_text_utf8(path: &Path, text: &str) -> Result<(), SiteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SiteError::io(parent, e))?;
    }
    let normalized = text.replace("\r\n", "\n");
    fs::write(path, normalized).map_err(|e| SiteError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn decodes_utf8_bom_and_shift_jis() {
        assert_eq!(decode_text("電気".as_bytes()).as_deref(), Some("電気"));

        let mut with_bom = UTF8_BOM.to_vec();
        with_bom.extend_from_slice("# 見出し".as_bytes());
        assert_eq!(decode_text(&with_bom).as_deref(), Some("# 見出し"));

        let (sjis, _, _) = SHIFT_JIS.encode("配線規程");
        assert!(std::str::from_utf8(&sjis).is_err());
        assert_eq!(decode_text(&sjis).as_deref(), Some("配線規程"));

        assert_eq!(decode_text(&[0xFF, 0xFF, 0xFD]), None);
    }

    #[test]
    fn write_creates_parents_and_reads_back() {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let root = env::temp_dir().join(format!("sitegen_textio_{nanos}"));
        let target = root.join("a").join("b").join("body.html");

        write_text_utf8(&target, "line1\r\nline2\n").unwrap();
        let bytes = fs::read(&target).unwrap();
        assert!(!bytes.starts_with(UTF8_BOM));
        assert_eq!(read_text_auto(&target).unwrap(), "line1\nline2\n");

        let missing = read_text_auto(&root.join("missing.md"));
        assert!(matches!(missing, Err(SiteError::Io { .. })));

        let _ = fs::remove_dir_all(&root);
    }
}
