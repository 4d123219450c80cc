// parity-core/src/infrastructure/fs.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::infrastructure::error::InfrastructureError;

/// Writes `content` to `path` through a temporary file in the same directory,
/// then renames it into place. Readers see the old file or the new one,
/// never a partial write. Missing parent directories are created.
pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(
    path: P,
    content: C,
) -> Result<(), InfrastructureError> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(content.as_ref())?;
    temp_file
        .persist(path)
        .map_err(|e| InfrastructureError::Io(e.error))?;
    Ok(())
}

/// `{prefix}_{name}_{YYYYMMDD_HHMMSS_mmm}.json`. Characters of `name` that
/// could leave `dir` or break the file name become `_`.
pub fn artifact_file_name(prefix: &str, name: &str, at: DateTime<Utc>) -> String {
    let safe: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}_{safe}_{}.json", at.format("%Y%m%d_%H%M%S_%3f"))
}

/// Pretty JSON artifact under `dir`. Returns the written path.
pub fn write_json_artifact<T: Serialize>(
    dir: &Path,
    file_name: &str,
    value: &T,
) -> Result<PathBuf, InfrastructureError> {
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write_overwrites_existing() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("report.json");

        atomic_write(&file_path, "Initial")?;
        atomic_write(&file_path, "Updated")?;

        assert_eq!(fs::read_to_string(file_path)?, "Updated");
        Ok(())
    }

    #[test]
    fn test_artifact_file_name_is_one_path_component() -> Result<()> {
        let at = DateTime::parse_from_rfc3339("2024-03-05T07:08:09.012Z")?.with_timezone(&Utc);
        let name = artifact_file_name("validation", "../sales/orders copy", at);
        assert_eq!(name, "validation_.._sales_orders_copy_20240305_070809_012.json");
        assert_eq!(Path::new(&name).components().count(), 1);
        Ok(())
    }

    #[test]
    fn test_json_artifact_creates_directories() -> Result<()> {
        let dir = tempdir()?;
        let nested = dir.path().join("target").join("reports");
        let path = write_json_artifact(&nested, "summary.json", &serde_json::json!({"ok": true}))?;
        let back: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        assert_eq!(back["ok"], true);
        Ok(())
    }
}
