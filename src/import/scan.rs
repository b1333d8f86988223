//! Input folder scanning

use super::archive::ArchiveFormat;
use std::path::{Path, PathBuf};

/// Trailing number of an archive name before all extensions:
/// `EGRUL_FULL_2024_17.zip` -> 17, `EGRIP_3.xml.bz2` -> 3
fn archive_number(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// List the inputs directly inside `dir` that [`ArchiveFormat::detect`]
/// recognizes (`*.zip`, `*.xml.bz2`, `*.xml`).
///
/// Archives are ordered by their trailing number; names without one sort last,
/// by name.
pub fn scan_archives(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("input folder '{}' does not exist", dir.display()),
        ));
    }

    let mut archives: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| ArchiveFormat::detect(p).is_some())
        .collect();

    archives.sort_by(|a, b| {
        let key_a = (archive_number(a).is_none(), archive_number(a), a.file_name());
        let key_b = (archive_number(b).is_none(), archive_number(b), b.file_name());
        key_a.cmp(&key_b)
    });
    Ok(archives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_number() {
        assert_eq!(archive_number(Path::new("EGRUL_FULL_17.zip")), Some(17));
        assert_eq!(archive_number(Path::new("part2.ZIP")), Some(2));
        assert_eq!(archive_number(Path::new("EGRIP_3.xml.bz2")), Some(3));
        assert_eq!(archive_number(Path::new("latest.zip")), None);
    }

    #[test]
    fn test_scan_sorts_numerically_and_filters() {
        let temp_dir = TempDir::new().unwrap();
        for name in [
            "egrul_10.zip",
            "egrul_2.ZIP",
            "egrul_1.zip",
            "extra.zip",
            "egrul_5.xml.bz2",
            "egrul_3.xml",
            "notes.txt",
        ] {
            std::fs::write(temp_dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(temp_dir.path().join("nested")).unwrap();
        std::fs::write(temp_dir.path().join("nested/egrul_0.zip"), b"").unwrap();

        let names: Vec<_> = scan_archives(temp_dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "egrul_1.zip",
                "egrul_2.ZIP",
                "egrul_3.xml",
                "egrul_5.xml.bz2",
                "egrul_10.zip",
                "extra.zip"
            ]
        );
    }

    #[test]
    fn test_scan_missing_folder() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan_archives(&temp_dir.path().join("absent")).is_err());
    }
}
