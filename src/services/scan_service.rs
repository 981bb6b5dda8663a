use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub const SCAN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "pdf"];

/// What kind of source a scanned file is. Drives extraction dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Pdf,
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

pub fn source_kind(path: &Path) -> Option<SourceKind> {
    let ext = lowercase_extension(path)?;
    if !SCAN_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(if ext == "pdf" {
        SourceKind::Pdf
    } else {
        SourceKind::Image
    })
}

pub fn is_scan_candidate(path: &Path) -> bool {
    source_kind(path).is_some()
}

/// Lazily walks `root` and yields indexable files in a stable order. Each call
/// starts a fresh walk. Once `cancel` is set the iterator ends early; no error
/// is reported for the truncated walk.
pub fn scan<'a>(root: &Path, cancel: &'a AtomicBool) -> impl Iterator<Item = PathBuf> + 'a {
    walkdir::WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .take_while(move |_| !cancel.load(Ordering::Acquire))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .filter(|path| is_scan_candidate(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_source_kind() {
        assert_eq!(source_kind(Path::new("a.PNG")), Some(SourceKind::Image));
        assert_eq!(source_kind(Path::new("scan.JpEg")), Some(SourceKind::Image));
        assert_eq!(source_kind(Path::new("b.bmp")), Some(SourceKind::Image));
        assert_eq!(source_kind(Path::new("doc.Pdf")), Some(SourceKind::Pdf));
        assert_eq!(source_kind(Path::new("notes.txt")), None);
        assert_eq!(source_kind(Path::new("photo.webp")), None);
        assert_eq!(source_kind(Path::new("noext")), None);
    }

    #[test]
    fn test_scan_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("sub/b.PDF"));
        touch(&dir.path().join("sub/deeper/c.png"));
        touch(&dir.path().join("readme.txt"));
        fs::create_dir_all(dir.path().join("empty.png.d")).unwrap();

        let cancel = AtomicBool::new(false);
        let found: Vec<PathBuf> = scan(dir.path(), &cancel).collect();

        assert_eq!(
            found,
            vec![
                dir.path().join("a.jpg"),
                dir.path().join("sub/b.PDF"),
                dir.path().join("sub/deeper/c.png"),
            ]
        );
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        let cancel = AtomicBool::new(false);

        assert_eq!(scan(dir.path(), &cancel).count(), 1);
        touch(&dir.path().join("b.jpg"));
        assert_eq!(scan(dir.path(), &cancel).count(), 2);
    }

    #[test]
    fn test_scan_stops_when_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            touch(&dir.path().join(format!("{i}.png")));
        }

        let cancel = AtomicBool::new(false);
        let mut walk = scan(dir.path(), &cancel);
        assert!(walk.next().is_some());
        cancel.store(true, Ordering::Release);
        assert_eq!(walk.count(), 0);

        let cancelled = AtomicBool::new(true);
        assert_eq!(scan(dir.path(), &cancelled).count(), 0);
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let cancel = AtomicBool::new(false);
        let missing = std::env::temp_dir().join(format!("receipts_missing_{}", uuid::Uuid::new_v4()));
        assert_eq!(scan(&missing, &cancel).count(), 0);
    }
}
