//! SN-014: BLAKE3 hashing for templates, asset directories and logical IDs.

use glob::Pattern;
use std::io::Read;
use std::path::Path;

const STREAM_BUF_SIZE: usize = 65536;

/// Hash a file's contents. Returns `"blake3:{hex}"`.
pub fn hash_file(path: &Path) -> Result<String, String> {
    let mut file =
        std::fs::File::open(path).map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; STREAM_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| format!("read error {}: {}", path.display(), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

/// Hash a string. Returns `"blake3:{hex}"`.
pub fn hash_string(s: &str) -> String {
    format!("blake3:{}", blake3::hash(s.as_bytes()).to_hex())
}

/// First `len` uppercase hex characters of the BLAKE3 hash of `s`.
pub fn short_hex(s: &str, len: usize) -> String {
    let hex = blake3::hash(s.as_bytes()).to_hex();
    hex.as_str()[..len.min(hex.len())].to_ascii_uppercase()
}

/// Strip the `blake3:` prefix.
pub fn hex_digest(hash: &str) -> &str {
    hash.strip_prefix("blake3:").unwrap_or(hash)
}

/// Compile exclude globs, failing on the first invalid pattern.
pub fn compile_excludes(patterns: &[String]) -> Result<Vec<Pattern>, String> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| format!("invalid exclude pattern '{}': {}", p, e)))
        .collect()
}

/// Hash a directory (sorted walk, relative paths included in hash).
/// Skips symlinks and any relative path matching an exclude pattern.
pub fn hash_directory(path: &Path, excludes: &[Pattern]) -> Result<String, String> {
    let mut entries: Vec<(String, String)> = Vec::new();

    fn walk(
        base: &Path,
        current: &Path,
        excludes: &[Pattern],
        entries: &mut Vec<(String, String)>,
    ) -> Result<(), String> {
        let read_dir = std::fs::read_dir(current)
            .map_err(|e| format!("cannot read dir {}: {}", current.display(), e))?;
        let mut children: Vec<std::fs::DirEntry> = read_dir.filter_map(|e| e.ok()).collect();
        children.sort_by_key(|e| e.file_name());

        for entry in children {
            let ft = entry
                .file_type()
                .map_err(|e| format!("stat error: {}", e))?;
            if ft.is_symlink() {
                continue;
            }
            let path = entry.path();
            let rel = path
                .strip_prefix(base)
                .map_err(|e| format!("path prefix error: {}", e))?
                .to_string_lossy()
                .replace('\\', "/");
            if excludes.iter().any(|p| p.matches(&rel)) {
                continue;
            }
            if ft.is_file() {
                let hash = hash_file(&path)?;
                entries.push((rel, hash));
            } else if ft.is_dir() {
                walk(base, &path, excludes, entries)?;
            }
        }
        Ok(())
    }

    walk(path, path, excludes, &mut entries)?;

    let mut hasher = blake3::Hasher::new();
    for (rel, hash) in &entries {
        hasher.update(rel.as_bytes());
        hasher.update(b"\0");
        hasher.update(hash.as_bytes());
        hasher.update(b"\n");
    }
    Ok(format!("blake3:{}", hasher.finalize().to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sn014_hash_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Dockerfile");
        std::fs::write(&path, "FROM ruby:2.7").unwrap();
        let h = hash_file(&path).unwrap();
        assert!(h.starts_with("blake3:"));
        assert_eq!(h.len(), 7 + 64);
    }

    #[test]
    fn test_sn014_hash_string() {
        let h1 = hash_string("hello");
        let h2 = hash_string("hello");
        let h3 = hash_string("world");
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
        assert!(h1.starts_with("blake3:"));
    }

    #[test]
    fn test_sn014_short_hex() {
        let s = short_hex("DatabaseCluster/Secret", 8);
        assert_eq!(s.len(), 8);
        assert!(s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert_eq!(s, short_hex("DatabaseCluster/Secret", 8));
        assert_ne!(s, short_hex("DatabaseCluster/Other", 8));
    }

    #[test]
    fn test_sn014_hex_digest() {
        assert_eq!(hex_digest("blake3:abc"), "abc");
        assert_eq!(hex_digest("abc"), "abc");
    }

    #[test]
    fn test_sn014_hash_directory_order_independent_of_creation() {
        let d1 = tempfile::tempdir().unwrap();
        std::fs::write(d1.path().join("b.rb"), "bbb").unwrap();
        std::fs::write(d1.path().join("a.rb"), "aaa").unwrap();

        let d2 = tempfile::tempdir().unwrap();
        std::fs::write(d2.path().join("a.rb"), "aaa").unwrap();
        std::fs::write(d2.path().join("b.rb"), "bbb").unwrap();

        assert_eq!(
            hash_directory(d1.path(), &[]).unwrap(),
            hash_directory(d2.path(), &[]).unwrap()
        );
    }

    #[test]
    fn test_sn014_excluded_paths_do_not_change_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Gemfile"), "source 'x'").unwrap();
        let excludes = compile_excludes(&["tmp/**".to_string(), "tmp".to_string()]).unwrap();
        let before = hash_directory(dir.path(), &excludes).unwrap();

        std::fs::create_dir(dir.path().join("tmp")).unwrap();
        std::fs::write(dir.path().join("tmp").join("cache.bin"), "junk").unwrap();
        let after = hash_directory(dir.path(), &excludes).unwrap();
        assert_eq!(before, after);

        let unfiltered = hash_directory(dir.path(), &[]).unwrap();
        assert_ne!(before, unfiltered);
    }

    #[test]
    fn test_sn014_nested_content_changes_hash() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("app")).unwrap();
        std::fs::write(dir.path().join("app").join("main.rb"), "v1").unwrap();
        let h1 = hash_directory(dir.path(), &[]).unwrap();
        std::fs::write(dir.path().join("app").join("main.rb"), "v2").unwrap();
        let h2 = hash_directory(dir.path(), &[]).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_sn014_invalid_exclude_pattern() {
        let err = compile_excludes(&["[".to_string()]).unwrap_err();
        assert!(err.contains("invalid exclude pattern"));
    }

    #[test]
    fn test_sn014_hash_file_not_found() {
        assert!(hash_file(Path::new("/nonexistent/file.txt")).is_err());
    }
}
