use std::path::Path;

/// Calculate the CRC32 checksum of a byte buffer.
pub fn calculate_crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Normalise a path into a forward-slash relative key below `root`.
///
/// Backslashes are rewritten so keys are stable across platforms. A path
/// outside of `root` is normalised as-is.
pub fn normalise_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let text = relative.to_string_lossy().replace('\\', "/");
    text.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_crc32_is_stable() {
        let first = calculate_crc32(b"[proc,foo]()");
        let second = calculate_crc32(b"[proc,foo]()");
        assert_eq!(first, second);
        assert_ne!(first, calculate_crc32(b"[proc,bar]()"));
    }

    #[test]
    fn test_normalise_path() {
        let root = PathBuf::from("/project/src");
        let path = root.join("scripts").join("a.rs2");
        assert_eq!(normalise_path(&root, &path), "scripts/a.rs2");
    }

    #[test]
    fn test_normalise_path_rewrites_backslashes() {
        let root = PathBuf::from("");
        let path = PathBuf::from("scripts\\a.rs2");
        assert_eq!(normalise_path(&root, &path), "scripts/a.rs2");
    }
}
