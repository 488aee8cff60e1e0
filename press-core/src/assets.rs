use std::collections::BTreeMap;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::builder::{BuildContext, BuildError};
use crate::walk::{mirror_dir, relative, slash_path, walk};

/// Original path relative to the public directory → published path, always
/// starting with `/`.
pub type AssetMap = BTreeMap<String, String>;

const HASH_LEN: usize = 8;

/// Copies the public directory into the output directory, renaming files
/// whose extension is configured for hashing, and returns the asset map.
pub fn publish_assets(ctx: &mut BuildContext<'_>) -> Result<AssetMap, BuildError> {
    let root = ctx.config.directories.public.clone();
    let mut assets = AssetMap::new();

    for entry in walk(&root) {
        let entry = entry?;
        let path = entry.path();

        if entry.file_type().is_dir() {
            if entry.depth() > 0 {
                mirror_dir(path, &root, &ctx.output)?;
            }
            continue;
        }

        ctx.processing(path);

        let bytes = std::fs::read(path).map_err(|e| BuildError::Io {
            action: "could not read file",
            path: path.to_path_buf(),
            source: e,
        })?;

        let rel = relative(path, &root)?;
        let mut published = rel.to_path_buf();
        if should_hash(path, &ctx.config.build.hash) {
            let file_name = entry.file_name().to_string_lossy();
            published.set_file_name(hashed_file_name(&file_name, &content_hash(&bytes)));
        }

        let out = ctx.output.join(&published);
        std::fs::write(&out, &bytes).map_err(|e| BuildError::Io {
            action: "could not write file",
            path: out.clone(),
            source: e,
        })?;

        assets.insert(slash_path(rel), format!("/{}", slash_path(&published)));
    }

    Ok(assets)
}

/// First eight hex characters of the SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hash = hex::encode(digest);
    hash.truncate(HASH_LEN);
    hash
}

/// `app.js` → `app.<hash>.js`; the fragment goes before the last extension.
pub fn hashed_file_name(name: &str, hash: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}.{}.{}", stem, hash, ext),
        None => format!("{}.{}", name, hash),
    }
}

fn should_hash(path: &Path, exts: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    exts.iter().any(|e| e.trim_start_matches('.') == ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hashed_file_name() {
        assert_eq!(hashed_file_name("app.js", "a1b2c3d4"), "app.a1b2c3d4.js");
        assert_eq!(hashed_file_name("vendor.min.js", "a1b2c3d4"), "vendor.min.a1b2c3d4.js");
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(b"body { color: red }");
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, content_hash(b"body { color: red }"));
        assert_ne!(a, content_hash(b"body { color: blue }"));
    }

    #[test]
    fn test_should_hash_with_or_without_dot() {
        let exts = vec![".css".to_string(), "js".to_string()];
        assert!(should_hash(Path::new("a/site.css"), &exts));
        assert!(should_hash(Path::new("app.js"), &exts));
        assert!(!should_hash(Path::new("favicon.ico"), &exts));
        assert!(!should_hash(Path::new("LICENSE"), &exts));
    }
}
