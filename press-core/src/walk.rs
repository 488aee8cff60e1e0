//! Directory walking shared by the pipeline stages.

use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::builder::BuildError;

/// Walks `root` in lexical order, skipping any directory below it that is
/// named like the root itself (`public/public`, `pages/pages`).
pub fn walk(root: &Path) -> impl Iterator<Item = Result<DirEntry, BuildError>> + use<> {
    walk_with(root, true)
}

/// Walks `root` in lexical order without the self-nesting guard.
pub fn walk_flat(root: &Path) -> impl Iterator<Item = Result<DirEntry, BuildError>> + use<> {
    walk_with(root, false)
}

fn walk_with(
    root: &Path,
    guard: bool,
) -> impl Iterator<Item = Result<DirEntry, BuildError>> + use<> {
    let root_name = root.file_name().map(|n| n.to_os_string());
    let walk_root = root.to_path_buf();

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            let nested = guard && is_self_nested(entry, root_name.as_deref());
            if nested {
                log::debug!(target: "builder", "skipping self-nested directory {:?}", entry.path());
            }
            !nested
        })
        .map(move |entry| {
            entry.map_err(|e| BuildError::Walk {
                path: walk_root.clone(),
                source: e,
            })
        })
}

/// The self-nesting guard: a directory below the walk root carrying the
/// root's own name is never mirrored into the output.
pub fn is_self_nested(entry: &DirEntry, root_name: Option<&std::ffi::OsStr>) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && root_name.is_some_and(|name| entry.file_name() == name)
}

/// Path of `path` relative to `root`.
pub fn relative<'a>(path: &'a Path, root: &Path) -> Result<&'a Path, BuildError> {
    path.strip_prefix(root)
        .map_err(|_| BuildError::InvalidPath(path.to_path_buf()))
}

/// Joins the normal components of a relative path with `/`.
pub fn slash_path(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Site-relative URL of a relative output path: `a/b.html` → `/a/b.html`.
pub fn url_path(rel: &Path) -> String {
    format!("/{}", slash_path(rel))
}

pub fn mkdir(path: &Path) -> Result<(), BuildError> {
    std::fs::create_dir_all(path).map_err(|e| BuildError::Io {
        action: "could not create directory",
        path: path.to_path_buf(),
        source: e,
    })
}

/// Mirrors a source directory below `root` into `output`.
pub fn mirror_dir(dir: &Path, root: &Path, output: &Path) -> Result<PathBuf, BuildError> {
    let target = output.join(relative(dir, root)?);
    mkdir(&target)?;
    Ok(target)
}
