use std::ffi::OsString;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use tokio::fs;
use tracing::{debug, warn};

use crate::dispatch::{FileKind, FileSource};
use crate::error::{Result, ValidationError};

/// Name of the directory holding the serialized node tree.
pub const JCR_ROOT: &str = "jcr_root";

/// Build a glob set from patterns. Patterns match `/`-separated paths relative to `jcr_root`.
pub fn build_glob_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }

    let set = builder
        .build()
        .map_err(|e| ValidationError::Config(format!("Failed to build glob set: {}", e)))?;
    Ok(Some(set))
}

fn compile_glob(pattern: &str) -> Result<Glob> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| ValidationError::Config(format!("Invalid glob pattern '{}': {}", pattern, e)))
}

/// One file of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    /// Path relative to `jcr_root`, `/`-separated
    pub relative_path: PathBuf,
    pub absolute_path: PathBuf,
}

impl PackageEntry {
    pub fn source(&self) -> FileSource {
        FileSource::new(&self.absolute_path)
    }

    pub fn classify(&self, docview_extensions: &[String]) -> std::io::Result<FileKind> {
        FileKind::classify(&self.source(), &self.relative_path, docview_extensions)
    }
}

/// The enumerated contents of a package.
#[derive(Debug, Clone)]
pub struct Package {
    /// Absolute path of `jcr_root`
    pub root: PathBuf,
    /// Files in lexicographic order of their relative path
    pub entries: Vec<PackageEntry>,
}

impl Package {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Async package reader: finds `jcr_root` and lists the files below it.
#[derive(Debug, Clone, Default)]
pub struct PackageReader {
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    follow_symlinks: bool,
}

impl PackageReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only files matching at least one pattern are listed
    pub fn with_include_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.include_set = build_glob_set(patterns)?;
        Ok(self)
    }

    /// Files matching any pattern are left out
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self> {
        self.exclude_set = build_glob_set(patterns)?;
        Ok(self)
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Resolve `path` to its `jcr_root`: either `path` itself or `path/jcr_root`.
    pub async fn locate_root(&self, path: &Path) -> Result<PathBuf> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| ValidationError::PackageLayout {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !metadata.is_dir() {
            return Err(ValidationError::PackageLayout {
                path: path.to_path_buf(),
                reason: "not a directory".to_string(),
            });
        }

        let root = if path.file_name().is_some_and(|name| name == JCR_ROOT) {
            path.to_path_buf()
        } else {
            let candidate = path.join(JCR_ROOT);
            match fs::metadata(&candidate).await {
                Ok(metadata) if metadata.is_dir() => candidate,
                _ => {
                    return Err(ValidationError::PackageLayout {
                        path: path.to_path_buf(),
                        reason: format!("no {} directory found", JCR_ROOT),
                    });
                }
            }
        };

        Ok(fs::canonicalize(&root).await.unwrap_or(root))
    }

    /// Locate `jcr_root` below `path` and enumerate its files.
    pub async fn read_package(&self, path: &Path) -> Result<Package> {
        let root = self.locate_root(path).await?;
        let mut entries = Vec::new();
        let mut open_dirs = vec![root.clone()];
        self.collect(&root, &root, &mut entries, &mut open_dirs).await?;
        entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

        debug!(root = %root.display(), files = entries.len(), "package enumerated");
        Ok(Package { root, entries })
    }

    /// `open_dirs` holds the canonical paths of the directories being walked, so a symlink
    /// back to one of them is not followed again.
    fn collect<'a>(
        &'a self,
        root: &'a Path,
        dir: &'a Path,
        entries: &'a mut Vec<PackageEntry>,
        open_dirs: &'a mut Vec<PathBuf>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut read_dir =
                fs::read_dir(dir)
                    .await
                    .map_err(|e| ValidationError::FileSystemTraversal {
                        path: dir.to_path_buf(),
                        reason: e.to_string(),
                    })?;

            while let Some(entry) =
                read_dir
                    .next_entry()
                    .await
                    .map_err(|e| ValidationError::FileSystemTraversal {
                        path: dir.to_path_buf(),
                        reason: e.to_string(),
                    })?
            {
                let entry_path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        warn!(path = %entry_path.display(), error = %e, "cannot stat entry, skipped");
                        continue;
                    }
                };

                let (is_dir, is_file) = if file_type.is_symlink() {
                    if !self.follow_symlinks {
                        continue;
                    }
                    match fs::metadata(&entry_path).await {
                        Ok(target) => (target.is_dir(), target.is_file()),
                        Err(e) => {
                            warn!(path = %entry_path.display(), error = %e, "dangling symlink, skipped");
                            continue;
                        }
                    }
                } else {
                    (file_type.is_dir(), file_type.is_file())
                };

                if is_dir {
                    let canonical = if self.follow_symlinks {
                        fs::canonicalize(&entry_path).await.ok()
                    } else {
                        None
                    };
                    if let Some(canonical) = &canonical
                        && open_dirs.contains(canonical)
                    {
                        warn!(path = %entry_path.display(), "symlink cycle, directory skipped");
                        continue;
                    }

                    let tracked = canonical.is_some();
                    open_dirs.extend(canonical);
                    let walked = self.collect(root, &entry_path, entries, open_dirs).await;
                    if tracked {
                        open_dirs.pop();
                    }
                    if let Err(e) = walked {
                        warn!(path = %entry_path.display(), error = %e, "directory skipped");
                    }
                } else if is_file {
                    let Some(relative_path) = relative_to(root, &entry_path) else {
                        continue;
                    };
                    if self.should_include(&relative_path) {
                        entries.push(PackageEntry {
                            relative_path,
                            absolute_path: entry_path,
                        });
                    }
                }
            }

            Ok(())
        })
    }

    /// Include/exclude decision for a path relative to `jcr_root`.
    pub fn should_include(&self, relative_path: &Path) -> bool {
        if let Some(exclude_set) = &self.exclude_set
            && exclude_set.is_match(relative_path)
        {
            return false;
        }

        match &self.include_set {
            Some(include_set) => include_set.is_match(relative_path),
            None => true,
        }
    }
}

/// `/`-separated relative path of `path` below `root`.
fn relative_to(root: &Path, path: &Path) -> Option<PathBuf> {
    let relative = path.strip_prefix(root).ok()?;
    let mut joined = OsString::new();
    for (i, component) in relative.components().enumerate() {
        if i > 0 {
            joined.push("/");
        }
        joined.push(component.as_os_str());
    }
    Some(PathBuf::from(joined))
}
