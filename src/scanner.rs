use anyhow::Result;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for source directories.
///
/// The `FileScanner` recursively walks a directory and collects every Rust source file, skipping
/// `target` and hidden directories. Files are returned in a stable, name-sorted order so that
/// repeated runs over an unchanged tree discover entities in the same order.
///
/// # Example
///
/// ```no_run
/// use openapi_from_annotations::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./src"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} Rust files", result.rust_files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
}

/// Result of a directory scan.
pub struct ScanResult {
    /// Paths of all discovered `.rs` files
    pub rust_files: Vec<PathBuf>,
    /// Problems encountered on the way (inaccessible entries, missing root)
    pub warnings: Vec<String>,
}

impl FileScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all `.rs` files.
    ///
    /// A missing root directory is reported as a warning with an empty result: discovery over a
    /// directory that does not exist simply finds nothing.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut rust_files = Vec::new();
        let mut warnings = Vec::new();

        if !self.root_path.is_dir() {
            let warning = format!("Directory does not exist: {}", self.root_path.display());
            debug!("{}", warning);
            warnings.push(warning);
            return Ok(ScanResult {
                rust_files,
                warnings,
            });
        }

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                !file_name.starts_with('.') && file_name != "target"
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("rs") {
                        rust_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            rust_files,
            warnings,
        })
    }
}

/// Maps a source file to its module path under `namespace`.
///
/// `src/models/task.rs` under root `src` becomes `crate::models::task`; `mod.rs`, `lib.rs` and
/// `main.rs` name their parent module.
pub fn module_path_for(root: &Path, file: &Path, namespace: &str) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    let mut segments: Vec<String> = relative
        .components()
        .filter_map(|c| c.as_os_str().to_str().map(str::to_string))
        .collect();

    if let Some(last) = segments.pop() {
        let stem = last.strip_suffix(".rs").unwrap_or(&last).to_string();
        let names_parent = stem == "mod" || (segments.is_empty() && (stem == "lib" || stem == "main"));
        if !names_parent {
            segments.push(stem);
        }
    }

    let mut path = vec![namespace.to_string()];
    path.extend(segments.into_iter().map(|s| s.replace('-', "_")));
    path.retain(|s| !s.is_empty());
    path.join("::")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_nested_directories_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("models")).unwrap();
        fs::write(root.join("main.rs"), "fn main() {}").unwrap();
        fs::write(root.join("models/user.rs"), "struct User {}").unwrap();
        fs::write(root.join("models/task.rs"), "struct Task {}").unwrap();
        fs::write(root.join("readme.md"), "# README").unwrap();

        let scanner = FileScanner::new(root.to_path_buf());
        let result = scanner.scan().unwrap();

        assert!(result.warnings.is_empty());
        let names: Vec<String> = result
            .rust_files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["main.rs", "models/task.rs", "models/user.rs"]);
    }

    #[test]
    fn test_scan_skips_target_and_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir(root.join("target")).unwrap();
        fs::write(root.join("target/build.rs"), "fn main() {}").unwrap();
        fs::create_dir(root.join(".git")).unwrap();
        fs::write(root.join(".git/config.rs"), "// config").unwrap();
        fs::write(root.join("lib.rs"), "pub fn f() {}").unwrap();

        let result = FileScanner::new(root.to_path_buf()).scan().unwrap();

        assert_eq!(result.rust_files.len(), 1);
        assert_eq!(
            result.rust_files[0].file_name().unwrap().to_string_lossy(),
            "lib.rs"
        );
    }

    #[test]
    fn test_scan_missing_directory_is_not_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("app/Models");

        let result = FileScanner::new(missing).scan().unwrap();

        assert!(result.rust_files.is_empty());
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_module_path_for() {
        let root = Path::new("src");
        assert_eq!(
            module_path_for(root, Path::new("src/models/task.rs"), "crate"),
            "crate::models::task"
        );
        assert_eq!(
            module_path_for(root, Path::new("src/models/mod.rs"), "crate"),
            "crate::models"
        );
        assert_eq!(module_path_for(root, Path::new("src/lib.rs"), "crate"), "crate");
        assert_eq!(
            module_path_for(root, Path::new("src/http/task-controller.rs"), "app"),
            "app::http::task_controller"
        );
    }
}
