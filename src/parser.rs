use crate::scanner::{module_path_for, FileScanner};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// AST parser for Rust source files.
///
/// The `AstParser` uses `syn` to turn source files into syntax trees. Annotations are read from
/// these trees; nothing in the analyzed project is compiled or executed.
///
/// # Example
///
/// ```no_run
/// use openapi_from_annotations::parser::AstParser;
/// use std::path::Path;
///
/// let parsed = AstParser::parse_file(Path::new("src/main.rs")).unwrap();
/// println!("Parsed {} items", parsed.syntax_tree.items.len());
/// ```
pub struct AstParser;

/// A successfully parsed Rust file.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    /// Path to the source file
    pub path: PathBuf,
    /// Module the file defines, e.g. `crate::models::task`
    pub module_path: String,
    /// The parsed syntax tree
    pub syntax_tree: syn::File,
}

impl ParsedFile {
    /// Parses in-memory source, mostly useful for tests and generated code.
    pub fn from_source(module_path: &str, source: &str) -> Result<Self> {
        let syntax_tree = syn::parse_file(source)
            .with_context(|| format!("Failed to parse Rust syntax in module: {}", module_path))?;
        Ok(ParsedFile {
            path: PathBuf::from(format!("{}.rs", module_path.replace("::", "/"))),
            module_path: module_path.to_string(),
            syntax_tree,
        })
    }
}

/// Parsed files of one source directory.
pub struct SourceSet {
    pub files: Vec<ParsedFile>,
    pub warnings: Vec<String>,
}

impl AstParser {
    /// Parses a single Rust source file into an AST.
    ///
    /// The module path is left empty; [`AstParser::parse_dir`] fills it in.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid Rust syntax.
    pub fn parse_file(path: &Path) -> Result<ParsedFile> {
        debug!("Parsing file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let syntax_tree = syn::parse_file(&content)
            .with_context(|| format!("Failed to parse Rust syntax in file: {}", path.display()))?;

        Ok(ParsedFile {
            path: path.to_path_buf(),
            module_path: String::new(),
            syntax_tree,
        })
    }

    /// Parses multiple files, continuing past failures.
    ///
    /// Returns one result per input path, in input order.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedFile>> {
        debug!("Parsing {} files", paths.len());

        let results: Vec<Result<ParsedFile>> = paths
            .iter()
            .map(|path| match Self::parse_file(path) {
                Ok(parsed) => Ok(parsed),
                Err(e) => {
                    warn!("Failed to parse {}: {}", path.display(), e);
                    Err(e)
                }
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }

    /// Scans `root`, parses every file and assigns module paths under `namespace`.
    ///
    /// Unreadable or unparsable files are skipped with a warning, as is a missing directory.
    pub fn parse_dir(root: &Path, namespace: &str) -> Result<SourceSet> {
        let scan = FileScanner::new(root.to_path_buf()).scan()?;
        let mut warnings = scan.warnings;
        let mut files = Vec::new();

        for (path, result) in scan.rust_files.iter().zip(Self::parse_files(&scan.rust_files)) {
            match result {
                Ok(mut parsed) => {
                    parsed.module_path = module_path_for(root, path, namespace);
                    files.push(parsed);
                }
                Err(e) => warnings.push(format!("{:#}", e)),
            }
        }

        debug!("Parsed {} files under {}", files.len(), root.display());
        Ok(SourceSet { files, warnings })
    }
}
