use crate::config::Config;
use crate::generator::DocumentGenerator;
use crate::parser::AstParser;
use crate::route_table::axum::AxumRouteTable;
use crate::route_table::manifest::ManifestRouteTable;
use crate::route_table::RouteTable;
use crate::serializer::{is_json_path, load_artifact, serialize_json, serialize_yaml, write_atomic};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Manifest file names looked up in the project root when `--routes` is not given.
const ROUTE_MANIFESTS: &[&str] = &["routes.yaml", "routes.yml", "routes.json"];

/// OpenAPI generator driven by annotations on handlers and models
#[derive(Parser, Debug)]
#[command(name = "openapi-from-annotations")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the OpenAPI document of a project
    Generate(GenerateArgs),
    /// Print a previously generated document
    Show(ShowArgs),
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path to the project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Configuration file (YAML or JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_path: Option<PathBuf>,

    /// Route manifest (YAML or JSON); defaults to routes.yaml in the project, else axum routers
    #[arg(short = 'r', long = "routes", value_name = "FILE")]
    pub routes_path: Option<PathBuf>,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, uses the configured output directory or stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Generated document (.json, .yaml or .yml)
    #[arg(value_name = "ARTIFACT")]
    pub artifact: PathBuf,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        }
    }

    fn accepts(self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        match self {
            OutputFormat::Yaml => extension == "yaml" || extension == "yml",
            OutputFormat::Json => extension == "json",
        }
    }
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if let Command::Generate(generate) = &args.command {
        if !generate.project_path.exists() {
            anyhow::bail!(
                "Project path does not exist: {}",
                generate.project_path.display()
            );
        }
        if !generate.project_path.is_dir() {
            anyhow::bail!(
                "Project path is not a directory: {}",
                generate.project_path.display()
            );
        }

        info!("Project path: {}", generate.project_path.display());
        info!("Output format: {:?}", generate.output_format);
        match &generate.output_path {
            Some(output) => info!("Output file: {}", output.display()),
            None => info!("Output: configured directory or stdout"),
        }
    }

    Ok(args)
}

/// Run the selected command
pub fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::Generate(generate) => run_generate(generate),
        Command::Show(show) => run_show(show),
    }
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let config = load_config(&args)?;
    let routes = route_table(&args, &config)?;

    let document = DocumentGenerator::new(&config, routes.as_ref()).generate();
    info!("OpenAPI document built successfully");

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&document)?,
        OutputFormat::Json => serialize_json(&document)?,
    };

    match output_path(args.output_path.as_deref(), &config, args.output_format) {
        Some(output_path) => {
            info!("Writing output to: {}", output_path.display());
            write_atomic(&content, &output_path)
                .with_context(|| format!("Failed to write {}", output_path.display()))?;
            info!("Successfully wrote OpenAPI document to {}", output_path.display());
        }
        None => println!("{}", content),
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Paths: {}", document.paths.len());
    info!("  - Operations: {}", document.operation_count());
    info!("  - Schemas: {}", document.components.schemas.len());
    info!("  - Tags: {}", document.tags.len());

    Ok(())
}

fn run_show(args: ShowArgs) -> Result<()> {
    let document = load_artifact(&args.artifact)
        .with_context(|| format!("Cannot show {}", args.artifact.display()))?;
    info!(
        "{} {}: {} paths, {} operations",
        document.info.title,
        document.info.version,
        document.paths.len(),
        document.operation_count()
    );

    let content = if is_json_path(&args.artifact) {
        serialize_json(&document)?
    } else {
        serialize_yaml(&document)?
    };
    println!("{}", content);
    Ok(())
}

fn load_config(args: &GenerateArgs) -> Result<Config> {
    let config = match &args.config_path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => {
            debug!("No configuration file given, using defaults");
            Config::default()
        }
    };
    Ok(config.with_project_root(&args.project_path))
}

/// The explicit manifest, a manifest in the project root, or the project's axum routers.
fn route_table(args: &GenerateArgs, config: &Config) -> Result<Box<dyn RouteTable>> {
    let manifest = args.routes_path.clone().or_else(|| {
        ROUTE_MANIFESTS
            .iter()
            .map(|name| args.project_path.join(name))
            .find(|path| path.is_file())
    });

    if let Some(path) = manifest {
        info!("Reading routes from manifest {}", path.display());
        let table = ManifestRouteTable::from_file(&path)
            .with_context(|| format!("Failed to load route manifest {}", path.display()))?;
        return Ok(Box::new(table));
    }

    let source_root = config.source_root();
    info!("Scanning axum routers under {}", source_root.display());
    let sources = AstParser::parse_dir(&source_root, &config.discovery.root_namespace)?;
    for warning in &sources.warnings {
        warn!("{}", warning);
    }
    if sources.files.is_empty() {
        warn!("No Rust files found under {}", source_root.display());
    }
    Ok(Box::new(AxumRouteTable::new(&sources.files)))
}

/// Where the artifact goes; `None` means stdout.
fn output_path(explicit: Option<&Path>, config: &Config, format: OutputFormat) -> Option<PathBuf> {
    if let Some(path) = explicit {
        let mut path = path.to_path_buf();
        match path.extension().and_then(|e| e.to_str()) {
            None => {
                path.set_extension(format.extension());
            }
            Some(extension) if !format.accepts(extension) => {
                warn!(
                    "Output file {} does not match the {} format",
                    path.display(),
                    format.extension()
                );
            }
            Some(_) => {}
        }
        return Some(path);
    }

    config.paths.output_directory.as_ref().map(|dir| {
        config.resolve_path(dir).join(format!(
            "{}.{}",
            config.paths.output_filename,
            format.extension()
        ))
    })
}
