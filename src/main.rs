use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use csharp_completion::completion::{CompletionEngine, ScriptInputs, SnapshotResolver};
use csharp_completion::config::CompletionConfig;
use csharp_completion::document::DocumentSnapshot;
use csharp_completion::editor::search_bracket;
use csharp_completion::logging::init_logger;
use csharp_completion::parsers::TreeSitterCSharpParser;
use csharp_completion::project::{SharedProject, SourceModel};

#[derive(Parser)]
#[command(name = "csharp-complete")]
#[command(about = "C# code completion against referenced assemblies", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level for stderr (otherwise RUST_LOG, then the config, then "info")
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable ANSI colors in stderr output
    #[arg(long, global = true)]
    no_color: bool,

    /// Also write a debug session log under the user cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print completion candidates at an offset as JSON
    Complete {
        /// Document to complete in
        file: PathBuf,

        /// Caret offset in characters (default: end of the document)
        #[arg(short, long)]
        offset: Option<usize>,

        /// Behave like Ctrl+Space instead of a typed character
        #[arg(short, long)]
        explicit: bool,

        /// Scripting usings, e.g. "using System; using System.Linq;"
        #[arg(long)]
        usings: Option<String>,

        /// Scripting variable declarations, e.g. "int count; var p = new Point();"
        #[arg(long)]
        vars: Option<String>,

        /// Scripting namespace
        #[arg(long)]
        namespace: Option<String>,

        /// Additional assembly reference (name or path); repeatable
        #[arg(short, long = "reference")]
        references: Vec<String>,

        /// Additional C# source file contributing types; repeatable
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        /// Base directory for reference probing
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the bracket pair matching the character before an offset as JSON
    Brackets {
        file: PathBuf,

        /// Caret offset in characters
        #[arg(short, long)]
        offset: usize,
    },
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CompletionConfig::load(path)?,
        None => CompletionConfig::default(),
    };
    let log_level = cli.log_level.clone().or_else(|| config.log_level.clone());
    let _guard = init_logger(cli.no_color, log_level.as_deref(), cli.log_file)
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Complete {
            file,
            offset,
            explicit,
            usings,
            vars,
            namespace,
            references,
            sources,
            working_dir,
            pretty,
        } => {
            if working_dir.is_some() {
                config.working_dir = working_dir;
            }
            config.references.extend(references);

            let project = Arc::new(SharedProject::new());
            let metadata = config.metadata_cache(project.clone());
            let defaults = metadata.load_defaults().context("Failed to load default assemblies")?;
            let added = metadata
                .add_references(&config.references)
                .context("Failed to load references")?;
            info!("{} default and {} additional assemblies loaded", defaults, added);

            let parser = Arc::new(TreeSitterCSharpParser::new());
            let source_model = SourceModel::new(project.clone(), parser.clone());
            for source in &sources {
                let text = read_source(source)?;
                if !source_model.process_input(&text, &source.to_string_lossy()) {
                    debug!("{} declares no types", source.display());
                }
            }

            let text = read_source(&file)?;
            let file_name = file.to_string_lossy();
            source_model.process_input(&text, &file_name);
            let document = DocumentSnapshot::new(Some(&file_name), &text);
            let offset = offset.unwrap_or_else(|| document.len_chars());

            let engine = CompletionEngine::new(
                project,
                parser,
                Arc::new(SnapshotResolver::new()),
                Arc::new(config.caller_tables()),
            );
            let inputs = ScriptInputs {
                usings,
                variables: vars,
                namespace,
            };
            let result = engine.get_completions_with(&document, offset, explicit, &inputs)?;

            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", json);
        }
        Commands::Brackets { file, offset } => {
            let text = read_source(&file)?;
            let result = search_bracket(&text, offset);
            println!("{}", serde_json::to_string(&result)?);
        }
    }
    Ok(())
}
