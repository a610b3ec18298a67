use atomwire::chunker::Chunker;
use atomwire::cli::{Cli, Commands, ConfigAction};
use atomwire::config::{Config, ConfigValidator};
use atomwire::corpus::{context_block, CorpusManager, CorpusStore};
use atomwire::document::read_documents;
use atomwire::embedding::FastEmbedProvider;
use atomwire::error::{AtomwireError, Result};

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Handle commands
    match cli.command {
        Commands::Build { input } => {
            cmd_build(cli.config, input)?;
        }
        Commands::Query {
            query,
            limit,
            json,
            context,
        } => {
            cmd_query(cli.config, &query, limit, json, context)?;
        }
        Commands::Status => {
            cmd_status(cli.config)?;
        }
        Commands::Config { action } => {
            cmd_config(cli.config, action)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose {
        "atomwire=debug"
    } else {
        "atomwire=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn cmd_build(
    config_path: Option<std::path::PathBuf>,
    input: Option<std::path::PathBuf>,
) -> Result<()> {
    let config = load_config(config_path)?;

    let input = match input {
        Some(path) => path,
        None => config.sources_file()?,
    };

    tracing::info!("Building corpus from {:?}", input);

    let documents = read_documents(&input, config.sources.max_content_chars)?;

    let provider = FastEmbedProvider::new(&config.embedding.model)?;
    let manager = corpus_manager(&config)?;
    let report = manager.build(&provider, &documents)?;

    println!("✓ Corpus built");
    println!("  Documents read:    {}", report.documents_in);
    println!("  Documents indexed: {}", report.documents_indexed);
    if report.documents_filtered > 0 {
        println!("  Keyword-filtered:  {}", report.documents_filtered);
    }
    if report.documents_empty > 0 {
        println!("  Without content:   {}", report.documents_empty);
    }
    println!("  Chunks indexed:    {}", report.chunks);
    if report.degraded_embeddings > 0 {
        println!(
            "  ⚠ Degraded embeddings: {} (zero-vector fallback)",
            report.degraded_embeddings
        );
    }
    println!(
        "  Model: {} ({} dimensions)",
        config.embedding.model, report.dimension
    );
    println!("  Location: {}", manager.store().dir().display());

    Ok(())
}

fn cmd_query(
    config_path: Option<std::path::PathBuf>,
    query: &str,
    limit: Option<usize>,
    json: bool,
    context: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = corpus_manager(&config)?;
    let corpus = manager.load()?;

    // The corpus remembers which model built it; querying with anything
    // else would make the distances meaningless.
    let provider = FastEmbedProvider::new(&corpus.manifest().model)?;

    let limit = limit.unwrap_or(config.retrieval.default_limit);
    let results = corpus.query(&provider, query, limit)?;

    if json {
        let out = serde_json::to_string_pretty(&results).map_err(|e| AtomwireError::Json {
            source: e,
            context: "Failed to serialize query results".to_string(),
        })?;
        println!("{}", out);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results (corpus is empty)");
        return Ok(());
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{}. [distance {:.4}] {}",
            rank + 1,
            result.distance,
            result.source_url
        );
        if let Some(archive) = &result.archive_url {
            println!("   archived at {}", archive);
        }
        println!("   {}", result.text.trim());
        println!();
    }

    if context {
        println!("--- context ---");
        println!(
            "{}",
            context_block(&results, config.retrieval.context_max_chars)
        );
    }

    Ok(())
}

fn cmd_status(config_path: Option<std::path::PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let manager = corpus_manager(&config)?;

    println!("Atomwire Status");
    println!("===============");

    if !manager.store().exists() {
        println!("\nCorpus: none (run `atomwire build` to create one)");
        return Ok(());
    }

    let corpus = manager.load()?;
    let manifest = corpus.manifest();

    println!(
        "\nCorpus: {} chunks from {} documents",
        manifest.chunk_count, manifest.documents_indexed
    );
    println!(
        "  Built:    {}",
        manifest.built_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!("  Build id: {}", manifest.build_id);
    println!(
        "  Model:    {} ({} dimensions)",
        manifest.model, manifest.dimension
    );
    println!("  Location: {}", manager.store().dir().display());

    let counts = corpus.source_counts();
    if !counts.is_empty() {
        let mut by_count: Vec<(&String, &usize)> = counts.iter().collect();
        by_count.sort_by(|a, b| b.1.cmp(a.1).then(a.0.cmp(b.0)));

        println!("\nTop sources:");
        for (url, count) in by_count.into_iter().take(10) {
            println!("  {:>5}  {}", count, url);
        }
    }

    let covered = config
        .sources
        .sites
        .iter()
        .filter(|site| counts.keys().any(|url| url.starts_with(site.as_str())))
        .count();
    println!(
        "\nMonitored sites with indexed content: {}/{}",
        covered,
        config.sources.sites.len()
    );

    Ok(())
}

fn cmd_config(config_path: Option<std::path::PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json = serde_json::to_string_pretty(&config).map_err(|e| AtomwireError::Json {
                source: e,
                context: "Failed to serialize config".to_string(),
            })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file.or(config_path) {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = match config_path {
                Some(path) => path,
                None => Config::default_path()?,
            };

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            // Create parent directory
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| AtomwireError::Io {
                    source: e,
                    context: format!("Failed to create config directory: {:?}", parent),
                })?;
            }

            // Save default config
            let config = Config::default();
            config.save(&path)?;

            println!("✓ Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}

/// Wire a `CorpusManager` from the configuration.
fn corpus_manager(config: &Config) -> Result<CorpusManager> {
    let store = CorpusStore::new(&config.data_dir()?);
    let chunker = Chunker::new(config.chunk_policy());

    let mut manager = CorpusManager::new(store, chunker)
        .with_batching(config.embedding.batch_size, config.embedding.max_retries);

    if let Some(filter) = config.keyword_filter()? {
        manager = manager.with_keyword_filter(filter);
    }

    Ok(manager)
}

fn load_config(config_path: Option<std::path::PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if !path.exists() {
        tracing::warn!(
            "Config file not found, using defaults. Run 'atomwire config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        return Ok(config);
    }

    Config::load(&path)
}
