use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use prp_ai::embeddings::OllamaEmbedder;
use prp_ai::guardrails::audit_citations;
use prp_ai::index::VectorIndex;
use prp_ai::llm::llm_from_config;
use prp_ai::ollama::OllamaClient;
use prp_ai::query::{run_query, QueryContext, QueryOptions};
use prp_core::config::PortalConfig;
use prp_core::error::AppError;
use prp_core::evidence::{build_evidence_table, EvidenceFormat};
use prp_core::fragment::read_fragments;
use prp_core::ingest::ingest_corpus;
use prp_core::manifest::Manifest;
use prp_core::runlog::RunLog;
use prp_core::thread::ResearchThread;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "prp",
    about = "Cited question answering over a fixed research corpus"
)]
struct Cli {
    /// JSON config file; relative paths inside resolve against its corpus_root
    #[arg(long, global = true, env = "PRP_CONFIG", conflicts_with = "root")]
    config: Option<PathBuf>,

    /// Corpus root using the conventional layout (data/, index/, logs/)
    #[arg(long, global = true, env = "PRP_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fragment every manifest source and rewrite the fragment store
    Ingest,
    /// Embed the fragment store and write the vector index
    BuildIndex,
    /// Answer a question from the indexed corpus
    Query {
        /// Question to ask
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        /// Number of fragments to retrieve (defaults to retrieval.top_k)
        #[arg(long, short = 'k')]
        top_k: Option<usize>,

        /// Query id recorded in the run log
        #[arg(long)]
        query_id: Option<String>,

        /// Retrieve only; show fragments and skip generation
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Do not append a reference list
        #[arg(long, default_value_t = false)]
        no_refs: bool,

        /// Do not append to the run log
        #[arg(long, default_value_t = false)]
        no_log: bool,

        /// Write the query, fragments and answer as a thread record
        #[arg(long)]
        save_thread: Option<PathBuf>,

        /// Print the full outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Build the claim/evidence table for a saved thread
    Evidence {
        thread: PathBuf,

        #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
        format: FormatArg,

        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Check every citation in a saved thread against its fragments and the manifest
    Audit { thread: PathBuf },
    /// Check that the local Ollama daemon answers
    Health,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Markdown,
    Csv,
    Html,
}

impl From<FormatArg> for EvidenceFormat {
    fn from(f: FormatArg) -> Self {
        match f {
            FormatArg::Markdown => EvidenceFormat::Markdown,
            FormatArg::Csv => EvidenceFormat::Csv,
            FormatArg::Html => EvidenceFormat::Html,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| AppError::new("CLI_TIME_FAILED", "Failed to format time").with_details(e.to_string()))
}

fn load_config(cli: &Cli) -> Result<PortalConfig, AppError> {
    let cfg = match (&cli.config, &cli.root) {
        (Some(path), _) => PortalConfig::load(path)?,
        (None, Some(root)) => PortalConfig::for_root(root.clone()),
        (None, None) => PortalConfig::for_root("."),
    };
    cfg.validate()?;
    Ok(cfg)
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let s = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("CLI_OUTPUT_FAILED", "Failed to encode output").with_details(e.to_string())
    })?;
    println!("{s}");
    Ok(())
}

fn write_output(out: Option<&Path>, content: &str) -> Result<(), AppError> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| {
                    AppError::new("EVIDENCE_EXPORT_FAILED", "Failed to create output directory")
                        .with_details(format!("path={}; err={}", parent.display(), e))
                })?;
            }
            fs::write(path, content).map_err(|e| {
                AppError::new("EVIDENCE_EXPORT_FAILED", "Failed to write output file")
                    .with_details(format!("path={}; err={}", path.display(), e))
            })?;
            info!(path = %path.display(), "output written");
            Ok(())
        }
        None => {
            println!("{content}");
            Ok(())
        }
    }
}

fn embedder_for(cfg: &PortalConfig) -> Result<OllamaEmbedder, AppError> {
    let client = OllamaClient::new(&cfg.embedding.base_url)?
        .with_timeout(Duration::from_secs(cfg.embedding.timeout_secs.max(1)));
    Ok(OllamaEmbedder::new(client))
}

fn cmd_ingest(cfg: &PortalConfig) -> Result<(), AppError> {
    let manifest = Manifest::load(&cfg.manifest_path)?;
    let report = ingest_corpus(cfg, &manifest)?;
    print_json(&report)
}

fn cmd_build_index(cfg: &PortalConfig) -> Result<(), AppError> {
    let fragments = read_fragments(&cfg.fragments_path)?;
    let embedder = embedder_for(cfg)?;
    let index = VectorIndex::build(&fragments, &embedder, &cfg.embedding.model)?;
    index.save(&cfg.index_dir)?;
    let map = index.chunk_map();
    print_json(&serde_json::json!({
        "model_name": map.model_name,
        "dimension": map.dimension,
        "num_chunks": map.num_chunks,
        "index_dir": cfg.index_dir.display().to_string(),
    }))
}

struct QueryArgs {
    text: String,
    top_k: Option<usize>,
    query_id: Option<String>,
    dry_run: bool,
    no_refs: bool,
    no_log: bool,
    save_thread: Option<PathBuf>,
    json: bool,
}

fn cmd_query(cfg: &PortalConfig, args: QueryArgs) -> Result<(), AppError> {
    let index = VectorIndex::load(&cfg.index_dir)?;
    index.ensure_model(&cfg.embedding.model)?;
    let embedder = embedder_for(cfg)?;

    // A missing manifest only disables references and tag suggestions at query time.
    let manifest = match Manifest::load(&cfg.manifest_path) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "manifest unavailable; references disabled");
            None
        }
    };
    let llm = llm_from_config(&cfg.generation)?;
    let log = RunLog::new(cfg.run_log_path());

    let ctx = QueryContext {
        index: &index,
        embedder: &embedder,
        llm: llm.as_ref(),
        generation_model: &cfg.generation.model,
        manifest: manifest.as_ref(),
        run_log: Some(&log),
        default_top_k: cfg.retrieval.top_k,
    };
    let opts = QueryOptions {
        top_k: args.top_k,
        query_id: args.query_id,
        dry_run: args.dry_run,
        attach_references: !args.no_refs,
        log_run: !args.no_log,
    };
    let outcome = run_query(&ctx, &args.text, &opts)?;

    if let Some(path) = args.save_thread.as_deref() {
        let thread_id = format!("T_{}", outcome.query_id.trim_start_matches("Q_"));
        outcome
            .to_thread(thread_id, now_rfc3339_utc()?)
            .to_json_file(path)?;
        info!(path = %path.display(), "thread saved");
    }

    if args.json {
        return print_json(&outcome);
    }
    if args.dry_run {
        for (i, c) in outcome.retrieved.iter().enumerate() {
            let preview: String = c.text.chars().take(300).collect();
            let ellipsis = if c.text.chars().count() > 300 { "..." } else { "" };
            println!(
                "[{}] {} (source={}, distance={:.2})\n{}{}\n",
                i + 1,
                c.fragment_id,
                c.source_id,
                c.distance,
                preview,
                ellipsis
            );
        }
        return Ok(());
    }

    println!("{}", outcome.answer);
    if let Some(s) = outcome.suggestion.as_deref() {
        println!("\n{s}");
    }
    let ids: Vec<&str> = outcome.retrieved.iter().map(|r| r.fragment_id.as_str()).collect();
    println!("\nRetrieved chunks: {}", ids.join(", "));
    Ok(())
}

fn cmd_evidence(thread: &Path, format: FormatArg, out: Option<&Path>) -> Result<(), AppError> {
    let thread = ResearchThread::from_json_file(thread)?;
    let rows = build_evidence_table(&thread);
    let rendered = EvidenceFormat::from(format).render(&rows)?;
    write_output(out, &rendered)
}

fn cmd_audit(cfg: &PortalConfig, thread: &Path) -> Result<(), AppError> {
    let thread = ResearchThread::from_json_file(thread)?;
    let manifest = Manifest::load(&cfg.manifest_path)?;
    let audit = audit_citations(&thread.answer, &thread.retrieved_chunks, Some(&manifest));
    print_json(&audit)
}

fn cmd_health(cfg: &PortalConfig) -> Result<(), AppError> {
    OllamaClient::new(&cfg.embedding.base_url)?.health_check()?;
    println!("Ollama reachable on {}", cfg.embedding.base_url);
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    let cfg = load_config(&cli)?;
    match cli.command {
        Command::Ingest => cmd_ingest(&cfg),
        Command::BuildIndex => cmd_build_index(&cfg),
        Command::Query {
            text,
            top_k,
            query_id,
            dry_run,
            no_refs,
            no_log,
            save_thread,
            json,
        } => cmd_query(
            &cfg,
            QueryArgs {
                text: text.join(" "),
                top_k,
                query_id,
                dry_run,
                no_refs,
                no_log,
                save_thread,
                json,
            },
        ),
        Command::Evidence { thread, format, out } => cmd_evidence(&thread, format, out.as_deref()),
        Command::Audit { thread } => cmd_audit(&cfg, &thread),
        Command::Health => cmd_health(&cfg),
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_config_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_flags() {
        let cli = Cli::try_parse_from([
            "prp", "--root", "/corpus", "query", "what", "is", "RAG?", "-k", "3", "--no-refs",
        ])
        .unwrap();
        match cli.command {
            Command::Query {
                text, top_k, no_refs, ..
            } => {
                assert_eq!(text.join(" "), "what is RAG?");
                assert_eq!(top_k, Some(3));
                assert!(no_refs);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.root, Some(PathBuf::from("/corpus")));
    }

    #[test]
    fn evidence_format_defaults_to_markdown() {
        let cli = Cli::try_parse_from(["prp", "evidence", "t.json"]).unwrap();
        match cli.command {
            Command::Evidence { format, out, .. } => {
                assert_eq!(format, FormatArg::Markdown);
                assert!(out.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn config_and_root_conflict() {
        assert!(Cli::try_parse_from(["prp", "--config", "a.json", "--root", "r", "ingest"]).is_err());
    }
}
