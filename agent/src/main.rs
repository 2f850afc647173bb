use anyhow::Result;
use clap::{Parser, Subcommand};
use regdocs_core::{ask, build_index, BuiltIndex, ChatCompletionsSynthesizer, CorpusConfig, Hit, Index};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, EnvFilter};

const SNIPPET_CHARS: usize = 500;

#[derive(Parser)]
#[command(name = "regdocs-agent")]
#[command(about = "Query governance and regulatory documents with TF-IDF retrieval", long_about = None)]
struct Cli {
    /// Corpus configuration (TOML)
    #[arg(long, global = true, default_value = "./corpus.toml")]
    config: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the top matching documents for one query
    Search {
        #[arg(long, short)]
        query: String,
        #[arg(short, default_value_t = 5, value_parser = parse_top_k)]
        k: usize,
    },
    /// Retrieve documents and synthesize an answer from them
    Ask {
        #[arg(long, short)]
        query: String,
        #[arg(short, default_value_t = 5, value_parser = parse_top_k)]
        k: usize,
    },
    /// Interactive query loop; type `exit` to quit
    Repl {
        #[arg(short, default_value_t = 5, value_parser = parse_top_k)]
        k: usize,
    },
    /// Report what each configured source contributes to the index
    Inspect {
        /// Emit the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn parse_top_k(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(k) => Ok(k),
        Err(e) => Err(e.to_string()),
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(io::stderr).init();
    let cli = Cli::parse();
    let config = CorpusConfig::from_path(&cli.config)?;
    let built = build_index(&config)?;
    for failure in &built.report.failures {
        tracing::warn!(error = %failure, "source skipped");
    }

    match cli.command {
        Commands::Search { query, k } => {
            let hits = built.index.search(&query, k)?;
            print_hits(&hits);
            Ok(())
        }
        Commands::Ask { query, k } => run_ask(&built.index, &config, &query, k),
        Commands::Repl { k } => repl(&built.index, k),
        Commands::Inspect { json } => inspect(&built, json),
    }
}

fn run_ask(index: &Index, config: &CorpusConfig, query: &str, k: usize) -> Result<()> {
    let synthesizer = ChatCompletionsSynthesizer::from_config(config.synthesis.clone())?;
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(ask(index, &synthesizer, query, k))?;
    print_hits(&outcome.hits);
    println!("\nFinal Answer:");
    match outcome.answer {
        Ok(text) => println!("{text}"),
        Err(e) => println!("[{e}]"),
    }
    Ok(())
}

fn repl(index: &Index, k: usize) -> Result<()> {
    if !index.is_usable() {
        anyhow::bail!("no documents loaded; nothing to query");
    }
    println!("Ready with {} documents. Type your query or 'exit' to quit.", index.len());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nYour query: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let query = line?;
        let query = query.trim();
        if query.is_empty() { continue; }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") { break; }
        let hits = index.search(query, k)?;
        if hits.iter().all(|h| h.score == 0.0) {
            println!("No document shares a term with the query; showing corpus order.");
        }
        print_hits(&hits);
    }
    Ok(())
}

fn inspect(built: &BuiltIndex, json: bool) -> Result<()> {
    let stats = built.index.stats();
    let failures: Vec<String> = built.report.failures.iter().map(|f| f.to_string()).collect();
    if json {
        let out = serde_json::json!({
            "sources": built.report.sources,
            "failures": failures,
            "index": stats,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    for s in &built.report.sources {
        println!(
            "{}: read={} kept={} empty={} malformed={}",
            s.origin.display(), s.rows_read, s.rows_kept, s.rows_empty, s.rows_malformed
        );
    }
    for f in &failures {
        println!("FAILED {f}");
    }
    println!(
        "documents={} vocabulary={} non_zero_weights={} built_at={}",
        stats.documents, stats.vocabulary_size, stats.non_zero_weights, stats.built_at
    );
    Ok(())
}

fn print_hits(hits: &[Hit<'_>]) {
    println!("\nRetrieved Documents:");
    for (rank, hit) in hits.iter().enumerate() {
        println!("#{} score={:.4}", rank + 1, hit.score);
        println!("Source: {}", hit.document.source);
        println!("Content Snippet: {}", truncate_chars(&hit.document.content, SNIPPET_CHARS));
        println!("URL: {}", hit.document.url);
        println!("---");
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
