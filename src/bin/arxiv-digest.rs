//! CLI binary for arxiv-digest.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `DigestConfig` and prints results.

use anyhow::{Context, Result};
use arxiv_digest::{
    digest_batch, load_paper, write_json, DigestConfig, DigestProgressCallback, Paper, PaperDigest,
    PaperMeta, ProgressCallback,
};
use base64::Engine;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the batch, one log line per
/// paper. Papers may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} papers  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Digesting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut times| times.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl DigestProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.reset_eta();
    }

    fn on_paper_start(&self, index: usize, _total: usize, arxiv_id: &str) {
        if let Ok(mut times) = self.start_times.lock() {
            times.insert(index, Instant::now());
        }
        self.bar.set_message(arxiv_id.to_string());
    }

    fn on_paper_complete(&self, index: usize, total: usize, arxiv_id: &str) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<20}  {}",
            green("✓"),
            index + 1,
            total,
            arxiv_id,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_paper_error(&self, index: usize, total: usize, arxiv_id: &str, error: &str) {
        let secs = self.elapsed_secs(index);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<20}  {}  {}",
            red("✗"),
            index + 1,
            total,
            arxiv_id,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let failed = total.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} papers digested",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} papers digested  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Digest one paper by id (needs an LLM API key)
  arxiv-digest 2401.00001 --title "Paper title" --abstract "..."

  # Offline: code link and overview figure only
  arxiv-digest --no-llm 2401.00001 https://arxiv.org/abs/2402.00002

  # Local source bundle, JSON to a file, figure saved as image
  arxiv-digest ./2401.00001.tar.gz -o digest.json --save-figures figures/

  # Answer in another language
  arxiv-digest --language German 2401.00001

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium, used to rasterise PDF figures
"#;

/// Digest arXiv papers from their LaTeX source bundles.
#[derive(Parser, Debug)]
#[command(
    name = "arxiv-digest",
    version,
    about = "Digest arXiv papers: code link, overview figure, TL;DR, tags and affiliations",
    long_about = "Download (or read) arXiv LaTeX source bundles, resolve them into one \
document, find the code repository link and the overview figure, and optionally ask an \
LLM for a TL;DR, key terms and author affiliations.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv ids, arXiv URLs or local source archives.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Paper title (single input only).
    #[arg(long)]
    title: Option<String>,

    /// Paper abstract (single input only); searched first for the code link.
    #[arg(long = "abstract")]
    summary: Option<String>,

    /// Write JSON to this file instead of stdout.
    #[arg(short, long, env = "ARXIV_DIGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Language of generated text.
    #[arg(long, env = "ARXIV_DIGEST_LANGUAGE", default_value = "English")]
    language: String,

    /// Skip all LLM calls (code link and figure only).
    #[arg(long, env = "ARXIV_DIGEST_NO_LLM")]
    no_llm: bool,

    /// Do not send the overview figure to a vision model.
    #[arg(long)]
    no_figure_description: bool,

    /// Number of papers processed concurrently.
    #[arg(short, long, env = "ARXIV_DIGEST_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Characters of document front matter searched for a code link.
    #[arg(long, default_value_t = 8000)]
    front_matter_chars: usize,

    /// Write each overview figure to this directory.
    #[arg(long)]
    save_figures: Option<PathBuf>,

    /// Print JSON on stdout instead of a text summary.
    #[arg(long, env = "ARXIV_DIGEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ARXIV_DIGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARXIV_DIGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ARXIV_DIGEST_QUIET")]
    quiet: bool,

    /// Path to libpdfium.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Source download timeout in seconds.
    #[arg(long, env = "ARXIV_DIGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "ARXIV_DIGEST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.inputs.len() > 1 && (cli.title.is_some() || cli.summary.is_some()) {
        anyhow::bail!("--title and --abstract apply to a single input");
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn DigestProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Fetch sources ────────────────────────────────────────────────────
    let mut papers: Vec<Paper> = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let meta = PaperMeta {
            title: cli.title.clone().unwrap_or_default(),
            summary: cli.summary.clone().unwrap_or_default(),
            ..PaperMeta::default()
        };
        let paper = load_paper(input, meta, &config)
            .await
            .with_context(|| format!("Failed to load '{input}'"))?;
        papers.push(paper);
    }

    // ── Digest ───────────────────────────────────────────────────────────
    let results = digest_batch(&papers, &config).await;

    let mut digests: Vec<PaperDigest> = Vec::with_capacity(results.len());
    let mut failures = 0usize;
    for (paper, result) in papers.iter().zip(results) {
        match result {
            Ok(d) => digests.push(d),
            Err(e) => {
                failures += 1;
                if !show_progress {
                    eprintln!("{} {}: {e}", red("✗"), paper.meta.arxiv_id);
                }
            }
        }
    }

    if let Some(ref dir) = cli.save_figures {
        for d in &digests {
            if let Some(path) = save_figure(dir, d)? {
                if !cli.quiet {
                    eprintln!("   figure → {}", dim(&path.display().to_string()));
                }
            }
        }
    }

    // ── Output ───────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        match digests.as_slice() {
            [single] if cli.inputs.len() == 1 => write_json(output_path, single),
            all => write_json(output_path, all),
        }
        .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!("{}  → {}", green("✔"), bold(&output_path.display().to_string()));
        }
    } else if cli.json {
        let json = match digests.as_slice() {
            [single] if cli.inputs.len() == 1 => serde_json::to_string_pretty(single),
            all => serde_json::to_string_pretty(all),
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else {
        for d in &digests {
            print_summary(d);
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} papers failed", papers.len());
    }
    Ok(())
}

/// Map CLI args to `DigestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DigestConfig> {
    let mut builder = DigestConfig::builder()
        .language(cli.language.clone())
        .enable_llm(!cli.no_llm)
        .describe_figure(!cli.no_figure_description)
        .concurrency(cli.concurrency)
        .front_matter_chars(cli.front_matter_chars)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Write the overview image to `dir/<id>.<ext>`; `None` when there is none.
fn save_figure(dir: &Path, digest: &PaperDigest) -> Result<Option<PathBuf>> {
    let Some(ref overview) = digest.overview else {
        return Ok(None);
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(&overview.image_base64)
        .context("Overview image is not valid base64")?;
    let ext = if overview.mime_type == "image/jpeg" { "jpg" } else { "png" };
    let name = format!("{}.{ext}", digest.arxiv_id.replace('/', "_"));

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

fn print_summary(d: &PaperDigest) {
    let heading = if d.title.is_empty() {
        bold(&d.arxiv_id)
    } else {
        format!("{}  {}", bold(&d.arxiv_id), d.title)
    };
    println!("{heading}");

    if !d.source_available {
        println!("  {}", dim("no source bundle"));
    }
    println!(
        "  code:          {}",
        d.code_url.as_deref().map(cyan).unwrap_or_else(|| dim("none"))
    );
    match &d.overview {
        Some(o) => {
            let kind = if o.is_fallback { "fallback" } else { "overview" };
            println!(
                "  figure:        {} {}",
                o.source_entry,
                dim(&format!("({kind}, priority {})", o.priority))
            );
            println!("  caption:       {}", o.caption);
            if let Some(ref desc) = o.description {
                println!("  description:   {desc}");
            }
        }
        None => println!("  figure:        {}", dim("none")),
    }
    if let Some(ref tldr) = d.tldr {
        println!("  tldr:          {tldr}");
    }
    if !d.tags.is_empty() {
        println!("  tags:          {}", d.tags.join(", "));
    }
    if let Some(ref affiliations) = d.affiliations {
        println!("  affiliations:  {}", affiliations.join("; "));
    }
    for w in &d.warnings {
        println!("  {} {w}", cyan("⚠"));
    }
    println!(
        "  {}",
        dim(&format!(
            "{} tokens in / {} tokens out, {}ms",
            d.stats.tokens.input_tokens, d.stats.tokens.output_tokens, d.stats.total_duration_ms
        ))
    );
}
