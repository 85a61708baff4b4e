//! Digest entry points: one paper, a batch of papers, or straight to a file.
//!
//! Per paper the order is fixed: resolve the document (cached on the
//! [`Paper`]), find the code link, pick the overview figure, resolve its
//! image, then optionally run the LLM enrichment. Only a
//! [`DigestError`] stops a paper; every artifact failure is recorded in
//! [`PaperDigest::warnings`] and the remaining fields are still filled in.

use crate::config::DigestConfig;
use crate::error::{ArtifactError, DigestError};
use crate::output::{DigestStats, OverviewFigure, PaperDigest, TokenUsage};
use crate::paper::{Paper, PaperMeta};
use crate::pipeline::fetch::{classify_input, fetch_source};
use crate::pipeline::figure::{extract_figures, FigureCandidate};
use crate::pipeline::image::{resolve_image, ImageArtifact};
use crate::pipeline::llm::LlmClient;
use crate::pipeline::render::PdfiumRasterizer;
use crate::pipeline::{encode, enrich};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Digest one paper.
///
/// # Errors
/// Returns `Err(DigestError)` only for fatal errors: a corrupt archive or an
/// unconfigured LLM provider while `enable_llm` is set.
pub async fn digest(paper: &Paper, config: &DigestConfig) -> Result<PaperDigest, DigestError> {
    let client = if config.enable_llm {
        Some(LlmClient::new(resolve_provider(config).await?, config))
    } else {
        None
    };
    digest_with(paper, config, client.as_ref()).await
}

/// Digest several papers concurrently.
///
/// Results come back in input order. A fatal error for one paper is
/// returned in its slot and does not stop the others.
pub async fn digest_batch(
    papers: &[Paper],
    config: &DigestConfig,
) -> Vec<Result<PaperDigest, DigestError>> {
    let total = papers.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let client = if config.enable_llm {
        match resolve_provider(config).await {
            Ok(provider) => Some(Arc::new(LlmClient::new(provider, config))),
            Err(e) => {
                warn!("LLM provider unavailable: {e}");
                let msg = e.to_string();
                return papers
                    .iter()
                    .enumerate()
                    .map(|(index, paper)| {
                        if let Some(ref cb) = config.progress_callback {
                            cb.on_paper_error(index, total, &paper.meta.arxiv_id, &msg);
                        }
                        Err(DigestError::ProviderNotConfigured {
                            provider: config.provider_name.clone().unwrap_or_else(|| "auto".into()),
                            hint: msg.clone(),
                        })
                    })
                    .collect();
            }
        }
    } else {
        None
    };

    let mut results: Vec<(usize, Result<PaperDigest, DigestError>)> =
        stream::iter(papers.iter().enumerate().map(|(index, paper)| {
            let client = client.clone();
            async move {
                let id = paper.meta.arxiv_id.as_str();
                if let Some(ref cb) = config.progress_callback {
                    cb.on_paper_start(index, total, id);
                }
                let result = digest_with(paper, config, client.as_deref()).await;
                if let Some(ref cb) = config.progress_callback {
                    match &result {
                        Ok(_) => cb.on_paper_complete(index, total, id),
                        Err(e) => cb.on_paper_error(index, total, id, &e.to_string()),
                    }
                }
                (index, result)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    let success = results.iter().filter(|(_, r)| r.is_ok()).count();
    info!("Batch complete: {success}/{total} papers digested");
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, success);
    }
    results.into_iter().map(|(_, r)| r).collect()
}

/// Synchronous wrapper around [`digest`].
///
/// Creates a temporary tokio runtime internally.
pub fn digest_sync(paper: &Paper, config: &DigestConfig) -> Result<PaperDigest, DigestError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DigestError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(digest(paper, config))
}

/// Digest a paper and write the JSON result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn digest_to_file(
    paper: &Paper,
    output_path: impl AsRef<Path>,
    config: &DigestConfig,
) -> Result<DigestStats, DigestError> {
    let digest = digest(paper, config).await?;
    write_json(output_path.as_ref(), &digest)?;
    Ok(digest.stats)
}

/// Serialise `value` as pretty JSON to `path` atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DigestError> {
    let fail = |source: std::io::Error| DigestError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(fail)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(fail)?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| fail(e.into()))?;
    tmp.write_all(b"\n").map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Build a [`Paper`] from a command-line input (path, arXiv id or URL).
///
/// `meta` supplies title and abstract when the caller has them; its
/// `arxiv_id` is filled from the input when empty.
pub async fn load_paper(
    input: &str,
    meta: PaperMeta,
    config: &DigestConfig,
) -> Result<Paper, DigestError> {
    let source_input = classify_input(input)?;
    let source = fetch_source(&source_input, config).await?;
    let meta = if meta.arxiv_id.is_empty() {
        PaperMeta {
            arxiv_id: source_input.label(),
            ..meta
        }
    } else {
        meta
    };
    Ok(Paper::new(meta, source))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn digest_with(
    paper: &Paper,
    config: &DigestConfig,
    client: Option<&LlmClient>,
) -> Result<PaperDigest, DigestError> {
    let total_start = Instant::now();
    let id = paper.meta.arxiv_id.as_str();
    info!("Digesting {id}");

    // ── Step 1: Resolve document ─────────────────────────────────────────
    let resolve_start = Instant::now();
    let document = paper.document()?;
    let mut stats = DigestStats::default();
    if let Some(doc) = document {
        let text = doc.text();
        stats.markup_files = doc.files().len();
        stats.document_chars = text.chars().count();
        stats.figures_found = extract_figures(&text).len();
        debug!(
            "{id}: {} markup files, main file {:?}, {} figures",
            stats.markup_files,
            doc.main_file(),
            stats.figures_found
        );
    }

    // ── Step 2: Code link ────────────────────────────────────────────────
    let code_url = paper.code_url(config.front_matter_chars)?;

    // ── Step 3: Overview figure ──────────────────────────────────────────
    let mut warnings: Vec<ArtifactError> = Vec::new();
    let candidate = paper.overview_candidate()?;
    let image = match &candidate {
        Some(figure) => match resolve_figure_image(paper, figure, config).await? {
            Ok(image) => Some(image),
            Err(e) => {
                warn!("{id}: overview image unavailable: {e}");
                warnings.push(e);
                None
            }
        },
        None => None,
    };
    stats.resolve_duration_ms = resolve_start.elapsed().as_millis() as u64;

    let mut overview = match (&candidate, &image) {
        (Some(figure), Some(image)) => Some(OverviewFigure {
            image_base64: encode::to_base64(&image.bytes),
            mime_type: image.mime_type().to_string(),
            caption: figure.cleaned_caption(),
            description: None,
            source_entry: image.source_entry.clone(),
            priority: figure.priority,
            matched_keywords: figure.matched_keywords.clone(),
            is_fallback: figure.is_fallback,
        }),
        _ => None,
    };

    // ── Step 4: LLM enrichment ───────────────────────────────────────────
    let mut digest = PaperDigest {
        arxiv_id: id.to_string(),
        title: paper.meta.title.clone(),
        source_available: paper.archive()?.is_some(),
        main_file: document.and_then(|d| d.main_file()).map(str::to_string),
        code_url,
        overview: None,
        tldr: None,
        tags: Vec::new(),
        affiliations: None,
        warnings: Vec::new(),
        stats,
    };

    if let Some(client) = client {
        let llm_start = Instant::now();
        let text = document.map(|d| d.text());
        let text = text.as_deref();
        let meta = &paper.meta;
        let figure_input = match (&overview, &image) {
            (Some(o), Some(i)) if config.describe_figure => Some((o.caption.clone(), i)),
            _ => None,
        };

        let (tldr, tags, affiliations, description) = tokio::join!(
            enrich::tldr(client, config, &meta.title, &meta.summary, text),
            enrich::tags(client, config, &meta.title, &meta.summary, text),
            async {
                match text {
                    Some(t) => enrich::affiliations(client, config, t).await,
                    None => Ok((None, TokenUsage::default())),
                }
            },
            async {
                match &figure_input {
                    Some((caption, image)) => enrich::describe_figure(client, config, &meta.title, caption, image)
                        .await
                        .map(|(d, usage)| (Some(d), usage)),
                    None => Ok((None, TokenUsage::default())),
                }
            },
        );

        let mut usage = TokenUsage::default();
        match tldr {
            Ok((t, u)) => {
                usage.add(u);
                digest.tldr = Some(t).filter(|t| !t.is_empty());
            }
            Err(e) => record(id, &mut warnings, e),
        }
        match tags {
            Ok((t, u)) => {
                usage.add(u);
                digest.tags = t;
            }
            Err(e) => record(id, &mut warnings, e),
        }
        match affiliations {
            Ok((a, u)) => {
                usage.add(u);
                digest.affiliations = a;
            }
            Err(e) => record(id, &mut warnings, e),
        }
        match description {
            Ok((d, u)) => {
                usage.add(u);
                if let Some(o) = overview.as_mut() {
                    o.description = d.filter(|d| !d.is_empty());
                }
            }
            Err(e) => record(id, &mut warnings, e),
        }
        digest.stats.tokens = usage;
        digest.stats.llm_duration_ms = llm_start.elapsed().as_millis() as u64;
    }

    digest.overview = overview;
    digest.warnings = warnings;
    digest.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "{id}: done in {}ms ({} warnings)",
        digest.stats.total_duration_ms,
        digest.warnings.len()
    );
    Ok(digest)
}

fn record(id: &str, warnings: &mut Vec<ArtifactError>, e: ArtifactError) {
    warn!("{id}: {e}");
    warnings.push(e);
}

/// Resolve the figure image on the blocking pool (pdfium is synchronous).
///
/// The outer `Result` carries fatal errors, the inner one the artifact
/// outcome.
async fn resolve_figure_image(
    paper: &Paper,
    figure: &FigureCandidate,
    config: &DigestConfig,
) -> Result<Result<ImageArtifact, ArtifactError>, DigestError> {
    let Some(archive) = paper.archive()?.cloned() else {
        return Ok(Err(ArtifactError::ImageNotFound {
            reference: figure.image_reference.clone().unwrap_or_default(),
            tried: 0,
        }));
    };
    let figure = figure.clone();
    let rasterizer = PdfiumRasterizer::new(config.pdfium_library.clone(), config.max_rendered_pixels);
    tokio::task::spawn_blocking(move || resolve_image(&figure, &archive, &rasterizer))
        .await
        .map_err(|e| DigestError::Internal(format!("image task panicked: {e}")))
}

/// Instantiate a named provider with the given model.
fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DigestError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DigestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_provider(config: &DigestConfig) -> Result<Arc<dyn LLMProvider>, DigestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DigestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider, \
                or pass --no-llm.\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::archive::tests::{gzip, tar_bytes};
    use crate::pipeline::fetch::SourceBundle;

    fn offline() -> DigestConfig {
        DigestConfig::builder().enable_llm(false).build().unwrap()
    }

    #[test]
    fn write_json_is_atomic_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_json(&path, &vec!["a", "b"]).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"a\""));
        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn missing_image_is_a_warning() {
        let tex = "\\begin{document}\\begin{figure}\\includegraphics{ghost}\
                   \\caption{Overview}\\end{figure}\\end{document}";
        let paper = Paper::new(
            PaperMeta::new("2401.00001"),
            SourceBundle::Available(gzip(&tar_bytes(&[("main.tex", tex.as_bytes())]))),
        );
        let digest = digest(&paper, &offline()).await.unwrap();
        assert_eq!(digest.main_file.as_deref(), Some("main.tex"));
        assert!(digest.overview.is_none());
        assert!(matches!(
            digest.warnings.as_slice(),
            [ArtifactError::ImageNotFound { .. }]
        ));
        assert_eq!(digest.stats.figures_found, 1);
    }

    #[tokio::test]
    async fn corrupt_archive_is_fatal() {
        let mut tar = tar_bytes(&[("a.tex", &[b'a'; 600][..]), ("b.tex", &[b'b'; 600][..])]);
        tar.truncate(512 + 1024 + 512 + 100);
        let paper = Paper::new(PaperMeta::new("x"), SourceBundle::Available(tar));
        let err = digest(&paper, &offline()).await.unwrap_err();
        assert!(matches!(err, DigestError::CorruptArchive { .. }));
    }

    #[tokio::test]
    async fn load_paper_labels_local_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("2401.00001.tar.gz");
        std::fs::write(&path, gzip(&tar_bytes(&[("main.tex", b"x")]))).unwrap();
        let paper = load_paper(path.to_str().unwrap(), PaperMeta::default(), &offline())
            .await
            .unwrap();
        assert_eq!(paper.meta.arxiv_id, "2401.00001");
        assert!(matches!(paper.source(), SourceBundle::Available(_)));
    }
}
