//! Offline integration tests for arxiv-digest.
//!
//! Source bundles are built in memory with `tar` + `flate2`; LLM
//! enrichment is disabled so no provider or network is needed.
//!
//! Run with:
//!   cargo test --test pipeline

use arxiv_digest::{
    digest, digest_batch, digest_sync, digest_to_file, ArtifactError, DigestConfig, DigestError,
    DigestProgressCallback, Paper, PaperMeta, SourceBundle,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

fn tar_gz(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *contents).unwrap();
    }
    let tar = builder.into_inner().unwrap();
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(&tar).unwrap();
    gz.finish().unwrap()
}

fn png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 30, 30]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn offline() -> DigestConfig {
    DigestConfig::builder().enable_llm(false).build().unwrap()
}

fn paper(id: &str, summary: &str, files: &[(&str, &[u8])]) -> Paper {
    Paper::new(
        PaperMeta::new(id).with_title("A Paper").with_summary(summary),
        SourceBundle::Available(tar_gz(files)),
    )
}

const TWO_FIGURES: &str = r"\documentclass{article}
\begin{document}
\title{A Paper}
\maketitle
\section{Introduction}
Our code is released at \url{https://github.com/acme/proj}.
\begin{figure}
  \includegraphics[width=\linewidth]{figs/results}
  \caption{Qualitative results}
\end{figure}
\begin{figure*}
  \centering
  \includegraphics[width=\textwidth]{figs/arch}
  \caption{Overview of our proposed architecture~\cite{foo2020}. Best viewed in \textbf{color}.}
  \label{fig:arch}
\end{figure*}
\end{document}
";

// ── Single-file bundle ───────────────────────────────────────────────────────

#[tokio::test]
async fn single_file_bundle_is_the_main_file() {
    let tex = b"\\documentclass{article}\n% a comment\n\\begin{document}\nHello.\n\\end{document}\n";
    let p = paper("2401.00001", "", &[("paper.tex", tex)]);
    let d = digest(&p, &offline()).await.unwrap();

    assert!(d.source_available);
    assert_eq!(d.main_file.as_deref(), Some("paper.tex"));
    assert_eq!(d.stats.markup_files, 1);
    assert_eq!(d.code_url, None);
    assert!(d.overview.is_none());
    assert!(d.warnings.is_empty());

    let merged = p.document().unwrap().unwrap().merged().unwrap();
    assert!(!merged.contains("a comment"));
    assert!(merged.contains("Hello."));
}

// ── Code link ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn abstract_link_is_preferred_and_trimmed() {
    let p = paper(
        "2401.00002",
        "Code at https://github.com/acme/proj.",
        &[("main.tex", b"\\begin{document}\\url{https://github.com/other/repo}")],
    );
    let d = digest(&p, &offline()).await.unwrap();
    assert_eq!(d.code_url.as_deref(), Some("https://github.com/acme/proj"));
}

#[tokio::test]
async fn link_found_in_front_matter() {
    let p = paper(
        "2401.00003",
        "No link here.",
        &[("main.tex", TWO_FIGURES.as_bytes())],
    );
    let d = digest(&p, &offline()).await.unwrap();
    assert_eq!(d.code_url.as_deref(), Some("https://github.com/acme/proj"));
}

// ── Overview figure ──────────────────────────────────────────────────────────

#[tokio::test]
async fn overview_figure_beats_results_figure() {
    let image = png();
    let p = paper(
        "2401.00004",
        "",
        &[
            ("main.tex", TWO_FIGURES.as_bytes()),
            ("figs/arch.png", &image),
            ("figs/results.png", &image),
        ],
    );
    let d = digest(&p, &offline()).await.unwrap();
    let overview = d.overview.expect("overview figure");

    assert_eq!(overview.source_entry, "figs/arch.png");
    assert_eq!(overview.mime_type, "image/png");
    assert!(overview.priority >= 18);
    assert!(!overview.is_fallback);
    assert_eq!(
        overview.caption,
        "Overview of our proposed architecture. Best viewed in color."
    );
    assert!(overview.description.is_none());
    assert_eq!(d.stats.figures_found, 2);

    use base64::Engine;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&overview.image_base64)
        .unwrap();
    assert_eq!(decoded, image);
}

#[tokio::test]
async fn results_figure_is_the_fallback() {
    let tex = r"\begin{document}
\begin{figure}\includegraphics{res}\caption{Qualitative results}\end{figure}
\end{document}";
    let image = png();
    let p = paper(
        "2401.00005",
        "",
        &[("main.tex", tex.as_bytes()), ("res.png", &image)],
    );
    let d = digest(&p, &offline()).await.unwrap();
    let overview = d.overview.expect("fallback figure");
    assert!(overview.is_fallback);
    assert_eq!(overview.priority, 3);
    assert_eq!(overview.matched_keywords, vec!["result"]);
}

#[tokio::test]
async fn figure_in_included_file_is_found() {
    let main = r"\documentclass{article}
\begin{document}
\input{sections/method}
\end{document}";
    let method = r"\begin{figure}\includegraphics{arch.png}\caption{Framework overview}\end{figure}";
    let image = png();
    let p = paper(
        "2401.00006",
        "",
        &[
            ("main.tex", main.as_bytes()),
            ("sections/method.tex", method.as_bytes()),
            ("images/Arch.PNG", &image),
        ],
    );
    let d = digest(&p, &offline()).await.unwrap();
    assert_eq!(d.main_file.as_deref(), Some("main.tex"));
    let overview = d.overview.expect("figure from included file");
    assert_eq!(overview.source_entry, "images/Arch.PNG");
}

#[tokio::test]
async fn eps_reference_resolves_to_raster_sibling() {
    let tex = r"\begin{document}
\begin{figure}\includegraphics{figs/pipeline.eps}\caption{Pipeline overview}\end{figure}
\end{document}";
    let image = png();
    let p = paper(
        "2401.00014",
        "",
        &[
            ("main.tex", tex.as_bytes()),
            ("sections/pipeline.tex", b"\\section{Pipeline}"),
            ("figs/pipeline.eps", b"%!PS-Adobe-3.0 EPSF-3.0"),
            ("figs/pipeline.png", &image),
        ],
    );
    let d = digest(&p, &offline()).await.unwrap();
    let overview = d.overview.expect("raster sibling of the eps figure");
    assert_eq!(overview.source_entry, "figs/pipeline.png");
    assert_eq!(overview.mime_type, "image/png");
    assert!(d.warnings.is_empty());
}

#[tokio::test]
async fn unconvertible_pdf_figure_is_a_warning() {
    let tex = r"\begin{document}
\begin{figure}\includegraphics{arch}\caption{System overview}\end{figure}
\end{document}";
    let p = paper(
        "2401.00007",
        "",
        &[("main.tex", tex.as_bytes()), ("arch.pdf", b"%PDF-1.5 truncated")],
    );
    let d = digest(&p, &offline()).await.unwrap();
    assert!(d.overview.is_none());
    match d.warnings.as_slice() {
        [ArtifactError::ConversionFailed { entry, .. }] => assert_eq!(entry, "arch.pdf"),
        other => panic!("unexpected warnings: {other:?}"),
    }
}

// ── Missing or broken sources ────────────────────────────────────────────────

#[tokio::test]
async fn unpublished_source_still_digests() {
    let p = Paper::new(
        PaperMeta::new("2401.00008").with_summary("See https://huggingface.co/acme/model"),
        SourceBundle::NotPublished,
    );
    let d = digest(&p, &offline()).await.unwrap();
    assert!(!d.source_available);
    assert_eq!(d.main_file, None);
    assert_eq!(d.code_url.as_deref(), Some("https://huggingface.co/acme/model"));
    assert!(d.overview.is_none());
}

#[tokio::test]
async fn gzipped_single_tex_is_not_an_archive() {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(b"\\documentclass{article}\\begin{document}x\\end{document}")
        .unwrap();
    let p = Paper::new(
        PaperMeta::new("2401.00009"),
        SourceBundle::Available(gz.finish().unwrap()),
    );
    let d = digest(&p, &offline()).await.unwrap();
    assert!(!d.source_available);
    assert!(d.warnings.is_empty());
}

#[tokio::test]
async fn archive_truncated_mid_entry_is_fatal() {
    let big = vec![b'x'; 4096];
    let mut builder = tar::Builder::new(Vec::new());
    for name in ["a.tex", "b.tex"] {
        let mut header = tar::Header::new_gnu();
        header.set_size(big.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, big.as_slice()).unwrap();
    }
    let mut tar = builder.into_inner().unwrap();
    tar.truncate(512 + 4096 + 512 + 100);

    let p = Paper::new(PaperMeta::new("2401.00010"), SourceBundle::Available(tar));
    let err = digest(&p, &offline()).await.unwrap_err();
    assert!(matches!(err, DigestError::CorruptArchive { .. }));
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    completed: AtomicUsize,
    errors: Mutex<Vec<String>>,
    finished: Mutex<Option<(usize, usize)>>,
}

impl DigestProgressCallback for Recorder {
    fn on_paper_start(&self, _index: usize, _total: usize, _arxiv_id: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_paper_complete(&self, _index: usize, _total: usize, _arxiv_id: &str) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }
    fn on_paper_error(&self, _index: usize, _total: usize, arxiv_id: &str, _error: &str) {
        self.errors.lock().unwrap().push(arxiv_id.to_string());
    }
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        *self.finished.lock().unwrap() = Some((total, success_count));
    }
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_failures() {
    let recorder = Arc::new(Recorder::default());
    let config = DigestConfig::builder()
        .enable_llm(false)
        .concurrency(3)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    let mut corrupt = tar::Builder::new(Vec::new());
    for name in ["a.tex", "b.tex"] {
        let mut header = tar::Header::new_gnu();
        header.set_size(2048);
        header.set_mode(0o644);
        header.set_cksum();
        corrupt.append_data(&mut header, name, &[0u8; 2048][..]).unwrap();
    }
    let mut corrupt = corrupt.into_inner().unwrap();
    corrupt.truncate(512 + 2048 + 512 + 10);

    let papers = vec![
        paper("p0", "", &[("main.tex", b"\\begin{document}")]),
        Paper::new(PaperMeta::new("p1"), SourceBundle::Available(corrupt)),
        Paper::new(PaperMeta::new("p2"), SourceBundle::NotPublished),
        paper("p3", "https://github.com/a/b", &[("main.tex", b"x")]),
    ];

    let results = digest_batch(&papers, &config).await;
    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().unwrap().arxiv_id, "p0");
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().arxiv_id, "p2");
    assert_eq!(
        results[3].as_ref().unwrap().code_url.as_deref(),
        Some("https://github.com/a/b")
    );

    assert_eq!(recorder.started.load(Ordering::SeqCst), 4);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 3);
    assert_eq!(*recorder.errors.lock().unwrap(), vec!["p1".to_string()]);
    assert_eq!(*recorder.finished.lock().unwrap(), Some((4, 3)));
}

// ── Output ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn digest_to_file_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("digest.json");
    let p = paper(
        "2401.00011",
        "Code at https://github.com/acme/proj.",
        &[("main.tex", b"\\begin{document}hi")],
    );

    let stats = digest_to_file(&p, &out, &offline()).await.unwrap();
    assert_eq!(stats.markup_files, 1);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["arxiv_id"], "2401.00011");
    assert_eq!(json["code_url"], "https://github.com/acme/proj");
    assert_eq!(json["main_file"], "main.tex");
    assert!(json["overview"].is_null());
}

#[test]
fn digest_sync_runs_without_a_runtime() {
    let p = paper("2401.00012", "", &[("main.tex", b"\\begin{document}")]);
    let d = digest_sync(&p, &offline()).unwrap();
    assert_eq!(d.main_file.as_deref(), Some("main.tex"));
}
