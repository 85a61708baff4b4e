//! Pipeline stages for digesting an arXiv source bundle.
//!
//! Each submodule implements one step. The markup stages are pure and
//! synchronous; only `fetch` and `llm` do network I/O.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ archive ──▶ resolve ──┬─▶ links                     (code URL)
//! (HTTP)    (tar/gz)    (merge)   ├─▶ figure ──▶ image ──▶ render (overview)
//!                                 └─▶ enrich ──▶ llm            (TL;DR, tags, …)
//! ```
//!
//! 1. [`fetch`]: classify the input and obtain the raw bundle bytes
//! 2. [`archive`]: index the tar once, read entries by name
//! 3. [`resolve`]: collect markup files, pick the main file, clean comments
//!    and inline `\input` / `\include`
//! 4. [`links`]: find the code repository link in abstract or front matter
//! 5. [`figure`]: score figure captions and pick the overview figure
//! 6. [`image`]: map the figure's image reference to an archive entry
//! 7. [`render`]: rasterise PDF figures to PNG via pdfium;
//!    runs in `spawn_blocking`
//! 8. [`enrich`]: slice sections, build prompts, parse model answers
//! 9. [`llm`]: provider calls with timeout and retry/backoff
//!
//! [`encode`] and [`postprocess`] are shared helpers (base64, caption and
//! model-output cleanup).

pub mod archive;
pub mod encode;
pub mod enrich;
pub mod fetch;
pub mod figure;
pub mod image;
pub mod links;
pub mod llm;
pub mod postprocess;
pub mod render;
pub mod resolve;
