//! Progress-callback trait for per-paper digestion events.
//!
//! Inject an [`Arc<dyn DigestProgressCallback>`] via
//! [`crate::config::DigestConfigBuilder::progress_callback`] to receive events
//! as [`crate::digest_batch`] works through its papers. The CLI drives an
//! `indicatif` bar from these events.
//!
//! # Example
//!
//! ```rust
//! use arxiv_digest::{DigestConfig, DigestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl DigestProgressCallback for CountingCallback {
//!     fn on_paper_complete(&self, index: usize, total: usize, arxiv_id: &str) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{arxiv_id} done ({done}/{total}, input #{index})");
//!     }
//! }
//!
//! let config = DigestConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { completed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch pipeline as it processes each paper.
///
/// Papers run concurrently, so `on_paper_*` may be called from several
/// tasks at once. All methods default to no-ops.
pub trait DigestProgressCallback: Send + Sync {
    /// Called once before any paper is processed.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when work on a paper begins. `index` is 0-based input order.
    fn on_paper_start(&self, index: usize, total: usize, arxiv_id: &str) {
        let _ = (index, total, arxiv_id);
    }

    /// Called when a paper produced a digest (possibly with warnings).
    fn on_paper_complete(&self, index: usize, total: usize, arxiv_id: &str) {
        let _ = (index, total, arxiv_id);
    }

    /// Called when a paper failed fatally.
    fn on_paper_error(&self, index: usize, total: usize, arxiv_id: &str, error: &str) {
        let _ = (index, total, arxiv_id, error);
    }

    /// Called once after every paper has been attempted.
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DigestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DigestConfig`].
pub type ProgressCallback = Arc<dyn DigestProgressCallback>;
