//! Evaluation module - interfaces to the external rendering and scoring
//! collaborators, the result cache, and deterministic offline stand-ins.
//!
//! The search engine never talks to a rasterizer or a vision-language
//! model directly; it goes through the [`Renderer`] and [`Evaluator`]
//! traits so those expensive collaborators stay swappable.

mod cache;
pub mod offline;
mod result;

pub use cache::EvaluationCache;
pub use result::{EvalFailure, EvaluationResult};

use serde::{Deserialize, Serialize};

/// A text document to be rendered into pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document identifier.
    pub id: String,
    /// Full document text.
    pub text: String,
}

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Row-major luminance data.
    pub data: Vec<u8>,
}

/// A benchmark task: a document plus a question the model must answer
/// from the rendered pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkTask {
    /// Stable task identifier.
    pub id: String,
    /// The document the task reads.
    pub document: Document,
    /// The question posed to the model.
    pub question: String,
}

/// Stable identifier for a task suite, mixed into evaluation cache keys
/// so results from different workloads never collide.
pub fn workload_id(tasks: &[BenchmarkTask]) -> String {
    let mut id = String::new();
    for task in tasks {
        id.push_str(&task.id);
        id.push('\u{1f}');
    }
    id
}

/// Renders a document under a rendering configuration.
///
/// Implementations must be deterministic for a given (document, config)
/// pair; the evaluation cache depends on it.
pub trait Renderer: Send + Sync {
    /// Render the document into one or more page images.
    fn render(
        &self,
        document: &Document,
        config: &crate::schema::RenderingConfig,
    ) -> Result<Vec<PageImage>, EvalFailure>;
}

/// Scores rendered pages against a benchmark task, wrapping the
/// vision-language model.
pub trait Evaluator: Send + Sync {
    /// Evaluate the pages for one task. Faults must come back as a
    /// classified [`EvalFailure`], never as a low score.
    fn evaluate(
        &self,
        pages: &[PageImage],
        task: &BenchmarkTask,
    ) -> Result<EvaluationResult, EvalFailure>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_id_distinguishes_suites() {
        let doc = Document {
            id: "d1".to_string(),
            text: "hello".to_string(),
        };
        let task = |id: &str| BenchmarkTask {
            id: id.to_string(),
            document: doc.clone(),
            question: "q".to_string(),
        };

        let a = workload_id(&[task("t1"), task("t2")]);
        let b = workload_id(&[task("t1")]);
        let c = workload_id(&[task("t1"), task("t2")]);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }
}
