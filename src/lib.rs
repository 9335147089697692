//! Glyph Search - Genetic search over text-rendering configurations.
//!
//! This crate discovers rendering configurations (font, layout, density,
//! color, resolution) that maximize task accuracy per consumed token
//! when documents are rendered to images and read by a vision-language
//! model. Because fitness is only observable through expensive model
//! evaluations, the search is a cache-aware genetic algorithm rather
//! than anything gradient-based.
//!
//! # Architecture
//!
//! The crate is split into three main modules:
//!
//! - `schema`: Parameter spaces, rendering configurations and search
//!   configuration types
//! - `eval`: The renderer/evaluator interfaces, result types and the
//!   evaluation cache
//! - `search`: Population, fitness scoring, the genetic engine and the
//!   run driver
//!
//! # Example
//!
//! ```rust,no_run
//! use glyph_search::{
//!     eval::{BenchmarkTask, Document},
//!     eval::offline::{OfflineEvaluator, OfflineRenderer},
//!     schema::SearchConfig,
//!     search::SearchDriver,
//! };
//!
//! let tasks = vec![BenchmarkTask {
//!     id: "doc-qa-0".to_string(),
//!     document: Document {
//!         id: "doc-0".to_string(),
//!         text: "contract text...".to_string(),
//!     },
//!     question: "Who are the parties?".to_string(),
//! }];
//!
//! let config = SearchConfig::default();
//! let outcome = SearchDriver::new(config)
//!     .unwrap()
//!     .run(&OfflineRenderer, &OfflineEvaluator::default(), &tasks)
//!     .unwrap();
//!
//! println!("best fitness: {:?}", outcome.best.fitness);
//! ```

pub mod eval;
pub mod schema;
pub mod search;

pub use eval::{BenchmarkTask, Document, EvaluationCache, EvaluationResult, Evaluator, Renderer};
pub use schema::{ConfigSpace, ParamSpec, ParamValue, RenderingConfig, SearchConfig};
pub use search::{SearchDriver, SearchOutcome, SearchState};
