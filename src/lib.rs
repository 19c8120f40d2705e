//! Retrieval-augmented question answering over public procurement documents
//! (RFPs), with a comparative evaluator for a remote and a local model.
//!
//! # Overview
//!
//! 1. Source records (one per RFP: title, agency, budget, file name, text)
//!    are loaded from CSV.
//! 2. A [`FixtureBuilder`] derives three labeled questions per record
//!    (budget, agency, file kind).
//! 3. Two [`AnswerBackend`]s answer them: retrieval over the chunked corpus
//!    plus one completion call, each with its own prompt policy.
//! 4. A [`Judge`] grades every answer with tolerance for number formats,
//!    institution suffixes and document-type wording.
//! 5. The [`Evaluator`] produces per-item verdicts and an accuracy; the
//!    [`Comparator`] lines up both backends item by item.
//!
//! # Quick Start
//!
//! ```no_run
//! use rfp_rag_eval::{
//!     Comparator, Config, Evaluator, FixtureBuilder, PromptPolicy, RagBackend, RuleJudge,
//!     corpus::build_corpus,
//!     llm::{LlmClient, OllamaClient},
//!     records::load_records,
//!     retrieval::{ChunkConfig, ChunkIndex, RetrieverFactory},
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     config.validate_remote()?;
//!
//!     let records = load_records(Path::new("data_list.csv"))?;
//!     let fixture = FixtureBuilder::build(&records, Some(30));
//!
//!     let index = ChunkIndex::build(&build_corpus(&records), &ChunkConfig::default());
//!     let factory = RetrieverFactory::new(index);
//!     let retriever = factory.build(config.retrieval.remote_mode)?;
//!
//!     let remote = RagBackend::new(
//!         "remote",
//!         retriever.clone(),
//!         Arc::new(LlmClient::new(config.remote.clone())),
//!         PromptPolicy::Remote,
//!     );
//!     let local = RagBackend::new(
//!         "local",
//!         retriever,
//!         Arc::new(OllamaClient::new(config.local.clone())?),
//!         PromptPolicy::Local,
//!     );
//!
//!     let comparator = Comparator::new(Evaluator::from_config(&config.eval));
//!     let report = comparator
//!         .run(&fixture, &remote, &local, &RuleJudge::new(), None, None)
//!         .await;
//!     report.print_summary();
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod corpus;
pub mod error;
pub mod eval;
pub mod fixture;
pub mod judge;
pub mod llm;
pub mod persistence;
pub mod records;
pub mod retrieval;
pub mod telemetry;

pub use backend::{AnswerBackend, PromptPolicy, RagBackend};
pub use config::Config;
pub use error::{Result, RfpError};
pub use eval::{Comparator, ComparisonReport, ComparisonRow, EvaluationRun, Evaluator, ProgressSink, Verdict};
pub use fixture::{FixtureBuilder, FixtureItem, QuestionKind};
pub use judge::{BoundedJudge, Judge, LlmJudge, RuleJudge};
pub use persistence::{load_index, save_index};
pub use records::SourceRecord;
pub use retrieval::{Passage, Retriever, RetrieverFactory};
