pub mod context;
pub mod error;
pub mod ideas;
pub mod publish;
pub mod result;
pub mod runner;
pub mod topics;

pub use context::{RunContext, RunTrigger};
pub use error::{PipelineError, UpstreamError};
pub use ideas::{GeneratedContent, IdeaGenerator};
pub use publish::{PublishOutcome, PublishStatus, Publisher, SkipReason};
pub use result::{CompletedRun, ExecutionResult, Stage};
pub use runner::{PipelineBuilder, PipelineRunner};
pub use topics::{Topic, TopicQuery, TopicSource, TrendFeed, rank_topics};
