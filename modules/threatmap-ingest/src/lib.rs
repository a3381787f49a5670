pub mod broadcast;
pub mod classifier;
pub mod dedup;
pub mod feeds;
pub mod pipeline;
pub mod providers;
pub mod resolver;
pub mod retry;
pub mod scheduler;
pub mod server;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use broadcast::{EventBroadcaster, LiveEvent, Subscription};
pub use classifier::{Classification, Classifier};
pub use dedup::Deduplicator;
pub use feeds::{FeedBatch, FeedSource, GlobalFeed, LocalFeed};
pub use pipeline::{ArticleProcessor, Candidate, CycleStats, IngestionCycle, Origin, Outcome, PipelineDeps};
pub use resolver::LocationResolver;
pub use retry::{RateLimitedClient, RetryPolicy, Sleeper, TokioSleeper};
pub use scheduler::{IngestionScheduler, ScheduledJob, SchedulerHandle};
