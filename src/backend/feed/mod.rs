//! Change Feed Module
//!
//! Turns a store's change feed into classified notifications.
//!
//! # Module Structure
//!
//! ```text
//! feed/
//! ├── mod.rs        - Module exports and documentation
//! ├── backoff.rs    - Reconnect delay schedule
//! ├── consumer.rs   - ChangeSource seam and the feed consumer
//! ├── classifier.rs - OwnerLookup seam and the prefix rule table
//! ├── supervisor.rs - State machine and the task that drives it
//! └── pipeline.rs   - Handle owning the task and the ordered teardown
//! ```
//!
//! # Data Flow
//!
//! ```text
//! ChangeSource -> ChangeFeedConsumer -> EventClassifier -> Notifier
//!                        ^
//!                   Supervisor (connect / back off / degrade)
//! ```

pub mod backoff;
pub mod classifier;
pub mod consumer;
pub mod pipeline;
pub mod supervisor;

pub use backoff::BackoffPolicy;
pub use classifier::{ClassificationTable, ClassifierRule, EventClassifier, OwnerLookup, RuleKind};
pub use consumer::{ChangeFeedConsumer, ChangeSource, FeedEvent, FeedStream};
pub use pipeline::LivePipeline;
pub use supervisor::{ConsumerState, Directive, Supervisor, SupervisorEvent, SupervisorMachine};
