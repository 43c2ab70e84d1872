//! `frostflow-workers` — the worker roles that drive a job's lifecycle.
//!
//! Five independently scheduled roles cooperate without ever calling each
//! other: dispatch pulls submissions and launches processing, the completion
//! reporter persists results and announces them, archive migrates results to
//! the cold tier, restore requests retrievals on upgrade, and thaw brings
//! retrieved bytes back hot. A sixth role (notify) mails the user on
//! completion. All coordination flows through queues and the record store.
//!
//! Every queue consumer follows the same discipline: bounded-wait poll,
//! sequential handling, acknowledge only what is finished, and let the
//! queue's redelivery be the only retry mechanism.

pub mod archive;
pub mod collaborators;
pub mod completion;
pub mod dispatch;
pub mod notify;
pub mod restore;
pub mod runtime;
pub mod thaw;

pub use archive::ArchiveWorker;
pub use collaborators::{
    CommandLauncher, DeliveryReceipt, InMemoryProfileService, JobLauncher, LaunchError,
    Mailer, MailerError, ProfileError, ProfileService, RecordingLauncher, RecordingMailer,
    UserProfile,
};
pub use completion::{CompletionConfig, CompletionError, CompletionReporter};
pub use dispatch::{DispatchConfig, DispatchWorker};
pub use notify::{NotifyConfig, NotifyWorker};
pub use restore::{RestoreConfig, RestoreWorker};
pub use runtime::{HandlerOutcome, MessageHandler, WorkerHandle, process_one, spawn_worker};
pub use thaw::ThawWorker;
