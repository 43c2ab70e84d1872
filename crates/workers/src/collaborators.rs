//! External collaborator interfaces.
//!
//! The pipeline consumes three services it does not own: the user profile
//! directory, an email sender, and the external processing job itself. Each
//! is a narrow trait here, with a recording in-memory implementation for
//! tests/dev.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use frostflow_core::{JobId, PlanTier, UserId};

// ---------------------------------------------------------------------------
// Profile lookup

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
    pub plan: PlanTier,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProfileError {
    #[error("no profile for user {0}")]
    NotFound(UserId),
    /// Transient — the caller leaves its message unacknowledged and lets
    /// redelivery retry.
    #[error("profile service unavailable: {0}")]
    Unavailable(String),
}

pub trait ProfileService: Send + Sync {
    fn get_profile(&self, user_id: UserId) -> Result<UserProfile, ProfileError>;
}

impl<P> ProfileService for Arc<P>
where
    P: ProfileService + ?Sized,
{
    fn get_profile(&self, user_id: UserId) -> Result<UserProfile, ProfileError> {
        (**self).get_profile(user_id)
    }
}

/// In-memory profile directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProfileService {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    unavailable: AtomicBool,
}

impl InMemoryProfileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert(&self, user_id: UserId, profile: UserProfile) {
        self.profiles.write().unwrap().insert(user_id, profile);
    }

    /// Simulate a transient outage.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }
}

impl ProfileService for InMemoryProfileService {
    fn get_profile(&self, user_id: UserId) -> Result<UserProfile, ProfileError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ProfileError::Unavailable("simulated outage".into()));
        }
        self.profiles
            .read()
            .unwrap()
            .get(&user_id)
            .cloned()
            .ok_or(ProfileError::NotFound(user_id))
    }
}

// ---------------------------------------------------------------------------
// Email delivery

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MailerError {
    #[error("recipient rejected: {0}")]
    Rejected(String),
    #[error("mail service unavailable: {0}")]
    Unavailable(String),
}

pub trait Mailer: Send + Sync {
    fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, MailerError>;
}

impl<M> Mailer for Arc<M>
where
    M: Mailer + ?Sized,
{
    fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, MailerError> {
        (**self).send(recipient, subject, body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

/// Mailer for tests/dev: records instead of sending.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: AtomicBool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Mailer for RecordingMailer {
    fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryReceipt, MailerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(MailerError::Unavailable("simulated outage".into()));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(DeliveryReceipt {
            message_id: format!("mail-{}", sent.len()),
        })
    }
}

// ---------------------------------------------------------------------------
// External processing job

#[derive(Debug, Clone, thiserror::Error)]
pub enum LaunchError {
    #[error("failed to start processing job: {0}")]
    Spawn(String),
}

/// Fire-and-forget start of the external processing job.
///
/// The dispatcher does not wait for completion; the job reports its own
/// results through the completion reporter when it finishes.
pub trait JobLauncher: Send + Sync {
    fn launch(&self, input_path: &Path, job_id: JobId, user_id: UserId)
        -> Result<(), LaunchError>;
}

impl<L> JobLauncher for Arc<L>
where
    L: JobLauncher + ?Sized,
{
    fn launch(
        &self,
        input_path: &Path,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<(), LaunchError> {
        (**self).launch(input_path, job_id, user_id)
    }
}

/// Launcher that spawns the processing program as a detached child process
/// with `(input_path, job_id, user_id)` arguments.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: PathBuf,
}

impl CommandLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl JobLauncher for CommandLauncher {
    fn launch(
        &self,
        input_path: &Path,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<(), LaunchError> {
        let child = Command::new(&self.program)
            .arg(input_path)
            .arg(job_id.to_string())
            .arg(user_id.to_string())
            .spawn()
            .map_err(|e| LaunchError::Spawn(e.to_string()))?;

        debug!(job_id = %job_id, pid = child.id(), "processing job launched");
        // Fire-and-forget: the child reports back through the completion
        // reporter, not an exit status.
        drop(child);
        Ok(())
    }
}

/// Launcher for tests/dev: records launches instead of spawning anything.
#[derive(Debug, Default)]
pub struct RecordingLauncher {
    launches: Mutex<Vec<(PathBuf, JobId, UserId)>>,
    fail: AtomicBool,
}

impl RecordingLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn launches(&self) -> Vec<(PathBuf, JobId, UserId)> {
        self.launches.lock().unwrap().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl JobLauncher for RecordingLauncher {
    fn launch(
        &self,
        input_path: &Path,
        job_id: JobId,
        user_id: UserId,
    ) -> Result<(), LaunchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LaunchError::Spawn("simulated launch failure".into()));
        }
        self.launches
            .lock()
            .unwrap()
            .push((input_path.to_path_buf(), job_id, user_id));
        Ok(())
    }
}
