//! Notify worker: emails the owner when their job completes.
//!
//! Downstream of the result-ready topic. Looks up the owner's profile,
//! formats a short completion mail with a link to the job view, and sends
//! it. Lookup or delivery trouble leaves the notice for redelivery; the
//! worst case under at-least-once delivery is a duplicate email, which is
//! the accepted trade-off.

use tracing::info;

use frostflow_messaging::CompletionNotice;

use crate::collaborators::{Mailer, ProfileService};
use crate::runtime::{HandlerOutcome, MessageHandler};

#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Job-view URL prefix; the job id is appended verbatim.
    pub base_url: String,
    pub subject: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://jobs.example.com/annotations/".to_string(),
            subject: "Your analysis job has completed".to_string(),
        }
    }
}

pub struct NotifyWorker<P, M> {
    profiles: P,
    mailer: M,
    config: NotifyConfig,
}

impl<P, M> NotifyWorker<P, M>
where
    P: ProfileService,
    M: Mailer,
{
    pub fn new(profiles: P, mailer: M, config: NotifyConfig) -> Self {
        Self {
            profiles,
            mailer,
            config,
        }
    }

    fn notify(&self, notice: &CompletionNotice) -> HandlerOutcome {
        let profile = match self.profiles.get_profile(notice.user_id) {
            Ok(profile) => profile,
            Err(e) => return HandlerOutcome::Retry(format!("profile lookup failed: {e}")),
        };

        let url = format!("{}{}", self.config.base_url, notice.job_id);
        let body = format!(
            "Hello {},\n\nYour analysis job {} ({}) has completed.\nView it here: {}\n",
            profile.name, notice.job_id, notice.input_file_name, url
        );

        match self.mailer.send(&profile.email, &self.config.subject, &body) {
            Ok(receipt) => {
                info!(
                    job_id = %notice.job_id,
                    recipient = %profile.email,
                    message_id = %receipt.message_id,
                    "completion mail sent"
                );
                HandlerOutcome::Ack
            }
            Err(e) => HandlerOutcome::Retry(format!("mail send failed: {e}")),
        }
    }
}

impl<P, M> MessageHandler for NotifyWorker<P, M>
where
    P: ProfileService + Send,
    M: Mailer + Send,
{
    fn handle(&mut self, body: &str) -> HandlerOutcome {
        let notice: CompletionNotice = match serde_json::from_str(body) {
            Ok(notice) => notice,
            Err(e) => return HandlerOutcome::Drop(format!("bad completion notice: {e}")),
        };
        self.notify(&notice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use frostflow_core::{JobId, PlanTier, UserId};

    use crate::collaborators::{InMemoryProfileService, RecordingMailer, UserProfile};

    fn notice(user_id: UserId) -> CompletionNotice {
        CompletionNotice {
            user_id,
            input_file_name: "sample.vcf".into(),
            job_id: JobId::new(),
            results_file: "jobs/u/j~sample.annot.vcf".into(),
        }
    }

    fn worker_with_profile() -> (
        NotifyWorker<Arc<InMemoryProfileService>, Arc<RecordingMailer>>,
        Arc<InMemoryProfileService>,
        Arc<RecordingMailer>,
        UserId,
    ) {
        let profiles = InMemoryProfileService::arc();
        let mailer = RecordingMailer::arc();
        let user_id = UserId::new();
        profiles.insert(
            user_id,
            UserProfile {
                email: "owner@example.com".into(),
                name: "Ada".into(),
                plan: PlanTier::Premium,
            },
        );
        let worker = NotifyWorker::new(profiles.clone(), mailer.clone(), NotifyConfig::default());
        (worker, profiles, mailer, user_id)
    }

    #[test]
    fn sends_exactly_one_mail_per_notice() {
        let (mut worker, _profiles, mailer, user_id) = worker_with_profile();
        let notice = notice(user_id);
        let body = serde_json::to_string(&notice).unwrap();

        assert_eq!(worker.handle(&body), HandlerOutcome::Ack);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "owner@example.com");
        assert!(sent[0].body.contains(&notice.job_id.to_string()));
        assert!(sent[0].body.contains("Ada"));
    }

    #[test]
    fn mailer_outage_retries_the_notice() {
        let (mut worker, _profiles, mailer, user_id) = worker_with_profile();
        mailer.set_failing(true);
        let body = serde_json::to_string(&notice(user_id)).unwrap();

        assert!(matches!(worker.handle(&body), HandlerOutcome::Retry(_)));
        assert!(mailer.sent().is_empty());

        mailer.set_failing(false);
        assert_eq!(worker.handle(&body), HandlerOutcome::Ack);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn unknown_user_retries_until_the_profile_appears() {
        let profiles = InMemoryProfileService::arc();
        let mailer = RecordingMailer::arc();
        let mut worker =
            NotifyWorker::new(profiles.clone(), mailer.clone(), NotifyConfig::default());

        let user_id = UserId::new();
        let body = serde_json::to_string(&notice(user_id)).unwrap();
        assert!(matches!(worker.handle(&body), HandlerOutcome::Retry(_)));
    }
}
