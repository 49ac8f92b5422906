use crate::error::Result;
use crate::manifest::{Settings, Target};
use crate::planner::WorkItem;
use crate::utils::template;
use std::sync::Arc;
use std::time::Duration;

pub mod notify;
pub mod review;

pub use notify::{Notifier, WebhookNotifier};
pub use review::{HttpReviewTransport, PullRequest, ReviewTransport};

const HTTP_TIMEOUT_SECS: u64 = 30;

const PR_BODY_TEMPLATE: &str = "\
This automated change bumps `{module}` to `{version}`.

Repository: `{repo}`
Branch: `{branch}`

Opened by ripple; verification commands ran before this request was created.";

/// Review-request and notification lifecycle for executed work items.
///
/// `ensure_pr` is idempotent: an open request for the item's repo+branch
/// is returned unchanged instead of creating a duplicate, which is what
/// makes resuming an interrupted rollout safe.
pub struct Broker {
    review: Option<Arc<dyn ReviewTransport>>,
    notifier: Option<Arc<dyn Notifier>>,
    base_branch: String,
}

impl Broker {
    pub fn new(
        review: Option<Arc<dyn ReviewTransport>>,
        notifier: Option<Arc<dyn Notifier>>,
        base_branch: &str,
    ) -> Self {
        Self {
            review,
            notifier,
            base_branch: base_branch.to_string(),
        }
    }

    /// Build HTTP transports for whichever endpoints are configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let timeout = Duration::from_secs(HTTP_TIMEOUT_SECS);

        let review: Option<Arc<dyn ReviewTransport>> = match settings.review_api_url.as_deref() {
            Some(url) => Some(Arc::new(HttpReviewTransport::new(url, timeout)?)),
            None => None,
        };

        let notifier: Option<Arc<dyn Notifier>> = match settings.notify_webhook_url.as_deref() {
            Some(url) => Some(Arc::new(WebhookNotifier::new(url, timeout)?)),
            None => None,
        };

        Ok(Self::new(review, notifier, &settings.review_base_branch))
    }

    pub fn has_review_transport(&self) -> bool {
        self.review.is_some()
    }

    /// Ensure an open review request exists for the item. Returns `None`
    /// when no review transport is configured.
    pub fn ensure_pr(&self, target: &Target, item: &WorkItem) -> Result<Option<PullRequest>> {
        let Some(review) = &self.review else {
            return Ok(None);
        };

        if let Some(existing) = review.find_open(&item.repo, &item.branch)? {
            if std::env::var("RIPPLE_VERBOSE").is_ok() {
                eprintln!(
                    "[VERBOSE] Reusing open review request {}#{}",
                    existing.repo, existing.number
                );
            }
            return Ok(Some(existing));
        }

        let title = format!("Bump {} to {}", target.module, target.version);
        let body = template::expand(
            PR_BODY_TEMPLATE,
            &[
                ("module", target.module.as_str()),
                ("version", target.version.as_str()),
                ("repo", item.repo.as_str()),
                ("branch", item.branch.as_str()),
            ],
        );

        review
            .create(&item.repo, &item.branch, &self.base_branch, &title, &body)
            .map(Some)
    }

    /// Append a status comment. Each call is a new comment; duplicates
    /// across resumes are an accepted cost.
    pub fn comment(&self, pr: &PullRequest, body: &str) -> Result<()> {
        match &self.review {
            Some(review) => review.comment(pr, body),
            None => Ok(()),
        }
    }

    /// Send an external notification. The caller treats errors as
    /// warnings; a failed notification never fails the work item.
    pub fn notify(&self, text: &str) -> Result<()> {
        match &self.notifier {
            Some(notifier) => notifier.notify(text),
            None => Ok(()),
        }
    }
}
