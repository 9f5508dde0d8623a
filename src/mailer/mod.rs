use std::{future::Future, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod sendgrid;
pub mod templates;

pub use sendgrid::SendGridMailer;

pub const FROM_NAME: &str = "GoSocial";
pub const USER_INVITATION_TEMPLATE: &str = "user_invitation";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("unknown mail template {0:?}")]
    UnknownTemplate(String),
    #[error("mail transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail provider rejected the message with status {0}")]
    Rejected(u16),
    /// Terminal outcome of a delivery: retries ran out, or the provider
    /// refused the message outright. `last` is the final provider error.
    #[error("failed to send email after {attempts} attempt(s)")]
    DeliveryFailed {
        attempts: u32,
        #[source]
        last: Box<MailError>,
    },
}

impl MailError {
    /// Worth another attempt: network trouble, throttling or a provider 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            MailError::Transport(_) => true,
            MailError::Rejected(status) => *status == 429 || *status >= 500,
            MailError::UnknownTemplate(_) | MailError::DeliveryFailed { .. } => false,
        }
    }
}

/// Sends templated email. Implementations retry transient failures on their
/// own and only return once delivery succeeded or was given up on.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        template: &str,
        username: &str,
        email: &str,
        data: &Value,
        sandbox: bool,
    ) -> Result<(), MailError>;
}

/// Bounded retry with exponentially growing delay: `base`, `2 * base`, ...
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the failed attempt with zero-based index `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Drives `attempt` until it succeeds, fails permanently, or the policy is
/// used up. `attempt` resolves to the provider's status code on success.
pub async fn deliver_with_backoff<F, Fut>(
    policy: Backoff,
    recipient: &str,
    mut attempt: F,
) -> Result<(), MailError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u16, MailError>>,
{
    let mut last = None;
    for n in 0..policy.max_attempts {
        match attempt().await {
            Ok(status) => {
                info!(%recipient, status, attempt = n + 1, "email sent");
                return Ok(());
            }
            Err(e) if !e.is_transient() => {
                error!(%recipient, error = %e, "email rejected permanently");
                return Err(MailError::DeliveryFailed {
                    attempts: n + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                warn!(
                    %recipient,
                    error = %e,
                    attempt = n + 1,
                    max = policy.max_attempts,
                    "failed to send email"
                );
                last = Some(e);
            }
        }
        if n + 1 < policy.max_attempts {
            tokio::time::sleep(policy.delay(n)).await;
        }
    }

    let attempts = policy.max_attempts;
    error!(%recipient, attempts, "giving up on email");
    Err(MailError::DeliveryFailed {
        attempts,
        last: Box::new(last.unwrap_or(MailError::Rejected(0))),
    })
}
