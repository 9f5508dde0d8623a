use std::{sync::Arc, time::Duration};

use crate::config::AppConfig;
use crate::db;
use crate::mailer::{Backoff, Mailer, SendGridMailer};
use crate::store::Storage;

#[derive(Clone)]
pub struct AppState {
    pub store: Storage,
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Builds the state and hands back the pool so migrations can run on it.
    pub async fn init() -> anyhow::Result<(Self, sqlx::PgPool)> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = db::connect(&config.db).await?;

        let store = Storage::postgres(pool.clone(), config.query_timeout());
        let mailer = Arc::new(SendGridMailer::new(
            config.mail.sendgrid_api_key.clone(),
            config.mail.from_email.clone(),
            Backoff::new(config.mail.max_retries, Duration::from_secs(1)),
        )) as Arc<dyn Mailer>;

        Ok((Self::from_parts(store, mailer, config), pool))
    }

    pub fn from_parts(store: Storage, mailer: Arc<dyn Mailer>, config: Arc<AppConfig>) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Whether outgoing mail should go through the provider's sandbox.
    pub fn mail_sandbox(&self) -> bool {
        !self.config.is_production()
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::mailer::MailError;
    use crate::store::memory::MemoryBackend;

    /// A message the fake mailer accepted.
    #[derive(Debug, Clone)]
    pub struct SentMail {
        pub template: String,
        pub username: String,
        pub email: String,
        pub data: Value,
        pub sandbox: bool,
    }

    #[derive(Default)]
    pub struct FakeMailer {
        pub sent: Mutex<Vec<SentMail>>,
        fail: AtomicBool,
    }

    impl FakeMailer {
        pub fn failing() -> Self {
            let mailer = Self::default();
            mailer.fail.store(true, Ordering::SeqCst);
            mailer
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        async fn send(
            &self,
            template: &str,
            username: &str,
            email: &str,
            data: &Value,
            sandbox: bool,
        ) -> Result<(), MailError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailError::DeliveryFailed {
                    attempts: 3,
                    last: Box::new(MailError::Rejected(503)),
                });
            }
            self.sent.lock().unwrap().push(SentMail {
                template: template.into(),
                username: username.into(),
                email: email.into(),
                data: data.clone(),
                sandbox,
            });
            Ok(())
        }
    }

    /// State over a fresh in-memory backend.
    pub fn state(mailer: Arc<FakeMailer>) -> (AppState, MemoryBackend) {
        let backend = MemoryBackend::default();
        let state = AppState::from_parts(
            Storage::in_memory(&backend),
            mailer as Arc<dyn Mailer>,
            Arc::new(AppConfig::for_tests()),
        );
        (state, backend)
    }
}
