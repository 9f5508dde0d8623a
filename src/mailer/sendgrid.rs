use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{deliver_with_backoff, templates, Backoff, MailError, Mailer, FROM_NAME};

const SENDGRID_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
struct Toggle {
    enable: bool,
}

#[derive(Debug, Serialize)]
struct MailSettings {
    sandbox_mode: Toggle,
}

/// Body of `POST /v3/mail/send`.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
    mail_settings: MailSettings,
}

#[derive(Clone)]
pub struct SendGridMailer {
    client: reqwest::Client,
    api_key: String,
    from_email: String,
    backoff: Backoff,
}

impl SendGridMailer {
    pub fn new(api_key: String, from_email: String, backoff: Backoff) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            from_email,
            backoff,
        }
    }

    async fn post(&self, body: &SendRequest<'_>) -> Result<u16, MailError> {
        let response = self
            .client
            .post(SENDGRID_SEND_URL)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(MailError::Rejected(status.as_u16()))
        }
    }
}

fn build_request<'a>(
    from_email: &'a str,
    username: &'a str,
    email: &'a str,
    rendered: &'a templates::Rendered,
    sandbox: bool,
) -> SendRequest<'a> {
    SendRequest {
        personalizations: [Personalization {
            to: [Address {
                email,
                name: username,
            }],
        }],
        from: Address {
            email: from_email,
            name: FROM_NAME,
        },
        subject: &rendered.subject,
        content: [Content {
            kind: "text/html",
            value: &rendered.html,
        }],
        mail_settings: MailSettings {
            sandbox_mode: Toggle { enable: sandbox },
        },
    }
}

#[async_trait]
impl Mailer for SendGridMailer {
    async fn send(
        &self,
        template: &str,
        username: &str,
        email: &str,
        data: &Value,
        sandbox: bool,
    ) -> Result<(), MailError> {
        let rendered = templates::render(template, data)?;
        let request = build_request(&self.from_email, username, email, &rendered, sandbox);
        debug!(%template, %email, sandbox, "sending email via sendgrid");
        deliver_with_backoff(self.backoff, email, || self.post(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_matches_sendgrid_shape() {
        let rendered = templates::Rendered {
            subject: "Hello".into(),
            html: "<p>hi</p>".into(),
        };
        let request = build_request(
            "noreply@gosocial.local",
            "alice",
            "alice@example.com",
            &rendered,
            true,
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "personalizations": [{ "to": [{ "email": "alice@example.com", "name": "alice" }] }],
                "from": { "email": "noreply@gosocial.local", "name": "GoSocial" },
                "subject": "Hello",
                "content": [{ "type": "text/html", "value": "<p>hi</p>" }],
                "mail_settings": { "sandbox_mode": { "enable": true } }
            })
        );
    }

    #[tokio::test]
    async fn unknown_template_fails_before_any_request() {
        let mailer = SendGridMailer::new(
            "SG.test".into(),
            "noreply@gosocial.local".into(),
            Backoff::default(),
        );
        let err = mailer
            .send("missing", "alice", "alice@example.com", &json!({}), true)
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::UnknownTemplate(_)));
    }
}
