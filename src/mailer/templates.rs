use serde_json::Value;

use super::{MailError, USER_INVITATION_TEMPLATE};

struct Template {
    subject: &'static str,
    body: &'static str,
}

const USER_INVITATION: Template = Template {
    subject: "Finish Registration with GoSocial",
    body: r#"<!doctype html>
<html>
  <body>
    <p>Hi {{username}},</p>
    <p>Thanks for signing up for GoSocial. We're excited to have you on board!</p>
    <p>Before you can start using GoSocial, please confirm your email address:</p>
    <p><a href="{{activation_url}}">{{activation_url}}</a></p>
    <p>If you didn't sign up for GoSocial, you can safely ignore this email.</p>
    <p>Thanks,<br/>The GoSocial Team</p>
  </body>
</html>
"#,
};

/// A rendered message ready to hand to a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
}

/// Fills `{{key}}` placeholders from `data`. Values are HTML-escaped in the
/// body; unknown keys render as nothing.
pub fn render(template: &str, data: &Value) -> Result<Rendered, MailError> {
    let tpl = match template {
        USER_INVITATION_TEMPLATE => &USER_INVITATION,
        other => return Err(MailError::UnknownTemplate(other.to_owned())),
    };
    Ok(Rendered {
        subject: fill(tpl.subject, data, false),
        html: fill(tpl.body, data, true),
    })
}

fn fill(text: &str, data: &Value, escape: bool) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let value = match data.get(after[..end].trim()) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        if escape {
            out.push_str(&escape_html(&value));
        } else {
            out.push_str(&value);
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
