use failure::{Error as FailureError, Fail};
use futures::future::BoxFuture;
use hyper::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Method, Request};

use crate::config;
use crate::errors::Error;
use crate::http::client::{HttpClient, HttpClientError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EmailDelivery {
    Sent,
    /// Delivery is disabled, the message was only logged.
    Skipped,
}

pub trait EmailClient: Send + Sync {
    fn send(&self, message: EmailMessage) -> BoxFuture<'static, Result<EmailDelivery, FailureError>>;
}

#[derive(Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
struct Personalization<'a> {
    to: Vec<Address<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'static str,
    value: &'a str,
}

#[derive(Serialize)]
struct MailSend<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: Address<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

fn mail_send_body(config: &config::Email, message: &EmailMessage) -> Result<String, FailureError> {
    let body = MailSend {
        personalizations: vec![Personalization {
            to: vec![Address {
                email: &message.to,
                name: message.to_name.as_deref(),
            }],
        }],
        from: Address {
            email: &config.sender_email,
            name: Some(&config.sender_name),
        },
        subject: &message.subject,
        content: vec![
            Content {
                content_type: "text/plain",
                value: &message.text,
            },
            Content {
                content_type: "text/html",
                value: &message.html,
            },
        ],
    };
    Ok(serde_json::to_string(&body)?)
}

#[derive(Clone)]
pub struct SendGridEmailClient {
    http: HttpClient,
    config: config::Email,
}

impl SendGridEmailClient {
    pub fn new(http: HttpClient, config: config::Email) -> Self {
        Self { http, config }
    }

    pub fn is_enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }
}

impl EmailClient for SendGridEmailClient {
    fn send(&self, message: EmailMessage) -> BoxFuture<'static, Result<EmailDelivery, FailureError>> {
        let client = self.clone();
        Box::pin(async move {
            if !client.is_enabled() {
                info!("Email delivery disabled, not sending \"{}\" to {}", message.subject, message.to);
                return Ok(EmailDelivery::Skipped);
            }

            let body = mail_send_body(&client.config, &message)?;
            let auth = HeaderValue::from_str(&format!("Bearer {}", client.config.api_key)).map_err(|e| e.context(Error::HttpClient))?;
            let request = Request::builder()
                .method(Method::POST)
                .uri(format!("{}/v3/mail/send", client.config.api_url.trim_end_matches('/')))
                .header(AUTHORIZATION, auth)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .map_err(|e| e.context(Error::HttpClient))?;

            let response = client.http.send(request).await?;
            if !response.status.is_success() {
                return Err(HttpClientError::Status {
                    status: response.status.as_u16(),
                    body: String::from_utf8_lossy(&response.body).into_owned(),
                }
                .context(Error::HttpClient)
                .into());
            }
            debug!("Email \"{}\" accepted for {}", message.subject, message.to);
            Ok(EmailDelivery::Sent)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_mail_send_payload() {
        let config = config::Email {
            api_url: "https://api.sendgrid.com".to_string(),
            api_key: "SG.key".to_string(),
            sender_email: "noreply@remondis.fr".to_string(),
            sender_name: "REMONDIS".to_string(),
            site_url: "https://bennes.remondis.fr".to_string(),
        };
        let message = EmailMessage {
            to: "marie@exemple.fr".to_string(),
            to_name: None,
            subject: "Bienvenue".to_string(),
            text: "Bonjour".to_string(),
            html: "<p>Bonjour</p>".to_string(),
        };

        let body: serde_json::Value = serde_json::from_str(&mail_send_body(&config, &message).unwrap()).unwrap();
        assert_eq!(body["personalizations"][0]["to"][0]["email"], "marie@exemple.fr");
        assert!(body["personalizations"][0]["to"][0].get("name").is_none());
        assert_eq!(body["from"]["name"], "REMONDIS");
        assert_eq!(body["content"][0]["type"], "text/plain");
        assert_eq!(body["content"][1]["value"], "<p>Bonjour</p>");
    }
}
