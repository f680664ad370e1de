//! Transactional emails. Sending never fails the operation that triggered
//! it; every attempt is recorded in the email log instead.

use std::sync::Arc;

use crate::clients::{EmailClient, EmailDelivery, EmailMessage};
use crate::models::{EmailStatus, NewEmailLog, Order, OrderStatus};
use crate::repos;
use crate::sentry_integration::log_and_capture_error;
use crate::services::types::ServiceContext;
use crate::types::{DbPool, OrderId};

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    EmailVerification { first_name: String, token: String },
    OrderReceived { order: Order },
    PaymentConfirmed { order: Order },
    OrderStatusChanged { order: Order, comment: Option<String> },
    DeliveryDateProposed { order: Order, comment: Option<String> },
    AbandonedCheckout { order_id: OrderId, amount_ttc: f64 },
    Inactivity { first_name: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "En attente",
        OrderStatus::Confirmed => "Confirmée",
        OrderStatus::Delivered => "Benne livrée",
        OrderStatus::Collected => "Benne enlevée",
        OrderStatus::Completed => "Terminée",
        OrderStatus::Cancelled => "Annulée",
    }
}

pub fn format_euros(amount: f64) -> String {
    format!("{:.2} €", amount).replace('.', ",")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_body(paragraphs: &[String]) -> String {
    let body = paragraphs
        .iter()
        .map(|p| format!("<p>{}</p>", escape_html(p)))
        .collect::<Vec<_>>()
        .join("\n");
    format!("<html><body>\n{}\n<p>L'équipe REMONDIS</p>\n</body></html>", body)
}

fn order_summary(order: &Order) -> String {
    format!(
        "{}, {} jours, {}. Montant TTC : {}.",
        order.service_name,
        order.configuration.rental_days,
        order.configuration.address.display_line(),
        format_euros(order.price.total_ttc)
    )
}

impl Notification {
    pub fn template(&self) -> &'static str {
        match self {
            Notification::EmailVerification { .. } => "email_verification",
            Notification::OrderReceived { .. } => "order_received",
            Notification::PaymentConfirmed { .. } => "payment_confirmed",
            Notification::OrderStatusChanged { .. } => "order_status_changed",
            Notification::DeliveryDateProposed { .. } => "delivery_date_proposed",
            Notification::AbandonedCheckout { .. } => "abandoned_checkout",
            Notification::Inactivity { .. } => "inactivity",
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Notification::OrderReceived { order }
            | Notification::PaymentConfirmed { order }
            | Notification::OrderStatusChanged { order, .. }
            | Notification::DeliveryDateProposed { order, .. } => Some(order.id),
            Notification::AbandonedCheckout { order_id, .. } => Some(*order_id),
            _ => None,
        }
    }

    pub fn render(&self, site_url: &str) -> RenderedEmail {
        let site_url = site_url.trim_end_matches('/');
        let (subject, paragraphs) = match self {
            Notification::EmailVerification { first_name, token } => (
                "Confirmez votre adresse e-mail".to_string(),
                vec![
                    format!("Bonjour {},", first_name),
                    "Merci pour votre inscription. Confirmez votre adresse e-mail en ouvrant le lien suivant :".to_string(),
                    format!("{}/verify-email?token={}", site_url, token),
                ],
            ),
            Notification::OrderReceived { order } => (
                format!("Commande {} enregistrée", order.number()),
                vec![
                    format!("Bonjour {},", order.customer.first_name),
                    format!("Nous avons bien reçu votre commande {}.", order.number()),
                    order_summary(order),
                    format!("Suivi : {}/orders/{}", site_url, order.id),
                ],
            ),
            Notification::PaymentConfirmed { order } => (
                format!("Paiement confirmé pour la commande {}", order.number()),
                vec![
                    format!("Bonjour {},", order.customer.first_name),
                    format!("Votre paiement de {} a été accepté.", format_euros(order.price.total_ttc)),
                    order_summary(order),
                ],
            ),
            Notification::OrderStatusChanged { order, comment } => {
                let mut paragraphs = vec![
                    format!("Bonjour {},", order.customer.first_name),
                    format!("Votre commande {} est désormais : {}.", order.number(), status_label(order.status)),
                ];
                paragraphs.extend(comment.clone());
                (format!("Commande {} : {}", order.number(), status_label(order.status)), paragraphs)
            }
            Notification::DeliveryDateProposed { order, comment } => {
                let date = order
                    .proposed_delivery_date
                    .map(|d| d.format("%d/%m/%Y").to_string())
                    .unwrap_or_default();
                let mut paragraphs = vec![
                    format!("Bonjour {},", order.customer.first_name),
                    format!("Nous vous proposons une livraison le {} pour la commande {}.", date, order.number()),
                ];
                paragraphs.extend(comment.clone());
                paragraphs.push(format!("Acceptez ou refusez cette date : {}/orders/{}", site_url, order.id));
                (format!("Nouvelle date de livraison pour la commande {}", order.number()), paragraphs)
            }
            Notification::AbandonedCheckout { order_id, amount_ttc } => (
                "Votre commande vous attend".to_string(),
                vec![
                    "Bonjour,".to_string(),
                    format!("Votre commande d'un montant de {} n'a pas été réglée.", format_euros(*amount_ttc)),
                    format!("Finalisez-la ici : {}/orders/{}", site_url, order_id),
                ],
            ),
            Notification::Inactivity { first_name } => (
                "Besoin d'une benne ?".to_string(),
                vec![
                    format!("Bonjour {},", first_name),
                    "Cela fait un moment que nous ne vous avons pas vu. Nos bennes sont disponibles dès demain.".to_string(),
                    site_url.to_string(),
                ],
            ),
        };

        let mut text = paragraphs.join("\n\n");
        text.push_str("\n\nL'équipe REMONDIS");
        RenderedEmail {
            subject,
            html: html_body(&paragraphs),
            text,
        }
    }
}

#[derive(Clone)]
pub struct Notifier {
    db_pool: DbPool,
    email: Arc<dyn EmailClient>,
    site_url: String,
}

impl Notifier {
    pub fn new(ctx: &ServiceContext) -> Self {
        Self {
            db_pool: ctx.db_pool.clone(),
            email: ctx.email.clone(),
            site_url: ctx.config.email.site_url.clone(),
        }
    }

    /// Sends the notification and records the outcome.
    pub async fn notify(&self, recipient: String, recipient_name: Option<String>, notification: Notification) -> EmailStatus {
        let rendered = notification.render(&self.site_url);
        let message = EmailMessage {
            to: recipient.clone(),
            to_name: recipient_name,
            subject: rendered.subject.clone(),
            text: rendered.text,
            html: rendered.html,
        };

        let (status, error) = match self.email.send(message).await {
            Ok(EmailDelivery::Sent) => (EmailStatus::Sent, None),
            Ok(EmailDelivery::Skipped) => (EmailStatus::Skipped, None),
            Err(e) => {
                log_and_capture_error(&format!("Sending {} to {} failed: {}", notification.template(), recipient, e));
                (EmailStatus::Failed, Some(e.to_string()))
            }
        };

        let log = NewEmailLog {
            recipient,
            template: notification.template().to_string(),
            subject: rendered.subject,
            status,
            error,
            order_id: notification.order_id(),
        };
        let recorded = match self.db_pool.get().await {
            Ok(conn) => repos::email_log::make_repo()
                .insert_exactly_one(&*conn, log)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = recorded {
            error!("Could not record email log: {}", e);
        }

        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_french_amounts() {
        assert_eq!(format_euros(502.08), "502,08 €");
        assert_eq!(format_euros(60.0), "60,00 €");
    }

    #[test]
    fn verification_email_links_to_site() {
        let rendered = Notification::EmailVerification {
            first_name: "Marie".to_string(),
            token: "abc123".to_string(),
        }
        .render("https://bennes.remondis.fr/");
        assert!(rendered.text.contains("https://bennes.remondis.fr/verify-email?token=abc123"));
        assert!(rendered.html.starts_with("<html>"));
    }

    #[test]
    fn html_is_escaped() {
        let rendered = Notification::Inactivity {
            first_name: "<script>".to_string(),
        }
        .render("https://bennes.remondis.fr");
        assert!(rendered.html.contains("&lt;script&gt;"));
        assert!(!rendered.html.contains("<script>"));
    }
}
