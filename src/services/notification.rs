// src/services/notification.rs

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::auth::Role;

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Welcome {
        user_id: Uuid,
        email: Option<String>,
        phone_number: String,
        first_name: String,
        role: Role,
    },
    InvoiceIssued {
        invoice_id: Uuid,
        invoice_number: String,
        customer_id: Uuid,
        total: Decimal,
    },
    LowStock {
        item_id: Uuid,
        name: String,
        quantity: i32,
        min_level: i32,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Welcome { .. } => "welcome",
            Notification::InvoiceIssued { .. } => "invoice_issued",
            Notification::LowStock { .. } => "low_stock",
        }
    }
}

/// Canal de e-mail/SMS. Falhas nunca abortam operações do núcleo.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> anyhow::Result<()>;
}

/// Implementação padrão: só registra no log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> anyhow::Result<()> {
        tracing::info!(kind = notification.kind(), ?notification, "📨 Notificação enviada");
        Ok(())
    }
}

pub type SharedNotifier = Arc<dyn Notifier>;

/// Dispara e esquece: erro vira `warn!`.
pub async fn notify_best_effort(notifier: &dyn Notifier, notification: Notification) {
    let kind = notification.kind();
    if let Err(e) = notifier.send(notification).await {
        tracing::warn!(kind, error = %e, "Falha ao enviar notificação (ignorada)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn send(&self, _notification: Notification) -> anyhow::Result<()> {
            anyhow::bail!("smtp down")
        }
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        notify_best_effort(
            &FailingNotifier,
            Notification::LowStock {
                item_id: Uuid::new_v4(),
                name: "Óleo 5W30".into(),
                quantity: 1,
                min_level: 2,
            },
        )
        .await;
    }
}
