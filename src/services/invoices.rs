use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub const NAMES: &'static [&'static str] = &["draft", "sent", "paid", "overdue", "void"];
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub number: String,
    pub customer_name: String,
    pub total: Decimal,
    pub status: InvoiceStatus,
    pub issued_on: NaiveDate,
    pub due_on: NaiveDate,
    pub sent_to: Option<String>,
    pub void_reason: Option<String>,
    pub voided_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Email,
    Sms,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reminder {
    pub invoice_id: Uuid,
    pub method: DeliveryMethod,
    pub destination: String,
    /// Extra caller-supplied fields, kept as sent.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    pub queued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub statuses: Vec<InvoiceStatus>,
    pub limit: Option<usize>,
    pub offset: usize,
}

#[async_trait]
pub trait InvoiceService: Send + Sync {
    async fn list(&self, organization_id: Uuid, filter: &InvoiceFilter) -> Result<Vec<Invoice>, ServiceError>;

    async fn get(&self, organization_id: Uuid, id: Uuid) -> Result<Invoice, ServiceError>;

    async fn send(
        &self,
        organization_id: Uuid,
        id: Uuid,
        recipient: &str,
        message: Option<&str>,
    ) -> Result<Invoice, ServiceError>;

    async fn remind(
        &self,
        organization_id: Uuid,
        id: Uuid,
        method: DeliveryMethod,
        destination: &str,
        metadata: Map<String, Value>,
    ) -> Result<Reminder, ServiceError>;

    /// Voiding an already void invoice returns it unchanged.
    async fn void(&self, organization_id: Uuid, id: Uuid, reason: &str, by: Uuid) -> Result<Invoice, ServiceError>;
}

#[derive(Default)]
pub struct MemoryInvoiceService {
    invoices: DashMap<Uuid, Invoice>,
    reminders: DashMap<Uuid, Vec<Reminder>>,
}

impl MemoryInvoiceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, invoice: Invoice) {
        self.invoices.insert(invoice.id, invoice);
    }

    /// Adds a draft invoice for `organization_id` and returns it.
    pub fn create_draft(&self, organization_id: Uuid, customer_name: &str, total: Decimal) -> Invoice {
        let issued_on = Utc::now().date_naive();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            organization_id,
            number: format!("INV-{:05}", self.invoices.len() + 1),
            customer_name: customer_name.to_string(),
            total,
            status: InvoiceStatus::Draft,
            issued_on,
            due_on: issued_on + Duration::days(30),
            sent_to: None,
            void_reason: None,
            voided_by: None,
            updated_at: Utc::now(),
        };
        self.insert(invoice.clone());
        invoice
    }

    pub fn reminders_for(&self, id: Uuid) -> Vec<Reminder> {
        self.reminders.get(&id).map(|r| r.value().clone()).unwrap_or_default()
    }

    fn not_found(id: Uuid) -> ServiceError {
        ServiceError::NotFound(format!("Invoice {} not found", id))
    }

    /// Applies `update` to an invoice owned by the organization.
    fn update<F>(&self, organization_id: Uuid, id: Uuid, update: F) -> Result<Invoice, ServiceError>
    where
        F: FnOnce(&mut Invoice),
    {
        let mut entry = self
            .invoices
            .get_mut(&id)
            .filter(|invoice| invoice.organization_id == organization_id)
            .ok_or_else(|| Self::not_found(id))?;
        update(entry.value_mut());
        Ok(entry.value().clone())
    }
}

#[async_trait]
impl InvoiceService for MemoryInvoiceService {
    async fn list(&self, organization_id: Uuid, filter: &InvoiceFilter) -> Result<Vec<Invoice>, ServiceError> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|entry| entry.organization_id == organization_id)
            .filter(|entry| filter.statuses.is_empty() || filter.statuses.contains(&entry.status))
            .map(|entry| entry.value().clone())
            .collect();

        invoices.sort_by(|a, b| a.number.cmp(&b.number));

        Ok(invoices
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn get(&self, organization_id: Uuid, id: Uuid) -> Result<Invoice, ServiceError> {
        self.invoices
            .get(&id)
            .filter(|invoice| invoice.organization_id == organization_id)
            .map(|invoice| invoice.value().clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn send(
        &self,
        organization_id: Uuid,
        id: Uuid,
        recipient: &str,
        _message: Option<&str>,
    ) -> Result<Invoice, ServiceError> {
        self.update(organization_id, id, |invoice| {
            if invoice.status == InvoiceStatus::Draft {
                invoice.status = InvoiceStatus::Sent;
            }
            invoice.sent_to = Some(recipient.to_string());
            invoice.updated_at = Utc::now();
        })
    }

    async fn remind(
        &self,
        organization_id: Uuid,
        id: Uuid,
        method: DeliveryMethod,
        destination: &str,
        metadata: Map<String, Value>,
    ) -> Result<Reminder, ServiceError> {
        let invoice = self.get(organization_id, id).await?;
        let reminder = Reminder {
            invoice_id: invoice.id,
            method,
            destination: destination.to_string(),
            metadata,
            queued_at: Utc::now(),
        };
        self.reminders.entry(id).or_default().push(reminder.clone());
        Ok(reminder)
    }

    async fn void(&self, organization_id: Uuid, id: Uuid, reason: &str, by: Uuid) -> Result<Invoice, ServiceError> {
        self.update(organization_id, id, |invoice| {
            if invoice.status == InvoiceStatus::Void {
                return;
            }
            invoice.status = InvoiceStatus::Void;
            invoice.void_reason = Some(reason.to_string());
            invoice.voided_by = Some(by);
            invoice.updated_at = Utc::now();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invoices_are_scoped_to_organization() {
        let service = MemoryInvoiceService::new();
        let org = Uuid::new_v4();
        let other = Uuid::new_v4();
        let invoice = service.create_draft(org, "Acme Soil", Decimal::new(125_000, 2));

        assert!(service.get(org, invoice.id).await.is_ok());
        assert!(matches!(service.get(other, invoice.id).await, Err(ServiceError::NotFound(_))));
        assert!(service.list(other, &InvoiceFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let service = MemoryInvoiceService::new();
        let org = Uuid::new_v4();
        for i in 0..5 {
            service.create_draft(org, &format!("Customer {}", i), Decimal::ONE);
        }
        let first = service.list(org, &InvoiceFilter::default()).await.unwrap()[0].id;
        service.send(org, first, "ap@example.com", None).await.unwrap();

        let sent = InvoiceFilter {
            statuses: vec![InvoiceStatus::Sent],
            ..Default::default()
        };
        assert_eq!(service.list(org, &sent).await.unwrap().len(), 1);

        let page = InvoiceFilter {
            limit: Some(2),
            offset: 3,
            ..Default::default()
        };
        assert_eq!(service.list(org, &page).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_remind_records_reminder() {
        let service = MemoryInvoiceService::new();
        let org = Uuid::new_v4();
        let invoice = service.create_draft(org, "Acme Soil", Decimal::ONE);

        let mut metadata = Map::new();
        metadata.insert("channel_hint".into(), Value::String("office".into()));
        service
            .remind(org, invoice.id, DeliveryMethod::Email, "ap@example.com", metadata)
            .await
            .unwrap();

        let reminders = service.reminders_for(invoice.id);
        assert_eq!(reminders.len(), 1);
        assert_eq!(reminders[0].destination, "ap@example.com");
        assert_eq!(reminders[0].metadata["channel_hint"], "office");

        let missing = service
            .remind(Uuid::new_v4(), invoice.id, DeliveryMethod::Email, "x@example.com", Map::new())
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_void_is_idempotent() {
        let service = MemoryInvoiceService::new();
        let org = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let invoice = service.create_draft(org, "Acme Soil", Decimal::ONE);

        let voided = service.void(org, invoice.id, "duplicate", admin).await.unwrap();
        assert_eq!(voided.status, InvoiceStatus::Void);

        let again = service.void(org, invoice.id, "other reason", Uuid::new_v4()).await.unwrap();
        assert_eq!(again.void_reason.as_deref(), Some("duplicate"));
        assert_eq!(again.voided_by, Some(admin));
    }
}
