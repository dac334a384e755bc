// src/services/invoice_service.rs

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{error::AppError, money::checked_sum},
    db::{Store, UnitOfWork},
    models::{
        auth::{ActorContext, Permission},
        catalog::DiscountSpec,
        inventory::{StockLine, StockRecord},
        invoice::{
            CreateInvoiceRequest, Invoice, InvoiceDetail, InvoiceFilter, InvoiceLine,
            InvoiceLineRequest, InvoicePreview, InvoiceStatus, LineDraft, LineKind,
            UpdateInvoiceDiscountRequest,
        },
        tenancy::Branch,
    },
    services::{
        invoice_number::InvoiceNumberAllocator,
        lookup,
        notification::{notify_best_effort, Notification, SharedNotifier},
        pricing::PricingEngine,
        rbac_service::RoleModel,
        scope_guard::ScopeGuard,
        stock_ledger::{MovementContext, StockLedger, StockPurpose},
    },
};

/// Quantidades de estoque que a própria fatura segura.
fn reserved_stock(lines: &[InvoiceLine]) -> Vec<StockLine> {
    lines
        .iter()
        .filter(|l| l.stock_reserved)
        .filter_map(|l| l.item_id.map(|item_id| StockLine { item_id, quantity: l.quantity }))
        .collect()
}

#[derive(Clone)]
pub struct InvoiceService<S: Store> {
    store: S,
    pricing: PricingEngine,
    notifier: SharedNotifier,
}

impl<S: Store> InvoiceService<S> {
    pub fn new(store: S, pricing: PricingEngine, notifier: SharedNotifier) -> Self {
        Self { store, pricing, notifier }
    }

    // ---
    // Criação
    // ---

    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn create_invoice(
        &self,
        actor: &ActorContext,
        request: CreateInvoiceRequest,
    ) -> Result<InvoiceDetail, AppError> {
        RoleModel::require(actor, Permission::InvoiceCreate)?;
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let branch = lookup::target_branch(&mut tx, actor, request.branch_id, "invoice").await?;
        let drafts = Self::resolve_lines(&mut tx, &branch, &request.lines).await?;

        let invoice_date = request.invoice_date.unwrap_or_else(|| Utc::now().date_naive());
        let invoice_number =
            InvoiceNumberAllocator::next_number(&mut tx, branch.company_id, invoice_date).await?;

        let mut invoice = Invoice::draft(
            &branch,
            invoice_number,
            invoice_date,
            request.customer_id,
            request.vehicle_id,
            request.overall_discount.unwrap_or_default(),
            self.pricing.resolve_tax(request.tax_percentage),
            actor.actor_id,
        );
        let mut lines = Self::build_lines(&invoice, drafts);
        self.pricing.price_invoice(&mut invoice, &mut lines)?;

        // Tudo na mesma transação: número, linhas e baixa de estoque
        let ctx = Self::movement_context(actor, &invoice);
        let stock = StockLedger::reserve_all(&mut tx, &ctx, &reserved_stock(&lines)).await?;
        tx.insert_invoice(&invoice, &lines).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total = %invoice.total_amount,
            "🧾 Fatura criada"
        );
        self.notify_low_stock(&stock, &lines).await;

        Ok(InvoiceDetail { invoice, lines })
    }

    /// Passos de preço sem persistir, sem número e sem mexer no estoque.
    pub async fn preview_invoice(
        &self,
        actor: &ActorContext,
        request: CreateInvoiceRequest,
    ) -> Result<InvoicePreview, AppError> {
        RoleModel::require(actor, Permission::InvoiceCreate)?;
        request.validate()?;

        // Transação só de leitura; descartada no drop
        let mut tx = self.store.begin().await?;
        let branch = lookup::target_branch(&mut tx, actor, request.branch_id, "invoice").await?;
        let drafts = Self::resolve_lines(&mut tx, &branch, &request.lines).await?;
        drop(tx);

        let mut invoice = Invoice::draft(
            &branch,
            String::new(),
            request.invoice_date.unwrap_or_else(|| Utc::now().date_naive()),
            request.customer_id,
            request.vehicle_id,
            request.overall_discount.unwrap_or_default(),
            self.pricing.resolve_tax(request.tax_percentage),
            actor.actor_id,
        );
        let mut lines = Self::build_lines(&invoice, drafts);
        let totals = self.pricing.price_invoice(&mut invoice, &mut lines)?;

        let line_savings = checked_sum(lines.iter().map(|l| l.discount_amount))?;
        Ok(InvoicePreview {
            lines,
            subtotal: totals.subtotal,
            overall_discount_amount: totals.overall_discount_amount,
            tax_percentage: invoice.tax_percentage,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            estimated_savings: line_savings + totals.overall_discount_amount,
        })
    }

    /// Fatura a partir de uma ordem de serviço. O estoque já foi baixado pela ordem.
    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn create_service_invoice(
        &self,
        actor: &ActorContext,
        service_record_id: Uuid,
    ) -> Result<InvoiceDetail, AppError> {
        RoleModel::require(actor, Permission::InvoiceCreate)?;

        let mut tx = self.store.begin().await?;
        let mut record = lookup::service_record(&mut tx, actor, service_record_id).await?;
        if record.invoice_id.is_some() {
            return Err(AppError::Conflict(
                "invoice already exists for this service record".into(),
            ));
        }
        let branch = tx
            .find_branch(record.branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("branch"))?;

        let mut drafts = Vec::new();
        for line in tx.list_service_record_lines(record.id).await? {
            let discount = match (line.item_id, line.service_type_id) {
                (Some(item_id), _) => tx
                    .find_item(item_id)
                    .await?
                    .map(|i| i.default_discount())
                    .unwrap_or_default(),
                (None, Some(service_type_id)) => tx
                    .find_service_type(service_type_id)
                    .await?
                    .map(|s| s.default_discount())
                    .unwrap_or_default(),
                (None, None) => DiscountSpec::none(),
            };
            drafts.push(LineDraft {
                kind: if line.item_id.is_some() { LineKind::Item } else { LineKind::Service },
                item_id: line.item_id,
                service_type_id: line.service_type_id,
                description: line.description,
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount,
                reserve_stock: false,
            });
        }
        if drafts.is_empty() {
            return Err(AppError::InvalidState("service record has no lines to invoice".into()));
        }

        let invoice_date = Utc::now().date_naive();
        let invoice_number =
            InvoiceNumberAllocator::next_number(&mut tx, branch.company_id, invoice_date).await?;
        let mut invoice = Invoice::draft(
            &branch,
            invoice_number,
            invoice_date,
            record.customer_id,
            Some(record.vehicle_id),
            DiscountSpec::none(),
            self.pricing.default_tax_percentage(),
            actor.actor_id,
        );
        invoice.service_record_id = Some(record.id);
        let mut lines = Self::build_lines(&invoice, drafts);
        self.pricing.price_invoice(&mut invoice, &mut lines)?;

        tx.insert_invoice(&invoice, &lines).await?;
        record.invoice_id = Some(invoice.id);
        record.updated_at = Utc::now();
        tx.update_service_record(&record).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            service_record_id = %record.id,
            invoice_number = %invoice.invoice_number,
            "🧾 Fatura de serviço criada"
        );
        Ok(InvoiceDetail { invoice, lines })
    }

    // ---
    // Alterações
    // ---

    /// Reaplica os passos de preço sobre as linhas persistidas, sem reler o catálogo.
    #[tracing::instrument(skip(self, actor, request), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn update_invoice_discounts(
        &self,
        actor: &ActorContext,
        invoice_id: Uuid,
        request: UpdateInvoiceDiscountRequest,
    ) -> Result<InvoiceDetail, AppError> {
        RoleModel::require(actor, Permission::InvoiceDiscount)?;
        request.validate()?;

        let mut tx = self.store.begin().await?;
        let mut invoice = lookup::invoice(&mut tx, actor, invoice_id).await?;
        if invoice.status.is_pricing_locked() {
            return Err(AppError::InvalidState(
                "cannot modify paid or cancelled invoice".into(),
            ));
        }

        if let Some(spec) = request.invoice_discount {
            invoice.set_overall_discount(spec);
        }

        let mut lines = tx.list_invoice_lines(invoice.id).await?;
        for override_ in &request.item_discounts {
            lines
                .iter_mut()
                .filter(|l| l.item_id == Some(override_.item_id))
                .for_each(|l| l.set_discount(override_.discount));
        }
        for override_ in &request.service_discounts {
            lines
                .iter_mut()
                .filter(|l| l.service_type_id == Some(override_.service_type_id))
                .for_each(|l| l.set_discount(override_.discount));
        }

        self.pricing.price_invoice(&mut invoice, &mut lines)?;
        tx.update_invoice_lines(&lines).await?;
        tx.update_invoice(&invoice).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id, total = %invoice.total_amount, "Descontos da fatura recalculados");
        Ok(InvoiceDetail { invoice, lines })
    }

    /// Troca o conjunto de linhas de uma fatura em DRAFT.
    #[tracing::instrument(skip(self, actor, new_lines), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn replace_invoice_lines(
        &self,
        actor: &ActorContext,
        invoice_id: Uuid,
        new_lines: Vec<InvoiceLineRequest>,
    ) -> Result<InvoiceDetail, AppError> {
        RoleModel::require(actor, Permission::InvoiceCreate)?;
        if new_lines.is_empty() {
            return Err(AppError::InvalidInput("at least one line is required".into()));
        }
        for line in &new_lines {
            line.validate()?;
        }

        let mut tx = self.store.begin().await?;
        let mut invoice = lookup::invoice(&mut tx, actor, invoice_id).await?;
        if invoice.status != InvoiceStatus::Draft {
            return Err(AppError::InvalidState("only draft invoices can change lines".into()));
        }
        let branch = tx
            .find_branch(invoice.branch_id)
            .await?
            .ok_or_else(|| AppError::not_found("branch"))?;

        let old_lines = tx.list_invoice_lines(invoice.id).await?;
        let drafts = Self::resolve_lines(&mut tx, &branch, &new_lines).await?;
        let mut lines = Self::build_lines(&invoice, drafts);
        self.pricing.price_invoice(&mut invoice, &mut lines)?;

        let ctx = Self::movement_context(actor, &invoice);
        let stock =
            StockLedger::replace(&mut tx, &ctx, &reserved_stock(&old_lines), &reserved_stock(&lines))
                .await?;
        tx.replace_invoice_lines(invoice.id, &lines).await?;
        tx.update_invoice(&invoice).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id, lines = lines.len(), "Linhas da fatura substituídas");
        self.notify_low_stock(&stock, &lines).await;
        Ok(InvoiceDetail { invoice, lines })
    }

    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn update_invoice_status(
        &self,
        actor: &ActorContext,
        invoice_id: Uuid,
        next: InvoiceStatus,
    ) -> Result<Invoice, AppError> {
        RoleModel::require(actor, Permission::InvoiceStatus)?;

        let mut tx = self.store.begin().await?;
        let mut invoice = lookup::invoice(&mut tx, actor, invoice_id).await?;
        if !invoice.status.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "cannot move invoice from {} to {}",
                invoice.status.as_str(),
                next.as_str()
            )));
        }

        if next == InvoiceStatus::Cancelled {
            let mut lines = tx.list_invoice_lines(invoice.id).await?;
            let ctx = Self::movement_context(actor, &invoice);
            StockLedger::release_all(&mut tx, &ctx, &reserved_stock(&lines)).await?;
            for line in lines.iter_mut() {
                line.stock_reserved = false;
            }
            tx.update_invoice_lines(&lines).await?;
        }

        let previous = invoice.status;
        invoice.status = next;
        invoice.updated_at = Utc::now();
        tx.update_invoice(&invoice).await?;
        tx.commit().await?;

        tracing::info!(
            invoice_id = %invoice.id,
            from = previous.as_str(),
            to = next.as_str(),
            "Status da fatura alterado"
        );

        if next == InvoiceStatus::Sent {
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::InvoiceIssued {
                    invoice_id: invoice.id,
                    invoice_number: invoice.invoice_number.clone(),
                    customer_id: invoice.customer_id,
                    total: invoice.total_amount,
                },
            )
            .await;
        }
        Ok(invoice)
    }

    #[tracing::instrument(skip(self, actor), fields(actor_id = %actor.actor_id, role = actor.role.as_str()))]
    pub async fn delete_invoice(&self, actor: &ActorContext, invoice_id: Uuid) -> Result<(), AppError> {
        RoleModel::require(actor, Permission::InvoiceDelete)?;

        let mut tx = self.store.begin().await?;
        let invoice = lookup::invoice(&mut tx, actor, invoice_id).await?;
        if !matches!(invoice.status, InvoiceStatus::Draft | InvoiceStatus::Cancelled) {
            return Err(AppError::InvalidState(
                "only draft or cancelled invoices can be deleted".into(),
            ));
        }

        let lines = tx.list_invoice_lines(invoice.id).await?;
        let ctx = Self::movement_context(actor, &invoice);
        StockLedger::release_all(&mut tx, &ctx, &reserved_stock(&lines)).await?;
        tx.delete_invoice(invoice.id).await?;
        tx.commit().await?;

        tracing::info!(invoice_id = %invoice.id, "🗑️ Fatura removida");
        Ok(())
    }

    // ---
    // Consultas
    // ---

    pub async fn get_invoice(&self, actor: &ActorContext, invoice_id: Uuid) -> Result<InvoiceDetail, AppError> {
        RoleModel::require(actor, Permission::InvoiceRead)?;
        let mut tx = self.store.begin().await?;
        let invoice = lookup::invoice(&mut tx, actor, invoice_id).await?;
        let lines = tx.list_invoice_lines(invoice.id).await?;
        Ok(InvoiceDetail { invoice, lines })
    }

    /// Números são únicos por empresa; SUPER_ADMIN precisa informar qual.
    pub async fn get_invoice_by_number(
        &self,
        actor: &ActorContext,
        company_id: Option<Uuid>,
        invoice_number: &str,
    ) -> Result<InvoiceDetail, AppError> {
        RoleModel::require(actor, Permission::InvoiceRead)?;
        let company_id = actor
            .company_id
            .or(company_id)
            .ok_or_else(|| AppError::InvalidInput("companyId is required".into()))?;
        ScopeGuard::authorize_company_access(actor, company_id, "invoice")?;

        let mut tx = self.store.begin().await?;
        let invoice = tx
            .find_invoice_by_number(company_id, invoice_number)
            .await?
            .ok_or_else(|| AppError::not_found("invoice"))?;
        ScopeGuard::authorize_resource_access(actor, invoice.scope(), "invoice")?;
        let lines = tx.list_invoice_lines(invoice.id).await?;
        Ok(InvoiceDetail { invoice, lines })
    }

    pub async fn list_invoices_by_branch(
        &self,
        actor: &ActorContext,
        branch_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        RoleModel::require(actor, Permission::InvoiceRead)?;
        let mut tx = self.store.begin().await?;
        let branch = lookup::branch(&mut tx, actor, branch_id, "branch invoices").await?;
        let filter = InvoiceFilter {
            company_id: Some(branch.company_id),
            branch_id: Some(branch.id),
            ..Default::default()
        };
        tx.list_invoices(&filter).await
    }

    pub async fn list_invoices_by_company(
        &self,
        actor: &ActorContext,
        company_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        RoleModel::require(actor, Permission::InvoiceRead)?;
        ScopeGuard::authorize_company_access(actor, company_id, "company invoices")?;
        let filter = InvoiceFilter {
            company_id: Some(company_id),
            ..Self::tenant_filter(actor)
        };
        self.store.begin().await?.list_invoices(&filter).await
    }

    pub async fn list_invoices_by_customer(
        &self,
        actor: &ActorContext,
        customer_id: Uuid,
    ) -> Result<Vec<Invoice>, AppError> {
        RoleModel::require(actor, Permission::InvoiceRead)?;
        let filter = InvoiceFilter {
            customer_id: Some(customer_id),
            ..Self::tenant_filter(actor)
        };
        self.store.begin().await?.list_invoices(&filter).await
    }

    pub async fn list_invoices_by_date_range(
        &self,
        actor: &ActorContext,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Invoice>, AppError> {
        RoleModel::require(actor, Permission::InvoiceRead)?;
        if from > to {
            return Err(AppError::InvalidInput("date range start must not be after its end".into()));
        }
        let filter = InvoiceFilter {
            date_from: Some(from),
            date_to: Some(to),
            ..Self::tenant_filter(actor)
        };
        self.store.begin().await?.list_invoices(&filter).await
    }

    // ---
    // Helpers
    // ---

    /// Restringe listagens ao tenant do ator: empresa, e filial para papéis de balcão.
    fn tenant_filter(actor: &ActorContext) -> InvoiceFilter {
        InvoiceFilter {
            company_id: actor.company_id,
            branch_id: if actor.role.requires_branch() { actor.branch_id } else { None },
            ..Default::default()
        }
    }

    /// Preço canônico e desconto padrão de cada linha, a partir do catálogo da filial.
    async fn resolve_lines(
        tx: &mut S::Tx,
        branch: &Branch,
        requests: &[InvoiceLineRequest],
    ) -> Result<Vec<LineDraft>, AppError> {
        let mut drafts = Vec::with_capacity(requests.len());
        for request in requests {
            let draft = match (request.item_id, request.service_type_id) {
                (Some(item_id), None) => {
                    let item = lookup::branch_item(tx, branch, item_id).await?;
                    LineDraft {
                        kind: LineKind::Item,
                        item_id: Some(item.id),
                        service_type_id: None,
                        unit_price: request.unit_price.unwrap_or(item.unit_price),
                        discount: item.default_discount(),
                        description: item.name,
                        quantity: request.quantity,
                        reserve_stock: true,
                    }
                }
                (None, Some(service_type_id)) => {
                    let service = lookup::branch_service_type(tx, branch, service_type_id).await?;
                    LineDraft {
                        kind: LineKind::Service,
                        item_id: None,
                        service_type_id: Some(service.id),
                        unit_price: request.unit_price.unwrap_or(service.base_price),
                        discount: service.default_discount(),
                        description: service.name,
                        quantity: request.quantity,
                        reserve_stock: false,
                    }
                }
                _ => {
                    return Err(AppError::InvalidInput(
                        "each line must reference exactly one of itemId or serviceTypeId".into(),
                    ))
                }
            };
            drafts.push(draft);
        }
        Ok(drafts)
    }

    fn build_lines(invoice: &Invoice, drafts: Vec<LineDraft>) -> Vec<InvoiceLine> {
        drafts
            .into_iter()
            .enumerate()
            .map(|(position, draft)| InvoiceLine::from_draft(invoice, position as i32, draft))
            .collect()
    }

    fn movement_context(actor: &ActorContext, invoice: &Invoice) -> MovementContext {
        MovementContext {
            company_id: invoice.company_id,
            actor_id: actor.actor_id,
            reference_id: invoice.id,
            purpose: StockPurpose::Sale,
        }
    }

    async fn notify_low_stock(&self, records: &[StockRecord], lines: &[InvoiceLine]) {
        let names: HashMap<Uuid, &str> = lines
            .iter()
            .filter_map(|l| l.item_id.map(|id| (id, l.description.as_str())))
            .collect();
        for record in records.iter().filter(|r| r.is_low()) {
            notify_best_effort(
                self.notifier.as_ref(),
                Notification::LowStock {
                    item_id: record.item_id,
                    name: names.get(&record.item_id).copied().unwrap_or_default().to_string(),
                    quantity: record.quantity,
                    min_level: record.min_stock_level.unwrap_or_default(),
                },
            )
            .await;
        }
    }
}
