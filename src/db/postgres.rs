// src/db/postgres.rs

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{Store, UnitOfWork},
    models::{
        auth::{User, UserUniqueField},
        catalog::{Item, ServiceType},
        inventory::{StockMovement, StockRecord, StockUpdate},
        invoice::{Invoice, InvoiceFilter, InvoiceLine},
        service_record::{ServiceRecord, ServiceRecordLine},
        tenancy::Branch,
    },
};

/// Converte violação de UNIQUE em `Conflict`; o resto segue como erro de banco.
fn map_unique(e: sqlx::Error, message: impl FnOnce() -> String) -> AppError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return AppError::Conflict(message());
        }
    }
    e.into()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgUnitOfWork;

    async fn begin(&self) -> Result<Self::Tx, AppError> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork { tx })
    }
}

// Rollback automático no Drop da Transaction.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

const INVOICE_LINE_COLUMNS: &str = "id, invoice_id, company_id, branch_id, position, kind, item_id, \
     service_type_id, description, quantity, unit_price, line_total, discount_type, \
     discount_value, discount_amount, final_price, stock_reserved";

impl PgUnitOfWork {
    async fn insert_invoice_lines(&mut self, lines: &[InvoiceLine]) -> Result<(), AppError> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO invoice_lines ({INVOICE_LINE_COLUMNS}) "));
        builder.push_values(lines, |mut row, line| {
            row.push_bind(line.id)
                .push_bind(line.invoice_id)
                .push_bind(line.company_id)
                .push_bind(line.branch_id)
                .push_bind(line.position)
                .push_bind(line.kind)
                .push_bind(line.item_id)
                .push_bind(line.service_type_id)
                .push_bind(&line.description)
                .push_bind(line.quantity)
                .push_bind(line.unit_price)
                .push_bind(line.line_total)
                .push_bind(line.discount_type)
                .push_bind(line.discount_value)
                .push_bind(line.discount_amount)
                .push_bind(line.final_price)
                .push_bind(line.stock_reserved);
        });
        builder.build().execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn insert_service_record_lines(&mut self, lines: &[ServiceRecordLine]) -> Result<(), AppError> {
        if lines.is_empty() {
            return Ok(());
        }
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO service_record_lines (id, service_record_id, position, service_type_id, \
             item_id, description, quantity, unit_price, total_price, notes) ",
        );
        builder.push_values(lines, |mut row, line| {
            row.push_bind(line.id)
                .push_bind(line.service_record_id)
                .push_bind(line.position)
                .push_bind(line.service_type_id)
                .push_bind(line.item_id)
                .push_bind(&line.description)
                .push_bind(line.quantity)
                .push_bind(line.unit_price)
                .push_bind(line.total_price)
                .push_bind(&line.notes);
        });
        builder.build().execute(&mut *self.tx).await?;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    // ---
    // Filiais
    // ---

    async fn find_branch(&mut self, id: Uuid) -> Result<Option<Branch>, AppError> {
        let branch = sqlx::query_as::<_, Branch>(
            "SELECT id, company_id, name, is_active, created_at FROM branches WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(branch)
    }

    // ---
    // Catálogo
    // ---

    async fn find_item(&mut self, id: Uuid) -> Result<Option<Item>, AppError> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(item)
    }

    async fn item_name_exists(&mut self, branch_id: Uuid, name: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM items WHERE branch_id = $1 AND lower(name) = lower($2))",
        )
        .bind(branch_id)
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_item(&mut self, item: &Item) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO items (
                id, company_id, branch_id, name, description, unit_price, unit,
                stock_quantity, min_stock_level, default_discount_type,
                default_discount_value, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(item.id)
        .bind(item.company_id)
        .bind(item.branch_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.unit_price)
        .bind(&item.unit)
        .bind(item.stock_quantity)
        .bind(item.min_stock_level)
        .bind(item.default_discount_type)
        .bind(item.default_discount_value)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, || format!("item '{}' already exists in this branch", item.name)))?;
        Ok(())
    }

    async fn update_item_discount(&mut self, item: &Item) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE items
            SET default_discount_type = $2, default_discount_value = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(item.id)
        .bind(item.default_discount_type)
        .bind(item.default_discount_value)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_service_type(&mut self, id: Uuid) -> Result<Option<ServiceType>, AppError> {
        let service_type = sqlx::query_as::<_, ServiceType>("SELECT * FROM service_types WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(service_type)
    }

    async fn service_type_name_exists(&mut self, branch_id: Uuid, name: &str) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM service_types WHERE branch_id = $1 AND lower(name) = lower($2))",
        )
        .bind(branch_id)
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_service_type(&mut self, service_type: &ServiceType) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO service_types (
                id, company_id, branch_id, name, description, base_price,
                estimated_duration_minutes, default_discount_type,
                default_discount_value, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(service_type.id)
        .bind(service_type.company_id)
        .bind(service_type.branch_id)
        .bind(&service_type.name)
        .bind(&service_type.description)
        .bind(service_type.base_price)
        .bind(service_type.estimated_duration_minutes)
        .bind(service_type.default_discount_type)
        .bind(service_type.default_discount_value)
        .bind(service_type.is_active)
        .bind(service_type.created_at)
        .bind(service_type.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            map_unique(e, || {
                format!("service type '{}' already exists in this branch", service_type.name)
            })
        })?;
        Ok(())
    }

    async fn update_service_type_discount(&mut self, service_type: &ServiceType) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE service_types
            SET default_discount_type = $2, default_discount_value = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(service_type.id)
        .bind(service_type.default_discount_type)
        .bind(service_type.default_discount_value)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    // ---
    // Estoque
    // ---

    async fn adjust_stock(&mut self, item_id: Uuid, delta: i32) -> Result<StockUpdate, AppError> {
        // Compare-and-decrement: a própria linha do UPDATE serializa reservas concorrentes.
        let applied = sqlx::query_as::<_, StockRecord>(
            r#"
            UPDATE items
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity + $2 >= 0
            RETURNING id AS item_id, stock_quantity AS quantity, min_stock_level
            "#,
        )
        .bind(item_id)
        .bind(delta)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(record) = applied {
            return Ok(StockUpdate::Applied(record));
        }

        let available: Option<i32> =
            sqlx::query_scalar("SELECT stock_quantity FROM items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        match available {
            Some(available) => Ok(StockUpdate::Insufficient { available }),
            None => Err(AppError::not_found("item")),
        }
    }

    async fn insert_stock_movement(&mut self, movement: &StockMovement) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, company_id, item_id, quantity_changed, reason, reference_id, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(movement.id)
        .bind(movement.company_id)
        .bind(movement.item_id)
        .bind(movement.quantity_changed)
        .bind(movement.reason)
        .bind(movement.reference_id)
        .bind(movement.created_by)
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    // ---
    // Faturas
    // ---

    async fn next_invoice_sequence(&mut self, company_id: Uuid, date: NaiveDate) -> Result<i32, AppError> {
        // Upsert atômico: a linha fica travada até o fim da transação.
        let value: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO invoice_sequences (company_id, sequence_date, last_value)
            VALUES ($1, $2, 1)
            ON CONFLICT (company_id, sequence_date)
            DO UPDATE SET last_value = invoice_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(company_id)
        .bind(date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(value)
    }

    async fn insert_invoice(&mut self, invoice: &Invoice, lines: &[InvoiceLine]) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, company_id, branch_id, invoice_number, invoice_date, customer_id,
                vehicle_id, service_record_id, invoice_type, status, subtotal,
                overall_discount_type, overall_discount_value, overall_discount_amount,
                tax_percentage, tax_amount, total_amount, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.company_id)
        .bind(invoice.branch_id)
        .bind(&invoice.invoice_number)
        .bind(invoice.invoice_date)
        .bind(invoice.customer_id)
        .bind(invoice.vehicle_id)
        .bind(invoice.service_record_id)
        .bind(invoice.invoice_type)
        .bind(invoice.status)
        .bind(invoice.subtotal)
        .bind(invoice.overall_discount_type)
        .bind(invoice.overall_discount_value)
        .bind(invoice.overall_discount_amount)
        .bind(invoice.tax_percentage)
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(invoice.created_by)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| {
            map_unique(e, || format!("invoice number {} already exists", invoice.invoice_number))
        })?;

        self.insert_invoice_lines(lines).await
    }

    async fn find_invoice(&mut self, id: Uuid) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(invoice)
    }

    async fn find_invoice_by_number(&mut self, company_id: Uuid, number: &str) -> Result<Option<Invoice>, AppError> {
        let invoice = sqlx::query_as::<_, Invoice>(
            "SELECT * FROM invoices WHERE company_id = $1 AND invoice_number = $2",
        )
        .bind(company_id)
        .bind(number)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(invoice)
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, AppError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM invoices WHERE TRUE");
        if let Some(company_id) = filter.company_id {
            builder.push(" AND company_id = ").push_bind(company_id);
        }
        if let Some(branch_id) = filter.branch_id {
            builder.push(" AND branch_id = ").push_bind(branch_id);
        }
        if let Some(customer_id) = filter.customer_id {
            builder.push(" AND customer_id = ").push_bind(customer_id);
        }
        if let Some(from) = filter.date_from {
            builder.push(" AND invoice_date >= ").push_bind(from);
        }
        if let Some(to) = filter.date_to {
            builder.push(" AND invoice_date <= ").push_bind(to);
        }
        builder.push(" ORDER BY invoice_date DESC, invoice_number DESC");

        let invoices = builder
            .build_query_as::<Invoice>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(invoices)
    }

    async fn list_invoice_lines(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceLine>, AppError> {
        let lines = sqlx::query_as::<_, InvoiceLine>(&format!(
            "SELECT {INVOICE_LINE_COLUMNS} FROM invoice_lines WHERE invoice_id = $1 ORDER BY position"
        ))
        .bind(invoice_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(lines)
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE invoices
            SET invoice_type = $2, status = $3, subtotal = $4, overall_discount_type = $5,
                overall_discount_value = $6, overall_discount_amount = $7, tax_percentage = $8,
                tax_amount = $9, total_amount = $10, service_record_id = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(invoice.id)
        .bind(invoice.invoice_type)
        .bind(invoice.status)
        .bind(invoice.subtotal)
        .bind(invoice.overall_discount_type)
        .bind(invoice.overall_discount_value)
        .bind(invoice.overall_discount_amount)
        .bind(invoice.tax_percentage)
        .bind(invoice.tax_amount)
        .bind(invoice.total_amount)
        .bind(invoice.service_record_id)
        .bind(invoice.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_invoice_lines(&mut self, lines: &[InvoiceLine]) -> Result<(), AppError> {
        for line in lines {
            sqlx::query(
                r#"
                UPDATE invoice_lines
                SET line_total = $2, discount_type = $3, discount_value = $4,
                    discount_amount = $5, final_price = $6, stock_reserved = $7
                WHERE id = $1
                "#,
            )
            .bind(line.id)
            .bind(line.line_total)
            .bind(line.discount_type)
            .bind(line.discount_value)
            .bind(line.discount_amount)
            .bind(line.final_price)
            .bind(line.stock_reserved)
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn replace_invoice_lines(&mut self, invoice_id: Uuid, lines: &[InvoiceLine]) -> Result<(), AppError> {
        sqlx::query("DELETE FROM invoice_lines WHERE invoice_id = $1")
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await?;
        self.insert_invoice_lines(lines).await
    }

    async fn delete_invoice(&mut self, id: Uuid) -> Result<(), AppError> {
        // As linhas saem via ON DELETE CASCADE; a ordem de serviço é desvinculada via SET NULL.
        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("invoice"));
        }
        Ok(())
    }

    // ---
    // Ordens de serviço
    // ---

    async fn insert_service_record(&mut self, record: &ServiceRecord, lines: &[ServiceRecordLine]) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO service_records (
                id, company_id, branch_id, vehicle_id, customer_id, service_date,
                current_mileage, notes, status, total_amount, invoice_id,
                created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(record.company_id)
        .bind(record.branch_id)
        .bind(record.vehicle_id)
        .bind(record.customer_id)
        .bind(record.service_date)
        .bind(record.current_mileage)
        .bind(&record.notes)
        .bind(record.status)
        .bind(record.total_amount)
        .bind(record.invoice_id)
        .bind(record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;

        self.insert_service_record_lines(lines).await
    }

    async fn find_service_record(&mut self, id: Uuid) -> Result<Option<ServiceRecord>, AppError> {
        let record = sqlx::query_as::<_, ServiceRecord>("SELECT * FROM service_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn list_service_records_by_vehicle(&mut self, vehicle_id: Uuid) -> Result<Vec<ServiceRecord>, AppError> {
        let records = sqlx::query_as::<_, ServiceRecord>(
            "SELECT * FROM service_records WHERE vehicle_id = $1 ORDER BY service_date DESC",
        )
        .bind(vehicle_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(records)
    }

    async fn list_service_record_lines(&mut self, record_id: Uuid) -> Result<Vec<ServiceRecordLine>, AppError> {
        let lines = sqlx::query_as::<_, ServiceRecordLine>(
            "SELECT * FROM service_record_lines WHERE service_record_id = $1 ORDER BY position",
        )
        .bind(record_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(lines)
    }

    async fn update_service_record(&mut self, record: &ServiceRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE service_records
            SET current_mileage = $2, notes = $3, status = $4, total_amount = $5,
                invoice_id = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.current_mileage)
        .bind(&record.notes)
        .bind(record.status)
        .bind(record.total_amount)
        .bind(record.invoice_id)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn replace_service_record_lines(&mut self, record_id: Uuid, lines: &[ServiceRecordLine]) -> Result<(), AppError> {
        sqlx::query("DELETE FROM service_record_lines WHERE service_record_id = $1")
            .bind(record_id)
            .execute(&mut *self.tx)
            .await?;
        self.insert_service_record_lines(lines).await
    }

    async fn delete_service_record(&mut self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM service_records WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::not_found("service record"));
        }
        Ok(())
    }

    // ---
    // Usuários
    // ---

    async fn insert_user(&mut self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, company_id, branch_id, first_name, last_name, username, phone_number,
                email, role, is_active, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(user.company_id)
        .bind(user.branch_id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.phone_number)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_by)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_unique(e, || "user already exists".to_string()))?;
        Ok(())
    }

    async fn find_user(&mut self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn find_user_conflict(
        &mut self,
        username: &str,
        phone_number: &str,
        email: Option<&str>,
    ) -> Result<Option<UserUniqueField>, AppError> {
        let row: Option<(bool, bool, bool)> = sqlx::query_as(
            r#"
            SELECT
                bool_or(username = $1),
                bool_or(phone_number = $2),
                COALESCE(bool_or(email = $3), FALSE)
            FROM users
            WHERE username = $1 OR phone_number = $2 OR ($3::TEXT IS NOT NULL AND email = $3)
            HAVING COUNT(*) > 0
            "#,
        )
        .bind(username)
        .bind(phone_number)
        .bind(email)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(match row {
            Some((true, _, _)) => Some(UserUniqueField::Username),
            Some((_, true, _)) => Some(UserUniqueField::PhoneNumber),
            Some((_, _, true)) => Some(UserUniqueField::Email),
            _ => None,
        })
    }

    async fn update_user(&mut self, user: &User) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET first_name = $2, last_name = $3, email = $4, is_active = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }
}
