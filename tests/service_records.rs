// tests/service_records.rs

mod common;

use common::{d, Fixture};
use pos_backend::{
    common::error::AppError,
    models::{
        catalog::Item,
        inventory::StockMovementReason,
        invoice::{InvoiceStatus, InvoiceType},
        service_record::{
            CreateServiceRecordRequest, ServiceRecordLineRequest, ServiceStatus,
            UpdateServiceRecordRequest,
        },
    },
};
use uuid::Uuid;

fn item_line(item: &Item, quantity: i32) -> ServiceRecordLineRequest {
    ServiceRecordLineRequest {
        service_type_id: None,
        item_id: Some(item.id),
        quantity,
        unit_price: None,
        notes: None,
    }
}

fn record_request(fx: &Fixture, vehicle_id: Uuid, oil_quantity: i32) -> CreateServiceRecordRequest {
    CreateServiceRecordRequest {
        branch_id: None,
        vehicle_id,
        customer_id: fx.customer_id,
        service_date: None,
        current_mileage: Some(42_000),
        notes: Some("troca de óleo".into()),
        lines: vec![
            ServiceRecordLineRequest {
                service_type_id: Some(fx.wash.id),
                item_id: None,
                quantity: 1,
                unit_price: None,
                notes: None,
            },
            item_line(&fx.oil, oil_quantity),
        ],
    }
}

#[tokio::test]
async fn service_record_consumes_stock_and_totals_lines() {
    let fx = Fixture::new().await;
    let vehicle = Uuid::new_v4();

    let detail = fx
        .service_records
        .create_service_record(&fx.actors.employee, record_request(&fx, vehicle, 4))
        .await
        .unwrap();

    assert_eq!(detail.record.status, ServiceStatus::Pending);
    assert_eq!(detail.record.branch_id, fx.branch_a1.id);
    assert_eq!(detail.lines.len(), 2);
    assert_eq!(detail.lines[0].description, "Lavagem");
    assert_eq!(detail.lines[1].total_price, d("50.00"));
    assert_eq!(detail.record.total_amount, d("75.00"));

    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(6));
    let movements = fx.store.stock_movements(fx.oil.id).await;
    assert_eq!(movements[0].reason, StockMovementReason::ServiceUsage);
    assert_eq!(movements[0].reference_id, Some(detail.record.id));
}

#[tokio::test]
async fn replacing_record_lines_moves_only_the_difference() {
    let fx = Fixture::new().await;
    let detail = fx
        .service_records
        .create_service_record(&fx.actors.pos_user, record_request(&fx, Uuid::new_v4(), 4))
        .await
        .unwrap();
    let id = detail.record.id;

    let updated = fx
        .service_records
        .update_service_record(
            &fx.actors.pos_user,
            id,
            UpdateServiceRecordRequest {
                status: Some(ServiceStatus::InProgress),
                lines: Some(vec![item_line(&fx.oil, 10)]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.record.status, ServiceStatus::InProgress);
    assert_eq!(updated.record.total_amount, d("125.00"));
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(0));

    let err = fx
        .service_records
        .update_service_record(
            &fx.actors.pos_user,
            id,
            UpdateServiceRecordRequest { lines: Some(vec![]), ..Default::default() },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    // Mudança de status sozinha não mexe no estoque
    fx.service_records
        .update_service_record(
            &fx.actors.pos_user,
            id,
            UpdateServiceRecordRequest { status: Some(ServiceStatus::Cancelled), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(0));

    fx.service_records.delete_service_record(&fx.actors.pos_user, id).await.unwrap();
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(10));
    assert!(matches!(
        fx.service_records.get_service_record(&fx.actors.pos_user, id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn service_invoice_links_the_record_without_touching_stock() {
    let fx = Fixture::new().await;
    let record = fx
        .service_records
        .create_service_record(&fx.actors.pos_user, record_request(&fx, Uuid::new_v4(), 2))
        .await
        .unwrap()
        .record;
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(8));

    let invoice = fx
        .invoices
        .create_service_invoice(&fx.actors.pos_user, record.id)
        .await
        .unwrap();
    assert_eq!(invoice.invoice.service_record_id, Some(record.id));
    assert_eq!(invoice.invoice.invoice_type, InvoiceType::Mixed);
    assert!(invoice.lines.iter().all(|l| !l.stock_reserved));
    // 25.00 + (25.00 - 10%) = 47.50, mais 10% de imposto
    assert_eq!(invoice.invoice.subtotal, d("47.50"));
    assert_eq!(invoice.invoice.total_amount, d("52.25"));
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(8));

    let linked = fx.service_records.get_service_record(&fx.actors.pos_user, record.id).await.unwrap();
    assert_eq!(linked.record.invoice_id, Some(invoice.invoice.id));

    let err = fx
        .invoices
        .create_service_invoice(&fx.actors.pos_user, record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let err = fx
        .service_records
        .delete_service_record(&fx.actors.pos_user, record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    // Cancelar a fatura de serviço não devolve o que a ordem consumiu
    fx.invoices
        .update_invoice_status(&fx.actors.pos_user, invoice.invoice.id, InvoiceStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(8));
}

#[tokio::test]
async fn vehicle_history_only_shows_visible_records() {
    let fx = Fixture::new().await;
    let vehicle = Uuid::new_v4();

    fx.service_records
        .create_service_record(&fx.actors.pos_user, record_request(&fx, vehicle, 1))
        .await
        .unwrap();
    let mut other = record_request(&fx, vehicle, 1);
    other.lines = vec![item_line(&fx.coolant, 1)];
    fx.service_records
        .create_service_record(&fx.actors.other_branch_pos, other)
        .await
        .unwrap();

    let admin_view = fx
        .service_records
        .list_service_records_by_vehicle(&fx.actors.company_admin, vehicle)
        .await
        .unwrap();
    assert_eq!(admin_view.len(), 2);

    let counter_view = fx
        .service_records
        .list_service_records_by_vehicle(&fx.actors.pos_user, vehicle)
        .await
        .unwrap();
    assert_eq!(counter_view.len(), 1);
    assert_eq!(counter_view[0].branch_id, fx.branch_a1.id);

    let foreign_view = fx
        .service_records
        .list_service_records_by_vehicle(&fx.actors.foreign_admin, vehicle)
        .await
        .unwrap();
    assert!(foreign_view.is_empty());
}

#[tokio::test]
async fn record_prices_must_be_in_cents() {
    let fx = Fixture::new().await;
    let mut request = record_request(&fx, Uuid::new_v4(), 1);
    request.lines[0].unit_price = Some(d("80.005"));
    let err = fx
        .service_records
        .create_service_record(&fx.actors.pos_user, request)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
    assert_eq!(fx.store.stock_of(fx.oil.id).await, Some(10));

    let mut request = record_request(&fx, Uuid::new_v4(), 1);
    request.lines[0].unit_price = Some(d("80.00"));
    let detail = fx
        .service_records
        .create_service_record(&fx.actors.pos_user, request)
        .await
        .unwrap();
    assert_eq!(detail.record.total_amount, d("92.50"));
}
