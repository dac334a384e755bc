// tests/tenancy.rs

mod common;

use chrono::NaiveDate;
use common::Fixture;
use pos_backend::common::error::AppError;

#[tokio::test]
async fn other_company_sees_not_found_other_branch_sees_unauthorized() {
    let fx = Fixture::new().await;
    let detail = fx
        .invoices
        .create_invoice(&fx.actors.pos_user, fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]))
        .await
        .unwrap();
    let id = detail.invoice.id;

    let err = fx.invoices.get_invoice(&fx.actors.foreign_admin, id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = fx.invoices.get_invoice(&fx.actors.other_branch_pos, id).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    // Mesma empresa em nível empresa, SUPER_ADMIN em qualquer lugar
    assert!(fx.invoices.get_invoice(&fx.actors.company_admin, id).await.is_ok());
    assert!(fx.invoices.get_invoice(&fx.actors.super_admin, id).await.is_ok());
    assert!(fx.invoices.get_invoice(&fx.actors.employee, id).await.is_ok());
}

#[tokio::test]
async fn permissions_are_checked_before_anything_else() {
    let fx = Fixture::new().await;

    let err = fx
        .invoices
        .create_invoice(&fx.actors.employee, fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]))
        .await
        .unwrap_err();
    match err {
        AppError::Unauthorized(message) => assert_eq!(message, "missing permission invoice:create"),
        other => panic!("unexpected error: {other:?}"),
    }

    let err = fx
        .invoices
        .list_invoices_by_customer(&fx.actors.customer, fx.customer_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}

#[tokio::test]
async fn invoices_go_to_an_authorized_branch_only() {
    let fx = Fixture::new().await;

    // Ator de nível empresa precisa dizer a filial
    let err = fx
        .invoices
        .create_invoice(&fx.actors.company_admin, fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let mut request = fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]);
    request.branch_id = Some(fx.branch_a1.id);
    let detail = fx.invoices.create_invoice(&fx.actors.company_admin, request).await.unwrap();
    assert_eq!(detail.invoice.branch_id, fx.branch_a1.id);

    // Balcão não escolhe outra filial
    let mut request = fx.invoice_request(vec![fx.item_line(&fx.coolant, 1)]);
    request.branch_id = Some(fx.branch_a2.id);
    let err = fx.invoices.create_invoice(&fx.actors.pos_user, request).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    // Filial de outra empresa nem existe para o ator
    let mut request = fx.invoice_request(vec![fx.item_line(&fx.foreign_item, 1)]);
    request.branch_id = Some(fx.branch_b1.id);
    let err = fx.invoices.create_invoice(&fx.actors.company_admin, request).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Item de outra filial não entra na fatura
    let err = fx
        .invoices
        .create_invoice(&fx.actors.pos_user, fx.invoice_request(vec![fx.item_line(&fx.coolant, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(fx.store.stock_of(fx.coolant.id).await, Some(5));
}

#[tokio::test]
async fn listings_are_narrowed_to_the_actor_tenant() {
    let fx = Fixture::new().await;

    fx.invoices
        .create_invoice(&fx.actors.pos_user, fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]))
        .await
        .unwrap();
    fx.invoices
        .create_invoice(&fx.actors.other_branch_pos, fx.invoice_request(vec![fx.item_line(&fx.coolant, 1)]))
        .await
        .unwrap();

    let all = fx.invoices.list_invoices_by_company(&fx.actors.company_admin, fx.company_a).await.unwrap();
    assert_eq!(all.len(), 2);

    let mine = fx.invoices.list_invoices_by_company(&fx.actors.pos_user, fx.company_a).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].branch_id, fx.branch_a1.id);

    let by_customer = fx
        .invoices
        .list_invoices_by_customer(&fx.actors.other_branch_pos, fx.customer_id)
        .await
        .unwrap();
    assert_eq!(by_customer.len(), 1);
    assert_eq!(by_customer[0].branch_id, fx.branch_a2.id);

    let by_branch = fx.invoices.list_invoices_by_branch(&fx.actors.company_admin, fx.branch_a2.id).await.unwrap();
    assert_eq!(by_branch.len(), 1);

    let err = fx.invoices.list_invoices_by_branch(&fx.actors.pos_user, fx.branch_a2.id).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    let err = fx.invoices.list_invoices_by_company(&fx.actors.foreign_admin, fx.company_a).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));

    assert!(fx
        .invoices
        .list_invoices_by_customer(&fx.actors.foreign_admin, fx.customer_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn date_range_listing_is_inclusive_and_validated() {
    let fx = Fixture::new().await;
    for day in [10, 15, 20] {
        let mut request = fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]);
        request.invoice_date = NaiveDate::from_ymd_opt(2024, 1, day);
        fx.invoices.create_invoice(&fx.actors.pos_user, request).await.unwrap();
    }

    let from = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
    let to = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let found = fx.invoices.list_invoices_by_date_range(&fx.actors.pos_user, from, to).await.unwrap();
    assert_eq!(found.len(), 2);

    let err = fx.invoices.list_invoices_by_date_range(&fx.actors.pos_user, to, from).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}

#[tokio::test]
async fn lookup_by_number_is_scoped_to_a_company() {
    let fx = Fixture::new().await;
    let detail = fx
        .invoices
        .create_invoice(&fx.actors.pos_user, fx.invoice_request(vec![fx.service_line(&fx.wash, 1)]))
        .await
        .unwrap();
    let number = detail.invoice.invoice_number.clone();

    let found = fx.invoices.get_invoice_by_number(&fx.actors.pos_user, None, &number).await.unwrap();
    assert_eq!(found.invoice.id, detail.invoice.id);

    // Mesmo número em outra empresa: não existe para ela
    let err = fx
        .invoices
        .get_invoice_by_number(&fx.actors.foreign_admin, None, &number)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = fx
        .invoices
        .get_invoice_by_number(&fx.actors.super_admin, None, &number)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let found = fx
        .invoices
        .get_invoice_by_number(&fx.actors.super_admin, Some(fx.company_a), &number)
        .await
        .unwrap();
    assert_eq!(found.invoice.id, detail.invoice.id);
}
