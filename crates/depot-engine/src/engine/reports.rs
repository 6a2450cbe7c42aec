//! # Report Services
//!
//! Each report loads its inputs in one read transaction (a WAL snapshot,
//! no write lock) and hands them to the pure functions in
//! `depot_core::report`.

use chrono::{Duration, NaiveDate, Utc};
use tracing::debug;

use super::{today, Engine};
use crate::error::EngineResult;
use depot_core::report::{self, DebtRow, ForecastRow, TurnoverFilter, TurnoverRow};
use depot_core::{CounterpartRole, DateRange, DocumentKind, ValidationError};
use depot_db::{CatalogRepository, DocumentRepository, MovementRepository, StockRepository};

fn check_range(range: DateRange) -> Result<(), ValidationError> {
    if range.is_valid() {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "range".to_string(),
            reason: format!("{} is after {}", range.from, range.to),
        })
    }
}

/// Kinds that move a counterpart's balance.
fn debt_kinds(role: CounterpartRole) -> &'static [DocumentKind] {
    match role {
        CounterpartRole::Supplier => &[
            DocumentKind::Receipt,
            DocumentKind::Payment,
            DocumentKind::SupplierReturn,
            DocumentKind::SupplierInvoice,
        ],
        CounterpartRole::Customer => &[
            DocumentKind::Shipment,
            DocumentKind::Payment,
            DocumentKind::CustomerReturn,
        ],
    }
}

impl Engine {
    /// Debt per counterpart of `role` from documents dated in `range`.
    pub async fn debt_report(
        &self,
        role: CounterpartRole,
        range: DateRange,
    ) -> EngineResult<Vec<DebtRow>> {
        self.debt_report_on(role, range, today()).await
    }

    /// [`Engine::debt_report`] with an explicit "today" for due statuses.
    pub async fn debt_report_on(
        &self,
        role: CounterpartRole,
        range: DateRange,
        today: NaiveDate,
    ) -> EngineResult<Vec<DebtRow>> {
        check_range(range)?;

        let mut tx = self.db.begin().await?;
        let documents = DocumentRepository::new(&mut tx)
            .list_between(debt_kinds(role), range.from, range.to)
            .await?;
        tx.commit().await?;

        debug!(role = ?role, documents = documents.len(), "Building debt report");
        Ok(report::debt_report(
            role,
            &documents,
            range,
            today,
            self.config.reports.due_soon_days,
        ))
    }

    /// Opening, movement and closing per (product, warehouse) for `range`.
    pub async fn turnover_report(
        &self,
        range: DateRange,
        filter: &TurnoverFilter,
    ) -> EngineResult<Vec<TurnoverRow>> {
        check_range(range)?;

        let mut tx = self.db.begin().await?;
        let entries = StockRepository::new(&mut tx)
            .list(filter.product_id.as_deref(), filter.warehouse_id.as_deref())
            .await?;
        let movements = MovementRepository::new(&mut tx)
            .list_since(range.start())
            .await?;
        tx.commit().await?;

        debug!(entries = entries.len(), movements = movements.len(), "Building turnover report");
        Ok(report::turnover_report(range, filter, &entries, &movements))
    }

    /// Procurement needs over `forecast_days` (configured default if `None`).
    pub async fn procurement_forecast(
        &self,
        forecast_days: Option<i64>,
    ) -> EngineResult<Vec<ForecastRow>> {
        let forecast_days = forecast_days.unwrap_or(self.config.reports.default_forecast_days);
        if forecast_days < 0 {
            return Err(ValidationError::OutOfRange {
                field: "forecast_days".to_string(),
                min: 0,
                max: i64::MAX,
            }
            .into());
        }
        let trailing_days = self.config.reports.trailing_days;
        let since = Utc::now() - Duration::days(trailing_days);

        let mut tx = self.db.begin().await?;
        let products = CatalogRepository::new(&mut tx).list_products(true).await?;
        let entries = StockRepository::new(&mut tx).list(None, None).await?;
        let movements = MovementRepository::new(&mut tx).list_since(since).await?;
        tx.commit().await?;

        Ok(report::procurement_forecast(
            &products,
            &entries,
            &movements,
            forecast_days,
            trailing_days,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{actor, draft, engine, stock_up, BRANCH, FLOUR, MAIN, SUGAR};
    use depot_core::report::{DebtStatus, ForecastStatus};
    use depot_core::{DocumentStatus, ErrorCategory, LineDraft, PaymentDirection};

    #[tokio::test]
    async fn test_turnover_closing_matches_ledger() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 1_000).await;
        stock_up(&engine, MAIN, SUGAR, 4, 600).await;

        let order = engine
            .create_document(
                DocumentKind::InternalOrder,
                draft()
                    .warehouse(MAIN)
                    .destination(BRANCH)
                    .line(LineDraft::unpriced(FLOUR, 3)),
                &actor(),
            )
            .await
            .unwrap()
            .value;
        engine
            .transition_status(&order.id, DocumentStatus::Approved, &actor())
            .await
            .unwrap();

        let rows = engine
            .turnover_report(DateRange::day(today()), &TurnoverFilter::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);

        for row in &rows {
            let entry = engine
                .stock_at(&row.product_id, &row.warehouse_id)
                .await
                .unwrap();
            assert_eq!(row.opening_quantity, 0);
            assert_eq!(row.closing_quantity, entry.quantity);
            assert_eq!(row.closing_amount_cents, entry.amount_cents);
        }

        let main_flour = rows
            .iter()
            .find(|r| r.product_id == FLOUR && r.warehouse_id == MAIN)
            .unwrap();
        assert_eq!(main_flour.incoming_quantity, 10);
        assert_eq!(main_flour.outgoing_quantity, 3);
    }

    #[tokio::test]
    async fn test_turnover_for_past_period_is_empty() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 1_000).await;

        let yesterday = today() - Duration::days(1);
        let filter = TurnoverFilter {
            product_id: Some(FLOUR.to_string()),
            warehouse_id: None,
        };
        let rows = engine
            .turnover_report(DateRange::day(yesterday), &filter)
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_supplier_debt_may_go_negative() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 1_000).await;

        engine
            .create_document(
                DocumentKind::Payment,
                draft()
                    .counterpart("supplier-1")
                    .payment(PaymentDirection::Outgoing, 12_500),
                &actor(),
            )
            .await
            .unwrap();

        let rows = engine
            .debt_report(CounterpartRole::Supplier, DateRange::day(today()))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_debt_cents, 10_000);
        assert_eq!(rows[0].paid_cents, 12_500);
        assert_eq!(rows[0].remaining_cents, -2_500);
        assert_eq!(rows[0].status, DebtStatus::Ok);

        assert!(engine
            .debt_report(CounterpartRole::Customer, DateRange::day(today()))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_overdue_customer_debt() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 1_000).await;

        let order = engine
            .create_document(
                DocumentKind::CustomerOrder,
                draft()
                    .counterpart("customer-1")
                    .warehouse(MAIN)
                    .due(today())
                    .line(LineDraft::new(FLOUR, 2, 1_500)),
                &actor(),
            )
            .await
            .unwrap()
            .value;
        engine
            .transition_status(&order.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();
        let shipment = engine
            .create_shipment(&order.id, vec![LineDraft::unpriced(FLOUR, 2)], &actor())
            .await
            .unwrap()
            .value;
        assert_eq!(shipment.total_cents, 3_000);

        let rows = engine
            .debt_report_on(
                CounterpartRole::Customer,
                DateRange::day(today()),
                today() + Duration::days(1),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].remaining_cents, 3_000);
        assert_eq!(rows[0].due_date, Some(today()));
        assert_eq!(rows[0].status, DebtStatus::Overdue);
    }

    #[tokio::test]
    async fn test_forecast_from_shipments() {
        let engine = engine().await;
        stock_up(&engine, MAIN, FLOUR, 10, 1_000).await;

        let order = engine
            .create_document(
                DocumentKind::CustomerOrder,
                draft()
                    .counterpart("customer-1")
                    .warehouse(MAIN)
                    .line(LineDraft::new(FLOUR, 7, 1_500)),
                &actor(),
            )
            .await
            .unwrap()
            .value;
        engine
            .transition_status(&order.id, DocumentStatus::Confirmed, &actor())
            .await
            .unwrap();
        engine
            .transition_status(&order.id, DocumentStatus::Shipped, &actor())
            .await
            .unwrap();

        let rows = engine.procurement_forecast(Some(14)).await.unwrap();
        let flour = rows.iter().find(|r| r.product_id == FLOUR).unwrap();
        assert_eq!(flour.quantity, 3);
        assert_eq!(flour.shipped, 7);
        assert_eq!(flour.forecast_demand, 14);
        assert_eq!(flour.need_to_order, 11);
        assert_eq!(flour.status, ForecastStatus::Critical);

        let sugar = rows.iter().find(|r| r.product_id == SUGAR).unwrap();
        assert_eq!(sugar.status, ForecastStatus::Ok);
    }

    #[tokio::test]
    async fn test_report_inputs_validated() {
        let engine = engine().await;
        let backwards = DateRange::new(today(), today() - Duration::days(3));
        let err = engine
            .turnover_report(backwards, &TurnoverFilter::default())
            .await
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ValidationFailed);

        let err = engine.procurement_forecast(Some(-1)).await.unwrap_err();
        assert!(err.to_string().contains("forecast_days"));
    }
}
