//! Manual stock movements and low-stock reporting.

use std::sync::Arc;

use mockable::Clock;
use pagination::{Page, PageRequest};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{CatalogueRepository, StockRepository};
use crate::domain::{
    Error, LowStockItem, MovementDraft, MovementKind, NotificationDraft, NotificationKind,
    NotificationService, StockMovement, StockRuleError, UserId, crossed_low_threshold,
    quantity_after,
};

const MAX_ATTEMPTS: usize = 3;
/// Upper bound on rows returned by [`StockService::low_stock`].
pub const MAX_LOW_STOCK_LIMIT: u32 = 100;

pub(crate) fn stock_rule_error(variant_id: Uuid, err: StockRuleError) -> Error {
    match err {
        StockRuleError::NonPositiveQuantity => Error::invalid_field(
            "quantity",
            "non_positive_quantity",
            "quantity must be positive",
        ),
        StockRuleError::Insufficient {
            available,
            requested,
        } => Error::conflict(format!(
            "insufficient stock: {available} available, {requested} requested"
        ))
        .with_details(json!({
            "code": "insufficient_stock",
            "variantId": variant_id,
            "available": available,
            "requested": requested,
        })),
        StockRuleError::UnknownKind(kind) => {
            Error::invalid_field("kind", "unknown_kind", format!("unknown movement kind {kind}"))
        }
        StockRuleError::Overflow => {
            Error::invalid_field("quantity", "overflow", "stock quantity overflow")
        }
    }
}

pub(crate) fn low_stock_draft(item: &LowStockItem) -> NotificationDraft {
    NotificationDraft::new(
        NotificationKind::LowStock,
        "Low stock",
        format!(
            "{} ({}) is down to {} units",
            item.product_name, item.sku, item.stock_quantity
        ),
        None,
    )
}

/// Stock ledger service.
#[derive(Clone)]
pub struct StockService {
    catalogue: Arc<dyn CatalogueRepository>,
    stock: Arc<dyn StockRepository>,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
}

impl StockService {
    /// Create the service.
    pub fn new(
        catalogue: Arc<dyn CatalogueRepository>,
        stock: Arc<dyn StockRepository>,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalogue,
            stock,
            notifications,
            clock,
        }
    }

    /// Apply a manual movement to a variant.
    ///
    /// The write only lands when the stored quantity still matches the one
    /// the movement was computed from; a lost race is retried against the
    /// fresh quantity.
    pub async fn record_movement(
        &self,
        variant_id: Uuid,
        kind: MovementKind,
        quantity: i32,
        reason: Option<String>,
        actor: UserId,
    ) -> Result<StockMovement, Error> {
        let reason = reason.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty());
        for attempt in 1..=MAX_ATTEMPTS {
            let variant = self
                .catalogue
                .find_variant(variant_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("variant {variant_id} not found")))?;
            let before = variant.stock_quantity;
            let after = quantity_after(kind, before, quantity)
                .map_err(|err| stock_rule_error(variant_id, err))?;
            let movement = StockMovement::record(
                MovementDraft {
                    variant_id,
                    kind,
                    reason: reason.clone(),
                    order_id: None,
                    performed_by: Some(actor),
                },
                before,
                after,
                self.clock.utc(),
            );
            if !self.stock.apply_movement(&movement).await? {
                warn!(%variant_id, attempt, "stock changed concurrently; retrying");
                continue;
            }
            info!(
                %variant_id,
                kind = kind.as_str(),
                before,
                after,
                actor = %actor,
                "stock movement recorded"
            );
            if crossed_low_threshold(before, after, variant.low_stock_threshold) {
                let item = LowStockItem {
                    variant_id,
                    product_id: variant.product_id,
                    product_name: self.product_name(variant.product_id).await,
                    sku: variant.sku,
                    stock_quantity: after,
                    low_stock_threshold: variant.low_stock_threshold,
                };
                self.notifications.notify_staff(low_stock_draft(&item)).await;
            }
            return Ok(movement);
        }
        Err(Error::conflict("stock changed concurrently, try again").with_reason("stock_conflict"))
    }

    async fn product_name(&self, product_id: Uuid) -> String {
        match self.catalogue.find_product(product_id).await {
            Ok(Some(detail)) => detail.product.name,
            _ => "Product".to_owned(),
        }
    }

    /// Ledger rows, newest first.
    pub async fn list_movements(
        &self,
        variant_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<Page<StockMovement>, Error> {
        let (items, total) = self.stock.list_movements(variant_id, page).await?;
        Ok(Page::new(items, page, total))
    }

    /// Variants at or below their threshold, lowest first.
    pub async fn low_stock(&self, limit: u32) -> Result<Vec<LowStockItem>, Error> {
        let limit = limit.clamp(1, MAX_LOW_STOCK_LIMIT);
        Ok(self.stock.low_stock(limit).await?)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ports::{
        MockCatalogueRepository, MockLiveEventPublisher, MockNotificationRepository,
        MockStockRepository, MockUserRepository,
    };
    use crate::domain::{ErrorCode, Variant};
    use mockable::DefaultClock;
    use rstest::rstest;

    fn variant(id: Uuid, stock: i32) -> Variant {
        Variant {
            id,
            product_id: Uuid::new_v4(),
            sku: "KS-RED-M".into(),
            size: None,
            colour: None,
            price_override: None,
            stock_quantity: stock,
            low_stock_threshold: 3,
        }
    }

    fn silent_notifications() -> NotificationService {
        NotificationService::new(
            Arc::new(MockNotificationRepository::new()),
            Arc::new(MockUserRepository::new()),
            Arc::new(MockLiveEventPublisher::new()),
            Arc::new(DefaultClock),
        )
    }

    fn service(
        catalogue: MockCatalogueRepository,
        stock: MockStockRepository,
        notifications: NotificationService,
    ) -> StockService {
        StockService::new(
            Arc::new(catalogue),
            Arc::new(stock),
            notifications,
            Arc::new(DefaultClock),
        )
    }

    #[rstest]
    #[tokio::test]
    async fn lost_races_are_retried_with_fresh_quantities() {
        let id = Uuid::new_v4();
        let mut catalogue = MockCatalogueRepository::new();
        let mut reads = vec![variant(id, 10), variant(id, 8)].into_iter();
        catalogue
            .expect_find_variant()
            .times(2)
            .returning(move |_| Ok(reads.next()));
        let mut stock = MockStockRepository::new();
        let mut answers = vec![false, true].into_iter();
        stock
            .expect_apply_movement()
            .times(2)
            .returning(move |_| Ok(answers.next().unwrap_or(false)));

        let movement = service(catalogue, stock, silent_notifications())
            .record_movement(id, MovementKind::Addition, 5, None, UserId::random())
            .await
            .expect("recorded");
        assert_eq!(movement.quantity_before, 8);
        assert_eq!(movement.quantity_after, 13);
        assert_eq!(movement.quantity_change, 5);
    }

    #[rstest]
    #[tokio::test]
    async fn overselling_is_a_conflict() {
        let id = Uuid::new_v4();
        let mut catalogue = MockCatalogueRepository::new();
        catalogue
            .expect_find_variant()
            .return_once(move |_| Ok(Some(variant(id, 2))));
        let mut stock = MockStockRepository::new();
        stock.expect_apply_movement().times(0);

        let error = service(catalogue, stock, silent_notifications())
            .record_movement(id, MovementKind::Damage, 5, None, UserId::random())
            .await
            .expect_err("insufficient");
        assert_eq!(error.code(), ErrorCode::Conflict);
        assert_eq!(
            error.details().and_then(|d| d.get("available")),
            Some(&json!(2))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn crossing_the_threshold_notifies_staff() {
        let id = Uuid::new_v4();
        let mut catalogue = MockCatalogueRepository::new();
        catalogue
            .expect_find_variant()
            .return_once(move |_| Ok(Some(variant(id, 5))));
        catalogue.expect_find_product().return_once(|_| Ok(None));
        let mut stock = MockStockRepository::new();
        stock.expect_apply_movement().return_once(|_| Ok(true));
        let mut users = MockUserRepository::new();
        users
            .expect_staff_ids()
            .times(1)
            .return_once(|| Ok(Vec::new()));
        let notifications = NotificationService::new(
            Arc::new(MockNotificationRepository::new()),
            Arc::new(users),
            Arc::new(MockLiveEventPublisher::new()),
            Arc::new(DefaultClock),
        );

        let movement = service(catalogue, stock, notifications)
            .record_movement(
                id,
                MovementKind::Adjustment,
                3,
                Some(" recount ".into()),
                UserId::random(),
            )
            .await
            .expect("recorded");
        assert_eq!(movement.quantity_change, -2);
        assert_eq!(movement.reason.as_deref(), Some("recount"));
    }
}
