// src/services/alert_service.rs

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::{
    common::{error::AppError, i18n::I18nStore},
    db::InventoryStore,
    models::inventory::{AlertSeverity, Product, StockAlert},
};

/// Low-stock scanner behind the alert badge. Read-only.
#[derive(Clone)]
pub struct AlertService {
    store: Arc<dyn InventoryStore>,
}

/// `critical` when empty, `error` at or below half the minimum, `warning` otherwise.
pub fn classify(quantity: Decimal, min_stock: Decimal) -> Option<AlertSeverity> {
    if quantity > min_stock {
        return None;
    }
    if quantity <= Decimal::ZERO {
        return Some(AlertSeverity::Critical);
    }
    if quantity.checked_mul(Decimal::TWO).is_some_and(|doubled| doubled <= min_stock) {
        return Some(AlertSeverity::Error);
    }
    Some(AlertSeverity::Warning)
}

impl AlertService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Most severe first, then by product name.
    pub async fn check_stock_levels(&self, lang: &str, i18n: &I18nStore) -> Result<Vec<StockAlert>, AppError> {
        let products = self.store.low_stock_products().await?;

        let mut alerts: Vec<StockAlert> = products
            .into_iter()
            .filter_map(|product| {
                let severity = classify(product.quantity, product.min_stock)?;
                Some(Self::alert(product, severity, lang, i18n))
            })
            .collect();

        alerts.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.name.cmp(&b.name)));

        if alerts.iter().any(|a| a.severity == AlertSeverity::Critical) {
            tracing::warn!("🚨 {} product(s) below minimum stock", alerts.len());
        }
        Ok(alerts)
    }

    fn alert(product: Product, severity: AlertSeverity, lang: &str, i18n: &I18nStore) -> StockAlert {
        let message = match severity {
            AlertSeverity::Critical => {
                i18n.translate(lang, "alert_out_of_stock", &[("name", product.name.clone())])
            }
            _ => i18n.translate(
                lang,
                "alert_below_minimum",
                &[
                    ("name", product.name.clone()),
                    ("quantity", product.quantity.normalize().to_string()),
                    ("min", product.min_stock.normalize().to_string()),
                ],
            ),
        };

        StockAlert {
            product_id: product.id,
            sku: product.sku,
            name: product.name,
            quantity: product.quantity,
            min_stock: product.min_stock,
            severity,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{InMemoryInventoryRepository, InventoryStore};
    use crate::models::inventory::NewProduct;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn severity_bands() {
        let min = Decimal::from(20);
        assert_eq!(classify(Decimal::from(21), min), None);
        assert_eq!(classify(Decimal::from(20), min), Some(AlertSeverity::Warning));
        assert_eq!(classify(Decimal::from(11), min), Some(AlertSeverity::Warning));
        assert_eq!(classify(Decimal::from(10), min), Some(AlertSeverity::Error));
        assert_eq!(classify(Decimal::from(1), min), Some(AlertSeverity::Error));
        assert_eq!(classify(Decimal::ZERO, min), Some(AlertSeverity::Critical));
    }

    #[test]
    fn extreme_balances_do_not_overflow() {
        assert_eq!(classify(Decimal::MAX, Decimal::MAX), Some(AlertSeverity::Warning));
        assert_eq!(classify(Decimal::MAX, Decimal::from(10)), None);
    }

    async fn add(store: &InMemoryInventoryRepository, name: &str, quantity: i64, min: i64) {
        store
            .create_product(
                NewProduct {
                    sku: name.to_uppercase(),
                    name: name.into(),
                    initial_quantity: Decimal::from(quantity),
                    min_stock: Decimal::from(min),
                    max_stock: None,
                    user_id: Uuid::new_v4(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn alerts_are_sorted_by_severity_and_translated() {
        let store = Arc::new(InMemoryInventoryRepository::new());
        add(&store, "samp", 15, 20).await;
        add(&store, "chakalaka", 0, 5).await;
        add(&store, "biltong", 3, 10).await;
        add(&store, "rusks", 100, 10).await;

        let service = AlertService::new(store);
        let i18n = I18nStore::load().unwrap();
        let alerts = service.check_stock_levels("en", &i18n).await.unwrap();

        let names: Vec<&str> = alerts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["chakalaka", "biltong", "samp"]);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].message, "chakalaka is out of stock.");
        assert_eq!(alerts[2].message, "samp is below its minimum stock level (15 of 20).");

        let af = service.check_stock_levels("af", &i18n).await.unwrap();
        assert_eq!(af[0].message, "chakalaka is uit voorraad.");
    }
}
