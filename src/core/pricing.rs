use crate::config::toml_config::CommerceConfig;
use crate::core::region::RegionRouter;
use crate::domain::catalog::{AddOn, AddOnSelection};
use crate::domain::model::{clamp_recipient_count, LineItem, PriceBreakdown, Selection};
use crate::utils::error::Result;
use rust_decimal::Decimal;

pub const BASE_ITEM_ID: &str = "base";
pub const PHOTO_ITEM_ID: &str = "photos";

fn add_on_label(add_on: AddOn) -> &'static str {
    match add_on {
        AddOn::FourKQuality => "4K quality",
        AddOn::FastDelivery => "Fast delivery",
        AddOn::BonusScene => "Bonus scene",
        AddOn::Combo => "Combo: 4K + fast delivery + bonus scene",
    }
}

/// 價格引擎：純函式，依地區的價格表把選擇換算成價格明細
#[derive(Debug, Clone)]
pub struct PricingEngine<'a> {
    config: &'a CommerceConfig,
}

impl<'a> PricingEngine<'a> {
    pub fn new(config: &'a CommerceConfig) -> Self {
        Self { config }
    }

    /// 套裝與個別項目互斥由 `AddOnSelection` 保證，這裡不再檢查
    pub fn compute_price(
        &self,
        recipient_count: i64,
        add_ons: &AddOnSelection,
        photo_count: u32,
        locale: &str,
    ) -> Result<PriceBreakdown> {
        let recipients = clamp_recipient_count(recipient_count);
        let route = RegionRouter::new(self.config).route(locale)?;
        let table = self.config.price_table(&route.currency)?;

        let base_price = table.base_price(recipients);
        let mut line_items = vec![LineItem {
            id: BASE_ITEM_ID.to_string(),
            label: format!(
                "{} ({} recipient{})",
                self.config.product.label,
                recipients,
                if recipients == 1 { "" } else { "s" }
            ),
            unit_price: base_price,
            original_price: None,
            quantity: None,
        }];

        let (add_on_total, bundle_discount) = if add_ons.has_bundle() {
            line_items.push(LineItem {
                id: AddOn::Combo.id().to_string(),
                label: add_on_label(AddOn::Combo).to_string(),
                unit_price: table.bundle_price,
                original_price: Some(table.individual_total()),
                quantity: None,
            });
            (table.bundle_price, table.bundle_savings)
        } else {
            let mut total = Decimal::ZERO;
            for add_on in AddOn::INDIVIDUALS.iter().filter(|a| add_ons.contains(**a)) {
                let price = table.add_on_price(*add_on);
                total += price;
                line_items.push(LineItem {
                    id: add_on.id().to_string(),
                    label: add_on_label(*add_on).to_string(),
                    unit_price: price,
                    original_price: None,
                    quantity: None,
                });
            }
            (total, Decimal::ZERO)
        };

        let photo_total = table.photo_price * Decimal::from(photo_count);
        if photo_count > 0 {
            line_items.push(LineItem {
                id: PHOTO_ITEM_ID.to_string(),
                label: "Extra photos".to_string(),
                unit_price: table.photo_price,
                original_price: None,
                quantity: Some(photo_count),
            });
        }

        let subtotal = base_price + add_on_total + photo_total;
        let total = (subtotal - bundle_discount).max(Decimal::ZERO);

        tracing::debug!(
            "💰 {} recipients, {} add-on(s), {} photo(s) in {}: subtotal {} - discount {} = {}",
            recipients,
            add_ons.len(),
            photo_count,
            route.currency,
            subtotal,
            bundle_discount,
            total
        );

        Ok(PriceBreakdown {
            line_items,
            base_price,
            add_on_total,
            photo_total,
            bundle_discount,
            subtotal,
            total,
            currency: route.currency,
        })
    }

    pub fn price_selection(&self, selection: &Selection) -> Result<PriceBreakdown> {
        self.compute_price(
            i64::from(selection.recipient_count),
            &selection.add_ons,
            selection.photo_count,
            &selection.region,
        )
    }
}
