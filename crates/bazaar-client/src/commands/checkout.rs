use serde::Serialize;
use tracing::info;

use bazaar_shared::validation::CheckoutForm;
use bazaar_shared::{CartItem, ProductId};

use crate::error::{ClientError, Result};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub title: String,
    pub unit_price: f64,
    pub quantity: u32,
    pub line_total: f64,
}

impl From<&CartItem> for OrderLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.id().clone(),
            title: item.product.title.clone(),
            unit_price: item.product.price,
            quantity: item.quantity,
            line_total: item.line_total(),
        }
    }
}

/// What was ordered and where it goes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub lines: Vec<OrderLine>,
    pub item_count: u64,
    pub total: f64,
    pub ship_to_name: String,
    pub ship_to_address: String,
    pub ship_to_city: String,
    pub ship_to_postal_code: String,
    pub contact_email: String,
    pub contact_phone: String,
}

/// Place the order for the current cart and empty it.
pub async fn place_order(state: &AppState, form: &CheckoutForm) -> Result<OrderSummary> {
    let mut cart = state.cart.lock().await;
    if cart.is_empty() {
        return Err(ClientError::EmptyCart);
    }
    form.validate()?;

    let summary = OrderSummary {
        lines: cart.items().iter().map(OrderLine::from).collect(),
        item_count: cart.item_count(),
        total: cart.total(),
        ship_to_name: form.name.trim().to_string(),
        ship_to_address: form.address.trim().to_string(),
        ship_to_city: form.city.trim().to_string(),
        ship_to_postal_code: form.postal_code.trim().to_string(),
        contact_email: form.email.trim().to_string(),
        contact_phone: form.phone.trim().to_string(),
    };

    cart.clear();
    info!(items = summary.item_count, total = summary.total, "order placed");
    Ok(summary)
}
