//! Cart mutations triggered by menu buttons.

use tracing::{debug, info};

use crate::errors::ShopError;
use crate::model::Product;
use crate::navigation::{CartAction, CartActionKind};
use crate::store::ShopStore;

/// Effect of a cart action, used to pick the callback answer
#[derive(Debug, Clone, PartialEq)]
pub enum CartOutcome {
    /// One unit added; the screen stays as it is
    Added(Product),
    /// Quantity changed or line removed; the screen is re-rendered
    Updated,
}

/// Apply `action` to the cart of `user_id`
pub async fn apply_cart_action(
    store: &dyn ShopStore,
    user_id: i64,
    action: CartAction,
) -> Result<CartOutcome, ShopError> {
    let product_id = action.product_id;

    if action.kind == CartActionKind::Add {
        let product = store
            .get_product(product_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {product_id}")))?;
        store.add_to_cart(user_id, product_id).await?;
        info!(user_id, product_id, "Product added to cart");
        return Ok(CartOutcome::Added(product));
    }

    let current = store
        .get_cart(user_id)
        .await?
        .into_iter()
        .find(|line| line.product_id == product_id)
        .map(|line| line.quantity);

    let Some(quantity) = current else {
        debug!(user_id, product_id, action = ?action.kind, "Cart line already gone");
        return Ok(CartOutcome::Updated);
    };

    let quantity = match action.kind {
        CartActionKind::Increment => quantity + 1,
        CartActionKind::Decrement => quantity - 1,
        CartActionKind::Remove | CartActionKind::Add => 0,
    };
    store.set_cart_quantity(user_id, product_id, quantity).await?;
    debug!(user_id, product_id, quantity, "Cart line updated");

    Ok(CartOutcome::Updated)
}
