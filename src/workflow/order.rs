//! Order Placement: phone → address → review → confirmation.
//!
//! The review step freezes the cart into an [`OrderSnapshot`]; the total
//! shown to the user is the total persisted, even if prices change before
//! the confirmation arrives.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use teloxide::utils::html::escape;
use tracing::warn;

use crate::conversation::{
    Derivation, ExitReason, FieldKind, FieldValue, Reply, ReplyKeyboard, Session, StepDef, Workflow,
};
use crate::errors::ShopError;
use crate::model::{NewOrder, OrderLine, OrderSnapshot};
use crate::navigation::Descriptor;
use crate::store::ShopStore;
use crate::texts::{t, t_args};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStep {
    Phone,
    Address,
    Review,
    Confirmation,
}

static STEPS: [StepDef<OrderStep>; 4] = [
    StepDef {
        step: OrderStep::Phone,
        field: "phone",
        kind: FieldKind::Text,
        prompt: "order-phone-prompt",
        retry: "order-phone-retry",
        back_prompt: "order-phone-back",
    },
    StepDef {
        step: OrderStep::Address,
        field: "address",
        kind: FieldKind::Text,
        prompt: "order-address-prompt",
        retry: "order-address-retry",
        back_prompt: "order-address-back",
    },
    StepDef {
        step: OrderStep::Review,
        field: "products",
        kind: FieldKind::Derived,
        prompt: "order-summary",
        retry: "order-summary",
        back_prompt: "order-summary",
    },
    StepDef {
        step: OrderStep::Confirmation,
        field: "confirmation",
        kind: FieldKind::Confirmation,
        prompt: "order-confirm-prompt",
        retry: "order-confirm-retry",
        back_prompt: "order-confirm-back",
    },
];

pub type OrderSession = Session<OrderStep, ()>;

/// Customer checkout workflow
#[derive(Debug, Clone, Copy)]
pub struct OrderPlacement {
    /// Delay between the order summary and the next message
    pacing: Duration,
}

impl OrderPlacement {
    pub fn new(pacing: Duration) -> Self {
        Self { pacing }
    }

    fn text_field(session: &OrderSession, step: OrderStep) -> Result<String, ShopError> {
        session
            .field(step)
            .and_then(FieldValue::as_text)
            .map(str::to_string)
            .ok_or_else(|| ShopError::Validation(format!("order field {step:?} was not collected")))
    }

    /// Freeze the user's cart at current prices
    pub async fn snapshot(store: &dyn ShopStore, user_id: i64) -> Result<OrderSnapshot, ShopError> {
        let mut lines = Vec::new();
        for line in store.get_cart(user_id).await? {
            match store.get_product(line.product_id).await? {
                Some(product) => lines.push(OrderLine {
                    product_id: product.id,
                    name: product.name,
                    unit_price: product.price,
                    quantity: line.quantity,
                }),
                None => warn!(user_id, product_id = line.product_id, "Skipping cart line of a missing product"),
            }
        }
        Ok(OrderSnapshot::from_lines(lines))
    }

    fn exit(&self, key: &str) -> Vec<Reply> {
        vec![
            Reply::text_with(t(key), ReplyKeyboard::Remove),
            Reply::Menu(Descriptor::root()),
        ]
    }
}

impl Default for OrderPlacement {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl Workflow for OrderPlacement {
    type Step = OrderStep;
    type Target = ();

    fn name(&self) -> &'static str {
        "order_placement"
    }

    fn steps(&self) -> &'static [StepDef<OrderStep>] {
        &STEPS
    }

    async fn derive(&self, store: &dyn ShopStore, session: &OrderSession) -> Result<Derivation, ShopError> {
        let snapshot = Self::snapshot(store, session.user_id).await?;
        if snapshot.is_empty() {
            return Ok(Derivation::Abort {
                replies: self.exit("order-empty-cart"),
            });
        }

        let phone = Self::text_field(session, OrderStep::Phone)?;
        let address = Self::text_field(session, OrderStep::Address)?;

        let mut summary = vec![t_args(
            "order-summary",
            &[("phone", &escape(&phone)), ("address", &escape(&address))],
        )];
        summary.extend(snapshot.lines.iter().map(|line| {
            t_args(
                "order-line",
                &[
                    ("name", &escape(&line.name)),
                    ("price", &line.unit_price.to_string()),
                    ("quantity", &line.quantity.to_string()),
                ],
            )
        }));

        let replies = vec![
            Reply::text(summary.join("\n------------------------------\n")),
            Reply::text(t_args(
                "order-total",
                &[("total", &snapshot.total.round_dp(2).to_string())],
            )),
            Reply::Pause(self.pacing),
        ];

        Ok(Derivation::Value {
            value: FieldValue::Snapshot(snapshot),
            replies,
        })
    }

    async fn commit(&self, store: &dyn ShopStore, session: &OrderSession) -> Result<Vec<Reply>, ShopError> {
        let snapshot = session
            .field(OrderStep::Review)
            .and_then(FieldValue::as_snapshot)
            .cloned()
            .ok_or_else(|| ShopError::Validation("order snapshot was not collected".to_string()))?;

        let order = NewOrder {
            user_id: session.user_id,
            phone: Self::text_field(session, OrderStep::Phone)?,
            address: Self::text_field(session, OrderStep::Address)?,
            total: snapshot.total,
            lines: snapshot.lines,
        };
        store.add_order(&order).await?;

        if let Err(e) = store.clear_cart(session.user_id).await {
            warn!(user_id = session.user_id, error = %e, "Order saved but the cart was not cleared");
        }

        Ok(vec![
            Reply::text_with(t("order-placed"), ReplyKeyboard::Remove),
            Reply::Pause(self.pacing),
            Reply::text(t("order-thanks")),
            Reply::Menu(Descriptor::root()),
        ])
    }

    fn exit_replies(&self, reason: ExitReason) -> Vec<Reply> {
        match reason {
            ExitReason::Cancelled => self.exit("order-cancelled"),
            ExitReason::CommitFailed => self.exit("commit-failed"),
            ExitReason::TooManyInvalidInputs => self.exit("too-many-invalid"),
        }
    }
}
