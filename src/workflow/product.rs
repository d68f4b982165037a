//! Product Upsert: name → description → price → category → image.
//!
//! Without an edit target the workflow creates a product; with one it
//! updates that product and accepts `.` to keep any of its current values.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{
    Choice, ExitReason, FieldKind, FieldValue, Reply, ReplyKeyboard, Session, StepDef, Workflow,
};
use crate::errors::ShopError;
use crate::model::{Product, ProductFields};
use crate::navigation::product_caption;
use crate::store::ShopStore;
use crate::texts::t;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductStep {
    Name,
    Description,
    Price,
    Category,
    Image,
}

static STEPS: [StepDef<ProductStep>; 5] = [
    StepDef {
        step: ProductStep::Name,
        field: "name",
        kind: FieldKind::Text,
        prompt: "product-name-prompt",
        retry: "product-name-retry",
        back_prompt: "product-name-back",
    },
    StepDef {
        step: ProductStep::Description,
        field: "description",
        kind: FieldKind::Text,
        prompt: "product-description-prompt",
        retry: "product-description-retry",
        back_prompt: "product-description-back",
    },
    StepDef {
        step: ProductStep::Price,
        field: "price",
        kind: FieldKind::Decimal,
        prompt: "product-price-prompt",
        retry: "product-price-retry",
        back_prompt: "product-price-back",
    },
    StepDef {
        step: ProductStep::Category,
        field: "category",
        kind: FieldKind::Choice,
        prompt: "product-category-prompt",
        retry: "product-category-retry",
        back_prompt: "product-category-back",
    },
    StepDef {
        step: ProductStep::Image,
        field: "image",
        kind: FieldKind::Media,
        prompt: "product-image-prompt",
        retry: "product-image-retry",
        back_prompt: "product-image-back",
    },
];

pub type ProductSession = Session<ProductStep, Product>;

/// Admin workflow creating or editing a catalog product
#[derive(Debug, Clone, Copy, Default)]
pub struct ProductUpsert;

fn missing(step: ProductStep) -> ShopError {
    ShopError::Validation(format!("product field {step:?} was not collected"))
}

impl ProductUpsert {
    /// Assemble the collected values into a product field set
    pub fn fields(session: &ProductSession) -> Result<ProductFields, ShopError> {
        let text = |step: ProductStep| {
            session
                .field(step)
                .and_then(FieldValue::as_text)
                .map(str::to_string)
                .ok_or_else(|| missing(step))
        };

        Ok(ProductFields {
            name: text(ProductStep::Name)?,
            description: text(ProductStep::Description)?,
            price: session
                .field(ProductStep::Price)
                .and_then(FieldValue::as_decimal)
                .ok_or_else(|| missing(ProductStep::Price))?,
            category_id: session
                .field(ProductStep::Category)
                .and_then(FieldValue::as_choice)
                .ok_or_else(|| missing(ProductStep::Category))?,
            image: session
                .field(ProductStep::Image)
                .and_then(FieldValue::as_media)
                .cloned()
                .ok_or_else(|| missing(ProductStep::Image))?,
        })
    }
}

#[async_trait]
impl Workflow for ProductUpsert {
    type Step = ProductStep;
    type Target = Product;

    fn name(&self) -> &'static str {
        "product_upsert"
    }

    fn steps(&self) -> &'static [StepDef<ProductStep>] {
        &STEPS
    }

    fn keep_existing(&self, target: &Product, step: ProductStep) -> Option<FieldValue> {
        Some(match step {
            ProductStep::Name => FieldValue::Text(target.name.clone()),
            ProductStep::Description => FieldValue::Text(target.description.clone()),
            ProductStep::Price => FieldValue::Decimal(target.price),
            ProductStep::Category => FieldValue::Choice(target.category_id),
            ProductStep::Image => FieldValue::Media(target.image.clone()),
        })
    }

    async fn choices(&self, store: &dyn ShopStore, step: ProductStep) -> Result<Vec<Choice>, ShopError> {
        if step != ProductStep::Category {
            return Ok(Vec::new());
        }
        Ok(store
            .get_categories()
            .await?
            .into_iter()
            .map(|c| Choice { id: c.id, label: c.name })
            .collect())
    }

    async fn commit(&self, store: &dyn ShopStore, session: &ProductSession) -> Result<Vec<Reply>, ShopError> {
        let fields = Self::fields(session)?;

        let (product, done) = match &session.edit_target {
            Some(target) => (store.update_product(target.id, &fields).await?, "product-updated"),
            None => (store.add_product(&fields).await?, "product-added"),
        };

        Ok(vec![
            Reply::Photo {
                media: product.image.clone(),
                caption: product_caption(&product),
            },
            Reply::text_with(t(done), ReplyKeyboard::Admin),
        ])
    }

    fn exit_replies(&self, reason: ExitReason) -> Vec<Reply> {
        let key = match reason {
            ExitReason::Cancelled => "actions-cancelled",
            ExitReason::CommitFailed => "commit-failed",
            ExitReason::TooManyInvalidInputs => "too-many-invalid",
        };
        vec![Reply::text_with(t(key), ReplyKeyboard::Admin)]
    }
}
