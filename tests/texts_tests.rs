//! # Text Catalog Tests
//!
//! Checks that every key the bot looks up is defined and that argument
//! substitution produces Telegram-ready HTML.

use storefront::conversation::Workflow;
use storefront::routing::AdminAction;
use storefront::texts::{catalog, t, t_args};
use storefront::workflow::{OrderPlacement, ProductUpsert};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_defined(key: &str) {
        assert!(catalog().contains(key), "text key {key} is not defined");
    }

    #[test]
    fn test_workflow_step_texts_are_defined() {
        for def in ProductUpsert.steps() {
            assert_defined(def.prompt);
            assert_defined(def.retry);
            assert_defined(def.back_prompt);
        }
        for def in OrderPlacement::default().steps() {
            assert_defined(def.prompt);
            assert_defined(def.retry);
            assert_defined(def.back_prompt);
        }
    }

    #[test]
    fn test_admin_action_labels_are_distinct() {
        let labels: Vec<String> = AdminAction::ALL.iter().map(|a| t(a.label_key())).collect();
        for (i, label) in labels.iter().enumerate() {
            assert!(!label.starts_with("Missing"), "{label}");
            assert!(!labels[i + 1..].contains(label), "duplicate admin label {label}");
            assert_eq!(AdminAction::parse(label), Some(AdminAction::ALL[i]));
        }
    }

    #[test]
    fn test_engine_texts_are_defined() {
        for key in [
            "back-unavailable",
            "keep-existing-hint",
            "too-many-invalid",
            "session-expired",
            "session-busy",
            "commit-failed",
            "generic-error",
            "stale-button",
            "fallback-hint",
        ] {
            assert_defined(key);
        }
    }

    #[test]
    fn test_order_line_formatting() {
        let line = t_args(
            "order-line",
            &[("name", "Пицца"), ("price", "9.99"), ("quantity", "2")],
        );
        assert!(line.contains("Пицца"));
        assert!(line.contains("9.99"));
        assert!(line.contains('2'));

        let total = t_args("order-total", &[("total", "21.48")]);
        assert_eq!(total, "<i>Итого</i>: 21.48$");
    }

    #[test]
    fn test_product_listing_line_formatting() {
        let line = t_args("products-list-line", &[("name", "Пицца"), ("price", "9.99")]);
        assert_eq!(line, "<b>Пицца</b> — 9.99$");
    }

    #[test]
    fn test_missing_argument_keeps_placeholder_name() {
        let text = t("cart-added");
        assert!(!text.is_empty());
        assert!(!text.starts_with("Missing translation"));
    }
}
