//! User-facing text catalog backed by a Fluent resource.
//!
//! Every string the bot sends lives in `locales/ru/main.ftl`; handlers look
//! them up by key with [`t`] or [`t_args`].

use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::sync::LazyLock;
use tracing::error;
use unic_langid::LanguageIdentifier;

const DEFAULT_LOCALE: &str = "ru";
const MAIN_RESOURCE: &str = include_str!("../locales/ru/main.ftl");

static CATALOG: LazyLock<TextCatalog> = LazyLock::new(TextCatalog::load);

/// Text catalog for the bot
pub struct TextCatalog {
    bundle: FluentBundle<FluentResource>,
}

impl TextCatalog {
    fn load() -> Self {
        let locale: LanguageIdentifier = DEFAULT_LOCALE.parse().unwrap_or_default();
        let mut bundle = FluentBundle::new_concurrent(vec![locale]);
        // Telegram renders the bidi isolation marks literally
        bundle.set_use_isolating(false);

        let resource = match FluentResource::try_new(MAIN_RESOURCE.to_string()) {
            Ok(resource) => resource,
            Err((resource, errors)) => {
                error!(errors = ?errors, "Text resource contains syntax errors");
                resource
            }
        };
        if let Err(errors) = bundle.add_resource(resource) {
            error!(errors = ?errors, "Failed to register text resource");
        }

        Self { bundle }
    }

    /// Whether the catalog defines `key`
    pub fn contains(&self, key: &str) -> bool {
        self.bundle.has_message(key)
    }

    /// Format a message, substituting string arguments
    pub fn get_message(&self, key: &str, args: &[(&str, &str)]) -> String {
        let msg = match self.bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {key}"),
        };

        let fluent_args = (!args.is_empty()).then(|| {
            let mut fluent_args = FluentArgs::new();
            for (name, value) in args {
                fluent_args.set(*name, FluentValue::from(*value));
            }
            fluent_args
        });

        let mut errors = vec![];
        let value = self
            .bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors);
        if !errors.is_empty() {
            error!(key, errors = ?errors, "Failed to format text");
        }
        value.into_owned()
    }
}

/// Global text catalog
pub fn catalog() -> &'static TextCatalog {
    &CATALOG
}

/// Look up a text by key
pub fn t(key: &str) -> String {
    catalog().get_message(key, &[])
}

/// Look up a text by key with arguments
pub fn t_args(key: &str, args: &[(&str, &str)]) -> String {
    catalog().get_message(key, args)
}
