use std::str::FromStr;

use anyhow::Result;
use rust_decimal::Decimal;
use storefront::cart::{apply_cart_action, CartOutcome};
use storefront::errors::ShopError;
use storefront::memory_store::MemoryStore;
use storefront::model::{Category, Product, ProductFields};
use storefront::navigation::{CartActionKind, Control, ControlLayout, Descriptor, MenuName, Resolver};
use storefront::store::ShopStore;
use storefront::texts::{t, t_args};

const VIEWER: i64 = 42;

fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_page("main", "Добро пожаловать!", Some("main-banner"));
    store.insert_page("about", "О нас", Some("about-banner"));
    store.insert_page("payment", "Варианты оплаты", None);
    store.insert_page("shipping", "Варианты доставки", None);
    store.insert_page("catalog", "Категории:", Some("catalog-banner"));
    store.insert_page("cart", "В корзине ничего нет!", Some("cart-banner"));
    store
}

fn stock(store: &MemoryStore, category: &Category, names: &[&str]) -> Vec<Product> {
    names
        .iter()
        .map(|name| {
            store.insert_product(ProductFields {
                name: name.to_string(),
                description: format!("{name} описание"),
                price: Decimal::from_str("2.50").unwrap(),
                category_id: category.id,
                image: format!("{name}-photo"),
            })
        })
        .collect()
}

fn labelled<'a>(layout: &'a ControlLayout, label: &str) -> Option<&'a Control> {
    layout.controls().find(|c| c.label == label)
}

#[tokio::test]
async fn test_root_screen_has_banner_and_sections() -> Result<()> {
    let store = seeded_store();
    let resolver = Resolver::new(&store, 1, 1);

    let (payload, layout) = resolver.resolve(&Descriptor::root(), None).await?;
    assert_eq!(payload.media.as_deref(), Some("main-banner"));
    assert_eq!(payload.caption, "Добро пожаловать!");
    assert!(layout.len() >= 3);

    let catalog = labelled(&layout, &t("btn-catalog")).unwrap();
    assert_eq!(catalog.callback.descriptor, Descriptor::catalog());
    let cart = labelled(&layout, &t("btn-cart")).unwrap();
    assert_eq!(cart.callback.descriptor, Descriptor::cart(1));
    Ok(())
}

#[tokio::test]
async fn test_home_page_without_banner_image() -> Result<()> {
    let store = seeded_store();
    let resolver = Resolver::new(&store, 1, 1);

    let (payload, _) = resolver.resolve(&Descriptor::home(MenuName::Payment), None).await?;
    assert_eq!(payload.media, None);
    assert_eq!(payload.caption, "Варианты оплаты");
    Ok(())
}

#[tokio::test]
async fn test_catalog_lists_categories() -> Result<()> {
    let store = seeded_store();
    let food = store.insert_category("Еда");
    let drinks = store.insert_category("Напитки");
    let resolver = Resolver::new(&store, 1, 1);

    let (payload, layout) = resolver.resolve(&Descriptor::catalog(), None).await?;
    assert_eq!(payload.media.as_deref(), Some("catalog-banner"));

    let food_button = labelled(&layout, "Еда").unwrap();
    assert_eq!(food_button.callback.descriptor, Descriptor::products(food.id, 1));
    let drinks_button = labelled(&layout, "Напитки").unwrap();
    assert_eq!(drinks_button.callback.descriptor, Descriptor::products(drinks.id, 1));
    let back = labelled(&layout, &t("btn-back")).unwrap();
    assert_eq!(back.callback.descriptor, Descriptor::root());
    Ok(())
}

#[tokio::test]
async fn test_product_pagination_one_per_page() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Еда");
    let products = stock(&store, &category, &["Пицца", "Паста", "Суп"]);
    let resolver = Resolver::new(&store, 1, 1);

    let (payload, layout) = resolver
        .resolve(&Descriptor::products(category.id, 1), Some(VIEWER))
        .await?;
    assert_eq!(payload.media.as_deref(), Some("Пицца-photo"));
    assert!(payload.caption.contains("Пицца"));

    let next = labelled(&layout, &t("btn-next")).unwrap();
    assert!(next.enabled);
    assert_eq!(next.callback.descriptor, Descriptor::products(category.id, 2));
    let previous = labelled(&layout, &t("btn-previous")).unwrap();
    assert!(!previous.enabled);

    let buy = labelled(&layout, &t("btn-buy")).unwrap();
    let action = buy.callback.action.unwrap();
    assert_eq!(action.kind, CartActionKind::Add);
    assert_eq!(action.product_id, products[0].id);
    Ok(())
}

#[tokio::test]
async fn test_product_page_out_of_range_is_clamped() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Еда");
    stock(&store, &category, &["Пицца", "Паста", "Суп"]);
    let resolver = Resolver::new(&store, 1, 1);

    let (clamped, clamped_layout) = resolver
        .resolve(&Descriptor::products(category.id, 4), Some(VIEWER))
        .await?;
    let (last, last_layout) = resolver
        .resolve(&Descriptor::products(category.id, 3), Some(VIEWER))
        .await?;
    assert_eq!(clamped, last);
    assert_eq!(clamped_layout, last_layout);

    let next = labelled(&clamped_layout, &t("btn-next")).unwrap();
    assert!(!next.enabled);
    let previous = labelled(&clamped_layout, &t("btn-previous")).unwrap();
    assert!(previous.enabled);
    assert_eq!(previous.callback.descriptor, Descriptor::products(category.id, 2));
    Ok(())
}

#[tokio::test]
async fn test_product_listing_without_viewer_has_no_buy_controls() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Еда");
    stock(&store, &category, &["Пицца"]);
    let resolver = Resolver::new(&store, 1, 1);

    let (_, layout) = resolver
        .resolve(&Descriptor::products(category.id, 1), None)
        .await?;
    assert!(layout.find(|callback| callback.action.is_some()).is_none());
    // Single page: no pagination row
    assert!(labelled(&layout, &t("btn-next")).is_none());
    Ok(())
}

#[tokio::test]
async fn test_multi_product_page_links_detail_views() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Еда");
    let products = stock(&store, &category, &["Пицца", "Паста", "Суп"]);
    let resolver = Resolver::new(&store, 2, 1);

    let (_, layout) = resolver
        .resolve(&Descriptor::products(category.id, 2), Some(VIEWER))
        .await?;
    let detail = layout
        .find(|callback| callback.descriptor.product_id() == Some(products[2].id))
        .unwrap();
    assert_eq!(detail.callback.descriptor.page(), 2);

    let (payload, layout) = resolver.resolve(&detail.callback.descriptor, Some(VIEWER)).await?;
    assert_eq!(payload.media.as_deref(), Some("Суп-photo"));
    let back = labelled(&layout, &t("btn-back")).unwrap();
    assert_eq!(back.callback.descriptor, Descriptor::products(category.id, 2));
    Ok(())
}

#[tokio::test]
async fn test_multi_product_page_lists_escaped_lines() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Еда");
    stock(&store, &category, &["Fish & Chips", "Паста", "Суп"]);
    let resolver = Resolver::new(&store, 2, 1);

    let (payload, _) = resolver
        .resolve(&Descriptor::products(category.id, 1), Some(VIEWER))
        .await?;
    let first = t_args("products-list-line", &[("name", "Fish &amp; Chips"), ("price", "2.50")]);
    let second = t_args("products-list-line", &[("name", "Паста"), ("price", "2.50")]);
    assert!(payload.caption.starts_with(&format!("{first}\n{second}")));
    assert!(!payload.caption.contains("Суп"));
    Ok(())
}

#[tokio::test]
async fn test_empty_category() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Пусто");
    let resolver = Resolver::new(&store, 1, 1);

    let (payload, layout) = resolver
        .resolve(&Descriptor::products(category.id, 1), Some(VIEWER))
        .await?;
    assert_eq!(payload.caption, t("category-empty"));
    assert!(labelled(&layout, &t("btn-next")).is_none());
    assert!(labelled(&layout, &t("btn-back")).is_some());
    Ok(())
}

#[tokio::test]
async fn test_empty_cart_payload() -> Result<()> {
    let store = seeded_store();
    let resolver = Resolver::new(&store, 1, 1);

    let (payload, layout) = resolver.resolve(&Descriptor::cart(1), Some(VIEWER)).await?;
    assert_eq!(payload.media.as_deref(), Some("cart-banner"));
    assert!(payload.caption.contains("В корзине ничего нет!"));
    assert_eq!(layout.len(), 1);
    assert!(labelled(&layout, &t("btn-next")).is_none());
    assert!(labelled(&layout, &t("btn-order")).is_none());
    Ok(())
}

#[tokio::test]
async fn test_cart_actions_update_rendered_cart() -> Result<()> {
    let store = seeded_store();
    let category = store.insert_category("Еда");
    let products = stock(&store, &category, &["Пицца", "Паста"]);
    let resolver = Resolver::new(&store, 1, 1);

    let outcome = apply_cart_action(
        &store,
        VIEWER,
        storefront::navigation::CartAction {
            kind: CartActionKind::Add,
            product_id: products[0].id,
        },
    )
    .await?;
    assert!(matches!(outcome, CartOutcome::Added(ref p) if p.id == products[0].id));
    store.add_to_cart(VIEWER, products[0].id).await?;
    store.add_to_cart(VIEWER, products[1].id).await?;

    let (payload, layout) = resolver.resolve(&Descriptor::cart(1), Some(VIEWER)).await?;
    assert!(payload.caption.contains("Пицца"));
    assert!(payload.caption.contains("7.50"));
    let next = labelled(&layout, &t("btn-next")).unwrap();
    assert!(next.enabled);
    let order = labelled(&layout, &t("btn-order")).unwrap();
    assert_eq!(order.callback.descriptor, Descriptor::order());

    let decrement = labelled(&layout, &t("btn-decrement")).unwrap();
    let action = decrement.callback.action.unwrap();
    assert_eq!(action.product_id, products[0].id);
    apply_cart_action(&store, VIEWER, action).await?;
    apply_cart_action(&store, VIEWER, action).await?;

    // Pizza line reached zero, pasta is all that is left
    let (payload, layout) = resolver.resolve(&Descriptor::cart(2), Some(VIEWER)).await?;
    assert!(payload.caption.contains("Паста"));
    assert!(labelled(&layout, &t("btn-next")).is_none());
    Ok(())
}

#[tokio::test]
async fn test_add_missing_product_is_not_found() -> Result<()> {
    let store = seeded_store();
    let result = apply_cart_action(
        &store,
        VIEWER,
        storefront::navigation::CartAction {
            kind: CartActionKind::Add,
            product_id: 999,
        },
    )
    .await;
    assert!(matches!(result, Err(ShopError::NotFound(_))));
    assert!(store.get_cart(VIEWER).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cart_requires_viewer() {
    let store = seeded_store();
    let resolver = Resolver::new(&store, 1, 1);
    let result = resolver.resolve(&Descriptor::cart(1), None).await;
    assert!(matches!(result, Err(ShopError::Configuration(_))));
}

#[tokio::test]
async fn test_order_descriptor_is_not_rendered() {
    let store = seeded_store();
    let resolver = Resolver::new(&store, 1, 1);
    let result = resolver.resolve(&Descriptor::order(), Some(VIEWER)).await;
    assert!(matches!(result, Err(ShopError::Configuration(_))));
}

#[tokio::test]
async fn test_mismatched_level_is_rejected() -> Result<()> {
    let store = seeded_store();
    let resolver = Resolver::new(&store, 1, 1);
    let descriptor = Descriptor::new(1, MenuName::Cart, None, 1, None)?;
    let result = resolver.resolve(&descriptor, Some(VIEWER)).await;
    assert!(matches!(result, Err(ShopError::Configuration(_))));
    Ok(())
}
