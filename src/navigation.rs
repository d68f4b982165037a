//! # Navigation Resolver
//!
//! Every inline menu screen is described by a compact [`Descriptor`] that
//! travels inside callback data. [`Resolver::resolve`] turns a descriptor
//! back into the banner/product media, the caption and the button grid,
//! reading the catalog and cart through the [`ShopStore`] without mutating
//! anything.
//!
//! ## Levels
//!
//! - `0`: home pages (`main`, `about`, `payment`, `shipping`)
//! - `1`: category list (`catalog`)
//! - `2`: paginated products of one category (`product`)
//! - `3`: paginated cart (`cart`)
//!
//! `order` is a sentinel intercepted by the dispatch layer and never rendered.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use teloxide::utils::html::escape;
use tracing::warn;

use crate::errors::ShopError;
use crate::model::{CartLine, MediaRef, Product};
use crate::store::ShopStore;
use crate::texts::{t, t_args};

const MENU_PREFIX: &str = "m";
const BUTTONS_PER_ROW: usize = 2;

/// Menu screen names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuName {
    Main,
    Catalog,
    Cart,
    Product,
    Order,
    About,
    Payment,
    Shipping,
}

impl MenuName {
    pub const ALL: [MenuName; 8] = [
        MenuName::Main,
        MenuName::Catalog,
        MenuName::Cart,
        MenuName::Product,
        MenuName::Order,
        MenuName::About,
        MenuName::Payment,
        MenuName::Shipping,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MenuName::Main => "main",
            MenuName::Catalog => "catalog",
            MenuName::Cart => "cart",
            MenuName::Product => "product",
            MenuName::Order => "order",
            MenuName::About => "about",
            MenuName::Payment => "payment",
            MenuName::Shipping => "shipping",
        }
    }
}

impl fmt::Display for MenuName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MenuName {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MenuName::ALL
            .into_iter()
            .find(|menu| menu.as_str() == s)
            .ok_or_else(|| ShopError::Configuration(format!("unknown menu name: {s}")))
    }
}

/// "Where am I" descriptor of a menu screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Descriptor {
    level: u8,
    menu_name: MenuName,
    category: Option<i32>,
    page: u32,
    product_id: Option<i32>,
}

impl Descriptor {
    /// Build a descriptor, enforcing `page >= 1` and that only `product`
    /// screens carry a product id
    pub fn new(
        level: u8,
        menu_name: MenuName,
        category: Option<i32>,
        page: u32,
        product_id: Option<i32>,
    ) -> Result<Self, ShopError> {
        if page == 0 {
            return Err(ShopError::Configuration("page numbers start at 1".to_string()));
        }
        if product_id.is_some() && menu_name != MenuName::Product {
            return Err(ShopError::Configuration(format!(
                "product id is not allowed on the {menu_name} menu"
            )));
        }
        Ok(Self {
            level,
            menu_name,
            category,
            page,
            product_id,
        })
    }

    pub fn root() -> Self {
        Self::home(MenuName::Main)
    }

    /// Level-0 page (`main`, `about`, `payment`, `shipping`)
    pub fn home(menu_name: MenuName) -> Self {
        Self {
            level: 0,
            menu_name,
            category: None,
            page: 1,
            product_id: None,
        }
    }

    pub fn catalog() -> Self {
        Self {
            level: 1,
            menu_name: MenuName::Catalog,
            category: None,
            page: 1,
            product_id: None,
        }
    }

    pub fn products(category: i32, page: u32) -> Self {
        Self {
            level: 2,
            menu_name: MenuName::Product,
            category: Some(category),
            page: page.max(1),
            product_id: None,
        }
    }

    /// Detail view of one product inside its category listing
    pub fn product(category: i32, page: u32, product_id: i32) -> Self {
        Self {
            product_id: Some(product_id),
            ..Self::products(category, page)
        }
    }

    pub fn cart(page: u32) -> Self {
        Self {
            level: 3,
            menu_name: MenuName::Cart,
            category: None,
            page: page.max(1),
            product_id: None,
        }
    }

    /// Sentinel that hands off into order placement
    pub fn order() -> Self {
        Self {
            level: 3,
            menu_name: MenuName::Order,
            category: None,
            page: 1,
            product_id: None,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn menu_name(&self) -> MenuName {
        self.menu_name
    }

    pub fn category(&self) -> Option<i32> {
        self.category
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn product_id(&self) -> Option<i32> {
        self.product_id
    }
}

/// Cart mutation carried alongside a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartActionKind {
    Add,
    Increment,
    Decrement,
    Remove,
}

impl CartActionKind {
    fn code(self) -> &'static str {
        match self {
            CartActionKind::Add => "add",
            CartActionKind::Increment => "inc",
            CartActionKind::Decrement => "dec",
            CartActionKind::Remove => "del",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "add" => Some(CartActionKind::Add),
            "inc" => Some(CartActionKind::Increment),
            "dec" => Some(CartActionKind::Decrement),
            "del" => Some(CartActionKind::Remove),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CartAction {
    pub kind: CartActionKind,
    pub product_id: i32,
}

/// Callback payload of a menu button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MenuCallback {
    pub descriptor: Descriptor,
    pub action: Option<CartAction>,
}

impl MenuCallback {
    pub fn show(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            action: None,
        }
    }

    pub fn with_action(descriptor: Descriptor, kind: CartActionKind, product_id: i32) -> Self {
        Self {
            descriptor,
            action: Some(CartAction { kind, product_id }),
        }
    }

    /// Serialize as `m:<level>:<menu>:<category>:<page>:<product>[:<action>:<target>]`
    pub fn encode(&self) -> String {
        let d = &self.descriptor;
        let mut data = format!(
            "{MENU_PREFIX}:{}:{}:{}:{}:{}",
            d.level,
            d.menu_name,
            opt_to_string(d.category),
            d.page,
            opt_to_string(d.product_id)
        );
        if let Some(action) = self.action {
            data.push_str(&format!(":{}:{}", action.kind.code(), action.product_id));
        }
        data
    }

    /// Whether `data` claims to be a menu callback
    pub fn matches(data: &str) -> bool {
        data.split(':').next() == Some(MENU_PREFIX)
    }

    pub fn parse(data: &str) -> Result<Self, ShopError> {
        let malformed = || ShopError::Configuration(format!("malformed menu callback: {data}"));
        let parts: Vec<&str> = data.split(':').collect();
        if parts.first() != Some(&MENU_PREFIX) || !(parts.len() == 6 || parts.len() == 8) {
            return Err(malformed());
        }

        let level = parts[1].parse::<u8>().map_err(|_| malformed())?;
        let menu_name = parts[2].parse::<MenuName>()?;
        let category = parse_opt(parts[3]).ok_or_else(malformed)?;
        let page = parts[4].parse::<u32>().map_err(|_| malformed())?;
        let product_id = parse_opt(parts[5]).ok_or_else(malformed)?;
        let descriptor = Descriptor::new(level, menu_name, category, page, product_id)?;

        let action = if parts.len() == 8 {
            let kind = CartActionKind::from_code(parts[6]).ok_or_else(malformed)?;
            let product_id = parts[7].parse::<i32>().map_err(|_| malformed())?;
            Some(CartAction { kind, product_id })
        } else {
            None
        };

        Ok(Self { descriptor, action })
    }
}

fn opt_to_string(value: Option<i32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// `Some(None)` for an empty segment, `None` when the segment is not a number
fn parse_opt(segment: &str) -> Option<Option<i32>> {
    if segment.is_empty() {
        Some(None)
    } else {
        segment.parse::<i32>().ok().map(Some)
    }
}

/// Media and caption of a rendered screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayPayload {
    pub media: Option<MediaRef>,
    /// HTML caption
    pub caption: String,
}

/// One inline button; disabled buttons are dropped by the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    pub callback: MenuCallback,
    pub enabled: bool,
}

impl Control {
    fn new(label: impl Into<String>, callback: MenuCallback) -> Self {
        Self {
            label: label.into(),
            callback,
            enabled: true,
        }
    }

    fn show(label: impl Into<String>, descriptor: Descriptor) -> Self {
        Self::new(label, MenuCallback::show(descriptor))
    }

    fn enabled_if(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Grid of inline buttons
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlLayout {
    pub rows: Vec<Vec<Control>>,
}

impl ControlLayout {
    fn push_row(&mut self, row: Vec<Control>) {
        if !row.is_empty() {
            self.rows.push(row);
        }
    }

    fn push_grid(&mut self, controls: Vec<Control>, per_row: usize) {
        let mut controls = controls.into_iter().peekable();
        while controls.peek().is_some() {
            self.push_row(controls.by_ref().take(per_row).collect());
        }
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.rows.iter().flatten()
    }

    /// First control whose callback satisfies `predicate`
    pub fn find(&self, predicate: impl Fn(&MenuCallback) -> bool) -> Option<&Control> {
        self.controls().find(|c| predicate(&c.callback))
    }

    pub fn len(&self) -> usize {
        self.controls().count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One page of a paginated sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based page number after clamping
    pub number: u32,
    pub pages: u32,
}

impl<T> Page<'_, T> {
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.pages
    }
}

/// Slice `items` into pages of `per_page`, clamping `page` into range.
/// An empty sequence yields a single empty page.
pub fn paginate<T>(items: &[T], page: u32, per_page: usize) -> Page<'_, T> {
    let per_page = per_page.max(1);
    let pages = items.len().div_ceil(per_page).max(1) as u32;
    let number = page.clamp(1, pages);
    let start = (number as usize - 1) * per_page;
    let end = (start + per_page).min(items.len());
    Page {
        items: &items[start.min(end)..end],
        number,
        pages,
    }
}

/// Renders menu screens from descriptors
pub struct Resolver<'a> {
    store: &'a dyn ShopStore,
    products_per_page: usize,
    cart_lines_per_page: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn ShopStore, products_per_page: usize, cart_lines_per_page: usize) -> Self {
        Self {
            store,
            products_per_page: products_per_page.max(1),
            cart_lines_per_page: cart_lines_per_page.max(1),
        }
    }

    /// Produce the payload and controls for `descriptor`.
    ///
    /// `viewer_id` is the user looking at the screen; it is required for the
    /// cart and enables the "add to cart" controls on product screens.
    pub async fn resolve(
        &self,
        descriptor: &Descriptor,
        viewer_id: Option<i64>,
    ) -> Result<(DisplayPayload, ControlLayout), ShopError> {
        match (descriptor.level, descriptor.menu_name) {
            (_, MenuName::Order) => Err(ShopError::Configuration(
                "order descriptor must be handed to the order workflow".to_string(),
            )),
            (0, MenuName::Main | MenuName::About | MenuName::Payment | MenuName::Shipping) => {
                self.home(descriptor).await
            }
            (1, MenuName::Catalog) => self.catalog().await,
            (2, MenuName::Product) => self.products(descriptor, viewer_id).await,
            (3, MenuName::Cart) => self.cart(descriptor, viewer_id).await,
            (level, menu) => Err(ShopError::Configuration(format!(
                "no screen for level {level} with menu {menu}"
            ))),
        }
    }

    async fn banner(&self, page_name: &str) -> Result<DisplayPayload, ShopError> {
        match self.store.get_info_page(page_name).await? {
            Some(page) => Ok(DisplayPayload {
                media: page.image,
                caption: page.description,
            }),
            None => {
                warn!(page = page_name, "Info page is missing, rendering without banner");
                Ok(DisplayPayload {
                    media: None,
                    caption: String::new(),
                })
            }
        }
    }

    async fn home(&self, descriptor: &Descriptor) -> Result<(DisplayPayload, ControlLayout), ShopError> {
        let payload = self.banner(descriptor.menu_name.as_str()).await?;

        let mut layout = ControlLayout::default();
        layout.push_grid(
            vec![
                Control::show(t("btn-catalog"), Descriptor::catalog()),
                Control::show(t("btn-cart"), Descriptor::cart(1)),
                Control::show(t("btn-about"), Descriptor::home(MenuName::About)),
                Control::show(t("btn-payment"), Descriptor::home(MenuName::Payment)),
                Control::show(t("btn-shipping"), Descriptor::home(MenuName::Shipping)),
            ],
            BUTTONS_PER_ROW,
        );
        Ok((payload, layout))
    }

    async fn catalog(&self) -> Result<(DisplayPayload, ControlLayout), ShopError> {
        let payload = self.banner(MenuName::Catalog.as_str()).await?;
        let categories = self.store.get_categories().await?;

        let mut layout = ControlLayout::default();
        layout.push_row(vec![
            Control::show(t("btn-back"), Descriptor::root()),
            Control::show(t("btn-cart"), Descriptor::cart(1)),
        ]);
        layout.push_grid(
            categories
                .iter()
                .map(|c| Control::show(c.name.clone(), Descriptor::products(c.id, 1)))
                .collect(),
            BUTTONS_PER_ROW,
        );
        Ok((payload, layout))
    }

    async fn products(
        &self,
        descriptor: &Descriptor,
        viewer_id: Option<i64>,
    ) -> Result<(DisplayPayload, ControlLayout), ShopError> {
        let category = descriptor.category.ok_or_else(|| {
            ShopError::Configuration("product screen without a category".to_string())
        })?;
        let products = self.store.get_products(category).await?;

        let nav_row = || {
            vec![
                Control::show(t("btn-back"), Descriptor::catalog()),
                Control::show(t("btn-cart"), Descriptor::cart(1)),
            ]
        };

        if products.is_empty() {
            let banner = self.banner(MenuName::Catalog.as_str()).await?;
            let mut layout = ControlLayout::default();
            layout.push_row(nav_row());
            return Ok((
                DisplayPayload {
                    media: banner.media,
                    caption: t("category-empty"),
                },
                layout,
            ));
        }

        if let Some(product_id) = descriptor.product_id {
            match products.iter().find(|p| p.id == product_id) {
                Some(product) => {
                    let mut layout = ControlLayout::default();
                    if viewer_id.is_some() {
                        layout.push_row(vec![Control::new(
                            t("btn-buy"),
                            MenuCallback::with_action(*descriptor, CartActionKind::Add, product.id),
                        )]);
                    }
                    layout.push_row(vec![
                        Control::show(t("btn-back"), Descriptor::products(category, descriptor.page)),
                        Control::show(t("btn-cart"), Descriptor::cart(1)),
                    ]);
                    return Ok((
                        DisplayPayload {
                            media: Some(product.image.clone()),
                            caption: product_caption(product),
                        },
                        layout,
                    ));
                }
                None => {
                    warn!(product_id, category, "Product vanished, showing the listing instead");
                }
            }
        }

        let page = paginate(&products, descriptor.page, self.products_per_page);
        let listing = Descriptor::products(category, page.number);
        let mut layout = ControlLayout::default();

        let caption = if self.products_per_page == 1 {
            let product = &page.items[0];
            if viewer_id.is_some() {
                layout.push_row(vec![Control::new(
                    t("btn-buy"),
                    MenuCallback::with_action(listing, CartActionKind::Add, product.id),
                )]);
            }
            format!(
                "{}\n\n{}",
                product_caption(product),
                t_args(
                    "product-position",
                    &[("page", &page.number.to_string()), ("pages", &page.pages.to_string())]
                )
            )
        } else {
            for product in page.items {
                let mut row = vec![Control::show(
                    t_args("btn-view", &[("name", &product.name)]),
                    Descriptor::product(category, page.number, product.id),
                )];
                if viewer_id.is_some() {
                    row.push(Control::new(
                        t("btn-buy-short"),
                        MenuCallback::with_action(listing, CartActionKind::Add, product.id),
                    ));
                }
                layout.push_row(row);
            }
            let lines: Vec<String> = page
                .items
                .iter()
                .map(|p| {
                    t_args(
                        "products-list-line",
                        &[("name", &escape(&p.name)), ("price", &p.price.round_dp(2).to_string())],
                    )
                })
                .collect();
            format!(
                "{}\n\n{}",
                lines.join("\n"),
                t_args(
                    "products-page-position",
                    &[("page", &page.number.to_string()), ("pages", &page.pages.to_string())]
                )
            )
        };

        layout.push_row(pagination_row(&page, |n| Descriptor::products(category, n)));
        layout.push_row(nav_row());

        Ok((
            DisplayPayload {
                media: Some(page.items[0].image.clone()),
                caption,
            },
            layout,
        ))
    }

    async fn cart(
        &self,
        descriptor: &Descriptor,
        viewer_id: Option<i64>,
    ) -> Result<(DisplayPayload, ControlLayout), ShopError> {
        let viewer_id = viewer_id
            .ok_or_else(|| ShopError::Configuration("cart requested without a viewer".to_string()))?;

        let mut items: Vec<(CartLine, Product)> = Vec::new();
        for line in self.store.get_cart(viewer_id).await? {
            match self.store.get_product(line.product_id).await? {
                Some(product) => items.push((line, product)),
                None => warn!(user_id = viewer_id, product_id = line.product_id, "Cart line references a missing product"),
            }
        }

        let mut layout = ControlLayout::default();

        if items.is_empty() {
            let banner = self.banner(MenuName::Cart.as_str()).await?;
            layout.push_row(vec![Control::show(t("btn-home"), Descriptor::root())]);
            return Ok((
                DisplayPayload {
                    media: banner.media,
                    caption: format!("<strong>{}</strong>", banner.caption),
                },
                layout,
            ));
        }

        let total: Decimal = items
            .iter()
            .map(|(line, product)| product.price * Decimal::from(line.quantity))
            .sum();

        let page = paginate(&items, descriptor.page, self.cart_lines_per_page);
        let here = Descriptor::cart(page.number);

        let mut blocks = Vec::new();
        for (line, product) in page.items {
            let subtotal = product.price * Decimal::from(line.quantity);
            blocks.push(t_args(
                "cart-line",
                &[
                    ("name", &escape(&product.name)),
                    ("price", &product.price.to_string()),
                    ("quantity", &line.quantity.to_string()),
                    ("subtotal", &subtotal.round_dp(2).to_string()),
                ],
            ));

            let remove_label = if self.cart_lines_per_page == 1 {
                t("btn-remove")
            } else {
                t_args("btn-remove-named", &[("name", &product.name)])
            };
            layout.push_row(vec![
                Control::new(remove_label, MenuCallback::with_action(here, CartActionKind::Remove, product.id)),
                Control::new(t("btn-decrement"), MenuCallback::with_action(here, CartActionKind::Decrement, product.id)),
                Control::new(t("btn-increment"), MenuCallback::with_action(here, CartActionKind::Increment, product.id)),
            ]);
        }

        let caption = format!(
            "{}\n\n{}\n{}",
            blocks.join("\n\n"),
            t_args(
                "cart-position",
                &[("page", &page.number.to_string()), ("pages", &page.pages.to_string())]
            ),
            t_args("cart-total", &[("total", &total.round_dp(2).to_string())])
        );

        layout.push_row(pagination_row(&page, Descriptor::cart));
        layout.push_row(vec![
            Control::show(t("btn-home"), Descriptor::root()),
            Control::show(t("btn-order"), Descriptor::order()),
        ]);

        Ok((
            DisplayPayload {
                media: Some(page.items[0].1.image.clone()),
                caption,
            },
            layout,
        ))
    }
}

fn pagination_row<T>(page: &Page<'_, T>, target: impl Fn(u32) -> Descriptor) -> Vec<Control> {
    if page.pages <= 1 {
        return Vec::new();
    }
    vec![
        Control::show(t("btn-previous"), target(page.number.saturating_sub(1).max(1)))
            .enabled_if(page.has_previous()),
        Control::show(t("btn-next"), target((page.number + 1).min(page.pages))).enabled_if(page.has_next()),
    ]
}

/// HTML caption of a single product
pub fn product_caption(product: &Product) -> String {
    t_args(
        "product-caption",
        &[
            ("name", &escape(&product.name)),
            ("description", &escape(&product.description)),
            ("price", &product.price.round_dp(2).to_string()),
        ],
    )
}
