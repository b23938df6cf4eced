use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use super::ValidationError;

pub const DEFAULT_PAGE_SIZE: u32 = 30;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_DESCRIPTION_LEN: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Size {
    pub id: i64,
    pub size_code: i32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSize {
    pub size_code: i32,
    pub name: String,
}

impl NewSize {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)
    }
}

/// Reference tables that carry nothing but a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookupKind {
    Brand,
    Color,
    Material,
    Attribute,
}

impl LookupKind {
    pub const ALL: [LookupKind; 4] = [
        LookupKind::Brand,
        LookupKind::Color,
        LookupKind::Material,
        LookupKind::Attribute,
    ];

    /// Plural path segment, also the SQL table name.
    pub fn plural(self) -> &'static str {
        match self {
            LookupKind::Brand => "brands",
            LookupKind::Color => "colors",
            LookupKind::Material => "materials",
            LookupKind::Attribute => "attributes",
        }
    }
}

impl FromStr for LookupKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.plural() == s)
            .ok_or_else(|| ValidationError::new(format!("unknown catalog table '{s}'")))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lookup {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLookup {
    pub name: String,
}

impl NewLookup {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)
    }
}

/// Stored product row. Customer-facing reads only ever see visible products.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: i64,
    pub color_id: Option<i64>,
    pub material_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub main_image_url: Option<String>,
    pub total_stock_quantity: u32,
    pub is_active: bool,
    pub is_hot: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_visible(&self) -> bool {
        self.is_active && !self.is_deleted
    }

    pub fn is_listable(&self) -> bool {
        self.is_visible() && self.total_stock_quantity > 0
    }

    /// Writes every field present in `patch`; absent fields are left untouched.
    pub fn apply_patch(&mut self, patch: &ProductPatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(color_id) = patch.color_id {
            self.color_id = Some(color_id);
        }
        if let Some(material_id) = patch.material_id {
            self.material_id = Some(material_id);
        }
        if let Some(brand_id) = patch.brand_id {
            self.brand_id = Some(brand_id);
        }
        if let Some(url) = &patch.main_image_url {
            self.main_image_url = Some(url.clone());
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        if let Some(hot) = patch.is_hot {
            self.is_hot = hot;
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductSize {
    pub size_id: i64,
    pub stock_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProductAttribute {
    pub attribute_id: i64,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    pub category_id: i64,
    #[serde(default)]
    pub color_id: Option<i64>,
    #[serde(default)]
    pub material_id: Option<i64>,
    #[serde(default)]
    pub brand_id: Option<i64>,
    #[serde(default)]
    pub main_image_url: Option<String>,
    pub sizes: Vec<NewProductSize>,
    #[serde(default)]
    pub other_image_urls: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<NewProductAttribute>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        if let Some(d) = &self.description {
            validate_description(d)?;
        }
        validate_price(self.price)?;
        validate_reference("categoryId", Some(self.category_id))?;
        validate_reference("colorId", self.color_id)?;
        validate_reference("materialId", self.material_id)?;
        validate_reference("brandId", self.brand_id)?;

        let mut seen = Vec::with_capacity(self.sizes.len());
        for size in &self.sizes {
            validate_reference("sizeId", Some(size.size_id))?;
            if seen.contains(&size.size_id) {
                return Err(ValidationError::new(format!(
                    "size {} listed more than once",
                    size.size_id
                )));
            }
            seen.push(size.size_id);
        }
        for attr in &self.attributes {
            validate_reference("attributeId", Some(attr.attribute_id))?;
            if attr.value.trim().is_empty() {
                return Err(ValidationError::new("attribute value is required"));
            }
        }
        Ok(())
    }

    pub fn total_stock(&self) -> u32 {
        self.sizes.iter().map(|s| s.stock_quantity).sum()
    }
}

/// Partial update. `id` must repeat the id of the addressed product.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub color_id: Option<i64>,
    #[serde(default)]
    pub material_id: Option<i64>,
    #[serde(default)]
    pub brand_id: Option<i64>,
    #[serde(default)]
    pub main_image_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_hot: Option<bool>,
}

impl ProductPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(d) = &self.description {
            validate_description(d)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        validate_reference("categoryId", self.category_id)?;
        validate_reference("colorId", self.color_id)?;
        validate_reference("materialId", self.material_id)?;
        validate_reference("brandId", self.brand_id)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SizeStock {
    pub tracking_id: String,
    pub size_name: String,
    pub stock_quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductImage {
    pub id: i64,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeValue {
    pub attribute_name: String,
    pub value: String,
}

/// Product joined with its reference names, sizes, images and attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub main_image_url: Option<String>,
    pub total_stock_quantity: u32,
    pub is_active: bool,
    pub is_hot: bool,
    pub category_name: Option<String>,
    pub brand_name: Option<String>,
    pub color_name: Option<String>,
    pub material_name: Option<String>,
    pub sizes: Vec<SizeStock>,
    pub other_images: Vec<ProductImage>,
    pub attributes: Vec<AttributeValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    Newest,
    PriceDesc,
    PriceAsc,
    #[default]
    NameAsc,
    NameDesc,
}

impl ProductSort {
    /// Maps the numeric `sortId` query value; unknown or absent ids sort by name.
    pub fn from_sort_id(sort_id: Option<i32>) -> Self {
        match sort_id {
            Some(1) => ProductSort::Newest,
            Some(2) => ProductSort::PriceDesc,
            Some(3) => ProductSort::PriceAsc,
            Some(5) => ProductSort::NameDesc,
            _ => ProductSort::NameAsc,
        }
    }

    /// Ordering used by in-process adapters. Ties break on id.
    pub fn compare(self, a: &Product, b: &Product) -> Ordering {
        let primary = match self {
            ProductSort::Newest => b.created_at.cmp(&a.created_at),
            ProductSort::PriceDesc => b.price.cmp(&a.price),
            ProductSort::PriceAsc => a.price.cmp(&b.price),
            ProductSort::NameAsc => a.name.cmp(&b.name),
            ProductSort::NameDesc => b.name.cmp(&a.name),
        };
        let tie = match self {
            ProductSort::Newest => b.id.cmp(&a.id),
            _ => a.id.cmp(&b.id),
        };
        primary.then(tie)
    }
}

/// Conjunctive listing filters. A missing or non-positive value means "no filter".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductFilter {
    pub category_id: Option<i64>,
    pub color_id: Option<i64>,
    pub material_id: Option<i64>,
    pub brand_id: Option<i64>,
}

impl ProductFilter {
    /// Parses the positional `categoryId-colorId-materialId-brandId[-...]` path segment.
    ///
    /// Segments past the fourth (typically a readable slug) are ignored.
    pub fn parse(segment: &str) -> Self {
        let mut parts = segment.split('-').map(|p| p.parse::<i64>().ok().filter(|v| *v > 0));
        let mut next = || parts.next().flatten();
        Self {
            category_id: next(),
            color_id: next(),
            material_id: next(),
            brand_id: next(),
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.category_id.map_or(true, |id| product.category_id == id)
            && self.color_id.map_or(true, |id| product.color_id == Some(id))
            && self.material_id.map_or(true, |id| product.material_id == Some(id))
            && self.brand_id.map_or(true, |id| product.brand_id == Some(id))
    }
}

/// Normalized offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: u32,
    pub size: u32,
}

impl Page {
    pub fn new(page_index: i64, page_size: i64) -> Self {
        let index = u32::try_from(page_index.max(0)).unwrap_or(u32::MAX);
        let size = match u32::try_from(page_size) {
            Ok(size) if size > 0 && size <= MAX_PAGE_SIZE => size,
            _ => DEFAULT_PAGE_SIZE,
        };
        Self { index, size }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.index) * u64::from(self.size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProductQuery {
    pub filter: ProductFilter,
    pub sort: ProductSort,
    pub page: Page,
    pub featured_only: bool,
}

impl ProductQuery {
    pub fn listing(filter: ProductFilter, sort: ProductSort, page: Page) -> Self {
        Self {
            filter,
            sort,
            page,
            featured_only: false,
        }
    }

    pub fn featured(page: Page) -> Self {
        Self {
            page,
            featured_only: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        product.is_listable() && (!self.featured_only || product.is_hot) && self.filter.matches(product)
    }
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::new("name is required"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::new(format!(
            "name longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::new(format!(
            "description longer than {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), ValidationError> {
    if price < Decimal::new(1, 2) {
        return Err(ValidationError::new("price must be at least 0.01"));
    }
    if price.round_dp(2) != price {
        return Err(ValidationError::new("price has more than two decimal places"));
    }
    Ok(())
}

fn validate_reference(field: &str, id: Option<i64>) -> Result<(), ValidationError> {
    match id {
        Some(id) if id <= 0 => Err(ValidationError::new(format!("{field} must be positive"))),
        _ => Ok(()),
    }
}
