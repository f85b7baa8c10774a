use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::shared::{Pagination, validate_max_len, validate_name};
use crate::entity::{store_item, store_item_variant, store_transaction};
use crate::error::AppError;

/// Orders larger than this many units in one request are refused.
const MAX_UNITS_PER_TRANSACTION: i32 = 100;

fn default_true() -> bool {
    true
}

fn default_max_per_order() -> i32 {
    5
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateStoreItemRequest {
    pub event_id: i32,
    #[schema(example = "Entrance ticket")]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Cents.
    #[schema(example = 2000)]
    pub price: i64,
    /// Total stock.
    #[schema(example = 500)]
    pub max: i32,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default = "default_max_per_order")]
    pub max_per_order: i32,
    #[serde(default)]
    pub sort_index: i32,
    #[serde(default)]
    pub discount_amount: i32,
    #[serde(default)]
    pub discount_percentage: i32,
    #[serde(default)]
    pub is_ticket: bool,
    #[serde(default)]
    pub is_secret: bool,
    #[serde(default)]
    pub secret_key: String,
    /// Variant names, e.g. T-shirt sizes.
    #[serde(default)]
    #[schema(example = json!(["S", "M", "L"]))]
    pub variants: Vec<String>,
}

#[derive(Deserialize, Default, utoipa::ToSchema)]
pub struct UpdateStoreItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub max: Option<i32>,
    pub available: Option<bool>,
    pub max_per_order: Option<i32>,
    pub sort_index: Option<i32>,
    pub discount_amount: Option<i32>,
    pub discount_percentage: Option<i32>,
    pub is_ticket: Option<bool>,
    pub is_secret: Option<bool>,
    pub secret_key: Option<String>,
}

/// Numeric limits and the secret-key rule, checked on merged values.
pub struct ItemLimits<'a> {
    pub price: i64,
    pub max: i32,
    pub max_per_order: i32,
    pub discount_amount: i32,
    pub discount_percentage: i32,
    pub is_secret: bool,
    pub secret_key: &'a str,
}

/// Highest accepted unit price, in cents.
pub const MAX_PRICE: i64 = 100_000_000;

pub fn validate_item_limits(l: &ItemLimits<'_>) -> Result<(), AppError> {
    if !(0..=MAX_PRICE).contains(&l.price) {
        return Err(AppError::Validation(format!(
            "price must be between 0 and {MAX_PRICE} cents"
        )));
    }
    if l.max < 0 {
        return Err(AppError::Validation("max must not be negative".into()));
    }
    if l.max_per_order < 1 {
        return Err(AppError::Validation("max_per_order must be at least 1".into()));
    }
    if l.discount_amount < 0 || !(0..=100).contains(&l.discount_percentage) {
        return Err(AppError::Validation(
            "discount_amount must be >= 0 and discount_percentage 0-100".into(),
        ));
    }
    if l.is_secret && l.secret_key.trim().is_empty() {
        return Err(AppError::Validation(
            "Secret items need a secret_key".into(),
        ));
    }
    validate_max_len(l.secret_key, "secret_key", 255)
}

pub fn validate_create_item(req: &CreateStoreItemRequest) -> Result<(), AppError> {
    validate_name(&req.name, "Name", 255)?;
    for variant in &req.variants {
        validate_name(variant, "Variant name", 32)?;
    }
    validate_item_limits(&ItemLimits {
        price: req.price,
        max: req.max,
        max_per_order: req.max_per_order,
        discount_amount: req.discount_amount,
        discount_percentage: req.discount_percentage,
        is_secret: req.is_secret,
        secret_key: &req.secret_key,
    })
}

pub fn validate_update_item(
    req: &UpdateStoreItemRequest,
    existing: &store_item::Model,
) -> Result<(), AppError> {
    if let Some(ref name) = req.name {
        validate_name(name, "Name", 255)?;
    }
    validate_item_limits(&ItemLimits {
        price: req.price.unwrap_or(existing.price),
        max: req.max.unwrap_or(existing.max),
        max_per_order: req.max_per_order.unwrap_or(existing.max_per_order),
        discount_amount: req.discount_amount.unwrap_or(existing.discount_amount),
        discount_percentage: req
            .discount_percentage
            .unwrap_or(existing.discount_percentage),
        is_secret: req.is_secret.unwrap_or(existing.is_secret),
        secret_key: req.secret_key.as_deref().unwrap_or(&existing.secret_key),
    })
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct StoreItemListQuery {
    #[param(example = 1)]
    pub event_id: i32,
    /// Unlocks secret items with this key.
    pub secret_key: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct VariantResponse {
    pub id: i32,
    pub name: String,
}

impl From<store_item_variant::Model> for VariantResponse {
    fn from(m: store_item_variant::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
        }
    }
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateVariantRequest {
    #[schema(example = "XL")]
    pub name: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StoreItemResponse {
    pub id: i32,
    pub event_id: i32,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub max: i32,
    pub available: bool,
    pub max_per_order: i32,
    pub sort_index: i32,
    pub discount_amount: i32,
    pub discount_percentage: i32,
    pub is_ticket: bool,
    pub is_secret: bool,
    /// Only shown to store managers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Stock left after all non-cancelled orders.
    pub num_available: i64,
    pub variants: Vec<VariantResponse>,
}

impl StoreItemResponse {
    pub fn new(
        m: store_item::Model,
        variants: Vec<store_item_variant::Model>,
        sold: i64,
        show_secret: bool,
    ) -> Self {
        Self {
            num_available: num_available(m.max, sold),
            id: m.id,
            event_id: m.event_id,
            name: m.name,
            description: m.description,
            price: m.price,
            max: m.max,
            available: m.available,
            max_per_order: m.max_per_order,
            sort_index: m.sort_index,
            discount_amount: m.discount_amount,
            discount_percentage: m.discount_percentage,
            is_ticket: m.is_ticket,
            is_secret: m.is_secret,
            secret_key: show_secret.then_some(m.secret_key),
            variants: variants.into_iter().map(VariantResponse::from).collect(),
        }
    }
}

pub fn num_available(max: i32, sold: i64) -> i64 {
    (i64::from(max) - sold).max(0)
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct OrderLine {
    pub item_id: i32,
    pub variant_id: Option<i32>,
    #[schema(example = 1)]
    pub amount: i32,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateTransactionRequest {
    #[schema(example = "Sarah")]
    pub firstname: String,
    #[schema(example = "Connor")]
    pub lastname: String,
    #[serde(default)]
    pub company: String,
    #[schema(example = "sarah@example.com")]
    pub email: String,
    #[serde(default)]
    pub telephone: String,
    #[serde(default)]
    pub mobile: String,
    pub street: String,
    pub postalcode: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub information: String,
    #[serde(default)]
    pub payment_method_name: String,
    /// Needed when ordering secret items.
    pub secret_key: Option<String>,
    pub items: Vec<OrderLine>,
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid || email.len() > 255 {
        return Err(AppError::Validation("A valid email is required".into()));
    }
    Ok(())
}

pub fn validate_create_transaction(req: &CreateTransactionRequest) -> Result<(), AppError> {
    validate_name(&req.firstname, "firstname", 64)?;
    validate_name(&req.lastname, "lastname", 64)?;
    validate_email(&req.email)?;
    validate_name(&req.street, "street", 128)?;
    validate_name(&req.postalcode, "postalcode", 16)?;
    validate_name(&req.city, "city", 64)?;
    validate_name(&req.country, "country", 64)?;
    validate_max_len(&req.company, "company", 128)?;
    validate_max_len(&req.telephone, "telephone", 64)?;
    validate_max_len(&req.mobile, "mobile", 64)?;
    validate_max_len(&req.information, "information", 1024)?;
    validate_max_len(&req.payment_method_name, "payment_method_name", 32)?;

    if req.items.is_empty() {
        return Err(AppError::Validation("The order has no items".into()));
    }
    if req.items.iter().any(|l| l.amount < 1) {
        return Err(AppError::Validation("Item amounts must be at least 1".into()));
    }
    let units: i64 = req.items.iter().map(|l| i64::from(l.amount)).sum();
    if units > i64::from(MAX_UNITS_PER_TRANSACTION) {
        return Err(AppError::Validation(format!(
            "At most {MAX_UNITS_PER_TRANSACTION} units per order"
        )));
    }
    Ok(())
}

/// Units ordered per item, summed over variants. Discounts and
/// per-order limits apply to these totals.
pub fn units_per_item(lines: &[OrderLine]) -> BTreeMap<i32, i32> {
    let mut totals = BTreeMap::new();
    for line in lines {
        *totals.entry(line.item_id).or_insert(0) += line.amount;
    }
    totals
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CreateTransactionResponse {
    /// Secret handle for viewing the order.
    pub token: Uuid,
    pub key: String,
    /// Cents.
    pub total_price: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TransactionItemResponse {
    pub id: i32,
    pub item_id: i32,
    pub item_name: String,
    pub variant_id: Option<i32>,
    pub variant_name: Option<String>,
    pub purchase_price: i64,
    pub original_price: i64,
    pub time_delivered: Option<DateTime<Utc>>,
    /// Ticket/item key. Hidden until the order is paid.
    pub key: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TransactionResponse {
    pub id: i32,
    pub event_id: i32,
    pub token: Uuid,
    pub key: String,
    pub firstname: String,
    pub lastname: String,
    pub company: String,
    pub email: String,
    pub telephone: String,
    pub mobile: String,
    pub street: String,
    pub postalcode: String,
    pub city: String,
    pub country: String,
    pub information: String,
    pub payment_method_name: String,
    pub total_price: i64,
    pub time_created: DateTime<Utc>,
    pub time_pending: Option<DateTime<Utc>>,
    pub time_paid: Option<DateTime<Utc>>,
    pub time_cancelled: Option<DateTime<Utc>>,
    pub is_paid: bool,
    pub is_cancelled: bool,
    pub items: Vec<TransactionItemResponse>,
}

impl TransactionResponse {
    pub fn new(m: store_transaction::Model, items: Vec<TransactionItemResponse>) -> Self {
        Self {
            is_paid: m.time_paid.is_some(),
            is_cancelled: m.time_cancelled.is_some(),
            id: m.id,
            event_id: m.event_id,
            token: m.token,
            key: m.key,
            firstname: m.firstname,
            lastname: m.lastname,
            company: m.company,
            email: m.email,
            telephone: m.telephone,
            mobile: m.mobile,
            street: m.street,
            postalcode: m.postalcode,
            city: m.city,
            country: m.country,
            information: m.information,
            payment_method_name: m.payment_method_name,
            total_price: m.total_price,
            time_created: m.time_created,
            time_pending: m.time_pending,
            time_paid: m.time_paid,
            time_cancelled: m.time_cancelled,
            items,
        }
    }
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct TransactionListQuery {
    #[param(example = 1)]
    pub event_id: i32,
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TransactionListResponse {
    pub data: Vec<TransactionResponse>,
    pub pagination: Pagination,
}
