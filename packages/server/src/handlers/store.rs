use std::collections::{HashMap, HashSet};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{LockType, Query as SeaQuery};
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::entity::{store_item, store_item_variant, store_transaction, transaction_item};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, MaybeAuthUser};
use crate::extractors::json::{AppJson, AppQuery};
use crate::models::shared::{Pagination, resolve_page, validate_name};
use crate::models::store::*;
use crate::state::AppState;
use crate::utils::event::find_event;
use crate::utils::pricing::{discounted_unit_price, generate_key, order_total};

/// Random bytes in transaction and item keys (hex-encoded to twice this).
const KEY_BYTES: usize = 20;

/// `item_id -> units` held by orders that are not cancelled.
async fn sold_counts<C: ConnectionTrait>(
    db: &C,
    item_ids: Vec<i32>,
) -> Result<HashMap<i32, i64>, AppError> {
    let rows: Vec<(i32, i64)> = transaction_item::Entity::find()
        .select_only()
        .column(transaction_item::Column::ItemId)
        .column_as(Expr::cust(r#"COUNT("transaction_item"."id")"#), "sold")
        .filter(transaction_item::Column::ItemId.is_in(item_ids))
        .filter(
            transaction_item::Column::TransactionId.in_subquery(
                SeaQuery::select()
                    .column(store_transaction::Column::Id)
                    .from(store_transaction::Entity)
                    .and_where(store_transaction::Column::TimeCancelled.is_null())
                    .to_owned(),
            ),
        )
        .group_by(transaction_item::Column::ItemId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().collect())
}

async fn variants_by_item<C: ConnectionTrait>(
    db: &C,
    item_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<store_item_variant::Model>>, AppError> {
    let mut grouped: HashMap<i32, Vec<store_item_variant::Model>> = HashMap::new();
    for v in store_item_variant::Entity::find()
        .filter(store_item_variant::Column::ItemId.is_in(item_ids))
        .order_by_asc(store_item_variant::Column::Id)
        .all(db)
        .await?
    {
        grouped.entry(v.item_id).or_default().push(v);
    }
    Ok(grouped)
}

async fn item_response<C: ConnectionTrait>(
    db: &C,
    item: store_item::Model,
) -> Result<StoreItemResponse, AppError> {
    let sold = sold_counts(db, vec![item.id]).await?;
    let variants = variants_by_item(db, vec![item.id])
        .await?
        .remove(&item.id)
        .unwrap_or_default();
    let sold = sold.get(&item.id).copied().unwrap_or(0);
    Ok(StoreItemResponse::new(item, variants, sold, true))
}

/// Purchased units per transaction with item and variant names. Keys are
/// revealed for paid, non-cancelled orders or when `always_reveal` is set.
async fn transaction_items<C: ConnectionTrait>(
    db: &C,
    transactions: &[store_transaction::Model],
    always_reveal: bool,
) -> Result<HashMap<i32, Vec<TransactionItemResponse>>, AppError> {
    let reveal: HashSet<i32> = transactions
        .iter()
        .filter(|t| always_reveal || (t.time_paid.is_some() && t.time_cancelled.is_none()))
        .map(|t| t.id)
        .collect();

    let rows = transaction_item::Entity::find()
        .filter(
            transaction_item::Column::TransactionId
                .is_in(transactions.iter().map(|t| t.id).collect::<Vec<_>>()),
        )
        .order_by_asc(transaction_item::Column::Id)
        .all(db)
        .await?;

    let item_ids: HashSet<i32> = rows.iter().map(|r| r.item_id).collect();
    let item_names: HashMap<i32, String> = store_item::Entity::find()
        .filter(store_item::Column::Id.is_in(item_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|i| (i.id, i.name))
        .collect();
    let variant_ids: HashSet<i32> = rows.iter().filter_map(|r| r.variant_id).collect();
    let variant_names: HashMap<i32, String> = store_item_variant::Entity::find()
        .filter(store_item_variant::Column::Id.is_in(variant_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|v| (v.id, v.name))
        .collect();

    let mut grouped: HashMap<i32, Vec<TransactionItemResponse>> = HashMap::new();
    for r in rows {
        let key = reveal.contains(&r.transaction_id).then_some(r.key);
        grouped
            .entry(r.transaction_id)
            .or_default()
            .push(TransactionItemResponse {
                id: r.id,
                item_id: r.item_id,
                item_name: item_names.get(&r.item_id).cloned().unwrap_or_default(),
                variant_id: r.variant_id,
                variant_name: r.variant_id.and_then(|v| variant_names.get(&v).cloned()),
                purchase_price: r.purchase_price,
                original_price: r.original_price,
                time_delivered: r.time_delivered,
                key,
            });
    }
    Ok(grouped)
}

async fn transaction_response<C: ConnectionTrait>(
    db: &C,
    transaction: store_transaction::Model,
    always_reveal: bool,
) -> Result<TransactionResponse, AppError> {
    let mut items =
        transaction_items(db, std::slice::from_ref(&transaction), always_reveal).await?;
    let items = items.remove(&transaction.id).unwrap_or_default();
    Ok(TransactionResponse::new(transaction, items))
}

#[utoipa::path(
    get,
    path = "/items",
    tag = "Store",
    operation_id = "listStoreItems",
    summary = "List store items of an event",
    description = "Public: available items, plus secret items whose `secret_key` is given. Store managers see \
        every item with its secret key. Sorted by `sort_index`, then name.",
    params(StoreItemListQuery),
    responses(
        (status = 200, description = "Items", body = Vec<StoreItemResponse>),
    ),
)]
#[instrument(skip(state, viewer, query), fields(event_id = query.event_id))]
pub async fn list_store_items(
    viewer: MaybeAuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<StoreItemListQuery>,
) -> Result<Json<Vec<StoreItemResponse>>, AppError> {
    let manager = viewer.has_permission("store:manage");

    let mut select =
        store_item::Entity::find().filter(store_item::Column::EventId.eq(query.event_id));
    if !manager {
        let mut visible = Condition::any().add(store_item::Column::IsSecret.eq(false));
        if let Some(key) = query.secret_key.as_deref().filter(|k| !k.is_empty()) {
            visible = visible.add(store_item::Column::SecretKey.eq(key));
        }
        select = select
            .filter(store_item::Column::Available.eq(true))
            .filter(visible);
    }
    let items = select
        .order_by_asc(store_item::Column::SortIndex)
        .order_by_asc(store_item::Column::Name)
        .all(&state.db)
        .await?;

    let ids: Vec<i32> = items.iter().map(|i| i.id).collect();
    let sold = sold_counts(&state.db, ids.clone()).await?;
    let mut variants = variants_by_item(&state.db, ids).await?;

    Ok(Json(
        items
            .into_iter()
            .map(|item| {
                let id = item.id;
                StoreItemResponse::new(
                    item,
                    variants.remove(&id).unwrap_or_default(),
                    sold.get(&id).copied().unwrap_or(0),
                    manager,
                )
            })
            .collect(),
    ))
}

#[utoipa::path(
    post,
    path = "/items",
    tag = "Store",
    operation_id = "createStoreItem",
    summary = "Create a store item",
    description = "Requires `store:manage`.",
    request_body = CreateStoreItemRequest,
    responses(
        (status = 201, description = "Item created", body = StoreItemResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(event_id = payload.event_id, name = %payload.name))]
pub async fn create_store_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateStoreItemRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("store:manage")?;
    validate_create_item(&payload)?;
    find_event(&state.db, payload.event_id).await?;

    let now = chrono::Utc::now();
    let txn = state.db.begin().await?;
    let item = store_item::ActiveModel {
        event_id: Set(payload.event_id),
        name: Set(payload.name.trim().to_string()),
        description: Set(payload.description),
        price: Set(payload.price),
        max: Set(payload.max),
        available: Set(payload.available),
        max_per_order: Set(payload.max_per_order),
        sort_index: Set(payload.sort_index),
        discount_amount: Set(payload.discount_amount),
        discount_percentage: Set(payload.discount_percentage),
        is_ticket: Set(payload.is_ticket),
        is_secret: Set(payload.is_secret),
        secret_key: Set(payload.secret_key.trim().to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if !payload.variants.is_empty() {
        let variants = payload
            .variants
            .iter()
            .map(|name| store_item_variant::ActiveModel {
                item_id: Set(item.id),
                name: Set(name.trim().to_string()),
                ..Default::default()
            });
        store_item_variant::Entity::insert_many(variants)
            .exec_without_returning(&txn)
            .await?;
    }
    let response = item_response(&txn, item).await?;
    txn.commit().await?;

    tracing::info!(item_id = response.id, event_id = response.event_id, "Store item created");
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    patch,
    path = "/items/{id}",
    tag = "Store",
    operation_id = "updateStoreItem",
    summary = "Update a store item",
    description = "Partial update. Requires `store:manage`.",
    params(("id" = i32, Path, description = "Item ID")),
    request_body = UpdateStoreItemRequest,
    responses(
        (status = 200, description = "Item updated", body = StoreItemResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Item not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_store_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateStoreItemRequest>,
) -> Result<Json<StoreItemResponse>, AppError> {
    auth_user.require_permission("store:manage")?;

    let txn = state.db.begin().await?;
    let existing = store_item::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Store item not found".into()))?;
    validate_update_item(&payload, &existing)?;

    let mut active: store_item::ActiveModel = existing.into();
    if let Some(ref name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(v) = payload.description {
        active.description = Set(v);
    }
    if let Some(v) = payload.price {
        active.price = Set(v);
    }
    if let Some(v) = payload.max {
        active.max = Set(v);
    }
    if let Some(v) = payload.available {
        active.available = Set(v);
    }
    if let Some(v) = payload.max_per_order {
        active.max_per_order = Set(v);
    }
    if let Some(v) = payload.sort_index {
        active.sort_index = Set(v);
    }
    if let Some(v) = payload.discount_amount {
        active.discount_amount = Set(v);
    }
    if let Some(v) = payload.discount_percentage {
        active.discount_percentage = Set(v);
    }
    if let Some(v) = payload.is_ticket {
        active.is_ticket = Set(v);
    }
    if let Some(v) = payload.is_secret {
        active.is_secret = Set(v);
    }
    if let Some(ref v) = payload.secret_key {
        active.secret_key = Set(v.trim().to_string());
    }
    active.updated_at = Set(chrono::Utc::now());

    let updated = active.update(&txn).await?;
    let response = item_response(&txn, updated).await?;
    txn.commit().await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/items/{id}",
    tag = "Store",
    operation_id = "deleteStoreItem",
    summary = "Delete a store item",
    description = "Requires `store:manage`. Items that have been ordered cannot be deleted; mark them unavailable instead.",
    params(("id" = i32, Path, description = "Item ID")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Item not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Item has been ordered (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_store_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("store:manage")?;

    let txn = state.db.begin().await?;
    store_item::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Store item not found".into()))?;

    let ordered = transaction_item::Entity::find()
        .filter(transaction_item::Column::ItemId.eq(id))
        .count(&txn)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict("Item has been ordered".into()));
    }

    store_item_variant::Entity::delete_many()
        .filter(store_item_variant::Column::ItemId.eq(id))
        .exec(&txn)
        .await?;
    store_item::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(item_id = id, "Store item deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/items/{id}/variants",
    tag = "Store",
    operation_id = "addStoreItemVariant",
    summary = "Add a variant to an item",
    description = "Requires `store:manage`.",
    params(("id" = i32, Path, description = "Item ID")),
    request_body = CreateVariantRequest,
    responses(
        (status = 201, description = "Variant added", body = VariantResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Item not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn add_variant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<CreateVariantRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("store:manage")?;
    validate_name(&payload.name, "Variant name", 32)?;

    store_item::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Store item not found".into()))?;

    let model = store_item_variant::ActiveModel {
        item_id: Set(id),
        name: Set(payload.name.trim().to_string()),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;
    Ok((StatusCode::CREATED, Json(VariantResponse::from(model))))
}

#[utoipa::path(
    delete,
    path = "/items/{id}/variants/{variant_id}",
    tag = "Store",
    operation_id = "deleteStoreItemVariant",
    summary = "Remove a variant",
    description = "Requires `store:manage`. Ordered variants cannot be removed.",
    params(
        ("id" = i32, Path, description = "Item ID"),
        ("variant_id" = i32, Path, description = "Variant ID"),
    ),
    responses(
        (status = 204, description = "Variant removed"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Variant not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Variant has been ordered (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id, variant_id))]
pub async fn delete_variant(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((id, variant_id)): Path<(i32, i32)>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("store:manage")?;

    let ordered = transaction_item::Entity::find()
        .filter(transaction_item::Column::VariantId.eq(variant_id))
        .count(&state.db)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict("Variant has been ordered".into()));
    }

    let result = store_item_variant::Entity::delete_many()
        .filter(store_item_variant::Column::Id.eq(variant_id))
        .filter(store_item_variant::Column::ItemId.eq(id))
        .exec(&state.db)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Variant not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "Store",
    operation_id = "createTransaction",
    summary = "Place an order",
    description = "Public. Every item must be available, belong to the same event and have stock left. Ordering \
        at least `discount_amount` units of an item applies its discount to every unit. One transaction item \
        with its own key is created per unit. The returned token is the only way to view the order.",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Order placed", body = CreateTransactionResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(lines = payload.items.len()))]
pub async fn create_transaction(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateTransactionRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_create_transaction(&payload)?;
    let units = units_per_item(&payload.items);
    let item_ids: Vec<i32> = units.keys().copied().collect();

    let txn = state.db.begin().await?;

    // Locked in id order so concurrent orders serialize without deadlocks.
    let items: HashMap<i32, store_item::Model> = store_item::Entity::find()
        .filter(store_item::Column::Id.is_in(item_ids.clone()))
        .order_by_asc(store_item::Column::Id)
        .lock(LockType::Update)
        .all(&txn)
        .await?
        .into_iter()
        .map(|i| (i.id, i))
        .collect();
    let sold = sold_counts(&txn, item_ids.clone()).await?;

    let mut event_id = None;
    // item_id -> (purchase price, original price)
    let mut prices: HashMap<i32, (i64, i64)> = HashMap::new();
    for (&item_id, &count) in &units {
        let item = items
            .get(&item_id)
            .filter(|i| i.available)
            .filter(|i| !i.is_secret || payload.secret_key.as_deref() == Some(i.secret_key.as_str()))
            .ok_or_else(|| AppError::Validation(format!("Item {item_id} is not available")))?;
        if *event_id.get_or_insert(item.event_id) != item.event_id {
            return Err(AppError::Validation(
                "All items must belong to the same event".into(),
            ));
        }
        if count > item.max_per_order {
            return Err(AppError::Validation(format!(
                "At most {} of \"{}\" per order",
                item.max_per_order, item.name
            )));
        }
        let left = num_available(item.max, sold.get(&item_id).copied().unwrap_or(0));
        if i64::from(count) > left {
            return Err(AppError::Validation(format!(
                "Only {left} of \"{}\" left",
                item.name
            )));
        }
        let unit = discounted_unit_price(
            item.price,
            item.discount_amount,
            item.discount_percentage,
            count,
        );
        prices.insert(item_id, (unit, item.price));
    }
    let event_id =
        event_id.ok_or_else(|| AppError::Validation("The order has no items".into()))?;

    let variants: HashMap<i32, store_item_variant::Model> = store_item_variant::Entity::find()
        .filter(store_item_variant::Column::ItemId.is_in(item_ids))
        .all(&txn)
        .await?
        .into_iter()
        .map(|v| (v.id, v))
        .collect();
    let items_with_variants: HashSet<i32> = variants.values().map(|v| v.item_id).collect();
    for line in &payload.items {
        match line.variant_id {
            Some(variant_id) => {
                if variants.get(&variant_id).map(|v| v.item_id) != Some(line.item_id) {
                    return Err(AppError::Validation(format!(
                        "Variant {variant_id} does not belong to item {}",
                        line.item_id
                    )));
                }
            }
            None if items_with_variants.contains(&line.item_id) => {
                return Err(AppError::Validation(format!(
                    "Item {} requires a variant",
                    line.item_id
                )));
            }
            None => {}
        }
    }

    let mut rows = Vec::new();
    let mut totals = Vec::with_capacity(payload.items.len());
    for line in &payload.items {
        let (purchase_price, original_price) = prices
            .get(&line.item_id)
            .copied()
            .ok_or_else(|| AppError::Internal(format!("No price for item {}", line.item_id)))?;
        totals.push((purchase_price, line.amount));
        for _ in 0..line.amount {
            rows.push((line.item_id, line.variant_id, purchase_price, original_price));
        }
    }
    let total_price = order_total(totals)
        .ok_or_else(|| AppError::Validation("Order total is too large".into()))?;

    let now = chrono::Utc::now();
    let transaction = store_transaction::ActiveModel {
        event_id: Set(event_id),
        token: Set(Uuid::new_v4()),
        key: Set(generate_key(KEY_BYTES)),
        firstname: Set(payload.firstname.trim().to_string()),
        lastname: Set(payload.lastname.trim().to_string()),
        company: Set(payload.company.trim().to_string()),
        email: Set(payload.email.trim().to_string()),
        telephone: Set(payload.telephone.trim().to_string()),
        mobile: Set(payload.mobile.trim().to_string()),
        street: Set(payload.street.trim().to_string()),
        postalcode: Set(payload.postalcode.trim().to_string()),
        city: Set(payload.city.trim().to_string()),
        country: Set(payload.country.trim().to_string()),
        information: Set(payload.information),
        payment_method_name: Set(payload.payment_method_name),
        total_price: Set(total_price),
        time_created: Set(now),
        time_pending: Set(Some(now)),
        time_paid: Set(None),
        time_cancelled: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let models = rows.into_iter().map(
        |(item_id, variant_id, purchase_price, original_price)| transaction_item::ActiveModel {
            key: Set(generate_key(KEY_BYTES)),
            transaction_id: Set(transaction.id),
            item_id: Set(item_id),
            variant_id: Set(variant_id),
            purchase_price: Set(purchase_price),
            original_price: Set(original_price),
            time_delivered: Set(None),
            ..Default::default()
        },
    );
    transaction_item::Entity::insert_many(models)
        .exec_without_returning(&txn)
        .await?;
    txn.commit().await?;

    tracing::info!(
        transaction_id = transaction.id,
        event_id,
        total_price,
        "Order placed"
    );
    Ok((
        StatusCode::CREATED,
        Json(CreateTransactionResponse {
            token: transaction.token,
            key: transaction.key,
            total_price,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/orders/{token}",
    tag = "Store",
    operation_id = "getTransaction",
    summary = "View an order by its token",
    description = "Public to whoever holds the token. Item keys are included once the order is paid.",
    params(("token" = Uuid, Path, description = "Order token")),
    responses(
        (status = 200, description = "Order", body = TransactionResponse),
        (status = 404, description = "Order not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, token))]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(token): Path<Uuid>,
) -> Result<Json<TransactionResponse>, AppError> {
    let transaction = store_transaction::Entity::find()
        .filter(store_transaction::Column::Token.eq(token))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".into()))?;
    Ok(Json(transaction_response(&state.db, transaction, false).await?))
}

#[utoipa::path(
    get,
    path = "/transactions",
    tag = "Store",
    operation_id = "listTransactions",
    summary = "List orders of an event",
    description = "Requires `store:manage`. Newest first.",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Orders", body = TransactionListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(event_id = query.event_id))]
pub async fn list_transactions(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppQuery(query): AppQuery<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, AppError> {
    auth_user.require_permission("store:manage")?;
    let (page, per_page) = resolve_page(query.page, query.per_page);

    let select = store_transaction::Entity::find()
        .filter(store_transaction::Column::EventId.eq(query.event_id));
    let total = select.clone().count(&state.db).await?;
    let transactions = select
        .order_by_desc(store_transaction::Column::TimeCreated)
        .order_by_desc(store_transaction::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let mut items = transaction_items(&state.db, &transactions, true).await?;
    let data = transactions
        .into_iter()
        .map(|t| {
            let items = items.remove(&t.id).unwrap_or_default();
            TransactionResponse::new(t, items)
        })
        .collect();

    Ok(Json(TransactionListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

async fn lock_transaction<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> Result<store_transaction::Model, AppError> {
    store_transaction::Entity::find_by_id(id)
        .lock(LockType::Update)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".into()))
}

#[utoipa::path(
    post,
    path = "/transactions/{id}/paid",
    tag = "Store",
    operation_id = "markTransactionPaid",
    summary = "Mark an order as paid",
    description = "Requires `store:manage`. Hook for payment confirmations. Marking a paid order again is a no-op.",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Order paid", body = TransactionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Transaction not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Order is cancelled (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn mark_transaction_paid(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TransactionResponse>, AppError> {
    auth_user.require_permission("store:manage")?;

    let txn = state.db.begin().await?;
    let existing = lock_transaction(&txn, id).await?;
    if existing.time_cancelled.is_some() {
        return Err(AppError::Conflict("A cancelled order cannot be paid".into()));
    }
    let transaction = if existing.time_paid.is_some() {
        existing
    } else {
        let mut active: store_transaction::ActiveModel = existing.into();
        active.time_paid = Set(Some(chrono::Utc::now()));
        let updated = active.update(&txn).await?;
        tracing::info!(transaction_id = id, by = auth_user.user_id, "Order marked paid");
        updated
    };
    let response = transaction_response(&txn, transaction, true).await?;
    txn.commit().await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/transactions/{id}/cancel",
    tag = "Store",
    operation_id = "cancelTransaction",
    summary = "Cancel an unpaid order",
    description = "Requires `store:manage`. Releases the reserved stock. Cancelling twice is a no-op.",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Order cancelled", body = TransactionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Transaction not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Order is paid (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn cancel_transaction(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<TransactionResponse>, AppError> {
    auth_user.require_permission("store:manage")?;

    let txn = state.db.begin().await?;
    let existing = lock_transaction(&txn, id).await?;
    if existing.time_paid.is_some() {
        return Err(AppError::Conflict("A paid order cannot be cancelled".into()));
    }
    let transaction = if existing.time_cancelled.is_some() {
        existing
    } else {
        let mut active: store_transaction::ActiveModel = existing.into();
        active.time_cancelled = Set(Some(chrono::Utc::now()));
        let updated = active.update(&txn).await?;
        tracing::info!(transaction_id = id, by = auth_user.user_id, "Order cancelled");
        updated
    };
    let response = transaction_response(&txn, transaction, true).await?;
    txn.commit().await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/transaction-items/{key}/deliver",
    tag = "Store",
    operation_id = "deliverTransactionItem",
    summary = "Hand out a purchased item",
    description = "Requires `store:manage`. The order must be paid. An item can be delivered once.",
    params(("key" = String, Path, description = "Item key")),
    responses(
        (status = 200, description = "Delivered", body = TransactionItemResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Item not found (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Already delivered or order not paid (CONFLICT)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, key))]
pub async fn deliver_item(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<TransactionItemResponse>, AppError> {
    auth_user.require_permission("store:manage")?;

    let txn = state.db.begin().await?;
    let existing = transaction_item::Entity::find()
        .filter(transaction_item::Column::Key.eq(key.trim().to_ascii_lowercase()))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Item not found".into()))?;
    if existing.time_delivered.is_some() {
        return Err(AppError::Conflict("Item has already been delivered".into()));
    }
    let transaction = store_transaction::Entity::find_by_id(existing.transaction_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".into()))?;
    if transaction.time_paid.is_none() || transaction.time_cancelled.is_some() {
        return Err(AppError::Conflict("The order has not been paid".into()));
    }

    let item_id = existing.id;
    let mut active: transaction_item::ActiveModel = existing.into();
    active.time_delivered = Set(Some(chrono::Utc::now()));
    active.update(&txn).await?;

    let mut items = transaction_items(&txn, std::slice::from_ref(&transaction), true).await?;
    txn.commit().await?;

    tracing::info!(transaction_item_id = item_id, by = auth_user.user_id, "Item delivered");
    items
        .remove(&transaction.id)
        .and_then(|list| list.into_iter().find(|i| i.id == item_id))
        .map(Json)
        .ok_or_else(|| AppError::Internal("Delivered item vanished".into()))
}
