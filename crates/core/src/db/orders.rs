//! Order repository.
//!
//! Orders are written in a single transaction: product rows are locked,
//! stock is checked and decremented, then the order and its items are
//! inserted. Offline clients send a `client_ref` so a retried sync returns
//! the order created the first time instead of placing it twice.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{info, instrument};
use uuid::Uuid;

use super::RepositoryError;
use crate::checkout::{Coupon, DeliveryAddress, PaymentChoice, Quote, StoreRules};
use crate::models::{Order, OrderItem, OrderSummary};
use crate::types::{OrderId, OrderItemId, OrderStatus, PaymentMethod, Price, ProductId, UserId};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    address: String,
    zipcode: String,
    payment_method: PaymentMethod,
    payment_details: String,
    coupon: Option<String>,
    subtotal: Price,
    discount: Price,
    delivery_fee: Price,
    total: Price,
    notes: Option<String>,
    client_ref: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            address: self.address,
            zipcode: self.zipcode,
            payment_method: self.payment_method,
            payment_details: self.payment_details,
            coupon: self.coupon,
            subtotal: self.subtotal,
            discount: self.discount,
            delivery_fee: self.delivery_fee,
            total: self.total,
            notes: self.notes,
            client_ref: self.client_ref,
            created_at: self.created_at,
            items,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    unit: String,
    quantity: i32,
    price: Price,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            unit: row.unit,
            quantity: row.quantity,
            price: row.price,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderSummaryRow {
    id: OrderId,
    user_id: UserId,
    customer_name: String,
    status: OrderStatus,
    payment_method: PaymentMethod,
    total: Price,
    item_count: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderSummaryRow> for OrderSummary {
    fn from(row: OrderSummaryRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            customer_name: row.customer_name,
            status: row.status,
            payment_method: row.payment_method,
            total: row.total,
            item_count: row.item_count,
            created_at: row.created_at,
        }
    }
}

/// Locked product data read inside the order transaction.
#[derive(Debug, sqlx::FromRow)]
struct StockRow {
    id: ProductId,
    name: String,
    unit: String,
    price: Price,
    discount: i32,
    stock: i32,
    active: bool,
}

const ORDER_COLUMNS: &str = "id, user_id, status, address, zipcode, payment_method, \
                             payment_details, coupon, subtotal, discount, delivery_fee, \
                             total, notes, client_ref, created_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, unit, quantity, price";

/// A requested order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Everything needed to place an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub items: Vec<NewOrderItem>,
    pub address: DeliveryAddress,
    pub payment: PaymentChoice,
    pub coupon: Option<Coupon>,
    pub notes: Option<String>,
    pub client_ref: Option<Uuid>,
}

/// Outcome of [`OrderRepository::create`].
#[derive(Debug, Clone)]
pub enum PlacedOrder {
    /// A new order was written.
    Created(Order),
    /// The `client_ref` was already used by this customer.
    Duplicate(Order),
}

impl PlacedOrder {
    #[must_use]
    pub const fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::Duplicate(order) => order,
        }
    }

    #[must_use]
    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::Duplicate(order) => order,
        }
    }

    #[must_use]
    pub const fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Repository for `shop.orders` and `shop.order_items`.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Place an order.
    ///
    /// Quantities for the same product are merged. Prices come from the
    /// locked product rows, never from the caller.
    ///
    /// # Errors
    ///
    /// - `RepositoryError::NotFound` if a product does not exist
    /// - `RepositoryError::Conflict` if a product is inactive, a quantity is
    ///   not positive, or the order has no items
    /// - `RepositoryError::InsufficientStock` if stock does not cover a line
    #[instrument(skip(self, new_order, rules), fields(user_id = %new_order.user_id, items = new_order.items.len()))]
    pub async fn create(
        &self,
        new_order: &NewOrder,
        rules: &StoreRules,
    ) -> Result<PlacedOrder, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        if let Some(client_ref) = new_order.client_ref
            && let Some(existing) = find_by_client_ref(&mut tx, new_order.user_id, client_ref).await?
        {
            info!(order_id = %existing.id, %client_ref, "order already synced");
            return Ok(PlacedOrder::Duplicate(existing));
        }

        let mut requested: BTreeMap<ProductId, i32> = BTreeMap::new();
        for item in &new_order.items {
            if item.quantity <= 0 {
                return Err(RepositoryError::Conflict(format!(
                    "invalid quantity {} for product {}",
                    item.quantity, item.product_id
                )));
            }
            let entry = requested.entry(item.product_id).or_insert(0);
            *entry = entry.saturating_add(item.quantity);
        }
        if requested.is_empty() {
            return Err(RepositoryError::Conflict("order has no items".to_owned()));
        }

        let mut lines = Vec::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            let product: Option<StockRow> = sqlx::query_as(
                r"
                SELECT id, name, unit, price, discount, stock, active
                FROM shop.products
                WHERE id = $1
                FOR UPDATE
                ",
            )
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let product = product.ok_or(RepositoryError::NotFound)?;
            if !product.active {
                return Err(RepositoryError::Conflict(format!(
                    "product {} is not available",
                    product.name
                )));
            }
            if product.stock < quantity {
                return Err(RepositoryError::InsufficientStock {
                    product: product.name,
                    available: product.stock,
                    requested: quantity,
                });
            }
            lines.push((product, quantity));
        }

        let quote = Quote::compute(
            lines
                .iter()
                .map(|(p, quantity)| (p.price.discounted_by(p.discount), *quantity)),
            new_order.coupon,
            rules,
        );

        // A concurrent submission with the same client_ref makes this insert
        // wait for it and then return no row.
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            INSERT INTO shop.orders
                (user_id, status, address, zipcode, payment_method, payment_details,
                 coupon, subtotal, discount, delivery_fee, total, notes, client_ref)
            VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (client_ref) DO NOTHING
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(new_order.user_id)
        .bind(new_order.address.full_address())
        .bind(new_order.address.zipcode.as_str())
        .bind(new_order.payment.method)
        .bind(new_order.payment.description())
        .bind(quote.coupon.map(|c| c.code()))
        .bind(quote.subtotal)
        .bind(quote.discount)
        .bind(quote.delivery_fee)
        .bind(quote.total)
        .bind(new_order.notes.as_deref())
        .bind(new_order.client_ref)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return self.existing_by_client_ref(new_order).await;
        };

        let mut items = Vec::with_capacity(lines.len());
        for (product, quantity) in &lines {
            let item: OrderItemRow = sqlx::query_as(&format!(
                r"
                INSERT INTO shop.order_items
                    (order_id, product_id, product_name, unit, quantity, price)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}
                "
            ))
            .bind(row.id)
            .bind(product.id)
            .bind(&product.name)
            .bind(&product.unit)
            .bind(*quantity)
            .bind(product.price.discounted_by(product.discount))
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "UPDATE shop.products SET stock = stock - $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(product.id)
            .bind(*quantity)
            .execute(&mut *tx)
            .await?;

            items.push(item.into());
        }

        tx.commit().await?;

        let order = row.into_order(items);
        info!(order_id = %order.id, total = %order.total, "order placed");
        Ok(PlacedOrder::Created(order))
    }

    /// The order that won a `client_ref` race, read after the losing
    /// transaction rolled back.
    async fn existing_by_client_ref(
        &self,
        new_order: &NewOrder,
    ) -> Result<PlacedOrder, RepositoryError> {
        let client_ref = new_order
            .client_ref
            .ok_or_else(|| RepositoryError::Conflict("order insert skipped".to_owned()))?;
        let mut conn = self.pool.acquire().await?;
        let existing = find_by_client_ref(&mut conn, new_order.user_id, client_ref)
            .await?
            .ok_or_else(|| RepositoryError::Conflict("order already synced".to_owned()))?;
        info!(order_id = %existing.id, %client_ref, "order synced concurrently");
        Ok(PlacedOrder::Duplicate(existing))
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let items = load_items(&mut conn, &[row.id]).await?;
        Ok(Some(row.into_order(items)))
    }

    /// Order previously placed by `user_id` with this `client_ref`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the reference belongs to
    /// another customer.
    pub async fn get_by_client_ref(
        &self,
        user_id: UserId,
        client_ref: Uuid,
    ) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        find_by_client_ref(&mut conn, user_id, client_ref).await
    }

    /// All orders of one customer, newest first, with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// Every order, newest first, with items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;

        self.attach_items(rows).await
    }

    /// Order list rows for the admin panel, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    #[instrument(skip(self))]
    pub async fn list_summaries(
        &self,
        status: Option<OrderStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<OrderSummary>, RepositoryError> {
        let mut query: QueryBuilder<'_, Postgres> = QueryBuilder::new(
            r"
            SELECT o.id, o.user_id, u.name AS customer_name, o.status, o.payment_method,
                   o.total, o.created_at,
                   COALESCE((SELECT SUM(i.quantity) FROM shop.order_items i
                             WHERE i.order_id = o.id), 0)::BIGINT AS item_count
            FROM shop.orders o
            JOIN shop.users u ON u.id = o.user_id
            ",
        );
        if let Some(status) = status {
            query.push(" WHERE o.status = ").push_bind(status);
        }
        query.push(" ORDER BY o.created_at DESC");
        if let Some(limit) = limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows: Vec<OrderSummaryRow> = query.build_query_as().fetch_all(self.pool).await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Set the status of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.orders SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        info!(order_id = %id, %status, "order status updated");
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Items of one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        load_items(&mut conn, &[order_id]).await
    }

    /// Change quantity and/or unit price of an item and recompute the order
    /// totals. `None` keeps the current value.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not belong to the
    /// order, `RepositoryError::Conflict` for a non-positive quantity.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
        quantity: Option<i32>,
        price: Option<Price>,
    ) -> Result<Order, RepositoryError> {
        if let Some(quantity) = quantity
            && quantity <= 0
        {
            return Err(RepositoryError::Conflict(format!(
                "invalid quantity {quantity}"
            )));
        }

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r"
            UPDATE shop.order_items
            SET quantity = COALESCE($3, quantity), price = COALESCE($4, price)
            WHERE id = $1 AND order_id = $2
            ",
        )
        .bind(item_id)
        .bind(order_id)
        .bind(quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        recalculate_totals(&mut tx, order_id).await?;
        tx.commit().await?;

        self.get(order_id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Remove an item and recompute the order totals.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the item does not belong to the
    /// order.
    #[instrument(skip(self))]
    pub async fn delete_item(
        &self,
        order_id: OrderId,
        item_id: OrderItemId,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM shop.order_items WHERE id = $1 AND order_id = $2")
            .bind(item_id)
            .bind(order_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        recalculate_totals(&mut tx, order_id).await?;
        tx.commit().await?;

        self.get(order_id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Find the order that owns an item.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn order_of_item(
        &self,
        item_id: OrderItemId,
    ) -> Result<Option<OrderId>, RepositoryError> {
        let row: Option<(OrderId,)> =
            sqlx::query_as("SELECT order_id FROM shop.order_items WHERE id = $1")
                .bind(item_id)
                .fetch_optional(self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    /// Count all orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM shop.orders")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut conn = self.pool.acquire().await?;
        let mut by_order: BTreeMap<OrderId, Vec<OrderItem>> = BTreeMap::new();
        for item in load_items(&mut conn, &ids).await? {
            by_order.entry(item.order_id).or_default().push(item);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

async fn find_by_client_ref(
    conn: &mut PgConnection,
    user_id: UserId,
    client_ref: Uuid,
) -> Result<Option<Order>, RepositoryError> {
    let row: Option<OrderRow> = sqlx::query_as(&format!(
        "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE client_ref = $1"
    ))
    .bind(client_ref)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) if row.user_id == user_id => {
            let items = load_items(conn, &[row.id]).await?;
            Ok(Some(row.into_order(items)))
        }
        Some(_) => Err(RepositoryError::Conflict(
            "client reference belongs to another customer".to_owned(),
        )),
        None => Ok(None),
    }
}

async fn load_items(
    conn: &mut PgConnection,
    order_ids: &[OrderId],
) -> Result<Vec<OrderItem>, RepositoryError> {
    let raw: Vec<i32> = order_ids.iter().map(OrderId::as_i32).collect();
    let rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM shop.order_items WHERE order_id = ANY($1) ORDER BY id"
    ))
    .bind(raw)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Recompute subtotal, coupon discount and total from the current items.
/// The delivery fee charged at order time is kept.
async fn recalculate_totals(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    let (coupon, delivery_fee): (Option<String>, Price) =
        sqlx::query_as("SELECT coupon, delivery_fee FROM shop.orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(RepositoryError::NotFound)?;

    let items = load_items(conn, &[order_id]).await?;
    let coupon = coupon.as_deref().and_then(Coupon::lookup);
    let rules = StoreRules {
        delivery_fee,
        ..StoreRules::default()
    };
    let quote = Quote::compute(items.iter().map(|i| (i.price, i.quantity)), coupon, &rules);

    sqlx::query(
        r"
        UPDATE shop.orders
        SET subtotal = $2, discount = $3, total = $4, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(order_id)
    .bind(quote.subtotal)
    .bind(quote.discount)
    .bind(quote.total)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
