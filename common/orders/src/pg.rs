use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::model::{BuyerProfile, DeliveryMethod, Order, OrderDetail, OrderLine, OrderStatus, Variant};
use crate::planning::plan_order;
use crate::status::{next_status, PaymentSignal, Reconciliation, Transition};
use crate::store::{OrderStore, CARRIER_CLAIM_TTL};
use crate::OrderError;

const ORDER_COLUMNS: &str = "id, email, first_name, last_name, phone, city, postal_code, address, total_price, \
     delivery_method, status, payment_id, carrier_shipment_id, carrier_tracking_number, carrier_status, user_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    phone: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
    address: Option<String>,
    total_price: BigDecimal,
    delivery_method: String,
    status: String,
    payment_id: Option<String>,
    carrier_shipment_id: Option<String>,
    carrier_tracking_number: Option<String>,
    carrier_status: Option<String>,
    user_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = OrderError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| OrderError::Database(format!("order {} has unknown status {}", row.id, row.status)))?;
        let delivery_method = match row.delivery_method.as_str() {
            "cdek" => DeliveryMethod::Cdek,
            other => {
                return Err(OrderError::Database(format!(
                    "order {} has unknown delivery method {other}",
                    row.id
                )))
            }
        };
        Ok(Order {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
            city: row.city,
            postal_code: row.postal_code,
            address: row.address,
            total_price: row.total_price,
            delivery_method,
            status,
            payment_id: row.payment_id,
            carrier_shipment_id: row.carrier_shipment_id,
            carrier_tracking_number: row.carrier_tracking_number,
            carrier_status: row.carrier_status,
            user_id: row.user_id,
            created_at: row.created_at,
        })
    }
}

/// PostgreSQL-backed store. Stock rows are locked with `FOR UPDATE` in ascending id order.
#[derive(Clone)]
pub struct PgOrderStore {
    db: PgPool,
}

impl PgOrderStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }

    async fn lock_order_status(
        tx: &mut Transaction<'_, Postgres>,
        order_id: i64,
    ) -> Result<Option<(OrderStatus, Option<String>)>, OrderError> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT status, payment_id FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut **tx)
                .await?;
        match row {
            None => Ok(None),
            Some((status, payment_id)) => {
                let status = OrderStatus::parse(&status)
                    .ok_or_else(|| OrderError::Database(format!("order {order_id} has unknown status {status}")))?;
                Ok(Some((status, payment_id)))
            }
        }
    }

    async fn lines_for(&self, order_id: i64) -> Result<Vec<OrderLine>, OrderError> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"SELECT op.id, op.product_size_id AS variant_id, p.id AS product_id, pc.id AS color_id,
                      pc.slug, pc.title, pc.label, pc.hex, p.price, p.discount_price, op.unit_price,
                      p.currency, ps.size, op.quantity, p.weight AS weight_grams
               FROM order_products op
               JOIN product_sizes ps ON ps.id = op.product_size_id
               JOIN product_colors pc ON pc.id = ps.product_color_id
               JOIN products p ON p.id = pc.product_id
               WHERE op.order_id = $1
               ORDER BY op.id"#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        Ok(lines)
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(
        &self,
        buyer: &BuyerProfile,
        user_id: Option<i64>,
        items: &BTreeMap<i64, i32>,
    ) -> Result<OrderDetail, OrderError> {
        let ids: Vec<i64> = items.keys().copied().collect();
        let mut tx = self.db.begin().await?;

        let variants = sqlx::query_as::<_, Variant>(
            r#"SELECT ps.id AS variant_id, ps.size, ps.quantity AS quantity_available,
                      pc.id AS color_id, pc.slug, pc.title, pc.label, pc.hex,
                      p.id AS product_id, p.price, p.discount_price, p.currency, p.weight AS weight_grams
               FROM product_sizes ps
               JOIN product_colors pc ON pc.id = ps.product_color_id
               JOIN products p ON p.id = pc.product_id
               WHERE ps.id = ANY($1)
               ORDER BY ps.id
               FOR UPDATE OF ps"#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        // Any error below drops `tx`, which rolls back every write.
        let plan = plan_order(items, &variants)?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"INSERT INTO orders (email, first_name, last_name, phone, city, postal_code, address,
                                   total_price, delivery_method, status, user_id)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {ORDER_COLUMNS}"#
        ))
        .bind(&buyer.email)
        .bind(&buyer.first_name)
        .bind(&buyer.last_name)
        .bind(&buyer.phone)
        .bind(&buyer.city)
        .bind(&buyer.postal_code)
        .bind(&buyer.address)
        .bind(&plan.total_price)
        .bind(DeliveryMethod::Cdek.as_str())
        .bind(OrderStatus::NotPaid.as_str())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        let order = Order::try_from(row)?;

        let mut products = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            let v = &line.variant;
            let line_id: i64 = sqlx::query_scalar(
                "INSERT INTO order_products (order_id, product_size_id, quantity, unit_price) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(order.id)
            .bind(v.variant_id)
            .bind(line.quantity)
            .bind(&line.unit_price)
            .fetch_one(&mut *tx)
            .await?;

            let updated = sqlx::query(
                "UPDATE product_sizes SET quantity = quantity - $1 WHERE id = $2 AND quantity >= $1",
            )
            .bind(line.quantity)
            .bind(v.variant_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() != 1 {
                warn!(variant_id = v.variant_id, requested = line.quantity, "stock decrement guard tripped");
                return Err(OrderError::InsufficientStock {
                    variant_id: v.variant_id,
                    requested: line.quantity,
                    available: v.quantity_available,
                });
            }

            products.push(OrderLine {
                id: line_id,
                variant_id: v.variant_id,
                product_id: v.product_id.clone(),
                color_id: v.color_id,
                slug: v.slug.clone(),
                title: v.title.clone(),
                label: v.label.clone(),
                hex: v.hex.clone(),
                price: v.price.clone(),
                discount_price: v.discount_price.clone(),
                unit_price: line.unit_price.clone(),
                currency: v.currency.clone(),
                size: v.size.clone(),
                quantity: line.quantity,
                weight_grams: v.weight_grams,
            });
        }

        tx.commit().await?;
        info!(order_id = order.id, total_price = %order.total_price, lines = products.len(), "order created");
        Ok(OrderDetail { order, products })
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn order_detail(&self, order_id: i64) -> Result<Option<OrderDetail>, OrderError> {
        let Some(order) = self.get_order(order_id).await? else {
            return Ok(None);
        };
        let products = self.lines_for(order_id).await?;
        Ok(Some(OrderDetail { order, products }))
    }

    async fn list_orders(&self, skip: i64, limit: i64) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn record_payment_reference(&self, order_id: i64, payment_id: &str) -> Result<(), OrderError> {
        let res = sqlx::query("UPDATE orders SET payment_id = $2 WHERE id = $1")
            .bind(order_id)
            .bind(payment_id)
            .execute(&self.db)
            .await?;
        if res.rows_affected() == 0 {
            return Err(OrderError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn reconcile_payment(
        &self,
        order_id: i64,
        signal: PaymentSignal,
        payment_id: Option<&str>,
    ) -> Result<Reconciliation, OrderError> {
        let mut tx = self.db.begin().await?;
        let Some((current, stored_payment_id)) = Self::lock_order_status(&mut tx, order_id).await? else {
            return Ok(Reconciliation::OrderMissing);
        };
        let transition = next_status(current, signal);
        let new_status = match transition {
            Transition::Apply(to) => Some(to),
            _ => None,
        };
        let unset = stored_payment_id.as_deref().map_or(true, str::is_empty);
        let fill_payment_id = payment_id.map(str::trim).filter(|id| unset && !id.is_empty());
        if new_status.is_some() || fill_payment_id.is_some() {
            sqlx::query(
                "UPDATE orders SET status = COALESCE($2, status), payment_id = COALESCE(NULLIF(payment_id, ''), $3) WHERE id = $1",
            )
            .bind(order_id)
            .bind(new_status.map(|s| s.as_str()))
            .bind(fill_payment_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(Reconciliation::from_transition(current, signal, transition))
    }

    async fn claim_carrier_registration(&self, order_id: i64) -> Result<(), OrderError> {
        let mut tx = self.db.begin().await?;
        let row: Option<(Option<String>, bool)> = sqlx::query_as(
            "SELECT carrier_shipment_id, \
             COALESCE(carrier_claimed_at > now() - make_interval(secs => $2), false) \
             FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .bind(CARRIER_CLAIM_TTL.as_secs_f64())
        .fetch_optional(&mut *tx)
        .await?;
        match row {
            None => return Err(OrderError::OrderNotFound(order_id)),
            Some((Some(_), _)) => return Err(OrderError::ShipmentAlreadyRegistered(order_id)),
            Some((None, true)) => return Err(OrderError::ShipmentRegistrationPending(order_id)),
            Some((None, false)) => {}
        }
        sqlx::query("UPDATE orders SET carrier_claimed_at = now() WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn release_carrier_registration(&self, order_id: i64) -> Result<(), OrderError> {
        sqlx::query("UPDATE orders SET carrier_claimed_at = NULL WHERE id = $1 AND carrier_shipment_id IS NULL")
            .bind(order_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn record_carrier_shipment(&self, order_id: i64, shipment_id: &str) -> Result<(), OrderError> {
        let res = sqlx::query(
            "UPDATE orders SET carrier_shipment_id = $2, carrier_claimed_at = NULL \
             WHERE id = $1 AND carrier_shipment_id IS NULL",
        )
        .bind(order_id)
        .bind(shipment_id)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 1 {
            return Ok(());
        }
        match self.get_order(order_id).await? {
            None => Err(OrderError::OrderNotFound(order_id)),
            Some(_) => Err(OrderError::ShipmentAlreadyRegistered(order_id)),
        }
    }

    async fn record_carrier_tracking(
        &self,
        order_id: i64,
        tracking_number: Option<&str>,
        status: Option<&str>,
    ) -> Result<(), OrderError> {
        let res = sqlx::query(
            "UPDATE orders SET carrier_tracking_number = COALESCE($2, carrier_tracking_number), \
             carrier_status = COALESCE($3, carrier_status) WHERE id = $1",
        )
        .bind(order_id)
        .bind(tracking_number)
        .bind(status)
        .execute(&self.db)
        .await?;
        if res.rows_affected() == 0 {
            return Err(OrderError::OrderNotFound(order_id));
        }
        Ok(())
    }

    async fn update_carrier_status(&self, shipment_id: &str, status: &str) -> Result<Option<i64>, OrderError> {
        let id: Option<i64> = sqlx::query_scalar(
            "UPDATE orders SET carrier_status = $2 WHERE carrier_shipment_id = $1 RETURNING id",
        )
        .bind(shipment_id)
        .bind(status)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }
}
