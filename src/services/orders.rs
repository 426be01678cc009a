use crate::{
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus, PaymentMethod, PaymentStatus,
    },
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
        Model as OrderItemModel,
    },
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, FromQueryResult, JoinType, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

const ORDER_NUMBER_PREFIX: &str = "ORD";
const ORDER_NUMBER_SUFFIX_LEN: usize = 9;
const RECENT_ORDERS_LIMIT: u64 = 5;

/// Request/response types for the order service

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "Customer email is required"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "Customer phone is required"))]
    pub customer_phone: String,
    #[validate(length(min = 1, message = "Customer address is required"))]
    pub customer_address: String,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CreateOrderItem>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub gateway_order_id: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateOrderItem {
    pub product_id: i64,
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedOrder {
    pub order_id: i64,
    pub order_number: String,
}

/// Full order detail, line items included.
#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

/// Listing row for the admin dashboard: order fields plus an item count,
/// no line-item detail.
#[derive(Debug, Serialize, Deserialize, FromQueryResult)]
pub struct OrderSummary {
    pub id: i64,
    pub order_number: String,
    pub customer_name: String,
    pub customer_email: String,
    pub total_amount: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}

/// Partial status update. Either axis may be set independently; at least one
/// must be present.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl StatusUpdate {
    pub fn is_empty(&self) -> bool {
        self.order_status.is_none() && self.payment_status.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub total_orders: u64,
    pub total_revenue: Decimal,
    pub pending_orders: u64,
    pub recent_orders: Vec<OrderSummary>,
}

#[derive(FromQueryResult)]
struct RevenueRow {
    total: Option<Decimal>,
}

/// Generate a human-facing order number: a millisecond timestamp plus a
/// random alphanumeric suffix under a fixed prefix. Unique by construction;
/// collision probability is negligible but not formally zero.
fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ORDER_NUMBER_SUFFIX_LEN)
        .map(char::from)
        .collect();
    format!(
        "{ORDER_NUMBER_PREFIX}-{millis}-{}",
        suffix.to_ascii_uppercase()
    )
}

/// Service for creating orders and reconciling their payment/fulfillment
/// status against durable storage.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Creates an order together with all of its line items in one
    /// transaction. A reader never observes the order row without the full
    /// item set; any failure rolls the whole write back.
    #[instrument(skip(self, request), fields(customer_email = %request.customer_email))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreatedOrder, ServiceError> {
        request.validate()?;
        for item in &request.items {
            item.validate()?;
        }

        let db = &*self.db;
        let now = Utc::now();
        let order_number = generate_order_number();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderActiveModel {
            order_number: Set(order_number.clone()),
            customer_name: Set(request.customer_name),
            customer_email: Set(request.customer_email),
            customer_phone: Set(request.customer_phone),
            customer_address: Set(request.customer_address),
            total_amount: Set(request.total_amount),
            payment_method: Set(request.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            order_status: Set(OrderStatus::Pending),
            gateway_order_id: Set(request.gateway_order_id),
            gateway_payment_id: Set(None),
            created_at: Set(now),
            ..Default::default()
        };

        // Dropping the transaction on any error path rolls back the order row
        // along with every item inserted so far.
        let order = order.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_number = %order_number, "Failed to insert order");
            ServiceError::OrderCreationFailed(e.to_string())
        })?;

        for item in request.items {
            let item = OrderItemActiveModel {
                order_id: Set(order.id),
                product_id: Set(item.product_id),
                quantity: Set(item.quantity),
                price: Set(item.price),
                subtotal: Set(item.subtotal),
                ..Default::default()
            };
            item.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = order.id, "Failed to insert order item");
                ServiceError::OrderCreationFailed(e.to_string())
            })?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = order.id, "Failed to commit order creation");
            ServiceError::OrderCreationFailed(e.to_string())
        })?;

        info!(order_id = order.id, order_number = %order_number, "Order created");

        Ok(CreatedOrder {
            order_id: order.id,
            order_number,
        })
    }

    /// Retrieves an order with its line items.
    #[instrument(skip(self))]
    pub async fn get_order(&self, id: i64) -> Result<OrderDetail, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id} not found")))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(id))
            .order_by_asc(order_item::Column::Id)
            .all(db)
            .await?;

        Ok(OrderDetail { order, items })
    }

    pub async fn find_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(&*self.db)
            .await?;
        Ok(order)
    }

    pub async fn find_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<OrderModel>, ServiceError> {
        let order = OrderEntity::find()
            .filter(order::Column::GatewayOrderId.eq(gateway_order_id))
            .one(&*self.db)
            .await?;
        Ok(order)
    }

    /// Lists all orders newest-first with their item counts.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderSummary>, ServiceError> {
        let orders = self
            .summary_query()
            .into_model::<OrderSummary>()
            .all(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to list orders");
                ServiceError::DatabaseError(e)
            })?;

        Ok(orders)
    }

    /// Applies a partial status update to one order as a single parameterized
    /// statement. Only supplied fields are touched; concurrent updates are
    /// each atomic and the last write wins.
    #[instrument(skip(self))]
    pub async fn update_status_fields(
        &self,
        id: i64,
        update: StatusUpdate,
    ) -> Result<u64, ServiceError> {
        if update.is_empty() {
            return Err(ServiceError::ValidationError("No fields to update".into()));
        }

        let mut stmt = OrderEntity::update_many().filter(order::Column::Id.eq(id));
        if let Some(status) = update.order_status {
            stmt = stmt.col_expr(order::Column::OrderStatus, Expr::value(status));
        }
        if let Some(status) = update.payment_status {
            stmt = stmt.col_expr(order::Column::PaymentStatus, Expr::value(status));
        }

        let result = stmt.exec(&*self.db).await.map_err(|e| {
            error!(error = %e, order_id = id, "Failed to update order status");
            ServiceError::DatabaseError(e)
        })?;

        if result.rows_affected == 0 {
            warn!(order_id = id, "Order not found for status update");
            return Err(ServiceError::NotFound(format!("Order {id} not found")));
        }

        info!(order_id = id, "Order status updated");
        Ok(result.rows_affected)
    }

    /// Records a payment outcome against the order holding the given gateway
    /// order id. Idempotent: re-applying the same values leaves the row
    /// unchanged.
    #[instrument(skip(self))]
    pub async fn update_payment_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
        payment_status: PaymentStatus,
        gateway_payment_id: Option<String>,
    ) -> Result<u64, ServiceError> {
        let result = OrderEntity::update_many()
            .col_expr(order::Column::PaymentStatus, Expr::value(payment_status))
            .col_expr(
                order::Column::GatewayPaymentId,
                Expr::value(gateway_payment_id),
            )
            .filter(order::Column::GatewayOrderId.eq(gateway_order_id))
            .exec(&*self.db)
            .await
            .map_err(|e| {
                error!(error = %e, gateway_order_id, "Failed to update payment status");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(gateway_order_id, "No order matches gateway order id");
            return Err(ServiceError::NotFound("Order not found".into()));
        }

        info!(gateway_order_id, status = %payment_status, "Payment status updated");
        Ok(result.rows_affected)
    }

    /// Aggregates for the admin dashboard: totals plus the most recent orders.
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ServiceError> {
        let db = &*self.db;

        let total_orders = OrderEntity::find().count(db).await?;

        let pending_orders = OrderEntity::find()
            .filter(order::Column::OrderStatus.eq(OrderStatus::Pending))
            .count(db)
            .await?;

        let revenue = OrderEntity::find()
            .select_only()
            .column_as(order::Column::TotalAmount.sum(), "total")
            .filter(order::Column::PaymentStatus.eq(PaymentStatus::Completed))
            .into_model::<RevenueRow>()
            .one(db)
            .await?;
        let total_revenue = revenue.and_then(|r| r.total).unwrap_or_default();

        let recent_orders = self
            .summary_query()
            .limit(RECENT_ORDERS_LIMIT)
            .into_model::<OrderSummary>()
            .all(db)
            .await?;

        Ok(DashboardStats {
            total_orders,
            total_revenue,
            pending_orders,
            recent_orders,
        })
    }

    fn summary_query(&self) -> sea_orm::Select<OrderEntity> {
        OrderEntity::find()
            .column_as(order_item::Column::Id.count(), "item_count")
            .join(JoinType::LeftJoin, order::Relation::OrderItem.def())
            .group_by(order::Column::Id)
            .order_by_desc(order::Column::CreatedAt)
    }
}
