//! Online checkout, point-of-sale sales and the order lifecycle.

use std::collections::HashMap;
use std::sync::Arc;

use mockable::Clock;
use pagination::{Page, PageRequest};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::payment_service::parse_phone;
use crate::domain::ports::{
    CatalogueRepository, OrderRepository, OrderRepositoryError, StatusChange, UserRepository,
};
use crate::domain::stock_service::low_stock_draft;
use crate::domain::{
    Cart, CartLine, Channel, DiscountService, Error, LowStockItem, Money, MpesaPhone,
    NotificationDraft, NotificationKind, NotificationService, Order, OrderDetail, OrderFilter,
    OrderItem, OrderPlacement, OrderStatus, OrderTotals, PaymentInitiation, PaymentMethod,
    PaymentService, PaymentStatus, Principal, SellableVariant, ShippingDetails, ShippingPolicy,
    generate_order_number,
};

const ORDER_NUMBER_ATTEMPTS: usize = 3;
const NOTES_MAX: usize = 1_000;

/// Customers see their own orders; staff see every order. Anything else is
/// reported as missing.
pub(crate) fn ensure_visible(principal: &Principal, order: &Order) -> Result<(), Error> {
    if principal.is_staff() || order.user_id == Some(principal.user_id) {
        Ok(())
    } else {
        Err(Error::not_found(format!("order {} not found", order.id)))
    }
}

/// Checkout form submitted by a signed-in customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    /// Delivery details.
    pub shipping: ShippingDetails,
    /// `mpesa` or `cash_on_delivery`.
    pub payment_method: PaymentMethod,
    /// Optional discount code.
    pub discount_code: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Phone to bill; defaults to the shipping phone.
    pub mpesa_phone: Option<String>,
}

/// Outcome of a checkout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    /// The placed order.
    pub order: OrderDetail,
    /// Started STK push, for M-Pesa orders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInitiation>,
    /// Why the STK push could not start; the order stays unpaid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<Error>,
}

/// How a till sale is settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosPayment {
    /// Cash handed over at the till.
    Cash {
        /// Cash received, in minor units.
        amount_tendered: Money,
    },
    /// STK push to the customer's phone.
    Mpesa {
        /// Phone to bill.
        phone: String,
    },
}

/// Till sale submitted by staff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosSaleRequest {
    /// Variants and quantities sold.
    pub items: Vec<CartLine>,
    /// Settlement.
    pub payment: PosPayment,
    /// Optional discount code.
    pub discount_code: Option<String>,
    /// Customer contact, if given.
    pub customer_phone: Option<String>,
}

/// Outcome of a till sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosSale {
    /// The recorded order.
    pub order: OrderDetail,
    /// Change owed for cash sales.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_due: Option<Money>,
    /// Started STK push, for M-Pesa sales.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInitiation>,
    /// Why the STK push could not start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_error: Option<Error>,
}

struct Priced {
    items: Vec<OrderItem>,
    totals: OrderTotals,
    discount_id: Option<Uuid>,
    discount_code: Option<String>,
}

fn required(field: &str, raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::invalid_field(
            field,
            "required",
            format!("{field} is required"),
        ));
    }
    Ok(trimmed.to_owned())
}

fn normalise_shipping(shipping: ShippingDetails) -> Result<ShippingDetails, Error> {
    Ok(ShippingDetails {
        recipient: required("shipping.recipient", &shipping.recipient)?,
        phone: required("shipping.phone", &shipping.phone)?,
        address: required("shipping.address", &shipping.address)?,
        city: required("shipping.city", &shipping.city)?,
    })
}

fn normalise_notes(notes: Option<String>) -> Result<Option<String>, Error> {
    let notes = notes.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
    if notes.as_ref().is_some_and(|n| n.chars().count() > NOTES_MAX) {
        return Err(Error::invalid_field(
            "notes",
            "too_long",
            format!("notes must be at most {NOTES_MAX} characters"),
        ));
    }
    Ok(notes)
}

/// Order service.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    catalogue: Arc<dyn CatalogueRepository>,
    users: Arc<dyn UserRepository>,
    discounts: DiscountService,
    payments: PaymentService,
    notifications: NotificationService,
    clock: Arc<dyn Clock>,
    shipping: ShippingPolicy,
}

impl OrderService {
    /// Create the service.
    #[expect(clippy::too_many_arguments, reason = "one handle per collaborator")]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        catalogue: Arc<dyn CatalogueRepository>,
        users: Arc<dyn UserRepository>,
        discounts: DiscountService,
        payments: PaymentService,
        notifications: NotificationService,
        clock: Arc<dyn Clock>,
        shipping: ShippingPolicy,
    ) -> Self {
        Self {
            orders,
            catalogue,
            users,
            discounts,
            payments,
            notifications,
            clock,
            shipping,
        }
    }

    /// Shipping fee and threshold in force.
    pub fn shipping_policy(&self) -> ShippingPolicy {
        self.shipping
    }

    /// Snapshot prices for `lines` and apply an optional discount.
    async fn price(
        &self,
        order_id: Uuid,
        lines: &[CartLine],
        discount_code: Option<&str>,
        channel: Channel,
    ) -> Result<Priced, Error> {
        let ids: Vec<Uuid> = lines.iter().map(|l| l.variant_id).collect();
        let live: HashMap<Uuid, SellableVariant> = self
            .catalogue
            .find_sellable(&ids)
            .await?
            .into_iter()
            .map(|s| (s.variant.id, s))
            .collect();

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let sellable = live
                .get(&line.variant_id)
                .filter(|s| s.product_active)
                .ok_or_else(|| {
                    Error::invalid_request(format!("variant {} is not available", line.variant_id))
                        .with_reason("variant_unavailable")
                })?;
            let quantity = i32::try_from(line.quantity).map_err(|_| {
                Error::invalid_field("quantity", "quantity_out_of_range", "quantity too large")
            })?;
            let unit_price = sellable.unit_price();
            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id,
                variant_id: line.variant_id,
                product_name: sellable.product_name.clone(),
                sku: sellable.variant.sku.clone(),
                unit_price,
                quantity,
                line_total: unit_price * i64::from(quantity),
            });
        }
        let subtotal: Money = items.iter().map(|i| i.line_total).sum();

        let code = discount_code.map(str::trim).filter(|c| !c.is_empty());
        let (discount_id, discount_code, discount_amount) = match code {
            Some(code) => {
                let (discount, amount) = self.discounts.evaluate(code, subtotal).await?;
                (Some(discount.id), Some(discount.code), amount)
            }
            None => (None, None, 0),
        };
        let shipping_fee = match channel {
            Channel::Online => self.shipping.fee_for(subtotal - discount_amount),
            Channel::Pos => 0,
        };
        Ok(Priced {
            items,
            totals: OrderTotals::new(subtotal, discount_amount, shipping_fee),
            discount_id,
            discount_code,
        })
    }

    /// Persist a placement, drawing a fresh order number on collision.
    async fn place(&self, mut placement: OrderPlacement) -> Result<OrderDetail, Error> {
        let mut attempt = 1;
        let low = loop {
            match self.orders.place(&placement).await {
                Ok(low) => break low,
                Err(OrderRepositoryError::DuplicateOrderNumber)
                    if attempt < ORDER_NUMBER_ATTEMPTS =>
                {
                    attempt += 1;
                    placement.order.order_number =
                        generate_order_number(placement.order.created_at);
                }
                Err(err) => return Err(err.into()),
            }
        };
        info!(
            order_id = %placement.order.id,
            order_number = %placement.order.order_number,
            channel = placement.order.channel.as_str(),
            total = placement.order.total,
            "order placed"
        );
        self.announce_low_stock(&low).await;
        Ok(OrderDetail {
            order: placement.order,
            items: placement.items,
        })
    }

    async fn announce_low_stock(&self, items: &[LowStockItem]) {
        for item in items {
            self.notifications.notify_staff(low_stock_draft(item)).await;
        }
    }

    fn new_order(&self, id: Uuid, channel: Channel, priced: &Priced) -> Order {
        let now = self.clock.utc();
        Order {
            id,
            order_number: generate_order_number(now),
            user_id: None,
            channel,
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Mpesa,
            payment_status: PaymentStatus::Unpaid,
            subtotal: priced.totals.subtotal,
            discount_amount: priced.totals.discount_amount,
            shipping_fee: priced.totals.shipping_fee,
            total: priced.totals.total,
            discount_code: priced.discount_code.clone(),
            shipping: None,
            customer_phone: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn start_payment(
        &self,
        order: &Order,
        phone: &MpesaPhone,
    ) -> (Option<PaymentInitiation>, Option<Error>) {
        match self.payments.initiate(order, phone).await {
            Ok(started) => (Some(started), None),
            Err(error) => {
                warn!(order_id = %order.id, %error, "STK push could not start; order left unpaid");
                (None, Some(error))
            }
        }
    }

    /// Turn the caller's cart into an order.
    pub async fn checkout(
        &self,
        principal: &Principal,
        cart: &mut Cart,
        request: CheckoutRequest,
    ) -> Result<CheckoutReceipt, Error> {
        let account = self
            .users
            .find_by_id(&principal.user_id)
            .await?
            .ok_or_else(|| Error::unauthorized("account no longer exists"))?;
        if !account.is_verified {
            return Err(Error::forbidden("email address has not been verified")
                .with_reason("email_unverified"));
        }
        if cart.is_empty() {
            return Err(Error::invalid_request("cart is empty").with_reason("empty_cart"));
        }
        if !matches!(
            request.payment_method,
            PaymentMethod::Mpesa | PaymentMethod::CashOnDelivery
        ) {
            return Err(Error::invalid_field(
                "paymentMethod",
                "unsupported_payment_method",
                "choose mpesa or cash_on_delivery",
            ));
        }
        let shipping = normalise_shipping(request.shipping)?;
        let notes = normalise_notes(request.notes)?;
        let phone = match request.payment_method {
            PaymentMethod::Mpesa => {
                let raw = request.mpesa_phone.as_deref().unwrap_or(&shipping.phone);
                Some(parse_phone("mpesaPhone", raw)?)
            }
            _ => None,
        };

        let order_id = Uuid::new_v4();
        let priced = self
            .price(
                order_id,
                cart.lines(),
                request.discount_code.as_deref(),
                Channel::Online,
            )
            .await?;
        let mut order = self.new_order(order_id, Channel::Online, &priced);
        order.user_id = Some(principal.user_id);
        order.payment_method = request.payment_method;
        order.customer_phone = Some(shipping.phone.clone());
        order.shipping = Some(shipping);
        order.notes = notes;

        let detail = self
            .place(OrderPlacement {
                order,
                items: priced.items,
                discount_id: priced.discount_id,
                performed_by: Some(principal.user_id),
            })
            .await?;
        cart.clear();

        self.notifications
            .notify_staff(NotificationDraft::new(
                NotificationKind::NewOrder,
                "New order",
                format!(
                    "Order {} was placed for {}",
                    detail.order.order_number, detail.order.total
                ),
                Some(detail.order.id),
            ))
            .await;

        let (payment, payment_error) = match phone {
            Some(phone) => self.start_payment(&detail.order, &phone).await,
            None => (None, None),
        };
        let detail = match payment {
            Some(_) => self.reload(detail).await,
            None => detail,
        };
        Ok(CheckoutReceipt {
            order: detail,
            payment,
            payment_error,
        })
    }

    async fn reload(&self, detail: OrderDetail) -> OrderDetail {
        match self.orders.find(detail.order.id).await {
            Ok(Some(fresh)) => fresh,
            _ => detail,
        }
    }

    /// Record a till sale.
    pub async fn sell(&self, staff: &Principal, request: PosSaleRequest) -> Result<PosSale, Error> {
        if !staff.is_staff() {
            return Err(Error::forbidden("staff only"));
        }
        let mut basket = Cart::default();
        for line in &request.items {
            basket
                .add(line.variant_id, line.quantity)
                .map_err(|err| Error::invalid_field("items", "invalid_items", err.to_string()))?;
        }
        if basket.is_empty() {
            return Err(Error::invalid_field(
                "items",
                "required",
                "a sale needs at least one item",
            ));
        }
        let phone = match &request.payment {
            PosPayment::Mpesa { phone } => Some(parse_phone("payment.phone", phone)?),
            PosPayment::Cash { .. } => None,
        };

        let order_id = Uuid::new_v4();
        let priced = self
            .price(
                order_id,
                basket.lines(),
                request.discount_code.as_deref(),
                Channel::Pos,
            )
            .await?;
        let (status, method, payment_status, change_due) = match request.payment {
            PosPayment::Cash { amount_tendered } => {
                if amount_tendered < priced.totals.total {
                    return Err(Error::invalid_field(
                        "payment.amountTendered",
                        "insufficient_tender",
                        format!(
                            "amount tendered {amount_tendered} is below the total {}",
                            priced.totals.total
                        ),
                    ));
                }
                (
                    OrderStatus::Delivered,
                    PaymentMethod::Cash,
                    PaymentStatus::Paid,
                    Some(amount_tendered - priced.totals.total),
                )
            }
            PosPayment::Mpesa { .. } => (
                OrderStatus::Pending,
                PaymentMethod::Mpesa,
                PaymentStatus::Unpaid,
                None,
            ),
        };
        let mut order = self.new_order(order_id, Channel::Pos, &priced);
        order.status = status;
        order.payment_method = method;
        order.payment_status = payment_status;
        order.customer_phone = request
            .customer_phone
            .map(|p| p.trim().to_owned())
            .filter(|p| !p.is_empty())
            .or_else(|| phone.as_ref().map(|p| p.as_str().to_owned()));

        let detail = self
            .place(OrderPlacement {
                order,
                items: priced.items,
                discount_id: priced.discount_id,
                performed_by: Some(staff.user_id),
            })
            .await?;

        let (payment, payment_error) = match phone {
            Some(phone) => self.start_payment(&detail.order, &phone).await,
            None => (None, None),
        };
        let detail = match payment {
            Some(_) => self.reload(detail).await,
            None => detail,
        };
        Ok(PosSale {
            order: detail,
            change_due,
            payment,
            payment_error,
        })
    }

    async fn load(&self, id: Uuid) -> Result<OrderDetail, Error> {
        self.orders
            .find(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("order {id} not found")))
    }

    async fn apply_status(
        &self,
        actor: &Principal,
        current: &Order,
        to: OrderStatus,
    ) -> Result<OrderDetail, Error> {
        let payment_status = match to {
            OrderStatus::Cancelled if current.payment_status == PaymentStatus::Paid => {
                Some(PaymentStatus::Refunded)
            }
            OrderStatus::Paid => Some(PaymentStatus::Paid),
            OrderStatus::Delivered if current.payment_method == PaymentMethod::CashOnDelivery => {
                Some(PaymentStatus::Paid)
            }
            _ => None,
        };
        let changed = self
            .orders
            .change_status(StatusChange {
                order_id: current.id,
                from: current.status,
                to,
                payment_status,
                performed_by: Some(actor.user_id),
                at: self.clock.utc(),
            })
            .await?;
        if !changed {
            return Err(Error::conflict("order changed concurrently, reload and retry")
                .with_reason("order_changed"));
        }
        info!(
            order_id = %current.id,
            from = current.status.as_str(),
            to = to.as_str(),
            actor = %actor.user_id,
            "order status changed"
        );
        if let Some(customer) = current.user_id.filter(|c| *c != actor.user_id) {
            self.notifications
                .notify_user(
                    customer,
                    NotificationDraft::new(
                        NotificationKind::OrderStatus,
                        "Order update",
                        format!("Order {} is now {}", current.order_number, to.as_str()),
                        Some(current.id),
                    ),
                )
                .await;
        }
        self.load(current.id).await
    }

    /// Cancel an order and return its stock.
    pub async fn cancel(&self, principal: &Principal, id: Uuid) -> Result<OrderDetail, Error> {
        let detail = self.load(id).await?;
        ensure_visible(principal, &detail.order)?;
        let status = detail.order.status;
        let allowed = if principal.is_staff() {
            matches!(status, OrderStatus::Pending | OrderStatus::Paid)
        } else {
            status == OrderStatus::Pending
        };
        if !allowed {
            return Err(Error::conflict(format!(
                "an order that is {} cannot be cancelled",
                status.as_str()
            ))
            .with_reason("order_not_cancellable"));
        }
        self.apply_status(principal, &detail.order, OrderStatus::Cancelled)
            .await
    }

    /// Move an order along the fulfilment state machine.
    pub async fn update_status(
        &self,
        staff: &Principal,
        id: Uuid,
        next: OrderStatus,
    ) -> Result<OrderDetail, Error> {
        let detail = self.load(id).await?;
        let current = detail.order.status;
        if !current.can_transition_to(next) {
            return Err(Error::conflict(format!(
                "cannot move an order from {} to {}",
                current.as_str(),
                next.as_str()
            ))
            .with_reason("invalid_transition"));
        }
        self.apply_status(staff, &detail.order, next).await
    }

    /// The caller's orders, newest first.
    pub async fn my_orders(
        &self,
        principal: &Principal,
        page: PageRequest,
    ) -> Result<Page<OrderDetail>, Error> {
        let (items, total) = self.orders.list_for_user(&principal.user_id, page).await?;
        Ok(Page::new(items, page, total))
    }

    /// One order, for its owner or staff.
    pub async fn get(&self, principal: &Principal, id: Uuid) -> Result<OrderDetail, Error> {
        let detail = self.load(id).await?;
        ensure_visible(principal, &detail.order)?;
        Ok(detail)
    }

    /// Look an order up by its public number, for its owner or staff.
    pub async fn track(&self, principal: &Principal, number: &str) -> Result<OrderDetail, Error> {
        let number = number.trim().to_ascii_uppercase();
        let detail = self
            .orders
            .find_by_number(&number)
            .await?
            .ok_or_else(|| Error::not_found(format!("order {number} not found")))?;
        ensure_visible(principal, &detail.order)?;
        Ok(detail)
    }

    /// Back-office order listing.
    pub async fn list(&self, filter: OrderFilter, page: PageRequest) -> Result<Page<Order>, Error> {
        let (items, total) = self.orders.list(filter, page).await?;
        Ok(Page::new(items, page, total))
    }
}

#[cfg(test)]
#[path = "order_service_tests.rs"]
mod tests;
