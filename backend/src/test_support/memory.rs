//! One in-memory store implementing every repository port.
//!
//! All tables sit behind a single mutex, so multi-table operations such as
//! order placement are atomic in the same way the PostgreSQL transactions
//! are. Constraint checks mirror the schema's unique and foreign keys.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use pagination::PageRequest;
use uuid::Uuid;

use crate::domain::ports::{
    CatalogueRepository, CatalogueRepositoryError, DiscountRepository, DiscountRepositoryError,
    ExpenseRepository, ExpenseRepositoryError, NotificationRepository,
    NotificationRepositoryError, OrderRepository, OrderRepositoryError, PaymentRepository,
    PaymentRepositoryError, PaymentSettlement, SessionRepository, SessionRepositoryError,
    StatusChange, StockRepository, StockRepositoryError, UserRepository, UserRepositoryError,
};
use crate::domain::{
    AuthSession, Category, CategoryTotal, Discount, EmailAddress, Expense, ExpenseCategory,
    ExpenseFilter, LowStockItem, MovementKind, Notification, Order, OrderDetail, OrderFilter,
    OrderItem, OrderPlacement, OrderStatus, Payment, PaymentState, PaymentStatus, Product,
    ProductDetail, ProductFilter, ProductRemoval, Role, SellableVariant, StockMovement, User,
    UserId, Variant, crossed_low_threshold,
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<AuthSession>,
    categories: Vec<Category>,
    products: Vec<Product>,
    variants: Vec<Variant>,
    movements: Vec<StockMovement>,
    discounts: Vec<Discount>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    payments: Vec<Payment>,
    notifications: Vec<Notification>,
    expense_categories: Vec<ExpenseCategory>,
    expenses: Vec<Expense>,
}

/// Shared in-memory tables.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

fn page_of<T>(items: Vec<T>, page: PageRequest) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(usize::MAX);
    (items.into_iter().skip(offset).take(limit).collect(), total)
}

/// Newest first; rows created at the same instant keep reverse insertion order.
fn newest_first<T: Clone>(rows: &[T], created_at: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    let mut sorted: Vec<T> = rows.iter().rev().cloned().collect();
    sorted.sort_by_key(|row| std::cmp::Reverse(created_at(row)));
    sorted
}

impl InMemoryStore {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace an account directly.
    pub fn put_user(&self, user: User) {
        let mut tables = self.lock();
        tables.users.retain(|existing| existing.id != user.id);
        tables.users.push(user);
    }

    /// Account by email, bypassing the port.
    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.lock()
            .users
            .iter()
            .find(|user| user.email.as_str() == email)
            .cloned()
    }

    /// Current stock level of a variant.
    pub fn stock_of(&self, variant_id: Uuid) -> Option<i32> {
        self.lock()
            .variants
            .iter()
            .find(|variant| variant.id == variant_id)
            .map(|variant| variant.stock_quantity)
    }

    /// Every stored session.
    pub fn sessions(&self) -> Vec<AuthSession> {
        self.lock().sessions.clone()
    }

    /// Every stored payment.
    pub fn payments(&self) -> Vec<Payment> {
        self.lock().payments.clone()
    }

    /// Notifications addressed to one account, oldest first.
    pub fn notifications_for(&self, recipient: &UserId) -> Vec<Notification> {
        self.lock()
            .notifications
            .iter()
            .filter(|n| &n.recipient_id == recipient)
            .cloned()
            .collect()
    }
}

impl Tables {
    fn details(&self, orders: Vec<Order>) -> Vec<OrderDetail> {
        orders
            .into_iter()
            .map(|order| {
                let mut items: Vec<OrderItem> = self
                    .order_items
                    .iter()
                    .filter(|item| item.order_id == order.id)
                    .cloned()
                    .collect();
                items.sort_by(|a, b| (&a.product_name, &a.sku).cmp(&(&b.product_name, &b.sku)));
                OrderDetail { order, items }
            })
            .collect()
    }

    fn product_detail(&self, product: &Product) -> ProductDetail {
        let mut variants: Vec<Variant> = self
            .variants
            .iter()
            .filter(|variant| variant.product_id == product.id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.sku.cmp(&b.sku));
        ProductDetail::new(product.clone(), variants)
    }

    fn variant_sold(&self, variant_id: Uuid) -> bool {
        self.order_items
            .iter()
            .any(|item| item.variant_id == variant_id)
    }

    fn move_stock(&mut self, movement: StockMovement) {
        if let Some(variant) = self
            .variants
            .iter_mut()
            .find(|variant| variant.id == movement.variant_id)
        {
            variant.stock_quantity = movement.quantity_after;
        }
        self.movements.push(movement);
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut tables = self.lock();
        if tables.users.iter().any(|existing| existing.email == user.email) {
            return Err(UserRepositoryError::duplicate_email(user.email.as_str()));
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserRepositoryError> {
        Ok(self.lock().users.iter().find(|user| &user.id == id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<User>, UserRepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| &user.email == email)
            .cloned())
    }

    async fn find_by_verification_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<User>, UserRepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|user| user.verification_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn update(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut tables = self.lock();
        if tables
            .users
            .iter()
            .any(|existing| existing.id != user.id && existing.email == user.email)
        {
            return Err(UserRepositoryError::duplicate_email(user.email.as_str()));
        }
        if let Some(existing) = tables.users.iter_mut().find(|existing| existing.id == user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn list(
        &self,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<(Vec<User>, u64), UserRepositoryError> {
        let tables = self.lock();
        let matching: Vec<User> = newest_first(&tables.users, |user| user.created_at)
            .into_iter()
            .filter(|user| role.is_none_or(|role| user.role == role))
            .collect();
        Ok(page_of(matching, page))
    }

    async fn delete(&self, id: &UserId) -> Result<bool, UserRepositoryError> {
        let mut tables = self.lock();
        if !tables.users.iter().any(|user| &user.id == id) {
            return Ok(false);
        }
        let referenced = tables.orders.iter().any(|order| order.user_id.as_ref() == Some(id))
            || tables.expenses.iter().any(|expense| &expense.recorded_by == id);
        if referenced {
            return Err(UserRepositoryError::in_use());
        }
        tables.users.retain(|user| &user.id != id);
        tables.sessions.retain(|session| &session.user_id != id);
        tables
            .notifications
            .retain(|notification| &notification.recipient_id != id);
        for movement in &mut tables.movements {
            if movement.performed_by.as_ref() == Some(id) {
                movement.performed_by = None;
            }
        }
        Ok(true)
    }

    async fn staff_ids(&self) -> Result<Vec<UserId>, UserRepositoryError> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|user| user.role.is_staff())
            .map(|user| user.id)
            .collect())
    }

    async fn delete_lapsed_unverified(
        &self,
        now: DateTime<Utc>,
    ) -> Result<u64, UserRepositoryError> {
        let mut tables = self.lock();
        let with_orders: Vec<UserId> = tables.orders.iter().filter_map(|o| o.user_id).collect();
        let before = tables.users.len();
        tables.users.retain(|user| {
            let lapsed = !user.is_verified
                && user.role == Role::Customer
                && user.verification_expires_at.is_some_and(|at| at < now)
                && !with_orders.contains(&user.id);
            !lapsed
        });
        let deleted = before - tables.users.len();
        let live: Vec<UserId> = tables.users.iter().map(|user| user.id).collect();
        tables.sessions.retain(|session| live.contains(&session.user_id));
        Ok(deleted as u64)
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn create(&self, session: &AuthSession) -> Result<(), SessionRepositoryError> {
        self.lock().sessions.push(session.clone());
        Ok(())
    }

    async fn find_by_access_hash(
        &self,
        access_hash: &str,
    ) -> Result<Option<AuthSession>, SessionRepositoryError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|session| session.access_token_hash == access_hash)
            .cloned())
    }

    async fn find_by_refresh_hash(
        &self,
        refresh_hash: &str,
    ) -> Result<Option<AuthSession>, SessionRepositoryError> {
        Ok(self
            .lock()
            .sessions
            .iter()
            .find(|session| session.refresh_token_hash == refresh_hash)
            .cloned())
    }

    async fn rotate(
        &self,
        session: &AuthSession,
        previous_refresh_hash: &str,
    ) -> Result<bool, SessionRepositoryError> {
        let mut tables = self.lock();
        let Some(stored) = tables.sessions.iter_mut().find(|stored| {
            stored.id == session.id
                && stored.refresh_token_hash == previous_refresh_hash
                && stored.revoked_at.is_none()
        }) else {
            return Ok(false);
        };
        stored.access_token_hash.clone_from(&session.access_token_hash);
        stored.refresh_token_hash.clone_from(&session.refresh_token_hash);
        stored.access_expires_at = session.access_expires_at;
        stored.refresh_expires_at = session.refresh_expires_at;
        Ok(true)
    }

    async fn revoke(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), SessionRepositoryError> {
        let mut tables = self.lock();
        if let Some(session) = tables
            .sessions
            .iter_mut()
            .find(|session| session.id == id && session.revoked_at.is_none())
        {
            session.revoked_at = Some(at);
        }
        Ok(())
    }

    async fn revoke_others(
        &self,
        user_id: &UserId,
        keep: Uuid,
        at: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError> {
        let mut revoked = 0;
        for session in &mut self.lock().sessions {
            if &session.user_id == user_id && session.id != keep && session.revoked_at.is_none() {
                session.revoked_at = Some(at);
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn purge(
        &self,
        now: DateTime<Utc>,
        revoked_before: DateTime<Utc>,
    ) -> Result<u64, SessionRepositoryError> {
        let mut tables = self.lock();
        let before = tables.sessions.len();
        tables.sessions.retain(|session| {
            session.refresh_expires_at >= now
                && session.revoked_at.is_none_or(|at| at >= revoked_before)
        });
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl CatalogueRepository for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, CatalogueRepositoryError> {
        let mut categories = self.lock().categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<Category>, CatalogueRepositoryError> {
        Ok(self.lock().categories.iter().find(|c| c.id == id).cloned())
    }

    async fn category_slug_taken(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, CatalogueRepositoryError> {
        Ok(self
            .lock()
            .categories
            .iter()
            .any(|c| c.slug == slug && Some(c.id) != except))
    }

    async fn insert_category(&self, category: &Category) -> Result<(), CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables.categories.iter().any(|c| c.slug == category.slug) {
            return Err(CatalogueRepositoryError::duplicate_slug(category.slug.as_str()));
        }
        tables.categories.push(category.clone());
        Ok(())
    }

    async fn update_category(
        &self,
        category: &Category,
    ) -> Result<bool, CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables
            .categories
            .iter()
            .any(|c| c.slug == category.slug && c.id != category.id)
        {
            return Err(CatalogueRepositoryError::duplicate_slug(category.slug.as_str()));
        }
        let Some(stored) = tables.categories.iter_mut().find(|c| c.id == category.id) else {
            return Ok(false);
        };
        *stored = category.clone();
        Ok(true)
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables.products.iter().any(|p| p.category_id == Some(id)) {
            return Err(CatalogueRepositoryError::category_in_use());
        }
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        Ok(tables.categories.len() < before)
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> Result<(Vec<ProductDetail>, u64), CatalogueRepositoryError> {
        let tables = self.lock();
        let category_id = match filter.category_slug.as_deref() {
            Some(slug) => match tables.categories.iter().find(|c| c.slug == slug) {
                Some(category) => Some(category.id),
                None => return Ok((Vec::new(), 0)),
            },
            None => None,
        };
        let needle = filter.search.as_deref().map(str::to_lowercase);
        let matching: Vec<ProductDetail> = newest_first(&tables.products, |p| p.created_at)
            .into_iter()
            .filter(|p| filter.include_inactive || p.is_active)
            .filter(|p| category_id.is_none() || p.category_id == category_id)
            .filter(|p| {
                needle.as_deref().is_none_or(|needle| {
                    p.name.to_lowercase().contains(needle)
                        || p.description.to_lowercase().contains(needle)
                })
            })
            .filter(|p| filter.min_price.is_none_or(|min| p.base_price >= min))
            .filter(|p| filter.max_price.is_none_or(|max| p.base_price <= max))
            .map(|p| tables.product_detail(&p))
            .collect();
        Ok(page_of(matching, page))
    }

    async fn find_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError> {
        let tables = self.lock();
        Ok(tables
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.product_detail(p)))
    }

    async fn find_product_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<ProductDetail>, CatalogueRepositoryError> {
        let tables = self.lock();
        Ok(tables
            .products
            .iter()
            .find(|p| p.slug == slug)
            .map(|p| tables.product_detail(p)))
    }

    async fn product_slug_taken(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<bool, CatalogueRepositoryError> {
        Ok(self
            .lock()
            .products
            .iter()
            .any(|p| p.slug == slug && Some(p.id) != except))
    }

    async fn insert_product(&self, product: &Product) -> Result<(), CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables.products.iter().any(|p| p.slug == product.slug) {
            return Err(CatalogueRepositoryError::duplicate_slug(product.slug.as_str()));
        }
        if let Some(category_id) = product.category_id {
            if !tables.categories.iter().any(|c| c.id == category_id) {
                return Err(CatalogueRepositoryError::missing_parent(category_id));
            }
        }
        tables.products.push(product.clone());
        Ok(())
    }

    async fn update_product(&self, product: &Product) -> Result<bool, CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables
            .products
            .iter()
            .any(|p| p.slug == product.slug && p.id != product.id)
        {
            return Err(CatalogueRepositoryError::duplicate_slug(product.slug.as_str()));
        }
        if let Some(category_id) = product.category_id {
            if !tables.categories.iter().any(|c| c.id == category_id) {
                return Err(CatalogueRepositoryError::missing_parent(category_id));
            }
        }
        let Some(stored) = tables.products.iter_mut().find(|p| p.id == product.id) else {
            return Ok(false);
        };
        *stored = product.clone();
        Ok(true)
    }

    async fn remove_product(
        &self,
        id: Uuid,
    ) -> Result<Option<ProductRemoval>, CatalogueRepositoryError> {
        let mut tables = self.lock();
        if !tables.products.iter().any(|p| p.id == id) {
            return Ok(None);
        }
        let variant_ids: Vec<Uuid> = tables
            .variants
            .iter()
            .filter(|v| v.product_id == id)
            .map(|v| v.id)
            .collect();
        if variant_ids.iter().any(|vid| tables.variant_sold(*vid)) {
            if let Some(product) = tables.products.iter_mut().find(|p| p.id == id) {
                product.is_active = false;
            }
            return Ok(Some(ProductRemoval::Deactivated));
        }
        tables.products.retain(|p| p.id != id);
        tables.variants.retain(|v| v.product_id != id);
        tables
            .movements
            .retain(|m| !variant_ids.contains(&m.variant_id));
        Ok(Some(ProductRemoval::Deleted))
    }

    async fn find_variant(&self, id: Uuid) -> Result<Option<Variant>, CatalogueRepositoryError> {
        Ok(self.lock().variants.iter().find(|v| v.id == id).cloned())
    }

    async fn find_sellable(
        &self,
        ids: &[Uuid],
    ) -> Result<Vec<SellableVariant>, CatalogueRepositoryError> {
        let tables = self.lock();
        Ok(tables
            .variants
            .iter()
            .filter(|v| ids.contains(&v.id))
            .filter_map(|variant| {
                let product = tables.products.iter().find(|p| p.id == variant.product_id)?;
                Some(SellableVariant {
                    variant: variant.clone(),
                    product_name: product.name.clone(),
                    product_slug: product.slug.clone(),
                    base_price: product.base_price,
                    product_active: product.is_active,
                })
            })
            .collect())
    }

    async fn insert_variant(
        &self,
        variant: &Variant,
        opening_stock: Option<StockMovement>,
    ) -> Result<(), CatalogueRepositoryError> {
        let mut tables = self.lock();
        if !tables.products.iter().any(|p| p.id == variant.product_id) {
            return Err(CatalogueRepositoryError::missing_parent(variant.product_id));
        }
        if tables.variants.iter().any(|v| v.sku == variant.sku) {
            return Err(CatalogueRepositoryError::duplicate_sku(variant.sku.as_str()));
        }
        tables.variants.push(variant.clone());
        if let Some(movement) = opening_stock {
            tables.movements.push(movement);
        }
        Ok(())
    }

    async fn update_variant(&self, variant: &Variant) -> Result<bool, CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables
            .variants
            .iter()
            .any(|v| v.sku == variant.sku && v.id != variant.id)
        {
            return Err(CatalogueRepositoryError::duplicate_sku(variant.sku.as_str()));
        }
        let Some(stored) = tables.variants.iter_mut().find(|v| v.id == variant.id) else {
            return Ok(false);
        };
        let stock_quantity = stored.stock_quantity;
        *stored = Variant {
            stock_quantity,
            ..variant.clone()
        };
        Ok(true)
    }

    async fn delete_variant(&self, id: Uuid) -> Result<bool, CatalogueRepositoryError> {
        let mut tables = self.lock();
        if tables.variant_sold(id) {
            return Err(CatalogueRepositoryError::variant_in_use());
        }
        let before = tables.variants.len();
        tables.variants.retain(|v| v.id != id);
        tables.movements.retain(|m| m.variant_id != id);
        Ok(tables.variants.len() < before)
    }
}

#[async_trait]
impl StockRepository for InMemoryStore {
    async fn apply_movement(&self, movement: &StockMovement) -> Result<bool, StockRepositoryError> {
        let mut tables = self.lock();
        let current = tables
            .variants
            .iter()
            .find(|v| v.id == movement.variant_id)
            .map(|v| v.stock_quantity);
        if current != Some(movement.quantity_before) {
            return Ok(false);
        }
        tables.move_stock(movement.clone());
        Ok(true)
    }

    async fn list_movements(
        &self,
        variant_id: Option<Uuid>,
        page: PageRequest,
    ) -> Result<(Vec<StockMovement>, u64), StockRepositoryError> {
        let tables = self.lock();
        let matching: Vec<StockMovement> = newest_first(&tables.movements, |m| m.created_at)
            .into_iter()
            .filter(|m| variant_id.is_none_or(|id| m.variant_id == id))
            .collect();
        Ok(page_of(matching, page))
    }

    async fn low_stock(&self, limit: u32) -> Result<Vec<LowStockItem>, StockRepositoryError> {
        let tables = self.lock();
        let mut items: Vec<LowStockItem> = tables
            .variants
            .iter()
            .filter(|v| v.stock_quantity <= v.low_stock_threshold)
            .filter_map(|v| {
                let product = tables
                    .products
                    .iter()
                    .find(|p| p.id == v.product_id)?;
                Some(LowStockItem {
                    variant_id: v.id,
                    product_id: product.id,
                    product_name: product.name.clone(),
                    sku: v.sku.clone(),
                    stock_quantity: v.stock_quantity,
                    low_stock_threshold: v.low_stock_threshold,
                })
            })
            .collect();
        items.sort_by(|a, b| (a.stock_quantity, &a.sku).cmp(&(b.stock_quantity, &b.sku)));
        items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(items)
    }
}

#[async_trait]
impl DiscountRepository for InMemoryStore {
    async fn list(&self, page: PageRequest) -> Result<(Vec<Discount>, u64), DiscountRepositoryError> {
        let tables = self.lock();
        Ok(page_of(newest_first(&tables.discounts, |d| d.created_at), page))
    }

    async fn find(&self, id: Uuid) -> Result<Option<Discount>, DiscountRepositoryError> {
        Ok(self.lock().discounts.iter().find(|d| d.id == id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Discount>, DiscountRepositoryError> {
        Ok(self.lock().discounts.iter().find(|d| d.code == code).cloned())
    }

    async fn insert(&self, discount: &Discount) -> Result<(), DiscountRepositoryError> {
        let mut tables = self.lock();
        if tables.discounts.iter().any(|d| d.code == discount.code) {
            return Err(DiscountRepositoryError::duplicate_code(discount.code.as_str()));
        }
        tables.discounts.push(discount.clone());
        Ok(())
    }

    async fn update(&self, discount: &Discount) -> Result<bool, DiscountRepositoryError> {
        let mut tables = self.lock();
        if tables
            .discounts
            .iter()
            .any(|d| d.code == discount.code && d.id != discount.id)
        {
            return Err(DiscountRepositoryError::duplicate_code(discount.code.as_str()));
        }
        let Some(stored) = tables.discounts.iter_mut().find(|d| d.id == discount.id) else {
            return Ok(false);
        };
        let times_used = stored.times_used;
        *stored = Discount {
            times_used,
            ..discount.clone()
        };
        Ok(true)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, DiscountRepositoryError> {
        let mut tables = self.lock();
        let before = tables.discounts.len();
        tables.discounts.retain(|d| d.id != id);
        Ok(tables.discounts.len() < before)
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn place(
        &self,
        placement: &OrderPlacement,
    ) -> Result<Vec<LowStockItem>, OrderRepositoryError> {
        let mut tables = self.lock();
        let order = &placement.order;
        if tables
            .orders
            .iter()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(OrderRepositoryError::duplicate_order_number());
        }

        let mut requested: HashMap<Uuid, i32> = HashMap::new();
        for item in &placement.items {
            *requested.entry(item.variant_id).or_default() += item.quantity;
        }
        let mut lines: Vec<(Uuid, i32)> = requested.into_iter().collect();
        lines.sort_by_key(|(id, _)| *id);

        let mut checked = Vec::with_capacity(lines.len());
        for (variant_id, quantity) in lines {
            let Some(variant) = tables.variants.iter().find(|v| v.id == variant_id) else {
                return Err(OrderRepositoryError::unknown_variant(variant_id));
            };
            if variant.stock_quantity < quantity {
                return Err(OrderRepositoryError::insufficient_stock(
                    variant_id,
                    variant.stock_quantity,
                    quantity,
                ));
            }
            checked.push((variant.clone(), quantity));
        }
        if let Some(discount_id) = placement.discount_id {
            let exhausted = tables.discounts.iter().find(|d| d.id == discount_id).is_none_or(
                |d| d.usage_limit.is_some_and(|limit| d.times_used >= limit),
            );
            if exhausted {
                return Err(OrderRepositoryError::discount_exhausted());
            }
        }

        tables.orders.push(order.clone());
        tables.order_items.extend(placement.items.iter().cloned());
        let mut crossed = Vec::new();
        for (variant, quantity) in checked {
            let after = variant.stock_quantity - quantity;
            tables.move_stock(StockMovement {
                id: Uuid::new_v4(),
                variant_id: variant.id,
                kind: MovementKind::Sale,
                quantity_change: -quantity,
                quantity_before: variant.stock_quantity,
                quantity_after: after,
                reason: Some(format!("order {}", order.order_number)),
                order_id: Some(order.id),
                performed_by: placement.performed_by,
                created_at: order.created_at,
            });
            if crossed_low_threshold(variant.stock_quantity, after, variant.low_stock_threshold) {
                let product_name = tables
                    .products
                    .iter()
                    .find(|p| p.id == variant.product_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                crossed.push(LowStockItem {
                    variant_id: variant.id,
                    product_id: variant.product_id,
                    product_name,
                    sku: variant.sku,
                    stock_quantity: after,
                    low_stock_threshold: variant.low_stock_threshold,
                });
            }
        }
        if let Some(discount_id) = placement.discount_id {
            if let Some(discount) = tables.discounts.iter_mut().find(|d| d.id == discount_id) {
                discount.times_used += 1;
            }
        }
        Ok(crossed)
    }

    async fn find(&self, id: Uuid) -> Result<Option<OrderDetail>, OrderRepositoryError> {
        let tables = self.lock();
        let found: Vec<Order> = tables.orders.iter().filter(|o| o.id == id).cloned().collect();
        Ok(tables.details(found).pop())
    }

    async fn find_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<OrderDetail>, OrderRepositoryError> {
        let tables = self.lock();
        let found: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.order_number == order_number)
            .cloned()
            .collect();
        Ok(tables.details(found).pop())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        page: PageRequest,
    ) -> Result<(Vec<OrderDetail>, u64), OrderRepositoryError> {
        let tables = self.lock();
        let own: Vec<Order> = newest_first(&tables.orders, |o| o.created_at)
            .into_iter()
            .filter(|o| o.user_id.as_ref() == Some(user_id))
            .collect();
        let (orders, total) = page_of(own, page);
        Ok((tables.details(orders), total))
    }

    async fn list(
        &self,
        filter: OrderFilter,
        page: PageRequest,
    ) -> Result<(Vec<Order>, u64), OrderRepositoryError> {
        let tables = self.lock();
        let matching: Vec<Order> = newest_first(&tables.orders, |o| o.created_at)
            .into_iter()
            .filter(|o| filter.status.is_none_or(|status| o.status == status))
            .filter(|o| filter.channel.is_none_or(|channel| o.channel == channel))
            .collect();
        Ok(page_of(matching, page))
    }

    async fn change_status(&self, change: StatusChange) -> Result<bool, OrderRepositoryError> {
        let mut tables = self.lock();
        let Some(order) = tables
            .orders
            .iter_mut()
            .find(|o| o.id == change.order_id && o.status == change.from)
        else {
            return Ok(false);
        };
        order.status = change.to;
        if let Some(payment_status) = change.payment_status {
            order.payment_status = payment_status;
        }
        order.updated_at = change.at;
        let order_number = order.order_number.clone();

        if change.to == OrderStatus::Cancelled {
            let mut returned: HashMap<Uuid, i32> = HashMap::new();
            for item in tables.order_items.iter().filter(|i| i.order_id == change.order_id) {
                *returned.entry(item.variant_id).or_default() += item.quantity;
            }
            let mut returned: Vec<(Uuid, i32)> = returned.into_iter().collect();
            returned.sort_by_key(|(id, _)| *id);
            for (variant_id, quantity) in returned {
                let Some(before) = tables
                    .variants
                    .iter()
                    .find(|v| v.id == variant_id)
                    .map(|v| v.stock_quantity)
                else {
                    continue;
                };
                tables.move_stock(StockMovement {
                    id: Uuid::new_v4(),
                    variant_id,
                    kind: MovementKind::Return,
                    quantity_change: quantity,
                    quantity_before: before,
                    quantity_after: before + quantity,
                    reason: Some(format!("order {order_number} cancelled")),
                    order_id: Some(change.order_id),
                    performed_by: change.performed_by,
                    created_at: change.at,
                });
            }
        }
        Ok(true)
    }

    async fn set_payment_status(
        &self,
        order_id: Uuid,
        payment_status: PaymentStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, OrderRepositoryError> {
        let mut tables = self.lock();
        let Some(order) = tables.orders.iter_mut().find(|o| o.id == order_id) else {
            return Ok(false);
        };
        order.payment_status = payment_status;
        order.updated_at = at;
        Ok(true)
    }

    async fn created_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderDetail>, OrderRepositoryError> {
        let tables = self.lock();
        let mut window: Vec<Order> = tables
            .orders
            .iter()
            .filter(|o| o.created_at >= from && o.created_at < to)
            .cloned()
            .collect();
        window.sort_by_key(|o| o.created_at);
        Ok(tables.details(window))
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentRepositoryError> {
        let mut tables = self.lock();
        if tables
            .payments
            .iter()
            .any(|p| p.checkout_request_id == payment.checkout_request_id)
        {
            return Err(PaymentRepositoryError::duplicate_checkout(
                payment.checkout_request_id.as_str(),
            ));
        }
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn find_by_checkout_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Payment>, PaymentRepositoryError> {
        Ok(self
            .lock()
            .payments
            .iter()
            .find(|p| p.checkout_request_id == checkout_request_id)
            .cloned())
    }

    async fn settle(
        &self,
        checkout_request_id: &str,
        settlement: &PaymentSettlement,
    ) -> Result<Option<Payment>, PaymentRepositoryError> {
        let mut tables = self.lock();
        let Some(payment) = tables.payments.iter_mut().find(|p| {
            p.checkout_request_id == checkout_request_id && p.status == PaymentState::Pending
        }) else {
            return Ok(None);
        };
        payment.status = settlement.status;
        payment.result_code = Some(settlement.result_code);
        payment.result_description = Some(settlement.result_description.clone());
        payment.receipt_number.clone_from(&settlement.receipt_number);
        payment.updated_at = settlement.at;
        Ok(Some(payment.clone()))
    }

    async fn latest_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<Payment>, PaymentRepositoryError> {
        let tables = self.lock();
        Ok(newest_first(&tables.payments, |p| p.created_at)
            .into_iter()
            .find(|p| p.order_id == order_id))
    }
}

#[async_trait]
impl NotificationRepository for InMemoryStore {
    async fn insert_many(
        &self,
        notifications: &[Notification],
    ) -> Result<(), NotificationRepositoryError> {
        self.lock()
            .notifications
            .extend(notifications.iter().cloned());
        Ok(())
    }

    async fn list(
        &self,
        recipient_id: &UserId,
        unread_only: bool,
        page: PageRequest,
    ) -> Result<(Vec<Notification>, u64), NotificationRepositoryError> {
        let tables = self.lock();
        let own: Vec<Notification> = newest_first(&tables.notifications, |n| n.created_at)
            .into_iter()
            .filter(|n| &n.recipient_id == recipient_id)
            .filter(|n| !unread_only || !n.is_read)
            .collect();
        Ok(page_of(own, page))
    }

    async fn mark_read(
        &self,
        recipient_id: &UserId,
        id: Uuid,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut tables = self.lock();
        let Some(notification) = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == id && &n.recipient_id == recipient_id)
        else {
            return Ok(false);
        };
        notification.is_read = true;
        Ok(true)
    }

    async fn mark_all_read(
        &self,
        recipient_id: &UserId,
    ) -> Result<u64, NotificationRepositoryError> {
        let mut marked = 0;
        for notification in &mut self.lock().notifications {
            if &notification.recipient_id == recipient_id && !notification.is_read {
                notification.is_read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn unread_count(&self, recipient_id: &UserId) -> Result<u64, NotificationRepositoryError> {
        Ok(self
            .lock()
            .notifications
            .iter()
            .filter(|n| &n.recipient_id == recipient_id && !n.is_read)
            .count() as u64)
    }
}

#[async_trait]
impl ExpenseRepository for InMemoryStore {
    async fn list_categories(&self) -> Result<Vec<ExpenseCategory>, ExpenseRepositoryError> {
        let mut categories = self.lock().expense_categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn insert_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<(), ExpenseRepositoryError> {
        let mut tables = self.lock();
        if tables.expense_categories.iter().any(|c| c.name == category.name) {
            return Err(ExpenseRepositoryError::duplicate_category(category.name.as_str()));
        }
        tables.expense_categories.push(category.clone());
        Ok(())
    }

    async fn update_category(
        &self,
        category: &ExpenseCategory,
    ) -> Result<bool, ExpenseRepositoryError> {
        let mut tables = self.lock();
        if tables
            .expense_categories
            .iter()
            .any(|c| c.name == category.name && c.id != category.id)
        {
            return Err(ExpenseRepositoryError::duplicate_category(category.name.as_str()));
        }
        let Some(stored) = tables
            .expense_categories
            .iter_mut()
            .find(|c| c.id == category.id)
        else {
            return Ok(false);
        };
        *stored = category.clone();
        Ok(true)
    }

    async fn delete_category(&self, id: Uuid) -> Result<bool, ExpenseRepositoryError> {
        let mut tables = self.lock();
        if tables.expenses.iter().any(|e| e.category_id == id) {
            return Err(ExpenseRepositoryError::category_in_use());
        }
        let before = tables.expense_categories.len();
        tables.expense_categories.retain(|c| c.id != id);
        Ok(tables.expense_categories.len() < before)
    }

    async fn list_expenses(
        &self,
        filter: ExpenseFilter,
        page: PageRequest,
    ) -> Result<(Vec<Expense>, u64), ExpenseRepositoryError> {
        let tables = self.lock();
        let mut matching: Vec<Expense> = newest_first(&tables.expenses, |e| e.created_at)
            .into_iter()
            .filter(|e| filter.from.is_none_or(|from| e.incurred_on >= from))
            .filter(|e| filter.to.is_none_or(|to| e.incurred_on <= to))
            .filter(|e| filter.category_id.is_none_or(|id| e.category_id == id))
            .collect();
        matching.sort_by_key(|e| std::cmp::Reverse(e.incurred_on));
        Ok(page_of(matching, page))
    }

    async fn find_expense(&self, id: Uuid) -> Result<Option<Expense>, ExpenseRepositoryError> {
        Ok(self.lock().expenses.iter().find(|e| e.id == id).cloned())
    }

    async fn insert_expense(&self, expense: &Expense) -> Result<(), ExpenseRepositoryError> {
        let mut tables = self.lock();
        if !tables
            .expense_categories
            .iter()
            .any(|c| c.id == expense.category_id)
        {
            return Err(ExpenseRepositoryError::unknown_category(expense.category_id));
        }
        tables.expenses.push(expense.clone());
        Ok(())
    }

    async fn update_expense(&self, expense: &Expense) -> Result<bool, ExpenseRepositoryError> {
        let mut tables = self.lock();
        if !tables
            .expense_categories
            .iter()
            .any(|c| c.id == expense.category_id)
        {
            return Err(ExpenseRepositoryError::unknown_category(expense.category_id));
        }
        let Some(stored) = tables.expenses.iter_mut().find(|e| e.id == expense.id) else {
            return Ok(false);
        };
        stored.category_id = expense.category_id;
        stored.amount = expense.amount;
        stored.description.clone_from(&expense.description);
        stored.incurred_on = expense.incurred_on;
        Ok(true)
    }

    async fn delete_expense(&self, id: Uuid) -> Result<bool, ExpenseRepositoryError> {
        let mut tables = self.lock();
        let before = tables.expenses.len();
        tables.expenses.retain(|e| e.id != id);
        Ok(tables.expenses.len() < before)
    }

    async fn totals_by_category(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<CategoryTotal>, ExpenseRepositoryError> {
        let tables = self.lock();
        let mut totals: Vec<CategoryTotal> = tables
            .expense_categories
            .iter()
            .filter_map(|category| {
                let spent: Vec<i64> = tables
                    .expenses
                    .iter()
                    .filter(|e| e.category_id == category.id)
                    .filter(|e| e.incurred_on >= from && e.incurred_on <= to)
                    .map(|e| e.amount)
                    .collect();
                (!spent.is_empty()).then(|| CategoryTotal {
                    category_id: category.id,
                    name: category.name.clone(),
                    total: spent.iter().sum(),
                })
            })
            .collect();
        totals.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(totals)
    }
}
