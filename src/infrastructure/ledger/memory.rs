//! In-process stock ledger
//!
//! Gives the same isolation guarantees the strategies rely on from PostgreSQL:
//!
//! - every product row carries an async exclusive lock. A unit of work takes it
//!   on `read_quantity_for_update` or on its first write to the row and keeps
//!   it until commit or rollback, and autocommit writes wait for it too.
//! - writes made inside a unit are staged and only become visible on commit.
//! - plain reads see committed state only and never wait for a lock.
//!
//! Faults can be injected per operation so that rollback and compensation
//! paths can be driven deterministically.

use super::{LedgerError, LedgerUnit, StockLedger};
use crate::domain::{NewProduct, Order, OrderStatus, Product, ProductId, UserId};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

/// Ledger operation that can be made to fail on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerFault {
    Begin,
    Read,
    LockForUpdate,
    Decrement,
    InsertOrder,
    Commit,
}

struct ProductSlot {
    row_lock: Arc<tokio::sync::Mutex<()>>,
    product: Mutex<Product>,
}

struct LedgerState {
    products: RwLock<BTreeMap<ProductId, Arc<ProductSlot>>>,
    orders: Mutex<Vec<Order>>,
    next_product_id: AtomicI32,
    next_order_id: AtomicI64,
    faults: Mutex<HashSet<LedgerFault>>,
}

impl LedgerState {
    fn slot(&self, product_id: ProductId) -> Result<Arc<ProductSlot>, LedgerError> {
        self.products
            .read()
            .get(&product_id)
            .cloned()
            .ok_or(LedgerError::ProductNotFound(product_id))
    }

    fn check(&self, fault: LedgerFault) -> Result<(), LedgerError> {
        if self.faults.lock().contains(&fault) {
            Err(LedgerError::Unavailable(format!("injected {fault:?} fault")))
        } else {
            Ok(())
        }
    }

    fn append_order(&self, user_id: UserId, product_id: ProductId, status: OrderStatus) {
        let order = Order {
            id: self.next_order_id.fetch_add(1, Ordering::SeqCst),
            user_id,
            product_id,
            status,
            created_at: Utc::now(),
        };
        self.orders.lock().push(order);
    }
}

/// Stock ledger held entirely in process memory
///
/// Cloning is cheap and every clone shares the same rows.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<LedgerState>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: Arc::new(LedgerState {
                products: RwLock::new(BTreeMap::new()),
                orders: Mutex::new(Vec::new()),
                next_product_id: AtomicI32::new(1),
                next_order_id: AtomicI64::new(1),
                faults: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Insert a product row unconditionally and return its id
    pub fn insert_product(&self, product: &NewProduct) -> Result<ProductId, LedgerError> {
        let raw_id = self.state.next_product_id.fetch_add(1, Ordering::SeqCst);
        let id = ProductId::try_new(raw_id)
            .map_err(|e| LedgerError::CorruptRow(format!("product id {raw_id}: {e}")))?;

        let slot = ProductSlot {
            row_lock: Arc::new(tokio::sync::Mutex::new(())),
            product: Mutex::new(Product {
                id,
                name: product.name.clone(),
                price: product.price,
                quantity: product.quantity,
            }),
        };
        self.state.products.write().insert(id, Arc::new(slot));
        Ok(id)
    }

    /// Make every subsequent call of `fault`'s operation fail until cleared
    pub fn inject_fault(&self, fault: LedgerFault) {
        self.state.faults.lock().insert(fault);
    }

    pub fn clear_fault(&self, fault: LedgerFault) {
        self.state.faults.lock().remove(&fault);
    }

    pub fn clear_faults(&self) {
        self.state.faults.lock().clear();
    }
}

struct InMemoryUnit {
    state: Arc<LedgerState>,
    locks: HashMap<ProductId, OwnedMutexGuard<()>>,
    deltas: HashMap<ProductId, i64>,
    orders: Vec<(UserId, ProductId, OrderStatus)>,
}

impl InMemoryUnit {
    async fn lock_row(&mut self, product_id: ProductId) -> Result<Arc<ProductSlot>, LedgerError> {
        let slot = self.state.slot(product_id)?;
        if !self.locks.contains_key(&product_id) {
            let guard = Arc::clone(&slot.row_lock).lock_owned().await;
            self.locks.insert(product_id, guard);
        }
        Ok(slot)
    }

    fn visible_quantity(&self, slot: &ProductSlot, product_id: ProductId) -> i64 {
        let committed = slot.product.lock().quantity;
        committed + self.deltas.get(&product_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl LedgerUnit for InMemoryUnit {
    async fn read_quantity_for_update(&mut self, product_id: ProductId) -> Result<i64, LedgerError> {
        self.state.check(LedgerFault::LockForUpdate)?;
        let slot = self.lock_row(product_id).await?;
        Ok(self.visible_quantity(&slot, product_id))
    }

    async fn decrement_quantity(&mut self, product_id: ProductId) -> Result<i64, LedgerError> {
        self.state.check(LedgerFault::Decrement)?;
        // An UPDATE takes the row lock implicitly
        let slot = self.lock_row(product_id).await?;
        *self.deltas.entry(product_id).or_insert(0) -= 1;
        Ok(self.visible_quantity(&slot, product_id))
    }

    async fn insert_order(
        &mut self,
        user_id: UserId,
        product_id: ProductId,
        status: OrderStatus,
    ) -> Result<(), LedgerError> {
        self.state.check(LedgerFault::InsertOrder)?;
        self.state.slot(product_id)?;
        self.orders.push((user_id, product_id, status));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), LedgerError> {
        self.state.check(LedgerFault::Commit)?;

        let unit = *self;
        for (product_id, delta) in &unit.deltas {
            let slot = unit.state.slot(*product_id)?;
            slot.product.lock().quantity += delta;
        }
        for (user_id, product_id, status) in unit.orders {
            unit.state.append_order(user_id, product_id, status);
        }
        // Row locks are released only after the writes above are visible
        drop(unit.locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[async_trait]
impl StockLedger for InMemoryLedger {
    async fn begin_unit(&self) -> Result<Box<dyn LedgerUnit>, LedgerError> {
        self.state.check(LedgerFault::Begin)?;
        Ok(Box::new(InMemoryUnit {
            state: Arc::clone(&self.state),
            locks: HashMap::new(),
            deltas: HashMap::new(),
            orders: Vec::new(),
        }))
    }

    async fn read_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        self.state.check(LedgerFault::Read)?;
        let slot = self.state.slot(product_id)?;
        let quantity = slot.product.lock().quantity;
        Ok(quantity)
    }

    async fn decrement_quantity(&self, product_id: ProductId) -> Result<i64, LedgerError> {
        self.state.check(LedgerFault::Decrement)?;
        let slot = self.state.slot(product_id)?;
        let _row = slot.row_lock.lock().await;
        let mut product = slot.product.lock();
        product.quantity -= 1;
        Ok(product.quantity)
    }

    async fn insert_order(
        &self,
        user_id: UserId,
        product_id: ProductId,
        status: OrderStatus,
    ) -> Result<(), LedgerError> {
        self.state.check(LedgerFault::InsertOrder)?;
        self.state.slot(product_id)?;
        self.state.append_order(user_id, product_id, status);
        Ok(())
    }

    async fn reset_inventory(
        &self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<(), LedgerError> {
        let slot = self.state.slot(product_id)?;
        let _row = slot.row_lock.lock().await;
        slot.product.lock().quantity = quantity;
        self.state.orders.lock().clear();
        Ok(())
    }

    async fn count_orders(&self, status: OrderStatus) -> Result<i64, LedgerError> {
        let count = self
            .state
            .orders
            .lock()
            .iter()
            .filter(|order| order.status == status)
            .count();
        i64::try_from(count).map_err(|e| LedgerError::CorruptRow(e.to_string()))
    }

    async fn list_products(&self) -> Result<Vec<Product>, LedgerError> {
        let products = self
            .state
            .products
            .read()
            .values()
            .map(|slot| slot.product.lock().clone())
            .collect();
        Ok(products)
    }

    async fn recent_orders(&self, limit: i64) -> Result<Vec<Order>, LedgerError> {
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        let orders = self
            .state
            .orders
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect();
        Ok(orders)
    }

    async fn seed_if_empty(&self, product: &NewProduct) -> Result<Option<ProductId>, LedgerError> {
        if !self.state.products.read().is_empty() {
            return Ok(None);
        }
        self.insert_product(product).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn user(id: i32) -> UserId {
        UserId::try_new(id).expect("valid user id")
    }

    fn seeded(quantity: i64) -> (InMemoryLedger, ProductId) {
        let ledger = InMemoryLedger::new();
        let id = ledger
            .insert_product(&NewProduct::flash_sale_item(quantity))
            .expect("insert product");
        (ledger, id)
    }

    #[tokio::test]
    async fn test_commit_applies_staged_writes() {
        let (ledger, product) = seeded(10);

        let mut unit = ledger.begin_unit().await.expect("begin");
        assert_eq!(unit.read_quantity_for_update(product).await.expect("read"), 10);
        assert_eq!(unit.decrement_quantity(product).await.expect("decrement"), 9);
        unit.insert_order(user(1), product, OrderStatus::Success)
            .await
            .expect("insert");

        // Nothing is visible outside the unit before commit
        assert_eq!(ledger.read_quantity(product).await.expect("read"), 10);
        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 0);

        unit.commit().await.expect("commit");

        assert_eq!(ledger.read_quantity(product).await.expect("read"), 9);
        assert_eq!(ledger.count_orders(OrderStatus::Success).await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard_staged_writes() {
        let (ledger, product) = seeded(10);

        let mut unit = ledger.begin_unit().await.expect("begin");
        unit.decrement_quantity(product).await.expect("decrement");
        unit.rollback().await.expect("rollback");

        let mut unit = ledger.begin_unit().await.expect("begin");
        unit.decrement_quantity(product).await.expect("decrement");
        drop(unit);

        assert_eq!(ledger.read_quantity(product).await.expect("read"), 10);
    }

    #[tokio::test]
    async fn test_row_lock_blocks_second_unit_until_commit() {
        let (ledger, product) = seeded(1);

        let mut first = ledger.begin_unit().await.expect("begin");
        first.read_quantity_for_update(product).await.expect("lock");

        let contender = ledger.clone();
        let waiter = tokio::spawn(async move {
            let mut second = contender.begin_unit().await.expect("begin");
            second.read_quantity_for_update(product).await.expect("lock")
        });

        // The contender must still be parked on the row lock
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        first.decrement_quantity(product).await.expect("decrement");
        first.commit().await.expect("commit");

        let seen = waiter.await.expect("join");
        assert_eq!(seen, 0, "second unit must observe the committed decrement");
    }

    #[tokio::test]
    async fn test_plain_read_does_not_wait_for_row_lock() {
        let (ledger, product) = seeded(3);

        let mut unit = ledger.begin_unit().await.expect("begin");
        unit.read_quantity_for_update(product).await.expect("lock");

        let quantity = tokio::time::timeout(Duration::from_millis(50), ledger.read_quantity(product))
            .await
            .expect("plain read must not block")
            .expect("read");
        assert_eq!(quantity, 3);
    }

    #[tokio::test]
    async fn test_injected_fault_fails_only_its_operation() {
        let (ledger, product) = seeded(5);
        ledger.inject_fault(LedgerFault::Commit);

        let mut unit = ledger.begin_unit().await.expect("begin");
        unit.decrement_quantity(product).await.expect("decrement");
        assert!(matches!(unit.commit().await, Err(LedgerError::Unavailable(_))));
        assert_eq!(ledger.read_quantity(product).await.expect("read"), 5);

        ledger.clear_faults();
        let unit = ledger.begin_unit().await.expect("begin");
        unit.commit().await.expect("commit succeeds once cleared");
    }

    #[tokio::test]
    async fn test_unknown_product_is_reported() {
        let ledger = InMemoryLedger::new();
        let missing = ProductId::try_new(99).expect("valid id");
        assert!(matches!(
            ledger.read_quantity(missing).await,
            Err(LedgerError::ProductNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_is_idempotent_and_reset_clears_orders() {
        let ledger = InMemoryLedger::new();
        let first = ledger
            .seed_if_empty(&NewProduct::flash_sale_item(100))
            .await
            .expect("seed");
        let second = ledger
            .seed_if_empty(&NewProduct::flash_sale_item(100))
            .await
            .expect("seed");
        let product = first.expect("first seed inserts");
        assert!(second.is_none());
        assert_eq!(ledger.list_products().await.expect("list").len(), 1);

        ledger.decrement_quantity(product).await.expect("decrement");
        ledger
            .insert_order(user(3), product, OrderStatus::Success)
            .await
            .expect("insert");
        ledger.reset_inventory(product, 100).await.expect("reset");

        assert_eq!(ledger.read_quantity(product).await.expect("read"), 100);
        assert!(ledger.recent_orders(100).await.expect("orders").is_empty());
    }

    #[tokio::test]
    async fn test_recent_orders_are_newest_first() {
        let (ledger, product) = seeded(5);
        for id in 0..3 {
            ledger
                .insert_order(user(id), product, OrderStatus::Success)
                .await
                .expect("insert");
        }

        let orders = ledger.recent_orders(2).await.expect("orders");
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].user_id, user(2));
        assert_eq!(orders[1].user_id, user(1));
    }
}
