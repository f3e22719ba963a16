//! The delta-fragment matrix of one coordinator session
//!
//! The matrix stores the order fragments held at the local node's pool index
//! and cross-combines each insertion with every stored fragment of the
//! opposing side. All share operations here are additive or subtractive, so
//! insertion is CPU-bound and the lock is held for the duration of the call.

use std::collections::HashMap;
use std::sync::Mutex;

use common::types::order::{OrderFragment, OrderId, OrderSide};
use common::types::smpc::DeltaFragment;

use crate::error::SmpcEngineError;

/// The order fragments stored for one side of the book
type SideMap = HashMap<OrderId, OrderFragment>;

/// The mutable state of the matrix
#[derive(Default)]
struct MatrixInner {
    /// The stored buy-side fragments
    buys: SideMap,
    /// The stored sell-side fragments
    sells: SideMap,
}

/// A per-pool, per-epoch store of order fragments that emits the delta
/// fragments of every new (buy, sell) combination exactly once
pub struct DeltaFragmentMatrix {
    /// The share index assigned to the local node for the epoch
    index: u64,
    /// The stored fragments, behind a single lock
    inner: Mutex<MatrixInner>,
}

impl DeltaFragmentMatrix {
    /// Create an empty matrix for the given pool index
    pub fn new(index: u64) -> Self {
        Self { index, inner: Mutex::new(MatrixInner::default()) }
    }

    /// Insert an order fragment, returning the delta fragments produced by
    /// combining it with every stored fragment of the opposing side
    ///
    /// The returned fragments carry no meaningful order; callers treat them
    /// as a set
    pub fn insert(
        &self,
        fragment: &OrderFragment,
    ) -> Result<Vec<DeltaFragment>, SmpcEngineError> {
        if fragment.index != self.index {
            return Err(SmpcEngineError::IndexMismatch(format!(
                "fragment index {} does not match pool index {}",
                fragment.index, self.index,
            )));
        }

        let mut guard = self.inner.lock().expect("matrix lock poisoned");
        let inner = &mut *guard;
        let (own_side, opposing_side) = match fragment.side {
            OrderSide::Buy => (&mut inner.buys, &inner.sells),
            OrderSide::Sell => (&mut inner.sells, &inner.buys),
        };

        if own_side.contains_key(&fragment.order_id) {
            return Err(SmpcEngineError::DuplicateOrderFragment(format!(
                "order fragment {} already stored",
                fragment.order_id,
            )));
        }

        let deltas = opposing_side
            .values()
            .map(|opposing| match fragment.side {
                OrderSide::Buy => DeltaFragment::from_order_fragments(fragment, opposing),
                OrderSide::Sell => DeltaFragment::from_order_fragments(opposing, fragment),
            })
            .collect();
        own_side.insert(fragment.order_id, fragment.clone());

        Ok(deltas)
    }

    /// Erase an order from both sides of the matrix; no delta recomputation
    /// occurs
    pub fn remove(&self, order_id: &OrderId) {
        let mut inner = self.inner.lock().expect("matrix lock poisoned");
        inner.buys.remove(order_id);
        inner.sells.remove(order_id);
    }

    /// The number of stored buy fragments
    pub fn num_buys(&self) -> usize {
        self.inner.lock().expect("matrix lock poisoned").buys.len()
    }

    /// The number of stored sell fragments
    pub fn num_sells(&self) -> usize {
        self.inner.lock().expect("matrix lock poisoned").sells.len()
    }
}
