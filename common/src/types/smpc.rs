//! Delta fragments and reconstructed deltas
//!
//! A delta fragment is the index-wise difference of a buy and a sell order
//! fragment; a delta is the Lagrange reconstruction of at least `k` delta
//! fragments sharing an id. The sign pattern of a delta's fields is the only
//! plaintext the protocol ever reveals about a non-matching pair.

use std::fmt::{self, Display};

use darknode_crypto::fields::to_signed;
use darknode_crypto::shamir::{reconstruct, Share, SharingError};
use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::order::{OrderFragment, OrderId};

/// The unique identifier of a (buy, sell) delta, `SHA-256(buy-id ∥ sell-id)`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeltaId(pub [u8; 32]);

impl DeltaId {
    /// Derive the delta id for a buy and sell order pair
    pub fn new(buy: &OrderId, sell: &OrderId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(buy.0);
        hasher.update(sell.0);
        Self(hasher.finalize().into())
    }
}

impl Display for DeltaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// A share of the pairwise difference of a buy and a sell order fragment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaFragment {
    /// The id of the delta this fragment contributes to
    pub id: DeltaId,
    /// The id of the buy order
    pub buy_order_id: OrderId,
    /// The id of the sell order
    pub sell_order_id: OrderId,
    /// The share index, equal to the common index of the producing order
    /// fragments; fragments at differing indices are not combinable
    pub index: u64,
    /// A share of the token-pair difference
    pub tokens: Share,
    /// A share of the price difference, buy minus sell
    pub price: Share,
    /// A share of the buy volume against the sell minimum
    pub volume: Share,
    /// A share of the sell volume against the buy minimum
    pub min_volume: Share,
}

impl DeltaFragment {
    /// Combine a buy and a sell order fragment held at the same index into a
    /// delta fragment
    ///
    /// The matrix upholds the index invariant before combining; the share
    /// algebra here is purely additive and subtractive
    pub fn from_order_fragments(buy: &OrderFragment, sell: &OrderFragment) -> Self {
        Self {
            id: DeltaId::new(&buy.order_id, &sell.order_id),
            buy_order_id: buy.order_id,
            sell_order_id: sell.order_id,
            index: buy.index,
            tokens: buy.tokens.sub(&sell.tokens),
            price: buy.price.sub(&sell.price),
            volume: buy.volume.sub(&sell.min_volume),
            min_volume: sell.volume.sub(&buy.min_volume),
        }
    }
}

/// The reconstructed plaintext difference of a buy and a sell order, with
/// each field canonicalized to its signed representative
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// The id of the delta
    pub id: DeltaId,
    /// The id of the buy order
    pub buy_order_id: OrderId,
    /// The id of the sell order
    pub sell_order_id: OrderId,
    /// The token-pair difference; zero iff the pairs agree
    pub tokens: BigInt,
    /// The price difference, buy minus sell
    pub price: BigInt,
    /// The buy volume less the sell minimum volume
    pub volume: BigInt,
    /// The sell volume less the buy minimum volume
    pub min_volume: BigInt,
}

impl Delta {
    /// Reconstruct a delta from at least `k` fragments sharing an id
    ///
    /// The caller groups fragments by id; duplicate share indices within the
    /// group are rejected by the interpolation
    pub fn reconstruct_from(fragments: &[DeltaFragment]) -> Result<Delta, SharingError> {
        let first = fragments.first().ok_or(SharingError::NoShares)?;

        let gather = |select: fn(&DeltaFragment) -> &Share| -> Vec<Share> {
            fragments.iter().map(|f| select(f).clone()).collect()
        };

        let tokens = reconstruct(&gather(|f| &f.tokens))?;
        let price = reconstruct(&gather(|f| &f.price))?;
        let volume = reconstruct(&gather(|f| &f.volume))?;
        let min_volume = reconstruct(&gather(|f| &f.min_volume))?;

        Ok(Delta {
            id: first.id,
            buy_order_id: first.buy_order_id,
            sell_order_id: first.sell_order_id,
            tokens: to_signed(&tokens),
            price: to_signed(&price),
            volume: to_signed(&volume),
            min_volume: to_signed(&min_volume),
        })
    }

    /// Whether the delta represents a valid match
    ///
    /// A match requires the token pairs to agree, the sell price to be at
    /// most the buy price, and the volume ranges to overlap in both
    /// directions
    pub fn is_match(&self) -> bool {
        self.tokens.is_zero()
            && self.price >= BigInt::zero()
            && self.volume >= BigInt::zero()
            && self.min_volume >= BigInt::zero()
    }
}

#[cfg(test)]
mod tests {
    use rand::thread_rng;

    use crate::types::epoch::EpochHash;
    use crate::types::order::{Order, OrderKind, OrderSide, TokenPair};

    use super::*;

    /// Construct a plaintext order for the given side and prices
    fn test_order(side: OrderSide, id_byte: u8, price: u64) -> Order {
        Order {
            id: OrderId([id_byte; 32]),
            side,
            kind: OrderKind::Limit,
            expiry: 2_000_000_000,
            tokens: TokenPair::new(1, 2),
            price,
            volume: 10,
            min_volume: 10,
            nonce: 0,
        }
    }

    /// Shard a buy and sell order across five nodes and combine the
    /// fragments index-wise
    fn delta_fragments(buy: &Order, sell: &Order) -> Vec<DeltaFragment> {
        let mut rng = thread_rng();
        let epoch = EpochHash([9u8; 32]);
        let buys = buy.fragment(epoch, 4, 5, &mut rng).unwrap();
        let sells = sell.fragment(epoch, 4, 5, &mut rng).unwrap();

        buys.iter()
            .zip(sells.iter())
            .map(|(b, s)| DeltaFragment::from_order_fragments(b, s))
            .collect()
    }

    /// Two crossing orders reconstruct to an all-zero delta and match
    #[test]
    fn test_crossing_orders_match() {
        let buy = test_order(OrderSide::Buy, 1, 100);
        let sell = test_order(OrderSide::Sell, 2, 100);

        let fragments = delta_fragments(&buy, &sell);
        let delta = Delta::reconstruct_from(&fragments[..4]).unwrap();

        assert!(delta.tokens.is_zero());
        assert!(delta.price.is_zero());
        assert!(delta.volume.is_zero());
        assert!(delta.min_volume.is_zero());
        assert!(delta.is_match());
    }

    /// A sell price above the buy price reconstructs to a negative price
    /// difference and does not match
    #[test]
    fn test_price_mismatch() {
        let buy = test_order(OrderSide::Buy, 1, 100);
        let sell = test_order(OrderSide::Sell, 2, 101);

        let fragments = delta_fragments(&buy, &sell);
        let delta = Delta::reconstruct_from(&fragments[1..]).unwrap();

        assert_eq!(delta.price, BigInt::from(-1));
        assert!(!delta.is_match());
    }

    /// Disagreeing token pairs reconstruct to a non-zero token difference
    #[test]
    fn test_token_mismatch() {
        let buy = test_order(OrderSide::Buy, 1, 100);
        let mut sell = test_order(OrderSide::Sell, 2, 100);
        sell.tokens = TokenPair::new(1, 3);

        let fragments = delta_fragments(&buy, &sell);
        let delta = Delta::reconstruct_from(&fragments[..4]).unwrap();

        assert!(!delta.tokens.is_zero());
        assert!(!delta.is_match());
    }

    /// The delta id is a deterministic function of the order pair
    #[test]
    fn test_delta_id_determinism() {
        let buy = OrderId([1u8; 32]);
        let sell = OrderId([2u8; 32]);

        assert_eq!(DeltaId::new(&buy, &sell), DeltaId::new(&buy, &sell));
        assert_ne!(DeltaId::new(&buy, &sell), DeltaId::new(&sell, &buy));
    }
}
