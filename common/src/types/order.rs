//! Plaintext orders and their secret-shared fragments
//!
//! An order is plaintext only at the originating trader; the network sees
//! order fragments, each carrying one Shamir share of every value field.

use std::fmt::{self, Display};

use darknode_crypto::shamir::{split, Share, SharingError};
use num_bigint::BigUint;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::epoch::EpochHash;

/// The unique identifier of an order
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub [u8; 32]);

impl Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

/// The side of the book an order rests on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    /// A buy order
    Buy,
    /// A sell order
    Sell,
}

impl OrderSide {
    /// The opposing side of the book
    pub fn opposite(&self) -> OrderSide {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// The execution style of an order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Execute at the given limit price or better
    Limit,
    /// Execute at the pool's midpoint price
    Midpoint,
}

/// A pair of traded tokens, packed into a single field value
///
/// Pairs are canonically ordered at encoding time; the match predicate
/// compares the packed value directly, so both sides of a trade must encode
/// the pair identically
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair(pub u64);

impl TokenPair {
    /// Pack two token codes into a pair, base code in the high bits
    pub fn new(base: u32, quote: u32) -> Self {
        Self(((base as u64) << 32) | quote as u64)
    }

    /// The pair as a field element, ready for sharing
    pub fn to_field(self) -> BigUint {
        BigUint::from(self.0)
    }
}

/// A plaintext order as constructed by a trader
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The unique identifier of the order
    pub id: OrderId,
    /// The side of the book the order rests on
    pub side: OrderSide,
    /// The execution style of the order
    pub kind: OrderKind,
    /// The unix timestamp at which the order expires
    pub expiry: u64,
    /// The token pair the order trades
    pub tokens: TokenPair,
    /// The limit price of the order
    pub price: u64,
    /// The maximum volume the order will trade
    pub volume: u64,
    /// The minimum volume the order will accept
    pub min_volume: u64,
    /// A nonce randomizing the order's on-chain footprint
    pub nonce: u64,
}

impl Order {
    /// Split the order into `n` fragments, any `k` of which carry enough
    /// share material to participate in a reconstruction
    pub fn fragment<R: Rng>(
        &self,
        epoch: EpochHash,
        k: usize,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<OrderFragment>, SharingError> {
        let tokens = split(&self.tokens.to_field(), k, n, rng)?;
        let price = split(&BigUint::from(self.price), k, n, rng)?;
        let volume = split(&BigUint::from(self.volume), k, n, rng)?;
        let min_volume = split(&BigUint::from(self.min_volume), k, n, rng)?;

        let fragments = tokens
            .into_iter()
            .zip(price)
            .zip(volume)
            .zip(min_volume)
            .map(|(((tokens, price), volume), min_volume)| OrderFragment {
                order_id: self.id,
                side: self.side,
                expiry: self.expiry,
                epoch,
                index: tokens.index,
                tokens,
                price,
                volume,
                min_volume,
            })
            .collect();

        Ok(fragments)
    }
}

/// One of `n` Shamir fragments of an order, held by one pool member
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderFragment {
    /// The id of the order the fragment belongs to
    pub order_id: OrderId,
    /// The side of the book the order rests on
    pub side: OrderSide,
    /// The unix timestamp at which the underlying order expires
    pub expiry: u64,
    /// The epoch the fragment was sharded for
    pub epoch: EpochHash,
    /// The share index of the fragment, equal to the holder's pool position
    pub index: u64,
    /// A share of the packed token pair
    pub tokens: Share,
    /// A share of the order price
    pub price: Share,
    /// A share of the order volume
    pub volume: Share,
    /// A share of the order's minimum volume
    pub min_volume: Share,
}
