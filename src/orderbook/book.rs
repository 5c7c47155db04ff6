//! Best bid/offer snapshot types
//!
//! Both sides are built from the `[price, amount]` string pairs the feed sends.

use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};

/// A single price level on one side of the book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub price: f64,
    pub amount: f64,
}

impl Order {
    /// Build an order from a `[price, amount]` token pair
    ///
    /// Any arity other than two, or a token that is not a finite decimal
    /// number, is a [`FeedError::Parse`].
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Result<Self> {
        let [price, amount] = tokens else {
            return Err(FeedError::Parse(format!(
                "expected [price, amount], got {} tokens",
                tokens.len()
            )));
        };

        Ok(Self {
            price: parse_token("price", price.as_ref())?,
            amount: parse_token("amount", amount.as_ref())?,
        })
    }
}

fn parse_token(field: &str, token: &str) -> Result<f64> {
    let value: f64 = token
        .parse()
        .map_err(|e| FeedError::Parse(format!("invalid {} {:?}: {}", field, token, e)))?;

    if !value.is_finite() {
        return Err(FeedError::Parse(format!(
            "invalid {} {:?}: not a finite number",
            field, token
        )));
    }
    Ok(value)
}

/// Point-in-time best bid and best ask
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestOrderBook {
    pub bid: Order,
    pub ask: Order,
}

impl BestOrderBook {
    /// Build a snapshot from raw bid and ask token pairs, bid first
    pub fn from_tokens<S: AsRef<str>>(bid: &[S], ask: &[S]) -> Result<Self> {
        let bid = Order::from_tokens(bid)?;
        let ask = Order::from_tokens(ask)?;
        Ok(Self { bid, ask })
    }

    /// Average of best bid and best ask
    pub fn mid_price(&self) -> f64 {
        (self.bid.price + self.ask.price) / 2.0
    }

    /// Best ask minus best bid
    pub fn spread(&self) -> f64 {
        self.ask.price - self.bid.price
    }
}
