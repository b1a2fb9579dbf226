use crate::core::models::{Asset, DEFAULT_CURRENCY, Valuation};
use crate::core::price::PriceMap;

/// Returns a copy of `asset` carrying its current valuation.
///
/// Assets with a symbol are valued at `shares × price` in the quote's
/// currency; a missing quote values each share at 1 USD. Assets without a
/// symbol keep their stored valuation.
pub fn valuate(asset: &Asset, prices: &PriceMap) -> Asset {
    let mut valued = asset.clone();
    if let Some(symbol) = &asset.symbol {
        let quote = prices.get(symbol);
        valued.current_valuation = Valuation {
            currency: quote
                .and_then(|q| q.currency.clone())
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            amount: asset.shares.unwrap_or(0.0) * quote.and_then(|q| q.price).unwrap_or(1.0),
        };
    }
    valued
}
