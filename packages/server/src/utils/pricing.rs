use rand::Rng;

/// Unit price in cents after the item's bulk discount for an order of
/// `count` units. Rounds half up to whole cents.
pub fn discounted_unit_price(
    price: i64,
    discount_amount: i32,
    discount_percentage: i32,
    count: i32,
) -> i64 {
    if discount_amount <= 0 || count < discount_amount || discount_percentage <= 0 {
        return price;
    }
    let pct = i64::from(discount_percentage.min(100));
    price.saturating_mul(100 - pct).saturating_add(50) / 100
}

/// Sum of `units` copies of each price. `None` on overflow.
pub fn order_total(lines: impl IntoIterator<Item = (i64, i32)>) -> Option<i64> {
    lines.into_iter().try_fold(0i64, |total, (price, units)| {
        total.checked_add(price.checked_mul(i64::from(units))?)
    })
}

/// Random hex key used for transaction and ticket identifiers.
pub fn generate_key(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill(buf.as_mut_slice());
    hex::encode(buf)
}
