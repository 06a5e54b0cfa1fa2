//! Venue symbol spellings → one comparison key.
//!
//! The same perpetual shows up as `BTCUSDT` (venue REST), `BTC/USDT:USDT`
//! (unified spelling with settle asset), `btc-usdt-swap` and so on. Everything
//! that compares orders against positions goes through [`normalize_symbol`].

const SEPARATORS: [char; 3] = ['/', '-', '_'];
const PERP_MARKERS: [&str; 2] = ["-SWAP", "-PERP"];

/// At most one `:` (the settle separator) is accepted.
fn is_mappable(raw: &str) -> bool {
    !raw.is_empty()
        && raw.matches(':').count() <= 1
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || SEPARATORS.contains(&c) || c == ':')
}

/// Split `BTC/USDT:USDT-251226` into (`BTC/USDT`, `Some("USDT-251226")`).
fn split_settle(upper: &str) -> (&str, Option<&str>) {
    match upper.split_once(':') {
        Some((market, settle)) => (market, Some(settle)),
        None => (upper, None),
    }
}

/// A `-`/`_` separated segment starting with a digit: `251226`, `26DEC25`.
fn has_dated_segment(s: &str) -> bool {
    s.split(['-', '_'])
        .skip(1)
        .any(|seg| seg.chars().next().is_some_and(|c| c.is_ascii_digit()))
}

fn strip_perp_marker(s: &str) -> &str {
    PERP_MARKERS
        .iter()
        .find_map(|m| s.strip_suffix(m))
        .unwrap_or(s)
}

/// Canonical key for symbol comparison. Total: unmappable input is returned
/// unchanged.
///
/// - uppercase
/// - drop the repeated settle asset of perpetual spellings (`:USDT`)
/// - drop `-SWAP` / `-PERP` markers
/// - remove `/`, `-` and `_` separators
///
/// Dated contracts keep their expiry so they never collide with the perpetual.
pub fn normalize_symbol(raw: &str) -> String {
    let trimmed = raw.trim();
    if !is_mappable(trimmed) {
        return raw.to_string();
    }

    let upper = trimmed.to_ascii_uppercase();
    let (market, settle) = split_settle(&upper);

    let expiry = settle
        .and_then(|s| s.split_once('-'))
        .map(|(_, expiry)| expiry)
        .unwrap_or("");

    let mut key: String = strip_perp_marker(market)
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .collect();
    key.extend(expiry.chars().filter(|c| !SEPARATORS.contains(c)));

    if key.is_empty() {
        return raw.to_string();
    }
    key
}

/// Whether `raw` names a perpetual swap. Position-level stop endpoints only
/// accept perpetuals; spot, dated futures and options are rejected.
pub fn is_perpetual_swap(raw: &str) -> bool {
    let trimmed = raw.trim();
    if !is_mappable(trimmed) {
        return false;
    }
    let upper = trimmed.to_ascii_uppercase();

    match split_settle(&upper) {
        (_, Some(settle)) => !settle.is_empty() && !has_dated_segment(&format!("X-{settle}")),
        // `BASE/QUOTE` without a settle asset is the spot spelling
        (market, None) if market.contains('/') => false,
        (market, None) => !has_dated_segment(strip_perp_marker(market)),
    }
}
