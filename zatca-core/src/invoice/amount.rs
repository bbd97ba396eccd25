/// Formats `value` with exactly `decimals` fractional digits, truncating any
/// further digits instead of rounding them.
///
/// Digits are taken from the shortest decimal representation of the float,
/// so `15.000000000000002` keeps `15.00` and `434.99999999999994` keeps
/// `434.99`. With `decimals == 0` only the integer part is returned.
///
/// ```rust
/// use zatca_core::invoice::format_fixed_no_rounding;
///
/// assert_eq!(format_fixed_no_rounding(14.999, 2), "14.99");
/// assert_eq!(format_fixed_no_rounding(3.0, 2), "3.00");
/// ```
pub fn format_fixed_no_rounding(value: f64, decimals: usize) -> String {
    let repr = value.to_string();
    let (integer, fraction) = repr.split_once('.').unwrap_or((repr.as_str(), ""));
    if decimals == 0 {
        return integer.to_string();
    }
    let fraction: String = fraction.chars().take(decimals).collect();
    format!("{integer}.{fraction:0<decimals$}")
}
