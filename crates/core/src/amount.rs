//! # 金額の表示用変換
//!
//! 最小単位の整数（U256）を `10^decimals` で割った10進表記に変換する。
//! 浮動小数点は使わず、U256の整数演算のみで計算する。
//!
//! ## 表記規則
//! - 小数部は最大6桁（7桁目で四捨五入）、末尾の0は削除
//! - `decimals = 0` の場合は整数部のみ
//! - 変換できない場合（`10^decimals` が256bitに収まらない等）は `"0"`

use alloy_primitives::U256;

/// 表示する小数部の最大桁数
pub const MAX_FRACTION_DIGITS: u8 = 6;

/// ネイティブ通貨の小数点以下の桁数
pub const NATIVE_DECIMALS: u8 = 18;

/// 最小単位の金額を表示用の10進文字列に変換する。
///
/// 失敗しても例外にはならず `"0"` を返す。
pub fn format_units(raw: U256, decimals: u8) -> String {
    try_format_units(raw, decimals).unwrap_or_else(|| "0".to_string())
}

/// ネイティブ通貨（18桁）の金額を表示用に変換する。
pub fn format_ether(value: U256) -> String {
    format_units(value, NATIVE_DECIMALS)
}

fn try_format_units(raw: U256, decimals: u8) -> Option<String> {
    let scale = pow10(decimals)?;
    let mut integer = raw / scale;
    let fraction = raw % scale;

    let digits = decimals.min(MAX_FRACTION_DIGITS);
    let dropped = pow10(decimals - digits)?;
    let mut kept = fraction / dropped;
    let rest = fraction % dropped;

    // 四捨五入（rest * 2 >= dropped をオーバーフローなしで判定）
    if rest >= dropped - rest {
        kept += U256::from(1u64);
    }
    if kept == pow10(digits)? {
        integer = integer.checked_add(U256::from(1u64))?;
        kept = U256::ZERO;
    }

    if digits == 0 || kept.is_zero() {
        return Some(integer.to_string());
    }

    let kept = u64::try_from(kept).ok()?;
    let mut frac = format!("{kept:0width$}", width = digits as usize);
    while frac.ends_with('0') {
        frac.pop();
    }
    Some(format!("{integer}.{frac}"))
}

/// `10^exp` を計算する。256bitを超える場合はNone。
fn pow10(exp: u8) -> Option<U256> {
    let ten = U256::from(10u64);
    let mut acc = U256::from(1u64);
    for _ in 0..exp {
        acc = acc.checked_mul(ten)?;
    }
    Some(acc)
}
