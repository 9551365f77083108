//! Scalar helpers shared by the decode and encode paths: symbol/asset
//! text forms and ISO-8601 timestamp parsing.

use crate::error::AbiError;

/// Decode the 7-character symbol code packed in the upper bytes of a symbol.
pub(crate) fn symbol_code_to_string(mut raw: u64) -> String {
    let mut out = String::new();
    while raw > 0 {
        let c = (raw & 0xff) as u8;
        if c == 0 {
            break;
        }
        out.push(c as char);
        raw >>= 8;
    }
    out
}

pub(crate) fn symbol_code_from_str(s: &str) -> Result<u64, AbiError> {
    if s.len() > 7 || !s.bytes().all(|c| c.is_ascii_uppercase()) {
        return Err(AbiError::JsonEncode {
            ty: "symbol_code".into(),
            reason: format!("invalid symbol code \"{s}\""),
        });
    }
    let mut raw: u64 = 0;
    for (i, c) in s.bytes().enumerate() {
        raw |= (c as u64) << (8 * i);
    }
    Ok(raw)
}

/// Render a symbol as `precision,CODE`.
pub(crate) fn symbol_to_string(raw: u64) -> String {
    format!("{},{}", raw & 0xff, symbol_code_to_string(raw >> 8))
}

pub(crate) fn symbol_from_str(s: &str) -> Result<u64, AbiError> {
    let bad = || AbiError::JsonEncode {
        ty: "symbol".into(),
        reason: format!("expected \"precision,CODE\", got \"{s}\""),
    };
    let (precision, code) = s.split_once(',').ok_or_else(bad)?;
    let precision: u64 = precision.parse().map_err(|_| bad())?;
    if precision > 18 {
        return Err(bad());
    }
    Ok(precision | (symbol_code_from_str(code)? << 8))
}

/// Render an asset as `1.0000 CODE`.
pub(crate) fn asset_to_string(amount: i64, symbol: u64) -> String {
    let precision = (symbol & 0xff) as u32;
    let code = symbol_code_to_string(symbol >> 8);
    let sign = if amount < 0 { "-" } else { "" };
    let magnitude = amount.unsigned_abs();
    if precision == 0 {
        return format!("{sign}{magnitude} {code}");
    }
    let scale = 10u64.pow(precision);
    format!(
        "{sign}{}.{:0width$} {code}",
        magnitude / scale,
        magnitude % scale,
        width = precision as usize
    )
}

pub(crate) fn asset_from_str(s: &str) -> Result<(i64, u64), AbiError> {
    let bad = |reason: &str| AbiError::JsonEncode {
        ty: "asset".into(),
        reason: format!("{reason} in \"{s}\""),
    };
    let (number, code) = s
        .trim()
        .split_once(' ')
        .ok_or_else(|| bad("missing symbol code"))?;
    let (digits, precision) = match number.split_once('.') {
        Some((int, frac)) => (format!("{int}{frac}"), frac.len() as u64),
        None => (number.to_string(), 0),
    };
    let amount: i64 = digits.parse().map_err(|_| bad("invalid amount"))?;
    if precision > 18 {
        return Err(bad("precision too large"));
    }
    Ok((amount, precision | (symbol_code_from_str(code)? << 8)))
}

/// Parse `YYYY-MM-DDTHH:MM:SS[.mmm]` (UTC, optional trailing `Z`) into Unix
/// milliseconds. Inverse of the codec's display form.
pub(crate) fn parse_iso8601_millis(s: &str) -> Option<u64> {
    let s = s.strip_suffix('Z').unwrap_or(s);
    let (date, time) = s.split_once('T')?;

    let mut date_parts = date.splitn(3, '-');
    let y: i64 = date_parts.next()?.parse().ok()?;
    let m: i64 = date_parts.next()?.parse().ok()?;
    let d: i64 = date_parts.next()?.parse().ok()?;
    if !(1..=12).contains(&m) || !(1..=31).contains(&d) {
        return None;
    }

    let (hms, millis) = match time.split_once('.') {
        Some((hms, frac)) => {
            let frac = format!("{frac:0<3}");
            (hms, frac[..3].parse::<u64>().ok()?)
        }
        None => (time, 0),
    };
    let mut hms_parts = hms.splitn(3, ':');
    let hour: u64 = hms_parts.next()?.parse().ok()?;
    let minute: u64 = hms_parts.next()?.parse().ok()?;
    let second: u64 = hms_parts.next()?.parse().ok()?;
    if hour > 23 || minute > 59 || second > 59 {
        return None;
    }

    // Howard Hinnant's days_from_civil
    let y = if m <= 2 { y - 1 } else { y };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let doy = (153 * (if m > 2 { m - 3 } else { m + 9 }) + 2) / 5 + d - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146_097 + doe - 719_468;
    if days < 0 {
        return None;
    }

    Some(((days as u64 * 86_400 + hour * 3600 + minute * 60 + second) * 1000) + millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_roundtrip() {
        let raw = symbol_from_str("4,EOS").unwrap();
        assert_eq!(symbol_to_string(raw), "4,EOS");
        assert!(symbol_from_str("eos").is_err());
    }

    #[test]
    fn asset_roundtrip() {
        let (amount, sym) = asset_from_str("1.0000 EOS").unwrap();
        assert_eq!(amount, 10_000);
        assert_eq!(asset_to_string(amount, sym), "1.0000 EOS");

        let (amount, sym) = asset_from_str("-0.5000 EOS").unwrap();
        assert_eq!(amount, -5_000);
        assert_eq!(asset_to_string(amount, sym), "-0.5000 EOS");

        let (amount, sym) = asset_from_str("42 RAM").unwrap();
        assert_eq!(amount, 42);
        assert_eq!(asset_to_string(amount, sym), "42 RAM");
    }

    #[test]
    fn iso8601_parse() {
        assert_eq!(parse_iso8601_millis("1970-01-01T00:00:00.000"), Some(0));
        assert_eq!(
            parse_iso8601_millis("2000-01-01T00:00:00.000"),
            Some(946_684_800_000)
        );
        assert_eq!(
            parse_iso8601_millis("2018-06-01T12:00:00.500"),
            Some(1_527_854_400_500)
        );
        assert_eq!(parse_iso8601_millis("2018-06-01T12:00:00"), Some(1_527_854_400_000));
        assert_eq!(parse_iso8601_millis("not-a-date"), None);
    }
}
