//! Value formatting and unit handling for tile labels.

use std::time::Duration;

use crate::telemetry::Reading;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);

/// How long one poll timestamp read may be reused across tiles: half the
/// interval, at least 100ms, and always shorter than the interval itself.
pub fn poll_ttl(interval: Duration) -> Duration {
    let interval = if interval.is_zero() {
        DEFAULT_POLL_INTERVAL
    } else {
        interval
    };
    let mut ttl = (interval / 2).max(Duration::from_millis(100));
    if ttl >= interval {
        ttl = interval
            .saturating_sub(Duration::from_millis(25))
            .max(Duration::from_millis(25));
    }
    ttl
}

/// Initial graph scale when a reading is picked.
pub fn default_min_max(reading: &Reading) -> (i32, i32) {
    match reading.unit.as_str() {
        "%" => (0, 100),
        "Yes/No" => (0, 1),
        _ => {
            let mut min = reading.min - reading.min * 0.2;
            if min <= 0.0 {
                min = 0.0;
            }
            let max = reading.max + reading.max * 0.2;
            (min as i32, max as i32)
        }
    }
}

/// Rescale a throughput value (`KB/s`, `MiB/s`, ...) to `target`
/// (`B`, `KB`, `MB`, `GB`, `TB`). Units are 1024-based. Anything that is not
/// a recognised data size passes through unchanged.
pub fn normalize_for_graph(value: f64, source_unit: &str, target_unit: &str) -> f64 {
    if target_unit.is_empty() {
        return value;
    }
    const K: f64 = 1024.0;
    let source = source_unit.to_lowercase();
    let bytes = if source.starts_with("tb") || source.starts_with("tib") {
        value * K * K * K * K
    } else if source.starts_with("gb") || source.starts_with("gib") {
        value * K * K * K
    } else if source.starts_with("mb") || source.starts_with("mib") {
        value * K * K
    } else if source.starts_with("kb") || source.starts_with("kib") {
        value * K
    } else if source.starts_with("b/") || source == "b" {
        value
    } else {
        return value;
    };
    match target_unit.to_uppercase().as_str() {
        "TB" => bytes / (K * K * K * K),
        "GB" => bytes / (K * K * K),
        "MB" => bytes / (K * K),
        "KB" => bytes / K,
        "B" => bytes,
        _ => value,
    }
}

/// Whether graph-unit normalisation applies to a reading with `unit`.
pub fn is_throughput(unit: &str) -> bool {
    unit.contains("/s")
}

pub fn default_value_text(value: f64) -> String {
    format!("{value:.0}")
}

/// Value text with its unit appended; `%` hugs the number.
pub fn with_unit(value_text: &str, unit: &str) -> String {
    match unit {
        "" => value_text.to_string(),
        "%" => format!("{value_text}%"),
        _ => format!("{value_text} {unit}"),
    }
}

pub fn apply_threshold_text(template: &str, value_text: &str, unit: &str) -> String {
    template.replace("{value}", value_text).replace("{unit}", unit)
}

#[derive(Debug, Default, Clone, Copy)]
struct Spec {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    sharp: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Printf-style formatting of a single float argument.
///
/// Supports flags `-+ 0#`, width, precision and the verbs
/// `f F e E g G d v s %`. Integer verbs truncate toward zero. Unknown verbs,
/// missing and surplus arguments are reported inline the way Go's `fmt` does.
pub fn sprintf(format: &str, value: f64) -> String {
    let mut out = String::with_capacity(format.len() + 8);
    let mut chars = format.chars().peekable();
    let mut used = false;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => spec.minus = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.sharp = true,
                _ => break,
            }
            chars.next();
        }
        spec.width = take_number(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            spec.precision = Some(take_number(&mut chars).unwrap_or(0));
        }
        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        if verb == '%' {
            out.push('%');
            continue;
        }
        if used {
            out.push_str(&format!("%!{verb}(MISSING)"));
            continue;
        }
        used = true;
        let body = match verb {
            'f' | 'F' => signed(value, &spec, format_fixed(value.abs(), spec.precision.unwrap_or(6), spec.sharp)),
            'e' | 'E' => {
                let s = format_exp(value.abs(), spec.precision.unwrap_or(6), spec.sharp);
                signed(value, &spec, if verb == 'E' { s.to_uppercase() } else { s })
            }
            'g' | 'G' | 'v' | 's' => {
                let s = format_general(value.abs(), spec.precision, spec.sharp);
                signed(value, &spec, if verb == 'G' { s.to_uppercase() } else { s })
            }
            'd' => {
                let t = value.trunc();
                signed(t, &spec, format!("{:.0}", t.abs()))
            }
            other => {
                out.push_str(&format!("%!{other}(float64={})", format_general(value, None, false)));
                continue;
            }
        };
        out.push_str(&pad(body, &spec));
    }
    if !used {
        out.push_str(&format!("%!(EXTRA float64={})", format_general(value, None, false)));
    }
    out
}

/// Width and precision stop growing past this; anything longer consumes the
/// rest of the format, which then reports `%!(NOVERB)`.
const MAX_NUMBER: usize = 1_000_000;

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut n: Option<usize> = None;
    while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
        let current = n.unwrap_or(0);
        if current > MAX_NUMBER {
            chars.for_each(drop);
            return None;
        }
        n = Some(current * 10 + d as usize);
        chars.next();
    }
    n
}

/// Prefix the sign; `magnitude` is the already-formatted absolute value.
fn signed(value: f64, spec: &Spec, magnitude: String) -> (String, String) {
    let sign = if value.is_sign_negative() && !value.is_nan() {
        "-"
    } else if spec.plus {
        "+"
    } else if spec.space {
        " "
    } else {
        ""
    };
    (sign.to_string(), magnitude)
}

fn pad((sign, magnitude): (String, String), spec: &Spec) -> String {
    let len = sign.chars().count() + magnitude.chars().count();
    let width = spec.width.unwrap_or(0);
    if len >= width {
        return sign + &magnitude;
    }
    let fill = width - len;
    let numeric = magnitude.starts_with(|c: char| c.is_ascii_digit());
    if spec.minus {
        format!("{sign}{magnitude}{}", " ".repeat(fill))
    } else if spec.zero && numeric {
        format!("{sign}{}{magnitude}", "0".repeat(fill))
    } else {
        format!("{}{sign}{magnitude}", " ".repeat(fill))
    }
}

fn special(v: f64) -> Option<String> {
    if v.is_nan() {
        Some("NaN".into())
    } else if v.is_infinite() {
        Some("Inf".into())
    } else {
        None
    }
}

fn format_fixed(v: f64, precision: usize, sharp: bool) -> String {
    if let Some(s) = special(v) {
        return s;
    }
    let mut s = format!("{v:.precision$}");
    if sharp && precision == 0 {
        s.push('.');
    }
    s
}

/// `d.ddddde±XX` with at least two exponent digits.
fn format_exp(v: f64, precision: usize, sharp: bool) -> String {
    if let Some(s) = special(v) {
        return s;
    }
    let raw = format!("{v:.precision$e}");
    let (mantissa, exp) = split_exp(&raw);
    let dot = if sharp && precision == 0 { "." } else { "" };
    format!("{mantissa}{dot}e{}", exp_suffix(exp))
}

fn split_exp(raw: &str) -> (&str, i32) {
    match raw.split_once('e') {
        Some((m, e)) => (m, e.parse().unwrap_or(0)),
        None => (raw, 0),
    }
}

fn exp_suffix(exp: i32) -> String {
    let sign = if exp < 0 { '-' } else { '+' };
    format!("{sign}{:02}", exp.abs())
}

/// `%g`: shortest representation when no precision is given, otherwise
/// `precision` significant digits; exponent form for very small or large
/// magnitudes.
fn format_general(v: f64, precision: Option<usize>, sharp: bool) -> String {
    if let Some(s) = special(v.abs()) {
        return if v.is_sign_negative() && v.is_infinite() {
            format!("-{s}")
        } else {
            s
        };
    }
    let (digits, exp, eprec) = match precision {
        None => {
            let raw = format!("{v:e}");
            let (m, e) = split_exp(&raw);
            (m.to_string(), e, 6)
        }
        Some(p) => {
            let p = p.max(1);
            let raw = format!("{:.*e}", p - 1, v);
            let (m, e) = split_exp(&raw);
            (m.to_string(), e, p as i32)
        }
    };
    if exp < -4 || exp >= eprec {
        let mantissa = if sharp { digits } else { trim_zeros(&digits) };
        return format!("{mantissa}e{}", exp_suffix(exp));
    }
    match precision {
        None => format!("{v}"),
        Some(p) => {
            let decimals = (p.max(1) as i32 - 1 - exp).max(0) as usize;
            let s = format!("{v:.decimals$}");
            if sharp {
                s
            } else {
                trim_zeros(&s)
            }
        }
    }
}

fn trim_zeros(s: &str) -> String {
    if !s.contains('.') {
        return s.to_string();
    }
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::ReadingType;

    fn reading(unit: &str, min: f64, max: f64) -> Reading {
        Reading {
            id: 1,
            label: "x".into(),
            unit: unit.into(),
            kind: String::new(),
            reading_type: ReadingType::Other,
            value: 0.0,
            min,
            max,
            average: 0.0,
        }
    }

    #[test]
    fn ttl_is_half_interval_with_floors() {
        assert_eq!(poll_ttl(Duration::from_millis(1000)), Duration::from_millis(500));
        assert_eq!(poll_ttl(Duration::from_millis(150)), Duration::from_millis(100));
        assert_eq!(poll_ttl(Duration::from_millis(100)), Duration::from_millis(75));
        assert_eq!(poll_ttl(Duration::from_millis(40)), Duration::from_millis(25));
        assert_eq!(poll_ttl(Duration::ZERO), Duration::from_millis(500));
        for ms in [100, 250, 500, 2000, 30_000] {
            let interval = Duration::from_millis(ms);
            assert!(poll_ttl(interval) < interval);
        }
    }

    #[test]
    fn default_scale_by_unit() {
        assert_eq!(default_min_max(&reading("%", 3.0, 97.0)), (0, 100));
        assert_eq!(default_min_max(&reading("Yes/No", 0.0, 1.0)), (0, 1));
        assert_eq!(default_min_max(&reading("°C", 40.0, 80.0)), (32, 96));
        assert_eq!(default_min_max(&reading("W", -5.0, 10.0)), (0, 12));
    }

    #[test]
    fn normalizes_throughput_in_1024_steps() {
        assert_eq!(normalize_for_graph(1.0, "MB/s", "KB"), 1024.0);
        assert_eq!(normalize_for_graph(2048.0, "KiB/s", "MB"), 2.0);
        assert_eq!(normalize_for_graph(512.0, "B/s", "kb"), 0.5);
        assert_eq!(normalize_for_graph(7.0, "°C", "MB"), 7.0);
        assert_eq!(normalize_for_graph(7.0, "MB/s", ""), 7.0);
        assert_eq!(normalize_for_graph(7.0, "MB/s", "PB"), 7.0);
    }

    #[test]
    fn units_attach_with_percent_exception() {
        assert_eq!(with_unit("52", "%"), "52%");
        assert_eq!(with_unit("52", "°C"), "52 °C");
        assert_eq!(with_unit("52", ""), "52");
        assert_eq!(default_value_text(52.6), "53");
    }

    #[test]
    fn threshold_text_substitutes_placeholders() {
        assert_eq!(apply_threshold_text("HOT {value}{unit}!", "91", "°C"), "HOT 91°C!");
    }

    #[test]
    fn sprintf_common_verbs() {
        assert_eq!(sprintf("%.1f", 52.34), "52.3");
        assert_eq!(sprintf("%.0f°", 52.4), "52°");
        assert_eq!(sprintf("%5.1f", 3.14159), "  3.1");
        assert_eq!(sprintf("%-6.1f|", 3.14159), "3.1   |");
        assert_eq!(sprintf("%06.2f", -3.14159), "-03.14");
        assert_eq!(sprintf("%+.0f", 7.0), "+7");
        assert_eq!(sprintf("%d MHz", 4712.9), "4712 MHz");
        assert_eq!(sprintf("%f", 1.5), "1.500000");
        assert_eq!(sprintf("%d%%", 42.0), "42%");
    }

    #[test]
    fn sprintf_exponent_and_general() {
        assert_eq!(sprintf("%e", 1234.5678), "1.234568e+03");
        assert_eq!(sprintf("%.2E", 0.000123), "1.23E-04");
        assert_eq!(sprintf("%g", 52.0), "52");
        assert_eq!(sprintf("%g", 1234567.0), "1.234567e+06");
        assert_eq!(sprintf("%v", 0.5), "0.5");
        assert_eq!(sprintf("%.3g", 3.14159), "3.14");
        assert_eq!(sprintf("%.2g", 1234.0), "1.2e+03");
    }

    #[test]
    fn sprintf_reports_bad_verbs_and_arguments() {
        assert_eq!(sprintf("%x", 1.5), "%!x(float64=1.5)");
        assert_eq!(sprintf("%f %f", 1.0), "1.000000 %!f(MISSING)");
        assert_eq!(sprintf("static", 2.0), "static%!(EXTRA float64=2)");
        assert_eq!(sprintf("%", 2.0), "%!(NOVERB)%!(EXTRA float64=2)");
    }

    #[test]
    fn sprintf_rejects_huge_width_and_precision() {
        assert_eq!(
            sprintf("%99999999999999999999d", 1.0),
            "%!(NOVERB)%!(EXTRA float64=1)"
        );
        assert_eq!(
            sprintf("cpu %.99999999999f °C", 1.0),
            "cpu %!(NOVERB)%!(EXTRA float64=1)"
        );
        assert_eq!(sprintf("%3d|", 7.0), "  7|");
        assert_eq!(sprintf("%1000000d", 7.0).len(), 1_000_000);
    }
}
