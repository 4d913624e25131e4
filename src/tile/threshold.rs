use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::settings::Threshold;
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
        }
    }

    /// `==` compares both sides rounded half-up to whole numbers, matching
    /// what the tile displays.
    pub fn compare(&self, value: f64, target: f64) -> bool {
        match self {
            Operator::Gt => value > target,
            Operator::Lt => value < target,
            Operator::Ge => value >= target,
            Operator::Le => value <= target,
            Operator::Eq => round_half_up(value) == round_half_up(target),
        }
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            "==" => Ok(Operator::Eq),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn round_half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Scan every threshold in order; the last enabled one whose comparison
/// holds is the active one.
pub fn evaluate(value: f64, thresholds: &[Threshold]) -> Option<&Threshold> {
    let mut active = None;
    for t in thresholds {
        if !t.enabled || t.operator.is_empty() {
            continue;
        }
        let Ok(op) = t.operator.parse::<Operator>() else {
            continue;
        };
        if op.compare(value, t.value) {
            active = Some(t);
        }
    }
    active
}

static LAST_ID_NANOS: AtomicU64 = AtomicU64::new(0);

/// `threshold_<unix nanos>`, strictly increasing within the process so two
/// thresholds created in the same clock tick still get distinct ids.
pub fn new_threshold_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let mut prev = LAST_ID_NANOS.load(Ordering::Relaxed);
    loop {
        let next = now.max(prev + 1);
        match LAST_ID_NANOS.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return format!("threshold_{next}"),
            Err(actual) => prev = actual,
        }
    }
}
