//! Named pure functions callable from `$computed` expressions
//!
//! Arguments arrive positionally. An argument that was undefined or `null`
//! selects the function's default for that position.

use crate::{Error, Result, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A registered computed function
pub type ComputedFn = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Registry of computed functions, keyed by name
#[derive(Clone, Default)]
pub struct ComputedRegistry {
    functions: IndexMap<String, ComputedFn>,
}

impl ComputedRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in formatting functions
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("formatCurrency", format_currency);
        registry.register("formatDate", format_date);
        registry.register("formatNumber", format_number);
        registry.register("formatPercent", format_percent);
        registry.register("truncate", truncate);
        registry.register("join", join);
        registry
    }

    /// Register (or override) a function
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(f));
    }

    /// Copy every function of `other` into this registry, overriding on clash
    pub fn extend(&mut self, other: &ComputedRegistry) {
        for (name, f) in &other.functions {
            self.functions.insert(name.clone(), Arc::clone(f));
        }
    }

    pub fn get(&self, name: &str) -> Option<&ComputedFn> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl fmt::Debug for ComputedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedRegistry")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Positional argument, with `null` treated as absent
fn arg(args: &[Value], index: usize) -> Option<&Value> {
    args.get(index).filter(|v| !v.is_null())
}

fn number_arg(name: &str, args: &[Value], index: usize) -> Result<f64> {
    let value = arg(args, index).unwrap_or(&Value::Null);
    if value.is_null() {
        return Err(Error::Computed {
            name: name.to_string(),
            message: format!("argument {} is required", index),
        });
    }
    value.to_number().ok_or_else(|| Error::type_error("number", value))
}

fn count_arg(args: &[Value], index: usize, default: usize) -> Result<usize> {
    match arg(args, index) {
        None => Ok(default),
        Some(v) => v
            .to_number()
            .filter(|n| *n >= 0.0)
            .map(|n| n as usize)
            .ok_or_else(|| Error::type_error("non-negative number", v)),
    }
}

/// Fraction digits for fixed-point output, at most `MAX_DECIMALS`
fn decimals_arg(name: &str, args: &[Value], index: usize) -> Result<usize> {
    let decimals = count_arg(args, index, 2)?;
    if decimals > MAX_DECIMALS {
        return Err(Error::Computed {
            name: name.to_string(),
            message: format!("decimals must be between 0 and {}, got {}", MAX_DECIMALS, decimals),
        });
    }
    Ok(decimals)
}

const MAX_DECIMALS: usize = 100;

/// Insert `,` every three digits of an unsigned integer string
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Currency symbol and fraction digits as rendered in the zh-CN locale
fn currency_style(code: &str) -> (String, usize) {
    match code {
        "CNY" => ("¥".into(), 2),
        "USD" => ("US$".into(), 2),
        "EUR" => ("€".into(), 2),
        "GBP" => ("£".into(), 2),
        "HKD" => ("HK$".into(), 2),
        "JPY" => ("JP¥".into(), 0),
        other => (format!("{} ", other), 2),
    }
}

fn format_currency(args: &[Value]) -> Result<Value> {
    let amount = number_arg("formatCurrency", args, 0)?;
    let code = arg(args, 1)
        .map(|v| v.to_string().to_uppercase())
        .unwrap_or_else(|| "CNY".to_string());
    let (symbol, decimals) = currency_style(&code);

    let fixed = format!("{:.*}", decimals, amount.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };
    let mut out = String::new();
    if amount < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        out.push('-');
    }
    out.push_str(&symbol);
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    Ok(Value::String(out))
}

fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Int(millis) => DateTime::from_timestamp_millis(*millis).map(|d| d.naive_utc()),
        Value::Float(millis) if millis.is_finite() => {
            DateTime::from_timestamp_millis(*millis as i64).map(|d| d.naive_utc())
        }
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.naive_local())
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

fn format_date(args: &[Value]) -> Result<Value> {
    let value = arg(args, 0).cloned().unwrap_or_default();
    let Some(date) = parse_date(&value) else {
        return Ok(value);
    };
    let pattern = arg(args, 1)
        .map(|v| v.to_string())
        .unwrap_or_else(|| "YYYY-MM-DD".to_string());

    // Each token is substituted once, leftmost occurrence only
    let rendered = pattern
        .replacen("YYYY", &date.year().to_string(), 1)
        .replacen("MM", &format!("{:02}", date.month()), 1)
        .replacen("DD", &format!("{:02}", date.day()), 1)
        .replacen("HH", &format!("{:02}", date.hour()), 1)
        .replacen("mm", &format!("{:02}", date.minute()), 1)
        .replacen("ss", &format!("{:02}", date.second()), 1);
    Ok(Value::String(rendered))
}

fn format_number(args: &[Value]) -> Result<Value> {
    let n = number_arg("formatNumber", args, 0)?;
    let decimals = decimals_arg("formatNumber", args, 1)?;
    Ok(Value::String(format!("{:.*}", decimals, n)))
}

fn format_percent(args: &[Value]) -> Result<Value> {
    let n = number_arg("formatPercent", args, 0)?;
    let decimals = decimals_arg("formatPercent", args, 1)?;
    Ok(Value::String(format!("{:.*}%", decimals, n * 100.0)))
}

fn truncate(args: &[Value]) -> Result<Value> {
    let text = match arg(args, 0) {
        Some(Value::String(s)) => s,
        Some(other) => return Err(Error::type_error("string", other)),
        None => return Err(Error::type_error("string", &Value::Null)),
    };
    let max = count_arg(args, 1, 50)?;
    if text.chars().count() <= max {
        return Ok(Value::String(text.clone()));
    }
    let mut out: String = text.chars().take(max).collect();
    out.push_str("...");
    Ok(Value::String(out))
}

fn join(args: &[Value]) -> Result<Value> {
    let separator = arg(args, 1)
        .map(|v| v.to_string())
        .unwrap_or_else(|| ", ".to_string());
    let joined = match args.first() {
        Some(Value::List(items)) => items
            .iter()
            .map(|v| if v.is_null() { String::new() } else { v.to_string() })
            .collect::<Vec<_>>()
            .join(&separator),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    };
    Ok(Value::String(joined))
}
