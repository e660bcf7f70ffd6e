// src/services/parser/sanity.rs

//! Plausibility checks on located values.
//!
//! A rule can latch onto the wrong element when the page layout shifts and
//! still return something. These checks catch the obvious cases so a wrong
//! value is dropped instead of exported.

use serde_json::Value;

use crate::models::FieldName;
use crate::utils::{bare_domain, is_absolute_http};

const MAX_NAME_LEN: usize = 200;
const MAX_SYMBOL_LEN: usize = 24;

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expect_scalar(value: &Value) -> Result<String, String> {
    as_text(value).ok_or_else(|| format!("expected a single value, found {}", shape(value)))
}

fn check_name(value: &Value) -> Result<(), String> {
    let name = expect_scalar(value)?;
    let lower = name.to_lowercase();
    if lower.starts_with("http") || lower.contains("://") || lower.starts_with("www.") {
        return Err(format!("looks like a URL: '{name}'"));
    }
    if !name.chars().any(char::is_alphabetic) {
        return Err(format!("no letters in '{name}'"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err("longer than a company name can be".to_string());
    }
    Ok(())
}

fn check_website(value: &Value, page_url: &str) -> Result<(), String> {
    let website = expect_scalar(value)?;
    if !is_absolute_http(&website) {
        return Err(format!("not an absolute URL: '{website}'"));
    }
    if bare_domain(&website).is_some() && bare_domain(&website) == bare_domain(page_url) {
        return Err(format!("points back at the profile site: '{website}'"));
    }
    Ok(())
}

fn check_phone(value: &Value) -> Result<(), String> {
    let phone = expect_scalar(value)?;
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    if !(7..=20).contains(&digits) {
        return Err(format!("'{phone}' has {digits} digits"));
    }
    if phone.chars().any(char::is_alphabetic) && !phone.to_lowercase().contains("ext") {
        return Err(format!("letters in phone number '{phone}'"));
    }
    Ok(())
}

fn check_symbol(value: &Value) -> Result<(), String> {
    let symbol = expect_scalar(value)?;
    if symbol.chars().count() > MAX_SYMBOL_LEN {
        return Err(format!("too long for a ticker: '{symbol}'"));
    }
    Ok(())
}

fn check_money(value: &Value) -> Result<(), String> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Object(_) => Ok(()),
        other => Err(format!("expected an amount, found {}", shape(other))),
    }
}

fn check_list(value: &Value) -> Result<(), String> {
    match value {
        Value::Array(_) | Value::String(_) => Ok(()),
        other => Err(format!("expected a list, found {}", shape(other))),
    }
}

fn check_records(value: &Value) -> Result<(), String> {
    match value {
        Value::Array(items) if items.iter().all(|i| i.is_object() || i.is_string()) => Ok(()),
        Value::Array(_) => Err("list entries are neither objects nor text".to_string()),
        other => Err(format!("expected a list of entries, found {}", shape(other))),
    }
}

/// Check one located value. `Err` carries the reason it was rejected.
pub fn check(field: FieldName, value: &Value, page_url: &str) -> Result<(), String> {
    use FieldName::*;

    match field {
        Name => check_name(value),
        Website => check_website(value, page_url),
        PhoneNumber => check_phone(value),
        StockSymbol => check_symbol(value),
        Revenue | TotalFundingAmount | MostRecentFundingAmount => check_money(value),
        Id | Description | Headquarters | RevenueCurrency | FundingCurrency | Employees
        | FundingRounds | TotalEmployees | CLevelEmployees | VpLevelEmployees
        | DirectorLevelEmployees | ManagerLevelEmployees | NonManagerEmployees | TopContacts
        | CeoRating | EnpsScore => expect_scalar(value).map(|_| ()),
        Industry | PopularSearches | BusinessClassificationCodes | SocialMedia
        | SimilarCompanies | EmailFormats | ProductsOwned => check_list(value),
        Leadership | OrgChart | TechStack | RecentScoops | NewsAndMedia => check_records(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PAGE: &str = "https://www.zoominfo.com/c/acme/1";

    #[test]
    fn test_name_checks() {
        assert!(check(FieldName::Name, &json!("Acme Corp"), PAGE).is_ok());
        assert!(check(FieldName::Name, &json!("https://acme.example"), PAGE).is_err());
        assert!(check(FieldName::Name, &json!("12345"), PAGE).is_err());
        assert!(check(FieldName::Name, &json!({"name": "Acme"}), PAGE).is_err());
    }

    #[test]
    fn test_website_checks() {
        assert!(check(FieldName::Website, &json!("https://acme.example"), PAGE).is_ok());
        assert!(check(FieldName::Website, &json!("Acme Corp"), PAGE).is_err());
        assert!(check(FieldName::Website, &json!("https://zoominfo.com/about"), PAGE).is_err());
    }

    #[test]
    fn test_phone_checks() {
        assert!(check(FieldName::PhoneNumber, &json!("(555) 123-4567"), PAGE).is_ok());
        assert!(check(FieldName::PhoneNumber, &json!("+1 555 123 4567 ext. 9"), PAGE).is_ok());
        assert!(check(FieldName::PhoneNumber, &json!("Contact us"), PAGE).is_err());
        assert!(check(FieldName::PhoneNumber, &json!("123"), PAGE).is_err());
    }

    #[test]
    fn test_shape_checks() {
        assert!(check(FieldName::Employees, &json!([1, 2]), PAGE).is_err());
        assert!(check(FieldName::Employees, &json!("lots"), PAGE).is_ok());
        assert!(check(FieldName::Revenue, &json!({"amount": 5}), PAGE).is_ok());
        assert!(check(FieldName::Leadership, &json!([[1]]), PAGE).is_err());
        assert!(check(FieldName::Industry, &json!({"a": 1}), PAGE).is_err());
    }
}
