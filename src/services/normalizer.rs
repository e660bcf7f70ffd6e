// src/services/normalizer.rs

//! Field normalizer.
//!
//! Turns the untyped values of a [`RawFieldSet`] into a typed
//! [`CompanyRecord`]. The coercion helpers are pure functions and are also
//! used by the page parser to split money strings while extracting.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::models::{
    CompanyRecord, FieldName, NewsItem, NormalizeConfig, NormalizeFailure, Person, RawFieldSet,
    ScoopItem, SubRecord, TechStackItem,
};

/// Tokens sites print in place of a missing value.
const PLACEHOLDERS: [&str; 9] = [
    "-", "--", "n/a", "na", "none", "null", "unknown", "undisclosed", "not available",
];

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<num>\d(?:[.,'\x{a0} ]?\d)*)(?:\s*(?P<mag>thousand|million|billion|trillion|mm|bn|k|m|b|t)\b)?",
    )
    .expect("valid number regex")
});

/// `1 - 5 Million`, `25-50M`, `1 to 5 billion`: a lower bound followed by an
/// upper bound that carries the magnitude.
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<low>\d(?:[.,'\x{a0} ]?\d)*)\s*(?:(?:thousand|million|billion|trillion|mm|bn|k|m|b|t)\b)?\s*(?:-|–|—|to)\s*\d(?:[.,'\x{a0} ]?\d)*\s*(?P<mag>thousand|million|billion|trillion|mm|bn|k|m|b|t)\b",
    )
    .expect("valid range regex")
});

static SIGNED_DECIMAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:[.,]\d+)?").expect("valid decimal regex"));

static CURRENCY_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"US\$|C\$|A\$|\$|€|£|¥|₹").expect("valid symbol regex"));

static CURRENCY_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{3}\b").expect("valid currency regex"));

/// Codes recognised inside an amount string. Explicit currency fields accept
/// any three-letter code.
const KNOWN_CURRENCIES: [&str; 36] = [
    "USD", "EUR", "GBP", "JPY", "CNY", "INR", "CAD", "AUD", "NZD", "CHF", "SEK", "NOK", "DKK",
    "PLN", "CZK", "HUF", "RON", "BGN", "ILS", "TRY", "RUB", "UAH", "BRL", "MXN", "ARS", "CLP",
    "COP", "ZAR", "NGN", "KRW", "SGD", "HKD", "TWD", "THB", "AED", "SAR",
];

/// An amount with the currency found next to it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Money {
    pub amount: f64,
    pub currency: Option<String>,
}

// --- Pure coercions ---

/// True for empty strings and placeholder tokens like `n/a`.
pub fn is_placeholder(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    lower.is_empty() || PLACEHOLDERS.contains(&lower.as_str())
}

/// Trim, collapse internal whitespace and drop placeholders.
pub fn clean_text(text: &str) -> Option<String> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if is_placeholder(&collapsed) {
        None
    } else {
        Some(collapsed)
    }
}

/// Map a currency symbol or code to an ISO-4217 code.
pub fn currency_code(raw: &str) -> Option<String> {
    let symbol = match raw.trim() {
        "US$" | "$" => Some("USD"),
        "C$" => Some("CAD"),
        "A$" => Some("AUD"),
        "€" => Some("EUR"),
        "£" => Some("GBP"),
        "¥" => Some("JPY"),
        "₹" => Some("INR"),
        _ => None,
    };
    if let Some(code) = symbol {
        return Some(code.to_string());
    }

    let code = raw.trim().to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code)
    } else {
        None
    }
}

fn magnitude(suffix: &str) -> f64 {
    match suffix.to_lowercase().as_str() {
        "k" | "thousand" => 1e3,
        "m" | "mm" | "million" => 1e6,
        "b" | "bn" | "billion" => 1e9,
        "t" | "trillion" => 1e12,
        _ => 1.0,
    }
}

/// Parse a number written with thousands and decimal separators.
///
/// When both `,` and `.` appear the last one is the decimal separator. A
/// lone separator is decimal unless it is repeated or a comma is followed by
/// exactly three digits.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let compact: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '\'' | '\u{a0}'))
        .collect();
    let compact = compact.trim_matches(|c| c == ',' || c == '.');
    if compact.is_empty() {
        return None;
    }

    let last_comma = compact.rfind(',');
    let last_dot = compact.rfind('.');
    let canonical = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (Some(c), None) => {
            let decimals = compact.len() - c - 1;
            if compact.matches(',').count() == 1 && decimals != 3 {
                compact.replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (None, Some(_)) if compact.matches('.').count() > 1 => compact.replace('.', ""),
        _ => compact.to_string(),
    };
    canonical.parse::<f64>().ok()
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First number in `text` with its magnitude suffix applied.
///
/// In a range the lower bound is used, scaled by the upper bound's suffix
/// when it has none of its own.
fn leading_amount(text: &str) -> Option<f64> {
    let caps = NUMBER_RE.captures(text)?;
    let number = caps.name("num")?;
    let value = parse_decimal(number.as_str())?;

    let mag = caps.name("mag").or_else(|| {
        RANGE_RE
            .captures(text)
            .filter(|range| range.name("low").is_some_and(|low| low.start() == number.start()))
            .and_then(|range| range.name("mag"))
    });
    Some(match mag {
        Some(mag) => round_cents(value * magnitude(mag.as_str())),
        None => value,
    })
}

/// Split a money string such as `$5.2M`, `USD 5,000,000` or `5.000.000 €`.
pub fn parse_money(raw: &str) -> Option<Money> {
    let amount = leading_amount(raw)?;

    let currency = CURRENCY_SYMBOL_RE
        .find(raw)
        .and_then(|m| currency_code(m.as_str()))
        .or_else(|| {
            CURRENCY_CODE_RE
                .find_iter(raw)
                .map(|m| m.as_str())
                .find(|code| KNOWN_CURRENCIES.contains(code))
                .map(str::to_string)
        });

    Some(Money { amount, currency })
}

/// Text of a scalar JSON value.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Coerce to trimmed text.
pub fn coerce_text(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(clean_text(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(format!("expected text, got {}", describe(other))),
    }
}

/// Coerce to a non-negative integer count.
pub fn coerce_count(value: &Value) -> Result<Option<u64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(Some(v));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f >= 0.0 => Ok(Some(f.round() as u64)),
                _ => Err(format!("negative or invalid count: {n}")),
            }
        }
        Value::String(s) => {
            if is_placeholder(s) {
                return Ok(None);
            }
            if s.trim_start().starts_with('-') {
                return Err(format!("negative count: '{}'", s.trim()));
            }
            let scaled =
                leading_amount(s).ok_or_else(|| format!("not a number: '{}'", s.trim()))?;
            Ok(Some(scaled.round() as u64))
        }
        other => Err(format!("expected a count, got {}", describe(other))),
    }
}

/// Coerce to a decimal such as a rating or a score.
pub fn coerce_decimal(value: &Value) -> Result<Option<f64>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| format!("invalid number: {n}")),
        Value::String(s) => {
            if is_placeholder(s) {
                return Ok(None);
            }
            let found = SIGNED_DECIMAL_RE
                .find(s)
                .ok_or_else(|| format!("not a number: '{}'", s.trim()))?;
            found
                .as_str()
                .replace(',', ".")
                .parse::<f64>()
                .map(Some)
                .map_err(|e| format!("not a number: '{}' ({e})", s.trim()))
        }
        other => Err(format!("expected a number, got {}", describe(other))),
    }
}

/// Coerce to an amount plus an optional currency.
pub fn coerce_money(value: &Value) -> Result<Option<Money>, String> {
    let money = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.as_f64().map(|amount| Money {
            amount,
            currency: None,
        }),
        Value::String(s) => {
            if is_placeholder(s) {
                return Ok(None);
            }
            Some(parse_money(s).ok_or_else(|| format!("not an amount: '{}'", s.trim()))?)
        }
        Value::Object(obj) => {
            let amount = ["amount", "value"]
                .iter()
                .find_map(|k| obj.get(*k))
                .map(coerce_money)
                .transpose()?
                .flatten();
            let currency = ["currency", "currencyCode"]
                .iter()
                .find_map(|k| obj.get(*k))
                .and_then(scalar_text)
                .and_then(|c| currency_code(&c));
            amount.map(|m| Money {
                amount: m.amount,
                currency: currency.or(m.currency),
            })
        }
        other => return Err(format!("expected an amount, got {}", describe(other))),
    };

    match money {
        Some(m) if !m.amount.is_finite() || m.amount < 0.0 => {
            Err(format!("invalid amount: {}", m.amount))
        }
        other => Ok(other),
    }
}

/// Coerce to an ISO-4217 currency code.
pub fn coerce_currency(value: &Value) -> Result<Option<String>, String> {
    match coerce_text(value)? {
        None => Ok(None),
        Some(text) => currency_code(&text)
            .map(Some)
            .ok_or_else(|| format!("not a currency code: '{text}'")),
    }
}

fn object_text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| obj.get(*k).and_then(scalar_text))
}

fn list_items(value: &Value) -> Result<Vec<&Value>, String> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items.iter().collect()),
        Value::String(_) | Value::Number(_) | Value::Object(_) => Ok(vec![value]),
        other => Err(format!("expected a list, got {}", describe(other))),
    }
}

/// Coerce to an order-preserving list of distinct strings.
///
/// Objects contribute their `name`-like key. With `case_insensitive` the
/// first spelling of a value wins.
pub fn coerce_string_list(value: &Value, case_insensitive: bool) -> Result<Vec<String>, String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for item in list_items(value)? {
        let text = match item {
            Value::Object(obj) => object_text(
                obj,
                &["name", "title", "value", "code", "format", "url", "label"],
            ),
            Value::Array(_) => return Err("nested list where text expected".to_string()),
            other => scalar_text(other),
        };
        let Some(text) = text else { continue };
        let key = if case_insensitive {
            text.to_lowercase()
        } else {
            text.clone()
        };
        if seen.insert(key) {
            out.push(text);
        }
    }
    Ok(out)
}

fn coerce_sub_records<T, F>(value: &Value, build: F) -> Result<Vec<T>, String>
where
    T: SubRecord,
    F: Fn(&Value) -> Result<T, String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for item in list_items(value)? {
        let record = build(item)?;
        if let Some(key) = record.natural_key() {
            if seen.insert(key) {
                out.push(record);
            }
        }
    }
    Ok(out)
}

fn expect_object<'a>(item: &'a Value, what: &str) -> Result<&'a Map<String, Value>, String> {
    item.as_object()
        .ok_or_else(|| format!("{what} entry must be an object, got {}", describe(item)))
}

pub fn coerce_people(value: &Value) -> Result<Vec<Person>, String> {
    coerce_sub_records(value, |item| match item {
        Value::String(s) => Ok(Person {
            name: clean_text(s),
            ..Person::default()
        }),
        _ => {
            let obj = expect_object(item, "person")?;
            Ok(Person {
                name: object_text(obj, &["name", "fullName", "full_name"]),
                title: object_text(obj, &["title", "jobTitle", "job_title", "position"]),
                url: object_text(obj, &["url", "profileUrl", "profile_url", "link"]),
            })
        }
    })
}

pub fn coerce_tech_stack(value: &Value) -> Result<Vec<TechStackItem>, String> {
    coerce_sub_records(value, |item| {
        let obj = expect_object(item, "tech stack")?;
        Ok(TechStackItem {
            company_name: object_text(obj, &["company_name", "companyName", "vendor"]),
            tech_name: object_text(obj, &["tech_name", "techName", "product", "name"]),
        })
    })
}

pub fn coerce_news(value: &Value) -> Result<Vec<NewsItem>, String> {
    coerce_sub_records(value, |item| {
        let obj = expect_object(item, "news")?;
        Ok(NewsItem {
            title: object_text(obj, &["title", "headline", "name"]),
            url: object_text(obj, &["url", "link", "href"]),
        })
    })
}

pub fn coerce_scoops(value: &Value) -> Result<Vec<ScoopItem>, String> {
    coerce_sub_records(value, |item| match item {
        Value::String(s) => Ok(ScoopItem {
            title: clean_text(s),
            ..ScoopItem::default()
        }),
        _ => {
            let obj = expect_object(item, "scoop")?;
            Ok(ScoopItem {
                title: object_text(obj, &["title", "headline", "description"]),
                date: object_text(obj, &["date", "published", "publishedDate"]),
                url: object_text(obj, &["url", "link"]),
            })
        }
    })
}

// --- Normalizer ---

/// Builds [`CompanyRecord`]s from raw field sets.
#[derive(Debug, Clone)]
pub struct Normalizer {
    fallback_currency: String,
}

struct Fields<'a>(&'a RawFieldSet);

impl Fields<'_> {
    fn apply<T, F>(&self, field: FieldName, coerce: F) -> Result<Option<T>, NormalizeFailure>
    where
        F: Fn(&Value) -> Result<Option<T>, String>,
    {
        match self.0.get(field) {
            None => Ok(None),
            Some(value) => coerce(value).map_err(|reason| NormalizeFailure::new(field, reason)),
        }
    }

    fn list<T, F>(&self, field: FieldName, coerce: F) -> Result<Vec<T>, NormalizeFailure>
    where
        F: Fn(&Value) -> Result<Vec<T>, String>,
    {
        Ok(self
            .apply(field, |v| coerce(v).map(Some))?
            .unwrap_or_default())
    }

    fn text(&self, field: FieldName) -> Result<Option<String>, NormalizeFailure> {
        self.apply(field, coerce_text)
    }

    fn count(&self, field: FieldName) -> Result<Option<u64>, NormalizeFailure> {
        self.apply(field, coerce_count)
    }

    fn decimal(&self, field: FieldName) -> Result<Option<f64>, NormalizeFailure> {
        self.apply(field, coerce_decimal)
    }

    fn money(&self, field: FieldName) -> Result<Option<Money>, NormalizeFailure> {
        self.apply(field, coerce_money)
    }

    fn currency(&self, field: FieldName) -> Result<Option<String>, NormalizeFailure> {
        self.apply(field, coerce_currency)
    }

    fn strings(&self, field: FieldName) -> Result<Vec<String>, NormalizeFailure> {
        self.list(field, |v| coerce_string_list(v, false))
    }
}

impl Normalizer {
    pub fn new(fallback_currency: impl Into<String>) -> Self {
        Self {
            fallback_currency: fallback_currency.into(),
        }
    }

    pub fn from_config(config: &NormalizeConfig) -> Self {
        Self::new(config.fallback_currency.clone())
    }

    pub fn fallback_currency(&self) -> &str {
        &self.fallback_currency
    }

    /// Coerce every field to its declared type and resolve currencies.
    pub fn normalize(&self, raw: &RawFieldSet) -> Result<CompanyRecord, NormalizeFailure> {
        let f = Fields(raw);

        let revenue = f.money(FieldName::Revenue)?;
        let revenue_currency = match &revenue {
            Some(money) => Some(
                f.currency(FieldName::RevenueCurrency)?
                    .or_else(|| money.currency.clone())
                    .unwrap_or_else(|| self.fallback_currency.clone()),
            ),
            None => None,
        };

        let total_funding = f.money(FieldName::TotalFundingAmount)?;
        let recent_funding = f.money(FieldName::MostRecentFundingAmount)?;
        let funding_currency = if total_funding.is_some() || recent_funding.is_some() {
            Some(
                f.currency(FieldName::FundingCurrency)?
                    .or_else(|| total_funding.as_ref().and_then(|m| m.currency.clone()))
                    .or_else(|| recent_funding.as_ref().and_then(|m| m.currency.clone()))
                    .unwrap_or_else(|| self.fallback_currency.clone()),
            )
        } else {
            None
        };

        let employees = f.count(FieldName::Employees)?;
        let total_employees = f.count(FieldName::TotalEmployees)?.or(employees);

        let funding_rounds = f.count(FieldName::FundingRounds)?;
        if funding_rounds.unwrap_or(0) > 0 && total_funding.is_none() && recent_funding.is_none()
        {
            log::debug!(
                "{}: {} funding round(s) without amounts, keeping partial data",
                raw.url,
                funding_rounds.unwrap_or(0)
            );
        }

        Ok(CompanyRecord {
            url: raw.url.clone(),
            id: f.text(FieldName::Id)?,
            name: f.text(FieldName::Name)?,
            description: f.text(FieldName::Description)?,
            revenue: revenue.map(|m| m.amount),
            revenue_currency,
            stock_symbol: f.text(FieldName::StockSymbol)?,
            website: f.text(FieldName::Website)?,
            employees,
            industry: f.list(FieldName::Industry, |v| coerce_string_list(v, true))?,
            headquarters: f.text(FieldName::Headquarters)?,
            phone_number: f.text(FieldName::PhoneNumber)?,
            total_funding_amount: total_funding.map(|m| m.amount),
            most_recent_funding_amount: recent_funding.map(|m| m.amount),
            funding_currency,
            funding_rounds,
            leadership: f.list(FieldName::Leadership, coerce_people)?,
            popular_searches: f.strings(FieldName::PopularSearches)?,
            business_classification_codes: f.strings(FieldName::BusinessClassificationCodes)?,
            total_employees,
            c_level_employees: f.count(FieldName::CLevelEmployees)?,
            vp_level_employees: f.count(FieldName::VpLevelEmployees)?,
            director_level_employees: f.count(FieldName::DirectorLevelEmployees)?,
            manager_level_employees: f.count(FieldName::ManagerLevelEmployees)?,
            non_manager_employees: f.count(FieldName::NonManagerEmployees)?,
            top_contacts: f.count(FieldName::TopContacts)?,
            org_chart: f.list(FieldName::OrgChart, coerce_people)?,
            social_media: f.strings(FieldName::SocialMedia)?,
            ceo_rating: f.decimal(FieldName::CeoRating)?,
            enps_score: f.decimal(FieldName::EnpsScore)?,
            similar_companies: f.strings(FieldName::SimilarCompanies)?,
            email_formats: f.strings(FieldName::EmailFormats)?,
            products_owned: f.strings(FieldName::ProductsOwned)?,
            tech_stack: f.list(FieldName::TechStack, coerce_tech_stack)?,
            recent_scoops: f.list(FieldName::RecentScoops, coerce_scoops)?,
            news_and_media: f.list(FieldName::NewsAndMedia, coerce_news)?,
        })
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::from_config(&NormalizeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://www.zoominfo.com/c/immersed-games/358891608";

    fn raw(fields: &[(FieldName, Value)]) -> RawFieldSet {
        let mut set = RawFieldSet::new(URL);
        for (field, value) in fields {
            set.insert(*field, value.clone());
        }
        set
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Immersed \n  Games "), Some("Immersed Games".into()));
        assert_eq!(clean_text("   "), None);
        assert_eq!(clean_text("N/A"), None);
        assert_eq!(clean_text("-"), None);
    }

    #[test]
    fn test_parse_decimal_separators() {
        assert_eq!(parse_decimal("5,000,000"), Some(5_000_000.0));
        assert_eq!(parse_decimal("5.000.000"), Some(5_000_000.0));
        assert_eq!(parse_decimal("5.000.000,50"), Some(5_000_000.5));
        assert_eq!(parse_decimal("5,000,000.50"), Some(5_000_000.5));
        assert_eq!(parse_decimal("1,5"), Some(1.5));
        assert_eq!(parse_decimal("1 250"), Some(1250.0));
        assert_eq!(parse_decimal("3.7"), Some(3.7));
    }

    #[test]
    fn test_parse_money_suffixes_and_symbols() {
        assert_eq!(
            parse_money("$5.2M"),
            Some(Money {
                amount: 5_200_000.0,
                currency: Some("USD".into())
            })
        );
        assert_eq!(
            parse_money("5,000,000 USD"),
            Some(Money {
                amount: 5_000_000.0,
                currency: Some("USD".into())
            })
        );
        assert_eq!(
            parse_money("€1.2 Billion"),
            Some(Money {
                amount: 1_200_000_000.0,
                currency: Some("EUR".into())
            })
        );
        assert_eq!(
            parse_money("5.000.000 €").map(|m| m.currency),
            Some(Some("EUR".into()))
        );
        assert_eq!(
            parse_money("<$5 Million"),
            Some(Money {
                amount: 5_000_000.0,
                currency: Some("USD".into())
            })
        );
        assert_eq!(parse_money("500K").map(|m| m.amount), Some(500_000.0));
        assert_eq!(parse_money("undisclosed"), None);

        assert_eq!(
            parse_money("$1 - 5 Million"),
            Some(Money {
                amount: 1_000_000.0,
                currency: Some("USD".into())
            })
        );
        assert_eq!(
            parse_money("$25-50 Million").map(|m| m.amount),
            Some(25_000_000.0)
        );
        assert_eq!(
            parse_money("€1 to 5 billion").map(|m| m.amount),
            Some(1_000_000_000.0)
        );
        assert_eq!(
            parse_money("$500K - $1M").map(|m| m.amount),
            Some(500_000.0)
        );
    }

    #[test]
    fn test_currency_code_must_be_known() {
        assert_eq!(parse_money("5.2 MLN").map(|m| m.currency), Some(None));
        assert_eq!(
            parse_money("5M ARR in CHF").map(|m| m.currency),
            Some(Some("CHF".into()))
        );
        assert_eq!(
            parse_money("$5M ARR").map(|m| m.currency),
            Some(Some("USD".into()))
        );
    }

    #[test]
    fn test_revenue_range_keeps_magnitude() {
        let record = Normalizer::new("USD")
            .normalize(&raw(&[(FieldName::Revenue, json!("$25-50 Million"))]))
            .unwrap();
        assert_eq!(record.revenue, Some(25_000_000.0));
        assert_eq!(record.revenue_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_coerce_count() {
        assert_eq!(coerce_count(&json!(42)), Ok(Some(42)));
        assert_eq!(coerce_count(&json!("1,234")), Ok(Some(1234)));
        assert_eq!(coerce_count(&json!("51-200 employees")), Ok(Some(51)));
        assert_eq!(coerce_count(&json!("1.5K")), Ok(Some(1500)));
        assert_eq!(coerce_count(&json!("10-50K")), Ok(Some(10_000)));
        assert_eq!(coerce_count(&json!("n/a")), Ok(None));
        assert!(coerce_count(&json!("lots")).is_err());
        assert!(coerce_count(&json!(-3)).is_err());
        assert!(coerce_count(&json!("-3")).is_err());
        assert!(coerce_count(&json!({"value": 3})).is_err());
    }

    #[test]
    fn test_coerce_decimal() {
        assert_eq!(coerce_decimal(&json!("4.2/5")), Ok(Some(4.2)));
        assert_eq!(coerce_decimal(&json!("-12")), Ok(Some(-12.0)));
        assert_eq!(coerce_decimal(&json!(72)), Ok(Some(72.0)));
        assert!(coerce_decimal(&json!("great")).is_err());
    }

    #[test]
    fn test_fallback_currency_applied() {
        let normalizer = Normalizer::new("USD");
        let record = normalizer
            .normalize(&raw(&[
                (FieldName::Name, json!("Immersed Games")),
                (FieldName::Revenue, json!(5_000_000)),
            ]))
            .unwrap();

        assert_eq!(record.name.as_deref(), Some("Immersed Games"));
        assert_eq!(record.revenue, Some(5_000_000.0));
        assert_eq!(record.revenue_currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_embedded_currency_beats_fallback() {
        let record = Normalizer::new("USD")
            .normalize(&raw(&[(FieldName::Revenue, json!("£3M"))]))
            .unwrap();
        assert_eq!(record.revenue, Some(3_000_000.0));
        assert_eq!(record.revenue_currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_currency_without_amount_is_dropped() {
        let record = Normalizer::default()
            .normalize(&raw(&[(FieldName::RevenueCurrency, json!("EUR"))]))
            .unwrap();
        assert_eq!(record.revenue, None);
        assert_eq!(record.revenue_currency, None);
    }

    #[test]
    fn test_funding_rounds_without_amounts_tolerated() {
        let record = Normalizer::default()
            .normalize(&raw(&[(FieldName::FundingRounds, json!(3))]))
            .unwrap();
        assert_eq!(record.funding_rounds, Some(3));
        assert_eq!(record.total_funding_amount, None);
        assert_eq!(record.funding_currency, None);
    }

    #[test]
    fn test_garbage_numeric_field_fails() {
        let err = Normalizer::default()
            .normalize(&raw(&[(FieldName::Employees, json!("a great many"))]))
            .unwrap_err();
        assert_eq!(err.field, FieldName::Employees);
    }

    #[test]
    fn test_malformed_currency_fails() {
        let err = Normalizer::default()
            .normalize(&raw(&[
                (FieldName::Revenue, json!(10)),
                (FieldName::RevenueCurrency, json!("dollars")),
            ]))
            .unwrap_err();
        assert_eq!(err.field, FieldName::RevenueCurrency);
    }

    #[test]
    fn test_leadership_dedup_by_url_keeps_first() {
        let record = Normalizer::default()
            .normalize(&raw(&[(
                FieldName::Leadership,
                json!([
                    {"name": "Jane Doe", "title": "CEO", "url": "https://www.zoominfo.com/p/jane/1"},
                    {"name": "John Roe", "title": "CTO", "url": "https://www.zoominfo.com/p/john/2"},
                    {"name": "Jane D.", "title": "Chief Executive", "url": "https://www.zoominfo.com/p/jane/1"},
                ]),
            )]))
            .unwrap();

        let names: Vec<_> = record
            .leadership
            .iter()
            .map(|p| p.name.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Jane Doe", "John Roe"]);
    }

    #[test]
    fn test_industry_is_case_insensitive_set() {
        let record = Normalizer::default()
            .normalize(&raw(&[(
                FieldName::Industry,
                json!(["Software", " software ", "Education", ""]),
            )]))
            .unwrap();
        assert_eq!(record.industry, vec!["Software", "Education"]);
    }

    #[test]
    fn test_total_employees_defaults_to_employees() {
        let record = Normalizer::default()
            .normalize(&raw(&[(FieldName::Employees, json!("24"))]))
            .unwrap();
        assert_eq!(record.total_employees, Some(24));
    }

    #[test]
    fn test_missing_leadership_is_empty_not_error() {
        let record = Normalizer::default()
            .normalize(&raw(&[(FieldName::Name, json!("Acme"))]))
            .unwrap();
        assert!(record.leadership.is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let first = Normalizer::new("USD")
            .normalize(&raw(&[
                (FieldName::Id, json!("358891608")),
                (FieldName::Name, json!("  Immersed   Games ")),
                (FieldName::Revenue, json!("$5M")),
                (FieldName::Employees, json!("21")),
                (FieldName::Industry, json!(["Software", "Education"])),
                (FieldName::CeoRating, json!("4.5/5")),
                (FieldName::TotalFundingAmount, json!("€250K")),
                (
                    FieldName::Leadership,
                    json!([{"name": "Jane", "title": "CEO", "url": "https://x.test/p/1"}]),
                ),
                (
                    FieldName::TechStack,
                    json!([{"companyName": "Amazon", "techName": "AWS"}]),
                ),
                (
                    FieldName::RecentScoops,
                    json!([{"title": "Hiring", "date": "2024-01-02"}]),
                ),
            ]))
            .unwrap();

        let second = Normalizer::new("USD")
            .normalize(&RawFieldSet::from(&first))
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(second.funding_currency.as_deref(), Some("EUR"));
    }
}
