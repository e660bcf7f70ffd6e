// src/services/parser/mod.rs

//! Page parser.
//!
//! Locates every profile field on a fetched page and returns the raw,
//! untyped values. Typing and unit handling belong to the normalizer, apart
//! from money strings which are split into an amount and a currency here.

mod context;
mod rules;
mod sanity;

use scraper::Html;
use serde_json::{Value, json};

use crate::error::Result;
use crate::models::{FieldName, ParseFailure, RawFieldSet, RawPage};
use crate::services::normalizer::{is_placeholder, parse_money};
use crate::utils::{bare_domain, is_profile_url, resolve};

use context::{PageContext, Selectors};
pub use rules::dedup_values;

/// Headings of deleted or missing profiles.
const NOT_FOUND_MARKERS: [&str; 5] = [
    "page not found",
    "company not found",
    "no longer available",
    "this page doesn't exist",
    "error 404",
];

/// Extracts raw profile fields from HTML.
#[derive(Debug)]
pub struct ProfileParser {
    selectors: Selectors,
}

impl ProfileParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            selectors: Selectors::new()?,
        })
    }

    /// Parse one page into a raw field set.
    ///
    /// Fails with `not_a_profile` when the page carries no profile anchor
    /// and with `structure_changed` when the anchor is there but the company
    /// name cannot be located.
    pub fn parse(&self, page: &RawPage) -> std::result::Result<RawFieldSet, ParseFailure> {
        let document = Html::parse_document(&page.html_content);
        let cx = PageContext::new(&page.url, &document, &self.selectors);

        if page.was_redirected() && !is_profile_url(&page.final_url) {
            return Err(ParseFailure::not_a_profile(format!(
                "redirected to {}",
                page.final_url
            )));
        }
        check_anchor(&cx)?;

        let mut fields = RawFieldSet::new(page.url.clone());
        for (field, rule) in rules::RULES {
            if let Some(value) = rule(&cx) {
                fields.insert(field, value);
            }
        }

        if !fields.contains(FieldName::Name) {
            return Err(ParseFailure::structure_changed(
                "profile anchor present but company name not found",
            ));
        }

        split_money(&mut fields, FieldName::Revenue, FieldName::RevenueCurrency);
        split_money(
            &mut fields,
            FieldName::TotalFundingAmount,
            FieldName::FundingCurrency,
        );
        split_money(
            &mut fields,
            FieldName::MostRecentFundingAmount,
            FieldName::FundingCurrency,
        );

        let absent = fields.absent();
        if !absent.is_empty() {
            log::debug!(
                "{}: {} field(s) not on page: {}",
                page.url,
                absent.len(),
                absent
                    .iter()
                    .map(FieldName::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(fields)
    }
}

/// Confirm the page is a company profile.
///
/// The site's own pages (home, search, where deleted listings land) carry
/// an organization blob for the site itself and name a non-profile URL on
/// the site's host as their identity.
fn check_anchor(cx: &PageContext) -> std::result::Result<(), ParseFailure> {
    let heading = cx.heading_text();
    if let Some(marker) = NOT_FOUND_MARKERS.iter().find(|m| heading.contains(*m)) {
        return Err(ParseFailure::not_a_profile(format!(
            "page reports '{marker}'"
        )));
    }

    let identities: Vec<String> = [
        cx.ld("@id").and_then(Value::as_str).map(str::to_string),
        cx.ld("url").and_then(Value::as_str).map(str::to_string),
        cx.link_href(&cx.sel.canonical),
        cx.meta_content(&cx.sel.og_url),
    ]
    .into_iter()
    .flatten()
    .map(|u| resolve(cx.url, &u).unwrap_or(u))
    .collect();

    if identities.iter().any(|u| is_profile_url(u)) {
        return Ok(());
    }
    if let Some(own) = identities.iter().find(|u| same_site(u, cx.url)) {
        return Err(ParseFailure::not_a_profile(format!(
            "page identifies itself as {own}"
        )));
    }

    if cx.ld_org.is_some() || cx.state.is_some() {
        Ok(())
    } else {
        Err(ParseFailure::not_a_profile(
            "no organization data, page state or profile link on page",
        ))
    }
}

fn same_site(url: &str, page_url: &str) -> bool {
    match (bare_domain(url), bare_domain(page_url)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Replace a money string with its amount, moving any currency it carried
/// into `currency_field` unless that is already set.
fn split_money(fields: &mut RawFieldSet, amount_field: FieldName, currency_field: FieldName) {
    let Some(Value::String(raw)) = fields.get(amount_field) else {
        return;
    };
    if is_placeholder(raw) {
        return;
    }
    let Some(money) = parse_money(raw) else {
        return;
    };

    fields.insert(amount_field, json!(money.amount));
    if let Some(code) = money.currency {
        if !fields.contains(currency_field) {
            fields.insert(currency_field, Value::String(code));
        }
    }
}
