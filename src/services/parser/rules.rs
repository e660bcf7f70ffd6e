// src/services/parser/rules.rs

//! Field extraction rules.
//!
//! Every field has its own rule. A rule looks at the JSON-LD organization
//! first, then the embedded page state, then the HTML fallbacks, and
//! returns the first plausible value it finds. Rules never fail; a field
//! nobody can locate is simply absent.

use std::collections::HashSet;

use scraper::ElementRef;
use serde_json::{Value, json};

use super::context::{PageContext, element_text};
use super::sanity;
use crate::models::FieldName;
use crate::services::normalizer::scalar_text;
use crate::utils::{bare_domain, extract_company_id, resolve};

pub type Rule = fn(&PageContext) -> Option<Value>;

/// Rule for each field, in record order.
pub const RULES: [(FieldName, Rule); 35] = [
    (FieldName::Id, id),
    (FieldName::Name, name),
    (FieldName::Description, description),
    (FieldName::Revenue, revenue),
    (FieldName::RevenueCurrency, revenue_currency),
    (FieldName::StockSymbol, stock_symbol),
    (FieldName::Website, website),
    (FieldName::Employees, employees),
    (FieldName::Industry, industry),
    (FieldName::Headquarters, headquarters),
    (FieldName::PhoneNumber, phone_number),
    (FieldName::TotalFundingAmount, total_funding_amount),
    (FieldName::MostRecentFundingAmount, most_recent_funding_amount),
    (FieldName::FundingCurrency, funding_currency),
    (FieldName::FundingRounds, funding_rounds),
    (FieldName::Leadership, leadership),
    (FieldName::PopularSearches, popular_searches),
    (FieldName::BusinessClassificationCodes, business_classification_codes),
    (FieldName::TotalEmployees, total_employees),
    (FieldName::CLevelEmployees, c_level_employees),
    (FieldName::VpLevelEmployees, vp_level_employees),
    (FieldName::DirectorLevelEmployees, director_level_employees),
    (FieldName::ManagerLevelEmployees, manager_level_employees),
    (FieldName::NonManagerEmployees, non_manager_employees),
    (FieldName::TopContacts, top_contacts),
    (FieldName::OrgChart, org_chart),
    (FieldName::SocialMedia, social_media),
    (FieldName::CeoRating, ceo_rating),
    (FieldName::EnpsScore, enps_score),
    (FieldName::SimilarCompanies, similar_companies),
    (FieldName::EmailFormats, email_formats),
    (FieldName::ProductsOwned, products_owned),
    (FieldName::TechStack, tech_stack),
    (FieldName::RecentScoops, recent_scoops),
    (FieldName::NewsAndMedia, news_and_media),
];

// --- Shared helpers ---

/// Candidate sources for one field, tried in priority order.
///
/// The first value that passes its sanity check wins. A rejected value
/// falls through to the next source.
struct Sources<'c, 'a> {
    cx: &'c PageContext<'a>,
    field: FieldName,
    found: Option<Value>,
}

impl<'c, 'a> Sources<'c, 'a> {
    fn new(cx: &'c PageContext<'a>, field: FieldName) -> Self {
        Self {
            cx,
            field,
            found: None,
        }
    }

    fn or(mut self, source: impl FnOnce() -> Option<Value>) -> Self {
        if self.found.is_some() {
            return self;
        }
        if let Some(value) = source() {
            match sanity::check(self.field, &value, self.cx.url) {
                Ok(()) => self.found = Some(value),
                Err(reason) => log::warn!(
                    "{}: skipping implausible {}: {}",
                    self.cx.url,
                    self.field,
                    reason
                ),
            }
        }
        self
    }

    /// State value, then the labelled block's text.
    fn scalar(self, aliases: &[&str]) -> Self {
        let (cx, field) = (self.cx, self.field);
        self.or(|| cx.state_field(field, aliases))
            .or(|| cx.labelled_text(field).map(text))
    }

    /// State value, then the items of the labelled block.
    fn list(self, aliases: &[&str]) -> Self {
        let (cx, field) = (self.cx, self.field);
        self.or(|| cx.state_field(field, aliases)).or(|| {
            let items = cx.labelled_list(field).into_iter().map(text).collect();
            non_empty(items)
        })
    }

    fn value(self) -> Option<Value> {
        self.found
    }
}

fn text(s: String) -> Value {
    Value::String(s)
}

fn non_empty(items: Vec<Value>) -> Option<Value> {
    (!items.is_empty()).then_some(Value::Array(items))
}

/// Value of a JSON-LD `additionalProperty` whose name contains one of `names`.
fn ld_property(cx: &PageContext, names: &[&str]) -> Option<Value> {
    cx.ld("additionalProperty")?
        .as_array()?
        .iter()
        .find_map(|prop| {
            let label = prop.get("name")?.as_str()?.to_lowercase();
            if names.iter().any(|n| label.contains(n)) {
                prop.get("value").filter(|v| !v.is_null()).cloned()
            } else {
                None
            }
        })
}

fn off_site(cx: &PageContext, url: &str) -> bool {
    match (bare_domain(url), bare_domain(cx.url)) {
        (Some(link), Some(page)) => link != page,
        _ => true,
    }
}

/// Bare domains like `immersedgames.com` become `https://immersedgames.com`.
fn as_website(raw: &str) -> String {
    let raw = raw.trim();
    let bare = !raw.contains("://") && !raw.contains(' ') && !raw.contains('@');
    if bare && raw.contains('.') {
        format!("https://{}", raw.trim_start_matches("//"))
    } else {
        raw.to_string()
    }
}

/// Drop repeated entries, keyed by URL when present, else by their text.
pub fn dedup_values(items: Vec<Value>) -> Vec<Value> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| value_key(item).is_some_and(|key| seen.insert(key)))
        .collect()
}

fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Object(obj) => {
            let url = ["url", "link", "profileUrl"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(scalar_text));
            if let Some(url) = url {
                return Some(url.trim_end_matches('/').to_lowercase());
            }
            let parts: Vec<String> = obj
                .values()
                .filter_map(scalar_text)
                .map(|s| s.to_lowercase())
                .collect();
            (!parts.is_empty()).then(|| parts.join("\u{1f}"))
        }
        other => scalar_text(other).map(|s| s.to_lowercase()),
    }
}

fn format_address(value: &Value) -> Option<Value> {
    const PARTS: [&str; 10] = [
        "streetAddress",
        "street",
        "addressLocality",
        "city",
        "addressRegion",
        "state",
        "postalCode",
        "zip",
        "addressCountry",
        "country",
    ];
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Array(items) => items.first().and_then(format_address),
        Value::Object(obj) => {
            let parts: Vec<String> = PARTS
                .iter()
                .filter_map(|k| obj.get(*k))
                .filter_map(|v| match v {
                    Value::Object(inner) => inner.get("name").and_then(scalar_text),
                    other => scalar_text(other),
                })
                .collect();
            (!parts.is_empty()).then(|| text(parts.join(", ")))
        }
        _ => None,
    }
}

fn ld_person(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => Some(json!({ "name": s })),
        Value::Object(obj) => {
            let field = |k: &str| obj.get(k).and_then(scalar_text);
            let name = field("name")?;
            Some(json!({ "name": name, "title": field("jobTitle"), "url": field("url") }))
        }
        _ => None,
    }
}

fn ld_people(cx: &PageContext, keys: &[&str]) -> Option<Value> {
    let people: Vec<Value> = keys
        .iter()
        .filter_map(|k| cx.ld(k))
        .flat_map(|v| match v {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        })
        .filter_map(|v| ld_person(&v))
        .collect();
    non_empty(dedup_values(people))
}

fn href(cx: &PageContext, element: &ElementRef) -> Option<String> {
    element
        .select(&cx.sel.anchor)
        .chain(std::iter::once(*element))
        .find_map(|a| a.value().attr("href"))
        .and_then(|h| resolve(cx.url, h))
}

/// People cards inside a labelled block.
fn html_people(cx: &PageContext, field: FieldName) -> Option<Value> {
    let block = cx.labelled_element(field)?;
    let people: Vec<Value> = block
        .select(&cx.sel.person)
        .filter_map(|card| {
            let name = card
                .select(&cx.sel.person_name)
                .find_map(|e| element_text(&e))?;
            let title = card
                .select(&cx.sel.person_title)
                .find_map(|e| element_text(&e));
            Some(json!({ "name": name, "title": title, "url": href(cx, &card) }))
        })
        .collect();
    non_empty(dedup_values(people))
}

fn breakdown_level(label: &str) -> Option<FieldName> {
    let label = label.to_lowercase();
    if label.contains("non") && label.contains("manager") {
        Some(FieldName::NonManagerEmployees)
    } else if label.contains("c-level") || label.contains("c level") || label.contains("c-suite")
    {
        Some(FieldName::CLevelEmployees)
    } else if label.contains("vp") || label.contains("vice president") {
        Some(FieldName::VpLevelEmployees)
    } else if label.contains("director") {
        Some(FieldName::DirectorLevelEmployees)
    } else if label.contains("manager") {
        Some(FieldName::ManagerLevelEmployees)
    } else if label.contains("total") {
        Some(FieldName::TotalEmployees)
    } else {
        None
    }
}

/// Employee breakdown: `employeeBreakdown.<key>` in state, else the table row.
fn breakdown(cx: &PageContext, field: FieldName, state_key: &str) -> Option<Value> {
    let path = format!("employeeBreakdown.{state_key}");
    Sources::new(cx, field)
        .or(|| cx.state_field(field, &[path.as_str()]))
        .or(|| {
            cx.document.select(&cx.sel.breakdown_row).find_map(|row| {
                let cells: Vec<String> = row
                    .select(&cx.sel.breakdown_cell)
                    .filter_map(|c| element_text(&c))
                    .collect();
                match cells.as_slice() {
                    [label, .., value] if breakdown_level(label) == Some(field) => {
                        Some(text(value.clone()))
                    }
                    _ => None,
                }
            })
        })
        .value()
}

// --- Scalar fields ---

fn id(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Id)
        .or(|| {
            cx.ld("@id")
                .and_then(Value::as_str)
                .and_then(extract_company_id)
                .map(text)
        })
        .or(|| cx.state_field(FieldName::Id, &["companyId"]))
        .or(|| extract_company_id(cx.url).map(text))
        .value()
}

/// `Acme - Overview, News & Competitors | ZoomInfo.com` -> `Acme`
fn strip_title_suffix(title: &str) -> String {
    title
        .split(" | ")
        .next()
        .and_then(|t| t.split(" - ").next())
        .unwrap_or(title)
        .trim()
        .to_string()
}

fn name(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Name)
        .or(|| cx.ld("name").cloned())
        .or(|| cx.state_field(FieldName::Name, &["companyName", "displayName"]))
        .or(|| cx.labelled_text(FieldName::Name).map(text))
        .or(|| {
            cx.meta_content(&cx.sel.og_title)
                .map(|t| text(strip_title_suffix(&t)))
        })
        .or(|| cx.first_text(&cx.sel.h1).map(text))
        .value()
}

fn description(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Description)
        .or(|| cx.ld("description").cloned())
        .scalar(&["companyDescription", "overview"])
        .or(|| cx.meta_content(&cx.sel.meta_description).map(text))
        .value()
}

fn revenue(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Revenue)
        .or(|| ld_property(cx, &["revenue"]))
        .scalar(&["revenueText", "companyRevenue", "revenueRange"])
        .value()
}

fn revenue_currency(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::RevenueCurrency)
        .scalar(&["revenueCurrency", "currency"])
        .value()
}

fn stock_symbol(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::StockSymbol)
        .or(|| cx.ld("tickerSymbol").cloned())
        .scalar(&["ticker", "tickerSymbol"])
        .value()
}

fn website(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Website)
        .or(|| {
            cx.ld("url")
                .and_then(Value::as_str)
                .map(as_website)
                .filter(|w| off_site(cx, w))
                .map(text)
        })
        .or(|| {
            cx.state_field(FieldName::Website, &["domain", "companyUrl", "websiteUrl"])
                .and_then(|v| scalar_text(&v))
                .map(|w| text(as_website(&w)))
        })
        .or(|| {
            cx.link_href(&cx.sel.website_link)
                .filter(|w| off_site(cx, w))
                .map(text)
        })
        .or(|| {
            cx.labelled_text(FieldName::Website)
                .map(|w| text(as_website(&w)))
        })
        .value()
}

fn employees(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Employees)
        .or(|| {
            cx.ld("numberOfEmployees").and_then(|v| match v {
                Value::Object(obj) => obj
                    .get("value")
                    .or_else(|| obj.get("minValue"))
                    .filter(|v| !v.is_null())
                    .cloned(),
                other => Some(other.clone()),
            })
        })
        .scalar(&["employeeCount", "numberOfEmployees", "employeesRange"])
        .value()
}

fn industry(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Industry)
        .or(|| cx.ld("industry").cloned())
        .or(|| cx.state_field(FieldName::Industry, &["industries", "industryList"]))
        .or(|| {
            let mut items = cx.labelled_list(FieldName::Industry);
            if items.is_empty() {
                items = cx.all_texts(&cx.sel.industry);
            }
            non_empty(dedup_values(items.into_iter().map(text).collect()))
        })
        .value()
}

fn headquarters(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Headquarters)
        .or(|| cx.ld("address").and_then(format_address))
        .or(|| {
            cx.state_field(FieldName::Headquarters, &["address", "hq", "location"])
                .and_then(|v| format_address(&v))
        })
        .or(|| {
            cx.sel
                .address
                .iter()
                .find_map(|s| cx.first_text(s))
                .map(text)
        })
        .value()
}

fn phone_number(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::PhoneNumber)
        .or(|| cx.ld("telephone").cloned())
        .or(|| cx.state_field(FieldName::PhoneNumber, &["phone", "telephone"]))
        .or(|| {
            cx.link_href(&cx.sel.phone_link)
                .map(|h| text(h.trim_start_matches("tel:").trim().to_string()))
        })
        .or(|| cx.labelled_text(FieldName::PhoneNumber).map(text))
        .value()
}

fn total_funding_amount(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::TotalFundingAmount)
        .or(|| ld_property(cx, &["total funding"]))
        .scalar(&["fundingAmount", "totalFunding", "funding.totalAmount"])
        .value()
}

fn most_recent_funding_amount(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::MostRecentFundingAmount)
        .or(|| ld_property(cx, &["recent funding", "last funding"]))
        .scalar(&["latestFundingAmount", "funding.mostRecentAmount"])
        .value()
}

fn funding_currency(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::FundingCurrency)
        .scalar(&["funding.currency"])
        .value()
}

fn funding_rounds(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::FundingRounds)
        .scalar(&["numberOfFundingRounds", "funding.rounds"])
        .value()
}

fn top_contacts(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::TopContacts)
        .scalar(&["topContactsCount", "contactsCount"])
        .value()
}

fn ceo_rating(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::CeoRating)
        .scalar(&["ceoApprovalRating", "ceo.rating"])
        .value()
}

fn enps_score(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::EnpsScore)
        .scalar(&["eNPS", "enps"])
        .value()
}

// --- Employee breakdown ---

fn total_employees(cx: &PageContext) -> Option<Value> {
    breakdown(cx, FieldName::TotalEmployees, "total")
}

fn c_level_employees(cx: &PageContext) -> Option<Value> {
    breakdown(cx, FieldName::CLevelEmployees, "cLevel")
}

fn vp_level_employees(cx: &PageContext) -> Option<Value> {
    breakdown(cx, FieldName::VpLevelEmployees, "vpLevel")
}

fn director_level_employees(cx: &PageContext) -> Option<Value> {
    breakdown(cx, FieldName::DirectorLevelEmployees, "directorLevel")
}

fn manager_level_employees(cx: &PageContext) -> Option<Value> {
    breakdown(cx, FieldName::ManagerLevelEmployees, "managerLevel")
}

fn non_manager_employees(cx: &PageContext) -> Option<Value> {
    breakdown(cx, FieldName::NonManagerEmployees, "nonManager")
}

// --- Lists ---

fn popular_searches(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::PopularSearches)
        .list(&["searches"])
        .value()
}

fn business_classification_codes(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::BusinessClassificationCodes)
        .or(|| {
            let codes: Vec<Value> = ["sicCodes", "naicsCodes"]
                .iter()
                .filter_map(|k| cx.state_value(&[*k]))
                .flat_map(|v| match v {
                    Value::Array(items) => items,
                    other => vec![other],
                })
                .collect();
            non_empty(codes)
        })
        .list(&[])
        .value()
}

fn social_media(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::SocialMedia)
        .or(|| {
            let links: Vec<Value> = match cx.ld("sameAs")? {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            };
            let links: Vec<Value> = links
                .into_iter()
                .filter(|l| l.as_str().is_some_and(|s| off_site(cx, s)))
                .collect();
            non_empty(dedup_values(links))
        })
        .or(|| cx.state_field(FieldName::SocialMedia, &["socialLinks", "socialProfiles"]))
        .or(|| {
            let block = cx.labelled_element(FieldName::SocialMedia)?;
            let links: Vec<Value> = block
                .select(&cx.sel.anchor)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|h| resolve(cx.url, h))
                .map(text)
                .collect();
            non_empty(dedup_values(links))
        })
        .value()
}

fn similar_companies(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::SimilarCompanies)
        .list(&["competitors", "similarCompaniesList"])
        .value()
}

fn email_formats(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::EmailFormats)
        .list(&["emailPatterns"])
        .value()
}

fn products_owned(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::ProductsOwned)
        .list(&["products"])
        .value()
}

// --- Sub-record lists ---

fn leadership(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::Leadership)
        .or(|| ld_people(cx, &["employee", "employees", "founder", "founders"]))
        .or(|| cx.state_field(FieldName::Leadership, &["executives", "keyPeople"]))
        .or(|| html_people(cx, FieldName::Leadership))
        .value()
}

fn org_chart(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::OrgChart)
        .or(|| cx.state_field(FieldName::OrgChart, &["orgChartPeople"]))
        .or(|| html_people(cx, FieldName::OrgChart))
        .value()
}

fn tech_stack(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::TechStack)
        .or(|| cx.state_field(FieldName::TechStack, &["technologies"]))
        .or(|| {
            let block = cx.labelled_element(FieldName::TechStack)?;
            let items: Vec<Value> = block
                .select(&cx.sel.tech_item)
                .filter_map(|item| {
                    let vendor = item
                        .select(&cx.sel.tech_vendor)
                        .find_map(|e| element_text(&e));
                    let tech = item
                        .select(&cx.sel.tech_name)
                        .find_map(|e| element_text(&e))
                        .or_else(|| element_text(&item))?;
                    Some(json!({ "company_name": vendor, "tech_name": tech }))
                })
                .collect();
            non_empty(dedup_values(items))
        })
        .value()
}

fn recent_scoops(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::RecentScoops)
        .or(|| cx.state_field(FieldName::RecentScoops, &["scoops"]))
        .or(|| {
            let block = cx.labelled_element(FieldName::RecentScoops)?;
            let items: Vec<Value> = block
                .select(&cx.sel.scoop_item)
                .filter_map(|item| {
                    let title = item
                        .select(&cx.sel.anchor)
                        .find_map(|a| element_text(&a))
                        .or_else(|| element_text(&item))?;
                    let date = item.select(&cx.sel.scoop_date).find_map(|d| {
                        d.value()
                            .attr("datetime")
                            .map(str::to_string)
                            .or_else(|| element_text(&d))
                    });
                    Some(json!({ "title": title, "date": date, "url": href(cx, &item) }))
                })
                .collect();
            non_empty(dedup_values(items))
        })
        .value()
}

fn news_and_media(cx: &PageContext) -> Option<Value> {
    Sources::new(cx, FieldName::NewsAndMedia)
        .or(|| cx.state_field(FieldName::NewsAndMedia, &["news", "newsArticles"]))
        .or(|| {
            let block = cx.labelled_element(FieldName::NewsAndMedia)?;
            let items: Vec<Value> = block
                .select(&cx.sel.anchor)
                .filter_map(|a| {
                    let title = element_text(&a)?;
                    let url = a.value().attr("href").and_then(|h| resolve(cx.url, h));
                    Some(json!({ "title": title, "url": url }))
                })
                .collect();
            non_empty(dedup_values(items))
        })
        .value()
}
