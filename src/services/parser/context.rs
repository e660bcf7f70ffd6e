// src/services/parser/context.rs

//! Parsed views of a profile page shared by the extraction rules.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::FieldName;
use crate::services::normalizer::clean_text;

/// Keys under which the embedded page state keeps the company object.
const STATE_ROOT_KEYS: [&str; 4] = ["pageData", "companyData", "companyInfo", "company"];
const STATE_SEARCH_DEPTH: usize = 6;

pub(crate) fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// CSS selectors used by the HTML fallbacks, compiled once per parser.
#[derive(Debug)]
pub struct Selectors {
    pub ld_json: Selector,
    pub state_json: Selector,
    pub og_title: Selector,
    pub og_url: Selector,
    pub canonical: Selector,
    pub meta_description: Selector,
    pub title: Selector,
    pub h1: Selector,
    pub value: Selector,
    pub anchor: Selector,
    pub industry: Selector,
    pub address: Vec<Selector>,
    pub phone_link: Selector,
    pub website_link: Selector,
    pub person: Selector,
    pub person_name: Selector,
    pub person_title: Selector,
    pub breakdown_row: Selector,
    pub breakdown_cell: Selector,
    pub list_item: Selector,
    pub tech_item: Selector,
    pub tech_vendor: Selector,
    pub tech_name: Selector,
    pub scoop_item: Selector,
    pub scoop_date: Selector,
    /// `[data-qa='<field-name>']` blocks, one per field
    pub labelled: HashMap<FieldName, Selector>,
}

impl Selectors {
    pub fn new() -> Result<Self> {
        let mut labelled = HashMap::new();
        for field in FieldName::ALL {
            let css = format!("[data-qa='{}']", field.as_str().replace('_', "-"));
            labelled.insert(field, parse_selector(&css)?);
        }

        Ok(Self {
            ld_json: parse_selector("script[type='application/ld+json']")?,
            state_json: parse_selector(
                "script#ng-state, script#__NEXT_DATA__, script[type='application/json']",
            )?,
            og_title: parse_selector("meta[property='og:title']")?,
            og_url: parse_selector("meta[property='og:url']")?,
            canonical: parse_selector("link[rel='canonical']")?,
            meta_description: parse_selector("meta[name='description']")?,
            title: parse_selector("title")?,
            h1: parse_selector("h1")?,
            value: parse_selector("[data-qa='value'], .value")?,
            anchor: parse_selector("a[href]")?,
            industry: parse_selector(".industry, .industries")?,
            address: vec![
                parse_selector("[data-qa='address']")?,
                parse_selector(".address")?,
                parse_selector(".hq")?,
                parse_selector(".headquarters")?,
            ],
            phone_link: parse_selector("a[href^='tel:']")?,
            website_link: parse_selector(
                "a[data-qa='website-link'], [data-qa='website'] a[href], a.website-link",
            )?,
            person: parse_selector("[data-qa='person'], .person")?,
            person_name: parse_selector("[data-qa='person-name'], .name")?,
            person_title: parse_selector("[data-qa='person-title'], .title")?,
            breakdown_row: parse_selector(
                "[data-qa='employee-breakdown'] tr, [data-qa='employee-breakdown'] li",
            )?,
            breakdown_cell: parse_selector("th, td, span")?,
            list_item: parse_selector("li, a")?,
            tech_item: parse_selector("[data-qa='tech']")?,
            tech_vendor: parse_selector("[data-qa='tech-vendor']")?,
            tech_name: parse_selector("[data-qa='tech-name']")?,
            scoop_item: parse_selector("[data-qa='scoop']")?,
            scoop_date: parse_selector("time, [data-qa='scoop-date']")?,
            labelled,
        })
    }
}

/// Visible text of an element, whitespace collapsed.
pub fn element_text(element: &ElementRef) -> Option<String> {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// Everything the rules can look at for one page.
pub struct PageContext<'a> {
    pub url: &'a str,
    pub document: &'a Html,
    pub sel: &'a Selectors,
    /// JSON-LD `Organization` / `Corporation` object
    pub ld_org: Option<Map<String, Value>>,
    /// Company object from the embedded page-state blob
    pub state: Option<Map<String, Value>>,
}

impl<'a> PageContext<'a> {
    pub fn new(url: &'a str, document: &'a Html, sel: &'a Selectors) -> Self {
        let ld_org = Self::find_ld_organization(document, sel);
        let state = Self::find_state_object(document, sel);
        Self {
            url,
            document,
            sel,
            ld_org,
            state,
        }
    }

    /// Last organization-typed JSON-LD object on the page.
    fn find_ld_organization(document: &Html, sel: &Selectors) -> Option<Map<String, Value>> {
        let mut best = None;
        for script in document.select(&sel.ld_json) {
            let raw: String = script.text().collect();
            let Ok(data) = serde_json::from_str::<Value>(raw.trim()) else {
                log::debug!("Skipping unparsable JSON-LD block");
                continue;
            };

            let candidates = match data {
                Value::Array(items) => items,
                Value::Object(ref obj) if obj.contains_key("@graph") => obj
                    .get("@graph")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                other => vec![other],
            };

            for candidate in candidates {
                if let Value::Object(obj) = candidate {
                    if is_organization(&obj) {
                        best = Some(obj);
                    }
                }
            }
        }
        best
    }

    fn find_state_object(document: &Html, sel: &Selectors) -> Option<Map<String, Value>> {
        document.select(&sel.state_json).find_map(|script| {
            let raw: String = script.text().collect();
            let data: Value = serde_json::from_str(decode_state(raw.trim()).as_str()).ok()?;
            STATE_ROOT_KEYS
                .iter()
                .find_map(|key| find_key(&data, key, STATE_SEARCH_DEPTH))
                .and_then(|v| v.as_object().cloned())
        })
    }

    /// Value of a JSON-LD organization key.
    pub fn ld(&self, key: &str) -> Option<&Value> {
        self.ld_org
            .as_ref()
            .and_then(|obj| obj.get(key))
            .filter(|v| !v.is_null())
    }

    /// First non-null value among state keys; `a.b` walks nested objects.
    pub fn state_value(&self, keys: &[&str]) -> Option<Value> {
        let state = self.state.as_ref()?;
        keys.iter().find_map(|key| {
            let mut parts = key.split('.');
            let mut current = state.get(parts.next()?)?;
            for part in parts {
                current = current.get(part)?;
            }
            (!current.is_null()).then(|| current.clone())
        })
    }

    /// State value looked up by the field's own name (snake or camel case),
    /// then by aliases.
    pub fn state_field(&self, field: FieldName, aliases: &[&str]) -> Option<Value> {
        let camel = camel_case(field.as_str());
        self.state_value(&[field.as_str(), camel.as_str()])
            .or_else(|| self.state_value(aliases))
    }

    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.document
            .select(selector)
            .find_map(|el| element_text(&el))
    }

    pub fn all_texts(&self, selector: &Selector) -> Vec<String> {
        self.document
            .select(selector)
            .filter_map(|el| element_text(&el))
            .collect()
    }

    pub fn meta_content(&self, selector: &Selector) -> Option<String> {
        self.document
            .select(selector)
            .find_map(|el| el.value().attr("content").and_then(clean_text))
    }

    pub fn link_href(&self, selector: &Selector) -> Option<String> {
        self.document
            .select(selector)
            .find_map(|el| el.value().attr("href").and_then(clean_text))
    }

    /// The `[data-qa='<field>']` block of a field.
    pub fn labelled_element(&self, field: FieldName) -> Option<ElementRef<'a>> {
        let selector = self.sel.labelled.get(&field)?;
        self.document.select(selector).next()
    }

    /// Text of a labelled block, preferring its value child over the label.
    pub fn labelled_text(&self, field: FieldName) -> Option<String> {
        let block = self.labelled_element(field)?;
        block
            .select(&self.sel.value)
            .find_map(|el| element_text(&el))
            .or_else(|| element_text(&block))
    }

    /// Item texts of a labelled list block.
    pub fn labelled_list(&self, field: FieldName) -> Vec<String> {
        let Some(block) = self.labelled_element(field) else {
            return Vec::new();
        };
        let mut items: Vec<String> = block
            .select(&self.sel.list_item)
            .filter(|el| el.value().name() == "li" || !has_li_ancestor(el))
            .filter_map(|el| element_text(&el))
            .collect();
        items.dedup();
        items
    }

    /// Page title and first heading, lowercased, for page-type checks.
    pub fn heading_text(&self) -> String {
        let title = self.first_text(&self.sel.title).unwrap_or_default();
        let h1 = self.first_text(&self.sel.h1).unwrap_or_default();
        format!("{title} {h1}").to_lowercase()
    }
}

/// `phone_number` -> `phoneNumber`
fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn has_li_ancestor(el: &ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "li")
}

fn is_organization(obj: &Map<String, Value>) -> bool {
    let matches = |t: &str| matches!(t, "Organization" | "Corporation");
    match obj.get("@type") {
        Some(Value::String(t)) => matches(t),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// Angular transfer state escapes markup characters as `&q;`, `&a;` etc.
fn decode_state(raw: &str) -> String {
    if !raw.contains("&q;") {
        return raw.to_string();
    }
    raw.replace("&q;", "\"")
        .replace("&s;", "'")
        .replace("&l;", "<")
        .replace("&g;", ">")
        .replace("&a;", "&")
}

/// Depth-limited search for the first object stored under `key`.
fn find_key<'v>(value: &'v Value, key: &str, depth: usize) -> Option<&'v Value> {
    match value {
        Value::Object(obj) => {
            if let Some(found) = obj.get(key).filter(|v| v.is_object()) {
                return Some(found);
            }
            if depth == 0 {
                return None;
            }
            obj.values().find_map(|v| find_key(v, key, depth - 1))
        }
        Value::Array(items) if depth > 0 => {
            items.iter().find_map(|v| find_key(v, key, depth - 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_selector_invalid() {
        assert!(parse_selector("[[invalid").is_err());
        assert!(Selectors::new().is_ok());
    }

    #[test]
    fn test_find_key_nested() {
        let data = json!({"a": {"b": [{"pageData": {"name": "Acme"}}]}});
        let found = find_key(&data, "pageData", 6).unwrap();
        assert_eq!(found["name"], json!("Acme"));
        assert!(find_key(&data, "pageData", 1).is_none());
    }

    #[test]
    fn test_state_field_accepts_camel_case() {
        assert_eq!(camel_case("c_level_employees"), "cLevelEmployees");
        assert_eq!(camel_case("name"), "name");

        let html = r#"<script id="ng-state" type="application/json">
            {"pageData": {"name": "Acme", "phoneNumber": "555-0100", "techStack": []}}
        </script>"#;
        let document = Html::parse_document(html);
        let sel = Selectors::new().unwrap();
        let cx = PageContext::new("https://example.com/c/acme/1", &document, &sel);
        assert_eq!(
            cx.state_field(FieldName::PhoneNumber, &[]),
            Some(json!("555-0100"))
        );
        assert_eq!(cx.state_field(FieldName::TechStack, &[]), Some(json!([])));
        assert_eq!(cx.state_field(FieldName::StockSymbol, &["ticker"]), None);
    }

    #[test]
    fn test_decode_angular_state() {
        assert_eq!(
            decode_state("{&q;name&q;:&q;A&a;B&q;}"),
            r#"{"name":"A&B"}"#
        );
    }

    #[test]
    fn test_ld_graph_and_type_array() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@graph": [
                {"@type": "WebPage", "name": "page"},
                {"@type": ["Organization", "Thing"], "name": "Acme"}
            ]}</script>
            <script type="application/ld+json">{ not json</script>
        </head><body></body></html>"#;
        let document = Html::parse_document(html);
        let sel = Selectors::new().unwrap();
        let cx = PageContext::new("https://example.com/c/acme/1", &document, &sel);
        assert_eq!(cx.ld("name"), Some(&json!("Acme")));
    }

    #[test]
    fn test_labelled_text_prefers_value_child() {
        let html = r#"<div data-qa="revenue"><span>Revenue</span><span class="value">$5M</span></div>"#;
        let document = Html::parse_document(html);
        let sel = Selectors::new().unwrap();
        let cx = PageContext::new("https://example.com/c/acme/1", &document, &sel);
        assert_eq!(cx.labelled_text(FieldName::Revenue), Some("$5M".into()));
    }
}
