// src/models/record.rs

//! Canonical company record.

use serde::{Deserialize, Serialize};

/// A person listed on the profile (leadership or org chart).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStackItem {
    pub company_name: Option<String>,
    pub tech_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// A short company news item ("scoop").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoopItem {
    pub title: Option<String>,
    pub date: Option<String>,
    pub url: Option<String>,
}

/// Behaviour shared by the structured list entries of a record.
pub trait SubRecord {
    /// Identity used for deduplication. `None` when the entry is empty.
    fn natural_key(&self) -> Option<String>;

    /// Field values in declaration order, for flat exports.
    fn flat_fields(&self) -> Vec<Option<&str>>;
}

fn key_of(parts: &[&Option<String>]) -> Option<String> {
    if parts.iter().all(|p| p.is_none()) {
        return None;
    }
    Some(
        parts
            .iter()
            .map(|p| p.as_deref().unwrap_or("").to_lowercase())
            .collect::<Vec<_>>()
            .join("\u{1f}"),
    )
}

impl SubRecord for Person {
    fn natural_key(&self) -> Option<String> {
        match &self.url {
            Some(url) => Some(url.trim_end_matches('/').to_lowercase()),
            None => key_of(&[&self.name, &self.title]),
        }
    }

    fn flat_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.name.as_deref(),
            self.title.as_deref(),
            self.url.as_deref(),
        ]
    }
}

impl SubRecord for TechStackItem {
    fn natural_key(&self) -> Option<String> {
        key_of(&[&self.company_name, &self.tech_name])
    }

    fn flat_fields(&self) -> Vec<Option<&str>> {
        vec![self.company_name.as_deref(), self.tech_name.as_deref()]
    }
}

impl SubRecord for NewsItem {
    fn natural_key(&self) -> Option<String> {
        match &self.url {
            Some(url) => Some(url.trim_end_matches('/').to_lowercase()),
            None => key_of(&[&self.title]),
        }
    }

    fn flat_fields(&self) -> Vec<Option<&str>> {
        vec![self.title.as_deref(), self.url.as_deref()]
    }
}

impl SubRecord for ScoopItem {
    fn natural_key(&self) -> Option<String> {
        match &self.url {
            Some(url) => Some(url.trim_end_matches('/').to_lowercase()),
            None => key_of(&[&self.title, &self.date]),
        }
    }

    fn flat_fields(&self) -> Vec<Option<&str>> {
        vec![
            self.title.as_deref(),
            self.date.as_deref(),
            self.url.as_deref(),
        ]
    }
}

/// The normalized, schema-conformant profile of one company.
///
/// Absent scalars are `None` (serialized as `null`), absent lists are empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub url: String,
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub revenue: Option<f64>,
    pub revenue_currency: Option<String>,
    pub stock_symbol: Option<String>,
    pub website: Option<String>,
    pub employees: Option<u64>,
    pub industry: Vec<String>,
    pub headquarters: Option<String>,
    pub phone_number: Option<String>,
    pub total_funding_amount: Option<f64>,
    pub most_recent_funding_amount: Option<f64>,
    pub funding_currency: Option<String>,
    pub funding_rounds: Option<u64>,
    pub leadership: Vec<Person>,
    pub popular_searches: Vec<String>,
    pub business_classification_codes: Vec<String>,
    pub total_employees: Option<u64>,
    pub c_level_employees: Option<u64>,
    pub vp_level_employees: Option<u64>,
    pub director_level_employees: Option<u64>,
    pub manager_level_employees: Option<u64>,
    pub non_manager_employees: Option<u64>,
    pub top_contacts: Option<u64>,
    pub org_chart: Vec<Person>,
    pub social_media: Vec<String>,
    pub ceo_rating: Option<f64>,
    pub enps_score: Option<f64>,
    pub similar_companies: Vec<String>,
    pub email_formats: Vec<String>,
    pub products_owned: Vec<String>,
    pub tech_stack: Vec<TechStackItem>,
    pub recent_scoops: Vec<ScoopItem>,
    pub news_and_media: Vec<NewsItem>,
}

/// Separates list items in a CSV cell.
pub const CSV_ITEM_SEPARATOR: &str = "|";
/// Separates the fields of one sub-record in a CSV cell.
pub const CSV_FIELD_SEPARATOR: &str = ";";

impl CompanyRecord {
    /// Column order of the CSV export.
    pub const CSV_COLUMNS: [&'static str; 36] = [
        "url",
        "id",
        "name",
        "description",
        "revenue",
        "revenue_currency",
        "stock_symbol",
        "website",
        "employees",
        "industry",
        "headquarters",
        "phone_number",
        "total_funding_amount",
        "most_recent_funding_amount",
        "funding_currency",
        "funding_rounds",
        "leadership",
        "popular_searches",
        "business_classification_codes",
        "total_employees",
        "c_level_employees",
        "vp_level_employees",
        "director_level_employees",
        "manager_level_employees",
        "non_manager_employees",
        "top_contacts",
        "org_chart",
        "social_media",
        "ceo_rating",
        "enps_score",
        "similar_companies",
        "email_formats",
        "products_owned",
        "tech_stack",
        "recent_scoops",
        "news_and_media",
    ];

    /// Flatten the record into one CSV row, in `CSV_COLUMNS` order.
    pub fn csv_row(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            text_cell(&self.id),
            text_cell(&self.name),
            text_cell(&self.description),
            number_cell(self.revenue),
            text_cell(&self.revenue_currency),
            text_cell(&self.stock_symbol),
            text_cell(&self.website),
            count_cell(self.employees),
            list_cell(&self.industry),
            text_cell(&self.headquarters),
            text_cell(&self.phone_number),
            number_cell(self.total_funding_amount),
            number_cell(self.most_recent_funding_amount),
            text_cell(&self.funding_currency),
            count_cell(self.funding_rounds),
            sub_record_cell(&self.leadership),
            list_cell(&self.popular_searches),
            list_cell(&self.business_classification_codes),
            count_cell(self.total_employees),
            count_cell(self.c_level_employees),
            count_cell(self.vp_level_employees),
            count_cell(self.director_level_employees),
            count_cell(self.manager_level_employees),
            count_cell(self.non_manager_employees),
            count_cell(self.top_contacts),
            sub_record_cell(&self.org_chart),
            list_cell(&self.social_media),
            number_cell(self.ceo_rating),
            number_cell(self.enps_score),
            list_cell(&self.similar_companies),
            list_cell(&self.email_formats),
            list_cell(&self.products_owned),
            sub_record_cell(&self.tech_stack),
            sub_record_cell(&self.recent_scoops),
            sub_record_cell(&self.news_and_media),
        ]
    }
}

fn text_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn count_cell(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn list_cell(values: &[String]) -> String {
    values.join(CSV_ITEM_SEPARATOR)
}

fn sub_record_cell<T: SubRecord>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| {
            item.flat_fields()
                .into_iter()
                .map(|f| f.unwrap_or(""))
                .collect::<Vec<_>>()
                .join(CSV_FIELD_SEPARATOR)
        })
        .collect::<Vec<_>>()
        .join(CSV_ITEM_SEPARATOR)
}
