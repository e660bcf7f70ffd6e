// src/models/fields.rs

//! Field names and the untyped field set produced by the page parser.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::CompanyRecord;

/// Every extractable field of a company profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Id,
    Name,
    Description,
    Revenue,
    RevenueCurrency,
    StockSymbol,
    Website,
    Employees,
    Industry,
    Headquarters,
    PhoneNumber,
    TotalFundingAmount,
    MostRecentFundingAmount,
    FundingCurrency,
    FundingRounds,
    Leadership,
    PopularSearches,
    BusinessClassificationCodes,
    TotalEmployees,
    CLevelEmployees,
    VpLevelEmployees,
    DirectorLevelEmployees,
    ManagerLevelEmployees,
    NonManagerEmployees,
    TopContacts,
    OrgChart,
    SocialMedia,
    CeoRating,
    EnpsScore,
    SimilarCompanies,
    EmailFormats,
    ProductsOwned,
    TechStack,
    RecentScoops,
    NewsAndMedia,
}

impl FieldName {
    pub const ALL: [FieldName; 35] = [
        FieldName::Id,
        FieldName::Name,
        FieldName::Description,
        FieldName::Revenue,
        FieldName::RevenueCurrency,
        FieldName::StockSymbol,
        FieldName::Website,
        FieldName::Employees,
        FieldName::Industry,
        FieldName::Headquarters,
        FieldName::PhoneNumber,
        FieldName::TotalFundingAmount,
        FieldName::MostRecentFundingAmount,
        FieldName::FundingCurrency,
        FieldName::FundingRounds,
        FieldName::Leadership,
        FieldName::PopularSearches,
        FieldName::BusinessClassificationCodes,
        FieldName::TotalEmployees,
        FieldName::CLevelEmployees,
        FieldName::VpLevelEmployees,
        FieldName::DirectorLevelEmployees,
        FieldName::ManagerLevelEmployees,
        FieldName::NonManagerEmployees,
        FieldName::TopContacts,
        FieldName::OrgChart,
        FieldName::SocialMedia,
        FieldName::CeoRating,
        FieldName::EnpsScore,
        FieldName::SimilarCompanies,
        FieldName::EmailFormats,
        FieldName::ProductsOwned,
        FieldName::TechStack,
        FieldName::RecentScoops,
        FieldName::NewsAndMedia,
    ];

    /// Key used in the record and in exports.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Id => "id",
            FieldName::Name => "name",
            FieldName::Description => "description",
            FieldName::Revenue => "revenue",
            FieldName::RevenueCurrency => "revenue_currency",
            FieldName::StockSymbol => "stock_symbol",
            FieldName::Website => "website",
            FieldName::Employees => "employees",
            FieldName::Industry => "industry",
            FieldName::Headquarters => "headquarters",
            FieldName::PhoneNumber => "phone_number",
            FieldName::TotalFundingAmount => "total_funding_amount",
            FieldName::MostRecentFundingAmount => "most_recent_funding_amount",
            FieldName::FundingCurrency => "funding_currency",
            FieldName::FundingRounds => "funding_rounds",
            FieldName::Leadership => "leadership",
            FieldName::PopularSearches => "popular_searches",
            FieldName::BusinessClassificationCodes => "business_classification_codes",
            FieldName::TotalEmployees => "total_employees",
            FieldName::CLevelEmployees => "c_level_employees",
            FieldName::VpLevelEmployees => "vp_level_employees",
            FieldName::DirectorLevelEmployees => "director_level_employees",
            FieldName::ManagerLevelEmployees => "manager_level_employees",
            FieldName::NonManagerEmployees => "non_manager_employees",
            FieldName::TopContacts => "top_contacts",
            FieldName::OrgChart => "org_chart",
            FieldName::SocialMedia => "social_media",
            FieldName::CeoRating => "ceo_rating",
            FieldName::EnpsScore => "enps_score",
            FieldName::SimilarCompanies => "similar_companies",
            FieldName::EmailFormats => "email_formats",
            FieldName::ProductsOwned => "products_owned",
            FieldName::TechStack => "tech_stack",
            FieldName::RecentScoops => "recent_scoops",
            FieldName::NewsAndMedia => "news_and_media",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Untyped values located on a page, keyed by field.
///
/// A field missing from the map is absent. `null` is never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFieldSet {
    pub url: String,
    fields: BTreeMap<FieldName, Value>,
}

impl RawFieldSet {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Store a value; `null` and empty arrays count as absent.
    pub fn insert(&mut self, field: FieldName, value: Value) {
        match &value {
            Value::Null => {}
            Value::Array(items) if items.is_empty() => {}
            _ => {
                self.fields.insert(field, value);
            }
        }
    }

    pub fn get(&self, field: FieldName) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn remove(&mut self, field: FieldName) -> Option<Value> {
        self.fields.remove(&field)
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldName, &Value)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Fields that no rule could locate.
    pub fn absent(&self) -> Vec<FieldName> {
        FieldName::ALL
            .iter()
            .copied()
            .filter(|f| !self.contains(*f))
            .collect()
    }
}

impl From<&CompanyRecord> for RawFieldSet {
    /// Turn a normalized record back into raw fields so it can be
    /// normalized again.
    fn from(record: &CompanyRecord) -> Self {
        let mut set = RawFieldSet::new(record.url.clone());
        if let Ok(Value::Object(mut map)) = serde_json::to_value(record) {
            for field in FieldName::ALL {
                if let Some(value) = map.remove(field.as_str()) {
                    set.insert(field, value);
                }
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_names_match_serde() {
        for field in FieldName::ALL {
            let serialized = serde_json::to_value(field).unwrap();
            assert_eq!(serialized, json!(field.as_str()));
        }
    }

    #[test]
    fn test_record_columns_cover_every_field() {
        for field in FieldName::ALL {
            assert!(
                CompanyRecord::CSV_COLUMNS.contains(&field.as_str()),
                "missing column {field}"
            );
        }
    }

    #[test]
    fn test_insert_ignores_null_and_empty() {
        let mut set = RawFieldSet::new("https://example.com/c/a/1");
        set.insert(FieldName::Name, Value::Null);
        set.insert(FieldName::Leadership, json!([]));
        set.insert(FieldName::Employees, json!(12));
        assert_eq!(set.len(), 1);
        assert!(set.absent().contains(&FieldName::Name));
    }

    #[test]
    fn test_from_record_keeps_present_fields() {
        let record = CompanyRecord {
            url: "https://example.com/c/a/1".into(),
            name: Some("Acme".into()),
            employees: Some(40),
            ..CompanyRecord::default()
        };
        let set = RawFieldSet::from(&record);
        assert_eq!(set.get(FieldName::Name), Some(&json!("Acme")));
        assert_eq!(set.get(FieldName::Employees), Some(&json!(40)));
        assert!(!set.contains(FieldName::Industry));
        assert_eq!(set.len(), 2);
    }
}
