//! Structured company records supplied by the persistence layer
//!
//! Every attribute is optional: partial records are normal and must score
//! without failing. Categorical fields deserialize from free text so that
//! loosely-typed upstream data always maps onto a known variant.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Industry catalogue used for one-hot encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Industry {
    Software,
    CloudComputing,
    FinancialTechnology,
    FinancialServices,
    Healthcare,
    Biotechnology,
    Cybersecurity,
    Telecommunications,
    Energy,
    Retail,
    Manufacturing,
    Other,
}

impl Industry {
    /// Fixed encoding order
    pub const ALL: [Industry; 12] = [
        Industry::Software,
        Industry::CloudComputing,
        Industry::FinancialTechnology,
        Industry::FinancialServices,
        Industry::Healthcare,
        Industry::Biotechnology,
        Industry::Cybersecurity,
        Industry::Telecommunications,
        Industry::Energy,
        Industry::Retail,
        Industry::Manufacturing,
        Industry::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Industry::Software => "software",
            Industry::CloudComputing => "cloud_computing",
            Industry::FinancialTechnology => "financial_technology",
            Industry::FinancialServices => "financial_services",
            Industry::Healthcare => "healthcare",
            Industry::Biotechnology => "biotechnology",
            Industry::Cybersecurity => "cybersecurity",
            Industry::Telecommunications => "telecommunications",
            Industry::Energy => "energy",
            Industry::Retail => "retail",
            Industry::Manufacturing => "manufacturing",
            Industry::Other => "other",
        }
    }

    /// Map free-text industry labels onto the catalogue
    pub fn parse(label: &str) -> Self {
        let norm: String = label
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
            .collect();
        let norm = norm.split_whitespace().collect::<Vec<_>>().join(" ");

        match norm.as_str() {
            "software" | "technology" | "saas" | "enterprise software" => Industry::Software,
            "cloud" | "cloud computing" | "cloud infrastructure" => Industry::CloudComputing,
            "fintech" | "financial technology" => Industry::FinancialTechnology,
            "financial services" | "banking" | "finance" | "insurance" => Industry::FinancialServices,
            "healthcare" | "health care" | "health" | "medical devices" => Industry::Healthcare,
            "biotechnology" | "biotech" | "pharmaceuticals" | "life sciences" => {
                Industry::Biotechnology
            }
            "cybersecurity" | "security" | "cyber security" => Industry::Cybersecurity,
            "telecommunications" | "telecom" | "networking" => Industry::Telecommunications,
            "energy" | "renewable energy" | "clean energy" | "oil and gas" => Industry::Energy,
            "retail" | "retail technology" | "consumer" | "e commerce" | "ecommerce" => {
                Industry::Retail
            }
            "manufacturing" | "industrial" | "industrial automation" => Industry::Manufacturing,
            _ => Industry::Other,
        }
    }
}

impl From<String> for Industry {
    fn from(value: String) -> Self {
        Industry::parse(&value)
    }
}

impl From<Industry> for String {
    fn from(value: Industry) -> Self {
        value.as_str().to_string()
    }
}

/// Coarse headquarters region used for one-hot encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Region {
    NorthAmerica,
    Europe,
    AsiaPacific,
    LatinAmerica,
    MiddleEastAfrica,
    Other,
}

/// US state and Canadian province codes, as found in "City, ST" headquarters
const NORTH_AMERICAN_CODES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH",
    "NJ", "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY", "ON", "QC", "BC", "AB",
];

impl Region {
    pub const ALL: [Region; 6] = [
        Region::NorthAmerica,
        Region::Europe,
        Region::AsiaPacific,
        Region::LatinAmerica,
        Region::MiddleEastAfrica,
        Region::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::NorthAmerica => "north_america",
            Region::Europe => "europe",
            Region::AsiaPacific => "asia_pacific",
            Region::LatinAmerica => "latin_america",
            Region::MiddleEastAfrica => "middle_east_africa",
            Region::Other => "other",
        }
    }

    pub fn parse(label: &str) -> Self {
        let lower = label.trim().to_ascii_lowercase().replace(['-', '_'], " ");
        match lower.as_str() {
            "north america" | "na" | "us" | "usa" | "united states" | "canada" => {
                Region::NorthAmerica
            }
            "europe" | "eu" | "uk" | "united kingdom" | "germany" | "france" => {
                Region::Europe
            }
            "asia pacific" | "apac" | "asia" | "japan" | "china" | "india" | "australia"
            | "singapore" => Region::AsiaPacific,
            "latin america" | "latam" | "brazil" | "mexico" => Region::LatinAmerica,
            "middle east" | "africa" | "middle east africa" | "mea" => Region::MiddleEastAfrica,
            _ => Region::Other,
        }
    }

    /// Infer a region from a headquarters string such as "Austin, TX"
    pub fn from_headquarters(headquarters: &str) -> Option<Self> {
        let last = headquarters.rsplit(',').next()?.trim();
        if last.is_empty() {
            return None;
        }
        if last.len() == 2 && NORTH_AMERICAN_CODES.contains(&last.to_ascii_uppercase().as_str()) {
            return Some(Region::NorthAmerica);
        }
        match Region::parse(last) {
            Region::Other => None,
            region => Some(region),
        }
    }
}

impl From<String> for Region {
    fn from(value: String) -> Self {
        Region::parse(&value)
    }
}

impl From<Region> for String {
    fn from(value: Region) -> Self {
        value.as_str().to_string()
    }
}

/// A company's structured attributes.
///
/// Missing fields are `None`; the feature extractor maps them to a zero
/// sentinel instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyRecord {
    pub id: Uuid,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub industry: Option<Industry>,

    /// Annual revenue in millions (USD)
    #[serde(default)]
    pub revenue_millions: Option<f64>,

    #[serde(default)]
    pub employee_count: Option<u64>,

    /// Year-over-year growth in percent (32.5 means 32.5%)
    #[serde(default)]
    pub growth_rate: Option<f64>,

    /// Profit margin in percent
    #[serde(default)]
    pub profit_margin: Option<f64>,

    #[serde(default)]
    pub founded_year: Option<i32>,

    #[serde(default)]
    pub headquarters: Option<String>,

    /// Explicit region; inferred from `headquarters` when absent
    #[serde(default)]
    pub region: Option<Region>,

    /// Free-text business description
    #[serde(default)]
    pub description: Option<String>,
}

impl CompanyRecord {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Explicit region, else one inferred from the headquarters
    pub fn resolved_region(&self) -> Option<Region> {
        self.region
            .or_else(|| self.headquarters.as_deref().and_then(Region::from_headquarters))
    }

    /// Deterministic natural-language profile used as a similarity query and
    /// as the text of the company's profile index entry.
    pub fn synthesize_description(&self) -> String {
        let mut parts = Vec::new();

        let name = if self.name.is_empty() { "The company" } else { self.name.as_str() };
        let mut lead = match self.industry {
            Some(industry) => format!(
                "{} operates in the {} sector",
                name,
                industry.as_str().replace('_', " ")
            ),
            None => format!("{} is a private company", name),
        };
        if let Some(hq) = self.headquarters.as_deref().filter(|h| !h.trim().is_empty()) {
            lead.push_str(&format!(" headquartered in {}", hq.trim()));
        }
        parts.push(format!("{}.", lead));

        if let Some(revenue) = self.revenue_millions.filter(|r| r.is_finite()) {
            parts.push(format!("Annual revenue is ${:.1}M.", revenue));
        }
        if let Some(employees) = self.employee_count {
            parts.push(format!("It employs {} people.", employees));
        }
        if let Some(growth) = self.growth_rate.filter(|g| g.is_finite()) {
            parts.push(format!("Revenue grows {:.1}% per year.", growth));
        }
        if let Some(margin) = self.profit_margin.filter(|m| m.is_finite()) {
            parts.push(format!("Profit margin is {:.1}%.", margin));
        }
        if let Some(year) = self.founded_year {
            parts.push(format!("Founded in {}.", year));
        }
        if let Some(description) = self.description.as_deref().filter(|d| !d.trim().is_empty()) {
            parts.push(description.trim().to_string());
        }

        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_industry_aliases() {
        assert_eq!(Industry::parse("Financial Technology"), Industry::FinancialTechnology);
        assert_eq!(Industry::parse("  fintech "), Industry::FinancialTechnology);
        assert_eq!(Industry::parse("Renewable Energy"), Industry::Energy);
        assert_eq!(Industry::parse("Retail Technology"), Industry::Retail);
        assert_eq!(Industry::parse("E-Commerce"), Industry::Retail);
        assert_eq!(Industry::parse("Underwater Basket Weaving"), Industry::Other);
    }

    #[test]
    fn test_industry_deserializes_from_free_text() {
        let record: CompanyRecord = serde_json::from_value(serde_json::json!({
            "id": "00000000-0000-0000-0000-000000000001",
            "name": "CyberDefense Systems",
            "industry": "Cybersecurity"
        }))
        .unwrap();
        assert_eq!(record.industry, Some(Industry::Cybersecurity));
        assert_eq!(record.revenue_millions, None);
    }

    #[test]
    fn test_region_from_headquarters() {
        assert_eq!(Region::from_headquarters("Austin, TX"), Some(Region::NorthAmerica));
        assert_eq!(Region::from_headquarters("Berlin, Germany"), Some(Region::Europe));
        assert_eq!(Region::from_headquarters("Somewhere"), None);
    }

    #[test]
    fn test_resolved_region_prefers_explicit() {
        let mut record = CompanyRecord::new(Uuid::nil(), "Acme");
        record.headquarters = Some("Boston, MA".into());
        assert_eq!(record.resolved_region(), Some(Region::NorthAmerica));
        record.region = Some(Region::Europe);
        assert_eq!(record.resolved_region(), Some(Region::Europe));
    }

    #[test]
    fn test_synthesized_description() {
        let record = CompanyRecord {
            id: Uuid::nil(),
            name: "GreenEnergy Systems".into(),
            industry: Some(Industry::Energy),
            revenue_millions: Some(78.5),
            employee_count: Some(420),
            growth_rate: Some(28.7),
            headquarters: Some("Austin, TX".into()),
            ..Default::default()
        };
        let text = record.synthesize_description();
        assert!(text.starts_with(
            "GreenEnergy Systems operates in the energy sector headquartered in Austin, TX."
        ));
        assert!(text.contains("$78.5M"));
        assert!(text.contains("420 people"));
        assert_eq!(text, record.synthesize_description());
    }

    #[test]
    fn test_sparse_description() {
        let record = CompanyRecord::new(Uuid::nil(), "");
        assert_eq!(record.synthesize_description(), "The company is a private company.");
    }
}
