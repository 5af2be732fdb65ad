//! Fixed-order feature vectors from structured company records
//!
//! Layout, in order:
//! - `industry:<name>` one-hot over [`Industry::ALL`]
//! - `region:<name>` one-hot over [`Region::ALL`]
//! - `revenue_scale` = ln(1 + revenue_m) / ln(1 + 10 000)
//! - `employee_scale` = ln(1 + employees) / ln(1 + 100 000)
//! - `growth` = clamp(growth_pct / 100, 0, 1)
//! - `profit_margin` = clamp(margin_pct / 100, 0, 1)
//! - `maturity` = clamp(age_years / 50, 0, 1)
//!
//! Missing or non-finite inputs yield 0.0 with `present = false`.

use dealflow_common::config::EngineConfig;
use dealflow_common::models::{CompanyRecord, Industry, Region};
use serde::{Deserialize, Serialize};

pub const REVENUE_SCALE: &str = "revenue_scale";
pub const EMPLOYEE_SCALE: &str = "employee_scale";
pub const GROWTH: &str = "growth";
pub const PROFIT_MARGIN: &str = "profit_margin";
pub const MATURITY: &str = "maturity";

/// Revenue (in millions) mapped to 1.0
const REVENUE_CEILING_M: f64 = 10_000.0;
const EMPLOYEE_CEILING: f64 = 100_000.0;
const MATURITY_YEARS: f64 = 50.0;

/// One named feature value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub value: f64,

    /// Whether the source field was supplied
    pub present: bool,
}

/// Feature values in the fixed layout order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    features: Vec<Feature>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn values(&self) -> Vec<f64> {
        self.features.iter().map(|f| f.value).collect()
    }
}

pub fn industry_feature(industry: Industry) -> String {
    format!("industry:{}", industry.as_str())
}

pub fn region_feature(region: Region) -> String {
    format!("region:{}", region.as_str())
}

/// Every feature name in layout order
pub fn feature_names() -> Vec<String> {
    Industry::ALL
        .iter()
        .map(|i| industry_feature(*i))
        .chain(Region::ALL.iter().map(|r| region_feature(*r)))
        .chain(
            [REVENUE_SCALE, EMPLOYEE_SCALE, GROWTH, PROFIT_MARGIN, MATURITY]
                .iter()
                .map(|s| s.to_string()),
        )
        .collect()
}

/// Maps company records to feature vectors. Pure and total.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    reference_year: i32,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for FeatureExtractor {
    fn from(config: &EngineConfig) -> Self {
        Self::new(config.reference_year)
    }
}

impl FeatureExtractor {
    pub fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    pub fn extract(&self, record: &CompanyRecord) -> FeatureVector {
        let mut features = Vec::with_capacity(Industry::ALL.len() + Region::ALL.len() + 5);

        for industry in Industry::ALL {
            features.push(Feature {
                name: industry_feature(industry),
                value: if record.industry == Some(industry) { 1.0 } else { 0.0 },
                present: record.industry.is_some(),
            });
        }

        let region = record.resolved_region();
        for r in Region::ALL {
            features.push(Feature {
                name: region_feature(r),
                value: if region == Some(r) { 1.0 } else { 0.0 },
                present: region.is_some(),
            });
        }

        let revenue = record.revenue_millions.filter(|v| v.is_finite());
        features.push(numeric(REVENUE_SCALE, revenue.map(|r| log_scale(r, REVENUE_CEILING_M))));

        let employees = record.employee_count.map(|e| e as f64);
        features.push(numeric(EMPLOYEE_SCALE, employees.map(|e| log_scale(e, EMPLOYEE_CEILING))));

        let growth = record.growth_rate.filter(|v| v.is_finite());
        features.push(numeric(GROWTH, growth.map(|g| (g / 100.0).clamp(0.0, 1.0))));

        let margin = record.profit_margin.filter(|v| v.is_finite());
        features.push(numeric(PROFIT_MARGIN, margin.map(|m| (m / 100.0).clamp(0.0, 1.0))));

        let age = record
            .founded_year
            .map(|y| f64::from(self.reference_year) - f64::from(y));
        features.push(numeric(MATURITY, age.map(|a| (a / MATURITY_YEARS).clamp(0.0, 1.0))));

        FeatureVector { features }
    }
}

fn numeric(name: &str, value: Option<f64>) -> Feature {
    Feature {
        name: name.to_string(),
        value: value.unwrap_or(0.0),
        present: value.is_some(),
    }
}

/// ln(1 + x) / ln(1 + ceiling), clamped to [0, 1]
fn log_scale(x: f64, ceiling: f64) -> f64 {
    (x.max(0.0).ln_1p() / ceiling.ln_1p()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn full_record() -> CompanyRecord {
        CompanyRecord {
            id: Uuid::from_u128(1),
            name: "Voltline".into(),
            industry: Some(Industry::Energy),
            revenue_millions: Some(10_000.0),
            employee_count: Some(99),
            growth_rate: Some(25.0),
            profit_margin: Some(140.0),
            founded_year: Some(2000),
            headquarters: Some("Austin, TX".into()),
            region: None,
            description: None,
        }
    }

    #[test]
    fn test_layout_is_fixed() {
        let extractor = FeatureExtractor::new(2025);
        let vector = extractor.extract(&full_record());
        let names: Vec<String> = vector.iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, feature_names());
        assert_eq!(vector.len(), 12 + 6 + 5);
    }

    #[test]
    fn test_values() {
        let vector = FeatureExtractor::new(2025).extract(&full_record());
        assert_eq!(vector.get("industry:energy").unwrap().value, 1.0);
        assert_eq!(vector.get("industry:software").unwrap().value, 0.0);
        assert_eq!(vector.get("region:north_america").unwrap().value, 1.0);
        assert!((vector.get(REVENUE_SCALE).unwrap().value - 1.0).abs() < 1e-12);
        assert!((vector.get(EMPLOYEE_SCALE).unwrap().value - 100f64.ln() / 100_001f64.ln()).abs() < 1e-12);
        assert_eq!(vector.get(GROWTH).unwrap().value, 0.25);
        assert_eq!(vector.get(PROFIT_MARGIN).unwrap().value, 1.0);
        assert_eq!(vector.get(MATURITY).unwrap().value, 0.5);
    }

    #[test]
    fn test_missing_fields_are_zero_and_flagged() {
        let record = CompanyRecord::new(Uuid::from_u128(2), "Unknown Co");
        let vector = FeatureExtractor::new(2025).extract(&record);
        assert!(vector.iter().all(|f| f.value == 0.0));
        assert!(vector.iter().all(|f| !f.present));
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        let mut record = full_record();
        record.growth_rate = Some(-30.0);
        record.revenue_millions = Some(f64::NAN);
        record.founded_year = Some(2030);
        let vector = FeatureExtractor::new(2025).extract(&record);
        assert_eq!(vector.get(GROWTH).unwrap().value, 0.0);
        assert!(vector.get(GROWTH).unwrap().present);
        assert!(!vector.get(REVENUE_SCALE).unwrap().present);
        assert_eq!(vector.get(MATURITY).unwrap().value, 0.0);
    }

    #[test]
    fn test_extreme_values_do_not_panic() {
        let mut record = full_record();
        record.founded_year = Some(i32::MIN);
        record.employee_count = Some(u64::MAX);
        record.revenue_millions = Some(f64::MAX);
        record.growth_rate = Some(f64::NEG_INFINITY);
        let vector = FeatureExtractor::new(2025).extract(&record);
        assert_eq!(vector.get(MATURITY).unwrap().value, 1.0);
        assert_eq!(vector.get(EMPLOYEE_SCALE).unwrap().value, 1.0);
        assert_eq!(vector.get(REVENUE_SCALE).unwrap().value, 1.0);
        assert!(!vector.get(GROWTH).unwrap().present);

        record.founded_year = Some(i32::MAX);
        let vector = FeatureExtractor::new(i32::MIN).extract(&record);
        assert_eq!(vector.get(MATURITY).unwrap().value, 0.0);
        assert!(vector.iter().all(|f| f.value.is_finite()));
    }
}
