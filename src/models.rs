use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Applicant identity captured by the submission form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

/// Wire values are the Spanish labels the webhook and the UI exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "Apartamento")]
    Apartment,
    #[serde(rename = "Casa")]
    House,
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyType::Apartment => write!(f, "Apartamento"),
            PropertyType::House => write!(f, "Casa"),
        }
    }
}

/// A property submission. Immutable once handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub user_info: UserInfo,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub location: String,
    pub size_m2: f64,
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub garage: u32,
    pub property_type: PropertyType,
    pub age_years: u32,
    pub condition: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialMetrics {
    /// Annual return on investment, percent.
    pub roi: f64,
    /// Capitalization rate, percent.
    pub cap_rate: f64,
    pub monthly_cashflow: f64,
    pub estimated_renovation_cost: f64,
    pub suggested_offer_price: f64,
    /// Expected annual appreciation, percent.
    pub appreciation_forecast: f64,
}

impl FinancialMetrics {
    /// A metrics block is only usable when every figure is an actual number.
    pub fn all_finite(&self) -> bool {
        [
            self.roi,
            self.cap_rate,
            self.monthly_cashflow,
            self.estimated_renovation_cost,
            self.suggested_offer_price,
            self.appreciation_forecast,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub label: String,
    pub value: f64,
}

/// Two labeled series backing the report charts: price per m2 by year and
/// counts of comparable listings by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub price_evolution: Vec<MarketDataPoint>,
    pub similar_listings: Vec<MarketDataPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Pass,
}

/// A finalized viability report. Created once per successful orchestration
/// attempt; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub id: Uuid,
    /// Stamped with the owning record id at save time; `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_id: Option<Uuid>,
    pub metrics: FinancialMetrics,
    pub market_data: MarketAnalysis,
    /// 0-100 investment attractiveness.
    pub viability_score: f64,
    pub recommendation: Recommendation,
    /// Pre-rendered narrative markup, ready for the report view.
    pub html_content: String,
    pub created_at: DateTime<Utc>,
}

/// A persisted (input, report) pair with ownership metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<AnalysisReport>,
    #[serde(flatten)]
    pub input: PropertyInput,
}

impl PropertyRecord {
    /// Builds a fresh record around a generated report. The record id is
    /// newly assigned and stamped onto the attached report; the submitted
    /// input's own id is cleared so the record id is authoritative.
    pub fn new(input: &PropertyInput, report: &AnalysisReport, user_id: &str) -> Self {
        let id = Uuid::new_v4();
        let mut input = input.clone();
        input.id = None;
        let mut report = report.clone();
        report.property_id = Some(id);
        Self {
            id,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
            report: Some(report),
            input,
        }
    }
}
