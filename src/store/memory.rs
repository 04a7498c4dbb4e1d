use std::sync::Mutex;

use crate::error::AppError;
use crate::models::{AnalysisReport, PropertyInput, PropertyRecord};

use super::{LOCAL_USER_ID, PropertyStore};

/// Session-lifetime store backing local mode. Records live exactly as long
/// as the process.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<PropertyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PropertyRecord>> {
        match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl PropertyStore for MemoryStore {
    async fn save(
        &self,
        input: &PropertyInput,
        report: &AnalysisReport,
    ) -> Result<PropertyRecord, AppError> {
        let record = PropertyRecord::new(input, report, LOCAL_USER_ID);
        self.lock().push(record.clone());
        Ok(record)
    }

    async fn list(&self) -> Result<Vec<PropertyRecord>, AppError> {
        Ok(self.lock().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FinancialMetrics, MarketAnalysis, MarketDataPoint, PropertyType, Recommendation, UserInfo,
    };
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_input() -> PropertyInput {
        PropertyInput {
            id: None,
            user_info: UserInfo {
                first_name: "Ana".to_string(),
                last_name: "García".to_string(),
                email: "ana@example.com".to_string(),
            },
            title: "Apartamento en Chamberí".to_string(),
            description: "Luminoso, tercera planta".to_string(),
            price: 250_000.0,
            currency: "EUR".to_string(),
            location: "Chamberí".to_string(),
            size_m2: 80.0,
            bedrooms: 2,
            bathrooms: 1,
            garage: 0,
            property_type: PropertyType::Apartment,
            age_years: 5,
            condition: "Bueno".to_string(),
        }
    }

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            id: Uuid::new_v4(),
            property_id: None,
            metrics: FinancialMetrics {
                roi: 6.1,
                cap_rate: 4.4,
                monthly_cashflow: 280.0,
                estimated_renovation_cost: 5_000.0,
                suggested_offer_price: 242_000.0,
                appreciation_forecast: 2.9,
            },
            market_data: MarketAnalysis {
                price_evolution: vec![MarketDataPoint {
                    label: "2025".to_string(),
                    value: 4950.0,
                }],
                similar_listings: vec![MarketDataPoint {
                    label: "Misma Zona".to_string(),
                    value: 14.0,
                }],
            },
            viability_score: 74.0,
            recommendation: Recommendation::Hold,
            html_content: "<h3>Resumen</h3>".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_then_list_round_trips() {
        let store = MemoryStore::new();
        let saved = store.save(&sample_input(), &sample_report()).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed, vec![saved.clone()]);
        assert_eq!(listed[0].input, saved.input);
        assert_eq!(listed[0].report, saved.report);
    }

    #[tokio::test]
    async fn test_save_stamps_ownership_and_report_link() {
        let store = MemoryStore::new();
        let record = store.save(&sample_input(), &sample_report()).await.unwrap();

        assert_eq!(record.user_id, LOCAL_USER_ID);
        assert_eq!(record.report.as_ref().unwrap().property_id, Some(record.id));
    }

    #[tokio::test]
    async fn test_list_preserves_insertion_order() {
        let store = MemoryStore::new();
        let first = store.save(&sample_input(), &sample_report()).await.unwrap();
        let second = store.save(&sample_input(), &sample_report()).await.unwrap();

        let ids: Vec<_> = store.list().await.unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
    }
}
