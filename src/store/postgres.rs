use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AnalysisReport, PropertyInput, PropertyRecord};

use super::PropertyStore;

/// Database-backed store. Two dependent writes per save (the property, then
/// the report referencing it); a failed write is logged and never fails the
/// save, so the caller's flow continues with the in-memory record.
pub struct PostgresStore {
    pool: PgPool,
    user_id: String,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, user_id: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(25)
            .min_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await?;

        tracing::info!("Database connection pool created");

        Ok(Self {
            pool,
            user_id: user_id.to_string(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    user_id: String,
    created_at: DateTime<Utc>,
    details: serde_json::Value,
    content: Option<serde_json::Value>,
}

#[tracing::instrument(name = "db.properties.insert", skip_all)]
async fn insert_property(pool: &PgPool, record: &PropertyRecord) -> Result<(), sqlx::Error> {
    let details = serde_json::to_value(&record.input).unwrap_or_default();

    sqlx::query(
        "INSERT INTO properties \
         (id, title, description, price, location, details, user_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(record.id)
    .bind(&record.input.title)
    .bind(&record.input.description)
    .bind(record.input.price)
    .bind(&record.input.location)
    .bind(details)
    .bind(&record.user_id)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

#[tracing::instrument(name = "db.reports.insert", skip_all)]
async fn insert_report(
    pool: &PgPool,
    property_id: Uuid,
    report: &AnalysisReport,
) -> Result<(), sqlx::Error> {
    let content = serde_json::to_value(report).unwrap_or_default();

    sqlx::query("INSERT INTO reports (id, property_id, content, created_at) VALUES ($1, $2, $3, $4)")
        .bind(report.id)
        .bind(property_id)
        .bind(content)
        .bind(report.created_at)
        .execute(pool)
        .await?;

    Ok(())
}

#[async_trait::async_trait]
impl PropertyStore for PostgresStore {
    async fn save(
        &self,
        input: &PropertyInput,
        report: &AnalysisReport,
    ) -> Result<PropertyRecord, AppError> {
        let record = PropertyRecord::new(input, report, &self.user_id);

        match insert_property(&self.pool, &record).await {
            Ok(()) => {
                if let Some(saved_report) = &record.report
                    && let Err(err) = insert_report(&self.pool, record.id, saved_report).await
                {
                    tracing::warn!(
                        record_id = %record.id,
                        error = %err,
                        "report write failed, record kept without durable report"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    record_id = %record.id,
                    error = %err,
                    "property write failed, serving in-memory record"
                );
            }
        }

        Ok(record)
    }

    #[tracing::instrument(name = "db.properties.list", skip_all)]
    async fn list(&self) -> Result<Vec<PropertyRecord>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(
            "SELECT DISTINCT ON (p.id) \
             p.id, p.user_id, p.created_at, p.details, r.content \
             FROM properties p \
             LEFT JOIN reports r ON r.property_id = p.id \
             WHERE p.user_id = $1 \
             ORDER BY p.id, r.created_at DESC NULLS LAST",
        )
        .bind(&self.user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records: Vec<PropertyRecord> = rows
            .into_iter()
            .filter_map(|row| {
                let input: PropertyInput = match serde_json::from_value(row.details) {
                    Ok(input) => input,
                    Err(err) => {
                        tracing::warn!(record_id = %row.id, error = %err, "skipping unreadable record");
                        return None;
                    }
                };
                let report: Option<AnalysisReport> =
                    row.content.and_then(|value| serde_json::from_value(value).ok());

                Some(PropertyRecord {
                    id: row.id,
                    user_id: row.user_id,
                    created_at: row.created_at,
                    report,
                    input,
                })
            })
            .collect();

        records.sort_by_key(|record| record.created_at);

        Ok(records)
    }
}
