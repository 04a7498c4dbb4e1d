use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use opentelemetry::KeyValue;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{AnalysisReport, PropertyInput, PropertyRecord, Recommendation};
use crate::store::PropertyStore;
use crate::telemetry::metrics::{
    AGENT_FALLBACK_COUNT, ANALYSIS_DURATION, ANALYSIS_FAILURE_COUNT,
};

use super::fallback::FallbackAgent;
use super::payload::{PartialReport, PrimaryPayload};
use super::primary::PrimaryAgent;

/// Applied when a valid primary payload omits the optional fields; missing
/// optionals never block presentation.
pub const DEFAULT_VIABILITY_SCORE: f64 = 70.0;

const TERMINAL_FAILURE_NOTICE: &str =
    "No pudimos generar el análisis. Verifica tu conexión e inténtalo de nuevo.";
const TIMEOUT_NOTICE: &str = "El análisis no se completó a tiempo. Inténtalo de nuevo.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentSource {
    Primary,
    Fallback,
}

impl AgentSource {
    fn as_str(self) -> &'static str {
        match self {
            AgentSource::Primary => "primary",
            AgentSource::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub record: PropertyRecord,
    pub source: AgentSource,
    pub saved: bool,
    /// The primary agent's self-reported failure message, shown to the user
    /// before the fallback result. Part of the UX contract, not diagnostics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_notice: Option<String>,
}

/// Two-tier report generation: the external orchestration workflow first,
/// the direct AI provider when it is unusable, a terminal failure only when
/// both are. At most one attempt per agent, strictly in sequence.
pub struct ReportOrchestrator {
    primary: Arc<dyn PrimaryAgent>,
    fallback: Arc<dyn FallbackAgent>,
    store: Arc<dyn PropertyStore>,
    timeout: Duration,
}

impl ReportOrchestrator {
    pub fn new(
        primary: Arc<dyn PrimaryAgent>,
        fallback: Arc<dyn FallbackAgent>,
        store: Arc<dyn PropertyStore>,
        timeout: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            store,
            timeout,
        }
    }

    #[tracing::instrument(
        name = "pipeline analysis",
        skip_all,
        fields(report.id, report.source, report.saved)
    )]
    pub async fn run(&self, input: &PropertyInput) -> Result<AnalysisOutcome, AppError> {
        let start = std::time::Instant::now();

        let generated = tokio::time::timeout(self.timeout, self.generate(input)).await;
        let (report, source, agent_notice) = match generated {
            Ok(result) => result?,
            Err(_) => {
                ANALYSIS_FAILURE_COUNT.add(1, &[KeyValue::new("reason", "timeout")]);
                return Err(AppError::Orchestration(TIMEOUT_NOTICE.to_string()));
            }
        };

        // A produced report is never undone by a storage failure: degrade to
        // a session-only record and keep going.
        let (record, saved) = match self.store.save(input, &report).await {
            Ok(record) => (record, true),
            Err(err) => {
                tracing::warn!(error = %err, "saving the record failed, serving session-only copy");
                (session_record(input, &report), false)
            }
        };

        ANALYSIS_DURATION.record(
            start.elapsed().as_secs_f64(),
            &[KeyValue::new("source", source.as_str())],
        );

        let span = tracing::Span::current();
        span.record("report.id", record.id.to_string());
        span.record("report.source", source.as_str());
        span.record("report.saved", saved);

        Ok(AnalysisOutcome {
            record,
            source,
            saved,
            agent_notice,
        })
    }

    async fn generate(
        &self,
        input: &PropertyInput,
    ) -> Result<(AnalysisReport, AgentSource, Option<String>), AppError> {
        let mut agent_notice = None;

        match self.primary.analyze(input).await {
            Ok(PrimaryPayload::Structured(partial)) => {
                match build_primary_report(partial, input) {
                    Ok(report) => return Ok((report, AgentSource::Primary, None)),
                    Err(reason) => {
                        tracing::warn!(reason, "primary agent payload rejected, falling back");
                    }
                }
            }
            Ok(PrimaryPayload::Text(_)) => {
                tracing::warn!("primary agent returned narrative without metrics, falling back");
            }
            Ok(PrimaryPayload::Failure(message)) => {
                tracing::warn!(message = %message, "primary agent reported failure, falling back");
                agent_notice = Some(message);
            }
            Err(err) => {
                tracing::warn!(error = %err, "primary agent unreachable, falling back");
            }
        }

        AGENT_FALLBACK_COUNT.add(1, &[]);

        match self.fallback.analyze(input).await {
            Ok(report) => Ok((report, AgentSource::Fallback, agent_notice)),
            Err(err) => {
                tracing::error!(error = %err, "fallback agent failed, no report produced");
                ANALYSIS_FAILURE_COUNT.add(1, &[KeyValue::new("reason", "exhausted")]);
                Err(AppError::Orchestration(TERMINAL_FAILURE_NOTICE.to_string()))
            }
        }
    }
}

/// A primary payload becomes a report only with non-empty narrative and
/// fully populated, finite metrics; score and recommendation default when
/// absent.
fn build_primary_report(
    partial: PartialReport,
    input: &PropertyInput,
) -> Result<AnalysisReport, &'static str> {
    let html_content = match partial.html_content {
        Some(html) if !html.trim().is_empty() => html,
        _ => return Err("missing narrative markup"),
    };

    let metrics = match partial.metrics {
        Some(metrics) if metrics.all_finite() => metrics,
        Some(_) => return Err("non-finite financial metrics"),
        None => return Err("missing financial metrics"),
    };

    Ok(AnalysisReport {
        id: Uuid::new_v4(),
        property_id: input.id,
        metrics,
        market_data: partial.market_data.unwrap_or_default(),
        viability_score: partial.viability_score.unwrap_or(DEFAULT_VIABILITY_SCORE),
        recommendation: partial.recommendation.unwrap_or(Recommendation::Hold),
        html_content,
        created_at: Utc::now(),
    })
}

fn session_record(input: &PropertyInput, report: &AnalysisReport) -> PropertyRecord {
    let mut input = input.clone();
    input.id = None;
    PropertyRecord {
        id: report.id,
        user_id: "temp".to_string(),
        created_at: Utc::now(),
        report: Some(report.clone()),
        input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        FinancialMetrics, MarketAnalysis, MarketDataPoint, PropertyType, UserInfo,
    };
    use crate::store::LOCAL_USER_ID;
    use crate::store::memory::MemoryStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn sample_input() -> PropertyInput {
        PropertyInput {
            id: None,
            user_info: UserInfo {
                first_name: "Ana".to_string(),
                last_name: "García".to_string(),
                email: "ana@example.com".to_string(),
            },
            title: "Apartamento en Chamberí".to_string(),
            description: String::new(),
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

    fn sample_metrics() -> FinancialMetrics {
        FinancialMetrics {
            roi: 6.5,
            cap_rate: 4.2,
            monthly_cashflow: 320.0,
            estimated_renovation_cost: 12_000.0,
            suggested_offer_price: 238_000.0,
            appreciation_forecast: 3.1,
        }
    }

    fn full_partial() -> PartialReport {
        PartialReport {
            metrics: Some(sample_metrics()),
            market_data: Some(MarketAnalysis {
                price_evolution: vec![MarketDataPoint {
                    label: "2025".to_string(),
                    value: 4950.0,
                }],
                similar_listings: vec![],
            }),
            viability_score: Some(82.0),
            recommendation: Some(Recommendation::Buy),
            html_content: Some("<h3>Resumen</h3>".to_string()),
        }
    }

    fn fallback_report() -> AnalysisReport {
        AnalysisReport {
            id: Uuid::new_v4(),
            property_id: None,
            metrics: sample_metrics(),
            market_data: MarketAnalysis::default(),
            viability_score: 65.0,
            recommendation: Recommendation::Hold,
            html_content: "<h3>Informe de respaldo</h3>".to_string(),
            created_at: Utc::now(),
        }
    }

    enum PrimaryScript {
        Payload(PrimaryPayload),
        Unreachable,
    }

    struct ScriptedPrimary {
        script: PrimaryScript,
        calls: AtomicU32,
    }

    impl ScriptedPrimary {
        fn new(script: PrimaryScript) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl PrimaryAgent for ScriptedPrimary {
        async fn analyze(&self, _input: &PropertyInput) -> anyhow::Result<PrimaryPayload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                PrimaryScript::Payload(payload) => Ok(payload.clone()),
                PrimaryScript::Unreachable => {
                    anyhow::bail!("could not reach the analysis agent")
                }
            }
        }
    }

    struct ScriptedFallback {
        report: Option<AnalysisReport>,
        calls: AtomicU32,
    }

    impl ScriptedFallback {
        fn returning(report: AnalysisReport) -> Arc<Self> {
            Arc::new(Self {
                report: Some(report),
                calls: AtomicU32::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                report: None,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl FallbackAgent for ScriptedFallback {
        async fn analyze(&self, _input: &PropertyInput) -> anyhow::Result<AnalysisReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.report {
                Some(report) => Ok(report.clone()),
                None => anyhow::bail!("provider unavailable"),
            }
        }
    }

    struct FailingStore {
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl PropertyStore for FailingStore {
        async fn save(
            &self,
            _input: &PropertyInput,
            _report: &AnalysisReport,
        ) -> Result<PropertyRecord, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Database(sqlx::Error::PoolClosed))
        }

        async fn list(&self) -> Result<Vec<PropertyRecord>, AppError> {
            Ok(vec![])
        }
    }

    struct CountingStore {
        inner: MemoryStore,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl PropertyStore for CountingStore {
        async fn save(
            &self,
            input: &PropertyInput,
            report: &AnalysisReport,
        ) -> Result<PropertyRecord, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.save(input, report).await
        }

        async fn list(&self) -> Result<Vec<PropertyRecord>, AppError> {
            self.inner.list().await
        }
    }

    fn orchestrator(
        primary: Arc<ScriptedPrimary>,
        fallback: Arc<ScriptedFallback>,
        store: Arc<dyn PropertyStore>,
    ) -> ReportOrchestrator {
        ReportOrchestrator::new(primary, fallback, store, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_primary_success_uses_payload_values() {
        let primary = ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Structured(
            full_partial(),
        )));
        let fallback = ScriptedFallback::returning(fallback_report());
        let orch = orchestrator(
            primary.clone(),
            fallback.clone(),
            Arc::new(MemoryStore::new()),
        );

        let outcome = orch.run(&sample_input()).await.unwrap();

        assert_eq!(outcome.source, AgentSource::Primary);
        assert!(outcome.saved);
        assert!(outcome.agent_notice.is_none());
        let report = outcome.record.report.unwrap();
        assert_eq!(report.metrics, sample_metrics());
        assert_eq!(report.viability_score, 82.0);
        assert_eq!(report.recommendation, Recommendation::Buy);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_primary_defaults_applied_only_when_absent() {
        let partial = PartialReport {
            viability_score: None,
            recommendation: None,
            market_data: None,
            ..full_partial()
        };
        let primary =
            ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Structured(partial)));
        let fallback = ScriptedFallback::returning(fallback_report());
        let orch = orchestrator(primary, fallback, Arc::new(MemoryStore::new()));

        let report = orch
            .run(&sample_input())
            .await
            .unwrap()
            .record
            .report
            .unwrap();

        assert_eq!(report.viability_score, DEFAULT_VIABILITY_SCORE);
        assert_eq!(report.recommendation, Recommendation::Hold);
        assert_eq!(report.market_data, MarketAnalysis::default());
    }

    #[tokio::test]
    async fn test_failure_keyword_invokes_fallback_once_with_notice() {
        let primary = ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Failure(
            "Proceso fallado".to_string(),
        )));
        let fallback = ScriptedFallback::returning(fallback_report());
        let orch = orchestrator(primary, fallback.clone(), Arc::new(MemoryStore::new()));

        let outcome = orch.run(&sample_input()).await.unwrap();

        assert_eq!(outcome.source, AgentSource::Fallback);
        assert_eq!(outcome.agent_notice.as_deref(), Some("Proceso fallado"));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        // The fallback's own figures, no partial primary data.
        assert_eq!(
            outcome.record.report.unwrap().html_content,
            "<h3>Informe de respaldo</h3>"
        );
    }

    #[tokio::test]
    async fn test_incomplete_payload_triggers_fallback() {
        let partial = PartialReport {
            metrics: None,
            ..full_partial()
        };
        let primary =
            ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Structured(partial)));
        let fallback = ScriptedFallback::returning(fallback_report());
        let orch = orchestrator(primary, fallback.clone(), Arc::new(MemoryStore::new()));

        let outcome = orch.run(&sample_input()).await.unwrap();

        assert_eq!(outcome.source, AgentSource::Fallback);
        assert!(outcome.agent_notice.is_none());
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_text_payload_triggers_fallback() {
        let primary = ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Text(
            "<p>solo narrativa</p>".to_string(),
        )));
        let fallback = ScriptedFallback::returning(fallback_report());
        let orch = orchestrator(primary, fallback.clone(), Arc::new(MemoryStore::new()));

        let outcome = orch.run(&sample_input()).await.unwrap();
        assert_eq!(outcome.source, AgentSource::Fallback);
    }

    #[tokio::test]
    async fn test_unreachable_primary_triggers_fallback() {
        let primary = ScriptedPrimary::new(PrimaryScript::Unreachable);
        let fallback = ScriptedFallback::returning(fallback_report());
        let orch = orchestrator(primary, fallback.clone(), Arc::new(MemoryStore::new()));

        let outcome = orch.run(&sample_input()).await.unwrap();
        assert_eq!(outcome.source, AgentSource::Fallback);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_agents_failing_is_terminal_and_skips_save() {
        let primary = ScriptedPrimary::new(PrimaryScript::Unreachable);
        let fallback = ScriptedFallback::failing();
        let store = Arc::new(CountingStore {
            inner: MemoryStore::new(),
            calls: AtomicU32::new(0),
        });
        let orch = orchestrator(primary, fallback, store.clone());

        let err = orch.run(&sample_input()).await.unwrap_err();

        assert!(matches!(err, AppError::Orchestration(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_save_failure_degrades_to_session_record() {
        let primary = ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Structured(
            full_partial(),
        )));
        let fallback = ScriptedFallback::returning(fallback_report());
        let store = Arc::new(FailingStore {
            calls: AtomicU32::new(0),
        });
        let orch = orchestrator(primary, fallback, store.clone());

        let outcome = orch.run(&sample_input()).await.unwrap();

        assert!(!outcome.saved);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
        let report = outcome.record.report.as_ref().unwrap();
        assert_eq!(outcome.record.id, report.id);
        assert_eq!(outcome.record.user_id, "temp");
        assert_ne!(outcome.record.user_id, LOCAL_USER_ID);
    }

    #[tokio::test]
    async fn test_saved_record_owned_by_local_user() {
        let primary = ScriptedPrimary::new(PrimaryScript::Payload(PrimaryPayload::Structured(
            full_partial(),
        )));
        let fallback = ScriptedFallback::returning(fallback_report());
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(primary, fallback, store.clone());

        let outcome = orch.run(&sample_input()).await.unwrap();

        assert!(outcome.saved);
        assert_eq!(outcome.record.user_id, LOCAL_USER_ID);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_budget_is_terminal() {
        struct HangingPrimary;

        #[async_trait::async_trait]
        impl PrimaryAgent for HangingPrimary {
            async fn analyze(&self, _input: &PropertyInput) -> anyhow::Result<PrimaryPayload> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(PrimaryPayload::Text(String::new()))
            }
        }

        let orch = ReportOrchestrator::new(
            Arc::new(HangingPrimary),
            ScriptedFallback::returning(fallback_report()),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(5),
        );

        let err = orch.run(&sample_input()).await.unwrap_err();
        assert!(matches!(err, AppError::Orchestration(_)));
    }

    #[test]
    fn test_outcome_wire_format() {
        let outcome = AnalysisOutcome {
            record: session_record(&sample_input(), &fallback_report()),
            source: AgentSource::Fallback,
            saved: false,
            agent_notice: Some("Proceso fallado".to_string()),
        };

        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["saved"], false);
        assert_eq!(json["agentNotice"], "Proceso fallado");
    }
}
