use chrono::Utc;
use uuid::Uuid;

use crate::llm::{GenerateRequest, LlmClient};
use crate::models::{AnalysisReport, FinancialMetrics, MarketAnalysis, MarketDataPoint, PropertyInput, Recommendation};

/// Temporal framing pinned into every prompt so market figures stay
/// internally consistent across runs.
pub const REFERENCE_PERIOD: &str = "December 2025";
pub const REFERENCE_YEAR: i32 = 2025;
pub const PRICE_EVOLUTION_YEARS: usize = 5;

const SYSTEM_INSTRUCTION: &str = "\
You are a world-class real-estate investment analyst evaluating properties for investors.\n\
Output requirements:\n\
1. Language of the written report: Spanish, exclusively.\n\
2. Narrative format: clean, professional HTML. Use <h3> for section titles, <ul> and <li> \
for lists, <strong> for emphasis. No markdown and no <html>, <body> or <head> tags.\n\
3. Metrics and chart data: strict JSON.\n\
4. Tone: direct and simple; explain financial jargon whenever it is unavoidable.\n\
Be conservative with every financial estimate and address the investor by first name.";

#[async_trait::async_trait]
pub trait FallbackAgent: Send + Sync {
    /// Generates a full report directly from the AI provider. Raises when
    /// the provider errors, returns no text, or the text fails validation.
    async fn analyze(&self, input: &PropertyInput) -> anyhow::Result<AnalysisReport>;
}

/// Direct AI-provider analysis: one structured-generation round trip with a
/// strict schema contract, no provider-level retry.
pub struct DirectLlmAgent {
    llm: LlmClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl DirectLlmAgent {
    pub fn new(llm: LlmClient, model: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            llm,
            model,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait::async_trait]
impl FallbackAgent for DirectLlmAgent {
    #[tracing::instrument(name = "agent fallback", skip_all)]
    async fn analyze(&self, input: &PropertyInput) -> anyhow::Result<AnalysisReport> {
        let resp = self
            .llm
            .generate(&GenerateRequest {
                model: self.model.clone(),
                system: SYSTEM_INSTRUCTION.to_string(),
                prompt: build_prompt(input),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;

        if resp.content.trim().is_empty() {
            anyhow::bail!("generation provider returned no text");
        }

        parse_report(&resp.content, input.id)
    }
}

fn build_prompt(input: &PropertyInput) -> String {
    let description = if input.description.trim().is_empty() {
        "Inmueble residencial estándar en buen estado."
    } else {
        input.description.as_str()
    };
    let first_year = REFERENCE_YEAR - PRICE_EVOLUTION_YEARS as i32 + 1;

    format!(
        "Prepare a real-estate investment analysis for {first} {last}.\n\
         TEMPORAL CONTEXT: assume the current consultation date is {REFERENCE_PERIOD}.\n\
         \n\
         Property details:\n\
         Type: {property_type}\n\
         Location: {location}\n\
         Price: {currency} {price}\n\
         Size: {size} m2\n\
         Bedrooms: {bedrooms}\n\
         Bathrooms: {bathrooms}\n\
         Garage: {garage} spaces\n\
         Age: {age} years\n\
         Condition: {condition}\n\
         Description: {description}\n\
         \n\
         Return one JSON object with exactly this structure:\n\
         {{\n\
           \"metrics\": {{\"roi\": number, \"capRate\": number, \"monthlyCashflow\": number, \
\"estimatedRenovationCost\": number, \"suggestedOfferPrice\": number, \"appreciationForecast\": number}},\n\
           \"marketData\": {{\"priceEvolution\": [{{\"label\": \"year\", \"value\": number}}], \
\"similarListings\": [{{\"label\": \"category\", \"value\": number}}]}},\n\
           \"viabilityScore\": number between 0 and 100,\n\
           \"recommendation\": \"BUY\" | \"HOLD\" | \"PASS\",\n\
           \"htmlContent\": \"the full report as simple HTML\"\n\
         }}\n\
         \n\
         Requirements:\n\
         - \"priceEvolution\" covers exactly the last {years} years ending in {REFERENCE_YEAR} \
({first_year}-{REFERENCE_YEAR}), one entry per year, label = the year.\n\
         - \"similarListings\" holds realistic counts of comparable current listings by category \
(for example \"Misma Zona\", \"Precio Similar\", \"Tamaño Similar\").\n\
         - \"htmlContent\" opens with a <div> holding a 3-4 line \"Resumen Ejecutivo\", continues \
with \"Análisis de Rentabilidad\", \"Puntos Fuertes\" and \"Riesgos\" sections, and closes with a \
clear conclusion on whether to buy.\n\
         - State explicitly whether the garage adds significant value to profitability.\n\
         - Reference in the written report that the analysis is valid as of {REFERENCE_PERIOD}.",
        first = input.user_info.first_name,
        last = input.user_info.last_name,
        property_type = input.property_type,
        location = input.location,
        currency = input.currency,
        price = input.price,
        size = input.size_m2,
        bedrooms = input.bedrooms,
        bathrooms = input.bathrooms,
        garage = input.garage,
        age = input.age_years,
        condition = input.condition,
        years = PRICE_EVOLUTION_YEARS,
    )
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedReport {
    metrics: FinancialMetrics,
    market_data: MarketAnalysis,
    viability_score: f64,
    recommendation: Recommendation,
    html_content: String,
}

fn parse_report(content: &str, property_id: Option<Uuid>) -> anyhow::Result<AnalysisReport> {
    let json_str = extract_json(content);

    let generated: GeneratedReport = serde_json::from_str(&json_str)
        .map_err(|err| anyhow::anyhow!("generated report does not match the schema: {err}"))?;

    validate(&generated)?;

    Ok(AnalysisReport {
        id: Uuid::new_v4(),
        property_id,
        metrics: generated.metrics,
        market_data: generated.market_data,
        viability_score: generated.viability_score,
        recommendation: generated.recommendation,
        html_content: generated.html_content,
        created_at: Utc::now(),
    })
}

fn validate(report: &GeneratedReport) -> anyhow::Result<()> {
    if report.html_content.trim().is_empty() {
        anyhow::bail!("generated report narrative is empty");
    }
    if !report.metrics.all_finite() {
        anyhow::bail!("generated financial metrics contain non-finite values");
    }
    if !(0.0..=100.0).contains(&report.viability_score) {
        anyhow::bail!(
            "viability score {} is outside the 0-100 range",
            report.viability_score
        );
    }
    validate_price_evolution(&report.market_data.price_evolution)
}

fn validate_price_evolution(series: &[MarketDataPoint]) -> anyhow::Result<()> {
    if series.len() != PRICE_EVOLUTION_YEARS {
        anyhow::bail!(
            "price evolution must span {PRICE_EVOLUTION_YEARS} years, got {}",
            series.len()
        );
    }

    let first_year = REFERENCE_YEAR - PRICE_EVOLUTION_YEARS as i32 + 1;
    for (offset, point) in series.iter().enumerate() {
        let year: i32 = point
            .label
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("price evolution label {:?} is not a year", point.label))?;
        if year != first_year + offset as i32 {
            anyhow::bail!(
                "price evolution years must run {first_year}-{REFERENCE_YEAR} consecutively, \
                 got {year} at position {offset}"
            );
        }
    }

    Ok(())
}

pub(crate) fn extract_json(content: &str) -> String {
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim().to_string();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }
    if let Some(start) = content.find('{')
        && let Some(end) = content.rfind('}')
    {
        return content[start..=end].to_string();
    }
    content.to_string()
}
