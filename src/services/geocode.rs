use serde::{Deserialize, Serialize};

const SEARCH_URL: &str = "https://nominatim.openstreetmap.org/search";
/// Appended to every query so results stay relevant to the served market.
const REGION_BIAS: &str = "Madrid";
const COUNTRY_CODES: &str = "es";
const MIN_QUERY_CHARS: usize = 3;
const MAX_SUGGESTIONS: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSuggestion {
    pub display_name: String,
    pub lat: String,
    pub lon: String,
}

/// Ranked address suggestions for a free-text query. Short queries return
/// nothing, and so does any upstream failure; suggestions never block the
/// main flow.
pub async fn suggest(client: &reqwest::Client, query: &str) -> Vec<LocationSuggestion> {
    let query = query.trim();
    if query.chars().count() < MIN_QUERY_CHARS {
        return Vec::new();
    }

    match fetch(client, query).await {
        Ok(suggestions) => suggestions,
        Err(err) => {
            tracing::warn!(error = %err, "location lookup failed, returning no suggestions");
            Vec::new()
        }
    }
}

async fn fetch(client: &reqwest::Client, query: &str) -> anyhow::Result<Vec<LocationSuggestion>> {
    let biased = format!("{query} {REGION_BIAS}");

    let response = client
        .get(SEARCH_URL)
        .query(&[
            ("format", "json"),
            ("q", biased.as_str()),
            ("addressdetails", "1"),
            ("limit", &MAX_SUGGESTIONS.to_string()),
            ("countrycodes", COUNTRY_CODES),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("location search returned status {status}");
    }

    Ok(response.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_short_query_skips_lookup() {
        // Two characters stay below the threshold, so no request is made and
        // an unreachable endpoint is never an issue.
        let client = reqwest::Client::new();
        assert!(suggest(&client, "ch").await.is_empty());
        assert!(suggest(&client, "  a  ").await.is_empty());
    }

    #[test]
    fn test_suggestion_parses_nominatim_shape() {
        let suggestions: Vec<LocationSuggestion> = serde_json::from_str(
            r#"[{"display_name": "Chamberí, Madrid, España", "lat": "40.43", "lon": "-3.70", "place_id": 42}]"#,
        )
        .unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].display_name, "Chamberí, Madrid, España");
    }
}
