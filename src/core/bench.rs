use serde::Serialize;
use std::time::Instant;
use tracing::info;

use crate::core::llm::{Provider, client_for, normalize_api_url, resolve_backend};
use crate::core::metrics::round1;
use crate::core::now_millis;

/// Default categories and their probe prompts. One short prompt per
/// category keeps a full run under a minute on CPU-only hosts.
const CATEGORY_PROMPTS: &[(&str, &str)] = &[
    ("reasoning", "If all widgets are gadgets and some gadgets are gizmos, can a widget be a gizmo? Answer yes or no with one sentence."),
    ("coding", "Write a one-line function in any language that returns the square of its argument."),
    ("summarization", "Summarize in one sentence: The quick brown fox jumps over the lazy dog repeatedly until both are tired."),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResult {
    pub category: String,
    pub score: f64,
    /// Milliseconds for the completion round-trip.
    pub latency: u64,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRun {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub results: Vec<CategoryResult>,
    pub overall_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkReport {
    pub timestamp: u64,
    pub models: Vec<ModelRun>,
}

/// Latency-banded score for a completed probe. An empty response scores
/// zero regardless of speed.
pub fn score_for(latency_ms: u64, response_len: usize) -> f64 {
    if response_len == 0 {
        return 0.0;
    }
    match latency_ms {
        0..=1000 => 95.0,
        1001..=3000 => 85.0,
        3001..=7000 => 70.0,
        _ => 50.0,
    }
}

/// Run every category prompt against every requested model, sequentially.
/// Provider failures become per-model entries, never a failed run.
pub async fn run_benchmark(
    http: reqwest::Client,
    provider: Provider,
    api_url: &str,
    server_type: Option<&str>,
    models: &[String],
    categories: Option<&[String]>,
) -> BenchmarkReport {
    let base_url = normalize_api_url(api_url);
    let backend = resolve_backend(provider, &base_url, server_type);

    let selected: Vec<(String, String)> = match categories {
        Some(wanted) => CATEGORY_PROMPTS
            .iter()
            .filter(|(name, _)| wanted.iter().any(|w| w == name))
            .map(|(n, p)| (n.to_string(), p.to_string()))
            .collect(),
        None => CATEGORY_PROMPTS
            .iter()
            .map(|(n, p)| (n.to_string(), p.to_string()))
            .collect(),
    };

    let mut runs = Vec::with_capacity(models.len());
    for model in models {
        let client = client_for(backend, base_url.clone(), http.clone());
        let mut results = Vec::with_capacity(selected.len());
        let mut failure: Option<String> = None;

        for (category, prompt) in &selected {
            let started = Instant::now();
            match client.complete(model, prompt).await {
                Ok(response) => {
                    let latency = started.elapsed().as_millis() as u64;
                    let response = response.trim();
                    results.push(CategoryResult {
                        category: category.clone(),
                        score: score_for(latency, response.len()),
                        latency,
                        details: format!("{} chars in {} ms", response.len(), latency),
                    });
                }
                Err(e) => {
                    // One failed category aborts the model run; the remaining
                    // prompts would almost certainly fail the same way.
                    failure = Some(e.to_string());
                    break;
                }
            }
        }

        let overall = if results.is_empty() {
            0.0
        } else {
            round1(results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64)
        };

        info!(
            "Benchmark for {} on {}: {} categories, overall {}",
            model,
            base_url,
            results.len(),
            overall
        );

        runs.push(ModelRun {
            id: model.clone(),
            name: model.clone(),
            provider: provider.as_str().to_string(),
            success: failure.is_none(),
            error: failure,
            results,
            overall_score: overall,
        });
    }

    BenchmarkReport {
        timestamp: now_millis(),
        models: runs,
    }
}
