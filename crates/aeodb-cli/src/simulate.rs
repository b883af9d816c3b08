//! The `simulate` command: generate plausible demo response records so the
//! dashboard has something to aggregate before real data arrives.
//!
//! Generation is split from insertion so the record shapes can be tested
//! without a database. Passing `--seed` makes the whole run reproducible.

use aeodb_core::types::BuyingJourneyStage;
use aeodb_db::NewResponse;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;

const ENGINES: &[&str] = &["perplexity", "chatgpt", "gemini", "claude"];
const REGIONS: &[&str] = &["North America", "EMEA", "APAC", "LATAM"];
const VERTICALS: &[&str] = &["SaaS", "E-commerce", "Fintech", "Healthcare"];
const PERSONAS: &[&str] = &[
    "Head of Marketing",
    "Growth Lead",
    "Content Strategist",
    "VP Demand Gen",
];
const STAGES: &[BuyingJourneyStage] = &[
    BuyingJourneyStage::ProblemExploration,
    BuyingJourneyStage::SolutionEducation,
    BuyingJourneyStage::SolutionComparison,
    BuyingJourneyStage::SolutionEvaluation,
    BuyingJourneyStage::FinalResearch,
];
const FEATURES: &[&str] = &[
    "API access",
    "SSO",
    "Custom reports",
    "Competitor tracking",
    "Alerting",
];
const RIVALS: &[&str] = &["Globex", "Initech", "Umbrella", "Hooli", "Stark Metrics"];

pub async fn run(
    company_id: i64,
    batches: u32,
    per_batch: u32,
    days: u32,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    let pool = aeodb_db::connect_pool_from_env().await?;

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let now = Utc::now();
    let mut inserted = 0usize;
    for batch_index in 0..batches {
        // Batches walk forward through the window, oldest first.
        let age_days = i64::from(days) - i64::from(days) * i64::from(batch_index)
            / i64::from(batches.max(1));
        let at = now - Duration::days(age_days);
        let batch_id = format!("sim-{}-{batch_index:03}", at.format("%Y%m%d"));
        tracing::debug!(batch_id = %batch_id, responses = per_batch, "inserting simulated batch");

        for record in generate_batch(&mut rng, company_id, &batch_id, at, per_batch) {
            aeodb_db::insert_response(&pool, &record).await?;
            inserted += 1;
        }
    }

    println!("inserted {inserted} responses across {batches} batches for company {company_id}");
    Ok(())
}

/// Generate one batch of demo records at the given timestamp.
pub fn generate_batch(
    rng: &mut StdRng,
    company_id: i64,
    batch_id: &str,
    at: DateTime<Utc>,
    per_batch: u32,
) -> Vec<NewResponse> {
    (0..per_batch)
        .map(|i| {
            let stage = STAGES[rng.random_range(0..STAGES.len())];
            let created_at = at + Duration::minutes(i64::from(i));

            let ranking_position = if stage.is_ranked() {
                Some(rng.random_range(1..=6))
            } else {
                None
            };
            let solution_analysis = (stage == BuyingJourneyStage::SolutionEvaluation).then(|| {
                let verdicts: serde_json::Map<String, serde_json::Value> = FEATURES
                    .iter()
                    .map(|feature| {
                        let verdict = if rng.random_bool(0.55) { "YES" } else { "NO" };
                        ((*feature).to_owned(), json!(verdict))
                    })
                    .collect();
                serde_json::Value::Object(verdicts)
            });
            let rank_list = ranking_position.map(|position| {
                let mut order: Vec<&str> = RIVALS.to_vec();
                let slot = usize::try_from(position - 1).unwrap_or(0).min(order.len());
                order.insert(slot, "You");
                order
                    .iter()
                    .enumerate()
                    .map(|(rank, name)| format!("{}. {name}", rank + 1))
                    .collect::<Vec<_>>()
                    .join("\n")
            });

            NewResponse {
                company_id,
                batch_id: batch_id.to_owned(),
                answer_engine: ENGINES[rng.random_range(0..ENGINES.len())].to_owned(),
                geographic_region: maybe_pick(rng, REGIONS),
                icp_vertical: maybe_pick(rng, VERTICALS),
                buyer_persona: maybe_pick(rng, PERSONAS),
                buying_journey_stage: Some(stage),
                sentiment_score: Some(f64::from(rng.random_range(20..=95)) / 100.0),
                ranking_position,
                company_mentioned: stage.is_early() && rng.random_bool(0.6),
                solution_analysis,
                rank_list,
                response_text: None,
                citations: Vec::new(),
                mentioned_companies: vec![RIVALS[rng.random_range(0..RIVALS.len())].to_owned()],
                created_at,
            }
        })
        .collect()
}

/// Pick from the pool most of the time, leaving a share of records with a
/// null dimension so breakdown "unspecified" buckets get exercised.
fn maybe_pick(rng: &mut StdRng, pool: &[&str]) -> Option<String> {
    rng.random_bool(0.85)
        .then(|| pool[rng.random_range(0..pool.len())].to_owned())
}
