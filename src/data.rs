use crate::config::InputConfig;
use crate::topo::Topology;
use crate::types::CountyStat;
use anyhow::{Context, Result};
use tracing::info;

/// Fetch the education records and the county topology concurrently and
/// wait for both. Either failure aborts the whole initialization; there is
/// no retry and no partial result.
pub async fn fetch_datasets(input: &InputConfig) -> Result<(Vec<CountyStat>, Topology)> {
    info!("fetching education and boundary datasets");
    let client = reqwest::Client::new();

    let (stats, topology) = tokio::try_join!(
        fetch_education(&client, &input.education_url),
        fetch_topology(&client, &input.counties_url),
    )?;

    info!(
        records = stats.len(),
        arcs = topology.arcs.len(),
        "datasets fetched"
    );
    Ok((stats, topology))
}

async fn fetch_education(client: &reqwest::Client, url: &str) -> Result<Vec<CountyStat>> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to fetch education data from {}", url))?;
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse education data from {}", url))
}

async fn fetch_topology(client: &reqwest::Client, url: &str) -> Result<Topology> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("Failed to fetch county topology from {}", url))?;
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse county topology from {}", url))
}
