use std::{fmt::Write as _, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

pub const MINER_LIST_URL: &str = "https://api.filswan.com/miners";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Region {
    #[value(name = "Global")]
    Global,
    #[value(name = "Asia")]
    Asia,
    #[value(name = "Africa")]
    Africa,
    #[value(name = "NorthAmerica")]
    NorthAmerica,
    #[value(name = "SouthAmerica")]
    SouthAmerica,
    #[value(name = "Europe")]
    Europe,
    #[value(name = "Oceania")]
    Oceania,
}

impl Region {
    /// Location label as the directory spells it.
    pub fn as_query(&self) -> &'static str {
        match self {
            Region::Global => "Global",
            Region::Asia => "Asia",
            Region::Africa => "Africa",
            Region::NorthAmerica => "North America",
            Region::SouthAmerica => "South America",
            Region::Europe => "Europe",
            Region::Oceania => "Oceania",
        }
    }
}

#[derive(Debug, Deserialize)]
struct MinerResponse {
    data: MinerData,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct MinerData {
    #[serde(default)]
    miner: Vec<MinerSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MinerSummary {
    #[serde(default)]
    pub miner_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub adjusted_power: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub verified_price: Option<String>,
    #[serde(default)]
    pub min_piece_size: Option<String>,
    #[serde(default)]
    pub max_piece_size: Option<String>,
    #[serde(default)]
    pub offline_deal_available: bool,
}

pub fn listing_query(region: Option<Region>) -> Vec<(&'static str, &'static str)> {
    let mut query = vec![
        ("limit", "100"),
        ("offset", "0"),
        ("status", "Active"),
        ("sort_by", "score"),
        ("order", "ascending"),
    ];
    if let Some(region) = region {
        query.push(("location", region.as_query()));
    }
    query
}

pub async fn fetch_miners(region: Option<Region>) -> Result<Vec<MinerSummary>> {
    let client = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build reqwest client")?;
    let response = client
        .get(MINER_LIST_URL)
        .query(&listing_query(region))
        .send()
        .await
        .context("failed to reach miner directory")?;

    let status = response.status();
    let text = response
        .text()
        .await
        .context("failed to read miner directory response")?;
    if status != StatusCode::OK {
        return Err(anyhow!(
            "miner directory returned status {} with body: {}",
            status,
            text
        ));
    }
    parse_miners(&text)
}

pub fn parse_miners(body: &str) -> Result<Vec<MinerSummary>> {
    let parsed: MinerResponse =
        serde_json::from_str(body).context("failed to parse miner directory JSON")?;
    if !parsed.status.is_empty() && !parsed.status.eq_ignore_ascii_case("success") {
        return Err(anyhow!("miner directory reported status '{}'", parsed.status));
    }
    Ok(parsed.data.miner)
}

pub fn render_table(miners: &[MinerSummary]) -> String {
    let mut out = String::new();
    push_row(
        &mut out,
        [
            "Miner",
            "Status",
            "Score",
            "Region",
            "Adjusted Power",
            "Price",
            "VerifiedPrice",
            "Min Piece Size",
            "Max Piece Size",
        ],
    );
    for miner in miners {
        let score = score_label(&miner.score);
        push_row(
            &mut out,
            [
                text(&miner.miner_id),
                text(&miner.status),
                score.as_str(),
                text(&miner.location),
                text(&miner.adjusted_power),
                text(&miner.price),
                text(&miner.verified_price),
                text(&miner.min_piece_size),
                text(&miner.max_piece_size),
            ],
        );
    }
    out
}

fn push_row(out: &mut String, cells: [&str; 9]) {
    let _ = writeln!(
        out,
        "{:<10} {:<8} {:<6} {:<8} {:<15} {:<30} {:<20} {:<15} {}",
        cells[0], cells[1], cells[2], cells[3], cells[4], cells[5], cells[6], cells[7], cells[8]
    );
}

fn text(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

fn score_label(score: &Value) -> String {
    match score {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
