use crate::modules::config;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::Args;
use codefuse_libs::{
    api::AggregateEnvelope,
    client::{ApiClient, DEFAULT_CLIENT_TIMEOUT},
    normalize_all,
    normalizer::{PlatformFilter, StatusFilter},
    Aggregator, ContestFilter, ContestRecord,
};
use itertools::Itertools;

const NO_CONTESTS_MESSAGE: &str = "No contests found matching your criteria";

#[derive(Debug, Args)]
pub struct ContestsArgs {
    /// all, codeforces, codechef or leetcode
    #[arg(long, default_value = "all")]
    platform: PlatformFilter,
    /// all, upcoming, active or past
    #[arg(long, default_value = "all")]
    status: StatusFilter,
    /// Print the normalized records as JSON
    #[arg(long)]
    json: bool,
    /// Base url of a running server, e.g. http://localhost:3000/api.
    /// Sources are fetched in-process when omitted.
    #[arg(long)]
    endpoint: Option<String>,
}

pub async fn run(args: ContestsArgs) -> Result<()> {
    let envelope = fetch(args.endpoint.as_deref()).await?;
    if !envelope.success {
        let message = format!(
            "Failed to fetch contest data: {}",
            envelope.failure_summary()
        );
        tracing::error!(message);
        anyhow::bail!(message);
    }
    for failure in envelope.failures() {
        tracing::warn!(
            "{} is unavailable and skipped: {}",
            failure.platform,
            failure.message
        );
    }

    let now = Utc::now();
    let filter = ContestFilter::new(args.platform, args.status);
    let records = filter.apply(normalize_all(&envelope.data, now), now);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else if records.is_empty() {
        println!("{}", NO_CONTESTS_MESSAGE);
    } else {
        println!("{}", render_table(&records, now, &Local));
    }

    Ok(())
}

async fn fetch(endpoint: Option<&str>) -> Result<AggregateEnvelope> {
    match endpoint {
        Some(endpoint) => {
            tracing::info!("fetch contests from {}", endpoint);
            let client = ApiClient::new(endpoint, DEFAULT_CLIENT_TIMEOUT).with_context(|| {
                let message = format!("couldn't create api client for {}", endpoint);
                tracing::error!(message);
                message
            })?;
            client
                .fetch_contests()
                .await
                .context("Failed to fetch contest data")
        }
        None => {
            let config = config::load_aggregator_config()?;
            let aggregator = Aggregator::new(&config)
                .context("couldn't create http clients for contest sources")?;
            Ok(aggregator.aggregate().await)
        }
    }
}

fn format_time<Tz: TimeZone>(millis: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => String::from("-"),
    }
}

fn render_table<Tz: TimeZone>(records: &[ContestRecord], now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let rows = records
        .iter()
        .map(|record| {
            [
                record.platform.to_string(),
                record.effective_status(now).to_string(),
                format_time(record.start_time, tz),
                format_time(record.end_time, tz),
                record.name.clone(),
                record.url.clone(),
            ]
        })
        .collect_vec();
    let header = ["PLATFORM", "STATUS", "START", "END", "NAME", "URL"].map(String::from);

    let widths = (0..header.len())
        .map(|i| {
            std::iter::once(&header)
                .chain(rows.iter())
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect_vec();

    std::iter::once(&header)
        .chain(rows.iter())
        .map(|row| {
            row.iter()
                .zip(widths.iter())
                .map(|(cell, width)| format!("{:<width$}", cell, width = width))
                .join("  ")
                .trim_end()
                .to_string()
        })
        .join("\n")
}

#[cfg(test)]
mod test {
    use super::*;
    use codefuse_libs::{ContestStatus, Platform};

    fn record(id: &str, platform: Platform, start_time: i64, end_time: i64) -> ContestRecord {
        ContestRecord {
            id: id.to_string(),
            name: format!("Contest {}", id),
            url: format!("https://example.com/{}", id),
            start_time,
            end_time,
            platform,
            status: ContestStatus::Upcoming,
        }
    }

    #[test]
    fn table_has_aligned_columns() {
        let now = Utc.timestamp_opt(0, 0).unwrap();
        let records = vec![
            record("a", Platform::Codeforces, 3_600_000, 7_200_000),
            record("bb", Platform::LeetCode, 7_200_000, 9_000_000),
        ];

        let table = render_table(&records, now, &Utc);
        let lines = table.lines().collect_vec();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("PLATFORM    STATUS"));
        assert!(lines[1].starts_with("Codeforces  Upcoming  1970-01-01 01:00  1970-01-01 02:00"));
        assert!(lines[2].starts_with("LeetCode    Upcoming  1970-01-01 02:00  1970-01-01 02:30"));
        assert!(lines[2].ends_with("https://example.com/bb"));
    }

    #[test]
    fn finished_contests_render_as_past() {
        let now = Utc.timestamp_opt(10_000, 0).unwrap();
        let records = vec![record("a", Platform::CodeChef, 3_600_000, 7_200_000)];

        let table = render_table(&records, now, &Utc);

        assert!(table.lines().nth(1).unwrap().starts_with("CodeChef  Past"));
    }
}
