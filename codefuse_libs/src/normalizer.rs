use crate::{
    api::PlatformData,
    sources::{
        model::{CodeChefResponse, CodeforcesResponse, LeetCodeResponse, RawContestList},
        Platform, UnknownPlatform,
    },
};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use thiserror::Error;

// CodeChef displays contest dates in Indian Standard Time.
static CODECHEF_OFFSET: Lazy<FixedOffset> =
    Lazy::new(|| FixedOffset::east_opt(5 * 3600 + 30 * 60).expect("offset is in range"));

const CODECHEF_DATE_FORMAT: &str = "%d %b %Y %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContestStatus {
    Upcoming,
    Active,
    Past,
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ContestStatus::Upcoming => write!(f, "Upcoming"),
            ContestStatus::Active => write!(f, "Active"),
            ContestStatus::Past => write!(f, "Past"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown contest status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for ContestStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upcoming" => Ok(ContestStatus::Upcoming),
            "active" => Ok(ContestStatus::Active),
            "past" => Ok(ContestStatus::Past),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A contest of any platform in the common schema. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestRecord {
    pub id: String,
    pub name: String,
    pub url: String,
    pub start_time: i64,
    pub end_time: i64,
    pub platform: Platform,
    pub status: ContestStatus,
}

impl ContestRecord {
    /// Status as seen at `now`. A contest that already ended is `PAST` whatever its source said.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ContestStatus {
        if self.end_time <= now.timestamp_millis() {
            ContestStatus::Past
        } else {
            self.status
        }
    }
}

/// Map one platform's raw payload into contest records. Never fails.
pub fn normalize(platform: Platform, raw: &Value, now: DateTime<Utc>) -> Vec<ContestRecord> {
    match RawContestList::decode(platform, raw) {
        RawContestList::Codeforces(response) => from_codeforces(response, now),
        RawContestList::CodeChef(response) => from_codechef(response, now),
        RawContestList::LeetCode(response) => from_leetcode(response, now),
    }
}

/// Normalize every available payload and merge the records in start time order.
pub fn normalize_all(data: &PlatformData, now: DateTime<Utc>) -> Vec<ContestRecord> {
    Platform::ALL
        .iter()
        .filter_map(|platform| data.get(*platform).map(|raw| normalize(*platform, raw, now)))
        .flatten()
        .sorted_by_key(|record| record.start_time)
        .collect()
}

fn from_codeforces(response: CodeforcesResponse, now: DateTime<Utc>) -> Vec<ContestRecord> {
    response
        .result
        .unwrap_or_default()
        .into_iter()
        .filter(|contest| contest.phase.as_deref() != Some("FINISHED"))
        .map(|contest| {
            let id = contest.id.map(|id| id.to_string()).unwrap_or_default();
            let start_time = contest
                .start_time_seconds
                .map(|seconds| seconds.saturating_mul(1000))
                .unwrap_or(now.timestamp_millis());
            let duration = contest.duration_seconds.unwrap_or(0).saturating_mul(1000);
            let status = match contest.phase.as_deref() {
                Some("BEFORE") => ContestStatus::Upcoming,
                _ => ContestStatus::Active,
            };

            ContestRecord {
                url: format!("https://codeforces.com/contest/{}", id),
                id: format!("codeforces-{}", id),
                name: contest.name.unwrap_or_default(),
                start_time,
                end_time: start_time.saturating_add(duration),
                platform: Platform::Codeforces,
                status,
            }
        })
        .collect()
}

fn from_codechef(response: CodeChefResponse, now: DateTime<Utc>) -> Vec<ContestRecord> {
    response
        .future_contests
        .unwrap_or_default()
        .into_iter()
        .chain(response.present_contests.unwrap_or_default())
        .map(|contest| {
            let code = contest.contest_code.unwrap_or_default();
            let start_time = parse_codechef_date(
                contest.contest_start_date_iso.as_deref(),
                contest.contest_start_date.as_deref(),
            )
            .unwrap_or(now)
            .timestamp_millis();
            // A missing end reads as a zero length contest.
            let end_time = parse_codechef_date(
                contest.contest_end_date_iso.as_deref(),
                contest.contest_end_date.as_deref(),
            )
            .map(|date| date.timestamp_millis())
            .unwrap_or(start_time);
            let status = match contest.contest_status.as_deref() {
                Some("Upcoming") => ContestStatus::Upcoming,
                _ => ContestStatus::Active,
            };

            ContestRecord {
                id: format!("codechef-{}", code),
                url: format!("https://www.codechef.com/{}", code),
                name: contest.contest_name.unwrap_or_default(),
                start_time,
                end_time,
                platform: Platform::CodeChef,
                status,
            }
        })
        .collect()
}

fn from_leetcode(response: LeetCodeResponse, now: DateTime<Utc>) -> Vec<ContestRecord> {
    response
        .contests
        .unwrap_or_default()
        .into_iter()
        .filter_map(|contest| {
            let start_time = contest.start_time?.saturating_mul(1000);
            let duration = contest.duration.unwrap_or(0).saturating_mul(1000);
            let slug = contest.title_slug.unwrap_or_default();
            let status = if now.timestamp_millis() < start_time {
                ContestStatus::Upcoming
            } else {
                ContestStatus::Active
            };

            Some(ContestRecord {
                id: format!("leetcode-{}", slug),
                url: format!("https://leetcode.com/contest/{}", slug),
                name: contest.title.unwrap_or_default(),
                start_time,
                end_time: start_time.saturating_add(duration),
                platform: Platform::LeetCode,
                status,
            })
        })
        .collect()
}

/// Parse a CodeChef date, preferring the ISO 8601 variant over the display form
/// (`22 Jan 2025  20:00:00`, Indian Standard Time).
fn parse_codechef_date(iso: Option<&str>, display: Option<&str>) -> Option<DateTime<Utc>> {
    if let Some(date) = iso.and_then(|iso| DateTime::parse_from_rfc3339(iso.trim()).ok()) {
        return Some(date.with_timezone(&Utc));
    }

    let display = display?.split_whitespace().join(" ");
    if let Ok(date) = DateTime::parse_from_rfc3339(&display) {
        return Some(date.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&display, CODECHEF_DATE_FORMAT)
        .ok()
        .and_then(|naive| naive.and_local_timezone(*CODECHEF_OFFSET).single())
        .map(|date| date.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformFilter {
    #[default]
    All,
    Only(Platform),
}

impl FromStr for PlatformFilter {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(PlatformFilter::All)
        } else {
            s.parse().map(PlatformFilter::Only)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(ContestStatus),
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            Ok(StatusFilter::All)
        } else {
            s.parse().map(StatusFilter::Only)
        }
    }
}

/// Platform and status selection over normalized records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContestFilter {
    pub platform: PlatformFilter,
    pub status: StatusFilter,
}

impl ContestFilter {
    pub fn new(platform: PlatformFilter, status: StatusFilter) -> Self {
        Self { platform, status }
    }

    pub fn matches(&self, record: &ContestRecord, now: DateTime<Utc>) -> bool {
        let platform_match = match self.platform {
            PlatformFilter::All => true,
            PlatformFilter::Only(platform) => record.platform == platform,
        };
        let status_match = match self.status {
            StatusFilter::All => true,
            StatusFilter::Only(status) => record.effective_status(now) == status,
        };

        platform_match && status_match
    }

    pub fn apply(&self, records: Vec<ContestRecord>, now: DateTime<Utc>) -> Vec<ContestRecord> {
        records
            .into_iter()
            .filter(|record| self.matches(record, now))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1700000000 - 3600, 0).unwrap()
    }

    #[test]
    fn codeforces_before_phase_is_upcoming() {
        let raw = json!({
            "status": "OK",
            "result": [
                {"id": 1900, "name": "Codeforces Round 912", "phase": "BEFORE", "startTimeSeconds": 1700000000, "durationSeconds": 7200}
            ]
        });

        let records = normalize(Platform::Codeforces, &raw, now());

        assert_eq!(
            records,
            vec![ContestRecord {
                id: String::from("codeforces-1900"),
                name: String::from("Codeforces Round 912"),
                url: String::from("https://codeforces.com/contest/1900"),
                start_time: 1700000000000,
                end_time: 1700007200000,
                platform: Platform::Codeforces,
                status: ContestStatus::Upcoming,
            }]
        );
    }

    #[test]
    fn codeforces_drops_finished_and_marks_running_active() {
        let raw = json!({
            "status": "OK",
            "result": [
                {"id": 1, "name": "old", "phase": "FINISHED", "startTimeSeconds": 1600000000, "durationSeconds": 7200},
                {"id": 2, "name": "running", "phase": "CODING", "startTimeSeconds": 1699999000, "durationSeconds": 7200},
                {"id": 3, "name": "testing", "phase": "SYSTEM_TEST", "startTimeSeconds": 1699990000}
            ]
        });

        let records = normalize(Platform::Codeforces, &raw, now());

        assert_eq!(records.len(), 2);
        assert!(records
            .iter()
            .all(|record| record.status == ContestStatus::Active));
        // Missing duration counts as zero.
        assert_eq!(records[1].start_time, records[1].end_time);
    }

    #[test]
    fn codeforces_missing_start_defaults_to_now() {
        let raw = json!({"result": [{"id": 5, "phase": "BEFORE"}]});

        let records = normalize(Platform::Codeforces, &raw, now());

        assert_eq!(records[0].start_time, now().timestamp_millis());
        assert_eq!(records[0].name, "");
    }

    #[test]
    fn codechef_merges_future_and_present() {
        let raw = json!({
            "future_contests": [
                {"contest_code": "START120", "contest_name": "Starters 120", "contest_start_date": "07 Feb 2024  20:00:00", "contest_end_date": "07 Feb 2024  22:00:00", "contest_status": "Upcoming"}
            ],
            "present_contests": [
                {"contest_code": "PRACTICE", "contest_name": "Practice", "contest_start_date_iso": "2023-11-01T00:00:00+05:30", "contest_end_date_iso": "2030-01-01T00:00:00+05:30", "contest_status": "Running"}
            ]
        });

        let records = normalize(Platform::CodeChef, &raw, now());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "codechef-START120");
        assert_eq!(records[0].url, "https://www.codechef.com/START120");
        assert_eq!(records[0].status, ContestStatus::Upcoming);
        assert_eq!(
            records[0].start_time,
            Utc.with_ymd_and_hms(2024, 2, 7, 14, 30, 0)
                .unwrap()
                .timestamp_millis()
        );
        assert_eq!(records[0].end_time - records[0].start_time, 2 * 3600 * 1000);
        assert_eq!(records[1].status, ContestStatus::Active);
        assert_eq!(
            records[1].start_time,
            Utc.with_ymd_and_hms(2023, 10, 31, 18, 30, 0)
                .unwrap()
                .timestamp_millis()
        );
    }

    #[test]
    fn codechef_unparsable_date_defaults_to_now() {
        let raw = json!({
            "future_contests": [
                {"contest_code": "COOK", "contest_start_date": "someday"}
            ]
        });

        let records = normalize(Platform::CodeChef, &raw, now());

        assert_eq!(records[0].start_time, now().timestamp_millis());
        assert_eq!(records[0].end_time, now().timestamp_millis());
    }

    #[test]
    fn codechef_missing_end_date_keeps_contest_upcoming() {
        let raw = json!({
            "future_contests": [
                {
                    "contest_code": "START200",
                    "contest_name": "Starters 200",
                    "contest_start_date_iso": "2023-11-15T20:00:00+05:30",
                    "contest_end_date": "not a date",
                    "contest_status": "Upcoming"
                }
            ]
        });

        let records = normalize(Platform::CodeChef, &raw, now());

        let start = Utc.with_ymd_and_hms(2023, 11, 15, 14, 30, 0).unwrap();
        assert_eq!(records[0].start_time, start.timestamp_millis());
        assert_eq!(records[0].end_time, records[0].start_time);
        assert_eq!(records[0].effective_status(now()), ContestStatus::Upcoming);
    }

    #[test]
    fn leetcode_status_follows_clock() {
        let raw = json!({
            "contests": [
                {"titleSlug": "weekly-contest-373", "title": "Weekly Contest 373", "start_time": 1700000000, "duration": 5400},
                {"titleSlug": "biweekly-contest-117", "title": "Biweekly Contest 117", "start_time": 1699990000, "duration": 5400},
                {"titleSlug": "no-start", "title": "Broken"}
            ]
        });

        let records = normalize(Platform::LeetCode, &raw, now());

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "leetcode-weekly-contest-373");
        assert_eq!(records[0].url, "https://leetcode.com/contest/weekly-contest-373");
        assert_eq!(records[0].status, ContestStatus::Upcoming);
        assert_eq!(records[0].end_time, 1700005400000);
        assert_eq!(records[1].status, ContestStatus::Active);
    }

    #[test]
    fn empty_or_null_payload_yields_no_records() {
        for platform in Platform::ALL {
            assert!(normalize(platform, &Value::Null, now()).is_empty());
            assert!(normalize(platform, &json!({}), now()).is_empty());
            assert!(normalize(platform, &json!("rate limited"), now()).is_empty());
        }
    }

    #[test]
    fn merged_records_are_sorted_by_start_time() {
        let data = PlatformData {
            codeforces: Some(json!({
                "result": [
                    {"id": 2, "phase": "BEFORE", "startTimeSeconds": 1700300000},
                    {"id": 1, "phase": "BEFORE", "startTimeSeconds": 1700100000}
                ]
            })),
            codechef: None,
            leetcode: Some(json!({
                "contests": [
                    {"titleSlug": "c", "start_time": 1700400000},
                    {"titleSlug": "a", "start_time": 1700000000},
                    {"titleSlug": "b", "start_time": 1700200000}
                ]
            })),
        };

        let records = normalize_all(&data, now());

        let ids: Vec<&str> = records.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "leetcode-a",
                "codeforces-1",
                "leetcode-b",
                "codeforces-2",
                "leetcode-c"
            ]
        );
        assert!(records
            .windows(2)
            .all(|pair| pair[0].start_time <= pair[1].start_time));
    }

    #[test]
    fn ended_contest_is_past() {
        let record = ContestRecord {
            id: String::from("codeforces-1"),
            name: String::new(),
            url: String::new(),
            start_time: 0,
            end_time: 1000,
            platform: Platform::Codeforces,
            status: ContestStatus::Active,
        };

        assert_eq!(record.effective_status(now()), ContestStatus::Past);
        assert_eq!(
            record.effective_status(Utc.timestamp_opt(0, 0).unwrap()),
            ContestStatus::Active
        );
    }

    #[test]
    fn filter_by_platform_and_status() {
        let data = PlatformData {
            codeforces: Some(json!({
                "result": [
                    {"id": 1, "phase": "BEFORE", "startTimeSeconds": 1700000000, "durationSeconds": 7200},
                    {"id": 2, "phase": "CODING", "startTimeSeconds": 1699999000, "durationSeconds": 7200}
                ]
            })),
            codechef: None,
            leetcode: Some(json!({"contests": [{"titleSlug": "a", "start_time": 1700000000}]})),
        };
        let records = normalize_all(&data, now());

        let filter = ContestFilter::new(
            "codeforces".parse().unwrap(),
            "UPCOMING".parse().unwrap(),
        );
        let filtered = filter.apply(records.clone(), now());
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "codeforces-1");

        assert_eq!(ContestFilter::default().apply(records, now()).len(), 3);
    }

    #[test]
    fn parse_filters() {
        assert_eq!("All".parse::<PlatformFilter>().unwrap(), PlatformFilter::All);
        assert_eq!(
            "leetcode".parse::<PlatformFilter>().unwrap(),
            PlatformFilter::Only(Platform::LeetCode)
        );
        assert_eq!(
            "past".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(ContestStatus::Past)
        );
        assert!("finished".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ContestStatus::Upcoming).unwrap(),
            r#""UPCOMING""#
        );
    }
}
