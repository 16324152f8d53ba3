use crate::{cmd::server::shutdown_signal, modules::config};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use codefuse_libs::reminder::{
    FileStorage, Notifier, Reminder, ReminderScheduler, ReminderStore,
};
use std::time::Duration;

#[derive(Debug, Args)]
pub struct RemindArgs {
    #[command(subcommand)]
    action: RemindAction,
}

#[derive(Debug, Subcommand)]
enum RemindAction {
    /// Schedule a reminder for a contest
    Set {
        contest_id: String,
        /// Firing time in RFC 3339, e.g. 2026-10-20T14:35:00Z
        at: DateTime<Utc>,
    },
    /// Cancel the reminder of a contest
    Cancel { contest_id: String },
    /// Show scheduled reminders
    List,
    /// Poll the store and fire due reminders until interrupted
    Watch {
        /// Poll interval in seconds. Overrides REMINDER_POLL_SECS.
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Prints fired reminders to stdout.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, reminder: &Reminder) {
        tracing::info!(target: "reminder", "fire reminder for {}", reminder.contest_id);
        println!("{}", reminder_message(reminder));
    }
}

fn reminder_message(reminder: &Reminder) -> String {
    format!(
        "CodeFuse Reminder: {} is starting soon! ({})",
        reminder.contest_id,
        reminder.fire_at.to_rfc3339()
    )
}

pub async fn run(args: RemindArgs) -> Result<()> {
    let path = config::reminder_store_path();
    let store = ReminderStore::new(FileStorage::new(&path));

    match args.action {
        RemindAction::Set { contest_id, at } => {
            if at <= Utc::now() {
                tracing::warn!(
                    "{} is already past, the reminder fires on the next check",
                    at.to_rfc3339()
                );
            }
            store.set_reminder(&contest_id, at).with_context(|| {
                let message = format!("failed to save reminder to {}", path.display());
                tracing::error!(message);
                message
            })?;
            println!("Reminder set for {} at {}", contest_id, at.to_rfc3339());
        }
        RemindAction::Cancel { contest_id } => {
            if store.cancel_reminder(&contest_id)? {
                println!("Reminder cancelled for {}", contest_id);
            } else {
                println!("No reminder found for {}", contest_id);
            }
        }
        RemindAction::List => {
            let reminders = store.reminders()?;
            if reminders.is_empty() {
                println!("No reminders scheduled");
            }
            for reminder in reminders {
                println!("{}  {}", reminder.fire_at.to_rfc3339(), reminder.contest_id);
            }
        }
        RemindAction::Watch { interval } => {
            let interval = match interval {
                Some(secs) if secs > 0 => Duration::from_secs(secs),
                _ => config::reminder_poll_interval(),
            };
            tracing::info!(
                "watch reminders in {} every {}s",
                path.display(),
                interval.as_secs()
            );
            let scheduler = ReminderScheduler::new(store, ConsoleNotifier, interval);
            scheduler.run(shutdown_signal()).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn message_names_the_contest() {
        let reminder = Reminder {
            contest_id: String::from("leetcode-weekly-contest-400"),
            fire_at: Utc.timestamp_opt(1_717_295_400, 0).unwrap(),
        };

        assert_eq!(
            reminder_message(&reminder),
            "CodeFuse Reminder: leetcode-weekly-contest-400 is starting soon! (2024-06-02T02:30:00+00:00)"
        );
    }

    #[test]
    fn parse_set_action() {
        #[derive(Debug, clap::Parser)]
        struct Cli {
            #[command(flatten)]
            args: RemindArgs,
        }

        let cli = <Cli as clap::Parser>::try_parse_from([
            "remind",
            "set",
            "codeforces-1900",
            "2026-10-20T14:35:00Z",
        ])
        .unwrap();

        match cli.args.action {
            RemindAction::Set { contest_id, at } => {
                assert_eq!(contest_id, "codeforces-1900");
                assert_eq!(at, Utc.with_ymd_and_hms(2026, 10, 20, 14, 35, 0).unwrap());
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }
}
