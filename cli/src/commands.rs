//! CLI commands
//!
//! Each command runs against a ledger restored from the snapshot file and
//! returns the text to print. Commands that change the ledger report
//! `true` so the caller writes the snapshot back.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use commission_ledger_core_rs::query::Period;
use commission_ledger_core_rs::{
    Agent, AgentNumber, AgentRole, Clock, CommissionFilter, CommissionLedger, CommissionStatus,
    EnrollmentEvent, Event, InMemoryCommissionStore, Member, MemberId, PaymentStatus, SystemClock,
    WriteOutcome,
};
use tracing::info;

pub type Ledger = CommissionLedger<InMemoryCommissionStore, SystemClock>;

/// Ledger commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Look up the commission for a plan
    Rate {
        /// Plan tier (Base, Plus, Elite)
        tier: String,
        /// Coverage type (e.g. "Member Only", "Family")
        coverage: String,
        /// Add-on name, repeatable (e.g. Rx)
        #[arg(long = "add-on")]
        add_ons: Vec<String>,
    },

    /// Agent directory operations
    #[command(subcommand)]
    Agent(AgentCommands),

    /// Write the commission for one enrollment event (JSON file)
    Record {
        /// Path to an enrollment event JSON object
        event: String,
    },

    /// Backfill commissions for members that have none
    Reconcile {
        /// Path to a JSON array of enrollment events
        members: String,
    },

    /// Sum stored commission amounts
    Totals {
        /// Restrict to one agent number
        #[arg(long)]
        agent_number: Option<String>,
        /// Restrict to a payment status (unpaid, pending, paid)
        #[arg(long)]
        payment_status: Option<String>,
        /// Period: month, year or lifetime
        #[arg(long, default_value = "lifetime")]
        period: String,
    },

    /// Print the flat export list as JSON
    Export {
        #[arg(long)]
        agent_number: Option<String>,
        #[arg(long)]
        payment_status: Option<String>,
    },

    /// Merge a duplicate agent account into a survivor
    Merge {
        /// Internal id being retired
        retired: String,
        /// Internal id that survives
        survivor: String,
    },

    /// Approve a pending commission
    Approve { commission_id: String },

    /// Move a commission's payment status (pending, paid)
    Payout {
        commission_id: String,
        status: String,
    },

    /// List members flagged for manual review
    Flags,

    /// Print the audit log as JSON
    Events {
        /// Only events for this member id
        #[arg(long)]
        member: Option<MemberId>,
        /// Only events naming this agent internal id
        #[arg(long)]
        agent: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum AgentCommands {
    /// Issue a number and register a new agent
    Add {
        /// Internal id (login/user id)
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// Role code: AG, MA or HQ
        #[arg(long, default_value = "AG")]
        role: String,
        /// Issue year (defaults to the current year)
        #[arg(long)]
        year: Option<u16>,
    },

    /// List agents
    List,
}

/// Execute a command, returning output text and whether the ledger changed
pub fn execute_command(ledger: &mut Ledger, command: Commands) -> Result<(String, bool)> {
    match command {
        Commands::Rate {
            tier,
            coverage,
            add_ons,
        } => {
            let quote = ledger
                .rate_table()
                .calculate_commission(&tier, &coverage, &add_ons)?;
            Ok((format!("{} ({} cents)", dollars(quote.amount), quote.amount), false))
        }

        Commands::Agent(cmd) => execute_agent_command(ledger, cmd),

        Commands::Record { event } => {
            let event: EnrollmentEvent = read_json(&event)?;
            let outcome = ledger.record_enrollment(&Member::from_event(event))?;
            let text = match &outcome {
                WriteOutcome::Recorded(c) => format!(
                    "recorded {} for member {}: {} to {}",
                    c.id(),
                    c.member_id(),
                    dollars(c.amount()),
                    c.agent_number()
                ),
                WriteOutcome::AlreadyRecorded(c) => {
                    format!("member {} already has commission {}", c.member_id(), c.id())
                }
                WriteOutcome::NeedsReview { member_id, reason } => {
                    format!("member {} flagged for review: {}", member_id, reason)
                }
            };
            Ok((text, true))
        }

        Commands::Reconcile { members } => {
            let events: Vec<EnrollmentEvent> = read_json(&members)?;
            let source: Vec<Member> = events.into_iter().map(Member::from_event).collect();
            let report = ledger.reconcile(&source)?;
            Ok((serde_json::to_string_pretty(&report)?, true))
        }

        Commands::Totals {
            agent_number,
            payment_status,
            period,
        } => {
            let now = ledger.clock().now();
            let mut filter = build_filter(agent_number.as_deref(), payment_status.as_deref())?;
            filter = match period.to_ascii_lowercase().as_str() {
                "lifetime" => filter,
                "month" => filter.enrolled_since(Period::Month.start(now)),
                "year" => filter.enrolled_since(Period::Year.start(now)),
                other => bail!("unknown period '{}'", other),
            };

            let query = ledger.query();
            let mut lines = Vec::new();
            for (number, total) in query.totals_by_agent(&filter)? {
                lines.push(format!(
                    "{}  {:>5} rows  {}",
                    number,
                    total.count,
                    dollars(total.amount)
                ));
            }
            lines.push(format!("TOTAL  {}", dollars(query.total(&filter)?)));
            Ok((lines.join("\n"), false))
        }

        Commands::Export {
            agent_number,
            payment_status,
        } => {
            let filter = build_filter(agent_number.as_deref(), payment_status.as_deref())?;
            let rows = ledger.query().export_rows(&filter)?;
            Ok((serde_json::to_string_pretty(&rows)?, false))
        }

        Commands::Merge { retired, survivor } => {
            let merged = ledger.merge_agents(&retired, &survivor)?;
            Ok((
                format!(
                    "merged {} into {}; {} commission(s) repointed",
                    merged.retired_id, merged.survivor_id, merged.repointed
                ),
                true,
            ))
        }

        Commands::Approve { commission_id } => {
            let c = ledger.approve(&commission_id)?;
            Ok((format!("{} is now {}", c.id(), c.status()), true))
        }

        Commands::Payout {
            commission_id,
            status,
        } => {
            let status = PaymentStatus::parse(&status)
                .ok_or_else(|| anyhow!("unknown payment status '{}'", status))?;
            let c = ledger.set_payment_status(&commission_id, status)?;
            let paid = match c.paid_at() {
                Some(at) if c.status() == CommissionStatus::Paid => format!(" (paid {})", at),
                _ => String::new(),
            };
            Ok((format!("{} payment status {}{}", c.id(), c.payment_status(), paid), true))
        }

        Commands::Flags => {
            let flags = ledger.review_flags()?;
            if flags.is_empty() {
                return Ok(("no members flagged".to_string(), false));
            }
            let lines: Vec<String> = flags
                .iter()
                .map(|f| format!("{}  {}  {}", f.member_id, f.flagged_at, f.reason))
                .collect();
            Ok((lines.join("\n"), false))
        }

        Commands::Events { member, agent } => {
            let log = ledger.event_log();
            let events: Vec<&Event> = log
                .events()
                .iter()
                .filter(|e| member.map_or(true, |id| e.member_id() == Some(id)))
                .filter(|e| agent.as_deref().map_or(true, |a| e.involves_agent(a)))
                .collect();
            Ok((serde_json::to_string_pretty(&events)?, false))
        }
    }
}

fn execute_agent_command(ledger: &mut Ledger, command: AgentCommands) -> Result<(String, bool)> {
    match command {
        AgentCommands::Add {
            id,
            name,
            email,
            role,
            year,
        } => {
            let role = AgentRole::from_code(&role.to_ascii_uppercase())
                .ok_or_else(|| anyhow!("unknown role code '{}'", role))?;
            let year = match year {
                Some(y) => y,
                None => current_year(ledger.clock().now())?,
            };
            let number = ledger.directory_mut().issue_agent_number(role, year)?;
            let mut agent = Agent::new(id, number.clone(), name);
            if let Some(email) = email {
                agent = agent.with_email(&email);
            }
            ledger.register_agent(agent)?;
            info!(agent_number = %number, "agent added");
            Ok((number.to_string(), true))
        }

        AgentCommands::List => {
            let lines: Vec<String> = ledger
                .directory()
                .agents()
                .iter()
                .map(|a| {
                    let state = match (a.merged_into(), a.is_active()) {
                        (Some(target), _) => format!("merged into {}", target),
                        (None, true) => "active".to_string(),
                        (None, false) => "inactive".to_string(),
                    };
                    format!(
                        "{}  {}  {}  {}",
                        a.agent_number(),
                        a.internal_id(),
                        a.display_name(),
                        state
                    )
                })
                .collect();
            Ok((lines.join("\n"), false))
        }
    }
}

fn build_filter(
    agent_number: Option<&str>,
    payment_status: Option<&str>,
) -> Result<CommissionFilter> {
    let mut filter = CommissionFilter::new();
    if let Some(number) = agent_number {
        filter = filter.with_agent_number(AgentNumber::parse(number)?);
    }
    if let Some(status) = payment_status {
        let status = PaymentStatus::parse(status)
            .ok_or_else(|| anyhow!("unknown payment status '{}'", status))?;
        filter = filter.payment_status(status);
    }
    Ok(filter)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path))
}

fn current_year(now: DateTime<Utc>) -> Result<u16> {
    use chrono::Datelike;
    u16::try_from(now.year()).context("current year out of range")
}

/// Format cents as dollars
fn dollars(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}${}.{:02}", sign, abs / 100, abs % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dollars() {
        assert_eq!(dollars(900), "$9.00");
        assert_eq!(dollars(4250), "$42.50");
        assert_eq!(dollars(-5), "-$0.05");
    }
}
