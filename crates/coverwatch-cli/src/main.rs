mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use coverwatch_core::{AssignmentKey, EngineConfig, ExceptionId, NotificationEvent, RiskLevel};
use coverwatch_engine::{
    ComplianceService, EngineError, ErrorCode, ExceptionOutcome, ExceptionRequest, ExceptionTerm,
    Principal, ReauthAttestation, Submission, VerificationRequest, Verifier,
};
use coverwatch_notify::{NotifyClient, to_json_lines};
use coverwatch_store::{ComplianceStore, DuckStore};
use tracing::info;

#[derive(Parser)]
#[command(name = "coverwatch")]
#[command(about = "Certificate of currency verification and compliance tracking")]
#[command(version)]
struct Cli {
    /// DuckDB database file; required by every command except `verify`
    #[arg(long, global = true, env = "COVERWATCH_DB")]
    db: Option<PathBuf>,

    /// Engine configuration (JSON); built-in defaults when absent
    #[arg(long, global = true, env = "COVERWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Notification service base URL; events print as JSON lines when absent
    #[arg(long, global = true, env = "COVERWATCH_NOTIFY_URL")]
    notify_url: Option<String>,

    /// Print results as JSON instead of cards
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a certificate offline, without touching the store
    Verify {
        /// Verification request (JSON)
        #[arg(long)]
        file: PathBuf,
        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Submit a certificate against an assignment and record the verdict
    Submit {
        /// Submission (JSON)
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Show an assignment's compliance status
    Status {
        #[arg(long)]
        project: String,
        #[arg(long)]
        subcontractor: String,
    },
    /// Manage compliance exceptions
    #[command(subcommand)]
    Exception(ExceptionCommand),
    /// Expire every dated exception that is due
    Sweep {
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum ExceptionCommand {
    /// Request a waiver for a non-compliant assignment
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        subcontractor: String,
        #[arg(long, value_enum)]
        risk: RiskArg,
        #[arg(long, value_enum)]
        term: TermArg,
        /// Length of a fixed-duration waiver
        #[arg(long, required_if_eq("term", "fixed-duration"))]
        days: Option<u32>,
        /// End of a specific-date waiver (RFC 3339)
        #[arg(long, required_if_eq("term", "specific-date"))]
        until: Option<DateTime<Utc>>,
        #[arg(long)]
        reason: String,
        /// Requesting principal
        #[arg(long)]
        principal: String,
        /// The principal may approve their own request
        #[arg(long)]
        auto_approve: bool,
        /// When the principal last re-authenticated (RFC 3339); needed for permanent waivers
        #[arg(long)]
        reauth_at: Option<DateTime<Utc>>,
    },
    /// Approve a pending exception
    Approve {
        id: u64,
        #[arg(long)]
        principal: String,
    },
    /// Reject a pending exception
    Reject {
        id: u64,
        #[arg(long)]
        principal: String,
    },
    /// Close an active exception manually
    Resolve { id: u64 },
}

#[derive(Clone, Copy, ValueEnum)]
enum RiskArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<RiskArg> for RiskLevel {
    fn from(arg: RiskArg) -> Self {
        match arg {
            RiskArg::Low => RiskLevel::Low,
            RiskArg::Medium => RiskLevel::Medium,
            RiskArg::High => RiskLevel::High,
            RiskArg::Critical => RiskLevel::Critical,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TermArg {
    UntilResolved,
    FixedDuration,
    SpecificDate,
    Permanent,
}

fn term(arg: TermArg, days: Option<u32>, until: Option<DateTime<Utc>>) -> anyhow::Result<ExceptionTerm> {
    Ok(match arg {
        TermArg::UntilResolved => ExceptionTerm::UntilResolved,
        TermArg::FixedDuration => ExceptionTerm::FixedDuration {
            days: days.context("--days is required for a fixed-duration exception")?,
        },
        TermArg::SpecificDate => ExceptionTerm::SpecificDate {
            until: until.context("--until is required for a specific-date exception")?,
        },
        TermArg::Permanent => ExceptionTerm::Permanent,
    })
}

type Service = ComplianceService<dyn ComplianceStore>;

struct App {
    json: bool,
    db: Option<PathBuf>,
    notify: Option<NotifyClient>,
    verifier: Arc<Verifier>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = EngineConfig::load(cli.config.as_deref()).context("loading engine config")?;
    let app = App {
        json: cli.json,
        db: cli.db,
        notify: cli.notify_url.map(NotifyClient::new),
        verifier: Arc::new(Verifier::from_config(config)),
    };
    let now = Utc::now();

    match cli.command {
        Command::Verify { file, as_of } => {
            let mut request: VerificationRequest = read_json(&file)?;
            if as_of.is_some() {
                request.as_of = as_of;
            }
            let verdict = app.verifier.verify(&request);
            if app.json {
                println!("{}", serde_json::to_string_pretty(&verdict)?);
            } else {
                print!("{}", display::verdict_card(&request.document_id, &verdict));
            }
        }
        Command::Submit { file, as_of } => {
            let submission: Submission = read_json(&file)?;
            let at = as_of.unwrap_or(now);
            let service = app.service()?;
            service.register_assignment(&submission.assignment, at)?;
            let outcome = service.submit(submission, at).await?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                if outcome.replayed {
                    println!("(replayed: this document already has a blocked verdict)");
                }
                print!("{}", display::record_card(&outcome.record));
                println!();
                println!("  {:<26} {}", "assignment_status", outcome.assignment.status);
            }
            app.publish(&outcome.events).await?;
        }
        Command::Status { project, subcontractor } => {
            let view = app.service()?.status(&AssignmentKey::new(project, subcontractor))?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", display::assignment_card(&view));
            }
        }
        Command::Exception(cmd) => {
            let outcome = exception_command(&app.service()?, cmd, now)?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!(
                    "{}",
                    display::exception_card(&outcome.exception, outcome.assignment.as_ref())
                );
            }
            app.publish(&outcome.events).await?;
        }
        Command::Sweep { as_of } => {
            let report = app.service()?.sweep_expired(as_of.unwrap_or(now))?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", display::sweep_summary(&report));
            }
            app.publish(&report.events).await?;
        }
    }
    Ok(())
}

fn exception_command(
    service: &Service,
    cmd: ExceptionCommand,
    now: DateTime<Utc>,
) -> anyhow::Result<ExceptionOutcome> {
    let outcome = match cmd {
        ExceptionCommand::Create {
            project,
            subcontractor,
            risk,
            term: term_arg,
            days,
            until,
            reason,
            principal,
            auto_approve,
            reauth_at,
        } => {
            let request = ExceptionRequest {
                assignment: AssignmentKey::new(project, subcontractor),
                risk_level: risk.into(),
                term: term(term_arg, days, until)?,
                reason,
            };
            let reauth = reauth_at.map(|verified_at| ReauthAttestation {
                principal_id: principal.clone(),
                verified_at,
            });
            let mut requester = Principal::new(principal);
            if auto_approve {
                requester = requester.with_auto_approve();
            }
            service.create_exception(&request, &requester, reauth.as_ref(), now)?
        }
        ExceptionCommand::Approve { id, principal } => {
            service.approve_exception(ExceptionId(id), &Principal::new(principal), now)?
        }
        ExceptionCommand::Reject { id, principal } => {
            service.reject_exception(ExceptionId(id), &Principal::new(principal), now)?
        }
        ExceptionCommand::Resolve { id } => service.resolve_exception(ExceptionId(id), now)?,
    };
    Ok(outcome)
}

fn open_store(path: &Path) -> anyhow::Result<Arc<dyn ComplianceStore>> {
    info!(path = %path.display(), "opening compliance database");
    let store = DuckStore::open_persistent(path)
        .with_context(|| format!("opening database {}", path.display()))?;
    Ok(Arc::new(store))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

impl App {
    /// Offline verification never opens the store; everything else needs a
    /// database that outlives the process.
    fn service(&self) -> anyhow::Result<Service> {
        let path = self
            .db
            .as_deref()
            .context("this command needs a compliance database: pass --db or set COVERWATCH_DB")?;
        let store = open_store(path)?;
        Ok(ComplianceService::new(store, Arc::clone(&self.verifier)))
    }

    async fn publish(&self, events: &[NotificationEvent]) -> anyhow::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        match &self.notify {
            Some(client) => {
                let accepted = client
                    .push_events(events)
                    .await
                    .context("pushing events to notification service")?;
                info!(accepted, "events delivered");
            }
            None => print!("{}", to_json_lines(events)?),
        }
        Ok(())
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    let Some(engine) = err.downcast_ref::<EngineError>() else {
        return 1;
    };
    match engine.code() {
        ErrorCode::ValidationError => 2,
        ErrorCode::NotFound => 3,
        ErrorCode::Conflict => 4,
        ErrorCode::InternalError => 1,
    }
}
