//! Penplot CLI
//!
//! Operator commands over a penplot workspace: inspect job state and history,
//! recover jobs after a crash, drive and check transitions, trim journals.

use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex, PoisonError};

use clap::{Parser, Subcommand};
use serde_json::{json, Map};
use tracing_subscriber::EnvFilter;

use penplot_core::config::{default_host_config_path, CoreConfig, EffectiveConfig};
use penplot_core::hooks::CommandHookExecutor;
use penplot_core::{
    create_state_machine, CrashRecoveryRegistry, GuardAdapters, GuardCheck, GuardEngine, JobState,
    JournalRecord, ParseStateError, RecoveryManager, StateMachine, Workspace,
};

const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_DENIED: i32 = 3;

#[derive(Parser)]
#[command(name = "penplot")]
#[command(about = "Pen plotter job lifecycle", version)]
struct Cli {
    /// Workspace root (default: current directory)
    #[arg(long, short = 'w', global = true)]
    workspace: Option<PathBuf>,

    /// Override guards.timeout_seconds
    #[arg(long, global = true)]
    guard_timeout: Option<u64>,

    /// Debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the replayed state of a job
    Status {
        job_id: String,

        #[arg(long)]
        json: bool,
    },

    /// Print a job's journal
    History {
        job_id: String,

        #[arg(long)]
        json: bool,
    },

    /// List jobs that can be resumed
    Resumable {
        #[arg(long)]
        json: bool,
    },

    /// Recover one job, or every resumable job
    Recover { job_id: Option<String> },

    /// Request a state transition
    Transition {
        job_id: String,

        /// Target state (e.g. ARMED)
        state: String,

        #[arg(long, default_value = "operator request")]
        reason: String,
    },

    /// Evaluate guards for a target state without transitioning
    Guards {
        job_id: String,

        state: String,

        #[arg(long)]
        json: bool,
    },

    /// Trim a job's journal to its most recent records
    Cleanup {
        job_id: String,

        /// Records to keep (default: journal.keep_entries)
        #[arg(long)]
        keep: Option<usize>,
    },
}

struct App {
    workspace: Workspace,
    config: CoreConfig,
    guards: Arc<GuardEngine>,
}

impl App {
    fn load(cli: &Cli) -> Result<Self, String> {
        let root = match &cli.workspace {
            Some(root) => root.clone(),
            None => std::env::current_dir().map_err(|e| e.to_string())?,
        };
        let workspace = Workspace::new(root);

        let overrides = cli
            .guard_timeout
            .map(|secs| json!({"guards": {"timeout_seconds": secs}}));
        let host_path = default_host_config_path();
        let workspace_config = workspace.config_path();
        let config = EffectiveConfig::build(
            host_path.as_deref(),
            Some(workspace_config.as_path()),
            overrides,
        )
        .and_then(|effective| effective.core())
        .map_err(|e| e.to_string())?;

        let adapters = GuardAdapters::from_config(&config, &workspace);
        let guards = Arc::new(GuardEngine::standard(adapters, &config.guards));
        Ok(Self {
            workspace,
            config,
            guards,
        })
    }

    fn recovery(&self) -> RecoveryManager {
        RecoveryManager::new(self.workspace.clone(), Arc::clone(&self.guards))
            .with_hooks(Arc::new(CommandHookExecutor::new()), self.config.hooks.clone())
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let app = App::load(&cli)
        .unwrap_or_else(|e| fail(EXIT_ERROR, &format!("configuration error: {}", e)));

    match cli.command {
        Commands::Status { job_id, json } => run_status(&app, &job_id, json),
        Commands::History { job_id, json } => run_history(&app, &job_id, json),
        Commands::Resumable { json } => run_resumable(&app, json),
        Commands::Recover { job_id } => run_recover(&app, job_id.as_deref()),
        Commands::Transition {
            job_id,
            state,
            reason,
        } => run_transition(&app, &job_id, &state, &reason),
        Commands::Guards {
            job_id,
            state,
            json,
        } => run_guards(&app, &job_id, &state, json),
        Commands::Cleanup { job_id, keep } => run_cleanup(&app, &job_id, keep),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "penplot=debug" } else { "penplot=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(code: i32, message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(code);
}

fn parse_state(name: &str) -> JobState {
    name.parse()
        .unwrap_or_else(|e: ParseStateError| fail(EXIT_USAGE, &e.to_string()))
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => fail(EXIT_ERROR, &format!("serializing output: {}", e)),
    }
}

fn print_checks(checks: &[GuardCheck]) {
    for check in checks {
        println!("  [{}] {}: {}", check.result, check.name, check.message);
    }
}

fn run_status(app: &App, job_id: &str, json_output: bool) {
    let replay = match app.recovery().inspect(job_id) {
        Ok(Some(replay)) => replay,
        Ok(None) => fail(EXIT_USAGE, &format!("no journal for job {}", job_id)),
        Err(e) => fail(EXIT_ERROR, &e.to_string()),
    };

    let state = replay.state_or_new();
    if json_output {
        print_json(&json!({
            "job_id": job_id,
            "state": state,
            "transitions": replay.transitions.len(),
            "resumable": replay.is_resumable(),
            "had_emergency_shutdown": replay.had_emergency_shutdown,
            "skipped_records": replay.skipped,
            "torn_tail": replay.torn_tail,
        }));
        return;
    }

    println!("Job {}", job_id);
    println!("  State: {}", state);
    println!("  Transitions: {}", replay.transitions.len());
    println!("  Resumable: {}", if replay.is_resumable() { "yes" } else { "no" });
    if replay.had_emergency_shutdown {
        println!("  Emergency shutdown recorded");
    }
    if replay.skipped > 0 {
        println!("  Corrupt records skipped: {}", replay.skipped);
    }
}

fn run_history(app: &App, job_id: &str, json_output: bool) {
    let replay = match app.recovery().inspect(job_id) {
        Ok(Some(replay)) => replay,
        Ok(None) => fail(EXIT_USAGE, &format!("no journal for job {}", job_id)),
        Err(e) => fail(EXIT_ERROR, &e.to_string()),
    };

    if json_output {
        match serde_json::to_value(&replay.entries) {
            Ok(value) => print_json(&value),
            Err(e) => fail(EXIT_ERROR, &e.to_string()),
        }
        return;
    }

    for entry in &replay.entries {
        let summary = match &entry.record {
            JournalRecord::StateChange {
                from_state,
                to_state,
                reason,
                ..
            } => format!("{} -> {} ({})", from_state, to_state, reason),
            JournalRecord::GuardsEvaluated { target, checks, .. } => {
                format!("{} guards checked for {}", checks.len(), target)
            }
            JournalRecord::HooksExecuted { state, results } => {
                let ok = results.iter().filter(|r| r.success).count();
                format!("{}/{} hooks succeeded on {}", ok, results.len(), state)
            }
            JournalRecord::HooksError { state, error } => {
                format!("hooks failed on {}: {}", state, error)
            }
            JournalRecord::EmergencyShutdown { state, reason } => {
                format!("EMERGENCY SHUTDOWN in {}: {}", state, reason)
            }
            JournalRecord::Recovery { state, note } => {
                format!("recovered in {}: {}", state, note)
            }
        };
        println!(
            "{}  {:<18} {}",
            entry.timestamp.to_rfc3339(),
            entry.record.kind(),
            summary
        );
    }
}

fn run_resumable(app: &App, json_output: bool) {
    let jobs = app
        .recovery()
        .get_resumable_jobs()
        .unwrap_or_else(|e| fail(EXIT_ERROR, &e.to_string()));

    if json_output {
        print_json(&json!(jobs));
    } else if jobs.is_empty() {
        println!("No resumable jobs.");
    } else {
        for job_id in jobs {
            println!("{}", job_id);
        }
    }
}

fn run_recover(app: &App, job_id: Option<&str>) {
    let manager = app.recovery();

    let Some(job_id) = job_id else {
        let registry = CrashRecoveryRegistry::new();
        let recovered = manager
            .recover_all_jobs(&registry)
            .unwrap_or_else(|e| fail(EXIT_ERROR, &e.to_string()));
        if recovered.is_empty() {
            println!("Nothing to recover.");
        }
        for shared in recovered {
            let sm = shared.lock().unwrap_or_else(PoisonError::into_inner);
            println!("{}", describe(&sm));
        }
        return;
    };

    match manager.recover_job(job_id) {
        Ok(Some(sm)) => println!("{}", describe(&sm)),
        Ok(None) => fail(EXIT_USAGE, &format!("job {} cannot be recovered", job_id)),
        Err(e) => fail(EXIT_ERROR, &e.to_string()),
    }
}

fn describe(sm: &StateMachine) -> String {
    let mut line = format!(
        "{}: {} after {} transitions",
        sm.job_id(),
        sm.current_state(),
        sm.transitions().len()
    );
    if sm.had_emergency_shutdown() {
        line.push_str(", emergency shutdown recorded");
    }
    if !sm.is_resumable() {
        line.push_str(", terminal");
    }
    line
}

fn run_transition(app: &App, job_id: &str, state: &str, reason: &str) {
    let target = parse_state(state);
    let machine = create_state_machine(job_id, &app.workspace, Arc::clone(&app.guards))
        .unwrap_or_else(|e| fail(EXIT_ERROR, &e.to_string()))
        .with_hooks(Arc::new(CommandHookExecutor::new()), app.config.hooks.clone());

    // Covers only this transition; a job left ARMED or PLOTTING afterwards is found by `resumable`
    let registry = CrashRecoveryRegistry::new();
    if let Err(e) = registry.start() {
        fail(EXIT_ERROR, &e.to_string());
    }
    let shared = Arc::new(Mutex::new(machine));
    registry.register(Arc::clone(&shared));

    let (from, moved, checks) = {
        let mut sm = shared.lock().unwrap_or_else(PoisonError::into_inner);
        let from = sm.current_state();
        let moved = sm.transition_to(target, reason, Map::new());
        (from, moved, sm.last_guard_checks().to_vec())
    };

    registry.unregister(job_id);
    registry.stop();

    if moved {
        println!("{}: {} -> {}", job_id, from, target);
        if target.is_risky() {
            print_checks(&checks);
        }
        return;
    }

    if !from.can_transition_to(target) {
        fail(
            EXIT_USAGE,
            &format!("{} -> {} is not an allowed transition", from, target),
        );
    }
    if checks.iter().any(|c| c.result.is_blocking()) {
        eprintln!("Transition {} -> {} denied by guards:", from, target);
        print_checks(&checks);
        process::exit(EXIT_DENIED);
    }
    fail(EXIT_ERROR, "transition could not be recorded");
}

fn run_guards(app: &App, job_id: &str, state: &str, json_output: bool) {
    let target = parse_state(state);
    if let Err(e) = Workspace::validate_job_id(job_id) {
        fail(EXIT_USAGE, &e.to_string());
    }

    let (allowed, checks) = app.guards.can_transition(job_id, target);
    if json_output {
        print_json(&json!({
            "job_id": job_id,
            "target": target,
            "allowed": allowed,
            "checks": checks,
        }));
    } else {
        println!(
            "{} for {}: {}",
            target,
            job_id,
            if allowed { "allowed" } else { "denied" }
        );
        print_checks(&checks);
    }

    if !allowed {
        process::exit(EXIT_DENIED);
    }
}

fn run_cleanup(app: &App, job_id: &str, keep: Option<usize>) {
    let keep = keep.unwrap_or(app.config.journal.keep_entries);
    match app.recovery().cleanup_journal(job_id, keep) {
        Ok(true) => println!("Journal for {} trimmed to {} records", job_id, keep.max(1)),
        Ok(false) => println!("Journal for {} unchanged", job_id),
        Err(e) => fail(EXIT_ERROR, &e.to_string()),
    }
}
