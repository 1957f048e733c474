mod logic;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use frontier_game::Catalog;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use logic::{
    LogicTester, OfflineReplay, ScenarioResult, get_scenario, list_scenarios, replay_offline,
    resolve_seed_inputs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "frontier-tester", version)]
#[command(about = "Headless host loop and automated QA scenarios for Frontier Idle")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated; accepts hex and `a..b` ranges)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 3)]
    iterations: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Directory holding a save for an offline catch-up replay
    #[arg(long)]
    save: Option<PathBuf>,

    /// Seconds of absence to replay against the save
    #[arg(long, default_value_t = 3600.0, requires = "save")]
    offline_seconds: f64,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    if let Some(dir) = args.save.as_ref() {
        let seed = resolve_seed_inputs(&split_csv(&args.seeds))?
            .first()
            .copied()
            .unwrap_or(1337);
        let replay = replay_offline(dir, seed, args.offline_seconds)
            .with_context(|| format!("offline replay in {} failed", dir.display()))?;
        let mut output_target = OutputTarget::new(args.output.clone())?;
        write_offline_report(&mut output_target, args.report, &replay)?;
        output_target.flush_inner()?;
        return Ok(());
    }

    announce_banner(&args);

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let catalog = Arc::new(Catalog::builtin().context("built-in catalog failed to load")?);
    let results = run_scenarios(&args, &scenarios, &seeds, catalog);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner(args: &Args) {
    if args.report != ReportFormat::Console {
        return;
    }
    println!("{}", "🏕️ Frontier Idle Automated Tester".bright_cyan().bold());
    println!("{}", "=================================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        scenarios.retain(|s| !s.eq_ignore_ascii_case("all"));
        for (key, _) in list_scenarios() {
            if !scenarios.iter().any(|s| s == key) {
                scenarios.push(key.to_string());
            }
        }
    }
    scenarios
}

fn run_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
    catalog: Arc<Catalog>,
) -> Vec<ScenarioResult> {
    let tester = LogicTester::new(catalog, args.verbose);
    let mut results = Vec::new();

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            log::debug!("running {} over {} seeds", scenario.key, seeds.len());
            results.extend(tester.run_scenario(&scenario, seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report {
        ReportFormat::Json => logic::reports::generate_json_report(&mut output_target, results)?,
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Frontier Idle Scenario Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            if results.is_empty() {
                writeln!(&mut output_target, "No scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            writeln!(&mut output_target)?;
            writeln!(
                &mut output_target,
                "🏁 Total time: {:?}",
                start_time.elapsed()
            )?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

fn write_offline_report(
    out: &mut dyn Write,
    format: ReportFormat,
    replay: &OfflineReplay,
) -> Result<()> {
    if format == ReportFormat::Json {
        serde_json::to_writer_pretty(&mut *out, replay)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "{}", "⏱️ Offline Catch-up Replay".bright_cyan().bold())?;
    writeln!(out, "Save: {}", replay.save_path.display())?;
    if replay.created_save {
        writeln!(out, "Created a new save for seed {}", replay.seed)?;
    }
    writeln!(
        out,
        "Simulated {:.0}s of {:.0}s requested (activity: {})",
        replay.simulated_sec, replay.requested_sec, replay.activity
    )?;
    for (id, delta) in &replay.resource_deltas {
        writeln!(out, "  {id:20} {delta:+.2}")?;
    }
    for (skill, delta) in &replay.xp_deltas {
        writeln!(out, "  {skill:20} {delta:+.2} xp")?;
    }
    writeln!(out, "Fingerprint: {:#018x}", replay.fingerprint)?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn base_args() -> Args {
        Args {
            scenarios: "smoke".to_string(),
            list_scenarios: false,
            seeds: "1337".to_string(),
            iterations: 1,
            report: ReportFormat::Json,
            verbose: false,
            output: None,
            save: None,
            offline_seconds: 3600.0,
        }
    }

    fn sample_result(passed: bool) -> ScenarioResult {
        ScenarioResult {
            scenario_name: "Smoke Test".to_string(),
            seed: 1337,
            passed,
            iterations_run: 3,
            successful_iterations: if passed { 3 } else { 2 },
            failures: if passed {
                Vec::new()
            } else {
                vec!["failure".to_string()]
            },
            average_duration: Duration::from_millis(10),
            performance_data: vec![Duration::from_millis(10)],
        }
    }

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("frontier-{}-{name}", std::process::id()))
    }

    #[test]
    fn expands_all_scenarios_keyword() {
        let expanded = expand_scenarios("smoke,all");
        assert_eq!(expanded[0], "smoke");
        assert_eq!(expanded.len(), list_scenarios().len());
        assert!(expanded.contains(&"prestige".to_string()));
    }

    #[test]
    fn expand_scenarios_without_all_preserves_order() {
        let expanded = expand_scenarios("dungeon, smoke");
        assert_eq!(expanded, vec!["dungeon".to_string(), "smoke".to_string()]);
    }

    #[test]
    fn unknown_scenarios_are_skipped() {
        let catalog = Arc::new(Catalog::builtin().unwrap());
        let results = run_scenarios(
            &base_args(),
            &["nonexistent".to_string(), "smoke".to_string()],
            &[5],
            catalog,
        );
        assert_eq!(results.len(), 1);
        assert!(results[0].passed);
    }

    #[test]
    fn maybe_list_scenarios_writes_output() {
        let temp = temp_file("scenarios.txt");
        let args = Args {
            list_scenarios: true,
            output: Some(temp.clone()),
            ..base_args()
        };
        assert!(maybe_list_scenarios(&args).unwrap());
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("Available scenarios"));
        assert!(content.contains("offline-equivalence"));
    }

    #[test]
    fn maybe_list_scenarios_returns_false_when_disabled() {
        assert!(!maybe_list_scenarios(&base_args()).unwrap());
    }

    #[test]
    fn write_reports_emits_json_for_results() {
        let temp = temp_file("report.json");
        let args = Args {
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(true)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("scenario_name"));
    }

    #[test]
    fn write_reports_markdown_empty_results() {
        let temp = temp_file("report.md");
        let args = Args {
            report: ReportFormat::Markdown,
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("No scenarios executed"));
    }

    #[test]
    fn write_reports_console_includes_failures() {
        let temp = temp_file("report.txt");
        let args = Args {
            report: ReportFormat::Console,
            output: Some(temp.clone()),
            ..base_args()
        };
        write_reports(&args, &[sample_result(false)], Instant::now()).unwrap();
        let content = std::fs::read_to_string(temp).unwrap();
        assert!(content.contains("failure"));
        assert!(content.contains("Total time"));
    }

    #[test]
    fn offline_report_renders_json() {
        let replay = OfflineReplay {
            seed: 3,
            save_path: PathBuf::from("save/frontier-idle.save.v1.json"),
            created_save: true,
            requested_sec: 60.0,
            simulated_sec: 60.0,
            activity: "gather".into(),
            resource_deltas: [("wood".to_string(), 60.0)].into(),
            xp_deltas: [("woodcutting".to_string(), 180.0)].into(),
            fingerprint: 42,
        };
        let mut out = Vec::new();
        write_offline_report(&mut out, ReportFormat::Json, &replay).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["resource_deltas"]["wood"], 60.0);

        let mut out = Vec::new();
        write_offline_report(&mut out, ReportFormat::Console, &replay).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Simulated 60s of 60s requested"));
    }

    #[test]
    fn output_target_stdout_writes() {
        let mut target = OutputTarget::new(None).unwrap();
        target.write_all(b"ok").unwrap();
        target.flush().unwrap();
    }
}
