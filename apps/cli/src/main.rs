#![deny(warnings)]

//! Headless CLI: play a scripted or idle game and print the final result.

use anyhow::{Context, Result};
use sim_core::{GameConfig, GameResult, Instrument, InstrumentId, SectorId};
use sim_runtime::{GameHarness, HarnessCommand, Scenario, SessionView};
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    scenario: Option<String>,
    script: Option<String>,
    turns: Option<u32>,
    json: bool,
}

fn parse_args() -> CliArgs {
    let mut args = CliArgs::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--scenario" => args.scenario = it.next(),
            "--script" => args.script = it.next(),
            "--turns" => args.turns = it.next().and_then(|s| s.parse().ok()),
            "--json" => args.json = true,
            other => warn!(arg = other, "ignoring unknown argument"),
        }
    }
    args
}

/// Two instruments per sector, priced in whole currency units.
const LISTING: [(&str, &str, &str, u32); 12] = [
    ("SEM-01", "Nova Semiconductor", "SEM", 82_000),
    ("SEM-02", "Quartz Foundry", "SEM", 41_500),
    ("TECH-01", "Cloudline Systems", "TECH", 135_000),
    ("TECH-02", "Pixelworks", "TECH", 27_800),
    ("BIO-01", "Helix Biologics", "BIO", 56_000),
    ("BIO-02", "Medora Pharma", "BIO", 18_400),
    ("ENERGY-01", "Northstar Oil", "ENERGY", 64_300),
    ("ENERGY-02", "Sunridge Power", "ENERGY", 22_900),
    ("FIN-01", "Harbor Bank", "FIN", 48_700),
    ("FIN-02", "Keystone Insurance", "FIN", 31_200),
    ("CONSUMER-01", "Maple Retail", "CONSUMER", 15_600),
    ("CONSUMER-02", "Brightfoods", "CONSUMER", 39_900),
];

fn default_scenario() -> Scenario {
    Scenario {
        config: GameConfig::default(),
        instruments: LISTING
            .iter()
            .map(|(id, name, sector, price)| Instrument {
                id: InstrumentId::new(*id),
                name: name.to_string(),
                sector: SectorId::new(*sector),
                price: (*price).into(),
            })
            .collect(),
        events: None,
    }
}

fn print_view(view: &SessionView) {
    match view {
        SessionView::NotStarted => println!("-- not started"),
        SessionView::Turn(s) => println!(
            "-- turn {} | cash: {} | stock: {} | total: {} | holdings: {} | trades: {} | events: {}",
            s.turn,
            s.cash.round_dp(0),
            s.stock_value.round_dp(0),
            s.total_assets.round_dp(0),
            s.holdings.len(),
            s.transactions.len(),
            s.events.len()
        ),
        SessionView::Completed(r) => println!("-- finished | final: {}", r.final_asset.round_dp(0)),
    }
}

fn print_result(r: &GameResult) {
    println!(
        "RESULT | final: {} | profit: {} ({:.2}%) | grade: {:?} | lifestyle: {:?}",
        r.final_asset.round_dp(0),
        r.total_profit.round_dp(0),
        r.profit_rate,
        r.investment_grade,
        r.lifestyle_grade
    );
    println!(
        "STATS | turns: {} | trades: {} | win rate: {:.1}% | max sectors: {} | bonus: {:+}% | style: {:?}",
        r.turns_completed,
        r.total_trades,
        r.win_rate,
        r.max_sectors_diversified,
        r.diversification_bonus_pct,
        r.investor_style
    );
    if let Some(b) = &r.best_investment {
        println!("BEST  | {} ({}) {:+.2}%", b.name, b.instrument, b.profit_pct);
    }
    if let Some(w) = &r.worst_investment {
        println!("WORST | {} ({}) {:+.2}%", w.name, w.instrument, w.profit_pct);
    }
    if !r.achievements.is_empty() {
        println!("BADGES | {:?}", r.achievements);
    }
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .init();

    let args = parse_args();
    info!(
        sha = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        started = %chrono::Utc::now().to_rfc3339(),
        ?args,
        "starting CLI"
    );

    let mut scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => default_scenario(),
    };
    if let Some(turns) = args.turns {
        scenario.config.max_turns = turns;
    }
    let mut harness = GameHarness::new(scenario.build_session()?);

    if let Some(path) = &args.script {
        let text =
            std::fs::read_to_string(path).with_context(|| format!("read script {path}"))?;
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cmd: HarnessCommand = line
                .parse()
                .with_context(|| format!("{path}:{}", n + 1))?;
            match harness.execute(&cmd) {
                Ok(view) if cmd == HarnessCommand::Snapshot => print_view(&view),
                Ok(_) => {}
                Err(e) => warn!(line = n + 1, command = line, error = %e, "command failed"),
            }
        }
    }

    let result = harness.run_to_end()?.clone();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    Ok(())
}
