use anyhow::Context;
use bridge::server::FeedBridge;
use bridge::session::message_frame;
use clap::Parser;
use generator::survey::Survey;
use potholecore::channel::PushEnvelope;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::ScenarioConfig;
use workflow::runner::Runner;

mod bridge;
mod generator;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Local pothole endpoint and push-channel feed")]
struct Args {
    /// Print the frames of a few survey ticks and exit
    #[arg(long, default_value_t = false)]
    once: bool,
    /// Number of ticks printed by --once
    #[arg(long, default_value_t = 5)]
    ticks: usize,
    /// Load a scenario config from YAML
    #[arg(long)]
    scenario: Option<PathBuf>,
    #[arg(long, default_value_t = 3000)]
    http_port: u16,
    #[arg(long, default_value_t = 3030)]
    ws_port: u16,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Milliseconds between survey ticks
    #[arg(long, default_value_t = 1000)]
    tick_ms: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let scenario = if let Some(path) = args.scenario {
        ScenarioConfig::load(path)?
    } else {
        ScenarioConfig::from_args(args.http_port, args.ws_port, args.seed, args.tick_ms)
    };

    let mut survey = Survey::new(&scenario);
    let initial = survey.initial_potholes();
    let runner = Runner::new(scenario.clone());

    if args.once {
        println!(
            "Survey seed {} -> {} initial potholes",
            scenario.seed,
            initial.len()
        );
        println!(
            "Detector {} starts at {:?}",
            survey.detector().id,
            survey.detector().current_position
        );
        for tick in 0..args.ticks {
            let step = survey.step();
            let detector = PushEnvelope::detector(&step.detector)?.to_json()?;
            println!("tick {tick}: {}", message_frame(&detector)?);
            if let Some(record) = step.pothole {
                let pothole = PushEnvelope::pothole(&record)?.to_json()?;
                println!("tick {tick}: {}", message_frame(&pothole)?);
            }
        }
        return Ok(());
    }

    let bridge = FeedBridge::new(initial);
    bridge.serve(&scenario)?;
    bridge.publish_text(&format!("survey {} started", scenario.seed))?;

    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for the survey loop")?;
    let totals = runtime.block_on(async {
        let shutdown = async {
            if let Err(err) = signal::ctrl_c().await {
                log::warn!("[feed] ctrl-c handler failed: {err}");
            }
        };
        runner.run(&mut survey, &bridge, shutdown).await
    })?;

    println!(
        "Feed stopped after {} detector updates, {} new potholes ({} total, {} listeners)",
        totals.detector_updates,
        totals.potholes,
        bridge.snapshot().points.len(),
        bridge.listeners()
    );
    Ok(())
}
