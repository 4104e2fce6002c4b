//! Race hub driven from an operator console.
//!
//! Commands read from stdin:
//! - `ready a|b`: the team is ready (calibration)
//! - `axes a|b <x> <y>`: set the team's stick
//! - `unbind a|b`: the team's controller is gone, its car gets neutral
//! - `quit`: stop the hub
//!
//! Any other line while a round is running is the round's result, e.g. `Blue Wins!` or `Tie`.
//! A line starting with a command word is never taken as a result.
//! Rounds are listed in `RACE_ROUNDS` (comma separated).

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, bail, Context};
use tracing::{info, warn};

use hardware_race::logger::init_stderr_logger;
use hardware_race::prelude::*;

const DEFAULT_ROUNDS: &str = "pong,tron,masher,plinko,tanks,fencing";

type PendingFinish = Arc<Mutex<Option<RoundFinish>>>;

/// A round refereed by the operator: it ends when a result line is typed.
struct ConsoleRound {
    id: String,
    pending: PendingFinish,
}

impl Round for ConsoleRound {
    fn start(&mut self, finish: RoundFinish) -> anyhow::Result<()> {
        let mut slot = self
            .pending
            .lock()
            .map_err(|_| anyhow!("console state poisoned"))?;
        *slot = Some(finish);
        println!("'{}' is running, type the result when it ends", self.id);
        Ok(())
    }
}

struct ConsoleCatalog {
    ids: Vec<String>,
    pending: PendingFinish,
}

impl RoundCatalog for ConsoleCatalog {
    fn round_ids(&self) -> Vec<String> {
        self.ids.clone()
    }

    fn create_round(&self, id: &str) -> anyhow::Result<Box<dyn Round>> {
        if !self.ids.iter().any(|known| known == id) {
            bail!("unknown round '{id}'");
        }
        Ok(Box::new(ConsoleRound {
            id: id.to_owned(),
            pending: self.pending.clone(),
        }))
    }
}

struct Console {
    sticks: [Arc<AxisCell>; 2],
    ready: Arc<ReadyFlags>,
    pending: PendingFinish,
    running: Arc<AtomicBool>,
}

impl Console {
    fn handle_line(&self, line: &str) -> anyhow::Result<()> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            [] => {}
            ["quit"] => self.running.store(false, Ordering::Relaxed),
            ["ready", team] => self.ready.signal(team.parse()?),
            ["unbind", team] => self.sticks[team.parse::<Team>()?.index()].unbind(),
            ["axes", team, x, y] => {
                let team: Team = team.parse()?;
                let x = x.parse::<f32>().context("x is not a number")?;
                let y = y.parse::<f32>().context("y is not a number")?;
                self.sticks[team.index()].set(Axes::new(x, y));
            }
            [command @ ("ready" | "unbind" | "axes" | "quit"), ..] => {
                bail!("malformed '{command}' command, see the console usage")
            }
            _ => {
                let finish = self
                    .pending
                    .lock()
                    .map_err(|_| anyhow!("console state poisoned"))?
                    .take();
                match finish {
                    Some(finish) => finish.declare_text(line),
                    None => bail!("no round is running"),
                }
            }
        }
        Ok(())
    }

    fn run(self) {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!("stdin closed: {e}");
                    break;
                }
            };
            if let Err(e) = self.handle_line(line.trim()) {
                println!("\x1b[31m{e:#}\x1b[39m");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = Configuration::from_env()?;
    if !config.log_enabled() {
        init_stderr_logger()?;
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .context("could not set Ctrl-C handler")?;

    let ids: Vec<String> = std::env::var("RACE_ROUNDS")
        .unwrap_or_else(|_| DEFAULT_ROUNDS.to_owned())
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect();
    let pending = PendingFinish::default();
    let ready = Arc::new(ReadyFlags::new());
    let sticks = [Arc::new(AxisCell::unbound()), Arc::new(AxisCell::unbound())];

    let catalog = ConsoleCatalog {
        ids,
        pending: pending.clone(),
    };
    let mut session = Session::new(config, catalog, ready.clone())?;

    let telemetry = TelemetryPublisher::new(
        &config,
        [Box::new(sticks[0].clone()), Box::new(sticks[1].clone())],
    )?
    .spawn(running.clone())?;

    let console = Console {
        sticks,
        ready,
        pending,
        running: running.clone(),
    };
    thread::Builder::new()
        .name("console".to_owned())
        .spawn(move || console.run())
        .context("could not spawn console thread")?;

    session.run(&running);

    running.store(false, Ordering::Relaxed);
    telemetry
        .join()
        .map_err(|_| anyhow!("telemetry thread panicked"))?;
    Ok(())
}
