//! Scripted rounds for driving a session in tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail};
use hardware_race::prelude::*;

/// What a scripted round does once started.
#[derive(Clone, Copy, Debug)]
#[allow(dead_code)]
pub enum Script {
    /// Declare this free text during `start`.
    Text(&'static str),
    /// Declare this outcome from another thread after a short delay.
    Later(RoundOutcome),
    /// Refuse to start.
    FailStart,
    /// Drop the finish handle without declaring.
    Drop,
    /// Never declare anything; the handle is kept alive.
    Hang,
}

struct ScriptedRound {
    script: Script,
    hung: Arc<Mutex<Vec<RoundFinish>>>,
}

impl Round for ScriptedRound {
    fn start(&mut self, finish: RoundFinish) -> anyhow::Result<()> {
        match self.script {
            Script::Text(text) => finish.declare_text(text),
            Script::Later(outcome) => {
                std::thread::spawn(move || {
                    std::thread::sleep(Duration::from_millis(5));
                    finish.declare(outcome);
                });
            }
            Script::FailStart => bail!("controllers not found"),
            Script::Drop => drop(finish),
            Script::Hang => self
                .hung
                .lock()
                .map_err(|_| anyhow!("poisoned"))?
                .push(finish),
        }
        Ok(())
    }
}

/// Catalog of scripted rounds that records what was dealt.
#[derive(Default)]
pub struct ScriptedCatalog {
    scripts: HashMap<String, Script>,
    pub played: Arc<Mutex<Vec<String>>>,
    hung: Arc<Mutex<Vec<RoundFinish>>>,
}

#[allow(dead_code)]
impl ScriptedCatalog {
    pub fn new(rounds: &[(&str, Script)]) -> Self {
        Self {
            scripts: rounds
                .iter()
                .map(|(id, script)| (id.to_string(), *script))
                .collect(),
            ..Default::default()
        }
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }
}

impl RoundCatalog for ScriptedCatalog {
    fn round_ids(&self) -> Vec<String> {
        self.scripts.keys().cloned().collect()
    }

    fn create_round(&self, id: &str) -> anyhow::Result<Box<dyn Round>> {
        let script = *self
            .scripts
            .get(id)
            .ok_or_else(|| anyhow!("no round named '{id}'"))?;
        self.played.lock().unwrap().push(id.to_owned());
        Ok(Box::new(ScriptedRound {
            script,
            hung: self.hung.clone(),
        }))
    }
}
