//! Debate session orchestration.
//!
//! [`DebateSession`] owns the in-progress transcript and drives the round
//! state machine: warm-up, baseline, any number of exchange rounds, finalize,
//! then the critic. Every generation goes through the repair protocol, and
//! both sides of a round run sequentially; a failure on one side is recorded
//! on that side's turn while the other side proceeds.

use anyhow::{Result, bail};
use tracing::{error, info, instrument, warn};

use crate::core::parse::{parse_final_output, parse_turn_output};
use crate::core::persona::build_instructions;
use crate::core::side::Side;
use crate::core::transcript::{
    Capsule, CriticReport, FinalOutput, FinalRecord, Finals, GenMetrics, HallucinationAudit,
    RoundRecord, SideRecord, Transcript, TurnOutput,
};
use crate::critic::run_critic_audits;
use crate::io::config::{ArenaConfig, CallBudget};
use crate::io::gateway::{GenRequest, Gateway};
use crate::io::prompt::PromptEngine;
use crate::repair::{RepairCall, RequiredTags, generate_with_repair};

/// Where the session currently stands. Warm-up is optional: baseline may run
/// directly from `Unstarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    WarmedUp,
    BaselineDone,
    ExchangeDone,
    Finalized,
}

/// Per-model warm-up status strings, reported but never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmupReport {
    pub pro: String,
    pub con: String,
    pub critic: String,
}

pub struct DebateSession {
    config: ArenaConfig,
    engine: PromptEngine,
    transcript: Transcript,
    state: SessionState,
    warmup: Option<WarmupReport>,
}

impl DebateSession {
    pub fn new(config: ArenaConfig) -> Self {
        let transcript = Transcript::new(&config.topic, config.debate_config());
        Self {
            config,
            engine: PromptEngine::new(),
            transcript,
            state: SessionState::Unstarted,
            warmup: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn into_transcript(self) -> Transcript {
        self.transcript
    }

    /// Issue one minimal-token generation per model so later rounds do not
    /// pay the load cost. Idempotent: a warmed session skips silently and
    /// returns the original report. Failures are reported per model; whether
    /// to abort on them is the caller's decision.
    #[instrument(skip_all)]
    pub fn warm_up<G: Gateway>(&mut self, gateway: &G) -> &WarmupReport {
        if self.warmup.is_none() {
            info!(
                pro = %self.config.pro.model,
                con = %self.config.con.model,
                critic = %self.config.critic.model,
                "warming up models"
            );
            let report = WarmupReport {
                pro: self.warm_one(gateway, &self.config.pro.model),
                con: self.warm_one(gateway, &self.config.con.model),
                critic: self.warm_one(gateway, &self.config.critic.model),
            };
            self.warmup = Some(report);
            if self.state == SessionState::Unstarted {
                self.state = SessionState::WarmedUp;
            }
        }
        self.warmup.as_ref().expect("warm-up report just set")
    }

    fn warm_one<G: Gateway>(&self, gateway: &G, model: &str) -> String {
        let result = gateway.generate(&GenRequest {
            model: model.to_string(),
            prompt: "ok".to_string(),
            temperature: 0.1,
            num_predict: self.config.budgets.warmup.num_predict,
            timeout: self.config.budgets.warmup.timeout(),
        });
        match result {
            Ok(generation) => format!("OK ({model} loaded in {}s)", generation.metrics.time_load_s),
            Err(err) => {
                warn!(model, err = %err, "warm-up failed");
                format!("FAIL: {err:#}")
            }
        }
    }

    /// Round 0: both sides state their opening position from the topic alone.
    #[instrument(skip_all)]
    pub fn generate_baseline<G: Gateway>(&mut self, gateway: &G) -> Result<&RoundRecord> {
        match self.state {
            SessionState::Unstarted | SessionState::WarmedUp => {}
            _ => bail!("baseline already generated"),
        }
        info!(topic = %self.config.topic, "generating baselines");

        let pro = self.baseline_side(gateway, Side::Pro)?;
        let con = self.baseline_side(gateway, Side::Con)?;

        self.transcript.history.push(RoundRecord { round: 0, pro, con });
        self.state = SessionState::BaselineDone;
        Ok(self.transcript.history.last().expect("round just appended"))
    }

    fn baseline_side<G: Gateway>(&self, gateway: &G, side: Side) -> Result<SideRecord> {
        let capsule = Capsule::opening(&self.config.topic, side);
        let instructions = self.instructions_for(side, self.config.adversarial);
        let prompt = self
            .engine
            .render_baseline(&self.config.topic, side, &instructions)?;
        let (output, metrics) =
            self.run_turn(gateway, side, &prompt, self.config.budgets.baseline);
        Ok(SideRecord { capsule, output, metrics })
    }

    /// Round N≥1: each side reacts to its own last reflection and the
    /// opponent's last reasoning.
    #[instrument(skip_all)]
    pub fn exchange_step<G: Gateway>(&mut self, gateway: &G) -> Result<&RoundRecord> {
        match self.state {
            SessionState::BaselineDone | SessionState::ExchangeDone => {}
            SessionState::Unstarted | SessionState::WarmedUp => {
                bail!("exchange requires a baseline round")
            }
            SessionState::Finalized => bail!("debate already finalized"),
        }
        let round = self.transcript.history.len() as u32;
        info!(round, "generating exchange step");

        let last = self.transcript.last_round().expect("baseline exists");
        let pro_capsule = Capsule::next(
            &self.config.topic,
            Side::Pro,
            &last.pro.output.reflection,
            &last.con.output.reasoning,
        );
        let con_capsule = Capsule::next(
            &self.config.topic,
            Side::Con,
            &last.con.output.reflection,
            &last.pro.output.reasoning,
        );

        let pro = self.exchange_side(gateway, Side::Pro, pro_capsule)?;
        let con = self.exchange_side(gateway, Side::Con, con_capsule)?;

        self.transcript.history.push(RoundRecord { round, pro, con });
        self.state = SessionState::ExchangeDone;
        Ok(self.transcript.history.last().expect("round just appended"))
    }

    fn exchange_side<G: Gateway>(
        &self,
        gateway: &G,
        side: Side,
        capsule: Capsule,
    ) -> Result<SideRecord> {
        let instructions = self.instructions_for(side, self.config.adversarial);
        let prompt = self.engine.render_exchange(&capsule, &instructions)?;
        let (output, metrics) =
            self.run_turn(gateway, side, &prompt, self.config.budgets.exchange);
        Ok(SideRecord { capsule, output, metrics })
    }

    /// Closing statements. The adversarial stance is forced for both sides
    /// here regardless of the session flag, and each side sees an ordered
    /// summary of every prior round's reasoning.
    #[instrument(skip_all)]
    pub fn finalize<G: Gateway>(&mut self, gateway: &G) -> Result<&Finals> {
        match self.state {
            SessionState::BaselineDone | SessionState::ExchangeDone => {}
            SessionState::Unstarted | SessionState::WarmedUp => {
                bail!("finalize requires a baseline round")
            }
            SessionState::Finalized => bail!("debate already finalized"),
        }
        info!("generating final statements");

        let summary = self.reasoning_summary();
        let pro = self.finalize_side(gateway, Side::Pro, &summary)?;
        let con = self.finalize_side(gateway, Side::Con, &summary)?;

        self.transcript.finals = Some(Finals { pro, con });
        self.state = SessionState::Finalized;
        Ok(self.transcript.finals.as_ref().expect("finals just set"))
    }

    fn finalize_side<G: Gateway>(
        &self,
        gateway: &G,
        side: Side,
        summary: &[String],
    ) -> Result<FinalRecord> {
        let instructions = self.instructions_for(side, true);
        let prompt =
            self.engine
                .render_finalize(&self.config.topic, side, summary, &instructions)?;

        let debater = self.transcript.debate_config.debater(side);
        let result = generate_with_repair(
            gateway,
            &self.engine,
            &prompt,
            &RepairCall {
                model: &debater.model,
                temperature: debater.temperature,
                side,
                topic: &self.config.topic,
                required: RequiredTags::Final,
                budget: self.config.budgets.finalize,
                repair_budget: self.config.budgets.repair,
            },
        );

        let (output, metrics) = match result {
            Ok(generation) => {
                let mut output = parse_final_output(&generation.raw, side);
                output.error = generation.advisory;
                (output, generation.metrics)
            }
            Err(err) => (failed_final_output(side, &err), GenMetrics::default()),
        };
        Ok(FinalRecord { output, metrics })
    }

    /// Tally drift, run the critic suite, and merge its report into the
    /// transcript. Pipeline failures are converted into an error-shaped
    /// report; this never leaves the session without a displayable result.
    #[instrument(skip_all)]
    pub fn run_critic<G: Gateway>(&mut self, gateway: &G) -> Result<&CriticReport> {
        if self.state != SessionState::Finalized {
            bail!("critic requires a finalized debate");
        }
        let drift = self.transcript.drift_counts();
        info!(
            pro_mismatches = drift.total_pro_mismatches,
            con_mismatches = drift.total_con_mismatches,
            "running critic audits"
        );

        let report = run_critic_audits(
            gateway,
            &self.engine,
            &self.config.critic,
            &self.config.budgets,
            &self.transcript,
            drift,
        )
        .unwrap_or_else(|err| {
            error!(err = %err, "critic run failed");
            CriticReport {
                verdict: format!("critic audit failed: {err:#}"),
                verdict_metrics: GenMetrics::default(),
                drift_audit: drift,
                hallucination_audit: HallucinationAudit::Failure {
                    error: "critic execution failed".to_string(),
                    raw: String::new(),
                },
            }
        });

        self.transcript.critic_report = Some(report);
        Ok(self
            .transcript
            .critic_report
            .as_ref()
            .expect("critic report just set"))
    }

    fn instructions_for(&self, side: Side, adversarial: bool) -> String {
        let debater = self.transcript.debate_config.debater(side);
        build_instructions(&debater.persona, &debater.style, adversarial, side)
    }

    /// One generation through the repair protocol, parsed into a turn.
    /// Transport failure yields an empty-parse turn carrying the error.
    fn run_turn<G: Gateway>(
        &self,
        gateway: &G,
        side: Side,
        prompt: &str,
        budget: CallBudget,
    ) -> (TurnOutput, GenMetrics) {
        let debater = self.transcript.debate_config.debater(side);
        let result = generate_with_repair(
            gateway,
            &self.engine,
            prompt,
            &RepairCall {
                model: &debater.model,
                temperature: debater.temperature,
                side,
                topic: &self.config.topic,
                required: RequiredTags::Turn,
                budget,
                repair_budget: self.config.budgets.repair,
            },
        );

        match result {
            Ok(generation) => {
                let mut output = parse_turn_output(&generation.raw, side);
                output.error = generation.advisory;
                (output, generation.metrics)
            }
            Err(err) => {
                warn!(side = %side, err = %err, "side generation failed");
                let mut output = parse_turn_output("", side);
                output.error = Some(format!("{err:#}"));
                (output, GenMetrics::default())
            }
        }
    }

    /// Ordered reasoning summary over baseline and every exchange round.
    fn reasoning_summary(&self) -> Vec<String> {
        let mut summary = Vec::with_capacity(self.transcript.history.len() * 2);
        for record in &self.transcript.history {
            let label = if record.round == 0 {
                "Baseline".to_string()
            } else {
                format!("Round {}", record.round)
            };
            summary.push(format!("PRO ({label}): {}", record.pro.output.reasoning));
            summary.push(format!("CON ({label}): {}", record.con.output.reasoning));
        }
        summary
    }
}

fn failed_final_output(side: Side, err: &anyhow::Error) -> FinalOutput {
    let mut output = parse_final_output("", side);
    output.error = Some(format!("{err:#}"));
    output
}
