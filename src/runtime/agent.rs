// src/runtime/agent.rs
//! Synthetic beta user
//!
//! An agent walks its platform flow step by step through its own
//! [`ActionExecutor`], pausing between steps the way its persona would.
//!
//! ```text
//! PENDING ──run_flow──► RUNNING ──all required steps ok──► COMPLETED
//!                          │
//!                          └──required step exhausted──► FAILED
//! ```

use crate::model::{AgentMetrics, AgentResult, AgentStatus, Persona};
use crate::runtime::executor::ActionExecutor;
use crate::runtime::flow::{Flow, Oracles, StepContext};
use crate::runtime::log::{AgentLog, TracingLog};
use crate::runtime::pacing::PacingPolicy;
use crate::runtime::random::{RandomSource, SeededRandom};
use crate::target::{TargetError, TargetService};
use crate::utils::config::RunConfig;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Builder for [`Agent`]
pub struct AgentBuilder {
    name: String,
    persona: Persona,
    config: Arc<RunConfig>,
    flow: Arc<Flow>,
    target: Arc<dyn TargetService>,
    oracles: Oracles,
    rng: Option<Box<dyn RandomSource>>,
    log: Option<Arc<dyn AgentLog>>,
}

impl AgentBuilder {
    pub fn oracles(mut self, oracles: Oracles) -> Self {
        self.oracles = oracles;
        self
    }

    pub fn random(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = Some(rng);
        self
    }

    pub fn log(mut self, log: Arc<dyn AgentLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Agent {
        let log = self.log.unwrap_or_else(|| {
            Arc::new(TracingLog::new(self.name.clone(), self.config.detailed_logging))
        });
        let rng = self
            .rng
            .unwrap_or_else(|| Box::new(SeededRandom::from_entropy()));
        let persona = Arc::new(self.persona);

        let executor = ActionExecutor::new(&self.config, self.flow.len(), log.clone());
        let ctx = Arc::new(StepContext::new(
            self.name.clone(),
            persona.clone(),
            self.config.clone(),
            self.flow.clone(),
            self.target,
            self.oracles,
            rng,
            log.clone(),
        ));

        Agent {
            name: self.name,
            persona,
            pacing: self.config.pacing,
            config: self.config,
            flow: self.flow,
            ctx,
            executor,
            log,
            status: AgentStatus::Pending,
        }
    }
}

/// One synthetic user executing one flow
pub struct Agent {
    name: String,
    persona: Arc<Persona>,
    config: Arc<RunConfig>,
    flow: Arc<Flow>,
    pacing: PacingPolicy,
    ctx: Arc<StepContext>,
    executor: ActionExecutor,
    log: Arc<dyn AgentLog>,
    status: AgentStatus,
}

impl Agent {
    pub fn builder(
        name: impl Into<String>,
        persona: Persona,
        config: Arc<RunConfig>,
        flow: Arc<Flow>,
        target: Arc<dyn TargetService>,
    ) -> AgentBuilder {
        AgentBuilder {
            name: name.into(),
            persona,
            config,
            flow,
            target,
            oracles: Oracles::default(),
            rng: None,
            log: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn status(&self) -> AgentStatus {
        self.status
    }

    pub fn steps_total(&self) -> usize {
        self.flow.len()
    }

    pub fn metrics(&self) -> &AgentMetrics {
        self.executor.metrics()
    }

    /// Run the whole flow and report the outcome
    ///
    /// Never fails: a required step that exhausts its retries ends the flow
    /// with status FAILED. Optional failures are logged and listed in
    /// `degraded_steps`.
    pub async fn run_flow(mut self) -> AgentResult {
        let started = Instant::now();
        let flow = self.flow.clone();
        let persona_type = self.persona.persona_type;

        self.status = AgentStatus::Running;
        self.executor.metrics_mut().start_time = Utc::now();
        self.log.info(&format!(
            "Starting {} flow as {} ({})",
            flow.name, self.persona.name, persona_type
        ));

        let mut failure: Option<(usize, String, TargetError)> = None;
        let mut executed = 0usize;

        for (index, step) in flow.steps().iter().enumerate() {
            let admitted = self
                .ctx
                .with_rng(|rng| step.condition.admits(persona_type, rng));
            if !admitted {
                self.log.debug(&format!("Skipping step {}", step.name));
                continue;
            }

            if executed > 0 {
                self.pace().await;
            }
            executed += 1;

            let ctx = &self.ctx;
            let outcome = self
                .executor
                .execute(&step.name, step.retryable, || step.run(ctx.clone()))
                .await;

            for decision in self.ctx.take_decisions() {
                self.executor.metrics_mut().record_decision(decision);
            }

            if let Err(err) = outcome {
                if step.required {
                    failure = Some((index + 1, step.name.clone(), err));
                    break;
                }
                self.log.warn(&format!(
                    "Optional step {} failed, continuing: {}",
                    step.name, err
                ));
                self.executor.metrics_mut().degraded_steps.push(step.name.clone());
            }
        }

        let mut metrics = self.executor.into_metrics();
        metrics.finalize(started.elapsed());

        let (status, summary) = match failure {
            None => (
                AgentStatus::Completed,
                format!(
                    "Successfully completed {} flow with {}/{} steps",
                    self.config.platform, metrics.steps_completed, metrics.steps_total
                ),
            ),
            Some((position, step, err)) => (
                AgentStatus::Failed,
                format!("Flow failed at step {} ({}): {}", position, step, err),
            ),
        };

        self.log.info(&format!(
            "Flow finished: {} in {}ms, {:.1}% actions ok, {} error(s)",
            status,
            metrics.duration.unwrap_or_default(),
            metrics.success_rate,
            metrics.errors.len()
        ));

        AgentResult {
            agent_name: self.name,
            persona: Persona::clone(&self.persona),
            status,
            metrics,
            summary,
        }
    }

    async fn pace(&self) {
        let delay = self
            .ctx
            .with_rng(|rng| self.pacing.delay_for(self.persona.persona_type, rng));
        if !delay.is_zero() {
            self.log.debug(&format!("Pausing {}ms", delay.as_millis()));
            tokio::time::sleep(delay).await;
        }
    }
}

/// Result for an agent whose task never produced one
pub fn aborted_result(name: String, persona: Persona, steps_total: usize, reason: &str) -> AgentResult {
    let mut metrics = AgentMetrics::new(steps_total);
    metrics.finalize(Duration::ZERO);
    AgentResult {
        agent_name: name,
        persona,
        status: AgentStatus::Failed,
        metrics,
        summary: format!("Agent aborted: {}", reason),
    }
}
