// src/runtime/flow.rs
//! Declarative platform flows
//!
//! A [`Flow`] is an ordered list of [`FlowStep`]s. Each step carries its own
//! retry policy, whether its failure aborts the flow, and a gate deciding
//! whether a given persona runs it at all. Steps talk to the world only
//! through the shared [`StepContext`].

use crate::model::{Decision, Persona, PersonaType};
use crate::oracle::{
    resolve_decision, ContentGenerator, DecisionOracle, OfflineOracle, DEFAULT_FALLBACK_CONTENT,
};
use crate::runtime::log::AgentLog;
use crate::runtime::random::RandomSource;
use crate::target::{TargetError, TargetRequest, TargetResponse, TargetService};
use crate::utils::config::RunConfig;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by a step operation
pub type StepFuture = BoxFuture<'static, Result<Value, TargetError>>;

/// Type-erased step body
pub type StepOperation = Arc<dyn Fn(Arc<StepContext>) -> StepFuture + Send + Sync>;

/// Per-persona-type probabilities of running a gated step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateOdds {
    pub beginner: f64,
    pub intermediate: f64,
    pub expert: f64,
    pub power_user: f64,
}

impl GateOdds {
    pub fn for_type(&self, persona_type: PersonaType) -> f64 {
        match persona_type {
            PersonaType::Beginner => self.beginner,
            PersonaType::Intermediate => self.intermediate,
            PersonaType::Expert => self.expert,
            PersonaType::PowerUser => self.power_user,
        }
    }
}

/// Whether a persona executes a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepCondition {
    Always,
    /// Only these persona types run the step
    PersonaIn(Vec<PersonaType>),
    /// Probabilistic gate; a probability of 1 never consumes randomness
    Chance(GateOdds),
}

impl StepCondition {
    pub fn admits(&self, persona_type: PersonaType, rng: &mut dyn RandomSource) -> bool {
        match self {
            StepCondition::Always => true,
            StepCondition::PersonaIn(types) => types.contains(&persona_type),
            StepCondition::Chance(odds) => {
                let p = odds.for_type(persona_type);
                if p >= 1.0 {
                    true
                } else if p <= 0.0 {
                    false
                } else {
                    rng.chance(p)
                }
            }
        }
    }
}

/// One named step of a flow
#[derive(Clone)]
pub struct FlowStep {
    pub name: String,
    pub retryable: bool,
    pub required: bool,
    pub condition: StepCondition,
    operation: StepOperation,
}

impl FlowStep {
    /// Required, retryable, ungated step
    pub fn new<F, Fut>(name: impl Into<String>, operation: F) -> Self
    where
        F: Fn(Arc<StepContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TargetError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            retryable: true,
            required: true,
            condition: StepCondition::Always,
            operation: Arc::new(move |ctx: Arc<StepContext>| -> StepFuture {
                Box::pin(operation(ctx))
            }),
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Failure of this step degrades the flow instead of aborting it
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn when(mut self, condition: StepCondition) -> Self {
        self.condition = condition;
        self
    }

    /// Start one attempt of the step
    pub fn run(&self, ctx: Arc<StepContext>) -> StepFuture {
        (self.operation)(ctx)
    }
}

impl fmt::Debug for FlowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowStep")
            .field("name", &self.name)
            .field("retryable", &self.retryable)
            .field("required", &self.required)
            .field("condition", &self.condition)
            .finish()
    }
}

/// Ordered steps plus static content used when generation fails
#[derive(Debug, Clone, Default)]
pub struct Flow {
    pub name: String,
    steps: Vec<FlowStep>,
    content_fallbacks: HashMap<String, String>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn step(mut self, step: FlowStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn fallback_content(mut self, content_type: impl Into<String>, text: impl Into<String>) -> Self {
        self.content_fallbacks.insert(content_type.into(), text.into());
        self
    }

    pub fn steps(&self) -> &[FlowStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn fallback_for(&self, content_type: &str) -> &str {
        self.content_fallbacks
            .get(content_type)
            .map(String::as_str)
            .unwrap_or(DEFAULT_FALLBACK_CONTENT)
    }
}

/// Oracle pair handed to every agent
#[derive(Clone)]
pub struct Oracles {
    pub decision: Arc<dyn DecisionOracle>,
    pub content: Arc<dyn ContentGenerator>,
}

impl Oracles {
    /// One backend serving both roles
    pub fn shared<O>(oracle: Arc<O>) -> Self
    where
        O: DecisionOracle + ContentGenerator + 'static,
    {
        Self {
            decision: oracle.clone(),
            content: oracle,
        }
    }

    pub fn offline() -> Self {
        Self::shared(Arc::new(OfflineOracle))
    }
}

impl Default for Oracles {
    fn default() -> Self {
        Self::offline()
    }
}

/// Everything a step may touch while it runs
///
/// Session variables carry data between steps (ids returned by earlier
/// calls). Decisions made during a step are buffered here and drained into
/// the agent's metrics once the step returns.
pub struct StepContext {
    agent_name: String,
    persona: Arc<Persona>,
    config: Arc<RunConfig>,
    flow: Arc<Flow>,
    target: Arc<dyn TargetService>,
    oracles: Oracles,
    log: Arc<dyn AgentLog>,
    rng: Mutex<Box<dyn RandomSource>>,
    session: Mutex<Map<String, Value>>,
    decisions: Mutex<Vec<Decision>>,
}

impl StepContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_name: impl Into<String>,
        persona: Arc<Persona>,
        config: Arc<RunConfig>,
        flow: Arc<Flow>,
        target: Arc<dyn TargetService>,
        oracles: Oracles,
        rng: Box<dyn RandomSource>,
        log: Arc<dyn AgentLog>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            persona,
            config,
            flow,
            target,
            oracles,
            log,
            rng: Mutex::new(rng),
            session: Mutex::new(Map::new()),
            decisions: Mutex::new(Vec::new()),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn log(&self) -> &dyn AgentLog {
        self.log.as_ref()
    }

    pub async fn send(&self, request: TargetRequest) -> Result<TargetResponse, TargetError> {
        self.target.send(request).await
    }

    pub async fn get(&self, path: impl Into<String>) -> Result<TargetResponse, TargetError> {
        self.send(TargetRequest::get(path)).await
    }

    pub async fn post(&self, path: impl Into<String>, body: Value) -> Result<TargetResponse, TargetError> {
        self.send(TargetRequest::post(path, body)).await
    }

    /// Store a session variable for later steps
    pub fn remember(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.session.lock().insert(key.into(), value.into());
    }

    pub fn recall(&self, key: &str) -> Option<Value> {
        self.session.lock().get(key).cloned()
    }

    pub fn recall_str(&self, key: &str) -> Option<String> {
        self.session
            .lock()
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Session string that an earlier step must have stored
    ///
    /// Missing values fail the step like a client error would.
    pub fn require_str(&self, key: &str, message: &str) -> Result<String, TargetError> {
        self.recall_str(key)
            .ok_or_else(|| TargetError::new(message).with_kind("PRECONDITION_FAILED"))
    }

    /// Ask the decision oracle, falling back to a random option
    ///
    /// Never fails. The decision is buffered for the agent's metrics.
    pub async fn make_intelligent_decision(&self, context: &str, options: &[&str]) -> Decision {
        let options: Vec<String> = options.iter().map(|o| o.to_string()).collect();
        let outcome = self
            .oracles
            .decision
            .choose(&self.persona, context, &options)
            .await;

        if let Err(err) = &outcome {
            self.log.warn(&format!("Decision oracle failed, choosing randomly: {}", err));
        }

        let decision = self.with_rng(|rng| resolve_decision(outcome, context, &options, rng));
        self.log.debug(&format!(
            "Decision: {} -> {} ({})",
            context, decision.chosen, decision.reasoning
        ));
        self.decisions.lock().push(decision.clone());
        decision
    }

    /// Generate persona-flavoured content, falling back to the flow's static text
    pub async fn generate_content(&self, content_type: &str) -> String {
        match self.oracles.content.generate(&self.persona, content_type).await {
            Ok(text) => text,
            Err(err) => {
                self.log.warn(&format!(
                    "Content generation failed for {}, using fallback: {}",
                    content_type, err
                ));
                self.flow.fallback_for(content_type).to_string()
            }
        }
    }

    /// Simulated think time inside a step, skipped when pacing is off
    pub async fn pause(&self, duration: Duration) {
        if self.config.pacing.is_enabled() && !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }

    /// Run `f` with exclusive access to the agent's random source
    pub fn with_rng<R>(&self, f: impl FnOnce(&mut dyn RandomSource) -> R) -> R {
        let mut rng = self.rng.lock();
        f(&mut **rng)
    }

    pub(crate) fn take_decisions(&self) -> Vec<Decision> {
        std::mem::take(&mut *self.decisions.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{OracleChoice, OracleError};
    use crate::persona::PersonaGenerator;
    use crate::runtime::log::MemoryLog;
    use crate::runtime::random::ScriptedRandom;
    use crate::runtime::testing::ScriptedTarget;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedOracle(&'static str);

    #[async_trait]
    impl DecisionOracle for FixedOracle {
        async fn choose(&self, _: &Persona, _: &str, _: &[String]) -> Result<OracleChoice, OracleError> {
            Ok(OracleChoice {
                chosen: self.0.to_string(),
                reasoning: "habit".to_string(),
                confidence: 0.9,
            })
        }
    }

    #[async_trait]
    impl ContentGenerator for FixedOracle {
        async fn generate(&self, _: &Persona, content_type: &str) -> Result<String, OracleError> {
            Ok(format!("{} by oracle", content_type))
        }
    }

    fn context(flow: Flow, oracles: Oracles, rng: ScriptedRandom) -> Arc<StepContext> {
        let mut persona_rng = ScriptedRandom::constant(0.0);
        let persona = PersonaGenerator::generate(PersonaType::Beginner, 1, &mut persona_rng);
        Arc::new(StepContext::new(
            "lumina_agent_1",
            Arc::new(persona),
            Arc::new(RunConfig::new("lumina", "http://localhost:3000").with_pacing(
                crate::runtime::pacing::PacingPolicy::disabled(),
            )),
            Arc::new(flow),
            Arc::new(ScriptedTarget::new()),
            oracles,
            Box::new(rng),
            Arc::new(MemoryLog::new()),
        ))
    }

    #[test]
    fn test_conditions() {
        let mut rng = ScriptedRandom::new(vec![0.6, 0.4]);
        let gate = StepCondition::Chance(GateOdds {
            beginner: 0.5,
            intermediate: 0.7,
            expert: 1.0,
            power_user: 1.0,
        });

        assert!(!gate.admits(PersonaType::Beginner, &mut rng));
        assert!(gate.admits(PersonaType::Beginner, &mut rng));
        // Certain gates do not draw
        assert!(gate.admits(PersonaType::Expert, &mut rng));

        let advanced = StepCondition::PersonaIn(vec![PersonaType::Expert, PersonaType::PowerUser]);
        assert!(!advanced.admits(PersonaType::Intermediate, &mut rng));
        assert!(advanced.admits(PersonaType::PowerUser, &mut rng));
    }

    #[test]
    fn test_flow_builder() {
        let flow = Flow::new("demo")
            .step(FlowStep::new("a", |_ctx| async { Ok(Value::Null) }))
            .step(
                FlowStep::new("b", |_ctx| async { Ok(Value::Null) })
                    .retryable(false)
                    .optional(),
            )
            .fallback_content("book_metadata", "Title: Test");

        assert_eq!(flow.len(), 2);
        assert_eq!(flow.step_names(), vec!["a", "b"]);
        assert!(flow.steps()[0].required);
        assert!(!flow.steps()[1].required);
        assert!(!flow.steps()[1].retryable);
        assert_eq!(flow.fallback_for("book_metadata"), "Title: Test");
        assert_eq!(flow.fallback_for("other"), DEFAULT_FALLBACK_CONTENT);
    }

    #[tokio::test]
    async fn test_decision_fallback_is_buffered() {
        let ctx = context(Flow::new("demo"), Oracles::offline(), ScriptedRandom::constant(0.9));

        let decision = ctx.make_intelligent_decision("Pick one", &["x", "y"]).await;

        assert_eq!(decision.chosen, "y");
        assert!(decision.fallback);
        let drained = ctx.take_decisions();
        assert_eq!(drained.len(), 1);
        assert!(ctx.take_decisions().is_empty());
    }

    #[tokio::test]
    async fn test_oracle_decision_and_content() {
        let ctx = context(
            Flow::new("demo"),
            Oracles::shared(Arc::new(FixedOracle("x"))),
            ScriptedRandom::constant(0.0),
        );

        let decision = ctx.make_intelligent_decision("Pick one", &["x", "y"]).await;
        assert_eq!(decision.chosen, "x");
        assert!(!decision.fallback);
        assert_eq!(ctx.generate_content("bio").await, "bio by oracle");
    }

    #[tokio::test]
    async fn test_content_fallback() {
        let flow = Flow::new("demo").fallback_content("patient_name", "John Doe");
        let ctx = context(flow, Oracles::offline(), ScriptedRandom::constant(0.0));

        assert_eq!(ctx.generate_content("patient_name").await, "John Doe");
        assert_eq!(ctx.generate_content("clinical_note").await, DEFAULT_FALLBACK_CONTENT);
    }

    #[tokio::test]
    async fn test_session_variables() {
        let ctx = context(Flow::new("demo"), Oracles::offline(), ScriptedRandom::constant(0.0));

        assert!(ctx.require_str("book_id", "No book uploaded").is_err());
        ctx.remember("book_id", json!("b-7"));
        assert_eq!(ctx.require_str("book_id", "No book uploaded").unwrap(), "b-7");
        assert_eq!(ctx.recall("book_id"), Some(json!("b-7")));
    }
}
