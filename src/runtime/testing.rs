// src/runtime/testing.rs
//! In-process target service for tests

use crate::target::{TargetError, TargetRequest, TargetResponse, TargetService};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    Fail(u16, &'static str),
}

struct Rule {
    prefix: String,
    queued: VecDeque<Reply>,
    sticky: Option<Reply>,
}

/// Target answering from scripted rules, `200 {}` when nothing matches
#[derive(Default)]
pub struct ScriptedTarget {
    rules: Mutex<Vec<Rule>>,
    requests: Mutex<Vec<TargetRequest>>,
    latency: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reply once for requests whose path starts with `prefix`
    pub fn once(self, prefix: &str, reply: Reply) -> Self {
        self.push(prefix, Some(reply), None)
    }

    /// Reply every time for requests whose path starts with `prefix`
    pub fn always(self, prefix: &str, reply: Reply) -> Self {
        self.push(prefix, None, Some(reply))
    }

    fn push(self, prefix: &str, once: Option<Reply>, sticky: Option<Reply>) -> Self {
        self.rules.lock().push(Rule {
            prefix: prefix.to_string(),
            queued: once.into_iter().collect(),
            sticky,
        });
        self
    }

    pub fn requests(&self) -> Vec<TargetRequest> {
        self.requests.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.path.clone()).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .count()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn reply_for(&self, request: &TargetRequest) -> Reply {
        let mut rules = self.rules.lock();
        for rule in rules.iter_mut() {
            if !request.path.starts_with(&rule.prefix) {
                continue;
            }
            if let Some(reply) = rule.queued.pop_front() {
                return reply;
            }
            if let Some(reply) = &rule.sticky {
                return reply.clone();
            }
        }
        Reply::Ok(json!({}))
    }
}

#[async_trait]
impl TargetService for ScriptedTarget {
    async fn send(&self, request: TargetRequest) -> Result<TargetResponse, TargetError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self.reply_for(&request);
        self.requests.lock().push(request.clone());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Ok(body) => Ok(TargetResponse::ok(body)),
            Reply::Fail(status, message) => {
                Err(TargetError::http(status, message).with_endpoint(request.path))
            }
        }
    }
}
