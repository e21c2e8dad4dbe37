//! Test-only scripted gateway for exercising orchestration without a backend.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::transcript::GenMetrics;
use crate::io::gateway::{GenRequest, Generation, Gateway};

/// A canned outcome for one generation call.
#[derive(Debug, Clone)]
pub enum ScriptedResult {
    Ok(Generation),
    Err(String),
}

impl ScriptedResult {
    pub fn ok(text: &str) -> Self {
        Self::Ok(Generation {
            text: text.to_string(),
            metrics: GenMetrics::default(),
        })
    }

    pub fn ok_with_metrics(text: &str, metrics: GenMetrics) -> Self {
        Self::Ok(Generation {
            text: text.to_string(),
            metrics,
        })
    }

    pub fn err(message: &str) -> Self {
        Self::Err(message.to_string())
    }
}

/// Gateway that replays scripted results in order and records every request
/// it receives, so tests can assert on call counts and prompt contents.
pub struct ScriptedGateway {
    results: RefCell<VecDeque<ScriptedResult>>,
    requests: RefCell<Vec<GenRequest>>,
}

impl ScriptedGateway {
    pub fn new(results: Vec<ScriptedResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Vec<GenRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl Gateway for ScriptedGateway {
    fn generate(&self, request: &GenRequest) -> Result<Generation> {
        self.requests.borrow_mut().push(request.clone());
        match self.results.borrow_mut().pop_front() {
            Some(ScriptedResult::Ok(generation)) => Ok(generation),
            Some(ScriptedResult::Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted gateway exhausted")),
        }
    }
}
