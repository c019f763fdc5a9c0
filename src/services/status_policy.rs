//! How an oracle decides which status code to report

use std::sync::Arc;

use rand::Rng;

use crate::models::StatusCode;

pub trait StatusCodePolicy: Send + Sync {
    fn choose(&self) -> StatusCode;
}

/// Uniform pick over every status code, modelling unreliable real-world oracles.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStatusPolicy;

impl StatusCodePolicy for RandomStatusPolicy {
    fn choose(&self) -> StatusCode {
        StatusCode::ALL[rand::thread_rng().gen_range(0..StatusCode::ALL.len())]
    }
}

/// Always reports the same code.
#[derive(Debug, Clone, Copy)]
pub struct FixedStatusPolicy(pub StatusCode);

impl StatusCodePolicy for FixedStatusPolicy {
    fn choose(&self) -> StatusCode {
        self.0
    }
}

/// The fixed policy when a code is pinned, otherwise the random one.
pub fn policy_for(fixed: Option<StatusCode>) -> Arc<dyn StatusCodePolicy> {
    match fixed {
        Some(status) => Arc::new(FixedStatusPolicy(status)),
        None => Arc::new(RandomStatusPolicy),
    }
}
