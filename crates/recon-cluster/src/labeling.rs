//! Human-in-the-loop labeling boundary.

use crate::blocking::CandidatePair;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use recon_core::LearningConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelResponse {
    Match,
    NoMatch,
    /// Abstain; the pair is excluded from training.
    Unsure,
    /// Stop learning and cluster with the current model.
    Finished,
}

/// A pair presented for labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRequest {
    pub id: u64,
    pub pair: CandidatePair,
    pub left: BTreeMap<String, String>,
    pub right: BTreeMap<String, String>,
    /// Current model probability for the pair.
    pub probability: f64,
    /// Labels left in the budget, including this one.
    pub remaining: usize,
}

/// Blocks the run until a decision is made.
pub trait Labeler {
    fn label(&mut self, request: &LabelRequest) -> LabelResponse;
}

/// Closure-backed labeler for scripted runs.
pub struct FnLabeler<F>(pub F);

impl<F> Labeler for FnLabeler<F>
where
    F: FnMut(&LabelRequest) -> LabelResponse,
{
    fn label(&mut self, request: &LabelRequest) -> LabelResponse {
        (self.0)(request)
    }
}

/// Declines to label; clustering uses the prior and any seeded training data.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLabeler;

impl Labeler for NoLabeler {
    fn label(&mut self, _request: &LabelRequest) -> LabelResponse {
        LabelResponse::Finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelAnswer {
    pub request_id: u64,
    pub response: LabelResponse,
}

/// Labeler side of a channel pair. Expiry of the timeout or a vanished desk
/// counts as an abstention.
pub struct ChannelLabeler {
    requests: Sender<LabelRequest>,
    answers: Receiver<LabelAnswer>,
    timeout: Duration,
}

/// The analyst side: receives requests, sends answers.
pub struct LabelDesk {
    pub requests: Receiver<LabelRequest>,
    answers: Sender<LabelAnswer>,
}

impl LabelDesk {
    /// Returns `false` if the labeler has gone away.
    pub fn answer(&self, request: &LabelRequest, response: LabelResponse) -> bool {
        self.answers.send(LabelAnswer { request_id: request.id, response }).is_ok()
    }
}

impl ChannelLabeler {
    pub fn new(timeout: Duration) -> (Self, LabelDesk) {
        let (req_tx, req_rx) = unbounded();
        let (ans_tx, ans_rx) = unbounded();
        (
            Self { requests: req_tx, answers: ans_rx, timeout },
            LabelDesk { requests: req_rx, answers: ans_tx },
        )
    }

    pub fn from_config(config: &LearningConfig) -> (Self, LabelDesk) {
        Self::new(Duration::from_secs(config.label_timeout_secs))
    }
}

impl Labeler for ChannelLabeler {
    fn label(&mut self, request: &LabelRequest) -> LabelResponse {
        if self.requests.send(request.clone()).is_err() {
            tracing::warn!(request = request.id, "label desk closed, abstaining");
            return LabelResponse::Unsure;
        }
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.answers.recv_timeout(remaining) {
                Ok(answer) if answer.request_id == request.id => return answer.response,
                Ok(stale) => {
                    tracing::debug!(request = stale.request_id, "discarding late answer");
                }
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(request = request.id, timeout = ?self.timeout, "label timed out, abstaining");
                    return LabelResponse::Unsure;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::warn!(request = request.id, "label desk closed, abstaining");
                    return LabelResponse::Unsure;
                }
            }
        }
    }
}
