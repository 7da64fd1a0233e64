use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One configuration step of the provisioning workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Login,
    Hostname,
    WiFi,
    Admin,
    /// Factory reset. Never part of the default queue.
    Reset,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Login => write!(f, "LOGIN"),
            Stage::Hostname => write!(f, "HOSTNAME"),
            Stage::WiFi => write!(f, "WIFI"),
            Stage::Admin => write!(f, "ADMIN"),
            Stage::Reset => write!(f, "RESET"),
        }
    }
}

/// FIFO of pending stages. The head only leaves the queue once its handler
/// reports completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageQueue {
    pending: VecDeque<Stage>,
}

impl Default for StageQueue {
    /// `[Login, Hostname, WiFi, Admin]`.
    fn default() -> Self {
        Self::new([Stage::Login, Stage::Hostname, Stage::WiFi, Stage::Admin])
    }
}

impl StageQueue {
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Self {
        Self {
            pending: stages.into_iter().collect(),
        }
    }

    /// Log in, then restore factory defaults.
    pub fn factory_reset() -> Self {
        Self::new([Stage::Login, Stage::Reset])
    }

    pub fn head(&self) -> Option<Stage> {
        self.pending.front().copied()
    }

    /// Apply a handler result: `true` dequeues and returns the finished stage,
    /// `false` leaves the queue untouched.
    pub fn advance(&mut self, completed: bool) -> Option<Stage> {
        if completed {
            self.pending.pop_front()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Stage> + '_ {
        self.pending.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_queue_order() {
        let queue = StageQueue::default();
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.head(), Some(Stage::Login));
        assert!(!queue.pending.contains(&Stage::Reset));
    }

    #[test]
    fn incomplete_results_never_dequeue() {
        let mut queue = StageQueue::default();
        for _ in 0..5 {
            assert_eq!(queue.advance(false), None);
        }
        assert_eq!(queue.head(), Some(Stage::Login));
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn each_completion_dequeues_exactly_once() {
        let mut queue = StageQueue::default();
        let results = [false, false, true, true, false, true, true];
        let mut finished = Vec::new();
        for done in results {
            let before = queue.len();
            if let Some(stage) = queue.advance(done) {
                finished.push(stage);
            }
            assert_eq!(before - queue.len(), usize::from(done));
        }
        assert_eq!(
            finished,
            vec![Stage::Login, Stage::Hostname, Stage::WiFi, Stage::Admin]
        );
        assert!(queue.is_empty());
        assert_eq!(queue.advance(true), None);
    }

    #[test]
    fn factory_reset_queue() {
        let mut queue = StageQueue::factory_reset();
        assert_eq!(queue.advance(true), Some(Stage::Login));
        assert_eq!(queue.head(), Some(Stage::Reset));
    }

    #[test]
    fn stage_display() {
        assert_eq!(Stage::WiFi.to_string(), "WIFI");
        assert_eq!(Stage::Reset.to_string(), "RESET");
    }
}
