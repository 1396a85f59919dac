//! The game state machine.
//!
//! Each stage lives in its own module with `enter`, `handle` and `on_timeout`
//! hooks. Hooks never switch stages themselves; they return a [`Flow`] and
//! [`advance`] applies it, so every stage change runs exit, enter and the
//! transition bookkeeping exactly once.

mod finished;
mod judging;
mod preparing;
mod speaking;
mod voting;
mod waiting;

use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::{RequestEnvelope, RequestTag, Stage};

use crate::game::session::Session;

/// Outcome of a stage hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Stay,
    Next(Stage),
}

/// A player request routed to the current stage.
#[derive(Debug, Clone, Copy)]
pub struct Action<'a> {
    /// Requester, as stamped by the transport.
    pub caller: &'a str,
    pub tag: RequestTag,
    pub env: &'a RequestEnvelope,
}

impl Action<'_> {
    fn wrong_stage(&self, stage: Stage) -> UndercoverError {
        UndercoverError::WrongStage {
            stage,
            action: self.tag,
        }
    }
}

pub fn enter(s: &mut Session) -> Flow {
    match s.stage {
        Stage::Waiting => Flow::Stay,
        Stage::Preparing => preparing::enter(s),
        Stage::Speaking => speaking::enter(s),
        Stage::Voting => voting::enter(s),
        Stage::Judging => judging::enter(s),
        Stage::Finished => finished::enter(s),
    }
}

pub fn exit(s: &mut Session) {
    // every timed stage owns the single deadline
    s.clear_timeout();
}

pub fn handle(s: &mut Session, action: Action<'_>) -> Result<Flow> {
    match s.stage {
        Stage::Waiting => waiting::handle(s, action),
        Stage::Speaking => speaking::handle(s, action),
        Stage::Voting => voting::handle(s, action),
        stage @ (Stage::Preparing | Stage::Judging | Stage::Finished) => {
            Err(action.wrong_stage(stage))
        }
    }
}

pub fn on_timeout(s: &mut Session) -> Flow {
    match s.stage {
        Stage::Preparing => Flow::Next(Stage::Speaking),
        Stage::Speaking => speaking::next_turn(s),
        Stage::Voting => Flow::Next(Stage::Judging),
        Stage::Judging => Flow::Next(Stage::Speaking),
        Stage::Waiting | Stage::Finished => Flow::Stay,
    }
}

/// Re-check the current stage after a player left the table.
pub fn on_leave(s: &mut Session, player_id: &str) -> Flow {
    match s.stage {
        Stage::Speaking => speaking::on_leave(s, player_id),
        Stage::Voting => voting::on_leave(s, player_id),
        Stage::Waiting | Stage::Preparing | Stage::Judging | Stage::Finished => Flow::Stay,
    }
}

/// Apply `flow` along with any follow-up transitions decided by entry hooks.
pub fn advance(s: &mut Session, mut flow: Flow) {
    while let Flow::Next(next) = flow {
        exit(s);
        tracing::info!(room_id = %s.room_id, from = %s.stage, to = %next, round = s.round, "stage transition");
        s.metrics.stage_transitions.inc(&[("stage", next.as_str())]);
        s.stage = next;
        flow = enter(s);
    }
}
