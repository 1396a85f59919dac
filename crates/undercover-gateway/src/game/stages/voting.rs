//! One ballot per alive player, closed early once everyone has voted.

use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::messages::{VoteRequest, VoteResponse};
use undercover_core::protocol::{RequestTag, ResponseEnvelope, ResponseTag, Stage};

use super::{Action, Flow};
use crate::game::session::Session;

pub(super) fn enter(s: &mut Session) -> Flow {
    s.votes.clear();
    s.broadcast_state();
    s.set_timeout(s.rules.voting());
    Flow::Stay
}

pub(super) fn handle(s: &mut Session, action: Action<'_>) -> Result<Flow> {
    if action.tag != RequestTag::Vote {
        return Err(action.wrong_stage(Stage::Voting));
    }
    let Some(req) = action.env.decode::<VoteRequest>(RequestTag::Vote) else {
        return Ok(Flow::Stay);
    };

    let ballot = validate(s, action.caller, &req.target_id)?;
    s.votes.insert(ballot.voter_id.clone(), ballot.target_id.clone());
    tracing::debug!(room_id = %s.room_id, voter = %ballot.voter_id, target = %ballot.target_id, "vote cast");
    s.broadcast(&ResponseEnvelope::wrap(ResponseTag::Vote, &ballot));

    Ok(close_if_complete(s))
}

/// A player left mid-vote: their ballot and any ballot naming them no longer
/// count, and the voters who named them may vote again.
pub(super) fn on_leave(s: &mut Session, player_id: &str) -> Flow {
    let before = s.votes.len();
    s.votes.retain(|voter, target| voter != player_id && target != player_id);
    if s.votes.len() != before {
        tracing::debug!(room_id = %s.room_id, player_id, dropped = before - s.votes.len(), "ballots withdrawn");
    }
    close_if_complete(s)
}

fn close_if_complete(s: &Session) -> Flow {
    if s.alive_players().all(|p| s.votes.contains_key(&p.id)) {
        Flow::Next(Stage::Judging)
    } else {
        Flow::Stay
    }
}

fn validate(s: &Session, voter_id: &str, target_id: &str) -> Result<VoteResponse> {
    let voter = s
        .player(voter_id)
        .ok_or_else(|| UndercoverError::NotAllowed("unknown voter".into()))?;
    if !voter.is_alive() {
        return Err(UndercoverError::NotAllowed(
            "observers and the admin cannot vote".into(),
        ));
    }
    let target = s
        .player(target_id)
        .ok_or_else(|| UndercoverError::InvalidData(format!("unknown vote target {target_id}")))?;
    if !target.is_alive() {
        return Err(UndercoverError::InvalidData(
            "cannot vote for an observer or the admin".into(),
        ));
    }
    if s.votes.contains_key(voter_id) {
        return Err(UndercoverError::InvalidData("you have already voted".into()));
    }
    Ok(VoteResponse {
        voter_id: voter.id.clone(),
        voter_name: voter.name.clone(),
        target_id: target.id.clone(),
        target_name: target.name.clone(),
    })
}
