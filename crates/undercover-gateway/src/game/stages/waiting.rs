//! Lobby: the admin sets the word pair and starts the game.

use undercover_core::error::{Result, UndercoverError};
use undercover_core::protocol::messages::{SetWordsRequest, SetWordsResponse, StartGameRequest};
use undercover_core::protocol::{RequestTag, ResponseEnvelope, ResponseTag, Stage};

use super::{Action, Flow};
use crate::game::session::Session;

pub(super) fn handle(s: &mut Session, action: Action<'_>) -> Result<Flow> {
    match action.tag {
        RequestTag::SetWords => {
            let Some(req) = action.env.decode::<SetWordsRequest>(RequestTag::SetWords) else {
                return Ok(Flow::Stay);
            };
            set_words(s, action.caller, req)?;
            Ok(Flow::Stay)
        }
        RequestTag::StartGame => {
            if action.env.decode::<StartGameRequest>(RequestTag::StartGame).is_none() {
                return Ok(Flow::Stay);
            }
            start_game(s, action.caller)?;
            Ok(Flow::Next(Stage::Preparing))
        }
        _ => Err(action.wrong_stage(Stage::Waiting)),
    }
}

fn set_words(s: &mut Session, caller: &str, req: SetWordsRequest) -> Result<()> {
    if !s.is_admin(caller) {
        return Err(UndercoverError::NotAllowed(
            "only the admin can set the word list".into(),
        ));
    }
    let words: Vec<String> = req.word_list.iter().map(|w| w.trim().to_owned()).collect();
    if !has_word_pair(&words) {
        return Err(UndercoverError::InvalidData(
            "word list needs a non-empty answer word (index 0) and spy word (index 1)".into(),
        ));
    }
    s.word_list = words;
    tracing::info!(room_id = %s.room_id, "word list set");

    // acknowledge without revealing the words
    s.broadcast(&ResponseEnvelope::wrap(
        ResponseTag::SetWords,
        &SetWordsResponse::default(),
    ));
    Ok(())
}

fn start_game(s: &Session, caller: &str) -> Result<()> {
    if !s.is_admin(caller) {
        return Err(UndercoverError::NotAllowed(
            "only the admin can start the game".into(),
        ));
    }
    if !has_word_pair(&s.word_list) {
        return Err(UndercoverError::InvalidData(
            "the admin must set the answer and spy words first".into(),
        ));
    }
    let alive = s.count_alive();
    if alive < s.rules.min_players {
        return Err(UndercoverError::InvalidData(format!(
            "at least {} players are required, {alive} joined",
            s.rules.min_players
        )));
    }
    Ok(())
}

fn has_word_pair(words: &[String]) -> bool {
    words.len() >= 2 && !words[0].is_empty() && !words[1].is_empty()
}
