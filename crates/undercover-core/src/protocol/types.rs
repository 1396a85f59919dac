//! Game vocabulary shared by server and clients: stages, roles, player views.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of the per-room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Waiting,
    Preparing,
    Speaking,
    Voting,
    Judging,
    Finished,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Waiting => "Waiting",
            Stage::Preparing => "Preparing",
            Stage::Speaking => "Speaking",
            Stage::Voting => "Voting",
            Stage::Judging => "Judging",
            Stage::Finished => "Finished",
        }
    }

    /// `Finished` is the only stage the runtime never leaves.
    pub fn is_terminal(self) -> bool {
        self == Stage::Finished
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visible role of a player.
///
/// Eliminated players are shown as `Observer`; the role they held before
/// elimination is tracked separately by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Unset,
    Admin,
    Normal,
    Blank,
    Spy,
    Observer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Unset => "Unset",
            Role::Admin => "Admin",
            Role::Normal => "Normal",
            Role::Blank => "Blank",
            Role::Spy => "Spy",
            Role::Observer => "Observer",
        }
    }

    /// Alive players take part in speaking and voting.
    pub fn is_alive(self) -> bool {
        !matches!(self, Role::Admin | Role::Observer)
    }

    /// Roles that must not leak to other players while a game runs.
    pub fn is_secret(self) -> bool {
        matches!(self, Role::Normal | Role::Blank | Role::Spy)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side won a finished game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    /// Normal players: impostor and blank were both eliminated.
    Civilians,
    /// Impostor and blank: survived long enough.
    ImpostorSide,
}

/// Player as seen on the wire.
///
/// `role` is absent in public views while it is secret, `word` is absent
/// everywhere except the owner's private view and the game-master roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}
