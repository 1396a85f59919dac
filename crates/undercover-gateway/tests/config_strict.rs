#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use undercover_gateway::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
gateway:
  listen: "0.0.0.0:8080"
game:
  max_playerz: 10 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.gateway.listen, "0.0.0.0:8080");
    assert_eq!(cfg.rooms.join_timeout_ms, 3000);
    assert_eq!(cfg.game.max_players, 8);
    assert_eq!(cfg.game.min_players, 8);
    assert_eq!(cfg.game.max_rounds, 4);
    assert_eq!(cfg.game.first_speaker_ms, 40000);
}

#[test]
fn unsupported_version() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn idle_timeout_must_exceed_ping() {
    let bad = r#"
version: 1
gateway:
  ping_interval_ms: 30000
  idle_timeout_ms: 20000
"#;
    assert!(config::load_from_str(bad).is_err());
}

#[test]
fn min_players_bounded_by_max() {
    let bad = r#"
version: 1
game:
  max_players: 6
  min_players: 7
"#;
    assert!(config::load_from_str(bad).is_err());

    let ok = r#"
version: 1
game:
  max_players: 6
  min_players: 4
  voting_ms: 5000
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.game.voting().as_secs(), 5);
}

#[test]
fn zero_stage_timing_is_rejected() {
    let bad = r#"
version: 1
game:
  judging_ms: 0
"#;
    assert!(config::load_from_str(bad).is_err());
}
