//! Full-pipeline test: warm-up through critic, then export and re-validate.

use std::fs;

use arena::core::side::Side;
use arena::io::config::ArenaConfig;
use arena::io::export::{export_transcript, validate_transcript_value};
use arena::session::{DebateSession, SessionState};
use arena::test_support::{ScriptedGateway, ScriptedResult};
use serde_json::Value;

fn turn(side: Side, reflection: &str, reasoning: &str) -> ScriptedResult {
    ScriptedResult::ok(&format!(
        "<SIDE_CONFIRM>{side}</SIDE_CONFIRM>\
         <ASSUMPTIONS>none</ASSUMPTIONS>\
         <REFLECTION>{reflection}</REFLECTION>\
         <STANCE>firm</STANCE>\
         <CHANGE>none</CHANGE>\
         <REASONING>{reasoning}</REASONING>"
    ))
}

#[test]
fn full_debate_exports_a_schema_valid_transcript() {
    let mut config = ArenaConfig::default();
    config.rounds = 1;
    let gateway = ScriptedGateway::new(vec![
        // warm-up: pro, con, critic
        ScriptedResult::ok("ok"),
        ScriptedResult::ok("ok"),
        ScriptedResult::ok("ok"),
        // baseline
        turn(Side::Pro, "open strong", "jobs will grow"),
        turn(Side::Con, "press harder", "jobs will shrink"),
        // exchange round 1
        turn(Side::Pro, "cite more", "automation creates roles"),
        turn(Side::Con, "stay skeptical", "history says otherwise"),
        // finalize
        ScriptedResult::ok("<SIDE>PRO</SIDE><FINAL>growth wins</FINAL>"),
        ScriptedResult::ok("<SIDE>CON</SIDE><FINAL>caution wins</FINAL>"),
        // critic: verdict, hallucination
        ScriptedResult::ok("CON was more persuasive."),
        ScriptedResult::ok("```json\n{\"potential_fabrications\": []}\n```"),
    ]);

    let rounds = config.rounds;
    let mut session = DebateSession::new(config);
    session.warm_up(&gateway);
    session.generate_baseline(&gateway).expect("baseline");
    for _ in 0..rounds {
        session.exchange_step(&gateway).expect("exchange");
    }
    session.finalize(&gateway).expect("finalize");
    session.run_critic(&gateway).expect("critic");
    assert_eq!(session.state(), SessionState::Finalized);
    assert_eq!(gateway.calls(), 11);

    let transcript = session.into_transcript();
    assert_eq!(transcript.history.len(), 2);
    let report = transcript.critic_report.as_ref().expect("report");
    assert_eq!(report.verdict, "CON was more persuasive.");
    assert_eq!(report.drift_audit.total_pro_mismatches, 0);
    assert_eq!(report.drift_audit.total_con_mismatches, 0);

    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("transcript.json");
    export_transcript(&path, &transcript).expect("export");

    let written = fs::read_to_string(&path).expect("read back");
    let value: Value = serde_json::from_str(&written).expect("json");
    validate_transcript_value(&value).expect("schema");
    assert_eq!(value["topic"], transcript.topic);
    assert_eq!(value["history"][1]["pro"]["capsule"]["my_last_reflection"], "open strong");
    assert_eq!(value["finals"]["con"]["output"]["final"], "caution wins");
}
