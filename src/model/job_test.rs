use super::*;

#[test]
fn main_chain_is_strictly_forward() {
    assert!(Phase::Pending.can_transition_to(Phase::Queued));
    assert!(Phase::Queued.can_transition_to(Phase::Executing));
    assert!(Phase::Executing.can_transition_to(Phase::Completed));

    assert!(!Phase::Pending.can_transition_to(Phase::Executing));
    assert!(!Phase::Queued.can_transition_to(Phase::Pending));
}

#[test]
fn side_exits_allowed_from_any_non_terminal_phase() {
    for p in [Phase::Pending, Phase::Queued, Phase::Executing] {
        assert!(p.can_transition_to(Phase::Aborted));
        assert!(p.can_transition_to(Phase::Error));
    }
}

#[test]
fn terminal_phases_are_immutable() {
    for p in [Phase::Completed, Phase::Aborted, Phase::Error] {
        assert!(p.is_terminal());
        assert!(!p.can_transition_to(Phase::Completed));
        assert!(!p.can_transition_to(Phase::Aborted));
        assert!(!p.can_transition_to(Phase::Error));
    }
}

#[test]
fn phase_string_roundtrip() {
    for p in [
        Phase::Pending,
        Phase::Queued,
        Phase::Executing,
        Phase::Completed,
        Phase::Aborted,
        Phase::Error,
    ] {
        let s = p.to_string();
        let parsed: Phase = s.parse().unwrap();
        assert_eq!(parsed, p);
    }
}

fn sample_job(phase: Phase, started: bool) -> Job {
    Job {
        id: "job1".to_string(),
        owner: "alice".to_string(),
        phase,
        transfer_xml: String::new(),
        results: Vec::new(),
        created_at: Utc::now(),
        started_at: started.then(Utc::now),
        ended_at: None,
        error: None,
    }
}

#[test]
fn results_hidden_before_executing() {
    let job = sample_job(Phase::Pending, false);
    assert!(!job.results_visible());
}

#[test]
fn results_visible_once_executing_reached() {
    let job = sample_job(Phase::Executing, true);
    assert!(job.results_visible());

    let aborted_after_executing = sample_job(Phase::Aborted, true);
    assert!(aborted_after_executing.results_visible());
}
