use cogtrial_core::{ResponseCode, TrialResult};
use cogtrial_experiment::{
    Host, RecordingSurface, ScriptedInput, SessionError, SessionFile, TrialRunner, run_session,
};
use cogtrial_timing::{ManualTimer, Timer};
use std::sync::Arc;
use std::time::Duration;

const SESSION: &str = r#"{
    "settings": {"timing": {"ititime_ms": 500}},
    "seed": 11,
    "trials": [
        {"type": "fixation", "stimulus": "images/space.png", "trial_duration": 800},
        {"type": "mars-trial", "stimulus": "<p>puzzle</p>", "choices": ["a", "b"], "feedback_duration": 300},
        {
            "type": "explicit-choice",
            "planet": "images/planet1.png",
            "left": "images/alien1",
            "right": "images/alien2",
            "query_trial": "Which alien?"
        }
    ],
    "script": [
        [{"at_ms": 100, "key": "space"}],
        [{"at_ms": 250, "click": "1"}],
        [{"at_ms": 50, "key": "7"}, {"at_ms": 400, "key": "0"}]
    ]
}"#;

fn simulate(session: &SessionFile) -> (Result<(), SessionError>, Vec<TrialResult>, ManualTimer) {
    let settings = Arc::new(session.settings.clone());
    let configs = session.configs().unwrap();
    let timer = ManualTimer::new();
    let mut runner = TrialRunner::new(timer.clone());
    let mut input = ScriptedInput::new(session.script.clone());
    let mut surface = RecordingSurface::new();
    let mut results = Vec::new();
    let outcome = {
        let mut host = Host::new(&mut surface, &mut results);
        run_session(
            settings,
            configs,
            session.seed.unwrap_or_default(),
            &mut runner,
            &mut input,
            &mut host,
        )
    };
    (outcome, results, timer)
}

#[test]
fn scripted_session_runs_every_trial_in_order() {
    let session = SessionFile::from_json(SESSION).unwrap();
    let (outcome, results, timer) = simulate(&session);
    outcome.unwrap();

    assert_eq!(results.len(), 3);
    let indices: Vec<usize> = results.iter().map(|r| r.trial_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    assert_eq!(results[0].response, None);
    assert_eq!(results[0].time_elapsed, 800.0);

    assert_eq!(results[1].response, Some(ResponseCode::new("1")));
    assert_eq!(results[1].rt, Some(250.0));
    assert_eq!(results[1].time_elapsed, 550.0);

    assert_eq!(results[2].response, Some(ResponseCode::new("0")));
    assert_eq!(results[2].rt, Some(400.0));
    assert_eq!(results[2].keys, vec![ResponseCode::new("7")]);

    // 800 + 500 + 550 + 500 + 400
    assert_eq!(timer.now(), Duration::from_millis(2_750));
}

#[test]
fn trial_without_deadline_or_input_stalls() {
    let session = SessionFile::from_json(
        r#"{"trials": [{"type": "mars-trial", "stimulus": "<p>?</p>", "choices": ["a"]}]}"#,
    )
    .unwrap();
    let (outcome, results, _) = simulate(&session);
    assert!(matches!(outcome, Err(SessionError::Stalled { index: 0 })));
    assert!(results.is_empty());
}

#[test]
fn script_inputs_past_the_timeout_are_dropped() {
    let session = SessionFile::from_json(
        r#"{
            "trials": [
                {"type": "two-stage", "stimuli": ["a.png", "b.png"], "trial_duration": 300},
                {"type": "two-stage", "stimuli": ["a.png", "b.png"], "trial_duration": 300}
            ],
            "script": [[{"at_ms": 300, "key": "space"}], [{"at_ms": 120, "key": "space"}]]
        }"#,
    )
    .unwrap();
    let (outcome, results, _) = simulate(&session);
    outcome.unwrap();
    assert_eq!(results[0].response, None);
    assert_eq!(results[1].response, Some(ResponseCode::space()));
    assert_eq!(results[1].rt, Some(120.0));
}
