mod common;

use common::{Recorder, wait_for};
use specwatch::config::Settings;
use specwatch::display::SessionEvent;
use specwatch::persist::PersistError;
use specwatch::session::SAVE;
use specwatch::state::Phase;
use specwatch::{Session, SessionConfig, SessionError};
use std::sync::Arc;

fn save_errors(recorder: &Recorder) -> usize {
    recorder.count(|e| matches!(e, SessionEvent::SaveError { .. }))
}

#[tokio::test]
async fn test_failed_autosave_is_reported_and_acquisition_continues() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("occupied");
    std::fs::write(&blocker, b"x").unwrap();

    let settings = Settings {
        sample_interval_s: 0.01,
        live_horizon_s: 0.5,
        average_horizon_s: 0.5,
        save_horizon_s: 1.0,
        render_interval_s: 0.02,
        autosave_interval_s: 0.05,
        // a regular file sits where the output directory should be
        output_dir: blocker.join("out"),
        ..Settings::default()
    };
    let config = SessionConfig::from_settings(&settings, 1000, 4).unwrap();
    let recorder = Arc::new(Recorder::default());
    let session = Session::start(config, recorder.clone()).await.unwrap();

    wait_for(|| save_errors(&recorder) >= 2).await;
    let pushed = session.windows().total_pushed(SAVE).unwrap();
    let failures = save_errors(&recorder);

    // acquisition and the save schedule both carry on
    wait_for(|| session.windows().total_pushed(SAVE).unwrap() > pushed).await;
    wait_for(|| save_errors(&recorder) > failures).await;
    assert_eq!(session.phase(), Phase::Running);

    let result = session.stop().await;
    assert!(matches!(
        result,
        Err(SessionError::Persist(PersistError::Io { .. }))
    ));
    assert!(
        !recorder
            .events()
            .iter()
            .any(|e| matches!(e, SessionEvent::Saved { .. }))
    );
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
