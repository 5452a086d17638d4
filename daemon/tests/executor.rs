mod common;

#[cfg(test)]
mod tests {
    use crate::common::{AppCall, AppHandle, RecordingApp};
    use notevoxd::executor::{
        ActionExecutor, ActionRequest, Outcome, CLOSE_FALLBACK_TEXT, EDITOR_LOST_TEXT,
    };
    use notevoxd::log::{LogBook, LogSink};
    use notevoxd::output::TargetApp;
    use notevoxd::session::LastAction;
    use notevoxd::settings::NotesDir;
    use notevoxd::vocabulary::Action;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        executor: ActionExecutor,
        app: AppHandle,
        log: Arc<LogBook>,
    }

    fn fixture_with(app: RecordingApp, handle: AppHandle) -> Fixture {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(LogBook::new());
        let sink: Arc<dyn LogSink> = log.clone();
        let app: Box<dyn TargetApp> = Box::new(app);
        let executor = ActionExecutor::new(app, NotesDir::new(dir.path()), sink);
        Fixture {
            dir,
            executor,
            app: handle,
            log,
        }
    }

    fn fixture() -> Fixture {
        let (app, handle) = RecordingApp::new();
        fixture_with(app, handle)
    }

    #[test]
    fn test_create_creates_file_and_opens_it() {
        let mut f = fixture();
        let path = f.dir.path().join("todo.txt");

        let outcome = f
            .executor
            .execute(ActionRequest::Create("todo".to_string()))
            .unwrap();

        assert_eq!(outcome, Outcome::Created(path.clone()));
        assert!(path.is_file());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        assert_eq!(f.app.calls(), vec![AppCall::Launch(Some(path.clone()))]);

        let state = f.executor.snapshot();
        assert!(state.is_open());
        assert_eq!(state.current_file(), Some(path.as_path()));
        assert_eq!(state.last_action(), LastAction::Create);
    }

    #[test]
    fn test_create_twice_reports_already_exists() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("todo".to_string()))
            .unwrap();
        std::fs::write(f.dir.path().join("todo.txt"), "keep me").unwrap();
        let before = f.executor.snapshot();

        let outcome = f
            .executor
            .execute(ActionRequest::Create("todo".to_string()))
            .unwrap();

        assert_eq!(outcome, Outcome::AlreadyExists(f.dir.path().join("todo.txt")));
        assert_eq!(f.executor.snapshot(), before);
        assert_eq!(f.app.calls().len(), 1, "no second launch");
        assert_eq!(
            std::fs::read_to_string(f.dir.path().join("todo.txt")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn test_create_existing_then_open_succeeds() {
        let mut f = fixture();
        let path = f.dir.path().join("todo.txt");
        std::fs::write(&path, "groceries").unwrap();

        let outcome = f
            .executor
            .execute(ActionRequest::Create("todo".to_string()))
            .unwrap();
        assert_eq!(outcome, Outcome::AlreadyExists(path.clone()));
        assert!(!f.executor.snapshot().is_open());

        let outcome = f
            .executor
            .execute(ActionRequest::Open("todo".to_string()))
            .unwrap();
        assert_eq!(outcome, Outcome::Opened(path.clone()));

        let state = f.executor.snapshot();
        assert!(state.is_open());
        assert_eq!(state.current_file(), Some(path.as_path()));
        assert_eq!(state.last_action(), LastAction::Open);
    }

    #[test]
    fn test_open_terminates_before_relaunch() {
        let mut f = fixture();
        std::fs::write(f.dir.path().join("a.txt"), "").unwrap();
        std::fs::write(f.dir.path().join("b.txt"), "").unwrap();

        f.executor
            .execute(ActionRequest::Open("a".to_string()))
            .unwrap();
        f.executor
            .execute(ActionRequest::Open("b".to_string()))
            .unwrap();

        assert_eq!(
            f.app.calls(),
            vec![
                AppCall::TerminateAll,
                AppCall::Launch(Some(f.dir.path().join("a.txt"))),
                AppCall::TerminateAll,
                AppCall::Launch(Some(f.dir.path().join("b.txt"))),
            ]
        );
        assert_eq!(
            f.executor.snapshot().current_file(),
            Some(f.dir.path().join("b.txt").as_path())
        );
    }

    #[test]
    fn test_open_missing_reports_not_found() {
        let mut f = fixture();
        let before = f.executor.snapshot();

        let outcome = f
            .executor
            .execute(ActionRequest::Open("ghost".to_string()))
            .unwrap();

        assert_eq!(outcome, Outcome::NotFound(f.dir.path().join("ghost.txt")));
        assert_eq!(f.executor.snapshot(), before);
        assert!(f.app.calls().is_empty());
        assert_eq!(
            f.log.entries(),
            vec!["File 'ghost.txt' does not exist! Please say another name."]
        );
    }

    #[test]
    fn test_save_with_nothing_open_is_a_no_op() {
        let mut f = fixture();
        let before = f.executor.snapshot();

        let outcome = f.executor.execute(ActionRequest::Save).unwrap();

        assert_eq!(outcome, Outcome::NothingOpen(Action::Save));
        assert_eq!(f.executor.snapshot(), before);
        assert!(f.app.calls().is_empty());
    }

    #[test]
    fn test_close_without_save_dictates_phrase() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("draft".to_string()))
            .unwrap();
        let before = f.executor.snapshot();

        let outcome = f.executor.execute(ActionRequest::Close).unwrap();

        assert_eq!(outcome, Outcome::CloseDeferred);
        assert_eq!(f.executor.snapshot(), before);
        assert_eq!(f.app.texts(), vec![CLOSE_FALLBACK_TEXT.to_string()]);
        assert!(f.app.is_running());
    }

    #[test]
    fn test_save_then_close() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("draft".to_string()))
            .unwrap();

        assert_eq!(f.executor.execute(ActionRequest::Save).unwrap(), Outcome::Saved);
        let state = f.executor.snapshot();
        assert!(state.is_open());
        assert_eq!(state.last_action(), LastAction::Save);

        assert_eq!(f.executor.execute(ActionRequest::Close).unwrap(), Outcome::Closed);
        let state = f.executor.snapshot();
        assert!(!state.is_open());
        assert!(state.current_file().is_none());
        assert_eq!(state.last_action(), LastAction::Close);
        assert_eq!(f.app.calls().last(), Some(&AppCall::TerminateAll));

        assert_eq!(
            f.executor.execute(ActionRequest::Close).unwrap(),
            Outcome::NothingOpen(Action::Close)
        );
    }

    #[test]
    fn test_literal_is_typed_without_open_document() {
        let mut f = fixture();

        let outcome = f
            .executor
            .execute(ActionRequest::Literal("hello world".to_string()))
            .unwrap();

        assert_eq!(outcome, Outcome::Typed("hello world".to_string()));
        assert_eq!(f.app.texts(), vec!["hello world"]);
        assert_eq!(f.executor.snapshot().last_action(), LastAction::None);
    }

    #[test]
    fn test_literal_keeps_last_action() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("draft".to_string()))
            .unwrap();
        f.executor.execute(ActionRequest::Save).unwrap();
        f.executor
            .execute(ActionRequest::Literal("more text".to_string()))
            .unwrap();

        assert_eq!(f.executor.snapshot().last_action(), LastAction::Save);
    }

    #[test]
    fn test_external_termination_resets_session() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("draft".to_string()))
            .unwrap();
        f.app.kill_externally();

        let outcome = f.executor.execute(ActionRequest::Save).unwrap();

        assert_eq!(outcome, Outcome::NothingOpen(Action::Save));
        let state = f.executor.snapshot();
        assert!(!state.is_open());
        assert!(state.current_file().is_none());
        assert_eq!(state.last_action(), LastAction::None);
        assert_eq!(
            f.log.entries(),
            vec![
                "Note 'draft.txt' created and opened successfully!".to_string(),
                format!("{}No note is open to save!", EDITOR_LOST_TEXT),
            ]
        );
    }

    #[test]
    fn test_external_termination_before_literal_is_one_event() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("draft".to_string()))
            .unwrap();
        f.app.kill_externally();

        f.executor
            .execute(ActionRequest::Literal("still talking".to_string()))
            .unwrap();
        f.executor
            .execute(ActionRequest::Literal("and more".to_string()))
            .unwrap();

        let entries = f.log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1], format!("{}Typed: still talking", EDITOR_LOST_TEXT));
        assert_eq!(entries[2], "Typed: and more");
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let mut f = fixture();
        for name in ["", "../escape", "nested/name"] {
            let outcome = f
                .executor
                .execute(ActionRequest::Create(name.to_string()))
                .unwrap();
            assert_eq!(outcome, Outcome::InvalidName(name.to_string()));
        }
        assert!(f.app.calls().is_empty());
        assert_eq!(std::fs::read_dir(f.dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_each_request_logs_one_event() {
        let mut f = fixture();
        f.executor
            .execute(ActionRequest::Create("todo".to_string()))
            .unwrap();
        f.executor.execute(ActionRequest::Close).unwrap();
        f.executor.execute(ActionRequest::Save).unwrap();
        f.executor.execute(ActionRequest::Close).unwrap();

        assert_eq!(
            f.log.entries(),
            vec![
                "Note 'todo.txt' created and opened successfully!",
                "Notes can only be closed after saving! Writing 'close notepad' instead.",
                "Note saved successfully.",
                "Note closed successfully!",
            ]
        );
    }

    #[test]
    fn test_launch_failure_is_reported_and_state_kept() {
        let (app, handle) = RecordingApp::failing_launch();
        let mut f = fixture_with(app, handle);

        let result = f
            .executor
            .execute(ActionRequest::Create("todo".to_string()));

        assert!(result.is_err());
        assert!(!f.executor.snapshot().is_open());
        assert!(!f.dir.path().join("todo.txt").exists());
        let entries = f.log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].starts_with("Error during create:"));

        let retry = f
            .executor
            .execute(ActionRequest::Create("todo".to_string()));
        assert!(retry.is_err(), "retry reaches the launch again");
        assert!(!f.log.entries()[1].contains("already exists"));
    }

    #[test]
    fn test_notes_dir_change_applies_to_next_request() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let notes_dir = NotesDir::new(first.path());
        let log: Arc<dyn LogSink> = Arc::new(LogBook::new());
        let (app, _handle) = RecordingApp::new();
        let mut executor = ActionExecutor::new(Box::new(app), notes_dir.clone(), log);

        notes_dir.set(second.path());
        executor
            .execute(ActionRequest::Create("moved".to_string()))
            .unwrap();

        assert!(second.path().join("moved.txt").is_file());
        assert!(!first.path().join("moved.txt").exists());
    }
}
