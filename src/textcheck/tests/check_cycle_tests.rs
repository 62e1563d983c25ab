use async_trait::async_trait;
use futures::channel::oneshot;
use futures::executor::{block_on, LocalPool};
use futures::task::LocalSpawnExt;
use std::cell::RefCell;
use std::rc::Rc;

use crate::textcheck::driver::{TextCheckBackend, TextCheckDriver};
use crate::textcheck::error::TextCheckError;
use crate::textcheck::interaction::DecisionOption;
use crate::textcheck::orchestrator::CheckOutcome;
use crate::textcheck::response::{CheckRequest, CheckResponse};
use crate::textcheck::scope::IgnoreDecision;
use crate::textcheck::session::TextCheckSession;
use crate::textcheck::types::{Category, IgnoreState, Match, MatchId};
use pretty_assertions::assert_eq;

use super::{felher_response, TEXT};

type CheckReply = Result<CheckResponse, TextCheckError>;

/// Backend whose calls stay pending until the test answers them
#[derive(Default)]
struct DeferredBackend {
    checks: RefCell<Vec<oneshot::Sender<CheckReply>>>,
    persists: RefCell<Vec<oneshot::Sender<Result<(), TextCheckError>>>>,
    persisted: RefCell<Vec<IgnoreDecision>>,
}

#[async_trait(?Send)]
impl TextCheckBackend for DeferredBackend {
    async fn check(&self, _request: CheckRequest) -> CheckReply {
        let (tx, rx) = oneshot::channel();
        self.checks.borrow_mut().push(tx);
        rx.await
            .map_err(|_| TextCheckError::CheckFailed("backend went away".into()))?
    }

    async fn persist(&self, decision: IgnoreDecision) -> Result<(), TextCheckError> {
        let (tx, rx) = oneshot::channel();
        self.persists.borrow_mut().push(tx);
        rx.await
            .map_err(|_| TextCheckError::PersistFailed("backend went away".into()))??;
        self.persisted.borrow_mut().push(decision);
        Ok(())
    }
}

fn headnote() -> Category {
    Category::from("headnote")
}

fn response_with(ids_offsets: &[(u32, usize)]) -> CheckResponse {
    let matches = ids_offsets
        .iter()
        .map(|(id, offset)| serde_json::json!({ "id": id, "word": "felher", "offset": offset, "length": 6 }))
        .collect::<Vec<_>>();
    serde_json::from_value(serde_json::json!({ "matches": matches })).unwrap()
}

fn take_checks(driver: &TextCheckDriver<DeferredBackend>) -> Vec<oneshot::Sender<CheckReply>> {
    driver.backend().checks.borrow_mut().drain(..).collect()
}

fn states(session: &TextCheckSession) -> Vec<IgnoreState> {
    session.matches(&headnote()).iter().map(|m| m.ignore_state).collect()
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_only_latest_requested_check_is_applied() {
    let driver = Rc::new(TextCheckDriver::new(TextCheckSession::default(), DeferredBackend::default()));
    let outcomes = Rc::new(RefCell::new(Vec::new()));
    let mut pool = LocalPool::new();
    let spawner = pool.spawner();

    for label in ["first", "second"] {
        let driver = Rc::clone(&driver);
        let outcomes = Rc::clone(&outcomes);
        spawner
            .spawn_local(async move {
                let outcome = driver.run_check(&headnote(), TEXT).await.unwrap();
                outcomes.borrow_mut().push((label, outcome));
            })
            .unwrap();
    }
    pool.run_until_stalled();

    let mut pending = take_checks(&driver).into_iter();
    let first = pending.next().unwrap();
    let second = pending.next().unwrap();
    assert!(driver.session().is_busy(&headnote()));

    second.send(Ok(response_with(&[(7, 40)]))).unwrap();
    pool.run_until_stalled();
    assert!(!driver.session().is_busy(&headnote()));

    first.send(Ok(response_with(&[(1, 12), (2, 40)]))).unwrap();
    pool.run_until_stalled();

    assert_eq!(
        *outcomes.borrow(),
        vec![("second", CheckOutcome::Applied { matches: 1 }), ("first", CheckOutcome::Stale)]
    );
    let session = driver.session();
    assert_eq!(session.matches(&headnote()).len(), 1);
    assert_eq!(session.matches(&headnote())[0].id, MatchId(7));
    assert_eq!(session.stats().stale_discarded, 1);
}

#[test]
fn test_document_switch_discards_in_flight_result() {
    let driver = Rc::new(TextCheckDriver::new(TextCheckSession::default(), DeferredBackend::default()));
    driver.session_mut().set_document(Some("KORE600500000".into()));
    let mut pool = LocalPool::new();

    let task_driver = Rc::clone(&driver);
    pool.spawner()
        .spawn_local(async move {
            task_driver.run_check(&headnote(), TEXT).await.unwrap();
        })
        .unwrap();
    pool.run_until_stalled();

    driver.session_mut().set_document(Some("KORE600500001".into()));
    let reply = take_checks(&driver).pop().unwrap();
    reply.send(Ok(response_with(&[(1, 12)]))).unwrap();
    pool.run_until_stalled();

    assert!(driver.session().marks(&headnote()).is_empty());
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn test_check_waits_for_persistence_in_flight() {
    let driver = Rc::new(TextCheckDriver::new(TextCheckSession::default(), DeferredBackend::default()));
    {
        let mut session = driver.session_mut();
        session.replace_category(
            &headnote(),
            vec![
                Match::new(1, "felher", "headnote", 12),
                Match::new(2, "felher", "headnote", 40),
            ],
            TEXT,
        );
        session.handle_mark_click(MatchId(1), &headnote()).unwrap();
        session.confirm(&DecisionOption::IgnoreOnce).unwrap();
    }

    let mut pool = LocalPool::new();
    let spawner = pool.spawner();
    let flushing = Rc::clone(&driver);
    spawner
        .spawn_local(async move {
            flushing.flush_decisions().await;
        })
        .unwrap();
    let checking = Rc::clone(&driver);
    spawner
        .spawn_local(async move {
            checking.run_check(&headnote(), TEXT).await.unwrap();
        })
        .unwrap();
    pool.run_until_stalled();

    // the check is held back until the decision is stored
    assert!(driver.backend().checks.borrow().is_empty());
    let persist = driver.backend().persists.borrow_mut().pop().unwrap();
    persist.send(Ok(())).unwrap();
    pool.run_until_stalled();

    assert_eq!(driver.backend().persisted.borrow().len(), 1);
    assert_eq!(driver.backend().checks.borrow().len(), 1);
}

#[test]
fn test_failed_persistence_keeps_local_state() {
    let driver = Rc::new(TextCheckDriver::new(TextCheckSession::default(), DeferredBackend::default()));
    {
        let mut session = driver.session_mut();
        session.replace_category(&headnote(), vec![Match::new(1, "felher", "headnote", 12)], TEXT);
        session.handle_mark_click(MatchId(1), &headnote()).unwrap();
        session.confirm(&DecisionOption::AddToDictionary).unwrap();
    }

    let mut pool = LocalPool::new();
    let flushing = Rc::clone(&driver);
    pool.spawner()
        .spawn_local(async move {
            flushing.flush_decisions().await;
        })
        .unwrap();
    pool.run_until_stalled();

    let persist = driver.backend().persists.borrow_mut().pop().unwrap();
    persist
        .send(Err(TextCheckError::PersistFailed("500 Internal Server Error".into())))
        .unwrap();
    pool.run_until_stalled();

    let mut session = driver.session_mut();
    assert_eq!(states(&session), vec![IgnoreState::IgnoredGlobally]);
    assert_eq!(session.pending_decisions(), 0);
    let notices = session.take_notices();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("felher"));
}

// ============================================================================
// Re-check scenario
// ============================================================================

#[test]
fn test_ignore_once_survives_recheck() {
    #[derive(Default)]
    struct ServerWithMemory {
        ignored_once: RefCell<bool>,
    }

    #[async_trait(?Send)]
    impl TextCheckBackend for ServerWithMemory {
        async fn check(&self, _request: CheckRequest) -> CheckReply {
            Ok(felher_response(*self.ignored_once.borrow()))
        }

        async fn persist(&self, _decision: IgnoreDecision) -> Result<(), TextCheckError> {
            *self.ignored_once.borrow_mut() = true;
            Ok(())
        }
    }

    let driver = TextCheckDriver::new(TextCheckSession::default(), ServerWithMemory::default());

    block_on(driver.run_check(&headnote(), TEXT)).unwrap();
    assert_eq!(states(&driver.session()), vec![IgnoreState::None, IgnoreState::None]);

    {
        let mut session = driver.session_mut();
        session.handle_mark_click(MatchId(1), &headnote()).unwrap();
        session.confirm(&DecisionOption::IgnoreOnce).unwrap();
    }
    assert_eq!(states(&driver.session()), vec![IgnoreState::IgnoredOnce, IgnoreState::None]);

    let outcome = block_on(driver.run_check(&headnote(), TEXT)).unwrap();

    assert_eq!(outcome, CheckOutcome::Applied { matches: 2 });
    let session = driver.session();
    assert_eq!(states(&session), vec![IgnoreState::IgnoredOnce, IgnoreState::None]);
    let marks = session.marks(&headnote());
    assert_eq!((marks[0].from, marks[0].to), (12, 18));
    assert_eq!((marks[1].from, marks[1].to), (40, 46));
    assert!(marks[0].ignored && !marks[1].ignored);
    assert_eq!(marks[0].issue_type, "misspelling");
}

// ============================================================================
// Responses arriving around user decisions
// ============================================================================

fn spawn_check(pool: &LocalPool, driver: &Rc<TextCheckDriver<DeferredBackend>>) {
    let driver = Rc::clone(driver);
    pool.spawner()
        .spawn_local(async move {
            driver.run_check(&headnote(), TEXT).await.unwrap();
        })
        .unwrap();
}

fn checked_driver() -> Rc<TextCheckDriver<DeferredBackend>> {
    let driver = Rc::new(TextCheckDriver::new(TextCheckSession::default(), DeferredBackend::default()));
    driver.session_mut().replace_category(
        &headnote(),
        vec![
            Match::new(1, "felher", "headnote", 12),
            Match::new(2, "felher", "headnote", 40),
        ],
        TEXT,
    );
    driver
}

#[test]
fn test_new_snapshot_closes_surface_on_renumbered_id() {
    let driver = checked_driver();
    driver.session_mut().handle_mark_click(MatchId(1), &headnote()).unwrap();

    let mut pool = LocalPool::new();
    spawn_check(&pool, &driver);
    pool.run_until_stalled();

    // id 1 now names "zweiter", the clicked "felher" became id 2
    let response: CheckResponse = serde_json::from_value(serde_json::json!({ "matches": [
        { "id": 1, "word": "zweiter", "offset": 32, "length": 7 },
        { "id": 2, "word": "felher", "offset": 12, "length": 6 },
        { "id": 3, "word": "felher", "offset": 40, "length": 6 },
    ] }))
    .unwrap();
    take_checks(&driver).pop().unwrap().send(Ok(response)).unwrap();
    pool.run_until_stalled();

    let mut session = driver.session_mut();
    assert!(session.decision_surface().is_none());
    assert_eq!(
        session.confirm(&DecisionOption::IgnoreOnce).unwrap_err(),
        TextCheckError::NoDecisionOpen
    );
    assert_eq!(states(&session), vec![IgnoreState::None; 3]);
    assert_eq!(session.pending_decisions(), 0);
}

#[test]
fn test_pending_global_decision_survives_older_response() {
    let driver = checked_driver();
    let mut pool = LocalPool::new();
    spawn_check(&pool, &driver);
    pool.run_until_stalled();

    {
        let mut session = driver.session_mut();
        session.handle_mark_click(MatchId(1), &headnote()).unwrap();
        session.confirm(&DecisionOption::AddToDictionary).unwrap();
    }

    // the server answers from before the dictionary entry existed
    take_checks(&driver).pop().unwrap().send(Ok(response_with(&[(1, 12), (2, 40)]))).unwrap();
    pool.run_until_stalled();

    let session = driver.session();
    assert_eq!(states(&session), vec![IgnoreState::IgnoredGlobally; 2]);
    assert_eq!(session.pending_decisions(), 1);
}

#[test]
fn test_pending_once_decision_follows_its_span_after_renumbering() {
    let driver = checked_driver();
    let mut pool = LocalPool::new();
    spawn_check(&pool, &driver);
    pool.run_until_stalled();

    {
        let mut session = driver.session_mut();
        session.handle_mark_click(MatchId(2), &headnote()).unwrap();
        session.confirm(&DecisionOption::IgnoreOnce).unwrap();
    }

    take_checks(&driver).pop().unwrap().send(Ok(response_with(&[(5, 12), (6, 40)]))).unwrap();
    pool.run_until_stalled();

    let session = driver.session();
    let ids: Vec<MatchId> = session.matches(&headnote()).iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![MatchId(5), MatchId(6)]);
    assert_eq!(states(&session), vec![IgnoreState::None, IgnoreState::IgnoredOnce]);
}
