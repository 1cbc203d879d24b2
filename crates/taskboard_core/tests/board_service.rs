use rusqlite::{ffi, Connection};
use std::cell::Cell;
use taskboard_core::db::{open_db_in_memory, DbError};
use taskboard_core::{
    BoardError, BoardService, BoardServiceError, DragGesture, DropTarget, MoveOutcome, NewTask,
    NoOpReason, PositionWrite, Priority, SqliteTaskRepository, Stage, Task, TaskId, TaskPatch,
    TaskRepoError, TaskRepoResult, TaskRepository, TeamId,
};
use uuid::Uuid;

/// SQLite repository whose next position write fails with `SQLITE_BUSY`.
struct FlakyRepo<'conn> {
    inner: SqliteTaskRepository<'conn>,
    fail_next_write: Cell<bool>,
}

impl<'conn> FlakyRepo<'conn> {
    fn new(conn: &'conn Connection) -> Self {
        Self {
            inner: SqliteTaskRepository::try_new(conn).unwrap(),
            fail_next_write: Cell::new(false),
        }
    }
}

impl TaskRepository for FlakyRepo<'_> {
    fn create_task(&self, team_id: TeamId, request: &NewTask) -> TaskRepoResult<Task> {
        self.inner.create_task(team_id, request)
    }

    fn get_task(&self, task_id: TaskId) -> TaskRepoResult<Option<Task>> {
        self.inner.get_task(task_id)
    }

    fn list_team_tasks(&self, team_id: TeamId) -> TaskRepoResult<Vec<Task>> {
        self.inner.list_team_tasks(team_id)
    }

    fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> TaskRepoResult<Task> {
        self.inner.update_task(task_id, patch)
    }

    fn write_positions(&self, writes: &[PositionWrite]) -> TaskRepoResult<()> {
        if self.fail_next_write.replace(false) {
            let busy = rusqlite::Error::SqliteFailure(ffi::Error::new(ffi::SQLITE_BUSY), None);
            return Err(TaskRepoError::Db(DbError::Sqlite(busy)));
        }
        self.inner.write_positions(writes)
    }

    fn delete_task(&self, task_id: TaskId) -> TaskRepoResult<()> {
        self.inner.delete_task(task_id)
    }
}

fn seeded_service<'c>(
    conn: &'c Connection,
    titles: &[&str],
) -> (BoardService<FlakyRepo<'c>>, Vec<TaskId>) {
    let mut service = BoardService::open(FlakyRepo::new(conn), Uuid::new_v4()).unwrap();
    let ids = titles
        .iter()
        .map(|title| service.create_task(&NewTask::titled(*title)).unwrap().id)
        .collect();
    (service, ids)
}

fn durable_order(service: &BoardService<FlakyRepo<'_>>, stage: Stage) -> Vec<TaskId> {
    let mut tasks: Vec<Task> = service
        .repository()
        .list_team_tasks(service.team_id())
        .unwrap()
        .into_iter()
        .filter(|task| task.stage == stage)
        .collect();
    tasks.sort_by_key(|task| (task.rank, task.id));
    tasks.into_iter().map(|task| task.id).collect()
}

fn column(service: &BoardService<FlakyRepo<'_>>, stage: Stage) -> Vec<TaskId> {
    service.index().task_ids(stage).collect()
}

#[test]
fn created_tasks_append_to_their_stage() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, ids) = seeded_service(&conn, &["a", "b", "c"]);

    let mut active = NewTask::titled("d");
    active.stage = Stage::Active;
    let d = service.create_task(&active).unwrap();

    assert_eq!(column(&service, Stage::Backlog), ids);
    assert_eq!(column(&service, Stage::Active), vec![d.id]);
    assert_eq!(service.task(d.id).unwrap().title, "d");
}

#[test]
fn drop_persists_and_survives_reload() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b", "c"]);

    let outcome = service
        .drop_task(DragGesture::start(t[2]), Some(DropTarget::Task(t[0])))
        .unwrap();
    assert!(matches!(outcome, MoveOutcome::Applied(_)));

    let expected = vec![t[2], t[0], t[1]];
    assert_eq!(column(&service, Stage::Backlog), expected);
    assert_eq!(durable_order(&service, Stage::Backlog), expected);

    service.reload().unwrap();
    assert_eq!(column(&service, Stage::Backlog), expected);
}

#[test]
fn cross_stage_drop_updates_cached_task() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b"]);

    service
        .drop_task(DragGesture::start(t[1]), Some(DropTarget::Stage(Stage::Done)))
        .unwrap();

    let cached = service.task(t[1]).unwrap();
    assert_eq!((cached.stage, cached.rank), (Stage::Done, 0));
    let stored = service.repository().get_task(t[1]).unwrap().unwrap();
    assert_eq!((stored.stage, stored.rank), (Stage::Done, 0));
}

#[test]
fn failed_write_rolls_back_and_matches_durable_order() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b", "c"]);
    let before = service.index().clone();

    service.repository().fail_next_write.set(true);
    let err = service
        .drop_task(DragGesture::start(t[0]), Some(DropTarget::Task(t[2])))
        .unwrap_err();

    assert!(matches!(
        err,
        BoardServiceError::Board(BoardError::Persistence(_))
    ));
    assert!(err.is_retryable());
    assert_eq!(service.index(), &before);
    assert_eq!(
        column(&service, Stage::Backlog),
        durable_order(&service, Stage::Backlog)
    );
    assert_eq!(service.task(t[0]).unwrap().rank, 0);
}

#[test]
fn cancelled_gesture_is_skipped() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b"]);
    let before = service.index().clone();

    let outcome = service.apply(DragGesture::start(t[0]).cancel()).unwrap();
    assert_eq!(outcome, MoveOutcome::Skipped(NoOpReason::Cancelled));

    let outcome = service.drop_task(DragGesture::start(t[0]), None).unwrap();
    assert_eq!(outcome, MoveOutcome::Skipped(NoOpReason::NoTarget));
    assert_eq!(service.index(), &before);
}

#[test]
fn move_task_clamps_target_index() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b", "c"]);

    service.move_task(t[0], Stage::Backlog, 99).unwrap();
    assert_eq!(column(&service, Stage::Backlog), vec![t[1], t[2], t[0]]);

    service.move_task(t[1], Stage::Active, 5).unwrap();
    assert_eq!(column(&service, Stage::Active), vec![t[1]]);
}

#[test]
fn renumbering_is_written_in_one_batch() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b", "c", "d"]);

    let outcome = service.move_task(t[3], Stage::Backlog, 1).unwrap();
    let MoveOutcome::Applied(applied) = outcome else {
        panic!("expected applied move");
    };
    assert!(applied.renumbered);

    let expected = vec![t[0], t[3], t[1], t[2]];
    assert_eq!(column(&service, Stage::Backlog), expected);
    assert_eq!(durable_order(&service, Stage::Backlog), expected);
    let stored_ranks: Vec<i64> = expected
        .iter()
        .map(|id| service.repository().get_task(*id).unwrap().unwrap().rank)
        .collect();
    assert_eq!(stored_ranks, vec![0, 1, 2, 3]);
}

#[test]
fn deleting_tasks_is_tolerant_of_missing_ids() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b"]);

    assert!(service.delete_task(t[0]).unwrap());
    assert!(!service.delete_task(t[0]).unwrap());
    assert_eq!(column(&service, Stage::Backlog), vec![t[1]]);
    assert!(service.task(t[0]).is_none());

    // A gesture on a deleted task resolves to a no-op.
    let outcome = service
        .drop_task(DragGesture::start(t[0]), Some(DropTarget::Stage(Stage::Done)))
        .unwrap();
    assert_eq!(outcome, MoveOutcome::Skipped(NoOpReason::UnknownSource));
}

#[test]
fn reload_picks_up_writes_from_another_session() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b"]);

    let other = SqliteTaskRepository::try_new(&conn).unwrap();
    other
        .write_positions(&[PositionWrite {
            task_id: t[0],
            stage: Stage::Active,
            rank: 0,
        }])
        .unwrap();
    assert_eq!(column(&service, Stage::Active), Vec::<TaskId>::new());

    service.reload().unwrap();
    assert_eq!(column(&service, Stage::Active), vec![t[0]]);
    assert_eq!(service.task(t[0]).unwrap().stage, Stage::Active);
}

#[test]
fn columns_are_emitted_in_board_order() {
    let conn = open_db_in_memory().unwrap();
    let (service, t) = seeded_service(&conn, &["a"]);

    let columns: Vec<_> = service.columns().collect();
    assert_eq!(
        columns.iter().map(|c| c.stage).collect::<Vec<_>>(),
        vec![Stage::Backlog, Stage::Active, Stage::Done]
    );
    assert_eq!(columns[0].slots[0].task_id, t[0]);
    assert!(columns[1].slots.is_empty());
}

#[test]
fn editing_a_task_leaves_every_rank_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a", "b", "c"]);
    service.move_task(t[2], Stage::Backlog, 0).unwrap();
    let before = service.index().clone();
    let durable_before = durable_order(&service, Stage::Backlog);

    let patch = TaskPatch {
        title: Some("renamed".to_string()),
        priority: Some(Priority::High),
        ..TaskPatch::default()
    };
    let updated = service.update_task(t[1], &patch).unwrap();

    assert_eq!(updated.title, "renamed");
    assert_eq!(service.task(t[1]).unwrap(), &updated);
    assert_eq!(service.index(), &before);
    assert_eq!(durable_order(&service, Stage::Backlog), durable_before);

    service.reload().unwrap();
    assert_eq!(service.index(), &before);
    assert_eq!(service.task(t[1]).unwrap().priority, Priority::High);
}

#[test]
fn rejected_edit_keeps_cached_payload() {
    let conn = open_db_in_memory().unwrap();
    let (mut service, t) = seeded_service(&conn, &["a"]);

    let patch = TaskPatch {
        assignee: Some(Some(String::new())),
        ..TaskPatch::default()
    };
    let err = service.update_task(t[0], &patch).unwrap_err();

    assert!(matches!(err, BoardServiceError::Repo(TaskRepoError::Validation(_))));
    assert!(!err.is_retryable());
    assert_eq!(service.task(t[0]).unwrap().assignee, None);
}
