//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide durable create/read/update/delete APIs over the `tasks` table.
//! - Persist (stage, rank) positions written by the board engine.
//!
//! # Invariants
//! - Team listing is deterministic: `sort_rank ASC, task_uuid ASC`. Stage
//!   order is the board's concern, not the listing's.
//! - A new task is ranked last in its (team, stage) partition.
//! - `write_positions` applies every write or none of them.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::task::{
    NewTask, PositionWrite, Priority, Rank, Stage, Task, TaskId, TaskPatch, TaskValidationError,
    TeamId,
};
use log::{debug, info};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    task_uuid,
    team_uuid,
    stage,
    sort_rank,
    title,
    description,
    priority,
    assignee,
    created_at,
    updated_at
FROM tasks";

const REQUIRED_COLUMNS: [&str; 10] = [
    "task_uuid",
    "team_uuid",
    "stage",
    "sort_rank",
    "title",
    "description",
    "priority",
    "assignee",
    "created_at",
    "updated_at",
];

/// Result type used by task repository operations.
pub type TaskRepoResult<T> = Result<T, TaskRepoError>;

/// Errors from task repository operations.
#[derive(Debug)]
pub enum TaskRepoError {
    /// Payload rejected before persistence.
    Validation(TaskValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target task does not exist.
    TaskNotFound(TaskId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid task.
    InvalidData(String),
}

impl Display for TaskRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::TaskNotFound(id) => write!(f, "task not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "task repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "task repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "task repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted task data: {message}"),
        }
    }
}

impl Error for TaskRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for TaskRepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for TaskRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for TaskRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable task store.
///
/// This is the CRUD layer surrounding the board engine and the source of
/// truth on conflict.
pub trait TaskRepository {
    /// Creates one task ranked last in its initial stage.
    fn create_task(&self, team_id: TeamId, request: &NewTask) -> TaskRepoResult<Task>;
    /// Loads one task by id.
    fn get_task(&self, task_id: TaskId) -> TaskRepoResult<Option<Task>>;
    /// Lists every task of one team.
    fn list_team_tasks(&self, team_id: TeamId) -> TaskRepoResult<Vec<Task>>;
    /// Edits payload fields. Stage and rank are never touched.
    fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> TaskRepoResult<Task>;
    /// Writes (stage, rank) for each entry in one atomic unit.
    fn write_positions(&self, writes: &[PositionWrite]) -> TaskRepoResult<()>;
    /// Hard-deletes one task.
    fn delete_task(&self, task_id: TaskId) -> TaskRepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> TaskRepoResult<Self> {
        ensure_task_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, team_id: TeamId, request: &NewTask) -> TaskRepoResult<Task> {
        let request = request.normalized()?;
        let task_id = Uuid::new_v4();

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let rank = next_rank(&tx, team_id, request.stage)?;
        tx.execute(
            "INSERT INTO tasks (
                task_uuid,
                team_uuid,
                stage,
                sort_rank,
                title,
                description,
                priority,
                assignee
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                task_id.to_string(),
                team_id.to_string(),
                request.stage.as_str(),
                rank,
                request.title.as_str(),
                request.description.as_deref(),
                request.priority.as_str(),
                request.assignee.as_deref(),
            ],
        )?;
        let task = load_required_task(&tx, task_id)?;
        tx.commit()?;

        info!(
            "event=task_create module=repo status=ok stage={} rank={rank}",
            task.stage
        );
        Ok(task)
    }

    fn get_task(&self, task_id: TaskId) -> TaskRepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE task_uuid = ?1;"))?;
        let mut rows = stmt.query([task_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn list_team_tasks(&self, team_id: TeamId) -> TaskRepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE team_uuid = ?1
             ORDER BY sort_rank ASC, task_uuid ASC;"
        ))?;
        let mut rows = stmt.query([team_id.to_string()])?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        Ok(tasks)
    }

    fn update_task(&self, task_id: TaskId, patch: &TaskPatch) -> TaskRepoResult<Task> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut task = load_required_task(&tx, task_id)?;
        if patch.is_empty() {
            return Ok(task);
        }
        patch.apply_to(&mut task)?;

        tx.execute(
            "UPDATE tasks
             SET title = ?2,
                 description = ?3,
                 priority = ?4,
                 assignee = ?5,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE task_uuid = ?1;",
            params![
                task_id.to_string(),
                task.title.as_str(),
                task.description.as_deref(),
                task.priority.as_str(),
                task.assignee.as_deref(),
            ],
        )?;
        let task = load_required_task(&tx, task_id)?;
        tx.commit()?;

        info!("event=task_update module=repo status=ok");
        Ok(task)
    }

    fn write_positions(&self, writes: &[PositionWrite]) -> TaskRepoResult<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(
                "UPDATE tasks
                 SET stage = ?2,
                     sort_rank = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE task_uuid = ?1;",
            )?;
            for write in writes {
                let changed = stmt.execute(params![
                    write.task_id.to_string(),
                    write.stage.as_str(),
                    write.rank,
                ])?;
                if changed == 0 {
                    // Dropping `tx` unwinds the earlier writes.
                    return Err(TaskRepoError::TaskNotFound(write.task_id));
                }
            }
        }
        tx.commit()?;

        debug!(
            "event=positions_write module=repo status=ok count={}",
            writes.len()
        );
        Ok(())
    }

    fn delete_task(&self, task_id: TaskId) -> TaskRepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE task_uuid = ?1;", [task_id.to_string()])?;
        if changed == 0 {
            return Err(TaskRepoError::TaskNotFound(task_id));
        }
        info!("event=task_delete module=repo status=ok");
        Ok(())
    }
}

fn next_rank(conn: &Connection, team_id: TeamId, stage: Stage) -> TaskRepoResult<Rank> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(sort_rank), -1) + 1
         FROM tasks
         WHERE team_uuid = ?1
           AND stage = ?2;",
        params![team_id.to_string(), stage.as_str()],
        |row| row.get(0),
    )?;
    Ok(next)
}

fn load_required_task(conn: &Connection, task_id: TaskId) -> TaskRepoResult<Task> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE task_uuid = ?1;"))?;
    let mut rows = stmt.query([task_id.to_string()])?;
    if let Some(row) = rows.next()? {
        return parse_task_row(row);
    }
    Err(TaskRepoError::TaskNotFound(task_id))
}

fn parse_task_row(row: &Row<'_>) -> TaskRepoResult<Task> {
    let task_uuid_text: String = row.get("task_uuid")?;
    let team_uuid_text: String = row.get("team_uuid")?;

    let stage_text: String = row.get("stage")?;
    let stage = Stage::parse(&stage_text).ok_or_else(|| {
        TaskRepoError::InvalidData(format!("invalid stage `{stage_text}` in tasks.stage"))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        TaskRepoError::InvalidData(format!(
            "invalid priority `{priority_text}` in tasks.priority"
        ))
    })?;

    let task = Task {
        id: parse_uuid(&task_uuid_text, "tasks.task_uuid")?,
        team_id: parse_uuid(&team_uuid_text, "tasks.team_uuid")?,
        stage,
        rank: row.get("sort_rank")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority,
        assignee: row.get("assignee")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    task.validate()?;
    Ok(task)
}

fn parse_uuid(value: &str, column: &'static str) -> TaskRepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| TaskRepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_task_connection_ready(conn: &Connection) -> TaskRepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(TaskRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "tasks")? {
        return Err(TaskRepoError::MissingRequiredTable("tasks"));
    }

    let columns = table_columns(conn, "tasks")?;
    if let Some(column) = REQUIRED_COLUMNS
        .into_iter()
        .find(|column| !columns.iter().any(|current| current == column))
    {
        return Err(TaskRepoError::MissingRequiredColumn {
            table: "tasks",
            column,
        });
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> TaskRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> TaskRepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get(1)?);
    }
    Ok(columns)
}
