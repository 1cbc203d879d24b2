//! Task board command-line entry point.
//!
//! # Responsibility
//! - Expose board operations (create, edit, list, drop, move, delete) over
//!   one SQLite database file.
//! - Keep output deterministic: plain lines by default, JSON on request.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;
use taskboard_core::db::open_db;
use taskboard_core::{
    default_log_level, init_logging, BoardService, DragGesture, DropTarget, MoveOutcome, NewTask,
    Priority, Rank, SqliteTaskRepository, Stage, TaskId, TaskPatch, TeamId,
};

#[derive(Parser)]
#[command(name = "taskboard")]
#[command(about = "Team task board: ordering and stage transitions", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "TASKBOARD_DB", default_value = "taskboard.db")]
    db: PathBuf,

    /// Directory for rolling log files; logging is off when omitted
    #[arg(long, env = "TASKBOARD_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TASKBOARD_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TeamArgs {
    /// Team whose board is opened
    #[arg(long)]
    team: TeamId,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task, ranked last in its stage
    Add {
        #[command(flatten)]
        board: TeamArgs,
        #[arg(long)]
        title: String,
        #[arg(long, value_parser = parse_stage, default_value = "backlog")]
        stage: Stage,
        #[arg(long, value_parser = parse_priority, default_value = "medium")]
        priority: Priority,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        assignee: Option<String>,
    },

    /// Edit a task's title, description, priority or assignee in place
    Edit {
        #[command(flatten)]
        board: TeamArgs,
        task: TaskId,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, value_parser = parse_priority)]
        priority: Option<Priority>,
        #[arg(long, conflicts_with = "clear_assignee")]
        assignee: Option<String>,
        #[arg(long)]
        clear_assignee: bool,
    },

    /// Print the board, one column per stage
    Board {
        #[command(flatten)]
        board: TeamArgs,
        /// Emit JSON instead of plain lines
        #[arg(long)]
        json: bool,
    },

    /// Drop a task onto a column or another task
    Drop {
        #[command(flatten)]
        board: TeamArgs,
        task: TaskId,
        /// Stage id (backlog, active, done, or a legacy column id) or task uuid
        target: String,
    },

    /// Move a task to an explicit stage and position
    Move {
        #[command(flatten)]
        board: TeamArgs,
        task: TaskId,
        #[arg(value_parser = parse_stage)]
        stage: Stage,
        index: usize,
    },

    /// Delete a task
    Delete {
        #[command(flatten)]
        board: TeamArgs,
        task: TaskId,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Edit { .. } => "edit",
            Self::Board { .. } => "board",
            Self::Drop { .. } => "drop",
            Self::Move { .. } => "move",
            Self::Delete { .. } => "delete",
        }
    }
}

#[derive(Serialize)]
struct BoardView {
    team_id: TeamId,
    columns: Vec<ColumnView>,
}

#[derive(Serialize)]
struct ColumnView {
    stage: Stage,
    tasks: Vec<CardView>,
}

#[derive(Serialize)]
struct CardView {
    id: TaskId,
    rank: Rank,
    title: String,
    priority: Priority,
    assignee: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = &cli.log_dir {
        let log_dir = std::path::absolute(log_dir)
            .with_context(|| format!("cannot resolve log dir `{}`", log_dir.display()))?;
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, &log_dir)?;
    }

    let conn = open_db(&cli.db)
        .with_context(|| format!("cannot open database `{}`", cli.db.display()))?;
    let repo = SqliteTaskRepository::try_new(&conn)?;
    info!(
        "event=cli_command module=cli status=start command={}",
        cli.command.name()
    );

    match cli.command {
        Commands::Add {
            board,
            title,
            stage,
            priority,
            description,
            assignee,
        } => {
            let mut service = BoardService::open(repo, board.team)?;
            let request = NewTask {
                title,
                description,
                priority,
                stage,
                assignee,
            };
            let task = service.create_task(&request)?;
            println!("created {} stage={} rank={}", task.id, task.stage, task.rank);
        }
        Commands::Edit {
            board,
            task,
            title,
            description,
            clear_description,
            priority,
            assignee,
            clear_assignee,
        } => {
            let patch = TaskPatch {
                title,
                description: optional_field(description, clear_description),
                priority,
                assignee: optional_field(assignee, clear_assignee),
            };
            let mut service = BoardService::open(repo, board.team)?;
            let task = service.update_task(task, &patch)?;
            println!("updated {} stage={} rank={}", task.id, task.stage, task.rank);
        }
        Commands::Board { board, json } => {
            let service = BoardService::open(repo, board.team)?;
            let view = board_view(&service);
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_board(&view);
            }
        }
        Commands::Drop {
            board,
            task,
            target,
        } => {
            let target = DropTarget::parse(&target)
                .ok_or_else(|| anyhow!("`{target}` is neither a stage nor a task id"))?;
            let mut service = BoardService::open(repo, board.team)?;
            let outcome = service.drop_task(DragGesture::start(task), Some(target))?;
            print_outcome(&outcome);
        }
        Commands::Move {
            board,
            task,
            stage,
            index,
        } => {
            let mut service = BoardService::open(repo, board.team)?;
            let outcome = service.move_task(task, stage, index)?;
            print_outcome(&outcome);
        }
        Commands::Delete { board, task } => {
            let mut service = BoardService::open(repo, board.team)?;
            if service.delete_task(task)? {
                println!("deleted {task}");
            } else {
                println!("no task {task}");
            }
        }
    }

    Ok(())
}

fn board_view(service: &BoardService<SqliteTaskRepository<'_>>) -> BoardView {
    let columns = service
        .columns()
        .map(|column| ColumnView {
            stage: column.stage,
            tasks: column
                .slots
                .iter()
                .filter_map(|slot| service.task(slot.task_id))
                .map(|task| CardView {
                    id: task.id,
                    rank: task.rank,
                    title: task.title.clone(),
                    priority: task.priority,
                    assignee: task.assignee.clone(),
                })
                .collect(),
        })
        .collect();
    BoardView {
        team_id: service.team_id(),
        columns,
    }
}

fn print_board(view: &BoardView) {
    for column in &view.columns {
        println!("[{}] {}", column.stage, column.tasks.len());
        for card in &column.tasks {
            let assignee = card.assignee.as_deref().unwrap_or("-");
            println!(
                "  {:>4}  {}  {:<6} {:<12} {}",
                card.rank, card.id, card.priority, assignee, card.title
            );
        }
    }
}

fn print_outcome(outcome: &MoveOutcome) {
    match outcome {
        MoveOutcome::Applied(applied) => println!(
            "moved {} {} -> {} index={} rank={} renumbered={} writes={}",
            applied.task_id,
            applied.from,
            applied.stage,
            applied.index,
            applied.rank,
            applied.renumbered,
            applied.writes.len()
        ),
        MoveOutcome::Skipped(reason) => println!("unchanged reason={}", reason.as_str()),
    }
}

/// `Some(None)` clears the field; `None` leaves it as stored.
fn optional_field(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

fn parse_stage(value: &str) -> Result<Stage, String> {
    Stage::parse(value).ok_or_else(|| format!("unknown stage `{value}`"))
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    Priority::parse(value).ok_or_else(|| format!("unknown priority `{value}`"))
}
