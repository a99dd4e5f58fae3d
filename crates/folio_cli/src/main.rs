//! `folio` command line front-end.
//!
//! Plays the request boundary of the catalog: parses arguments, authenticates
//! the acting editor, calls `folio_core` services and prints JSON or text.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use folio_core::service::entity_service;
use folio_core::{
    add_note, authenticate, entity_revisions, format_revision_text, init_logging, open_db,
    revision_view, Bbid, Connection, EntityKind, FolioConfig, SqliteEditorRepository,
};
use log::info;
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "folio", version)]
#[command(about = "Revisioned catalog of creators, works, editions and publishers")]
struct Cli {
    /// Catalog database file (overrides FOLIO_DB_PATH)
    #[arg(long, value_name = "PATH", global = true)]
    db: Option<PathBuf>,

    /// Log level (overrides FOLIO_LOG_LEVEL)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    /// Absolute directory for log files (overrides FOLIO_LOG_DIR)
    #[arg(long, value_name = "DIR", global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage editors
    #[command(subcommand)]
    Editor(EditorCommand),
    /// Create, edit, delete and inspect entities
    #[command(subcommand)]
    Entity(EntityCommand),
    /// Inspect revisions and discuss them
    #[command(subcommand)]
    Revision(RevisionCommand),
}

#[derive(Subcommand, Debug)]
enum EditorCommand {
    /// Register a new editor
    Add { name: String },
    /// List all editors
    List,
}

#[derive(Args, Debug)]
struct Acting {
    /// Id of the editor authoring the change
    #[arg(long, value_name = "ID")]
    editor: Option<i64>,
}

#[derive(Subcommand, Debug)]
enum EntityCommand {
    /// Create an entity from a JSON request body
    Create {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        #[command(flatten)]
        acting: Acting,
        /// JSON body file, `-` for stdin
        #[arg(long, value_name = "FILE", default_value = "-")]
        body: String,
    },
    /// Record an edit of an entity from a JSON request body
    Edit {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        bbid: Bbid,
        #[command(flatten)]
        acting: Acting,
        #[arg(long, value_name = "FILE", default_value = "-")]
        body: String,
    },
    /// Record the deletion of an entity
    Delete {
        bbid: Bbid,
        #[command(flatten)]
        acting: Acting,
        #[arg(long)]
        note: Option<String>,
    },
    /// Print the current state of an entity
    Show { bbid: Bbid },
    /// List the revisions of an entity, newest first
    Revisions { bbid: Bbid },
}

#[derive(Subcommand, Debug)]
enum RevisionCommand {
    /// Print the diff and notes of a revision
    Show {
        id: i64,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Append a note to a revision
    Note {
        id: i64,
        content: String,
        #[command(flatten)]
        acting: Acting,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = FolioConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).context("failed to start logging")?;
    }
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    let mut conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open {}", config.db_path.display()))?;

    match cli.command {
        Command::Editor(command) => run_editor(&conn, command),
        Command::Entity(command) => run_entity(&mut conn, command),
        Command::Revision(command) => run_revision(&mut conn, command),
    }
}

fn run_editor(conn: &Connection, command: EditorCommand) -> Result<()> {
    let editors = SqliteEditorRepository::new(conn);
    match command {
        EditorCommand::Add { name } => print_json(&editors.create_editor(name.trim())?),
        EditorCommand::List => print_json(&editors.list_editors()?),
    }
}

fn run_entity(conn: &mut Connection, command: EntityCommand) -> Result<()> {
    match command {
        EntityCommand::Create { kind, acting, body } => {
            let author = authenticate(conn, acting.editor)?;
            let body = read_body(&body)?;
            print_json(&entity_service::create_from_json(conn, &author, kind, &body)?)
        }
        EntityCommand::Edit {
            kind,
            bbid,
            acting,
            body,
        } => {
            let author = authenticate(conn, acting.editor)?;
            let body = read_body(&body)?;
            print_json(&entity_service::edit_from_json(
                conn, &author, kind, bbid, &body,
            )?)
        }
        EntityCommand::Delete { bbid, acting, note } => {
            let author = authenticate(conn, acting.editor)?;
            print_json(&entity_service::delete(conn, &author, bbid, note.as_deref())?)
        }
        EntityCommand::Show { bbid } => print_json(&entity_service::show_entity(conn, bbid)?),
        EntityCommand::Revisions { bbid } => print_json(&entity_revisions(conn, bbid)?),
    }
}

fn run_revision(conn: &mut Connection, command: RevisionCommand) -> Result<()> {
    match command {
        RevisionCommand::Show { id, json } => {
            let view = revision_view(conn, id)?;
            if json {
                print_json(&view)
            } else {
                print!("{}", format_revision_text(&view));
                Ok(())
            }
        }
        RevisionCommand::Note {
            id,
            content,
            acting,
        } => {
            let author = authenticate(conn, acting.editor)?;
            print_json(&add_note(conn, &author, id, &content)?)
        }
    }
}

fn parse_kind(value: &str) -> Result<EntityKind, String> {
    EntityKind::parse(value).ok_or_else(|| {
        format!("unknown entity kind `{value}`; expected creator|work|edition|publisher")
    })
}

fn read_body(source: &str) -> Result<serde_json::Value> {
    let text = if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("failed to read request body from stdin")?;
        text
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("failed to read request body from {source}"))?
    };
    serde_json::from_str(&text).context("request body is not valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{parse_kind, Cli};
    use clap::{CommandFactory, Parser};
    use folio_core::EntityKind;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn kind_argument_is_case_insensitive() {
        assert_eq!(parse_kind("Work"), Ok(EntityKind::Work));
        assert!(parse_kind("series").is_err());
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "folio",
            "entity",
            "delete",
            "0b8a6c2e-64a4-4b36-9b8e-8a3c1f1f0d9a",
            "--editor",
            "1",
            "--db",
            "/tmp/catalog.db",
        ])
        .unwrap();
        assert_eq!(cli.db.unwrap().to_str(), Some("/tmp/catalog.db"));
    }
}
