use folio_core::db::open_db_in_memory;
use folio_core::model::entity::CreatorProps;
use folio_core::repo::entity_repo::CreatorModel;
use folio_core::service::entity_service::{self, EntityForm};
use folio_core::service::revision_view::{ChangeKind, FieldChange};
use folio_core::{
    add_note, authenticate, format_revision_text, no_hook, revision_view, Alias,
    AuthenticatedEditor, Connection, EntityRequest, Identifier, ServiceError,
    SqliteEditorRepository, ValidationError,
};

fn setup() -> (Connection, AuthenticatedEditor, AuthenticatedEditor) {
    let conn = open_db_in_memory().unwrap();
    let editors = SqliteEditorRepository::new(&conn);
    let alice = editors.create_editor("alice").unwrap();
    let bob = editors.create_editor("bob").unwrap();
    let alice = authenticate(&conn, Some(alice.id)).unwrap();
    let bob = authenticate(&conn, Some(bob.id)).unwrap();
    (conn, alice, bob)
}

fn le_guin() -> EntityForm<CreatorProps> {
    EntityForm {
        request: EntityRequest {
            aliases: vec![Alias::new("Ursula K. Le Guin", "Le Guin, Ursula K.", Some(1)).as_default()],
            identifiers: vec![Identifier::new(3, "Q181659")],
            annotation: None,
            disambiguation: None,
            note: Some("new author".to_string()),
        },
        props: CreatorProps {
            creator_type: Some("Person".to_string()),
            gender: None,
            begin_year: Some(1929),
            end_year: None,
            ended: false,
        },
    }
}

fn change<'a>(changes: &'a [FieldChange], key: &str) -> &'a FieldChange {
    changes
        .iter()
        .find(|change| change.key == key)
        .unwrap_or_else(|| panic!("no change for {key}"))
}

#[test]
fn creation_revision_lists_every_set_field_as_new() {
    let (mut conn, alice, _) = setup();
    let created =
        entity_service::create::<CreatorModel, _>(&mut conn, &alice, &le_guin(), no_hook)
            .unwrap();

    let view = revision_view(&conn, created.revision_id).unwrap();

    assert_eq!(view.author.name, "alice");
    assert_eq!(view.diffs.len(), 1);
    let diff = &view.diffs[0];
    assert_eq!(diff.bbid, created.bbid);
    assert_eq!(diff.title, "Creator “Ursula K. Le Guin”");
    assert!(diff.changes.iter().all(|change| change.kind == ChangeKind::New));

    let aliases = change(&diff.changes, "Aliases");
    assert_eq!(
        aliases.rhs,
        vec!["Ursula K. Le Guin (Le Guin, Ursula K.) [English] primary".to_string()]
    );
    assert_eq!(
        change(&diff.changes, "Identifiers").rhs,
        vec!["Wikidata ID: Q181659".to_string()]
    );
    assert_eq!(change(&diff.changes, "Begin Year").rhs, vec!["1929".to_string()]);
    assert!(diff.changes.iter().all(|change| change.key != "Annotation"));

    assert_eq!(view.notes.len(), 1);
    assert_eq!(view.notes[0].note.content, "new author");
    assert_eq!(view.notes[0].author_name, "alice");
}

#[test]
fn edit_revision_diffs_against_the_previous_revision() {
    let (mut conn, alice, bob) = setup();
    let created =
        entity_service::create::<CreatorModel, _>(&mut conn, &alice, &le_guin(), no_hook)
            .unwrap();

    let mut form = le_guin();
    form.request.aliases = created.alias_set.aliases.clone();
    form.request.identifiers = created.identifier_set.identifiers.clone();
    form.request.annotation = Some("Author of Earthsea.".to_string());
    form.request.note = None;
    form.props.end_year = Some(2018);
    form.props.ended = true;
    let edited =
        entity_service::edit::<CreatorModel, _>(&mut conn, &bob, created.bbid, &form, no_hook)
            .unwrap();

    let view = revision_view(&conn, edited.revision_id).unwrap();
    assert_eq!(view.author.name, "bob");
    let changes = &view.diffs[0].changes;
    let keys: Vec<&str> = changes.iter().map(|change| change.key.as_str()).collect();
    assert_eq!(keys, vec!["Annotation", "End Year", "Ended"]);
    assert_eq!(change(changes, "End Year").kind, ChangeKind::New);
    assert_eq!(change(changes, "Annotation").rhs, vec!["Author of Earthsea.".to_string()]);
    assert!(view.notes.is_empty());

    let mut second = form.clone();
    second.props.creator_type = Some("Writer".to_string());
    second.request.annotation = None;
    let third =
        entity_service::edit::<CreatorModel, _>(&mut conn, &alice, created.bbid, &second, no_hook)
            .unwrap();
    let changes = revision_view(&conn, third.revision_id).unwrap().diffs[0]
        .changes
        .clone();
    let creator_type = change(&changes, "Type");
    assert_eq!(creator_type.kind, ChangeKind::Edited);
    assert_eq!(creator_type.lhs, vec!["Person".to_string()]);
    assert_eq!(creator_type.rhs, vec!["Writer".to_string()]);
    assert_eq!(change(&changes, "Annotation").kind, ChangeKind::Deleted);
}

#[test]
fn deletion_revision_marks_fields_deleted() {
    let (mut conn, alice, _) = setup();
    let created =
        entity_service::create::<CreatorModel, _>(&mut conn, &alice, &le_guin(), no_hook)
            .unwrap();
    let deleted = entity_service::delete(&mut conn, &alice, created.bbid, None).unwrap();

    let view = revision_view(&conn, deleted.revision_id).unwrap();
    let diff = &view.diffs[0];
    assert_eq!(diff.title, "Creator “Ursula K. Le Guin”");
    assert!(!diff.changes.is_empty());
    assert!(diff
        .changes
        .iter()
        .all(|change| change.kind == ChangeKind::Deleted && change.rhs.is_empty()));
}

#[test]
fn notes_can_be_appended_by_any_editor() {
    let (mut conn, alice, bob) = setup();
    let created =
        entity_service::create::<CreatorModel, _>(&mut conn, &alice, &le_guin(), no_hook)
            .unwrap();

    let note = add_note(&mut conn, &bob, created.revision_id, "  Source? ").unwrap();
    assert_eq!(note.content, "Source?");
    assert_eq!(note.author_id, bob.id());

    let view = revision_view(&conn, created.revision_id).unwrap();
    let authors: Vec<&str> = view
        .notes
        .iter()
        .map(|note| note.author_name.as_str())
        .collect();
    assert_eq!(authors, vec!["alice", "bob"]);

    let text = format_revision_text(&view);
    assert!(text.starts_with(&format!("Revision #{}", created.revision_id)));
    assert!(text.contains("N Aliases: — -> Ursula K. Le Guin"));
    assert!(text.contains("bob ("));
}

#[test]
fn blank_or_misdirected_notes_are_rejected() {
    let (mut conn, alice, _) = setup();
    let created =
        entity_service::create::<CreatorModel, _>(&mut conn, &alice, &le_guin(), no_hook)
            .unwrap();

    assert!(matches!(
        add_note(&mut conn, &alice, created.revision_id, " \n "),
        Err(ServiceError::Validation(ValidationError::BlankNote))
    ));
    assert!(matches!(
        add_note(&mut conn, &alice, 9_999, "hello"),
        Err(ServiceError::RevisionNotFound(9_999))
    ));
}

#[test]
fn revision_view_serializes_change_kinds_as_letters() {
    let (mut conn, alice, _) = setup();
    let created =
        entity_service::create::<CreatorModel, _>(&mut conn, &alice, &le_guin(), no_hook)
            .unwrap();

    let view = revision_view(&conn, created.revision_id).unwrap();
    let value = serde_json::to_value(&view).unwrap();
    assert_eq!(value["diffs"][0]["changes"][0]["kind"], "N");
    assert_eq!(value["diffs"][0]["type"], "Creator");
    assert_eq!(value["notes"][0]["authorName"], "alice");
    assert_eq!(value["revision"]["authorId"], alice.id());
}

#[test]
fn unknown_revision_is_reported() {
    let (conn, _, _) = setup();
    assert!(matches!(
        revision_view(&conn, 42),
        Err(ServiceError::RevisionNotFound(42))
    ));
}
