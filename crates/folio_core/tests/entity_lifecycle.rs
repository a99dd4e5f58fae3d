use folio_core::db::open_db_in_memory;
use folio_core::model::entity::{EntityRow, WorkProps};
use folio_core::repo::entity_repo::{current_entity_revision, CreatorModel, WorkModel};
use folio_core::service::entity_service::{self, EntityForm};
use folio_core::{
    authenticate, entity_revisions, no_hook, Alias, AuthenticatedEditor, Connection,
    EntityRequest, Identifier, ServiceError, ServiceResult, SessionError,
    SqliteEditorRepository, ValidationError,
};
use rusqlite::Transaction;
use serde_json::json;

fn setup() -> (Connection, AuthenticatedEditor) {
    let conn = open_db_in_memory().unwrap();
    let editor = SqliteEditorRepository::new(&conn)
        .create_editor("alice")
        .unwrap();
    let author = authenticate(&conn, Some(editor.id)).unwrap();
    (conn, author)
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| row.get(0))
        .unwrap()
}

fn dune_form() -> EntityForm<WorkProps> {
    EntityForm {
        request: EntityRequest {
            aliases: vec![Alias::new("Dune", "Dune", Some(1)).as_default()],
            identifiers: vec![Identifier::new(3, "Q190192")],
            annotation: Some("Science fiction novel.".to_string()),
            disambiguation: Some("1965 novel".to_string()),
            note: Some("initial import".to_string()),
        },
        props: WorkProps {
            work_type: Some("Novel".to_string()),
            language_id: Some(1),
        },
    }
}

fn counters(conn: &Connection, author: &AuthenticatedEditor) -> (i64, i64) {
    let editor = SqliteEditorRepository::new(conn)
        .get_editor(author.id())
        .unwrap()
        .unwrap();
    (editor.total_revisions, editor.revisions_applied)
}

fn failing_hook(tx: &Transaction<'_>, _row: &EntityRow) -> ServiceResult<()> {
    tx.execute("INSERT INTO relationship_sets DEFAULT VALUES;", [])?;
    Err(ServiceError::InconsistentState("hook refused the entity"))
}

#[test]
fn creating_a_work_writes_one_complete_revision() {
    let (mut conn, author) = setup();

    let state =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();

    assert_eq!(state.title(), "Work “Dune”");
    assert_eq!(state.default_alias.as_ref().unwrap().name, "Dune");
    assert_eq!(state.identifier_set.identifiers.len(), 1);
    assert_eq!(
        state.annotation.as_ref().unwrap().last_revision_id,
        state.revision_id
    );
    assert_eq!(
        state.disambiguation.as_ref().unwrap().comment,
        "1965 novel"
    );
    assert_eq!(state.props.work_type.as_deref(), Some("Novel"));

    let current = current_entity_revision(&conn, state.bbid).unwrap().unwrap();
    assert_eq!(current.revision_id, state.revision_id);
    assert_eq!(current.data_id, Some(state.data_id));
    assert_eq!(counters(&conn, &author), (1, 1));
    assert_eq!(count(&conn, "notes"), 1);
    assert_eq!(entity_revisions(&conn, state.bbid).unwrap().len(), 1);
}

#[test]
fn creation_with_no_identifiers_gets_an_empty_set() {
    let (mut conn, author) = setup();
    let mut form = dune_form();
    form.request.identifiers.clear();

    let state = entity_service::create::<WorkModel, _>(&mut conn, &author, &form, no_hook).unwrap();

    assert!(state.identifier_set.identifiers.is_empty());
    assert_eq!(count(&conn, "identifier_sets"), 1);
}

#[test]
fn blank_note_is_not_stored() {
    let (mut conn, author) = setup();
    let mut form = dune_form();
    form.request.note = Some("   ".to_string());

    entity_service::create::<WorkModel, _>(&mut conn, &author, &form, no_hook).unwrap();

    assert_eq!(count(&conn, "notes"), 0);
    assert_eq!(count(&conn, "revisions"), 1);
}

#[test]
fn failing_hook_rolls_back_the_whole_revision() {
    let (mut conn, author) = setup();
    let tables = [
        "revisions",
        "notes",
        "entities",
        "entity_revisions",
        "entity_headers",
        "alias_sets",
        "aliases",
        "identifier_sets",
        "identifiers",
        "annotations",
        "disambiguations",
        "relationship_sets",
        "work_data",
    ];

    let result =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), failing_hook);

    assert!(matches!(result, Err(ServiceError::InconsistentState(_))));
    for table in tables {
        assert_eq!(count(&conn, table), 0, "{table} kept rows");
    }
    assert_eq!(counters(&conn, &author), (0, 0));
}

#[test]
fn edit_with_identical_aliases_keeps_the_alias_set() {
    let (mut conn, author) = setup();
    let created =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();

    let mut form = dune_form();
    form.request.aliases = created.alias_set.aliases.clone();
    form.request.identifiers = created.identifier_set.identifiers.clone();
    form.request.note = None;
    form.props.work_type = Some("Epic".to_string());

    let edited =
        entity_service::edit::<WorkModel, _>(&mut conn, &author, created.bbid, &form, no_hook)
            .unwrap();

    assert_ne!(edited.revision_id, created.revision_id);
    assert_ne!(edited.data_id, created.data_id);
    assert_eq!(edited.alias_set.id, created.alias_set.id);
    assert_eq!(edited.identifier_set.id, created.identifier_set.id);
    assert_eq!(edited.annotation, created.annotation);
    assert_eq!(edited.props.work_type.as_deref(), Some("Epic"));
    assert_eq!(counters(&conn, &author), (2, 2));
}

#[test]
fn edit_replacing_an_alias_points_default_at_the_new_row() {
    let (mut conn, author) = setup();
    let created =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();

    let mut form = dune_form();
    form.request.aliases = vec![Alias::new("Dune (novel)", "Dune", Some(1)).as_default()];
    form.request.identifiers = created.identifier_set.identifiers.clone();

    let edited =
        entity_service::edit::<WorkModel, _>(&mut conn, &author, created.bbid, &form, no_hook)
            .unwrap();

    assert_ne!(edited.alias_set.id, created.alias_set.id);
    assert_eq!(edited.alias_set.aliases.len(), 1);
    let default = edited.default_alias.unwrap();
    assert_eq!(default.name, "Dune (novel)");
    assert_ne!(default.id, created.default_alias.unwrap().id);
    assert_eq!(edited.identifier_set.id, created.identifier_set.id);
}

#[test]
fn edit_that_changes_nothing_is_rejected_without_writes() {
    let (mut conn, author) = setup();
    let created =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();

    let mut form = dune_form();
    form.request.aliases = created.alias_set.aliases.clone();
    form.request.identifiers = created.identifier_set.identifiers.clone();
    form.request.note = Some("no-op".to_string());

    let result =
        entity_service::edit::<WorkModel, _>(&mut conn, &author, created.bbid, &form, no_hook);

    assert!(matches!(result, Err(ServiceError::NothingChanged(bbid)) if bbid == created.bbid));
    assert_eq!(count(&conn, "revisions"), 1);
    assert_eq!(count(&conn, "notes"), 1);
    assert_eq!(counters(&conn, &author), (1, 1));
}

#[test]
fn editing_with_the_wrong_kind_is_rejected() {
    let (mut conn, author) = setup();
    let created =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();

    let form: EntityForm<_> = entity_service::decode_form(&json!({
        "aliases": [{"name": "Frank Herbert", "sortName": "Herbert, Frank", "default": true}]
    }))
    .unwrap();
    let result =
        entity_service::edit::<CreatorModel, _>(&mut conn, &author, created.bbid, &form, no_hook);

    assert!(matches!(result, Err(ServiceError::KindMismatch { .. })));
}

#[test]
fn deletion_records_a_revision_without_data() {
    let (mut conn, author) = setup();
    let created =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();

    let deleted =
        entity_service::delete(&mut conn, &author, created.bbid, Some("duplicate")).unwrap();

    assert_eq!(deleted.data_id, None);
    assert_ne!(deleted.revision_id, created.revision_id);
    let current = current_entity_revision(&conn, created.bbid).unwrap().unwrap();
    assert_eq!(current, deleted);
    assert_eq!(counters(&conn, &author), (2, 2));
    assert_eq!(count(&conn, "notes"), 2);

    let history = entity_revisions(&conn, created.bbid).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].revision.id, deleted.revision_id);
    assert_eq!(history[0].data_id, None);
    assert_eq!(history[0].author_name, "alice");

    assert!(matches!(
        entity_service::show_entity(&conn, created.bbid),
        Err(ServiceError::EntityDeleted(_))
    ));
    assert!(matches!(
        entity_service::delete(&mut conn, &author, created.bbid, None),
        Err(ServiceError::EntityDeleted(_))
    ));
    assert!(matches!(
        entity_service::edit::<WorkModel, _>(
            &mut conn,
            &author,
            created.bbid,
            &dune_form(),
            no_hook
        ),
        Err(ServiceError::EntityDeleted(_))
    ));
}

#[test]
fn deleting_an_unknown_entity_fails() {
    let (mut conn, author) = setup();
    let result = entity_service::delete(&mut conn, &author, uuid::Uuid::new_v4(), None);
    assert!(matches!(result, Err(ServiceError::EntityNotFound(_))));
    assert_eq!(count(&conn, "revisions"), 0);
}

#[test]
fn session_must_name_an_existing_editor() {
    let conn = open_db_in_memory().unwrap();
    assert!(matches!(
        authenticate(&conn, None),
        Err(SessionError::MissingIdentity)
    ));
    assert!(matches!(
        authenticate(&conn, Some(77)),
        Err(SessionError::UnknownEditor(77))
    ));
}

#[test]
fn invalid_requests_write_nothing() {
    let (mut conn, author) = setup();

    let mut bad_isbn = dune_form();
    bad_isbn.request.identifiers = vec![Identifier::new(1, "12345")];
    let mut unknown_language = dune_form();
    unknown_language.request.aliases = vec![Alias::new("Dune", "Dune", Some(999)).as_default()];
    let mut two_defaults = dune_form();
    two_defaults
        .request
        .aliases
        .push(Alias::new("Düne", "Dune", Some(2)).as_default());
    let mut blank_name = dune_form();
    blank_name.request.aliases = vec![Alias::new(" ", "Dune", Some(1)).as_default()];
    let mut no_default = dune_form();
    no_default.request.aliases = vec![Alias::new("Dune", "Dune", Some(1))];

    let expect_validation = |result: ServiceResult<_>, expected: ValidationError| match result {
        Err(ServiceError::Validation(actual)) => assert_eq!(actual, expected),
        other => panic!("unexpected result: {other:?}"),
    };

    expect_validation(
        entity_service::create::<WorkModel, _>(&mut conn, &author, &bad_isbn, no_hook)
            .map(|_| ()),
        ValidationError::InvalidIdentifierValue {
            type_label: "ISBN-13".to_string(),
            value: "12345".to_string(),
        },
    );
    expect_validation(
        entity_service::create::<WorkModel, _>(&mut conn, &author, &unknown_language, no_hook)
            .map(|_| ()),
        ValidationError::UnknownLanguage(999),
    );
    expect_validation(
        entity_service::create::<WorkModel, _>(&mut conn, &author, &two_defaults, no_hook)
            .map(|_| ()),
        ValidationError::MultipleDefaults,
    );
    expect_validation(
        entity_service::create::<WorkModel, _>(&mut conn, &author, &blank_name, no_hook)
            .map(|_| ()),
        ValidationError::BlankAliasField {
            index: 0,
            field: "name",
        },
    );
    assert!(matches!(
        entity_service::create::<WorkModel, _>(&mut conn, &author, &no_default, no_hook),
        Err(ServiceError::Set(folio_core::SetError::NoDefaultNominated { .. }))
    ));

    assert_eq!(count(&conn, "revisions"), 0);
    assert_eq!(count(&conn, "aliases"), 0);
    assert_eq!(counters(&conn, &author), (0, 0));
}

#[test]
fn editions_link_publishers_and_keep_them_across_edits() {
    let (mut conn, author) = setup();
    let publisher = entity_service::create_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Publisher,
        &json!({
            "aliases": [{"name": "Chilton Books", "sortName": "Chilton Books", "default": true}],
            "area": "Philadelphia"
        }),
    )
    .unwrap();
    let publisher_bbid = publisher["bbid"].as_str().unwrap().to_string();

    let edition = entity_service::create_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Edition,
        &json!({
            "aliases": [{"name": "Dune", "sortName": "Dune", "languageId": 1, "default": true}],
            "identifiers": [{"typeId": 2, "value": "080195001X"}],
            "editionFormat": "Hardcover",
            "pages": 412,
            "publishers": [publisher_bbid]
        }),
    )
    .unwrap();
    assert_eq!(edition["type"], "Edition");
    assert_eq!(edition["title"], "Edition “Dune”");
    assert_eq!(edition["pages"], 412);
    assert_eq!(edition["publishers"], json!([publisher_bbid]));

    let bbid: uuid::Uuid = edition["bbid"].as_str().unwrap().parse().unwrap();
    let edited = entity_service::edit_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Edition,
        bbid,
        &json!({
            "aliases": edition["aliasSet"]["aliases"],
            "identifiers": edition["identifierSet"]["identifiers"],
            "editionFormat": "Hardcover",
            "pages": 420
        }),
    )
    .unwrap();
    assert_eq!(edited["pages"], 420);
    assert_eq!(edited["publishers"], json!([publisher_bbid]));
    assert_eq!(edited["aliasSet"]["id"], edition["aliasSet"]["id"]);

    let shown = entity_service::show_entity(&conn, bbid).unwrap();
    assert_eq!(shown["revisionId"], edited["revisionId"]);
}

#[test]
fn publisher_only_edit_counts_as_a_change() {
    let (mut conn, author) = setup();
    let publisher = entity_service::create_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Publisher,
        &json!({"aliases": [{"name": "Ace", "sortName": "Ace", "default": true}]}),
    )
    .unwrap();
    let edition = entity_service::create_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Edition,
        &json!({"aliases": [{"name": "Dune", "sortName": "Dune", "default": true}]}),
    )
    .unwrap();
    let bbid: uuid::Uuid = edition["bbid"].as_str().unwrap().parse().unwrap();

    let edited = entity_service::edit_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Edition,
        bbid,
        &json!({
            "aliases": edition["aliasSet"]["aliases"],
            "publishers": [publisher["bbid"]]
        }),
    )
    .unwrap();
    assert_eq!(edited["publishers"], json!([publisher["bbid"]]));
}

#[test]
fn linking_a_non_publisher_rolls_back_the_edition() {
    let (mut conn, author) = setup();
    let work =
        entity_service::create::<WorkModel, _>(&mut conn, &author, &dune_form(), no_hook).unwrap();
    let revisions_before = count(&conn, "revisions");

    let result = entity_service::create_from_json(
        &mut conn,
        &author,
        folio_core::EntityKind::Edition,
        &json!({
            "aliases": [{"name": "Dune", "sortName": "Dune", "default": true}],
            "publishers": [work.bbid]
        }),
    );

    assert!(matches!(
        result,
        Err(ServiceError::Validation(ValidationError::NotAPublisher(bbid))) if bbid == work.bbid
    ));
    assert_eq!(count(&conn, "revisions"), revisions_before);
    assert_eq!(count(&conn, "edition_data"), 0);
}
