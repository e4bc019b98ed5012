//! belongs_to assignment and has_many traversal.

use restmap_client::{Error, Mapper, MemoryBackend, Method, Response, TransportError};
use restmap_engine::{Attributes, ClassSchema, FieldDef, FieldType, Pointer, Registry};
use serde_json::{json, Value};

fn attrs(value: Value) -> Attributes {
    value.as_object().unwrap().clone()
}

fn mapper() -> Mapper<MemoryBackend> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();

    let registry = Registry::new()
        .with_class(
            ClassSchema::new("Post")
                .field(FieldDef::required("title", FieldType::String))
                .has_many("comments", "Comment"),
        )
        .with_class(
            ClassSchema::new("Comment")
                .field(FieldDef::required("text", FieldType::String))
                .belongs_to("post", "Post"),
        );
    Mapper::new(MemoryBackend::new(), registry)
}

fn post(mapper: &Mapper<MemoryBackend>, title: &str) -> restmap_engine::Record {
    mapper.create_with("Post", attrs(json!({ "title": title }))).unwrap()
}

fn comment(mapper: &Mapper<MemoryBackend>, text: &str) -> restmap_engine::Record {
    mapper.build_with("Comment", attrs(json!({ "text": text }))).unwrap()
}

#[test]
fn assign_saves_target_then_updates_owner_once() {
    let mapper = mapper();
    let mut owner = comment(&mapper, "orphan");
    assert!(mapper.save(&mut owner).unwrap());
    let mut target = mapper.build_with("Post", attrs(json!({"title": "New"}))).unwrap();
    mapper.transport().clear_requests();

    mapper.assign(&mut owner, "post", &mut target).unwrap();

    let target_id = target.id().unwrap().to_string();
    let requests = mapper.transport().requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::Post);
    assert_eq!(requests[0].path, "/classes/Post");
    assert_eq!(requests[1].method, Method::Put);
    assert_eq!(
        requests[1].path,
        format!("/classes/Comment/{}", owner.id().unwrap())
    );
    assert_eq!(
        requests[1].body,
        Some(json!({"post": {"__type": "Pointer", "className": "Post", "objectId": target_id}}))
    );

    // The pointer is confirmed, not left pending
    assert!(!owner.attributes().has_pending());
    let stored = mapper.transport().object("Comment", owner.id().unwrap()).unwrap();
    assert_eq!(stored["post"]["objectId"], target_id.as_str());
}

#[test]
fn assign_persisted_target_sends_only_the_update() {
    let mapper = mapper();
    let mut target = post(&mapper, "Existing");
    let mut owner = comment(&mapper, "hello");
    mapper.save(&mut owner).unwrap();
    mapper.transport().clear_requests();

    mapper.assign(&mut owner, "post", &mut target).unwrap();
    assert_eq!(mapper.transport().count(Method::Post), 0);
    assert_eq!(mapper.transport().count(Method::Put), 1);
}

#[test]
fn assign_to_unsaved_owner_defers_to_create() {
    let mapper = mapper();
    let mut target = post(&mapper, "Existing");
    let mut owner = comment(&mapper, "draft");
    mapper.transport().clear_requests();

    mapper.assign(&mut owner, "post", &mut target).unwrap();
    assert!(mapper.transport().requests().is_empty());
    assert_eq!(owner.get("post"), Some(&target.to_pointer().unwrap().to_value()));

    assert!(mapper.save(&mut owner).unwrap());
    let stored = mapper.transport().object("Comment", owner.id().unwrap()).unwrap();
    assert_eq!(stored["post"]["objectId"], target.id().unwrap());
}

#[test]
fn assign_rejects_invalid_target() {
    let mapper = mapper();
    let mut owner = comment(&mapper, "hello");
    mapper.save(&mut owner).unwrap();
    let mut target = mapper.build("Post").unwrap();
    mapper.transport().clear_requests();

    match mapper.assign(&mut owner, "post", &mut target) {
        Err(Error::Rejected { class, messages }) => {
            assert_eq!(class, "Post");
            assert_eq!(messages, vec!["title can't be blank"]);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(mapper.transport().requests().is_empty());
    assert_eq!(owner.get("post"), None);
}

#[test]
fn assign_checks_relationship_and_class() {
    let mapper = mapper();
    let mut parent = post(&mapper, "P");
    let mut other = post(&mapper, "Q");
    let mut child = comment(&mapper, "c");

    assert!(matches!(
        mapper.assign(&mut parent, "comments", &mut other),
        Err(Error::Engine(restmap_engine::Error::WrongRelationshipKind { .. }))
    ));
    assert!(matches!(
        mapper.assign(&mut parent, "title", &mut other),
        Err(Error::Engine(restmap_engine::Error::UnknownRelationship { .. }))
    ));
    assert!(matches!(
        mapper.assign(&mut child, "post", &mut comment(&mapper, "not a post")),
        Err(Error::Engine(restmap_engine::Error::TypeMismatch { .. }))
    ));
}

#[test]
fn push_links_child_and_refetch_sees_it() {
    let mapper = mapper();
    let parent = post(&mapper, "Parent");

    let mut comments = mapper.children(&parent, "comments").unwrap();
    assert!(comments.is_empty());
    assert_eq!(comments.foreign_key(), "post");
    assert_eq!(comments.parent().object_id, parent.id().unwrap());

    comments.push(&mapper, &mut comment(&mapper, "first")).unwrap();
    comments.push(&mapper, &mut comment(&mapper, "second")).unwrap();
    assert_eq!(comments.len(), 2);
    assert!(comments.iter().all(|c| c.is_persisted()));

    let refetched = mapper.children(&parent, "comments").unwrap();
    let mut texts: Vec<_> = refetched
        .iter()
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect();
    texts.sort_unstable();
    assert_eq!(texts, vec!["first", "second"]);

    let expected = Pointer::new("Post", parent.id().unwrap()).to_value();
    for child in &refetched {
        assert_eq!(child.get("post"), Some(&expected));
    }
}

#[test]
fn push_moves_existing_child() {
    let mapper = mapper();
    let first = post(&mapper, "First");
    let second = post(&mapper, "Second");

    let mut under_first = mapper.children(&first, "comments").unwrap();
    under_first.push(&mapper, &mut comment(&mapper, "wandering")).unwrap();
    let mut child = under_first.into_records().remove(0);

    let mut under_second = mapper.children(&second, "comments").unwrap();
    under_second.push(&mapper, &mut child).unwrap();

    assert!(mapper.children(&first, "comments").unwrap().is_empty());
    assert_eq!(mapper.children(&second, "comments").unwrap().len(), 1);
}

#[test]
fn collections_from_different_parents_stay_separate() {
    let mapper = mapper();
    let a = post(&mapper, "A");
    let b = post(&mapper, "B");

    // Interleave the two collections
    let mut for_a = mapper.children(&a, "comments").unwrap();
    let mut for_b = mapper.children(&b, "comments").unwrap();
    for_a.push(&mapper, &mut comment(&mapper, "a1")).unwrap();
    for_b.push(&mapper, &mut comment(&mapper, "b1")).unwrap();
    for_a.push(&mapper, &mut comment(&mapper, "a2")).unwrap();

    assert_eq!(for_a.parent().object_id, a.id().unwrap());
    assert_eq!(for_b.parent().object_id, b.id().unwrap());
    assert_eq!(for_a.len(), 2);
    assert_eq!(for_b.len(), 1);

    assert_eq!(mapper.children(&a, "comments").unwrap().len(), 2);
    assert_eq!(mapper.children(&b, "comments").unwrap().len(), 1);
}

#[test]
fn push_rejects_wrong_class_and_invalid_child() {
    let mapper = mapper();
    let parent = post(&mapper, "Parent");
    let mut comments = mapper.children(&parent, "comments").unwrap();
    mapper.transport().clear_requests();

    let mut stray = mapper.build_with("Post", attrs(json!({"title": "x"}))).unwrap();
    assert!(matches!(
        comments.push(&mapper, &mut stray),
        Err(Error::Engine(restmap_engine::Error::TypeMismatch { .. }))
    ));

    let mut blank = mapper.build("Comment").unwrap();
    assert!(matches!(
        comments.push(&mapper, &mut blank),
        Err(Error::Rejected { .. })
    ));
    assert!(comments.is_empty());
    assert!(mapper.transport().requests().is_empty());
}

#[test]
fn failed_link_keeps_created_child_with_caller() {
    let mapper = mapper();
    let parent = post(&mapper, "Parent");
    let mut comments = mapper.children(&parent, "comments").unwrap();

    // The child is created, then the update linking it to the parent fails
    mapper.transport().reply_next(Response::new(
        201,
        json!({"objectId": "c1", "createdAt": "2024-01-01T00:00:00.000Z"}),
    ));
    mapper.transport().fail_next(TransportError::Timeout);

    let mut child = comment(&mapper, "late");
    assert!(matches!(
        comments.push(&mapper, &mut child),
        Err(Error::Transport(TransportError::Timeout))
    ));
    assert!(comments.is_empty());
    assert_eq!(child.id(), Some("c1"));
    assert_eq!(
        child.attributes().pending().get("post"),
        Some(&Pointer::new("Post", parent.id().unwrap()).to_value())
    );

    // Retrying with the same record only sends the link
    mapper
        .transport()
        .seed("Comment", "c1", attrs(json!({"text": "late"})));
    mapper.transport().clear_requests();
    comments.push(&mapper, &mut child).unwrap();

    assert_eq!(mapper.transport().count(Method::Post), 0);
    assert_eq!(mapper.transport().count(Method::Put), 1);
    assert_eq!(comments.len(), 1);
    assert_eq!(comments.records()[0].id(), Some("c1"));
    assert_eq!(mapper.children(&parent, "comments").unwrap().len(), 1);
}

#[test]
fn assign_sends_other_pending_writes_with_pointer() {
    let mapper = mapper();
    let mut target = post(&mapper, "Existing");
    let mut owner = comment(&mapper, "hello");
    mapper.save(&mut owner).unwrap();
    owner.set("text", "edited");
    mapper.transport().clear_requests();

    mapper.assign(&mut owner, "post", &mut target).unwrap();

    let body = mapper.transport().requests()[0].body.clone().unwrap();
    assert_eq!(body["text"], "edited");
    assert_eq!(body["post"], target.to_pointer().unwrap().to_value());
}

#[test]
fn children_needs_a_saved_owner() {
    let mapper = mapper();
    let unsaved = mapper.build_with("Post", attrs(json!({"title": "t"}))).unwrap();
    assert!(matches!(
        mapper.children(&unsaved, "comments"),
        Err(Error::Engine(restmap_engine::Error::NotPersisted(_)))
    ));

    let saved = post(&mapper, "t");
    assert!(matches!(
        mapper.children(&saved, "title"),
        Err(Error::Engine(restmap_engine::Error::UnknownRelationship { .. }))
    ));
}
