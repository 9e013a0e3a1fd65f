use mirror_guard::{ActivityEntry, ActivitySink, RepositoryError, RepositoryStatus, RepositoryStore};
use mirror_guard_store::{MirrorStore, NewRepository, StoreError};

fn create_store() -> MirrorStore {
    MirrorStore::open_in_memory().unwrap()
}

fn new_repo(owner: &str, name: &str) -> NewRepository {
    NewRepository {
        user_id: "u1".into(),
        owner: owner.into(),
        name: name.into(),
        mirror_owner: "mirror".into(),
        clone_url: format!("https://mirror.example/mirror/{name}.git"),
    }
}

#[test]
fn added_repository_starts_imported() {
    let store = create_store();
    let repo = store.add_repository(&new_repo("acme", "web")).unwrap();

    assert_eq!(repo.status, RepositoryStatus::Imported);
    assert_eq!(store.get_repository(&repo.id).unwrap(), Some(repo));
}

#[test]
fn duplicate_registration_is_rejected() {
    let store = create_store();
    store.add_repository(&new_repo("acme", "web")).unwrap();

    let err = store.add_repository(&new_repo("acme", "web")).unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(name) if name == "acme/web"));
}

#[test]
fn unknown_ids_are_absent() {
    let store = create_store();
    assert_eq!(store.get_repository("42").unwrap(), None);
    assert_eq!(store.get_repository("not-a-number").unwrap(), None);
}

#[test]
fn list_keeps_registration_order() {
    let store = create_store();
    store.add_repository(&new_repo("acme", "web")).unwrap();
    store.add_repository(&new_repo("acme", "api")).unwrap();

    let names: Vec<String> = store
        .list_repositories()
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["web", "api"]);
}

#[test]
fn schedulable_excludes_pending_and_syncing() {
    let store = create_store();
    let web = store.add_repository(&new_repo("acme", "web")).unwrap();
    let api = store.add_repository(&new_repo("acme", "api")).unwrap();
    let docs = store.add_repository(&new_repo("acme", "docs")).unwrap();
    let cli = store.add_repository(&new_repo("acme", "cli")).unwrap();

    store.set_status(&web.id, RepositoryStatus::PendingApproval, Some("force-push")).unwrap();
    store.set_status(&api.id, RepositoryStatus::Syncing, None).unwrap();
    store.set_status(&docs.id, RepositoryStatus::Error, Some("boom")).unwrap();

    let ids: Vec<String> = store
        .list_schedulable()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![docs.id, cli.id]);
}

#[test]
fn status_update_replaces_error_message() {
    let store = create_store();
    let repo = store.add_repository(&new_repo("acme", "web")).unwrap();

    store.set_status(&repo.id, RepositoryStatus::Error, Some("boom")).unwrap();
    let stored = store.get_repository(&repo.id).unwrap().unwrap();
    assert_eq!(stored.error_message.as_deref(), Some("boom"));

    store.set_status(&repo.id, RepositoryStatus::Synced, None).unwrap();
    let stored = store.get_repository(&repo.id).unwrap().unwrap();
    assert_eq!(stored.status, RepositoryStatus::Synced);
    assert_eq!(stored.error_message, None);
}

#[test]
fn status_update_of_unknown_repository_fails() {
    let store = create_store();
    assert!(matches!(
        store.set_status("7", RepositoryStatus::Synced, None),
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn implements_repository_store() {
    let store = create_store();
    let repo = store.add_repository(&new_repo("acme", "web")).unwrap();

    store
        .update_status(&repo.id, RepositoryStatus::PendingApproval, Some("held"))
        .await
        .unwrap();
    let fetched = store.get(&repo.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, RepositoryStatus::PendingApproval);

    let err = store.update_status("99", RepositoryStatus::Synced, None).await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound(_)));
}

#[tokio::test]
async fn activities_are_listed_newest_first() {
    let store = create_store();
    let web = store.add_repository(&new_repo("acme", "web")).unwrap();
    let api = store.add_repository(&new_repo("acme", "api")).unwrap();

    store
        .record(ActivityEntry::for_repository(&web, RepositoryStatus::Syncing, "first"))
        .await;
    store
        .record(ActivityEntry::for_repository(&api, RepositoryStatus::Synced, "other"))
        .await;
    store
        .record(
            ActivityEntry::for_repository(&web, RepositoryStatus::PendingApproval, "second")
                .with_details(r#"{"detected":true}"#),
        )
        .await;

    let all = store.list_activities(None, 10).unwrap();
    let messages: Vec<&str> = all.iter().map(|a| a.message.as_str()).collect();
    assert_eq!(messages, vec!["second", "other", "first"]);

    let web_only = store.list_activities(Some(&web.id), 10).unwrap();
    assert_eq!(web_only.len(), 2);
    assert_eq!(web_only[0].status, RepositoryStatus::PendingApproval);
    assert_eq!(web_only[0].details.as_deref(), Some(r#"{"detected":true}"#));
    assert!(web_only[0].created_at > 0);

    let limited = store.list_activities(None, 1).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn reopening_a_file_keeps_data() {
    let path = std::env::temp_dir().join("mirror-guard-test-store-reopen.db");
    let _ = std::fs::remove_file(&path);

    let id = {
        let store = MirrorStore::open(&path).unwrap();
        store.add_repository(&new_repo("acme", "web")).unwrap().id
    };

    let store = MirrorStore::open(&path).unwrap();
    assert!(store.get_repository(&id).unwrap().is_some());
    drop(store);
    let _ = std::fs::remove_file(&path);
}
