/// Integration tests for the per-user todo lifecycle

use sqlx::SqlitePool;
use todo_shared::auth::credentials::{self, Registration};
use todo_shared::auth::gate::{AuthMethod, CurrentUser};
use todo_shared::db::migrations::run_migrations;
use todo_shared::db::pool::{create_pool, DatabaseConfig};
use todo_shared::models::todo::{Todo, TodoState};
use todo_shared::todos::{self, TodoChanges, TodoError, NAME_REQUIRED};
use tempfile::TempDir;
use tokio::task::JoinSet;
use uuid::Uuid;

/// A WAL database file with a multi-connection pool, as the server runs it
async fn setup_file() -> (SqlitePool, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("todos.db").display());

    let pool = create_pool(DatabaseConfig::file(url))
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    (pool, dir)
}

async fn setup() -> SqlitePool {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    pool
}

async fn user(pool: &SqlitePool, username: &str) -> CurrentUser {
    let user = credentials::register(
        pool,
        Registration {
            username: username.to_string(),
            email: format!("{}@x.com", username),
            password: "pw123".to_string(),
            verify_password: "pw123".to_string(),
        },
    )
    .await
    .expect("Registration should succeed");

    CurrentUser {
        user,
        method: AuthMethod::Basic,
    }
}

#[tokio::test]
async fn test_create_todos() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;

    todos::create(&pool, &alice, "Walk Dog").await.unwrap();
    todos::create(&pool, &alice, "Clean Car").await.unwrap();

    assert_eq!(Todo::count(&pool).await.unwrap(), 2);

    let listed = todos::list(&pool, &alice).await.unwrap();
    assert_eq!(listed[0].name, "Walk Dog");
    assert_eq!(listed[0].state(), TodoState::Open);
}

#[tokio::test]
async fn test_create_rejects_blank_name_without_persisting() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;

    let err = todos::create(&pool, &alice, "   ").await.unwrap_err();
    assert!(matches!(err, TodoError::Validation(ref m) if m == NAME_REQUIRED));
    assert_eq!(Todo::count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn test_list_preserves_creation_order_and_isolates_users() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let names = ["one", "two", "three", "four", "five"];
    for name in names {
        todos::create(&pool, &alice, name).await.unwrap();
    }
    todos::create(&pool, &bob, "bob's").await.unwrap();

    let listed: Vec<String> = todos::list(&pool, &alice)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(listed, names);

    let bobs = todos::list(&pool, &bob).await.unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].name, "bob's");
}

#[tokio::test]
async fn test_foreign_todo_looks_missing() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let todo = todos::create(&pool, &alice, "private").await.unwrap();

    assert!(matches!(
        todos::get(&pool, &bob, todo.id).await,
        Err(TodoError::NotFound(id)) if id == todo.id
    ));
    assert!(matches!(
        todos::update(&pool, &bob, todo.id, TodoChanges {
            completed: Some(true),
            ..Default::default()
        })
        .await,
        Err(TodoError::NotFound(_))
    ));
    assert!(matches!(
        todos::delete(&pool, &bob, todo.id).await,
        Err(TodoError::NotFound(_))
    ));

    // Untouched for the owner
    let still = todos::get(&pool, &alice, todo.id).await.unwrap();
    assert!(!still.completed);

    // Missing IDs fail the same way
    let missing = Uuid::new_v4();
    assert!(matches!(
        todos::get(&pool, &alice, missing).await,
        Err(TodoError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_update_applies_only_provided_fields() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;
    let todo = todos::create(&pool, &alice, "Walk Dog").await.unwrap();

    let done = todos::update(&pool, &alice, todo.id, TodoChanges {
        completed: Some(true),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(done.name, "Walk Dog");
    assert_eq!(done.state(), TodoState::Done);

    let renamed = todos::update(&pool, &alice, todo.id, TodoChanges {
        name: Some("Walk Cat".to_string()),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(renamed.name, "Walk Cat");
    assert!(renamed.completed);
    assert!(renamed.updated_at >= todo.updated_at);

    let reopened = todos::update(&pool, &alice, todo.id, TodoChanges {
        completed: Some(false),
        ..Default::default()
    })
    .await
    .unwrap();
    assert_eq!(reopened.state(), TodoState::Open);
}

#[tokio::test]
async fn test_update_rejects_blank_name() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;
    let todo = todos::create(&pool, &alice, "Walk Dog").await.unwrap();

    let result = todos::update(&pool, &alice, todo.id, TodoChanges {
        name: Some(" ".to_string()),
        completed: Some(true),
    })
    .await;
    assert!(matches!(result, Err(TodoError::Validation(_))));

    let unchanged = todos::get(&pool, &alice, todo.id).await.unwrap();
    assert_eq!(unchanged.name, "Walk Dog");
    assert!(!unchanged.completed);
}

#[tokio::test]
async fn test_delete_twice() {
    let pool = setup().await;
    let alice = user(&pool, "alice").await;
    let todo = todos::create(&pool, &alice, "Walk Dog").await.unwrap();

    todos::delete(&pool, &alice, todo.id).await.unwrap();

    assert!(matches!(
        todos::delete(&pool, &alice, todo.id).await,
        Err(TodoError::NotFound(_))
    ));
    assert!(todos::list(&pool, &alice).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_by_different_owners() {
    let (pool, _dir) = setup_file().await;

    let mut owners = Vec::new();
    for name in ["alice", "bob", "carol", "dave"] {
        let current = user(&pool, name).await;
        let todo = todos::create(&pool, &current, "Walk Dog").await.unwrap();
        owners.push((current, todo.id));
    }

    let mut tasks = JoinSet::new();
    for round in 0..50 {
        for (current, id) in &owners {
            let (pool, current, id) = (pool.clone(), current.clone(), *id);
            tasks.spawn(async move {
                todos::update(&pool, &current, id, TodoChanges {
                    name: Some(format!("Walk Dog {}", round)),
                    completed: Some(round % 2 == 0),
                })
                .await
            });
        }
    }

    let mut updated = 0;
    while let Some(result) = tasks.join_next().await {
        result.unwrap().expect("Concurrent owner update should succeed");
        updated += 1;
    }
    assert_eq!(updated, 200);

    for (current, id) in &owners {
        let todo = todos::get(&pool, current, *id).await.unwrap();
        assert!(todo.name.starts_with("Walk Dog "));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_and_deletes() {
    let (pool, _dir) = setup_file().await;
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let mut doomed = Vec::new();
    for i in 0..100 {
        doomed.push(todos::create(&pool, &alice, &format!("chore {}", i)).await.unwrap().id);
    }

    let mut tasks = JoinSet::new();
    for id in doomed {
        let (pool, alice) = (pool.clone(), alice.clone());
        tasks.spawn(async move { todos::delete(&pool, &alice, id).await.map(|_| ()) });
    }
    for i in 0..50 {
        let (pool, bob) = (pool.clone(), bob.clone());
        tasks.spawn(async move {
            todos::create(&pool, &bob, &format!("errand {}", i)).await.map(|_| ())
        });
    }

    while let Some(result) = tasks.join_next().await {
        result.unwrap().expect("Concurrent write should succeed");
    }

    assert!(todos::list(&pool, &alice).await.unwrap().is_empty());
    assert_eq!(todos::list(&pool, &bob).await.unwrap().len(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_deletes_of_one_todo() {
    let (pool, _dir) = setup_file().await;
    let alice = user(&pool, "alice").await;
    let todo = todos::create(&pool, &alice, "Walk Dog").await.unwrap();

    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let (pool, alice) = (pool.clone(), alice.clone());
        tasks.spawn(async move { todos::delete(&pool, &alice, todo.id).await });
    }

    let (mut removed, mut missing) = (0, 0);
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(()) => removed += 1,
            Err(TodoError::NotFound(_)) => missing += 1,
            Err(e) => panic!("Unexpected error: {}", e),
        }
    }

    assert_eq!(removed, 1);
    assert_eq!(missing, 7);
}
