//! Tests for opening the catalog database
//!
//! Run with: cargo test --test connection_retry_test -- --nocapture

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use geocat_core::adapters::duckdb::DuckDbUserRepository;
use geocat_core::ports::UserRepository;
use geocat_core::{Profile, User};

/// Sum of all backoff sleeps (50 + 100 + 200 + 400 ms)
const FULL_BACKOFF: Duration = Duration::from_millis(750);

/// A path inside a missing directory is not a locking problem, so the open
/// must fail on the first attempt instead of sleeping through the backoff.
#[test]
fn test_missing_directory_fails_without_retry() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("no-such-dir").join("catalog.duckdb");

    let start = Instant::now();
    let result = DuckDbUserRepository::new(&db_path);
    let elapsed = start.elapsed();

    assert!(result.is_err(), "opening inside a missing directory should fail");
    assert!(
        elapsed < FULL_BACKOFF,
        "non-retryable error took {:?}, looks like it was retried",
        elapsed
    );
    assert!(!db_path.exists());
}

#[test]
fn test_sequential_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("sequential.duckdb");

    for i in 0..5 {
        let repo = DuckDbUserRepository::new(&db_path).unwrap();
        repo.ensure_schema().unwrap();
        repo.save_user(&User::new(format!("user{}", i), Profile::Guest))
            .unwrap();
        assert_eq!(repo.db_path(), Some(db_path.as_path()));
        // Connection dropped at end of loop
    }

    let repo = DuckDbUserRepository::new(&db_path).unwrap();
    assert_eq!(repo.count_users().unwrap(), 5);
}

/// Several threads opening the same file at once all get a connection
#[test]
fn test_concurrent_connections() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("concurrent.duckdb");

    {
        let repo = DuckDbUserRepository::new(&db_path).unwrap();
        repo.ensure_schema().unwrap();
    }

    let barrier = Arc::new(Barrier::new(3));
    let db_path = Arc::new(db_path);

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let db_path = Arc::clone(&db_path);
            thread::spawn(move || {
                barrier.wait();
                let start = Instant::now();
                match DuckDbUserRepository::new(&db_path) {
                    Ok(_repo) => {
                        println!("Thread {}: opened after {:?}", i, start.elapsed());
                        // Hold the connection briefly to create contention
                        thread::sleep(Duration::from_millis(100));
                        Ok(())
                    }
                    Err(e) => Err(e.to_string()),
                }
            })
        })
        .collect();

    let failures: Vec<String> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap().err())
        .collect();

    assert!(failures.is_empty(), "connections failed: {:?}", failures);
}
