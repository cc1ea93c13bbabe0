//! Auth and Storage Facade Tests
//!
//! Exercised through the public API with the in-memory backends.

use std::sync::Arc;

use tablegate::auth::{AuthError, AuthService, MemoryAuthProvider, PasswordPolicy};
use tablegate::config::Config;
use tablegate::file_storage::{checksum, MemoryObjectStore, StorageError, StorageService};

#[tokio::test]
async fn test_auth_flow() {
    let auth = AuthService::new(Arc::new(MemoryAuthProvider::new())).with_password_policy(
        PasswordPolicy {
            min_length: 10,
            require_number: true,
        },
    );

    assert!(matches!(
        auth.sign_up("ada@example.com", "longpassword").await,
        Err(AuthError::WeakPassword(_))
    ));
    let user = auth.sign_up("ada@example.com", "longpassword1").await.unwrap();
    assert!(matches!(
        auth.sign_up("ada@example.com", "longpassword1").await,
        Err(AuthError::EmailAlreadyExists)
    ));

    let session = auth.sign_in("ada@example.com", "longpassword1").await.unwrap();
    assert_eq!(session.user.id, user.id);
    assert_eq!(auth.current_user().await.unwrap().email, "ada@example.com");

    auth.sign_out().await.unwrap();
    let err = auth.current_user().await.unwrap_err();
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn test_storage_flow() {
    let mut config = Config::default();
    config.storage_upload_limit_bytes = 1024;
    let storage = StorageService::from_config(Arc::new(MemoryObjectStore::new()), &config);

    storage.create_bucket("reports", false).await.unwrap();
    let info = storage
        .upload("reports", "2024/q1.csv", b"a,b\n1,2\n", Some("text/csv"))
        .await
        .unwrap();
    assert_eq!(info.checksum, checksum(b"a,b\n1,2\n"));

    let big = vec![0u8; 1025];
    assert!(matches!(
        storage.upload("reports", "2024/big.bin", &big, None).await,
        Err(StorageError::FileTooLarge(1025, 1024))
    ));

    assert_eq!(storage.list("reports", "2024/").await.unwrap().len(), 1);
    assert_eq!(
        storage.download("reports", "2024/q1.csv").await.unwrap(),
        b"a,b\n1,2\n"
    );

    assert!(matches!(
        storage.delete_bucket("reports").await,
        Err(StorageError::BucketNotEmpty(_))
    ));
    let removed = storage
        .remove("reports", &["2024/q1.csv".to_string()])
        .await
        .unwrap();
    assert_eq!(removed.len(), 1);
    storage.delete_bucket("reports").await.unwrap();
    assert!(storage.list_buckets().await.unwrap().is_empty());
}
