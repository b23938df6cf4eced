use storefront_repo::{build_repo, Repo};
use storefront_types::domain::catalog::{LookupKind, ProductQuery};
use storefront_types::ports::CatalogRepository;

#[tokio::test]
async fn builds_sqlite_repo_from_url() {
    // Use a temp DB path for isolation.
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("storefront-test.db");
    let url = format!("sqlite://{}", db_path.display());

    let repo: Repo = build_repo(Some(&url)).await.expect("build repo");
    assert!(matches!(repo, Repo::Sqlite(_)));

    // basic sanity: a fresh store lists nothing
    let list = repo
        .list_products(&ProductQuery::default())
        .await
        .expect("list");
    assert!(list.is_empty());
    assert!(repo.list_categories().await.expect("categories").is_empty());
}

#[tokio::test]
async fn reopening_sqlite_file_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("reopen.db").display());

    {
        let repo = build_repo(Some(&url)).await.expect("build repo");
        repo.create_lookup(LookupKind::Brand, "Acme".into())
            .await
            .expect("create brand");
    }

    let reopened = build_repo(Some(&url)).await.expect("reopen repo");
    let brands = reopened
        .list_lookups(LookupKind::Brand)
        .await
        .expect("list brands");
    assert_eq!(brands.len(), 1);
    assert_eq!(brands[0].name, "Acme");
}
