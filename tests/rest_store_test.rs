use httpmock::prelude::*;
use httpmock::Method::HEAD;
use postventa_import::domain::model::{FieldValue, MappedRecord};
use postventa_import::domain::ports::RecordStore;
use postventa_import::domain::query::{Filter, Query, SortOrder};
use postventa_import::{ImportError, RestStore};
use serde_json::json;

fn store(server: &MockServer) -> RestStore {
    RestStore::new(&server.base_url(), "/rest/v1", "anon-key", None).unwrap()
}

#[tokio::test]
async fn test_query_encodes_filters_and_auth_headers() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/incidencias")
                .header("apikey", "anon-key")
                .header("authorization", "Bearer anon-key")
                .query_param("select", "numero,clase_incidencia")
                .query_param("numero", "in.(\"5001\",\"5002\")")
                .query_param("clase_incidencia", "in.(\"TR\")");
            then.status(200)
                .json_body(json!([{"numero": "5001", "clase_incidencia": "TR"}]));
        })
        .await;

    let query = Query::new()
        .select(["numero", "clase_incidencia"])
        .filter(
            Filter::new()
                .in_list("numero", ["5001", "5002"])
                .in_list("clase_incidencia", ["TR"]),
        );
    let rows = store(&server).query("incidencias", &query).await.unwrap();

    mock.assert_async().await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["numero"], json!("5001"));
}

#[tokio::test]
async fn test_count_reads_content_range() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(HEAD)
                .path("/rest/v1/incidencias")
                .header("prefer", "count=exact");
            then.status(200).header("content-range", "0-0/3573");
        })
        .await;

    let count = store(&server)
        .count("incidencias", &Filter::new())
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(count, 3573);
}

#[tokio::test]
async fn test_insert_posts_json_array() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/rest/v1/incidencias_recibidas")
                .header("prefer", "return=representation")
                .json_body(json!([
                    {"numero": "100", "fecha": "2024-01-15", "cantidad": 2, "solucion": null}
                ]));
            then.status(201)
                .json_body(json!([{"id": 7, "numero": "100"}]));
        })
        .await;

    let mut record = MappedRecord::new();
    record.set("numero", FieldValue::Text("100".into()));
    record.set("fecha", FieldValue::Date("2024-01-15".into()));
    record.set("cantidad", FieldValue::Integer(2));
    record.set("solucion", FieldValue::Null);

    let inserted = store(&server)
        .insert("incidencias_recibidas", &[record])
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0]["id"], json!(7));
}

#[tokio::test]
async fn test_delete_in_batches_by_id() {
    let server = MockServer::start_async().await;
    let ids = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/comunicaciones")
                .query_param("select", "id")
                .query_param("order", "id.asc")
                .query_param("limit", "1000");
            then.status(200).json_body(json!([{"id": 1}, {"id": 2}]));
        })
        .await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE)
                .path("/rest/v1/comunicaciones")
                .query_param("id", "in.(1,2)");
            then.status(204);
        })
        .await;

    let store = store(&server);
    let query = Query::new()
        .select(["id"])
        .order_by("id", SortOrder::Ascending)
        .limit(1000);
    let rows = store.query("comunicaciones", &query).await.unwrap();
    let values: Vec<_> = rows.into_iter().filter_map(|mut r| r.remove("id")).collect();
    store
        .delete("comunicaciones", &Filter::new().in_list("id", values))
        .await
        .unwrap();

    ids.assert_async().await;
    delete.assert_async().await;
}

#[tokio::test]
async fn test_non_success_status_becomes_store_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(DELETE).path("/rest/v1/incidencias");
            then.status(403).body("permission denied for table incidencias");
        })
        .await;

    let err = store(&server)
        .delete("incidencias", &Filter::new().neq("id", 0))
        .await
        .unwrap_err();

    assert!(err.is_store_rejection());
    match err {
        ImportError::StoreError {
            table,
            status,
            message,
        } => {
            assert_eq!(table, "incidencias");
            assert_eq!(status, Some(403));
            assert!(message.contains("permission denied"));
        }
        other => panic!("unexpected error: {}", other),
    }
}
