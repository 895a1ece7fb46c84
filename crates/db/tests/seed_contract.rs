use staffchat_core::RowRecord;
use staffchat_db::{
    connect_with_settings, AccessMode, DataSource, QueryOutput, SqliteDataSource,
    StaffConnectSeed,
};
use tempfile::TempDir;

async fn seeded_file_database(dir: &TempDir) -> String {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("staffconnect.db").display());
    let writer = connect_with_settings(&url, 1, 5, AccessMode::ReadWrite)
        .await
        .expect("read-write pool should connect");
    StaffConnectSeed::load(&writer).await.expect("seed should load");
    writer.close().await;
    url
}

#[tokio::test]
async fn seeded_data_answers_login_join_through_read_only_source() {
    let dir = TempDir::new().expect("temp dir");
    let url = seeded_file_database(&dir).await;

    let reader =
        connect_with_settings(&url, 2, 5, AccessMode::ReadOnly).await.expect("read-only pool");
    let source = SqliteDataSource::new(reader.clone(), 5);

    let output = source
        .run(
            "SELECT u.LOGIN, COUNT(*) AS logins FROM AuditTrail a \
             JOIN Master_ActionType t ON a.ACTIONTYPEID = t.ACTIONTYPEID \
             JOIN Users u ON a.USERID = u.USERID \
             WHERE t.ACTIONTYPECODE = 'LOGIN' AND a.SUCCESSFLAG = 1 \
             GROUP BY u.LOGIN ORDER BY u.LOGIN",
        )
        .await
        .expect("join should run");

    let QueryOutput::Table { headers, rows } = output else {
        panic!("expected column metadata for a non-empty result");
    };
    assert_eq!(headers, vec!["LOGIN".to_string(), "logins".to_string()]);
    assert_eq!(rows.len(), 4);
    assert!(matches!(&rows[0], RowRecord::Positional(values) if values[0] == "aadmin"));

    reader.close().await;
}

#[tokio::test]
async fn read_only_source_refuses_mutation_of_seeded_data() {
    let dir = TempDir::new().expect("temp dir");
    let url = seeded_file_database(&dir).await;

    let reader =
        connect_with_settings(&url, 1, 5, AccessMode::ReadOnly).await.expect("read-only pool");
    let source = SqliteDataSource::new(reader.clone(), 5);

    let result = source.run("DELETE FROM AuditTrail").await;
    assert!(result.is_err(), "query_only connection must reject DELETE");

    let verification = StaffConnectSeed::verify(&reader).await.expect("verify");
    assert!(verification.all_present, "seed contract broken: {:?}", verification.checks);

    reader.close().await;
}
