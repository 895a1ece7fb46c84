use crate::connection::DbPool;

/// Tables the demo dataset creates, with the row count each must hold after loading.
const SEED_TABLES: &[SeedTableContract] = &[
    SeedTableContract { table: "Master_Role", expected_rows: 3 },
    SeedTableContract { table: "Users", expected_rows: 4 },
    SeedTableContract { table: "Master_ActionType", expected_rows: 4 },
    SeedTableContract { table: "AuditTrail", expected_rows: 8 },
    SeedTableContract { table: "ELMAH_Error", expected_rows: 5 },
];

struct SeedTableContract {
    table: &'static str,
    expected_rows: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeededTable {
    pub table: &'static str,
    pub rows: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub tables_seeded: Vec<SeededTable>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Demo StaffConnect dataset (roles, users, action types, audit trail, ELMAH errors).
///
/// Loading is idempotent: tables are created if missing and rows are upserted by id.
pub struct StaffConnectSeed;

impl StaffConnectSeed {
    pub const SQL: &str = include_str!("../fixtures/staffconnect_demo.sql");

    /// Needs a read-write pool.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, sqlx::Error> {
        let mut tx = pool.begin().await?;
        sqlx::query(Self::SQL).execute(&mut *tx).await?;
        tx.commit().await?;

        let mut tables_seeded = Vec::with_capacity(SEED_TABLES.len());
        for contract in SEED_TABLES {
            tables_seeded
                .push(SeededTable { table: contract.table, rows: count_rows(pool, contract).await? });
        }

        Ok(SeedResult { tables_seeded })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, sqlx::Error> {
        let mut checks = Vec::with_capacity(SEED_TABLES.len() + 1);

        for contract in SEED_TABLES {
            let rows = count_rows(pool, contract).await.unwrap_or(-1);
            checks.push((contract.table, rows == contract.expected_rows));
        }

        let orphaned_audit_rows: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM AuditTrail a \
             LEFT JOIN Users u ON a.USERID = u.USERID \
             LEFT JOIN Master_ActionType t ON a.ACTIONTYPEID = t.ACTIONTYPEID \
             WHERE u.USERID IS NULL OR t.ACTIONTYPEID IS NULL",
        )
        .fetch_one(pool)
        .await?;
        checks.push(("audit-trail-joins", orphaned_audit_rows == 0));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count_rows(pool: &DbPool, contract: &SeedTableContract) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {}", contract.table)).fetch_one(pool).await
}
