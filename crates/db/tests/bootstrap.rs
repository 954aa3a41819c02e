use ghosttype_core::lifecycle::JobStatus;
use sqlx::PgPool;

/// Full bootstrap test: connect, migrate, verify seed data.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_full_bootstrap(pool: PgPool) {
    // Health check
    ghosttype_db::health_check(&pool).await.unwrap();

    // Verify both lookup tables exist and have seed data.
    let job_statuses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_statuses")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(job_statuses, 7, "job_statuses should seed all seven states");

    let lock_states: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lock_states")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(lock_states, 2, "lock_states should seed idle and running");
}

/// The seeded status names must line up with the enum discriminants.
#[sqlx::test(migrations = "../../db/migrations")]
async fn test_status_seed_matches_enum(pool: PgPool) {
    let rows: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM job_statuses ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();

    for (id, name) in rows {
        let status = JobStatus::from_id(id).unwrap();
        assert_eq!(status.name(), name, "status id {id} name mismatch");
    }
}
