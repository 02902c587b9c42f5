// [tests/mirror/libs/infra/db/hash_guard.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL HASH-GUARD TRANSACCIONAL
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: PURGA + RESET + SELLADO DE HUELLA EN UNA TRANSACCIÓN
 *
 * Escenario semilla: una tarea con huella sellada y 100 ratings vigentes;
 * cambiar las celdas puntuadas DEBE purgar los 100, resetear el límite de
 * suscriptores y sellar la huella nueva.
 * =================================================================
 */

use libsql::params;

use serenity_infra_db::repositories::CellRepository;
use serenity_infra_db::SerenityDb;

async fn scalar_i64(connection: &libsql::Connection, sql: &str) -> i64 {
    let mut rows = connection.query(sql, ()).await.expect("query");
    rows.next()
        .await
        .expect("row fetch")
        .map(|row| row.get::<i64>(0).expect("scalar"))
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_fingerprint_change_purges_ratings() {
    println!("\n🧹 [INICIO]: Auditoría del hash-guard...");

    let database = SerenityDb::connect("file:mem_hash_guard?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let connection = database.get_connection().expect("conn");

    // SETUP: tarea activa con celdas puntuadas
    connection
        .execute(
            r#"
            INSERT INTO aap_audience_audiencetask
                (id, workspace_id, user_id, type, task, task_branches, subscribers_limit, run_processing)
            VALUES (1, 'ws-1', 10, 'sell', 'A', 'B', 100, 1)
            "#,
            (),
        )
        .await
        .expect("seed task");

    for (value_id, rate) in [(7i64, 3i64), (11, 5)] {
        connection
            .execute(
                r#"
                INSERT INTO crawl_tasks (task_id, type, value_id, rate, hash_task)
                VALUES (1, 'branch', ?1, ?2, 42)
                "#,
                params![value_id, rate],
            )
            .await
            .expect("seed cell");
    }

    let cells = CellRepository::new(database.get_connection().expect("conn"));

    // PRIMERA PASADA: huella no sellada todavía -> guard sella (y purga
    // una tabla de ratings aún vacía)
    assert!(cells.run_hash_guard(1).await.expect("guard"));
    let sealed_initial = cells.stored_task_hash(1).await.expect("stored").expect("sealed");
    assert!(!sealed_initial.is_empty());

    // SEGUNDA PASADA sin cambios: no-op
    assert!(!cells.run_hash_guard(1).await.expect("guard"));

    // 100 ratings vigentes contra la huella actual
    for contact_id in 0..100i64 {
        connection
            .execute(
                r#"
                INSERT INTO rate_contacts (task_id, contact_id, rate_cl, hash_task)
                VALUES (1, ?1, 50, 42)
                "#,
                params![contact_id],
            )
            .await
            .expect("seed rating");
    }
    assert_eq!(
        scalar_i64(&connection, "SELECT COUNT(*) FROM rate_contacts WHERE task_id = 1").await,
        100
    );

    // CAMBIO DE ENTRADA: el rate de una celda cambia -> kt_hash cambia
    connection
        .execute(
            "UPDATE crawl_tasks SET rate = 99 WHERE task_id = 1 AND value_id = 7",
            (),
        )
        .await
        .expect("mutate cells");

    // GUARD: debe borrar los 100 ratings, resetear el límite y sellar
    assert!(cells.run_hash_guard(1).await.expect("guard"));

    assert_eq!(
        scalar_i64(&connection, "SELECT COUNT(*) FROM rate_contacts WHERE task_id = 1").await,
        0,
        "stale ratings must be purged"
    );
    assert_eq!(
        scalar_i64(
            &connection,
            "SELECT subscribers_limit FROM aap_audience_audiencetask WHERE id = 1"
        )
        .await,
        0,
        "subscribers_limit must reset to 0"
    );

    let sealed_after = cells.stored_task_hash(1).await.expect("stored").expect("sealed");
    assert_ne!(sealed_after, sealed_initial, "a new fingerprint must be sealed");
    assert_eq!(
        sealed_after,
        cells.kt_hash(1).await.expect("kt"),
        "sealed fingerprint must match the recomputed one"
    );

    println!("🏁 [INFORME]: hash-guard certificado.");
}
