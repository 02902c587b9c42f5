// [tests/mirror/libs/domain/validate/aggregate_merge.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL MERGE DEL AGREGADOR
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: DEDUP POR EMAIL, UNIONES Y SHARDS SOBRE BASE REAL
 *
 * Escenario semilla: dos candidatos del mismo email desde celdas
 * distintas; el resultado DEBE ser una sola fila agregada con uniones
 * {10115,10117} / {1,2}, company_name first-wins y shards gs-1, gs-2.
 * =================================================================
 */

use libsql::params;
use serde_json::{json, Value};

use serenity_domain_validate::Aggregator;
use serenity_infra_db::SerenityDb;

async fn seed_cell(connection: &libsql::Connection, cb_id: i64, plz: &str, branch_id: i64) {
    connection
        .execute(
            r#"
            INSERT INTO cb_crawler (id, plz, branch_id, branch_slug, collected)
            VALUES (?1, ?2, ?3, 'slug', 1)
            "#,
            params![cb_id, plz, branch_id],
        )
        .await
        .expect("seed cell");
}

async fn seed_raw_ok(
    connection: &libsql::Connection,
    cb_id: i64,
    company_name: &str,
    email: &str,
    company_data: Value,
) {
    connection
        .execute(
            r#"
            INSERT INTO raw_contacts_gb
                (cb_crawler_id, company_name, email, company_data, status_email, processed_email)
            VALUES (?1, ?2, ?3, ?4, 'OK', 1)
            "#,
            params![cb_id, company_name, email, company_data.to_string()],
        )
        .await
        .expect("seed raw row");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_two_candidates_same_email_merge_into_one_aggregate() {
    println!("\n🧬 [INICIO]: Auditoría del merge del agregador...");

    let database = SerenityDb::connect("file:mem_aggregate_merge?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let connection = database.get_connection().expect("conn");

    // celdas de origen: (10115, branch 1) y (10117, branch 2)
    seed_cell(&connection, 501, "10115", 1).await;
    seed_cell(&connection, 502, "10117", 2).await;

    // candidato 1: ACME en 10115; candidato 2: MISMO email desde 10117
    // (el email llega con mayúsculas y espacios: la clave se normaliza)
    seed_raw_ok(
        &connection,
        501,
        "ACME",
        "a@x",
        json!({"plz": "10115", "branches": ["Bäckerei"], "website": "https://acme.de"}),
    )
    .await;
    seed_raw_ok(
        &connection,
        502,
        "ACME GmbH",
        "  A@X ",
        json!({"plz": "10117", "branches": ["Konditorei"]}),
    )
    .await;

    let aggregator = Aggregator::new(database.clone());
    let report = aggregator.run_batch().await.expect("aggregate batch");
    assert_eq!(report["inserted"], json!(1));
    assert_eq!(report["merged"], json!(1));

    // INVARIANTE 1: una sola fila, email normalizado
    let mut rows = connection
        .query(
            r#"
            SELECT email, company_name, cb_crawler_ids, branches, plz_list, company_data
            FROM raw_contacts_aggr
            "#,
            (),
        )
        .await
        .expect("select aggregate");

    let row = rows.next().await.expect("fetch").expect("one aggregate row");
    assert!(rows.next().await.expect("fetch").is_none(), "aggregate row split!");

    let email: String = row.get(0).expect("email");
    assert_eq!(email, "a@x");

    // first-wins en escalares
    let company_name: String = row.get(1).expect("name");
    assert_eq!(company_name, "ACME");

    // uniones de celdas / branches / plz
    let cb_ids: Vec<i64> = serde_json::from_str(&row.get::<String>(2).expect("cb")).expect("json");
    assert_eq!(cb_ids, vec![501, 502]);

    let branches: Vec<i64> = serde_json::from_str(&row.get::<String>(3).expect("branches")).expect("json");
    assert_eq!(branches, vec![1, 2]);

    let plz_list: Vec<String> = serde_json::from_str(&row.get::<String>(4).expect("plz")).expect("json");
    assert_eq!(plz_list, vec!["10115".to_string(), "10117".to_string()]);

    // shards gs-1 / gs-2 intactos + norm recalculado
    let company_data: Value = serde_json::from_str(&row.get::<String>(5).expect("data")).expect("json");
    assert!(company_data.get("gs-1").is_some(), "first shard missing");
    assert!(company_data.get("gs-2").is_some(), "second shard missing");
    assert_eq!(company_data["norm"]["company_name"], json!("ACME"));
    assert_eq!(company_data["norm"]["website"], json!("https://acme.de"));

    // las filas crudas quedaron selladas
    let mut processed_rows = connection
        .query("SELECT COUNT(*) FROM raw_contacts_gb WHERE processed = 1", ())
        .await
        .expect("count");
    let processed: i64 = processed_rows
        .next()
        .await
        .expect("row")
        .expect("count row")
        .get(0)
        .expect("scalar");
    assert_eq!(processed, 2);

    // re-ejecutar el lote es un no-op (idempotencia del consumo)
    let second_report = aggregator.run_batch().await.expect("aggregate batch");
    assert_eq!(second_report["batch"], json!(0));

    println!("🏁 [INFORME]: merge del agregador certificado.");
}
