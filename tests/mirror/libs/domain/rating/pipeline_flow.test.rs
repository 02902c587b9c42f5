// [tests/mirror/libs/domain/rating/pipeline_flow.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL FLUJO DE LA PIPELINE DE RATING
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: NEED_FILL -> WORK -> UPSERT CON ORÁCULO GUIONADO
 *
 * Infraestructura real en miniatura: cache-daemon sobre socket temporal,
 * base en RAM y un oráculo guionado que devuelve rate=55 para todo id.
 * =================================================================
 */

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use libsql::params;
use serde_json::{json, Value};

use serenity_cache_daemon::CacheDaemon;
use serenity_domain_rating::{RatingConfig, RatingPipeline, WorkStream};
use serenity_infra_cache_client::CacheClient;
use serenity_infra_db::SerenityDb;
use serenity_infra_llm::oracle::{LlmOracle, OracleReply, OracleRequest};
use serenity_infra_llm::{LlmClient, LlmError};
use serenity_domain_models::rating::RatingKind;
use serenity_infra_db::repositories::RatingJobRepository;

/// Oráculo guionado: contesta {"items":[{id, rate:55}]} eco de la entrada.
struct ScriptedOracle;

impl LlmOracle for ScriptedOracle {
    fn invoke<'a>(
        &'a self,
        request: &'a OracleRequest,
    ) -> Pin<Box<dyn Future<Output = Result<OracleReply, LlmError>> + Send + 'a>> {
        Box::pin(async move {
            let input: Value = serde_json::from_str(&request.input).unwrap_or(Value::Null);
            let ids: Vec<i64> = input
                .get("items")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.get("id").and_then(Value::as_i64))
                        .collect()
                })
                .unwrap_or_default();

            let verdicts: Vec<Value> = ids.iter().map(|id| json!({"id": id, "rate": 55})).collect();

            Ok(OracleReply {
                content: json!({"items": verdicts}).to_string(),
                input_tokens: None,
                output_tokens: None,
            })
        })
    }
}

async fn boot_daemon(socket_path: &std::path::Path) -> tokio::task::JoinHandle<()> {
    let daemon = CacheDaemon::new(socket_path);
    let handle = tokio::spawn(async move {
        let _ = daemon.serve_forever().await;
    });
    for _ in 0..50 {
        if socket_path.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    handle
}

async fn scalar_i64(connection: &libsql::Connection, sql: &str) -> i64 {
    let mut rows = connection.query(sql, ()).await.expect("query");
    rows.next()
        .await
        .expect("row")
        .map(|row| row.get::<i64>(0).expect("scalar"))
        .unwrap_or(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_contacts_stream_end_to_end() {
    println!("\n🎯 [INICIO]: Auditoría del stream contacts con oráculo guionado...");

    let workdir = tempfile::tempdir().expect("tempdir");
    let socket_path = workdir.path().join("cache.sock");
    let server = boot_daemon(&socket_path).await;

    let database = SerenityDb::connect("file:mem_pipeline_flow?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let connection = database.get_connection().expect("conn");

    // SETUP: tarea sell con límite amplio (el guard admite siempre)
    connection
        .execute(
            r#"
            INSERT INTO aap_audience_audiencetask
                (id, workspace_id, user_id, type, task, task_client, subscribers_limit, run_processing)
            VALUES (1, 'ws-1', 10, 'sell', 'Sell bakery ovens', 'German bakeries', 5000, 1)
            "#,
            (),
        )
        .await
        .expect("seed task");

    // tres contactos agregados + filas de rating sin rate_cl (candidatos)
    for contact_id in [101i64, 102, 103] {
        connection
            .execute(
                r#"
                INSERT INTO raw_contacts_aggr (id, email, company_data, status_data)
                VALUES (?1, 'c' || ?1 || '@x.de', ?2, 'YES WEB')
                "#,
                params![
                    contact_id,
                    json!({"norm": {"company_name": format!("Firma {contact_id}"), "website": "https://x.de"}})
                        .to_string()
                ],
            )
            .await
            .expect("seed aggregate");

        connection
            .execute(
                r#"
                INSERT INTO rate_contacts (task_id, contact_id, cb_id, rate_cb)
                VALUES (1, ?1, 9, 3)
                "#,
                params![contact_id],
            )
            .await
            .expect("seed candidate");
    }

    // solicitud de trabajo contacts con huella objetivo válida
    let ledger = RatingJobRepository::new(database.get_connection().expect("conn"));
    let job_id = ledger.request(1, RatingKind::Contacts, 4242).await.expect("request");

    let cache = Arc::new(CacheClient::new(&socket_path));
    let llm = LlmClient::new(Arc::new(ScriptedOracle), Arc::clone(&cache));
    let pipeline = RatingPipeline::new(database.clone(), Arc::clone(&cache), llm, RatingConfig::default());

    // DO_PROB=0.7 introduce JUMPs: iteramos hasta drenar el trabajo
    for _ in 0..60 {
        let rated = scalar_i64(
            &connection,
            "SELECT COUNT(*) FROM rate_contacts WHERE task_id = 1 AND rate_cl IS NOT NULL",
        )
        .await;
        if rated >= 3 {
            break;
        }
        let _ = pipeline.run_once(WorkStream::Contacts).await.expect("tick");
    }

    // VEREDICTO: los tres candidatos quedaron rankeados con la huella
    let rated = scalar_i64(
        &connection,
        "SELECT COUNT(*) FROM rate_contacts WHERE task_id = 1 AND rate_cl = 55 AND hash_task = 4242",
    )
    .await;
    assert_eq!(rated, 3, "all candidates must end rated with the target hash");

    // los leases por entidad quedaron liberados
    for contact_id in [101i64, 102, 103] {
        let lease_key = format!("prep:contacts:eid:1:{contact_id}");
        let held = cache.lock_status_held(&lease_key).await.unwrap_or(false);
        assert!(!held, "entity lease {lease_key} must be released after the batch");
    }

    // el done_scan NO cierra todavía (rated 3 < limit + batch)
    let report = pipeline.run_done_scan(WorkStream::Contacts).await.expect("done scan");
    assert_eq!(report["closed"], json!(0));
    assert!(ledger
        .load_alive(job_id, &[RatingKind::Contacts, RatingKind::ContactsUpdate])
        .await
        .expect("alive")
        .is_some());

    server.abort();
    println!("🏁 [INFORME]: pipeline contacts certificada.");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_bad_target_hash_closes_job() {
    let workdir = tempfile::tempdir().expect("tempdir");
    let socket_path = workdir.path().join("cache.sock");
    let server = boot_daemon(&socket_path).await;

    let database = SerenityDb::connect("file:mem_pipeline_badhash?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let connection = database.get_connection().expect("conn");

    connection
        .execute(
            r#"
            INSERT INTO aap_audience_audiencetask (id, workspace_id, user_id, type, task, run_processing)
            VALUES (1, 'ws-1', 10, 'sell', 'x', 1)
            "#,
            (),
        )
        .await
        .expect("seed task");

    // huella reservada (1): el trabajo debe cerrarse con bad_target_hash
    let ledger = RatingJobRepository::new(database.get_connection().expect("conn"));
    let job_id = ledger.request(1, RatingKind::Contacts, 1).await.expect("request");

    let cache = Arc::new(CacheClient::new(&socket_path));
    let llm = LlmClient::new(Arc::new(ScriptedOracle), Arc::clone(&cache));
    let pipeline = RatingPipeline::new(database.clone(), Arc::clone(&cache), llm, RatingConfig::default());

    // primer tick que alcance el head lo cierra en el need_fill
    for _ in 0..10 {
        let _ = pipeline.run_once(WorkStream::Contacts).await.expect("tick");
        let alive = ledger
            .load_alive(job_id, &[RatingKind::Contacts, RatingKind::ContactsUpdate])
            .await
            .expect("alive");
        if alive.is_none() {
            break;
        }
    }

    assert!(
        ledger
            .load_alive(job_id, &[RatingKind::Contacts, RatingKind::ContactsUpdate])
            .await
            .expect("alive")
            .is_none(),
        "a reserved target hash must close the job"
    );

    server.abort();
}
