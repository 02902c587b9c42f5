// [tests/mirror/libs/infra/db/rating_ledger.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL LEDGER DE RATING
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: APPEND-ONLY, VISIBILIDAD POR TIPO Y SELLADO done
 * =================================================================
 */

use serenity_domain_models::rating::RatingKind;
use serenity_infra_db::repositories::RatingJobRepository;
use serenity_infra_db::SerenityDb;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_ledger_lifecycle() {
    println!("\n🗄️  [INICIO]: Auditoría del ledger __tasks_rating...");

    let database = SerenityDb::connect("file:mem_rating_ledger?mode=memory&cache=shared", None)
        .await
        .expect("memory ledger");

    let ledger = RatingJobRepository::new(database.get_connection().expect("conn"));

    // 1. solicitudes: geo y contacts para dos tareas
    let geo_job = ledger.request(1, RatingKind::Geo, 777).await.expect("request");
    let contacts_job = ledger.request(2, RatingKind::Contacts, 888).await.expect("request");
    let update_job = ledger
        .request(2, RatingKind::ContactsUpdate, 888)
        .await
        .expect("request");

    // 2. la cola del stream contacts ve AMBOS tipos, newest-first
    let queue = ledger
        .build_queue(&[RatingKind::Contacts, RatingKind::ContactsUpdate], 500)
        .await
        .expect("queue");
    assert_eq!(queue, vec![update_job, contacts_job]);

    // 3. la cola geo no ve trabajos de contacts
    let geo_queue = ledger.build_queue(&[RatingKind::Geo], 500).await.expect("queue");
    assert_eq!(geo_queue, vec![geo_job]);

    // 4. load_alive respeta la visibilidad por tipo
    assert!(ledger
        .load_alive(contacts_job, &[RatingKind::Geo])
        .await
        .expect("alive")
        .is_none());

    let alive = ledger
        .load_alive(contacts_job, &[RatingKind::Contacts, RatingKind::ContactsUpdate])
        .await
        .expect("alive")
        .expect("job visible");
    assert_eq!(alive.task_id, 2);
    assert_eq!(alive.kind, RatingKind::Contacts);
    assert_eq!(alive.target_hash, 888);

    // 5. sellar done lo saca del mundo visible
    ledger.close_done(contacts_job).await.expect("close");
    assert!(ledger
        .load_alive(contacts_job, &[RatingKind::Contacts, RatingKind::ContactsUpdate])
        .await
        .expect("alive")
        .is_none());

    let queue_after = ledger
        .build_queue(&[RatingKind::Contacts, RatingKind::ContactsUpdate], 500)
        .await
        .expect("queue");
    assert_eq!(queue_after, vec![update_job]);

    // 6. el scan de abiertos devuelve los que quedan
    let open = ledger
        .scan_open(&[RatingKind::Contacts, RatingKind::ContactsUpdate], 200)
        .await
        .expect("scan");
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, update_job);

    println!("🏁 [INFORME]: ledger certificado.");
}
