// [tests/mirror/libs/infra/db/contacts_aggregation.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL REPOSITORIO DE CONTACTOS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: UNICIDAD POR EMAIL, PAYLOADS Y CRUCE DE CELDAS
 * =================================================================
 */

use serde_json::json;

use serenity_domain_models::crawl::RawCandidate;
use serenity_infra_db::repositories::ContactsRepository;
use serenity_infra_db::SerenityDb;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_aggregate_email_uniqueness() {
    let database = SerenityDb::connect("file:mem_contacts_repo?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let contacts = ContactsRepository::new(database.get_connection().expect("conn"));

    let aggregate_id = contacts
        .insert_aggregate(
            "a@x",
            "ACME",
            &[501],
            &["GelbeSeiten".to_string()],
            &[1],
            &["10115".to_string()],
            &[],
            &json!({"norm": {"company_name": "ACME"}}),
            "NO WEB - NO DESCR",
        )
        .await
        .expect("insert");

    // el mismo email jamás produce una segunda fila
    let duplicate_attempt = contacts
        .insert_aggregate(
            "a@x",
            "ACME COPY",
            &[502],
            &["GelbeSeiten".to_string()],
            &[2],
            &[],
            &[],
            &json!({}),
            "NO WEB - NO DESCR",
        )
        .await;
    assert!(duplicate_attempt.is_err(), "unique(email) must reject the duplicate");

    let found = contacts
        .find_aggregate_by_email("a@x")
        .await
        .expect("find")
        .expect("row");
    assert_eq!(found.id, aggregate_id);
    assert_eq!(found.cb_crawler_ids, vec![501]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_payload_order_and_cell_intersection() {
    let database = SerenityDb::connect("file:mem_contacts_payloads?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let contacts = ContactsRepository::new(database.get_connection().expect("conn"));

    let mut ids = Vec::new();
    for (email, cells) in [("a@x", vec![11, 12]), ("b@x", vec![12]), ("c@x", vec![99])] {
        let id = contacts
            .insert_aggregate(
                email,
                "Firma",
                &cells,
                &["GelbeSeiten".to_string()],
                &[],
                &[],
                &[],
                &json!({"norm": {"company_name": email}}),
                "NO WEB - NO DESCR",
            )
            .await
            .expect("insert");
        ids.push(id);
    }

    // el orden de entrada se preserva y los ausentes se omiten
    let requested = vec![ids[2], 777_777, ids[0]];
    let payloads = contacts.load_company_payloads(&requested).await.expect("payloads");
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].0, ids[2]);
    assert_eq!(payloads[1].0, ids[0]);

    // intersección de celdas: el lote {12} toca a a@x y b@x, no a c@x
    let touching = contacts.aggregates_touching_cells(&[12]).await.expect("touching");
    let touched_ids: Vec<i64> = touching.iter().map(|(id, _)| *id).collect();
    assert!(touched_ids.contains(&ids[0]));
    assert!(touched_ids.contains(&ids[1]));
    assert!(!touched_ids.contains(&ids[2]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_raw_candidate_intake() {
    let database = SerenityDb::connect("file:mem_contacts_intake?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let contacts = ContactsRepository::new(database.get_connection().expect("conn"));

    let emitted = vec![
        RawCandidate {
            cb_crawler_id: 42,
            company_name: "Bäckerei Sonne".into(),
            email: Some("info@sonne.de".into()),
            company_data: json!({"plz": "10115"}),
        },
        RawCandidate {
            cb_crawler_id: 42,
            company_name: "Ohne Mail GmbH".into(),
            email: None,
            company_data: json!({}),
        },
    ];

    let ingested = contacts.insert_raw_candidates(&emitted).await.expect("intake");
    assert_eq!(ingested, 2);

    let pending = contacts.pick_unvalidated(100).await.expect("pending");
    assert_eq!(pending.len(), 2, "both raw rows await email validation");
}
