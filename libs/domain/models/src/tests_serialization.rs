// [libs/domain/models/src/tests_serialization.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE CONTRATOS DE DOMINIO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2
 * RESPONSABILIDAD: PARIDAD DE SERIALIZACIÓN DE LOS DTO SOBERANOS
 * =================================================================
 */

use serenity_domain_models::contact::{EmailField, NormProfile};
use serenity_domain_models::crawl::QueueItem;
use serenity_domain_models::heartbeat::{HeartbeatPulse, SenderSignal, SenderState};
use serenity_domain_models::rating::RatingKind;
use serenity_domain_models::task::TaskMode;

#[test]
fn rating_kind_round_trips_through_db_labels() {
    for kind in [
        RatingKind::Geo,
        RatingKind::Branches,
        RatingKind::Contacts,
        RatingKind::ContactsUpdate,
    ] {
        assert_eq!(RatingKind::from_db(kind.as_str()), Some(kind));
    }
    assert_eq!(RatingKind::from_db("bogus"), None);

    // contacts y contacts_update comparten el mismo espacio de colas.
    assert_eq!(RatingKind::Contacts.queue_namespace(), "contacts");
    assert_eq!(RatingKind::ContactsUpdate.queue_namespace(), "contacts");
}

#[test]
fn task_mode_is_tolerant_on_ingest() {
    assert_eq!(TaskMode::from_db(" BUY "), TaskMode::Buy);
    assert_eq!(TaskMode::from_db("sell"), TaskMode::Sell);
    assert_eq!(TaskMode::from_db("anything-else"), TaskMode::Sell);
}

#[test]
fn email_field_collapses_by_cardinality_in_json() {
    let one = NormProfile {
        email: Some(EmailField::One("a@x".into())),
        ..Default::default()
    };
    let many = NormProfile {
        email: Some(EmailField::Many(vec!["a@x".into(), "b@x".into()])),
        ..Default::default()
    };

    let one_json = serde_json::to_value(&one).unwrap();
    let many_json = serde_json::to_value(&many).unwrap();

    assert_eq!(one_json["email"], serde_json::json!("a@x"));
    assert_eq!(many_json["email"], serde_json::json!(["a@x", "b@x"]));
}

#[test]
fn sender_signal_wire_format_is_tagged() {
    let pulse = SenderSignal::Hb(HeartbeatPulse {
        mailbox_id: 7,
        ts: 100.0,
        next_wake_at: 160.0,
        state: SenderState::Sleep,
        campaign_id: Some(3),
        reason: String::new(),
    });

    let encoded = serde_json::to_value(&pulse).unwrap();
    assert_eq!(encoded["type"], "hb");
    assert_eq!(encoded["state"], "SLEEP");

    let decoded: SenderSignal = serde_json::from_value(encoded).unwrap();
    match decoded {
        SenderSignal::Hb(hb) => assert_eq!(hb.mailbox_id, 7),
        SenderSignal::Dead(_) => panic!("wrong variant"),
    }
}

#[test]
fn queue_item_survives_msgpack_style_tuple_compaction() {
    let item = QueueItem {
        cb_crawler_id: 91,
        plz: "10115".into(),
        branch_slug: "baeckereien".into(),
        task_id: 4,
    };
    let raw = serde_json::to_string(&item).unwrap();
    let back: QueueItem = serde_json::from_str(&raw).unwrap();
    assert_eq!(back, item);
}
