// [tests/mirror/libs/domain/validate/email_statuses.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE ESTADOS DE EMAIL
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: EMPTY / SYNTAX / MX / ALLOWLIST / OK SOBRE BASE REAL
 * =================================================================
 */

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use libsql::params;

use serenity_domain_validate::{EmailValidator, MxResolver};
use serenity_infra_db::SerenityDb;

/// Resolver de tabla fija: el DNS real es un colaborador externo.
struct TableResolver {
    table: HashMap<String, bool>,
}

impl MxResolver for TableResolver {
    fn has_mx<'a>(&'a self, domain: &'a str) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        let verdict = self.table.get(domain).copied().unwrap_or(false);
        Box::pin(async move { verdict })
    }
}

async fn seed_raw(connection: &libsql::Connection, raw_id: i64, email: Option<&str>) {
    connection
        .execute(
            r#"
            INSERT INTO raw_contacts_gb (id, cb_crawler_id, company_name, email)
            VALUES (?1, 1, 'Firma', ?2)
            "#,
            params![raw_id, email.unwrap_or("")],
        )
        .await
        .expect("seed raw");
}

async fn status_of(connection: &libsql::Connection, raw_id: i64) -> (String, String) {
    let mut rows = connection
        .query(
            "SELECT email, status_email FROM raw_contacts_gb WHERE id = ?1",
            params![raw_id],
        )
        .await
        .expect("select");
    let row = rows.next().await.expect("row").expect("raw row");
    (
        row.get::<String>(0).expect("email"),
        row.get::<String>(1).expect("status"),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn certify_email_status_matrix() {
    let database = SerenityDb::connect("file:mem_email_statuses?mode=memory&cache=shared", None)
        .await
        .expect("memory db");
    let connection = database.get_connection().expect("conn");

    seed_raw(&connection, 1, Some("  ")).await; // EMPTY
    seed_raw(&connection, 2, Some("broken@@syntax.de")).await; // WRONG EMAIL SYNTAX
    seed_raw(&connection, 3, Some("info@dead-domain.de")).await; // WRONG DOMAIN MX
    seed_raw(&connection, 4, Some("info@live-domain.de")).await; // OK via MX
    seed_raw(&connection, 5, Some("  Kontakt@GMX.de ")).await; // OK via allowlist

    let resolver = TableResolver {
        table: HashMap::from([
            ("live-domain.de".to_string(), true),
            ("dead-domain.de".to_string(), false),
        ]),
    };

    let validator = EmailValidator::new(
        database.clone(),
        Arc::new(resolver),
        HashSet::from(["gmx.de".to_string()]),
    );

    validator.run_batch().await.expect("validation batch");

    assert_eq!(status_of(&connection, 1).await.1, "EMPTY");
    assert_eq!(status_of(&connection, 2).await.1, "WRONG EMAIL SYNTAX");
    assert_eq!(status_of(&connection, 3).await.1, "WRONG DOMAIN MX");

    // éxito: estado OK y email reescrito recortado
    let (email_ok, status_ok) = status_of(&connection, 4).await;
    assert_eq!(status_ok, "OK");
    assert_eq!(email_ok, "info@live-domain.de");

    // allowlist: OK sin pasar por el resolver (el dominio no está en la tabla)
    let (email_allow, status_allow) = status_of(&connection, 5).await;
    assert_eq!(status_allow, "OK");
    assert_eq!(email_allow, "Kontakt@GMX.de");
}
