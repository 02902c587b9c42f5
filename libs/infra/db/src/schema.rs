// [libs/infra/db/src/schema.rs]
/*!
 * =================================================================
 * APARATO: SCHEMA BOOTSTRAP
 * CLASIFICACIÓN: INFRASTRUCTURE SQL (ESTRATO L3)
 * RESPONSABILIDAD: MATERIALIZACIÓN IDEMPOTENTE DEL ESQUEMA COMPLETO
 *
 * Convenciones del dialecto:
 * - Booleanos como INTEGER 0/1.
 * - JSON (perfiles, arrays de ids, ventanas) como TEXT con funciones json1.
 * - Timestamps ISO-8601 via CURRENT_TIMESTAMP (orden lexicográfico = orden
 *   temporal).
 * =================================================================
 */

use libsql::Connection;

use crate::errors::DbError;

const SCHEMA_STATEMENTS: &[&str] = &[
    // --- ESPECIFICACIONES DE AUDIENCIA ---
    r#"
    CREATE TABLE IF NOT EXISTS aap_audience_audiencetask (
        id                INTEGER PRIMARY KEY AUTOINCREMENT,
        workspace_id      TEXT NOT NULL DEFAULT '',
        user_id           INTEGER NOT NULL DEFAULT 0,
        type              TEXT NOT NULL DEFAULT 'sell',
        task              TEXT NOT NULL DEFAULT '',
        task_geo          TEXT NOT NULL DEFAULT '',
        task_branches     TEXT NOT NULL DEFAULT '',
        task_client       TEXT NOT NULL DEFAULT '',
        subscribers_limit INTEGER NOT NULL DEFAULT 0,
        run_processing    INTEGER NOT NULL DEFAULT 0,
        collected         INTEGER NOT NULL DEFAULT 0,
        archived          INTEGER NOT NULL DEFAULT 0,
        created_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // --- LEDGER APPEND-ONLY DE TRABAJOS DE RATING ---
    r#"
    CREATE TABLE IF NOT EXISTS __tasks_rating (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id    INTEGER NOT NULL,
        type       TEXT NOT NULL,
        hash_task  INTEGER,
        done       INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_tasks_rating_open ON __tasks_rating (done, type, created_at)",
    // --- CELDAS PUNTUADAS POR TAREA ---
    r#"
    CREATE TABLE IF NOT EXISTS crawl_tasks (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        workspace_id TEXT NOT NULL DEFAULT '',
        user_id      INTEGER NOT NULL DEFAULT 0,
        task_id      INTEGER NOT NULL,
        type         TEXT NOT NULL,
        value_id     INTEGER NOT NULL,
        rate         INTEGER NOT NULL DEFAULT 0,
        hash_task    INTEGER,
        created_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at   TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (task_id, type, value_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_crawl_tasks_task ON crawl_tasks (task_id, type)",
    // --- INVENTARIO GEOGRÁFICO Y DE RAMAS ---
    r#"
    CREATE TABLE IF NOT EXISTS cities_sys (
        id          INTEGER PRIMARY KEY,
        name        TEXT NOT NULL,
        state_name  TEXT,
        urban_code  TEXT,
        urban_name  TEXT,
        travel_code TEXT,
        travel_name TEXT,
        pop_total   INTEGER,
        area_km2    REAL,
        pop_density REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS gb_branches (
        id   INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        slug TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS __city__plz_map (
        city_id INTEGER NOT NULL,
        plz     TEXT NOT NULL,
        UNIQUE (city_id, plz)
    )
    "#,
    // --- INVENTARIO DE CELDAS DEL DIRECTORIO ---
    r#"
    CREATE TABLE IF NOT EXISTS cb_crawler (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        plz           TEXT NOT NULL,
        branch_id     INTEGER NOT NULL,
        branch_slug   TEXT NOT NULL DEFAULT '',
        collected     INTEGER NOT NULL DEFAULT 0,
        collected_num INTEGER NOT NULL DEFAULT 0,
        UNIQUE (plz, branch_id)
    )
    "#,
    // --- ATRIBUCIÓN DE DESPACHOS ---
    r#"
    CREATE TABLE IF NOT EXISTS queue_sys (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id       INTEGER NOT NULL,
        cb_crawler_id INTEGER NOT NULL,
        created_at    TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_queue_sys_task ON queue_sys (task_id, cb_crawler_id)",
    // --- FILAS CRUDAS DE SPIDERS ---
    r#"
    CREATE TABLE IF NOT EXISTS raw_contacts_gb (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        cb_crawler_id   INTEGER NOT NULL,
        company_name    TEXT NOT NULL DEFAULT '',
        email           TEXT,
        company_data    TEXT NOT NULL DEFAULT '{}',
        status_email    TEXT,
        processed_email INTEGER NOT NULL DEFAULT 0,
        processed       INTEGER NOT NULL DEFAULT 0,
        created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_raw_gb_pending ON raw_contacts_gb (processed_email, processed)",
    // --- TABLA AGREGADA (DEDUP POR EMAIL) ---
    r#"
    CREATE TABLE IF NOT EXISTS raw_contacts_aggr (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        cb_crawler_ids TEXT NOT NULL DEFAULT '[]',
        sources        TEXT NOT NULL DEFAULT '[]',
        company_name   TEXT,
        branches       TEXT NOT NULL DEFAULT '[]',
        plz_list       TEXT NOT NULL DEFAULT '[]',
        address_list   TEXT NOT NULL DEFAULT '[]',
        email          TEXT NOT NULL UNIQUE,
        company_data   TEXT NOT NULL DEFAULT '{}',
        status_data    TEXT NOT NULL DEFAULT '',
        updated_at     TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // --- RATINGS DE CONTACTOS POR TAREA ---
    r#"
    CREATE TABLE IF NOT EXISTS rate_contacts (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id    INTEGER NOT NULL,
        contact_id INTEGER NOT NULL,
        cb_id      INTEGER,
        rate_cb    INTEGER,
        rate_cl    INTEGER,
        hash_task  INTEGER,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (task_id, contact_id)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_rate_contacts_task ON rate_contacts (task_id, rate_cl)",
    // --- HUELLA SELLADA POR TAREA (HASH-GUARD) ---
    r#"
    CREATE TABLE IF NOT EXISTS __task__kt_hash (
        task_id    INTEGER PRIMARY KEY,
        kt_hash    TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // --- LEDGERS DE PRIORIDAD ---
    r#"
    CREATE TABLE IF NOT EXISTS ___crawler_priority (
        task_id    INTEGER PRIMARY KEY,
        prio       INTEGER NOT NULL DEFAULT 1,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS __enrich_priority (
        task_id    INTEGER PRIMARY KEY,
        en_needed  INTEGER NOT NULL DEFAULT 0,
        en_done    INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // --- MATERIALIZACIÓN DE LISTAS Y ENVÍO ---
    r#"
    CREATE TABLE IF NOT EXISTS ws_contacts (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        workspace_id TEXT NOT NULL,
        contact_id   INTEGER NOT NULL,
        UNIQUE (workspace_id, contact_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lists_contacts (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        list_id    INTEGER NOT NULL,
        contact_id INTEGER NOT NULL,
        active     INTEGER NOT NULL DEFAULT 1
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_lists_contacts_list ON lists_contacts (list_id, active)",
    r#"
    CREATE TABLE IF NOT EXISTS campaigns_campaigns (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        workspace_id    TEXT NOT NULL DEFAULT '',
        mailbox_id      INTEGER NOT NULL,
        mailing_list_id INTEGER NOT NULL,
        window          TEXT NOT NULL DEFAULT '{}',
        active          INTEGER NOT NULL DEFAULT 0,
        start_at        TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        end_at          TEXT
    )
    "#,
    // La unicidad (campaign, contact) es la garantía dura de no-doble-envío.
    r#"
    CREATE TABLE IF NOT EXISTS mailbox_sent (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        campaign_id     INTEGER NOT NULL,
        rate_contact_id INTEGER NOT NULL,
        created_at      TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        UNIQUE (campaign_id, rate_contact_id)
    )
    "#,
    // Credenciales SMTP selladas con v1:gcm (las abre el transporte real).
    r#"
    CREATE TABLE IF NOT EXISTS aap_settings_smtp_mailboxes (
        mailbox_id           INTEGER PRIMARY KEY,
        limit_hour_sent      INTEGER NOT NULL DEFAULT 0,
        smtp_user            TEXT NOT NULL DEFAULT '',
        smtp_password_sealed TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS aap_settings_sending_settings (
        workspace_id TEXT PRIMARY KEY,
        value_json   TEXT NOT NULL DEFAULT '{}'
    )
    "#,
];

/// Aplica el esquema completo de forma idempotente.
pub async fn apply_full_schema(connection: &Connection) -> Result<(), DbError> {
    for statement in SCHEMA_STATEMENTS {
        connection.execute(statement, ()).await?;
    }
    Ok(())
}
