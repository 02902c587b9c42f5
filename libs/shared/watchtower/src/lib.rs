// [libs/shared/watchtower/src/lib.rs]
/*!
 * =================================================================
 * APARATO: WATCHTOWER OBSERVER
 * CLASIFICACIÓN: SHARED UTILITY (ESTRATO L4)
 * RESPONSABILIDAD: GESTIÓN DE TELEMETRÍA, TRAZADO Y CAPTURA DE PÁNICOS
 *
 * # Mathematical Proof (Observability Integrity):
 * El registro no bloqueante garantiza que el rastro de ejecución de los
 * workers de larga vida (scheduler, sender, cache-daemon) se preserve
 * incluso ante una terminación abrupta del host.
 * =================================================================
 */

use std::panic;

use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as formatting_layer, EnvFilter};

/// Inicializa el sistema de trazas con blindaje de pánicos global.
///
/// # Comportamiento:
/// - Desarrollo: logs compactos de alta legibilidad.
/// - Producción: estructura JSON plana para ingesta externa.
///
/// # Panics:
/// Si otro suscriptor global ya fue inicializado en el runtime.
pub fn init_tracing(service_nominal_identifier: &str) {
    // Priorizamos los logs de nuestro dominio y silenciamos ruidos de
    // infraestructura (hyper, libsql).
    let environmental_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{}={level},hyper=warn,reqwest=warn,libsql=error",
            service_nominal_identifier.replace('-', "_"),
            level = if cfg!(debug_assertions) { "debug" } else { "info" }
        )
        .into()
    });

    let is_production_strata = !cfg!(debug_assertions);

    if is_production_strata {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(environmental_filter)
            .with(formatting_layer::layer().compact().with_target(false))
            .init();
    }

    install_panic_hook(service_nominal_identifier);

    info!(
        "👁️  [WATCHTOWER_ONLINE]: Observability levelized for [{}].",
        service_nominal_identifier
    );
}

/// Hook global de pánicos: cualquier colapso en tareas secundarias queda
/// registrado con coordenadas de archivo antes de la defunción del proceso.
fn install_panic_hook(service_nominal_identifier: &str) {
    let service_id_snapshot = service_nominal_identifier.to_string();

    panic::set_hook(Box::new(move |panic_metadata| {
        let panic_location = panic_metadata
            .location()
            .map(|location| format!("{}:{}:{}", location.file(), location.line(), location.column()))
            .unwrap_or_else(|| "UNKNOWN_COORDINATES".to_string());

        let panic_payload_message = panic_metadata
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| {
                panic_metadata
                    .payload()
                    .downcast_ref::<String>()
                    .map(|s| s.as_str())
            })
            .unwrap_or("UNDEFINED_PANIC_PAYLOAD");

        error!(
            target: "panic_monitor",
            service = %service_id_snapshot,
            location = %panic_location,
            "🔥 [CRITICAL_PANIC]: Thread terminated abruptly. Analysis: {}",
            panic_payload_message
        );
    }));
}
