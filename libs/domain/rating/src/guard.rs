// [libs/domain/rating/src/guard.rs]
/*!
 * =================================================================
 * APARATO: ADMISSION GUARD
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: CONTROL PROBABILÍSTICO DE SOBREPASO DEL LÍMITE
 *
 * # Mathematical Proof (Overshoot Bound):
 * Con N workers paralelos y lotes de B, el peor sobrepaso sin guard es
 * N×B. Admitiendo con probabilidad remaining/(B×N) cerca del límite, el
 * número esperado de lotes simultáneos admitidos cae proporcionalmente a
 * lo que falta: el sobrepaso esperado queda en ~1-2 lotes.
 * =================================================================
 */

use rand::Rng;

/// Cupo restante del stream contacts: umbral (limit + batch) menos lo ya
/// rankeado válido.
pub fn remaining_quota(subscribers_limit: i64, batch_size: i64, rated_count: i64) -> i64 {
    subscribers_limit + batch_size - rated_count
}

/// Decide si se admite un lote nuevo cerca del límite.
///
/// - remaining <= 0              -> nunca
/// - remaining > B×N (ventana)   -> siempre
/// - si no                        -> con probabilidad remaining/(B×N)
pub fn admission_allows<R: Rng>(
    rng: &mut R,
    remaining: i64,
    batch_size: i64,
    guard_max_parallel: i64,
) -> bool {
    if remaining <= 0 {
        return false;
    }

    let safe_window = batch_size * guard_max_parallel;
    if remaining > safe_window {
        return true;
    }

    rng.gen::<f64>() < remaining as f64 / safe_window as f64
}
