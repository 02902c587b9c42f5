// [libs/domain/crawl/src/robin.rs]
/*!
 * =================================================================
 * APARATO: ROUND-ROBIN INTERLEAVER
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: INTERCALADO UNO-A-UNO ENTRE TAREAS, SIN SHUFFLE
 * =================================================================
 */

/// Intercala uno-a-uno los picks de cada tarea preservando el orden de
/// llegada de las tareas. Corta en `limit` o cuando todas se agotan.
pub fn round_robin_one_by_one(mut picked: Vec<(i64, Vec<i64>)>, limit: usize) -> Vec<(i64, i64)> {
    let mut out: Vec<(i64, i64)> = Vec::new();
    if limit == 0 || picked.is_empty() {
        return out;
    }

    // consumimos por el frente de cada lista, en pasadas completas
    let mut cursors: Vec<usize> = vec![0; picked.len()];

    'outer: loop {
        let mut progressed = false;

        for (slot, (task_id, cb_ids)) in picked.iter_mut().enumerate() {
            let cursor = cursors[slot];
            if cursor >= cb_ids.len() {
                continue;
            }

            out.push((cb_ids[cursor], *task_id));
            cursors[slot] += 1;
            progressed = true;

            if out.len() >= limit {
                break 'outer;
            }
        }

        if !progressed {
            break;
        }
    }

    out
}
