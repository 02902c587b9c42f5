// [libs/domain/inventory/src/topk.rs]
/*!
 * =================================================================
 * APARATO: TOP-K PAIR MERGE
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: K-WAY MERGE DE (PLZ-RATE × BRANCH-RATE) POR MIN-HEAP
 *
 * # Mathematical Proof (Heap Merge):
 * Ambas secuencias llegan ordenadas ascendentes por rate. Tomando la más
 * corta como "outer" se siembra el heap con el primer producto de cada
 * outer; cada pop empuja el siguiente inner de ese outer. El heap nunca
 * supera |outer| elementos y los k primeros pops salen en orden
 * ascendente de score (empates por plz, branch, índice).
 * =================================================================
 */

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// (city_rate, plz) ordenado ascendente.
pub type PlzRate = (i64, String);
/// (branch_rate, branch_id) ordenado ascendente.
pub type BranchRate = (i64, i64);
/// (plz, branch_id, score) con score = city_rate × branch_rate.
pub type ScoredPair = (String, i64, i64);

/// Los k pares de menor score del producto cruzado.
pub fn top_k_pairs(plz_rates: &[PlzRate], branch_rates: &[BranchRate], k: usize) -> Vec<ScoredPair> {
    if plz_rates.is_empty() || branch_rates.is_empty() || k == 0 {
        return Vec::new();
    }

    let outer_is_branch = branch_rates.len() <= plz_rates.len();

    // item del heap: (score, plz, branch_id, outer_idx, inner_idx)
    type HeapItem = (i64, String, i64, usize, usize);
    let mut heap: BinaryHeap<Reverse<HeapItem>> = BinaryHeap::new();

    let combine = |outer_idx: usize, inner_idx: usize| -> HeapItem {
        if outer_is_branch {
            let (branch_rate, branch_id) = &branch_rates[outer_idx];
            let (city_rate, plz) = &plz_rates[inner_idx];
            (branch_rate * city_rate, plz.clone(), *branch_id, outer_idx, inner_idx)
        } else {
            let (city_rate, plz) = &plz_rates[outer_idx];
            let (branch_rate, branch_id) = &branch_rates[inner_idx];
            (city_rate * branch_rate, plz.clone(), *branch_id, outer_idx, inner_idx)
        }
    };

    let outer_len = if outer_is_branch { branch_rates.len() } else { plz_rates.len() };
    let inner_len = if outer_is_branch { plz_rates.len() } else { branch_rates.len() };

    for outer_idx in 0..outer_len {
        heap.push(Reverse(combine(outer_idx, 0)));
    }

    let mut out: Vec<ScoredPair> = Vec::with_capacity(k.min(outer_len * inner_len));
    while let Some(Reverse((score, plz, branch_id, outer_idx, inner_idx))) = heap.pop() {
        out.push((plz, branch_id, score));
        if out.len() >= k {
            break;
        }

        let next_inner = inner_idx + 1;
        if next_inner < inner_len {
            heap.push(Reverse(combine(outer_idx, next_inner)));
        }
    }

    out
}
