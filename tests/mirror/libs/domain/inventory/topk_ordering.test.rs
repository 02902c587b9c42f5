// [tests/mirror/libs/domain/inventory/topk_ordering.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL TOP-K DE CELDAS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: ORDEN POR PRODUCTO DE RATES Y SLICES DE VENTANA
 * =================================================================
 */

use serenity_domain_inventory::topk::top_k_pairs;
use serenity_domain_inventory::{crawler_slice, expand_full_slice, expand_slice, first_uncollected_idx, CB_DIFF};
use serenity_domain_models::crawl::CellValue;

#[test]
fn certify_seed_scenario_scores_ascending() {
    // plz_rates = [(1,"10115"), (2,"10117")], branch_rates = [(3,7), (5,11)]
    let plz_rates = vec![(1, "10115".to_string()), (2, "10117".to_string())];
    let branch_rates = vec![(3, 7), (5, 11)];

    let out = top_k_pairs(&plz_rates, &branch_rates, 3);

    // productos: 3,5,6,10 -> los tres primeros en orden ascendente de score
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], ("10115".to_string(), 7, 3));
    assert_eq!(out[1], ("10115".to_string(), 11, 5));
    assert_eq!(out[2], ("10117".to_string(), 7, 6));

    let scores: Vec<i64> = out.iter().map(|(_, _, score)| *score).collect();
    let mut sorted = scores.clone();
    sorted.sort_unstable();
    assert_eq!(scores, sorted, "scores must come out ascending");
}

#[test]
fn certify_merge_is_exhaustive_and_stable() {
    let plz_rates = vec![
        (1, "10115".to_string()),
        (2, "10117".to_string()),
        (4, "20095".to_string()),
    ];
    let branch_rates = vec![(2, 7), (3, 11)];

    let all = top_k_pairs(&plz_rates, &branch_rates, 100);
    assert_eq!(all.len(), plz_rates.len() * branch_rates.len());

    // cada par (plz, branch) aparece exactamente una vez
    let mut keys: Vec<(String, i64)> = all.iter().map(|(plz, b, _)| (plz.clone(), *b)).collect();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), all.len(), "duplicated pair in merge output");
}

fn value(cb_id: i64, rate: i64, collected: bool) -> CellValue {
    CellValue { cb_id, rate, collected }
}

#[test]
fn certify_window_slices() {
    let mut values = vec![value(1, 1, true), value(2, 2, false), value(3, 3, true)];
    for i in 0..(3 * CB_DIFF as i64) {
        values.push(value(100 + i, 10 + i, false));
    }

    assert_eq!(first_uncollected_idx(&values), Some(1));

    let crawler = crawler_slice(&values);
    assert_eq!(crawler.len(), 2 * CB_DIFF, "crawler view must cap at 2×CB_DIFF");
    assert!(crawler.iter().all(|v| !v.collected));
    assert_eq!(crawler[0].cb_id, 2, "crawler view starts at first uncollected");

    let expand = expand_slice(&values);
    assert!(expand.len() <= 2 * CB_DIFF);
    assert_eq!(expand[0].cb_id, 1, "±window starts before first uncollected");

    let full = expand_full_slice(&values);
    assert_eq!(full.last().unwrap().cb_id, 2, "prefix ends at first uncollected");
}
