// [tests/mirror/libs/domain/crawl/round_robin.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL ROUND-ROBIN DE DESPACHO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: INTERCALADO UNO-A-UNO ESTRICTO SIN SHUFFLE
 * =================================================================
 */

use serenity_domain_crawl::robin::round_robin_one_by_one;

#[test]
fn certify_one_by_one_interleave() {
    let picked = vec![
        (10, vec![101, 102, 103, 104]),
        (20, vec![201]),
        (30, vec![301, 302]),
    ];

    let out = round_robin_one_by_one(picked, 100);

    assert_eq!(
        out,
        vec![
            (101, 10),
            (201, 20),
            (301, 30),
            (102, 10),
            (302, 30),
            (103, 10),
            (104, 10),
        ]
    );
}

#[test]
fn certify_combined_cap() {
    let picked = vec![(1, (0..400).collect::<Vec<i64>>()), (2, (1000..1400).collect())];
    let out = round_robin_one_by_one(picked, 500);

    assert_eq!(out.len(), 500, "combined queue must cap at the build limit");

    // el intercalado se mantiene hasta el corte
    assert_eq!(out[0].1, 1);
    assert_eq!(out[1].1, 2);
    assert_eq!(out[2].1, 1);
    assert_eq!(out[3].1, 2);
}

#[test]
fn certify_degenerate_inputs() {
    assert!(round_robin_one_by_one(Vec::new(), 10).is_empty());
    assert!(round_robin_one_by_one(vec![(1, Vec::new())], 10).is_empty());
    assert!(round_robin_one_by_one(vec![(1, vec![5])], 0).is_empty());
}
