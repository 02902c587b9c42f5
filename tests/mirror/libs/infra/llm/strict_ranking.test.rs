// [tests/mirror/libs/infra/llm/strict_ranking.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL RANKING ESTRICTO
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: FAIL-CLOSED ANTE CUALQUIER DESVÍO DEL ORÁCULO
 * =================================================================
 */

use std::collections::HashMap;

use serenity_infra_llm::rank::{parse_strict_ranked_list, validate_against_candidates};

fn candidates() -> HashMap<i64, String> {
    HashMap::from([
        (1, "Bäckereien".to_string()),
        (2, "Dachdecker".to_string()),
        (3, "Steuerberater".to_string()),
    ])
}

#[test]
fn certify_happy_path() {
    let raw = r#"[
        {"id": 1, "name": "Bäckereien", "rate": 91},
        {"id": 2, "name": "Dachdecker", "rate": 14},
        {"id": 3, "name": "Steuerberater", "rate": 55}
    ]"#;

    let ranked = parse_strict_ranked_list(raw).expect("valid ranking");
    let validated = validate_against_candidates(&ranked, &candidates());

    assert_eq!(validated, vec![(1, 91), (2, 14), (3, 55)]);
}

#[test]
fn certify_every_deviation_fails_closed() {
    // fences de markdown
    assert!(parse_strict_ranked_list("```json\n[{\"id\":1,\"name\":\"x\",\"rate\":5}]\n```").is_none());
    // texto alrededor del JSON
    assert!(parse_strict_ranked_list("Here you go: [ ]").is_none());
    // objeto en vez de array
    assert!(parse_strict_ranked_list("{\"items\": []}").is_none());
    // rate fuera de [1,100]
    assert!(parse_strict_ranked_list(r#"[{"id":1,"name":"x","rate":0}]"#).is_none());
    assert!(parse_strict_ranked_list(r#"[{"id":1,"name":"x","rate":101}]"#).is_none());
    // clave extra
    assert!(parse_strict_ranked_list(r#"[{"id":1,"name":"x","rate":5,"note":"?"}]"#).is_none());
    // clave faltante
    assert!(parse_strict_ranked_list(r#"[{"id":1,"rate":5}]"#).is_none());
    // nombre vacío
    assert!(parse_strict_ranked_list(r#"[{"id":1,"name":"  ","rate":5}]"#).is_none());

    // id fuera del set de candidatos
    let ranked = parse_strict_ranked_list(r#"[{"id":99,"name":"Bäckereien","rate":5}]"#).unwrap();
    assert!(validate_against_candidates(&ranked, &candidates()).is_empty());

    // nombre que no coincide con el candidato enviado
    let ranked = parse_strict_ranked_list(r#"[{"id":1,"name":"Baeckereien","rate":5}]"#).unwrap();
    assert!(validate_against_candidates(&ranked, &candidates()).is_empty());

    // id duplicado
    let ranked = parse_strict_ranked_list(
        r#"[{"id":1,"name":"Bäckereien","rate":5},{"id":1,"name":"Bäckereien","rate":9}]"#,
    )
    .unwrap();
    assert!(validate_against_candidates(&ranked, &candidates()).is_empty());
}
