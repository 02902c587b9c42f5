// [tests/mirror/libs/domain/rating/admission_guard.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL GUARD DE ADMISIÓN
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: TASA EMPÍRICA DE ADMISIÓN CON RNG SEMBRADO
 * =================================================================
 */

use rand::rngs::StdRng;
use rand::SeedableRng;

use serenity_domain_rating::guard::{admission_allows, remaining_quota};

#[test]
fn certify_admission_rate_near_limit() {
    println!("\n🎲 [INICIO]: Auditoría del guard probabilístico de admisión...");

    // subscribers_limit=100, rated=95, BATCH=20, PARALLEL=10 -> remaining=25
    let remaining = remaining_quota(100, 20, 95);
    assert_eq!(remaining, 25);

    // p esperada = 25 / (20*10) = 0.125
    let mut rng = StdRng::seed_from_u64(0x5EED_CAFE);
    let trials = 10_000usize;
    let admitted = (0..trials)
        .filter(|_| admission_allows(&mut rng, remaining, 20, 10))
        .count();

    let rate = admitted as f64 / trials as f64;
    println!("   📊 admitted={admitted}/{trials} rate={rate:.4}");

    assert!(
        (0.11..=0.14).contains(&rate),
        "empirical admission rate {rate} outside [0.11, 0.14]"
    );
}

#[test]
fn certify_guard_edges() {
    let mut rng = StdRng::seed_from_u64(7);

    // cupo agotado: jamás admite
    for _ in 0..1000 {
        assert!(!admission_allows(&mut rng, 0, 20, 10));
    }

    // lejos del límite: siempre admite
    for _ in 0..1000 {
        assert!(admission_allows(&mut rng, 20 * 10 + 1, 20, 10));
    }
}
