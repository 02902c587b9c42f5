// [tests/mirror/apps/sender/crashloop_policy.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE LA POLÍTICA DE CRASH-LOOP
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L1-MIRROR
 * RESPONSABILIDAD: SOFT UNA VEZ, HARD-DEAD A LA SEGUNDA RÁFAGA
 * =================================================================
 */

use serenity_sender::{CrashLoopAction, CrashLoopPolicy};

#[test]
fn certify_ten_starts_in_sixty_seconds_policy() {
    println!("\n💥 [INICIO]: Auditoría de la política de crash-loop...");
    let mut policy = CrashLoopPolicy::new();

    // 1. RÁFAGA: starts en t=0..9 (10 en 10s)
    println!("   🧪 Fase 1: ráfaga de 10 STARTs en 10 segundos...");
    for t in 0..10 {
        policy.record_start(t as f64);
    }

    // 2. TICK 10: pausa blanda + buffer limpio
    let verdict = policy.evaluate(10.0);
    assert_eq!(verdict, CrashLoopAction::SoftPause, "first spike must soft-pause");
    assert_eq!(policy.pending_events(), 0, "event buffer must be cleared on soft pause");
    assert!(!policy.is_hard_dead());

    // 3. TRAS EL DESPERTAR: otra ráfaga 10-en-60s -> hard-dead
    println!("   🧪 Fase 2: re-disparo tras el despertar...");
    for t in 0..10 {
        policy.record_start(700.0 + t as f64);
    }
    assert_eq!(policy.evaluate(710.0), CrashLoopAction::HardDead);
    assert!(policy.is_hard_dead());

    // 4. HARD-DEAD ES DEFINITIVO
    assert_eq!(policy.evaluate(1_000_000.0), CrashLoopAction::HardDead);
    println!("\n🏁 [INFORME]: política certificada (soft -> hard-dead).");
}

#[test]
fn certify_window_is_sliding() {
    let mut policy = CrashLoopPolicy::new();

    // 9 starts viejos + 1 nuevo fuera de la ventana de 60s: sano
    for t in 0..9 {
        policy.record_start(t as f64);
    }
    policy.record_start(120.0);

    assert_eq!(policy.evaluate(121.0), CrashLoopAction::Continue);
}

#[test]
fn certify_terminates_do_not_count() {
    // la política solo observa STARTs: nueve arranques y muchos kills
    // simulados (que NO se registran) jamás disparan
    let mut policy = CrashLoopPolicy::new();
    for t in 0..9 {
        policy.record_start(t as f64);
    }
    assert_eq!(policy.evaluate(9.5), CrashLoopAction::Continue);
}
