// [apps/sender/src/crashloop.rs]
/*!
 * =================================================================
 * APARATO: CRASH-LOOP POLICY
 * CLASIFICACIÓN: APPLICATION KERNEL (ESTRATO L1)
 * RESPONSABILIDAD: FAIL-FAST GLOBAL POR TASA DE ARRANQUES DE SENDERS
 *
 * Regla: >= `limit` eventos START en una ventana deslizante de
 * `window_sec`. Primer disparo = pausa blanda (kill all + 10 min + buffer
 * limpio). Re-disparo tras despertar = hard-dead indefinido. Un bucle de
 * reinicios apretado delata una falla sistémica; seguir golpeando al peer
 * SMTP solo la empeora.
 * =================================================================
 */

use std::collections::VecDeque;

pub const CRASHLOOP_START_LIMIT: usize = 10;
pub const CRASHLOOP_WINDOW_SEC: f64 = 60.0;
pub const SOFT_PAUSE_SEC: u64 = 600;

/// Veredicto de una evaluación de la política.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashLoopAction {
    /// Tasa sana: seguir operando.
    Continue,
    /// Primer disparo: matar todo, limpiar eventos y dormir 10 minutos.
    SoftPause,
    /// Re-disparo: muerte definitiva del supervisor.
    HardDead,
}

#[derive(Debug, Default)]
pub struct CrashLoopPolicy {
    /// Solo eventos START cuentan (nunca terminate/kill).
    start_events: VecDeque<f64>,
    soft_failed_once: bool,
    hard_dead: bool,
}

impl CrashLoopPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hard_dead(&self) -> bool {
        self.hard_dead
    }

    pub fn record_start(&mut self, now_ts: f64) {
        self.start_events.push_back(now_ts);
    }

    pub fn pending_events(&self) -> usize {
        self.start_events.len()
    }

    fn triggered(&mut self, now_ts: f64) -> bool {
        while let Some(oldest) = self.start_events.front() {
            if now_ts - *oldest > CRASHLOOP_WINDOW_SEC {
                self.start_events.pop_front();
            } else {
                break;
            }
        }
        self.start_events.len() >= CRASHLOOP_START_LIMIT
    }

    /// Evalúa la ventana y aplica la transición de estado que toque.
    pub fn evaluate(&mut self, now_ts: f64) -> CrashLoopAction {
        if self.hard_dead {
            return CrashLoopAction::HardDead;
        }
        if !self.triggered(now_ts) {
            return CrashLoopAction::Continue;
        }

        if !self.soft_failed_once {
            self.soft_failed_once = true;
            self.start_events.clear();
            return CrashLoopAction::SoftPause;
        }

        self.hard_dead = true;
        CrashLoopAction::HardDead
    }
}
