// [apps/sender/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SENDER ROOT
 * CLASIFICACIÓN: APPLICATION (ESTRATO L1)
 * RESPONSABILIDAD: EXPOSICIÓN DE SUPERVISOR, LOOP Y POLÍTICA DE FALLOS
 * =================================================================
 */

pub mod crashloop;
pub mod mailbox;
pub mod supervisor;
pub mod transport;

pub use crashloop::{CrashLoopAction, CrashLoopPolicy};
pub use supervisor::SenderSupervisor;
pub use transport::MailTransport;
