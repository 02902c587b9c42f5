// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORIES REGISTRY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: MATRIZ DE ACCESO A LOS REPOSITORIOS DEL MOTOR
 * =================================================================
 */

pub mod audience;
pub mod campaigns;
pub mod cells;
pub mod contacts;
pub mod inventory;
pub mod rate_contacts;
pub mod rating_jobs;

pub use audience::AudienceRepository;
pub use campaigns::CampaignRepository;
pub use cells::CellRepository;
pub use contacts::ContactsRepository;
pub use inventory::InventoryRepository;
pub use rate_contacts::RateContactsRepository;
pub use rating_jobs::RatingJobRepository;
