//! Infrastructure layer: event store, dispatch, read models and the
//! application services built on them.

pub mod backoffice;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod quota;
pub mod read_model;
pub mod services;


pub use backoffice::Backoffice;
pub use command_dispatcher::{CommandDispatcher, DispatchError, Staged, UnitOfWork};
pub use config::EngineConfig;
pub use quota::{QuotaPeriod, Reservation, TenantQuotas};
