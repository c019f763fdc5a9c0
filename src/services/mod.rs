//! Oracle services: contract access, bootstrap, event listening and response dispatch

pub mod dispatcher;
pub mod event_listener;
pub mod flight_surety;
pub mod registration;
pub mod remote_authority;
pub mod status_policy;

pub use dispatcher::{DispatchReport, DispatchStats, DispatchStatsSnapshot, ResponseDispatcher};
pub use event_listener::EventListener;
pub use registration::{BootstrapReport, RegistrationCoordinator, RetryPolicy};
pub use remote_authority::{JsonRpcAuthority, RemoteAuthority};
pub use status_policy::{FixedStatusPolicy, RandomStatusPolicy, StatusCodePolicy};
