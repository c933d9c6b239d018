pub mod clock;
pub mod echo;
pub mod executor;
pub mod registry;

pub use clock::ClockService;
pub use echo::EchoService;
pub use executor::ServiceExecutor;
pub use registry::{CapabilityRegistry, Service, ServiceError, ServiceInfo, ServiceRegistry, ToolSpec};
