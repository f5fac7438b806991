pub mod assembler;
pub mod compiler;
pub mod disks;
pub mod engine;
pub mod firewall;
pub mod identity;
pub mod metadata;
pub mod model;
pub mod network;
pub mod operation;
pub mod reference;
pub mod request;
pub mod result;
pub mod scheduling;

pub use engine::Provisioner;
pub use model::{ProvisioningConfig, ProvisioningModel, Scope};
pub use operation::OperationPoller;
pub use request::InstanceRequest;
pub use result::ProvisioningResult;
