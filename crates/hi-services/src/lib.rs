//! Command surface for Humidity Intelligence
//!
//! A [`ServiceRegistry`] dispatches JSON service data to async handlers. The
//! handlers in [`handlers`] act on the engine's shared pause, control and
//! runtime state and never block a running cycle.

pub mod handlers;
mod presentation;
mod registry;

pub use handlers::{register_services, EvaluateRequest, ServiceContext};
pub use presentation::{EntityMapHook, PresentationError, PresentationHook};
pub use registry::{
    ServiceCall, ServiceDescription, ServiceError, ServiceFuture, ServiceHandler, ServiceRegistry, ServiceResult,
    SharedServiceRegistry,
};
