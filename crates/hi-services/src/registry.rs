//! Service registry with async handlers
//!
//! Services are keyed by name under the integration domain and receive their
//! call data as JSON. Every handler answers with a JSON value.

use dashmap::DashMap;
use hi_core::{Context, DOMAIN};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Result type for service calls
pub type ServiceResult = Result<serde_json::Value, ServiceError>;

/// Future type for async service handlers
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// Service handler function type
pub type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service call failed: {0}")]
    CallFailed(String),
}

/// One call on the command surface
#[derive(Debug, Clone)]
pub struct ServiceCall {
    pub service: String,
    pub data: serde_json::Value,
    pub context: Context,
}

impl ServiceCall {
    pub fn new(service: impl Into<String>, data: serde_json::Value, context: Context) -> Self {
        Self {
            service: service.into(),
            data,
            context,
        }
    }

    /// Deserialize the call data; `null` is read as an empty object
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ServiceError> {
        let data = match &self.data {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other.clone(),
        };
        serde_json::from_value(data).map_err(|e| ServiceError::InvalidData(e.to_string()))
    }
}

/// Information about a registered service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub service: String,
    pub description: Option<String>,
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
}

/// Services keyed by name
pub struct ServiceRegistry {
    services: DashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    #[instrument(skip(self, service, description, handler))]
    pub fn register<F, Fut>(&self, service: impl Into<String>, description: Option<&str>, handler: F)
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let service = service.into();
        debug!(domain = DOMAIN, service = %service, "Registering service");

        let handler: ServiceHandler = Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture);
        let description = ServiceDescription {
            service: service.clone(),
            description: description.map(str::to_string),
        };

        self.services.insert(service, RegisteredService { handler, description });
    }

    /// Call a service by name
    #[instrument(skip(self, data, context), fields(context_id = %context.id))]
    pub async fn call(&self, service: &str, data: serde_json::Value, context: Context) -> ServiceResult {
        let registered = self.services.get(service).ok_or_else(|| {
            warn!(service = %service, "Service not found");
            ServiceError::NotFound {
                domain: DOMAIN.to_string(),
                service: service.to_string(),
            }
        })?;

        let handler = registered.handler.clone();
        drop(registered); // Release the shard lock before the handler runs

        debug!(service = %service, "Calling service");
        handler(ServiceCall::new(service, data, context)).await
    }

    pub fn has_service(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn get_service(&self, service: &str) -> Option<ServiceDescription> {
        self.services.get(service).map(|s| s.description.clone())
    }

    /// Registered services, sorted by name
    pub fn services(&self) -> Vec<ServiceDescription> {
        let mut services: Vec<_> = self.services.iter().map(|s| s.description.clone()).collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        services
    }

    pub fn unregister(&self, service: &str) -> bool {
        let removed = self.services.remove(service).is_some();
        if removed {
            debug!(service = %service, "Unregistered service");
        }
        removed
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedServiceRegistry = Arc<ServiceRegistry>;
