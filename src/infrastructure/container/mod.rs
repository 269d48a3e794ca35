//! 按类型解析的容器协作方

pub mod descriptor;
pub mod provider;
pub mod types;
pub mod v2;

pub use descriptor::{
    service_factory, ImplementationType, ServiceDescriptor, ServiceFactory, ServiceSource,
};
pub use provider::{ActivationContext, Injectable, ServiceProvider, ServiceProviderExt};
pub use types::{ServiceInstance, ServiceKey, ServiceType};
pub use v2::{ContainerStats, ServiceContainer, ServiceScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// Single instance for the entire application lifetime
    Singleton,
    /// New instance per resolve
    Transient,
    /// Per-scope instance (shared within active scope)
    Scoped,
}
