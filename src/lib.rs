//! 键控服务解析
//!
//! 在"按类型解析"的依赖注入容器之上增加"按（类型，键）解析"，容器本身不需要修改。
//!
//! ```no_run
//! use keyed_di::ServiceCollection;
//! use std::sync::Arc;
//!
//! trait Storage: Send + Sync {}
//! struct Disk;
//! impl Storage for Disk {}
//!
//! let mut services = ServiceCollection::new();
//! services.add_keyed_singleton_instance::<dyn Storage>("disk", Arc::new(Disk));
//! let provider = services.build_service_provider().unwrap();
//! let _disk = provider.resolve_required_keyed::<dyn Storage>("disk").unwrap();
//! ```

pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod keyed;
pub mod logging;

// Re-export commonly used items for convenience
pub use config::{ConfigLoader, ContainerConfig, KeyedDiConfig, KeyedLookupPolicy};
pub use errors::{ConfigError, ContainerError, KeyedServiceError};
pub use infrastructure::container::{
    ActivationContext, ImplementationType, Injectable, ServiceInstance, ServiceKey,
    ServiceProviderExt, ServiceSource, ServiceType,
};
pub use infrastructure::{
    ContainerStats, ServiceCollection, ServiceContainer, ServiceDescriptor, ServiceLifetime,
    ServiceProvider, ServiceScope,
};
pub use keyed::{
    build_with_keyed_support, DefaultServiceProviderFactory, DescriptorTransformer,
    KeyedServiceProvider, KeyedServiceProviderFactory, ServiceProviderFactory,
};
