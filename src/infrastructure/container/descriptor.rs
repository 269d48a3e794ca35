//! 服务描述符（注册信息）

use super::provider::{ActivationContext, Injectable, ServiceProvider};
use super::types::{ServiceInstance, ServiceKey, ServiceType};
use super::ServiceLifetime;
use crate::errors::ContainerError;
use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

/// 类型擦除的服务工厂
pub type ServiceFactory =
    Arc<dyn Fn(&dyn ServiceProvider) -> Result<ServiceInstance, ContainerError> + Send + Sync>;

type Activator =
    Arc<dyn Fn(&ActivationContext<'_>) -> Result<ServiceInstance, ContainerError> + Send + Sync>;

/// 把闭包包装为 `ServiceFactory`
pub fn service_factory<F>(factory: F) -> ServiceFactory
where
    F: Fn(&dyn ServiceProvider) -> Result<ServiceInstance, ContainerError> + Send + Sync + 'static,
{
    Arc::new(factory)
}

fn activator<F>(activate: F) -> Activator
where
    F: Fn(&ActivationContext<'_>) -> Result<ServiceInstance, ContainerError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(activate)
}

/// 实现类型：实现的运行时标识加上其构造注入激活器
#[derive(Clone)]
pub struct ImplementationType {
    id: TypeId,
    name: &'static str,
    activator: Activator,
}

impl ImplementationType {
    /// `upcast` 把具体实现转换为服务类型（例如 `Arc<I>` → `Arc<dyn Trait>`）
    pub fn of<T, I>(upcast: fn(Arc<I>) -> Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: Injectable,
    {
        Self {
            id: TypeId::of::<I>(),
            name: type_name::<I>(),
            activator: activator(move |context| {
                let service = I::inject(context)?;
                Ok(ServiceInstance::new(upcast(Arc::new(service))))
            }),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn construct(
        &self,
        context: &ActivationContext<'_>,
    ) -> Result<ServiceInstance, ContainerError> {
        (self.activator)(context)
    }
}

impl fmt::Debug for ImplementationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 服务值来源：实例、工厂或实现类型，三者恰好其一
#[derive(Clone)]
pub enum ServiceSource {
    Instance(ServiceInstance),
    Factory(ServiceFactory),
    Implementation(ImplementationType),
}

impl ServiceSource {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceSource::Instance(_) => "instance",
            ServiceSource::Factory(_) => "factory",
            ServiceSource::Implementation(_) => "implementation",
        }
    }
}

impl fmt::Debug for ServiceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceSource::Instance(instance) => {
                write!(f, "Instance({})", instance.type_name())
            }
            ServiceSource::Factory(_) => f.write_str("Factory"),
            ServiceSource::Implementation(implementation) => {
                write!(f, "Implementation({})", implementation.name())
            }
        }
    }
}

/// 服务描述符
#[derive(Clone)]
pub struct ServiceDescriptor {
    service_type: ServiceType,
    key: Option<ServiceKey>,
    source: Option<ServiceSource>,
    lifetime: ServiceLifetime,
}

impl ServiceDescriptor {
    /// 创建尚未指定来源的描述符
    pub fn describe(service_type: ServiceType, lifetime: ServiceLifetime) -> Self {
        Self {
            service_type,
            key: None,
            source: None,
            lifetime,
        }
    }

    /// 单例实例注册
    pub fn instance<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self::describe(ServiceType::of::<T>(), ServiceLifetime::Singleton)
            .with_instance(ServiceInstance::new(instance))
    }

    /// 工厂注册
    pub fn factory<T, F>(lifetime: ServiceLifetime, factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn ServiceProvider) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
    {
        Self::describe(ServiceType::of::<T>(), lifetime).with_factory(service_factory(
            move |provider| factory(provider).map(ServiceInstance::new),
        ))
    }

    /// 实现类型注册
    pub fn implementation<T, I>(lifetime: ServiceLifetime, upcast: fn(Arc<I>) -> Arc<T>) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        I: Injectable,
    {
        Self::describe(ServiceType::of::<T>(), lifetime)
            .with_implementation(ImplementationType::of::<T, I>(upcast))
    }

    pub fn with_key(mut self, key: impl Into<ServiceKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_instance(mut self, instance: ServiceInstance) -> Self {
        self.source = Some(ServiceSource::Instance(instance));
        self
    }

    pub fn with_factory(mut self, factory: ServiceFactory) -> Self {
        self.source = Some(ServiceSource::Factory(factory));
        self
    }

    pub fn with_implementation(mut self, implementation: ImplementationType) -> Self {
        self.source = Some(ServiceSource::Implementation(implementation));
        self
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn key(&self) -> Option<&ServiceKey> {
        self.key.as_ref()
    }

    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    pub fn source(&self) -> Option<&ServiceSource> {
        self.source.as_ref()
    }

    pub fn lifetime(&self) -> ServiceLifetime {
        self.lifetime
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service_type", &self.service_type)
            .field("key", &self.key)
            .field("source", &self.source)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
