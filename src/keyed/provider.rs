//! 键控解析包装器
//!
//! 包装任意已构建的提供者。键控查找解析该服务类型的全部持有者，
//! 然后按注册顺序返回第一个键相等的条目。不做缓存，每次调用都重新扫描。

use super::entry::KeyedServiceHolder;
use crate::config::{ContainerConfig, KeyedLookupPolicy};
use crate::errors::{ContainerError, KeyedServiceError};
use crate::infrastructure::container::provider::not_registered;
use crate::infrastructure::container::{
    ContainerStats, ImplementationType, ServiceContainer, ServiceInstance, ServiceKey,
    ServiceProvider, ServiceScope, ServiceType,
};
use std::sync::Arc;
use tracing::{debug, trace};

/// 解析某服务类型下的全部持有者（按注册顺序）
fn keyed_holders(
    provider: &dyn ServiceProvider,
    service_type: &ServiceType,
) -> Result<Vec<Arc<KeyedServiceHolder>>, ContainerError> {
    let Some(holder_type) = service_type.keyed_holder() else {
        return Ok(Vec::new());
    };
    provider
        .resolve_all(&holder_type)?
        .iter()
        .map(|instance| instance.cast::<KeyedServiceHolder>("keyed holder resolution"))
        .collect()
}

/// 在任意提供者上按（类型，键）查找第一个匹配的值
///
/// 工厂和构造注入中拿到的是底层容器，通过这里也能解析键控依赖。
pub fn find_keyed(
    provider: &dyn ServiceProvider,
    service_type: &ServiceType,
    key: &ServiceKey,
) -> Result<Option<ServiceInstance>, ContainerError> {
    let holders = keyed_holders(provider, service_type)?;
    let found = holders
        .iter()
        .find(|holder| holder.key() == key)
        .map(|holder| holder.value().clone());

    provider.record_keyed_lookup(found.is_some());
    trace!(
        service = service_type.name(),
        key = ?key,
        candidates = holders.len(),
        matched = found.is_some(),
        "Keyed lookup"
    );
    Ok(found)
}

fn lookup_failed(service_type: &ServiceType, key: &ServiceKey) -> KeyedServiceError {
    KeyedServiceError::LookupFailed {
        service_type: service_type.name().to_string(),
        key: format!("{:?}", key),
    }
}

/// 支持键控解析的服务提供者
#[derive(Clone)]
pub struct KeyedServiceProvider<P> {
    inner: P,
    policy: KeyedLookupPolicy,
}

impl<P: ServiceProvider> KeyedServiceProvider<P> {
    pub fn new(inner: P) -> Self {
        Self::with_policy(inner, KeyedLookupPolicy::default())
    }

    pub fn with_policy(inner: P, policy: KeyedLookupPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> KeyedLookupPolicy {
        self.policy
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub fn into_inner(self) -> P {
        self.inner
    }

    /// 非键控解析；键控注册在这里不可见
    pub fn get_service(
        &self,
        service_type: &ServiceType,
    ) -> Result<Option<ServiceInstance>, KeyedServiceError> {
        Ok(self.inner.resolve_one(service_type)?)
    }

    pub fn get_required_service(
        &self,
        service_type: &ServiceType,
    ) -> Result<ServiceInstance, KeyedServiceError> {
        self.inner.resolve_one(service_type)?.ok_or_else(|| {
            not_registered(service_type, &self.inner.registered_types()).into()
        })
    }

    /// 键控解析；未匹配时按查找策略返回错误或 `None`
    pub fn get_keyed_service(
        &self,
        service_type: &ServiceType,
        key: &ServiceKey,
    ) -> Result<Option<ServiceInstance>, KeyedServiceError> {
        match find_keyed(&self.inner, service_type, key)? {
            Some(instance) => Ok(Some(instance)),
            None => match self.policy {
                KeyedLookupPolicy::Strict => Err(lookup_failed(service_type, key)),
                KeyedLookupPolicy::Lenient => {
                    debug!(
                        service = service_type.name(),
                        key = ?key,
                        "No keyed registration matched"
                    );
                    Ok(None)
                }
            },
        }
    }

    /// 严格键控解析，与查找策略无关
    pub fn get_required_keyed_service(
        &self,
        service_type: &ServiceType,
        key: &ServiceKey,
    ) -> Result<ServiceInstance, KeyedServiceError> {
        find_keyed(&self.inner, service_type, key)?
            .ok_or_else(|| lookup_failed(service_type, key))
    }

    /// 该键下的全部值，按注册顺序；没有匹配时为空
    pub fn get_keyed_services(
        &self,
        service_type: &ServiceType,
        key: &ServiceKey,
    ) -> Result<Vec<ServiceInstance>, KeyedServiceError> {
        let values: Vec<ServiceInstance> = keyed_holders(&self.inner, service_type)?
            .iter()
            .filter(|holder| holder.key() == key)
            .map(|holder| holder.value().clone())
            .collect();
        self.inner.record_keyed_lookup(!values.is_empty());
        Ok(values)
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<T>>, KeyedServiceError> {
        self.get_service(&ServiceType::of::<T>())?
            .map(|instance| instance.cast::<T>("typed resolution"))
            .transpose()
            .map_err(KeyedServiceError::from)
    }

    pub fn resolve_required<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Arc<T>, KeyedServiceError> {
        Ok(self
            .get_required_service(&ServiceType::of::<T>())?
            .cast::<T>("typed resolution")?)
    }

    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Option<Arc<T>>, KeyedServiceError> {
        self.get_keyed_service(&ServiceType::of::<T>(), &key.into())?
            .map(|instance| instance.cast::<T>("typed keyed resolution"))
            .transpose()
            .map_err(KeyedServiceError::from)
    }

    pub fn resolve_required_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Arc<T>, KeyedServiceError> {
        Ok(self
            .get_required_keyed_service(&ServiceType::of::<T>(), &key.into())?
            .cast::<T>("typed keyed resolution")?)
    }

    pub fn resolve_all_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Vec<Arc<T>>, KeyedServiceError> {
        self.get_keyed_services(&ServiceType::of::<T>(), &key.into())?
            .iter()
            .map(|instance| {
                instance
                    .cast::<T>("typed keyed collection resolution")
                    .map_err(KeyedServiceError::from)
            })
            .collect()
    }
}

impl KeyedServiceProvider<ServiceContainer> {
    /// 从容器配置中取查找策略
    pub fn from_container(container: ServiceContainer) -> Self {
        let policy = container.config().keyed_lookup;
        Self::with_policy(container, policy)
    }

    pub fn config(&self) -> &ContainerConfig {
        self.inner.config()
    }

    pub fn create_scope(&self) -> KeyedServiceProvider<ServiceScope> {
        KeyedServiceProvider::with_policy(self.inner.create_scope(), self.policy)
    }

    pub fn create_named_scope(
        &self,
        name: impl Into<String>,
    ) -> KeyedServiceProvider<ServiceScope> {
        KeyedServiceProvider::with_policy(self.inner.create_named_scope(name), self.policy)
    }

    pub fn get_stats(&self) -> ContainerStats {
        self.inner.get_stats()
    }
}

impl KeyedServiceProvider<ServiceScope> {
    pub fn end(&self) {
        self.inner.end();
    }
}

impl<P: ServiceProvider> ServiceProvider for KeyedServiceProvider<P> {
    fn resolve_one(
        &self,
        service_type: &ServiceType,
    ) -> Result<Option<ServiceInstance>, ContainerError> {
        self.inner.resolve_one(service_type)
    }

    fn resolve_all(
        &self,
        service_type: &ServiceType,
    ) -> Result<Vec<ServiceInstance>, ContainerError> {
        self.inner.resolve_all(service_type)
    }

    fn activate(
        &self,
        implementation: &ImplementationType,
        key: Option<&ServiceKey>,
    ) -> Result<ServiceInstance, ContainerError> {
        self.inner.activate(implementation, key)
    }

    fn registered_types(&self) -> Vec<ServiceType> {
        self.inner.registered_types()
    }

    fn record_keyed_lookup(&self, matched: bool) {
        self.inner.record_keyed_lookup(matched);
    }
}
