//! 容器协作方契约
//!
//! `ServiceProvider` 是键控适配层消费的全部能力：按类型解析单个实例、
//! 按类型解析全部实例、以及按实现类型激活（构造注入）。

use super::descriptor::ImplementationType;
use super::types::{ServiceInstance, ServiceKey, ServiceType};
use crate::errors::ContainerError;
use std::sync::Arc;

/// 服务提供者trait
pub trait ServiceProvider: Send + Sync {
    /// 解析单个实例；未注册时返回 `Ok(None)`
    fn resolve_one(
        &self,
        service_type: &ServiceType,
    ) -> Result<Option<ServiceInstance>, ContainerError>;

    /// 按注册顺序解析该类型的全部实例
    fn resolve_all(
        &self,
        service_type: &ServiceType,
    ) -> Result<Vec<ServiceInstance>, ContainerError>;

    /// 通过构造注入激活实现类型；`key` 会传给声明了键参数的实现
    fn activate(
        &self,
        implementation: &ImplementationType,
        key: Option<&ServiceKey>,
    ) -> Result<ServiceInstance, ContainerError>;

    /// 已注册的服务类型（用于错误提示）
    fn registered_types(&self) -> Vec<ServiceType> {
        Vec::new()
    }

    /// 记录一次键控查找
    fn record_keyed_lookup(&self, _matched: bool) {}
}

/// 带类型的便捷解析方法
pub trait ServiceProviderExt: ServiceProvider {
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Option<Arc<T>>, ContainerError> {
        self.resolve_one(&ServiceType::of::<T>())?
            .map(|instance| instance.cast::<T>("typed resolution"))
            .transpose()
    }

    fn get_required<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        let service_type = ServiceType::of::<T>();
        match self.resolve_one(&service_type)? {
            Some(instance) => instance.cast::<T>("typed resolution"),
            None => Err(not_registered(&service_type, &self.registered_types())),
        }
    }

    fn get_all<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<T>>, ContainerError> {
        self.resolve_all(&ServiceType::of::<T>())?
            .iter()
            .map(|instance| instance.cast::<T>("typed collection resolution"))
            .collect()
    }
}

impl<P: ServiceProvider + ?Sized> ServiceProviderExt for P {}

/// 构造 `ServiceNotRegistered` 错误，并在该类型只有键控注册时给出建议
pub fn not_registered(service_type: &ServiceType, registered: &[ServiceType]) -> ContainerError {
    let available_services: Vec<String> = registered
        .iter()
        .filter(|ty| !ty.is_keyed_holder())
        .map(|ty| ty.name().to_string())
        .collect();

    let keyed_only = service_type
        .keyed_holder()
        .is_some_and(|holder| registered.contains(&holder));
    let suggestion = if keyed_only {
        Some(format!(
            "'{}' is only registered with keys; resolve it with a key",
            service_type.name()
        ))
    } else {
        None
    };

    ContainerError::ServiceNotRegistered {
        type_name: service_type.name().to_string(),
        available_services,
        suggestion,
    }
}

/// 激活上下文：实现类型在构造时可以解析依赖并读取当前键
pub struct ActivationContext<'a> {
    provider: &'a dyn ServiceProvider,
    key: Option<&'a ServiceKey>,
}

impl<'a> ActivationContext<'a> {
    pub fn new(provider: &'a dyn ServiceProvider, key: Option<&'a ServiceKey>) -> Self {
        Self { provider, key }
    }

    pub fn provider(&self) -> &'a dyn ServiceProvider {
        self.provider
    }

    /// 当前激活所绑定的服务键（非键控激活为 `None`）
    pub fn service_key(&self) -> Option<&'a ServiceKey> {
        self.key
    }

    pub fn key_as<K: 'static>(&self) -> Option<&'a K> {
        self.key.and_then(|key| key.downcast_ref::<K>())
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, ContainerError> {
        self.provider.get_required::<T>()
    }

    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<T>>, ContainerError> {
        self.provider.get::<T>()
    }

    /// 解析键控依赖；第一个键相等的注册胜出
    pub fn resolve_keyed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: impl Into<ServiceKey>,
    ) -> Result<Arc<T>, ContainerError> {
        let service_type = ServiceType::of::<T>();
        let key = key.into();
        match crate::keyed::find_keyed(self.provider, &service_type, &key)? {
            Some(instance) => instance.cast::<T>("keyed dependency resolution"),
            None => Err(ContainerError::ServiceNotRegistered {
                type_name: format!("{} (key {:?})", service_type.name(), key),
                available_services: Vec::new(),
                suggestion: None,
            }),
        }
    }
}

/// 可由容器构造注入的实现类型
pub trait Injectable: Sized + Send + Sync + 'static {
    fn inject(context: &ActivationContext<'_>) -> Result<Self, ContainerError>;
}
