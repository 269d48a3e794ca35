//! 构建适配器
//!
//! `KeyedServiceProviderFactory` 包装任意"从注册集合构建容器"的工厂：
//! 构建前先改写描述符，构建后把提供者包装为 `KeyedServiceProvider`。
//! 被包装的工厂只看到普通的非键控注册。

use super::provider::KeyedServiceProvider;
use super::transform::DescriptorTransformer;
use crate::config::{ContainerConfig, KeyedLookupPolicy};
use crate::errors::KeyedServiceError;
use crate::infrastructure::container::{ServiceContainer, ServiceProvider};
use crate::infrastructure::ServiceCollection;
use crate::logging::OperationTimer;

/// 从注册集合构建服务提供者
pub trait ServiceProviderFactory {
    type Builder;
    type Provider;

    fn create_builder(
        &self,
        services: ServiceCollection,
    ) -> Result<Self::Builder, KeyedServiceError>;

    fn create_service_provider(
        &self,
        builder: Self::Builder,
    ) -> Result<Self::Provider, KeyedServiceError>;
}

/// 使用本 crate 的 `ServiceContainer`
#[derive(Debug, Clone, Default)]
pub struct DefaultServiceProviderFactory {
    config: ContainerConfig,
}

impl DefaultServiceProviderFactory {
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }
}

impl ServiceProviderFactory for DefaultServiceProviderFactory {
    type Builder = ServiceCollection;
    type Provider = ServiceContainer;

    fn create_builder(
        &self,
        services: ServiceCollection,
    ) -> Result<ServiceCollection, KeyedServiceError> {
        Ok(services)
    }

    fn create_service_provider(
        &self,
        builder: ServiceCollection,
    ) -> Result<ServiceContainer, KeyedServiceError> {
        Ok(ServiceContainer::build(builder.as_slice(), &self.config)?)
    }
}

#[derive(Debug, Clone)]
pub struct KeyedServiceProviderFactory<F> {
    inner: F,
    policy: KeyedLookupPolicy,
}

impl<F> KeyedServiceProviderFactory<F> {
    pub fn new(inner: F) -> Self {
        Self::with_policy(inner, KeyedLookupPolicy::default())
    }

    pub fn with_policy(inner: F, policy: KeyedLookupPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

impl KeyedServiceProviderFactory<DefaultServiceProviderFactory> {
    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::with_policy(
            DefaultServiceProviderFactory::new(config.clone()),
            config.keyed_lookup,
        )
    }
}

impl<F> ServiceProviderFactory for KeyedServiceProviderFactory<F>
where
    F: ServiceProviderFactory,
    F::Provider: ServiceProvider,
{
    type Builder = F::Builder;
    type Provider = KeyedServiceProvider<F::Provider>;

    fn create_builder(&self, services: ServiceCollection) -> Result<F::Builder, KeyedServiceError> {
        let transformed = DescriptorTransformer::transform(services.as_slice())?;
        self.inner.create_builder(ServiceCollection::from(transformed))
    }

    fn create_service_provider(
        &self,
        builder: F::Builder,
    ) -> Result<KeyedServiceProvider<F::Provider>, KeyedServiceError> {
        let provider = self.inner.create_service_provider(builder)?;
        Ok(KeyedServiceProvider::with_policy(provider, self.policy))
    }
}

/// 以默认配置构建支持键控解析的容器
pub fn build_with_keyed_support(
    services: &ServiceCollection,
) -> Result<KeyedServiceProvider<ServiceContainer>, KeyedServiceError> {
    build_with_keyed_support_config(services, &ContainerConfig::default())
}

pub fn build_with_keyed_support_config(
    services: &ServiceCollection,
    config: &ContainerConfig,
) -> Result<KeyedServiceProvider<ServiceContainer>, KeyedServiceError> {
    let timer = OperationTimer::new("build_with_keyed_support")
        .with_metadata("registrations", &services.len().to_string());

    let factory = KeyedServiceProviderFactory::from_config(config);
    let builder = factory.create_builder(services.clone())?;
    let provider = factory.create_service_provider(builder)?;

    timer.finish();
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ContainerError;
    use std::sync::Arc;

    struct Probe(u8);

    #[test]
    fn test_plain_factory_rejects_keyed_registrations() {
        let mut services = ServiceCollection::new();
        services.add_keyed_singleton_instance("k", Arc::new(Probe(1)));

        let factory = DefaultServiceProviderFactory::default();
        let builder = factory.create_builder(services).unwrap();
        let result = factory.create_service_provider(builder);
        assert!(matches!(
            result,
            Err(KeyedServiceError::Container(ContainerError::InvalidDescriptor { .. }))
        ));
    }

    #[test]
    fn test_keyed_factory_hides_keys_from_inner_factory() {
        let mut services = ServiceCollection::new();
        services
            .add_keyed_singleton_instance("k", Arc::new(Probe(1)))
            .add_singleton_instance(Arc::new(Probe(2)));

        let factory = KeyedServiceProviderFactory::new(DefaultServiceProviderFactory::default());
        let builder = factory.create_builder(services).unwrap();
        assert!(builder.iter().all(|descriptor| !descriptor.is_keyed()));

        let provider = factory.create_service_provider(builder).unwrap();
        assert_eq!(provider.resolve_required_keyed::<Probe>("k").unwrap().0, 1);
        assert_eq!(provider.resolve_required::<Probe>().unwrap().0, 2);
    }

    #[test]
    fn test_from_config_carries_policy() {
        let config = ContainerConfig {
            keyed_lookup: KeyedLookupPolicy::Lenient,
            ..ContainerConfig::default()
        };
        let provider = build_with_keyed_support_config(&ServiceCollection::new(), &config).unwrap();
        assert_eq!(provider.policy(), KeyedLookupPolicy::Lenient);
        assert!(provider.resolve_keyed::<Probe>("missing").unwrap().is_none());
    }
}
