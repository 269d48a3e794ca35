//! 服务注册集合
//!
//! 有序的描述符列表，外加按生命周期和来源划分的便捷注册方法。
//! 键控注册与普通注册在这里没有区别，只是多了一个键；改写发生在构建时。

use super::container::provider::{Injectable, ServiceProvider};
use super::container::{ServiceDescriptor, ServiceKey, ServiceLifetime, ServiceType};
use crate::config::ContainerConfig;
use crate::errors::{ContainerError, KeyedServiceError};
use crate::infrastructure::container::ServiceContainer;
use crate::keyed::{build_with_keyed_support_config, KeyedServiceProvider};
use std::sync::Arc;

#[derive(Clone, Default, Debug)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

macro_rules! lifetime_registrations {
    (
        $lifetime:expr,
        $factory:ident,
        $implementation:ident,
        $keyed_factory:ident,
        $keyed_implementation:ident
    ) => {
        pub fn $factory<T, F>(&mut self, factory: F) -> &mut Self
        where
            T: ?Sized + Send + Sync + 'static,
            F: Fn(&dyn ServiceProvider) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
        {
            self.add(ServiceDescriptor::factory($lifetime, factory))
        }

        pub fn $implementation<T, I>(&mut self, upcast: fn(Arc<I>) -> Arc<T>) -> &mut Self
        where
            T: ?Sized + Send + Sync + 'static,
            I: Injectable,
        {
            self.add(ServiceDescriptor::implementation::<T, I>($lifetime, upcast))
        }

        pub fn $keyed_factory<T, F>(&mut self, key: impl Into<ServiceKey>, factory: F) -> &mut Self
        where
            T: ?Sized + Send + Sync + 'static,
            F: Fn(&dyn ServiceProvider) -> Result<Arc<T>, ContainerError> + Send + Sync + 'static,
        {
            self.add(ServiceDescriptor::factory($lifetime, factory).with_key(key))
        }

        pub fn $keyed_implementation<T, I>(
            &mut self,
            key: impl Into<ServiceKey>,
            upcast: fn(Arc<I>) -> Arc<T>,
        ) -> &mut Self
        where
            T: ?Sized + Send + Sync + 'static,
            I: Injectable,
        {
            self.add(ServiceDescriptor::implementation::<T, I>($lifetime, upcast).with_key(key))
        }
    };
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, descriptor: ServiceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// 仅当不存在相同服务类型与键的注册时添加
    pub fn try_add(&mut self, descriptor: ServiceDescriptor) -> bool {
        let exists = self.descriptors.iter().any(|existing| {
            existing.service_type() == descriptor.service_type()
                && existing.key() == descriptor.key()
        });
        if !exists {
            self.descriptors.push(descriptor);
        }
        !exists
    }

    lifetime_registrations!(
        ServiceLifetime::Transient,
        add_transient,
        add_transient_type,
        add_keyed_transient,
        add_keyed_transient_type
    );

    lifetime_registrations!(
        ServiceLifetime::Scoped,
        add_scoped,
        add_scoped_type,
        add_keyed_scoped,
        add_keyed_scoped_type
    );

    lifetime_registrations!(
        ServiceLifetime::Singleton,
        add_singleton,
        add_singleton_type,
        add_keyed_singleton,
        add_keyed_singleton_type
    );

    pub fn add_singleton_instance<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        instance: Arc<T>,
    ) -> &mut Self {
        self.add(ServiceDescriptor::instance(instance))
    }

    pub fn add_keyed_singleton_instance<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        key: impl Into<ServiceKey>,
        instance: Arc<T>,
    ) -> &mut Self {
        self.add(ServiceDescriptor::instance(instance).with_key(key))
    }

    /// 是否存在该服务类型的注册（键控或非键控）
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let service_type = ServiceType::of::<T>();
        self.descriptors
            .iter()
            .any(|descriptor| descriptor.service_type() == &service_type)
    }

    /// 移除该服务类型的全部注册，返回移除数量
    pub fn remove_all<T: ?Sized + 'static>(&mut self) -> usize {
        let service_type = ServiceType::of::<T>();
        let before = self.descriptors.len();
        self.descriptors
            .retain(|descriptor| descriptor.service_type() != &service_type);
        before - self.descriptors.len()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDescriptor> {
        self.descriptors.iter()
    }

    pub fn as_slice(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// 以默认配置构建支持键控解析的提供者
    pub fn build_service_provider(
        &self,
    ) -> Result<KeyedServiceProvider<ServiceContainer>, KeyedServiceError> {
        self.build_service_provider_with(&ContainerConfig::default())
    }

    pub fn build_service_provider_with(
        &self,
        config: &ContainerConfig,
    ) -> Result<KeyedServiceProvider<ServiceContainer>, KeyedServiceError> {
        build_with_keyed_support_config(self, config)
    }
}

impl From<Vec<ServiceDescriptor>> for ServiceCollection {
    fn from(descriptors: Vec<ServiceDescriptor>) -> Self {
        Self { descriptors }
    }
}

impl Extend<ServiceDescriptor> for ServiceCollection {
    fn extend<I: IntoIterator<Item = ServiceDescriptor>>(&mut self, iter: I) {
        self.descriptors.extend(iter);
    }
}

impl IntoIterator for ServiceCollection {
    type Item = ServiceDescriptor;
    type IntoIter = std::vec::IntoIter<ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ServiceCollection {
    type Item = &'a ServiceDescriptor;
    type IntoIter = std::slice::Iter<'a, ServiceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}
