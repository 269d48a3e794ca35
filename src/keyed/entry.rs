//! 键控条目与持有者

use crate::errors::ContainerError;
use crate::infrastructure::container::{
    ImplementationType, ServiceFactory, ServiceInstance, ServiceKey, ServiceProvider, ServiceType,
};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// `T` 的键控注册在容器中登记的服务类型
///
/// 只用作类型标识，从不实例化。
pub struct KeyedEntryHolder<T: ?Sized + 'static> {
    _marker: PhantomData<fn() -> *const T>,
}

/// 键控条目的值来源
#[derive(Clone)]
pub enum KeyedSource {
    Instance(ServiceInstance),
    Factory(ServiceFactory),
    Implementation(ImplementationType),
}

/// 一个键控注册：服务类型、键和值来源，构建后不可变
#[derive(Clone)]
pub struct KeyedEntry {
    service_type: ServiceType,
    key: ServiceKey,
    source: KeyedSource,
}

impl KeyedEntry {
    pub fn new(service_type: ServiceType, key: ServiceKey, source: KeyedSource) -> Self {
        Self {
            service_type,
            key,
            source,
        }
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service_type
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn source(&self) -> &KeyedSource {
        &self.source
    }

    pub fn matches(&self, key: &ServiceKey) -> bool {
        &self.key == key
    }

    /// 产生条目的值
    ///
    /// 实例直接返回；工厂在调用时以容器上下文求值，不做记忆化；
    /// 实现类型交给容器激活，并把本条目的键传给构造器。
    pub fn resolve(
        &self,
        provider: &dyn ServiceProvider,
    ) -> Result<ServiceInstance, ContainerError> {
        match &self.source {
            KeyedSource::Instance(instance) => Ok(instance.clone()),
            KeyedSource::Factory(factory) => factory(provider),
            KeyedSource::Implementation(implementation) => {
                provider.activate(implementation, Some(&self.key))
            }
        }
    }
}

impl fmt::Debug for KeyedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            KeyedSource::Instance(_) => "instance",
            KeyedSource::Factory(_) => "factory",
            KeyedSource::Implementation(_) => "implementation",
        };
        f.debug_struct("KeyedEntry")
            .field("service_type", &self.service_type)
            .field("key", &self.key)
            .field("source", &source)
            .finish()
    }
}

/// 容器物化持有者注册得到的值：条目本身加上按持有者生命周期求得的服务值
#[derive(Debug, Clone)]
pub struct KeyedServiceHolder {
    entry: Arc<KeyedEntry>,
    value: ServiceInstance,
}

impl KeyedServiceHolder {
    pub(crate) fn new(entry: Arc<KeyedEntry>, value: ServiceInstance) -> Self {
        Self { entry, value }
    }

    pub fn entry(&self) -> &KeyedEntry {
        &self.entry
    }

    pub fn key(&self) -> &ServiceKey {
        self.entry.key()
    }

    pub fn value(&self) -> &ServiceInstance {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContainerConfig;
    use crate::infrastructure::container::{
        service_factory, ActivationContext, Injectable, ServiceContainer,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Tagged {
        tag: String,
    }

    impl Injectable for Tagged {
        fn inject(context: &ActivationContext<'_>) -> Result<Self, ContainerError> {
            Ok(Tagged {
                tag: context
                    .service_key()
                    .and_then(ServiceKey::as_str)
                    .unwrap_or("unkeyed")
                    .to_string(),
            })
        }
    }

    fn empty_container() -> ServiceContainer {
        ServiceContainer::build(&[], &ContainerConfig::default()).unwrap()
    }

    #[test]
    fn test_instance_entry_returns_same_value() {
        let value = ServiceInstance::from_value(Tagged { tag: "x".to_string() });
        let entry = KeyedEntry::new(
            ServiceType::of::<Tagged>(),
            ServiceKey::from("x"),
            KeyedSource::Instance(value.clone()),
        );
        let container = empty_container();

        assert!(entry.resolve(&container).unwrap().ptr_eq(&value));
        assert!(entry.resolve(&container).unwrap().ptr_eq(&value));
        assert!(entry.matches(&ServiceKey::from("x".to_string())));
    }

    #[test]
    fn test_factory_entry_is_not_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let entry = KeyedEntry::new(
            ServiceType::of::<Tagged>(),
            ServiceKey::from("f"),
            KeyedSource::Factory(service_factory(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(ServiceInstance::from_value(Tagged { tag: "f".to_string() }))
            })),
        );
        let container = empty_container();

        let first = entry.resolve(&container).unwrap();
        let second = entry.resolve(&container).unwrap();
        assert!(!first.ptr_eq(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_implementation_entry_receives_key() {
        let entry = KeyedEntry::new(
            ServiceType::of::<Tagged>(),
            ServiceKey::from("blue"),
            KeyedSource::Implementation(ImplementationType::of::<Tagged, Tagged>(|t| t)),
        );

        let value = entry.resolve(&empty_container()).unwrap();
        assert_eq!(value.downcast::<Tagged>().unwrap().tag, "blue");
        assert!(format!("{:?}", entry).contains("implementation"));
    }
}
