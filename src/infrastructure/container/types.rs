//! 服务标识、服务键与类型擦除的服务实例

use crate::errors::ContainerError;
use crate::keyed::KeyedEntryHolder;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 运行时服务类型标识
///
/// `ServiceType::of::<T>()` 在泛型调用点同时捕获 `T` 与其键控持有者
/// `KeyedEntryHolder<T>` 的 `TypeId`，运行时不需要再构造泛型类型。
#[derive(Clone, Copy)]
pub struct ServiceType {
    id: TypeId,
    name: &'static str,
    holder: Option<HolderIdentity>,
}

#[derive(Clone, Copy)]
struct HolderIdentity {
    id: TypeId,
    name: &'static str,
}

impl ServiceType {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            holder: Some(HolderIdentity {
                id: TypeId::of::<KeyedEntryHolder<T>>(),
                name: type_name::<KeyedEntryHolder<T>>(),
            }),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// 该服务类型对应的键控持有者类型；持有者类型本身没有持有者
    pub fn keyed_holder(&self) -> Option<ServiceType> {
        self.holder.map(|holder| ServiceType {
            id: holder.id,
            name: holder.name,
            holder: None,
        })
    }

    pub fn is_keyed_holder(&self) -> bool {
        self.holder.is_none()
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ServiceType {}

impl Hash for ServiceType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

trait KeyValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn eq_key(&self, other: &dyn KeyValue) -> bool;
}

impl<K> KeyValue for K
where
    K: Any + PartialEq + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_key(&self, other: &dyn KeyValue) -> bool {
        other
            .as_any()
            .downcast_ref::<K>()
            .is_some_and(|other| self == other)
    }
}

/// 服务键：不透明、可比较相等的值
///
/// 两个键相等当且仅当它们持有同一具体类型且该类型的 `==` 成立。
/// `&'static str` 在构造时统一为 `String`，因此字面量与 `String` 键可以互相匹配。
#[derive(Clone)]
pub struct ServiceKey(Arc<dyn KeyValue>);

impl ServiceKey {
    pub fn new<K>(key: K) -> Self
    where
        K: PartialEq + fmt::Debug + Send + Sync + 'static,
    {
        let any: &dyn Any = &key;
        if let Some(text) = any.downcast_ref::<&'static str>() {
            return Self(Arc::new(text.to_string()));
        }
        Self(Arc::new(key))
    }

    pub fn downcast_ref<K: 'static>(&self) -> Option<&K> {
        self.0.as_any().downcast_ref::<K>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_key(&*other.0)
    }
}

impl Eq for ServiceKey {}

impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl From<&'static str> for ServiceKey {
    fn from(key: &'static str) -> Self {
        ServiceKey::new(key.to_string())
    }
}

impl From<String> for ServiceKey {
    fn from(key: String) -> Self {
        ServiceKey::new(key)
    }
}

impl From<&ServiceKey> for ServiceKey {
    fn from(key: &ServiceKey) -> Self {
        key.clone()
    }
}

macro_rules! service_key_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for ServiceKey {
            fn from(key: $ty) -> Self {
                ServiceKey::new(key)
            }
        })*
    };
}

service_key_from!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, char, bool);

/// 类型擦除的服务实例
///
/// 内部保存 `Arc<T>`（`T` 可以是 trait 对象），克隆只增加引用计数。
#[derive(Clone)]
pub struct ServiceInstance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ServiceInstance {
    pub fn new<T: ?Sized + Send + Sync + 'static>(service: Arc<T>) -> Self {
        Self {
            value: Arc::new(service),
            type_name: type_name::<T>(),
        }
    }

    pub fn from_value<T: Send + Sync + 'static>(service: T) -> Self {
        Self::new(Arc::new(service))
    }

    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.value.downcast_ref::<Arc<T>>().cloned()
    }

    /// 向下转型，失败时返回 `TypeCastFailed`
    pub fn cast<T: ?Sized + Send + Sync + 'static>(
        &self,
        context: &str,
    ) -> Result<Arc<T>, ContainerError> {
        self.downcast::<T>().ok_or_else(|| ContainerError::TypeCastFailed {
            expected_type: type_name::<T>().to_string(),
            context: format!("{} (found '{}')", context, self.type_name),
        })
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn ptr_eq(&self, other: &ServiceInstance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for ServiceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_string_keys_match_literals() {
        let literal = ServiceKey::new("primary");
        let owned = ServiceKey::from("primary".to_string());
        assert_eq!(literal, owned);
        assert_eq!(literal.as_str(), Some("primary"));
    }

    #[test]
    fn test_keys_of_different_types_never_match() {
        assert_ne!(ServiceKey::from(1u32), ServiceKey::from(1u64));
        assert_ne!(ServiceKey::from(1u32), ServiceKey::from("1"));
    }

    #[test]
    fn test_custom_key_uses_equality_not_identity() {
        #[derive(Debug, PartialEq)]
        struct Region {
            code: String,
        }

        let a = ServiceKey::new(Region { code: "eu".to_string() });
        let b = ServiceKey::new(Region { code: "eu".to_string() });
        assert_eq!(a, b);
        assert_eq!(a.downcast_ref::<Region>().map(|r| r.code.as_str()), Some("eu"));
    }

    #[test]
    fn test_instance_round_trips_trait_objects() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = ServiceInstance::new(greeter.clone());

        let resolved = instance.downcast::<dyn Greeter>().unwrap();
        assert!(Arc::ptr_eq(&greeter, &resolved));
        assert_eq!(resolved.greet(), "hello");
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn test_cast_reports_type_mismatch() {
        let instance = ServiceInstance::from_value(42u32);
        let err = instance.cast::<String>("unit test").unwrap_err();
        assert!(matches!(err, ContainerError::TypeCastFailed { .. }));
    }

    #[test]
    fn test_service_type_has_distinct_holder() {
        let service = ServiceType::of::<dyn Greeter>();
        let holder = service.keyed_holder().unwrap();
        assert_ne!(service, holder);
        assert!(holder.is_keyed_holder());
        assert!(holder.keyed_holder().is_none());
        assert_eq!(service, ServiceType::of::<dyn Greeter>());
        assert!(holder.name().contains("KeyedEntryHolder"));
    }
}
