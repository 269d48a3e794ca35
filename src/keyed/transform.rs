//! 描述符改写
//!
//! 把键控描述符改写为持有者类型 `KeyedEntryHolder<T>` 下的非键控工厂注册，
//! 使只认识"按类型解析"的容器也能承载键控服务。非键控描述符原样保留。

use super::entry::{KeyedEntry, KeyedServiceHolder, KeyedSource};
use crate::errors::KeyedServiceError;
use crate::infrastructure::container::{
    service_factory, ServiceDescriptor, ServiceInstance, ServiceLifetime, ServiceSource,
};
use std::sync::Arc;
use tracing::debug;

pub struct DescriptorTransformer;

impl DescriptorTransformer {
    /// 改写描述符列表；输入不变，输出顺序与输入一致
    pub fn transform(
        descriptors: &[ServiceDescriptor],
    ) -> Result<Vec<ServiceDescriptor>, KeyedServiceError> {
        let mut output = Vec::with_capacity(descriptors.len());
        let mut keyed = 0usize;

        for descriptor in descriptors {
            match Self::keyed_entry(descriptor)? {
                Some(entry) => {
                    keyed += 1;
                    output.push(Self::holder_descriptor(
                        Arc::new(entry),
                        descriptor.lifetime(),
                    )?);
                }
                None => output.push(descriptor.clone()),
            }
        }

        debug!(
            total = descriptors.len(),
            keyed,
            unkeyed = descriptors.len() - keyed,
            "Service descriptors transformed"
        );

        Ok(output)
    }

    /// 为键控描述符创建条目；非键控描述符返回 `None`
    pub fn keyed_entry(
        descriptor: &ServiceDescriptor,
    ) -> Result<Option<KeyedEntry>, KeyedServiceError> {
        let Some(key) = descriptor.key() else {
            return Ok(None);
        };
        let service_type = *descriptor.service_type();

        let source = match descriptor.source() {
            Some(ServiceSource::Instance(instance)) => KeyedSource::Instance(instance.clone()),
            Some(ServiceSource::Factory(factory)) => KeyedSource::Factory(factory.clone()),
            Some(ServiceSource::Implementation(implementation)) => {
                KeyedSource::Implementation(implementation.clone())
            }
            None => {
                return Err(KeyedServiceError::Configuration {
                    service_type: service_type.name().to_string(),
                    reason: format!(
                        "keyed registration {:?} has no instance, factory or implementation type",
                        key
                    ),
                })
            }
        };

        Ok(Some(KeyedEntry::new(service_type, key.clone(), source)))
    }

    /// 持有者注册：生命周期与原注册相同，工厂闭包持有已构建的条目
    fn holder_descriptor(
        entry: Arc<KeyedEntry>,
        lifetime: ServiceLifetime,
    ) -> Result<ServiceDescriptor, KeyedServiceError> {
        let holder_type = entry.service_type().keyed_holder().ok_or_else(|| {
            KeyedServiceError::Configuration {
                service_type: entry.service_type().name().to_string(),
                reason: "keyed holder types cannot be registered with a key".to_string(),
            }
        })?;

        let factory = service_factory(move |provider| {
            let value = entry.resolve(provider)?;
            Ok(ServiceInstance::from_value(KeyedServiceHolder::new(
                entry.clone(),
                value,
            )))
        });

        Ok(ServiceDescriptor::describe(holder_type, lifetime).with_factory(factory))
    }

    /// 拆分为（键控，非键控）两组，保持各自的注册顺序
    pub fn partition(
        descriptors: &[ServiceDescriptor],
    ) -> (Vec<&ServiceDescriptor>, Vec<&ServiceDescriptor>) {
        descriptors.iter().partition(|descriptor| descriptor.is_keyed())
    }
}
