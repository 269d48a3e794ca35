//! 键控服务解析
//!
//! 在只支持"按类型解析"的容器之上提供"按（类型，键）解析"：
//! - `transform`：构建时把键控注册改写为持有者类型下的非键控注册
//! - `provider`：解析时扫描持有者并按键匹配
//! - `factory`：把两者接到容器构建流程中

pub mod entry;
pub mod factory;
pub mod provider;
pub mod transform;

pub use entry::{KeyedEntry, KeyedEntryHolder, KeyedServiceHolder, KeyedSource};
pub use factory::{
    build_with_keyed_support, build_with_keyed_support_config, DefaultServiceProviderFactory,
    KeyedServiceProviderFactory, ServiceProviderFactory,
};
pub use provider::{find_keyed, KeyedServiceProvider};
pub use transform::DescriptorTransformer;
