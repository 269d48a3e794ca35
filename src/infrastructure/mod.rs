//! 基础设施层
//!
//! 提供按类型解析的容器协作方：
//! - 服务描述符与注册集合
//! - 依赖注入容器与作用域

// 容器实现
pub mod collection;
pub mod container;

// 重新导出API
pub use collection::ServiceCollection;
pub use container::{
    ContainerStats, ServiceContainer, ServiceDescriptor, ServiceLifetime, ServiceProvider,
    ServiceScope,
};
