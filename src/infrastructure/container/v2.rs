//! 按类型解析的依赖注入容器
//!
//! 在构建时接收完整的描述符列表，之后只读：
//! - 同一服务类型可以有多个注册，`resolve_all` 按注册顺序返回
//! - `resolve_one` 返回该类型最后一个注册
//! - 单例按注册缓存，作用域实例按作用域缓存，瞬态每次创建
//! - 通过线程本地解析栈检测循环依赖
//! - 单例与作用域实例的创建在槽位外进行，跨线程的循环等待会被识别为循环依赖

use super::descriptor::{ImplementationType, ServiceDescriptor, ServiceSource};
use super::provider::{not_registered, ActivationContext, ServiceProvider};
use super::types::{ServiceInstance, ServiceKey, ServiceType};
use super::ServiceLifetime;
use crate::config::ContainerConfig;
use crate::errors::ContainerError;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, trace};

#[derive(Default)]
enum SlotState {
    #[default]
    Empty,
    Creating(ThreadId),
    Ready(ServiceInstance),
}

/// 单例或作用域实例的缓存槽位
///
/// 状态锁只在状态切换时持有，工厂在锁外执行；其他线程通过条件变量等待创建完成。
#[derive(Default)]
struct InstanceSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl InstanceSlot {
    fn id(&self) -> usize {
        self as *const InstanceSlot as usize
    }

    fn is_ready(&self) -> bool {
        matches!(*self.state.lock(), SlotState::Ready(_))
    }
}

type SharedSlot = Arc<InstanceSlot>;

/// 正在创建的槽位及各线程的等待关系
#[derive(Default)]
struct CreationTracker {
    owners: HashMap<usize, ThreadId>,
    waiting: HashMap<ThreadId, usize>,
}

impl CreationTracker {
    /// 当前线程若等待 `slot`，等待链是否会回到自己
    fn closes_cycle(&self, me: ThreadId, slot: usize) -> bool {
        let mut next = Some(slot);
        for _ in 0..=self.owners.len() {
            let Some(owner) = next.and_then(|slot| self.owners.get(&slot)) else {
                return false;
            };
            if *owner == me {
                return true;
            }
            next = self.waiting.get(owner).copied();
        }
        false
    }
}

/// 持有槽位的创建权；无论成功、失败还是 panic，离开时都会释放并唤醒等待者
struct PendingCreation<'a> {
    slot: &'a InstanceSlot,
    tracker: &'a Mutex<CreationTracker>,
    created: Option<ServiceInstance>,
}

impl Drop for PendingCreation<'_> {
    fn drop(&mut self) {
        let mut state = self.slot.state.lock();
        *state = match self.created.take() {
            Some(instance) => SlotState::Ready(instance),
            None => SlotState::Empty,
        };
        self.tracker.lock().owners.remove(&self.slot.id());
        drop(state);
        self.slot.ready.notify_all();
    }
}

/// 服务注册信息
struct Registration {
    service_type: ServiceType,
    lifetime: ServiceLifetime,
    source: ServiceSource,
}

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    singleton_cache_hits: AtomicUsize,
    singleton_cache_misses: AtomicUsize,
    transient_creations: AtomicUsize,
    scoped_creations: AtomicUsize,
    keyed_lookups: AtomicUsize,
    keyed_lookup_failures: AtomicUsize,
}

impl InnerStats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for counter in [
            &self.total_resolutions,
            &self.singleton_cache_hits,
            &self.singleton_cache_misses,
            &self.transient_creations,
            &self.scoped_creations,
            &self.keyed_lookups,
            &self.keyed_lookup_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

struct ContainerInner {
    registrations: Vec<Registration>,
    by_type: HashMap<TypeId, Vec<usize>>,
    singletons: DashMap<usize, SharedSlot>,
    creating: Mutex<CreationTracker>,
    config: ContainerConfig,
    stats: InnerStats,
}

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<(usize, usize, &'static str)>> =
        const { RefCell::new(Vec::new()) };
}

/// 解析栈守卫：进入时检测循环依赖，离开时出栈
struct ResolutionGuard;

impl ResolutionGuard {
    fn enter(container: usize, index: usize, name: &'static str) -> Result<Self, ContainerError> {
        RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.iter().any(|(c, i, _)| *c == container && *i == index) {
                let mut service_chain: Vec<String> =
                    stack.iter().map(|(_, _, name)| name.to_string()).collect();
                service_chain.push(name.to_string());
                return Err(ContainerError::CircularDependency {
                    service_chain,
                    cycle_point: name.to_string(),
                });
            }
            stack.push((container, index, name));
            Ok(ResolutionGuard)
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// 作用域实例缓存
struct ScopeCache {
    id: uuid::Uuid,
    name: String,
    instances: DashMap<usize, SharedSlot>,
    ended: AtomicBool,
}

impl ScopeCache {
    fn new(name: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            name,
            instances: DashMap::new(),
            ended: AtomicBool::new(false),
        }
    }

    fn ensure_active(&self) -> Result<(), ContainerError> {
        if self.ended.load(Ordering::Acquire) {
            return Err(ContainerError::ScopeError {
                scope_name: self.name.clone(),
                operation: "resolve_scoped_service".to_string(),
                reason: "scope has already ended".to_string(),
            });
        }
        Ok(())
    }
}

fn slot(map: &DashMap<usize, SharedSlot>, index: usize) -> SharedSlot {
    map.entry(index).or_insert_with(SharedSlot::default).clone()
}

fn circular_dependency(container: usize, name: &'static str) -> ContainerError {
    let mut service_chain: Vec<String> = RESOLUTION_STACK.with(|stack| {
        stack
            .borrow()
            .iter()
            .filter(|(c, _, _)| *c == container)
            .map(|(_, _, name)| name.to_string())
            .collect()
    });
    if service_chain.last().map(String::as_str) != Some(name) {
        service_chain.push(name.to_string());
    }
    ContainerError::CircularDependency {
        service_chain,
        cycle_point: name.to_string(),
    }
}

impl ContainerInner {
    fn build(
        descriptors: &[ServiceDescriptor],
        config: &ContainerConfig,
    ) -> Result<Self, ContainerError> {
        let mut registrations = Vec::with_capacity(descriptors.len());
        let mut by_type: HashMap<TypeId, Vec<usize>> = HashMap::new();

        for descriptor in descriptors {
            let service_type = *descriptor.service_type();
            if let Some(key) = descriptor.key() {
                return Err(ContainerError::InvalidDescriptor {
                    service_type: service_type.name().to_string(),
                    reason: format!(
                        "keyed registration ({:?}) reached a container without keyed support",
                        key
                    ),
                });
            }
            let source = descriptor.source().cloned().ok_or_else(|| {
                ContainerError::InvalidDescriptor {
                    service_type: service_type.name().to_string(),
                    reason: "no instance, factory or implementation type".to_string(),
                }
            })?;

            by_type
                .entry(service_type.id())
                .or_default()
                .push(registrations.len());
            registrations.push(Registration {
                service_type,
                lifetime: descriptor.lifetime(),
                source,
            });
        }

        debug!(
            registrations = registrations.len(),
            service_types = by_type.len(),
            "Service container built"
        );

        Ok(Self {
            registrations,
            by_type,
            singletons: DashMap::new(),
            creating: Mutex::new(CreationTracker::default()),
            config: config.clone(),
            stats: InnerStats::default(),
        })
    }

    fn indices(&self, service_type: &ServiceType) -> &[usize] {
        self.by_type
            .get(&service_type.id())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn container_id(&self) -> usize {
        self as *const ContainerInner as usize
    }

    /// 取出槽位中的实例，必要时由当前线程创建
    ///
    /// 返回值中的布尔值表示实例是否由本次调用创建。槽位正被其他线程创建时阻塞等待；
    /// 若等待会形成环（包括线程等待自己），返回 `CircularDependency`。
    fn get_or_create(
        &self,
        slot: &InstanceSlot,
        name: &'static str,
        create: impl FnOnce() -> Result<ServiceInstance, ContainerError>,
    ) -> Result<(ServiceInstance, bool), ContainerError> {
        let me = thread::current().id();
        let mut state = slot.state.lock();
        loop {
            match &*state {
                SlotState::Ready(instance) => return Ok((instance.clone(), false)),
                SlotState::Empty => break,
                SlotState::Creating(owner) => {
                    trace!(service = name, owner = ?owner, "Waiting for instance in construction");
                }
            }
            {
                let mut tracker = self.creating.lock();
                if tracker.closes_cycle(me, slot.id()) {
                    return Err(circular_dependency(self.container_id(), name));
                }
                tracker.waiting.insert(me, slot.id());
            }
            slot.ready.wait(&mut state);
            self.creating.lock().waiting.remove(&me);
        }

        *state = SlotState::Creating(me);
        self.creating.lock().owners.insert(slot.id(), me);
        drop(state);

        let mut pending = PendingCreation {
            slot,
            tracker: &self.creating,
            created: None,
        };
        let instance = create()?;
        pending.created = Some(instance.clone());
        Ok((instance, true))
    }

    /// 按生命周期获取或创建注册对应的实例
    ///
    /// `current` 是发起解析的提供者，`root` 是根容器；单例总是在根容器上下文中创建。
    fn materialize(
        &self,
        index: usize,
        current: &dyn ServiceProvider,
        root: &dyn ServiceProvider,
        scope: Option<&ScopeCache>,
    ) -> Result<ServiceInstance, ContainerError> {
        let registration = &self.registrations[index];
        let name = registration.service_type.name();
        let _guard = if self.config.detect_circular_dependencies {
            Some(ResolutionGuard::enter(self.container_id(), index, name)?)
        } else {
            None
        };

        match registration.lifetime {
            ServiceLifetime::Singleton => {
                let slot = slot(&self.singletons, index);
                let (instance, created) =
                    self.get_or_create(&slot, name, || self.create(registration, root))?;
                if created {
                    InnerStats::bump(&self.stats.singleton_cache_misses);
                    trace!(service = name, index, "Singleton created");
                } else {
                    InnerStats::bump(&self.stats.singleton_cache_hits);
                }
                Ok(instance)
            }
            ServiceLifetime::Scoped => {
                let scope = scope.ok_or_else(|| ContainerError::ScopeError {
                    scope_name: "root".to_string(),
                    operation: "resolve_scoped_service".to_string(),
                    reason: format!(
                        "scoped service '{}' cannot be resolved from the root container",
                        name
                    ),
                })?;
                scope.ensure_active()?;
                let slot = slot(&scope.instances, index);
                let (instance, created) =
                    self.get_or_create(&slot, name, || self.create(registration, current))?;
                if created {
                    InnerStats::bump(&self.stats.scoped_creations);
                    trace!(service = name, index, scope = %scope.name, "Scoped instance created");
                }
                // 作用域可能在创建期间结束，此时不能把实例留在已清空的缓存里
                if let Err(error) = scope.ensure_active() {
                    scope.instances.remove(&index);
                    return Err(error);
                }
                Ok(instance)
            }
            ServiceLifetime::Transient => {
                InnerStats::bump(&self.stats.transient_creations);
                self.create(registration, current)
            }
        }
    }

    fn create(
        &self,
        registration: &Registration,
        provider: &dyn ServiceProvider,
    ) -> Result<ServiceInstance, ContainerError> {
        match &registration.source {
            ServiceSource::Instance(instance) => Ok(instance.clone()),
            ServiceSource::Factory(factory) => factory(provider),
            ServiceSource::Implementation(implementation) => {
                implementation.construct(&ActivationContext::new(provider, None))
            }
        }
    }

    fn resolve_one(
        &self,
        service_type: &ServiceType,
        current: &dyn ServiceProvider,
        root: &dyn ServiceProvider,
        scope: Option<&ScopeCache>,
    ) -> Result<Option<ServiceInstance>, ContainerError> {
        InnerStats::bump(&self.stats.total_resolutions);
        match self.indices(service_type).last() {
            Some(&index) => self.materialize(index, current, root, scope).map(Some),
            None => Ok(None),
        }
    }

    fn resolve_all(
        &self,
        service_type: &ServiceType,
        current: &dyn ServiceProvider,
        root: &dyn ServiceProvider,
        scope: Option<&ScopeCache>,
    ) -> Result<Vec<ServiceInstance>, ContainerError> {
        InnerStats::bump(&self.stats.total_resolutions);
        self.indices(service_type)
            .iter()
            .map(|&index| self.materialize(index, current, root, scope))
            .collect()
    }

    fn registered_types(&self) -> Vec<ServiceType> {
        let mut seen = Vec::new();
        for registration in &self.registrations {
            if !seen.contains(&registration.service_type) {
                seen.push(registration.service_type);
            }
        }
        seen
    }
}

/// 依赖注入容器（根提供者）
#[derive(Clone)]
pub struct ServiceContainer {
    inner: Arc<ContainerInner>,
    root_scope: Arc<ScopeCache>,
}

impl ServiceContainer {
    /// 从描述符列表构建容器；描述符必须都是非键控且带有来源
    pub fn build(
        descriptors: &[ServiceDescriptor],
        config: &ContainerConfig,
    ) -> Result<Self, ContainerError> {
        Ok(Self {
            inner: Arc::new(ContainerInner::build(descriptors, config)?),
            root_scope: Arc::new(ScopeCache::new("root".to_string())),
        })
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// 根容器在未开启作用域校验时充当一个作用域
    fn root_scope(&self) -> Option<&ScopeCache> {
        if self.inner.config.validate_scopes {
            None
        } else {
            Some(&self.root_scope)
        }
    }

    pub fn create_scope(&self) -> ServiceScope {
        self.create_named_scope("scope")
    }

    pub fn create_named_scope(&self, name: impl Into<String>) -> ServiceScope {
        let cache = ScopeCache::new(name.into());
        debug!(scope_id = %cache.id, scope = %cache.name, "Scope created");
        ServiceScope {
            root: self.clone(),
            cache: Arc::new(cache),
        }
    }

    pub fn is_registered(&self, service_type: &ServiceType) -> bool {
        !self.inner.indices(service_type).is_empty()
    }

    pub fn registration_count(&self) -> usize {
        self.inner.registrations.len()
    }

    /// 获取容器统计信息
    pub fn get_stats(&self) -> ContainerStats {
        let stats = &self.inner.stats;
        ContainerStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            singleton_cache_hits: stats.singleton_cache_hits.load(Ordering::Relaxed),
            singleton_cache_misses: stats.singleton_cache_misses.load(Ordering::Relaxed),
            transient_creations: stats.transient_creations.load(Ordering::Relaxed),
            scoped_creations: stats.scoped_creations.load(Ordering::Relaxed),
            keyed_lookups: stats.keyed_lookups.load(Ordering::Relaxed),
            keyed_lookup_failures: stats.keyed_lookup_failures.load(Ordering::Relaxed),
            registered_services: self.inner.registrations.len(),
            active_singletons: self
                .inner
                .singletons
                .iter()
                .filter(|entry| entry.value().is_ready())
                .count(),
        }
    }

    /// 重置统计计数器（不影响已缓存的实例）
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
    }
}

impl ServiceProvider for ServiceContainer {
    fn resolve_one(
        &self,
        service_type: &ServiceType,
    ) -> Result<Option<ServiceInstance>, ContainerError> {
        self.inner
            .resolve_one(service_type, self, self, self.root_scope())
    }

    fn resolve_all(
        &self,
        service_type: &ServiceType,
    ) -> Result<Vec<ServiceInstance>, ContainerError> {
        self.inner
            .resolve_all(service_type, self, self, self.root_scope())
    }

    fn activate(
        &self,
        implementation: &ImplementationType,
        key: Option<&ServiceKey>,
    ) -> Result<ServiceInstance, ContainerError> {
        implementation.construct(&ActivationContext::new(self, key))
    }

    fn registered_types(&self) -> Vec<ServiceType> {
        self.inner.registered_types()
    }

    fn record_keyed_lookup(&self, matched: bool) {
        InnerStats::bump(&self.inner.stats.keyed_lookups);
        if !matched {
            InnerStats::bump(&self.inner.stats.keyed_lookup_failures);
        }
    }
}

/// 作用域提供者：与根容器共享注册和单例，拥有独立的作用域实例缓存
#[derive(Clone)]
pub struct ServiceScope {
    root: ServiceContainer,
    cache: Arc<ScopeCache>,
}

impl ServiceScope {
    pub fn id(&self) -> uuid::Uuid {
        self.cache.id
    }

    pub fn name(&self) -> &str {
        &self.cache.name
    }

    pub fn root(&self) -> &ServiceContainer {
        &self.root
    }

    pub fn is_active(&self) -> bool {
        !self.cache.ended.load(Ordering::Acquire)
    }

    /// 结束作用域并释放作用域实例
    pub fn end(&self) {
        if !self.cache.ended.swap(true, Ordering::AcqRel) {
            self.cache.instances.clear();
            debug!(scope_id = %self.cache.id, scope = %self.cache.name, "Scope ended");
        }
    }
}

impl ServiceProvider for ServiceScope {
    fn resolve_one(
        &self,
        service_type: &ServiceType,
    ) -> Result<Option<ServiceInstance>, ContainerError> {
        self.root
            .inner
            .resolve_one(service_type, self, &self.root, Some(&self.cache))
    }

    fn resolve_all(
        &self,
        service_type: &ServiceType,
    ) -> Result<Vec<ServiceInstance>, ContainerError> {
        self.root
            .inner
            .resolve_all(service_type, self, &self.root, Some(&self.cache))
    }

    fn activate(
        &self,
        implementation: &ImplementationType,
        key: Option<&ServiceKey>,
    ) -> Result<ServiceInstance, ContainerError> {
        implementation.construct(&ActivationContext::new(self, key))
    }

    fn registered_types(&self) -> Vec<ServiceType> {
        self.root.inner.registered_types()
    }

    fn record_keyed_lookup(&self, matched: bool) {
        self.root.record_keyed_lookup(matched);
    }
}

/// 容器统计信息
#[derive(Debug, Clone, Default)]
pub struct ContainerStats {
    pub total_resolutions: usize,
    pub singleton_cache_hits: usize,
    pub singleton_cache_misses: usize,
    pub transient_creations: usize,
    pub scoped_creations: usize,
    pub keyed_lookups: usize,
    pub keyed_lookup_failures: usize,
    pub registered_services: usize,
    pub active_singletons: usize,
}

impl ContainerStats {
    /// 获取单例缓存命中率（小数形式）
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.singleton_cache_hits + self.singleton_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.singleton_cache_hits as f64 / total as f64
        }
    }

    /// 获取性能指标摘要
    pub fn performance_summary(&self) -> String {
        format!(
            "Container Performance: {} total resolutions, {:.1}% cache hit rate, {} registered services, {} active singletons, {} keyed lookups ({} misses)",
            self.total_resolutions,
            self.cache_hit_rate() * 100.0,
            self.registered_services,
            self.active_singletons,
            self.keyed_lookups,
            self.keyed_lookup_failures
        )
    }
}
