//! 按类型解析容器的集成测试

#![allow(clippy::uninlined_format_args)]

use futures_util::future;
use keyed_di::{
    ActivationContext, ContainerConfig, ContainerError, Injectable, ServiceCollection,
    ServiceContainer, ServiceDescriptor, ServiceLifetime, ServiceProvider, ServiceProviderExt,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Barrier};
use std::thread;
use tokio::time::{sleep, Duration};

/// 测试用的服务
#[derive(Clone)]
struct CalculatorService {
    multiplier: i32,
}

impl CalculatorService {
    async fn process(&self, input: i32) -> i32 {
        sleep(Duration::from_millis(1)).await;
        input * self.multiplier
    }
}

struct LoggerService {
    prefix: String,
}

/// 依赖两个服务的实现类型
struct ReportService {
    calculator: Arc<CalculatorService>,
    logger: Option<Arc<LoggerService>>,
}

impl Injectable for ReportService {
    fn inject(context: &ActivationContext<'_>) -> Result<Self, ContainerError> {
        Ok(ReportService {
            calculator: context.resolve::<CalculatorService>()?,
            logger: context.try_resolve::<LoggerService>()?,
        })
    }
}

fn build(services: &ServiceCollection) -> ServiceContainer {
    ServiceContainer::build(services.as_slice(), &ContainerConfig::default()).unwrap()
}

#[tokio::test]
async fn test_basic_service_registration_and_resolution() {
    let mut services = ServiceCollection::new();
    services.add_singleton(|_| Ok(Arc::new(CalculatorService { multiplier: 2 })));
    let container = build(&services);

    let service = container.get_required::<CalculatorService>().unwrap();
    assert_eq!(service.process(21).await, 42);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_singleton_behavior() {
    let creation_count = Arc::new(AtomicUsize::new(0));
    let count_clone = creation_count.clone();
    let mut services = ServiceCollection::new();
    services.add_singleton(move |_| {
        count_clone.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(CalculatorService { multiplier: 3 }))
    });
    let container = build(&services);

    let mut handles = vec![];
    for i in 0..50 {
        let container_clone = container.clone();
        handles.push(tokio::spawn(async move {
            let service = container_clone.get_required::<CalculatorService>().unwrap();
            (i, service.multiplier)
        }));
    }

    let results = future::join_all(handles).await;
    for res in results {
        let (index, multiplier) = res.unwrap();
        assert_eq!(multiplier, 3, "Service {} has wrong multiplier", index);
    }

    // 验证只创建了一次服务
    assert_eq!(creation_count.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_stats() {
    let mut services = ServiceCollection::new();
    services.add_singleton(|_| Ok(Arc::new(CalculatorService { multiplier: 5 })));
    let container = build(&services);

    let mut handles = vec![];
    for _ in 0..1000 {
        let container_clone = container.clone();
        handles.push(tokio::spawn(async move {
            container_clone.get_required::<CalculatorService>().map(|s| s.multiplier)
        }));
    }

    let results = future::join_all(handles).await;
    assert_eq!(results.len(), 1000);
    for result in results {
        assert_eq!(result.unwrap().unwrap(), 5);
    }

    let stats = container.get_stats();
    assert_eq!(stats.total_resolutions, 1000);
    assert_eq!(stats.singleton_cache_misses, 1);
    assert!(stats.cache_hit_rate() > 0.99); // 第一次miss，后面都应该hit
}

#[test]
fn test_constructor_injection_with_optional_dependency() {
    let mut services = ServiceCollection::new();
    services
        .add_singleton_instance(Arc::new(CalculatorService { multiplier: 4 }))
        .add_transient_type::<ReportService, ReportService>(|r| r);
    let container = build(&services);

    let report = container.get_required::<ReportService>().unwrap();
    assert_eq!(report.calculator.multiplier, 4);
    assert!(report.logger.is_none());

    services.add_singleton_instance(Arc::new(LoggerService {
        prefix: "app".to_string(),
    }));
    let container = build(&services);
    let report = container.get_required::<ReportService>().unwrap();
    assert_eq!(report.logger.as_ref().map(|l| l.prefix.as_str()), Some("app"));
}

#[test]
fn test_missing_dependency_reports_type() {
    let mut services = ServiceCollection::new();
    services.add_transient_type::<ReportService, ReportService>(|r| r);
    let container = build(&services);

    match container.get_required::<ReportService>() {
        Err(ContainerError::ServiceNotRegistered { type_name, available_services, .. }) => {
            assert!(type_name.contains("CalculatorService"));
            assert_eq!(available_services.len(), 1);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("resolution should fail"),
    }
}

#[test]
fn test_factory_errors_propagate() {
    let mut services = ServiceCollection::new();
    services.add_transient::<CalculatorService, _>(|_| {
        Err(ContainerError::creation_failed(
            "CalculatorService",
            std::io::Error::other("Service creation failed"),
        ))
    });
    let container = build(&services);

    let result = container.get_required::<CalculatorService>();
    match result {
        Err(error @ ContainerError::ServiceCreationFailed { .. }) => {
            assert!(std::error::Error::source(&error).is_some());
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("resolution should fail"),
    }
}

#[test]
fn test_circular_detection_can_be_disabled_for_acyclic_graphs() {
    let config = ContainerConfig {
        detect_circular_dependencies: false,
        ..ContainerConfig::default()
    };
    let mut services = ServiceCollection::new();
    services
        .add_singleton_instance(Arc::new(CalculatorService { multiplier: 6 }))
        .add_transient_type::<ReportService, ReportService>(|r| r);
    let container = ServiceContainer::build(services.as_slice(), &config).unwrap();

    assert_eq!(container.get_required::<ReportService>().unwrap().calculator.multiplier, 6);
}

#[test]
fn test_singletons_are_shared_with_scopes() {
    let mut services = ServiceCollection::new();
    services
        .add_singleton(|_| Ok(Arc::new(CalculatorService { multiplier: 7 })))
        .add_scoped(|provider| {
            let calculator = provider.get_required::<CalculatorService>()?;
            Ok(Arc::new(LoggerService {
                prefix: format!("x{}", calculator.multiplier),
            }))
        });
    let container = build(&services);

    let scope = container.create_scope();
    let from_scope = scope.get_required::<CalculatorService>().unwrap();
    let from_root = container.get_required::<CalculatorService>().unwrap();
    assert!(Arc::ptr_eq(&from_scope, &from_root));
    assert_eq!(scope.get_required::<LoggerService>().unwrap().prefix, "x7");
    assert_eq!(scope.registered_types().len(), 2);
}

#[test]
fn test_descriptor_api_matches_collection_api() {
    let descriptors = vec![
        ServiceDescriptor::factory(ServiceLifetime::Transient, |_| {
            Ok(Arc::new(CalculatorService { multiplier: 1 }))
        }),
        ServiceDescriptor::instance(Arc::new(CalculatorService { multiplier: 2 })),
    ];
    let container = ServiceContainer::build(&descriptors, &ContainerConfig::default()).unwrap();

    assert_eq!(container.registration_count(), 2);
    assert_eq!(container.get_required::<CalculatorService>().unwrap().multiplier, 2);
    let all: Vec<i32> = container
        .get_all::<CalculatorService>()
        .unwrap()
        .iter()
        .map(|c| c.multiplier)
        .collect();
    assert_eq!(all, vec![1, 2]);
}

struct Left;
struct Right;

/// 只在第一次调用时于屏障处会合
fn rendezvous_once(barrier: &Barrier, calls: &AtomicUsize) {
    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
        barrier.wait();
    }
}

/// 两个互相依赖的单例；两个工厂首次执行时都在屏障处会合后才解析对方
fn crossed_singletons(barrier: Arc<Barrier>) -> ServiceContainer {
    let left_barrier = barrier.clone();
    let left_calls = Arc::new(AtomicUsize::new(0));
    let right_calls = Arc::new(AtomicUsize::new(0));
    let mut services = ServiceCollection::new();
    services
        .add_singleton(move |provider| {
            rendezvous_once(&left_barrier, &left_calls);
            provider.get_required::<Right>()?;
            Ok(Arc::new(Left))
        })
        .add_singleton(move |provider| {
            rendezvous_once(&barrier, &right_calls);
            provider.get_required::<Left>()?;
            Ok(Arc::new(Right))
        });
    build(&services)
}

#[test]
fn test_cycle_across_threads_errors_instead_of_blocking() {
    let container = crossed_singletons(Arc::new(Barrier::new(2)));
    let (sender, receiver) = mpsc::channel();

    let left = {
        let container = container.clone();
        let sender = sender.clone();
        thread::spawn(move || {
            let _ = sender.send(("left", container.get_required::<Left>().map(|_| ())));
        })
    };
    let right = {
        let container = container.clone();
        thread::spawn(move || {
            let _ = sender.send(("right", container.get_required::<Right>().map(|_| ())));
        })
    };

    for _ in 0..2 {
        let (side, result) = receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("cyclic resolution must finish");
        assert!(
            matches!(result, Err(ContainerError::CircularDependency { .. })),
            "{} side returned {:?}",
            side,
            result.err()
        );
    }
    left.join().unwrap();
    right.join().unwrap();

    let stats = container.get_stats();
    assert_eq!(stats.active_singletons, 0);
}

#[test]
fn test_singleton_waiters_share_one_creation() {
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let created = Arc::new(AtomicUsize::new(0));
    let mut services = ServiceCollection::new();
    {
        let started = started.clone();
        let release = release.clone();
        let created = created.clone();
        services
            .add_singleton(|_| Ok(Arc::new(LoggerService { prefix: "ready".to_string() })))
            .add_singleton(move |_| {
                created.fetch_add(1, Ordering::SeqCst);
                started.wait();
                release.wait();
                Ok(Arc::new(CalculatorService { multiplier: 8 }))
            });
    }
    let container = build(&services);
    container.get_required::<LoggerService>().unwrap();

    let creator = {
        let container = container.clone();
        thread::spawn(move || container.get_required::<CalculatorService>().unwrap())
    };
    started.wait();

    // 创建进行中时统计不阻塞，只计入已完成的单例
    assert_eq!(container.get_stats().active_singletons, 1);

    let waiter = {
        let container = container.clone();
        thread::spawn(move || container.get_required::<CalculatorService>().unwrap())
    };
    release.wait();

    let first = creator.join().unwrap();
    let second = waiter.join().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(container.get_stats().active_singletons, 2);
}
