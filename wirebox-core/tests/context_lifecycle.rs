use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wirebox_core::prelude::*;
use wirebox_core::{MapConfigurationStore, CONTEXT_COMPONENT_NAME};

fn context_for<A: 'static>() -> ContainerResult<Arc<Context>> {
    Context::builder()
        .application::<A>()
        .configuration_store(MapConfigurationStore::new())
        .build()
}

mod hooks {
    use super::*;
    use std::sync::Mutex;

    pub static STARTED: AtomicUsize = AtomicUsize::new(0);
    pub static STOPPED: AtomicUsize = AtomicUsize::new(0);
    pub static STOP_ORDER: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    #[derive(ManagedApplication)]
    #[packages("context_lifecycle::hooks")]
    pub struct App;

    #[derive(Managed)]
    #[managed(name = "first")]
    #[initialize("start")]
    #[clean_up("stop")]
    pub struct First;

    impl First {
        fn start(&self) {
            STARTED.fetch_add(1, Ordering::SeqCst);
        }

        fn stop(&self) {
            STOPPED.fetch_add(1, Ordering::SeqCst);
            STOP_ORDER.lock().unwrap().push("first");
        }
    }

    #[derive(Managed)]
    #[managed(name = "second")]
    #[initialize("start")]
    #[clean_up("stop")]
    pub struct Second {
        // 构造器依赖保证 first 先于 second 注册
        #[inject(name = "first")]
        pub first: Arc<First>,
    }

    impl Second {
        fn start(&self) -> anyhow::Result<()> {
            STARTED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> anyhow::Result<()> {
            STOPPED.fetch_add(1, Ordering::SeqCst);
            STOP_ORDER.lock().unwrap().push("second");
            Ok(())
        }
    }

    #[test]
    fn test_hooks_run_once_and_clean_up_in_reverse_order() {
        let context = context_for::<App>().unwrap();
        assert_eq!(context.state(), LifecycleState::Initialized);
        assert_eq!(STARTED.load(Ordering::SeqCst), 2);
        assert_eq!(STOPPED.load(Ordering::SeqCst), 0);

        context.close().unwrap();
        assert_eq!(STOPPED.load(Ordering::SeqCst), 2);
        assert_eq!(*STOP_ORDER.lock().unwrap(), vec!["second", "first"]);

        context.close().unwrap();
        assert_eq!(STOPPED.load(Ordering::SeqCst), 2);
        assert_eq!(context.state(), LifecycleState::Closed);
        assert!(context.get_instance::<First>("first").is_none());
    }
}

mod failing_hook {
    use super::*;

    #[derive(ManagedApplication)]
    #[packages("context_lifecycle::failing_hook")]
    pub struct App;

    #[derive(Managed)]
    #[managed(name = "broken")]
    #[initialize("start")]
    pub struct Broken;

    impl Broken {
        fn start(&self) -> anyhow::Result<()> {
            anyhow::bail!("refusing to start")
        }
    }

    #[test]
    fn test_initialize_failure_aborts_init() {
        let err = context_for::<App>().unwrap_err();
        match err {
            ContainerError::LifecycleHook { component, hook, .. } => {
                assert_eq!(component, "broken");
                assert_eq!(hook, "start");
            }
            other => panic!("expected hook failure, got {other}"),
        }
    }
}

mod self_registration {
    use super::*;

    #[derive(ManagedApplication)]
    #[packages("context_lifecycle::self_registration")]
    pub struct App;

    #[derive(Managed)]
    #[managed(name = "introspector")]
    pub struct Introspector {
        #[wire(name = "Context")]
        pub context: Wired<Context>,
    }

    #[test]
    fn test_context_is_injectable() {
        let context = context_for::<App>().unwrap();
        assert_eq!(context.component_names()[0], CONTEXT_COMPONENT_NAME);

        let introspector = context.get_instance::<Introspector>("introspector").unwrap();
        let injected = introspector.context.get().unwrap();
        assert!(Arc::ptr_eq(&injected, &context));
        assert!(injected.contains_component("introspector"));
    }

    #[test]
    fn test_injected_context_does_not_keep_it_alive() {
        let context = context_for::<App>().unwrap();
        let introspector = context.get_instance::<Introspector>("introspector").unwrap();
        assert!(introspector.context.get().is_some());

        let weak = Arc::downgrade(&context);
        drop(context);
        assert!(weak.upgrade().is_none());
        assert!(introspector.context.get().is_none());
    }
}

mod registration {
    use super::*;
    use wirebox_core::WireTarget;

    #[derive(ManagedApplication)]
    #[packages("context_lifecycle::registration")]
    pub struct App;

    pub trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    #[derive(Managed)]
    #[managed(manual)]
    #[implements(Clock)]
    pub struct FixedClock {
        pub at: u64,
    }

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.at
        }
    }

    #[derive(Managed)]
    #[managed(name = "scheduler")]
    pub struct Scheduler {
        #[wire]
        pub clock: Wired<dyn Clock>,
    }

    #[derive(Managed, Default)]
    #[managed(manual)]
    pub struct Alarm {
        #[wire(name = "scheduler")]
        pub scheduler: Wired<Scheduler>,
        #[configurable]
        pub volume: Setting<u32>,
    }

    #[test]
    fn test_register_returns_same_instance_and_wires_it() {
        let context = context_for::<App>().unwrap();
        let scheduler = context.get_instance::<Scheduler>("scheduler").unwrap();
        assert!(scheduler.clock.get().is_none());

        let clock = Arc::new(FixedClock { at: 1_700_000_000 });
        context.register(Arc::clone(&clock), "clock").unwrap();

        let registered = context.get_instance::<FixedClock>("clock").unwrap();
        assert!(Arc::ptr_eq(&registered, &clock));

        // register 会重建注册表，需要重新取组件
        let rebuilt = context.get_instance::<Scheduler>("scheduler").unwrap();
        assert!(!Arc::ptr_eq(&rebuilt, &scheduler));
        assert_eq!(rebuilt.clock.get().unwrap().now(), 1_700_000_000);
        assert_eq!(context.state(), LifecycleState::Initialized);
    }

    #[test]
    fn test_registered_instance_is_wired_and_configured() {
        let context = Context::builder()
            .application::<App>()
            .configuration_store(MapConfigurationStore::new().with("alarm", [("volume", "7")]))
            .build()
            .unwrap();

        let alarm = Arc::new(Alarm::default());
        assert!(!alarm.scheduler.is_bound());
        context.register(Arc::clone(&alarm), "alarm").unwrap();

        let scheduler = context.get_instance::<Scheduler>("scheduler").unwrap();
        assert!(Arc::ptr_eq(&alarm.scheduler.get().unwrap(), &scheduler));
        assert_eq!(alarm.volume.get(), 7);
        assert_eq!(context.component_names(), vec!["Context", "alarm", "scheduler"]);
    }

    #[test]
    fn test_manual_components_are_not_scanned() {
        let context = context_for::<App>().unwrap();
        let clock = TargetType::interface::<dyn Clock>();
        assert!(context.find_implementers(&clock).is_empty());
        assert_eq!(context.component_names(), vec!["Context", "scheduler"]);
    }
}

mod fixtures {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(ManagedApplication)]
    #[packages("context_lifecycle::fixtures")]
    pub struct App;

    #[derive(Managed)]
    #[managed(name = "ledger")]
    pub struct Ledger {
        #[configurable]
        pub currency: Setting<String>,
    }

    /// 测试类自身作为组件参与装配
    #[derive(Managed, Default)]
    #[managed(manual)]
    #[initialize("prepare")]
    pub struct LedgerTest {
        #[wire(name = "ledger")]
        pub ledger: Wired<Ledger>,
        #[configurable]
        pub rounds: Setting<u32>,
        pub prepared: AtomicBool,
    }

    impl LedgerTest {
        fn prepare(&self) -> anyhow::Result<()> {
            let ledger = self.ledger.require()?;
            anyhow::ensure!(!ledger.currency.get().is_empty(), "ledger has no currency");
            self.prepared.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_fixture_takes_part_in_first_initialization() {
        let fixture = Arc::new(LedgerTest::default());
        let context = Context::builder()
            .application::<App>()
            .configuration_store(
                MapConfigurationStore::new()
                    .with("ledger", [("currency", "EUR")])
                    .with("LedgerTest", [("rounds", "3")]),
            )
            .build_with(Arc::clone(&fixture))
            .unwrap();

        let registered = context.get_instance::<LedgerTest>("LedgerTest").unwrap();
        assert!(Arc::ptr_eq(&registered, &fixture));
        let ledger = context.get_instance::<Ledger>("ledger").unwrap();
        assert!(Arc::ptr_eq(&fixture.ledger.get().unwrap(), &ledger));
        assert_eq!(fixture.rounds.get(), 3);
        assert!(fixture.prepared.load(Ordering::SeqCst));
        assert_eq!(context.state(), LifecycleState::Initialized);
    }

    #[test]
    fn test_init_with_registers_under_simple_name() {
        // 没有配置目录时 ledger 没有币种，prepare 回调失败
        let err = Context::init_with::<App, _>(Arc::new(LedgerTest::default())).unwrap_err();
        assert!(matches!(
            err,
            ContainerError::LifecycleHook { ref component, ref hook, .. }
                if component == "LedgerTest" && hook == "prepare"
        ));
    }
}

mod bootstrap {
    use super::*;

    pub struct NotAnApplication;

    #[derive(ManagedApplication)]
    #[packages("context_lifecycle::bootstrap")]
    pub struct Empty;

    #[test]
    fn test_unmarked_application_is_rejected() {
        let err = context_for::<NotAnApplication>().unwrap_err();
        assert!(matches!(err, ContainerError::ApplicationInitialization(_)));
    }

    #[test]
    fn test_each_init_builds_a_fresh_context() {
        let first = context_for::<Empty>().unwrap();
        let second = context_for::<Empty>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.component_names(), vec![CONTEXT_COMPONENT_NAME]);
    }
}
