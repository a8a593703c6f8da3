use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wirebox_core::prelude::*;

static NEXT_REPORT: AtomicUsize = AtomicUsize::new(1);

fn next_report_id() -> usize {
    NEXT_REPORT.fetch_add(1, Ordering::SeqCst)
}

pub trait ReportBuilder: Send + Sync {
    fn id(&self) -> usize;
    fn title(&self) -> String;
    fn has_clock(&self) -> bool;
}

mod fresh {
    use super::*;

    #[derive(ManagedApplication)]
    #[packages("access_scope::fresh")]
    pub struct App;

    #[derive(Managed)]
    pub struct Clock;

    #[derive(Managed)]
    #[implements(ReportBuilder)]
    pub struct PdfReport {
        #[managed(default = "next_report_id")]
        id: usize,
        #[wire]
        clock: Wired<Clock>,
        #[configurable]
        title: Setting<String>,
    }

    impl ReportBuilder for PdfReport {
        fn id(&self) -> usize {
            self.id
        }

        fn title(&self) -> String {
            self.title.get()
        }

        fn has_clock(&self) -> bool {
            self.clock.get().is_some()
        }
    }

    #[derive(Managed)]
    #[managed(name = "desk")]
    pub struct Desk {
        #[wire]
        pub reports: OnAccess<dyn ReportBuilder>,
    }

    fn context() -> Arc<Context> {
        Context::builder()
            .application::<App>()
            .configuration_store(
                MapConfigurationStore::new().with("PdfReport", [("title", "Quarterly")]),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_every_access_builds_a_new_instance() {
        let context = context();
        let desk = context.get_instance::<Desk>("desk").unwrap();

        let first = desk.reports.resolve().unwrap();
        let second = desk.reports.resolve().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_ne!(first.id(), second.id());

        let third = desk.reports.invoke(|report| report.id()).unwrap();
        assert_ne!(third, second.id());
    }

    #[test]
    fn test_fresh_instance_is_wired_and_configured() {
        let context = context();
        let desk = context.get_instance::<Desk>("desk").unwrap();
        let report = desk.reports.resolve().unwrap();
        assert!(report.has_clock());
        assert_eq!(report.title(), "Quarterly");
    }

    #[test]
    fn test_fresh_instances_are_not_registered() {
        let context = context();
        let before = context.component_names();
        let desk = context.get_instance::<Desk>("desk").unwrap();
        desk.reports.resolve().unwrap();
        assert_eq!(context.component_names(), before);
    }

    #[test]
    fn test_closed_context_refuses_access() {
        let context = context();
        let desk = context.get_instance::<Desk>("desk").unwrap();
        context.close().unwrap();
        let err = desk.reports.resolve().err().unwrap();
        assert!(matches!(err, ContainerError::ContextClosed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_access_yields_distinct_instances() {
        let context = context();
        let desk = context.get_instance::<Desk>("desk").unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let desk = Arc::clone(&desk);
                tokio::spawn(async move { desk.reports.invoke(|report| report.id()).unwrap() })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 16);
    }
}

mod illegal {
    use super::*;

    #[derive(ManagedApplication)]
    #[packages("access_scope::illegal")]
    pub struct App;

    /// 没有 derive(Managed)
    pub struct Plain;

    pub trait Unimplemented: Send + Sync {}

    #[derive(Managed)]
    #[managed(name = "holder")]
    pub struct Holder {
        #[wire]
        pub plain: OnAccess<Plain>,
        #[wire]
        pub nothing: OnAccess<dyn Unimplemented>,
    }

    fn holder() -> (Arc<Context>, Arc<Holder>) {
        let context = Context::builder()
            .application::<App>()
            .configuration_store(MapConfigurationStore::new())
            .build()
            .unwrap();
        let holder = context.get_instance::<Holder>("holder").unwrap();
        (context, holder)
    }

    #[test]
    fn test_unmanaged_concrete_target_is_illegal() {
        let (_context, holder) = holder();
        let err = holder.plain.resolve().err().unwrap();
        assert!(matches!(err, ContainerError::IllegalWiring { .. }));
    }

    #[test]
    fn test_interface_without_implementers() {
        let (_context, holder) = holder();
        let err = holder.nothing.resolve().err().unwrap();
        assert!(matches!(err, ContainerError::MatchingDependencyNotFound { .. }));
    }

    #[test]
    fn test_dropped_context_is_reported() {
        let (context, holder) = holder();
        drop(context);
        let err = holder.plain.resolve().err().unwrap();
        assert!(matches!(err, ContainerError::ContextClosed));
    }
}

mod ambiguous {
    use super::*;

    #[derive(ManagedApplication)]
    #[packages("access_scope::ambiguous")]
    pub struct App;

    #[derive(Managed)]
    #[managed(name = "csv")]
    #[implements(ReportBuilder)]
    pub struct CsvReport;

    #[derive(Managed)]
    #[managed(name = "html")]
    #[implements(ReportBuilder)]
    pub struct HtmlReport;

    macro_rules! fixed_report {
        ($ty:ty, $id:expr) => {
            impl ReportBuilder for $ty {
                fn id(&self) -> usize {
                    $id
                }

                fn title(&self) -> String {
                    String::new()
                }

                fn has_clock(&self) -> bool {
                    false
                }
            }
        };
    }

    fixed_report!(CsvReport, 0);
    fixed_report!(HtmlReport, 1);

    #[derive(Managed)]
    #[managed(name = "exporter")]
    pub struct Exporter {
        #[wire]
        pub any: OnAccess<dyn ReportBuilder>,
        #[wire(name = "html")]
        pub html: OnAccess<dyn ReportBuilder>,
    }

    #[test]
    fn test_ambiguous_interface_fails_on_access() {
        let context = Context::builder()
            .application::<App>()
            .configuration_store(MapConfigurationStore::new())
            .build()
            .unwrap();
        let exporter = context.get_instance::<Exporter>("exporter").unwrap();

        let err = exporter.any.resolve().err().unwrap();
        assert!(matches!(err, ContainerError::AmbiguousDependency { .. }));

        assert_eq!(exporter.html.invoke(|report| report.id()).unwrap(), 1);
    }
}
