use canopy_di::{DiError, LifetimeScope, Registration, ScopeTag};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn test_children_see_parent_registrations() {
    struct AppConfig {
        name: String,
    }

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<AppConfig>()
                .activate_with(|_| Ok(AppConfig { name: "app".into() }))
                .single_instance()
                .build(),
        );
    });

    let child = root.begin_child().unwrap();
    let grandchild = child.begin_child().unwrap();
    assert_eq!(grandchild.resolve_typed::<AppConfig>().unwrap().name, "app");
}

#[test]
fn test_parent_cannot_see_child_registrations() {
    struct RequestContextData;

    let root = LifetimeScope::root(|_| {});
    let _child = root
        .begin_child_with(None, |r| {
            r.register(
                Registration::for_type::<RequestContextData>()
                    .activate_with(|_| Ok(RequestContextData))
                    .build(),
            );
        })
        .unwrap();

    assert!(root.resolve_typed::<RequestContextData>().is_err());
}

#[test]
fn test_sibling_scopes_are_isolated() {
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    struct PerScope(u32);

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<PerScope>()
                .activate_with(|_| Ok(PerScope(COUNTER.fetch_add(1, Ordering::SeqCst))))
                .instance_per_lifetime_scope()
                .build(),
        );
    });

    let left = root.begin_child().unwrap();
    let right = root.begin_child().unwrap();

    let a = left.resolve_typed::<PerScope>().unwrap();
    let b = left.resolve_typed::<PerScope>().unwrap();
    let c = right.resolve_typed::<PerScope>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(&a, &c));
    assert_ne!(a.0, c.0);
}

#[test]
fn test_duplicate_ancestor_tag_is_rejected() {
    let root = LifetimeScope::root(|_| {});
    let unit = root.begin_child_tagged("unit").unwrap();
    let inner = unit.begin_child().unwrap();

    // The same tag anywhere on the ancestor path fails, even with
    // anonymous scopes in between.
    let result = inner.begin_child_tagged("unit");
    assert!(matches!(result, Err(DiError::DuplicateScopeTag { .. })));

    // A sibling path may reuse the tag.
    let other = root.begin_child().unwrap();
    assert!(other.begin_child_tagged("other-unit").is_ok());
}

#[test]
fn test_anonymous_tags_never_collide() {
    let root = LifetimeScope::root(|_| {});
    let a = root.begin_child().unwrap();
    let b = a.begin_child().unwrap();
    let c = b.begin_child().unwrap();
    assert_ne!(a.tag(), b.tag());
    assert_ne!(b.tag(), c.tag());
}

#[test]
fn test_explicit_scope_tags_are_visible() {
    let root = LifetimeScope::root(|_| {});
    let tagged = root.begin_child_tagged("request").unwrap();
    assert_eq!(tagged.tag(), &ScopeTag::named("request"));
    assert_eq!(root.tag(), &ScopeTag::named("root"));
}

#[test]
fn test_root_scope_links() {
    let root = LifetimeScope::root(|_| {});
    let child = root.begin_child().unwrap();
    let grandchild = child.begin_child().unwrap();

    assert!(Arc::ptr_eq(&grandchild.root_scope(), &root));
    assert!(Arc::ptr_eq(grandchild.parent().unwrap(), &child));
    assert!(root.parent().is_none());
}

#[test]
fn test_resolve_after_dispose_fails() {
    struct Anything;

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Anything>()
                .activate_with(|_| Ok(Anything))
                .build(),
        );
    });

    root.dispose().unwrap();
    let result = root.resolve_typed::<Anything>();
    assert!(matches!(result, Err(DiError::ScopeDisposed)));
}

#[test]
fn test_resolve_through_disposed_ancestor_fails() {
    struct Anything;

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Anything>()
                .activate_with(|_| Ok(Anything))
                .build(),
        );
    });
    let child = root.begin_child().unwrap();

    root.dispose().unwrap();
    let result = child.resolve_typed::<Anything>();
    assert!(matches!(result, Err(DiError::ScopeDisposed)));
}

#[test]
fn test_begin_child_on_disposed_scope_fails() {
    let root = LifetimeScope::root(|_| {});
    root.dispose().unwrap();
    assert!(matches!(root.begin_child(), Err(DiError::ScopeDisposed)));
}

#[test]
fn test_child_scope_beginning_event_fires() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let root = LifetimeScope::root(|_| {});

    let seen_clone = seen.clone();
    root.on_child_scope_beginning(move |child| {
        seen_clone.lock().unwrap().push(child.tag().to_string());
    });

    root.begin_child_tagged("first").unwrap();
    root.begin_child_tagged("second").unwrap();

    assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
}

#[test]
fn test_properties_fall_back_through_the_ancestor_chain() {
    let root = LifetimeScope::root(|r| {
        r.set_property("environment", "production".to_string());
        r.set_property("region", "eu-west-1".to_string());
    });
    let child = root
        .begin_child_with(None, |r| {
            r.set_property("environment", "test".to_string());
        })
        .unwrap();

    assert_eq!(
        *child.registry().property::<String>("environment").unwrap(),
        "test"
    );
    assert_eq!(
        *child.registry().property::<String>("region").unwrap(),
        "eu-west-1"
    );
    assert_eq!(
        *root.registry().property::<String>("environment").unwrap(),
        "production"
    );
    assert!(child.registry().property::<String>("missing").is_none());
}

#[test]
fn test_isolated_child_drops_non_adapter_sources() {
    use canopy_di::{ComponentRegistry, RegistrationSource, Service};

    struct ValueSource {
        adapter: bool,
    }

    impl RegistrationSource for ValueSource {
        fn registrations_for(
            &self,
            service: &Service,
            _accessor: &dyn Fn(&Service) -> Vec<Arc<Registration>>,
        ) -> Vec<Arc<Registration>> {
            if *service == Service::of::<u64>() {
                vec![Registration::for_type::<u64>()
                    .activate_with(|_| Ok(42))
                    .build()]
            } else {
                Vec::new()
            }
        }

        fn is_adapter_for_individual_components(&self) -> bool {
            self.adapter
        }
    }

    let configure = |r: &mut ComponentRegistry| {
        r.register_source(Arc::new(ValueSource { adapter: false }));
    };
    let root = LifetimeScope::root(configure);

    // The source answers in a regular child...
    let child = root.begin_child().unwrap();
    assert_eq!(*child.resolve_typed::<u64>().unwrap(), 42);

    // ...but not in an isolated one, because it is not flagged as an
    // adapter for individual components.
    let isolated = root.begin_isolated_child_with(None, |_| {}).unwrap();
    assert!(isolated.resolve_typed::<u64>().is_err());

    // Adapter-flagged sources survive isolation.
    let root2 = LifetimeScope::root(|r| {
        r.register_source(Arc::new(ValueSource { adapter: true }));
    });
    let isolated2 = root2.begin_isolated_child_with(None, |_| {}).unwrap();
    assert_eq!(*isolated2.resolve_typed::<u64>().unwrap(), 42);
}
