use canopy_di::{DecoratorContext, LifetimeScope, Registration, Service};
use std::sync::{Arc, Mutex};

struct Message {
    text: String,
}

#[test]
fn test_decorators_apply_in_registration_order() {
    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Message>()
                .activate_with(|_| Ok(Message { text: "hello".into() }))
                .build(),
        );
        r.register_decorator(
            Service::of::<Message>(),
            Registration::for_type::<Message>()
                .activate_with(|ctx| {
                    let target = ctx.decorated::<Message>().expect("decorator target");
                    Ok(Message { text: format!("first({})", target.text) })
                })
                .build(),
        );
        r.register_decorator(
            Service::of::<Message>(),
            Registration::for_type::<Message>()
                .activate_with(|ctx| {
                    let target = ctx.decorated::<Message>().expect("decorator target");
                    Ok(Message { text: format!("second({})", target.text) })
                })
                .build(),
        );
    });

    let message = root.resolve_typed::<Message>().unwrap();
    assert_eq!(message.text, "second(first(hello))");
}

#[test]
fn test_decorator_context_records_the_chain_in_order() {
    let contexts: Arc<Mutex<Vec<DecoratorContext>>> = Arc::new(Mutex::new(Vec::new()));

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Message>()
                .activate_with(|_| Ok(Message { text: "base".into() }))
                .build(),
        );
        r.register_decorator(
            Service::of::<Message>(),
            Registration::for_type::<Message>()
                .activate_with(|ctx| {
                    let target = ctx.decorated::<Message>().expect("decorator target");
                    Ok(Message { text: format!("wrap1({})", target.text) })
                })
                .build(),
        );
        r.register_decorator(
            Service::of::<Message>(),
            Registration::for_type::<Message>()
                .activate_with(|ctx| {
                    let target = ctx.decorated::<Message>().expect("decorator target");
                    Ok(Message { text: format!("wrap2({})", target.text) })
                })
                .build(),
        );
    });

    let sink = contexts.clone();
    root.on_resolve_operation_beginning(move |operation| {
        let sink = sink.clone();
        operation.on_request_beginning(move |ctx| {
            let sink = sink.clone();
            ctx.on_completing(move |ctx| {
                if let Some(chain) = ctx.decorator_context() {
                    sink.lock().unwrap().push(chain);
                }
            });
        });
    });

    let message = root.resolve_typed::<Message>().unwrap();
    assert_eq!(message.text, "wrap2(wrap1(base))");

    let recorded = contexts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    let chain = &recorded[0];

    let texts: Vec<String> = chain
        .applied_decorators()
        .iter()
        .map(|(_, instance)| {
            instance
                .clone()
                .downcast::<Message>()
                .ok()
                .map(|m| m.text.clone())
                .expect("decorator chain holds messages")
        })
        .collect();
    assert_eq!(texts, vec!["base", "wrap1(base)", "wrap2(wrap1(base))"]);

    let outermost = chain.current_instance().downcast::<Message>().ok().unwrap();
    assert_eq!(outermost.text, "wrap2(wrap1(base))");
}

#[test]
fn test_shared_component_with_shared_decorators_keeps_identity() {
    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Message>()
                .activate_with(|_| Ok(Message { text: "base".into() }))
                .instance_per_lifetime_scope()
                .build(),
        );
        r.register_decorator(
            Service::of::<Message>(),
            Registration::for_type::<Message>()
                .activate_with(|ctx| {
                    let target = ctx.decorated::<Message>().expect("decorator target");
                    Ok(Message { text: format!("wrapped({})", target.text) })
                })
                .instance_per_lifetime_scope()
                .build(),
        );
    });

    let a = root.resolve_typed::<Message>().unwrap();
    let b = root.resolve_typed::<Message>().unwrap();
    assert_eq!(a.text, "wrapped(base)");
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_decorators_only_wrap_their_own_service() {
    struct Other;

    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Message>()
                .activate_with(|_| Ok(Message { text: "plain".into() }))
                .build(),
        );
        r.register(
            Registration::for_type::<Other>()
                .activate_with(|_| Ok(Other))
                .build(),
        );
        r.register_decorator(
            Service::of::<Other>(),
            Registration::for_type::<Other>()
                .activate_with(|ctx| {
                    ctx.decorated::<Other>().expect("decorator target");
                    Ok(Other)
                })
                .build(),
        );
    });

    let message = root.resolve_typed::<Message>().unwrap();
    assert_eq!(message.text, "plain");
    assert!(root.resolve_typed::<Other>().is_ok());
}

#[test]
fn test_decorators_registered_in_a_child_apply_below_it() {
    let root = LifetimeScope::root(|r| {
        r.register(
            Registration::for_type::<Message>()
                .activate_with(|_| Ok(Message { text: "base".into() }))
                .build(),
        );
    });

    let child = root
        .begin_child_with(None, |r| {
            r.register_decorator(
                Service::of::<Message>(),
                Registration::for_type::<Message>()
                    .activate_with(|ctx| {
                        let target = ctx.decorated::<Message>().expect("decorator target");
                        Ok(Message { text: format!("child({})", target.text) })
                    })
                    .build(),
            );
        })
        .unwrap();

    assert_eq!(root.resolve_typed::<Message>().unwrap().text, "base");
    assert_eq!(child.resolve_typed::<Message>().unwrap().text, "child(base)");
}
