use keystone::{Container, Key, KeystoneError, LookupKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Ticket(usize);

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

#[test]
fn test_non_singleton_calls_factory_every_time() {
    let container = Container::new();
    let calls = counter();
    let factory_calls = Arc::clone(&calls);
    container
        .bind("App/Ticket", move |_, _| {
            Ok(Ticket(factory_calls.fetch_add(1, Ordering::SeqCst)))
        })
        .unwrap();

    let first = container.resolve::<Ticket>("App/Ticket").unwrap();
    let second = container.resolve::<Ticket>("App/Ticket").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_ne!(first.0, second.0);
}

#[test]
fn test_singleton_returns_cached_value() {
    let container = Container::new();
    let calls = counter();
    let factory_calls = Arc::clone(&calls);
    container
        .singleton("App/Ticket", move |_, _| {
            Ok(Ticket(factory_calls.fetch_add(1, Ordering::SeqCst)))
        })
        .unwrap();

    let first = container.resolve::<Ticket>("App/Ticket").unwrap();
    let second = container.resolve::<Ticket>("App/Ticket").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_singleton_factory_leaves_binding_intact() {
    let container = Container::new();
    let calls = counter();
    let factory_calls = Arc::clone(&calls);
    container
        .singleton("App/Ticket", move |_, _| {
            match factory_calls.fetch_add(1, Ordering::SeqCst) {
                0 => Err(KeystoneError::InvalidBinding {
                    message: "ticket backend offline".into(),
                }),
                n => Ok(Ticket(n)),
            }
        })
        .unwrap();

    let err = container.resolve::<Ticket>("App/Ticket").unwrap_err();
    assert!(matches!(err, KeystoneError::InvalidBinding { .. }));

    let node = container.lookup("App/Ticket", None).unwrap().unwrap();
    assert_eq!(node.kind, LookupKind::Binding);

    let second = container.resolve::<Ticket>("App/Ticket").unwrap();
    let third = container.resolve::<Ticket>("App/Ticket").unwrap();
    assert_eq!(second.0, 1);
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_alias_example() {
    let container = Container::new();
    container.bind("App/Foo", |_, _| Ok("foo")).unwrap();
    container.alias("App/Foo", "foo").unwrap();

    assert_eq!(*container.resolve::<&str>("foo").unwrap(), "foo");
}

#[test]
fn test_alias_chain_resolves_to_target() {
    let container = Container::new();
    container
        .singleton(Key::of::<Ticket>(), |_, _| Ok(Ticket(7)))
        .unwrap();
    container.alias(Key::of::<Ticket>(), "x").unwrap();
    container.alias("x", "y").unwrap();

    let direct = container.resolve_type::<Ticket>().unwrap();
    let aliased = container.resolve::<Ticket>("y").unwrap();
    assert!(Arc::ptr_eq(&direct, &aliased));
    assert_eq!(container.alias_target("y").unwrap(), Some(Key::of::<Ticket>()));
}

#[test]
fn test_self_alias_is_reported() {
    let container = Container::new();
    container.alias("x", "x").unwrap();

    let err = container.alias_target("x").unwrap_err();
    assert!(matches!(err, KeystoneError::AliasCycle { ref alias } if alias == "x"));
    assert_eq!(err.to_string(), "'x' is aliased to itself");

    let err = container.resolve_any("x").unwrap_err();
    assert!(matches!(err, KeystoneError::AliasCycle { .. }));
}

#[test]
fn test_unknown_identifier_names_it() {
    let container = Container::new();
    let err = container.resolve_any("App/Missing").unwrap_err();
    assert_eq!(err.to_string(), "Binding not found: App/Missing");
}

#[test]
fn test_explicit_binding_beats_autoload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("Services")).unwrap();
    std::fs::write(
        dir.path().join("Services").join("Mailer.json"),
        r#"{"default": {"driver": "smtp"}}"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("Services").join("Queue.json"),
        r#"{"driver": "redis"}"#,
    )
    .unwrap();

    let container = Container::new();
    container.autoload(dir.path(), "App").unwrap();
    container
        .bind("App/Services/Mailer", |_, _| Ok(String::from("bound")))
        .unwrap();

    assert!(container.is_autoload_namespace("App/Services/Mailer"));
    let node = container.lookup("App/Services/Mailer", None).unwrap().unwrap();
    assert_eq!(node.kind, LookupKind::Binding);
    assert_eq!(
        container.resolve::<String>("App/Services/Mailer").unwrap().as_str(),
        "bound"
    );

    let node = container.lookup("Services/Queue", Some("App")).unwrap().unwrap();
    assert_eq!(node.kind, LookupKind::Autoload);
    let queue = container.resolve::<serde_json::Value>("App/Services/Queue").unwrap();
    assert_eq!(queue["driver"], "redis");
}

#[test]
fn test_missing_autoload_file_propagates_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::new();
    container.autoload(dir.path(), "App").unwrap();

    let err = container.resolve_any("App/Nope").unwrap_err();
    assert!(matches!(err, KeystoneError::Autoload { ref namespace, .. } if namespace == "App/Nope"));
}

#[test]
fn test_autoload_cannot_leave_its_directory() {
    let root = tempfile::tempdir().unwrap();
    let models = root.path().join("models");
    std::fs::create_dir(&models).unwrap();
    std::fs::write(root.path().join("secret.json"), r#"{"token": "hunter2"}"#).unwrap();

    let container = Container::new();
    container.autoload(&models, "App").unwrap();

    let err = container.resolve_any("App/../secret").unwrap_err();
    assert!(matches!(err, KeystoneError::BindingNotFound { ref id } if id == "App/../secret"));
    let err = container.resolve_any("App//etc/passwd").unwrap_err();
    assert!(matches!(err, KeystoneError::BindingNotFound { .. }));
}

#[test]
fn test_fake_swaps_live_proxy_and_restores() {
    let container = Container::new();
    container
        .singleton("App/Ticket", |_, _| Ok(Ticket(1)))
        .unwrap();
    container.use_proxies(true);

    let proxy = container.proxy::<Ticket>("App/Ticket").unwrap();
    assert_eq!(proxy.get().unwrap().0, 1);

    let fake_calls = counter();
    let calls = Arc::clone(&fake_calls);
    container.fake("App/Ticket", move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(Ticket(99))
    });

    assert!(proxy.is_faked());
    assert_eq!(proxy.get().unwrap().0, 99);
    assert_eq!(proxy.get().unwrap().0, 99);
    assert_eq!(fake_calls.load(Ordering::SeqCst), 1);

    container.restore("App/Ticket");
    assert!(!container.has_fake("App/Ticket"));
    assert_eq!(proxy.get().unwrap().0, 1);
}

#[test]
fn test_fake_through_alias_and_use_fake() {
    let container = Container::new();
    container.bind("App/Ticket", |_, _| Ok(Ticket(1))).unwrap();
    container.alias("App/Ticket", "ticket").unwrap();

    let err = container.fake_value("ticket").unwrap_err();
    assert!(matches!(err, KeystoneError::FakeNotFound { .. }));

    container.fake("ticket", |_| Ok(Ticket(5)));
    assert!(container.has_fake("App/Ticket"));

    let fallback = keystone::value(Ticket(0));
    let value = container.use_fake("App/Ticket", fallback).unwrap();
    assert_eq!(value.downcast_ref::<Ticket>().unwrap().0, 5);
}

#[test]
fn test_fake_registered_before_alias_reaches_proxy() {
    let container = Container::new();
    container.bind("App/Ticket", |_, _| Ok(Ticket(1))).unwrap();
    container.use_proxies(true);

    container.fake("ticket", |_| Ok(Ticket(7)));
    container.alias("App/Ticket", "ticket").unwrap();

    assert!(container.has_fake("App/Ticket"));
    let proxy = container.proxy::<Ticket>("ticket").unwrap();
    assert_eq!(proxy.key(), &Key::from("App/Ticket"));
    assert_eq!(proxy.get().unwrap().0, 7);

    container.restore("ticket");
    assert_eq!(proxy.get().unwrap().0, 1);
}

#[test]
fn test_rebinding_replaces_cached_singleton() {
    let container = Container::new();
    container.singleton("App/Ticket", |_, _| Ok(Ticket(1))).unwrap();
    assert_eq!(container.resolve::<Ticket>("App/Ticket").unwrap().0, 1);

    container.singleton("App/Ticket", |_, _| Ok(Ticket(2))).unwrap();
    assert_eq!(container.resolve::<Ticket>("App/Ticket").unwrap().0, 2);
}

#[test]
fn test_string_export_resolves_named_binding() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Mail.json"), r#"{"default": "App/Mailer"}"#).unwrap();

    let container = Container::new();
    container
        .singleton("App/Mailer", |_, _| Ok(String::from("smtp")))
        .unwrap();
    container.autoload(dir.path(), "Providers").unwrap();

    let mailer = container.resolve::<String>("Providers/Mail").unwrap();
    let direct = container.resolve::<String>("App/Mailer").unwrap();
    assert!(Arc::ptr_eq(&mailer, &direct));
}

#[test]
fn test_custom_loader_receives_located_path() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("greeting.txt"), "hello").unwrap();

    let container = Container::new();
    container
        .autoload_with(dir.path(), "Text", |_, path| {
            Ok(keystone::value(std::fs::read_to_string(path)?))
        })
        .unwrap();

    let greeting = container.resolve::<String>("Text/greeting.txt").unwrap();
    assert_eq!(greeting.as_str(), "hello");
}
