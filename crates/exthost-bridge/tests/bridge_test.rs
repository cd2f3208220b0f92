//! End-to-end tests for the extensionData domain.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use exthost_bridge::{
    BridgeError, ExtensionDataDomain, ExtensionModule, InProcessRouter, StaticModuleLoader,
    DOMAIN_NAME,
};
use exthost_core::{RegistryError, ServiceRegistry};

fn bridge() -> (
    Arc<InProcessRouter>,
    Arc<StaticModuleLoader>,
    Arc<ExtensionDataDomain>,
) {
    let router = Arc::new(InProcessRouter::new());
    let loader = Arc::new(StaticModuleLoader::new());
    let domain = Arc::new(ExtensionDataDomain::new(router.clone(), loader.clone()));
    domain.register();
    (router, loader, domain)
}

#[tokio::test]
async fn initialize_then_call_function_emits_event() {
    let (router, _loader, _domain) = bridge();
    let mut rx = router.subscribe();

    let data = json!({
        "myExt": {
            "ui": { "log": { "__function": "ui.log" } }
        }
    })
    .to_string();

    router
        .dispatch(DOMAIN_NAME, "initialize", vec![json!(0), json!(data)])
        .await
        .unwrap();

    // Calling the wired stub forwards across the boundary.
    let result = router
        .dispatch(
            DOMAIN_NAME,
            "callFunction",
            vec![json!("myExt"), json!("ui.log"), json!(["hello", 7])],
        )
        .await
        .unwrap();
    assert_eq!(result, Value::Null);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.domain, DOMAIN_NAME);
    assert_eq!(event.event, "callFunction");
    assert_eq!(
        event.payload,
        vec![json!("myExt"), json!("ui.log"), json!(["hello", 7])]
    );
}

#[tokio::test]
async fn malformed_initialize_leaves_prior_state() {
    let (router, _loader, domain) = bridge();

    let good = json!({ "myExt": { "f": { "__function": "f" } } }).to_string();
    router
        .dispatch(DOMAIN_NAME, "initialize", vec![json!(3), json!(good)])
        .await
        .unwrap();

    let err = router
        .dispatch(DOMAIN_NAME, "initialize", vec![json!(3), json!("{not json")])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Registry(RegistryError::MalformedPayload(_))
    ));

    // Prior descriptor for registry 3 is still there.
    let stored = domain.registries().descriptor(3).unwrap();
    assert_eq!(stored, json!({ "myExt": { "f": { "__function": "f" } } }));
}

#[tokio::test]
async fn run_local_node_uses_registered_function() {
    let (router, _loader, domain) = bridge();
    let mut rx = router.subscribe();

    domain.locals().register(
        "myExt",
        "math.add",
        Arc::new(|_ctx, args: &[Value]| {
            let sum: i64 = args.iter().filter_map(Value::as_i64).sum();
            Ok(json!(sum))
        }),
    );

    let data = json!({
        "myExt": {
            "math": {
                "add": {
                    "__function": "math.add",
                    "options": { "runLocal": true },
                    "args": ["a", "b"],
                    "body": "return a + b;"
                }
            }
        }
    })
    .to_string();

    router
        .dispatch(DOMAIN_NAME, "initialize", vec![json!(0), json!(data)])
        .await
        .unwrap();

    let result = router
        .dispatch(
            DOMAIN_NAME,
            "callFunction",
            vec![json!("myExt"), json!("math.add"), json!([2, 3])],
        )
        .await
        .unwrap();
    assert_eq!(result, json!(5));

    // Local execution never crosses the boundary.
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn run_local_node_without_registration_fails_initialize() {
    let (router, _loader, _domain) = bridge();

    let data = json!({
        "myExt": {
            "f": { "__function": "f", "options": { "runLocal": true } }
        }
    })
    .to_string();

    let err = router
        .dispatch(DOMAIN_NAME, "initialize", vec![json!(0), json!(data)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BridgeError::Registry(RegistryError::MissingLocalFunction { .. })
    ));
}

#[tokio::test]
async fn load_extension_without_companion_is_success() {
    let (router, loader, _domain) = bridge();
    let dir = tempfile::tempdir().unwrap();

    let result = router
        .dispatch(
            DOMAIN_NAME,
            "loadExtension",
            vec![json!("bar"), json!(dir.path().to_str().unwrap())],
        )
        .await
        .unwrap();

    assert_eq!(result, Value::Bool(true));
    // Nothing was asked of the loader.
    assert!(!loader.contains("bar"));
}

/// Module whose init registers a service function.
struct GreeterModule;

#[async_trait]
impl ExtensionModule for GreeterModule {
    async fn init(&self, services: Arc<ServiceRegistry>) -> Result<(), BridgeError> {
        services
            .register("greet", Arc::new(|_ctx, _args| Ok(json!("hello"))))
            .map_err(BridgeError::from)
    }
}

#[tokio::test]
async fn load_extension_runs_module_init() {
    let (router, loader, domain) = bridge();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("host-main.so"), b"").unwrap();

    loader.register("bar", Arc::new(GreeterModule));

    let result = router
        .dispatch(
            DOMAIN_NAME,
            "loadExtension",
            vec![json!("bar"), json!(dir.path().to_str().unwrap())],
        )
        .await
        .unwrap();
    assert_eq!(result, Value::Bool(true));

    let greeting = domain.call_function("bar", "greet", &[]).unwrap();
    assert_eq!(greeting, json!("hello"));
}

/// Module whose init stays pending until released.
struct GatedModule {
    gate: Mutex<Option<tokio::sync::oneshot::Receiver<()>>>,
}

#[async_trait]
impl ExtensionModule for GatedModule {
    async fn init(&self, _services: Arc<ServiceRegistry>) -> Result<(), BridgeError> {
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(())
    }
}

#[tokio::test]
async fn load_extension_waits_for_pending_init() {
    let (router, loader, _domain) = bridge();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("host-main.so"), b"").unwrap();

    let (release, gate) = tokio::sync::oneshot::channel();
    loader.register(
        "bar",
        Arc::new(GatedModule {
            gate: Mutex::new(Some(gate)),
        }),
    );

    let base_dir = dir.path().to_str().unwrap().to_string();
    let router_clone = router.clone();
    let load = tokio::spawn(async move {
        router_clone
            .dispatch(
                DOMAIN_NAME,
                "loadExtension",
                vec![json!("bar"), json!(base_dir)],
            )
            .await
    });

    // Still waiting on init.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!load.is_finished());

    release.send(()).unwrap();
    let result = load.await.unwrap().unwrap();
    assert_eq!(result, Value::Bool(true));
}

#[tokio::test]
async fn load_extension_init_timeout() {
    let router = Arc::new(InProcessRouter::new());
    let loader = Arc::new(StaticModuleLoader::new());
    let domain = Arc::new(
        ExtensionDataDomain::new(router.clone(), loader.clone())
            .with_init_timeout(Duration::from_millis(50)),
    );
    domain.register();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("host-main.so"), b"").unwrap();

    // Gate is never released.
    let (_release, gate) = tokio::sync::oneshot::channel::<()>();
    loader.register(
        "bar",
        Arc::new(GatedModule {
            gate: Mutex::new(Some(gate)),
        }),
    );

    let err = domain.load_extension("bar", dir.path()).await.unwrap_err();
    assert!(matches!(err, BridgeError::ModuleInitTimeout(_)));
}

#[tokio::test]
async fn companion_without_registered_module_is_an_error() {
    let (router, _loader, _domain) = bridge();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("host-main.wasm"), b"").unwrap();

    let err = router
        .dispatch(
            DOMAIN_NAME,
            "loadExtension",
            vec![json!("ghost"), json!(dir.path().to_str().unwrap())],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ModuleNotRegistered(_)));
}

#[tokio::test]
async fn outbound_stub_with_callback_round_trip() {
    let (router, _loader, domain) = bridge();
    let mut rx = router.subscribe();

    let received = Arc::new(Mutex::new(None));
    let slot = received.clone();

    let stub = domain.remote_stub("myExt", "ui.ask");
    let handle = stub
        .call_with_callback(
            vec![json!("proceed?")],
            Arc::new(move |args: &[Value]| {
                *slot.lock() = Some(args.to_vec());
            }),
        )
        .unwrap();

    let event = rx.recv().await.unwrap();
    let args = event.payload[2].as_array().unwrap().clone();
    assert_eq!(args[0], json!("proceed?"));

    // Simulate the remote side answering by handle.
    let services = domain.services("myExt");
    let callback = services.take_callback(&handle).unwrap();
    callback(&[json!(true)]);

    assert_eq!(*received.lock(), Some(vec![json!(true)]));
}
