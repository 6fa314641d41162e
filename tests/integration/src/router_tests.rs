//! Router Tests - Routed Proxy Resolution
//!
//! These tests send through proxies that carry a router:
//! - Client endpoints come from the router, not the locator
//! - Each routed identity is registered with the router once
//! - Router resolvers are shared per router identity

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use common::*;
use orb::{CommunicatorConfig, Identity, OrbError, Proxy};

fn routed_config() -> orb::CommunicatorConfig {
    test_config().with_default_router(parse_proxy(ROUTER_PROXY))
}

/// Test: routed proxies go to the router's client endpoints
#[tokio::test]
async fn test_routed_proxy_uses_client_endpoints() {
    let (communicator, binder, transport) = test_communicator(routed_config());
    let router = binder.router(ROUTER_PROXY);
    router.set_client(parse_proxy("Glacier/client:tcp -h gateway -p 5000"));
    let locator = binder.locator(LOCATOR_PROXY);
    locator.set_adapter("Hello", endpoints("server", 10000));
    transport.open(5000);

    let proxy = communicator.string_to_proxy("hello @ Hello").unwrap();
    communicator.send(&proxy, Bytes::new()).await.unwrap();
    communicator.send(&proxy, Bytes::new()).await.unwrap();

    assert_eq!(transport.sent_to(), vec![endpoints("gateway", 5000); 2]);
    assert_eq!(locator.adapter_calls(), 0);
    assert_eq!(router.client_calls(), 1);
    assert_eq!(router.added(), vec![Identity::named("hello")]);
}

/// Test: a router without a client proxy is reached on its own endpoints
#[tokio::test]
async fn test_router_endpoints_fallback() {
    let (communicator, binder, transport) = test_communicator(routed_config());
    let router = binder.router(ROUTER_PROXY);
    transport.open(4063);

    let proxy = communicator.string_to_proxy("hello:tcp -h server -p 10000").unwrap();
    let resolved = communicator.resolve_endpoints(&proxy).await.unwrap();
    assert_eq!(resolved.endpoints, endpoints("gateway", 4063));
    assert!(!resolved.cached);

    communicator.send(&proxy, Bytes::new()).await.unwrap();
    assert_eq!(router.client_calls(), 1);
}

/// Test: an indirect default router keeps its locator and is reached through it
#[tokio::test]
async fn test_indirect_router_from_properties() {
    let properties = HashMap::from([
        ("Orb.Default.Locator".to_string(), LOCATOR_PROXY.to_string()),
        (
            "Orb.Default.Router".to_string(),
            "Glacier/router @ RouterAdapter".to_string(),
        ),
    ]);
    let config = CommunicatorConfig::from_properties(&properties)
        .unwrap()
        .with_shuffle_endpoints(false);
    let (communicator, binder, transport) = test_communicator(config);
    let locator = binder.locator(LOCATOR_PROXY);
    locator.set_adapter("RouterAdapter", endpoints("gateway", 4063));
    transport.open(4063);

    let proxy = communicator.string_to_proxy("hello:tcp -h server -p 10000").unwrap();
    let info = communicator.router_info(&proxy).unwrap().unwrap();
    let locator_identity = parse_proxy(LOCATOR_PROXY).identity().clone();
    assert_eq!(
        info.proxy().locator().map(Proxy::identity),
        Some(&locator_identity)
    );
    let bound = binder.bound_routers();
    assert_eq!(bound.len(), 1);
    assert_eq!(bound[0].locator().map(Proxy::identity), Some(&locator_identity));

    // the router has no client proxy, so its own adapter is resolved
    let resolved = communicator.resolve_endpoints(&proxy).await.unwrap();
    assert_eq!(resolved.endpoints, endpoints("gateway", 4063));
    communicator.send(&proxy, Bytes::new()).await.unwrap();
    assert_eq!(transport.sent_to(), vec![endpoints("gateway", 4063)]);
    assert_eq!(locator.adapter_calls(), 1);
}

/// Test: a failed connection to an indirect router clears its cached endpoints
#[tokio::test]
async fn test_indirect_router_stale_endpoints_refreshed() {
    let router = parse_proxy("Glacier/router @ RouterAdapter")
        .with_locator(Some(parse_proxy(LOCATOR_PROXY)));
    let (communicator, binder, transport) = test_communicator(test_config().with_default_router(router));
    let locator = binder.locator(LOCATOR_PROXY);
    locator.set_adapter("RouterAdapter", endpoints("gateway", 4063));
    transport.open(4063);
    transport.open(4064);

    let proxy = communicator.string_to_proxy("hello @ Hello").unwrap();
    communicator.send(&proxy, Bytes::new()).await.unwrap();

    // the router moves; the cached address now refuses connections
    transport.close(4063);
    locator.set_adapter("RouterAdapter", endpoints("gateway", 4064));
    communicator.send(&proxy, Bytes::new()).await.unwrap();

    assert_eq!(
        transport.sent_to(),
        vec![
            endpoints("gateway", 4063),
            endpoints("gateway", 4063),
            endpoints("gateway", 4064),
        ]
    );
    assert_eq!(locator.adapter_calls(), 2);
}

/// Test: an indirect router whose locator does not know it has no endpoints
#[tokio::test]
async fn test_unregistered_indirect_router() {
    let router = parse_proxy("Glacier/router @ RouterAdapter")
        .with_locator(Some(parse_proxy(LOCATOR_PROXY)));
    let (communicator, _, _) = test_communicator(test_config().with_default_router(router));

    let proxy = communicator.string_to_proxy("hello @ Hello").unwrap();
    let err = communicator.resolve_endpoints(&proxy).await.unwrap_err();
    assert_eq!(err, OrbError::AdapterNotFound("RouterAdapter".to_string()));
}

/// Test: router resolvers are shared by identity and de-routed
#[tokio::test]
async fn test_router_resolver_shared() {
    let (communicator, binder, _) = test_communicator(routed_config());

    let first = communicator.string_to_proxy("a @ A").unwrap();
    let replica = parse_proxy("Glacier/router:tcp -h gateway-replica -p 4063")
        .with_router(Some(parse_proxy(ROUTER_PROXY)));
    let second = parse_proxy("b @ B").with_router(Some(replica));

    let a = communicator.router_info(&first).unwrap().unwrap();
    let b = communicator.router_info(&second).unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.proxy().router().is_none());
    assert_eq!(binder.router_binds(), 1);

    let unrouted = parse_proxy("c @ C");
    assert!(communicator.router_info(&unrouted).unwrap().is_none());
}

/// Test: the router's server proxy supplies server endpoints
#[tokio::test]
async fn test_router_server_endpoints() {
    let (communicator, binder, _) = test_communicator(routed_config());
    binder
        .router(ROUTER_PROXY)
        .set_server(Proxy::direct(Identity::named("server"), endpoints("gateway", 6000)));

    let proxy = communicator.string_to_proxy("hello").unwrap();
    let info = communicator.router_info(&proxy).unwrap().unwrap();
    assert_eq!(info.get_server_endpoints().await.unwrap(), endpoints("gateway", 6000));
}

/// Test: adapter ids of routed proxies fall back to the router's server adapter
#[tokio::test]
async fn test_router_adapter_id() {
    let (communicator, binder, _) = test_communicator(routed_config());
    binder
        .router(ROUTER_PROXY)
        .set_server(Proxy::indirect(Identity::named("server"), "Routed"));

    let well_known = communicator.string_to_proxy("hello").unwrap();
    let info = communicator.router_info(&well_known).unwrap().unwrap();
    assert_eq!(info.get_adapter_id(&well_known).await.unwrap(), "Routed");

    let indirect = communicator.string_to_proxy("hello @ Own").unwrap();
    assert_eq!(info.get_adapter_id(&indirect).await.unwrap(), "Own");
}

/// Test: destroying the communicator tears down its routers
#[tokio::test]
async fn test_destroy_tears_down_routers() {
    let (communicator, _, _) = test_communicator(routed_config());
    let proxy = communicator.string_to_proxy("hello @ Hello").unwrap();
    let info = communicator.router_info(&proxy).unwrap().unwrap();

    communicator.destroy();
    assert!(info.is_destroyed());
    assert!(info.get_client_endpoints().await.is_err());
}
