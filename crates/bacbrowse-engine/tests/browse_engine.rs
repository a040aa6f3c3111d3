mod support;

use std::net::SocketAddr;
use std::time::Duration;

use bacbrowse_core::types::{DataValue, ObjectId, ObjectType, PropertyId};
use bacbrowse_datalink::DataLinkAddress;
use bacbrowse_engine::{
    Browser, BrowseError, ClientConfig, ConfigPatch, Device, InterfaceCatalog, MemoryStore,
    PropertyValue,
};
use support::{Hub, MemoryConnector};
use tokio::time::{sleep, Instant};

type TestBrowser = Browser<MemoryConnector, MemoryStore>;

fn quick(timeout_millis: u64) -> ClientConfig {
    ClientConfig {
        timeout_millis,
        ..ClientConfig::default()
    }
}

async fn idle(hub: &Hub, config: ClientConfig) -> TestBrowser {
    let _ = env_logger::builder().is_test(true).try_init();
    Browser::new(
        MemoryConnector::new(hub),
        MemoryStore::with_config(config),
        InterfaceCatalog::from_entries([]),
    )
    .await
    .unwrap()
}

async fn started(hub: &Hub, config: ClientConfig) -> TestBrowser {
    let browser = idle(hub, config).await;
    browser.start().await.unwrap();
    browser
}

async fn wait_for_device(browser: &TestBrowser, key: &str, ready: impl Fn(&Device) -> bool) -> Device {
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        if let Some(device) = browser.device(key).await {
            if ready(&device) {
                return device;
            }
        }
        assert!(Instant::now() < deadline, "device {key} never became ready");
        sleep(Duration::from_millis(10)).await;
    }
}

/// Scans and waits until the device is registered and enriched.
async fn discover(browser: &TestBrowser, key: &str) -> Device {
    browser.trigger_scan().await.unwrap();
    wait_for_device(browser, key, |d| d.name.is_some()).await
}

fn text(s: &str) -> DataValue {
    DataValue::CharacterString(s.into())
}

fn client_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

#[tokio::test]
async fn scan_registers_and_names_devices() {
    let hub = Hub::new();
    let sim = hub.add_device("10.0.0.5:47808", 1234);
    sim.set_property(sim.device_id, PropertyId::ObjectName, text("AHU-1"))
        .await;
    sim.set_property(sim.device_id, PropertyId::Description, text("Roof unit"))
        .await;

    let browser = started(&hub, quick(500)).await;
    assert!(browser.devices().await.is_empty());

    let device = discover(&browser, "10.0.0.5:1234").await;
    assert_eq!(device.name.as_deref(), Some("AHU-1"));
    assert_eq!(device.description.as_deref(), Some("Roof unit"));
    assert_eq!(device.device_id, 1234);
    assert_eq!(device.network_address, "10.0.0.5:47808".parse().unwrap());
    assert_eq!(device.vendor_id, 999);
}

#[tokio::test]
async fn reannouncement_refreshes_the_existing_entry() {
    let hub = Hub::new();
    let sim = hub.add_device("10.0.0.5:47808", 1234);
    sim.set_property(sim.device_id, PropertyId::ObjectName, text("AHU-1"))
        .await;
    let other = hub.add_device("10.0.0.6:47808", 1234);
    other
        .set_property(other.device_id, PropertyId::ObjectName, text("AHU-2"))
        .await;

    let browser = started(&hub, quick(500)).await;
    discover(&browser, "10.0.0.5:1234").await;
    wait_for_device(&browser, "10.0.0.6:1234", |d| d.name.is_some()).await;

    sim.set_property(sim.device_id, PropertyId::ObjectName, text("AHU-1 north"))
        .await;
    sim.announce(DataLinkAddress::Ip(client_addr(47808)))
        .await
        .unwrap();
    wait_for_device(&browser, "10.0.0.5:1234", |d| {
        d.name.as_deref() == Some("AHU-1 north")
    })
    .await;

    let devices = browser.devices().await;
    assert_eq!(
        devices.iter().map(|d| d.key.as_str()).collect::<Vec<_>>(),
        ["10.0.0.5:1234", "10.0.0.6:1234"]
    );
}

#[tokio::test]
async fn list_objects_keeps_order_and_placeholders_failed_reads() {
    let hub = Hub::new();
    let sim = hub.add_device("10.0.0.7:47808", 77);
    let ai = ObjectId::new(ObjectType::AnalogInput, 0);
    let av = ObjectId::new(ObjectType::AnalogValue, 1);
    let bi = ObjectId::new(ObjectType::BinaryInput, 2);
    sim.add_object(
        ai,
        vec![
            (PropertyId::ObjectName, text("OAT")),
            (PropertyId::PresentValue, DataValue::Real(21.5)),
        ],
    )
    .await;
    sim.add_object(av, vec![(PropertyId::ObjectName, text("SP"))]).await;
    sim.add_object(
        bi,
        vec![
            (PropertyId::ObjectName, text("Fan")),
            (PropertyId::Description, text(&"x".repeat(3000))),
            (PropertyId::PresentValue, DataValue::Enumerated(1)),
        ],
    )
    .await;
    sim.set_property_values(
        sim.device_id,
        PropertyId::ObjectList,
        vec![DataValue::ObjectId(ai), DataValue::ObjectId(av), DataValue::ObjectId(bi)],
    )
    .await;
    sim.mute_object(av).await;

    let browser = started(&hub, quick(200)).await;
    discover(&browser, "10.0.0.7:77").await;
    let objects = browser.list_objects("10.0.0.7:77").await.unwrap();

    assert_eq!(
        objects.iter().map(|o| o.key.as_str()).collect::<Vec<_>>(),
        ["0:0", "2:1", "3:2"]
    );
    assert_eq!(objects[0].name, "OAT");
    assert_eq!(objects[0].present_value, Some(DataValue::Real(21.5)));
    assert_eq!(objects[1].name, "");
    assert_eq!(objects[1].description, "");
    assert_eq!(objects[1].present_value, None);
    assert_eq!(objects[2].name, "Fan");
    assert_eq!(objects[2].description.len(), 3000);
}

#[tokio::test]
async fn object_properties_are_named_and_shaped() {
    let hub = Hub::new();
    let sim = hub.add_device("10.0.0.8:47808", 8);
    let ai = ObjectId::new(ObjectType::AnalogInput, 4);
    sim.add_object(
        ai,
        vec![
            (PropertyId::ObjectName, text("RAT")),
            (PropertyId::PresentValue, DataValue::Real(19.0)),
            (PropertyId::from_number(9001), DataValue::Unsigned(5)),
        ],
    )
    .await;

    let browser = started(&hub, quick(500)).await;
    discover(&browser, "10.0.0.8:8").await;
    let properties = browser.object_properties("10.0.0.8:8", "0:4").await.unwrap();

    let by_id = |id: u32| properties.iter().find(|p| p.id == id).unwrap();
    assert_eq!(by_id(85).name, "present-value");
    assert_eq!(by_id(85).value, PropertyValue::Single(DataValue::Real(19.0)));
    assert_eq!(by_id(77).value, PropertyValue::Single(text("RAT")));
    assert_eq!(by_id(9001).name, "Vendor Specific Property 9001");
    assert_eq!(
        by_id(75).value,
        PropertyValue::Single(DataValue::ObjectId(ai))
    );
}

#[tokio::test]
async fn failed_reads_keep_known_names_and_fail_the_browse() {
    let hub = Hub::new();
    let sim = hub.add_device("10.0.0.5:47808", 42);
    sim.set_property(sim.device_id, PropertyId::ObjectName, text("AHU"))
        .await;
    sim.set_property(sim.device_id, PropertyId::Description, text("Plant room"))
        .await;
    let browser = started(&hub, quick(200)).await;
    discover(&browser, "10.0.0.5:42").await;

    sim.mute_object(sim.device_id).await;
    sim.announce(DataLinkAddress::Ip(client_addr(47808)))
        .await
        .unwrap();
    // Long enough for the re-triggered enrichment read to time out.
    sleep(Duration::from_millis(500)).await;

    let device = browser.device("10.0.0.5:42").await.unwrap();
    assert_eq!(device.name.as_deref(), Some("AHU"));
    assert_eq!(device.description.as_deref(), Some("Plant room"));
    assert!(matches!(
        browser.list_objects("10.0.0.5:42").await,
        Err(BrowseError::Timeout)
    ));
}

#[tokio::test]
async fn config_stays_readable_while_the_client_restarts() {
    let hub = Hub::new();
    let browser = Browser::new(
        MemoryConnector::new(&hub).with_connect_delay(Duration::from_millis(200)),
        MemoryStore::with_config(quick(500)),
        InterfaceCatalog::from_entries([]),
    )
    .await
    .unwrap();
    browser.start().await.unwrap();

    let (applied, seen) = tokio::join!(browser.set_config(ConfigPatch::port(47809)), async {
        sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_millis(50), browser.config()).await
    });

    assert_eq!(applied.unwrap().port, 47809);
    assert_eq!(seen.expect("config() waited for the restart").port, 47809);
    assert_eq!(hub.client_addresses(), [client_addr(47809)]);
}

#[tokio::test]
async fn unknown_devices_and_bad_keys_send_nothing() {
    let hub = Hub::new();
    hub.add_device("10.0.0.5:47808", 1);
    let browser = started(&hub, quick(500)).await;
    discover(&browser, "10.0.0.5:1").await;

    let before = hub.frames_sent();
    assert!(matches!(
        browser.list_objects("10.9.9.9:1").await,
        Err(BrowseError::DeviceNotFound(key)) if key == "10.9.9.9:1"
    ));
    assert!(matches!(
        browser.object_properties("10.9.9.9:1", "not-a-key").await,
        Err(BrowseError::DeviceNotFound(_))
    ));
    assert!(matches!(
        browser.object_properties("10.0.0.5:1", "analog:1").await,
        Err(BrowseError::InvalidObjectKey(key)) if key == "analog:1"
    ));
    assert_eq!(hub.frames_sent(), before);
}

#[tokio::test]
async fn reads_against_one_device_never_overlap() {
    let hub = Hub::new();
    let sim = hub.add_slow_device("10.0.0.9:47808", 9, Duration::from_millis(15));
    for i in 0..3 {
        sim.add_object(
            ObjectId::new(ObjectType::AnalogValue, i),
            vec![(PropertyId::PresentValue, DataValue::Real(i as f32))],
        )
        .await;
    }

    let browser = started(&hub, quick(1000)).await;
    discover(&browser, "10.0.0.9:9").await;
    let (objects, first, second) = tokio::join!(
        browser.list_objects("10.0.0.9:9"),
        browser.object_properties("10.0.0.9:9", "2:0"),
        browser.object_properties("10.0.0.9:9", "2:2"),
    );

    assert_eq!(objects.unwrap().len(), 4);
    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(hub.max_outstanding("10.0.0.9:47808"), 1);
}

#[tokio::test]
async fn port_change_persists_and_rebinds_a_single_client() {
    let hub = Hub::new();
    hub.add_device("10.0.0.5:47808", 1);
    hub.add_device("10.0.0.6:47809", 2);
    let browser = started(&hub, quick(500)).await;
    discover(&browser, "10.0.0.5:1").await;
    assert_eq!(hub.client_addresses(), [client_addr(47808)]);

    let applied = browser.set_config(ConfigPatch::port(47809)).await.unwrap();
    assert_eq!(applied.port, 47809);
    assert_eq!(applied.timeout_millis, 500);
    assert_eq!(browser.config().await, applied);
    assert_eq!(browser.store().stored(), Some(applied));
    assert_eq!(browser.generation(), 2);
    assert_eq!(hub.client_addresses(), [client_addr(47809)]);
    assert_eq!(hub.max_clients_bound(), 1);

    // Devices found by the previous client stay registered.
    assert_eq!(browser.devices().await.len(), 1);
    discover(&browser, "10.0.0.6:2").await;
    assert_eq!(browser.devices().await.len(), 2);
}

#[tokio::test]
async fn repeated_reconfiguration_never_binds_two_clients() {
    let hub = Hub::new();
    let browser = started(&hub, quick(500)).await;
    for port in [47809, 47810, 47808, 47811] {
        browser.set_config(ConfigPatch::port(port)).await.unwrap();
        assert_eq!(hub.client_addresses(), [client_addr(port)]);
    }
    assert_eq!(browser.generation(), 5);
    assert_eq!(hub.max_clients_bound(), 1);
}

#[tokio::test]
async fn rejected_save_changes_nothing() {
    let hub = Hub::new();
    let browser = started(&hub, quick(500)).await;
    browser.store().set_reject_writes(true);
    let before = browser.config().await;

    let result = browser
        .set_config(ConfigPatch {
            port: Some(47809),
            timeout_millis: Some(100),
            ..ConfigPatch::default()
        })
        .await;

    assert!(matches!(result, Err(BrowseError::Persistence(_))));
    assert_eq!(browser.config().await, before);
    assert_eq!(browser.generation(), 1);
    assert_eq!(hub.client_addresses(), [client_addr(47808)]);
}

#[tokio::test]
async fn enrichment_from_a_stopped_client_is_dropped() {
    let hub = Hub::new();
    let sim = hub.add_slow_device("10.0.0.5:47808", 5, Duration::from_millis(200));
    sim.set_property(sim.device_id, PropertyId::ObjectName, text("late"))
        .await;
    let browser = started(&hub, quick(1000)).await;

    browser.trigger_scan().await.unwrap();
    wait_for_device(&browser, "10.0.0.5:5", |_| true).await;
    browser.set_config(ConfigPatch::port(47809)).await.unwrap();

    sleep(Duration::from_millis(500)).await;
    assert_eq!(browser.device("10.0.0.5:5").await.unwrap().name, None);
}

#[tokio::test]
async fn operations_require_a_running_client() {
    let hub = Hub::new();
    hub.add_device("10.0.0.5:47808", 1);
    let browser = idle(&hub, quick(500)).await;
    assert!(!browser.is_running().await);
    assert!(matches!(
        browser.trigger_scan().await,
        Err(BrowseError::NotRunning)
    ));

    browser.start().await.unwrap();
    browser.start().await.unwrap();
    assert_eq!(browser.generation(), 1);
    discover(&browser, "10.0.0.5:1").await;

    browser.stop().await;
    assert!(!browser.is_running().await);
    assert_eq!(hub.clients_bound(), 0);
    assert!(matches!(
        browser.list_objects("10.0.0.5:1").await,
        Err(BrowseError::NotRunning)
    ));
    assert_eq!(browser.devices().await.len(), 1);

    browser.start().await.unwrap();
    assert_eq!(browser.generation(), 2);
    assert!(browser.list_objects("10.0.0.5:1").await.is_ok());

    browser.dispose().await;
    assert_eq!(hub.clients_bound(), 0);
    assert!(matches!(browser.start().await, Err(BrowseError::NotRunning)));
    assert!(matches!(
        browser.set_config(ConfigPatch::port(47809)).await,
        Err(BrowseError::NotRunning)
    ));
    assert_eq!(browser.devices().await.len(), 1);

    browser.clear_devices().await;
    assert!(browser.devices().await.is_empty());
}
