//! Device resolver tests

use std::sync::Arc;

use super::*;
use crate::profile::{CapabilityProfile, Capabilities, Platform, ProfileStore};
use crate::Error;

fn pixel(id: &str, version: &str, status: DeviceStatus) -> InventoryDevice {
    InventoryDevice::new(id, Platform::Android, version, status)
}

fn iphone(id: &str, version: &str, status: DeviceStatus) -> InventoryDevice {
    InventoryDevice::new(id, Platform::IOS, version, status)
}

fn resolver_with(devices: Vec<InventoryDevice>) -> (DeviceResolver, Arc<StaticInventory>) {
    let inventory = Arc::new(StaticInventory::new(devices));
    let resolver =
        DeviceResolver::new(Arc::new(ProfileStore::builtin()), inventory.clone()).verify_app(false);
    (resolver, inventory)
}

#[test]
fn test_version_matching() {
    assert!(version_matches("13", "13"));
    assert!(version_matches("13", "13.0"));
    assert!(version_matches("13", "13.0.1"));
    assert!(version_matches("13.0", "13"));
    assert!(version_matches("17.5", "17.5.1"));
    assert!(!version_matches("13.0", "13.1"));
    assert!(!version_matches("13", "14"));
    assert!(!version_matches("17.5", "17"));
    assert!(version_matches("Baklava", "baklava"));
    assert!(!version_matches("13", ""));
}

#[test]
fn test_parse_request() {
    assert_eq!(
        "--device=pixel_6_api_33".parse::<DeviceRequest>().unwrap(),
        DeviceRequest::Profile("pixel_6_api_33".into())
    );
    assert_eq!(
        "--device=auto_detect".parse::<DeviceRequest>().unwrap(),
        DeviceRequest::auto_detect()
    );
    assert_eq!(
        "default".parse::<DeviceRequest>().unwrap(),
        DeviceRequest::auto_detect()
    );
    assert_eq!(
        " iphone_15_pro_ios_17.5 ".parse::<DeviceRequest>().unwrap(),
        DeviceRequest::Profile("iphone_15_pro_ios_17.5".into())
    );
    assert!("--platform=ios".parse::<DeviceRequest>().is_err());
}

#[tokio::test]
async fn test_resolve_example_profile() {
    let (resolver, _) = resolver_with(vec![pixel("emulator-5554", "13.0", DeviceStatus::Ready)]);

    let device = resolver.resolve_str("--device=pixel_6_api_33").await.unwrap();
    assert_eq!(device.device_id, "emulator-5554");
    assert_eq!(device.platform, Platform::Android);
    assert_eq!(device.version, "13.0");
    assert_eq!(device.profile_id, "pixel_6_api_33");

    let caps = &device.capabilities;
    assert_eq!(caps.get_str("udid"), Some("emulator-5554"));
    assert_eq!(caps.get_str("platformVersion"), Some("13.0"));
    assert_eq!(caps.get_str("deviceName"), Some("Pixel_6_API_33"));
    assert_eq!(caps.get_str("appPackage"), Some("com.swaglabsmobileapp"));
}

#[tokio::test]
async fn test_resolve_unknown_profile() {
    let (resolver, inventory) = resolver_with(vec![pixel("emulator-5554", "13", DeviceStatus::Ready)]);
    let result = resolver.resolve_str("galaxy_s99").await;
    assert!(matches!(result, Err(Error::ProfileNotFound(_))));
    // profile lookup fails before the inventory is consulted
    assert_eq!(inventory.query_count(), 0);
}

#[tokio::test]
async fn test_resolve_no_matching_device() {
    let (resolver, _) = resolver_with(vec![
        pixel("emulator-5554", "14", DeviceStatus::Ready),
        iphone("AAAA", "13.0", DeviceStatus::Ready),
    ]);
    let result = resolver.resolve_str("pixel_6_api_33").await;
    assert!(matches!(result, Err(Error::NoMatchingDevice { .. })));
}

#[tokio::test]
async fn test_resolve_skips_offline_and_unauthorized() {
    let (resolver, _) = resolver_with(vec![
        pixel("emulator-5554", "13", DeviceStatus::Offline),
        pixel("R58M", "13", DeviceStatus::Unauthorized),
        pixel("emulator-5556", "13", DeviceStatus::Booting),
    ]);
    let device = resolver.resolve_str("pixel_6_api_33").await.unwrap();
    assert_eq!(device.device_id, "emulator-5556");
}

#[tokio::test]
async fn test_resolve_tie_break_is_first_in_order() {
    let devices = vec![
        pixel("emulator-5556", "13", DeviceStatus::Ready),
        pixel("emulator-5554", "13.0", DeviceStatus::Ready),
    ];
    let (resolver, _) = resolver_with(devices);

    for _ in 0..5 {
        let device = resolver.resolve_str("pixel_6_api_33").await.unwrap();
        assert_eq!(device.device_id, "emulator-5556");
    }
}

#[tokio::test]
async fn test_auto_detect_empty_inventory() {
    let (resolver, _) = resolver_with(vec![]);
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(1),
        resolver.resolve(&DeviceRequest::auto_detect()),
    )
    .await
    .expect("auto_detect must not hang");
    assert!(matches!(result, Err(Error::NoDeviceAvailable(_))));
}

#[tokio::test]
async fn test_auto_detect_all_not_ready() {
    let (resolver, _) = resolver_with(vec![
        pixel("emulator-5554", "13", DeviceStatus::Offline),
        pixel("emulator-5556", "13", DeviceStatus::Booting),
        iphone("AAAA", "17.5", DeviceStatus::Unknown("Creating".into())),
    ]);
    let result = resolver.resolve(&DeviceRequest::auto_detect()).await;
    assert!(matches!(result, Err(Error::NoDeviceAvailable(_))));
}

#[tokio::test]
async fn test_auto_detect_first_ready() {
    let (resolver, _) = resolver_with(vec![
        pixel("emulator-5554", "13", DeviceStatus::Booting),
        iphone("AAAA-1111", "17.5", DeviceStatus::Ready),
        pixel("emulator-5556", "14", DeviceStatus::Ready),
    ]);

    let device = resolver.resolve(&DeviceRequest::auto_detect()).await.unwrap();
    assert_eq!(device.device_id, "AAAA-1111");
    assert_eq!(device.platform, Platform::IOS);
    assert_eq!(device.profile_id, "auto_detect");
    assert_eq!(
        device.capabilities.get_str("bundleId"),
        Some("com.saucelabs.SwagLabsMobileApp")
    );
    assert_eq!(device.capabilities.get_str("platformVersion"), Some("17.5"));
}

#[tokio::test]
async fn test_auto_detect_platform_hint() {
    let (resolver, _) = resolver_with(vec![
        iphone("AAAA-1111", "17.5", DeviceStatus::Ready),
        pixel("emulator-5556", "14", DeviceStatus::Ready).with_name("sdk_gphone64"),
    ]);

    let request = DeviceRequest::auto_detect().with_platform(Some(Platform::Android));
    let device = resolver.resolve(&request).await.unwrap();
    assert_eq!(device.device_id, "emulator-5556");
    assert_eq!(device.capabilities.get_str("deviceName"), Some("sdk_gphone64"));
    assert_eq!(device.capabilities.get_str("automationName"), Some("UiAutomator2"));
}

#[tokio::test]
async fn test_auto_detect_without_template() {
    let store = ProfileStore::new(
        Capabilities::new(),
        vec![CapabilityProfile::new("only", Platform::Android)],
        vec![],
    )
    .unwrap();
    let inventory = Arc::new(StaticInventory::new(vec![iphone(
        "AAAA-1111",
        "17.5",
        DeviceStatus::Ready,
    )]));
    let resolver = DeviceResolver::new(Arc::new(store), inventory);

    let device = resolver.resolve(&DeviceRequest::auto_detect()).await.unwrap();
    assert_eq!(device.capabilities.get_str("platformName"), Some("iOS"));
    assert_eq!(device.capabilities.get_str("automationName"), Some("XCUITest"));
    assert_eq!(device.capabilities.get_str("deviceName"), Some("AAAA-1111"));
}

#[tokio::test]
async fn test_inventory_failure_propagates() {
    let (resolver, inventory) = resolver_with(vec![]);
    inventory.fail_with("adb server version mismatch");
    let result = resolver.resolve_str("pixel_6_api_33").await;
    assert!(matches!(result, Err(Error::Inventory(_))));
}

#[tokio::test]
async fn test_resolve_verifies_app() {
    let inventory = Arc::new(StaticInventory::new(vec![pixel(
        "emulator-5554",
        "13",
        DeviceStatus::Ready,
    )]));
    let store = ProfileStore::new(
        Capabilities::new(),
        vec![CapabilityProfile::new("with_app", Platform::Android).with_app("/missing/app.apk")],
        vec![],
    )
    .unwrap();
    let resolver = DeviceResolver::new(Arc::new(store), inventory);

    let result = resolver.resolve_str("with_app").await;
    assert!(matches!(result, Err(Error::AppNotFound(_))));
}
