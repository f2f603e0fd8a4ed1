use test_log::test;

use super::mock::{MockBackend, MockHost, MockServer};
use super::{full_hd, nv12_frame};
use crate::driver::{overlay_entry, DriverEntry, DriverRegistry, HwdecDriver, ImageFormat, OverlayDriver, DRIVER_NAME};
use crate::error::{status_code, OverlayError};
use crate::frame::Rect;

#[test]
fn test_registry_negotiates_drm_prime() {
    let registry = DriverRegistry::<MockHost>::with_defaults();

    let entry = registry.negotiate(ImageFormat::DrmPrime).expect("driver for DRM-PRIME");
    assert_eq!(entry.name, DRIVER_NAME);
    assert!(registry.negotiate(ImageFormat::Vaapi).is_none());
    assert!(registry.find(DRIVER_NAME).is_some());
    assert_eq!(registry.names().collect::<Vec<_>>(), vec![DRIVER_NAME]);

    let driver = entry.create();
    assert_eq!(driver.name(), DRIVER_NAME);
}

#[test]
fn test_registry_keeps_first_registration() {
    let mut registry = DriverRegistry::<MockHost>::new();
    registry.register(overlay_entry());
    registry.register(DriverEntry::new(DRIVER_NAME, &[ImageFormat::Vaapi], || {
        Box::new(OverlayDriver::<MockBackend>::default())
    }));

    assert_eq!(registry.names().count(), 1);
    assert!(registry.negotiate(ImageFormat::Vaapi).is_none());
}

#[test]
fn test_init_without_interop_fails() {
    let server = MockServer::shared();
    let mut host = MockHost::new(server.clone());
    host.interop_available = false;

    let mut driver = OverlayDriver::<MockBackend>::default();
    let result = driver.init(&host);

    assert!(matches!(result, Err(OverlayError::Initialization(_))));
    assert_eq!(status_code(&result), -1);
    assert!(driver.bridge().is_none());
    assert_eq!(server.borrow().roundtrips, 0);
}

#[test]
fn test_init_failure_reports_status() {
    let server = MockServer::shared();
    server.borrow_mut().advertise_subcompositor = false;
    let host = MockHost::new(server.clone());

    let mut driver = OverlayDriver::<MockBackend>::default();
    let result = HwdecDriver::<MockHost>::init(&mut driver, &host);

    assert_eq!(status_code(&result), -1);
    assert!(driver.bridge().is_none());
    assert_eq!(server.borrow().live_surfaces, 0);
}

#[test]
fn test_driver_lifecycle() {
    let server = MockServer::shared();
    let host = MockHost::new(server.clone());
    let registry = DriverRegistry::<MockHost>::with_defaults();
    let mut driver = registry.negotiate(ImageFormat::DrmPrime).unwrap().create();

    assert_eq!(status_code(&driver.init(&host)), 0);

    let frame = nv12_frame(5);
    // Destination rectangle does not affect the buffer size
    let dst = Rect::new(100, 100, 740, 460);
    assert_eq!(status_code(&driver.overlay_frame(Some(&frame), &full_hd(), &dst, true)), 0);
    {
        let s = server.borrow();
        assert_eq!((s.requests[0].width, s.requests[0].height), (1920, 1080));
        assert!(s.attached.is_some());
    }

    server.borrow_mut().reject_buffers = true;
    assert_eq!(status_code(&driver.overlay_frame(Some(&frame), &full_hd(), &dst, true)), -1);

    assert_eq!(status_code(&driver.overlay_frame(None, &full_hd(), &dst, false)), 0);
    assert_eq!(server.borrow().attached, None);

    driver.uninit();
    driver.uninit();

    let s = server.borrow();
    assert_eq!(s.live_surfaces, 0);
    assert_eq!(s.live_subsurfaces, 0);
    assert!(s.live_buffers.is_empty());
    assert_eq!(s.double_destroys, 0);
}

#[test]
fn test_overlay_frame_before_init() {
    let mut driver = OverlayDriver::<MockBackend>::default();
    let result = HwdecDriver::<MockHost>::overlay_frame(
        &mut driver,
        Some(&nv12_frame(5)),
        &full_hd(),
        &full_hd(),
        true,
    );
    assert_eq!(status_code(&result), -1);
}

#[test]
fn test_reinit_replaces_overlay() {
    let server = MockServer::shared();
    let host = MockHost::new(server.clone());
    let mut driver = OverlayDriver::<MockBackend>::default();

    driver.init(&host).unwrap();
    driver.init(&host).unwrap();

    assert_eq!(server.borrow().live_surfaces, 1);
    assert_eq!(server.borrow().live_subsurfaces, 1);
    HwdecDriver::<MockHost>::uninit(&mut driver);
    assert_eq!(server.borrow().live_surfaces, 0);
}
