use std::fs::File;
use std::os::fd::AsRawFd;

use drm_fourcc::DrmFourcc;
use test_log::test;

use super::compositor::TestCompositor;
use super::{full_hd, nv12_frame};
use crate::bridge::OverlayBridge;
use crate::config::OverlayConfig;
use crate::error::OverlayError;
use crate::wayland::WaylandBackend;

const NV12: u32 = DrmFourcc::Nv12 as u32;

fn overlay(compositor: &TestCompositor) -> OverlayBridge<WaylandBackend> {
    let host = compositor.host();
    OverlayBridge::initialize(WaylandBackend::new(host.params), OverlayConfig::default())
        .expect("overlay should initialize")
}

/// Any open descriptor will do; the compositor never maps it
fn frame_memory() -> File {
    File::open("/dev/null").unwrap()
}

#[test]
fn test_created_buffer_is_attached() {
    let compositor = TestCompositor::start(1);
    let mut bridge = overlay(&compositor);
    assert!(bridge.supports_format(NV12));
    assert_eq!(bridge.formats().modifiers(NV12), &[0]);

    let memory = frame_memory();
    bridge.hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd()).unwrap();
    assert!(bridge.attached_buffer().is_some());
    assert_eq!(bridge.pending_release(), 1);
    // sends the attach and commit
    bridge.dispatch_pending().unwrap();

    let log = compositor.log();
    assert!(log.placed_below);
    assert_eq!(log.planes, vec![(0, 0, 1920), (1, 3_072_000, 960)]);
    assert_eq!(log.created, vec![(1920, 1080, NV12)]);
    assert!(matches!(log.attached.last(), Some(Some(_))));
}

#[test]
fn test_failed_event_keeps_attachment() {
    let compositor = TestCompositor::start(1);
    let mut bridge = overlay(&compositor);
    let memory = frame_memory();

    bridge.hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd()).unwrap();
    let attached = bridge.attached_buffer().cloned();

    compositor.set_reject(true);
    let err = bridge
        .hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd())
        .unwrap_err();

    assert!(matches!(
        err,
        OverlayError::BufferCreation { format: NV12, width: 1920, height: 1080 }
    ));
    assert_eq!(bridge.attached_buffer().cloned(), attached);
    assert_eq!(bridge.pending_release(), 1);
    assert_eq!(compositor.log().created.len(), 1);
}

#[test]
fn test_release_event_destroys_buffer() {
    let compositor = TestCompositor::start(1);
    let mut bridge = overlay(&compositor);
    let memory = frame_memory();

    bridge.hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd()).unwrap();
    bridge.hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd()).unwrap();
    assert_eq!(bridge.pending_release(), 2);

    // The releases are read while waiting for the next buffer
    compositor.release_all();
    bridge.hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd()).unwrap();

    assert_eq!(bridge.stats().buffers_released, 2);
    assert_eq!(bridge.pending_release(), 1);
    assert!(bridge.attached_buffer().is_some());

    bridge.teardown();
    let log = compositor.log();
    assert_eq!(log.destroyed_buffers, 3);
}

#[test]
fn test_teardown_destroys_bound_globals() {
    let compositor = TestCompositor::start(1);
    let mut bridge = overlay(&compositor);

    bridge.teardown();
    bridge.teardown();

    let log = compositor.log();
    assert_eq!(log.destroyed_globals, vec!["wl_subcompositor", "zwp_linux_dmabuf_v1"]);
}

#[test]
fn test_failed_initialization_destroys_bound_globals() {
    let compositor = TestCompositor::start(0);
    let host = compositor.host();

    let err = OverlayBridge::initialize(WaylandBackend::new(host.params), OverlayConfig::default())
        .err()
        .expect("initialization must fail");
    assert!(matches!(err, OverlayError::Initialization(ref msg) if msg.contains("zwp_linux_dmabuf_v1")));

    let log = compositor.log();
    assert_eq!(log.binds("wl_subcompositor"), 1);
    assert_eq!(log.destroyed_globals, vec!["wl_subcompositor"]);
}

#[test]
fn test_first_dmabuf_global_stays_bound() {
    let compositor = TestCompositor::start(2);
    let mut bridge = overlay(&compositor);
    let memory = frame_memory();

    bridge.hand_off(Some(&nv12_frame(memory.as_raw_fd())), &full_hd()).unwrap();
    bridge.teardown();

    let log = compositor.log();
    assert_eq!(log.binds("zwp_linux_dmabuf_v1"), 1);
    assert_eq!(log.destroyed_globals, vec!["wl_subcompositor", "zwp_linux_dmabuf_v1"]);
    assert_eq!(log.created.len(), 1);
}
