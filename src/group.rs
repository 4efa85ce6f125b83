//! Multi-device touchpad group.
//!
//! Some machines have more than one touchpad (dual-screen laptops carry one
//! per screen). A [`DeviceGroup`] treats them as one logical touchpad:
//!
//! - [`open`](DeviceGroup::open) is all-or-nothing. If member `N` fails, the
//!   members opened before it are closed again and the error names `N`.
//! - [`disable`](DeviceGroup::disable) and [`enable`](DeviceGroup::enable)
//!   walk the members in order and stop at the first failure. Members that
//!   already changed state are *not* rolled back, so a failed call leaves the
//!   group mixed. The next keypress, timer expiry or override retries the
//!   transition, and both calls are idempotent per member.
//! - [`close`](DeviceGroup::close) is best effort: every member is closed and
//!   the last error, if any, is returned.

use crate::device::{DeviceHandle, DeviceInfo, DeviceOpener, TouchpadControl};
use crate::error::{Error, Result};
use std::sync::{Arc, Mutex, MutexGuard};

/// Touchpads that are disabled and enabled together.
#[derive(Debug)]
pub struct DeviceGroup {
    members: Vec<DeviceHandle>,
    op: Mutex<()>,
}

impl DeviceGroup {
    /// Create a group from existing handles. Membership is fixed afterwards.
    pub fn new(members: Vec<DeviceHandle>) -> Self {
        Self {
            members,
            op: Mutex::new(()),
        }
    }

    /// Create a group with one handle per discovered device.
    pub fn from_devices(devices: &[DeviceInfo], opener: Arc<dyn DeviceOpener>) -> Self {
        let members = devices
            .iter()
            .map(|info| DeviceHandle::new(info.clone(), Arc::clone(&opener)))
            .collect();
        Self::new(members)
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.op
            .lock()
            .map_err(|_| Error::ThreadError("device group mutex poisoned".into()))
    }

    /// Open every member in order, or none of them.
    pub fn open(&self) -> Result<()> {
        let _guard = self.guard()?;

        for (i, member) in self.members.iter().enumerate() {
            if let Err(e) = member.open() {
                for opened in &self.members[..i] {
                    if let Err(close_err) = opened.close() {
                        log::warn!(
                            "failed to close {} while rolling back group open: {}",
                            opened.identifier(),
                            close_err
                        );
                    }
                }
                return Err(Error::GroupOpen {
                    device_index: i + 1,
                    source: Box::new(e),
                });
            }
        }

        log::info!("opened {} touchpad(s)", self.members.len());
        Ok(())
    }

    /// Close every member, continuing past failures.
    ///
    /// Returns the last error encountered.
    pub fn close(&self) -> Result<()> {
        let _guard = self.guard()?;

        let mut last_err = None;
        for member in &self.members {
            if let Err(e) = member.close() {
                log::warn!("failed to close {}: {}", member.identifier(), e);
                last_err = Some(e);
            }
        }

        log::info!("closed {} touchpad(s)", self.members.len());
        last_err.map_or(Ok(()), Err)
    }

    /// Grab every member, stopping at the first failure.
    pub fn disable(&self) -> Result<()> {
        let _guard = self.guard()?;
        self.transition("disable", DeviceHandle::acquire_exclusive)
    }

    /// Release every member, stopping at the first failure.
    pub fn enable(&self) -> Result<()> {
        let _guard = self.guard()?;
        self.transition("enable", DeviceHandle::release_exclusive)
    }

    fn transition(&self, what: &str, apply: fn(&DeviceHandle) -> Result<()>) -> Result<()> {
        for (i, member) in self.members.iter().enumerate() {
            if let Err(e) = apply(member) {
                if i > 0 {
                    log::warn!(
                        "{what} failed on {} after {i} member(s) changed; group is mixed",
                        member.identifier()
                    );
                }
                return Err(Error::GroupPartial {
                    device_index: i + 1,
                    transitioned: i,
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }

    /// True if the group is non-empty and every member holds a grab.
    pub fn is_fully_disabled(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(DeviceHandle::is_exclusive)
    }

    /// True if the group is non-empty and every member is open.
    pub fn is_open(&self) -> bool {
        !self.members.is_empty() && self.members.iter().all(DeviceHandle::is_open)
    }

    /// Number of members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Member handles, in declaration order.
    pub fn members(&self) -> &[DeviceHandle] {
        &self.members
    }
}

impl TouchpadControl for DeviceGroup {
    fn disable(&self) -> Result<()> {
        DeviceGroup::disable(self)
    }

    fn enable(&self) -> Result<()> {
        DeviceGroup::enable(self)
    }

    fn is_disabled(&self) -> bool {
        self.is_fully_disabled()
    }

    fn stop(&self) -> Result<()> {
        self.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockOpener;

    const PADS: [&str; 2] = ["/dev/input/event5", "/dev/input/event6"];

    fn group(opener: &Arc<MockOpener>, paths: &[&str]) -> DeviceGroup {
        let devices: Vec<DeviceInfo> = paths
            .iter()
            .map(|p| DeviceInfo::new(*p, "ASUE140A:00 04F3:3134 Touchpad"))
            .collect();
        DeviceGroup::from_devices(&devices, opener.clone())
    }

    #[test]
    fn test_open_all() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        g.open().unwrap();
        assert!(g.is_open());
        assert_eq!(g.member_count(), 2);
        assert_eq!(opener.open_count(), 2);
    }

    #[test]
    fn test_second_member_open_failure_closes_first() {
        let opener = MockOpener::new();
        opener.fail_open(PADS[1]);
        let g = group(&opener, &PADS);

        let err = g.open().unwrap_err();
        assert!(matches!(err, Error::GroupOpen { device_index: 2, .. }));
        assert_eq!(err.device_index(), Some(2));
        assert!(!g.members().iter().any(DeviceHandle::is_open));
        assert_eq!(opener.open_count(), 0);
        assert!(!opener.is_open(PADS[0]));
    }

    #[test]
    fn test_middle_member_open_failure() {
        let opener = MockOpener::new();
        let paths = ["/dev/input/event3", "/dev/input/event4", "/dev/input/event7"];
        opener.fail_open(paths[1]);
        let g = group(&opener, &paths);

        assert_eq!(g.open().unwrap_err().device_index(), Some(2));
        assert_eq!(opener.open_count(), 0);
        // Members after the failing one are never attempted.
        assert_eq!(opener.open_calls(paths[2]), 0);
    }

    #[test]
    fn test_disable_enable_all() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        g.open().unwrap();

        g.disable().unwrap();
        assert!(g.is_fully_disabled());
        assert!(g.members().iter().all(DeviceHandle::is_exclusive));

        g.enable().unwrap();
        assert!(!g.is_fully_disabled());
        assert!(!g.members().iter().any(DeviceHandle::is_exclusive));
    }

    #[test]
    fn test_transitions_are_idempotent() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        g.open().unwrap();

        g.disable().unwrap();
        g.disable().unwrap();
        assert!(g.is_fully_disabled());
        assert_eq!(opener.grab_calls(), 2);

        g.enable().unwrap();
        g.enable().unwrap();
        assert!(!g.is_fully_disabled());
        assert_eq!(opener.ungrab_calls(), 2);
    }

    #[test]
    fn test_partial_disable_leaves_mixed_state() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        g.open().unwrap();
        opener.fail_grab(PADS[1], true);

        let err = g.disable().unwrap_err();
        assert!(matches!(
            err,
            Error::GroupPartial {
                device_index: 2,
                transitioned: 1,
                ..
            }
        ));
        assert!(g.members()[0].is_exclusive());
        assert!(!g.members()[1].is_exclusive());
        assert!(!g.is_fully_disabled());

        // A later attempt completes the transition.
        opener.fail_grab(PADS[1], false);
        g.disable().unwrap();
        assert!(g.is_fully_disabled());
    }

    #[test]
    fn test_disable_before_open_fails_on_first_member() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        let err = g.disable().unwrap_err();
        assert!(matches!(
            err,
            Error::GroupPartial {
                device_index: 1,
                transitioned: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_close_releases_and_closes_everything() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        g.open().unwrap();
        g.disable().unwrap();
        opener.fail_ungrab(PADS[0], true);

        g.close().unwrap();
        assert!(!g.members().iter().any(DeviceHandle::is_open));
        assert_eq!(opener.open_count(), 0);
    }

    #[test]
    fn test_empty_group_is_never_disabled() {
        let g = DeviceGroup::new(Vec::new());
        g.open().unwrap();
        g.disable().unwrap();
        assert!(!g.is_fully_disabled());
        assert!(!g.is_open());
        assert_eq!(g.member_count(), 0);
    }

    #[test]
    fn test_stop_closes() {
        let opener = MockOpener::new();
        let g = group(&opener, &PADS);
        g.open().unwrap();
        TouchpadControl::stop(&g).unwrap();
        assert!(!g.is_open());
    }
}
