//! Power Management Tests
//!
//! Tests for low-power mode vetoes, mode selection and sleep hooks.
//! Run with: cargo test --target x86_64-unknown-linux-gnu --no-default-features --features std --test power_tests

use std::cell::RefCell;

use lrwan_node::power::{LowPowerHooks, LowPowerManager, LpmId, LpmMode, LpmSetting, VoterSet};

/// Hooks that record every call
#[derive(Default)]
struct RecordingHooks {
    calls: RefCell<Vec<&'static str>>,
}

impl RecordingHooks {
    fn take(&self) -> Vec<&'static str> {
        self.calls.borrow_mut().drain(..).collect()
    }
}

impl LowPowerHooks for RecordingHooks {
    fn enter_sleep(&self) {
        self.calls.borrow_mut().push("enter_sleep");
    }
    fn exit_sleep(&self) {
        self.calls.borrow_mut().push("exit_sleep");
    }
    fn enter_stop(&self) {
        self.calls.borrow_mut().push("enter_stop");
    }
    fn exit_stop(&self) {
        self.calls.borrow_mut().push("exit_stop");
    }
    fn enter_off(&self) {
        self.calls.borrow_mut().push("enter_off");
    }
    fn exit_off(&self) {
        self.calls.borrow_mut().push("exit_off");
    }
}

// =============================================================================
// Voter Set Tests
// =============================================================================

#[test]
fn voter_set_starts_empty() {
    let set = VoterSet::new();
    assert!(set.is_empty());
    assert_eq!(set.bits(), 0);
    assert_eq!(set, VoterSet::default());
}

#[test]
fn voter_set_insert_remove() {
    let mut set = VoterSet::new();
    set.insert(LpmId::UartTx);
    set.insert(LpmId::Rtc);

    assert!(set.contains(LpmId::UartTx));
    assert!(set.contains(LpmId::Rtc));
    assert!(!set.contains(LpmId::Gps));

    set.remove(LpmId::UartTx);
    assert!(!set.contains(LpmId::UartTx));
    assert!(!set.is_empty());

    set.remove(LpmId::Rtc);
    assert!(set.is_empty());
}

#[test]
fn voter_set_insert_is_idempotent() {
    let mut set = VoterSet::new();
    set.insert(LpmId::Lib);
    set.insert(LpmId::Lib);
    set.remove(LpmId::Lib);
    assert!(set.is_empty());
}

#[test]
fn voter_masks_are_distinct_bits() {
    let mut seen = 0u8;
    for id in LpmId::ALL {
        let mask = id.mask();
        assert_eq!(mask.count_ones(), 1, "{id:?} must own one bit");
        assert_eq!(seen & mask, 0, "{id:?} shares a bit");
        seen |= mask;
    }
    assert_eq!(LpmId::UartTx.mask(), 1 << 5);
}

// =============================================================================
// Mode Selection Tests
// =============================================================================

#[test]
fn no_vetoes_allows_off() {
    let lpm = LowPowerManager::new();
    assert_eq!(lpm.mode(), LpmMode::Off);
}

#[test]
fn off_veto_selects_stop() {
    let lpm = LowPowerManager::new();
    lpm.set_off_mode(LpmId::Rtc, LpmSetting::Disable);
    assert_eq!(lpm.mode(), LpmMode::Stop);
}

#[test]
fn stop_veto_selects_sleep() {
    let lpm = LowPowerManager::new();
    lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Disable);
    assert_eq!(lpm.mode(), LpmMode::Sleep);
}

#[test]
fn stop_veto_wins_over_off_veto() {
    let lpm = LowPowerManager::new();
    lpm.set_off_mode(LpmId::Gps, LpmSetting::Disable);
    lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Disable);
    assert_eq!(lpm.mode(), LpmMode::Sleep);

    lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Enable);
    assert_eq!(lpm.mode(), LpmMode::Stop);

    lpm.set_off_mode(LpmId::Gps, LpmSetting::Enable);
    assert_eq!(lpm.mode(), LpmMode::Off);
}

#[test]
fn mode_priority_over_all_combinations() {
    for stop_bits in 0u8..64 {
        for off_bits in [0u8, 1, 0b10_0000, 0b11_1111] {
            let lpm = LowPowerManager::new();
            for id in LpmId::ALL {
                if stop_bits & id.mask() != 0 {
                    lpm.set_stop_mode(id, LpmSetting::Disable);
                }
                if off_bits & id.mask() != 0 {
                    lpm.set_off_mode(id, LpmSetting::Disable);
                }
            }

            let expected = if stop_bits != 0 {
                LpmMode::Sleep
            } else if off_bits != 0 {
                LpmMode::Stop
            } else {
                LpmMode::Off
            };
            assert_eq!(lpm.mode(), expected, "stop={stop_bits:#b} off={off_bits:#b}");
        }
    }
}

#[test]
fn vetoes_from_several_subsystems_accumulate() {
    let lpm = LowPowerManager::new();
    lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Disable);
    lpm.set_stop_mode(LpmId::UartRx, LpmSetting::Disable);

    lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Enable);
    assert_eq!(lpm.mode(), LpmMode::Sleep, "UART RX still vetoes");
    assert!(lpm.stop_vetoes().contains(LpmId::UartRx));

    lpm.set_stop_mode(LpmId::UartRx, LpmSetting::Enable);
    assert_eq!(lpm.mode(), LpmMode::Off);
    assert!(lpm.stop_vetoes().is_empty());
}

#[test]
fn stop_and_off_vetoes_are_independent() {
    let lpm = LowPowerManager::new();
    lpm.set_off_mode(LpmId::Appli, LpmSetting::Disable);

    assert!(lpm.stop_vetoes().is_empty());
    assert!(lpm.off_vetoes().contains(LpmId::Appli));

    // Releasing a stop veto never held does not touch off vetoes
    lpm.set_stop_mode(LpmId::Appli, LpmSetting::Enable);
    assert!(lpm.off_vetoes().contains(LpmId::Appli));
}

#[test]
fn mode_ordering_shallowest_first() {
    assert!(LpmMode::Sleep < LpmMode::Stop);
    assert!(LpmMode::Stop < LpmMode::Off);
}

// =============================================================================
// Hook Dispatch Tests
// =============================================================================

#[test]
fn enter_low_power_runs_off_hooks_when_unvetoed() {
    let lpm = LowPowerManager::with_hooks(RecordingHooks::default());
    assert_eq!(lpm.enter_low_power(), LpmMode::Off);
    assert_eq!(lpm.hooks().take(), ["enter_off", "exit_off"]);
}

#[test]
fn enter_low_power_runs_stop_hooks() {
    let lpm = LowPowerManager::with_hooks(RecordingHooks::default());
    lpm.set_off_mode(LpmId::Lib, LpmSetting::Disable);
    assert_eq!(lpm.enter_low_power(), LpmMode::Stop);
    assert_eq!(lpm.hooks().take(), ["enter_stop", "exit_stop"]);
}

#[test]
fn enter_low_power_runs_sleep_hooks() {
    let lpm = LowPowerManager::with_hooks(RecordingHooks::default());
    lpm.set_stop_mode(LpmId::UartTx, LpmSetting::Disable);
    lpm.set_off_mode(LpmId::Lib, LpmSetting::Disable);
    assert_eq!(lpm.enter_low_power(), LpmMode::Sleep);
    assert_eq!(lpm.hooks().take(), ["enter_sleep", "exit_sleep"]);
}

#[test]
fn default_hooks_do_nothing() {
    let lpm = LowPowerManager::default();
    assert_eq!(lpm.enter_low_power(), LpmMode::Off);
}

#[test]
fn arbiter_usable_as_static() {
    static LPM: LowPowerManager = LowPowerManager::new();
    LPM.set_stop_mode(LpmId::Appli, LpmSetting::Disable);
    assert_eq!(LPM.mode(), LpmMode::Sleep);
    LPM.set_stop_mode(LpmId::Appli, LpmSetting::Enable);
    assert_eq!(LPM.mode(), LpmMode::Off);
}
