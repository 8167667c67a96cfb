//! Low Power Management
//!
//! Arbitrates which low-power mode the idle loop may enter. Subsystems
//! that need a clock or peripheral kept alive cast a veto against stop
//! mode or off mode; the deepest mode nobody vetoes wins.
//!
//! ```text
//!   stop vetoes   off vetoes   selected mode
//!   ───────────   ──────────   ─────────────
//!   any           any          Sleep
//!   none          any          Stop
//!   none          none         Off
//! ```

use core::cell::Cell;

use critical_section::Mutex;

/// Subsystem allowed to veto a low-power mode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LpmId {
    /// Application layer
    Appli,
    /// LoRaWAN stack
    Lib,
    /// RTC alarm handling
    Rtc,
    /// GPS receiver
    Gps,
    /// UART receive path
    UartRx,
    /// UART transmit path (trace output)
    UartTx,
}

impl LpmId {
    /// All voters, in bit order
    pub const ALL: [Self; 6] = [
        Self::Appli,
        Self::Lib,
        Self::Rtc,
        Self::Gps,
        Self::UartRx,
        Self::UartTx,
    ];

    /// Bit owned by this voter
    #[must_use]
    pub const fn mask(self) -> u8 {
        match self {
            Self::Appli => 1 << 0,
            Self::Lib => 1 << 1,
            Self::Rtc => 1 << 2,
            Self::Gps => 1 << 3,
            Self::UartRx => 1 << 4,
            Self::UartTx => 1 << 5,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for LpmId {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Appli => defmt::write!(f, "APPLI"),
            Self::Lib => defmt::write!(f, "LIB"),
            Self::Rtc => defmt::write!(f, "RTC"),
            Self::Gps => defmt::write!(f, "GPS"),
            Self::UartRx => defmt::write!(f, "UART_RX"),
            Self::UartTx => defmt::write!(f, "UART_TX"),
        }
    }
}

/// Whether a subsystem allows or vetoes a mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LpmSetting {
    /// Mode allowed (veto released)
    Enable,
    /// Mode vetoed
    Disable,
}

/// Low-power mode selected for the next idle period, shallowest first
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LpmMode {
    /// CPU clock gated, peripherals running
    #[default]
    Sleep,
    /// Clocks stopped, RAM and RTC retained
    Stop,
    /// Deepest mode, wake through RTC or reset
    Off,
}

#[cfg(feature = "embedded")]
impl defmt::Format for LpmMode {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Sleep => defmt::write!(f, "SLEEP"),
            Self::Stop => defmt::write!(f, "STOP"),
            Self::Off => defmt::write!(f, "OFF"),
        }
    }
}

/// Set of subsystems currently holding a veto
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct VoterSet(u8);

impl VoterSet {
    /// Empty set
    pub const EMPTY: Self = Self(0);

    /// Create an empty set
    #[must_use]
    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Set with `id` added
    #[must_use]
    pub const fn with(self, id: LpmId) -> Self {
        Self(self.0 | id.mask())
    }

    /// Set with `id` removed
    #[must_use]
    pub const fn without(self, id: LpmId) -> Self {
        Self(self.0 & !id.mask())
    }

    /// Add a voter
    pub fn insert(&mut self, id: LpmId) {
        *self = self.with(id);
    }

    /// Remove a voter
    pub fn remove(&mut self, id: LpmId) {
        *self = self.without(id);
    }

    /// Check if `id` holds a veto
    #[must_use]
    pub const fn contains(self, id: LpmId) -> bool {
        self.0 & id.mask() != 0
    }

    /// Check if nobody holds a veto
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bitmask
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Apply a setting for `id`
    #[must_use]
    pub const fn apply(self, id: LpmId, setting: LpmSetting) -> Self {
        match setting {
            LpmSetting::Disable => self.with(id),
            LpmSetting::Enable => self.without(id),
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for VoterSet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Voters({=u8:#x})", self.0);
    }
}

/// Platform hooks run around each low-power period.
///
/// Every hook defaults to doing nothing; a board overrides the ones it
/// needs, typically to reconfigure clocks and execute `WFI`.
pub trait LowPowerHooks {
    /// Before entering sleep mode
    fn enter_sleep(&self) {}
    /// After waking from sleep mode
    fn exit_sleep(&self) {}
    /// Before entering stop mode
    fn enter_stop(&self) {}
    /// After waking from stop mode
    fn exit_stop(&self) {}
    /// Before entering off mode
    fn enter_off(&self) {}
    /// After waking from off mode
    fn exit_off(&self) {}
}

/// Hooks that do nothing
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl LowPowerHooks for NoHooks {}

#[derive(Clone, Copy, Default)]
struct Vetoes {
    stop: VoterSet,
    off: VoterSet,
}

/// Low-power mode arbiter
///
/// Shared by reference between the main loop and interrupt handlers; all
/// state changes happen inside a critical section.
pub struct LowPowerManager<H = NoHooks> {
    vetoes: Mutex<Cell<Vetoes>>,
    hooks: H,
}

impl LowPowerManager<NoHooks> {
    /// Create an arbiter with no-op hooks
    #[must_use]
    pub const fn new() -> Self {
        Self::with_hooks(NoHooks)
    }
}

impl Default for LowPowerManager<NoHooks> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: LowPowerHooks> LowPowerManager<H> {
    /// Create an arbiter that runs `hooks` around each low-power period
    #[must_use]
    pub const fn with_hooks(hooks: H) -> Self {
        Self {
            vetoes: Mutex::new(Cell::new(Vetoes {
                stop: VoterSet::EMPTY,
                off: VoterSet::EMPTY,
            })),
            hooks,
        }
    }

    /// Allow or veto stop mode on behalf of `id`
    pub fn set_stop_mode(&self, id: LpmId, setting: LpmSetting) {
        let voters = critical_section::with(|cs| {
            let cell = self.vetoes.borrow(cs);
            let mut vetoes = cell.get();
            vetoes.stop = vetoes.stop.apply(id, setting);
            cell.set(vetoes);
            vetoes.stop
        });
        trace!("lpm: stop vetoes {} after {}", voters, id);
    }

    /// Allow or veto off mode on behalf of `id`
    pub fn set_off_mode(&self, id: LpmId, setting: LpmSetting) {
        let voters = critical_section::with(|cs| {
            let cell = self.vetoes.borrow(cs);
            let mut vetoes = cell.get();
            vetoes.off = vetoes.off.apply(id, setting);
            cell.set(vetoes);
            vetoes.off
        });
        trace!("lpm: off vetoes {} after {}", voters, id);
    }

    /// Voters currently blocking stop mode
    #[must_use]
    pub fn stop_vetoes(&self) -> VoterSet {
        critical_section::with(|cs| self.vetoes.borrow(cs).get().stop)
    }

    /// Voters currently blocking off mode
    #[must_use]
    pub fn off_vetoes(&self) -> VoterSet {
        critical_section::with(|cs| self.vetoes.borrow(cs).get().off)
    }

    /// Deepest mode nobody vetoes
    #[must_use]
    pub fn mode(&self) -> LpmMode {
        let vetoes = critical_section::with(|cs| self.vetoes.borrow(cs).get());
        if !vetoes.stop.is_empty() {
            LpmMode::Sleep
        } else if !vetoes.off.is_empty() {
            LpmMode::Stop
        } else {
            LpmMode::Off
        }
    }

    /// Run the entry and exit hooks of the currently selected mode.
    ///
    /// Returns the mode that was entered.
    pub fn enter_low_power(&self) -> LpmMode {
        let mode = self.mode();
        debug!("lpm: entering {}", mode);
        match mode {
            LpmMode::Sleep => {
                self.hooks.enter_sleep();
                self.hooks.exit_sleep();
            }
            LpmMode::Stop => {
                self.hooks.enter_stop();
                self.hooks.exit_stop();
            }
            LpmMode::Off => {
                self.hooks.enter_off();
                self.hooks.exit_off();
            }
        }
        mode
    }

    /// Platform hooks
    #[must_use]
    pub const fn hooks(&self) -> &H {
        &self.hooks
    }
}
