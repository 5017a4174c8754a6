//! PHY negotiation engine.
//!
//! ```text
//!   SCAN ─> RESET ─> ADVERTISE ─> AUTONEG_WAIT ─> RESOLVE ─> APPLIED
//!    │         │          │                                     ▲
//!    │ no PHY  └──────────┴──── MII failure: fallback ──────────┤
//!    └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Only 10/100 is negotiated. Whatever happens, the engine ends in APPLIED
//! with the adapter programmed for some link rate (10/half at worst).

use core::fmt;

use crate::hw::RegisterInterface;
use crate::time::RetryPolicy;

use super::mii::{MiiBus, MiiError};
use super::regs::{self, PhyInterface};

// ═══════════════════════════════════════════════════════════════════════════
// LINK STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Link speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSpeed {
    /// 10 Mbps.
    Speed10,
    /// 100 Mbps.
    Speed100,
    /// 1000 Mbps.
    Speed1000,
}

impl LinkSpeed {
    /// Get speed in Mbps.
    pub fn mbps(&self) -> u32 {
        match self {
            LinkSpeed::Speed10 => 10,
            LinkSpeed::Speed100 => 100,
            LinkSpeed::Speed1000 => 1000,
        }
    }

    /// Code programmed into LINK_SPEED.
    pub fn register_code(&self) -> u32 {
        match self {
            LinkSpeed::Speed10 => regs::LINKSPEED_10,
            LinkSpeed::Speed100 => regs::LINKSPEED_100,
            LinkSpeed::Speed1000 => regs::LINKSPEED_1000,
        }
    }
}

/// Duplex mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    /// Half duplex.
    Half,
    /// Full duplex.
    Full,
}

/// What the adapter is currently programmed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    /// Management address of the PHY, if one was found.
    pub phy_address: Option<u8>,
    /// OUI of that PHY (0 when none).
    pub phy_oui: u32,
    /// Programmed speed.
    pub speed: LinkSpeed,
    /// Programmed duplex.
    pub duplex: Duplex,
    /// Speed written with the FORCE bit.
    pub forced: bool,
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            phy_address: None,
            phy_oui: 0,
            speed: LinkSpeed::Speed10,
            duplex: Duplex::Half,
            forced: true,
        }
    }
}

impl LinkState {
    /// LINK_SPEED register value.
    pub fn link_speed_register(&self) -> u32 {
        let force = if self.forced { regs::LINKSPEED_FORCE } else { 0 };
        force | self.speed.register_code()
    }

    /// MISC1 register value.
    pub fn misc1_register(&self) -> u32 {
        match self.duplex {
            Duplex::Half => regs::MISC1_FORCE | regs::MISC1_HD,
            Duplex::Full => regs::MISC1_FORCE,
        }
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let duplex = match self.duplex {
            Duplex::Half => "half",
            Duplex::Full => "full",
        };
        write!(f, "{} Mbps {} duplex", self.speed.mbps(), duplex)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS & OUTCOMES
// ═══════════════════════════════════════════════════════════════════════════

/// PHY bring-up errors. None of these are fatal to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyError {
    /// Nothing answered on the management bus.
    NoPhy,
    /// BMCR.RESET never self-cleared.
    ResetTimeout,
    /// A management transaction failed.
    Mii(MiiError),
}

impl From<MiiError> for PhyError {
    fn from(e: MiiError) -> Self {
        PhyError::Mii(e)
    }
}

impl fmt::Display for PhyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhyError::NoPhy => write!(f, "no PHY found"),
            PhyError::ResetTimeout => write!(f, "PHY reset did not complete"),
            PhyError::Mii(e) => write!(f, "{}", e),
        }
    }
}

/// Why a negotiation ended at the fallback rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    /// PHY bring-up failed.
    Phy(PhyError),
    /// No link partner.
    NoLink,
    /// Autonegotiation did not finish in time.
    AutonegIncomplete,
    /// Link up but no common ability.
    NoCommonAbility,
}

/// Result of a full negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// Link up at a negotiated rate.
    Up(LinkState),
    /// Running at a fallback rate.
    Degraded(LinkState, DegradedReason),
    /// No PHY; running at the default rate.
    NoPhy(LinkState),
}

impl LinkOutcome {
    /// Link state the adapter ended up with.
    pub fn link(&self) -> &LinkState {
        match self {
            LinkOutcome::Up(link) | LinkOutcome::Degraded(link, _) | LinkOutcome::NoPhy(link) => {
                link
            }
        }
    }

    /// Link is up.
    pub fn is_up(&self) -> bool {
        matches!(self, LinkOutcome::Up(_))
    }
}

/// Engine progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhyState {
    Scan,
    Reset,
    Advertise,
    AutonegWait,
    Resolve,
    Applied,
}

// ═══════════════════════════════════════════════════════════════════════════
// QUIRKS
// ═══════════════════════════════════════════════════════════════════════════

/// How the PHY is wired to the MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceMode {
    /// Plain MII.
    Mii,
    /// Reduced gigabit MII.
    Rgmii,
}

impl InterfaceMode {
    /// Decode from the PHY_INTERFACE register.
    pub fn from_register(value: u32) -> Self {
        if PhyInterface::from_bits_retain(value).contains(PhyInterface::RGMII) {
            InterfaceMode::Rgmii
        } else {
            InterfaceMode::Mii
        }
    }
}

/// Which interface modes a quirk applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeMatch {
    /// Every mode.
    Any,
    /// Only this mode.
    Only(InterfaceMode),
}

/// One read-modify-write of a PHY register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegPatch {
    /// PHY register.
    pub reg: u8,
    /// Bits cleared.
    pub clear: u16,
    /// Bits set.
    pub set: u16,
}

/// Vendor fix-ups applied after the advertisement is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyQuirk {
    /// PHY vendor.
    pub oui: u32,
    /// Interface modes affected.
    pub mode: ModeMatch,
    /// Register patches, in order.
    pub patches: &'static [RegPatch],
}

/// Known PHY fix-ups.
pub static PHY_QUIRKS: &[PhyQuirk] = &[
    PhyQuirk {
        oui: regs::PHY_OUI_CICADA,
        mode: ModeMatch::Only(InterfaceMode::Rgmii),
        patches: &[
            RegPatch {
                reg: regs::MII_RESV1,
                clear: regs::PHY_INIT1 | regs::PHY_INIT2,
                set: regs::PHY_INIT3 | regs::PHY_INIT4,
            },
            RegPatch {
                reg: regs::MII_NCONFIG,
                clear: 0,
                set: regs::PHY_INIT5,
            },
        ],
    },
    PhyQuirk {
        oui: regs::PHY_OUI_CICADA,
        mode: ModeMatch::Any,
        patches: &[RegPatch {
            reg: regs::MII_SREVISION,
            clear: 0,
            set: regs::PHY_INIT6,
        }],
    },
];

/// Patches for a PHY, in table order.
pub fn quirks_for(oui: u32, mode: InterfaceMode) -> impl Iterator<Item = &'static RegPatch> {
    PHY_QUIRKS
        .iter()
        .filter(move |q| {
            q.oui == oui
                && match q.mode {
                    ModeMatch::Any => true,
                    ModeMatch::Only(m) => m == mode,
                }
        })
        .flat_map(|q| q.patches.iter())
}

// ═══════════════════════════════════════════════════════════════════════════
// PURE HELPERS
// ═══════════════════════════════════════════════════════════════════════════

/// Vendor OUI from the two identifier registers.
#[inline]
pub fn decode_oui(id1: u16, id2: u16) -> u32 {
    (((id1 & regs::PHYID1_OUI_MASK) as u32) << regs::PHYID1_OUI_SHIFT)
        | (((id2 & regs::PHYID2_OUI_MASK) as u32) >> regs::PHYID2_OUI_SHIFT)
}

/// Pick speed and duplex from the two ability words.
///
/// 100/full beats 100/half beats 10/full beats 10/half; anything else
/// (including no link) is 10/half.
pub fn resolve_link(adv: u16, lpa: u16, link_up: bool, aneg_complete: bool) -> (LinkSpeed, Duplex) {
    if !link_up || !aneg_complete {
        return (LinkSpeed::Speed10, Duplex::Half);
    }
    let common = adv & lpa;
    if common & regs::ADVERTISE_100FULL != 0 {
        (LinkSpeed::Speed100, Duplex::Full)
    } else if common & regs::ADVERTISE_100HALF != 0 {
        (LinkSpeed::Speed100, Duplex::Half)
    } else if common & regs::ADVERTISE_10FULL != 0 {
        (LinkSpeed::Speed10, Duplex::Full)
    } else {
        (LinkSpeed::Speed10, Duplex::Half)
    }
}

/// Result of [`wait_autoneg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutonegStatus {
    /// Last BMSR value read (0 if every read failed).
    pub bmsr: u16,
    /// Link and negotiation both reported done.
    pub converged: bool,
}

impl AutonegStatus {
    /// BMSR link bit.
    pub fn link_up(&self) -> bool {
        self.bmsr & regs::BMSR_LSTATUS != 0
    }

    /// BMSR autonegotiation-complete bit.
    pub fn aneg_complete(&self) -> bool {
        self.bmsr & regs::BMSR_ANEGCOMPLETE != 0
    }
}

/// Wait for LINK_STATUS and ANEG_COMPLETE.
///
/// One read is discarded first (BMSR link status latches low). Then
/// `read_bmsr` runs at most `policy.max_attempts` times.
pub fn wait_autoneg<R, F>(policy: &RetryPolicy, regs: &R, mut read_bmsr: F) -> AutonegStatus
where
    R: RegisterInterface + ?Sized,
    F: FnMut() -> Result<u16, MiiError>,
{
    let done = regs::BMSR_LSTATUS | regs::BMSR_ANEGCOMPLETE;
    let mut last = read_bmsr().unwrap_or(0);

    let result = policy.poll(regs, |_| {
        if let Ok(bmsr) = read_bmsr() {
            last = bmsr;
        }
        (last & done == done).then_some(last)
    });

    match result {
        Ok(bmsr) => AutonegStatus {
            bmsr,
            converged: true,
        },
        Err(_) => AutonegStatus {
            bmsr: last,
            converged: false,
        },
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ENGINE
// ═══════════════════════════════════════════════════════════════════════════

/// PHY identity found by the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyId {
    /// Management address.
    pub addr: u8,
    /// Vendor OUI.
    pub oui: u32,
}

/// Delays used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhyTiming {
    /// Settle time after setting BMCR.RESET.
    pub reset_settle_us: u32,
    /// Wait for BMCR.RESET to self-clear.
    pub reset_poll: RetryPolicy,
    /// Wait for link and autonegotiation.
    pub autoneg: RetryPolicy,
}

impl Default for PhyTiming {
    fn default() -> Self {
        Self {
            reset_settle_us: 500_000,
            reset_poll: RetryPolicy::new(10_000, 100),
            autoneg: RetryPolicy::new(100_000, 30),
        }
    }
}

/// Scan order: 1..=31 first, 0 last (0 is a broadcast address on some PHYs).
fn scan_order() -> impl Iterator<Item = u8> {
    (1..=regs::MII_MAX_ADDR).chain(core::iter::once(0))
}

/// Walks a PHY from discovery to an applied link rate.
#[derive(Debug)]
pub struct PhyEngine {
    state: PhyState,
    phy: Option<PhyId>,
    timing: PhyTiming,
}

impl PhyEngine {
    /// Engine at SCAN.
    pub fn new(timing: PhyTiming) -> Self {
        Self {
            state: PhyState::Scan,
            phy: None,
            timing,
        }
    }

    /// Current state.
    pub fn state(&self) -> PhyState {
        self.state
    }

    /// PHY found by the last scan.
    pub fn phy(&self) -> Option<PhyId> {
        self.phy
    }

    /// Probe the management bus for a PHY.
    ///
    /// Addresses 1..=31 are tried before 0: some PHYs also answer on 0 as
    /// a broadcast address, so 0 is only adopted when nothing else responds.
    pub fn scan<R: RegisterInterface + ?Sized>(&mut self, bus: &MiiBus<'_, R>) -> Option<PhyId> {
        self.state = PhyState::Scan;
        self.phy = scan_order().find_map(|addr| {
            let id1 = bus.read(addr, regs::MII_PHYSID1).ok().filter(|v| *v != 0xFFFF)?;
            let id2 = bus.read(addr, regs::MII_PHYSID2).ok().filter(|v| *v != 0xFFFF)?;
            Some(PhyId {
                addr,
                oui: decode_oui(id1, id2),
            })
        });

        match self.phy {
            Some(id) => log::info!("forcedeth: PHY at address {}, OUI {:#06x}", id.addr, id.oui),
            None => log::warn!("forcedeth: no PHY found"),
        }
        self.phy
    }

    /// Run RESET through APPLIED and program the adapter.
    ///
    /// `link` is the rate currently programmed; it is only rewritten (and
    /// the adapter only reprogrammed) when speed or duplex changes.
    pub fn negotiate<R: RegisterInterface + ?Sized>(
        &mut self,
        bus: &MiiBus<'_, R>,
        link: &mut LinkState,
    ) -> LinkOutcome {
        let regs = bus.regs();

        let Some(phy) = self.phy else {
            self.state = PhyState::Applied;
            apply_link(regs, link, (LinkSpeed::Speed10, Duplex::Half));
            link.phy_address = None;
            link.phy_oui = 0;
            return LinkOutcome::NoPhy(*link);
        };
        link.phy_address = Some(phy.addr);
        link.phy_oui = phy.oui;

        let mode = InterfaceMode::from_register(regs.read32(regs::PHY_INTERFACE));
        if let Err(e) = self.bring_up(bus, phy, mode) {
            log::warn!("forcedeth: PHY bring-up failed: {}", e);
            self.state = PhyState::Applied;
            apply_link(regs, link, (LinkSpeed::Speed10, Duplex::Half));
            return LinkOutcome::Degraded(*link, DegradedReason::Phy(e));
        }

        self.state = PhyState::AutonegWait;
        let status = wait_autoneg(&self.timing.autoneg, regs, || {
            bus.read(phy.addr, regs::MII_BMSR)
        });

        self.state = PhyState::Resolve;
        let (resolved, reason) = if !status.link_up() {
            log::warn!("forcedeth: no link detected, falling back to 10/half");
            ((LinkSpeed::Speed10, Duplex::Half), Some(DegradedReason::NoLink))
        } else if !status.aneg_complete() {
            log::warn!("forcedeth: autonegotiation incomplete, falling back to 10/half");
            (
                (LinkSpeed::Speed10, Duplex::Half),
                Some(DegradedReason::AutonegIncomplete),
            )
        } else {
            match self.read_abilities(bus, phy) {
                Ok((adv, lpa)) if adv & lpa & regs::ADVERTISE_ALL == 0 => {
                    log::warn!("forcedeth: bad ability {:#06x}, falling back to 10/half", adv & lpa);
                    (
                        (LinkSpeed::Speed10, Duplex::Half),
                        Some(DegradedReason::NoCommonAbility),
                    )
                }
                Ok((adv, lpa)) => (resolve_link(adv, lpa, true, true), None),
                Err(e) => (
                    (LinkSpeed::Speed10, Duplex::Half),
                    Some(DegradedReason::Phy(e.into())),
                ),
            }
        };

        self.state = PhyState::Applied;
        apply_link(regs, link, resolved);

        match reason {
            None => {
                log::info!("forcedeth: link up, {}", link);
                LinkOutcome::Up(*link)
            }
            Some(reason) => LinkOutcome::Degraded(*link, reason),
        }
    }

    /// RESET and ADVERTISE.
    fn bring_up<R: RegisterInterface + ?Sized>(
        &mut self,
        bus: &MiiBus<'_, R>,
        phy: PhyId,
        mode: InterfaceMode,
    ) -> Result<(), PhyError> {
        self.state = PhyState::Reset;
        self.reset(bus, phy.addr)?;

        self.state = PhyState::Advertise;
        bus.modify(
            phy.addr,
            regs::MII_ADVERTISE,
            0,
            regs::ADVERTISE_ALL | regs::ADVERTISE_PAUSE_CAP | regs::ADVERTISE_PAUSE_ASYM,
        )?;

        for patch in quirks_for(phy.oui, mode) {
            log::debug!(
                "forcedeth: PHY quirk reg {:#04x} clear {:#06x} set {:#06x}",
                patch.reg,
                patch.clear,
                patch.set
            );
            bus.modify(phy.addr, patch.reg, patch.clear, patch.set)?;
        }

        bus.modify(
            phy.addr,
            regs::MII_BMCR,
            0,
            regs::BMCR_ANENABLE | regs::BMCR_ANRESTART,
        )?;
        Ok(())
    }

    fn reset<R: RegisterInterface + ?Sized>(&self, bus: &MiiBus<'_, R>, addr: u8) -> Result<(), PhyError> {
        bus.modify(addr, regs::MII_BMCR, 0, regs::BMCR_RESET)?;
        bus.regs().delay_us(self.timing.reset_settle_us);

        self.timing
            .reset_poll
            .poll(bus.regs(), |_| match bus.read(addr, regs::MII_BMCR) {
                Ok(bmcr) if bmcr & regs::BMCR_RESET == 0 => Some(()),
                _ => None,
            })
            .map_err(|_| PhyError::ResetTimeout)
    }

    fn read_abilities<R: RegisterInterface + ?Sized>(
        &self,
        bus: &MiiBus<'_, R>,
        phy: PhyId,
    ) -> Result<(u16, u16), MiiError> {
        let adv = bus.read(phy.addr, regs::MII_ADVERTISE)?;
        let lpa = bus.read(phy.addr, regs::MII_LPA)?;
        log::debug!("forcedeth: PHY advertises {:#06x}, partner {:#06x}", adv, lpa);
        Ok((adv, lpa))
    }
}

/// Program the adapter for `resolved` if it differs from `link`.
///
/// Returns whether anything was written.
pub fn apply_link<R: RegisterInterface + ?Sized>(
    regs: &R,
    link: &mut LinkState,
    resolved: (LinkSpeed, Duplex),
) -> bool {
    let (speed, duplex) = resolved;
    if link.speed == speed && link.duplex == duplex {
        return false;
    }
    log::debug!(
        "forcedeth: link {} -> {} Mbps {:?}",
        link,
        speed.mbps(),
        duplex
    );

    link.speed = speed;
    link.duplex = duplex;
    link.forced = true;

    write_phy_interface(regs, link);
    regs.write32(regs::MISC1, link.misc1_register());
    regs.flush();
    regs.write32(regs::LINK_SPEED, link.link_speed_register());
    regs.flush();
    true
}

/// Program the speed and duplex bits of PHY_INTERFACE for `link`.
///
/// The interface mode bit (RGMII) is left as firmware set it.
pub fn write_phy_interface<R: RegisterInterface + ?Sized>(regs: &R, link: &LinkState) {
    let mut phy_if = PhyInterface::from_bits_retain(regs.read32(regs::PHY_INTERFACE));
    phy_if.remove(PhyInterface::HALF | PhyInterface::SPEED_100 | PhyInterface::SPEED_1000);
    if link.duplex == Duplex::Half {
        phy_if.insert(PhyInterface::HALF);
    }
    match link.speed {
        LinkSpeed::Speed100 => phy_if.insert(PhyInterface::SPEED_100),
        LinkSpeed::Speed1000 => phy_if.insert(PhyInterface::SPEED_1000),
        LinkSpeed::Speed10 => {}
    }
    regs.write32(regs::PHY_INTERFACE, phy_if.bits());
}
