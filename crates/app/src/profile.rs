//! Translation profiles — one per device kind.
//!
//! A profile is the pure mapping between the two protocols for a kind of
//! device: which characteristics its accessory exposes, how inbound events
//! become characteristic updates, and how controller writes become device
//! commands. Profiles hold no state; the adapter selects one with
//! [`profile_for`] when it is constructed.

mod light;
mod switch;

pub use light::TunableLightProfile;
pub use switch::SwitchProfile;

use hkmiio_domain::characteristic::{Characteristic, CharacteristicValue};
use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::{DeviceKind, PowerState};
use hkmiio_domain::error::UnsupportedEventError;
use hkmiio_domain::event::InboundEvent;

use crate::accessory::CharacteristicSnapshot;

/// Characteristic writes produced by one inbound event, applied together.
pub type CharacteristicUpdates = Vec<(Characteristic, CharacteristicValue)>;

/// Translation capabilities of a device kind.
pub trait DeviceProfile: Send + Sync {
    /// The kind this profile translates.
    fn kind(&self) -> DeviceKind;

    /// Characteristics exposed by the accessory, in presentation order.
    fn characteristics(&self) -> &'static [Characteristic];

    /// Map a device event to the characteristic values it implies.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedEventError`] when the event has no meaning for
    /// this kind of device.
    fn translate_inbound(
        &self,
        event: &InboundEvent,
    ) -> Result<CharacteristicUpdates, UnsupportedEventError>;

    /// Map a controller write to the command that applies it to the device.
    ///
    /// `snapshot` already contains the written value. Returns `None` when
    /// the write cannot be expressed as a command (wrong value type).
    fn translate_remote(
        &self,
        changed: Characteristic,
        snapshot: &CharacteristicSnapshot,
    ) -> Option<OutboundCommand>;
}

static SWITCH: SwitchProfile = SwitchProfile;
static TUNABLE_LIGHT: TunableLightProfile = TunableLightProfile;

/// Select the profile for a device kind.
#[must_use]
pub fn profile_for(kind: DeviceKind) -> &'static dyn DeviceProfile {
    match kind {
        DeviceKind::Switch => &SWITCH,
        DeviceKind::TunableLight => &TUNABLE_LIGHT,
    }
}

/// `PowerChanged` → `on`, shared by every kind.
fn power_update(state: PowerState) -> CharacteristicUpdates {
    vec![(Characteristic::On, CharacteristicValue::Bool(state.is_on()))]
}

/// `on` write → `SetPower`, shared by every kind.
fn power_command(snapshot: &CharacteristicSnapshot) -> Option<OutboundCommand> {
    snapshot
        .bool(Characteristic::On)
        .map(|on| OutboundCommand::SetPower { state: on.into() })
}

fn unsupported(kind: DeviceKind, event: &InboundEvent) -> UnsupportedEventError {
    UnsupportedEventError {
        kind,
        event: event.name(),
    }
}
