//! Tunable light profile — colour bulbs with power, brightness, hue and
//! saturation.
//!
//! Yeelights take hue and saturation together in a single `set_hsv` call,
//! so a write to either characteristic is composed with the other one's
//! last-known value. The composition reads both from the same snapshot,
//! taken under the accessory lock together with the write.

use hkmiio_domain::characteristic::{Characteristic, CharacteristicValue};
use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::UnsupportedEventError;
use hkmiio_domain::event::InboundEvent;

use super::{CharacteristicUpdates, DeviceProfile, power_command, power_update};
use crate::accessory::CharacteristicSnapshot;

/// Highest hue a Yeelight accepts.
const MAX_DEVICE_HUE: f64 = 359.0;

/// Translation table for tunable lights.
#[derive(Debug, Clone, Copy, Default)]
pub struct TunableLightProfile;

impl DeviceProfile for TunableLightProfile {
    fn kind(&self) -> DeviceKind {
        DeviceKind::TunableLight
    }

    fn characteristics(&self) -> &'static [Characteristic] {
        &[
            Characteristic::On,
            Characteristic::Brightness,
            Characteristic::Hue,
            Characteristic::Saturation,
        ]
    }

    fn translate_inbound(
        &self,
        event: &InboundEvent,
    ) -> Result<CharacteristicUpdates, UnsupportedEventError> {
        match *event {
            InboundEvent::PowerChanged { state } => Ok(power_update(state)),
            InboundEvent::LightChanged {
                hue,
                brightness,
                saturation,
            } => Ok(vec![
                (Characteristic::Hue, CharacteristicValue::Float(f64::from(hue))),
                (
                    Characteristic::Brightness,
                    CharacteristicValue::Int(i64::from(brightness)),
                ),
                (
                    Characteristic::Saturation,
                    CharacteristicValue::Float(f64::from(saturation)),
                ),
            ]),
        }
    }

    fn translate_remote(
        &self,
        changed: Characteristic,
        snapshot: &CharacteristicSnapshot,
    ) -> Option<OutboundCommand> {
        match changed {
            Characteristic::On => power_command(snapshot),
            Characteristic::Brightness => snapshot
                .number(Characteristic::Brightness)
                .map(|level| OutboundCommand::SetBrightness {
                    level: percent(level),
                }),
            Characteristic::Hue | Characteristic::Saturation => {
                let hue = snapshot.number(Characteristic::Hue)?;
                let saturation = snapshot.number(Characteristic::Saturation)?;
                Some(OutboundCommand::SetHsv {
                    hue: degrees(hue),
                    saturation: percent(saturation),
                })
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn degrees(value: f64) -> u16 {
    value.clamp(0.0, MAX_DEVICE_HUE) as u16
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(value: f64) -> u8 {
    value.clamp(0.0, 100.0) as u8
}
