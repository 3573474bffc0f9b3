//! Switch profile — power plugs with a single `on` characteristic.

use hkmiio_domain::characteristic::Characteristic;
use hkmiio_domain::command::OutboundCommand;
use hkmiio_domain::device::DeviceKind;
use hkmiio_domain::error::UnsupportedEventError;
use hkmiio_domain::event::InboundEvent;

use super::{CharacteristicUpdates, DeviceProfile, power_command, power_update, unsupported};
use crate::accessory::CharacteristicSnapshot;

/// Translation table for switch-like devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchProfile;

impl DeviceProfile for SwitchProfile {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Switch
    }

    fn characteristics(&self) -> &'static [Characteristic] {
        &[Characteristic::On]
    }

    fn translate_inbound(
        &self,
        event: &InboundEvent,
    ) -> Result<CharacteristicUpdates, UnsupportedEventError> {
        match event {
            InboundEvent::PowerChanged { state } => Ok(power_update(*state)),
            InboundEvent::LightChanged { .. } => Err(unsupported(self.kind(), event)),
        }
    }

    fn translate_remote(
        &self,
        changed: Characteristic,
        snapshot: &CharacteristicSnapshot,
    ) -> Option<OutboundCommand> {
        match changed {
            Characteristic::On => power_command(snapshot),
            Characteristic::Brightness | Characteristic::Hue | Characteristic::Saturation => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hkmiio_domain::characteristic::CharacteristicValue;
    use hkmiio_domain::device::PowerState;

    fn snapshot_with_on(on: bool) -> CharacteristicSnapshot {
        [(Characteristic::On, CharacteristicValue::Bool(on))]
            .into_iter()
            .collect()
    }

    #[test]
    fn should_set_on_when_power_changes_to_off() {
        let updates = SwitchProfile
            .translate_inbound(&InboundEvent::PowerChanged {
                state: PowerState::Off,
            })
            .unwrap();
        assert_eq!(
            updates,
            vec![(Characteristic::On, CharacteristicValue::Bool(false))]
        );
    }

    #[test]
    fn should_reject_light_changed() {
        let err = SwitchProfile
            .translate_inbound(&InboundEvent::LightChanged {
                hue: 10,
                brightness: 20,
                saturation: 30,
            })
            .unwrap_err();
        assert_eq!(err.kind, DeviceKind::Switch);
        assert_eq!(err.event, "light_changed");
    }

    #[test]
    fn should_issue_set_power_on() {
        let cmd = SwitchProfile.translate_remote(Characteristic::On, &snapshot_with_on(true));
        assert_eq!(
            cmd,
            Some(OutboundCommand::SetPower {
                state: PowerState::On
            })
        );
    }

    #[test]
    fn should_issue_set_power_off() {
        let cmd = SwitchProfile.translate_remote(Characteristic::On, &snapshot_with_on(false));
        assert_eq!(
            cmd,
            Some(OutboundCommand::SetPower {
                state: PowerState::Off
            })
        );
    }

    #[test]
    fn should_ignore_characteristics_it_does_not_expose() {
        let cmd = SwitchProfile.translate_remote(Characteristic::Hue, &snapshot_with_on(true));
        assert_eq!(cmd, None);
    }
}
