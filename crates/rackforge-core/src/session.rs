use crate::commands::{Command, CommandHistory};
use crate::error::CoreError;
use crate::hash::SceneHash;
use crate::rack::RackConfig;

/// An editing session: the live scene plus its undo/redo journal.
#[derive(Debug, Default)]
pub struct RackSession {
    config: RackConfig,
    history: CommandHistory,
}

impl RackSession {
    pub fn new(config: RackConfig) -> Self {
        Self {
            config,
            history: CommandHistory::new(),
        }
    }

    pub fn config(&self) -> &RackConfig {
        &self.config
    }

    /// Direct access for edits that are not journaled (styles, split line).
    pub fn config_mut(&mut self) -> &mut RackConfig {
        &mut self.config
    }

    /// Replace the whole scene, e.g. after loading a file. Clears history.
    pub fn replace(&mut self, config: RackConfig) {
        self.config = config;
        self.history.clear();
    }

    pub fn snapshot_hash(&self) -> SceneHash {
        self.config.snapshot_hash()
    }

    // ── Undo / Redo ──────────────────────────────────────────────────

    pub fn execute_command(&mut self, command: Box<dyn Command>) -> Result<(), CoreError> {
        self.history.execute(command, &mut self.config)
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo(&mut self.config)
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo(&mut self.config)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.history.undo_description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{AddDeviceCommand, MoveDeviceCommand, RemoveDeviceCommand, SetMountTypeCommand};
    use crate::device::{MountType, PlacedDevice};
    use crate::geometry::Point;

    #[test]
    fn test_session_create() {
        let session = RackSession::new(RackConfig::new(2).unwrap());
        assert_eq!(session.config().rack_u, 2);
        assert!(!session.can_undo());
        assert!(!session.can_redo());
    }

    #[test]
    fn test_add_undo_redo() {
        let mut session = RackSession::default();
        let device = PlacedDevice::from_catalog("rpi4", 0.0, 0.0).unwrap();
        let id = device.id;
        session
            .execute_command(Box::new(AddDeviceCommand::new(device, None)))
            .unwrap();
        assert_eq!(session.undo_description(), Some("Add device"));

        assert!(session.undo());
        assert!(session.config().device(&id).is_none());
        assert!(session.redo());
        assert!(session.config().device(&id).is_some());
        assert!(!session.redo());
    }

    #[test]
    fn test_move_and_retype_undo() {
        let mut session = RackSession::default();
        let id = session
            .config_mut()
            .add_device(PlacedDevice::from_catalog("rpi4", 0.0, 0.0).unwrap(), None)
            .unwrap();

        session
            .execute_command(Box::new(MoveDeviceCommand::new(id, Point::new(40.0, 5.0))))
            .unwrap();
        session
            .execute_command(Box::new(SetMountTypeCommand::new(id, MountType::Tray)))
            .unwrap();

        assert!(session.undo());
        assert_eq!(session.config().device(&id).unwrap().mount_type, MountType::Cage);
        assert!(session.undo());
        assert_eq!(session.config().device(&id).unwrap().center(), Point::new(0.0, 0.0));
    }

    #[test]
    fn test_failed_command_not_recorded() {
        let mut session = RackSession::default();
        let missing = uuid::Uuid::new_v4();
        let result = session.execute_command(Box::new(RemoveDeviceCommand::new(missing)));
        assert_eq!(result, Err(CoreError::DeviceNotFound(missing)));
        assert!(!session.can_undo());
    }

    #[test]
    fn test_new_command_clears_redo() {
        let mut session = RackSession::default();
        let device = PlacedDevice::from_catalog("rpi4", 0.0, 0.0).unwrap();
        let id = device.id;
        session
            .execute_command(Box::new(AddDeviceCommand::new(device, None)))
            .unwrap();
        session
            .execute_command(Box::new(RemoveDeviceCommand::new(id)))
            .unwrap();
        assert!(session.undo());
        assert!(session.can_redo());
        session
            .execute_command(Box::new(MoveDeviceCommand::new(id, Point::new(1.0, 1.0))))
            .unwrap();
        assert!(!session.can_redo());
    }
}
