use crate::device::{DeviceId, MountType, PlacedDevice};
use crate::error::CoreError;
use crate::geometry::Point;
use crate::rack::{RackConfig, RemovedDevice, Side};

/// A reversible edit for the undo/redo system.
pub trait Command: std::fmt::Debug + Send {
    /// Execute the command (apply changes to the scene).
    fn execute(&mut self, rack: &mut RackConfig) -> Result<(), CoreError>;
    /// Reverse the command (undo changes).
    fn undo(&mut self, rack: &mut RackConfig) -> Result<(), CoreError>;
    /// Human-readable description for the undo/redo history.
    fn description(&self) -> &str;
}

// ══════════════════════════════════════════════════════════════════════
// Concrete Commands
// ══════════════════════════════════════════════════════════════════════

/// Add a device to the rack.
#[derive(Debug)]
pub struct AddDeviceCommand {
    device: PlacedDevice,
    side: Option<Side>,
    /// Set while the device is out of the scene after an undo.
    removed: Option<RemovedDevice>,
}

impl AddDeviceCommand {
    pub fn new(device: PlacedDevice, side: Option<Side>) -> Self {
        Self {
            device,
            side,
            removed: None,
        }
    }
}

impl Command for AddDeviceCommand {
    fn execute(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        match self.removed.take() {
            // Redo puts the device back exactly where undo took it from.
            Some(removed) => rack.restore_device(removed),
            None => rack.add_device(self.device.clone(), self.side).map(|_| ()),
        }
    }

    fn undo(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        self.removed = Some(rack.remove_device(&self.device.id)?);
        Ok(())
    }

    fn description(&self) -> &str {
        "Add device"
    }
}

/// Remove a device from the rack.
#[derive(Debug)]
pub struct RemoveDeviceCommand {
    pub device_id: DeviceId,
    /// The removed device (saved for undo).
    removed: Option<RemovedDevice>,
}

impl RemoveDeviceCommand {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            removed: None,
        }
    }
}

impl Command for RemoveDeviceCommand {
    fn execute(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        self.removed = Some(rack.remove_device(&self.device_id)?);
        Ok(())
    }

    fn undo(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        match self.removed.take() {
            Some(removed) => rack.restore_device(removed),
            None => Ok(()),
        }
    }

    fn description(&self) -> &str {
        "Remove device"
    }
}

/// Move a device to a new center offset.
#[derive(Debug)]
pub struct MoveDeviceCommand {
    pub device_id: DeviceId,
    pub target: Point,
    /// Position before the move (set on execute).
    previous: Option<Point>,
}

impl MoveDeviceCommand {
    pub fn new(device_id: DeviceId, target: Point) -> Self {
        Self {
            device_id,
            target,
            previous: None,
        }
    }
}

impl Command for MoveDeviceCommand {
    fn execute(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        let current = rack
            .device(&self.device_id)
            .ok_or(CoreError::DeviceNotFound(self.device_id))?
            .center();
        rack.move_device(&self.device_id, self.target.x, self.target.y)?;
        self.previous = Some(current);
        Ok(())
    }

    fn undo(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        match self.previous {
            Some(p) => rack.move_device(&self.device_id, p.x, p.y),
            None => Ok(()),
        }
    }

    fn description(&self) -> &str {
        "Move device"
    }
}

/// Change how a device is mounted.
#[derive(Debug)]
pub struct SetMountTypeCommand {
    pub device_id: DeviceId,
    pub mount_type: MountType,
    previous: Option<MountType>,
}

impl SetMountTypeCommand {
    pub fn new(device_id: DeviceId, mount_type: MountType) -> Self {
        Self {
            device_id,
            mount_type,
            previous: None,
        }
    }
}

impl Command for SetMountTypeCommand {
    fn execute(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        let current = rack
            .device(&self.device_id)
            .ok_or(CoreError::DeviceNotFound(self.device_id))?
            .mount_type;
        rack.set_mount_type(&self.device_id, self.mount_type)?;
        self.previous = Some(current);
        Ok(())
    }

    fn undo(&mut self, rack: &mut RackConfig) -> Result<(), CoreError> {
        match self.previous {
            Some(m) => rack.set_mount_type(&self.device_id, m),
            None => Ok(()),
        }
    }

    fn description(&self) -> &str {
        "Change mount type"
    }
}

/// Manages the undo/redo history stack.
#[derive(Debug, Default)]
pub struct CommandHistory {
    undo_stack: Vec<Box<dyn Command>>,
    redo_stack: Vec<Box<dyn Command>>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    /// Run a command; it only enters the history if it succeeded.
    pub fn execute(
        &mut self,
        mut command: Box<dyn Command>,
        rack: &mut RackConfig,
    ) -> Result<(), CoreError> {
        command.execute(rack)?;
        self.undo_stack.push(command);
        // Executing a new command clears the redo stack.
        self.redo_stack.clear();
        Ok(())
    }

    pub fn undo(&mut self, rack: &mut RackConfig) -> bool {
        let Some(mut command) = self.undo_stack.pop() else {
            return false;
        };
        match command.undo(rack) {
            Ok(()) => {
                self.redo_stack.push(command);
                true
            }
            Err(e) => {
                log::warn!("Dropping '{}' from history: undo failed: {}", command.description(), e);
                false
            }
        }
    }

    pub fn redo(&mut self, rack: &mut RackConfig) -> bool {
        let Some(mut command) = self.redo_stack.pop() else {
            return false;
        };
        match command.execute(rack) {
            Ok(()) => {
                self.undo_stack.push(command);
                true
            }
            Err(e) => {
                log::warn!("Dropping '{}' from history: redo failed: {}", command.description(), e);
                false
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}
