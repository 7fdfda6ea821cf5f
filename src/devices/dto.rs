use serde::{Deserialize, Serialize};

use super::repo::Device;
use crate::activity::sync::SyncReport;

pub const MAX_DEVICE_FIELD_LEN: usize = 50;

#[derive(Debug, Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    pub device_type: String,
}

impl CreateDeviceRequest {
    /// Trims both fields and returns every problem found.
    pub fn validate(&mut self) -> Vec<String> {
        self.name = self.name.trim().to_string();
        self.device_type = self.device_type.trim().to_string();

        let mut errors = Vec::new();
        for (label, value) in [("Device name", &self.name), ("Device type", &self.device_type)] {
            if value.is_empty() {
                errors.push(format!("{} is required", label));
            } else if value.chars().count() > MAX_DEVICE_FIELD_LEN {
                errors.push(format!("{} longer than {} characters", label, MAX_DEVICE_FIELD_LEN));
            }
        }
        errors
    }
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub device: Device,
    pub sync: SyncReport,
}
