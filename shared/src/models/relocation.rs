//! Relocation dispatch payload
//!
//! Produced by the transition handlers, consumed by the relocation worker.
//! Never persisted beyond the queue.

use serde::{Deserialize, Serialize};

use super::image::ImageStatus;

/// One requested file move for one image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRequest {
    pub image_id: String,
    /// Target folder, e.g. `approved/blue/2024/03/02`
    pub destination_prefix: String,
    /// Status written together with the new paths on success
    pub target_status: ImageStatus,
    /// Content-store location (bucket) the paths live in
    pub store_location: String,
    /// Project being assigned; applied on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

/// Background dispatch envelope
///
/// Serialized as `{"action": "move_files", ...request fields}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DispatchPayload {
    MoveFiles(RelocationRequest),
}

impl DispatchPayload {
    pub fn image_id(&self) -> &str {
        match self {
            DispatchPayload::MoveFiles(req) => &req.image_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_wire_format() {
        let payload = DispatchPayload::MoveFiles(RelocationRequest {
            image_id: "img-1".into(),
            destination_prefix: "approved/blue/2024/03/02".into(),
            target_status: ImageStatus::Approved,
            store_location: "photos".into(),
            project_id: None,
        });

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["action"], "move_files");
        assert_eq!(json["image_id"], "img-1");
        assert_eq!(json["target_status"], "approved");
        assert!(json.get("project_id").is_none());

        let back: DispatchPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.image_id(), "img-1");
    }
}
