//! Wire types shared between the system notification service and its
//! clients.

mod event;
mod flags;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use event::{
    EventRecord, Opcode, Notification, SYSTEM_OBJECT_UPDATE, TEAM_ADDED, TEAM_EXEC, TEAM_MONITOR,
    TEAM_REMOVED, THREAD_ADDED, THREAD_MONITOR, THREAD_NAME_CHANGED, THREAD_REMOVED,
};
pub use flags::WatchFlags;

pub type TeamId = i32;
pub type ThreadId = i32;
pub type PortId = i32;
pub type Token = i32;
pub type OwnerId = u32;

/// Raw object id meaning "every object".
pub const ANY_OBJECT: i32 = -1;

/// Line-delimited frame read by the service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Inbound {
    Request(Request),
    Event(EventRecord),
}

/// Line-delimited frame written by the service.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Outbound {
    Response(Response),
    Notification(Delivery),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Response {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Standard RPC style error object.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

/// A notification as it arrives on one port.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub port: PortId,
    pub token: Token,
    pub message: Notification,
}

/// Parameters of `start_watching`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StartWatching {
    pub object: i32,
    pub flags: u32,
    pub port: PortId,
    pub token: Token,
    pub owner: OwnerId,
}

/// Parameters of `stop_watching`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct StopWatching {
    pub object: i32,
    pub flags: u32,
    pub port: PortId,
    pub token: Token,
}

/// Parameters of `create_port`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct CreatePort {
    #[serde(default)]
    pub capacity: Option<usize>,
}

/// Parameters of `delete_port`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeletePort {
    pub port: PortId,
}

/// Parameters of `owner_exited`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OwnerExited {
    pub owner: OwnerId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_frame_parses() {
        let line = r#"{"kind":"request","id":7,"method":"start_watching","params":{"object":-1,"flags":31,"port":3,"token":9,"owner":1}}"#;
        let frame: Inbound = serde_json::from_str(line).unwrap();
        let Inbound::Request(req) = frame else {
            panic!("expected request");
        };
        assert_eq!(req.id, 7);
        let params: StartWatching = serde_json::from_value(req.params).unwrap();
        assert_eq!(params.object, ANY_OBJECT);
        assert_eq!(params.flags, WatchFlags::ALL.bits());
    }

    #[test]
    fn event_frame_parses() {
        let line = format!(r#"{{"kind":"event","what":{TEAM_MONITOR},"event":1,"team":5}}"#);
        let frame: Inbound = serde_json::from_str(&line).unwrap();
        assert_eq!(frame, Inbound::Event(EventRecord::team(TEAM_ADDED, 5)));
    }

    #[test]
    fn notification_frame_shape() {
        let frame = Outbound::Notification(Delivery {
            port: 2,
            token: 11,
            message: Notification {
                what: SYSTEM_OBJECT_UPDATE,
                opcode: Opcode::ThreadCreated,
                team: 4,
                thread: Some(40),
                name: Some("worker".into()),
            },
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["kind"], "notification");
        assert_eq!(value["message"]["opcode"], "thread_created");
        assert_eq!(value["message"]["thread"], 40);
    }

    #[test]
    fn error_response_omits_result() {
        let resp = Outbound::Response(Response::err(
            3,
            RpcError {
                code: -32004,
                message: "not found".into(),
            },
        ));
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({"kind":"response","id":3,"error":{"code":-32004,"message":"not found"}})
        );
    }
}
