pub mod domain;
pub mod ports;
pub mod presence;
pub mod rooms;

pub use domain::{
    ConnectionId, Conversation, DraftError, Identity, Message, MessageBody, MessageDraft,
    MessageKind, PairError, PairKey, ValidatedMessage,
};
pub use ports::{ConversationStore, IdentityService, PortError, PortResult};
pub use presence::{PresenceRegistry, PresenceSnapshot};
pub use rooms::{compute_room_id, RoomRouter};
