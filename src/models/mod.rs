pub mod events;

pub use events::{AttributeUpdate, RpcData, RpcParams, RpcReply, RpcRequest};
