pub mod api;
pub mod types;

pub use api::{
    AgentChangesRequest, ChangeRequestEvent, CreatePrototypeRequest, IngestResponse,
    PreviewResponse, PrototypeView, SubmitResponse,
};
pub use types::*;
