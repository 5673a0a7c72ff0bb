//! Mex-* header names used by the message-exchange server.

pub const MEX_FROM: &str = "Mex-From";
pub const MEX_TO: &str = "Mex-To";
pub const MEX_WORKFLOW_ID: &str = "Mex-WorkflowID";
pub const MEX_FILENAME: &str = "Mex-FileName";
pub const MEX_CHUNK_RANGE: &str = "Mex-Chunk-Range";
pub const MEX_MESSAGE_TYPE: &str = "Mex-Messagetype";
