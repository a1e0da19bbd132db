//! Domain model (ids, job request, task metadata, timeline, errors, ...).
//!
//! このモジュールは I/O を持たない純粋なデータと関数だけを置きます。

pub mod errors;
pub mod ids;
pub mod inputs;
pub mod metadata;
pub mod report;
pub mod request;
pub mod state;
pub mod timeline;
pub mod vars;

pub use errors::{DispatchError, ErrorKind, JobError, PluginError, PrepareError, TimelineError};
pub use ids::{HookId, JobId, RecordId, TaskInstanceId};
pub use metadata::{
    ExecutionDescriptor, ExecutionEntry, HandlerKind, InputDefinition, InputType, TaskMetadata,
    TaskPackage,
};
pub use report::JobReport;
pub use request::{JobEnvironment, JobRequest, TaskInstance, Variables};
pub use state::{JobStatus, RecordState, TaskResult};
pub use timeline::{RecordKind, Timeline, TimelineRecord};
