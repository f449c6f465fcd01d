//! 网关层：后端接口抽象与实现（HTTP / Mock）

pub mod error;
pub mod http;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{ApiError, TRANSPORT_FAILURE};
pub use http::{HttpGateway, API_PREFIX};
pub use mock::{MockGateway, MOCK_RESULT_FILE};
pub use traits::ApiGateway;
pub use types::{
    HealthStatus, InvalidConfig, KeywordSource, ScrapeConfig, StartedTask, TaskId,
    TaskStatusReport, TerminalStatus,
};
