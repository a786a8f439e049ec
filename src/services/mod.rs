// Services: business logic layer

pub mod describe;
pub mod hub;
pub mod job;
pub mod jwt;
pub mod learner;
pub mod queue;

pub use describe::{DescribeError, DescribeImage, GeminiDescriber};
pub use hub::{RealtimeHub, EVENT_CONNECTED, EVENT_JOB_PROGRESS, EVENT_JOB_STATUS};
pub use job::{JobService, JobServiceError};
pub use jwt::{Claims, JwtError, JwtService};
pub use learner::{LearnResponse, LearnerClient, LearnerError};
pub use queue::{Lane, QueueError, TaskEnvelope, TaskQueue, TASK_EXTRACTION_JOB};
