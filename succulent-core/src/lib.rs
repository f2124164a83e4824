pub mod care;
pub mod catalog;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod inference;
pub mod intake;
pub mod label;
pub mod models;
pub mod store;

pub use care::{CareError, CareGenerator};
pub use catalog::{CareCatalog, CatalogError};
pub use completion::{
    ChatTurn, CompletionBackend, CompletionError, CompletionRequest, OpenAiCompletionClient, Role,
};
pub use config::SucculentConfig;
pub use error::SucculentError;
pub use inference::{HttpInferenceClient, InferenceBackend, InferenceError, Prediction};
pub use intake::{FileIntake, IntakeError, UploadMeta};
pub use store::{
    CareCache, ChatStore, IdentificationStore, PgCareCache, PgChatStore, PgIdentificationStore,
    StoreError,
};
