pub mod config;
pub mod error;
pub mod model;
pub mod preprocess;
pub mod server;

pub use config::AppConfig;
pub use error::ServiceError;
pub use model::{DigitClassifier, ModelRegistry, PixelTensor, PredictResponse};
pub use preprocess::PreprocessMode;
pub use server::build_router;
