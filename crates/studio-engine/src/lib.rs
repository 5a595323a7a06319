pub mod client;
pub mod controller;
pub mod image_prep;
pub mod mock;
pub mod server;
pub mod service;
pub mod settings;

pub use client::HttpGenerationClient;
pub use controller::{
    Phase, PrimaryAction, RequestController, RequestError, Resolution, SubmitError, Submission,
};
pub use image_prep::{prepare_image, ImageError, PreparedImage, UploadedImage};
pub use mock::{MockBehavior, MockGenerationService};
pub use server::ServerConfig;
pub use service::{GenerationService, ServiceError};
pub use settings::Settings;
