use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, tracing, Error};
mod config;
mod copier;
mod error;
mod event_handler;
mod task;
mod tracked_body;
use config::CopyConfig;
use copier::ObjectCopier;
use event_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::fmt().json().init();
    let config = CopyConfig::from_env()?;
    tracing::info!(
        destination = %config.destination_bucket,
        multipart_threshold = config.multipart_threshold,
        part_size = config.part_size,
        failure_policy = ?config.failure_policy,
        "loaded copy configuration"
    );
    let shared_config = aws_config::load_defaults(BehaviorVersion::v2025_01_17()).await;
    let copier = ObjectCopier::new(S3Client::new(&shared_config), config);
    run(service_fn(|event| function_handler(event, &copier))).await
}
