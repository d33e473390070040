use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{ChecksumAlgorithm, CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use bytes::{Bytes, BytesMut};
use lambda_runtime::tracing;

use crate::config::CopyConfig;
use crate::error::CopyError;
use crate::task::CopyTask;
use crate::tracked_body::SourceHealth;

/// S3 caps a multipart upload at this many parts.
const MAX_PARTS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferMode {
    SingleRequest,
    Multipart { parts: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CopiedObject {
    pub(crate) task: CopyTask,
    pub(crate) bytes: u64,
    pub(crate) mode: TransferMode,
}

/// Streams objects between buckets with one shared S3 client.
pub(crate) struct ObjectCopier {
    client: S3Client,
    config: CopyConfig,
}

impl ObjectCopier {
    pub(crate) fn new(client: S3Client, config: CopyConfig) -> Self {
        Self { client, config }
    }

    pub(crate) fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Copies the task's object, overwriting whatever sits at the destination key.
    ///
    /// Objects of known length up to the multipart threshold are piped from the
    /// `GetObject` body straight into `PutObject`. Anything larger, or of unknown
    /// length, goes through a multipart upload holding at most one part in memory.
    pub(crate) async fn copy(&self, task: &CopyTask) -> Result<CopiedObject, CopyError> {
        let source = self
            .client
            .get_object()
            .bucket(&task.source_bucket)
            .key(&task.key)
            .send()
            .await
            .map_err(|e| CopyError::read(&task.source_bucket, &task.key, e))?;

        let content_length = source.content_length().filter(|len| *len >= 0);
        let content_type = source.content_type().map(str::to_owned);
        tracing::info!(
            source = %task.source_bucket,
            key = %task.key,
            content_length = ?content_length,
            "object retrieved from source bucket"
        );

        match content_length {
            Some(len) if len as u64 <= self.config.multipart_threshold => {
                self.put_single(task, source.body, len, content_type).await?;
                Ok(CopiedObject {
                    task: task.clone(),
                    bytes: len as u64,
                    mode: TransferMode::SingleRequest,
                })
            }
            _ => {
                let part_size = part_size_for(self.config.part_size, content_length);
                self.put_multipart(task, source.body, part_size, content_type)
                    .await
            }
        }
    }

    /// A source stream that breaks mid-transfer surfaces as a `PutObject`
    /// failure, so the body is tracked to report it as a read error.
    async fn put_single(
        &self,
        task: &CopyTask,
        body: ByteStream,
        content_length: i64,
        content_type: Option<String>,
    ) -> Result<(), CopyError> {
        let health = SourceHealth::default();
        self.client
            .put_object()
            .bucket(&task.destination_bucket)
            .key(&task.key)
            .content_length(content_length)
            .set_content_type(content_type)
            .body(health.track(body))
            .send()
            .await
            .map_err(|e| put_failure(task, health.failed(), e))?;
        Ok(())
    }

    async fn put_multipart(
        &self,
        task: &CopyTask,
        body: ByteStream,
        part_size: u64,
        content_type: Option<String>,
    ) -> Result<CopiedObject, CopyError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&task.destination_bucket)
            .key(&task.key)
            .checksum_algorithm(ChecksumAlgorithm::Crc32)
            .set_content_type(content_type)
            .send()
            .await
            .map_err(|e| CopyError::write(&task.destination_bucket, &task.key, e))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| {
                CopyError::write_detail(&task.destination_bucket, &task.key, "no upload id returned")
            })?
            .to_owned();
        tracing::debug!(
            key = %task.key,
            upload_id = %upload_id,
            part_size,
            "started multipart upload"
        );

        match self.transfer_parts(task, &upload_id, body, part_size).await {
            Ok(copied) => Ok(copied),
            Err(e) => {
                self.abort(task, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn transfer_parts(
        &self,
        task: &CopyTask,
        upload_id: &str,
        mut body: ByteStream,
        part_size: u64,
    ) -> Result<CopiedObject, CopyError> {
        let part_size = part_size as usize;
        let mut buffer = BytesMut::with_capacity(part_size);
        let mut parts = Vec::new();
        let mut total = 0u64;

        while let Some(chunk) = body
            .try_next()
            .await
            .map_err(|e| CopyError::read(&task.source_bucket, &task.key, e))?
        {
            buffer.extend_from_slice(&chunk);
            while buffer.len() >= part_size {
                let part = buffer.split_to(part_size).freeze();
                total += part.len() as u64;
                let number = parts.len() as i32 + 1;
                parts.push(self.upload_part(task, upload_id, number, part).await?);
            }
        }

        // An empty object still needs one part for the upload to complete.
        if !buffer.is_empty() || parts.is_empty() {
            let part = buffer.split().freeze();
            total += part.len() as u64;
            let number = parts.len() as i32 + 1;
            parts.push(self.upload_part(task, upload_id, number, part).await?);
        }

        let part_count = parts.len();
        self.client
            .complete_multipart_upload()
            .bucket(&task.destination_bucket)
            .key(&task.key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| CopyError::write(&task.destination_bucket, &task.key, e))?;

        Ok(CopiedObject {
            task: task.clone(),
            bytes: total,
            mode: TransferMode::Multipart { parts: part_count },
        })
    }

    async fn upload_part(
        &self,
        task: &CopyTask,
        upload_id: &str,
        part_number: i32,
        part: Bytes,
    ) -> Result<CompletedPart, CopyError> {
        tracing::trace!(key = %task.key, part_number, len = part.len(), "uploading part");
        let output = self
            .client
            .upload_part()
            .bucket(&task.destination_bucket)
            .key(&task.key)
            .upload_id(upload_id)
            .part_number(part_number)
            .content_length(part.len() as i64)
            .checksum_algorithm(ChecksumAlgorithm::Crc32)
            .body(ByteStream::from(part))
            .send()
            .await
            .map_err(|e| CopyError::write(&task.destination_bucket, &task.key, e))?;

        Ok(CompletedPart::builder()
            .part_number(part_number)
            .set_e_tag(output.e_tag().map(str::to_owned))
            .set_checksum_crc32(output.checksum_crc32().map(str::to_owned))
            .build())
    }

    /// Best effort; a failed abort is logged and the copy error is what gets returned.
    async fn abort(&self, task: &CopyTask, upload_id: &str) {
        let aborted = self
            .client
            .abort_multipart_upload()
            .bucket(&task.destination_bucket)
            .key(&task.key)
            .upload_id(upload_id)
            .send()
            .await;
        match aborted {
            Ok(_) => tracing::info!(key = %task.key, upload_id = %upload_id, "aborted multipart upload"),
            Err(e) => tracing::warn!(
                key = %task.key,
                upload_id = %upload_id,
                error = %DisplayErrorContext(&e),
                "failed to abort multipart upload"
            ),
        }
    }
}

fn put_failure<E: std::error::Error>(task: &CopyTask, source_failed: bool, err: E) -> CopyError {
    if source_failed {
        CopyError::read(&task.source_bucket, &task.key, err)
    } else {
        CopyError::write(&task.destination_bucket, &task.key, err)
    }
}

/// Grows the configured part size when a known length would exceed the part cap.
fn part_size_for(part_size: u64, content_length: Option<i64>) -> u64 {
    match content_length {
        Some(len) => part_size.max((len as u64).div_ceil(MAX_PARTS)),
        None => part_size,
    }
}
