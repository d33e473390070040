use aws_lambda_events::event::s3::{S3Event, S3EventRecord};
use lambda_runtime::tracing;

use crate::error::CopyError;

/// One object to copy, derived from a single notification record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CopyTask {
    pub(crate) source_bucket: String,
    pub(crate) destination_bucket: String,
    pub(crate) key: String,
}

impl CopyTask {
    pub(crate) fn from_record(record: &S3EventRecord, destination: &str) -> Result<Self, CopyError> {
        let source_bucket = record
            .s3
            .bucket
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| CopyError::malformed("record has no bucket name"))?;
        let raw_key = record
            .s3
            .object
            .key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| CopyError::malformed("record has no object key"))?;

        Ok(Self {
            source_bucket: source_bucket.to_owned(),
            destination_bucket: destination.to_owned(),
            key: decode_key(raw_key)?,
        })
    }

    /// Rejects an event without records outright. Otherwise yields one entry
    /// per object-creation record so a bad record does not sink its siblings.
    pub(crate) fn from_event(
        event: &S3Event,
        destination: &str,
    ) -> Result<Vec<Result<Self, CopyError>>, CopyError> {
        if event.records.is_empty() {
            return Err(CopyError::malformed("event contains no records"));
        }

        let tasks = event
            .records
            .iter()
            .filter(|record| {
                let created = is_object_created(record);
                if !created {
                    tracing::warn!(event_name = ?record.event_name, "skipping non-creation record");
                }
                created
            })
            .map(|record| Self::from_record(record, destination))
            .collect();
        Ok(tasks)
    }
}

/// Records without an event name are treated as creations; the subscription
/// only delivers `ObjectCreated:*`.
fn is_object_created(record: &S3EventRecord) -> bool {
    record
        .event_name
        .as_deref()
        .is_none_or(|name| name.starts_with("ObjectCreated:"))
}

/// Notification keys are form-encoded: spaces arrive as `+` and a literal `+`
/// as `%2B`.
pub(crate) fn decode_key(raw: &str) -> Result<String, CopyError> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| CopyError::malformed(format!("object key `{raw}` is not valid UTF-8 once decoded: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use aws_lambda_events::event::s3::{S3Bucket, S3Entity, S3Object};

    fn record(bucket: Option<&str>, key: Option<&str>) -> S3EventRecord {
        S3EventRecord {
            event_name: Some("ObjectCreated:Put".to_string()),
            s3: S3Entity {
                bucket: S3Bucket {
                    name: bucket.map(str::to_string),
                    ..Default::default()
                },
                object: S3Object {
                    key: key.map(str::to_string),
                    size: Some(5),
                    ..Default::default()
                },
                schema_version: Some("1.0".to_string()),
                configuration_id: Some("config-id".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_task_keeps_key_and_binds_destination() {
        let task = CopyTask::from_record(&record(Some("src"), Some("a/b.txt")), "dst").unwrap();
        assert_eq!(
            task,
            CopyTask {
                source_bucket: "src".to_string(),
                destination_bucket: "dst".to_string(),
                key: "a/b.txt".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_bucket_or_key_is_malformed() {
        let err = CopyTask::from_record(&record(None, Some("a")), "dst").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
        let err = CopyTask::from_record(&record(Some("src"), None), "dst").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
        let err = CopyTask::from_record(&record(Some("src"), Some("")), "dst").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("test+object").unwrap(), "test object");
        assert_eq!(decode_key("reports/Q1%2B2024.csv").unwrap(), "reports/Q1+2024.csv");
        assert_eq!(decode_key("caf%C3%A9/menu.pdf").unwrap(), "café/menu.pdf");
        assert_eq!(decode_key("plain/path.txt").unwrap(), "plain/path.txt");
        assert!(decode_key("bad%FF").is_err());
    }

    #[test]
    fn test_empty_event_is_rejected() {
        let err = CopyTask::from_event(&S3Event { records: vec![] }, "dst").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedEvent);
    }

    #[test]
    fn test_every_creation_record_becomes_a_task() {
        let mut removed = record(Some("src"), Some("gone.txt"));
        removed.event_name = Some("ObjectRemoved:Delete".to_string());
        let mut unnamed = record(Some("src"), Some("c.txt"));
        unnamed.event_name = None;
        let event = S3Event {
            records: vec![
                record(Some("src"), Some("a.txt")),
                record(None, Some("b.txt")),
                removed,
                unnamed,
            ],
        };

        let tasks = CopyTask::from_event(&event, "dst").unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].as_ref().unwrap().key, "a.txt");
        assert!(tasks[1].is_err());
        assert_eq!(tasks[2].as_ref().unwrap().key, "c.txt");
    }
}
