use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use aws_sdk_s3::primitives::ByteStream;
use aws_smithy_types::body::{Error as BodyError, SdkBody};
use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};

/// Remembers whether a source body failed while a downstream request was
/// draining it, so a failed `PutObject` can be blamed on the right side.
#[derive(Debug, Clone, Default)]
pub(crate) struct SourceHealth(Arc<AtomicBool>);

impl SourceHealth {
    pub(crate) fn track(&self, body: ByteStream) -> ByteStream {
        ByteStream::new(SdkBody::from_body_1_x(TrackedBody {
            inner: Box::pin(body.into_inner()),
            health: self.clone(),
        }))
    }

    pub(crate) fn failed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct TrackedBody {
    inner: Pin<Box<SdkBody>>,
    health: SourceHealth,
}

impl Body for TrackedBody {
    type Data = Bytes;
    type Error = BodyError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = this.inner.as_mut().poll_frame(cx);
        if let Poll::Ready(Some(Err(_))) = &polled {
            this.health.0.store(true, Ordering::Release);
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        Body::is_end_stream(self.inner.as_ref().get_ref())
    }

    fn size_hint(&self) -> SizeHint {
        Body::size_hint(self.inner.as_ref().get_ref())
    }
}
