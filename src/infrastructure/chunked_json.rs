// Chunked JSON streaming: each event is a u32 big-endian length followed by its payload
use crate::infrastructure::http_response::brotli_compress;
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use axum::response::IntoResponse;
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::Stream;
use serde::Serialize;

pub const CONTENT_TYPE: &str = "application/x-length-prefixed-json";

/// Build a streaming response from a stream of serializable events.
pub fn chunked_json_stream<S, T>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + Sync + 'static,
{
    let byte_stream = stream.then(move |event| async move { encode_chunk(&event, compress).await });

    // Chunks are compressed individually, so the response itself carries no Content-Encoding.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .header(header::TRANSFER_ENCODING, "chunked")
        .body(Body::from_stream(byte_stream))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

/// Serialize one event into a length-prefixed chunk.
pub async fn encode_chunk<T: Serialize>(event: &T, compress: bool) -> std::io::Result<Bytes> {
    let json = serde_json::to_vec(event)?;
    let payload = if compress {
        brotli_compress(json).await?
    } else {
        json
    };

    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "chunk too large"))?;
    let mut chunk = BytesMut::with_capacity(4 + payload.len());
    chunk.put_u32(length);
    chunk.put_slice(&payload);
    Ok(chunk.freeze())
}

/// Split a buffer of chunks back into payloads. A trailing partial chunk is ignored.
pub fn decode_chunks(mut buffer: &[u8]) -> Vec<&[u8]> {
    let mut payloads = Vec::new();
    while buffer.len() >= 4 {
        let length = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
        let Some(payload) = buffer.get(4..4 + length) else {
            break;
        };
        payloads.push(payload);
        buffer = &buffer[4 + length..];
    }
    payloads
}

/// Helper to create a streaming response from a receiver
pub fn stream_from_receiver<T>(
    mut rx: tokio::sync::mpsc::Receiver<T>,
    compress: bool,
) -> impl IntoResponse
where
    T: Serialize + Send + Sync + 'static,
{
    let stream = async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    };

    match chunked_json_stream(stream, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
