//! Line-framed LEAP session over a [`BoxStream`].

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, ReadHalf, WriteHalf};

use crate::error::LutronError;
use crate::leap::Communique;
use crate::transport::BoxStream;

pub struct LeapStream {
    reader: Lines<BufReader<ReadHalf<BoxStream>>>,
    writer: WriteHalf<BoxStream>,
    next_tag: u64,
    /// Messages read while waiting for a specific response.
    backlog: VecDeque<Communique>,
}

impl LeapStream {
    pub fn new(stream: BoxStream) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(reader).lines(),
            writer,
            next_tag: 0,
            backlog: VecDeque::new(),
        }
    }

    /// A client tag unique within this session.
    pub fn next_tag(&mut self) -> String {
        self.next_tag += 1;
        format!("omnihub-{}", self.next_tag)
    }

    pub async fn send(&mut self, message: &Communique) -> Result<(), LutronError> {
        let mut line = serde_json::to_vec(message)?;
        line.extend_from_slice(b"\r\n");
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        tracing::trace!(url = message.url(), tag = ?message.tag(), "sent LEAP message");
        Ok(())
    }

    /// Next message, or `None` once the bridge closed the stream.
    ///
    /// Blank and undecodable lines are skipped. Cancel safe.
    pub async fn recv(&mut self) -> Result<Option<Communique>, LutronError> {
        if let Some(message) = self.backlog.pop_front() {
            return Ok(Some(message));
        }
        self.read_message().await
    }

    /// Send a tagged request and wait for its response. Other messages that
    /// arrive meanwhile are kept for [`recv`](Self::recv).
    pub async fn request(
        &mut self,
        message: Communique,
        timeout: Duration,
    ) -> Result<Communique, LutronError> {
        let tag = self.next_tag();
        self.send(&message.with_tag(tag.clone())).await?;
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let next = tokio::time::timeout_at(deadline, self.read_message())
                .await
                .map_err(|_| LutronError::Timeout(timeout))??;
            let Some(response) = next else {
                return Err(LutronError::Disconnected);
            };
            if response.tag() == Some(tag.as_str()) {
                return response.into_result();
            }
            self.backlog.push_back(response);
        }
    }

    async fn read_message(&mut self) -> Result<Option<Communique>, LutronError> {
        loop {
            let Some(line) = self.reader.next_line().await? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(message) => return Ok(Some(message)),
                Err(err) => tracing::debug!(error = %err, "skipping undecodable LEAP line"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;
    use crate::leap::CommuniqueType;

    fn pair() -> (LeapStream, tokio::io::DuplexStream) {
        let (client, server) = tokio::io::duplex(4096);
        (LeapStream::new(Box::new(client)), server)
    }

    #[tokio::test]
    async fn should_frame_messages_with_crlf() {
        let (mut leap, server) = pair();
        leap.send(&Communique::read("/device").with_tag("a")).await.unwrap();
        let mut lines = BufReader::new(server);
        let mut raw = String::new();
        lines.read_line(&mut raw).await.unwrap();
        assert!(raw.ends_with("\r\n"));
        let sent: serde_json::Value = serde_json::from_str(raw.trim()).unwrap();
        assert_eq!(sent["Header"]["Url"], "/device");
    }

    #[tokio::test]
    async fn should_skip_noise_and_report_eof() {
        let (mut leap, mut server) = pair();
        server
            .write_all(b"\r\nnot json\r\n{\"CommuniqueType\":\"ReadResponse\"}\r\n")
            .await
            .unwrap();
        drop(server);
        let message = leap.recv().await.unwrap().unwrap();
        assert_eq!(message.communique_type, CommuniqueType::ReadResponse);
        assert!(leap.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_match_response_by_tag_and_keep_other_messages() {
        let (mut leap, server) = pair();
        let bridge = tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(server);
            let mut lines = BufReader::new(read).lines();
            let request: serde_json::Value =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            let tag = request["Header"]["ClientTag"].clone();
            let push = json!({"CommuniqueType": "ReadResponse", "Body": {"ZoneStatus": {"Zone": {"href": "/zone/1"}, "Level": 5}}});
            let response = json!({"CommuniqueType": "ReadResponse", "Header": {"StatusCode": "200 OK", "ClientTag": tag}, "Body": {"Areas": []}});
            write.write_all(format!("{push}\r\n{response}\r\n").as_bytes()).await.unwrap();
        });

        let response = leap
            .request(Communique::read("/area"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(response.body.unwrap().get("Areas").is_some());
        let pending = leap.recv().await.unwrap().unwrap();
        assert!(pending.body.unwrap().get("ZoneStatus").is_some());
        bridge.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn should_time_out_unanswered_request() {
        let (mut leap, _server) = pair();
        let err = leap
            .request(Communique::ping(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, LutronError::Timeout(_)));
    }

    #[tokio::test]
    async fn should_fail_request_when_bridge_hangs_up() {
        let (mut leap, server) = pair();
        drop(server);
        let err = leap
            .request(Communique::ping(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, LutronError::Disconnected | LutronError::Io(_)));
    }
}
