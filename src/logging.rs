use tracing_subscriber::fmt::MakeWriter;

/// Tees every formatted log line to stdout and onto the broadcast channel
/// behind `/api/logs`, so the dashboard log view and the terminal see the
/// same stream.
#[derive(Clone)]
pub(crate) struct SseMakeWriter {
    pub sender: tokio::sync::broadcast::Sender<String>,
}

impl<'a> MakeWriter<'a> for SseMakeWriter {
    type Writer = SseWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SseWriter {
            sender: self.sender.clone(),
        }
    }
}

pub(crate) struct SseWriter {
    sender: tokio::sync::broadcast::Sender<String>,
}

impl std::io::Write for SseWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let line = String::from_utf8_lossy(buf).to_string();
        let _ = self.sender.send(line); // Ignored if no receivers
        std::io::stdout().write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[tokio::test]
    async fn log_lines_are_mirrored_to_the_broadcast_channel() {
        let (tx, mut rx) = tokio::sync::broadcast::channel(8);
        let make_writer = SseMakeWriter { sender: tx };

        let mut writer = make_writer.make_writer();
        writer.write_all(b"INFO nexa: sampler started\n").unwrap();

        let line = rx.recv().await.unwrap();
        assert_eq!(line, "INFO nexa: sampler started\n");
    }

    #[test]
    fn write_without_receivers_still_succeeds() {
        let (tx, _) = tokio::sync::broadcast::channel(8);
        let make_writer = SseMakeWriter { sender: tx };

        let mut writer = make_writer.make_writer();
        assert!(writer.write(b"dropped line\n").is_ok());
        assert!(writer.flush().is_ok());
    }
}
