use super::ObservationSource;
use crate::error::SourceError;
use crate::observation::Observation;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::time::Instant;
use tracing::{debug, info};

/// Reads one observation per line from a classifier's output.
///
/// Blank lines and `#` comments are skipped. A malformed line is a
/// transient error; the next call continues with the following line.
pub struct LineSource<R> {
    name: String,
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new<S: Into<String>>(name: S, reader: R) -> Self {
        Self {
            name: name.into(),
            lines: reader.lines(),
        }
    }
}

impl LineSource<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        info!("Reading observations from stdin");
        Self::new("stdin", BufReader::new(tokio::io::stdin()))
    }
}

impl LineSource<BufReader<File>> {
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let name = format!("file:{}", path.display());
        let file = File::open(path)
            .await
            .map_err(|e| SourceError::terminal(&name, e.to_string()))?;
        info!("Reading observations from {}", path.display());
        Ok(Self::new(name, BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ObservationSource for LineSource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next(&mut self) -> Result<Option<Observation>, SourceError> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!("Source '{}' reached end of stream", self.name);
                    return Ok(None);
                }
                Err(e) => return Err(SourceError::from_io(&self.name, &e)),
            };

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            return Observation::parse(trimmed, Instant::now())
                .map(Some)
                .map_err(|details| SourceError::transient(&self.name, details));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_both_formats_and_ends() {
        let input = b"hand 0.95\n\n# comment\n{\"label\": \"not_hand\", \"confidence\": 0.2}\n";
        let mut source = LineSource::new("test", &input[..]);

        let first = source.next().await.unwrap().unwrap();
        assert_eq!(first.label, "hand");
        assert_eq!(first.confidence, 0.95);

        let second = source.next().await.unwrap().unwrap();
        assert_eq!(second.label, "not_hand");

        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_line_is_transient() {
        let mut source = LineSource::new("test", &b"hand lots\nhand 0.5\n"[..]);

        let err = source.next().await.unwrap_err();
        assert!(err.is_transient());

        let next = source.next().await.unwrap().unwrap();
        assert_eq!(next.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hand 0.91").unwrap();

        let mut source = LineSource::open(file.path()).await.unwrap();
        assert!(source.name().starts_with("file:"));
        assert_eq!(source.next().await.unwrap().unwrap().confidence, 0.91);
        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_terminal() {
        let err = LineSource::open("/nonexistent/observations.txt")
            .await
            .err()
            .unwrap();
        assert!(!err.is_transient());
    }
}
